//! ZooKeeper node store
//!
//! Wraps the `zookeeper` crate's client. That client is blocking, so every
//! call runs on tokio's blocking pool, the same way the SSH backend drives
//! `ssh2`.

use super::{CreateMode, NodeStore, Stat};
use crate::acl::{Acl, Perms};
use crate::error::{Result, ZkError};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use zookeeper::{Permission, WatchedEvent, Watcher, ZooKeeper};

/// Logs session state changes. No node watches are ever registered.
struct SessionWatcher;

impl Watcher for SessionWatcher {
    fn handle(&self, event: WatchedEvent) {
        debug!(state = ?event.keeper_state, path = ?event.path, "Session event");
    }
}

/// One ZooKeeper session
pub struct ZooKeeperStore {
    zk: Arc<ZooKeeper>,
    connect_string: String,
}

impl ZooKeeperStore {
    /// Connect to the ensemble described by `connect_string`
    /// (`host:port[,host:port...][/chroot]`).
    pub async fn connect(connect_string: String, session_timeout: Duration) -> Result<Self> {
        debug!(servers = %connect_string, timeout_ms = session_timeout.as_millis() as u64, "Connecting");

        let servers = connect_string.clone();
        let zk = tokio::task::spawn_blocking(move || {
            ZooKeeper::connect(&servers, session_timeout, SessionWatcher)
        })
        .await
        .map_err(|e| ZkError::Other(format!("Task join error: {}", e)))?
        .map_err(|e| ZkError::Connection {
            servers: connect_string.clone(),
            message: format!("{:?}", e),
        })?;

        Ok(Self {
            zk: Arc::new(zk),
            connect_string,
        })
    }

    /// Run a blocking client call for `path` on the blocking pool.
    async fn call<T, F>(&self, path: &str, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&ZooKeeper) -> zookeeper::ZkResult<T> + Send + 'static,
    {
        let zk = Arc::clone(&self.zk);
        tokio::task::spawn_blocking(move || op(&*zk))
            .await
            .map_err(|e| ZkError::Other(format!("Task join error: {}", e)))?
            .map_err(|e| map_error(e, path, &self.connect_string))
    }
}

fn map_error(err: zookeeper::ZkError, path: &str, servers: &str) -> ZkError {
    use zookeeper::ZkError as Zk;

    let path = path.to_string();
    match err {
        Zk::NoNode => ZkError::NoNode { path },
        Zk::NodeExists => ZkError::NodeExists { path },
        Zk::NotEmpty => ZkError::NotEmpty { path },
        Zk::NoAuth => ZkError::NoAuth { path },
        Zk::BadVersion => ZkError::BadVersion { path },
        Zk::NoChildrenForEphemerals => ZkError::NoChildrenForEphemerals { path },
        Zk::AuthFailed => ZkError::AuthFailed(format!("rejected by {}", servers)),
        Zk::InvalidACL => ZkError::InvalidAcl(format!("rejected by service for {}", path)),
        Zk::SessionExpired => ZkError::SessionExpired,
        Zk::OperationTimeout => ZkError::Timeout(path),
        Zk::ConnectionLoss => ZkError::Connection {
            servers: servers.to_string(),
            message: "connection lost".to_string(),
        },
        other => ZkError::Remote {
            path,
            message: format!("{:?}", other),
        },
    }
}

const PERMISSIONS: [(Perms, Permission); 5] = [
    (Perms::READ, Permission::READ),
    (Perms::WRITE, Permission::WRITE),
    (Perms::CREATE, Permission::CREATE),
    (Perms::DELETE, Permission::DELETE),
    (Perms::ADMIN, Permission::ADMIN),
];

fn to_zk_perms(perms: Perms) -> Permission {
    PERMISSIONS
        .iter()
        .filter(|(ours, _)| perms.contains(*ours))
        .fold(Permission::NONE, |acc, (_, theirs)| acc | *theirs)
}

fn from_zk_perms(perms: Permission) -> Perms {
    PERMISSIONS
        .iter()
        .filter(|(_, theirs)| perms.can(*theirs))
        .fold(Perms::empty(), |acc, (ours, _)| acc | *ours)
}

fn to_zk_acl(acls: &[Acl]) -> Vec<zookeeper::Acl> {
    acls.iter()
        .map(|acl| zookeeper::Acl {
            perms: to_zk_perms(acl.perms),
            scheme: acl.scheme.clone(),
            id: acl.id.clone(),
        })
        .collect()
}

fn from_zk_acl(acls: Vec<zookeeper::Acl>) -> Vec<Acl> {
    acls.into_iter()
        .map(|acl| Acl::new(acl.scheme, acl.id, from_zk_perms(acl.perms)))
        .collect()
}

fn from_zk_stat(stat: zookeeper::Stat) -> Stat {
    Stat {
        czxid: stat.czxid,
        mzxid: stat.mzxid,
        ctime: stat.ctime,
        mtime: stat.mtime,
        version: stat.version,
        cversion: stat.cversion,
        aversion: stat.aversion,
        ephemeral_owner: stat.ephemeral_owner,
        data_length: stat.data_length,
        num_children: stat.num_children,
        pzxid: stat.pzxid,
    }
}

fn to_zk_mode(mode: CreateMode) -> zookeeper::CreateMode {
    match mode {
        CreateMode::Persistent => zookeeper::CreateMode::Persistent,
        CreateMode::PersistentSequential => zookeeper::CreateMode::PersistentSequential,
        CreateMode::Ephemeral => zookeeper::CreateMode::Ephemeral,
        CreateMode::EphemeralSequential => zookeeper::CreateMode::EphemeralSequential,
    }
}

#[async_trait]
impl NodeStore for ZooKeeperStore {
    async fn exists(&self, path: &str) -> Result<Option<Stat>> {
        let owned = path.to_string();
        let stat = self.call(path, move |zk| zk.exists(&owned, false)).await?;
        Ok(stat.map(from_zk_stat))
    }

    async fn get_data(&self, path: &str) -> Result<(Vec<u8>, Stat)> {
        let owned = path.to_string();
        let (data, stat) = self.call(path, move |zk| zk.get_data(&owned, false)).await?;
        Ok((data, from_zk_stat(stat)))
    }

    async fn get_children(&self, path: &str) -> Result<Vec<String>> {
        let owned = path.to_string();
        self.call(path, move |zk| zk.get_children(&owned, false)).await
    }

    async fn create(
        &self,
        path: &str,
        data: &[u8],
        acl: &[Acl],
        mode: CreateMode,
    ) -> Result<String> {
        let owned = path.to_string();
        let data = data.to_vec();
        let acl = to_zk_acl(acl);
        let mode = to_zk_mode(mode);
        self.call(path, move |zk| zk.create(&owned, data, acl, mode))
            .await
    }

    async fn set_data(&self, path: &str, data: &[u8], version: Option<i32>) -> Result<Stat> {
        let owned = path.to_string();
        let data = data.to_vec();
        let stat = self
            .call(path, move |zk| zk.set_data(&owned, data, version))
            .await?;
        Ok(from_zk_stat(stat))
    }

    async fn delete(&self, path: &str, version: Option<i32>) -> Result<()> {
        let owned = path.to_string();
        self.call(path, move |zk| zk.delete(&owned, version)).await
    }

    async fn get_acl(&self, path: &str) -> Result<(Vec<Acl>, Stat)> {
        let owned = path.to_string();
        let (acl, stat) = self.call(path, move |zk| zk.get_acl(&owned)).await?;
        Ok((from_zk_acl(acl), from_zk_stat(stat)))
    }

    async fn set_acl(&self, path: &str, acl: &[Acl], version: Option<i32>) -> Result<Stat> {
        let owned = path.to_string();
        let acl = to_zk_acl(acl);
        let stat = self
            .call(path, move |zk| zk.set_acl(&owned, acl, version))
            .await?;
        Ok(from_zk_stat(stat))
    }

    async fn add_auth(&self, scheme: &str, credential: &[u8]) -> Result<()> {
        let scheme = scheme.to_string();
        let credential = credential.to_vec();
        self.call("/", move |zk| zk.add_auth(&scheme, credential))
            .await
            .map_err(|e| match e {
                ZkError::Remote { message, .. } => ZkError::AuthFailed(message),
                other => other,
            })
    }

    async fn close(&self) -> Result<()> {
        debug!(servers = %self.connect_string, "Closing session");
        self.call("/", |zk| zk.close()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zookeeper::ZkError as Zk;

    #[test]
    fn test_each_permission_maps_both_ways() {
        for (ours, theirs) in PERMISSIONS {
            let converted = to_zk_perms(ours);
            assert!(converted.can(theirs), "{} lost on the way out", ours);
            assert_eq!(from_zk_perms(converted), ours);
        }
    }

    #[test]
    fn test_acl_conversion_keeps_perms() {
        let acls = vec![
            Acl::new("world", "anyone", Perms::READ | Perms::ADMIN),
            Acl::new("ip", "10.0.0.1", Perms::ALL),
            Acl::new("auth", "", Perms::empty()),
        ];
        assert_eq!(from_zk_acl(to_zk_acl(&acls)), acls);
    }

    #[test]
    fn test_zk_acl_fields() {
        let converted = to_zk_acl(&[Acl::new("digest", "bob:abc=", Perms::WRITE)]);
        assert_eq!(converted[0].scheme, "digest");
        assert_eq!(converted[0].id, "bob:abc=");
        assert!(converted[0].perms.can(Permission::WRITE));
        assert!(!converted[0].perms.can(Permission::READ));
    }

    #[test]
    fn test_error_mapping() {
        let map = |e| map_error(e, "/app", "zk1:2181");

        assert!(matches!(map(Zk::NoNode), ZkError::NoNode { ref path } if path == "/app"));
        assert!(matches!(map(Zk::NodeExists), ZkError::NodeExists { .. }));
        assert!(matches!(map(Zk::NotEmpty), ZkError::NotEmpty { .. }));
        assert!(matches!(map(Zk::NoAuth), ZkError::NoAuth { .. }));
        assert!(matches!(map(Zk::BadVersion), ZkError::BadVersion { .. }));
        assert!(matches!(
            map(Zk::NoChildrenForEphemerals),
            ZkError::NoChildrenForEphemerals { .. }
        ));
        assert!(matches!(map(Zk::AuthFailed), ZkError::AuthFailed(ref m) if m.contains("zk1:2181")));
        assert!(matches!(map(Zk::InvalidACL), ZkError::InvalidAcl(_)));
        assert!(matches!(map(Zk::SessionExpired), ZkError::SessionExpired));
        assert!(matches!(map(Zk::OperationTimeout), ZkError::Timeout(ref p) if p == "/app"));
        assert!(matches!(
            map(Zk::ConnectionLoss),
            ZkError::Connection { ref servers, .. } if servers == "zk1:2181"
        ));
        assert!(matches!(map(Zk::Unimplemented), ZkError::Remote { .. }));
    }

    #[test]
    fn test_transient_errors_stay_transient() {
        assert!(map_error(Zk::ConnectionLoss, "/", "zk1:2181").is_transient());
        assert!(map_error(Zk::OperationTimeout, "/", "zk1:2181").is_transient());
        assert!(!map_error(Zk::NoNode, "/", "zk1:2181").is_transient());
    }

    #[test]
    fn test_create_modes() {
        assert!(matches!(
            to_zk_mode(CreateMode::Persistent),
            zookeeper::CreateMode::Persistent
        ));
        assert!(matches!(
            to_zk_mode(CreateMode::PersistentSequential),
            zookeeper::CreateMode::PersistentSequential
        ));
        assert!(matches!(
            to_zk_mode(CreateMode::Ephemeral),
            zookeeper::CreateMode::Ephemeral
        ));
        assert!(matches!(
            to_zk_mode(CreateMode::EphemeralSequential),
            zookeeper::CreateMode::EphemeralSequential
        ));
    }

    #[test]
    fn test_stat_conversion() {
        let stat = from_zk_stat(zookeeper::Stat {
            czxid: 1,
            mzxid: 2,
            ctime: 3,
            mtime: 4,
            version: 5,
            cversion: 6,
            aversion: 7,
            ephemeral_owner: 8,
            data_length: 9,
            num_children: 10,
            pzxid: 11,
        });
        assert_eq!(stat.czxid, 1);
        assert_eq!(stat.mzxid, 2);
        assert_eq!(stat.ctime, 3);
        assert_eq!(stat.mtime, 4);
        assert_eq!(stat.version, 5);
        assert_eq!(stat.cversion, 6);
        assert_eq!(stat.aversion, 7);
        assert_eq!(stat.ephemeral_owner, 8);
        assert_eq!(stat.data_length, 9);
        assert_eq!(stat.num_children, 10);
        assert_eq!(stat.pzxid, 11);
    }
}
