//! In-memory node store
//!
//! Keeps a node tree in memory with the service's observable rules: parents
//! must exist, non-empty nodes cannot be deleted, versions are checked,
//! sequential names come from the parent's child version, ephemeral nodes go
//! away with their session, and ACLs are enforced for `world` and `digest`.
//! Used by tests in place of a live ensemble.

use super::{CreateMode, NodeStore, Stat};
use crate::acl::{digest_id, Acl, Perms};
use crate::connector::{Auth, Connector};
use crate::error::{Result, ZkError};
use crate::path;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
struct MemoryNode {
    data: Vec<u8>,
    acl: Vec<Acl>,
    stat: Stat,
}

#[derive(Debug)]
struct Tree {
    nodes: BTreeMap<String, MemoryNode>,
    zxid: i64,
    next_session: i64,
}

impl Tree {
    fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            path::ROOT.to_string(),
            MemoryNode {
                data: Vec::new(),
                acl: vec![Acl::world_all()],
                stat: Stat::default(),
            },
        );
        Self {
            nodes,
            zxid: 0,
            next_session: 1,
        }
    }

    fn next_zxid(&mut self) -> i64 {
        self.zxid += 1;
        self.zxid
    }

    fn node(&self, path: &str) -> Result<&MemoryNode> {
        self.nodes.get(path).ok_or_else(|| ZkError::no_node(path))
    }

    fn node_mut(&mut self, path: &str) -> Result<&mut MemoryNode> {
        self.nodes.get_mut(path).ok_or_else(|| ZkError::no_node(path))
    }

    fn children(&self, parent: &str) -> Vec<(&String, &MemoryNode)> {
        self.nodes
            .iter()
            .filter(|(p, _)| p.as_str() != path::ROOT && path::parent(p) == Some(parent))
            .collect()
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn check_version(path: &str, expected: Option<i32>, actual: i32) -> Result<()> {
    match expected {
        Some(v) if v != actual => Err(ZkError::BadVersion {
            path: path.to_string(),
        }),
        _ => Ok(()),
    }
}

/// Shared tree plus a factory for sessions against it
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    tree: Arc<Mutex<Tree>>,
    auth: Option<Auth>,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self {
            tree: Arc::new(Mutex::new(Tree::new())),
            auth: None,
            opened: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Another connector over the same tree, presenting `auth`
    pub fn with_auth(&self, auth: Auth) -> Self {
        Self {
            auth: Some(auth),
            ..self.clone()
        }
    }

    /// Open a session directly, bypassing authentication
    pub async fn session(&self) -> MemoryStore {
        let session_id = {
            let mut tree = self.tree.lock().await;
            let id = tree.next_session;
            tree.next_session += 1;
            id
        };
        self.opened.fetch_add(1, Ordering::SeqCst);

        MemoryStore {
            tree: Arc::clone(&self.tree),
            session_id,
            auths: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            closed_count: Arc::clone(&self.closed),
        }
    }

    /// Every path in the tree, sorted
    pub async fn paths(&self) -> Vec<String> {
        self.tree.lock().await.nodes.keys().cloned().collect()
    }

    /// Value stored at `path`
    pub async fn data(&self, path: &str) -> Option<Vec<u8>> {
        self.tree.lock().await.nodes.get(path).map(|n| n.data.clone())
    }

    pub fn sessions_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn sessions_closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Default for MemoryConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn open(&self) -> Result<Box<dyn NodeStore>> {
        Ok(Box::new(self.session().await))
    }

    fn auth(&self) -> Option<&Auth> {
        self.auth.as_ref()
    }
}

/// One session against a [`MemoryConnector`]'s tree
#[derive(Debug)]
pub struct MemoryStore {
    tree: Arc<Mutex<Tree>>,
    session_id: i64,
    auths: Mutex<Vec<(String, Vec<u8>)>>,
    closed: AtomicBool,
    closed_count: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn session_id(&self) -> i64 {
        self.session_id
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(ZkError::SessionExpired)
        } else {
            Ok(())
        }
    }

    async fn check_perm(&self, path: &str, acl: &[Acl], perm: Perms) -> Result<()> {
        let auths = self.auths.lock().await;
        let allowed = acl
            .iter()
            .filter(|entry| entry.perms.contains(perm))
            .any(|entry| match entry.scheme.as_str() {
                "world" => entry.id == "anyone",
                "digest" => auths.iter().any(|(scheme, cred)| {
                    scheme == "digest"
                        && String::from_utf8_lossy(cred)
                            .split_once(':')
                            .map(|(user, pwd)| digest_id(user, pwd) == entry.id)
                            .unwrap_or(false)
                }),
                scheme => auths
                    .iter()
                    .any(|(s, cred)| s == scheme && cred.as_slice() == entry.id.as_bytes()),
            });

        if allowed {
            Ok(())
        } else {
            Err(ZkError::NoAuth {
                path: path.to_string(),
            })
        }
    }
}

#[async_trait]
impl NodeStore for MemoryStore {
    async fn exists(&self, path: &str) -> Result<Option<Stat>> {
        self.ensure_open()?;
        let tree = self.tree.lock().await;
        Ok(tree.nodes.get(path).map(|n| n.stat))
    }

    async fn get_data(&self, path: &str) -> Result<(Vec<u8>, Stat)> {
        self.ensure_open()?;
        let tree = self.tree.lock().await;
        let node = tree.node(path)?;
        self.check_perm(path, &node.acl, Perms::READ).await?;
        Ok((node.data.clone(), node.stat))
    }

    async fn get_children(&self, path: &str) -> Result<Vec<String>> {
        self.ensure_open()?;
        let tree = self.tree.lock().await;
        let node = tree.node(path)?;
        self.check_perm(path, &node.acl, Perms::READ).await?;

        // Newest first; the service gives no ordering guarantee.
        let mut children = tree.children(path);
        children.sort_by_key(|(_, n)| std::cmp::Reverse(n.stat.czxid));
        Ok(children
            .into_iter()
            .filter_map(|(p, _)| p.rsplit('/').next().map(str::to_string))
            .collect())
    }

    async fn create(
        &self,
        path: &str,
        data: &[u8],
        acl: &[Acl],
        mode: CreateMode,
    ) -> Result<String> {
        self.ensure_open()?;
        if acl.is_empty() {
            return Err(ZkError::InvalidAcl(format!("empty ACL for {}", path)));
        }
        let parent_path = path::parent(path)
            .ok_or_else(|| ZkError::NodeExists {
                path: path.to_string(),
            })?
            .to_string();

        let mut tree = self.tree.lock().await;
        let parent = tree.node(&parent_path).map_err(|_| ZkError::no_node(path))?;
        self.check_perm(&parent_path, &parent.acl, Perms::CREATE)
            .await?;
        if parent.stat.ephemeral_owner != 0 {
            return Err(ZkError::NoChildrenForEphemerals {
                path: path.to_string(),
            });
        }

        let actual = if mode.is_sequential() {
            format!("{}{:010}", path, parent.stat.cversion)
        } else {
            path.to_string()
        };
        if tree.nodes.contains_key(&actual) {
            return Err(ZkError::NodeExists { path: actual });
        }

        let zxid = tree.next_zxid();
        let now = now_millis();
        let parent = tree.node_mut(&parent_path)?;
        parent.stat.cversion += 1;
        parent.stat.num_children += 1;
        parent.stat.pzxid = zxid;

        tree.nodes.insert(
            actual.clone(),
            MemoryNode {
                data: data.to_vec(),
                acl: acl.to_vec(),
                stat: Stat {
                    czxid: zxid,
                    mzxid: zxid,
                    ctime: now,
                    mtime: now,
                    ephemeral_owner: if mode.is_ephemeral() {
                        self.session_id
                    } else {
                        0
                    },
                    data_length: data.len() as i32,
                    pzxid: zxid,
                    ..Stat::default()
                },
            },
        );
        Ok(actual)
    }

    async fn set_data(&self, path: &str, data: &[u8], version: Option<i32>) -> Result<Stat> {
        self.ensure_open()?;
        let mut tree = self.tree.lock().await;
        {
            let node = tree.node(path)?;
            self.check_perm(path, &node.acl, Perms::WRITE).await?;
            check_version(path, version, node.stat.version)?;
        }

        let zxid = tree.next_zxid();
        let node = tree.node_mut(path)?;
        node.data = data.to_vec();
        node.stat.version += 1;
        node.stat.mzxid = zxid;
        node.stat.mtime = now_millis();
        node.stat.data_length = data.len() as i32;
        Ok(node.stat)
    }

    async fn delete(&self, path: &str, version: Option<i32>) -> Result<()> {
        self.ensure_open()?;
        let parent_path = path::parent(path)
            .ok_or_else(|| ZkError::Remote {
                path: path.to_string(),
                message: "root node cannot be deleted".to_string(),
            })?
            .to_string();

        let mut tree = self.tree.lock().await;
        let node = tree.node(path)?;
        check_version(path, version, node.stat.version)?;
        if node.stat.num_children > 0 {
            return Err(ZkError::NotEmpty {
                path: path.to_string(),
            });
        }
        let parent = tree.node(&parent_path)?;
        self.check_perm(&parent_path, &parent.acl, Perms::DELETE)
            .await?;

        tree.nodes.remove(path);
        let zxid = tree.next_zxid();
        let parent = tree.node_mut(&parent_path)?;
        parent.stat.cversion += 1;
        parent.stat.num_children -= 1;
        parent.stat.pzxid = zxid;
        Ok(())
    }

    async fn get_acl(&self, path: &str) -> Result<(Vec<Acl>, Stat)> {
        self.ensure_open()?;
        let tree = self.tree.lock().await;
        let node = tree.node(path)?;
        Ok((node.acl.clone(), node.stat))
    }

    async fn set_acl(&self, path: &str, acl: &[Acl], version: Option<i32>) -> Result<Stat> {
        self.ensure_open()?;
        if acl.is_empty() {
            return Err(ZkError::InvalidAcl(format!("empty ACL for {}", path)));
        }
        let mut tree = self.tree.lock().await;
        {
            let node = tree.node(path)?;
            self.check_perm(path, &node.acl, Perms::ADMIN).await?;
            check_version(path, version, node.stat.aversion)?;
        }

        let node = tree.node_mut(path)?;
        node.acl = acl.to_vec();
        node.stat.aversion += 1;
        Ok(node.stat)
    }

    async fn add_auth(&self, scheme: &str, credential: &[u8]) -> Result<()> {
        self.ensure_open()?;
        if scheme == "digest" && !credential.contains(&b':') {
            return Err(ZkError::AuthFailed(
                "digest credential must be user:password".to_string(),
            ));
        }
        self.auths
            .lock()
            .await
            .push((scheme.to_string(), credential.to_vec()));
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.closed_count.fetch_add(1, Ordering::SeqCst);

        let mut tree = self.tree.lock().await;
        let owned: Vec<String> = tree
            .nodes
            .iter()
            .filter(|(_, n)| n.stat.ephemeral_owner == self.session_id)
            .map(|(p, _)| p.clone())
            .collect();
        for path in owned {
            tree.nodes.remove(&path);
            if let Some(parent) = path::parent(&path) {
                if let Some(parent) = tree.nodes.get_mut(parent) {
                    parent.stat.cversion += 1;
                    parent.stat.num_children -= 1;
                }
            }
        }
        Ok(())
    }
}
