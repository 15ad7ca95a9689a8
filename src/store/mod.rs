//! Node store abstraction
//!
//! `NodeStore` is the seam between the command layer and the coordination
//! service. One value of it is one open session: it is created by a
//! [`Connector`](crate::connector::Connector), used for a single command and
//! closed again.
//!
//! Implementations:
//!
//! - `ZooKeeperStore`: the `zookeeper` crate's blocking client, driven from
//!   `spawn_blocking` (feature `zookeeper-native`)
//! - `MemoryStore`: an in-memory tree used by tests

pub mod memory;

#[cfg(feature = "zookeeper-native")]
mod zk;

pub use memory::{MemoryConnector, MemoryStore};

#[cfg(feature = "zookeeper-native")]
pub use zk::ZooKeeperStore;

use crate::acl::Acl;
use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;

/// Node status record, as kept by the service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stat {
    pub czxid: i64,
    pub mzxid: i64,
    pub ctime: i64,
    pub mtime: i64,
    pub version: i32,
    pub cversion: i32,
    pub aversion: i32,
    pub ephemeral_owner: i64,
    pub data_length: i32,
    pub num_children: i32,
    pub pzxid: i64,
}

/// How a node is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CreateMode {
    #[default]
    Persistent,
    PersistentSequential,
    Ephemeral,
    EphemeralSequential,
}

impl CreateMode {
    pub fn is_sequential(self) -> bool {
        matches!(
            self,
            CreateMode::PersistentSequential | CreateMode::EphemeralSequential
        )
    }

    pub fn is_ephemeral(self) -> bool {
        matches!(self, CreateMode::Ephemeral | CreateMode::EphemeralSequential)
    }
}

/// One session against the coordination service.
///
/// Versions are `None` for "any version".
#[async_trait]
pub trait NodeStore: Send + Sync {
    async fn exists(&self, path: &str) -> Result<Option<Stat>>;

    async fn get_data(&self, path: &str) -> Result<(Vec<u8>, Stat)>;

    async fn get_children(&self, path: &str) -> Result<Vec<String>>;

    /// Create a node and return its actual path (sequential modes append a counter).
    async fn create(&self, path: &str, data: &[u8], acl: &[Acl], mode: CreateMode)
        -> Result<String>;

    async fn set_data(&self, path: &str, data: &[u8], version: Option<i32>) -> Result<Stat>;

    async fn delete(&self, path: &str, version: Option<i32>) -> Result<()>;

    async fn get_acl(&self, path: &str) -> Result<(Vec<Acl>, Stat)>;

    async fn set_acl(&self, path: &str, acl: &[Acl], version: Option<i32>) -> Result<Stat>;

    /// Attach a credential to the session.
    async fn add_auth(&self, scheme: &str, credential: &[u8]) -> Result<()>;

    /// End the session.
    async fn close(&self) -> Result<()>;
}
