/*!
 * zkctl - command-level convenience layer over ZooKeeper
 *
 * - Existence checks, reads, child listing (plain and recursive)
 * - Node creation, optionally creating missing ancestors
 * - Value updates and recursive deletion
 * - ACL get/set with `scheme:id:cdrwa` specs and digest credentials
 *
 * Every command opens its own session, runs, and closes it again.
 */

pub mod acl;
pub mod commands;
pub mod config;
pub mod connector;
pub mod error;
pub mod logging;
pub mod output;
pub mod path;
pub mod store;

// Re-export commonly used types
pub use acl::{Acl, Perms};
pub use commands::Commander;
pub use config::{ClientConfig, LogLevel, OutputFormat};
pub use connector::{Auth, Connector};
pub use error::{Result, ZkError};
pub use store::{CreateMode, NodeStore, Stat};

#[cfg(feature = "zookeeper-native")]
pub use connector::ZkConnector;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
