/*!
 * Error types for zkctl
 */

use std::fmt;
use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ZkError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_USAGE: i32 = 2;

#[derive(Error, Debug)]
pub enum ZkError {
    /// Node does not exist
    #[error("Node does not exist: {path}")]
    NoNode { path: String },

    /// Node already exists
    #[error("Node already exists: {path}")]
    NodeExists { path: String },

    /// Node still has children
    #[error("Node has children: {path}")]
    NotEmpty { path: String },

    /// Session lacks the permission the node's ACL demands
    #[error("Not authorized: {path}")]
    NoAuth { path: String },

    /// Expected version did not match
    #[error("Version mismatch: {path}")]
    BadVersion { path: String },

    /// Ephemeral nodes cannot be parents
    #[error("Ephemeral nodes may not have children: {path}")]
    NoChildrenForEphemerals { path: String },

    /// Path rejected before reaching the service
    #[error("Invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// Malformed ACL or permission string
    #[error("Invalid ACL: {0}")]
    InvalidAcl(String),

    /// Credential rejected by the service
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// Could not reach the ensemble, or lost the connection mid-call
    #[error("Connection to {servers} failed: {message}")]
    Connection { servers: String, message: String },

    /// Session expired while the call was in flight
    #[error("Session expired")]
    SessionExpired,

    /// Operation timed out
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Any other error code reported by the service
    #[error("Coordination service error on {path}: {message}")]
    Remote { path: String, message: String },

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl ZkError {
    pub fn no_node(path: impl Into<String>) -> Self {
        ZkError::NoNode { path: path.into() }
    }

    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        ZkError::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            ZkError::InvalidPath { .. } | ZkError::InvalidAcl(_) | ZkError::Config(_) => EXIT_USAGE,
            _ => EXIT_FAILURE,
        }
    }

    /// Check if this error is transient (temporary, worth retrying)
    pub fn is_transient(&self) -> bool {
        match self {
            ZkError::Connection { .. } | ZkError::Timeout(_) => true,
            ZkError::Io(io_err) => matches!(
                io_err.kind(),
                io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::TimedOut
                    | io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }

    /// Check if this error indicates the node was not found
    pub fn is_no_node(&self) -> bool {
        matches!(self, ZkError::NoNode { .. })
    }

    /// Get error category for logging
    pub fn category(&self) -> ErrorCategory {
        match self {
            ZkError::NoNode { .. }
            | ZkError::NodeExists { .. }
            | ZkError::NotEmpty { .. }
            | ZkError::BadVersion { .. }
            | ZkError::NoChildrenForEphemerals { .. } => ErrorCategory::Node,
            ZkError::InvalidPath { .. } | ZkError::InvalidAcl(_) => ErrorCategory::Validation,
            ZkError::NoAuth { .. } | ZkError::AuthFailed(_) => ErrorCategory::Security,
            ZkError::Connection { .. } | ZkError::SessionExpired | ZkError::Timeout(_) => {
                ErrorCategory::Network
            }
            ZkError::Config(_) => ErrorCategory::Configuration,
            ZkError::Io(_) => ErrorCategory::IoError,
            ZkError::Remote { .. } => ErrorCategory::Service,
            ZkError::Other(_) => ErrorCategory::Unknown,
        }
    }
}

/// Error category for classification and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Node state conflicts (missing, existing, non-empty, version)
    Node,
    /// Local path or ACL validation errors
    Validation,
    /// Authentication/authorization errors
    Security,
    /// Connection and session errors
    Network,
    /// Configuration errors
    Configuration,
    /// I/O operation errors
    IoError,
    /// Other service-side failures
    Service,
    /// Uncategorized errors
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Node => write!(f, "node"),
            ErrorCategory::Validation => write!(f, "validation"),
            ErrorCategory::Security => write!(f, "security"),
            ErrorCategory::Network => write!(f, "network"),
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::IoError => write!(f, "io"),
            ErrorCategory::Service => write!(f, "service"),
            ErrorCategory::Unknown => write!(f, "unknown"),
        }
    }
}

impl From<toml::de::Error> for ZkError {
    fn from(err: toml::de::Error) -> Self {
        ZkError::Config(format!("TOML parse error: {}", err))
    }
}

impl From<serde_json::Error> for ZkError {
    fn from(err: serde_json::Error) -> Self {
        ZkError::Other(format!("JSON encode error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_exit_codes() {
        assert_eq!(ZkError::invalid_path("a", "relative").exit_code(), EXIT_USAGE);
        assert_eq!(ZkError::InvalidAcl("x".to_string()).exit_code(), EXIT_USAGE);
        assert_eq!(ZkError::Config("bad".to_string()).exit_code(), EXIT_USAGE);
    }

    #[test]
    fn test_failure_exit_codes() {
        assert_eq!(ZkError::no_node("/a").exit_code(), EXIT_FAILURE);
        assert_eq!(ZkError::SessionExpired.exit_code(), EXIT_FAILURE);
    }

    #[test]
    fn test_transient_errors() {
        assert!(ZkError::Timeout("get".to_string()).is_transient());
        assert!(ZkError::Connection {
            servers: "localhost:2181".to_string(),
            message: "refused".to_string(),
        }
        .is_transient());
        assert!(ZkError::Io(io::Error::new(io::ErrorKind::ConnectionReset, "reset")).is_transient());
        assert!(!ZkError::no_node("/a").is_transient());
        assert!(!ZkError::Io(io::Error::other("disk")).is_transient());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            ZkError::no_node("/app/config").to_string(),
            "Node does not exist: /app/config"
        );
        assert_eq!(
            ZkError::invalid_path("app", "path must start with '/'").to_string(),
            "Invalid path \"app\": path must start with '/'"
        );
    }

    #[test]
    fn test_categories() {
        assert_eq!(ZkError::no_node("/a").category(), ErrorCategory::Node);
        assert_eq!(
            ZkError::NoAuth { path: "/a".to_string() }.category(),
            ErrorCategory::Security
        );
        assert_eq!(ZkError::SessionExpired.category().to_string(), "network");
    }
}
