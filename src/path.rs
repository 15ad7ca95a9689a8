//! Node path helpers
//!
//! Paths are slash-delimited and absolute. They are checked locally so a
//! malformed path never costs a round trip.

use crate::error::{Result, ZkError};

pub const ROOT: &str = "/";

/// Validate a node path.
pub fn validate(path: &str) -> Result<()> {
    validate_inner(path, false)
}

/// Validate a path handed to create. Sequential creates may end in `/`
/// because the service appends the sequence number.
pub fn validate_create(path: &str, sequential: bool) -> Result<()> {
    validate_inner(path, sequential)
}

fn validate_inner(path: &str, sequential: bool) -> Result<()> {
    if path.is_empty() {
        return Err(ZkError::invalid_path(path, "path must not be empty"));
    }
    if !path.starts_with('/') {
        return Err(ZkError::invalid_path(path, "path must start with '/'"));
    }
    if path == ROOT {
        return Ok(());
    }
    if path.ends_with('/') && !sequential {
        return Err(ZkError::invalid_path(path, "path must not end with '/'"));
    }
    if path.contains('\0') {
        return Err(ZkError::invalid_path(path, "null character not allowed"));
    }

    // Only the single slash a sequential create may carry is dropped.
    let trimmed = if sequential {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    };
    let body = match trimmed.strip_prefix('/') {
        Some(body) => body,
        None => return Err(ZkError::invalid_path(path, "empty node name")),
    };
    for segment in body.split('/') {
        match segment {
            "" => return Err(ZkError::invalid_path(path, "empty node name")),
            "." | ".." => {
                return Err(ZkError::invalid_path(path, "relative paths not allowed"))
            }
            _ => {}
        }
    }
    Ok(())
}

/// Parent of `path`, or `None` for the root.
pub fn parent(path: &str) -> Option<&str> {
    if path == ROOT {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some(ROOT),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

/// Absolute path of `child` under `base`.
pub fn join(base: &str, child: &str) -> String {
    if base == ROOT {
        format!("/{}", child)
    } else {
        format!("{}/{}", base.trim_end_matches('/'), child)
    }
}

/// Relative path of `child` under a relative `prefix` (empty for the top level).
pub fn join_relative(prefix: &str, child: &str) -> String {
    if prefix.is_empty() {
        child.to_string()
    } else {
        format!("{}/{}", prefix, child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_paths() {
        assert!(validate("/").is_ok());
        assert!(validate("/app").is_ok());
        assert!(validate("/app/config/db").is_ok());
        assert!(validate("/app/.hidden").is_ok());
    }

    #[test]
    fn test_invalid_paths() {
        assert!(validate("").is_err());
        assert!(validate("app").is_err());
        assert!(validate("/app/").is_err());
        assert!(validate("//app").is_err());
        assert!(validate("/app//config").is_err());
        assert!(validate("/app/./config").is_err());
        assert!(validate("/app/..").is_err());
        assert!(validate("/app\0").is_err());
    }

    #[test]
    fn test_sequential_trailing_slash() {
        assert!(validate_create("/queue/", true).is_ok());
        assert!(validate_create("/queue/", false).is_err());
        assert!(validate_create("/queue/item-", true).is_ok());
        assert!(validate_create("//", true).is_err());
        assert!(validate_create("///", true).is_err());
        assert!(validate_create("/queue//", true).is_err());
    }

    #[test]
    fn test_parent() {
        assert_eq!(parent("/"), None);
        assert_eq!(parent("/app"), Some("/"));
        assert_eq!(parent("/app/config"), Some("/app"));
        assert_eq!(parent("/queue/"), Some("/queue"));
    }

    #[test]
    fn test_join() {
        assert_eq!(join("/", "app"), "/app");
        assert_eq!(join("/app", "config"), "/app/config");
        assert_eq!(join_relative("", "a"), "a");
        assert_eq!(join_relative("a", "b"), "a/b");
    }
}
