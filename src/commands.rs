//! Command layer
//!
//! Every method on [`Commander`] opens its own session through the connector,
//! runs one remote call (or a short recursion of them) and closes the session
//! again, on success and on error alike.

use crate::acl::{self, Acl};
use crate::connector::Connector;
use crate::error::{Result, ZkError};
use crate::path;
use crate::store::{CreateMode, NodeStore, Stat};
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, warn};

/// Value written into parents created on the way to a forced create
pub const AUTO_GENERATED_DATA: &[u8] = b"zkctl auto-generated";

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub struct Commander<C> {
    connector: C,
    default_acl: Vec<Acl>,
}

impl<C: Connector> Commander<C> {
    /// Commander that creates nodes with `world:anyone:cdrwa` unless told otherwise
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            default_acl: acl::default_acl(),
        }
    }

    pub fn with_default_acl(mut self, default_acl: Vec<Acl>) -> Self {
        self.default_acl = default_acl;
        self
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// True when `path` exists.
    pub async fn exists(&self, path: &str) -> Result<bool> {
        path::validate(path)?;
        let store = self.connector.connect().await?;
        let result = store.exists(path).await.map(|stat| stat.is_some());
        finish(store, result).await
    }

    /// Value stored at `path`.
    pub async fn get(&self, path: &str) -> Result<Vec<u8>> {
        path::validate(path)?;
        let store = self.connector.connect().await?;
        let result = store.get_data(path).await.map(|(data, _)| data);
        finish(store, result).await
    }

    /// ACL of `path`, one `scheme:id:cdrwa` string per entry.
    pub async fn get_acl(&self, path: &str) -> Result<Vec<String>> {
        path::validate(path)?;
        let store = self.connector.connect().await?;
        let result = store
            .get_acl(path)
            .await
            .map(|(acls, _)| acl::format_acls(&acls));
        finish(store, result).await
    }

    /// Names of the direct children of `path`, in service order.
    pub async fn children(&self, path: &str) -> Result<Vec<String>> {
        path::validate(path)?;
        let store = self.connector.connect().await?;
        let result = store.get_children(path).await;
        finish(store, result).await
    }

    /// Every descendant of `path`, relative to it, depth first with siblings sorted.
    pub async fn children_recursive(&self, path: &str) -> Result<Vec<String>> {
        path::validate(path)?;
        let store = self.connector.connect().await?;
        let result = children_recursive_in(&*store, path).await;
        finish(store, result).await
    }

    /// Create `path`.
    ///
    /// An empty `acl_spec` uses the default ACL. With `force`, missing
    /// ancestors are created first. Returns the path actually created.
    pub async fn create(
        &self,
        path: &str,
        data: &[u8],
        acl_spec: &str,
        force: bool,
        mode: CreateMode,
    ) -> Result<String> {
        let acl = if acl_spec.is_empty() {
            self.default_acl.clone()
        } else {
            acl::parse_acl_spec(acl_spec)?
        };
        self.create_with_acl(path, data, force, &acl, mode).await
    }

    /// Create `path` with an already built ACL.
    pub async fn create_with_acl(
        &self,
        path: &str,
        data: &[u8],
        force: bool,
        acl: &[Acl],
        mode: CreateMode,
    ) -> Result<String> {
        path::validate_create(path, mode.is_sequential())?;
        let store = self.connector.connect().await?;
        let result = create_in(&*store, path, data, acl, force, mode).await;
        finish(store, result).await
    }

    /// Replace the value at `path`, whatever its version.
    pub async fn set(&self, path: &str, data: &[u8]) -> Result<Stat> {
        path::validate(path)?;
        let store = self.connector.connect().await?;
        let result = store.set_data(path, data, None).await;
        finish(store, result).await
    }

    /// Replace the ACL of `path`, whatever its ACL version.
    ///
    /// With `force`, a missing node is created (empty value, this ACL) and the
    /// created path is returned.
    pub async fn set_acl(&self, path: &str, acl_spec: &str, force: bool) -> Result<String> {
        path::validate(path)?;
        let acl = acl::parse_acl_spec(acl_spec)?;
        let store = self.connector.connect().await?;
        let result = set_acl_in(&*store, path, &acl, force).await;
        finish(store, result).await
    }

    /// Delete `path`. Fails when it does not exist or has children.
    pub async fn delete(&self, path: &str) -> Result<()> {
        path::validate(path)?;
        let store = self.connector.connect().await?;
        debug!(path, "Deleting");
        let result = store.delete(path, None).await;
        finish(store, result).await
    }

    /// Delete `path` and everything below it.
    pub async fn delete_recursive(&self, path: &str) -> Result<()> {
        path::validate(path)?;
        if path == path::ROOT {
            return Err(ZkError::invalid_path(path, "refusing to delete the root node"));
        }
        let store = self.connector.connect().await?;
        let result = delete_recursive_in(&*store, path).await;
        finish(store, result).await
    }
}

/// Close the session and hand back the operation's result. A close failure
/// only surfaces when the operation itself succeeded.
async fn finish<T>(store: Box<dyn NodeStore>, result: Result<T>) -> Result<T> {
    match (store.close().await, result) {
        (_, Err(e)) => Err(e),
        (Err(close_err), Ok(_)) => {
            warn!(error = %close_err, "Failed to close session");
            Err(close_err)
        }
        (Ok(()), ok) => ok,
    }
}

async fn children_recursive_in(store: &dyn NodeStore, path: &str) -> Result<Vec<String>> {
    let mut result = Vec::new();
    // (absolute path, relative path) still to expand; popped depth first
    let mut pending = vec![(path.to_string(), String::new())];

    while let Some((absolute, relative)) = pending.pop() {
        let mut children = store.get_children(&absolute).await?;
        children.sort();

        // Pushed in reverse so the smallest name is expanded next.
        for child in children.iter().rev() {
            pending.push((
                path::join(&absolute, child),
                path::join_relative(&relative, child),
            ));
        }
        if !relative.is_empty() {
            debug!(child = %relative, "Incremental child");
            result.push(relative);
        }
    }

    Ok(result)
}

fn create_in<'a>(
    store: &'a dyn NodeStore,
    path: &'a str,
    data: &'a [u8],
    acl: &'a [Acl],
    force: bool,
    mode: CreateMode,
) -> BoxFuture<'a, Result<String>> {
    Box::pin(async move {
        if path == path::ROOT {
            return Ok(path::ROOT.to_string());
        }

        debug!(path, "Creating");
        let first = store.create(path, data, acl, mode).await;
        debug!(path, ok = first.is_ok(), "Create status");

        match first {
            Err(ZkError::NoNode { .. }) if force => {
                if let Some(parent) = path::parent(path) {
                    let parent_result = create_in(
                        store,
                        parent,
                        AUTO_GENERATED_DATA,
                        acl,
                        force,
                        CreateMode::Persistent,
                    )
                    .await;
                    match parent_result {
                        Ok(_) | Err(ZkError::NodeExists { .. }) => {}
                        Err(e) => return Err(e),
                    }
                }
                let retried = store.create(path, data, acl, mode).await;
                debug!(path, ok = retried.is_ok(), "Create status after parents");
                retried
            }
            other => other,
        }
    })
}

async fn set_acl_in(store: &dyn NodeStore, path: &str, acl: &[Acl], force: bool) -> Result<String> {
    if force && store.exists(path).await?.is_none() {
        return create_in(store, path, b"", acl, force, CreateMode::Persistent).await;
    }
    store.set_acl(path, acl, None).await?;
    Ok(path.to_string())
}

async fn delete_recursive_in(store: &dyn NodeStore, path: &str) -> Result<()> {
    let descendants = children_recursive_in(store, path).await?;
    for relative in descendants.iter().rev() {
        let znode = path::join(path, relative);
        debug!(path = %znode, "Deleting");
        store.delete(&znode, None).await?;
    }
    debug!(path, "Deleting");
    store.delete(path, None).await
}
