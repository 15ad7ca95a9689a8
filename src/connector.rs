//! Connection factory
//!
//! A `Connector` knows where the ensemble is and which credential to present.
//! Every command asks it for a fresh session and closes that session when done.

use crate::error::Result;
use crate::store::NodeStore;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, warn};

/// Credential added to every session right after connecting
#[derive(Debug, Clone)]
pub struct Auth {
    pub scheme: String,
    pub credential: SecretString,
}

impl Auth {
    pub fn new(scheme: impl Into<String>, credential: impl Into<String>) -> Self {
        let credential: String = credential.into();
        Self {
            scheme: scheme.into(),
            credential: SecretString::new(credential.into_boxed_str()),
        }
    }

    /// `digest` credential for a user/password pair
    pub fn digest(user: &str, password: &str) -> Self {
        Self::new("digest", format!("{}:{}", user, password))
    }
}

#[async_trait]
pub trait Connector: Send + Sync {
    /// Open an unauthenticated session.
    async fn open(&self) -> Result<Box<dyn NodeStore>>;

    /// Credential to add after opening, if any.
    fn auth(&self) -> Option<&Auth> {
        None
    }

    /// Open a session and authenticate it.
    async fn connect(&self) -> Result<Box<dyn NodeStore>> {
        let store = self.open().await?;

        if let Some(auth) = self.auth() {
            debug!(scheme = %auth.scheme, "Adding auth");
            let added = store
                .add_auth(&auth.scheme, auth.credential.expose_secret().as_bytes())
                .await;
            if let Err(e) = added {
                if let Err(close_err) = store.close().await {
                    warn!(error = %close_err, "Failed to close session after auth error");
                }
                return Err(e);
            }
        }

        Ok(store)
    }
}

#[cfg(feature = "zookeeper-native")]
pub use native::ZkConnector;

#[cfg(feature = "zookeeper-native")]
mod native {
    use super::{Auth, Connector};
    use crate::config::ClientConfig;
    use crate::error::Result;
    use crate::store::{NodeStore, ZooKeeperStore};
    use async_trait::async_trait;
    use std::time::Duration;

    /// Connector for a live ZooKeeper ensemble
    #[derive(Debug, Clone)]
    pub struct ZkConnector {
        connect_string: String,
        session_timeout: Duration,
        auth: Option<Auth>,
    }

    impl ZkConnector {
        pub fn new(connect_string: impl Into<String>, session_timeout: Duration) -> Self {
            Self {
                connect_string: connect_string.into(),
                session_timeout,
                auth: None,
            }
        }

        pub fn from_config(config: &ClientConfig) -> Result<Self> {
            let mut connector = Self::new(config.connect_string()?, config.session_timeout());
            connector.auth = config.auth();
            Ok(connector)
        }

        pub fn with_auth(mut self, auth: Auth) -> Self {
            self.auth = Some(auth);
            self
        }

        pub fn connect_string(&self) -> &str {
            &self.connect_string
        }
    }

    #[async_trait]
    impl Connector for ZkConnector {
        async fn open(&self) -> Result<Box<dyn NodeStore>> {
            let store =
                ZooKeeperStore::connect(self.connect_string.clone(), self.session_timeout).await?;
            Ok(Box::new(store))
        }

        fn auth(&self) -> Option<&Auth> {
            self.auth.as_ref()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_auth() {
        let auth = Auth::digest("bob", "secret");
        assert_eq!(auth.scheme, "digest");
        assert_eq!(auth.credential.expose_secret(), "bob:secret");
    }

    #[test]
    fn test_auth_debug_hides_credential() {
        let auth = Auth::new("digest", "bob:secret");
        assert!(!format!("{:?}", auth).contains("bob:secret"));
    }
}
