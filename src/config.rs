/*!
 * Configuration types for zkctl
 */

use crate::acl::{self, Acl};
use crate::connector::Auth;
use crate::error::{Result, ZkError};
use crate::path;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Port assumed for servers listed without one
pub const DEFAULT_PORT: u16 = 2181;

/// Environment variable overriding the server list (comma separated)
pub const ENV_SERVERS: &str = "ZKCTL_SERVERS";

/// Environment variable carrying a `scheme:credential` auth pair
pub const ENV_AUTH: &str = "ZKCTL_AUTH";

/// Main client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Ensemble members, `host` or `host:port`
    #[serde(default = "default_servers")]
    pub servers: Vec<String>,

    /// Optional chroot appended to the connect string
    #[serde(default)]
    pub chroot: Option<String>,

    /// Requested session timeout in milliseconds
    #[serde(default = "default_session_timeout_ms")]
    pub session_timeout_ms: u64,

    /// Auth scheme added to every session (e.g. "digest")
    #[serde(default)]
    pub auth_scheme: Option<String>,

    /// Credential for `auth_scheme` (for digest: "user:password")
    #[serde(default)]
    pub auth_credential: Option<String>,

    /// ACL spec used when creating without an explicit ACL
    #[serde(default = "default_acl_spec")]
    pub default_acl: String,

    /// Output format for command results
    #[serde(default)]
    pub format: OutputFormat,

    /// Drop the trailing newline of text output
    #[serde(default)]
    pub omit_newline: bool,

    /// Log level for diagnostic output
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log file path (None = stderr)
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Enable verbose logging (shorthand for log_level = debug)
    #[serde(default)]
    pub verbose: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            servers: default_servers(),
            chroot: None,
            session_timeout_ms: default_session_timeout_ms(),
            auth_scheme: None,
            auth_credential: None,
            default_acl: default_acl_spec(),
            format: OutputFormat::default(),
            omit_newline: false,
            log_level: LogLevel::default(),
            log_file: None,
            verbose: false,
        }
    }
}

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One item per line
    #[default]
    Txt,

    /// A single JSON value
    Json,
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Error,

    /// Warnings and errors
    #[default]
    Warn,

    /// Info, warnings, and errors
    Info,

    /// Debug and above
    Debug,

    /// All messages including traces
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

// Default value functions for serde
fn default_servers() -> Vec<String> {
    vec![format!("localhost:{}", DEFAULT_PORT)]
}

fn default_session_timeout_ms() -> u64 {
    1000
}

fn default_acl_spec() -> String {
    "world:anyone:cdrwa".to_string()
}

impl ClientConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ZkError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: ClientConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| ZkError::Config(format!("TOML encode error: {}", e)))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// `$XDG_CONFIG_HOME/zkctl/config.toml` (or the platform equivalent)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("zkctl").join("config.toml"))
    }

    /// Load from `explicit` when given, else from the default path when that
    /// file exists, else defaults. Environment overrides are applied last.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply `ZKCTL_SERVERS` / `ZKCTL_AUTH` overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(servers) = lookup(ENV_SERVERS) {
            let servers = split_servers(&servers);
            if !servers.is_empty() {
                self.servers = servers;
            }
        }
        if let Some(auth) = lookup(ENV_AUTH) {
            if let Some((scheme, credential)) = auth.split_once(':') {
                self.auth_scheme = Some(scheme.to_string());
                self.auth_credential = Some(credential.to_string());
            }
        }
    }

    /// `host:port,host:port[/chroot]`
    pub fn connect_string(&self) -> Result<String> {
        if self.servers.is_empty() {
            return Err(ZkError::Config("no servers configured".to_string()));
        }

        let hosts = self
            .servers
            .iter()
            .map(|server| normalize_server(server))
            .collect::<Result<Vec<_>>>()?
            .join(",");

        match self.chroot.as_deref() {
            None | Some("") | Some("/") => Ok(hosts),
            Some(chroot) => {
                path::validate(chroot)
                    .map_err(|e| ZkError::Config(format!("invalid chroot: {}", e)))?;
                Ok(format!("{}{}", hosts, chroot))
            }
        }
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }

    /// Credential to add to every session, if one is configured
    pub fn auth(&self) -> Option<Auth> {
        match (&self.auth_scheme, &self.auth_credential) {
            (Some(scheme), Some(credential)) if !scheme.is_empty() => {
                Some(Auth::new(scheme.clone(), credential.clone()))
            }
            _ => None,
        }
    }

    /// Parsed default ACL
    pub fn default_acl(&self) -> Result<Vec<Acl>> {
        acl::parse_acl_spec(&self.default_acl)
    }
}

/// Split a comma-separated server list, dropping blanks
pub fn split_servers(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// `host[:port]` or `[v6-addr][:port]`, with the default port filled in.
fn normalize_server(server: &str) -> Result<String> {
    let server = server.trim();
    if server.is_empty() {
        return Err(ZkError::Config("empty server entry".to_string()));
    }

    let (host, port) = if let Some(rest) = server.strip_prefix('[') {
        let (addr, tail) = rest
            .split_once(']')
            .ok_or_else(|| ZkError::Config(format!("unclosed '[' in {:?}", server)))?;
        let port = match tail {
            "" => None,
            _ => Some(tail.strip_prefix(':').ok_or_else(|| {
                ZkError::Config(format!("unexpected text after ']' in {:?}", server))
            })?),
        };
        (addr, port)
    } else if server.matches(':').count() > 1 {
        return Err(ZkError::Config(format!(
            "IPv6 address must be bracketed in {:?}",
            server
        )));
    } else {
        match server.split_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (server, None),
        }
    };

    if host.is_empty() {
        return Err(ZkError::Config(format!("missing host in {:?}", server)));
    }
    match port {
        Some(port) => {
            port.parse::<u16>()
                .map_err(|_| ZkError::Config(format!("invalid port in {:?}", server)))?;
            Ok(server.to_string())
        }
        None => Ok(format!("{}:{}", server, DEFAULT_PORT)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.servers, vec!["localhost:2181".to_string()]);
        assert_eq!(config.session_timeout(), Duration::from_secs(1));
        assert_eq!(config.format, OutputFormat::Txt);
        assert!(config.auth().is_none());
        assert_eq!(config.default_acl().unwrap(), vec![Acl::world_all()]);
    }

    #[test]
    fn test_connect_string() {
        let config = ClientConfig {
            servers: vec!["zk1".to_string(), "zk2:2182".to_string()],
            chroot: Some("/app".to_string()),
            ..Default::default()
        };
        assert_eq!(config.connect_string().unwrap(), "zk1:2181,zk2:2182/app");
    }

    #[test]
    fn test_connect_string_errors() {
        let empty = ClientConfig {
            servers: vec![],
            ..Default::default()
        };
        assert!(empty.connect_string().is_err());

        let bad_port = ClientConfig {
            servers: vec!["zk1:http".to_string()],
            ..Default::default()
        };
        assert!(bad_port.connect_string().is_err());

        let bad_chroot = ClientConfig {
            chroot: Some("app/".to_string()),
            ..Default::default()
        };
        assert!(bad_chroot.connect_string().is_err());
    }

    #[test]
    fn test_ipv6_servers() {
        assert_eq!(normalize_server("[::1]").unwrap(), "[::1]:2181");
        assert_eq!(normalize_server("[::1]:2182").unwrap(), "[::1]:2182");
        assert_eq!(normalize_server("zk1").unwrap(), "zk1:2181");
        assert!(normalize_server("::1").is_err());
        assert!(normalize_server("[::1").is_err());
        assert!(normalize_server("[::1]2181").is_err());
        assert!(normalize_server("[::1]:port").is_err());
        assert!(normalize_server("[]:2181").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_SERVERS, "a:1, b ,"),
            (ENV_AUTH, "digest:bob:secret"),
        ]
        .into_iter()
        .collect();

        let mut config = ClientConfig::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.servers, vec!["a:1".to_string(), "b".to_string()]);
        assert_eq!(config.auth_scheme.as_deref(), Some("digest"));
        assert_eq!(config.auth_credential.as_deref(), Some("bob:secret"));
        assert!(config.auth().is_some());
    }

    #[test]
    fn test_file_round_trip() {
        let file = NamedTempFile::new().unwrap();
        let config = ClientConfig {
            servers: vec!["zk1:2181".to_string()],
            format: OutputFormat::Json,
            log_level: LogLevel::Debug,
            ..Default::default()
        };
        config.to_file(file.path()).unwrap();

        let loaded = ClientConfig::from_file(file.path()).unwrap();
        assert_eq!(loaded.servers, config.servers);
        assert_eq!(loaded.format, OutputFormat::Json);
        assert_eq!(loaded.log_level, LogLevel::Debug);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: ClientConfig = toml::from_str(
            r#"
            servers = ["zk1", "zk2"]
            format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.servers.len(), 2);
        assert_eq!(config.format, OutputFormat::Json);
        assert_eq!(config.session_timeout_ms, 1000);
        assert_eq!(config.default_acl, "world:anyone:cdrwa");
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = ClientConfig::from_file(Path::new("/nonexistent/zkctl.toml")).unwrap_err();
        assert!(matches!(err, ZkError::Config(_)));
    }

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(LogLevel::Error.to_tracing_level(), tracing::Level::ERROR);
        assert_eq!(LogLevel::Warn.to_tracing_level(), tracing::Level::WARN);
        assert_eq!(LogLevel::Trace.to_tracing_level(), tracing::Level::TRACE);
    }
}
