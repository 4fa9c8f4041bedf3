//! Configuration for fedplane components

use crate::common::{Error, Result};
use crate::director::advertisement::Advertisement;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "FEDPLANE_CONFIG";

/// Config file used when `FEDPLANE_CONFIG` is unset
pub const DEFAULT_CONFIG_PATH: &str = "fedplane.toml";

/// Global configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Node ID (unique identifier)
    #[serde(default = "default_node_id")]
    pub node_id: String,

    /// Role (director or origin)
    #[serde(default = "default_role")]
    pub role: NodeRole,

    /// Director-specific config
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub director: Option<DirectorConfig>,

    /// Origin-specific config
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<OriginConfig>,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_node_id() -> String {
    "fedplane".to_string()
}
fn default_role() -> NodeRole {
    NodeRole::Director
}
fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Director,
    Origin,
}

/// Director configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectorConfig {
    /// Bind address for HTTP API
    #[serde(default = "default_director_bind")]
    pub bind_addr: SocketAddr,

    /// Servers filtered out by the operator at startup (by server URL)
    #[serde(default)]
    pub filtered_servers: Vec<String>,

    /// Object stat query timing
    #[serde(default)]
    pub stat: StatConfig,

    /// How long an advertisement stays live without being refreshed
    #[serde(default = "default_advertisement_ttl")]
    pub advertisement_ttl_secs: u64,

    /// Advertisements known at startup
    #[serde(default)]
    pub advertisements: Vec<Advertisement>,

    /// Support contact published by the director
    #[serde(default)]
    pub support_contact: SupportContact,

    /// Bearer auth for operator routes; routes are open when unset
    #[serde(default)]
    pub auth: Option<TokenConfig>,
}

fn default_director_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8444))
}
fn default_advertisement_ttl() -> u64 {
    900
}

impl Default for DirectorConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_director_bind(),
            filtered_servers: Vec::new(),
            stat: StatConfig::default(),
            advertisement_ttl_secs: default_advertisement_ttl(),
            advertisements: Vec::new(),
            support_contact: SupportContact::default(),
            auth: None,
        }
    }
}

impl DirectorConfig {
    pub fn advertisement_ttl(&self) -> Duration {
        Duration::from_secs(self.advertisement_ttl_secs)
    }
}

/// Timing for object stat queries.
///
/// The per-probe timeout and the aggregate query deadline are configured
/// independently; a query never waits longer than `query_deadline_ms`
/// no matter how many probes it dispatches.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StatConfig {
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_ms: u64,

    #[serde(default = "default_query_deadline")]
    pub query_deadline_ms: u64,
}

fn default_probe_timeout() -> u64 {
    1_000
}
fn default_query_deadline() -> u64 {
    5_000
}

impl Default for StatConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: default_probe_timeout(),
            query_deadline_ms: default_query_deadline(),
        }
    }
}

impl StatConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn query_deadline(&self) -> Duration {
        Duration::from_millis(self.query_deadline_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SupportContact {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub url: String,
}

/// Origin configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OriginConfig {
    /// Bind address for HTTP API
    #[serde(default = "default_origin_bind")]
    pub bind_addr: SocketAddr,

    /// Deadline for director test reports before the director is marked critical
    #[serde(default = "default_director_test_timeout")]
    pub director_test_timeout_secs: u64,

    /// Verification of director test report tokens
    pub auth: TokenConfig,
}

fn default_origin_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8443))
}
fn default_director_test_timeout() -> u64 {
    30
}

impl OriginConfig {
    pub fn new(auth: TokenConfig) -> Self {
        Self {
            bind_addr: default_origin_bind(),
            director_test_timeout_secs: default_director_test_timeout(),
            auth,
        }
    }

    pub fn director_test_timeout(&self) -> Duration {
        Duration::from_secs(self.director_test_timeout_secs)
    }
}

/// Shared-secret bearer token settings (HS256)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    pub secret: String,
    pub issuer: String,
    pub scope: String,
}

impl Config {
    /// Load configuration from `$FEDPLANE_CONFIG` (or `fedplane.toml`) and
    /// `FEDPLANE__*` environment overrides. A missing file yields defaults.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(
                config::File::from(path.to_path_buf())
                    .format(config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix("FEDPLANE")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;
        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make a component unusable
    pub fn validate(&self) -> Result<()> {
        if let Some(director) = &self.director {
            if director.stat.probe_timeout_ms == 0 {
                return Err(Error::InvalidConfig(
                    "director.stat.probe_timeout_ms must be non-zero".into(),
                ));
            }
            if director.stat.query_deadline_ms == 0 {
                return Err(Error::InvalidConfig(
                    "director.stat.query_deadline_ms must be non-zero".into(),
                ));
            }
            if director.advertisement_ttl_secs == 0 {
                return Err(Error::InvalidConfig(
                    "director.advertisement_ttl_secs must be non-zero".into(),
                ));
            }
        }
        if let Some(origin) = &self.origin {
            if origin.director_test_timeout_secs == 0 {
                return Err(Error::InvalidConfig(
                    "origin.director_test_timeout_secs must be non-zero".into(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.role, NodeRole::Director);
        assert_eq!(config.log_level, "info");
        assert!(config.director.is_none());
    }

    #[test]
    fn test_load_director_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("director.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
node_id = "director-1"
role = "director"

[director]
bind_addr = "127.0.0.1:9000"
filtered_servers = ["https://origin-2.example.org:8443"]

[director.stat]
probe_timeout_ms = 250

[[director.advertisements]]
name = "origin-1"
type = "origin"
url = "https://origin-1.example.org:8443"
namespaces = ["/data"]
"#
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        let director = config.director.unwrap();
        assert_eq!(config.node_id, "director-1");
        assert_eq!(director.bind_addr.port(), 9000);
        assert_eq!(director.filtered_servers.len(), 1);
        assert_eq!(director.stat.probe_timeout(), Duration::from_millis(250));
        assert_eq!(director.stat.query_deadline(), Duration::from_millis(5_000));
        assert_eq!(director.advertisements[0].namespaces, vec!["/data"]);
    }

    #[test]
    fn test_zero_probe_timeout_rejected() {
        let config = Config {
            node_id: "d".into(),
            role: NodeRole::Director,
            director: Some(DirectorConfig {
                stat: StatConfig {
                    probe_timeout_ms: 0,
                    query_deadline_ms: 10,
                },
                ..Default::default()
            }),
            origin: None,
            log_level: "info".into(),
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }
}
