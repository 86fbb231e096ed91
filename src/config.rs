use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const DEFAULT_HOST: &str = "http://localhost:9200";
pub const DEFAULT_MAX_RELATION_DEPTH: usize = 32;

/// Top-level configuration, usually loaded from a TOML file:
///
/// ```toml
/// [client]
/// hosts = ["https://search.internal:9200"]
/// ca_bundle_path = "/etc/ssl/search-ca.pem"
///
/// [manager]
/// max_relation_depth = 8
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OdmConfig {
    pub client: ClientConfig,
    pub manager: ManagerConfig,
}

impl OdmConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

/// Connection settings for the wire client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub hosts: Vec<String>,
    /// PEM bundle added to the trusted roots.
    pub ca_bundle_path: Option<PathBuf>,
    /// Send the `x-elastic-client-meta` header.
    pub elastic_meta_header: bool,
    /// Per-request timeout; none by default.
    pub timeout_secs: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            hosts: vec![DEFAULT_HOST.to_string()],
            ca_bundle_path: None,
            elastic_meta_header: false,
            timeout_secs: None,
        }
    }
}

/// Behaviour of the entity manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// How deep relation fields are followed when preparing, validating and
    /// hydrating entities.
    pub max_relation_depth: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_relation_depth: DEFAULT_MAX_RELATION_DEPTH,
        }
    }
}
