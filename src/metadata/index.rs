use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{OdmError, Result};

lazy_static! {
    static ref INDEX_NAME: Regex = Regex::new(r"^[a-z0-9_\-]+$").unwrap();
    static ref REFRESH_INTERVAL: Regex = Regex::new(r"^\d+[smh]$").unwrap();
}

/// Where and how the documents of an entity type are stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    shards: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    replicas: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_interval: Option<String>,
    #[serde(default)]
    settings: Map<String, Value>,
}

impl IndexDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shards: None,
            replicas: None,
            refresh_interval: None,
            settings: Map::new(),
        }
    }

    pub fn with_shards(mut self, shards: u32) -> Self {
        self.shards = Some(shards);
        self
    }

    pub fn with_replicas(mut self, replicas: u32) -> Self {
        self.replicas = Some(replicas);
        self
    }

    pub fn with_refresh_interval(mut self, interval: impl Into<String>) -> Self {
        self.refresh_interval = Some(interval.into());
        self
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: Value) -> Self {
        self.settings.insert(key.into(), value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shards(&self) -> Option<u32> {
        self.shards
    }

    pub fn replicas(&self) -> Option<u32> {
        self.replicas
    }

    pub fn refresh_interval(&self) -> Option<&str> {
        self.refresh_interval.as_deref()
    }

    pub fn settings(&self) -> &Map<String, Value> {
        &self.settings
    }

    /// Check the declaration constraints of an index.
    pub fn validate(&self) -> Result<()> {
        if !INDEX_NAME.is_match(&self.name) {
            return Err(OdmError::configuration(format!(
                "Invalid index name: '{}'. Index names must match the pattern [a-z0-9_-]",
                self.name
            )));
        }

        if self.shards == Some(0) {
            return Err(OdmError::configuration(
                "Shards must be greater than 0 if specified. Given: 0",
            ));
        }

        if let Some(interval) = &self.refresh_interval {
            if !REFRESH_INTERVAL.is_match(interval) {
                return Err(OdmError::configuration(format!(
                    "Invalid refresh interval: '{interval}'. Examples of valid formats: '1s', '5m', '1h'"
                )));
            }
        }

        Ok(())
    }
}
