//! Participant service configuration
//!
//! Each named target (normally `server-config`) holds one
//! `ServiceConfiguration`. Changes go through `ConfigStore::apply`, which
//! mutates a copy, validates it and swaps it in only on success, so a failed
//! change never leaves partially applied settings behind.

pub mod command;

pub use command::{ActionReport, SetResourceServiceCommand};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Target every node is created with
pub const DEFAULT_TARGET: &str = "server-config";

/// Port the participant service listens on unless configured otherwise
pub const DEFAULT_PORT: u16 = 9099;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Unknown configuration target: {0}")]
    UnknownTarget(String),

    #[error("Invalid port: {0}")]
    InvalidPort(u16),

    #[error("Configuration rejected: {0}")]
    Rejected(String),
}

/// Settings of the participant service on one target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfiguration {
    /// Whether the service should be listening
    pub enabled: bool,

    /// Port the service listens on
    pub port: u16,
}

impl Default for ServiceConfiguration {
    fn default() -> Self {
        Self {
            enabled: false,
            port: DEFAULT_PORT,
        }
    }
}

impl ServiceConfiguration {
    /// Enabled configuration on the default port
    pub fn for_testing() -> Self {
        Self {
            enabled: true,
            ..Default::default()
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }
        Ok(())
    }
}

/// Configurations by target name
#[derive(Debug)]
pub struct ConfigStore {
    targets: RwLock<HashMap<String, ServiceConfiguration>>,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore {
    /// Store holding the default target with default settings
    pub fn new() -> Self {
        let mut targets = HashMap::new();
        targets.insert(DEFAULT_TARGET.to_string(), ServiceConfiguration::default());
        Self {
            targets: RwLock::new(targets),
        }
    }

    /// Add or replace a target
    pub fn insert(&self, target: impl Into<String>, config: ServiceConfiguration) -> Result<()> {
        config.validate()?;
        self.targets.write().insert(target.into(), config);
        Ok(())
    }

    pub fn get(&self, target: &str) -> Result<ServiceConfiguration> {
        self.targets
            .read()
            .get(target)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownTarget(target.to_string()))
    }

    /// Run one configuration transaction against `target`
    ///
    /// `change` edits a copy; the copy replaces the stored settings only if
    /// both `change` and validation succeed.
    pub fn apply<F>(&self, target: &str, change: F) -> Result<ServiceConfiguration>
    where
        F: FnOnce(&mut ServiceConfiguration) -> Result<()>,
    {
        let mut targets = self.targets.write();
        let current = targets
            .get_mut(target)
            .ok_or_else(|| ConfigError::UnknownTarget(target.to_string()))?;

        let mut staged = current.clone();
        change(&mut staged)?;
        staged.validate()?;

        tracing::debug!("Configuration of {} now {:?}", target, staged);
        *current = staged.clone();
        Ok(staged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let store = ConfigStore::new();
        let config = store.get(DEFAULT_TARGET).unwrap();

        assert!(!config.enabled);
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn test_failed_change_keeps_old_settings() {
        let store = ConfigStore::new();

        let result = store.apply(DEFAULT_TARGET, |config| {
            config.enabled = true;
            config.port = 0;
            Ok(())
        });

        assert_eq!(result.unwrap_err(), ConfigError::InvalidPort(0));
        assert_eq!(store.get(DEFAULT_TARGET).unwrap(), ServiceConfiguration::default());
    }

    #[test]
    fn test_rejected_change_keeps_old_settings() {
        let store = ConfigStore::new();

        let result = store.apply(DEFAULT_TARGET, |config| {
            config.port = 7000;
            Err(ConfigError::Rejected("listener busy".to_string()))
        });

        assert!(result.is_err());
        assert_eq!(store.get(DEFAULT_TARGET).unwrap().port, DEFAULT_PORT);
    }

    #[test]
    fn test_unknown_target() {
        let store = ConfigStore::new();
        assert_eq!(
            store.get("cluster-a").unwrap_err(),
            ConfigError::UnknownTarget("cluster-a".to_string())
        );
    }

    #[test]
    fn test_serde_shape() {
        let config = ServiceConfiguration::for_testing().with_port(7001);
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(json, r#"{"enabled":true,"port":7001}"#);
    }
}
