//! `set-resource-service` admin command

use crate::{ConfigError, ConfigStore, DEFAULT_TARGET};
use std::fmt;

/// Outcome of an admin command as shown to the operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionReport {
    Success { message: String },
    Failure { message: String, cause: ConfigError },
}

impl ActionReport {
    pub fn is_success(&self) -> bool {
        matches!(self, ActionReport::Success { .. })
    }
}

impl fmt::Display for ActionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionReport::Success { message } => write!(f, "{}", message),
            ActionReport::Failure { message, cause } => write!(f, "{}: {}", message, cause),
        }
    }
}

/// Enable or disable the participant service and set its port
///
/// Attributes left as `None` keep their current value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetResourceServiceCommand {
    pub enabled: Option<bool>,
    pub port: Option<u16>,
    pub target: String,
}

impl Default for SetResourceServiceCommand {
    fn default() -> Self {
        Self {
            enabled: None,
            port: None,
            target: DEFAULT_TARGET.to_string(),
        }
    }
}

impl SetResourceServiceCommand {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    /// Apply both attributes in one configuration transaction
    pub fn execute(&self, store: &ConfigStore) -> ActionReport {
        let result = store.apply(&self.target, |config| {
            if let Some(enabled) = self.enabled {
                config.enabled = enabled;
            }
            if let Some(port) = self.port {
                config.port = port;
            }
            Ok(())
        });

        match result {
            Ok(config) => {
                tracing::info!(
                    "Resource service on {} set to enabled={} port={}",
                    self.target,
                    config.enabled,
                    config.port
                );
                ActionReport::Success {
                    message: format!(
                        "Resource service on {} is {} on port {}",
                        self.target,
                        if config.enabled { "enabled" } else { "disabled" },
                        config.port
                    ),
                }
            }
            Err(cause) => {
                tracing::warn!("set-resource-service on {} failed: {}", self.target, cause);
                ActionReport::Failure {
                    message: format!("Failed to set resource service on {}", self.target),
                    cause,
                }
            }
        }
    }
}
