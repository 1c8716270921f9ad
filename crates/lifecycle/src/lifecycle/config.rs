use serde::{Deserialize, Serialize};

use crate::error::{CommonError, CommonResult};
use crate::sync::queue::QueueConfig;

/// Lifecycle controller configuration
///
/// ```toml
/// name = "db-pool"
/// ```
///
/// The operation queue behind a lifecycle is always unbounded: every
/// `open`/`close`/`suspend`/`resume` request is accepted and settled in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Name attached to log lines, spans and the operation queue
    pub name: String,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self { name: "lifecycle".to_string() }
    }
}

impl LifecycleConfig {
    pub fn named<S: Into<String>>(name: S) -> Self {
        Self { name: name.into() }
    }

    /// Parse a configuration from TOML; missing keys take their defaults
    pub fn from_toml_str(source: &str) -> CommonResult<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> CommonResult<()> {
        if self.name.trim().is_empty() {
            return Err(CommonError::config_field("name", "Lifecycle name must not be empty"));
        }

        Ok(())
    }

    /// Configuration for the queue that serializes this lifecycle's operations
    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig::named(format!("{}-operations", self.name))
    }
}
