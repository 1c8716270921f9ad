//! Shared error infrastructure for the queue and lifecycle modules
//!
//! [`CommonError`] holds the failures that are not specific to one module,
//! which today means bad configuration. Module errors (`QueueError`,
//! `LifecycleError`) compose with it through a `Common(#[from] CommonError)`
//! variant, so a `?` on a config helper works inside either module:
//!
//! ```rust,ignore
//! #[derive(Debug, Error)]
//! pub enum WidgetError {
//!     #[error("Widget not found: {0}")]
//!     NotFound(String),
//!
//!     #[error(transparent)]
//!     Common(#[from] CommonError),
//! }
//! ```

use thiserror::Error;

/// Standard result type using CommonError
pub type CommonResult<T> = Result<T, CommonError>;

/// Common error variants shared by the crate's modules
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommonError {
    /// A configuration value failed validation
    #[error("Configuration error in field '{field}': {message}")]
    Config { field: String, message: String },

    /// A configuration source could not be parsed
    #[error("Serialization error ({format}): {message}")]
    Serialization { format: String, message: String },
}

impl CommonError {
    /// Create a configuration error for a specific field
    pub fn config_field<S: Into<String>, F: Into<String>>(field: F, message: S) -> Self {
        Self::Config { field: field.into(), message: message.into() }
    }

    /// Create a serialization error with format information
    pub fn serialization_format<S: Into<String>, F: Into<String>>(format: F, message: S) -> Self {
        Self::Serialization { format: format.into(), message: message.into() }
    }
}

impl From<toml::de::Error> for CommonError {
    fn from(err: toml::de::Error) -> Self {
        Self::serialization_format("TOML", err.to_string())
    }
}
