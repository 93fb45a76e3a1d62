//! Engine configuration.
//!
//! The engine consumes two values: the destination bucket identifier and the
//! key-mapping spec string. Both come from the environment in deployed
//! services; tests construct the config directly.

use crate::error::{Error, Result};

/// Environment variable naming the destination bucket.
pub const ENV_DESTINATION_BUCKET: &str = "OBJSHIFT_DESTINATION_BUCKET";
/// Environment variable carrying the key-mapping spec.
pub const ENV_KEY_MAPPING: &str = "OBJSHIFT_KEY_MAPPING";

/// Configuration consumed by the migration engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Bucket all moved objects land in.
    pub destination_bucket: String,
    /// Key-mapping spec (see [`crate::mapping`] for the grammar).
    pub mapping_spec: String,
}

impl EngineConfig {
    /// Creates a config from explicit values.
    #[must_use]
    pub fn new(destination_bucket: impl Into<String>, mapping_spec: impl Into<String>) -> Self {
        Self {
            destination_bucket: destination_bucket.into(),
            mapping_spec: mapping_spec.into(),
        }
    }

    /// Reads the config from the environment.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when a required variable is missing.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            destination_bucket: require_env(ENV_DESTINATION_BUCKET)?,
            mapping_spec: require_env(ENV_KEY_MAPPING)?,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| Error::configuration(format!("missing {key}")))
}
