//! Error types for the migration engine.

/// The result type used throughout objshift-engine.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in migration operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A key-mapping spec could not be applied.
    #[error("mapping error: {message}")]
    Mapping {
        /// Description of the mapping failure.
        message: String,
    },

    /// Required configuration was missing or invalid.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// A serialization error occurred.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// An error from objshift-core (storage or transport).
    #[error("core error: {0}")]
    Core(#[from] objshift_core::Error),
}

impl Error {
    /// Creates a new mapping error.
    #[must_use]
    pub fn mapping(message: impl Into<String>) -> Self {
        Self::Mapping {
            message: message.into(),
        }
    }

    /// Creates a new configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}
