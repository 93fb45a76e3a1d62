//! Move plans: the source/destination coordinates derived once per event.

use std::fmt;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::event::ChangeEvent;
use crate::mapping::KeyMapper;

/// Source and destination coordinates for one event.
///
/// Derived once by combining the event with the configured mapping rule and
/// destination bucket; immutable for the event's lifetime. Never persisted.
#[derive(Debug, Clone)]
pub struct MovePlan {
    /// Bucket the object currently lives in.
    pub source_bucket: String,
    /// Key the object currently lives under.
    pub source_key: String,
    /// Version token of the affected source object version.
    pub source_version_id: String,
    /// Bucket the object moves to.
    pub destination_bucket: String,
    /// Key the object moves to, per the mapping rule.
    pub destination_key: String,
}

impl MovePlan {
    /// Derives the plan for an event.
    ///
    /// # Errors
    ///
    /// Returns a mapping error if the key-mapping spec cannot be applied.
    pub fn derive(event: &ChangeEvent, config: &EngineConfig, mapper: &KeyMapper) -> Result<Self> {
        let destination_key = mapper.resolve(&event.key)?;
        Ok(Self {
            source_bucket: event.bucket.clone(),
            source_key: event.key.clone(),
            source_version_id: event.version_id.clone(),
            destination_bucket: config.destination_bucket.clone(),
            destination_key,
        })
    }

    /// The version-pinned source coordinates, for log lines.
    #[must_use]
    pub fn copy_source(&self) -> String {
        format!(
            "{}/{}?versionId={}",
            self.source_bucket, self.source_key, self.source_version_id
        )
    }
}

impl fmt::Display for MovePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}/{}",
            self.copy_source(),
            self.destination_bucket,
            self.destination_key
        )
    }
}
