//! Per-event move outcomes.
//!
//! Every pipeline stage builds a new [`MoveOutcome`] from the previous one;
//! the value is never mutated after it is returned to the dispatcher, which
//! keeps concurrent events free of shared mutable state.

use serde::Serialize;

use crate::plan::MovePlan;

/// The result of processing one storage-change event.
///
/// Consumed by the batch dispatcher and by callers partitioning a batch into
/// "done" and "retry" (an unacknowledged or explicitly failed event is
/// redelivered by the transport).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveOutcome {
    /// Destination bucket the event resolved to.
    pub destination_bucket: String,
    /// Destination key the event resolved to.
    pub destination_key: String,
    /// Source version the event referred to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_version_id: Option<String>,
    /// Version token of the copied destination object, when one was assigned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_version_id: Option<String>,
    /// Version token of the source delete marker, when soft delete occurred.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_source_version_id: Option<String>,
    /// Whether the event reached its terminal state successfully.
    pub succeeded: bool,
    /// Failure description for unsuccessful events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    /// Token of the transport message this event arrived on.
    pub ack_token: String,
}

impl MoveOutcome {
    /// Creates a successful base outcome for a plan.
    #[must_use]
    pub fn success(plan: &MovePlan, ack_token: impl Into<String>) -> Self {
        Self {
            destination_bucket: plan.destination_bucket.clone(),
            destination_key: plan.destination_key.clone(),
            source_version_id: Some(plan.source_version_id.clone()),
            destination_version_id: None,
            deleted_source_version_id: None,
            succeeded: true,
            error_detail: None,
            ack_token: ack_token.into(),
        }
    }

    /// Creates a failed outcome with no plan-derived context beyond the
    /// destination coordinates.
    #[must_use]
    pub fn failed(
        destination_bucket: impl Into<String>,
        destination_key: impl Into<String>,
        ack_token: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            destination_bucket: destination_bucket.into(),
            destination_key: destination_key.into(),
            source_version_id: None,
            destination_version_id: None,
            deleted_source_version_id: None,
            succeeded: false,
            error_detail: Some(detail.into()),
            ack_token: ack_token.into(),
        }
    }

    /// Returns a new outcome carrying the destination version token.
    #[must_use]
    pub fn with_destination_version(mut self, version_id: Option<String>) -> Self {
        self.destination_version_id = version_id;
        self
    }

    /// Returns a new outcome carrying the source delete-marker version token.
    #[must_use]
    pub fn with_deleted_source_version(mut self, version_id: impl Into<String>) -> Self {
        self.deleted_source_version_id = Some(version_id.into());
        self
    }

    /// Returns a new, failed outcome with the given detail.
    #[must_use]
    pub fn into_failed(mut self, detail: impl Into<String>) -> Self {
        self.succeeded = false;
        self.error_detail = Some(detail.into());
        self
    }

    /// True when the event's transport message should be redelivered.
    #[must_use]
    pub const fn needs_retry(&self) -> bool {
        !self.succeeded
    }
}
