//! Move orchestrator: the per-event state machine.
//!
//! Creation events run the pipeline copy → delete source → tag destination →
//! acknowledge; removal events run read tags → delete-or-skip → acknowledge.
//! Every stage builds a new [`MoveOutcome`] from the previous one and later
//! stages no-op once an outcome has failed, so acknowledgement is always the
//! final action and is never attempted before a definitive outcome exists.
//!
//! There is no registry of in-flight moves. Correctness under duplicated and
//! reordered delivery comes from reading authoritative state at decision
//! time: the provenance tag on the destination object records which source
//! deletion produced the current destination content, and a removal event
//! whose version does not match it has been superseded by a newer creation.

use std::sync::Arc;

use objshift_core::{ObjectStore, Transport};

use crate::config::EngineConfig;
use crate::event::{ChangeEvent, ChangeKind};
use crate::mapping::KeyMapper;
use crate::outcome::MoveOutcome;
use crate::plan::MovePlan;
use crate::tags;

/// What a removal event should do to the destination object.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RemovalDecision {
    /// Destination linkage matches (or none is recorded): delete it.
    Delete,
    /// A newer creation owns the destination; leave it alone.
    Skip {
        /// The delete-marker version the destination's tags record.
        recorded: String,
    },
}

/// Executes the move/delete state machine for single events.
///
/// Takes its storage and transport collaborators by trait object, so tests
/// substitute the in-memory implementations from `objshift-core`.
pub struct Mover {
    store: Arc<dyn ObjectStore>,
    transport: Arc<dyn Transport>,
    config: EngineConfig,
    mapper: KeyMapper,
}

impl Mover {
    /// Creates a mover over the given collaborators and configuration.
    #[must_use]
    pub fn new(
        store: Arc<dyn ObjectStore>,
        transport: Arc<dyn Transport>,
        config: EngineConfig,
    ) -> Self {
        let mapper = KeyMapper::new(config.mapping_spec.clone());
        Self {
            store,
            transport,
            config,
            mapper,
        }
    }

    /// Processes one storage-change event to a definitive outcome.
    ///
    /// Never returns an error: failures are folded into the outcome so that
    /// one event can never abort its batch. A failed outcome leaves the
    /// transport message unacknowledged for redelivery.
    #[tracing::instrument(
        skip(self, event),
        fields(
            kind = ?event.kind,
            bucket = %event.bucket,
            key = %event.key,
            version_id = %event.version_id,
        )
    )]
    pub async fn handle_event(&self, ack_token: &str, event: ChangeEvent) -> MoveOutcome {
        let plan = match MovePlan::derive(&event, &self.config, &self.mapper) {
            Ok(plan) => plan,
            Err(e) => {
                tracing::error!(error = %e, "could not derive move plan");
                return MoveOutcome::failed(
                    self.config.destination_bucket.as_str(),
                    event.key.as_str(),
                    ack_token,
                    e.to_string(),
                );
            }
        };
        tracing::debug!(plan = %plan, "derived move plan");

        match event.kind {
            ChangeKind::Created => self.run_creation(&plan, ack_token).await,
            ChangeKind::Removed => self.run_removal(&plan, ack_token).await,
        }
    }

    async fn run_creation(&self, plan: &MovePlan, ack_token: &str) -> MoveOutcome {
        let outcome = self.copy(plan, ack_token).await;
        let outcome = self.delete_source(plan, outcome).await;
        let outcome = self.tag_destination(plan, outcome).await;
        self.acknowledge(outcome).await
    }

    /// Copies the exact source version to the destination key.
    ///
    /// Copy failure is terminal for the event: nothing further runs and the
    /// message is left for transport redelivery.
    async fn copy(&self, plan: &MovePlan, ack_token: &str) -> MoveOutcome {
        match self
            .store
            .copy_object_version(
                &plan.source_bucket,
                &plan.source_key,
                &plan.source_version_id,
                &plan.destination_bucket,
                &plan.destination_key,
            )
            .await
        {
            Ok(copied) => {
                tracing::info!(copied = %plan, "copied object version");
                MoveOutcome::success(plan, ack_token).with_destination_version(copied.version_id)
            }
            Err(e) => {
                tracing::error!(error = %e, source = %plan.copy_source(), "copy failed");
                MoveOutcome::failed(
                    plan.destination_bucket.as_str(),
                    plan.destination_key.as_str(),
                    ack_token,
                    format!("copy failed: {e}"),
                )
            }
        }
    }

    /// Deletes the source object, capturing the delete-marker version when
    /// the bucket soft-deletes.
    async fn delete_source(&self, plan: &MovePlan, outcome: MoveOutcome) -> MoveOutcome {
        if outcome.needs_retry() {
            return outcome;
        }
        match self
            .store
            .delete_object_version(&plan.source_bucket, &plan.source_key)
            .await
        {
            Ok(deleted) if deleted.delete_marker_created => match deleted.version_id {
                Some(marker) => {
                    tracing::info!(marker = %marker, source = %plan.copy_source(), "delete marker recorded for source");
                    outcome.with_deleted_source_version(marker)
                }
                None => outcome,
            },
            // Hard removal: no marker to record, no provenance tags this round.
            Ok(_) => outcome,
            Err(e) => {
                tracing::error!(error = %e, source = %plan.copy_source(), "source delete failed");
                outcome.into_failed(format!("source delete failed: {e}"))
            }
        }
    }

    /// Writes provenance tags onto the destination when a delete marker was
    /// captured.
    ///
    /// A failure here is a recorded inconsistency, not rolled back: the copy
    /// and source delete already happened, and redelivery re-runs the whole
    /// idempotent pipeline.
    async fn tag_destination(&self, plan: &MovePlan, outcome: MoveOutcome) -> MoveOutcome {
        if outcome.needs_retry() {
            return outcome;
        }
        let Some(marker) = outcome.deleted_source_version_id.clone() else {
            tracing::debug!("no delete marker captured, skipping provenance tags");
            return outcome;
        };

        let tags = tags::encode(&marker, &plan.source_bucket, &plan.source_key);
        match self
            .store
            .put_tags(&plan.destination_bucket, &plan.destination_key, tags)
            .await
        {
            Ok(()) => {
                tracing::info!(
                    destination = %format!("{}/{}", plan.destination_bucket, plan.destination_key),
                    "provenance tags written"
                );
                outcome
            }
            Err(e) => {
                tracing::warn!(error = %e, "tagging failed after copy and source delete; inconsistency recorded");
                outcome.into_failed(format!("tagging failed: {e}"))
            }
        }
    }

    async fn run_removal(&self, plan: &MovePlan, ack_token: &str) -> MoveOutcome {
        let outcome = match self.removal_decision(plan).await {
            RemovalDecision::Delete => {
                match self
                    .store
                    .delete_object(&plan.destination_bucket, &plan.destination_key)
                    .await
                {
                    Ok(()) => {
                        tracing::info!(
                            destination = %format!("{}/{}", plan.destination_bucket, plan.destination_key),
                            "deleted destination object"
                        );
                        MoveOutcome::success(plan, ack_token)
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "destination delete failed");
                        MoveOutcome::failed(
                            plan.destination_bucket.as_str(),
                            plan.destination_key.as_str(),
                            ack_token,
                            format!("destination delete failed: {e}"),
                        )
                    }
                }
            }
            RemovalDecision::Skip { recorded } => {
                tracing::info!(
                    recorded = %recorded,
                    event_version = %plan.source_version_id,
                    "removal superseded by a newer creation; skipping delete"
                );
                MoveOutcome::success(plan, ack_token)
            }
        };
        self.acknowledge(outcome).await
    }

    /// Decides whether a removal event may delete the destination object.
    ///
    /// No recorded linkage, or a linkage matching this event's source
    /// version, allows the delete. A differing linkage means a newer creation
    /// overwrote the destination after this removal's source version was
    /// deleted upstream. An unreadable tag set is treated as absent: the
    /// policy biases toward convergence over leaking untracked copies.
    async fn removal_decision(&self, plan: &MovePlan) -> RemovalDecision {
        let tags = match self
            .store
            .get_tags(&plan.destination_bucket, &plan.destination_key)
            .await
        {
            Ok(tags) => tags,
            Err(e) => {
                tracing::warn!(error = %e, "tag read failed; treating tags as absent");
                None
            }
        };

        match tags.as_ref().and_then(tags::decode) {
            None => RemovalDecision::Delete,
            Some(recorded) if recorded == plan.source_version_id => RemovalDecision::Delete,
            Some(recorded) => RemovalDecision::Skip {
                recorded: recorded.to_string(),
            },
        }
    }

    /// Removes the transport message once the outcome is definitive.
    ///
    /// Failed outcomes are passed through unacknowledged so the transport
    /// redelivers them. An acknowledgement failure itself marks the outcome
    /// failed: the message survives and re-runs an already-decided, idempotent
    /// operation.
    async fn acknowledge(&self, outcome: MoveOutcome) -> MoveOutcome {
        if outcome.needs_retry() {
            return outcome;
        }
        match self.transport.acknowledge(&outcome.ack_token).await {
            Ok(()) => {
                tracing::debug!(ack_token = %outcome.ack_token, "removed transport message");
                outcome
            }
            Err(e) => {
                tracing::warn!(error = %e, ack_token = %outcome.ack_token, "could not remove transport message");
                outcome.into_failed(format!("acknowledge failed: {e}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chrono::Utc;
    use objshift_core::{MemoryObjectStore, MemoryTransport, TagSet};

    const SRC: &str = "src-bucket";
    const DST: &str = "dst-bucket";

    struct Fixture {
        store: Arc<MemoryObjectStore>,
        transport: Arc<MemoryTransport>,
        mover: Mover,
    }

    fn fixture(mapping_spec: &str) -> Fixture {
        let store = Arc::new(MemoryObjectStore::new());
        store.enable_versioning(SRC).unwrap();
        store.create_bucket(DST).unwrap();
        let transport = Arc::new(MemoryTransport::new());
        let mover = Mover::new(
            Arc::clone(&store) as Arc<dyn ObjectStore>,
            Arc::clone(&transport) as Arc<dyn Transport>,
            EngineConfig::new(DST, mapping_spec),
        );
        Fixture {
            store,
            transport,
            mover,
        }
    }

    fn created(key: &str, version_id: &str) -> ChangeEvent {
        ChangeEvent {
            kind: ChangeKind::Created,
            bucket: SRC.into(),
            key: key.into(),
            version_id: version_id.into(),
            event_time: Utc::now(),
        }
    }

    fn removed(key: &str, version_id: &str) -> ChangeEvent {
        ChangeEvent {
            kind: ChangeKind::Removed,
            ..created(key, version_id)
        }
    }

    #[tokio::test]
    async fn creation_copies_deletes_tags_and_acks() {
        let fx = fixture("archive");
        let version = fx
            .store
            .put_object(SRC, "a/b.json", Bytes::from("payload"))
            .unwrap();

        let outcome = fx
            .mover
            .handle_event("token-1", created("a/b.json", &version))
            .await;

        assert!(outcome.succeeded);
        assert_eq!(outcome.destination_key, "archive/a/b.json");
        assert!(outcome.deleted_source_version_id.is_some());
        assert_eq!(
            fx.store.object_body(DST, "archive/a/b.json").unwrap(),
            Some(Bytes::from("payload"))
        );
        assert!(fx.store.has_delete_marker(SRC, "a/b.json").unwrap());
        let tags = fx.store.tags_of(DST, "archive/a/b.json").unwrap().unwrap();
        assert_eq!(
            tags.get(tags::TAG_DELETE_VERSION_ID),
            outcome.deleted_source_version_id.as_ref()
        );
        assert_eq!(
            tags.get(tags::TAG_ORIGINAL_KEY).map(String::as_str),
            Some("a/b.json")
        );
        assert!(fx.transport.was_acknowledged("token-1").unwrap());
    }

    #[tokio::test]
    async fn creation_rerun_is_idempotent() {
        let fx = fixture("archive");
        let version = fx
            .store
            .put_object(SRC, "a/b.json", Bytes::from("payload"))
            .unwrap();

        let first = fx
            .mover
            .handle_event("token-1", created("a/b.json", &version))
            .await;
        let second = fx
            .mover
            .handle_event("token-2", created("a/b.json", &version))
            .await;

        assert!(first.succeeded);
        assert!(second.succeeded);
        assert_eq!(
            fx.store.object_body(DST, "archive/a/b.json").unwrap(),
            Some(Bytes::from("payload"))
        );
    }

    #[tokio::test]
    async fn copy_failure_is_terminal_and_unacked() {
        let fx = fixture("archive");

        let outcome = fx
            .mover
            .handle_event("token-1", created("missing.json", "V1"))
            .await;

        assert!(outcome.needs_retry());
        assert!(outcome.error_detail.unwrap().contains("copy failed"));
        assert!(!fx.transport.was_acknowledged("token-1").unwrap());
        // Nothing was deleted at the source.
        assert!(!fx.store.has_delete_marker(SRC, "missing.json").unwrap());
    }

    #[tokio::test]
    async fn unversioned_source_skips_tagging() {
        let fx = fixture("archive");
        let store = Arc::new(MemoryObjectStore::new());
        store.create_bucket(DST).unwrap();
        let version = store
            .put_object(SRC, "a.json", Bytes::from("payload"))
            .unwrap();
        let mover = Mover::new(
            Arc::clone(&store) as Arc<dyn ObjectStore>,
            Arc::clone(&fx.transport) as Arc<dyn Transport>,
            EngineConfig::new(DST, "archive"),
        );

        let outcome = mover.handle_event("token-1", created("a.json", &version)).await;

        assert!(outcome.succeeded);
        assert!(outcome.deleted_source_version_id.is_none());
        let tags = store.tags_of(DST, "archive/a.json").unwrap().unwrap();
        assert!(tags.is_empty());
        assert!(fx.transport.was_acknowledged("token-1").unwrap());
    }

    #[tokio::test]
    async fn tagging_failure_fails_event_after_move_completed() {
        let fx = fixture("archive");
        let version = fx
            .store
            .put_object(SRC, "a.json", Bytes::from("payload"))
            .unwrap();
        fx.store.fail_tag_writes(DST, "archive/a.json").unwrap();

        let outcome = fx
            .mover
            .handle_event("token-1", created("a.json", &version))
            .await;

        assert!(outcome.needs_retry());
        assert!(outcome.error_detail.unwrap().contains("tagging failed"));
        // The move itself already happened.
        assert_eq!(
            fx.store.object_body(DST, "archive/a.json").unwrap(),
            Some(Bytes::from("payload"))
        );
        assert!(fx.store.has_delete_marker(SRC, "a.json").unwrap());
        assert!(!fx.transport.was_acknowledged("token-1").unwrap());
    }

    #[tokio::test]
    async fn fresh_removal_deletes_destination_and_acks() {
        let fx = fixture("archive");
        fx.store
            .put_object(DST, "archive/a.json", Bytes::from("moved"))
            .unwrap();
        let mut tags = TagSet::new();
        tags.insert(tags::TAG_DELETE_VERSION_ID.into(), "V1".into());
        fx.store
            .put_tags(DST, "archive/a.json", tags)
            .await
            .unwrap();

        let outcome = fx.mover.handle_event("token-1", removed("a.json", "V1")).await;

        assert!(outcome.succeeded);
        assert_eq!(fx.store.object_body(DST, "archive/a.json").unwrap(), None);
        assert!(fx.transport.was_acknowledged("token-1").unwrap());
    }

    #[tokio::test]
    async fn stale_removal_skips_delete_but_acks() {
        let fx = fixture("archive");
        fx.store
            .put_object(DST, "archive/a.json", Bytes::from("newer"))
            .unwrap();
        let mut tags = TagSet::new();
        tags.insert(tags::TAG_DELETE_VERSION_ID.into(), "V1".into());
        fx.store
            .put_tags(DST, "archive/a.json", tags)
            .await
            .unwrap();

        let outcome = fx.mover.handle_event("token-1", removed("a.json", "V2")).await;

        assert!(outcome.succeeded);
        assert_eq!(
            fx.store.object_body(DST, "archive/a.json").unwrap(),
            Some(Bytes::from("newer"))
        );
        assert!(fx.transport.was_acknowledged("token-1").unwrap());
    }

    #[tokio::test]
    async fn untagged_removal_deletes_destination() {
        let fx = fixture("archive");
        fx.store
            .put_object(DST, "archive/a.json", Bytes::from("moved"))
            .unwrap();

        let outcome = fx.mover.handle_event("token-1", removed("a.json", "V2")).await;

        assert!(outcome.succeeded);
        assert_eq!(fx.store.object_body(DST, "archive/a.json").unwrap(), None);
        assert!(fx.transport.was_acknowledged("token-1").unwrap());
    }

    #[tokio::test]
    async fn unreadable_tags_are_treated_as_absent() {
        let fx = fixture("archive");
        fx.store
            .put_object(DST, "archive/a.json", Bytes::from("moved"))
            .unwrap();
        fx.store.fail_tag_reads(DST, "archive/a.json").unwrap();

        let outcome = fx.mover.handle_event("token-1", removed("a.json", "V2")).await;

        assert!(outcome.succeeded);
        assert_eq!(fx.store.object_body(DST, "archive/a.json").unwrap(), None);
        assert!(fx.transport.was_acknowledged("token-1").unwrap());
    }

    #[tokio::test]
    async fn ack_failure_surfaces_as_failed_outcome() {
        let fx = fixture("archive");
        let version = fx
            .store
            .put_object(SRC, "a.json", Bytes::from("payload"))
            .unwrap();
        fx.transport.fail_token("token-1").unwrap();

        let outcome = fx
            .mover
            .handle_event("token-1", created("a.json", &version))
            .await;

        assert!(outcome.needs_retry());
        assert!(outcome.error_detail.unwrap().contains("acknowledge failed"));
        // The move itself completed and a redelivery will re-run it safely.
        assert_eq!(
            fx.store.object_body(DST, "archive/a.json").unwrap(),
            Some(Bytes::from("payload"))
        );
    }
}
