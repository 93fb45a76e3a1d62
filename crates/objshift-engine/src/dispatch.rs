//! Batch dispatcher: fans delivered transport messages out to the mover.
//!
//! A batch is never an atomic unit. Each message unpacks into zero or more
//! change events, every event runs concurrently to its own definitive
//! outcome, and acknowledgement is per event. One event's failure neither
//! blocks nor rolls back the others; the join preserves every task's outcome
//! instead of short-circuiting.

use futures::future::join_all;

use crate::event::{QueueMessage, decode_events};
use crate::mover::Mover;
use crate::outcome::MoveOutcome;

/// Dispatches batches of transport messages to the move orchestrator.
pub struct Dispatcher {
    mover: Mover,
}

impl Dispatcher {
    /// Creates a dispatcher around a mover.
    #[must_use]
    pub fn new(mover: Mover) -> Self {
        Self { mover }
    }

    /// Processes one delivered batch, returning an outcome per event.
    ///
    /// Messages whose bodies carry no recognizable events contribute no
    /// outcomes and are left untouched for the transport to expire. The
    /// caller partitions the returned outcomes into "done" and "retry" via
    /// [`MoveOutcome::needs_retry`].
    pub async fn process(&self, batch: &[QueueMessage]) -> Vec<MoveOutcome> {
        let tasks: Vec<_> = batch
            .iter()
            .flat_map(|message| {
                decode_events(&message.body)
                    .into_iter()
                    .map(move |event| self.mover.handle_event(&message.ack_token, event))
                    .collect::<Vec<_>>()
            })
            .collect();

        tracing::debug!(
            messages = batch.len(),
            events = tasks.len(),
            "dispatching batch"
        );
        join_all(tasks).await
    }
}
