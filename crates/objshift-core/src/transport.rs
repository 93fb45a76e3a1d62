//! Notification transport capability and in-memory implementation.
//!
//! The transport delivers batches of opaque messages and redelivers any
//! message that is not acknowledged, per its own retry/backoff and
//! dead-letter policy. The engine only ever acknowledges; delivery happens
//! outside this crate.

use std::collections::HashSet;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use crate::error::{Error, Result};

/// Transport capability consumed by the migration engine.
///
/// Acknowledging a message removes it from the transport so it will not be
/// redelivered. Leaving a message unacknowledged is the engine's retry
/// mechanism.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Acknowledges (removes) the message identified by `ack_token`.
    async fn acknowledge(&self, ack_token: &str) -> Result<()>;
}

#[derive(Debug, Default)]
struct TransportState {
    acknowledged: Vec<String>,
    fail_tokens: HashSet<String>,
}

/// In-memory transport for testing.
///
/// Records acknowledged tokens for assertions and can be told to reject
/// specific tokens to simulate acknowledgement failures.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    state: RwLock<TransportState>,
}

/// Converts a lock poison error to an internal error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::Internal {
        message: "transport lock poisoned".into(),
    }
}

impl MemoryTransport {
    /// Creates a new empty transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes acknowledgement of `ack_token` fail with a transport error.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn fail_token(&self, ack_token: &str) -> Result<()> {
        let mut state = self.state.write().map_err(poison_err)?;
        state.fail_tokens.insert(ack_token.to_string());
        Ok(())
    }

    /// Returns all acknowledged tokens, in acknowledgement order.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn acknowledged(&self) -> Result<Vec<String>> {
        let state = self.state.read().map_err(poison_err)?;
        Ok(state.acknowledged.clone())
    }

    /// Returns true if `ack_token` has been acknowledged.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn was_acknowledged(&self, ack_token: &str) -> Result<bool> {
        let state = self.state.read().map_err(poison_err)?;
        Ok(state.acknowledged.iter().any(|t| t == ack_token))
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn acknowledge(&self, ack_token: &str) -> Result<()> {
        let mut state = self.state.write().map_err(poison_err)?;
        if state.fail_tokens.contains(ack_token) {
            return Err(Error::transport(format!(
                "could not remove message for {ack_token}"
            )));
        }
        state.acknowledged.push(ack_token.to_string());
        drop(state);
        Ok(())
    }
}
