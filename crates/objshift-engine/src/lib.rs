//! # objshift-engine
//!
//! Notification-driven object migration engine.
//!
//! objshift moves objects between two object-storage locations in response
//! to change notifications, rewriting each object's key through a
//! configurable mapping rule. The two locations stay eventually consistent
//! under out-of-order, duplicated, and batched notification delivery:
//!
//! - **Key Mapping**: date-anchored, regex rule list, or plain-prefix specs
//!   translate source keys to destination keys
//! - **Move Orchestration**: creation events run copy → delete source → tag
//!   destination → acknowledge; removal events reconcile against the
//!   destination's provenance tags before deleting
//! - **Provenance Tags**: destination-side metadata recording which source
//!   deletion produced the current destination content, used to detect
//!   removal notifications that a newer creation has superseded
//! - **Batch Dispatch**: every event in a delivered batch runs concurrently
//!   to its own outcome; acknowledgement is per event, never per batch
//!
//! Storage and transport are consumed through the capability traits in
//! `objshift-core`; production implementations live outside this workspace.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use objshift_core::{MemoryObjectStore, MemoryTransport, ObjectStore, Transport};
//! use objshift_engine::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store = Arc::new(MemoryObjectStore::new());
//! let transport = Arc::new(MemoryTransport::new());
//! let config = EngineConfig::new("archive-bucket", "d=${date}");
//! let mover = Mover::new(
//!     store as Arc<dyn ObjectStore>,
//!     transport as Arc<dyn Transport>,
//!     config,
//! );
//! let dispatcher = Dispatcher::new(mover);
//!
//! let outcomes = dispatcher.process(&[]).await;
//! assert!(outcomes.is_empty());
//! # }
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod mapping;
pub mod mover;
pub mod outcome;
pub mod plan;
pub mod tags;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::dispatch::Dispatcher;
    pub use crate::error::{Error, Result};
    pub use crate::event::{ChangeEvent, ChangeKind, QueueMessage, decode_events};
    pub use crate::mapping::KeyMapper;
    pub use crate::mover::Mover;
    pub use crate::outcome::MoveOutcome;
    pub use crate::plan::MovePlan;
}

// Re-export key types at crate root for ergonomics
pub use config::EngineConfig;
pub use dispatch::Dispatcher;
pub use error::{Error, Result};
pub use event::{ChangeEvent, ChangeKind, QueueMessage, decode_events};
pub use mapping::KeyMapper;
pub use mover::Mover;
pub use outcome::MoveOutcome;
pub use plan::MovePlan;
