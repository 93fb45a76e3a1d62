//! # objshift-core
//!
//! Shared primitives for the objshift migration engine.
//!
//! This crate defines the seams between the migration engine and its external
//! collaborators:
//!
//! - **Storage Capability**: the narrow object-store contract the engine
//!   consumes (version-pinned copy, delete with marker visibility, tagging)
//! - **Transport Capability**: acknowledgement of delivered notification
//!   messages
//! - **Error Types**: shared error definitions and result types
//! - **Observability**: structured logging setup and span helpers
//!
//! Production implementations of the capability traits live outside this
//! workspace (cloud SDK clients); the in-memory implementations here back the
//! engine's tests.
//!
//! ## Example
//!
//! ```rust
//! use objshift_core::prelude::*;
//! use bytes::Bytes;
//!
//! let store = MemoryObjectStore::new();
//! let version = store.put_object("src", "a.json", Bytes::from("body")).unwrap();
//! assert!(!version.is_empty());
//! ```

pub mod error;
pub mod observability;
pub mod storage;
pub mod transport;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use objshift_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::storage::{
        CopyOutcome, DeleteOutcome, MemoryObjectStore, ObjectStore, TagSet,
    };
    pub use crate::transport::{MemoryTransport, Transport};
}

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use observability::{LogFormat, init_logging};
pub use storage::{CopyOutcome, DeleteOutcome, MemoryObjectStore, ObjectStore, TagSet};
pub use transport::{MemoryTransport, Transport};
