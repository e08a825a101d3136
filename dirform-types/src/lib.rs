//! Core type definitions for dirform.
//!
//! This crate defines the fundamental types shared by every layer of the
//! object editor:
//! - Object and session identifiers
//! - Push events delivered by the backend for open objects
//!
//! Directory-specific structures (attribute descriptors, extension graphs,
//! diffs) live in `dirform-model`.

mod event;
mod ids;

pub use event::{ClosingState, PushEvent, PushEventKind};
pub use ids::{ObjectId, SessionId};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("invalid event: {0}")]
    InvalidEvent(String),
}
