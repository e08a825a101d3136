//! Directory object model for dirform.
//!
//! Defines the data the editor works on:
//! - [`RemoteObjectProxy`]: one open directory object (dn, base type,
//!   extensions, attribute values, attribute descriptors)
//! - [`AttributeDescriptor`]: per-attribute metadata and the
//!   [`BlockRule`]s that conditionally disable a widget
//! - [`ExtensionDependencyGraph`]: which optional extensions require which,
//!   with the ordering and closure queries used to enable/disable them
//! - [`ObjectDiff`]: the structured diff the backend reports after a
//!   concurrent modification
//!
//! Nothing here performs I/O. The session layer feeds these types from
//! remote calls and pushes edits back.

mod descriptor;
mod diff;
mod extension;
mod object;

pub use descriptor::{values_match, AttributeDescriptor, AttributeType, BlockRule, Values};
pub use diff::{AttributeChange, AttributeDiff, ChangeKind, ExtensionDiff, ObjectDiff};
pub use extension::{Direction, ExtensionDependencyGraph, ExtensionPlan};
pub use object::RemoteObjectProxy;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while building or mutating the object model.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unknown attribute: {0}")]
    UnknownAttribute(String),

    #[error("unknown extension: {0}")]
    UnknownExtension(String),

    #[error("attribute '{0}' is single-valued but got {1} values")]
    TooManyValues(String, usize),
}
