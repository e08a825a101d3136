//! Error types for edit sessions.

use dirform_model::ModelError;
use dirform_template::TemplateError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Error code for a value the backend rejected.
pub const ATTRIBUTE_CHECK_FAILED: &str = "ATTRIBUTE_CHECK_FAILED";
/// Error code for a mandatory attribute left empty.
pub const ATTRIBUTE_MANDATORY: &str = "ATTRIBUTE_MANDATORY";
/// Error code the channel uses for transport or protocol failures.
pub const TRANSPORT_FAILURE: &str = "TRANSPORT_FAILURE";
/// Error codes that call for re-authentication.
pub const AUTHORIZATION_CODES: &[&str] = &["NOT_AUTHENTICATED", "SESSION_EXPIRED"];

/// Error payload returned by a remote call.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct RpcError {
    pub code: String,
    pub message: String,
    /// The attribute the error is about, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// How a caller should react to an [`RpcError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcErrorKind {
    /// Generic failure; may be retried by re-queueing.
    Transport,
    /// Re-authenticate, then replay the call.
    Authorization,
    /// Belongs to one attribute; shown inline on its widget.
    Attribute,
    Other,
}

impl RpcError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            topic: None,
            details: None,
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(TRANSPORT_FAILURE, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(AUTHORIZATION_CODES[0], "authentication required")
    }

    /// An attribute check failure for `attribute`.
    pub fn attribute(attribute: &str, message: impl Into<String>) -> Self {
        Self::new(ATTRIBUTE_CHECK_FAILED, message).with_topic(attribute)
    }

    pub fn with_topic(mut self, topic: &str) -> Self {
        self.topic = Some(topic.to_string());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Parses a wire error object.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn kind(&self) -> RpcErrorKind {
        if self.code == TRANSPORT_FAILURE {
            RpcErrorKind::Transport
        } else if AUTHORIZATION_CODES.contains(&self.code.as_str()) {
            RpcErrorKind::Authorization
        } else if self.code == ATTRIBUTE_CHECK_FAILED
            || self.code == ATTRIBUTE_MANDATORY
            || self.topic.is_some()
        {
            RpcErrorKind::Attribute
        } else {
            RpcErrorKind::Other
        }
    }
}

/// Errors that can occur in an edit session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A remote call failed.
    #[error("{method} failed: {source}")]
    Rpc {
        method: String,
        #[source]
        source: RpcError,
    },

    /// The backend changed the object in a way no merge can reconcile.
    #[error("object cannot be merged: {0}")]
    Unmergeable(String),

    /// The session was closed.
    #[error("session is closed")]
    Closed,

    /// Local validation failed; nothing was sent.
    #[error("form is invalid: {}", .0.join(", "))]
    Invalid(Vec<String>),

    /// A binding refers to a missing widget or attribute.
    #[error("binding error: {0}")]
    Binding(String),

    #[error("unknown extension: {0}")]
    UnknownExtension(String),

    /// No descriptor is available for a base type.
    #[error("no template for {0}")]
    MissingTemplate(String),

    /// The merge dialog still has rows without a choice.
    #[error("{0} merge conflict(s) still unresolved")]
    Unresolved(usize),

    #[error("no merge row {0}")]
    NoSuchRow(usize),

    #[error("nothing pending")]
    NothingPending,

    #[error("invalid push event: {0}")]
    Event(#[from] dirform_types::Error),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SessionError {
    pub(crate) fn rpc(method: &str, source: RpcError) -> Self {
        Self::Rpc {
            method: method.to_string(),
            source,
        }
    }

    /// The remote error behind this failure, if any.
    pub fn rpc_error(&self) -> Option<&RpcError> {
        match self {
            Self::Rpc { source, .. } => Some(source),
            _ => None,
        }
    }
}
