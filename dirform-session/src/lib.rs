//! Edit sessions for directory objects.
//!
//! An [`EditSession`] binds rendered templates to one remote object and
//! keeps them consistent with the backend:
//!
//! - **Binding**: [`BindingController`] seeds widgets from the model, sends
//!   user edits as attribute updates and tracks validity and `blockedBy`
//!   state.
//! - **Extensions**: [`ExtensionManager`] plans and applies extension
//!   changes with their dependency closure.
//! - **Reconciliation**: [`Reconciler`] turns a backend diff into silent
//!   updates, a [`MergeDialog`], or a forced close.
//!
//! All backend traffic goes through one [`CallQueue`] per client, which a
//! [`SessionHub`] shares between sessions while demultiplexing push events
//! by object id.

pub mod binding;
pub mod channel;
mod config;
mod error;
pub mod extensions;
mod hub;
mod notice;
pub mod reconcile;
mod session;
mod templates;

pub use binding::{BindingController, WidgetRef};
pub use channel::{CallQueue, Reauthenticator, RemoteChannel};
pub use config::SessionConfig;
pub use error::{
    RpcError, RpcErrorKind, SessionError, SessionResult, ATTRIBUTE_CHECK_FAILED,
    ATTRIBUTE_MANDATORY, AUTHORIZATION_CODES, TRANSPORT_FAILURE,
};
pub use extensions::{ApplyOutcome, ExtensionManager, ExtensionRequest};
pub use hub::SessionHub;
pub use notice::{Notice, NoticeLevel};
pub use reconcile::{MergeDialog, MergePlan, MergeRow, MergeSubject, Reconciler, Side};
pub use session::{CommitOutcome, EditSession, EventGuard, EventOutcome, SessionEnv};
pub use templates::{TemplateCatalog, TemplateSource};

/// Rendered contexts of one session, keyed by context name.
pub type Contexts = indexmap::IndexMap<String, dirform_template::Context>;
