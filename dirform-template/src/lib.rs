//! UI descriptor parser and widget-tree builder.
//!
//! Turns a declarative Designer-style XML descriptor into a live widget tree:
//!
//! - **Parse**: [`XmlElement`] reads the raw document with `quick-xml`.
//! - **Build**: [`TemplateBuilder`] walks layouts, widgets, spacers and
//!   properties recursively, instantiating each widget through the
//!   [`WidgetRegistry`] class table and assigning a [`Placement`] from its
//!   layout strategy.
//! - **Wire**: connections become a [`BindingTable`] (attribute ↔ widget),
//!   `buddy` properties pair labels with inputs, `blockedBy` properties
//!   become [`BlockRule`](dirform_model::BlockRule)s, actions become
//!   [`Command`]s with an optional [`Condition`].
//! - **Host**: a [`Context`] is one rendered page holding the built tree and
//!   its registries.
//!
//! # Failure policy
//!
//! Only a UI-format version mismatch (or XML that cannot be read at all)
//! fails a template. Unknown widget classes, unknown layouts, malformed
//! properties and dangling references are logged and skipped locally; the
//! rest of the template still renders.

mod binding;
mod builder;
mod command;
mod condition;
mod context;
mod layout;
mod property;
mod widget;
mod xml;

pub use binding::BindingTable;
pub use builder::{BuilderConfig, BuiltTemplate, TemplateBuilder, WidgetTree};
pub use command::Command;
pub use condition::{Condition, ConditionArg, ConditionExpr};
pub use context::Context;
pub use layout::{FormRole, LayoutKind, Placement, SizePolicy, SizePolicyKind};
pub use property::{Properties, PropertyValue, Rect};
pub use widget::{
    MergeWidget, Validity, WidgetConstructor, WidgetFlags, WidgetId, WidgetKind, WidgetNode,
    WidgetRegistry,
};
pub use xml::XmlElement;

/// Result type for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Errors that abort processing of one template.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("XML error: {0}")]
    Xml(String),

    #[error("not a UI descriptor: root element is <{0}>")]
    NotADescriptor(String),

    #[error("UI format version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: String, found: String },

    #[error("descriptor has no root widget")]
    MissingRootWidget,

    #[error("invalid condition '{input}': {reason}")]
    Condition { input: String, reason: String },
}
