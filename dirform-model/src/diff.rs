//! Structured diff reported by `diffObject`.
//!
//! Field names are fixed by the backend contract:
//! `attributes.changed/added/removed`, `extensions.add/removed`, `blocked_by`.

use crate::descriptor::{BlockRule, Values};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectDiff {
    pub attributes: AttributeDiff,
    pub extensions: ExtensionDiff,
    /// Blocking rules for the attributes involved, keyed by gated attribute.
    pub blocked_by: IndexMap<String, Vec<BlockRule>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeDiff {
    /// Attribute → remote values.
    pub changed: IndexMap<String, Values>,
    pub added: IndexMap<String, Values>,
    pub removed: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtensionDiff {
    /// Extensions the backend has that the edited object lacks.
    pub add: Vec<String>,
    /// Extensions the edited object has that the backend dropped.
    pub removed: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Changed,
    Added,
    Removed,
}

/// One attribute-level difference with the backend's current value.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeChange {
    pub name: String,
    pub kind: ChangeKind,
    /// Empty for removed attributes.
    pub remote: Values,
}

impl ObjectDiff {
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.extensions.is_empty()
    }

    /// Flattens the attribute section: changed, then added, then removed.
    pub fn attribute_changes(&self) -> Vec<AttributeChange> {
        let changed = self.attributes.changed.iter().map(|(name, values)| AttributeChange {
            name: name.clone(),
            kind: ChangeKind::Changed,
            remote: values.clone(),
        });
        let added = self.attributes.added.iter().map(|(name, values)| AttributeChange {
            name: name.clone(),
            kind: ChangeKind::Added,
            remote: values.clone(),
        });
        let removed = self.attributes.removed.iter().map(|name| AttributeChange {
            name: name.clone(),
            kind: ChangeKind::Removed,
            remote: Vec::new(),
        });
        changed.chain(added).chain(removed).collect()
    }

    /// Blocking rules for `attribute`, if the diff carries any.
    pub fn rules_for(&self, attribute: &str) -> &[BlockRule] {
        self.blocked_by
            .get(attribute)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl AttributeDiff {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.added.is_empty() && self.removed.is_empty()
    }
}

impl ExtensionDiff {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.removed.is_empty()
    }
}
