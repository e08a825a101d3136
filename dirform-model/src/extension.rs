//! Extension dependency graph.
//!
//! Maps each extension to the extensions it requires. The graph is acyclic
//! by contract; a cycle does not loop forever (every walk marks visited
//! nodes) but the resulting order is unspecified.
//!
//! All queries return extensions in *dependency order*: an extension always
//! comes after everything it (transitively) requires. Enabling walks that
//! order forwards, disabling walks it backwards.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// Extension name → names of the extensions it requires.
///
/// Keeps the backend's key order; ties in dependency order are broken by
/// first discovery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtensionDependencyGraph {
    requires: IndexMap<String, Vec<String>>,
}

impl ExtensionDependencyGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `extension` with its direct requirements.
    pub fn insert(&mut self, extension: &str, requires: &[&str]) {
        self.requires.insert(
            extension.to_string(),
            requires.iter().map(|r| r.to_string()).collect(),
        );
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, extension: &str, requires: &[&str]) -> Self {
        self.insert(extension, requires);
        self
    }

    /// Direct requirements of `extension` (empty if unknown).
    pub fn requires(&self, extension: &str) -> &[String] {
        self.requires
            .get(extension)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Returns true if the graph declares `extension`.
    pub fn contains(&self, extension: &str) -> bool {
        self.requires.contains_key(extension)
    }

    /// All declared extensions in declaration order.
    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.requires.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.requires.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requires.is_empty()
    }

    /// Every extension, each placed after all of its transitive requirements.
    ///
    /// Post-order depth-first walk over the declared extensions; duplicates
    /// are dropped and first-discovery order is kept. Requirements that are
    /// not themselves declared are emitted as leaves.
    pub fn ordered_extensions(&self) -> Vec<String> {
        let mut out = IndexSet::new();
        for name in self.requires.keys() {
            self.visit(name, &mut out);
        }
        out.into_iter().collect()
    }

    fn visit(&self, name: &str, out: &mut IndexSet<String>) {
        let mut visiting = IndexSet::new();
        self.visit_inner(name, out, &mut visiting);
    }

    fn visit_inner(&self, name: &str, out: &mut IndexSet<String>, visiting: &mut IndexSet<String>) {
        if out.contains(name) || !visiting.insert(name.to_string()) {
            return;
        }
        for dep in self.requires(name) {
            self.visit_inner(dep, out, visiting);
        }
        out.insert(name.to_string());
    }

    /// Transitive requirements of `extension`, excluding itself, in
    /// dependency order.
    pub fn closure(&self, extension: &str) -> Vec<String> {
        let mut out = IndexSet::new();
        self.visit(extension, &mut out);
        out.shift_remove(extension);
        out.into_iter().collect()
    }

    /// Extensions that transitively require `extension`, in dependency
    /// order (so the last one depends on the most).
    pub fn dependents(&self, extension: &str) -> Vec<String> {
        self.ordered_extensions()
            .into_iter()
            .filter(|candidate| {
                candidate != extension && self.closure(candidate).iter().any(|d| d == extension)
            })
            .collect()
    }

    /// Requirements of `extension` that are not yet active.
    pub fn missing_dependencies(
        &self,
        extension: &str,
        is_active: impl Fn(&str) -> bool,
    ) -> Vec<String> {
        self.closure(extension)
            .into_iter()
            .filter(|dep| !is_active(dep))
            .collect()
    }

    /// Active extensions that would break if `extension` were retracted.
    pub fn existing_dependencies(
        &self,
        extension: &str,
        is_active: impl Fn(&str) -> bool,
    ) -> Vec<String> {
        self.dependents(extension)
            .into_iter()
            .filter(|dep| is_active(dep))
            .collect()
    }

    /// Returns true if some active extension requires `extension`.
    pub fn has_active_dependents(&self, extension: &str, is_active: impl Fn(&str) -> bool) -> bool {
        !self.existing_dependencies(extension, is_active).is_empty()
    }

    /// Plans activating `extension` together with its missing requirements,
    /// requirements first.
    pub fn extend_plan(&self, extension: &str, is_active: impl Fn(&str) -> bool) -> ExtensionPlan {
        let extra = self.missing_dependencies(extension, is_active);
        let mut steps = extra.clone();
        steps.push(extension.to_string());
        ExtensionPlan {
            target: extension.to_string(),
            direction: Direction::Extend,
            extra,
            steps,
        }
    }

    /// Plans retracting `extension` together with its active dependents,
    /// dependents first.
    pub fn retract_plan(&self, extension: &str, is_active: impl Fn(&str) -> bool) -> ExtensionPlan {
        let extra = self.existing_dependencies(extension, is_active);
        let mut steps = vec![extension.to_string()];
        steps.extend(extra.iter().cloned());
        steps.reverse();
        ExtensionPlan {
            target: extension.to_string(),
            direction: Direction::Retract,
            extra,
            steps,
        }
    }
}

/// Whether a plan turns extensions on or off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Extend,
    Retract,
}

/// The full set of extension changes needed to keep the active set
/// consistent when one extension is toggled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionPlan {
    /// The extension the user asked for.
    pub target: String,
    pub direction: Direction,
    /// Extensions that change in addition to `target`, in dependency order.
    pub extra: Vec<String>,
    /// Execution order, including `target`.
    pub steps: Vec<String>,
}

impl ExtensionPlan {
    /// A plan touching more than the target needs the user's confirmation.
    pub fn requires_confirmation(&self) -> bool {
        !self.extra.is_empty()
    }

    /// The plan that reverts `applied`, a prefix of this plan's steps:
    /// the opposite direction, latest step first.
    pub fn undo(&self, applied: &[String]) -> ExtensionPlan {
        let direction = match self.direction {
            Direction::Extend => Direction::Retract,
            Direction::Retract => Direction::Extend,
        };
        ExtensionPlan {
            target: self.target.clone(),
            direction,
            extra: Vec::new(),
            steps: applied.iter().rev().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_terminates() {
        let graph = ExtensionDependencyGraph::new()
            .with("A", &["B"])
            .with("B", &["A"]);
        let ordered = graph.ordered_extensions();
        assert_eq!(ordered.len(), 2);
    }

    #[test]
    fn undeclared_requirement_is_a_leaf() {
        let graph = ExtensionDependencyGraph::new().with("A", &["Z"]);
        assert_eq!(graph.ordered_extensions(), vec!["Z", "A"]);
    }
}
