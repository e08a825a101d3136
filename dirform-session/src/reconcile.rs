//! Reconciliation of concurrent backend changes.
//!
//! A backend diff is split three ways: attribute changes nobody is looking
//! at (applied silently), conflicts with bound widgets (one merge row each),
//! and extension state differences (one toggle row each). Rows gated by a
//! `blockedBy` rule are linked so a choice on one side of the link carries
//! over to the other.

use crate::binding::BindingController;
use crate::error::{SessionError, SessionResult};
use crate::Contexts;
use dirform_model::{AttributeChange, ObjectDiff, RemoteObjectProxy, Values};
use dirform_template::MergeWidget;
use std::collections::VecDeque;
use tracing::{debug, info};

/// Which version of a conflicting value to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Local,
    Remote,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MergeSubject {
    Attribute {
        attribute: String,
        /// Context of the widget the local value came from.
        context: String,
        local: Values,
        remote: Values,
        local_view: MergeWidget,
        remote_view: MergeWidget,
    },
    Extension {
        name: String,
        /// True if the backend has the extension and the editor does not.
        remote_active: bool,
    },
}

/// One row of the merge dialog.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeRow {
    pub label: String,
    pub subject: MergeSubject,
    choice: Option<Side>,
    links: Vec<usize>,
}

impl MergeRow {
    pub fn choice(&self) -> Option<Side> {
        self.choice
    }

    /// Rows bound to this one through a `blockedBy` rule.
    pub fn links(&self) -> &[usize] {
        &self.links
    }

    pub fn attribute(&self) -> Option<&str> {
        match &self.subject {
            MergeSubject::Attribute { attribute, .. } => Some(attribute),
            MergeSubject::Extension { .. } => None,
        }
    }
}

/// The pending merge of one object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeDialog {
    rows: Vec<MergeRow>,
}

impl MergeDialog {
    pub fn rows(&self) -> &[MergeRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_for(&self, attribute: &str) -> Option<usize> {
        self.rows.iter().position(|r| r.attribute() == Some(attribute))
    }

    pub fn row_for_extension(&self, extension: &str) -> Option<usize> {
        self.rows.iter().position(|r| {
            matches!(&r.subject, MergeSubject::Extension { name, .. } if name == extension)
        })
    }

    /// Chooses `side` for `row` and every row linked to it, directly or
    /// transitively. Returns the rows that were set.
    pub fn choose(&mut self, row: usize, side: Side) -> SessionResult<Vec<usize>> {
        if row >= self.rows.len() {
            return Err(SessionError::NoSuchRow(row));
        }
        let mut touched = Vec::new();
        let mut queue = VecDeque::from([row]);
        while let Some(current) = queue.pop_front() {
            if touched.contains(&current) {
                continue;
            }
            touched.push(current);
            self.rows[current].choice = Some(side);
            queue.extend(self.rows[current].links.iter().copied());
        }
        Ok(touched)
    }

    /// Chooses `side` for every row.
    pub fn choose_all(&mut self, side: Side) {
        for row in &mut self.rows {
            row.choice = Some(side);
        }
    }

    /// Number of rows still without a choice.
    pub fn unresolved(&self) -> usize {
        self.rows.iter().filter(|r| r.choice.is_none()).count()
    }

    fn push(&mut self, label: String, subject: MergeSubject) -> usize {
        self.rows.push(MergeRow {
            label,
            subject,
            choice: None,
            links: Vec::new(),
        });
        self.rows.len() - 1
    }

    fn link(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        if !self.rows[a].links.contains(&b) {
            self.rows[a].links.push(b);
        }
        if !self.rows[b].links.contains(&a) {
            self.rows[b].links.push(a);
        }
    }
}

/// How a diff is to be handled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergePlan {
    /// Extensions removed under a tab that is still open.
    pub unmergeable: Vec<String>,
    /// Changes applied to the model without asking.
    pub silent: Vec<AttributeChange>,
    pub dialog: MergeDialog,
}

/// Holds at most one pending merge dialog per object.
#[derive(Debug, Default)]
pub struct Reconciler {
    pending: Option<MergeDialog>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifies every difference in `diff` against the current state.
    pub fn plan(
        diff: &ObjectDiff,
        object: &RemoteObjectProxy,
        contexts: &Contexts,
        binding: &BindingController,
    ) -> MergePlan {
        let mut plan = MergePlan {
            unmergeable: diff
                .extensions
                .removed
                .iter()
                .filter(|e| contexts.contains_key(e.as_str()))
                .cloned()
                .collect(),
            ..MergePlan::default()
        };
        if !plan.unmergeable.is_empty() {
            return plan;
        }

        for change in diff.attribute_changes() {
            let bound = binding.widgets_for(&change.name).iter().find_map(|r| {
                let context = contexts.get(&r.context)?;
                Some((r, context, context.widget(&r.widget)?))
            });
            let Some((widget_ref, context, widget)) = bound else {
                info!(attribute = %change.name, "applying unbound backend change without prompting");
                plan.silent.push(change);
                continue;
            };
            let local = widget.value().to_vec();
            if local == change.remote {
                plan.silent.push(change);
                continue;
            }
            let label = context.display_label(&change.name);
            plan.dialog.push(
                label,
                MergeSubject::Attribute {
                    attribute: change.name.clone(),
                    context: widget_ref.context.clone(),
                    local_view: widget.merge_widget(&local),
                    remote_view: widget.merge_widget(&change.remote),
                    local,
                    remote: change.remote,
                },
            );
        }

        for name in &diff.extensions.add {
            if !object.is_active(name) {
                plan.dialog.push(
                    name.clone(),
                    MergeSubject::Extension {
                        name: name.clone(),
                        remote_active: true,
                    },
                );
            }
        }
        for name in &diff.extensions.removed {
            if object.is_active(name) {
                plan.dialog.push(
                    name.clone(),
                    MergeSubject::Extension {
                        name: name.clone(),
                        remote_active: false,
                    },
                );
            }
        }

        link_gated_rows(&mut plan.dialog, diff, contexts, binding);
        plan
    }

    /// Installs `dialog` as the pending merge, replacing any earlier one.
    pub fn open(&mut self, dialog: MergeDialog) {
        if self.pending.replace(dialog).is_some() {
            debug!("replacing pending merge dialog");
        }
    }

    pub fn pending(&self) -> Option<&MergeDialog> {
        self.pending.as_ref()
    }

    pub fn pending_mut(&mut self) -> Option<&mut MergeDialog> {
        self.pending.as_mut()
    }

    pub fn take(&mut self) -> Option<MergeDialog> {
        self.pending.take()
    }

    /// Drops the pending dialog. Returns true if there was one.
    pub fn abort(&mut self) -> bool {
        let had = self.pending.take().is_some();
        if had {
            debug!("aborting pending merge");
        }
        had
    }
}

/// Links every attribute row to the rows of the attributes gating it, from
/// the diff's `blocked_by` section and the widget's own rules.
fn link_gated_rows(
    dialog: &mut MergeDialog,
    diff: &ObjectDiff,
    contexts: &Contexts,
    binding: &BindingController,
) {
    let mut pairs = Vec::new();
    for (index, row) in dialog.rows.iter().enumerate() {
        let Some(attribute) = row.attribute() else {
            continue;
        };
        let widget_rules = binding.widgets_for(attribute).iter().flat_map(|r| {
            contexts
                .get(&r.context)
                .and_then(|c| c.widget(&r.widget))
                .map(|w| w.block_rules.clone())
                .unwrap_or_default()
        });
        let gates: Vec<String> = diff
            .rules_for(attribute)
            .iter()
            .cloned()
            .chain(widget_rules)
            .map(|rule| rule.name)
            .collect();
        for gate in gates {
            if let Some(other) = dialog.row_for(&gate) {
                pairs.push((index, other));
            }
        }
    }
    for (a, b) in pairs {
        dialog.link(a, b);
    }
}
