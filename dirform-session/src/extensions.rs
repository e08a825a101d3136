//! Extension activation against the backend.
//!
//! Planning uses the object's [`ExtensionDependencyGraph`](dirform_model::ExtensionDependencyGraph);
//! this module stages plans that need the user's confirmation, executes
//! them step by step, and remembers which requirements were pulled in
//! automatically so they can be dropped again when their dependent goes.

use crate::channel::CallQueue;
use crate::config::SessionConfig;
use crate::error::{RpcError, SessionError, SessionResult};
use dirform_model::{Direction, ExtensionPlan, RemoteObjectProxy};
use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, info, warn};

/// What happened to an add/remove request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionRequest {
    /// Already in the requested state.
    Unchanged,
    /// Applied; the extensions that changed, in execution order.
    Applied(Vec<String>),
    /// Other extensions must change too; staged until confirmed.
    NeedsConfirmation(ExtensionPlan),
}

/// Result of executing a plan.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyOutcome {
    /// Steps the backend accepted, in order.
    pub applied: Vec<String>,
    /// The step that failed and why. Later steps were not attempted.
    pub failure: Option<(String, RpcError)>,
}

#[derive(Debug, Default)]
pub struct ExtensionManager {
    pending: Option<ExtensionPlan>,
    /// Extension → requirements activated along with it.
    auto_added: IndexMap<String, Vec<String>>,
}

impl ExtensionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plans activating `extension`; `None` if it is already active.
    pub fn plan_add(&self, object: &RemoteObjectProxy, extension: &str) -> SessionResult<Option<ExtensionPlan>> {
        ensure_known(object, extension)?;
        if object.is_active(extension) {
            return Ok(None);
        }
        Ok(Some(
            object
                .extension_deps
                .extend_plan(extension, |e| object.is_active(e)),
        ))
    }

    /// Plans retracting `extension`; `None` if it is not active.
    pub fn plan_remove(&self, object: &RemoteObjectProxy, extension: &str) -> SessionResult<Option<ExtensionPlan>> {
        ensure_known(object, extension)?;
        if !object.is_active(extension) {
            return Ok(None);
        }
        Ok(Some(
            object
                .extension_deps
                .retract_plan(extension, |e| object.is_active(e)),
        ))
    }

    /// Stages a plan awaiting confirmation, replacing any earlier one.
    pub fn stage(&mut self, plan: ExtensionPlan) {
        if let Some(old) = self.pending.replace(plan) {
            debug!(target = %old.target, "discarding unconfirmed extension plan");
        }
    }

    pub fn pending(&self) -> Option<&ExtensionPlan> {
        self.pending.as_ref()
    }

    pub fn take_pending(&mut self) -> Option<ExtensionPlan> {
        self.pending.take()
    }

    /// Remembers the requirements `plan` activated on behalf of its target.
    pub fn record(&mut self, plan: &ExtensionPlan, applied: &[String]) {
        match plan.direction {
            Direction::Extend => {
                let extra: Vec<String> = plan
                    .extra
                    .iter()
                    .filter(|e| applied.contains(e))
                    .cloned()
                    .collect();
                if !extra.is_empty() {
                    self.auto_added.insert(plan.target.clone(), extra);
                }
            }
            Direction::Retract => {
                for name in applied {
                    if name != &plan.target {
                        self.auto_added.shift_remove(name);
                    }
                }
            }
        }
    }

    /// Forgets and returns the requirements activated along with `extension`.
    pub fn take_auto_added(&mut self, extension: &str) -> Vec<String> {
        self.auto_added.shift_remove(extension).unwrap_or_default()
    }

    pub fn auto_added(&self, extension: &str) -> &[String] {
        self.auto_added
            .get(extension)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Executes `plan` one step at a time, stopping at the first failure.
    /// The local active flag follows each accepted step.
    pub async fn apply(
        &self,
        queue: &CallQueue,
        config: &SessionConfig,
        object: &mut RemoteObjectProxy,
        plan: &ExtensionPlan,
    ) -> ApplyOutcome {
        let (verb, active) = match plan.direction {
            Direction::Extend => ("extend", true),
            Direction::Retract => ("retract", false),
        };
        let mut applied = Vec::with_capacity(plan.steps.len());
        for step in &plan.steps {
            let args = vec![
                Value::String(object.uuid.to_string()),
                Value::String(verb.to_string()),
                Value::String(step.clone()),
            ];
            if let Err(e) = queue.call(&config.dispatch_method, args).await {
                warn!(extension = %step, error = %e, "{} failed", verb);
                return ApplyOutcome {
                    applied,
                    failure: Some((step.clone(), e)),
                };
            }
            if let Err(e) = object.set_extension_active(step, active) {
                warn!(extension = %step, error = %e, "backend accepted unknown extension");
            }
            info!(extension = %step, "{}ed", verb);
            applied.push(step.clone());
        }
        ApplyOutcome {
            applied,
            failure: None,
        }
    }
}

fn ensure_known(object: &RemoteObjectProxy, extension: &str) -> SessionResult<()> {
    if object.extensions.contains_key(extension) {
        Ok(())
    } else {
        Err(SessionError::UnknownExtension(extension.to_string()))
    }
}
