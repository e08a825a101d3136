//! The edit session aggregate.
//!
//! One [`EditSession`] per open object owns the object proxy, its rendered
//! contexts, and the three cooperating parts: the [`BindingController`],
//! the [`ExtensionManager`] and the [`Reconciler`]. They never reference each
//! other; the session passes each the state it needs per operation.

use crate::binding::BindingController;
use crate::channel::CallQueue;
use crate::config::SessionConfig;
use crate::error::{RpcErrorKind, SessionError, SessionResult};
use crate::extensions::{ExtensionManager, ExtensionRequest};
use crate::notice::Notice;
use crate::reconcile::{MergeDialog, MergeSubject, Reconciler, Side};
use crate::templates::TemplateSource;
use crate::Contexts;
use dirform_model::{Direction, ExtensionPlan, ObjectDiff, RemoteObjectProxy, Values};
use dirform_template::{Context, TemplateBuilder};
use dirform_types::{ClosingState, ObjectId, PushEvent, PushEventKind, SessionId};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Shared collaborators of every session of one client.
#[derive(Clone)]
pub struct SessionEnv {
    pub queue: Arc<CallQueue>,
    pub templates: Arc<dyn TemplateSource>,
    pub builder: Arc<TemplateBuilder>,
    pub config: SessionConfig,
}

impl std::fmt::Debug for SessionEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionEnv")
            .field("queue", &self.queue)
            .field("config", &self.config)
            .finish()
    }
}

/// How a push event was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// Not for this session, or suppressed while a call of its own runs.
    Ignored,
    /// State was refreshed without asking the user.
    Reloaded,
    /// A merge dialog is waiting for the user.
    MergePending,
    /// The session was closed by the backend.
    Closed,
    /// Only a notice was recorded.
    Noticed,
}

/// Result of a commit request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Nothing was modified; the object was just closed.
    NothingToCommit,
    Committed,
}

/// Echo suppression shared with push listeners.
///
/// The session holds the guard for the duration of its own commit, remove
/// and close calls. A push listener running beside the session keeps a
/// clone and drops events for the object while [`Self::is_suppressing`]
/// is true; the session itself also ignores events while held.
#[derive(Debug, Clone, Default)]
pub struct EventGuard(Arc<AtomicBool>);

impl EventGuard {
    pub fn is_suppressing(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Holds the guard until the returned value is dropped, including when
    /// the call future is cancelled.
    fn hold(&self) -> GuardHold<'_> {
        self.0.store(true, Ordering::Release);
        GuardHold(self)
    }
}

struct GuardHold<'a>(&'a EventGuard);

impl Drop for GuardHold<'_> {
    fn drop(&mut self) {
        self.0.0.store(false, Ordering::Release);
    }
}

pub struct EditSession {
    id: SessionId,
    env: SessionEnv,
    object: RemoteObjectProxy,
    /// Key of the base-type context.
    base: String,
    contexts: Contexts,
    binding: BindingController,
    extensions: ExtensionManager,
    reconciler: Reconciler,
    notices: Vec<Notice>,
    selected: Option<String>,
    events: EventGuard,
    closed: bool,
}

impl std::fmt::Debug for EditSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditSession")
            .field("id", &self.id)
            .field("object", &self.object.uuid)
            .field("dn", &self.object.dn)
            .field("contexts", &self.contexts.keys().collect::<Vec<_>>())
            .field("closed", &self.closed)
            .finish()
    }
}

impl EditSession {
    /// Opens `dn` on the backend and renders its contexts.
    pub async fn open(env: SessionEnv, dn: &str) -> SessionResult<Self> {
        let args = vec![Value::String("object".to_string()), Value::String(dn.to_string())];
        let state = env
            .queue
            .call(&env.config.open_method, args)
            .await
            .map_err(|e| SessionError::rpc(&env.config.open_method, e))?;
        let object = RemoteObjectProxy::from_value(state)?;
        Self::from_object(env, object)
    }

    /// Renders contexts for an already fetched object.
    pub fn from_object(env: SessionEnv, object: RemoteObjectProxy) -> SessionResult<Self> {
        let mut session = Self {
            id: SessionId::new(),
            env,
            object,
            base: String::new(),
            contexts: Contexts::new(),
            binding: BindingController::new(),
            extensions: ExtensionManager::new(),
            reconciler: Reconciler::new(),
            notices: Vec::new(),
            selected: None,
            events: EventGuard::default(),
            closed: false,
        };

        let base_type = session.object.base_type.clone();
        let xml = session
            .env
            .templates
            .template(&base_type)
            .ok_or_else(|| SessionError::MissingTemplate(base_type.clone()))?;
        let mut base = Context::base(session.env.builder.build(&xml)?);
        session.binding.bind_context(&mut base, &session.object);
        base.mark_appeared();
        session.base = base.name().to_string();
        session.selected = Some(session.base.clone());
        session.contexts.insert(session.base.clone(), base);

        session.sync_contexts();
        session
            .binding
            .finish_initialization(&mut session.contexts, &session.object);
        info!(
            object = %session.object.uuid,
            dn = %session.object.dn,
            contexts = session.contexts.len(),
            "opened edit session"
        );
        Ok(session)
    }

    // ── Accessors ───────────────────────────────────────────────

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn object_id(&self) -> ObjectId {
        self.object.uuid
    }

    pub fn object(&self) -> &RemoteObjectProxy {
        &self.object
    }

    pub fn contexts(&self) -> &Contexts {
        &self.contexts
    }

    pub fn context(&self, name: &str) -> Option<&Context> {
        self.contexts.get(name)
    }

    /// The base-type context.
    pub fn base_context(&self) -> Option<&Context> {
        self.contexts.get(&self.base)
    }

    pub fn binding(&self) -> &BindingController {
        &self.binding
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn is_modified(&self) -> bool {
        self.binding.is_modified()
    }

    pub fn is_valid(&self) -> bool {
        self.binding.is_valid(&self.contexts)
    }

    /// True while a commit, remove or close call of this session runs.
    pub fn is_skipping_events(&self) -> bool {
        self.events.is_suppressing()
    }

    /// A handle for push listeners running beside this session.
    pub fn event_guard(&self) -> EventGuard {
        self.events.clone()
    }

    pub fn selected_tab(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Shows the tab of context `name`.
    pub fn select_tab(&mut self, name: &str) -> SessionResult<()> {
        let context = self
            .contexts
            .get_mut(name)
            .ok_or_else(|| SessionError::Binding(format!("no context '{}'", name)))?;
        context.mark_appeared();
        self.selected = Some(name.to_string());
        Ok(())
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn dismiss_notice(&mut self, index: usize) -> Option<Notice> {
        (index < self.notices.len()).then(|| self.notices.remove(index))
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn pending_merge(&self) -> Option<&MergeDialog> {
        self.reconciler.pending()
    }

    pub fn pending_extension_change(&self) -> Option<&ExtensionPlan> {
        self.extensions.pending()
    }

    fn ensure_open(&self) -> SessionResult<()> {
        if self.closed {
            Err(SessionError::Closed)
        } else {
            Ok(())
        }
    }

    // ── Editing ─────────────────────────────────────────────────

    /// Applies a user edit of `attribute` and sends it to the backend.
    pub async fn set_value(&mut self, attribute: &str, values: Values) -> SessionResult<()> {
        self.ensure_open()?;
        let result = self
            .binding
            .update(
                &self.env.queue,
                &self.env.config,
                &mut self.object,
                &mut self.contexts,
                attribute,
                values,
            )
            .await;
        if let Err(e) = &result {
            self.report(e);
        }
        result
    }

    /// Commits all changes in one call.
    ///
    /// An unmodified object is just closed. An invalid form fails locally
    /// without any call. An attribute-scoped rejection keeps the session
    /// open with the widget in its error state.
    pub async fn commit(&mut self) -> SessionResult<CommitOutcome> {
        self.ensure_open()?;
        if !self.binding.is_modified() {
            self.close().await?;
            return Ok(CommitOutcome::NothingToCommit);
        }
        let invalid = self.binding.invalid_widgets(&self.contexts);
        if !invalid.is_empty() {
            let names: Vec<String> = invalid.iter().map(|r| r.widget.clone()).collect();
            if let Some(first) = invalid.first() {
                if self.env.config.auto_select_error_tab {
                    let context = first.context.clone();
                    self.select_tab(&context)?;
                }
            }
            warn!(object = %self.object.uuid, widgets = ?names, "commit refused: form is invalid");
            return Err(SessionError::Invalid(names));
        }

        let args = vec![
            Value::String(self.object.uuid.to_string()),
            Value::String("commit".to_string()),
        ];
        let result = {
            let _hold = self.events.hold();
            self.env.queue.call(&self.env.config.dispatch_method, args).await
        };

        match result {
            Ok(_) => {
                info!(object = %self.object.uuid, "committed");
                self.close().await?;
                Ok(CommitOutcome::Committed)
            }
            Err(e) => {
                let err = SessionError::rpc(&self.env.config.dispatch_method, e);
                self.report(&err);
                Err(err)
            }
        }
    }

    /// Closes the object on the backend and releases all bindings. Any
    /// pending merge is dropped.
    pub async fn close(&mut self) -> SessionResult<()> {
        if self.closed {
            return Ok(());
        }
        let args = vec![Value::String(self.object.uuid.to_string())];
        let result = {
            let _hold = self.events.hold();
            self.env.queue.call(&self.env.config.close_method, args).await
        };
        self.release();
        result
            .map(|_| ())
            .map_err(|e| SessionError::rpc(&self.env.config.close_method, e))
    }

    /// Removes the object from the directory and closes the session.
    pub async fn remove(&mut self) -> SessionResult<()> {
        self.ensure_open()?;
        let args = vec![
            Value::String("object".to_string()),
            Value::String(self.object.dn.clone()),
        ];
        let result = {
            let _hold = self.events.hold();
            self.env.queue.call(&self.env.config.remove_method, args).await
        };
        match result {
            Ok(_) => {
                info!(object = %self.object.uuid, dn = %self.object.dn, "removed");
                self.release();
                Ok(())
            }
            Err(e) => {
                let err = SessionError::rpc(&self.env.config.remove_method, e);
                self.report(&err);
                Err(err)
            }
        }
    }

    /// Re-fetches the object and re-seeds every widget without outbound
    /// updates.
    pub async fn reload(&mut self) -> SessionResult<()> {
        self.ensure_open()?;
        let args = vec![Value::String(self.object.uuid.to_string())];
        let state = self
            .env
            .queue
            .call(&self.env.config.reload_method, args)
            .await
            .map_err(|e| SessionError::rpc(&self.env.config.reload_method, e))?;
        let fresh = RemoteObjectProxy::from_value(state)?;
        self.object.refresh_from(fresh);
        self.sync_contexts();
        self.binding.reseed_all(&mut self.contexts, &self.object);
        debug!(object = %self.object.uuid, "reloaded");
        Ok(())
    }

    /// Evaluates the enablement of command `name` in context `context`.
    ///
    /// Attribute conditions are evaluated locally on every call; method
    /// conditions issue one remote call on first display and keep the
    /// result.
    pub async fn display_command(&mut self, context: &str, name: &str) -> SessionResult<bool> {
        self.ensure_open()?;
        let command = self
            .contexts
            .get(context)
            .and_then(|c| c.commands().iter().find(|cmd| cmd.name == name))
            .ok_or_else(|| SessionError::Binding(format!("no command '{}' in '{}'", name, context)))?;
        let condition = match (&command.condition, command.evaluated) {
            (None, _) | (Some(_), true) => return Ok(command.enabled),
            (Some(condition), false) => condition.clone(),
        };

        let enabled = match condition.evaluate_local(&self.object) {
            Some(result) => result,
            None => {
                let method = match &condition.expr {
                    dirform_template::ConditionExpr::MethodCall { name, .. } => name.clone(),
                    dirform_template::ConditionExpr::AttributeRef(name) => name.clone(),
                };
                let args = condition.resolve_args(&self.object);
                match self.env.queue.call(&method, args).await {
                    Ok(result) => condition.apply_value(&result),
                    Err(e) => {
                        warn!(command = name, %method, error = %e, "condition call failed; disabling command");
                        false
                    }
                }
            }
        };

        if let Some(command) = self
            .contexts
            .get_mut(context)
            .and_then(|c| c.command_mut(name))
        {
            command.enabled = enabled;
            command.evaluated = condition.is_remote();
        }
        Ok(enabled)
    }

    // ── Extensions ──────────────────────────────────────────────

    /// Requests activation of `extension`. If requirements must be
    /// activated too, the plan is staged for [`Self::confirm_extension_change`].
    pub async fn add_extension(&mut self, extension: &str) -> SessionResult<ExtensionRequest> {
        self.ensure_open()?;
        let Some(plan) = self.extensions.plan_add(&self.object, extension)? else {
            return Ok(ExtensionRequest::Unchanged);
        };
        self.request(plan).await
    }

    /// Requests retraction of `extension`. If dependents must be retracted
    /// too, the plan is staged for [`Self::confirm_extension_change`].
    pub async fn remove_extension(&mut self, extension: &str) -> SessionResult<ExtensionRequest> {
        self.ensure_open()?;
        let Some(plan) = self.extensions.plan_remove(&self.object, extension)? else {
            return Ok(ExtensionRequest::Unchanged);
        };
        self.request(plan).await
    }

    async fn request(&mut self, plan: ExtensionPlan) -> SessionResult<ExtensionRequest> {
        if plan.requires_confirmation() {
            debug!(target = %plan.target, extra = ?plan.extra, "extension change needs confirmation");
            self.extensions.stage(plan.clone());
            return Ok(ExtensionRequest::NeedsConfirmation(plan));
        }
        self.execute(plan).await.map(ExtensionRequest::Applied)
    }

    /// Applies the staged extension plan.
    pub async fn confirm_extension_change(&mut self) -> SessionResult<Vec<String>> {
        self.ensure_open()?;
        let plan = self
            .extensions
            .take_pending()
            .ok_or(SessionError::NothingPending)?;
        self.execute(plan).await
    }

    /// Drops the staged extension plan.
    pub fn cancel_extension_change(&mut self) -> bool {
        self.extensions.take_pending().is_some()
    }

    /// Activates `extension` and its missing requirements without asking.
    pub async fn add_extension_silently(&mut self, extension: &str) -> SessionResult<Vec<String>> {
        self.ensure_open()?;
        match self.extensions.plan_add(&self.object, extension)? {
            Some(plan) => self.execute(plan).await,
            None => Ok(Vec::new()),
        }
    }

    /// Retracts `extension` only if no active extension requires it and its
    /// tab was never shown. Returns true if it was retracted.
    pub async fn retract_if_not_appeared_and_independent(&mut self, extension: &str) -> SessionResult<bool> {
        self.ensure_open()?;
        if !self.object.is_active(extension) || !self.can_retract_silently(extension) {
            return Ok(false);
        }
        let applied = self.execute(single_retract(extension)).await?;
        Ok(!applied.is_empty())
    }

    fn can_retract_silently(&self, extension: &str) -> bool {
        let deps = &self.object.extension_deps;
        if deps.has_active_dependents(extension, |e| self.object.is_active(e)) {
            debug!(extension, "not retracting: still required");
            return false;
        }
        if self.contexts.get(extension).is_some_and(Context::has_appeared) {
            debug!(extension, "not retracting: tab was shown");
            return false;
        }
        true
    }

    /// Runs `plan`, then drops requirements that were pulled in
    /// automatically for a retracted extension when that is safe.
    async fn execute(&mut self, plan: ExtensionPlan) -> SessionResult<Vec<String>> {
        let mut applied = self.run_plan(&plan).await?;
        if plan.direction != Direction::Retract {
            return Ok(applied);
        }

        let mut candidates: Vec<String> = Vec::new();
        for name in &applied {
            candidates.extend(self.extensions.take_auto_added(name));
        }
        // Popping from the back retracts the last-added requirement first.
        while let Some(candidate) = candidates.pop() {
            if !self.object.is_active(&candidate) || !self.can_retract_silently(&candidate) {
                continue;
            }
            let done = self.run_plan(&single_retract(&candidate)).await?;
            for name in &done {
                candidates.extend(self.extensions.take_auto_added(name));
            }
            applied.extend(done);
        }
        Ok(applied)
    }

    /// Applies `plan` step by step and refreshes metadata and tabs.
    ///
    /// When a step fails, the steps the backend already accepted are
    /// reverted so the active set ends up as it was before the call.
    async fn run_plan(&mut self, plan: &ExtensionPlan) -> SessionResult<Vec<String>> {
        let outcome = self
            .extensions
            .apply(&self.env.queue, &self.env.config, &mut self.object, plan)
            .await;

        let Some((step, e)) = outcome.failure else {
            self.extensions.record(plan, &outcome.applied);
            if !outcome.applied.is_empty() {
                self.binding.mark_modified();
                self.refresh_after_extension_change().await;
            }
            return Ok(outcome.applied);
        };

        let err = SessionError::rpc(&self.env.config.dispatch_method, e);
        error!(extension = %step, error = %err, "extension change failed");
        if !outcome.applied.is_empty() {
            let undo = plan.undo(&outcome.applied);
            let reverted = self
                .extensions
                .apply(&self.env.queue, &self.env.config, &mut self.object, &undo)
                .await;
            if let Some((undo_step, undo_err)) = reverted.failure {
                error!(extension = %undo_step, error = %undo_err, "reverting extension change failed");
                self.binding.mark_modified();
            } else {
                info!(reverted = ?reverted.applied, "reverted partial extension change");
            }
            self.refresh_after_extension_change().await;
        }
        self.notices
            .push(Notice::error("Extension change failed", format!("{}: {}", step, err)));
        Err(err)
    }

    async fn refresh_after_extension_change(&mut self) {
        if let Err(e) = self.reload().await {
            warn!(error = %e, "metadata refresh after extension change failed");
            self.sync_contexts();
        }
    }

    /// Creates tabs for active extensions and drops tabs of inactive ones.
    fn sync_contexts(&mut self) {
        let stale: Vec<String> = self
            .contexts
            .values()
            .filter_map(|c| c.extension())
            .filter(|e| !self.object.is_active(e))
            .map(String::from)
            .collect();
        for name in stale {
            self.contexts.shift_remove(&name);
            self.binding.unbind_context(&name);
            if self.selected.as_deref() == Some(name.as_str()) {
                self.selected = Some(self.base.clone());
            }
            debug!(extension = %name, "removed tab");
        }

        for extension in self.object.active_extensions() {
            if self.contexts.contains_key(&extension) {
                continue;
            }
            let Some(xml) = self.env.templates.template(&extension) else {
                debug!(%extension, "extension has no template; no tab");
                continue;
            };
            match self.env.builder.build(&xml) {
                Ok(template) => {
                    let mut context = Context::for_extension(&extension, template);
                    self.binding.bind_context(&mut context, &self.object);
                    self.contexts.insert(extension.clone(), context);
                    debug!(%extension, "created tab");
                }
                Err(e) => {
                    error!(%extension, error = %e, "extension template failed to build");
                    self.notices
                        .push(Notice::error("Template error", format!("{}: {}", extension, e)));
                }
            }
        }
    }

    // ── Backend changes ─────────────────────────────────────────

    /// Reacts to a push event. Events for other objects are ignored.
    pub async fn handle_event(&mut self, event: &PushEvent) -> SessionResult<EventOutcome> {
        if self.closed || !event.targets(&self.object.uuid) {
            return Ok(EventOutcome::Ignored);
        }
        if self.events.is_suppressing() {
            debug!(object = %self.object.uuid, kind = ?event.kind, "ignoring event during own call");
            return Ok(EventOutcome::Ignored);
        }
        if event.forces_close() {
            let reason = match event.kind {
                PushEventKind::ObjectRemoved => "The object was removed by someone else.",
                _ => "The object was closed by the backend.",
            };
            self.force_close(reason);
            return Ok(EventOutcome::Closed);
        }
        match event.kind {
            PushEventKind::ObjectModified => self.reconcile().await,
            PushEventKind::ObjectClosing if event.state == Some(ClosingState::Closing) => {
                self.notices.push(Notice::warning(
                    "Object about to close",
                    "The backend will close this object soon due to inactivity.",
                ));
                Ok(EventOutcome::Noticed)
            }
            PushEventKind::PluginUpdate => {
                self.reload().await?;
                Ok(EventOutcome::Reloaded)
            }
            _ => Ok(EventOutcome::Ignored),
        }
    }

    /// Fetches the backend diff and either reloads silently, opens a merge
    /// dialog, or force-closes an unmergeable object.
    pub async fn reconcile(&mut self) -> SessionResult<EventOutcome> {
        self.ensure_open()?;
        let args = vec![Value::String(self.object.uuid.to_string())];
        let raw = self
            .env
            .queue
            .call(&self.env.config.diff_method, args)
            .await
            .map_err(|e| SessionError::rpc(&self.env.config.diff_method, e))?;
        let diff: ObjectDiff = match raw {
            Value::Null => ObjectDiff::default(),
            other => serde_json::from_value(other)?,
        };

        let plan = Reconciler::plan(&diff, &self.object, &self.contexts, &self.binding);
        if !plan.unmergeable.is_empty() {
            let message = format!(
                "Extension(s) {} were removed while their tab is open.",
                plan.unmergeable.join(", ")
            );
            self.force_close(&message);
            return Ok(EventOutcome::Closed);
        }

        for change in &plan.silent {
            self.object.check(&change.name, &change.remote)?;
        }
        for change in plan.silent {
            self.binding
                .seed(&mut self.contexts, &mut self.object, &change.name, change.remote)?;
        }

        if plan.dialog.is_empty() {
            self.reconciler.abort();
            self.reload().await?;
            return Ok(EventOutcome::Reloaded);
        }
        info!(object = %self.object.uuid, rows = plan.dialog.len(), "backend change needs merge");
        self.reconciler.open(plan.dialog);
        Ok(EventOutcome::MergePending)
    }

    /// Chooses a side for one merge row and its linked rows.
    pub fn choose(&mut self, row: usize, side: Side) -> SessionResult<Vec<usize>> {
        self.reconciler
            .pending_mut()
            .ok_or(SessionError::NothingPending)?
            .choose(row, side)
    }

    pub fn choose_all(&mut self, side: Side) -> SessionResult<()> {
        self.reconciler
            .pending_mut()
            .ok_or(SessionError::NothingPending)?
            .choose_all(side);
        Ok(())
    }

    /// Applies every choice of the pending merge. Fails without touching
    /// anything while a row has no choice.
    pub async fn resolve_merge(&mut self) -> SessionResult<()> {
        self.ensure_open()?;
        let dialog = self.reconciler.pending().ok_or(SessionError::NothingPending)?;
        let unresolved = dialog.unresolved();
        if unresolved > 0 {
            return Err(SessionError::Unresolved(unresolved));
        }
        // Nothing is applied unless every remote value fits the model.
        for row in dialog.rows() {
            if let (MergeSubject::Attribute { attribute, remote, .. }, Some(Side::Remote)) =
                (&row.subject, row.choice())
            {
                self.object.check(attribute, remote)?;
            }
        }
        let Some(dialog) = self.reconciler.take() else {
            return Err(SessionError::NothingPending);
        };

        let mut extension_rows = Vec::new();
        for row in dialog.rows() {
            let side = row.choice().unwrap_or(Side::Local);
            match (&row.subject, side) {
                (MergeSubject::Attribute { attribute, remote, .. }, Side::Remote) => {
                    self.binding
                        .seed(&mut self.contexts, &mut self.object, attribute, remote.clone())?;
                }
                (MergeSubject::Attribute { .. }, Side::Local) => self.binding.mark_modified(),
                (MergeSubject::Extension { name, remote_active }, Side::Remote) => {
                    extension_rows.push((name.clone(), *remote_active));
                }
                (MergeSubject::Extension { .. }, Side::Local) => self.binding.mark_modified(),
            }
        }

        for (name, activate) in extension_rows {
            let result = if activate {
                self.add_extension_silently(&name).await.map(|_| ())
            } else {
                self.retract_if_not_appeared_and_independent(&name)
                    .await
                    .map(|_| ())
            };
            if let Err(e) = result {
                warn!(extension = %name, error = %e, "applying merged extension state failed");
            }
        }
        info!(object = %self.object.uuid, rows = dialog.len(), "merge resolved");
        Ok(())
    }

    /// Drops the pending merge without applying anything.
    pub fn cancel_merge(&mut self) -> bool {
        self.reconciler.abort()
    }

    /// Closes locally after the backend dropped or removed the object.
    fn force_close(&mut self, reason: &str) {
        warn!(object = %self.object.uuid, reason, "force-closing session");
        self.notices.push(Notice::error("Object closed", reason));
        self.release();
    }

    fn release(&mut self) {
        self.reconciler.abort();
        self.extensions.take_pending();
        self.binding.release();
        self.contexts.clear();
        self.selected = None;
        self.closed = true;
    }

    /// Turns a failure into a notice; attribute errors also select the
    /// owning tab.
    fn report(&mut self, err: &SessionError) {
        if let Some(rpc) = err.rpc_error() {
            if rpc.kind() == RpcErrorKind::Attribute {
                if let Some(topic) = rpc.topic.clone() {
                    let owner = self.binding.set_error(&mut self.contexts, &topic, &rpc.message);
                    if let (Some(owner), true) = (owner, self.env.config.auto_select_error_tab) {
                        if let Some(context) = self.contexts.get_mut(&owner) {
                            context.mark_appeared();
                        }
                        self.selected = Some(owner);
                    }
                }
            }
        }
        self.notices.push(Notice::error("Error", err.to_string()));
    }
}

fn single_retract(extension: &str) -> ExtensionPlan {
    ExtensionPlan {
        target: extension.to_string(),
        direction: Direction::Retract,
        extra: Vec::new(),
        steps: vec![extension.to_string()],
    }
}
