//! Data binding between contexts and the remote object.
//!
//! The controller owns the attribute → widget index across every bound
//! context. Model values seed widgets when a context is bound; user edits go
//! through [`BindingController::update`], which mirrors the value into the
//! model and issues one attribute-update call. Seeding paths never call out.

use crate::channel::CallQueue;
use crate::config::SessionConfig;
use crate::error::{RpcErrorKind, SessionError, SessionResult};
use crate::Contexts;
use dirform_model::{RemoteObjectProxy, Values};
use dirform_template::{Context, WidgetFlags};
use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, error, warn};

/// A widget addressed by context and widget name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WidgetRef {
    pub context: String,
    pub widget: String,
}

impl WidgetRef {
    pub fn new(context: &str, widget: &str) -> Self {
        Self {
            context: context.to_string(),
            widget: widget.to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct BindingController {
    /// Attribute → bound widgets, across contexts.
    widgets: IndexMap<String, Vec<WidgetRef>>,
    /// Gating attribute → widgets carrying a `blockedBy` rule on it.
    gated: IndexMap<String, Vec<WidgetRef>>,
    /// Blocking is evaluated only once the session is fully set up.
    initialized: bool,
    modified: bool,
}

impl BindingController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds every connection of `context` and seeds its widgets from the
    /// model. Descriptor flags are copied onto each widget and its buddy.
    pub fn bind_context(&mut self, context: &mut Context, object: &RemoteObjectProxy) {
        let name = context.name().to_string();
        let bindings: Vec<(String, String)> = context
            .bindings()
            .iter()
            .map(|(a, w)| (a.to_string(), w.to_string()))
            .collect();

        for (attribute, widget) in bindings {
            if context.widget(&widget).is_none() {
                error!(context = %name, %attribute, %widget, "bound widget missing; skipping binding");
                continue;
            }
            match object.descriptor(&attribute) {
                Some(descriptor) => {
                    context.apply_flags(&attribute, WidgetFlags::from(descriptor));
                }
                None if !object.has_attribute(&attribute) => {
                    warn!(context = %name, %attribute, "binding to attribute unknown to the object");
                }
                None => {}
            }
            if let Some(node) = context.widget_mut(&widget) {
                node.set_value(object.get(&attribute).to_vec());
            }
            let refs = self.widgets.entry(attribute).or_default();
            refs.retain(|r| r.context != name);
            refs.push(WidgetRef::new(&name, &widget));
        }

        let gated: Vec<(String, String)> = context
            .tree()
            .iter()
            .flat_map(|(_, node)| {
                node.block_rules
                    .iter()
                    .map(|rule| (rule.name.clone(), node.name.clone()))
                    .collect::<Vec<_>>()
            })
            .collect();
        for (gate, widget) in gated {
            let refs = self.gated.entry(gate).or_default();
            let target = WidgetRef::new(&name, &widget);
            if !refs.contains(&target) {
                refs.push(target);
            }
        }

        if self.initialized {
            evaluate_blocking(context, object);
        }
        debug!(context = %name, attributes = context.bindings().len(), "bound context");
    }

    /// Marks setup as complete and runs the deferred blocking evaluation.
    pub fn finish_initialization(&mut self, contexts: &mut Contexts, object: &RemoteObjectProxy) {
        self.initialized = true;
        for context in contexts.values_mut() {
            evaluate_blocking(context, object);
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Drops every binding of context `name`.
    pub fn unbind_context(&mut self, name: &str) {
        for index in [&mut self.widgets, &mut self.gated] {
            index.retain(|_, refs| {
                refs.retain(|r| r.context != name);
                !refs.is_empty()
            });
        }
    }

    pub fn widgets_for(&self, attribute: &str) -> &[WidgetRef] {
        self.widgets
            .get(attribute)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_bound(&self, attribute: &str) -> bool {
        !self.widgets_for(attribute).is_empty()
    }

    /// First context binding `attribute`.
    pub fn context_of(&self, attribute: &str) -> Option<&str> {
        self.widgets_for(attribute)
            .first()
            .map(|r| r.context.as_str())
    }

    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.widgets.keys().map(String::as_str)
    }

    /// Re-evaluates widgets gated by `attribute`. Returns how many changed
    /// their blocked state.
    pub fn refresh_blocking(
        &self,
        contexts: &mut Contexts,
        object: &RemoteObjectProxy,
        attribute: &str,
    ) -> usize {
        if !self.initialized {
            return 0;
        }
        let Some(refs) = self.gated.get(attribute) else {
            return 0;
        };
        refs.iter()
            .filter(|r| {
                contexts
                    .get_mut(&r.context)
                    .is_some_and(|c| c.update_blocking(&r.widget, |a| object.get(a).to_vec()))
            })
            .count()
    }

    /// Applies a user edit: widget, model, then one attribute-update call.
    ///
    /// An attribute-scoped failure puts the widget into its error state.
    pub async fn update(
        &mut self,
        queue: &CallQueue,
        config: &SessionConfig,
        object: &mut RemoteObjectProxy,
        contexts: &mut Contexts,
        attribute: &str,
        values: Values,
    ) -> SessionResult<()> {
        if !self.is_bound(attribute) {
            return Err(SessionError::Binding(format!(
                "attribute '{}' has no bound widget",
                attribute
            )));
        }
        self.write_widgets(contexts, attribute, &values);
        if let Err(e) = object.set(attribute, values.clone()) {
            self.set_error(contexts, attribute, &e.to_string());
            return Err(e.into());
        }
        self.modified = true;
        self.refresh_blocking(contexts, object, attribute);

        let args = vec![
            Value::String(object.uuid.to_string()),
            Value::String(attribute.to_string()),
            Value::Array(values),
        ];
        match queue.call(&config.set_method, args).await {
            Ok(_) => Ok(()),
            Err(e) => {
                if e.kind() == RpcErrorKind::Attribute {
                    self.set_error(contexts, attribute, &e.message);
                }
                Err(SessionError::rpc(&config.set_method, e))
            }
        }
    }

    /// Writes `values` into the model and every bound widget without an
    /// outbound update.
    pub fn seed(
        &self,
        contexts: &mut Contexts,
        object: &mut RemoteObjectProxy,
        attribute: &str,
        values: Values,
    ) -> SessionResult<()> {
        if values.is_empty() {
            object.attributes.shift_remove(attribute);
        } else {
            object.set(attribute, values.clone())?;
        }
        self.write_widgets(contexts, attribute, &values);
        self.refresh_blocking(contexts, object, attribute);
        Ok(())
    }

    /// Re-copies flags and values from the model into every bound widget,
    /// then re-evaluates blocking.
    pub fn reseed_all(&self, contexts: &mut Contexts, object: &RemoteObjectProxy) {
        for (attribute, refs) in &self.widgets {
            let flags = object.descriptor(attribute).map(WidgetFlags::from);
            for r in refs {
                let Some(context) = contexts.get_mut(&r.context) else {
                    continue;
                };
                if let Some(flags) = flags.clone() {
                    context.apply_flags(attribute, flags);
                }
                if let Some(node) = context.widget_mut(&r.widget) {
                    node.set_value(object.get(attribute).to_vec());
                    node.clear_error();
                }
            }
        }
        if self.initialized {
            for context in contexts.values_mut() {
                evaluate_blocking(context, object);
            }
        }
    }

    fn write_widgets(&self, contexts: &mut Contexts, attribute: &str, values: &Values) {
        for r in self.widgets_for(attribute) {
            if let Some(node) = contexts
                .get_mut(&r.context)
                .and_then(|c| c.widget_mut(&r.widget))
            {
                node.set_value(values.clone());
                node.clear_error();
            }
        }
    }

    /// Puts the widgets bound to `attribute` into an error state. Returns
    /// the owning context.
    pub fn set_error(&self, contexts: &mut Contexts, attribute: &str, message: &str) -> Option<String> {
        let mut owner = None;
        for r in self.widgets_for(attribute) {
            if let Some(node) = contexts
                .get_mut(&r.context)
                .and_then(|c| c.widget_mut(&r.widget))
            {
                node.set_error(message);
                owner.get_or_insert_with(|| r.context.clone());
            }
        }
        owner
    }

    /// Logical AND of every context's validity.
    pub fn is_valid(&self, contexts: &Contexts) -> bool {
        contexts.values().all(Context::is_valid)
    }

    pub fn invalid_widgets(&self, contexts: &Contexts) -> Vec<WidgetRef> {
        contexts
            .iter()
            .flat_map(|(name, c)| {
                c.invalid_widgets()
                    .into_iter()
                    .map(|w| WidgetRef::new(name, w))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn mark_modified(&mut self) {
        self.modified = true;
    }

    /// Forgets every binding.
    pub fn release(&mut self) {
        self.widgets.clear();
        self.gated.clear();
        self.initialized = false;
        self.modified = false;
    }
}

fn evaluate_blocking(context: &mut Context, object: &RemoteObjectProxy) {
    let gated: Vec<String> = context
        .tree()
        .iter()
        .filter(|(_, node)| !node.block_rules.is_empty())
        .map(|(_, node)| node.name.clone())
        .collect();
    for widget in gated {
        context.update_blocking(&widget, |a| object.get(a).to_vec());
    }
}
