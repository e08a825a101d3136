//! One rendered page: the base object form or an extension tab.

use crate::binding::BindingTable;
use crate::builder::{BuiltTemplate, WidgetTree};
use crate::command::Command;
use crate::widget::{WidgetFlags, WidgetNode};
use dirform_model::Values;

/// A rendered template plus the state the editor keeps per page.
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    extension: Option<String>,
    template: BuiltTemplate,
    appeared: bool,
}

impl Context {
    /// Context for the base object form.
    pub fn base(template: BuiltTemplate) -> Self {
        Self {
            extension: None,
            template,
            appeared: false,
        }
    }

    /// Context for the tab of `extension`.
    pub fn for_extension(extension: &str, template: BuiltTemplate) -> Self {
        Self {
            extension: Some(extension.to_string()),
            template,
            appeared: false,
        }
    }

    /// Extension name, or the template class for the base form.
    pub fn name(&self) -> &str {
        self.extension
            .as_deref()
            .unwrap_or(&self.template.class_name)
    }

    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    /// Tab title: the root `tabTitle`, then `windowTitle`, then the name.
    pub fn title(&self) -> &str {
        let properties = &self.template.properties;
        properties
            .get_str("tabTitle")
            .or_else(|| properties.get_str("windowTitle"))
            .unwrap_or_else(|| self.name())
    }

    /// Tab icon: the root `windowIcon`, else its `icon`.
    pub fn icon(&self) -> Option<&str> {
        let properties = &self.template.properties;
        properties
            .get_str("windowIcon")
            .or_else(|| properties.get_str("icon"))
    }

    pub fn template(&self) -> &BuiltTemplate {
        &self.template
    }

    pub fn tree(&self) -> &WidgetTree {
        &self.template.tree
    }

    pub fn bindings(&self) -> &BindingTable {
        &self.template.bindings
    }

    /// Whether the page has been shown to the user at least once.
    pub fn has_appeared(&self) -> bool {
        self.appeared
    }

    pub fn mark_appeared(&mut self) {
        self.appeared = true;
    }

    pub fn widget(&self, name: &str) -> Option<&WidgetNode> {
        self.template.tree.by_name(name)
    }

    pub fn widget_mut(&mut self, name: &str) -> Option<&mut WidgetNode> {
        self.template.tree.by_name_mut(name)
    }

    /// The label widget paired with `widget`.
    pub fn buddy(&self, widget: &str) -> Option<&WidgetNode> {
        let label = self.template.buddies.get(widget)?;
        self.widget(label)
    }

    pub fn buddy_mut(&mut self, widget: &str) -> Option<&mut WidgetNode> {
        let label = self.template.buddies.get(widget)?.clone();
        self.widget_mut(&label)
    }

    /// Widget bound to `attribute`.
    pub fn bound_widget(&self, attribute: &str) -> Option<&WidgetNode> {
        let name = self.template.bindings.widget_for(attribute)?;
        self.widget(name)
    }

    pub fn bound_widget_mut(&mut self, attribute: &str) -> Option<&mut WidgetNode> {
        let name = self.template.bindings.widget_for(attribute)?.to_string();
        self.widget_mut(&name)
    }

    /// Attribute bound to `widget`.
    pub fn attribute_of(&self, widget: &str) -> Option<&str> {
        self.template.bindings.attribute_for(widget)
    }

    pub fn binds(&self, attribute: &str) -> bool {
        self.template.bindings.widget_for(attribute).is_some()
    }

    /// Human-readable label of `attribute` on this page.
    pub fn display_label(&self, attribute: &str) -> String {
        self.bound_widget(attribute)
            .and_then(|w| w.label.clone().or_else(|| w.text().map(String::from)))
            .unwrap_or_else(|| attribute.to_string())
    }

    /// Copies attribute flags onto the bound widget. The buddy label mirrors
    /// the mandatory and readonly flags.
    pub fn apply_flags(&mut self, attribute: &str, flags: WidgetFlags) -> bool {
        let Some(name) = self.template.bindings.widget_for(attribute).map(String::from) else {
            return false;
        };
        let (mandatory, readonly) = (flags.mandatory, flags.readonly);
        let Some(widget) = self.widget_mut(&name) else {
            return false;
        };
        widget.flags = flags;
        if let Some(label) = self.buddy_mut(&name) {
            label.flags.mandatory = mandatory;
            label.flags.readonly = readonly;
        }
        true
    }

    /// Re-evaluates the `blockedBy` rules of `widget`. A widget is blocked
    /// when it has rules and all of them match. Returns true if the blocked
    /// state changed.
    pub fn update_blocking(&mut self, widget: &str, lookup: impl Fn(&str) -> Values) -> bool {
        let Some(node) = self.widget(widget) else {
            return false;
        };
        let blocked = !node.block_rules.is_empty()
            && node
                .block_rules
                .iter()
                .all(|rule| rule.matches(&lookup(&rule.name)));
        if blocked == node.is_blocked() {
            return false;
        }
        let label = self.template.buddies.get(widget).cloned();
        for name in std::iter::once(widget.to_string()).chain(label) {
            if let Some(node) = self.widget_mut(&name) {
                if blocked {
                    node.block();
                } else {
                    node.unblock();
                }
            }
        }
        true
    }

    /// Logical AND over every validating widget of (valid or blocked).
    pub fn is_valid(&self) -> bool {
        self.template
            .tree
            .iter()
            .all(|(_, w)| !w.is_validating() || w.is_valid())
    }

    /// Names of widgets currently failing validation.
    pub fn invalid_widgets(&self) -> Vec<&str> {
        self.template
            .tree
            .iter()
            .filter(|(_, w)| w.is_validating() && !w.is_valid())
            .map(|(_, w)| w.name.as_str())
            .collect()
    }

    pub fn commands(&self) -> &[Command] {
        &self.template.commands
    }

    pub fn command_mut(&mut self, name: &str) -> Option<&mut Command> {
        self.template.commands.iter_mut().find(|c| c.name == name)
    }
}
