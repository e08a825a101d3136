//! Reports behind the `dirform` binary.
//!
//! Everything here is synchronous and side-effect free apart from reading
//! files, so the binary stays a thin argument-parsing shell.

use anyhow::{Context as _, Result};
use dirform_model::RemoteObjectProxy;
use dirform_session::{BindingController, Contexts, SessionConfig};
use dirform_template::{BuilderConfig, Context, TemplateBuilder, WidgetRegistry};
use serde::Deserialize;
use std::fmt::Write as _;
use std::path::Path;
use tracing::{debug, info};

/// Contents of `dirform.toml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub builder: BuilderConfig,
    pub session: SessionConfig,
}

impl CliConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("Failed to parse config")
    }

    /// Loads `path`, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            debug!("no config file given; using defaults");
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config = Self::from_toml(&text)
            .with_context(|| format!("Invalid config file {:?}", path))?;
        info!("Loaded config from {:?}", path);
        Ok(config)
    }
}

/// Reads an object state fixture (the `openObject` result shape).
pub fn load_object(path: &Path) -> Result<RemoteObjectProxy> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read object state {:?}", path))?;
    let value: serde_json::Value =
        serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {:?}", path))?;
    RemoteObjectProxy::from_value(value).with_context(|| format!("Invalid object state in {:?}", path))
}

/// Builds `xml`, optionally binds it to `object`, and describes the result.
pub fn render_report(xml: &str, object: Option<&RemoteObjectProxy>, config: &CliConfig) -> Result<String> {
    let builder = TemplateBuilder::new(WidgetRegistry::standard(), config.builder.clone());
    let template = builder.build(xml).context("Failed to build template")?;
    let mut contexts = Contexts::new();
    let context = Context::base(template);
    let name = context.name().to_string();
    contexts.insert(name.clone(), context);

    if let Some(object) = object {
        let mut binding = BindingController::new();
        if let Some(context) = contexts.get_mut(&name) {
            binding.bind_context(context, object);
        }
        binding.finish_initialization(&mut contexts, object);
    }

    let mut out = String::new();
    if let Some(context) = contexts.get(&name) {
        write_context(&mut out, context, object.is_some())?;
    }
    Ok(out)
}

fn write_context(out: &mut String, context: &Context, bound: bool) -> std::fmt::Result {
    writeln!(out, "context {} ({})", context.name(), context.title())?;
    if let Some(icon) = context.icon() {
        writeln!(out, "  icon: {}", icon)?;
    }

    writeln!(out, "widgets:")?;
    let tree = context.tree();
    for id in tree.walk() {
        let Some(node) = tree.get(id) else {
            continue;
        };
        let indent = "  ".repeat(tree.depth(id) + 1);
        write!(out, "{}{} [{:?}] {:?}", indent, node.name, node.kind, node.placement)?;
        if let Some(label) = &node.label {
            write!(out, " label={:?}", label)?;
        }
        if node.flags.mandatory {
            write!(out, " mandatory")?;
        }
        if node.flags.readonly {
            write!(out, " readonly")?;
        }
        if node.is_blocked() {
            write!(out, " blocked")?;
        }
        if bound && !node.value().is_empty() {
            write!(out, " = {}", serde_json::Value::Array(node.value().to_vec()))?;
        }
        writeln!(out)?;
    }

    writeln!(out, "bindings:")?;
    for (attribute, widget) in context.bindings().iter() {
        writeln!(out, "  {} -> {}", attribute, widget)?;
    }

    let template = context.template();
    if !template.tabstops.is_empty() {
        writeln!(out, "tabstops: {}", template.tabstops.join(", "))?;
    }
    if !template.resources.is_empty() {
        writeln!(out, "resources: {}", template.resources.join(", "))?;
    }
    if !context.commands().is_empty() {
        writeln!(out, "commands:")?;
        for command in context.commands() {
            let condition = match &command.condition {
                Some(c) if c.is_remote() => " (remote condition)",
                Some(_) => " (attribute condition)",
                None => "",
            };
            writeln!(out, "  {}{}", command.name, condition)?;
        }
    }

    if bound {
        let invalid = context.invalid_widgets();
        if invalid.is_empty() {
            writeln!(out, "valid: yes")?;
        } else {
            writeln!(out, "valid: no ({})", invalid.join(", "))?;
        }
    }
    Ok(())
}

/// Lists extensions in dependency order with what toggling each would
/// pull in.
pub fn extensions_report(object: &RemoteObjectProxy) -> String {
    let deps = &object.extension_deps;
    let is_active = |e: &str| object.is_active(e);
    let mut ordered = deps.ordered_extensions();
    for name in object.extensions.keys() {
        if !ordered.contains(name) {
            ordered.push(name.clone());
        }
    }

    let mut out = String::new();
    let _ = writeln!(out, "{} ({})", object.dn, object.base_type);
    for name in ordered {
        let active = is_active(name.as_str());
        let state = if active { "active" } else { "inactive" };
        let _ = writeln!(out, "  {} [{}]", name, state);
        let requires = deps.requires(&name);
        if !requires.is_empty() {
            let _ = writeln!(out, "    requires: {}", requires.join(", "));
        }
        let missing = deps.missing_dependencies(&name, is_active);
        if !active && !missing.is_empty() {
            let _ = writeln!(out, "    enabling also enables: {}", missing.join(", "));
        }
        let dependents = deps.existing_dependencies(&name, is_active);
        if active && !dependents.is_empty() {
            let _ = writeln!(out, "    disabling also disables: {}", dependents.join(", "));
        }
    }
    out
}
