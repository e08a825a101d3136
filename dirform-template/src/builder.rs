//! Recursive-descent builder from descriptor XML to a widget tree.

use crate::binding::BindingTable;
use crate::command::Command;
use crate::layout::{FormRole, LayoutKind, Placement, SizePolicyKind};
use crate::property::{Properties, Rect};
use crate::widget::{WidgetId, WidgetKind, WidgetNode, WidgetRegistry};
use crate::xml::XmlElement;
use crate::{TemplateError, TemplateResult};
use dirform_model::BlockRule;
use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{debug, error, warn};

/// Builder settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// The only `<ui version>` accepted.
    pub ui_version: String,
    /// Log a hint when a container falls back to absolute positioning.
    pub migration_hints: bool,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            ui_version: "4.0".to_string(),
            migration_hints: true,
        }
    }
}

/// Arena of widget nodes with a name index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WidgetTree {
    nodes: Vec<WidgetNode>,
    names: IndexMap<String, WidgetId>,
    root: Option<WidgetId>,
}

impl WidgetTree {
    pub fn root(&self) -> Option<WidgetId> {
        self.root
    }

    pub fn get(&self, id: WidgetId) -> Option<&WidgetNode> {
        self.nodes.get(id.0)
    }

    pub fn get_mut(&mut self, id: WidgetId) -> Option<&mut WidgetNode> {
        self.nodes.get_mut(id.0)
    }

    pub fn find(&self, name: &str) -> Option<WidgetId> {
        self.names.get(name).copied()
    }

    pub fn by_name(&self, name: &str) -> Option<&WidgetNode> {
        self.find(name).and_then(|id| self.get(id))
    }

    pub fn by_name_mut(&mut self, name: &str) -> Option<&mut WidgetNode> {
        let id = self.find(name)?;
        self.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (WidgetId, &WidgetNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (WidgetId(i), n))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut WidgetNode> {
        self.nodes.iter_mut()
    }

    /// Depth-first, pre-order walk from the root.
    pub fn walk(&self) -> Vec<WidgetId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<WidgetId> = self.root.into_iter().collect();
        while let Some(id) = stack.pop() {
            order.push(id);
            if let Some(node) = self.get(id) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        order
    }

    /// Nesting depth of `id` below the root.
    pub fn depth(&self, id: WidgetId) -> usize {
        let mut depth = 0;
        let mut current = self.get(id).and_then(|n| n.parent);
        while let Some(parent) = current {
            depth += 1;
            current = self.get(parent).and_then(|n| n.parent);
        }
        depth
    }

    fn push(&mut self, node: WidgetNode) -> WidgetId {
        let id = WidgetId(self.nodes.len());
        if self.names.contains_key(&node.name) {
            warn!(widget = %node.name, "duplicate widget name; only the first is addressable");
        } else {
            self.names.insert(node.name.clone(), id);
        }
        self.nodes.push(node);
        id
    }

    fn adopt(&mut self, parent: WidgetId, child: WidgetId, placement: Placement) {
        if let Some(node) = self.get_mut(child) {
            node.parent = Some(parent);
            node.placement = placement;
        }
        if let Some(node) = self.get_mut(parent) {
            node.children.push(child);
        }
    }
}

/// Everything produced from one descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltTemplate {
    /// `<class>` of the descriptor (the page name).
    pub class_name: String,
    pub tree: WidgetTree,
    /// Properties of the descriptor's root widget (title, icon, …).
    pub properties: Properties,
    pub bindings: BindingTable,
    /// Controlled widget → buddy label widget.
    pub buddies: IndexMap<String, String>,
    pub tabstops: Vec<String>,
    pub resources: Vec<String>,
    pub commands: Vec<Command>,
}

impl BuiltTemplate {
    /// The top-level widget.
    pub fn widget(&self) -> Option<&WidgetNode> {
        self.tree.root().and_then(|id| self.tree.get(id))
    }
}

/// Builds widget trees from descriptors.
#[derive(Debug, Clone, Default)]
pub struct TemplateBuilder {
    registry: WidgetRegistry,
    config: BuilderConfig,
}

impl TemplateBuilder {
    pub fn new(registry: WidgetRegistry, config: BuilderConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &WidgetRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut WidgetRegistry {
        &mut self.registry
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    /// Builds one descriptor.
    ///
    /// Fails only when the document cannot be read, is not a descriptor, or
    /// declares a different UI format version.
    pub fn build(&self, xml: &str) -> TemplateResult<BuiltTemplate> {
        let doc = XmlElement::parse(xml)?;
        if doc.name != "ui" {
            return Err(TemplateError::NotADescriptor(doc.name));
        }
        let found = doc.attr("version").unwrap_or_default();
        if found != self.config.ui_version {
            return Err(TemplateError::VersionMismatch {
                expected: self.config.ui_version.clone(),
                found: found.to_string(),
            });
        }
        let root_el = doc.child("widget").ok_or(TemplateError::MissingRootWidget)?;
        let class_name = doc
            .child_text("class")
            .filter(|c| !c.is_empty())
            .or_else(|| root_el.attr("name"))
            .unwrap_or_default()
            .to_string();

        let mut tree = WidgetTree::default();
        tree.root = self.build_top(root_el, &mut tree);

        let buddies = link_buddies(&mut tree);
        attach_block_rules(&mut tree);
        let bindings = collect_bindings(&doc, &tree);
        let tabstops = collect_tabstops(&doc, &tree);
        let resources = doc
            .child("resources")
            .map(|r| {
                r.children_named("include")
                    .filter_map(|i| i.attr("location").map(String::from))
                    .collect()
            })
            .unwrap_or_default();
        let commands = doc
            .children_named("action")
            .chain(root_el.children_named("action"))
            .filter_map(Command::from_element)
            .collect();

        debug!(
            template = %class_name,
            widgets = tree.len(),
            bindings = bindings.len(),
            "built template"
        );

        Ok(BuiltTemplate {
            class_name,
            tree,
            properties: Properties::from_element(root_el),
            bindings,
            buddies,
            tabstops,
            resources,
            commands,
        })
    }

    fn build_top(&self, root_el: &XmlElement, tree: &mut WidgetTree) -> Option<WidgetId> {
        let kids: Vec<&XmlElement> = root_el.children_named("widget").collect();
        let is_tabs = root_el.attr("class") == Some("QTabWidget");
        if root_el.child("layout").is_none() && kids.len() == 1 && !is_tabs {
            return self.build_widget(kids[0], tree);
        }
        self.build_widget(root_el, tree)
    }

    fn build_widget(&self, el: &XmlElement, tree: &mut WidgetTree) -> Option<WidgetId> {
        let class = el.attr("class").unwrap_or_default();
        let name = el
            .attr("name")
            .map(String::from)
            .unwrap_or_else(|| format!("{}_{}", class, tree.len()));
        let Some(mut node) = self.registry.create(class, &name) else {
            error!(class, widget = %name, "unknown widget class; skipping subtree");
            return None;
        };
        node.properties = Properties::from_element(el);
        if node.kind == WidgetKind::LineEdit
            && node.properties.get_str("echoMode").is_some_and(is_password_echo)
        {
            node.kind = WidgetKind::PasswordEdit;
        }
        let id = tree.push(node);

        match el.child("layout") {
            Some(layout_el) => self.apply_layout(layout_el, id, tree),
            None => self.place_free_children(el, id, tree),
        }
        Some(id)
    }

    fn apply_layout(&self, layout_el: &XmlElement, owner: WidgetId, tree: &mut WidgetTree) {
        let class = layout_el.attr("class").unwrap_or_default();
        let Some(kind) = LayoutKind::from_class(class) else {
            error!(layout = class, "unknown layout class; skipping its items");
            return;
        };
        if let Some(node) = tree.get_mut(owner) {
            node.layout = Some(kind);
        }
        let stretch = stretch_factors(&Properties::from_element(layout_el));

        for (index, item) in layout_el.children_named("item").enumerate() {
            let Some(content) = item.children.first() else {
                continue;
            };
            let child = match content.name.as_str() {
                "widget" => self.build_widget(content, tree),
                "layout" => self.build_nested_layout(content, tree),
                "spacer" => Some(build_spacer(content, tree)),
                other => {
                    warn!(element = other, "unexpected layout item; skipping");
                    None
                }
            };
            let Some(child) = child else {
                continue;
            };
            let placement = match kind {
                LayoutKind::Grid => Placement::Grid {
                    row: item.attr_u32("row").unwrap_or(0),
                    column: item.attr_u32("column").unwrap_or(0),
                    rowspan: item.attr_u32("rowspan").unwrap_or(1),
                    colspan: item.attr_u32("colspan").unwrap_or(1),
                },
                LayoutKind::Form => Placement::Form {
                    row: item.attr_u32("row").unwrap_or(index as u32),
                    role: form_role(item),
                },
                LayoutKind::Horizontal | LayoutKind::Vertical => Placement::Box {
                    index,
                    flex: item_flex(tree.get(child), kind, stretch.get(index).copied()),
                },
                LayoutKind::Canvas => Placement::Absolute(Rect::default()),
            };
            tree.adopt(owner, child, placement);
        }
    }

    /// A layout nested directly in a layout gets an anonymous container.
    fn build_nested_layout(&self, layout_el: &XmlElement, tree: &mut WidgetTree) -> Option<WidgetId> {
        let class = layout_el.attr("class").unwrap_or_default();
        let name = layout_el
            .attr("name")
            .map(String::from)
            .unwrap_or_else(|| format!("{}_{}", class, tree.len()));
        let mut node = WidgetNode::new(&name, WidgetKind::Container);
        node.class = class.to_string();
        let id = tree.push(node);
        self.apply_layout(layout_el, id, tree);
        Some(id)
    }

    /// Children of a container without a layout: tab pages, a single filling
    /// child, or an absolute-position canvas.
    fn place_free_children(&self, el: &XmlElement, owner: WidgetId, tree: &mut WidgetTree) {
        let kids: Vec<&XmlElement> = el.children_named("widget").collect();
        if kids.is_empty() {
            return;
        }
        let owner_kind = tree.get(owner).map(|n| n.kind);

        if owner_kind == Some(WidgetKind::TabWidget) {
            for (index, kid) in kids.into_iter().enumerate() {
                if let Some(child) = self.build_widget(kid, tree) {
                    tree.adopt(owner, child, Placement::Page { index });
                }
            }
            return;
        }

        if kids.len() == 1 {
            if let Some(child) = self.build_widget(kids[0], tree) {
                tree.adopt(owner, child, Placement::Root);
            }
            return;
        }

        if self.config.migration_hints {
            let name = tree.get(owner).map(|n| n.name.clone()).unwrap_or_default();
            warn!(
                widget = %name,
                children = kids.len(),
                "container without layout uses absolute positioning; consider migrating it to a layout"
            );
        }
        if let Some(node) = tree.get_mut(owner) {
            node.layout = Some(LayoutKind::Canvas);
        }
        for kid in kids {
            if let Some(child) = self.build_widget(kid, tree) {
                let rect = tree
                    .get(child)
                    .and_then(|n| n.properties.rect("geometry"))
                    .unwrap_or_default();
                tree.adopt(owner, child, Placement::Absolute(rect));
            }
        }
    }
}

fn build_spacer(el: &XmlElement, tree: &mut WidgetTree) -> WidgetId {
    let name = el
        .attr("name")
        .map(String::from)
        .unwrap_or_else(|| format!("spacer_{}", tree.len()));
    let mut node = WidgetNode::new(&name, WidgetKind::Spacer);
    node.class = "spacer".to_string();
    node.properties = Properties::from_element(el);
    tree.push(node)
}

fn form_role(item: &XmlElement) -> FormRole {
    if item.attr_u32("colspan").unwrap_or(1) >= 2 {
        FormRole::Spanning
    } else if item.attr_u32("column").unwrap_or(0) == 0 {
        FormRole::Label
    } else {
        FormRole::Field
    }
}

/// `stretch` property of a box layout: comma-separated per-item factors.
fn stretch_factors(props: &Properties) -> Vec<u32> {
    props
        .get_str("stretch")
        .map(|s| s.split(',').map(|f| f.trim().parse().unwrap_or(0)).collect())
        .unwrap_or_default()
}

fn item_flex(node: Option<&WidgetNode>, layout: LayoutKind, stretch: Option<u32>) -> u32 {
    if let Some(stretch) = stretch.filter(|s| *s > 0) {
        return stretch;
    }
    let Some(node) = node else {
        return SizePolicyKind::Preferred.flex();
    };
    if node.kind == WidgetKind::Spacer {
        return node
            .properties
            .get_str("sizeType")
            .and_then(SizePolicyKind::parse)
            .unwrap_or(SizePolicyKind::Expanding)
            .flex();
    }
    node.properties
        .size_policy()
        .map(|p| p.flex(layout))
        .unwrap_or_else(|| SizePolicyKind::Preferred.flex())
}

/// Pairs labels with the widgets they describe and copies the caption over.
fn link_buddies(tree: &mut WidgetTree) -> IndexMap<String, String> {
    let pairs: Vec<(String, String, Option<String>)> = tree
        .iter()
        .filter_map(|(_, node)| {
            let target = node.properties.get_str("buddy")?;
            Some((node.name.clone(), target.to_string(), node.text().map(clean_caption)))
        })
        .collect();

    let mut buddies = IndexMap::new();
    for (label, target, caption) in pairs {
        let Some(controlled) = tree.by_name_mut(&target) else {
            error!(label = %label, buddy = %target, "buddy refers to unknown widget; skipping");
            continue;
        };
        if controlled.label.is_none() {
            controlled.label = caption;
        }
        if let Some(label_node) = tree.by_name_mut(&label) {
            label_node.buddy_of = Some(target.clone());
        }
        buddies.insert(target, label);
    }
    buddies
}

fn is_password_echo(mode: &str) -> bool {
    let mode = mode.rsplit("::").next().unwrap_or(mode);
    mode == "Password" || mode == "PasswordEchoOnEdit"
}

fn clean_caption(text: &str) -> String {
    text.replace('&', "").trim().trim_end_matches(':').trim().to_string()
}

fn attach_block_rules(tree: &mut WidgetTree) {
    for node in tree.iter_mut() {
        let Some(raw) = node.properties.get_str("blockedBy") else {
            continue;
        };
        match serde_json::from_str::<Vec<BlockRule>>(raw) {
            Ok(rules) => node.block_rules = rules,
            Err(e) => warn!(widget = %node.name, error = %e, "ignoring malformed blockedBy"),
        }
    }
}

fn collect_bindings(doc: &XmlElement, tree: &WidgetTree) -> BindingTable {
    let mut table = BindingTable::new();
    let Some(connections) = doc.child("connections") else {
        return table;
    };
    for connection in connections.children_named("connection") {
        let sender = connection.child_text("sender").unwrap_or_default();
        let slot = connection
            .child_text("slot")
            .unwrap_or_default()
            .trim_end_matches("()");
        if sender.is_empty() || slot.is_empty() {
            warn!("incomplete connection; skipping");
            continue;
        }
        if tree.find(sender).is_none() {
            error!(widget = sender, attribute = slot, "connection from unknown widget; skipping");
            continue;
        }
        table.bind(slot, sender);
    }
    table
}

fn collect_tabstops(doc: &XmlElement, tree: &WidgetTree) -> Vec<String> {
    let Some(tabstops) = doc.child("tabstops") else {
        return Vec::new();
    };
    tabstops
        .children_named("tabstop")
        .filter_map(|t| {
            if tree.find(&t.text).is_some() {
                Some(t.text.clone())
            } else {
                warn!(widget = %t.text, "tabstop refers to unknown widget; skipping");
                None
            }
        })
        .collect()
}
