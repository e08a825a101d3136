//! Widget variants and the class registry.
//!
//! Every control is a [`WidgetNode`] tagged with one [`WidgetKind`] from a
//! closed set. Kind-specific behavior (validation, display of merge values)
//! is a `match` on the kind; new descriptor classes are mapped onto existing
//! kinds through the [`WidgetRegistry`].

use crate::layout::{LayoutKind, Placement};
use crate::property::Properties;
use dirform_model::{AttributeDescriptor, AttributeType, BlockRule, Values};
use serde_json::Value;
use std::collections::HashMap;

/// Index of a node in its [`WidgetTree`](crate::WidgetTree).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WidgetId(pub(crate) usize);

impl WidgetId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// The closed set of widget variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WidgetKind {
    LineEdit,
    PasswordEdit,
    TextEdit,
    CheckBox,
    ComboBox,
    SpinBox,
    DateEdit,
    /// Multi-value list editor.
    ListEdit,
    Label,
    Button,
    GroupBox,
    TabWidget,
    Container,
    Separator,
    Image,
    Spacer,
}

impl WidgetKind {
    /// Kinds that hold an editable value and take part in validation.
    pub fn is_input(&self) -> bool {
        matches!(
            self,
            Self::LineEdit
                | Self::PasswordEdit
                | Self::TextEdit
                | Self::CheckBox
                | Self::ComboBox
                | Self::SpinBox
                | Self::DateEdit
                | Self::ListEdit
        )
    }

    pub fn is_container(&self) -> bool {
        matches!(self, Self::GroupBox | Self::TabWidget | Self::Container)
    }
}

/// Attribute metadata copied onto a widget at bind time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WidgetFlags {
    pub mandatory: bool,
    pub readonly: bool,
    pub multivalue: bool,
    pub case_sensitive: bool,
    pub unique: bool,
    pub value_type: AttributeType,
    pub choices: Vec<String>,
    pub depends_on: Vec<String>,
    pub default: Option<Values>,
}

impl From<&AttributeDescriptor> for WidgetFlags {
    fn from(d: &AttributeDescriptor) -> Self {
        Self {
            mandatory: d.mandatory,
            readonly: d.readonly,
            multivalue: d.multivalue,
            case_sensitive: d.case_sensitive,
            unique: d.unique,
            value_type: d.value_type,
            choices: d.values.clone(),
            depends_on: d.depends_on.clone(),
            default: d.default.clone(),
        }
    }
}

/// Outcome of validating a widget's value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validity {
    Valid,
    Invalid(String),
}

impl Validity {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// Read-only rendition of a value, shown side by side in the merge dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeWidget {
    pub kind: WidgetKind,
    pub display: String,
}

/// One node of the widget tree: structure plus live control state.
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetNode {
    pub name: String,
    /// Declared descriptor class.
    pub class: String,
    pub kind: WidgetKind,
    pub properties: Properties,
    pub layout: Option<LayoutKind>,
    pub placement: Placement,
    pub parent: Option<WidgetId>,
    pub children: Vec<WidgetId>,
    pub flags: WidgetFlags,
    /// Caption taken from the buddy label, if any.
    pub label: Option<String>,
    /// For labels: the widget this label describes.
    pub buddy_of: Option<String>,
    pub block_rules: Vec<BlockRule>,
    value: Values,
    blocked: bool,
    error: Option<String>,
}

impl WidgetNode {
    pub fn new(name: &str, kind: WidgetKind) -> Self {
        Self {
            name: name.to_string(),
            class: String::new(),
            kind,
            properties: Properties::new(),
            layout: None,
            placement: Placement::Root,
            parent: None,
            children: Vec::new(),
            flags: WidgetFlags::default(),
            label: None,
            buddy_of: None,
            block_rules: Vec::new(),
            value: Vec::new(),
            blocked: false,
            error: None,
        }
    }

    pub fn value(&self) -> &[Value] {
        &self.value
    }

    /// Replaces the value. Returns true if it differs from the old one.
    pub fn set_value(&mut self, value: Values) -> bool {
        if self.value == value {
            return false;
        }
        self.value = value;
        true
    }

    pub fn clear(&mut self) {
        self.value.clear();
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    /// Hides the widget and exempts it from validation.
    pub fn block(&mut self) {
        self.blocked = true;
    }

    pub fn unblock(&mut self) {
        self.blocked = false;
    }

    pub fn is_visible(&self) -> bool {
        !self.blocked && self.properties.get_bool("visible").unwrap_or(true)
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Puts the widget into an inline error state.
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Static caption of the widget itself (`text` or `title` property).
    pub fn text(&self) -> Option<&str> {
        self.properties
            .get_str("text")
            .or_else(|| self.properties.get_str("title"))
    }

    pub fn is_validating(&self) -> bool {
        self.kind.is_input()
    }

    /// Checks the current value against the widget's flags and kind.
    pub fn validity(&self) -> Validity {
        if !self.is_validating() {
            return Validity::Valid;
        }
        if let Some(err) = &self.error {
            return Validity::Invalid(err.clone());
        }
        let present: Vec<&Value> = self.value.iter().filter(|v| !is_empty_value(v)).collect();
        if present.is_empty() {
            return if self.flags.mandatory {
                Validity::Invalid("value is mandatory".to_string())
            } else {
                Validity::Valid
            };
        }
        if present.len() > 1 && !self.flags.multivalue && self.kind != WidgetKind::ListEdit {
            return Validity::Invalid("only one value allowed".to_string());
        }
        for value in present {
            if let Err(reason) = self.check_value(value) {
                return Validity::Invalid(reason);
            }
        }
        Validity::Valid
    }

    /// Valid, or exempt because blocked.
    pub fn is_valid(&self) -> bool {
        self.blocked || self.validity().is_valid()
    }

    fn check_value(&self, value: &Value) -> Result<(), String> {
        match self.kind {
            WidgetKind::SpinBox => match value {
                Value::Number(_) => Ok(()),
                Value::String(s) if s.trim().parse::<f64>().is_ok() => Ok(()),
                _ => Err(format!("'{}' is not a number", display_scalar(value))),
            },
            WidgetKind::CheckBox => match value {
                Value::Bool(_) => Ok(()),
                Value::String(s) if s == "true" || s == "false" => Ok(()),
                _ => Err(format!("'{}' is not a boolean", display_scalar(value))),
            },
            WidgetKind::ComboBox if !self.flags.choices.is_empty() => {
                let text = display_scalar(value);
                if self.flags.choices.iter().any(|c| *c == text) {
                    Ok(())
                } else {
                    Err(format!("'{}' is not one of the allowed values", text))
                }
            }
            WidgetKind::DateEdit => {
                let text = display_scalar(value);
                if is_iso_date(&text) {
                    Ok(())
                } else {
                    Err(format!("'{}' is not a date (YYYY-MM-DD)", text))
                }
            }
            _ => Ok(()),
        }
    }

    /// Builds the read-only rendition of `values` for the merge dialog.
    pub fn merge_widget(&self, values: &[Value]) -> MergeWidget {
        let display = match self.kind {
            WidgetKind::PasswordEdit if !values.is_empty() => "••••••".to_string(),
            WidgetKind::CheckBox => match values.first() {
                Some(Value::Bool(true)) => "yes".to_string(),
                Some(Value::String(s)) if s == "true" => "yes".to_string(),
                _ => "no".to_string(),
            },
            _ => values
                .iter()
                .map(display_scalar)
                .collect::<Vec<_>>()
                .join(", "),
        };
        MergeWidget {
            kind: self.kind,
            display,
        }
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn display_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn is_iso_date(text: &str) -> bool {
    let parts: Vec<&str> = text.split('-').collect();
    let [y, m, d] = parts.as_slice() else {
        return false;
    };
    let digits = |s: &str, len: usize| s.len() == len && s.bytes().all(|b| b.is_ascii_digit());
    if !(digits(y, 4) && digits(m, 2) && digits(d, 2)) {
        return false;
    }
    let month: u32 = m.parse().unwrap_or(0);
    let day: u32 = d.parse().unwrap_or(0);
    (1..=12).contains(&month) && (1..=31).contains(&day)
}

/// Creates a fresh widget of one kind, given its name.
pub type WidgetConstructor = fn(&str) -> WidgetNode;

/// Descriptor class name → widget constructor.
#[derive(Clone)]
pub struct WidgetRegistry {
    constructors: HashMap<String, WidgetConstructor>,
}

impl std::fmt::Debug for WidgetRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut classes: Vec<&String> = self.constructors.keys().collect();
        classes.sort();
        f.debug_struct("WidgetRegistry").field("classes", &classes).finish()
    }
}

impl WidgetRegistry {
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Registry with every standard descriptor class.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register("QLineEdit", |n| WidgetNode::new(n, WidgetKind::LineEdit));
        registry.register("QPasswordEdit", |n| WidgetNode::new(n, WidgetKind::PasswordEdit));
        registry.register("QTextEdit", |n| WidgetNode::new(n, WidgetKind::TextEdit));
        registry.register("QPlainTextEdit", |n| WidgetNode::new(n, WidgetKind::TextEdit));
        registry.register("QCheckBox", |n| WidgetNode::new(n, WidgetKind::CheckBox));
        registry.register("QComboBox", |n| WidgetNode::new(n, WidgetKind::ComboBox));
        registry.register("QSpinBox", |n| WidgetNode::new(n, WidgetKind::SpinBox));
        registry.register("QDateEdit", |n| WidgetNode::new(n, WidgetKind::DateEdit));
        registry.register("QDateTimeEdit", |n| WidgetNode::new(n, WidgetKind::DateEdit));
        registry.register("QListWidget", |n| {
            let mut node = WidgetNode::new(n, WidgetKind::ListEdit);
            node.flags.multivalue = true;
            node
        });
        registry.register("QStringList", |n| {
            let mut node = WidgetNode::new(n, WidgetKind::ListEdit);
            node.flags.multivalue = true;
            node
        });
        registry.register("QLabel", |n| WidgetNode::new(n, WidgetKind::Label));
        registry.register("QPushButton", |n| WidgetNode::new(n, WidgetKind::Button));
        registry.register("QToolButton", |n| WidgetNode::new(n, WidgetKind::Button));
        registry.register("QGroupBox", |n| WidgetNode::new(n, WidgetKind::GroupBox));
        registry.register("QTabWidget", |n| WidgetNode::new(n, WidgetKind::TabWidget));
        registry.register("QWidget", |n| WidgetNode::new(n, WidgetKind::Container));
        registry.register("QFrame", |n| WidgetNode::new(n, WidgetKind::Container));
        registry.register("QScrollArea", |n| WidgetNode::new(n, WidgetKind::Container));
        registry.register("Line", |n| WidgetNode::new(n, WidgetKind::Separator));
        registry.register("QGraphicsView", |n| WidgetNode::new(n, WidgetKind::Image));
        registry
    }

    /// Adds or replaces the constructor for `class`.
    pub fn register(&mut self, class: &str, constructor: WidgetConstructor) {
        self.constructors.insert(class.to_string(), constructor);
    }

    pub fn contains(&self, class: &str) -> bool {
        self.constructors.contains_key(class)
    }

    /// Instantiates a widget of `class`, or `None` for unknown classes.
    pub fn create(&self, class: &str, name: &str) -> Option<WidgetNode> {
        let constructor = self.constructors.get(class)?;
        let mut node = constructor(name);
        node.class = class.to_string();
        Some(node)
    }
}

impl Default for WidgetRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
