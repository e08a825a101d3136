use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ordered value list of one attribute. Single-valued attributes hold at
/// most one element; an empty list means "unset".
pub type Values = Vec<Value>;

/// Per-attribute metadata supplied by the backend.
///
/// Immutable for one refresh cycle: every extend/retract/reload replaces the
/// whole descriptor map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeDescriptor {
    pub mandatory: bool,
    pub readonly: bool,
    pub multivalue: bool,
    #[serde(rename = "type")]
    pub value_type: AttributeType,
    #[serde(alias = "caseSensitive")]
    pub case_sensitive: bool,
    pub unique: bool,
    /// Enumerated choices; empty means free input.
    pub values: Vec<String>,
    /// Attributes whose values are derived from this one.
    #[serde(alias = "dependsOn")]
    pub depends_on: Vec<String>,
    /// The widget is blocked iff every rule currently matches.
    #[serde(alias = "blockedBy")]
    pub blocked_by: Vec<BlockRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Values>,
}

impl AttributeDescriptor {
    /// Shorthand for a plain optional string attribute.
    pub fn string() -> Self {
        Self::default()
    }

    /// Shorthand for a mandatory string attribute.
    pub fn mandatory() -> Self {
        Self {
            mandatory: true,
            ..Self::default()
        }
    }

    /// Adds a blocking rule.
    pub fn with_block_rule(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.blocked_by.push(BlockRule::new(name, value));
        self
    }

    /// Builder-style type setter.
    pub fn with_type(mut self, value_type: AttributeType) -> Self {
        self.value_type = value_type;
        self
    }
}

/// The backend value type of an attribute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeType {
    #[default]
    String,
    UnicodeString,
    Integer,
    Boolean,
    Date,
    Timestamp,
    Binary,
    #[serde(other)]
    Other,
}

/// One `{attributeName, value}` pair of a conditional-disable rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockRule {
    pub name: String,
    pub value: Value,
}

impl BlockRule {
    pub fn new(name: &str, value: impl Into<Value>) -> Self {
        Self {
            name: name.to_string(),
            value: value.into(),
        }
    }

    /// Returns true if `current` satisfies this rule.
    pub fn matches(&self, current: &[Value]) -> bool {
        values_match(current, &self.value)
    }
}

/// Compares an attribute's current values against a rule value.
///
/// Array rule values compare against the whole list; scalars compare
/// against the first value. Scalars are also compared by their string form
/// so `"1"` matches `1` and `"true"` matches `true`. An unset attribute
/// matches `null` and `""`.
pub fn values_match(current: &[Value], expected: &Value) -> bool {
    match expected {
        Value::Array(list) => {
            list.len() == current.len()
                && list.iter().zip(current).all(|(e, c)| scalar_eq(c, e))
        }
        Value::Null => current.is_empty() || current.iter().all(Value::is_null),
        _ => match current.first() {
            Some(first) => scalar_eq(first, expected),
            None => expected.as_str() == Some(""),
        },
    }
}

fn scalar_eq(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (scalar_text(a), scalar_text(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

fn scalar_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
