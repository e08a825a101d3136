//! Widget and layout properties.
//!
//! A `<property name="…">` holds exactly one typed value element, or a list
//! of nested `<property>` elements forming a key/value map.

use crate::layout::SizePolicy;
use crate::xml::XmlElement;
use indexmap::IndexMap;
use tracing::warn;

/// Geometry rectangle in descriptor units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// One typed property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    String(String),
    Bool(bool),
    Number(f64),
    /// `Qt::Horizontal`, `QSizePolicy::Expanding`, …
    Enum(String),
    /// `|`-separated flag set.
    Set(Vec<String>),
    Rect(Rect),
    Size { width: u32, height: u32 },
    SizePolicy(SizePolicy),
    /// Resource path of an icon.
    Icon(String),
    StringList(Vec<String>),
    Map(Properties),
}

impl PropertyValue {
    /// String form for text-like values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::Enum(s) | Self::Icon(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::String(s) => match s.as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    fn from_element(value: &XmlElement) -> Option<Self> {
        let text = value.text.as_str();
        let parsed = match value.name.as_str() {
            "string" | "cstring" => Self::String(text.to_string()),
            "bool" => Self::Bool(text.eq_ignore_ascii_case("true")),
            "number" | "double" | "float" => Self::Number(text.parse().ok()?),
            "enum" => Self::Enum(text.to_string()),
            "set" => Self::Set(
                text.split('|')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            ),
            "rect" => Self::Rect(Rect {
                x: child_number(value, "x")?,
                y: child_number(value, "y")?,
                width: child_number(value, "width")?,
                height: child_number(value, "height")?,
            }),
            "size" => Self::Size {
                width: child_number(value, "width")?,
                height: child_number(value, "height")?,
            },
            "sizepolicy" => Self::SizePolicy(SizePolicy::from_element(value)),
            "iconset" | "pixmap" => {
                let path = value
                    .child_text("normaloff")
                    .filter(|t| !t.is_empty())
                    .or_else(|| (!text.is_empty()).then_some(text))
                    .or_else(|| value.attr("resource"))?;
                Self::Icon(path.to_string())
            }
            "stringlist" => Self::StringList(
                value
                    .children_named("string")
                    .map(|s| s.text.clone())
                    .collect(),
            ),
            _ => return None,
        };
        Some(parsed)
    }
}

fn child_number<T: std::str::FromStr>(element: &XmlElement, name: &str) -> Option<T> {
    element.child_text(name)?.trim().parse().ok()
}

/// Ordered property map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties(IndexMap<String, PropertyValue>);

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collects every `<property>` child of `element`.
    ///
    /// Properties whose value cannot be read are logged and dropped.
    pub fn from_element(element: &XmlElement) -> Self {
        let mut props = Self::new();
        for property in element.children_named("property") {
            let Some(name) = property.attr("name") else {
                warn!("property without name in <{}>", element.name);
                continue;
            };
            match Self::read_value(property) {
                Some(value) => {
                    props.0.insert(name.to_string(), value);
                }
                None => warn!(property = name, "skipping malformed property"),
            }
        }
        props
    }

    fn read_value(property: &XmlElement) -> Option<PropertyValue> {
        if property.children.iter().any(|c| c.name == "property") {
            return Some(PropertyValue::Map(Self::from_element(property)));
        }
        PropertyValue::from_element(property.children.first()?)
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.0.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(PropertyValue::as_str)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(PropertyValue::as_bool)
    }

    pub fn rect(&self, name: &str) -> Option<Rect> {
        match self.get(name)? {
            PropertyValue::Rect(r) => Some(*r),
            _ => None,
        }
    }

    pub fn size_policy(&self) -> Option<SizePolicy> {
        match self.get("sizePolicy")? {
            PropertyValue::SizePolicy(p) => Some(*p),
            _ => None,
        }
    }

    pub fn insert(&mut self, name: &str, value: PropertyValue) {
        self.0.insert(name.to_string(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}
