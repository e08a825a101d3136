use indexmap::IndexMap;
use tracing::error;

/// Attribute path ↔ widget name, scoped to one context.
///
/// An attribute path maps to at most one widget and a widget to at most one
/// attribute; conflicting entries are rejected and logged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingTable {
    by_attribute: IndexMap<String, String>,
    by_widget: IndexMap<String, String>,
}

impl BindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `attribute` to `widget`. Returns false (and logs) if either
    /// side is already bound elsewhere.
    pub fn bind(&mut self, attribute: &str, widget: &str) -> bool {
        if let Some(existing) = self.by_attribute.get(attribute) {
            if existing != widget {
                error!(attribute, widget, existing = %existing, "attribute already bound; skipping binding");
            }
            return false;
        }
        if let Some(existing) = self.by_widget.get(widget) {
            error!(attribute, widget, existing = %existing, "widget already bound; skipping binding");
            return false;
        }
        self.by_attribute.insert(attribute.to_string(), widget.to_string());
        self.by_widget.insert(widget.to_string(), attribute.to_string());
        true
    }

    /// Drops the binding of `attribute`, if any.
    pub fn unbind(&mut self, attribute: &str) -> Option<String> {
        let widget = self.by_attribute.shift_remove(attribute)?;
        self.by_widget.shift_remove(&widget);
        Some(widget)
    }

    pub fn widget_for(&self, attribute: &str) -> Option<&str> {
        self.by_attribute.get(attribute).map(String::as_str)
    }

    pub fn attribute_for(&self, widget: &str) -> Option<&str> {
        self.by_widget.get(widget).map(String::as_str)
    }

    /// `(attribute, widget)` pairs in connection order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.by_attribute.iter().map(|(a, w)| (a.as_str(), w.as_str()))
    }

    pub fn len(&self) -> usize {
        self.by_attribute.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_attribute.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_both_directions() {
        let mut table = BindingTable::new();
        assert!(table.bind("uid", "uidEdit"));
        assert_eq!(table.widget_for("uid"), Some("uidEdit"));
        assert_eq!(table.attribute_for("uidEdit"), Some("uid"));
    }

    #[test]
    fn one_widget_per_attribute() {
        let mut table = BindingTable::new();
        assert!(table.bind("uid", "uidEdit"));
        assert!(!table.bind("uid", "otherEdit"));
        assert!(!table.bind("cn", "uidEdit"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn unbind_clears_inverse() {
        let mut table = BindingTable::new();
        table.bind("uid", "uidEdit");
        assert_eq!(table.unbind("uid").as_deref(), Some("uidEdit"));
        assert!(table.attribute_for("uidEdit").is_none());
    }
}
