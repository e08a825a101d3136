//! Pre-fetched UI descriptors, keyed by base type or extension name.

use indexmap::IndexMap;

/// Supplies descriptor XML by page name.
pub trait TemplateSource: Send + Sync {
    fn template(&self, name: &str) -> Option<String>;
}

/// In-memory [`TemplateSource`].
#[derive(Debug, Clone, Default)]
pub struct TemplateCatalog {
    templates: IndexMap<String, String>,
}

impl TemplateCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, xml: impl Into<String>) {
        self.templates.insert(name.to_string(), xml.into());
    }

    pub fn with(mut self, name: &str, xml: impl Into<String>) -> Self {
        self.insert(name, xml);
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl TemplateSource for TemplateCatalog {
    fn template(&self, name: &str) -> Option<String> {
        self.templates.get(name).cloned()
    }
}
