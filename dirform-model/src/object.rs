use crate::descriptor::{AttributeDescriptor, Values};
use crate::extension::ExtensionDependencyGraph;
use crate::{ModelError, ModelResult};
use dirform_types::ObjectId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Local mirror of one open directory object.
///
/// Created from the `openObject` result, refreshed wholesale by
/// `reloadObject` and after every extend/retract, and mutated attribute by
/// attribute as the user edits. The backend owns the authoritative copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteObjectProxy {
    pub uuid: ObjectId,
    pub dn: String,
    pub base_type: String,
    /// Extension name → active flag, in backend order.
    #[serde(default)]
    pub extensions: IndexMap<String, bool>,
    #[serde(default)]
    pub extension_deps: ExtensionDependencyGraph,
    #[serde(default)]
    pub attributes: IndexMap<String, Values>,
    #[serde(default)]
    pub descriptors: IndexMap<String, AttributeDescriptor>,
}

impl RemoteObjectProxy {
    /// Parses an object state payload.
    pub fn from_value(value: Value) -> ModelResult<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Replaces everything but the identity with a freshly fetched state.
    pub fn refresh_from(&mut self, fresh: RemoteObjectProxy) {
        self.dn = fresh.dn;
        self.base_type = fresh.base_type;
        self.extensions = fresh.extensions;
        self.extension_deps = fresh.extension_deps;
        self.attributes = fresh.attributes;
        self.descriptors = fresh.descriptors;
    }

    /// Current values of `name`; unset attributes read as empty.
    pub fn get(&self, name: &str) -> &[Value] {
        self.attributes.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Sets the local value of `name`, enforcing the multivalue flag.
    pub fn set(&mut self, name: &str, values: Values) -> ModelResult<()> {
        self.check(name, &values)?;
        self.attributes.insert(name.to_string(), values);
        Ok(())
    }

    /// Returns the error [`Self::set`] would raise for `values`, without
    /// changing anything.
    pub fn check(&self, name: &str, values: &[Value]) -> ModelResult<()> {
        match self.descriptors.get(name) {
            Some(descriptor) if !descriptor.multivalue && values.len() > 1 => {
                debug!(attribute = name, count = values.len(), "rejecting values for single-valued attribute");
                Err(ModelError::TooManyValues(name.to_string(), values.len()))
            }
            _ => Ok(()),
        }
    }

    pub fn descriptor(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.descriptors.get(name)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.descriptors.contains_key(name) || self.attributes.contains_key(name)
    }

    pub fn is_active(&self, extension: &str) -> bool {
        self.extensions.get(extension).copied().unwrap_or(false)
    }

    /// Active extensions in dependency order.
    pub fn active_extensions(&self) -> Vec<String> {
        let mut ordered = self.extension_deps.ordered_extensions();
        for name in self.extensions.keys() {
            if !ordered.contains(name) {
                ordered.push(name.clone());
            }
        }
        ordered.retain(|name| self.is_active(name));
        ordered
    }

    pub fn set_extension_active(&mut self, extension: &str, active: bool) -> ModelResult<()> {
        match self.extensions.get_mut(extension) {
            Some(flag) => {
                *flag = active;
                Ok(())
            }
            None => {
                warn!(extension, object = %self.uuid, "extension flag for unknown extension");
                Err(ModelError::UnknownExtension(extension.to_string()))
            }
        }
    }

    /// Resolves a condition argument: `dn`, `uuid`, `base_type`, or an
    /// attribute name. Unknown names resolve to `null`.
    pub fn resolve_argument(&self, name: &str) -> Value {
        match name {
            "dn" => Value::String(self.dn.clone()),
            "uuid" => Value::String(self.uuid.to_string()),
            "base_type" | "baseType" => Value::String(self.base_type.clone()),
            _ => match self.attributes.get(name) {
                Some(values) if self.descriptor(name).is_some_and(|d| d.multivalue) => {
                    Value::Array(values.clone())
                }
                Some(values) => values.first().cloned().unwrap_or(Value::Null),
                None => Value::Null,
            },
        }
    }
}
