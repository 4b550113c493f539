use crate::di::Value;
use crate::di::registry::{TypeKind, TypeRegistry};
use crate::error::{MeshweaveError, Result};
use dashmap::DashMap;
use std::sync::Arc;

/// Descriptor of a single constructor parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    name: String,
    index: usize,
    declared: Option<String>,
    default: Option<Value>,
    optional: bool,
}

impl Parameter {
    /// A plain parameter that must be supplied.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            index: 0,
            declared: None,
            default: None,
            optional: false,
        }
    }

    /// A parameter whose declared type is resolved through the container
    /// when no explicit value is given.
    pub fn of_type(name: impl Into<String>, declared: impl Into<String>) -> Self {
        Self {
            declared: Some(declared.into()),
            ..Self::new(name)
        }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self.optional = true;
        self
    }

    /// Omission is legal; a missing value becomes `Value::Null`.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn declared(&self) -> Option<&str> {
        self.declared.as_deref()
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }
}

/// Memoized constructor signature of a concrete type.
#[derive(Debug, Clone, PartialEq)]
pub struct ReflectionEntry {
    type_name: String,
    parameters: Vec<Parameter>,
}

impl ReflectionEntry {
    pub fn new(type_name: impl Into<String>, parameters: Vec<Parameter>) -> Self {
        let parameters = parameters
            .into_iter()
            .enumerate()
            .map(|(index, parameter)| Parameter { index, ..parameter })
            .collect();
        Self {
            type_name: type_name.into(),
            parameters,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn required_count(&self) -> usize {
        self.parameters.iter().filter(|p| !p.optional).count()
    }
}

/// Per-type cache of constructor signatures.
///
/// Entries are keyed by concrete type name and shared by every identifier that
/// binds to that type. Two threads racing on the first lookup compute the same
/// entry; whichever insert lands first is kept.
#[derive(Default)]
pub struct ReflectionCache {
    entries: DashMap<String, Arc<ReflectionEntry>>,
}

impl ReflectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signature(&self, registry: &TypeRegistry, type_name: &str) -> Result<Arc<ReflectionEntry>> {
        if let Some(entry) = self.entries.get(type_name) {
            return Ok(entry.clone());
        }

        let descriptor = registry
            .descriptor(type_name)
            .ok_or_else(|| MeshweaveError::reflection(type_name, "type is not defined"))?;
        let parameters = match descriptor.kind() {
            TypeKind::Abstract => {
                return Err(MeshweaveError::reflection(
                    type_name,
                    "type is abstract and cannot be instantiated",
                ));
            }
            TypeKind::Concrete { signature, .. } => signature(),
        };

        let entry = Arc::new(ReflectionEntry::new(type_name, parameters));
        tracing::trace!(
            "Reflected '{}' with {} parameter(s)",
            type_name,
            entry.parameters.len()
        );
        Ok(self
            .entries
            .entry(type_name.to_string())
            .or_insert(entry)
            .clone())
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.entries.contains_key(type_name)
    }

    pub fn invalidate(&self, type_name: &str) {
        self.entries.remove(type_name);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::di::{Args, Component, TypeDescriptor};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Mailer;

    impl Component for Mailer {}

    #[test]
    fn test_entry_assigns_positions() {
        let entry = ReflectionEntry::new(
            "Mailer",
            vec![
                Parameter::of_type("transport", "Transport"),
                Parameter::new("from").with_default("noreply@example.com"),
                Parameter::new("retries").optional(),
            ],
        );
        let indexes: Vec<_> = entry.parameters().iter().map(Parameter::index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
        assert_eq!(entry.required_count(), 1);
        assert_eq!(entry.parameters()[0].declared(), Some("Transport"));
    }

    #[test]
    fn test_signature_is_computed_once() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        let registry = TypeRegistry::new();
        registry.insert(TypeDescriptor::new(
            "Mailer",
            || {
                CALLS.fetch_add(1, Ordering::SeqCst);
                vec![Parameter::new("from")]
            },
            |_: Args| Ok(Mailer),
        ));

        let cache = ReflectionCache::new();
        let first = cache.signature(&registry, "Mailer").unwrap();
        let second = cache.signature(&registry, "Mailer").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unknown_and_abstract_types_fail() {
        let registry = TypeRegistry::new();
        registry.insert(TypeDescriptor::abstract_type("Transport"));
        let cache = ReflectionCache::new();

        assert!(matches!(
            cache.signature(&registry, "Missing"),
            Err(MeshweaveError::Reflection { .. })
        ));
        assert!(matches!(
            cache.signature(&registry, "Transport"),
            Err(MeshweaveError::Reflection { .. })
        ));
        assert!(cache.is_empty());
    }
}
