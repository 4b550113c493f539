use crate::di::{Container, Object, Value};
use crate::error::{MeshweaveError, Result};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A deferred pointer at another identifier.
///
/// Registered configuration stores `InstanceRef`s instead of built objects so
/// that nothing is constructed at registration time. The container swaps each
/// reference for `container.get(id)` when the argument or property is used.
///
/// # Example
/// ```
/// use meshweave::{Binding, Config, Container, InstanceRef};
///
/// let container = Container::new();
/// container
///     .register(
///         "mailer",
///         Binding::Config(Config::of_type("SmtpMailer").property("transport", InstanceRef::of("smtp"))),
///         Default::default(),
///     )
///     .unwrap();
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct InstanceRef {
    id: String,
}

impl InstanceRef {
    pub fn of(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Resolve the referenced identifier.
    pub fn get(&self, container: &Container) -> Result<Object> {
        container.get(&self.id)
    }

    /// Resolve and downcast the referenced identifier.
    pub fn get_as<T: Any + Send + Sync>(&self, container: &Container) -> Result<Arc<T>> {
        container.get_as::<T>(&self.id)
    }

    /// Turns a reference, an identifier string or an already built object
    /// into an `Arc<T>`.
    pub fn ensure<T: Any + Send + Sync>(value: Value, container: &Container) -> Result<Arc<T>> {
        let (id, object) = match value {
            Value::Ref(reference) => {
                let object = reference.get(container)?;
                (reference.id, object)
            }
            Value::Str(id) => {
                let object = container.get(&id)?;
                (id, object)
            }
            Value::Object(object) => ("<object>".to_string(), object),
            other => {
                return Err(MeshweaveError::invalid_config(format!(
                    "expected an instance reference, identifier or object, found {}",
                    other.kind()
                )));
            }
        };
        object
            .downcast::<T>()
            .map_err(|_| MeshweaveError::DowncastFailed {
                id,
                type_name: std::any::type_name::<T>().to_string(),
            })
    }
}

impl fmt::Debug for InstanceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InstanceRef({})", self.id)
    }
}

impl fmt::Display for InstanceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::di::Binding;

    #[derive(Debug)]
    struct Cache {
        ttl: u32,
    }

    fn container_with_cache() -> Container {
        let container = Container::new();
        container
            .register_singleton("cache", Binding::instance(Cache { ttl: 60 }), Default::default())
            .unwrap();
        container
    }

    #[test]
    fn test_ensure_accepts_reference_identifier_and_object() {
        let container = container_with_cache();

        let by_ref = InstanceRef::ensure::<Cache>(InstanceRef::of("cache").into(), &container).unwrap();
        let by_id = InstanceRef::ensure::<Cache>("cache".into(), &container).unwrap();
        assert!(Arc::ptr_eq(&by_ref, &by_id));

        let direct = InstanceRef::ensure::<Cache>(Value::object(Cache { ttl: 5 }), &container).unwrap();
        assert_eq!(direct.ttl, 5);
    }

    #[test]
    fn test_ensure_rejects_wrong_type() {
        let container = container_with_cache();
        let err = InstanceRef::ensure::<String>("cache".into(), &container).unwrap_err();
        assert!(matches!(err, MeshweaveError::DowncastFailed { .. }));

        let err = InstanceRef::ensure::<Cache>(Value::Int(1), &container).unwrap_err();
        assert!(matches!(err, MeshweaveError::InvalidConfiguration { .. }));
    }
}
