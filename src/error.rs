use thiserror::Error;

pub type Result<T> = std::result::Result<T, MeshweaveError>;

#[derive(Debug, Error)]
pub enum MeshweaveError {
    #[error("Cannot introspect type '{type_name}': {reason}")]
    Reflection { type_name: String, reason: String },

    #[error(
        "Unresolvable dependency: parameter '{parameter}' (#{index}) of '{type_name}' has no value, default or declared type"
    )]
    UnresolvableDependency {
        type_name: String,
        parameter: String,
        index: usize,
    },

    #[error("Circular dependency detected: {cycle}")]
    CircularDependency { cycle: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("Failed to downcast '{id}' to {type_name}")]
    DowncastFailed { id: String, type_name: String },

    #[error("Argument #{index} of '{type_name}': expected {expected}, found {found}")]
    ArgumentMismatch {
        type_name: String,
        index: usize,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Factory for '{id}' failed: {source}")]
    FactoryFailed {
        id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Malformed configuration document: {0}")]
    Config(#[from] serde_json::Error),
}

impl MeshweaveError {
    pub(crate) fn reflection(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Reflection {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
        }
    }

    /// Recovers a container error that travelled through a factory's
    /// `anyhow::Error`, wrapping anything foreign as `FactoryFailed`.
    pub(crate) fn from_factory(id: &str, err: anyhow::Error) -> Self {
        match err.downcast::<MeshweaveError>() {
            Ok(inner) => inner,
            Err(source) => Self::FactoryFailed {
                id: id.to_string(),
                source,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_errors_keep_container_variants() {
        let err = anyhow::Error::new(MeshweaveError::CircularDependency {
            cycle: "a -> b -> a".into(),
        });
        assert!(matches!(
            MeshweaveError::from_factory("a", err),
            MeshweaveError::CircularDependency { .. }
        ));

        let foreign = anyhow::anyhow!("socket closed");
        match MeshweaveError::from_factory("db", foreign) {
            MeshweaveError::FactoryFailed { id, source } => {
                assert_eq!(id, "db");
                assert_eq!(source.to_string(), "socket closed");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
