use crate::di::{Container, Object, Value};
use crate::error::{MeshweaveError, Result};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Callable producing an object directly, bypassing reflection.
pub type Factory =
    Arc<dyn Fn(&Container, &Params, &Properties) -> anyhow::Result<Object> + Send + Sync>;

/// Turns a built implementation into a shared trait object.
///
/// The result is stored as `Arc<Arc<dyn Trait>>` so it can travel as an
/// [`Object`]; `Container::get_trait` and `Args::take_trait` unwrap it.
#[derive(Clone)]
pub struct Caster {
    implementation: &'static str,
    cast: Arc<dyn Fn(Object) -> Option<Object> + Send + Sync>,
}

impl Caster {
    pub fn new<Trait, Impl, F>(caster: F) -> Self
    where
        Trait: ?Sized + Send + Sync + 'static,
        Impl: Any + Send + Sync,
        F: Fn(Arc<Impl>) -> Arc<Trait> + Send + Sync + 'static,
    {
        Self {
            implementation: std::any::type_name::<Impl>(),
            cast: Arc::new(move |object: Object| {
                let concrete = object.downcast::<Impl>().ok()?;
                let shared: Arc<Trait> = caster(concrete);
                Some(Arc::new(shared) as Object)
            }),
        }
    }

    /// Rust type name of the implementation the caster accepts.
    pub fn implementation(&self) -> &'static str {
        self.implementation
    }

    /// `None` when `object` is not the expected implementation.
    pub(crate) fn cast(&self, object: Object) -> Option<Object> {
        (self.cast)(object)
    }
}

/// Positional constructor arguments keyed by position.
///
/// Positions may be sparse: only the supplied positions override the
/// registered ones when two lists are merged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    values: BTreeMap<usize, Value>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, index: usize, value: impl Into<Value>) -> Self {
        self.set(index, value);
        self
    }

    pub fn set(&mut self, index: usize, value: impl Into<Value>) {
        self.values.insert(index, value.into());
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(&index)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Value)> {
        self.values.iter().map(|(i, v)| (*i, v))
    }

    /// `self` overlaid with `overrides`; positions in `overrides` win.
    pub fn merged(&self, overrides: &Params) -> Params {
        let mut values = self.values.clone();
        values.extend(overrides.values.iter().map(|(i, v)| (*i, v.clone())));
        Params { values }
    }
}

impl<V: Into<Value>> FromIterator<V> for Params {
    /// Dense positions starting at zero.
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Params {
            values: iter.into_iter().map(Into::into).enumerate().collect(),
        }
    }
}

impl<V: Into<Value>> From<Vec<V>> for Params {
    fn from(values: Vec<V>) -> Self {
        values.into_iter().collect()
    }
}

/// Ordered property assignments applied after construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
    entries: Vec<(String, Value)>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Replaces an existing entry in place, otherwise appends.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// `self` overlaid with `overrides`; colliding names keep their original
    /// position but take the override's value.
    pub fn merged(&self, overrides: &Properties) -> Properties {
        let mut merged = self.clone();
        for (name, value) in &overrides.entries {
            merged.set(name.clone(), value.clone());
        }
        merged
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut properties = Properties::new();
        for (name, value) in iter {
            properties.set(name, value);
        }
        properties
    }
}

/// A configuration binding: an optional concrete type plus properties.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub type_name: Option<String>,
    pub properties: Properties,
}

impl Config {
    /// Configuration for the identifier's own type.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of_type(type_name: impl Into<String>) -> Self {
        Self {
            type_name: Some(type_name.into()),
            properties: Properties::new(),
        }
    }

    pub fn property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.set(name, value);
        self
    }
}

/// What a caller hands to `register`.
#[derive(Clone)]
pub enum Binding {
    /// A concrete type (or another identifier) by name.
    Class(String),
    Config(Config),
    Factory(Factory),
    /// An already built object, returned as-is.
    Instance(Object),
    /// Resolve `target` and expose it as a trait object.
    Interface { target: String, caster: Caster },
}

impl Binding {
    pub fn class(type_name: impl Into<String>) -> Self {
        Binding::Class(type_name.into())
    }

    pub fn factory<F>(factory: F) -> Self
    where
        F: Fn(&Container, &Params, &Properties) -> anyhow::Result<Object> + Send + Sync + 'static,
    {
        Binding::Factory(Arc::new(factory))
    }

    pub fn instance<T: Any + Send + Sync>(instance: T) -> Self {
        Binding::Instance(Arc::new(instance))
    }

    /// Bind to `target`, whose object must be an `Impl`, cast to `Trait`.
    ///
    /// ```
    /// use meshweave::prelude::*;
    ///
    /// trait Mailer: Send + Sync {}
    /// struct SmtpMailer;
    /// impl Mailer for SmtpMailer {}
    ///
    /// let container = Container::new();
    /// container
    ///     .register("SmtpMailer", Binding::instance(SmtpMailer), Params::new())
    ///     .unwrap();
    /// container
    ///     .register(
    ///         "Mailer",
    ///         Binding::interface::<dyn Mailer, SmtpMailer, _>("SmtpMailer", |m| m as Arc<dyn Mailer>),
    ///         Params::new(),
    ///     )
    ///     .unwrap();
    /// let _mailer: Arc<dyn Mailer> = container.get_trait("Mailer").unwrap();
    /// ```
    pub fn interface<Trait, Impl, F>(target: impl Into<String>, caster: F) -> Self
    where
        Trait: ?Sized + Send + Sync + 'static,
        Impl: Any + Send + Sync,
        F: Fn(Arc<Impl>) -> Arc<Trait> + Send + Sync + 'static,
    {
        Binding::Interface {
            target: target.into(),
            caster: Caster::new::<Trait, Impl, F>(caster),
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Class(name) => f.debug_tuple("Class").field(name).finish(),
            Binding::Config(config) => f.debug_tuple("Config").field(config).finish(),
            Binding::Factory(_) => f.write_str("Factory(..)"),
            Binding::Instance(_) => f.write_str("Instance(..)"),
            Binding::Interface { target, caster } => f
                .debug_struct("Interface")
                .field("target", target)
                .field("implementation", &caster.implementation())
                .finish(),
        }
    }
}

impl From<&str> for Binding {
    fn from(type_name: &str) -> Self {
        Binding::class(type_name)
    }
}

impl From<Config> for Binding {
    fn from(config: Config) -> Self {
        Binding::Config(config)
    }
}

/// Normalized construction recipe.
#[derive(Clone)]
pub(crate) enum Recipe {
    /// Build `type_name` directly; it equals the identifier.
    Class {
        type_name: String,
        properties: Properties,
    },
    /// Delegate to `target`, forwarding merged params and properties.
    Alias {
        target: String,
        properties: Properties,
    },
    Factory(Factory),
    Instance(Object),
    /// Resolve `target`, then cast it to a trait object.
    Cast { target: String, caster: Caster },
}

/// Public summary of what an identifier is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefinitionKind {
    Class(String),
    Alias(String),
    Factory,
    Instance,
    Interface(String),
}

#[derive(Clone)]
pub(crate) struct Definition {
    pub(crate) recipe: Recipe,
    pub(crate) params: Params,
    pub(crate) singleton: bool,
    /// Bumped on every registration; guards singleton stores against a
    /// definition replaced mid-build.
    pub(crate) revision: u64,
}

impl Definition {
    pub(crate) fn normalize(
        id: &str,
        binding: Binding,
        params: Params,
        singleton: bool,
        revision: u64,
    ) -> Result<Self> {
        let recipe = match binding {
            Binding::Class(type_name) => Self::class_recipe(id, type_name, Properties::new())?,
            Binding::Config(Config {
                type_name,
                properties,
            }) => {
                let type_name = type_name.unwrap_or_else(|| id.to_string());
                Self::class_recipe(id, type_name, properties)?
            }
            Binding::Factory(factory) => Recipe::Factory(factory),
            Binding::Instance(object) => Recipe::Instance(object),
            Binding::Interface { target, caster } => {
                if target.trim().is_empty() || target == id {
                    return Err(MeshweaveError::invalid_config(format!(
                        "interface binding for '{id}' must target another identifier"
                    )));
                }
                Recipe::Cast { target, caster }
            }
        };
        Ok(Self {
            recipe,
            params,
            singleton,
            revision,
        })
    }

    fn class_recipe(id: &str, type_name: String, properties: Properties) -> Result<Recipe> {
        if type_name.trim().is_empty() {
            return Err(MeshweaveError::invalid_config(format!(
                "definition for '{id}' names an empty type"
            )));
        }
        Ok(if type_name == id {
            Recipe::Class {
                type_name,
                properties,
            }
        } else {
            Recipe::Alias {
                target: type_name,
                properties,
            }
        })
    }

    pub(crate) fn kind(&self) -> DefinitionKind {
        match &self.recipe {
            Recipe::Class { type_name, .. } => DefinitionKind::Class(type_name.clone()),
            Recipe::Alias { target, .. } => DefinitionKind::Alias(target.clone()),
            Recipe::Factory(_) => DefinitionKind::Factory,
            Recipe::Instance(_) => DefinitionKind::Instance,
            Recipe::Cast { target, .. } => DefinitionKind::Interface(target.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(id: &str, binding: Binding) -> Result<Definition> {
        Definition::normalize(id, binding, Params::new(), false, 0)
    }

    #[test]
    fn test_normalize_class_and_alias() {
        let same = normalize("Mailer", Binding::class("Mailer")).unwrap();
        assert_eq!(same.kind(), DefinitionKind::Class("Mailer".into()));

        let alias = normalize("mailer", "SmtpMailer".into()).unwrap();
        assert_eq!(alias.kind(), DefinitionKind::Alias("SmtpMailer".into()));

        let untyped = normalize("Mailer", Config::new().property("host", "localhost").into()).unwrap();
        assert_eq!(untyped.kind(), DefinitionKind::Class("Mailer".into()));
    }

    #[test]
    fn test_normalize_rejects_empty_type() {
        let err = normalize("mailer", Config::of_type(" ").into()).err().unwrap();
        assert!(matches!(err, MeshweaveError::InvalidConfiguration { .. }));
    }

    trait Notifier: Send + Sync {}

    struct Pager;

    impl Notifier for Pager {}

    #[test]
    fn test_normalize_interface_binding() {
        let bound = normalize(
            "Notifier",
            Binding::interface::<dyn Notifier, Pager, _>("Pager", |p| p as Arc<dyn Notifier>),
        )
        .unwrap();
        assert_eq!(bound.kind(), DefinitionKind::Interface("Pager".into()));

        let err = normalize(
            "Notifier",
            Binding::interface::<dyn Notifier, Pager, _>("Notifier", |p| p as Arc<dyn Notifier>),
        )
        .err()
        .unwrap();
        assert!(matches!(err, MeshweaveError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_caster_rejects_other_implementations() {
        let caster = Caster::new::<dyn Notifier, Pager, _>(|p| p as Arc<dyn Notifier>);
        assert!(caster.cast(Arc::new(Pager)).is_some());
        assert!(caster.cast(Arc::new(7u8)).is_none());
        assert!(caster.implementation().ends_with("Pager"));
    }

    #[test]
    fn test_params_merge_by_position() {
        let registered = Params::from(vec!["sqlite:app.db", "admin"]);
        let call_site = Params::new().with(1, "root").with(3, true);
        let merged = registered.merged(&call_site);

        assert_eq!(merged.get(0), Some(&Value::from("sqlite:app.db")));
        assert_eq!(merged.get(1), Some(&Value::from("root")));
        assert_eq!(merged.get(2), None);
        assert_eq!(merged.get(3), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_properties_merge_keeps_order() {
        let registered: Properties = [("dsn", "sqlite:a.db"), ("charset", "latin1")]
            .into_iter()
            .collect();
        let merged = registered.merged(&Properties::new().with("timeout", 5).with("charset", "utf8"));

        let names: Vec<_> = merged.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["dsn", "charset", "timeout"]);
        assert_eq!(merged.get("charset"), Some(&Value::from("utf8")));
    }
}
