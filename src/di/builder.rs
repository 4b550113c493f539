use crate::config::ContainerConfig;
use crate::di::{Binding, Container, Injectable, Params, TypeDescriptor};
use crate::error::Result;
use crate::module::Module;
use std::any::Any;
use std::sync::Arc;

/// Builder for constructing a dependency injection container
///
/// Use this to define types and register bindings before handing the
/// container to the rest of the application. Registration errors are kept
/// and reported by `build`.
///
/// # Example
/// ```
/// use meshweave::prelude::*;
///
/// #[derive(Injectable)]
/// struct Clock {
///     #[inject(default = "UTC")]
///     zone: String,
/// }
///
/// let container = ContainerBuilder::new()
///     .define::<Clock>()
///     .singleton("clock", Binding::class("Clock"))
///     .build()
///     .unwrap();
/// assert_eq!(container.get_as::<Clock>("clock").unwrap().zone, "UTC");
/// ```
pub struct ContainerBuilder {
    container: Container,
    error: Option<crate::MeshweaveError>,
}

impl ContainerBuilder {
    /// Create a new container builder
    pub fn new() -> Self {
        Self {
            container: Container::new(),
            error: None,
        }
    }

    /// Make a type introspectable
    pub fn define<T: Injectable>(self) -> Self {
        self.container.define::<T>();
        self
    }

    pub fn define_descriptor(self, descriptor: TypeDescriptor) -> Self {
        self.container.define_descriptor(descriptor);
        self
    }

    pub fn declare_abstract(self, name: impl Into<String>) -> Self {
        self.container.declare_abstract(name);
        self
    }

    /// Register a binding
    pub fn register(self, id: &str, binding: impl Into<Binding>) -> Self {
        self.register_with(id, binding, Params::new())
    }

    /// Register a binding with positional constructor parameters
    pub fn register_with(self, id: &str, binding: impl Into<Binding>, params: Params) -> Self {
        let result = self.container.register(id, binding.into(), params);
        self.record(result)
    }

    /// Register a binding whose first resolved instance is reused
    pub fn singleton(self, id: &str, binding: impl Into<Binding>) -> Self {
        let result = self
            .container
            .register_singleton(id, binding.into(), Params::new());
        self.record(result)
    }

    /// Bind `id` to `target`'s object cast to the trait object `Trait`
    pub fn bind<Trait, Impl, F>(self, id: &str, target: &str, caster: F) -> Self
    where
        Trait: ?Sized + Send + Sync + 'static,
        Impl: Any + Send + Sync,
        F: Fn(Arc<Impl>) -> Arc<Trait> + Send + Sync + 'static,
    {
        let result = self.container.bind::<Trait, Impl, F>(id, target, caster);
        self.record(result)
    }

    /// Apply a parsed configuration document
    pub fn with_config(self, config: &ContainerConfig) -> Self {
        let result = config.apply(&self.container);
        self.record(result)
    }

    pub fn module<M: Module>(self) -> Self {
        let result = self.container.install::<M>();
        self.record(result)
    }

    fn record(mut self, result: Result<()>) -> Self {
        if let Err(err) = result {
            tracing::error!("Container registration failed: {}", err);
            self.error.get_or_insert(err);
        }
        self
    }

    /// Build the container, failing with the first registration error
    pub fn build(self) -> Result<Container> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.container),
        }
    }
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::di::{Args, Component, Config};
    use crate::MeshweaveError;

    struct Ticker;

    impl Component for Ticker {}

    struct TickerModule;

    impl Module for TickerModule {
        fn register(container: &Container) -> Result<()> {
            container.register("ticker", Binding::class("Ticker"), Params::new())
        }
    }

    #[test]
    fn test_builder_installs_modules() {
        let container = ContainerBuilder::new()
            .define_descriptor(TypeDescriptor::new("Ticker", Vec::new, |_: Args| Ok(Ticker)))
            .module::<TickerModule>()
            .build()
            .unwrap();
        assert!(container.has("ticker"));
        assert!(container.get_as::<Ticker>("ticker").is_ok());
    }

    trait Tick: Send + Sync {}

    impl Tick for Ticker {}

    #[test]
    fn test_builder_binds_trait_objects() {
        let container = ContainerBuilder::new()
            .define_descriptor(TypeDescriptor::new("Ticker", Vec::new, |_: Args| Ok(Ticker)))
            .bind::<dyn Tick, Ticker, _>("Tick", "Ticker", |t| t as Arc<dyn Tick>)
            .build()
            .unwrap();
        assert!(container.get_trait::<dyn Tick>("Tick").is_ok());
    }

    #[test]
    fn test_builder_reports_first_error() {
        let result = ContainerBuilder::new()
            .register("broken", Config::of_type(""))
            .register("fine", "Ticker")
            .build();
        assert!(matches!(
            result,
            Err(MeshweaveError::InvalidConfiguration { .. })
        ));
    }
}
