use crate::di::definition::{Definition, DefinitionKind, Recipe};
use crate::di::guard::ResolutionGuard;
use crate::di::singleton::SingletonCache;
use crate::di::{
    Args, Binding, Injectable, Object, Params, Parameter, Properties, ReflectionCache,
    ReflectionEntry, TypeDescriptor, TypeRegistry, Value,
};
use crate::error::{MeshweaveError, Result};
use crate::module::Module;
use dashmap::DashMap;
use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

static NEXT_CONTAINER_ID: AtomicU64 = AtomicU64::new(1);

/// Thread-safe, string-keyed dependency injection container.
///
/// Identifiers map to [`Binding`]s; `get` builds the requested object and,
/// recursively, everything its constructor declares.
pub struct Container {
    id: u64,
    definitions: DashMap<String, Definition>,
    singletons: SingletonCache,
    reflection: ReflectionCache,
    types: TypeRegistry,
    revisions: AtomicU64,
    // Write-held by register/remove/clear so table mutations never interleave
    // with a singleton store.
    table: RwLock<()>,
}

impl Container {
    pub fn new() -> Self {
        Self {
            id: NEXT_CONTAINER_ID.fetch_add(1, Ordering::Relaxed),
            definitions: DashMap::new(),
            singletons: SingletonCache::new(),
            reflection: ReflectionCache::new(),
            types: TypeRegistry::new(),
            revisions: AtomicU64::new(0),
            table: RwLock::new(()),
        }
    }

    /// Make `T` introspectable under `T::TYPE_NAME`.
    pub fn define<T: Injectable>(&self) -> &Self {
        self.define_descriptor(TypeDescriptor::of::<T>())
    }

    pub fn define_descriptor(&self, descriptor: TypeDescriptor) -> &Self {
        let name = descriptor.name().to_string();
        if self.types.insert(descriptor) {
            self.reflection.invalidate(&name);
        }
        tracing::debug!("Defined type '{}'", name);
        self
    }

    /// Declare an interface name that can be bound but not built.
    pub fn declare_abstract(&self, name: impl Into<String>) -> &Self {
        self.define_descriptor(TypeDescriptor::abstract_type(name))
    }

    pub fn register(&self, id: &str, binding: Binding, params: Params) -> Result<()> {
        self.store(id, binding, params, false)
    }

    pub fn register_singleton(&self, id: &str, binding: Binding, params: Params) -> Result<()> {
        self.store(id, binding, params, true)
    }

    /// Register `id` as `target`'s object cast to the trait object `Trait`.
    pub fn bind<Trait, Impl, F>(&self, id: &str, target: &str, caster: F) -> Result<()>
    where
        Trait: ?Sized + Send + Sync + 'static,
        Impl: Any + Send + Sync,
        F: Fn(Arc<Impl>) -> Arc<Trait> + Send + Sync + 'static,
    {
        self.register(
            id,
            Binding::interface::<Trait, Impl, F>(target, caster),
            Params::new(),
        )
    }

    /// Register several bindings in order, stopping at the first malformed one.
    pub fn register_many<I, S>(&self, bindings: I) -> Result<()>
    where
        I: IntoIterator<Item = (S, Binding)>,
        S: AsRef<str>,
    {
        for (id, binding) in bindings {
            self.register(id.as_ref(), binding, Params::new())?;
        }
        Ok(())
    }

    pub fn register_singletons<I, S>(&self, bindings: I) -> Result<()>
    where
        I: IntoIterator<Item = (S, Binding)>,
        S: AsRef<str>,
    {
        for (id, binding) in bindings {
            self.register_singleton(id.as_ref(), binding, Params::new())?;
        }
        Ok(())
    }

    fn store(&self, id: &str, binding: Binding, params: Params, singleton: bool) -> Result<()> {
        let revision = self.revisions.fetch_add(1, Ordering::Relaxed) + 1;
        let definition = Definition::normalize(id, binding, params, singleton, revision)?;
        let kind = definition.kind();

        let _table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        self.definitions.insert(id.to_string(), definition);
        self.singletons.invalidate(id);
        tracing::debug!(
            "Registered '{}' as {:?}{}",
            id,
            kind,
            if singleton { " (singleton)" } else { "" }
        );
        Ok(())
    }

    pub fn has(&self, id: &str) -> bool {
        self.definitions.contains_key(id)
    }

    /// With `check_instance`, whether a built instance is cached for `id`;
    /// otherwise whether `id` is registered as a singleton.
    pub fn has_singleton(&self, id: &str, check_instance: bool) -> bool {
        let Some(definition) = self.definition(id) else {
            return false;
        };
        let is_instance = matches!(definition.recipe, Recipe::Instance(_));
        if check_instance {
            is_instance || self.singletons.contains(id)
        } else {
            is_instance || definition.singleton
        }
    }

    /// Drops the definition and any cached instance. Reflection entries are
    /// keyed by type and stay.
    pub fn remove(&self, id: &str) -> bool {
        let _table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        let removed = self.definitions.remove(id).is_some();
        self.singletons.invalidate(id);
        tracing::debug!("Removed '{}'", id);
        removed
    }

    /// Drops every definition, cached singleton and reflection entry.
    /// Defined types stay introspectable.
    pub fn clear(&self) {
        let _table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        self.definitions.clear();
        self.singletons.clear();
        self.reflection.clear();
        tracing::debug!("Container cleared");
    }

    pub fn definitions(&self) -> Vec<String> {
        self.definitions.iter().map(|e| e.key().clone()).collect()
    }

    pub fn definition_of(&self, id: &str) -> Option<DefinitionKind> {
        self.definition(id).map(|d| d.kind())
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn reflection(&self) -> &ReflectionCache {
        &self.reflection
    }

    pub fn singletons(&self) -> &SingletonCache {
        &self.singletons
    }

    pub fn install<M: Module>(&self) -> Result<()> {
        M::register(self)
    }

    pub fn get(&self, id: &str) -> Result<Object> {
        self.get_with(id, &Params::new(), &Properties::new())
    }

    pub fn get_as<T: Any + Send + Sync>(&self, id: &str) -> Result<Arc<T>> {
        self.get_as_with(id, &Params::new(), &Properties::new())
    }

    pub fn get_as_with<T: Any + Send + Sync>(
        &self,
        id: &str,
        params: &Params,
        properties: &Properties,
    ) -> Result<Arc<T>> {
        self.get_with(id, params, properties)?
            .downcast::<T>()
            .map_err(|_| MeshweaveError::DowncastFailed {
                id: id.to_string(),
                type_name: std::any::type_name::<T>().to_string(),
            })
    }

    /// Resolve `id`, bound through `bind` or `Binding::interface`, as a
    /// trait object.
    pub fn get_trait<T: ?Sized + Send + Sync + 'static>(&self, id: &str) -> Result<Arc<T>> {
        Value::Object(self.get(id)?)
            .into_trait::<T>()
            .map_err(|_| MeshweaveError::DowncastFailed {
                id: id.to_string(),
                type_name: std::any::type_name::<Arc<T>>().to_string(),
            })
    }

    /// Resolve `id` with call-site positional `params` and property
    /// `properties`. Supplying either bypasses the singleton cache.
    pub fn get_with(&self, id: &str, params: &Params, properties: &Properties) -> Result<Object> {
        let overridden = !params.is_empty() || !properties.is_empty();
        if !overridden {
            if let Some(object) = self.singletons.get(id) {
                tracing::trace!("Singleton cache hit for '{}'", id);
                return Ok(object);
            }
        }

        let _guard = ResolutionGuard::enter(self.id, id)?;

        let Some(definition) = self.definition(id) else {
            tracing::debug!("'{}' is not registered, building it as a bare type", id);
            return self.build(id, params, properties);
        };

        if definition.singleton && !overridden {
            return self.resolve_singleton(id, &definition);
        }
        self.resolve_definition(id, &definition, params, properties)
    }

    /// Resolve `id` and keep the result as its shared instance until the
    /// definition is replaced or removed.
    pub fn promote(&self, id: &str) -> Result<Object> {
        let object = self.get(id)?;
        let _table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        if self.definitions.contains_key(id) {
            self.singletons.insert(id, object.clone());
            tracing::debug!("Promoted '{}' to singleton", id);
        }
        Ok(object)
    }

    fn resolve_singleton(&self, id: &str, definition: &Definition) -> Result<Object> {
        let lock = self.singletons.build_lock(id);
        let _building = self.singletons.acquire(id, &lock)?;

        if let Some(object) = self.singletons.get(id) {
            return Ok(object);
        }

        let object = self.resolve_definition(id, definition, &Params::new(), &Properties::new())?;

        let _table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        let current = self.definitions.get(id).map(|d| d.revision);
        if current == Some(definition.revision) {
            self.singletons.insert(id, object.clone());
            tracing::debug!("Cached singleton '{}'", id);
        } else {
            tracing::debug!("'{}' was re-registered while building, not caching", id);
        }
        Ok(object)
    }

    fn resolve_definition(
        &self,
        id: &str,
        definition: &Definition,
        params: &Params,
        properties: &Properties,
    ) -> Result<Object> {
        match &definition.recipe {
            Recipe::Instance(object) => Ok(object.clone()),
            Recipe::Factory(factory) => {
                tracing::debug!("Invoking factory for '{}'", id);
                let params = self.resolve_params(&definition.params.merged(params))?;
                let properties = self.resolve_properties(properties)?;
                factory(self, &params, &properties)
                    .map_err(|e| MeshweaveError::from_factory(id, e))
            }
            Recipe::Cast { target, caster } => {
                tracing::trace!("'{}' casts '{}' to its interface", id, target);
                let object = self.get_with(target, &definition.params.merged(params), properties)?;
                caster
                    .cast(object)
                    .ok_or_else(|| MeshweaveError::DowncastFailed {
                        id: target.clone(),
                        type_name: caster.implementation().to_string(),
                    })
            }
            Recipe::Class {
                type_name,
                properties: registered,
            } => self.build(
                type_name,
                &definition.params.merged(params),
                &registered.merged(properties),
            ),
            Recipe::Alias {
                target,
                properties: registered,
            } => {
                tracing::trace!("'{}' delegates to '{}'", id, target);
                self.get_with(
                    target,
                    &definition.params.merged(params),
                    &registered.merged(properties),
                )
            }
        }
    }

    fn build(&self, type_name: &str, params: &Params, properties: &Properties) -> Result<Object> {
        let entry = self.reflection.signature(&self.types, type_name)?;
        let construct = self.types.constructor(type_name).ok_or_else(|| {
            MeshweaveError::reflection(type_name, "type has no accessible constructor")
        })?;

        let args = self.resolve_arguments(&entry, params)?;
        let mut component = construct(Args::new(type_name, args))?;

        for (name, value) in properties.iter() {
            let value = self.resolve_value(value.clone())?;
            component.set_property(name, value).map_err(|e| {
                MeshweaveError::invalid_config(format!(
                    "cannot set '{name}' on '{type_name}': {e}"
                ))
            })?;
        }

        tracing::debug!("Built '{}'", type_name);
        Ok(component.into_object())
    }

    fn resolve_arguments(&self, entry: &ReflectionEntry, params: &Params) -> Result<Vec<Value>> {
        let declared = entry.parameters().len();
        let mut args = Vec::with_capacity(declared.max(params.len()));

        for parameter in entry.parameters() {
            let value = match params.get(parameter.index()) {
                Some(value) => self.resolve_value(value.clone())?,
                None => self.autowire(entry.type_name(), parameter)?,
            };
            args.push(value);
        }

        for (_, value) in params.iter().filter(|(index, _)| *index >= declared) {
            args.push(self.resolve_value(value.clone())?);
        }
        Ok(args)
    }

    fn autowire(&self, type_name: &str, parameter: &Parameter) -> Result<Value> {
        if let Some(declared) = parameter.declared() {
            tracing::trace!(
                "Resolving '{}' for parameter '{}' of '{}'",
                declared,
                parameter.name(),
                type_name
            );
            return match self.get(declared) {
                Ok(object) => Ok(Value::Object(object)),
                Err(MeshweaveError::Reflection { reason, .. }) if parameter.is_optional() => {
                    tracing::warn!(
                        "Optional dependency '{}' of '{}' is not instantiable ({}), using its default",
                        declared,
                        type_name,
                        reason
                    );
                    self.resolve_value(parameter.default_value().cloned().unwrap_or_default())
                }
                Err(err) => Err(err),
            };
        }

        match parameter.default_value() {
            Some(default) => self.resolve_value(default.clone()),
            None if parameter.is_optional() => Ok(Value::Null),
            None => Err(MeshweaveError::UnresolvableDependency {
                type_name: type_name.to_string(),
                parameter: parameter.name().to_string(),
                index: parameter.index(),
            }),
        }
    }

    fn resolve_params(&self, params: &Params) -> Result<Params> {
        let mut resolved = Params::new();
        for (index, value) in params.iter() {
            resolved.set(index, self.resolve_value(value.clone())?);
        }
        Ok(resolved)
    }

    fn resolve_properties(&self, properties: &Properties) -> Result<Properties> {
        let mut resolved = Properties::new();
        for (name, value) in properties.iter() {
            resolved.set(name, self.resolve_value(value.clone())?);
        }
        Ok(resolved)
    }

    /// Swap instance references for the objects they point at.
    fn resolve_value(&self, value: Value) -> Result<Value> {
        match value {
            Value::Ref(reference) => Ok(Value::Object(self.get(reference.id())?)),
            Value::List(items) => items
                .into_iter()
                .map(|item| self.resolve_value(item))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            other => Ok(other),
        }
    }

    /// Call `f` with arguments resolved from `parameters` the same way a
    /// constructor's are.
    pub fn invoke<R, F>(&self, parameters: Vec<Parameter>, params: &Params, f: F) -> Result<R>
    where
        F: FnOnce(Args) -> Result<R>,
    {
        let entry = ReflectionEntry::new("<callable>", parameters);
        let args = self.resolve_arguments(&entry, params)?;
        f(Args::new(entry.type_name(), args))
    }

    fn definition(&self, id: &str) -> Option<Definition> {
        self.definitions.get(id).map(|d| d.clone())
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::di::{Component, InstanceRef};
    use std::sync::atomic::AtomicUsize;

    struct Clock {
        zone: String,
    }

    impl Component for Clock {}

    struct Scheduler {
        clock: Arc<Clock>,
        workers: i64,
    }

    impl Component for Scheduler {}

    fn container() -> Container {
        let container = Container::new();
        container
            .define_descriptor(TypeDescriptor::new(
                "Clock",
                || vec![Parameter::new("zone").with_default("UTC")],
                |mut args: Args| Ok(Clock { zone: args.take(0)? }),
            ))
            .define_descriptor(TypeDescriptor::new(
                "Scheduler",
                || {
                    vec![
                        Parameter::of_type("clock", "Clock"),
                        Parameter::new("workers"),
                    ]
                },
                |mut args: Args| {
                    Ok(Scheduler {
                        clock: args.take(0)?,
                        workers: args.take(1)?,
                    })
                },
            ));
        container
    }

    #[test]
    fn test_register_and_resolve() {
        let container = container();
        container
            .register("Scheduler", Binding::class("Scheduler"), Params::from(vec![4]))
            .unwrap();
        let scheduler = container.get_as::<Scheduler>("Scheduler").unwrap();
        assert_eq!(scheduler.workers, 4);
        assert_eq!(scheduler.clock.zone, "UTC");
    }

    #[test]
    fn test_call_site_params_override_registered_positions() {
        let container = container();
        container
            .register("Scheduler", Binding::class("Scheduler"), Params::from(vec![4]))
            .unwrap();
        let scheduler = container
            .get_as_with::<Scheduler>("Scheduler", &Params::new().with(1, 16), &Properties::new())
            .unwrap();
        assert_eq!(scheduler.workers, 16);
    }

    #[test]
    fn test_missing_required_parameter_is_unresolvable() {
        let container = container();
        let err = container.get("Scheduler").err().unwrap();
        match err {
            MeshweaveError::UnresolvableDependency {
                type_name,
                parameter,
                index,
            } => {
                assert_eq!(type_name, "Scheduler");
                assert_eq!(parameter, "workers");
                assert_eq!(index, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_instance_reference_in_params_resolves_lazily() {
        let container = container();
        container
            .register(
                "Scheduler",
                Binding::class("Scheduler"),
                Params::new().with(0, InstanceRef::of("tokyo")).with(1, 2),
            )
            .unwrap();
        // Registered after the reference points at it.
        container
            .register("tokyo", Binding::class("Clock"), Params::from(vec!["Asia/Tokyo"]))
            .unwrap();

        let scheduler = container.get_as::<Scheduler>("Scheduler").unwrap();
        assert_eq!(scheduler.clock.zone, "Asia/Tokyo");
    }

    #[test]
    fn test_factory_receives_container_and_params() {
        let container = container();
        container
            .register(
                "clock",
                Binding::factory(|c, params, _| {
                    let zone = params.get(0).and_then(Value::as_str).unwrap_or("UTC").to_string();
                    let _ = c.has("clock");
                    Ok(Arc::new(Clock { zone }) as Object)
                }),
                Params::new(),
            )
            .unwrap();

        let clock = container
            .get_as_with::<Clock>("clock", &Params::from(vec!["CET"]), &Properties::new())
            .unwrap();
        assert_eq!(clock.zone, "CET");
    }

    #[test]
    fn test_factory_receives_registered_params() {
        let container = container();
        container
            .register(
                "clock",
                Binding::factory(|_, params, _| {
                    let zone = params.get(0).and_then(Value::as_str).unwrap_or("UTC").to_string();
                    Ok(Arc::new(Clock { zone }) as Object)
                }),
                Params::from(vec!["CET"]),
            )
            .unwrap();
        assert_eq!(container.get_as::<Clock>("clock").unwrap().zone, "CET");

        let overridden = container
            .get_as_with::<Clock>("clock", &Params::from(vec!["EET"]), &Properties::new())
            .unwrap();
        assert_eq!(overridden.zone, "EET");
    }

    #[test]
    fn test_factory_params_have_references_resolved() {
        let container = container();
        container
            .register(
                "scheduler",
                Binding::factory(|_, params, _| {
                    let clock = params
                        .get(0)
                        .and_then(Value::as_object)
                        .cloned()
                        .ok_or_else(|| anyhow::anyhow!("clock missing"))?
                        .downcast::<Clock>()
                        .map_err(|_| anyhow::anyhow!("not a clock"))?;
                    Ok(Arc::new(Scheduler { clock, workers: 1 }) as Object)
                }),
                Params::new().with(0, InstanceRef::of("Clock")),
            )
            .unwrap();
        let scheduler = container.get_as::<Scheduler>("scheduler").unwrap();
        assert_eq!(scheduler.clock.zone, "UTC");
    }

    #[test]
    fn test_singleton_factory_runs_once() {
        static BUILDS: AtomicUsize = AtomicUsize::new(0);
        let container = container();
        container
            .register_singleton(
                "clock",
                Binding::factory(|_, _, _| {
                    BUILDS.fetch_add(1, Ordering::SeqCst);
                    Ok(Arc::new(Clock { zone: "UTC".into() }) as Object)
                }),
                Params::new(),
            )
            .unwrap();

        assert!(container.has_singleton("clock", false));
        assert!(!container.has_singleton("clock", true));
        let a = container.get("clock").unwrap();
        let b = container.get("clock").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(container.has_singleton("clock", true));
        assert_eq!(BUILDS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_promote_factory_result() {
        let container = container();
        container
            .register(
                "clock",
                Binding::factory(|_, _, _| Ok(Arc::new(Clock { zone: "UTC".into() }) as Object)),
                Params::new(),
            )
            .unwrap();

        let promoted = container.promote("clock").unwrap();
        assert!(Arc::ptr_eq(&promoted, &container.get("clock").unwrap()));

        container
            .register("clock", Binding::class("Clock"), Params::new())
            .unwrap();
        assert!(!container.has_singleton("clock", true));
    }

    #[test]
    fn test_optional_fallback_default_reference_is_resolved() {
        let container = container();
        container.declare_abstract("EventSink");
        let clock = container
            .invoke(
                vec![
                    Parameter::of_type("sink", "EventSink")
                        .with_default(InstanceRef::of("Clock")),
                ],
                &Params::new(),
                |mut args| args.take::<Arc<Clock>>(0),
            )
            .unwrap();
        assert_eq!(clock.zone, "UTC");
    }

    #[test]
    fn test_list_of_references_in_params() {
        let container = container();
        let zones = container
            .invoke(
                vec![Parameter::new("clocks")],
                &Params::new().with(
                    0,
                    Value::List(vec![InstanceRef::of("Clock").into(), InstanceRef::of("Clock").into()]),
                ),
                |mut args| {
                    let clocks: Vec<Arc<Clock>> = args.take(0)?;
                    Ok(clocks.iter().map(|c| c.zone.clone()).collect::<Vec<_>>())
                },
            )
            .unwrap();
        assert_eq!(zones, vec!["UTC", "UTC"]);
    }

    #[test]
    fn test_remove_and_clear() {
        let container = container();
        container
            .register_singleton("clock", Binding::class("Clock"), Params::new())
            .unwrap();
        container.get("clock").unwrap();
        assert!(container.reflection().contains("Clock"));

        assert!(container.remove("clock"));
        assert!(!container.has("clock"));
        assert!(container.singletons().is_empty());
        assert!(container.reflection().contains("Clock"));

        container.register("clock", Binding::class("Clock"), Params::new()).unwrap();
        container.clear();
        assert!(container.is_empty());
        assert!(container.reflection().is_empty());
        assert!(container.types().contains("Clock"));
    }

    #[test]
    fn test_invoke_autowires_callable() {
        let container = container();
        let zone = container
            .invoke(
                vec![Parameter::of_type("clock", "Clock"), Parameter::new("suffix")],
                &Params::new().with(1, "!"),
                |mut args| {
                    let clock: Arc<Clock> = args.take(0)?;
                    let suffix: String = args.take(1)?;
                    Ok(format!("{}{}", clock.zone, suffix))
                },
            )
            .unwrap();
        assert_eq!(zone, "UTC!");
    }

    #[test]
    fn test_abstract_type_fails_with_reflection_error() {
        let container = container();
        container.declare_abstract("EventSink");
        assert!(matches!(
            container.get("EventSink"),
            Err(MeshweaveError::Reflection { .. })
        ));
    }

    #[test]
    fn test_redefining_type_drops_memoized_signature() {
        let container = container();
        container.get("Clock").unwrap();
        assert!(container.reflection().contains("Clock"));
        container.define_descriptor(TypeDescriptor::new(
            "Clock",
            Vec::new,
            |_: Args| Ok(Clock { zone: "local".into() }),
        ));
        assert!(!container.reflection().contains("Clock"));
        assert_eq!(container.get_as::<Clock>("Clock").unwrap().zone, "local");
    }
}
