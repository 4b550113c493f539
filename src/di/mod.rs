mod builder;
mod container;
mod definition;
mod guard;
mod injectable;
mod instance;
mod reflection;
mod registry;
mod singleton;
mod value;

pub use builder::ContainerBuilder;
pub use container::Container;
pub use definition::{Binding, Caster, Config, DefinitionKind, Factory, Params, Properties};
pub use injectable::{Args, AsAny, Component, Injectable, PropertyError};
pub use instance::InstanceRef;
pub use reflection::{Parameter, ReflectionCache, ReflectionEntry};
pub use registry::{TypeDescriptor, TypeRegistry};
pub use singleton::SingletonCache;
pub use value::{FromValue, Object, Value, ValueError};
