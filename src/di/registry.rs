use crate::di::{Args, Component, Injectable, Parameter};
use crate::error::Result;
use dashmap::DashMap;
use std::sync::Arc;

pub(crate) type SignatureFn = Arc<dyn Fn() -> Vec<Parameter> + Send + Sync>;
pub(crate) type ConstructFn = Arc<dyn Fn(Args) -> Result<Box<dyn Component>> + Send + Sync>;

#[derive(Clone)]
pub(crate) enum TypeKind {
    Abstract,
    Concrete {
        signature: SignatureFn,
        construct: ConstructFn,
    },
}

/// Introspection record of a named type.
#[derive(Clone)]
pub struct TypeDescriptor {
    name: String,
    kind: TypeKind,
}

impl TypeDescriptor {
    /// Descriptor generated from an [`Injectable`] implementation.
    pub fn of<T: Injectable>() -> Self {
        Self::new(T::TYPE_NAME, T::parameters, T::construct)
    }

    /// Hand-written descriptor for types without `#[derive(Injectable)]`.
    pub fn new<S, C, T>(name: impl Into<String>, signature: S, construct: C) -> Self
    where
        S: Fn() -> Vec<Parameter> + Send + Sync + 'static,
        C: Fn(Args) -> Result<T> + Send + Sync + 'static,
        T: Component,
    {
        let construct: ConstructFn =
            Arc::new(move |args| construct(args).map(|built| Box::new(built) as Box<dyn Component>));
        Self {
            name: name.into(),
            kind: TypeKind::Concrete {
                signature: Arc::new(signature),
                construct,
            },
        }
    }

    /// An interface name that can be bound but never constructed itself.
    pub fn abstract_type(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TypeKind::Abstract,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_abstract(&self) -> bool {
        matches!(self.kind, TypeKind::Abstract)
    }

    pub(crate) fn kind(&self) -> &TypeKind {
        &self.kind
    }
}

/// Table of every type the container is able to introspect.
#[derive(Default)]
pub struct TypeRegistry {
    types: DashMap<String, TypeDescriptor>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when an earlier descriptor was replaced.
    pub fn insert(&self, descriptor: TypeDescriptor) -> bool {
        self.types
            .insert(descriptor.name.clone(), descriptor)
            .is_some()
    }

    pub fn descriptor(&self, name: &str) -> Option<TypeDescriptor> {
        self.types.get(name).map(|d| d.clone())
    }

    pub(crate) fn constructor(&self, name: &str) -> Option<ConstructFn> {
        self.types.get(name).and_then(|d| match &d.kind {
            TypeKind::Concrete { construct, .. } => Some(construct.clone()),
            TypeKind::Abstract => None,
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
