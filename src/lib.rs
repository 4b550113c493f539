//! # Meshweave
//!
//! A string-keyed dependency injection container for Rust.
//!
//! Identifiers (type names, interface names or plain aliases) map to
//! construction recipes. Asking the container for an identifier builds the
//! object graph on demand, resolving every constructor parameter whose
//! declared type names another identifier.
//!
//! ## Features
//!
//! - **Binding kinds**: type name, configuration (type + properties),
//!   factory closure, pre-built instance, trait-object interface
//! - **Constructor autowiring**: `#[derive(Injectable)]` records constructor
//!   parameters; declared dependencies are resolved recursively
//! - **Deferred references**: [`InstanceRef`] points at another identifier
//!   without building it at registration time
//! - **Singletons**: opt-in per identifier, built once even under contention
//! - **Cycle detection**: circular bindings fail instead of overflowing the stack
//!
//! ## Quick Start
//!
//! ```rust
//! use meshweave::prelude::*;
//!
//! #[derive(Injectable)]
//! pub struct SqliteConnection {
//!     #[property]
//!     dsn: String,
//! }
//!
//! #[derive(Injectable)]
//! pub struct UserFinder {
//!     #[inject(id = "Connection")]
//!     connection: Arc<SqliteConnection>,
//! }
//!
//! let container = Container::new();
//! container.define::<SqliteConnection>().define::<UserFinder>();
//!
//! container
//!     .register_singleton(
//!         "Connection",
//!         Binding::Config(Config::of_type("SqliteConnection").property("dsn", "sqlite:app.db")),
//!         Params::new(),
//!     )
//!     .unwrap();
//!
//! let finder = container.get_as::<UserFinder>("UserFinder").unwrap();
//! assert_eq!(finder.connection.dsn, "sqlite:app.db");
//! ```

pub mod config;
pub mod di;
pub mod error;
pub mod module;

// Re-export core types
pub use config::ContainerConfig;
pub use di::{
    Args, Binding, Caster, Component, Config, Container, ContainerBuilder, DefinitionKind,
    Factory, FromValue, Injectable, InstanceRef, Object, Params, Parameter, Properties, PropertyError,
    ReflectionEntry, TypeDescriptor, Value, ValueError,
};
pub use error::{MeshweaveError, Result};
pub use module::Module;

// Re-export macros
pub use meshweave_macro::Injectable as DeriveInjectable;

/// Prelude module for convenient imports
///
/// ```
/// use meshweave::prelude::*;
/// ```
pub mod prelude {
    pub use crate::DeriveInjectable as Injectable;
    pub use crate::config::ContainerConfig;
    pub use crate::di::{
        Args, Binding, Component, Config, Container, ContainerBuilder, FromValue, Injectable,
        InstanceRef, Object, Params, Parameter, Properties, PropertyError, TypeDescriptor, Value,
    };
    pub use crate::error::{MeshweaveError, Result};
    pub use crate::module::Module;
    pub use std::sync::Arc;
}
