use crate::di::Container;
use crate::error::Result;

/// Trait for grouping related registrations
///
/// Bootstrap code installs modules with `Container::install` or
/// `ContainerBuilder::module`.
///
/// # Example
/// ```
/// use meshweave::prelude::*;
///
/// pub struct StorageModule;
///
/// impl Module for StorageModule {
///     fn register(container: &Container) -> Result<()> {
///         container.register_singleton(
///             "db",
///             Binding::Config(Config::of_type("SqliteConnection").property("dsn", "sqlite:app.db")),
///             Params::new(),
///         )
///     }
/// }
/// ```
pub trait Module {
    /// Register all definitions this module provides
    fn register(container: &Container) -> Result<()>;
}
