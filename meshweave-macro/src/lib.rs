use proc_macro::TokenStream;

mod injectable;

/// Derive macro making a struct constructible by the Meshweave container
///
/// Every named field becomes a constructor parameter, in declaration order,
/// unless it is marked `#[property]` or `#[inject(skip)]`.
///
/// - `Arc<T>` and `Option<Arc<T>>` fields declare `T::TYPE_NAME` as the
///   identifier to resolve; `#[inject(id = "...")]` overrides it.
/// - `Option<_>` fields may be omitted.
/// - `#[inject(default = expr)]` gives a parameter a default value.
/// - `#[property]` fields start from `Default::default()` (or
///   `#[property(default = expr)]`) and are assignable after construction.
/// - `#[injectable(name = "...")]` overrides the type name (the struct name).
///
/// # Example
/// ```ignore
/// use meshweave::prelude::*;
///
/// #[derive(Injectable)]
/// #[injectable(name = "UserFinder")]
/// pub struct UserFinder {
///     #[inject(id = "Connection")]
///     connection: Arc<SqliteConnection>,
///     #[inject(default = 50)]
///     page_size: i64,
///     #[property]
///     verbose: bool,
/// }
/// ```
#[proc_macro_derive(Injectable, attributes(injectable, inject, property))]
pub fn derive_injectable(input: TokenStream) -> TokenStream {
    injectable::derive_injectable(input)
}
