use crate::di::{FromValue, Object, Parameter, Value, ValueError};
use crate::error::{MeshweaveError, Result};
use std::any::Any;
use std::sync::Arc;
use thiserror::Error;

/// Trait for types the container can construct by name.
///
/// This trait is typically implemented automatically via the `#[derive(Injectable)]` macro.
///
/// # Example
/// ```
/// use meshweave::prelude::*;
///
/// #[derive(Injectable)]
/// pub struct Connection {
///     #[property]
///     dsn: String,
/// }
///
/// #[derive(Injectable)]
/// pub struct UserFinder {
///     // Resolved from the container under `Connection::TYPE_NAME`
///     connection: Arc<Connection>,
///     #[inject(default = 50)]
///     page_size: i64,
/// }
/// ```
pub trait Injectable: Component + Sized {
    /// Name the type is registered and looked up under.
    const TYPE_NAME: &'static str;

    /// Constructor parameters in positional order.
    fn parameters() -> Vec<Parameter>;

    /// Build an instance from fully resolved positional arguments.
    ///
    /// # Errors
    /// Returns an error if an argument does not have the expected shape.
    fn construct(args: Args) -> Result<Self>;
}

/// Post-construction configuration hook shared by every constructible type.
pub trait Component: AsAny {
    /// Assign a configured property. The default accepts none.
    fn set_property(&mut self, name: &str, value: Value) -> std::result::Result<(), PropertyError> {
        let _ = value;
        Err(PropertyError::Unknown(name.to_string()))
    }
}

/// Why a property assignment was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PropertyError {
    #[error("unknown property '{0}'")]
    Unknown(String),

    #[error("property '{0}' is read-only")]
    ReadOnly(String),

    #[error(transparent)]
    Value(#[from] ValueError),
}

pub trait AsAny: Any + Send + Sync {
    fn into_object(self: Box<Self>) -> Object;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn into_object(self: Box<Self>) -> Object {
        let shared: Arc<T> = Arc::from(self);
        shared
    }
}

/// Positional constructor arguments, already resolved by the container.
#[derive(Debug)]
pub struct Args {
    type_name: String,
    values: Vec<Value>,
}

impl Args {
    pub fn new(type_name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            type_name: type_name.into(),
            values,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Convert a copy of the argument at `index`. Missing positions read as `Null`.
    pub fn get<T: FromValue>(&self, index: usize) -> Result<T> {
        let value = self.values.get(index).cloned().unwrap_or_default();
        self.convert(index, value)
    }

    /// Move the argument at `index` out, leaving `Null` behind.
    pub fn take<T: FromValue>(&mut self, index: usize) -> Result<T> {
        let value = self.take_value(index);
        self.convert(index, value)
    }

    fn take_value(&mut self, index: usize) -> Value {
        self.values
            .get_mut(index)
            .map(std::mem::take)
            .unwrap_or_default()
    }

    /// Move out a trait object built by an interface binding.
    pub fn take_trait<T: ?Sized + Send + Sync + 'static>(&mut self, index: usize) -> Result<Arc<T>> {
        let value = self.take_value(index);
        value.into_trait::<T>().map_err(|e| self.mismatch(index, e))
    }

    /// Like `take_trait`, with `Null` read as `None`.
    pub fn take_optional_trait<T: ?Sized + Send + Sync + 'static>(
        &mut self,
        index: usize,
    ) -> Result<Option<Arc<T>>> {
        match self.take_value(index) {
            Value::Null => Ok(None),
            value => value
                .into_trait::<T>()
                .map(Some)
                .map_err(|e| self.mismatch(index, e)),
        }
    }

    /// Arguments past the declared signature, in position order.
    pub fn rest(&self, declared: usize) -> &[Value] {
        self.values.get(declared..).unwrap_or(&[])
    }

    fn convert<T: FromValue>(&self, index: usize, value: Value) -> Result<T> {
        T::from_value(value).map_err(|e| self.mismatch(index, e))
    }

    fn mismatch(&self, index: usize, e: ValueError) -> MeshweaveError {
        MeshweaveError::ArgumentMismatch {
            type_name: self.type_name.clone(),
            index,
            expected: e.expected,
            found: e.found,
        }
    }
}
