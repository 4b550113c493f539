use crate::di::InstanceRef;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// A constructed object as handed out by the container.
pub type Object = Arc<dyn Any + Send + Sync>;

/// Dynamic value used for constructor arguments, defaults and properties.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Object(Object),
    /// Resolved through the container at the point of use.
    Ref(InstanceRef),
}

/// A value did not have the shape the receiving side asked for.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected {expected}, found {found}")]
pub struct ValueError {
    pub expected: &'static str,
    pub found: &'static str,
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Object(_) => "object",
            Value::Ref(_) => "instance reference",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn object<T: Any + Send + Sync>(object: T) -> Self {
        Value::Object(Arc::new(object))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Unwrap an object produced by an interface binding into the trait
    /// object it carries.
    pub fn into_trait<T: ?Sized + Send + Sync + 'static>(self) -> Result<Arc<T>, ValueError> {
        match self {
            Value::Object(o) => o
                .downcast::<Arc<T>>()
                .map(|shared| Arc::clone(&*shared))
                .map_err(|_| ValueError {
                    expected: std::any::type_name::<T>(),
                    found: "object of another type",
                }),
            other => Err(other.mismatch(std::any::type_name::<T>())),
        }
    }

    fn mismatch(&self, expected: &'static str) -> ValueError {
        ValueError {
            expected,
            found: self.kind(),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Value::Int(i) => f.debug_tuple("Int").field(i).finish(),
            Value::Float(x) => f.debug_tuple("Float").field(x).finish(),
            Value::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Value::List(items) => f.debug_tuple("List").field(items).finish(),
            Value::Object(_) => f.write_str("Object(..)"),
            Value::Ref(r) => f.debug_tuple("Ref").field(&r.id()).finish(),
        }
    }
}

impl PartialEq for Value {
    /// Objects compare by identity.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Ref(a), Value::Ref(b)) => a == b,
            _ => false,
        }
    }
}

macro_rules! value_from_int {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::Int(v as i64)
            }
        })*
    };
}

value_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Object> for Value {
    fn from(v: Object) -> Self {
        Value::Object(v)
    }
}

impl From<InstanceRef> for Value {
    fn from(v: InstanceRef) -> Self {
        Value::Ref(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Conversion out of a [`Value`] into a typed field.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> std::result::Result<Self, ValueError>;
}

impl FromValue for Value {
    fn from_value(value: Value) -> std::result::Result<Self, ValueError> {
        Ok(value)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> std::result::Result<Self, ValueError> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(other.mismatch("bool")),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> std::result::Result<Self, ValueError> {
        match value {
            Value::Str(s) => Ok(s),
            other => Err(other.mismatch("string")),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> std::result::Result<Self, ValueError> {
        match value {
            Value::Float(x) => Ok(x),
            Value::Int(i) => Ok(i as f64),
            other => Err(other.mismatch("float")),
        }
    }
}

macro_rules! int_from_value {
    ($($ty:ty),*) => {
        $(impl FromValue for $ty {
            fn from_value(value: Value) -> std::result::Result<Self, ValueError> {
                match value {
                    Value::Int(i) => <$ty>::try_from(i).map_err(|_| ValueError {
                        expected: stringify!($ty),
                        found: "out-of-range int",
                    }),
                    other => Err(other.mismatch(stringify!($ty))),
                }
            }
        })*
    };
}

int_from_value!(i8, i16, i32, i64, u8, u16, u32, u64, usize);

impl FromValue for Object {
    fn from_value(value: Value) -> std::result::Result<Self, ValueError> {
        match value {
            Value::Object(o) => Ok(o),
            other => Err(other.mismatch("object")),
        }
    }
}

impl<T: Any + Send + Sync> FromValue for Arc<T> {
    fn from_value(value: Value) -> std::result::Result<Self, ValueError> {
        match value {
            Value::Object(o) => o.downcast::<T>().map_err(|_| ValueError {
                expected: std::any::type_name::<T>(),
                found: "object of another type",
            }),
            other => Err(other.mismatch(std::any::type_name::<T>())),
        }
    }
}

impl FromValue for InstanceRef {
    fn from_value(value: Value) -> std::result::Result<Self, ValueError> {
        match value {
            Value::Ref(r) => Ok(r),
            Value::Str(id) => Ok(InstanceRef::of(id)),
            other => Err(other.mismatch("instance reference")),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> std::result::Result<Self, ValueError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> std::result::Result<Self, ValueError> {
        match value {
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(other.mismatch("list")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Marker(u8);

    #[test]
    fn test_scalar_conversions() {
        assert_eq!(String::from_value("utf8".into()).unwrap(), "utf8");
        assert_eq!(u16::from_value(Value::Int(5432)).unwrap(), 5432);
        assert_eq!(f64::from_value(Value::Int(2)).unwrap(), 2.0);
        assert_eq!(Option::<i64>::from_value(Value::Null).unwrap(), None);
        assert_eq!(
            Vec::<bool>::from_value(vec![true, false].into()).unwrap(),
            vec![true, false]
        );
    }

    #[test]
    fn test_mismatch_reports_both_sides() {
        let err = bool::from_value("yes".into()).unwrap_err();
        assert_eq!(err.expected, "bool");
        assert_eq!(err.found, "string");

        let err = u8::from_value(Value::Int(300)).unwrap_err();
        assert_eq!(err.found, "out-of-range int");
    }

    #[test]
    fn test_object_downcast() {
        let value = Value::object(Marker(7));
        let marker = Arc::<Marker>::from_value(value.clone()).unwrap();
        assert_eq!(marker.0, 7);
        assert!(Arc::<String>::from_value(value).is_err());
    }

    #[test]
    fn test_objects_compare_by_identity() {
        let a = Value::object(Marker(1));
        let b = Value::object(Marker(1));
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }
}
