//! The `Entity` trait: how filters and sorts read members of a value.

use crate::shape::{FieldType, ScalarType, Shape};
use crate::value::Value;

/// A type whose members can be read by name.
///
/// Typed fields read members through plain function pointers; name-based
/// sorts, dynamic expressions and re-targeted filters go through
/// [`Entity::field`]. The trait stays object safe so compiled predicates
/// can evaluate `&dyn Entity`.
pub trait Entity {
    /// The member layout of this type.
    fn shape() -> Shape
    where
        Self: Sized;

    /// Read a top-level member. `None` means the member does not exist.
    fn field(&self, name: &str) -> Option<Value>;

    /// Read a dotted member path.
    fn field_path(&self, path: &str) -> Option<Value> {
        let mut segments = path.split('.');
        let mut current = self.field(segments.next()?)?;
        for segment in segments {
            current = match current {
                Value::Record(record) => record.get(segment)?.clone(),
                Value::Null => return Some(Value::Null),
                _ => return None,
            };
        }
        Some(current)
    }
}

/// Rust types that can back a typed [`Field`](crate::Field).
pub trait FieldValue {
    /// The shape type this Rust type maps to.
    fn field_type() -> FieldType;

    fn into_value(self) -> Value;
}

macro_rules! scalar_field_value {
    ($($ty:ty => $scalar:ident),* $(,)?) => {
        $(
            impl FieldValue for $ty {
                fn field_type() -> FieldType {
                    FieldType::Scalar(ScalarType::$scalar)
                }

                fn into_value(self) -> Value {
                    Value::from(self)
                }
            }
        )*
    };
}

scalar_field_value! {
    bool => Bool,
    i32 => Int,
    i64 => Int,
    u32 => Int,
    f64 => Float,
    String => String,
}

impl<V: FieldValue> FieldValue for Option<V> {
    fn field_type() -> FieldType {
        V::field_type().into_optional()
    }

    fn into_value(self) -> Value {
        self.map_or(Value::Null, V::into_value)
    }
}
