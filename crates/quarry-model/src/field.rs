//! Field references: typed accessors, type-erased accessors and bare names.

use std::fmt;
use std::sync::Arc;

use crate::entity::{Entity, FieldValue};
use crate::error::ConstructionError;
use crate::expr::{CompareOp, Expr, StringMethod};
use crate::shape::FieldType;
use crate::value::Value;

/// A typed member of `T` holding a `V`.
///
/// Declared as associated constants on the entity type:
///
/// ```
/// use quarry_model::Field;
///
/// struct Person { first_name: String }
///
/// impl Person {
///     const FIRST_NAME: Field<Person, String> =
///         Field::new("FirstName", |p| p.first_name.clone());
/// }
///
/// let filter = Person::FIRST_NAME.eq("John");
/// ```
pub struct Field<T, V> {
    path: &'static str,
    get: fn(&T) -> V,
}

impl<T, V> Field<T, V> {
    pub const fn new(path: &'static str, get: fn(&T) -> V) -> Self {
        Self { path, get }
    }

    /// Dotted member path.
    pub fn path(&self) -> &'static str {
        self.path
    }

    pub fn get(&self, entity: &T) -> V {
        (self.get)(entity)
    }
}

impl<T, V> Clone for Field<T, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, V> Copy for Field<T, V> {}

impl<T, V> fmt::Debug for Field<T, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Field").field(&self.path).finish()
    }
}

impl<T: 'static, V: FieldValue + 'static> Field<T, V> {
    /// Erase the value type.
    pub fn accessor(&self) -> Accessor<T> {
        let get = self.get;
        Accessor::new(self.path, V::field_type(), move |entity: &T| {
            get(entity).into_value()
        })
    }

    fn compare(&self, op: CompareOp, value: impl Into<V>) -> Expr<T> {
        Expr::Compare {
            field: self.accessor(),
            op,
            value: value.into().into_value(),
        }
    }

    pub fn eq(&self, value: impl Into<V>) -> Expr<T> {
        self.compare(CompareOp::Eq, value)
    }

    pub fn ne(&self, value: impl Into<V>) -> Expr<T> {
        self.compare(CompareOp::Ne, value)
    }

    pub fn lt(&self, value: impl Into<V>) -> Expr<T> {
        self.compare(CompareOp::Lt, value)
    }

    pub fn le(&self, value: impl Into<V>) -> Expr<T> {
        self.compare(CompareOp::Le, value)
    }

    pub fn gt(&self, value: impl Into<V>) -> Expr<T> {
        self.compare(CompareOp::Gt, value)
    }

    pub fn ge(&self, value: impl Into<V>) -> Expr<T> {
        self.compare(CompareOp::Ge, value)
    }
}

impl<T: 'static> Field<T, bool> {
    /// The member itself as a condition.
    pub fn is_true(&self) -> Expr<T> {
        Expr::Member(self.accessor())
    }
}

impl<T: 'static> Field<T, String> {
    fn call(&self, method: StringMethod, argument: impl Into<String>) -> Expr<T> {
        Expr::Call {
            field: self.accessor(),
            method,
            argument: argument.into(),
        }
    }

    pub fn starts_with(&self, prefix: impl Into<String>) -> Expr<T> {
        self.call(StringMethod::StartsWith, prefix)
    }

    pub fn ends_with(&self, suffix: impl Into<String>) -> Expr<T> {
        self.call(StringMethod::EndsWith, suffix)
    }

    pub fn contains(&self, needle: impl Into<String>) -> Expr<T> {
        self.call(StringMethod::Contains, needle)
    }
}

impl<T: 'static, V: FieldValue + 'static> Field<T, Option<V>> {
    pub fn is_null(&self) -> Expr<T> {
        Expr::Compare {
            field: self.accessor(),
            op: CompareOp::Eq,
            value: Value::Null,
        }
    }

    pub fn is_not_null(&self) -> Expr<T> {
        Expr::Compare {
            field: self.accessor(),
            op: CompareOp::Ne,
            value: Value::Null,
        }
    }
}

/// A type-erased member reader.
///
/// Produced from a typed [`Field`], or by name for any [`Entity`]. Cloning
/// shares the reader.
pub struct Accessor<T> {
    path: Arc<str>,
    field_type: FieldType,
    get: Arc<dyn Fn(&T) -> Value + Send + Sync>,
}

impl<T> Accessor<T> {
    pub fn new(
        path: impl Into<Arc<str>>,
        field_type: FieldType,
        get: impl Fn(&T) -> Value + Send + Sync + 'static,
    ) -> Self {
        Self {
            path: path.into(),
            field_type,
            get: Arc::new(get),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    /// Read the member from an entity.
    pub fn read(&self, entity: &T) -> Value {
        (self.get)(entity)
    }
}

impl<T: Entity + 'static> Accessor<T> {
    /// Read `path` through [`Entity::field_path`]. Missing members read as null.
    pub fn named(path: impl Into<Arc<str>>, field_type: FieldType) -> Self {
        let path: Arc<str> = path.into();
        let lookup = Arc::clone(&path);
        Self {
            path,
            field_type,
            get: Arc::new(move |entity: &T| entity.field_path(&lookup).unwrap_or(Value::Null)),
        }
    }
}

impl<T> Clone for Accessor<T> {
    fn clone(&self) -> Self {
        Self {
            path: Arc::clone(&self.path),
            field_type: self.field_type.clone(),
            get: Arc::clone(&self.get),
        }
    }
}

impl<T> fmt::Debug for Accessor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accessor")
            .field("path", &self.path)
            .field("field_type", &self.field_type)
            .finish()
    }
}

impl<T: 'static, V: FieldValue + 'static> From<Field<T, V>> for Accessor<T> {
    fn from(field: Field<T, V>) -> Self {
        field.accessor()
    }
}

/// A non-empty member name, resolved later by a translator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldName(String);

impl FieldName {
    pub fn new(name: impl Into<String>) -> Result<Self, ConstructionError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ConstructionError::new("field name must not be empty"));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Either an accessor or a name: the two ways to point at a sort key.
pub enum FieldRef<T> {
    Expression(Accessor<T>),
    Name(FieldName),
}

impl<T> FieldRef<T> {
    /// The dotted path or name this reference points at.
    pub fn name(&self) -> &str {
        match self {
            FieldRef::Expression(accessor) => accessor.path(),
            FieldRef::Name(name) => name.as_str(),
        }
    }
}

impl<T> Clone for FieldRef<T> {
    fn clone(&self) -> Self {
        match self {
            FieldRef::Expression(accessor) => FieldRef::Expression(accessor.clone()),
            FieldRef::Name(name) => FieldRef::Name(name.clone()),
        }
    }
}

impl<T> fmt::Debug for FieldRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldRef::Expression(accessor) => f.debug_tuple("Expression").field(accessor).finish(),
            FieldRef::Name(name) => f.debug_tuple("Name").field(name).finish(),
        }
    }
}

impl<T: 'static, V: FieldValue + 'static> From<Field<T, V>> for FieldRef<T> {
    fn from(field: Field<T, V>) -> Self {
        FieldRef::Expression(field.accessor())
    }
}

impl<T> From<Accessor<T>> for FieldRef<T> {
    fn from(accessor: Accessor<T>) -> Self {
        FieldRef::Expression(accessor)
    }
}

impl<T> From<FieldName> for FieldRef<T> {
    fn from(name: FieldName) -> Self {
        FieldRef::Name(name)
    }
}
