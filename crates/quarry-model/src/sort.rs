//! Sort nodes: an ordered list of keys, each by accessor or by name.

use std::fmt;

use crate::error::ConstructionError;
use crate::field::{Accessor, FieldName, FieldRef};

/// A sort specification over `T`.
pub enum SortNode<T> {
    FieldByExpression { field: Accessor<T>, ascending: bool },
    /// Resolved to an accessor by the translator.
    FieldByName { name: FieldName, ascending: bool },
    /// Keys in priority order; later keys break ties of earlier ones.
    Combined(SortKeys<T>),
}

/// Borrowed view of one leaf key.
#[derive(Debug)]
pub struct SortKey<'a, T> {
    pub target: SortTarget<'a, T>,
    pub ascending: bool,
}

/// What a leaf key sorts by.
#[derive(Debug)]
pub enum SortTarget<'a, T> {
    Expression(&'a Accessor<T>),
    Name(&'a FieldName),
}

impl<T> SortTarget<'_, T> {
    /// Path of the accessor, or the name.
    pub fn name(&self) -> &str {
        match self {
            SortTarget::Expression(accessor) => accessor.path(),
            SortTarget::Name(name) => name.as_str(),
        }
    }
}

impl<T> SortNode<T> {
    pub fn by(field: impl Into<FieldRef<T>>, ascending: bool) -> Self {
        match field.into() {
            FieldRef::Expression(field) => SortNode::FieldByExpression { field, ascending },
            FieldRef::Name(name) => SortNode::FieldByName { name, ascending },
        }
    }

    pub fn ascending(field: impl Into<FieldRef<T>>) -> Self {
        Self::by(field, true)
    }

    pub fn descending(field: impl Into<FieldRef<T>>) -> Self {
        Self::by(field, false)
    }

    /// Sort by member name.
    pub fn by_name(name: impl Into<String>, ascending: bool) -> Result<Self, ConstructionError> {
        Ok(SortNode::FieldByName {
            name: FieldName::new(name)?,
            ascending,
        })
    }

    /// Keys in priority order. Needs at least one.
    pub fn combined(keys: Vec<SortNode<T>>) -> Result<Self, ConstructionError> {
        SortKeys::new(keys).map(SortNode::Combined)
    }

    /// Append `next` as a lower-priority key, splicing `Combined` operands.
    pub fn combine(self, next: SortNode<T>) -> Self {
        let mut keys = Vec::new();
        for node in [self, next] {
            match node {
                SortNode::Combined(inner) => keys.extend(inner.0),
                node => keys.push(node),
            }
        }
        SortNode::Combined(SortKeys(keys))
    }

    /// Leaf keys in priority order, flattening nested `Combined` nodes.
    pub fn keys(&self) -> Vec<SortKey<'_, T>> {
        let mut out = Vec::new();
        self.collect_keys(&mut out);
        out
    }

    fn collect_keys<'a>(&'a self, out: &mut Vec<SortKey<'a, T>>) {
        match self {
            SortNode::FieldByExpression { field, ascending } => out.push(SortKey {
                target: SortTarget::Expression(field),
                ascending: *ascending,
            }),
            SortNode::FieldByName { name, ascending } => out.push(SortKey {
                target: SortTarget::Name(name),
                ascending: *ascending,
            }),
            SortNode::Combined(keys) => {
                for key in &keys.0 {
                    key.collect_keys(out);
                }
            }
        }
    }
}

impl<T> Clone for SortNode<T> {
    fn clone(&self) -> Self {
        match self {
            SortNode::FieldByExpression { field, ascending } => SortNode::FieldByExpression {
                field: field.clone(),
                ascending: *ascending,
            },
            SortNode::FieldByName { name, ascending } => SortNode::FieldByName {
                name: name.clone(),
                ascending: *ascending,
            },
            SortNode::Combined(keys) => SortNode::Combined(SortKeys(keys.0.clone())),
        }
    }
}

impl<T> fmt::Debug for SortNode<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortNode::FieldByExpression { field, ascending } => f
                .debug_struct("FieldByExpression")
                .field("path", &field.path())
                .field("ascending", ascending)
                .finish(),
            SortNode::FieldByName { name, ascending } => f
                .debug_struct("FieldByName")
                .field("name", name)
                .field("ascending", ascending)
                .finish(),
            SortNode::Combined(keys) => f.debug_tuple("Combined").field(&keys.0).finish(),
        }
    }
}

/// The keys of a `Combined` sort. Always holds at least one node.
pub struct SortKeys<T>(Vec<SortNode<T>>);

impl<T> SortKeys<T> {
    pub fn new(keys: Vec<SortNode<T>>) -> Result<Self, ConstructionError> {
        if keys.is_empty() {
            return Err(ConstructionError::new(
                "a combined sort needs at least one key",
            ));
        }
        Ok(Self(keys))
    }

    pub fn as_slice(&self) -> &[SortNode<T>] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Field;
    use pretty_assertions::assert_eq;

    struct Person {
        first: String,
        last: String,
    }

    const FIRST: Field<Person, String> = Field::new("FirstName", |p| p.first.clone());
    const LAST: Field<Person, String> = Field::new("LastName", |p| p.last.clone());

    fn describe(node: &SortNode<Person>) -> Vec<(String, bool)> {
        node.keys()
            .iter()
            .map(|k| (k.target.name().to_string(), k.ascending))
            .collect()
    }

    #[test]
    fn test_combined_requires_a_key() {
        assert!(SortNode::<Person>::combined(Vec::new()).is_err());
        assert!(SortNode::combined(vec![SortNode::ascending(FIRST)]).is_ok());
    }

    #[test]
    fn test_by_name_rejects_blank() {
        assert!(SortNode::<Person>::by_name("", true).is_err());
    }

    #[test]
    fn test_combine_flattens_in_priority_order() {
        let first = SortNode::ascending(FIRST).combine(SortNode::descending(LAST));
        let age = SortNode::by_name("Age", true).unwrap();
        let sort = first.combine(age);

        assert_eq!(
            describe(&sort),
            vec![
                ("FirstName".to_string(), true),
                ("LastName".to_string(), false),
                ("Age".to_string(), true),
            ]
        );
    }

    #[test]
    fn test_keys_flatten_nested_combined() {
        let inner = SortNode::combined(vec![SortNode::ascending(LAST)]).unwrap();
        let outer = SortNode::combined(vec![SortNode::descending(FIRST), inner]).unwrap();
        assert_eq!(
            describe(&outer),
            vec![("FirstName".to_string(), false), ("LastName".to_string(), true)]
        );
    }
}
