//! Filter nodes: the backend-agnostic description of "which entities".

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::ConstructionError;
use crate::expr::Expr;

/// A filter over `T`.
pub enum FilterNode<T> {
    /// Matches every entity.
    Empty,
    /// An inspectable expression.
    Expression(Expr<T>),
    /// Conjunction of two or more children, in order.
    Combined(FilterList<T>),
    /// Expression text checked against the entity shape at translation time.
    Dynamic { parameter: String, text: String },
    /// A backend-specific payload passed through untouched.
    Native(NativeFilter),
}

impl<T> FilterNode<T> {
    /// Conjunction of `children`. Needs at least two.
    pub fn combined(children: Vec<FilterNode<T>>) -> Result<Self, ConstructionError> {
        FilterList::new(children).map(FilterNode::Combined)
    }

    /// A filter written in the dynamic expression language, e.g.
    /// `x => x.FirstName == "John"` as parameter `x` and its body.
    pub fn dynamic(
        parameter: impl Into<String>,
        text: impl Into<String>,
    ) -> Result<Self, ConstructionError> {
        let parameter = parameter.into();
        let text = text.into();
        if parameter.trim().is_empty() {
            return Err(ConstructionError::new(
                "dynamic filter parameter name must not be empty",
            ));
        }
        if text.trim().is_empty() {
            return Err(ConstructionError::new(
                "dynamic filter expression must not be empty",
            ));
        }
        Ok(FilterNode::Dynamic { parameter, text })
    }

    pub fn native(filter: NativeFilter) -> Self {
        FilterNode::Native(filter)
    }

    /// Conjunction of `self` and `other`.
    ///
    /// Children of either operand that is already `Combined` are spliced in,
    /// so the result never nests. `Empty` operands are kept as they are.
    pub fn combine(self, other: FilterNode<T>) -> Self {
        let mut children = Vec::new();
        for node in [self, other] {
            match node {
                FilterNode::Combined(list) => children.extend(list.0),
                node => children.push(node),
            }
        }
        FilterNode::Combined(FilterList(children))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, FilterNode::Empty)
    }

    /// Variant name, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            FilterNode::Empty => "Empty",
            FilterNode::Expression(_) => "Expression",
            FilterNode::Combined(_) => "Combined",
            FilterNode::Dynamic { .. } => "Dynamic",
            FilterNode::Native(_) => "Native",
        }
    }
}

impl<T> Default for FilterNode<T> {
    fn default() -> Self {
        FilterNode::Empty
    }
}

impl<T> From<Expr<T>> for FilterNode<T> {
    fn from(expr: Expr<T>) -> Self {
        FilterNode::Expression(expr)
    }
}

impl<T> Clone for FilterNode<T> {
    fn clone(&self) -> Self {
        match self {
            FilterNode::Empty => FilterNode::Empty,
            FilterNode::Expression(expr) => FilterNode::Expression(expr.clone()),
            FilterNode::Combined(list) => FilterNode::Combined(list.clone()),
            FilterNode::Dynamic { parameter, text } => FilterNode::Dynamic {
                parameter: parameter.clone(),
                text: text.clone(),
            },
            FilterNode::Native(native) => FilterNode::Native(native.clone()),
        }
    }
}

impl<T> fmt::Debug for FilterNode<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterNode::Empty => f.write_str("Empty"),
            FilterNode::Expression(expr) => f.debug_tuple("Expression").field(expr).finish(),
            FilterNode::Combined(list) => f.debug_tuple("Combined").field(&list.0).finish(),
            FilterNode::Dynamic { parameter, text } => f
                .debug_struct("Dynamic")
                .field("parameter", parameter)
                .field("text", text)
                .finish(),
            FilterNode::Native(native) => f.debug_tuple("Native").field(native).finish(),
        }
    }
}

/// The children of a `Combined` filter. Always holds at least two nodes.
pub struct FilterList<T>(Vec<FilterNode<T>>);

impl<T> FilterList<T> {
    pub fn new(children: Vec<FilterNode<T>>) -> Result<Self, ConstructionError> {
        if children.len() < 2 {
            return Err(ConstructionError::new(format!(
                "a combined filter needs at least two children, got {}",
                children.len()
            )));
        }
        Ok(Self(children))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FilterNode<T>> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[FilterNode<T>] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<T> Clone for FilterList<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<'a, T> IntoIterator for &'a FilterList<T> {
    type Item = &'a FilterNode<T>;
    type IntoIter = std::slice::Iter<'a, FilterNode<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// An opaque backend filter tagged with the backend it was written for.
#[derive(Clone)]
pub struct NativeFilter {
    backend: String,
    payload: Arc<dyn Any + Send + Sync>,
}

impl NativeFilter {
    pub fn new<P: Any + Send + Sync>(backend: impl Into<String>, payload: P) -> Self {
        Self {
            backend: backend.into(),
            payload: Arc::new(payload),
        }
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    /// The payload, if it has type `P`.
    pub fn payload<P: Any>(&self) -> Option<&P> {
        self.payload.downcast_ref::<P>()
    }
}

impl fmt::Debug for NativeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFilter")
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Field;
    use pretty_assertions::assert_eq;

    struct Person {
        age: i64,
    }

    const AGE: Field<Person, i64> = Field::new("Age", |p| p.age);

    fn describe(node: &FilterNode<Person>) -> Vec<String> {
        let children: Vec<&FilterNode<Person>> = match node {
            FilterNode::Combined(list) => list.iter().collect(),
            other => vec![other],
        };
        children
            .into_iter()
            .map(|child| match child {
                FilterNode::Expression(expr) => expr.to_string(),
                FilterNode::Dynamic { parameter, text } => format!("{parameter} => {text}"),
                other => other.kind().to_string(),
            })
            .collect()
    }

    fn kinds(node: &FilterNode<Person>) -> Vec<&'static str> {
        match node {
            FilterNode::Combined(list) => list.iter().map(FilterNode::kind).collect(),
            other => vec![other.kind()],
        }
    }

    #[test]
    fn test_combined_needs_two_children() {
        let err = FilterNode::<Person>::combined(vec![AGE.gt(1).into()]).unwrap_err();
        assert!(err.message().contains("at least two"));
        assert!(FilterNode::<Person>::combined(Vec::new()).is_err());
        assert!(FilterNode::combined(vec![AGE.gt(1).into(), AGE.lt(9).into()]).is_ok());
    }

    #[test]
    fn test_combine_flattens_both_sides() {
        let left = FilterNode::from(AGE.gt(1)).combine(AGE.lt(9).into());
        let right = FilterNode::dynamic("x", "x.Age != 5")
            .unwrap()
            .combine(FilterNode::Empty);
        let combined = left.combine(right);

        assert_eq!(
            kinds(&combined),
            vec!["Expression", "Expression", "Dynamic", "Empty"]
        );
        assert_eq!(
            describe(&combined),
            vec!["x.Age > 1", "x.Age < 9", "x => x.Age != 5", "Empty"]
        );
    }

    #[test]
    fn test_combine_keeps_empty_operand() {
        let combined = FilterNode::Empty.combine(AGE.gt(1).into());
        assert_eq!(kinds(&combined), vec!["Empty", "Expression"]);
    }

    #[test]
    fn test_dynamic_rejects_blank_arguments() {
        assert!(FilterNode::<Person>::dynamic("x", "  ").is_err());
        assert!(FilterNode::<Person>::dynamic("", "x.Age > 1").is_err());
    }

    #[test]
    fn test_native_payload_downcast() {
        let native = NativeFilter::new("document", String::from("{}"));
        assert_eq!(native.backend(), "document");
        assert_eq!(native.payload::<String>().map(String::as_str), Some("{}"));
        assert!(native.payload::<i32>().is_none());
    }
}
