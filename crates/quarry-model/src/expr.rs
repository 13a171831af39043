//! Inspectable boolean expressions over an entity type.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::field::Accessor;
use crate::value::Value;

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }

    /// The operator that gives the same result with operands swapped.
    pub fn flip(self) -> Self {
        match self {
            CompareOp::Lt => CompareOp::Gt,
            CompareOp::Le => CompareOp::Ge,
            CompareOp::Gt => CompareOp::Lt,
            CompareOp::Ge => CompareOp::Le,
            op => op,
        }
    }

    /// Apply to two values. Ordering against null or across kinds is false.
    pub fn apply(self, left: &Value, right: &Value) -> bool {
        match self {
            CompareOp::Eq => left.loose_eq(right),
            CompareOp::Ne => !left.loose_eq(right),
            CompareOp::Lt => left.compare(right) == Some(Ordering::Less),
            CompareOp::Le => matches!(
                left.compare(right),
                Some(Ordering::Less | Ordering::Equal)
            ),
            CompareOp::Gt => left.compare(right) == Some(Ordering::Greater),
            CompareOp::Ge => matches!(
                left.compare(right),
                Some(Ordering::Greater | Ordering::Equal)
            ),
        }
    }
}

/// String tests a typed field can express.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StringMethod {
    StartsWith,
    EndsWith,
    Contains,
}

impl StringMethod {
    pub fn name(self) -> &'static str {
        match self {
            StringMethod::StartsWith => "StartsWith",
            StringMethod::EndsWith => "EndsWith",
            StringMethod::Contains => "Contains",
        }
    }

    pub fn apply(self, subject: &str, argument: &str) -> bool {
        match self {
            StringMethod::StartsWith => subject.starts_with(argument),
            StringMethod::EndsWith => subject.ends_with(argument),
            StringMethod::Contains => subject.contains(argument),
        }
    }
}

/// A boolean condition over `T`.
///
/// Every variant except `Opaque` is inspectable, so translators can lower
/// it to a backend's native filter or re-target it to another shape.
pub enum Expr<T> {
    /// `field op value`.
    Compare {
        field: Accessor<T>,
        op: CompareOp,
        value: Value,
    },
    /// A boolean member used as the condition.
    Member(Accessor<T>),
    /// A string method applied to a member.
    Call {
        field: Accessor<T>,
        method: StringMethod,
        argument: String,
    },
    And(Box<Expr<T>>, Box<Expr<T>>),
    Or(Box<Expr<T>>, Box<Expr<T>>),
    Not(Box<Expr<T>>),
    /// An arbitrary closure. Evaluates in memory only.
    Opaque {
        label: String,
        predicate: Arc<dyn Fn(&T) -> bool + Send + Sync>,
    },
}

impl<T> Expr<T> {
    /// Wrap a closure that translators cannot inspect.
    pub fn opaque(
        label: impl Into<String>,
        predicate: impl Fn(&T) -> bool + Send + Sync + 'static,
    ) -> Self {
        Expr::Opaque {
            label: label.into(),
            predicate: Arc::new(predicate),
        }
    }

    pub fn and(self, other: Expr<T>) -> Self {
        Expr::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Expr<T>) -> Self {
        Expr::Or(Box::new(self), Box::new(other))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }

    /// Evaluate against an entity. `And` and `Or` short-circuit.
    pub fn evaluate(&self, entity: &T) -> bool {
        match self {
            Expr::Compare { field, op, value } => op.apply(&field.read(entity), value),
            Expr::Member(field) => field.read(entity) == Value::Bool(true),
            Expr::Call {
                field,
                method,
                argument,
            } => match field.read(entity) {
                Value::String(subject) => method.apply(&subject, argument),
                _ => false,
            },
            Expr::And(left, right) => left.evaluate(entity) && right.evaluate(entity),
            Expr::Or(left, right) => left.evaluate(entity) || right.evaluate(entity),
            Expr::Not(inner) => !inner.evaluate(entity),
            Expr::Opaque { predicate, .. } => predicate(entity),
        }
    }

    /// Every accessor the expression reads, left to right.
    pub fn accessors(&self) -> Vec<&Accessor<T>> {
        let mut out = Vec::new();
        self.collect_accessors(&mut out);
        out
    }

    fn collect_accessors<'a>(&'a self, out: &mut Vec<&'a Accessor<T>>) {
        match self {
            Expr::Compare { field, .. } | Expr::Member(field) | Expr::Call { field, .. } => {
                out.push(field)
            }
            Expr::And(left, right) | Expr::Or(left, right) => {
                left.collect_accessors(out);
                right.collect_accessors(out);
            }
            Expr::Not(inner) => inner.collect_accessors(out),
            Expr::Opaque { .. } => {}
        }
    }
}

impl<T> Clone for Expr<T> {
    fn clone(&self) -> Self {
        match self {
            Expr::Compare { field, op, value } => Expr::Compare {
                field: field.clone(),
                op: *op,
                value: value.clone(),
            },
            Expr::Member(field) => Expr::Member(field.clone()),
            Expr::Call {
                field,
                method,
                argument,
            } => Expr::Call {
                field: field.clone(),
                method: *method,
                argument: argument.clone(),
            },
            Expr::And(left, right) => Expr::And(left.clone(), right.clone()),
            Expr::Or(left, right) => Expr::Or(left.clone(), right.clone()),
            Expr::Not(inner) => Expr::Not(inner.clone()),
            Expr::Opaque { label, predicate } => Expr::Opaque {
                label: label.clone(),
                predicate: Arc::clone(predicate),
            },
        }
    }
}

/// Renders in the dynamic expression syntax, with `x` as the parameter.
impl<T> fmt::Display for Expr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Compare { field, op, value } => {
                write!(f, "x.{} {} {}", field.path(), op.symbol(), value)
            }
            Expr::Member(field) => write!(f, "x.{}", field.path()),
            Expr::Call {
                field,
                method,
                argument,
            } => write!(f, "x.{}.{}({:?})", field.path(), method.name(), argument),
            Expr::And(left, right) => write!(f, "({left} && {right})"),
            Expr::Or(left, right) => write!(f, "({left} || {right})"),
            Expr::Not(inner) => write!(f, "!({inner})"),
            Expr::Opaque { label, .. } => write!(f, "<{label}>"),
        }
    }
}

impl<T> fmt::Debug for Expr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Expr({self})")
    }
}
