//! Shape definitions: the named, typed members an entity exposes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::record::Record;
use crate::value::Value;

/// Scalar member types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    Bool,
    Int,
    Float,
    String,
}

impl ScalarType {
    /// Check if this type is numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(self, ScalarType::Int | ScalarType::Float)
    }

    /// The scalar type of a non-null, non-record value.
    pub fn of(value: &Value) -> Option<ScalarType> {
        match value {
            Value::Bool(_) => Some(ScalarType::Bool),
            Value::Int(_) => Some(ScalarType::Int),
            Value::Float(_) => Some(ScalarType::Float),
            Value::String(_) => Some(ScalarType::String),
            Value::Null | Value::Record(_) => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScalarType::Bool => "Bool",
            ScalarType::Int => "Int",
            ScalarType::Float => "Float",
            ScalarType::String => "String",
        }
    }
}

/// Member types. Embedded shapes nest through their field list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldType {
    /// A scalar value.
    Scalar(ScalarType),
    /// A nullable scalar value.
    Optional(ScalarType),
    /// An embedded record.
    Embedded(Shape),
    /// A nullable embedded record.
    OptionalEmbedded(Shape),
}

impl FieldType {
    /// Check if this type is nullable.
    pub fn is_nullable(&self) -> bool {
        matches!(self, FieldType::Optional(_) | FieldType::OptionalEmbedded(_))
    }

    /// Get the scalar type if this is a scalar-based type.
    pub fn scalar(&self) -> Option<ScalarType> {
        match self {
            FieldType::Scalar(s) | FieldType::Optional(s) => Some(*s),
            _ => None,
        }
    }

    /// Get the embedded shape if this is a record type.
    pub fn shape(&self) -> Option<&Shape> {
        match self {
            FieldType::Embedded(s) | FieldType::OptionalEmbedded(s) => Some(s),
            _ => None,
        }
    }

    /// The nullable form of this type.
    pub fn into_optional(self) -> FieldType {
        match self {
            FieldType::Scalar(s) => FieldType::Optional(s),
            FieldType::Embedded(s) => FieldType::OptionalEmbedded(s),
            other => other,
        }
    }

    /// Whether an expression written against `self` can read a member of type `other`.
    ///
    /// Numeric types are interchangeable and nullability is ignored. Embedded
    /// shapes are compatible when every member of `self` has a compatible
    /// member in `other`.
    pub fn is_compatible_with(&self, other: &FieldType) -> bool {
        match (self, other) {
            (
                FieldType::Scalar(a) | FieldType::Optional(a),
                FieldType::Scalar(b) | FieldType::Optional(b),
            ) => a == b || (a.is_numeric() && b.is_numeric()),
            (
                FieldType::Embedded(a) | FieldType::OptionalEmbedded(a),
                FieldType::Embedded(b) | FieldType::OptionalEmbedded(b),
            ) => a.fields().iter().all(|field| {
                b.field(&field.name)
                    .is_some_and(|target| field.field_type.is_compatible_with(&target.field_type))
            }),
            _ => false,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Scalar(s) => f.write_str(s.name()),
            FieldType::Optional(s) => write!(f, "{}?", s.name()),
            FieldType::Embedded(s) => f.write_str(s.name()),
            FieldType::OptionalEmbedded(s) => write!(f, "{}?", s.name()),
        }
    }
}

/// A named member of a shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub field_type: FieldType,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }

    /// Shorthand for a non-nullable scalar member.
    pub fn scalar(name: impl Into<String>, scalar: ScalarType) -> Self {
        Self::new(name, FieldType::Scalar(scalar))
    }

    /// Shorthand for a nullable scalar member.
    pub fn optional(name: impl Into<String>, scalar: ScalarType) -> Self {
        Self::new(name, FieldType::Optional(scalar))
    }
}

/// The member layout of an entity type.
///
/// Dynamic expressions are checked against a shape, and re-targeting
/// compares the members an expression reads with a shape's members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    name: String,
    fields: Vec<FieldDef>,
}

impl Shape {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Add a member.
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Add multiple members.
    pub fn with_fields(mut self, fields: impl IntoIterator<Item = FieldDef>) -> Self {
        self.fields.extend(fields);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Look up a top-level member.
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Resolve a dotted member path through embedded shapes.
    ///
    /// A nullable embedded step makes the resolved type nullable.
    pub fn resolve(&self, path: &str) -> Option<FieldType> {
        let mut segments = path.split('.');
        let mut current = self.field(segments.next()?)?.field_type.clone();
        for segment in segments {
            let nullable = current.is_nullable();
            let next = current.shape()?.field(segment)?.field_type.clone();
            current = if nullable { next.into_optional() } else { next };
        }
        Some(current)
    }

    /// Infer a shape from sample records.
    ///
    /// Members missing or null in any record become nullable. Int and Float
    /// samples widen to Float. Members whose samples disagree on kind, or
    /// that are only ever null, are left out.
    pub fn infer<'a>(
        name: impl Into<String>,
        records: impl IntoIterator<Item = &'a Record>,
    ) -> Shape {
        let records: Vec<&Record> = records.into_iter().collect();
        let mut names: Vec<&str> = Vec::new();
        for record in &records {
            for (field, _) in record.fields() {
                if !names.contains(&field) {
                    names.push(field);
                }
            }
        }

        let mut shape = Shape::new(name);
        for field in names {
            let samples: Vec<Option<&Value>> = records.iter().map(|r| r.get(field)).collect();
            if let Some(field_type) = infer_field_type(field, &samples) {
                shape = shape.with_field(FieldDef::new(field, field_type));
            }
        }
        shape
    }
}

fn infer_field_type(name: &str, samples: &[Option<&Value>]) -> Option<FieldType> {
    let mut nullable = false;
    let mut scalar: Option<ScalarType> = None;
    let mut nested: Vec<&Record> = Vec::new();

    for sample in samples {
        match sample {
            None | Some(Value::Null) => nullable = true,
            Some(Value::Record(record)) => {
                if scalar.is_some() {
                    return None;
                }
                nested.push(record);
            }
            Some(value) => {
                if !nested.is_empty() {
                    return None;
                }
                let kind = ScalarType::of(value)?;
                scalar = match scalar {
                    None => Some(kind),
                    Some(seen) if seen == kind => Some(seen),
                    Some(seen) if seen.is_numeric() && kind.is_numeric() => Some(ScalarType::Float),
                    Some(_) => return None,
                };
            }
        }
    }

    if !nested.is_empty() {
        let shape = Shape::infer(name, nested);
        return Some(if nullable {
            FieldType::OptionalEmbedded(shape)
        } else {
            FieldType::Embedded(shape)
        });
    }

    scalar.map(|s| {
        if nullable {
            FieldType::Optional(s)
        } else {
            FieldType::Scalar(s)
        }
    })
}
