//! Lowering into MongoDB-style filter and sort documents.
//!
//! Only a fixed set of expression forms has a native counterpart:
//! comparisons between a member and a literal, a boolean member on its own,
//! and `&&`/`||` over those. Anything else fails the whole translation
//! rather than producing a partial filter.

use std::fmt;
use std::marker::PhantomData;

use quarry_lang::{CheckedExpr, DynamicCompiler, PredicateCache};
use quarry_model::{
    CompareOp, Entity, Expr, FilterNode, NativeFilter, NotSupportedError, PageRequest, Query,
    Shape, SortNode, Value,
};
use serde_json::{json, Value as JsonValue};
use tracing::debug;

use crate::error::Result;
use crate::mapper::DocumentFieldMapper;

/// Backend tag carried by native document filters.
pub const DOCUMENT_BACKEND: &str = "document";

/// A JSON object in the store's native query syntax.
pub type Document = serde_json::Map<String, JsonValue>;

/// A fully lowered query, ready to hand to a document store.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocumentQuery {
    pub filter: Document,
    pub sort: Option<Document>,
    pub skip: Option<u64>,
    pub limit: Option<u32>,
}

impl DocumentQuery {
    /// Render as one JSON object, leaving out unset parts.
    pub fn to_json(&self) -> JsonValue {
        let mut out = Document::new();
        out.insert("filter".to_string(), JsonValue::Object(self.filter.clone()));
        if let Some(sort) = &self.sort {
            out.insert("sort".to_string(), JsonValue::Object(sort.clone()));
        }
        if let Some(skip) = self.skip {
            out.insert("skip".to_string(), json!(skip));
        }
        if let Some(limit) = self.limit {
            out.insert("limit".to_string(), json!(limit));
        }
        JsonValue::Object(out)
    }
}

/// Wrap a hand-written document as a native filter node payload.
pub fn native_document(filter: Document) -> NativeFilter {
    NativeFilter::new(DOCUMENT_BACKEND, filter)
}

/// Lowers query nodes over `T` into [`Document`]s.
///
/// Member paths are passed through a [`DocumentFieldMapper`] when one is
/// set; otherwise the logical path is used as the native path.
pub struct DocumentTranslator<'a, T> {
    shape: Shape,
    compiler: DynamicCompiler<'a>,
    mapper: Option<&'a dyn DocumentFieldMapper>,
    _entity: PhantomData<fn() -> T>,
}

impl<'a, T: Entity> DocumentTranslator<'a, T> {
    pub fn new() -> Self {
        Self {
            shape: T::shape(),
            compiler: DynamicCompiler::new(),
            mapper: None,
            _entity: PhantomData,
        }
    }

    pub fn with_shape(mut self, shape: Shape) -> Self {
        self.shape = shape;
        self
    }

    pub fn with_cache(mut self, cache: &'a dyn PredicateCache) -> Self {
        self.compiler = self.compiler.with_cache(cache);
        self
    }

    pub fn with_mapper(mut self, mapper: &'a dyn DocumentFieldMapper) -> Self {
        self.mapper = Some(mapper);
        self
    }

    /// Lower a filter. `Empty` becomes `{}`.
    pub fn filter(&self, filter: &FilterNode<T>) -> Result<Document> {
        match filter {
            FilterNode::Empty => Ok(Document::new()),
            FilterNode::Expression(expr) => self.lower_expr(expr),
            FilterNode::Combined(children) => {
                let clauses = children
                    .iter()
                    .map(|child| self.filter(child))
                    .collect::<Result<Vec<_>>>()?;
                Ok(connect("$and", clauses))
            }
            FilterNode::Dynamic { parameter, text } => {
                let compiled = self.compiler.compile(&self.shape, parameter, text)?;
                self.lower_checked(compiled.expr())
            }
            FilterNode::Native(native) => {
                if native.backend() != DOCUMENT_BACKEND {
                    return Err(NotSupportedError::new(format!(
                        "native filter for backend '{}' handed to the document translator",
                        native.backend()
                    ))
                    .into());
                }
                native.payload::<Document>().cloned().ok_or_else(|| {
                    NotSupportedError::new("native document filter payload is not a document")
                        .into()
                })
            }
        }
    }

    /// Lower a sort to `{path: 1 | -1}` in key order.
    ///
    /// A path that appears twice keeps its first position and direction.
    pub fn sort(&self, sort: &SortNode<T>) -> Result<Document> {
        let mut out = Document::new();
        for key in sort.keys() {
            let native = self.native_path(key.target.name())?;
            if !out.contains_key(&native) {
                out.insert(native, json!(if key.ascending { 1 } else { -1 }));
            }
        }
        Ok(out)
    }

    pub fn query(&self, query: &Query<T>) -> Result<DocumentQuery> {
        let filter = self.filter(query.filter())?;
        let sort = query.sort().map(|sort| self.sort(sort)).transpose()?;
        debug!(
            shape = self.shape.name(),
            clauses = filter.len(),
            sorted = sort.is_some(),
            "lowered query to document"
        );
        Ok(DocumentQuery {
            filter,
            sort,
            skip: None,
            limit: None,
        })
    }

    /// Lower a page request; the window becomes `skip`/`limit`.
    pub fn page(&self, request: &PageRequest<T>) -> Result<DocumentQuery> {
        let mut lowered = self.query(request.query())?;
        lowered.skip = Some(request.offset());
        lowered.limit = Some(request.size());
        Ok(lowered)
    }

    fn lower_expr(&self, expr: &Expr<T>) -> Result<Document> {
        match expr {
            Expr::Compare { field, op, value } => self.comparison(field.path(), *op, value),
            Expr::Member(field) => self.flag(field.path()),
            Expr::And(left, right) => Ok(connect(
                "$and",
                vec![self.lower_expr(left)?, self.lower_expr(right)?],
            )),
            Expr::Or(left, right) => Ok(connect(
                "$or",
                vec![self.lower_expr(left)?, self.lower_expr(right)?],
            )),
            Expr::Not(_) => Err(NotSupportedError::new(format!(
                "negation '{expr}' has no document form"
            ))
            .into()),
            Expr::Call { field, method, .. } => Err(NotSupportedError::for_field(
                field.path(),
                format!("method '{}' has no document form", method.name()),
            )
            .into()),
            Expr::Opaque { label, .. } => Err(NotSupportedError::new(format!(
                "opaque expression '{label}' cannot be lowered to a document"
            ))
            .into()),
        }
    }

    fn lower_checked(&self, expr: &CheckedExpr) -> Result<Document> {
        match expr {
            CheckedExpr::Compare { op, left, right } => match (left.as_ref(), right.as_ref()) {
                (CheckedExpr::Field(path), CheckedExpr::Literal(value)) => {
                    self.comparison(path, *op, value)
                }
                (CheckedExpr::Literal(value), CheckedExpr::Field(path)) => {
                    self.comparison(path, op.flip(), value)
                }
                (left, right) => Err(NotSupportedError::new(format!(
                    "comparison between {} and {} has no document form",
                    left.kind(),
                    right.kind()
                ))
                .into()),
            },
            CheckedExpr::Field(path) => self.flag(path),
            CheckedExpr::And(left, right) => Ok(connect(
                "$and",
                vec![self.lower_checked(left)?, self.lower_checked(right)?],
            )),
            CheckedExpr::Or(left, right) => Ok(connect(
                "$or",
                vec![self.lower_checked(left)?, self.lower_checked(right)?],
            )),
            other => Err(NotSupportedError::new(format!(
                "{} has no document form",
                other.kind()
            ))
            .into()),
        }
    }

    fn comparison(&self, path: &str, op: CompareOp, value: &Value) -> Result<Document> {
        let operator = match op {
            CompareOp::Eq => "$eq",
            CompareOp::Ne => "$ne",
            CompareOp::Lt => "$lt",
            CompareOp::Le => "$lte",
            CompareOp::Gt => "$gt",
            CompareOp::Ge => "$gte",
        };
        let mut out = Document::new();
        out.insert(
            self.native_path(path)?,
            json!({ operator: value.to_json() }),
        );
        Ok(out)
    }

    fn flag(&self, path: &str) -> Result<Document> {
        let mut out = Document::new();
        out.insert(self.native_path(path)?, JsonValue::Bool(true));
        Ok(out)
    }

    fn native_path(&self, path: &str) -> Result<String> {
        match self.mapper {
            Some(mapper) => mapper.native_path(path).ok_or_else(|| {
                NotSupportedError::for_field(path, format!("no native field for member '{path}'"))
                    .into()
            }),
            None => Ok(path.to_string()),
        }
    }
}

impl<T: Entity> Default for DocumentTranslator<'_, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for DocumentTranslator<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentTranslator")
            .field("shape", &self.shape.name())
            .field("compiler", &self.compiler)
            .field("mapper", &self.mapper.is_some())
            .finish()
    }
}

/// Join clauses under `op`, splicing nested clauses of the same operator.
/// Empty clauses match everything and are dropped.
fn connect(op: &str, clauses: Vec<Document>) -> Document {
    let mut flat = Vec::new();
    for clause in clauses {
        if clause.is_empty() {
            continue;
        }
        if clause.len() == 1 {
            if let Some(JsonValue::Array(nested)) = clause.get(op) {
                flat.extend(nested.iter().cloned());
                continue;
            }
        }
        flat.push(JsonValue::Object(clause));
    }

    match flat.len() {
        0 => Document::new(),
        1 => match flat.pop() {
            Some(JsonValue::Object(only)) => only,
            _ => Document::new(),
        },
        _ => {
            let mut out = Document::new();
            out.insert(op.to_string(), JsonValue::Array(flat));
            out
        }
    }
}
