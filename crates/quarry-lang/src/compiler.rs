//! Type checking and compilation of parsed expressions against a shape.
//!
//! The checker resolves every identifier and member against the entity's
//! [`Shape`], assigns each node a type, and rejects operator/operand
//! mismatches with a spanned [`ParseError`]. The result is a [`CheckedExpr`]
//! that evaluates directly over any [`Entity`].

use std::fmt;
use std::sync::Arc;

use quarry_model::{CompareOp, Entity, FieldType, ScalarType, Shape, StringMethod, Value};
use tracing::debug;

use crate::ast::{self, BinaryOp, Literal};
use crate::cache::PredicateCache;
use crate::error::{ParseError, TranslationError};
use crate::parser::parse;
use crate::span::Span;

/// Methods callable from expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// `StartsWith`, `EndsWith` or `Contains`.
    Test(StringMethod),
    Equals,
    ToUpper,
    ToLower,
    Trim,
    ToString,
}

impl Method {
    pub fn from_name(name: &str) -> Option<Method> {
        Some(match name {
            "StartsWith" => Method::Test(StringMethod::StartsWith),
            "EndsWith" => Method::Test(StringMethod::EndsWith),
            "Contains" => Method::Test(StringMethod::Contains),
            "Equals" => Method::Equals,
            "ToUpper" => Method::ToUpper,
            "ToLower" => Method::ToLower,
            "Trim" => Method::Trim,
            "ToString" => Method::ToString,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Method::Test(method) => method.name(),
            Method::Equals => "Equals",
            Method::ToUpper => "ToUpper",
            Method::ToLower => "ToLower",
            Method::Trim => "Trim",
            Method::ToString => "ToString",
        }
    }

    fn arity(self) -> usize {
        match self {
            Method::Test(_) | Method::Equals => 1,
            _ => 0,
        }
    }

    /// Apply to a receiver. A null receiver or argument yields null, except
    /// for `Equals`, which follows the null rule of `==`.
    pub fn invoke(self, target: Value, args: &[Value]) -> Value {
        match (self, target) {
            (Method::Equals, target) => match args.first() {
                Some(argument) => Value::Bool(target.loose_eq(argument)),
                None => Value::Null,
            },
            (_, Value::Null) => Value::Null,
            (Method::Test(method), Value::String(subject)) => match args.first() {
                Some(Value::String(argument)) => Value::Bool(method.apply(&subject, argument)),
                _ => Value::Null,
            },
            (Method::ToUpper, Value::String(s)) => Value::String(s.to_uppercase()),
            (Method::ToLower, Value::String(s)) => Value::String(s.to_lowercase()),
            (Method::Trim, Value::String(s)) => Value::String(s.trim().to_string()),
            (Method::ToString, Value::String(s)) => Value::String(s),
            (Method::ToString, target) => Value::String(target.to_string()),
            _ => Value::Null,
        }
    }
}

/// The kind part of an expression type.
#[derive(Debug, Clone, PartialEq)]
pub enum Kind {
    Bool,
    Int,
    Float,
    String,
    /// The `null` literal.
    Null,
    Record(Shape),
}

impl Kind {
    fn is_numeric(&self) -> bool {
        matches!(self, Kind::Int | Kind::Float)
    }
}

impl From<ScalarType> for Kind {
    fn from(scalar: ScalarType) -> Self {
        match scalar {
            ScalarType::Bool => Kind::Bool,
            ScalarType::Int => Kind::Int,
            ScalarType::Float => Kind::Float,
            ScalarType::String => Kind::String,
        }
    }
}

/// The static type of an expression node.
#[derive(Debug, Clone, PartialEq)]
pub struct ExprType {
    pub kind: Kind,
    pub nullable: bool,
}

impl ExprType {
    fn new(kind: Kind, nullable: bool) -> Self {
        Self { kind, nullable }
    }

    fn of_field(field_type: &FieldType) -> Self {
        match field_type {
            FieldType::Scalar(s) => Self::new((*s).into(), false),
            FieldType::Optional(s) => Self::new((*s).into(), true),
            FieldType::Embedded(shape) => Self::new(Kind::Record(shape.clone()), false),
            FieldType::OptionalEmbedded(shape) => Self::new(Kind::Record(shape.clone()), true),
        }
    }

    fn of_literal(literal: &Literal) -> Self {
        match literal {
            Literal::Null => Self::new(Kind::Null, true),
            Literal::Bool(_) => Self::new(Kind::Bool, false),
            Literal::Int(_) => Self::new(Kind::Int, false),
            Literal::Float(_) => Self::new(Kind::Float, false),
            Literal::String(_) => Self::new(Kind::String, false),
        }
    }

    fn is_boolean(&self) -> bool {
        self.kind == Kind::Bool && !self.nullable
    }
}

impl fmt::Display for ExprType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match &self.kind {
            Kind::Bool => "Bool",
            Kind::Int => "Int",
            Kind::Float => "Float",
            Kind::String => "String",
            Kind::Null => return f.write_str("null"),
            Kind::Record(shape) => shape.name(),
        };
        if self.nullable {
            write!(f, "{name}?")
        } else {
            f.write_str(name)
        }
    }
}

/// A type-checked expression, evaluated over any [`Entity`].
#[derive(Debug, Clone, PartialEq)]
pub enum CheckedExpr {
    Literal(Value),
    /// A member path rooted at the parameter, e.g. `Address.City`.
    Field(String),
    /// `Length` of a string.
    Length(Box<CheckedExpr>),
    Call {
        target: Box<CheckedExpr>,
        method: Method,
        args: Vec<CheckedExpr>,
    },
    Not(Box<CheckedExpr>),
    And(Box<CheckedExpr>, Box<CheckedExpr>),
    Or(Box<CheckedExpr>, Box<CheckedExpr>),
    Compare {
        op: CompareOp,
        left: Box<CheckedExpr>,
        right: Box<CheckedExpr>,
    },
}

impl CheckedExpr {
    /// Evaluate to a value. Missing members read as null.
    pub fn evaluate(&self, entity: &dyn Entity) -> Value {
        match self {
            CheckedExpr::Literal(value) => value.clone(),
            CheckedExpr::Field(path) => entity.field_path(path).unwrap_or(Value::Null),
            CheckedExpr::Length(inner) => match inner.evaluate(entity) {
                Value::String(s) => {
                    Value::Int(i64::try_from(s.chars().count()).unwrap_or(i64::MAX))
                }
                _ => Value::Null,
            },
            CheckedExpr::Call {
                target,
                method,
                args,
            } => {
                let args: Vec<Value> = args.iter().map(|a| a.evaluate(entity)).collect();
                method.invoke(target.evaluate(entity), &args)
            }
            CheckedExpr::Not(inner) => Value::Bool(!inner.test(entity)),
            CheckedExpr::And(left, right) => Value::Bool(left.test(entity) && right.test(entity)),
            CheckedExpr::Or(left, right) => Value::Bool(left.test(entity) || right.test(entity)),
            CheckedExpr::Compare { op, left, right } => {
                Value::Bool(op.apply(&left.evaluate(entity), &right.evaluate(entity)))
            }
        }
    }

    /// Evaluate as a condition; anything but `true` (null included) fails.
    pub fn test(&self, entity: &dyn Entity) -> bool {
        self.evaluate(entity) == Value::Bool(true)
    }

    /// Node name, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            CheckedExpr::Literal(_) => "literal",
            CheckedExpr::Field(_) => "member",
            CheckedExpr::Length(_) => "Length",
            CheckedExpr::Call { .. } => "method call",
            CheckedExpr::Not(_) => "negation",
            CheckedExpr::And(..) => "conjunction",
            CheckedExpr::Or(..) => "disjunction",
            CheckedExpr::Compare { .. } => "comparison",
        }
    }
}

enum Checked {
    /// The parameter itself; only valid as the root of a member access.
    Root(Span),
    Value(CheckedExpr, ExprType),
}

struct Checker<'a> {
    shape: &'a Shape,
    parameter: &'a str,
}

impl Checker<'_> {
    fn check(&self, expr: &ast::Expr) -> Result<Checked, ParseError> {
        match expr {
            ast::Expr::Literal(lit) => Ok(Checked::Value(
                CheckedExpr::Literal(literal_value(&lit.value)),
                ExprType::of_literal(&lit.value),
            )),
            ast::Expr::Ident(name) if name.value == self.parameter => Ok(Checked::Root(name.span)),
            ast::Expr::Ident(name) => self.root_member(&name.value, name.span).map_err(|e| {
                e.with_hint(format!(
                    "members are read through the parameter, e.g. '{}.{}'",
                    self.parameter,
                    self.shape.fields().first().map_or("Member", |f| f.name.as_str())
                ))
            }),
            ast::Expr::Member { target, member } => match self.check(target)? {
                Checked::Root(_) => self.root_member(&member.value, member.span),
                Checked::Value(inner, ty) => {
                    self.nested_member(inner, ty, &member.value, member.span)
                }
            },
            ast::Expr::Call {
                target,
                method,
                args,
                span,
            } => {
                let (target, target_ty) = self.value(target)?;
                let resolved = Method::from_name(&method.value).ok_or_else(|| {
                    ParseError::new(format!("unknown method '{}'", method.value), method.span)
                        .with_hint(
                            "available methods: StartsWith, EndsWith, Contains, Equals, \
                             ToUpper, ToLower, Trim, ToString",
                        )
                })?;
                self.check_call(target, target_ty, resolved, args, *span)
            }
            ast::Expr::Not { operand, .. } => {
                let (inner, ty) = self.value(operand)?;
                require_boolean(&ty, operand.span(), "!")?;
                Ok(Checked::Value(
                    CheckedExpr::Not(Box::new(inner)),
                    ExprType::new(Kind::Bool, false),
                ))
            }
            ast::Expr::Binary { op, left, right } => self.check_binary(*op, left, right),
        }
    }

    /// Check a node that must produce a value.
    fn value(&self, expr: &ast::Expr) -> Result<(CheckedExpr, ExprType), ParseError> {
        match self.check(expr)? {
            Checked::Value(inner, ty) => Ok((inner, ty)),
            Checked::Root(span) => Err(ParseError::new(
                format!("parameter '{}' cannot be used as a value", self.parameter),
                span,
            )
            .with_hint(format!("read one of its members, e.g. '{}.Name'", self.parameter))),
        }
    }

    fn root_member(&self, name: &str, span: Span) -> Result<Checked, ParseError> {
        match self.shape.field(name) {
            Some(field) => Ok(Checked::Value(
                CheckedExpr::Field(name.to_string()),
                ExprType::of_field(&field.field_type),
            )),
            None => Err(ParseError::new(
                format!("unknown member '{}' on '{}'", name, self.shape.name()),
                span,
            )),
        }
    }

    fn nested_member(
        &self,
        inner: CheckedExpr,
        ty: ExprType,
        name: &str,
        span: Span,
    ) -> Result<Checked, ParseError> {
        if let (Kind::Record(shape), CheckedExpr::Field(path)) = (&ty.kind, &inner) {
            let field = shape.field(name).ok_or_else(|| {
                ParseError::new(format!("unknown member '{}' on '{}'", name, shape.name()), span)
            })?;
            let mut field_ty = ExprType::of_field(&field.field_type);
            field_ty.nullable |= ty.nullable;
            return Ok(Checked::Value(
                CheckedExpr::Field(format!("{path}.{name}")),
                field_ty,
            ));
        }
        if ty.kind == Kind::String && name == "Length" {
            return Ok(Checked::Value(
                CheckedExpr::Length(Box::new(inner)),
                ExprType::new(Kind::Int, ty.nullable),
            ));
        }
        Err(ParseError::new(
            format!("type '{ty}' has no member '{name}'"),
            span,
        ))
    }

    fn check_call(
        &self,
        target: CheckedExpr,
        target_ty: ExprType,
        method: Method,
        args: &[ast::Expr],
        span: Span,
    ) -> Result<Checked, ParseError> {
        if args.len() != method.arity() {
            return Err(ParseError::new(
                format!(
                    "method '{}' takes {} argument(s), got {}",
                    method.name(),
                    method.arity(),
                    args.len()
                ),
                span,
            ));
        }

        let mut checked_args = Vec::with_capacity(args.len());
        let mut arg_types = Vec::with_capacity(args.len());
        for arg in args {
            let (checked, ty) = self.value(arg)?;
            checked_args.push(checked);
            arg_types.push(ty);
        }

        let string_receiver = || {
            if target_ty.kind == Kind::String {
                Ok(())
            } else {
                Err(ParseError::new(
                    format!(
                        "method '{}' is defined on strings, not '{}'",
                        method.name(),
                        target_ty
                    ),
                    span,
                ))
            }
        };

        let result_ty = match method {
            Method::Test(_) => {
                string_receiver()?;
                let arg_ty = &arg_types[0];
                if arg_ty.kind != Kind::String || arg_ty.nullable {
                    return Err(ParseError::new(
                        format!(
                            "method '{}' expects a string argument, got '{}'",
                            method.name(),
                            arg_ty
                        ),
                        args[0].span(),
                    ));
                }
                ExprType::new(Kind::Bool, false)
            }
            Method::Equals => {
                check_equality(&target_ty, &arg_types[0], span)?;
                ExprType::new(Kind::Bool, false)
            }
            Method::ToUpper | Method::ToLower | Method::Trim => {
                string_receiver()?;
                ExprType::new(Kind::String, target_ty.nullable)
            }
            Method::ToString => {
                if let Kind::Record(_) = target_ty.kind {
                    return Err(ParseError::new(
                        format!("method 'ToString' is not defined on '{target_ty}'"),
                        span,
                    ));
                }
                ExprType::new(Kind::String, target_ty.nullable)
            }
        };

        Ok(Checked::Value(
            CheckedExpr::Call {
                target: Box::new(target),
                method,
                args: checked_args,
            },
            result_ty,
        ))
    }

    fn check_binary(
        &self,
        op: BinaryOp,
        left: &ast::Expr,
        right: &ast::Expr,
    ) -> Result<Checked, ParseError> {
        let (l, l_ty) = self.value(left)?;
        let (r, r_ty) = self.value(right)?;
        let span = left.span().merge(right.span());
        let boolean = ExprType::new(Kind::Bool, false);

        let checked = match op {
            BinaryOp::And | BinaryOp::Or => {
                require_boolean(&l_ty, left.span(), op.symbol())?;
                require_boolean(&r_ty, right.span(), op.symbol())?;
                if op == BinaryOp::And {
                    CheckedExpr::And(Box::new(l), Box::new(r))
                } else {
                    CheckedExpr::Or(Box::new(l), Box::new(r))
                }
            }
            BinaryOp::Eq | BinaryOp::Ne => {
                check_equality(&l_ty, &r_ty, span)?;
                compare(op, l, r)
            }
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                let orderable = (l_ty.kind.is_numeric() && r_ty.kind.is_numeric())
                    || (l_ty.kind == Kind::String && r_ty.kind == Kind::String);
                if !orderable {
                    return Err(ParseError::new(
                        format!(
                            "operator '{}' is not defined for '{}' and '{}'",
                            op.symbol(),
                            l_ty,
                            r_ty
                        ),
                        span,
                    )
                    .with_hint("ordering compares two numbers or two strings"));
                }
                compare(op, l, r)
            }
        };

        Ok(Checked::Value(checked, boolean))
    }
}

fn compare(op: BinaryOp, left: CheckedExpr, right: CheckedExpr) -> CheckedExpr {
    let op = match op {
        BinaryOp::Eq => CompareOp::Eq,
        BinaryOp::Ne => CompareOp::Ne,
        BinaryOp::Lt => CompareOp::Lt,
        BinaryOp::Le => CompareOp::Le,
        BinaryOp::Gt => CompareOp::Gt,
        _ => CompareOp::Ge,
    };
    CheckedExpr::Compare {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn require_boolean(ty: &ExprType, span: Span, operator: &str) -> Result<(), ParseError> {
    if ty.is_boolean() {
        return Ok(());
    }
    Err(ParseError::new(
        format!("operator '{operator}' expects a non-nullable boolean, got '{ty}'"),
        span,
    ))
}

fn check_equality(left: &ExprType, right: &ExprType, span: Span) -> Result<(), ParseError> {
    let compatible = match (&left.kind, &right.kind) {
        (Kind::Null, _) => right.nullable,
        (_, Kind::Null) => left.nullable,
        (Kind::Record(_), _) | (_, Kind::Record(_)) => false,
        (l, r) => l == r || (l.is_numeric() && r.is_numeric()),
    };
    if compatible {
        return Ok(());
    }
    let error = ParseError::new(format!("cannot compare '{left}' with '{right}'"), span);
    Err(match (&left.kind, &right.kind) {
        (Kind::Null, _) => error.with_hint(format!("'{right}' is not nullable")),
        (_, Kind::Null) => error.with_hint(format!("'{left}' is not nullable")),
        _ => error,
    })
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Null => Value::Null,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Int(n) => Value::Int(*n),
        Literal::Float(n) => Value::Float(*n),
        Literal::String(s) => Value::String(s.clone()),
    }
}

/// Type-check a parsed expression as a predicate over `shape`.
pub fn check(
    expr: &ast::Expr,
    shape: &Shape,
    parameter: &str,
) -> Result<CheckedExpr, TranslationError> {
    let checker = Checker { shape, parameter };
    match checker.check(expr)? {
        Checked::Root(span) => Err(TranslationError::NotBoolean {
            found: shape.name().to_string(),
            span,
        }),
        Checked::Value(checked, ty) if ty.is_boolean() => Ok(checked),
        Checked::Value(_, ty) => Err(TranslationError::NotBoolean {
            found: ty.to_string(),
            span: expr.span(),
        }),
    }
}

/// A dynamic expression compiled for one shape and parameter name.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledPredicate {
    text: String,
    parameter: String,
    shape: Shape,
    expr: CheckedExpr,
}

impl CompiledPredicate {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn parameter(&self) -> &str {
        &self.parameter
    }

    /// Name of the shape this predicate was checked against.
    pub fn shape_name(&self) -> &str {
        self.shape.name()
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn expr(&self) -> &CheckedExpr {
        &self.expr
    }

    pub fn test(&self, entity: &dyn Entity) -> bool {
        self.expr.test(entity)
    }

    /// Whether this predicate was compiled for `shape` and `parameter`.
    ///
    /// Shapes are compared structurally; a same-named shape with different
    /// members is a different shape.
    pub fn is_bound_to(&self, shape: &Shape, parameter: &str) -> bool {
        self.parameter == parameter && &self.shape == shape
    }
}

/// Parse and check `text` as a predicate over `shape`.
pub fn compile_predicate(
    shape: &Shape,
    parameter: &str,
    text: &str,
) -> Result<CompiledPredicate, TranslationError> {
    let ast = parse(text)?;
    let expr = check(&ast, shape, parameter)?;
    Ok(CompiledPredicate {
        text: text.to_string(),
        parameter: parameter.to_string(),
        shape: shape.clone(),
        expr,
    })
}

/// Compiles dynamic expressions, consulting an optional cache.
///
/// The cache is keyed by expression text. A cached predicate compiled for a
/// structurally different shape or another parameter is ignored and
/// recompiled, so a cache never changes whether text compiles.
#[derive(Default, Clone, Copy)]
pub struct DynamicCompiler<'a> {
    cache: Option<&'a dyn PredicateCache>,
}

impl<'a> DynamicCompiler<'a> {
    pub fn new() -> Self {
        Self { cache: None }
    }

    pub fn with_cache(mut self, cache: &'a dyn PredicateCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn compile(
        &self,
        shape: &Shape,
        parameter: &str,
        text: &str,
    ) -> Result<Arc<CompiledPredicate>, TranslationError> {
        if let Some(cache) = self.cache {
            match cache.get(text) {
                Some(hit) if hit.is_bound_to(shape, parameter) => {
                    debug!(shape = shape.name(), text, "predicate cache hit");
                    return Ok(hit);
                }
                Some(_) => debug!(
                    shape = shape.name(),
                    text, "cached predicate belongs to another shape, recompiling"
                ),
                None => debug!(shape = shape.name(), text, "predicate cache miss"),
            }
        }

        let compiled = Arc::new(compile_predicate(shape, parameter, text)?);
        if let Some(cache) = self.cache {
            cache.set(text, Arc::clone(&compiled));
        }
        Ok(compiled)
    }
}

impl fmt::Debug for DynamicCompiler<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicCompiler")
            .field("cached", &self.cache.is_some())
            .finish()
    }
}
