//! Quarry dynamic expression language
//!
//! This crate parses predicate expressions written as text, checks them
//! against an entity [`Shape`](quarry_model::Shape), and compiles them into
//! predicates that evaluate over any [`Entity`](quarry_model::Entity).
//!
//! # Syntax
//!
//! ```text
//! x.FirstName == "John" && x.LastName == "Doe"
//! x.Age >= 18 || x.Address.City == 'Paris'
//! !x.Active && x.Nickname != null
//! x.Email.EndsWith("@example.com") && x.Email.Length < 40
//! LastName.ToUpper() == "DOE"
//! ```
//!
//! Identifiers other than the parameter name are implicit members of the
//! parameter, so `LastName` reads the same member as `x.LastName`.
//!
//! # Usage
//!
//! ```rust
//! use quarry_lang::compile;
//! use quarry_model::{FieldDef, Record, ScalarType, Shape};
//!
//! let shape = Shape::new("Person")
//!     .with_field(FieldDef::scalar("FirstName", ScalarType::String));
//! let predicate = compile(&shape, "x", r#"x.FirstName == "John""#).unwrap();
//!
//! assert!(predicate.test(&Record::new().with("FirstName", "John")));
//! ```

pub mod ast;
pub mod cache;
pub mod compiler;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod span;

// Re-export main types
pub use ast::{BinaryOp, Literal};
pub use cache::{CacheStats, MemoryPredicateCache, PredicateCache};
pub use compiler::{CheckedExpr, CompiledPredicate, DynamicCompiler, ExprType, Kind, Method};
pub use error::{ParseError, TranslationError};
pub use span::{Span, Spanned};

use quarry_model::Shape;

/// Parse an expression into an AST without checking it.
///
/// # Example
///
/// ```rust
/// use quarry_lang::parse;
///
/// let expr = parse("x.Age > 18").unwrap();
/// assert_eq!(expr.span().end, 10);
/// ```
pub fn parse(source: &str) -> Result<ast::Expr, ParseError> {
    parser::parse(source)
}

/// Parse and check `source` as a predicate over `shape`, with `parameter`
/// naming the entity.
pub fn compile(
    shape: &Shape,
    parameter: &str,
    source: &str,
) -> Result<CompiledPredicate, TranslationError> {
    compiler::compile_predicate(shape, parameter, source)
}

/// Tokenize a source string (for debugging/testing).
pub fn tokenize(source: &str) -> Result<Vec<lexer::SpannedToken>, ParseError> {
    lexer::tokenize(source)
}
