//! Translators from the query model to executable or native forms.
//!
//! - [`ExpressionTranslator`] turns filters and sorts into in-memory
//!   predicates and comparators.
//! - [`DocumentTranslator`] lowers them into MongoDB-style JSON documents.

mod document;
mod expression;

pub use document::{native_document, Document, DocumentQuery, DocumentTranslator, DOCUMENT_BACKEND};
pub use expression::ExpressionTranslator;
