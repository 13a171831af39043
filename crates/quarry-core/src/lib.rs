//! Quarry Core - query translators and pagination.
//!
//! This crate turns the backend-agnostic query model into something a
//! backend can run: in-memory predicates and comparators, MongoDB-style
//! filter documents, and paged results.
//!
//! # Usage
//!
//! ```rust
//! use quarry_core::{ExpressionTranslator, InMemorySource, PaginationExecutor, QueryConfig};
//! use quarry_core::model::{PageRequest, Record, Shape, Value};
//!
//! let people = vec![
//!     Record::new().with("FirstName", "John").with("LastName", "Doe"),
//!     Record::new().with("FirstName", "Jane").with("LastName", "Doe"),
//! ];
//! let translator = ExpressionTranslator::<Record>::new(QueryConfig::default())
//!     .with_shape(Shape::infer("Person", &people));
//!
//! let filter = translator.parse_filter(r#"x.LastName == "Doe""#).unwrap();
//! let request = PageRequest::new(1, 10)
//!     .unwrap()
//!     .filter_by(filter)
//!     .order_by_name("FirstName")
//!     .unwrap();
//!
//! let source = InMemorySource::new(&people, translator);
//! let page = PaginationExecutor::new(&source).execute(&request).unwrap();
//! assert_eq!(page.total_items(), 2);
//! assert_eq!(page.items()[0].get("FirstName"), Some(&Value::from("Jane")));
//! ```

pub mod config;
pub mod error;
pub mod mapper;
pub mod paging;
pub mod translate;

pub use config::{NameResolution, QueryConfig, DEFAULT_PARAMETER};
pub use error::{Error, Result};
pub use mapper::{DocumentFieldMapper, FieldMap, FieldMapper, NativeFieldMap};
pub use paging::{InMemorySource, PageSource, PaginationExecutor};
pub use translate::{
    native_document, Document, DocumentQuery, DocumentTranslator, ExpressionTranslator,
    DOCUMENT_BACKEND,
};

/// Re-export the query model.
pub use quarry_model as model;

/// Re-export the dynamic expression language.
pub use quarry_lang as lang;
