//! Quarry query model.
//!
//! This crate defines the backend-agnostic description of a query: which
//! entities match ([`FilterNode`]), in what order ([`SortNode`]), and which
//! slice of them to return ([`PageRequest`]). Nothing here talks to a
//! backend; translators in `quarry-core` turn these nodes into in-memory
//! predicates or native document filters.
//!
//! # Modules
//!
//! - [`value`] - Runtime values read from entities
//! - [`record`] - Schemaless records usable as entities
//! - [`shape`] - Member layouts that dynamic expressions are checked against
//! - [`entity`] - The `Entity` trait for reading members by name
//! - [`field`] - Typed fields, type-erased accessors and field names
//! - [`expr`] - Inspectable boolean expressions
//! - [`filter`] - Filter nodes
//! - [`sort`] - Sort nodes
//! - [`query`] - Filter plus sort
//! - [`page`] - Page requests and results
//! - [`predicate`] - Executable predicates and comparators
//! - [`error`] - Construction and translation errors
//!
//! # Example
//!
//! ```
//! use quarry_model::{Field, Query};
//!
//! struct Person { first_name: String, last_name: String }
//!
//! impl Person {
//!     const FIRST_NAME: Field<Person, String> = Field::new("FirstName", |p| p.first_name.clone());
//!     const LAST_NAME: Field<Person, String> = Field::new("LastName", |p| p.last_name.clone());
//! }
//!
//! let page = Query::filter_by(Person::FIRST_NAME.eq("John"))
//!     .order_by(Person::LAST_NAME)
//!     .page(1, 20)
//!     .unwrap();
//! assert_eq!(page.offset(), 0);
//! ```

pub mod entity;
pub mod error;
pub mod expr;
pub mod field;
pub mod filter;
pub mod page;
pub mod predicate;
pub mod query;
pub mod record;
pub mod shape;
pub mod sort;
pub mod value;

pub use entity::{Entity, FieldValue};
pub use error::{ConstructionError, NotSupportedError, ShapeMismatchError};
pub use expr::{CompareOp, Expr, StringMethod};
pub use field::{Accessor, Field, FieldName, FieldRef};
pub use filter::{FilterList, FilterNode, NativeFilter};
pub use page::{PageRequest, PageResult};
pub use predicate::{Comparator, Predicate};
pub use query::Query;
pub use record::Record;
pub use shape::{FieldDef, FieldType, ScalarType, Shape};
pub use sort::{SortKey, SortKeys, SortNode, SortTarget};
pub use value::Value;
