//! Core error types.

use quarry_lang::{ParseError, TranslationError};
use quarry_model::{ConstructionError, NotSupportedError, ShapeMismatchError};
use thiserror::Error;

/// Errors raised while building or translating queries.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A node or request was built from an invalid argument.
    #[error("construction error: {0}")]
    Construction(#[from] ConstructionError),

    /// Dynamic text failed to compile, or an expression did not fit a shape.
    #[error("translation error: {0}")]
    Translation(#[from] TranslationError),

    /// The translator cannot express the node it was given.
    #[error("not supported: {0}")]
    NotSupported(#[from] NotSupportedError),
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Error::Translation(TranslationError::Parse(err))
    }
}

impl From<ShapeMismatchError> for Error {
    fn from(err: ShapeMismatchError) -> Self {
        Error::Translation(TranslationError::ShapeMismatch(err))
    }
}

/// Result alias for core operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
