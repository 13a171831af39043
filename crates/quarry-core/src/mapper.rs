//! Field mappers: resolve logical member names for name-based sorts and
//! native document paths.

use std::collections::HashMap;
use std::fmt;

use quarry_model::Accessor;

/// Resolves a member name to an accessor for in-memory sorting.
pub trait FieldMapper<T>: Send + Sync {
    /// `None` means the name is unknown.
    fn resolve(&self, name: &str) -> Option<Accessor<T>>;
}

impl<T, F> FieldMapper<T> for F
where
    F: Fn(&str) -> Option<Accessor<T>> + Send + Sync,
{
    fn resolve(&self, name: &str) -> Option<Accessor<T>> {
        self(name)
    }
}

/// Resolves a logical member path to the native document path.
pub trait DocumentFieldMapper: Send + Sync {
    /// `None` means the member has no native counterpart.
    fn native_path(&self, name: &str) -> Option<String>;
}

impl<F> DocumentFieldMapper for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn native_path(&self, name: &str) -> Option<String> {
        self(name)
    }
}

/// A fixed table of name to accessor.
pub struct FieldMap<T> {
    accessors: HashMap<String, Accessor<T>>,
}

impl<T> FieldMap<T> {
    pub fn new() -> Self {
        Self {
            accessors: HashMap::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, accessor: impl Into<Accessor<T>>) -> Self {
        self.accessors.insert(name.into(), accessor.into());
        self
    }
}

impl<T> Default for FieldMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FieldMapper<T> for FieldMap<T> {
    fn resolve(&self, name: &str) -> Option<Accessor<T>> {
        self.accessors.get(name).cloned()
    }
}

impl<T> fmt::Debug for FieldMap<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.accessors.keys().collect();
        names.sort();
        f.debug_struct("FieldMap").field("names", &names).finish()
    }
}

/// A fixed table of logical path to native path. Unlisted paths are unmapped.
#[derive(Debug, Clone, Default)]
pub struct NativeFieldMap {
    paths: HashMap<String, String>,
}

impl NativeFieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, logical: impl Into<String>, native: impl Into<String>) -> Self {
        self.paths.insert(logical.into(), native.into());
        self
    }
}

impl DocumentFieldMapper for NativeFieldMap {
    fn native_path(&self, name: &str) -> Option<String> {
        self.paths.get(name).cloned()
    }
}
