//! Query: an immutable pairing of a filter and an optional sort.

use std::fmt;

use crate::error::ConstructionError;
use crate::field::{FieldName, FieldRef};
use crate::filter::FilterNode;
use crate::page::PageRequest;
use crate::sort::SortNode;

/// A filter plus an optional sort over `T`.
///
/// Builder methods consume the query and return a new one; clone first to
/// keep the original.
pub struct Query<T> {
    filter: FilterNode<T>,
    sort: Option<SortNode<T>>,
}

impl<T> Query<T> {
    /// Every entity, unsorted.
    pub fn all() -> Self {
        Self {
            filter: FilterNode::Empty,
            sort: None,
        }
    }

    /// A query with `filter` and no sort.
    pub fn filter_by(filter: impl Into<FilterNode<T>>) -> Self {
        Self {
            filter: filter.into(),
            sort: None,
        }
    }

    /// Narrow with another filter.
    ///
    /// An `Empty` current filter is replaced rather than combined.
    pub fn and(self, filter: impl Into<FilterNode<T>>) -> Self {
        let filter = filter.into();
        let filter = match self.filter {
            FilterNode::Empty => filter,
            current => current.combine(filter),
        };
        Self {
            filter,
            sort: self.sort,
        }
    }

    /// Append an ascending key.
    pub fn order_by(self, field: impl Into<FieldRef<T>>) -> Self {
        self.sorted_by(SortNode::ascending(field))
    }

    /// Append a descending key.
    pub fn order_by_descending(self, field: impl Into<FieldRef<T>>) -> Self {
        self.sorted_by(SortNode::descending(field))
    }

    /// Append an ascending key by member name.
    pub fn order_by_name(self, name: impl Into<String>) -> Result<Self, ConstructionError> {
        Ok(self.order_by(FieldName::new(name)?))
    }

    /// Append a descending key by member name.
    pub fn order_by_name_descending(
        self,
        name: impl Into<String>,
    ) -> Result<Self, ConstructionError> {
        Ok(self.order_by_descending(FieldName::new(name)?))
    }

    /// Append `sort`; existing keys keep priority.
    pub fn sorted_by(self, sort: SortNode<T>) -> Self {
        let sort = match self.sort {
            Some(current) => current.combine(sort),
            None => sort,
        };
        Self {
            filter: self.filter,
            sort: Some(sort),
        }
    }

    pub fn filter(&self) -> &FilterNode<T> {
        &self.filter
    }

    pub fn sort(&self) -> Option<&SortNode<T>> {
        self.sort.as_ref()
    }

    /// Request one page of this query.
    pub fn page(self, page: u32, size: u32) -> Result<PageRequest<T>, ConstructionError> {
        PageRequest::for_query(self, page, size)
    }
}

impl<T> Default for Query<T> {
    fn default() -> Self {
        Self::all()
    }
}

impl<T> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            filter: self.filter.clone(),
            sort: self.sort.clone(),
        }
    }
}

impl<T> fmt::Debug for Query<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("filter", &self.filter)
            .field("sort", &self.sort)
            .finish()
    }
}
