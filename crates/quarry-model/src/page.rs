//! Page requests and page results.

use std::fmt;

use crate::error::ConstructionError;
use crate::field::FieldRef;
use crate::filter::FilterNode;
use crate::query::Query;

/// One page of a query. Pages are 1-based.
pub struct PageRequest<T> {
    query: Query<T>,
    page: u32,
    size: u32,
}

impl<T> PageRequest<T> {
    /// Page `page` of every entity.
    pub fn new(page: u32, size: u32) -> Result<Self, ConstructionError> {
        Self::for_query(Query::all(), page, size)
    }

    /// Page `page` of `query`. Both `page` and `size` must be at least 1.
    pub fn for_query(query: Query<T>, page: u32, size: u32) -> Result<Self, ConstructionError> {
        if page < 1 {
            return Err(ConstructionError::new(format!(
                "page number must be at least 1, got {page}"
            )));
        }
        if size < 1 {
            return Err(ConstructionError::new(format!(
                "page size must be at least 1, got {size}"
            )));
        }
        Ok(Self { query, page, size })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn query(&self) -> &Query<T> {
        &self.query
    }

    /// Entities to skip before this page starts.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.size)
    }

    /// Number of items this page holds when `total_items` match.
    pub fn expected_len(&self, total_items: u64) -> usize {
        let remaining = total_items.saturating_sub(self.offset());
        remaining.min(u64::from(self.size)) as usize
    }

    fn map_query(self, f: impl FnOnce(Query<T>) -> Query<T>) -> Self {
        Self {
            query: f(self.query),
            page: self.page,
            size: self.size,
        }
    }

    fn try_map_query(
        self,
        f: impl FnOnce(Query<T>) -> Result<Query<T>, ConstructionError>,
    ) -> Result<Self, ConstructionError> {
        Ok(Self {
            query: f(self.query)?,
            page: self.page,
            size: self.size,
        })
    }

    /// Replace the filter.
    pub fn filter_by(self, filter: impl Into<FilterNode<T>>) -> Self {
        self.map_query(|q| match q.sort() {
            Some(sort) => Query::filter_by(filter).sorted_by(sort.clone()),
            None => Query::filter_by(filter),
        })
    }

    pub fn and(self, filter: impl Into<FilterNode<T>>) -> Self {
        self.map_query(|q| q.and(filter))
    }

    pub fn order_by(self, field: impl Into<FieldRef<T>>) -> Self {
        self.map_query(|q| q.order_by(field))
    }

    pub fn order_by_descending(self, field: impl Into<FieldRef<T>>) -> Self {
        self.map_query(|q| q.order_by_descending(field))
    }

    pub fn order_by_name(self, name: impl Into<String>) -> Result<Self, ConstructionError> {
        self.try_map_query(|q| q.order_by_name(name))
    }

    pub fn order_by_name_descending(
        self,
        name: impl Into<String>,
    ) -> Result<Self, ConstructionError> {
        self.try_map_query(|q| q.order_by_name_descending(name))
    }
}

impl<T> Clone for PageRequest<T> {
    fn clone(&self) -> Self {
        Self {
            query: self.query.clone(),
            page: self.page,
            size: self.size,
        }
    }
}

impl<T> fmt::Debug for PageRequest<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageRequest")
            .field("page", &self.page)
            .field("size", &self.size)
            .field("query", &self.query)
            .finish()
    }
}

/// One page of results plus the total number of matches.
///
/// `T` is the entity type of the request; `I` is the item type, which
/// differs from `T` after [`PageResult::map`].
pub struct PageResult<T, I = T> {
    request: PageRequest<T>,
    total_items: u64,
    items: Vec<I>,
}

impl<T, I> PageResult<T, I> {
    pub fn new(request: PageRequest<T>, total_items: u64, items: Vec<I>) -> Self {
        Self {
            request,
            total_items,
            items,
        }
    }

    pub fn request(&self) -> &PageRequest<T> {
        &self.request
    }

    pub fn page(&self) -> u32 {
        self.request.page()
    }

    pub fn size(&self) -> u32 {
        self.request.size()
    }

    /// Matching entities across all pages.
    pub fn total_items(&self) -> u64 {
        self.total_items
    }

    pub fn items(&self) -> &[I] {
        &self.items
    }

    pub fn into_items(self) -> Vec<I> {
        self.items
    }

    /// `ceil(total_items / size)`; zero when nothing matched.
    pub fn total_pages(&self) -> u64 {
        self.total_items.div_ceil(u64::from(self.request.size()))
    }

    pub fn has_next_page(&self) -> bool {
        u64::from(self.request.page()) < self.total_pages()
    }

    pub fn has_previous_page(&self) -> bool {
        self.request.page() > 1
    }

    /// No items on this page.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Transform the items, keeping the request and total.
    pub fn map<U>(self, f: impl FnMut(I) -> U) -> PageResult<T, U> {
        PageResult {
            request: self.request,
            total_items: self.total_items,
            items: self.items.into_iter().map(f).collect(),
        }
    }
}

impl<T, I: fmt::Debug> fmt::Debug for PageResult<T, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageResult")
            .field("page", &self.request.page())
            .field("size", &self.request.size())
            .field("total_items", &self.total_items)
            .field("items", &self.items)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_rejects_zero_page_or_size() {
        assert!(PageRequest::<()>::new(0, 10).is_err());
        assert!(PageRequest::<()>::new(1, 0).is_err());
        let request = PageRequest::<()>::new(3, 25).unwrap();
        assert_eq!(request.offset(), 50);
    }

    #[test]
    fn test_empty_result() {
        let request = PageRequest::<()>::new(1, 10).unwrap();
        let result: PageResult<()> = PageResult::new(request, 0, Vec::new());
        assert_eq!(result.total_pages(), 0);
        assert!(!result.has_next_page());
        assert!(!result.has_previous_page());
        assert!(result.is_empty());
    }

    #[test]
    fn test_navigation() {
        let request = PageRequest::<()>::new(2, 10).unwrap();
        let result = PageResult::new(request, 25, vec![(); 10]);
        assert_eq!(result.total_pages(), 3);
        assert!(result.has_next_page());
        assert!(result.has_previous_page());

        let mapped = result.map(|_| 1u8);
        assert_eq!(mapped.items().len(), 10);
        assert_eq!(mapped.total_items(), 25);
    }

    proptest! {
        #[test]
        fn prop_page_arithmetic(page in 1u32..500, size in 1u32..200, total in 0u64..50_000) {
            let request = PageRequest::<()>::new(page, size).unwrap();
            let expected = request.expected_len(total);
            let result: PageResult<()> = PageResult::new(request, total, vec![(); expected]);

            let pages = result.total_pages();
            prop_assert_eq!(pages, (total + u64::from(size) - 1) / u64::from(size));
            prop_assert!(expected <= size as usize);
            prop_assert_eq!(result.has_next_page(), u64::from(page) < pages);
            prop_assert_eq!(result.has_previous_page(), page > 1);
            if u64::from(page) > pages {
                prop_assert!(result.is_empty());
            }
        }
    }
}
