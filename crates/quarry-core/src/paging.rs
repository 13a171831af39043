//! Page execution: total count plus one window of filtered, sorted items.

use quarry_model::{Entity, FilterNode, PageRequest, PageResult, Query};
use tracing::{debug, instrument};

use crate::error::Result;
use crate::translate::ExpressionTranslator;

/// A backend that can count matches and return a window of a query.
pub trait PageSource<T> {
    /// Number of entities matching `filter`, ignoring any window.
    fn count(&self, filter: &FilterNode<T>) -> Result<u64>;

    /// Filter, sort, skip `offset` and take at most `limit`.
    fn fetch(&self, query: &Query<T>, offset: u64, limit: u32) -> Result<Vec<T>>;

    /// Total matches and the items of one page.
    ///
    /// Counts first and only fetches when the page starts before the end.
    /// Sources that can do both in one pass may override this.
    fn fetch_page(&self, request: &PageRequest<T>) -> Result<(u64, Vec<T>)> {
        let total = self.count(request.query().filter())?;
        if request.offset() >= total {
            return Ok((total, Vec::new()));
        }
        let items = self.fetch(request.query(), request.offset(), request.size())?;
        Ok((total, items))
    }
}

/// A page source over a borrowed slice.
pub struct InMemorySource<'a, T> {
    items: &'a [T],
    translator: ExpressionTranslator<'a, T>,
}

impl<'a, T: Entity + 'static> InMemorySource<'a, T> {
    pub fn new(items: &'a [T], translator: ExpressionTranslator<'a, T>) -> Self {
        Self { items, translator }
    }

    pub fn translator(&self) -> &ExpressionTranslator<'a, T> {
        &self.translator
    }
}

fn window<T: Clone>(matched: &[&T], offset: u64, limit: u32) -> Vec<T> {
    let offset = usize::try_from(offset).unwrap_or(usize::MAX);
    matched
        .iter()
        .skip(offset)
        .take(limit as usize)
        .map(|item| (*item).clone())
        .collect()
}

impl<T: Entity + Clone + 'static> PageSource<T> for InMemorySource<'_, T> {
    fn count(&self, filter: &FilterNode<T>) -> Result<u64> {
        let predicate = self.translator.predicate(filter)?;
        Ok(self.items.iter().filter(|item| predicate.test(item)).count() as u64)
    }

    fn fetch(&self, query: &Query<T>, offset: u64, limit: u32) -> Result<Vec<T>> {
        let matched = self.translator.apply_refs(query, self.items)?;
        Ok(window(&matched, offset, limit))
    }

    fn fetch_page(&self, request: &PageRequest<T>) -> Result<(u64, Vec<T>)> {
        let matched = self.translator.apply_refs(request.query(), self.items)?;
        let total = matched.len() as u64;
        Ok((total, window(&matched, request.offset(), request.size())))
    }
}

/// Runs page requests against a [`PageSource`].
pub struct PaginationExecutor<'a, S: ?Sized> {
    source: &'a S,
}

impl<'a, S: ?Sized> PaginationExecutor<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    /// Execute `request`. Pages past the end come back empty with the full
    /// match count.
    #[instrument(skip_all, fields(page = request.page(), size = request.size()))]
    pub fn execute<T>(&self, request: &PageRequest<T>) -> Result<PageResult<T>>
    where
        S: PageSource<T>,
    {
        let (total, mut items) = self.source.fetch_page(request)?;
        items.truncate(request.size() as usize);

        let result = PageResult::new(request.clone(), total, items);
        debug!(
            total_items = result.total_items(),
            total_pages = result.total_pages(),
            returned = result.items().len(),
            "executed page request"
        );
        Ok(result)
    }
}
