//! Executable predicates and comparators produced by in-memory translation.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// A boolean test over `T`.
pub struct Predicate<T> {
    test: Arc<dyn Fn(&T) -> bool + Send + Sync>,
}

impl<T: 'static> Predicate<T> {
    pub fn new(test: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        Self {
            test: Arc::new(test),
        }
    }

    /// Accepts everything.
    pub fn always() -> Self {
        Self::new(|_| true)
    }

    /// Conjunction, tested left to right; stops at the first rejection.
    pub fn all(predicates: Vec<Predicate<T>>) -> Self {
        Self::new(move |entity| predicates.iter().all(|p| p.test(entity)))
    }
}

impl<T> Predicate<T> {
    pub fn test(&self, entity: &T) -> bool {
        (self.test)(entity)
    }
}

impl<T> Clone for Predicate<T> {
    fn clone(&self) -> Self {
        Self {
            test: Arc::clone(&self.test),
        }
    }
}

impl<T> fmt::Debug for Predicate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Predicate")
    }
}

/// A total ordering over `T`.
pub struct Comparator<T> {
    compare: Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>,
}

impl<T: 'static> Comparator<T> {
    pub fn new(compare: impl Fn(&T, &T) -> Ordering + Send + Sync + 'static) -> Self {
        Self {
            compare: Arc::new(compare),
        }
    }

    /// Reverse this ordering.
    pub fn reversed(self) -> Self {
        Self::new(move |a, b| self.compare(b, a))
    }

    /// Break ties with `next`.
    pub fn then(self, next: Comparator<T>) -> Self {
        Self::new(move |a, b| self.compare(a, b).then_with(|| next.compare(a, b)))
    }

    /// Lexicographic ordering over `keys`; an empty chain orders everything equal.
    pub fn chain(keys: Vec<Comparator<T>>) -> Self {
        Self::new(move |a, b| {
            keys.iter()
                .map(|key| key.compare(a, b))
                .find(|ordering| ordering.is_ne())
                .unwrap_or(Ordering::Equal)
        })
    }
}

impl<T> Comparator<T> {
    pub fn compare(&self, a: &T, b: &T) -> Ordering {
        (self.compare)(a, b)
    }

    /// Stable in-place sort.
    pub fn sort(&self, items: &mut [T]) {
        items.sort_by(|a, b| self.compare(a, b));
    }
}

impl<T> Clone for Comparator<T> {
    fn clone(&self) -> Self {
        Self {
            compare: Arc::clone(&self.compare),
        }
    }
}

impl<T> fmt::Debug for Comparator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Comparator")
    }
}
