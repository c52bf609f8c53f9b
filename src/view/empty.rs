//! Always-empty view for partitions that do not exist

use std::fmt;
use std::marker::PhantomData;
use std::ops::ControlFlow;

use super::named::NamedCacheView;
use super::{CacheValue, CacheView, Entries};

/// A view with no entities. Stands in for guild partitions that were never
/// written or have been deleted.
pub struct EmptyCacheView<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> EmptyCacheView<T> {
    pub const fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for EmptyCacheView<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for EmptyCacheView<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> Copy for EmptyCacheView<T> {}

impl<T> fmt::Debug for EmptyCacheView<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EmptyCacheView")
    }
}

impl<T: CacheValue> CacheView<T> for EmptyCacheView<T> {
    fn len(&self) -> usize {
        0
    }

    fn is_empty(&self) -> bool {
        true
    }

    fn get(&self, _id: u64) -> Option<T> {
        None
    }

    fn visit(&self, _f: &mut dyn FnMut(u64, &T) -> ControlFlow<()>) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn for_each_source(
        &self,
        _f: &mut dyn FnMut(&dyn CacheView<T>) -> ControlFlow<()>,
    ) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn entries(&self) -> Entries<T> {
        Box::new(std::iter::empty())
    }
}

impl<T: CacheValue> NamedCacheView<T> for EmptyCacheView<T> {
    fn name_of(&self, _value: &T) -> Option<String> {
        None
    }
}

// =============================================================================
// Tests
// =============================================================================
