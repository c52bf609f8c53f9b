//! Lock-guarded single-table storage
//!
//! One [`LongEntityMap`] behind one `RwLock`. Reads hold the read lock for
//! the whole traversal, writes take the write lock, so a traversal never
//! observes a table mid-resize or mid-shift.

use parking_lot::RwLock;
use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

use super::named::{NameFn, NamedCacheView};
use super::table::LongEntityMap;
use super::{CacheValue, CacheView, Entries, MutableCacheView};

/// Mutable storage for one partition.
///
/// Cloning yields another handle to the same partition.
pub struct DefaultCacheView<T> {
    map: Arc<RwLock<LongEntityMap<T>>>,
}

impl<T> Clone for DefaultCacheView<T> {
    fn clone(&self) -> Self {
        Self {
            map: Arc::clone(&self.map),
        }
    }
}

impl<T> Default for DefaultCacheView<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for DefaultCacheView<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultCacheView")
            .field("len", &self.map.read().len())
            .finish()
    }
}

impl<T> DefaultCacheView<T> {
    /// Create an empty partition
    pub fn new() -> Self {
        Self::from_map(LongEntityMap::new())
    }

    /// Create an empty partition sized for `expected` entries
    pub fn with_capacity(expected: usize) -> Self {
        Self::from_map(LongEntityMap::with_capacity(expected))
    }

    fn from_map(map: LongEntityMap<T>) -> Self {
        Self {
            map: Arc::new(RwLock::new(map)),
        }
    }

    /// Insert many entries under one write lock
    pub fn put_all<I>(&self, entries: I) -> usize
    where
        I: IntoIterator<Item = (u64, T)>,
    {
        let mut map = self.map.write();
        let mut inserted = 0;
        for (id, value) in entries {
            map.put(id, value);
            inserted += 1;
        }
        inserted
    }

    /// Whether two handles refer to the same partition
    pub fn same_partition(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.map, &other.map)
    }
}

impl<T: CacheValue> CacheView<T> for DefaultCacheView<T> {
    fn len(&self) -> usize {
        self.map.read().len()
    }

    fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }

    fn get(&self, id: u64) -> Option<T> {
        self.map.read().get(id).cloned()
    }

    fn visit(&self, f: &mut dyn FnMut(u64, &T) -> ControlFlow<()>) -> ControlFlow<()> {
        let map = self.map.read();
        for (id, value) in map.iter() {
            f(id, value)?;
        }
        ControlFlow::Continue(())
    }

    fn for_each_source(
        &self,
        f: &mut dyn FnMut(&dyn CacheView<T>) -> ControlFlow<()>,
    ) -> ControlFlow<()> {
        f(self)
    }

    fn entries(&self) -> Entries<T> {
        let guard = self.map.read_arc();
        let mut index = guard.capacity();
        Box::new(std::iter::from_fn(move || {
            while index > 0 {
                index -= 1;
                if let Some((id, value)) = guard.slot(index) {
                    return Some((id, value.clone()));
                }
            }
            None
        }))
    }
}

impl<T: CacheValue> MutableCacheView<T> for DefaultCacheView<T> {
    fn put(&self, id: u64, value: T) -> Option<T> {
        self.map.write().put(id, value)
    }

    fn remove(&self, id: u64) -> Option<T> {
        self.map.write().remove(id)
    }

    fn remove_if(&self, filter: &mut dyn FnMut(u64) -> bool) -> bool {
        self.map.write().remove_if(filter)
    }

    fn clear(&self) {
        self.map.write().clear();
    }
}

/// [`DefaultCacheView`] that can also resolve entity names
pub struct DefaultNamedCacheView<T> {
    inner: DefaultCacheView<T>,
    name_fn: NameFn<T>,
}

impl<T> Clone for DefaultNamedCacheView<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            name_fn: Arc::clone(&self.name_fn),
        }
    }
}

impl<T> fmt::Debug for DefaultNamedCacheView<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DefaultNamedCacheView").field(&self.inner).finish()
    }
}

impl<T> DefaultNamedCacheView<T> {
    /// Create an empty named partition
    pub fn new(name_fn: NameFn<T>) -> Self {
        Self {
            inner: DefaultCacheView::new(),
            name_fn,
        }
    }

    /// The plain storage underneath
    pub fn storage(&self) -> &DefaultCacheView<T> {
        &self.inner
    }

    /// Insert many entries under one write lock
    pub fn put_all<I>(&self, entries: I) -> usize
    where
        I: IntoIterator<Item = (u64, T)>,
    {
        self.inner.put_all(entries)
    }
}

impl<T: CacheValue> CacheView<T> for DefaultNamedCacheView<T> {
    fn len(&self) -> usize {
        self.inner.len()
    }

    fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn get(&self, id: u64) -> Option<T> {
        self.inner.get(id)
    }

    fn visit(&self, f: &mut dyn FnMut(u64, &T) -> ControlFlow<()>) -> ControlFlow<()> {
        self.inner.visit(f)
    }

    fn for_each_source(
        &self,
        f: &mut dyn FnMut(&dyn CacheView<T>) -> ControlFlow<()>,
    ) -> ControlFlow<()> {
        f(self)
    }

    fn entries(&self) -> Entries<T> {
        self.inner.entries()
    }
}

impl<T: CacheValue> NamedCacheView<T> for DefaultNamedCacheView<T> {
    fn name_of(&self, value: &T) -> Option<String> {
        (self.name_fn)(value)
    }
}

impl<T: CacheValue> MutableCacheView<T> for DefaultNamedCacheView<T> {
    fn put(&self, id: u64, value: T) -> Option<T> {
        self.inner.put(id, value)
    }

    fn remove(&self, id: u64) -> Option<T> {
        self.inner.remove(id)
    }

    fn remove_if(&self, filter: &mut dyn FnMut(u64) -> bool) -> bool {
        self.inner.remove_if(filter)
    }

    fn clear(&self) {
        self.inner.clear()
    }
}

// =============================================================================
// Tests
// =============================================================================
