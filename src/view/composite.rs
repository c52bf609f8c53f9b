//! Composite views
//!
//! A read-only merge of N views of one entity type. Nothing is copied: point
//! lookups probe sources in order, aggregates run per source, and iteration
//! walks one source at a time.

use std::collections::VecDeque;
use std::fmt;
use std::marker::PhantomData;
use std::ops::ControlFlow;
use std::sync::Arc;

use super::named::{NameFn, NamedCacheView};
use super::{CacheValue, CacheView, Entries};

/// Supplier of the views a composite merges.
///
/// Implementations must hand sources out in a stable order. A supplier backed
/// by a live partition map reflects partitions created or dropped after the
/// composite was built.
pub trait ViewSources<S: ?Sized>: Send + Sync {
    /// Hand each source to `f` until it breaks
    fn with_sources(&self, f: &mut dyn FnMut(&S) -> ControlFlow<()>) -> ControlFlow<()>;

    /// Shared handles to the current sources, in order
    fn source_handles(&self) -> Vec<Arc<S>>;
}

impl<S: ?Sized + Send + Sync> ViewSources<S> for Vec<Arc<S>> {
    fn with_sources(&self, f: &mut dyn FnMut(&S) -> ControlFlow<()>) -> ControlFlow<()> {
        for source in self {
            f(source)?;
        }
        ControlFlow::Continue(())
    }

    fn source_handles(&self) -> Vec<Arc<S>> {
        self.clone()
    }
}

impl<S: ?Sized, V: ViewSources<S> + ?Sized> ViewSources<S> for Arc<V> {
    fn with_sources(&self, f: &mut dyn FnMut(&S) -> ControlFlow<()>) -> ControlFlow<()> {
        (**self).with_sources(f)
    }

    fn source_handles(&self) -> Vec<Arc<S>> {
        (**self).source_handles()
    }
}

/// Read-only merge of several views
pub struct CompositeCacheView<T, S: ?Sized> {
    sources: Arc<dyn ViewSources<S>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T, S: ?Sized> Clone for CompositeCacheView<T, S> {
    fn clone(&self) -> Self {
        Self {
            sources: Arc::clone(&self.sources),
            _marker: PhantomData,
        }
    }
}

impl<T, S: ?Sized> fmt::Debug for CompositeCacheView<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CompositeCacheView")
    }
}

impl<T, S> CompositeCacheView<T, S>
where
    T: CacheValue,
    S: CacheView<T> + ?Sized + 'static,
{
    /// Merge whatever `sources` supplies
    pub fn new(sources: impl ViewSources<S> + 'static) -> Self {
        Self {
            sources: Arc::new(sources),
            _marker: PhantomData,
        }
    }

    /// Merge a fixed list of views
    pub fn from_views(views: Vec<Arc<S>>) -> Self {
        Self::new(views)
    }

    /// Number of sources currently merged
    pub fn source_count(&self) -> usize {
        let mut count = 0;
        let _ = self.sources.with_sources(&mut |_| {
            count += 1;
            ControlFlow::Continue(())
        });
        count
    }
}

impl<T, S> CacheView<T> for CompositeCacheView<T, S>
where
    T: CacheValue,
    S: CacheView<T> + ?Sized + 'static,
{
    fn len(&self) -> usize {
        let mut total = 0;
        let _ = self.sources.with_sources(&mut |source| {
            total += source.len();
            ControlFlow::Continue(())
        });
        total
    }

    fn is_empty(&self) -> bool {
        self.sources
            .with_sources(&mut |source| {
                if source.is_empty() {
                    ControlFlow::Continue(())
                } else {
                    ControlFlow::Break(())
                }
            })
            .is_continue()
    }

    fn get(&self, id: u64) -> Option<T> {
        let mut found = None;
        let _ = self.sources.with_sources(&mut |source| match source.get(id) {
            Some(value) => {
                found = Some(value);
                ControlFlow::Break(())
            }
            None => ControlFlow::Continue(()),
        });
        found
    }

    fn visit(&self, f: &mut dyn FnMut(u64, &T) -> ControlFlow<()>) -> ControlFlow<()> {
        self.sources.with_sources(&mut |source| source.visit(&mut *f))
    }

    fn for_each_source(
        &self,
        f: &mut dyn FnMut(&dyn CacheView<T>) -> ControlFlow<()>,
    ) -> ControlFlow<()> {
        self.sources
            .with_sources(&mut |source| source.for_each_source(&mut *f))
    }

    fn entries(&self) -> Entries<T> {
        let mut pending: VecDeque<Arc<S>> = self.sources.source_handles().into();
        let mut current: Option<Entries<T>> = None;
        Box::new(std::iter::from_fn(move || loop {
            if let Some(entry) = current.as_mut().and_then(|it| it.next()) {
                return Some(entry);
            }
            // Release the exhausted source's lock before taking the next one.
            drop(current.take());
            let next = pending.pop_front()?;
            current = Some(next.entries());
        }))
    }
}

/// [`CompositeCacheView`] with a name function
pub struct CompositeNamedCacheView<T, S: ?Sized> {
    inner: CompositeCacheView<T, S>,
    name_fn: NameFn<T>,
}

impl<T, S: ?Sized> Clone for CompositeNamedCacheView<T, S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            name_fn: Arc::clone(&self.name_fn),
        }
    }
}

impl<T, S: ?Sized> fmt::Debug for CompositeNamedCacheView<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CompositeNamedCacheView")
    }
}

impl<T, S> CompositeNamedCacheView<T, S>
where
    T: CacheValue,
    S: CacheView<T> + ?Sized + 'static,
{
    pub fn new(sources: impl ViewSources<S> + 'static, name_fn: NameFn<T>) -> Self {
        Self {
            inner: CompositeCacheView::new(sources),
            name_fn,
        }
    }

    pub fn from_views(views: Vec<Arc<S>>, name_fn: NameFn<T>) -> Self {
        Self::new(views, name_fn)
    }
}

impl<T, S> CacheView<T> for CompositeNamedCacheView<T, S>
where
    T: CacheValue,
    S: CacheView<T> + ?Sized + 'static,
{
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
        self.inner.for_each_source(f)
    }

    fn entries(&self) -> Entries<T> {
        self.inner.entries()
    }
}

impl<T, S> NamedCacheView<T> for CompositeNamedCacheView<T, S>
where
    T: CacheValue,
    S: CacheView<T> + ?Sized + 'static,
{
    fn name_of(&self, value: &T) -> Option<String> {
        (self.name_fn)(value)
    }
}

// =============================================================================
// Tests
// =============================================================================
