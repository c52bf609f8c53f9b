//! Cache Views
//!
//! Read and write contracts over one logical set of cached entities.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                   CacheView  (+ CacheViewExt queries)                 │
//! │        ┌───────────────────────┼───────────────────────┐             │
//! │  NamedCacheView          MutableCacheView          (plain)           │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │  DefaultCacheView        one LongEntityMap behind one RwLock         │
//! │  DefaultNamedCacheView   DefaultCacheView + name function            │
//! │  CompositeCacheView      lazy merge of N views, no copy              │
//! │  EmptyCacheView          stand-in for partitions that do not exist   │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The object-safe core (`len`, `get`, `visit`, `for_each_source`,
//! `entries`) is all an implementation provides; every query in
//! [`CacheViewExt`] is built from it. Composite views expose their sources
//! through `for_each_source`, so `min`/`max`/`reduce` compute one partial per
//! source and then combine partials.
//!
//! Views are live: a view handed out earlier sees later writes to the
//! partition it wraps. Use `snapshot` for a detached copy.

mod composite;
mod default;
mod empty;
mod named;
mod table;

#[cfg(test)]
mod proptest;

pub use composite::{CompositeCacheView, CompositeNamedCacheView, ViewSources};
pub use default::{DefaultCacheView, DefaultNamedCacheView};
pub use empty::EmptyCacheView;
pub use named::{NameFn, NameMatch, NamedCacheView, NamedCacheViewExt};
pub use table::{LongEntityMap, DEFAULT_MAX_LOAD, MIN_CAPACITY};

use std::cmp::Ordering;
use std::ops::ControlFlow;
use std::sync::Arc;

use crate::error::Result;
use crate::snowflake::parse_snowflake;

/// Values a view can hold: cheap to clone and shareable across threads
pub trait CacheValue: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> CacheValue for T {}

/// Live iterator over `(id, value)` pairs.
///
/// Holds the read lock of the partition it is currently walking, so do not
/// write to that partition from the same thread while it is alive.
pub type Entries<T> = Box<dyn Iterator<Item = (u64, T)>>;

/// Shared handle to a plain view
pub type View<T> = Arc<dyn CacheView<T>>;

/// Shared handle to a named view
pub type NamedView<T> = Arc<dyn NamedCacheView<T>>;

/// Read-only view over a set of entities keyed by snowflake
pub trait CacheView<T: CacheValue>: Send + Sync {
    /// Number of entities
    fn len(&self) -> usize;

    /// Whether the view holds no entities
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Point lookup
    fn get(&self, id: u64) -> Option<T>;

    /// Walk every entity until `f` breaks. Returns whether it broke.
    fn visit(&self, f: &mut dyn FnMut(u64, &T) -> ControlFlow<()>) -> ControlFlow<()>;

    /// Hand each underlying source view to `f` in a stable order.
    /// Single-table views hand over themselves.
    fn for_each_source(
        &self,
        f: &mut dyn FnMut(&dyn CacheView<T>) -> ControlFlow<()>,
    ) -> ControlFlow<()>;

    /// Live iterator over entries
    fn entries(&self) -> Entries<T>;
}

/// Queries available on every [`CacheView`]
pub trait CacheViewExt<T: CacheValue>: CacheView<T> {
    /// Point lookup by decimal ID string
    fn get_str(&self, id: &str) -> Result<Option<T>> {
        Ok(self.get(parse_snowflake(id)?))
    }

    /// Run `action` on every entity
    fn for_each<F>(&self, mut action: F)
    where
        F: FnMut(&T),
    {
        let _ = self.visit(&mut |_, v| {
            action(v);
            ControlFlow::Continue(())
        });
    }

    /// Any entity matching `filter`
    fn find_any<F>(&self, mut filter: F) -> Option<T>
    where
        F: FnMut(&T) -> bool,
    {
        let mut found = None;
        let _ = self.visit(&mut |_, v| {
            if filter(v) {
                found = Some(v.clone());
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        found
    }

    /// All entities matching `filter`
    fn find<F>(&self, filter: F) -> Vec<T>
    where
        F: FnMut(&T) -> bool,
    {
        self.find_into(filter, Vec::new())
    }

    /// All entities matching `filter`, appended to a caller-supplied collection
    fn find_into<F, C>(&self, mut filter: F, mut collection: C) -> C
    where
        F: FnMut(&T) -> bool,
        C: Extend<T>,
    {
        let _ = self.visit(&mut |_, v| {
            if filter(v) {
                collection.extend(std::iter::once(v.clone()));
            }
            ControlFlow::Continue(())
        });
        collection
    }

    /// Thread an accumulator through every entity
    fn fold<U, F>(&self, identity: U, mut accumulator: F) -> U
    where
        F: FnMut(U, &T) -> U,
    {
        self.entries().fold(identity, |acc, (_, v)| accumulator(acc, &v))
    }

    /// Reduce each source from `identity`, then merge the partials with `combiner`
    fn reduce_with<U, F, C>(&self, identity: U, mut accumulator: F, mut combiner: C) -> U
    where
        U: Clone,
        F: FnMut(U, &T) -> U,
        C: FnMut(U, U) -> U,
    {
        let mut result: Option<U> = None;
        let _ = self.for_each_source(&mut |source| {
            let partial = source.fold(identity.clone(), &mut accumulator);
            result = Some(match result.take() {
                Some(acc) => combiner(acc, partial),
                None => partial,
            });
            ControlFlow::Continue(())
        });
        result.unwrap_or(identity)
    }

    /// Combine all entities with `op`; `None` when empty
    fn reduce<F>(&self, mut op: F) -> Option<T>
    where
        F: FnMut(T, T) -> T,
    {
        let mut result: Option<T> = None;
        let _ = self.for_each_source(&mut |source| {
            let mut partial: Option<T> = None;
            let _ = source.visit(&mut |_, v| {
                partial = Some(match partial.take() {
                    Some(acc) => op(acc, v.clone()),
                    None => v.clone(),
                });
                ControlFlow::Continue(())
            });
            if let Some(partial) = partial {
                result = Some(match result.take() {
                    Some(acc) => op(acc, partial),
                    None => partial,
                });
            }
            ControlFlow::Continue(())
        });
        result
    }

    /// Smallest entity by `compare`; the first one seen wins ties
    fn min_by<F>(&self, mut compare: F) -> Option<T>
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        extreme_by(self, |current, candidate| {
            compare(current, candidate) == Ordering::Greater
        })
    }

    /// Largest entity by `compare`; the first one seen wins ties
    fn max_by<F>(&self, mut compare: F) -> Option<T>
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        extreme_by(self, |current, candidate| compare(current, candidate) == Ordering::Less)
    }

    /// Number of entities matching `filter`, summed per source
    fn count<F>(&self, mut filter: F) -> usize
    where
        F: FnMut(&T) -> bool,
    {
        let mut total = 0;
        let _ = self.for_each_source(&mut |source| {
            let mut count = 0;
            let _ = source.visit(&mut |_, v| {
                if filter(v) {
                    count += 1;
                }
                ControlFlow::Continue(())
            });
            total += count;
            ControlFlow::Continue(())
        });
        total
    }

    /// Whether any entity matches; `false` when empty
    fn any_match<F>(&self, mut predicate: F) -> bool
    where
        F: FnMut(&T) -> bool,
    {
        self.visit(&mut |_, v| {
            if predicate(v) {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .is_break()
    }

    /// Whether every entity matches; `true` when empty
    fn all_match<F>(&self, mut predicate: F) -> bool
    where
        F: FnMut(&T) -> bool,
    {
        !self.any_match(|v| !predicate(v))
    }

    /// Whether no entity matches; `true` when empty
    fn none_match<F>(&self, predicate: F) -> bool
    where
        F: FnMut(&T) -> bool,
    {
        !self.any_match(predicate)
    }

    /// Live iterator over IDs
    fn keys(&self) -> Box<dyn Iterator<Item = u64>> {
        Box::new(self.entries().map(|(id, _)| id))
    }

    /// Live iterator over values
    fn values(&self) -> Box<dyn Iterator<Item = T>> {
        Box::new(self.entries().map(|(_, v)| v))
    }

    /// Live iterator over values
    fn iter(&self) -> Box<dyn Iterator<Item = T>> {
        self.values()
    }

    /// Detached copy of every value
    fn snapshot(&self) -> Vec<T> {
        self.snapshot_into(Vec::with_capacity(self.len()))
    }

    /// Detached copy of every value, appended to a caller-supplied collection
    fn snapshot_into<C>(&self, collection: C) -> C
    where
        C: Extend<T>,
    {
        self.find_into(|_| true, collection)
    }
}

impl<T: CacheValue, V: CacheView<T> + ?Sized> CacheViewExt<T> for V {}

/// Per-source extreme, merged with the same rule.
/// `replace(current, candidate)` decides whether the candidate wins.
fn extreme_by<T, V, F>(view: &V, mut replace: F) -> Option<T>
where
    T: CacheValue,
    V: CacheView<T> + ?Sized,
    F: FnMut(&T, &T) -> bool,
{
    let mut best: Option<T> = None;
    let _ = view.for_each_source(&mut |source| {
        let mut partial: Option<T> = None;
        let _ = source.visit(&mut |_, v| {
            let wins = match &partial {
                Some(current) => replace(current, v),
                None => true,
            };
            if wins {
                partial = Some(v.clone());
            }
            ControlFlow::Continue(())
        });
        if let Some(candidate) = partial {
            let wins = match &best {
                Some(current) => replace(current, &candidate),
                None => true,
            };
            if wins {
                best = Some(candidate);
            }
        }
        ControlFlow::Continue(())
    });
    best
}

/// Write half of the view contract. Only single-table views implement it.
pub trait MutableCacheView<T: CacheValue>: CacheView<T> {
    /// Insert or replace, returning the previous value
    fn put(&self, id: u64, value: T) -> Option<T>;

    /// Remove by ID, returning the previous value
    fn remove(&self, id: u64) -> Option<T>;

    /// Remove every entry whose ID matches `filter`
    fn remove_if(&self, filter: &mut dyn FnMut(u64) -> bool) -> bool;

    /// Remove everything
    fn clear(&self);
}

/// An always-empty named view
pub fn empty<T: CacheValue>() -> NamedView<T> {
    Arc::new(EmptyCacheView::new())
}

/// An always-empty plain view
pub fn empty_view<T: CacheValue>() -> View<T> {
    Arc::new(EmptyCacheView::new())
}

// =============================================================================
// Tests
// =============================================================================
