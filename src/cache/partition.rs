//! Lazily created partitions
//!
//! A concurrent map from partition ID (a guild or a shard) to an
//! independently locked view. Creation is an atomic get-or-insert, so two
//! first writers for the same guild always end up sharing one partition.

use dashmap::DashMap;
use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

use crate::config::Topology;
use crate::view::{CacheValue, CacheView, CompositeCacheView, MutableCacheView, ViewSources};

/// Partition ID to partition, creating partitions on first write
pub struct PartitionMap<P> {
    partitions: DashMap<u64, Arc<P>>,
    factory: Arc<dyn Fn() -> P + Send + Sync>,
}

impl<P> fmt::Debug for PartitionMap<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartitionMap")
            .field("partitions", &self.partitions.len())
            .finish()
    }
}

impl<P> PartitionMap<P> {
    /// Create an empty map that builds partitions with `factory`
    pub fn new(factory: impl Fn() -> P + Send + Sync + 'static) -> Self {
        Self {
            partitions: DashMap::new(),
            factory: Arc::new(factory),
        }
    }

    /// Existing partition for `id`, or a fresh one
    pub fn get_or_create(&self, id: u64) -> Arc<P> {
        if let Some(existing) = self.partitions.get(&id) {
            return Arc::clone(existing.value());
        }
        let entry = self
            .partitions
            .entry(id)
            .or_insert_with(|| Arc::new((self.factory)()));
        Arc::clone(entry.value())
    }

    /// Existing partition for `id`
    pub fn get(&self, id: u64) -> Option<Arc<P>> {
        self.partitions.get(&id).map(|p| Arc::clone(p.value()))
    }

    /// Drop the partition for `id`
    pub fn remove(&self, id: u64) -> Option<Arc<P>> {
        self.partitions.remove(&id).map(|(_, p)| p)
    }

    /// Drop every partition whose ID matches `filter`. Returns how many went.
    pub fn remove_where<F>(&self, mut filter: F) -> usize
    where
        F: FnMut(u64) -> bool,
    {
        let doomed: Vec<u64> = self
            .partitions
            .iter()
            .map(|entry| *entry.key())
            .filter(|id| filter(*id))
            .collect();
        doomed
            .into_iter()
            .filter(|id| self.partitions.remove(id).is_some())
            .count()
    }

    /// Number of partitions
    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// Partition IDs in ascending order
    pub fn ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.partitions.iter().map(|e| *e.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// Current partitions in ascending ID order. The map's own locks are
    /// released before this returns.
    pub fn handles(&self) -> Vec<(u64, Arc<P>)> {
        let mut handles: Vec<(u64, Arc<P>)> = self
            .partitions
            .iter()
            .map(|e| (*e.key(), Arc::clone(e.value())))
            .collect();
        handles.sort_unstable_by_key(|(id, _)| *id);
        handles
    }

    pub fn clear(&self) {
        self.partitions.clear();
    }
}

impl<P: Send + Sync> ViewSources<P> for PartitionMap<P> {
    fn with_sources(&self, f: &mut dyn FnMut(&P) -> ControlFlow<()>) -> ControlFlow<()> {
        for (_, partition) in self.handles() {
            f(&partition)?;
        }
        ControlFlow::Continue(())
    }

    fn source_handles(&self) -> Vec<Arc<P>> {
        self.handles().into_iter().map(|(_, p)| p).collect()
    }
}

/// Storage for entities partitioned by shard: one partition per shard under
/// [`Topology::Split`], a single partition under [`Topology::Unified`].
pub struct ShardStore<P> {
    topology: Topology,
    partitions: Arc<PartitionMap<P>>,
}

impl<P> fmt::Debug for ShardStore<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardStore")
            .field("topology", &self.topology)
            .field("partitions", &self.partitions.len())
            .finish()
    }
}

/// Partition key used for every shard under the unified topology
const UNIFIED_KEY: u64 = 0;

impl<P> ShardStore<P> {
    pub fn new(topology: Topology, factory: impl Fn() -> P + Send + Sync + 'static) -> Self {
        Self {
            topology,
            partitions: Arc::new(PartitionMap::new(factory)),
        }
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    fn key(&self, shard_id: u32) -> u64 {
        match self.topology {
            Topology::Split => u64::from(shard_id),
            Topology::Unified => UNIFIED_KEY,
        }
    }

    /// Partition written by events arriving on `shard_id`
    pub fn for_shard(&self, shard_id: u32) -> Arc<P> {
        self.partitions.get_or_create(self.key(shard_id))
    }

    /// Drop the partition of `shard_id`. A no-op under the unified topology.
    pub fn drop_shard(&self, shard_id: u32) -> bool {
        match self.topology {
            Topology::Split => self.partitions.remove(u64::from(shard_id)).is_some(),
            Topology::Unified => false,
        }
    }

    /// Shared handle to the partition map, for composite views
    pub fn partitions(&self) -> Arc<PartitionMap<P>> {
        Arc::clone(&self.partitions)
    }
}

impl<P> ShardStore<P>
where
    P: Send + Sync + 'static,
{
    /// Find `id` in whichever partition holds it. Under the split topology
    /// this probes each shard partition in turn.
    pub fn lookup<T>(&self, id: u64) -> Option<T>
    where
        T: CacheValue,
        P: CacheView<T>,
    {
        match self.topology {
            Topology::Unified => self.partitions.get(UNIFIED_KEY)?.get(id),
            Topology::Split => self
                .partitions
                .handles()
                .into_iter()
                .find_map(|(_, partition)| partition.get(id)),
        }
    }

    /// Like [`lookup`](Self::lookup), also returning the partition the value
    /// was found in
    pub fn locate<T>(&self, id: u64) -> Option<(Arc<P>, T)>
    where
        T: CacheValue,
        P: CacheView<T>,
    {
        self.partitions
            .handles()
            .into_iter()
            .find_map(|(_, partition)| partition.get(id).map(|value| (partition, value)))
    }

    /// Insert or replace `id`. An ID already held by some shard partition is
    /// replaced in place, so it never ends up in two partitions; a new ID goes
    /// to the partition of `shard_id`.
    pub fn upsert<T>(&self, shard_id: u32, id: u64, value: T) -> Option<T>
    where
        T: CacheValue,
        P: MutableCacheView<T>,
    {
        let partition = match self.topology {
            Topology::Unified => self.for_shard(shard_id),
            Topology::Split => match self.locate::<T>(id) {
                Some((partition, _)) => partition,
                None => self.for_shard(shard_id),
            },
        };
        partition.put(id, value)
    }

    /// Remove `id` from whichever partition holds it
    pub fn remove<T>(&self, id: u64) -> Option<T>
    where
        T: CacheValue,
        P: MutableCacheView<T>,
    {
        let (partition, _) = self.locate::<T>(id)?;
        partition.remove(id)
    }

    /// Live merge of every shard partition
    pub fn composite<T>(&self) -> CompositeCacheView<T, P>
    where
        T: CacheValue,
        P: CacheView<T>,
    {
        CompositeCacheView::new(self.partitions())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::DefaultCacheView;
    use std::thread;

    fn map() -> PartitionMap<DefaultCacheView<u32>> {
        PartitionMap::new(DefaultCacheView::new)
    }

    #[test]
    fn test_get_or_create_is_shared() {
        let partitions = map();
        assert!(partitions.get(1).is_none());
        let first = partitions.get_or_create(1);
        first.put(5, 50);
        let again = partitions.get_or_create(1);
        assert!(first.same_partition(&again));
        assert_eq!(partitions.get(1).and_then(|p| p.get(5)), Some(50));
        assert_eq!(partitions.len(), 1);
    }

    #[test]
    fn test_concurrent_first_writers_share_partition() {
        let partitions = Arc::new(map());
        let handles: Vec<_> = (0..8u32)
            .map(|i| {
                let partitions = Arc::clone(&partitions);
                thread::spawn(move || {
                    partitions.get_or_create(42).put(u64::from(i), i);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(partitions.len(), 1);
        assert_eq!(partitions.get(42).map(|p| p.len()), Some(8));
    }

    #[test]
    fn test_remove_where_and_order() {
        let partitions = map();
        for id in [9, 3, 6, 1] {
            partitions.get_or_create(id);
        }
        assert_eq!(partitions.ids(), vec![1, 3, 6, 9]);
        assert_eq!(partitions.remove_where(|id| id % 3 == 0), 3);
        assert_eq!(partitions.ids(), vec![1]);
        assert!(partitions.remove(1).is_some());
        assert!(partitions.remove(1).is_none());
        assert!(partitions.is_empty());
    }

    #[test]
    fn test_composite_sees_new_partitions() {
        let partitions = Arc::new(map());
        let composite: CompositeCacheView<u32, DefaultCacheView<u32>> =
            CompositeCacheView::new(Arc::clone(&partitions));
        assert!(composite.is_empty());
        partitions.get_or_create(7).put(1, 10);
        partitions.get_or_create(8).put(2, 20);
        assert_eq!(composite.len(), 2);
        partitions.remove(7);
        assert_eq!(composite.len(), 1);
        assert_eq!(composite.get(2), Some(20));
    }

    #[test]
    fn test_shard_store_split() {
        let store = ShardStore::new(Topology::Split, DefaultCacheView::<u32>::new);
        store.for_shard(0).put(1, 10);
        store.for_shard(3).put(2, 20);
        assert_eq!(store.lookup::<u32>(2), Some(20));
        assert_eq!(store.lookup::<u32>(3), None);
        assert_eq!(store.composite::<u32>().len(), 2);

        let (partition, value) = store.locate::<u32>(2).unwrap();
        assert_eq!(value, 20);
        assert!(partition.same_partition(&store.for_shard(3)));

        assert!(store.drop_shard(3));
        assert_eq!(store.lookup::<u32>(2), None);
        assert!(!store.drop_shard(3));
    }

    #[test]
    fn test_shard_store_upsert_keeps_one_home() {
        let store = ShardStore::new(Topology::Split, DefaultCacheView::<u32>::new);
        assert_eq!(store.upsert(1, 9, 90), None);
        assert_eq!(store.upsert(2, 9, 91), Some(90));
        assert_eq!(store.for_shard(1).get(9), Some(91));
        assert!(store.for_shard(2).is_empty());

        assert_eq!(store.remove::<u32>(9), Some(91));
        assert_eq!(store.remove::<u32>(9), None);
        assert!(store.composite::<u32>().is_empty());
    }

    #[test]
    fn test_shard_store_unified() {
        let store = ShardStore::new(Topology::Unified, DefaultCacheView::<u32>::new);
        store.for_shard(0).put(1, 10);
        store.for_shard(5).put(2, 20);
        assert!(store.for_shard(0).same_partition(&store.for_shard(5)));
        assert_eq!(store.lookup::<u32>(1), Some(10));
        assert!(!store.drop_shard(5));
        assert_eq!(store.composite::<u32>().len(), 2);
    }
}
