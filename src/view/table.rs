//! Primitive Long-Keyed Table
//!
//! Open-addressing hash table from `u64` snowflakes to entity values, the
//! storage primitive underneath every cache partition.
//!
//! # Design
//!
//! - Parallel `keys`/`values` arrays with a power-of-two capacity
//! - Linear probing walking *backward* from `mix(key) & mask`
//! - One sentinel key marks a free slot; no separate occupancy bitmap
//! - Backward-shift deletion: no tombstones, so lookup cost never depends on
//!   how many keys were removed in the past
//!
//! Because any `u64` is a legal snowflake, the sentinel can collide with a
//! real key. When that happens the table rotates to a fresh random sentinel
//! and rewrites every free slot before inserting.

use rand::Rng;
use std::fmt;

/// Smallest capacity a table is ever allocated with
pub const MIN_CAPACITY: usize = 8;

/// Largest capacity; beyond this the table keeps one free slot and stops growing
pub const MAX_CAPACITY: usize = 1 << 30;

/// Default fraction of occupied slots that triggers growth
pub const DEFAULT_MAX_LOAD: f64 = 2.0 / 3.0;

/// Load aimed for when sizing a table from an expected entry count
const TARGET_LOAD: f64 = 0.5;

/// Fibonacci hashing constant (2^64 / phi)
const PHI_MAGIC: u64 = 0x9E37_79B9_7F4A_7C15;

/// Scramble a key so sequential snowflakes spread over the table
#[inline]
fn mix(key: u64) -> usize {
    let h = key.wrapping_mul(PHI_MAGIC);
    let h = h ^ (h >> 32);
    (h ^ (h >> 16)) as usize
}

/// Open-addressing map from `u64` to `V`
pub struct LongEntityMap<V> {
    keys: Vec<u64>,
    values: Vec<Option<V>>,
    free: u64,
    size: usize,
    max_size: usize,
    max_load: f64,
    max_capacity: usize,
}

impl<V> Default for LongEntityMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> LongEntityMap<V> {
    /// Create an empty table with the minimum capacity
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create a table sized to hold `expected` entries without growing
    pub fn with_capacity(expected: usize) -> Self {
        Self::with_capacity_and_load(expected, DEFAULT_MAX_LOAD)
    }

    /// Create a table with a custom growth threshold.
    ///
    /// `max_load` is clamped to `(0.1, 0.9)`.
    pub fn with_capacity_and_load(expected: usize, max_load: f64) -> Self {
        let max_load = max_load.clamp(0.1, 0.9);
        let wanted = ((expected as f64) / TARGET_LOAD.min(max_load)).ceil() as usize;
        let capacity = wanted
            .max(MIN_CAPACITY)
            .checked_next_power_of_two()
            .unwrap_or(MAX_CAPACITY)
            .min(MAX_CAPACITY);

        let free = 0;
        Self {
            keys: vec![free; capacity],
            values: (0..capacity).map(|_| None).collect(),
            free,
            size: 0,
            max_size: Self::max_size_for(capacity, max_load, MAX_CAPACITY),
            max_load,
            max_capacity: MAX_CAPACITY,
        }
    }

    /// Table that stops growing at `max_capacity` slots
    #[cfg(test)]
    pub(crate) fn with_max_capacity(max_capacity: usize) -> Self {
        let max_capacity = max_capacity.max(MIN_CAPACITY).next_power_of_two();
        let mut map = Self::with_capacity(0);
        map.max_capacity = max_capacity;
        map.max_size = Self::max_size_for(map.capacity(), map.max_load, max_capacity);
        map
    }

    fn max_size_for(capacity: usize, max_load: f64, max_capacity: usize) -> usize {
        if capacity >= max_capacity {
            return capacity - 2;
        }
        (((capacity as f64) * max_load) as usize).min(capacity - 2)
    }

    /// Number of entries
    #[inline]
    pub fn len(&self) -> usize {
        self.size
    }

    /// Whether the table holds no entries
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Current slot count (always a power of two)
    #[inline]
    pub fn capacity(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    fn mask(&self) -> usize {
        self.keys.len() - 1
    }

    /// Slot holding `key`, if any
    fn index(&self, key: u64) -> Option<usize> {
        if key == self.free {
            return None;
        }
        let mask = self.mask();
        let mut index = mix(key) & mask;
        loop {
            let cur = self.keys[index];
            if cur == key {
                return Some(index);
            }
            if cur == self.free {
                return None;
            }
            index = index.wrapping_sub(1) & mask;
        }
    }

    /// Look up a value
    pub fn get(&self, key: u64) -> Option<&V> {
        self.index(key).and_then(|i| self.values[i].as_ref())
    }

    /// Look up a value mutably
    pub fn get_mut(&mut self, key: u64) -> Option<&mut V> {
        match self.index(key) {
            Some(i) => self.values[i].as_mut(),
            None => None,
        }
    }

    /// Check whether a key is present
    pub fn contains_key(&self, key: u64) -> bool {
        self.index(key).is_some()
    }

    /// Insert a value, returning the one it replaced.
    ///
    /// # Panics
    ///
    /// Panics when a new key would fill the last free slot of a table that
    /// can no longer grow.
    pub fn put(&mut self, key: u64, value: V) -> Option<V> {
        if key == self.free {
            self.change_free();
        }
        let free = self.free;
        let mask = self.mask();
        let mut index = mix(key) & mask;
        loop {
            let cur = self.keys[index];
            if cur == key {
                return self.values[index].replace(value);
            }
            if cur == free {
                break;
            }
            index = index.wrapping_sub(1) & mask;
        }

        // Probing stops only at a free slot, so one must always remain
        assert!(
            self.size + 1 < self.keys.len(),
            "LongEntityMap is full at {} entries",
            self.size
        );
        self.keys[index] = key;
        self.values[index] = Some(value);
        self.size += 1;
        if self.size > self.max_size {
            self.grow();
        }
        None
    }

    /// Remove a key, returning its value
    pub fn remove(&mut self, key: u64) -> Option<V> {
        let index = self.index(key)?;
        self.remove_at(index)
    }

    /// Remove every entry whose key matches `filter`.
    ///
    /// Returns whether anything was removed.
    pub fn remove_if<F>(&mut self, mut filter: F) -> bool
    where
        F: FnMut(u64) -> bool,
    {
        if self.is_empty() {
            return false;
        }

        let free = self.free;
        let mask = self.mask();
        let mut changed = false;
        // Slots whose shift would have to pull an already visited entry
        // (wrapped around from the top of the array) are parked under the
        // key of the first such removal and closed in a second pass.
        let mut first_delayed: Option<usize> = None;
        let mut delayed_key = 0u64;

        let mut i = self.keys.len();
        while i > 0 {
            i -= 1;
            let key = self.keys[i];
            if key == free || (first_delayed.is_some() && key == delayed_key) {
                continue;
            }
            if !filter(key) {
                continue;
            }
            changed = true;
            self.values[i] = None;

            if first_delayed.is_some() {
                self.keys[i] = delayed_key;
                continue;
            }

            let mut index_to_remove = i;
            let mut index_to_shift = i;
            let mut shift_distance = 1usize;
            let mut parked = false;
            loop {
                index_to_shift = index_to_shift.wrapping_sub(1) & mask;
                let key_to_shift = self.keys[index_to_shift];
                if key_to_shift == free {
                    break;
                }
                if (mix(key_to_shift).wrapping_sub(index_to_shift) & mask) >= shift_distance {
                    if index_to_shift > index_to_remove {
                        first_delayed = Some(i);
                        delayed_key = key;
                        self.keys[index_to_remove] = key;
                        parked = true;
                        break;
                    }
                    if index_to_remove == i {
                        // slot i now holds an unvisited entry; look at it again
                        i += 1;
                    }
                    self.keys[index_to_remove] = key_to_shift;
                    self.values[index_to_remove] = self.values[index_to_shift].take();
                    index_to_remove = index_to_shift;
                    shift_distance = 1;
                } else {
                    shift_distance += 1;
                }
            }
            if !parked {
                self.keys[index_to_remove] = free;
                self.size -= 1;
            }
        }

        if let Some(first) = first_delayed {
            self.close_delayed(first, delayed_key);
        }
        changed
    }

    /// Drop every entry, keeping the capacity
    pub fn clear(&mut self) {
        let free = self.free;
        self.keys.iter_mut().for_each(|k| *k = free);
        self.values.iter_mut().for_each(|v| *v = None);
        self.size = 0;
    }

    /// Iterate over `(key, value)` pairs
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            map: self,
            index: self.keys.len(),
        }
    }

    /// Iterate over keys
    pub fn keys(&self) -> impl Iterator<Item = u64> + '_ {
        self.iter().map(|(k, _)| k)
    }

    /// Iterate over values
    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, v)| v)
    }

    /// Entry at raw slot `index`, if occupied
    pub(crate) fn slot(&self, index: usize) -> Option<(u64, &V)> {
        let key = *self.keys.get(index)?;
        if key == self.free {
            return None;
        }
        self.values[index].as_ref().map(|v| (key, v))
    }

    fn remove_at(&mut self, index: usize) -> Option<V> {
        let free = self.free;
        let mask = self.mask();
        let removed = self.values[index].take();

        let mut index_to_remove = index;
        let mut index_to_shift = index;
        let mut shift_distance = 1usize;
        loop {
            index_to_shift = index_to_shift.wrapping_sub(1) & mask;
            let key_to_shift = self.keys[index_to_shift];
            if key_to_shift == free {
                break;
            }
            if (mix(key_to_shift).wrapping_sub(index_to_shift) & mask) >= shift_distance {
                self.keys[index_to_remove] = key_to_shift;
                self.values[index_to_remove] = self.values[index_to_shift].take();
                index_to_remove = index_to_shift;
                shift_distance = 1;
            } else {
                shift_distance += 1;
            }
        }
        self.keys[index_to_remove] = free;
        self.size -= 1;
        removed
    }

    /// Second pass of `remove_if`: close every slot parked under `delayed_key`
    fn close_delayed(&mut self, first_delayed: usize, delayed_key: u64) {
        let free = self.free;
        let mask = self.mask();
        let start = first_delayed.min(self.keys.len() - 1);
        for i in (0..=start).rev() {
            if self.keys[i] != delayed_key {
                continue;
            }
            let mut index_to_remove = i;
            let mut index_to_shift = i;
            let mut shift_distance = 1usize;
            loop {
                index_to_shift = index_to_shift.wrapping_sub(1) & mask;
                let key_to_shift = self.keys[index_to_shift];
                if key_to_shift == free {
                    break;
                }
                if key_to_shift != delayed_key
                    && (mix(key_to_shift).wrapping_sub(index_to_shift) & mask) >= shift_distance
                {
                    self.keys[index_to_remove] = key_to_shift;
                    self.values[index_to_remove] = self.values[index_to_shift].take();
                    index_to_remove = index_to_shift;
                    shift_distance = 1;
                } else {
                    shift_distance += 1;
                }
            }
            self.keys[index_to_remove] = free;
            self.values[index_to_remove] = None;
            self.size -= 1;
        }
    }

    /// Rotate the free sentinel to a random value that is neither the
    /// current sentinel nor a stored key
    fn change_free(&mut self) {
        let old = self.free;
        let mut rng = rand::thread_rng();
        let new_free = loop {
            let candidate: u64 = rng.gen();
            if candidate != old && self.index(candidate).is_none() {
                break candidate;
            }
        };
        for key in self.keys.iter_mut().filter(|k| **k == old) {
            *key = new_free;
        }
        self.free = new_free;
    }

    fn grow(&mut self) {
        let capacity = self.keys.len();
        if capacity >= self.max_capacity {
            return;
        }
        self.rehash(capacity * 2);
    }

    fn rehash(&mut self, new_capacity: usize) {
        debug_assert!(new_capacity.is_power_of_two());
        let free = self.free;
        let old_keys = std::mem::replace(&mut self.keys, vec![free; new_capacity]);
        let mut old_values =
            std::mem::replace(&mut self.values, (0..new_capacity).map(|_| None).collect());
        let mask = new_capacity - 1;

        for (slot, key) in old_keys.into_iter().enumerate() {
            if key == free {
                continue;
            }
            let mut index = mix(key) & mask;
            while self.keys[index] != free {
                index = index.wrapping_sub(1) & mask;
            }
            self.keys[index] = key;
            self.values[index] = old_values[slot].take();
        }
        self.max_size = Self::max_size_for(new_capacity, self.max_load, self.max_capacity);
    }

    /// Number of slots a lookup for `key` inspects
    #[cfg(test)]
    pub(crate) fn probe_length(&self, key: u64) -> usize {
        let mask = self.mask();
        let mut index = mix(key) & mask;
        let mut probes = 1;
        loop {
            let cur = self.keys[index];
            if cur == key || cur == self.free {
                return probes;
            }
            index = index.wrapping_sub(1) & mask;
            probes += 1;
        }
    }

    /// Current sentinel
    #[cfg(test)]
    pub(crate) fn free_key(&self) -> u64 {
        self.free
    }

    /// Verify the linear-probing invariant: every stored key is reachable
    /// from its home slot without crossing a free slot.
    #[cfg(test)]
    pub(crate) fn check_invariants(&self) {
        let mask = self.mask();
        let mut occupied = 0;
        for (slot, &key) in self.keys.iter().enumerate() {
            if key == self.free {
                assert!(self.values[slot].is_none(), "free slot {} holds a value", slot);
                continue;
            }
            occupied += 1;
            assert!(self.values[slot].is_some(), "slot {} lost its value", slot);
            let mut index = mix(key) & mask;
            while index != slot {
                assert_ne!(self.keys[index], self.free, "gap before key {} at {}", key, slot);
                index = index.wrapping_sub(1) & mask;
            }
        }
        assert_eq!(occupied, self.size);
        assert!(self.size < self.keys.len());
    }
}

impl<V: fmt::Debug> fmt::Debug for LongEntityMap<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<V: Clone> Clone for LongEntityMap<V> {
    fn clone(&self) -> Self {
        Self {
            keys: self.keys.clone(),
            values: self.values.clone(),
            free: self.free,
            size: self.size,
            max_size: self.max_size,
            max_load: self.max_load,
            max_capacity: self.max_capacity,
        }
    }
}

/// Iterator over a table's entries, highest slot first
pub struct Iter<'a, V> {
    map: &'a LongEntityMap<V>,
    index: usize,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (u64, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        while self.index > 0 {
            self.index -= 1;
            if let Some(entry) = self.map.slot(self.index) {
                return Some(entry);
            }
        }
        None
    }
}

impl<'a, V> IntoIterator for &'a LongEntityMap<V> {
    type Item = (u64, &'a V);
    type IntoIter = Iter<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<V> FromIterator<(u64, V)> for LongEntityMap<V> {
    fn from_iter<I: IntoIterator<Item = (u64, V)>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut map = Self::with_capacity(iter.size_hint().0);
        for (k, v) in iter {
            map.put(k, v);
        }
        map
    }
}

// =============================================================================
// Tests
// =============================================================================
