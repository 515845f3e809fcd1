//! Direct-mapped memo table for values that are expensive to recompute.
//!
//! [`elementary`](crate::elementary) keeps its high-precision constants (pi, ln 2,
//! ln 10 at a given working precision) here. A slot holds one value; a key hashing
//! to an occupied slot evicts the previous value.

use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;

use crate::utils::PerfectHash;

struct Slot<V> {
    hash: u64,
    value: V,
}

pub struct Cache<K, V> {
    slots: Vec<Option<Slot<V>>>,
    bitmask: u64,
    hits: Cell<usize>,
    misses: Cell<usize>,
    evictions: usize,
    _key: PhantomData<K>,
}

impl<K: PerfectHash, V> Cache<K, V> {
    /// Create a table of `2^bits` slots.
    pub fn new(bits: usize) -> Self {
        assert!(bits <= 20, "Bits should be in the range 0..=20");
        let size = 1usize << bits;
        Self {
            slots: std::iter::repeat_with(|| None).take(size).collect(),
            bitmask: (size - 1) as u64,
            hits: Cell::new(0),
            misses: Cell::new(0),
            evictions: 0,
            _key: PhantomData,
        }
    }

    pub fn hits(&self) -> usize {
        self.hits.get()
    }

    pub fn misses(&self) -> usize {
        self.misses.get()
    }

    /// Number of values replaced by a value of another key.
    pub fn evictions(&self) -> usize {
        self.evictions
    }

    pub fn clear(&mut self) {
        self.slots.fill_with(|| None);
    }

    fn slot(&self, hash: u64) -> usize {
        (hash & self.bitmask) as usize
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        let hash = key.hash();
        match &self.slots[self.slot(hash)] {
            Some(slot) if slot.hash == hash => {
                self.hits.set(self.hits.get() + 1);
                Some(&slot.value)
            }
            _ => {
                self.misses.set(self.misses.get() + 1);
                None
            }
        }
    }

    pub fn insert(&mut self, key: &K, value: V) {
        let hash = key.hash();
        let index = self.slot(hash);
        if matches!(&self.slots[index], Some(slot) if slot.hash != hash) {
            self.evictions += 1;
        }
        self.slots[index] = Some(Slot { hash, value });
    }
}

impl<K, V> fmt::Debug for Cache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("size", &self.slots.len())
            .field("hits", &self.hits.get())
            .field("misses", &self.misses.get())
            .field("evictions", &self.evictions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_hits_and_misses() {
        let mut cache = Cache::<(u64, u64), i32>::new(3);

        cache.insert(&(1, 2), 3);
        cache.insert(&(2, 3), 1);

        assert_eq!(cache.get(&(1, 2)), Some(&3));
        assert_eq!(cache.get(&(2, 3)), Some(&1));
        assert_eq!(cache.get(&(2, 1)), None);
        assert_eq!(cache.hits(), 2);
        assert_eq!(cache.misses(), 1);

        cache.clear();
        assert_eq!(cache.get(&(1, 2)), None);
    }

    #[test]
    fn test_eviction() {
        let mut cache = Cache::<(u64, u64), &str>::new(0);
        cache.insert(&(1, 1), "first");
        cache.insert(&(2, 2), "second");
        assert_eq!(cache.evictions(), 1);
        assert_eq!(cache.get(&(1, 1)), None);
        assert_eq!(cache.get(&(2, 2)), Some(&"second"));
    }
}
