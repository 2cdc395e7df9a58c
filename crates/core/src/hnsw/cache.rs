//! Construction-time memo of pairwise node distances.
//!
//! Keys are order-independent: `(a, b)` and `(b, a)` map to the same triangular index
//! `max·(max+1)/2 + min`. The cache is write-through and only ever consulted while
//! inserting; queries compare against vectors that are not graph nodes.

use crate::config;
use serde::{Deserialize, Serialize};

/// Storage strategy of the distance cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceCacheKind {
    /// Triangular array sized to the node count. Exact; memory grows quadratically.
    Dense,
    /// Direct-mapped table with overwrite on collision. Bounded memory.
    Hashed,
}

#[inline]
fn pair_key(a: u32, b: u32) -> u64 {
    let (hi, lo) = if a >= b { (a as u64, b as u64) } else { (b as u64, a as u64) };
    ((hi * (hi + 1)) >> 1) + lo
}

/// Exact triangular memo. `NaN` marks an empty slot.
#[derive(Debug, Default)]
pub struct DenseCache {
    values: Vec<f32>,
    points: usize,
}

impl DenseCache {
    fn resize(&mut self, points: usize) {
        if points <= self.points {
            return;
        }
        let len = points * (points + 1) / 2;
        self.values.resize(len, f32::NAN);
        self.points = points;
    }

    #[inline]
    fn get_or_compute<F: FnOnce() -> f32>(&mut self, key: u64, compute: F) -> (f32, bool) {
        let slot = &mut self.values[key as usize];
        if !slot.is_nan() {
            return (*slot, true);
        }
        let d = compute();
        *slot = d;
        (d, false)
    }
}

const EMPTY_KEY: u64 = u64::MAX;

/// Direct-mapped memo: slot `key & (capacity - 1)`, overwritten on collision.
#[derive(Debug, Default)]
pub struct HashedCache {
    keys: Vec<u64>,
    values: Vec<f32>,
}

impl HashedCache {
    fn capacity_for(points: usize) -> usize {
        let points = if points == 0 {
            config::DISTANCE_CACHE_DEFAULT_POINTS
        } else {
            points
        };
        let pairs = points.saturating_mul(points + 1) / 2;
        pairs
            .min(config::DISTANCE_CACHE_MAX_ENTRIES)
            .max(1)
            .next_power_of_two()
            .min(config::DISTANCE_CACHE_MAX_ENTRIES)
    }

    fn resize(&mut self, points: usize) {
        let capacity = Self::capacity_for(points);
        if capacity <= self.keys.len() {
            return;
        }
        let old_keys = std::mem::replace(&mut self.keys, vec![EMPTY_KEY; capacity]);
        let old_values = std::mem::replace(&mut self.values, vec![0.0; capacity]);
        let mask = (capacity - 1) as u64;
        for (key, value) in old_keys.into_iter().zip(old_values) {
            if key != EMPTY_KEY {
                let slot = (key & mask) as usize;
                self.keys[slot] = key;
                self.values[slot] = value;
            }
        }
    }

    #[inline]
    fn get_or_compute<F: FnOnce() -> f32>(&mut self, key: u64, compute: F) -> (f32, bool) {
        let slot = (key & (self.keys.len() as u64 - 1)) as usize;
        if self.keys[slot] == key {
            return (self.values[slot], true);
        }
        let d = compute();
        self.keys[slot] = key;
        self.values[slot] = d;
        (d, false)
    }
}

/// Pairwise distance memo with hit accounting.
#[derive(Debug)]
pub struct DistanceCache {
    store: CacheStore,
    lookups: u64,
    hits: u64,
}

#[derive(Debug)]
enum CacheStore {
    Dense(DenseCache),
    Hashed(HashedCache),
}

impl DistanceCache {
    /// Creates a cache sized for `points` nodes.
    pub fn new(kind: DistanceCacheKind, points: usize) -> Self {
        let mut store = match kind {
            DistanceCacheKind::Dense => CacheStore::Dense(DenseCache::default()),
            DistanceCacheKind::Hashed => CacheStore::Hashed(HashedCache::default()),
        };
        match &mut store {
            CacheStore::Dense(c) => c.resize(points),
            CacheStore::Hashed(c) => c.resize(points),
        }
        Self {
            store,
            lookups: 0,
            hits: 0,
        }
    }

    /// Grows the cache to cover `points` nodes. Never shrinks.
    pub fn resize(&mut self, points: usize) {
        match &mut self.store {
            CacheStore::Dense(c) => c.resize(points),
            CacheStore::Hashed(c) => c.resize(points),
        }
    }

    /// Returns the memoized distance between `a` and `b`, calling `compute` on a miss
    /// and storing its result before returning it.
    ///
    /// Both ids must be below the point count the cache was last sized for.
    #[inline]
    pub fn get_or_compute<F: FnOnce() -> f32>(&mut self, a: u32, b: u32, compute: F) -> f32 {
        let key = pair_key(a, b);
        let (d, hit) = match &mut self.store {
            CacheStore::Dense(c) => c.get_or_compute(key, compute),
            CacheStore::Hashed(c) => c.get_or_compute(key, compute),
        };
        self.lookups += 1;
        if hit {
            self.hits += 1;
        }
        d
    }

    /// Fraction of lookups answered from the cache.
    pub fn hit_rate(&self) -> f64 {
        if self.lookups == 0 {
            0.0
        } else {
            self.hits as f64 / self.lookups as f64
        }
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn lookups(&self) -> u64 {
        self.lookups
    }
}
