// src/io/cache.rs
/*!
Least-recently-used cache of decoded chunk payloads.

Bounded both by entry count (`slots`) and by payload bytes. Payloads are stored
as `Vec<u64>` words so they can be viewed as any `Pod` element type without
alignment concerns.
*/

use std::collections::BTreeMap;

use ahash::AHashMap;

/// Default number of cached chunks.
pub const DEFAULT_CACHE_SLOTS: usize = 12799;
/// Default payload budget (128 MiB).
pub const DEFAULT_CACHE_BYTES: usize = 128 * 1024 * 1024;

#[derive(Debug)]
struct Entry {
    words: Vec<u64>,
    stamp: u64,
}

#[derive(Debug)]
pub struct ChunkCache {
    slots: usize,
    max_bytes: usize,
    bytes: usize,
    clock: u64,
    entries: AHashMap<usize, Entry>,
    order: BTreeMap<u64, usize>,
}

impl Default for ChunkCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_SLOTS, DEFAULT_CACHE_BYTES)
    }
}

impl ChunkCache {
    pub fn new(slots: usize, max_bytes: usize) -> Self {
        Self {
            slots,
            max_bytes,
            bytes: 0,
            clock: 0,
            entries: AHashMap::new(),
            order: BTreeMap::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Payload bytes currently held.
    #[inline]
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Cached payload of chunk `key`, marking it most recently used.
    pub fn get(&mut self, key: usize) -> Option<&[u64]> {
        let stamp = self.tick();
        let entry = self.entries.get_mut(&key)?;
        self.order.remove(&entry.stamp);
        entry.stamp = stamp;
        self.order.insert(stamp, key);
        Some(&entry.words)
    }

    /// Insert or replace chunk `key`. Payloads larger than the whole budget are not cached.
    pub fn insert(&mut self, key: usize, words: Vec<u64>) {
        self.invalidate(key);
        let size = words.len() * std::mem::size_of::<u64>();
        if self.slots == 0 || size > self.max_bytes {
            return;
        }
        while self.entries.len() >= self.slots || self.bytes + size > self.max_bytes {
            if !self.evict_oldest() {
                break;
            }
        }
        let stamp = self.tick();
        self.order.insert(stamp, key);
        self.entries.insert(key, Entry { words, stamp });
        self.bytes += size;
    }

    pub fn invalidate(&mut self, key: usize) {
        if let Some(old) = self.entries.remove(&key) {
            self.order.remove(&old.stamp);
            self.bytes -= old.words.len() * std::mem::size_of::<u64>();
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.bytes = 0;
    }

    fn evict_oldest(&mut self) -> bool {
        let Some((_, key)) = self.order.pop_first() else {
            return false;
        };
        if let Some(old) = self.entries.remove(&key) {
            self.bytes -= old.words.len() * std::mem::size_of::<u64>();
        }
        true
    }
}
