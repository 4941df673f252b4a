//! Cache of `JUMPDEST` analysis results, shared across interpreter invocations
//! so re-running the same deployed code doesn't re-scan it for valid jump
//! targets on every call.
//!
//! Bounded by memory footprint rather than entry count: each insertion
//! costs that entry's `bitset_heap_size` (a rough byte-size heuristic over
//! the bitset's capacity), and the oldest entries are evicted once the
//! running total would exceed `max_size`.

use bit_set::BitSet;
use ethereum_types::H256;
use lru_cache::LruCache;
use parking_lot::Mutex;
use std::sync::Arc;

/// Rough heap footprint of a cached bitset, in bytes; used to bound the
/// cache by memory rather than entry count.
fn bitset_heap_size(set: &BitSet) -> usize {
    (set.capacity() + 7) / 8 + std::mem::size_of::<Option<H256>>()
}

const DEFAULT_CACHE_SIZE: usize = 4 * 1024 * 1024;

struct Cache {
    jump_destinations: LruCache<Option<H256>, Arc<BitSet>>,
    used_size: usize,
    max_size: usize,
}

/// Memory-bounded LRU cache of per-codehash `JUMPDEST` bitsets.
///
/// Keyed by `Option<H256>` because init code (no stored code hash yet) is
/// cached too, just evicted first since its key never repeats.
pub struct SharedCache {
    cache: Mutex<Cache>,
}

impl SharedCache {
    /// `max_size` is the cache's budget in bytes, as measured by
    /// `bitset_heap_size`'s capacity-based heuristic.
    pub fn new(max_size: usize) -> Self {
        SharedCache {
            cache: Mutex::new(Cache {
                jump_destinations: LruCache::new(usize::max_value()),
                used_size: 0,
                max_size,
            }),
        }
    }

    /// Returns the set of valid `JUMPDEST` positions in `code`, computing and
    /// caching it under `code_hash` on first access.
    pub fn jump_destinations(&self, code_hash: &Option<H256>, code: &[u8]) -> Arc<BitSet> {
        if code_hash.is_some() {
            if let Some(d) = self.cache.lock().jump_destinations.get_mut(code_hash) {
                return d.clone();
            }
        }

        let d = Arc::new(Self::find_jump_destinations(code));

        if code_hash.is_some() {
            self.insert(*code_hash, d.clone());
        }

        d
    }

    fn insert(&self, code_hash: Option<H256>, value: Arc<BitSet>) {
        let mut cache = self.cache.lock();
        cache.used_size += bitset_heap_size(&value);
        cache.jump_destinations.insert(code_hash, value);

        while cache.used_size > cache.max_size {
            match cache.jump_destinations.remove_lru() {
                Some((_, removed)) => {
                    cache.used_size = cache.used_size.saturating_sub(bitset_heap_size(&removed));
                }
                None => break,
            }
        }
    }

    fn find_jump_destinations(code: &[u8]) -> BitSet {
        use instructions::Instruction;

        let mut jump_dests = BitSet::with_capacity(code.len());
        let mut position = 0;

        while position < code.len() {
            let instruction = code[position];

            if instruction == Instruction::JUMPDEST as u8 {
                jump_dests.insert(position);
            } else if let Some(push_bytes) =
                Instruction::from_u8(instruction).and_then(|i| i.push_bytes())
            {
                position += push_bytes;
            }
            position += 1;
        }

        jump_dests
    }
}

impl Default for SharedCache {
    fn default() -> Self {
        SharedCache::new(DEFAULT_CACHE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::SharedCache;
    use rustc_hex::FromHex;

    #[test]
    fn finds_jump_destinations() {
        let code = "600156600657600014600c57".from_hex().unwrap();
        let cache = SharedCache::new(1024 * 1024);
        let dests = cache.jump_destinations(&None, &code);
        assert!(dests.contains(4));
    }

    #[test]
    fn push_data_is_not_mistaken_for_an_opcode() {
        // PUSH1 0x5b (JUMPDEST's own opcode, but here it's push *data*)
        let code = "605b00".from_hex().unwrap();
        let cache = SharedCache::new(1024 * 1024);
        let dests = cache.jump_destinations(&None, &code);
        assert!(dests.is_empty());
    }

    #[test]
    fn caches_by_code_hash() {
        let code = "5b00".from_hex().unwrap();
        let hash = keccak_hash::keccak(&code);
        let cache = SharedCache::new(1024 * 1024);
        let first = cache.jump_destinations(&Some(hash), &code);
        let second = cache.jump_destinations(&Some(hash), &code);
        assert!(std::sync::Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn evicts_when_over_budget() {
        let cache = SharedCache::new(1);
        let code_a = "5b00".from_hex().unwrap();
        let code_b = "5b5b00".from_hex().unwrap();
        let hash_a = keccak_hash::keccak(&code_a);
        let hash_b = keccak_hash::keccak(&code_b);
        let first = cache.jump_destinations(&Some(hash_a), &code_a);
        cache.jump_destinations(&Some(hash_b), &code_b);
        let refetched = cache.jump_destinations(&Some(hash_a), &code_a);
        assert!(!std::sync::Arc::ptr_eq(&first, &refetched));
    }
}
