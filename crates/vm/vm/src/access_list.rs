//! EIP-2929/2930 warm/cold access tracking (spec.md §3 `warm_addresses`,
//! `warm_slots`; §6 `warm_address`/`warm_storage_slot`).

use ethereum_types::{Address, H256};
use std::collections::HashSet;

/// Per-transaction record of which addresses and storage slots have already
/// been touched, used to price the EIP-2929 cold/warm split. Lives on the
/// transaction-level `Substate` and is carried into every nested frame so
/// that warmth persists across a reverted sub-call (only the journaled
/// state is rolled back, not access-list warmth).
#[derive(Debug, Clone, Default)]
pub struct AccessList {
    enabled: bool,
    addresses: HashSet<Address>,
    storage_keys: HashSet<(Address, H256)>,
}

impl AccessList {
    /// Construct an access list; `enabled` should track `Schedule::eip2929`.
    pub fn new(enabled: bool) -> Self {
        AccessList {
            enabled,
            addresses: HashSet::new(),
            storage_keys: HashSet::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn contains_address(&self, address: &Address) -> bool {
        self.addresses.contains(address)
    }

    /// Marks `address` warm, returning whether it was already warm.
    pub fn insert_address(&mut self, address: Address) -> bool {
        !self.addresses.insert(address)
    }

    pub fn contains_storage_key(&self, address: &Address, key: &H256) -> bool {
        self.storage_keys.contains(&(*address, *key))
    }

    /// Marks `(address, key)` warm, returning whether it was already warm.
    pub fn insert_storage_key(&mut self, address: Address, key: H256) -> bool {
        !self.storage_keys.insert((address, key))
    }
}
