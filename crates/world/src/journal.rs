// Copyright 2015-2020 Parity Technologies (UK) Ltd.
// This file is part of OpenEthereum.

// OpenEthereum is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// OpenEthereum is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with OpenEthereum.  If not, see <http://www.gnu.org/licenses/>.

//! The undoable world-state journal (spec.md §3 "journal", §4.6 "World
//! Journal"). Every mutation is recorded as `(savepoint, key, previous
//! value)`; entering a frame records a savepoint, and a revert rewinds the
//! journal to it in LIFO order.

use crate::World;
use ethereum_types::{Address, H256, U256};
use parity_bytes::Bytes;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub address: Address,
    pub topics: Vec<H256>,
    pub data: Vec<u8>,
}

/// One undoable world mutation, tagged with the savepoint id of the frame
/// that produced it.
#[derive(Debug, Clone)]
pub enum JournalEntry {
    BalanceChange {
        savepoint: usize,
        address: Address,
        prev: U256,
    },
    NonceChange {
        savepoint: usize,
        address: Address,
        prev: u64,
    },
    CodeChange {
        savepoint: usize,
        address: Address,
        prev: Option<Arc<Bytes>>,
    },
    StorageChange {
        savepoint: usize,
        address: Address,
        key: H256,
        prev: H256,
    },
    TransientStorageChange {
        savepoint: usize,
        address: Address,
        key: H256,
        prev: H256,
    },
    AccountCreated {
        savepoint: usize,
        address: Address,
    },
    TouchedAddress {
        savepoint: usize,
        address: Address,
    },
    AddressWarmed {
        savepoint: usize,
        address: Address,
    },
    StorageKeyWarmed {
        savepoint: usize,
        address: Address,
        key: H256,
    },
    Suicide {
        savepoint: usize,
        address: Address,
    },
    RefundChange {
        savepoint: usize,
        delta: i64,
    },
}

/// A flat undo log plus a checkpoint stack. `checkpoint()` records the
/// current length as a savepoint; `revert_to(world, id)` undoes every entry
/// recorded since, in reverse order; `commit(id)` simply forgets the
/// checkpoint (its entries stay in the log, "folded into the parent's
/// savepoint" per spec.md §4.6, since there's nothing left to undo them
/// against once the parent itself commits or reverts further down).
#[derive(Default)]
pub struct Journal {
    entries: Vec<JournalEntry>,
    next_savepoint: usize,
}

impl Journal {
    pub fn new() -> Self {
        Journal {
            entries: Vec::new(),
            next_savepoint: 0,
        }
    }

    /// Enters a new frame, returning its savepoint id.
    pub fn checkpoint(&mut self) -> usize {
        let id = self.next_savepoint;
        self.next_savepoint += 1;
        id
    }

    /// Forgets a savepoint on successful frame completion. The journal keeps
    /// the entries (there is no parent-local view to fold them into; the
    /// flat log already behaves as the "parent's" log), it just stops being
    /// revertible to this id specifically.
    pub fn commit(&mut self, _savepoint: usize) {}

    /// Rewinds every entry tagged with `savepoint >= checkpoint` (LIFO),
    /// undoing each into `world`, and removes them from the log. Leaves
    /// entries from earlier, still-live frames untouched.
    pub fn revert_to(&mut self, world: &mut World, checkpoint: usize) {
        while let Some(entry) = self.entries.last() {
            if entry_savepoint(entry) < checkpoint {
                break;
            }
            let entry = self.entries.pop().expect("checked Some above");
            undo(world, entry);
        }
    }

    fn push(&mut self, entry: JournalEntry) {
        self.entries.push(entry);
    }

    pub fn record_balance_change(&mut self, savepoint: usize, address: Address, prev: U256) {
        self.push(JournalEntry::BalanceChange {
            savepoint,
            address,
            prev,
        });
    }

    pub fn record_nonce_change(&mut self, savepoint: usize, address: Address, prev: u64) {
        self.push(JournalEntry::NonceChange {
            savepoint,
            address,
            prev,
        });
    }

    pub fn record_code_change(
        &mut self,
        savepoint: usize,
        address: Address,
        prev: Option<Arc<Bytes>>,
    ) {
        self.push(JournalEntry::CodeChange {
            savepoint,
            address,
            prev,
        });
    }

    pub fn record_storage_change(&mut self, savepoint: usize, address: Address, key: H256, prev: H256) {
        self.push(JournalEntry::StorageChange {
            savepoint,
            address,
            key,
            prev,
        });
    }

    pub fn record_transient_storage_change(
        &mut self,
        savepoint: usize,
        address: Address,
        key: H256,
        prev: H256,
    ) {
        self.push(JournalEntry::TransientStorageChange {
            savepoint,
            address,
            key,
            prev,
        });
    }

    pub fn record_account_created(&mut self, savepoint: usize, address: Address) {
        self.push(JournalEntry::AccountCreated { savepoint, address });
    }

    pub fn record_touched(&mut self, savepoint: usize, address: Address) {
        self.push(JournalEntry::TouchedAddress { savepoint, address });
    }

    pub fn record_address_warmed(&mut self, savepoint: usize, address: Address) {
        self.push(JournalEntry::AddressWarmed { savepoint, address });
    }

    pub fn record_storage_key_warmed(&mut self, savepoint: usize, address: Address, key: H256) {
        self.push(JournalEntry::StorageKeyWarmed {
            savepoint,
            address,
            key,
        });
    }

    pub fn record_suicide(&mut self, savepoint: usize, address: Address) {
        self.push(JournalEntry::Suicide { savepoint, address });
    }

    pub fn record_refund_change(&mut self, savepoint: usize, delta: i64) {
        self.push(JournalEntry::RefundChange { savepoint, delta });
    }
}

fn entry_savepoint(entry: &JournalEntry) -> usize {
    match *entry {
        JournalEntry::BalanceChange { savepoint, .. }
        | JournalEntry::NonceChange { savepoint, .. }
        | JournalEntry::CodeChange { savepoint, .. }
        | JournalEntry::StorageChange { savepoint, .. }
        | JournalEntry::TransientStorageChange { savepoint, .. }
        | JournalEntry::AccountCreated { savepoint, .. }
        | JournalEntry::TouchedAddress { savepoint, .. }
        | JournalEntry::AddressWarmed { savepoint, .. }
        | JournalEntry::StorageKeyWarmed { savepoint, .. }
        | JournalEntry::Suicide { savepoint, .. }
        | JournalEntry::RefundChange { savepoint, .. } => savepoint,
    }
}

fn undo(world: &mut World, entry: JournalEntry) {
    match entry {
        JournalEntry::BalanceChange { address, prev, .. } => {
            world.account_mut(&address).balance = prev;
        }
        JournalEntry::NonceChange { address, prev, .. } => {
            world.account_mut(&address).nonce = prev;
        }
        JournalEntry::CodeChange { address, prev, .. } => {
            world.account_mut(&address).code = prev;
        }
        JournalEntry::StorageChange {
            address, key, prev, ..
        } => {
            world.account_mut(&address).storage.insert(key, prev);
        }
        JournalEntry::TransientStorageChange {
            address, key, prev, ..
        } => {
            world.transient_storage.insert((address, key), prev);
        }
        JournalEntry::AccountCreated { address, .. } => {
            world.accounts.remove(&address);
        }
        JournalEntry::TouchedAddress { .. } => {
            // Touch tracking is informational past its own transaction; a
            // revert does not need to un-touch an address.
        }
        JournalEntry::AddressWarmed { address, .. } => {
            // Cold/warm status intentionally survives reverts (EIP-2929:
            // gas already charged for the cold access is not refunded by
            // reverting the access itself).
            let _ = address;
        }
        JournalEntry::StorageKeyWarmed { .. } => {}
        JournalEntry::Suicide { address, .. } => {
            world.suicides.remove(&address);
        }
        JournalEntry::RefundChange { delta, .. } => {
            world.refund -= delta;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revert_undoes_most_recent_change_first() {
        let mut world = World::new(false);
        let mut journal = Journal::new();
        let address = Address::zero();
        let key = H256::zero();

        let checkpoint = journal.checkpoint();
        journal.record_storage_change(checkpoint, address, key, H256::zero());
        world.account_mut(&address).storage.insert(key, H256::from_low_u64_be(1));
        journal.record_storage_change(checkpoint, address, key, H256::from_low_u64_be(1));
        world.account_mut(&address).storage.insert(key, H256::from_low_u64_be(2));

        assert_eq!(world.account(&address).unwrap().storage_at(&key), H256::from_low_u64_be(2));
        journal.revert_to(&mut world, checkpoint);
        assert_eq!(world.account(&address).unwrap().storage_at(&key), H256::zero());
    }

    #[test]
    fn nested_checkpoint_revert_only_undoes_inner_frame() {
        let mut world = World::new(false);
        let mut journal = Journal::new();
        let address = Address::zero();
        let key = H256::zero();

        let outer = journal.checkpoint();
        journal.record_storage_change(outer, address, key, H256::zero());
        world.account_mut(&address).storage.insert(key, H256::from_low_u64_be(11));
        journal.commit(outer);

        let inner = journal.checkpoint();
        journal.record_storage_change(inner, address, key, H256::from_low_u64_be(11));
        world.account_mut(&address).storage.insert(key, H256::from_low_u64_be(99));

        journal.revert_to(&mut world, inner);

        assert_eq!(world.account(&address).unwrap().storage_at(&key), H256::from_low_u64_be(11));
    }

    #[test]
    fn address_warmed_entry_survives_revert() {
        let mut world = World::new(true);
        let mut journal = Journal::new();
        let address = Address::from_low_u64_be(7);

        let checkpoint = journal.checkpoint();
        world.access_list.insert_address(address);
        journal.record_address_warmed(checkpoint, address);

        journal.revert_to(&mut world, checkpoint);

        assert!(world.access_list.contains_address(&address));
    }
}
