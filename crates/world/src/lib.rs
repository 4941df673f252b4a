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

//! In-memory world state, the undoable journal, and the `Ext` implementation
//! (`Externalities`) that wires one frame to a `World` + `Journal`. Plays the
//! role the teacher's `externalities.rs`/`state_db.rs`/`pod_account.rs` play
//! for its trie-backed `State<Backend>`, minus persistence (out of scope).

mod account;
mod externalities;
mod journal;

pub use account::Account;
pub use externalities::{Externalities, OriginInfo};
pub use journal::{Journal, JournalEntry, LogEntry};

/// `keccak(rlp([sender, nonce]))[12:]`, for a top-level `CREATE` transaction
/// that has no enclosing frame to derive its target address through
/// `Ext::calc_address`.
pub fn contract_creation_address(sender: &Address, nonce: u64) -> Address {
    externalities::create_address_from_sender_and_nonce(sender, nonce)
}

use ethereum_types::{Address, H256, U256};
use parity_bytes::Bytes;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use vm::AccessList;

/// The entire world as seen by one transaction: accounts, per-transaction
/// transient storage (EIP-1153), and the transaction-scoped substate (logs,
/// refund counter, self-destruct set, warm-address bookkeeping) that is
/// rolled back together with account state on revert.
pub struct World {
    pub(crate) accounts: HashMap<Address, Account>,
    pub(crate) transient_storage: HashMap<(Address, H256), H256>,
    created_this_tx: HashSet<Address>,
    pub(crate) access_list: AccessList,
    logs: Vec<LogEntry>,
    pub(crate) refund: i64,
    pub(crate) suicides: HashSet<Address>,
}

impl World {
    /// An empty world with no accounts, for tests and `t8n`'s `alloc` loader.
    pub fn new(access_list_enabled: bool) -> Self {
        World {
            accounts: HashMap::new(),
            transient_storage: HashMap::new(),
            created_this_tx: HashSet::new(),
            access_list: AccessList::new(access_list_enabled),
            logs: Vec::new(),
            refund: 0,
            suicides: HashSet::new(),
        }
    }

    pub fn account(&self, address: &Address) -> Option<&Account> {
        self.accounts.get(address)
    }

    pub fn account_mut(&mut self, address: &Address) -> &mut Account {
        self.accounts.entry(*address).or_insert_with(Account::new)
    }

    /// `nonce=0 ∧ balance=0 ∧ code empty`, spec.md §3 "World state".
    pub fn is_empty(&self, address: &Address) -> bool {
        self.accounts
            .get(address)
            .map(Account::is_empty)
            .unwrap_or(true)
    }

    pub fn exists(&self, address: &Address) -> bool {
        self.accounts.contains_key(address)
    }

    /// All accounts touched so far, for `evmbin`'s post-state `alloc` dump.
    pub fn iter_accounts(&self) -> impl Iterator<Item = (&Address, &Account)> {
        self.accounts.iter()
    }

    /// Records that `address` was created by a `CREATE`/`CREATE2`/
    /// `EOFCREATE` within the current transaction (EIP-6780 `SELFDESTRUCT`
    /// gating, spec.md §4.3.7).
    pub fn note_created_this_tx(&mut self, address: Address) {
        self.created_this_tx.insert(address);
    }

    pub fn created_this_tx(&self, address: &Address) -> bool {
        self.created_this_tx.contains(address)
    }

    /// Removes any account left empty after the transaction (post-Spurious
    /// Dragon "touch-delete" rule, spec.md §3).
    pub fn kill_empty_touched(&mut self, touched: &HashSet<Address>) {
        for address in touched {
            if self.is_empty(address) {
                self.accounts.remove(address);
            }
        }
    }

    pub fn logs(&self) -> &[LogEntry] {
        &self.logs
    }

    pub(crate) fn push_log(&mut self, entry: LogEntry) {
        self.logs.push(entry);
    }

    pub fn take_logs(&mut self) -> Vec<LogEntry> {
        std::mem::take(&mut self.logs)
    }

    /// Net refund accumulated this transaction, pre-EIP-3529-cap (the cap is
    /// applied by the caller at transaction finalization, spec.md §7).
    pub fn refund(&self) -> i64 {
        self.refund
    }

    pub fn suicides(&self) -> &HashSet<Address> {
        &self.suicides
    }
}

/// Bytes of code, distinguished from an empty account's implicit empty code.
pub type Code = Option<Arc<Bytes>>;
