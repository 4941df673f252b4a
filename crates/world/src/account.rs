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

//! A single account's world-visible state, analogous to the teacher's
//! `pod_account.rs` minus the trie-diffing machinery (not needed without
//! persistence).

use ethereum_types::{H256, U256};
use parity_bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Account {
    pub nonce: u64,
    pub balance: U256,
    pub code: Option<Arc<Bytes>>,
    pub storage: BTreeMap<H256, H256>,
    /// Storage as of the start of the transaction; used by the EIP-2200
    /// SSTORE formula (spec.md §4.3.3) and left untouched by reverts within
    /// the transaction (only the transaction boundary resets it).
    pub original_storage: BTreeMap<H256, H256>,
}

impl Account {
    pub fn new() -> Self {
        Account {
            nonce: 0,
            balance: U256::zero(),
            code: None,
            storage: BTreeMap::new(),
            original_storage: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nonce == 0 && self.balance.is_zero() && self.code.as_ref().map_or(true, |c| c.is_empty())
    }

    pub fn code_hash(&self) -> H256 {
        match &self.code {
            Some(code) if !code.is_empty() => keccak_hash::keccak(&**code),
            _ => keccak_hash::KECCAK_EMPTY,
        }
    }

    pub fn storage_at(&self, key: &H256) -> H256 {
        self.storage.get(key).cloned().unwrap_or_else(H256::zero)
    }

    pub fn original_storage_at(&self, key: &H256) -> H256 {
        self.original_storage
            .get(key)
            .cloned()
            .unwrap_or_else(H256::zero)
    }
}

impl Default for Account {
    fn default() -> Self {
        Account::new()
    }
}
