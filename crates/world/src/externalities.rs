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

//! `Ext` implementation wiring one frame to a `World` + `Journal`, analogous
//! to the teacher's `Externalities<'a, T, V, B>` (tracer generics dropped to
//! plain `log` calls, since this crate has no trie-backed backend to thread
//! through a type parameter).

use crate::journal::LogEntry;
use crate::{Journal, World};
use ethereum_types::{Address, H256, U256};
use std::sync::Arc;
use vm::{
    ActionParams, ActionValue, CallType, ContractCreateResult, CreateContractAddress, EnvInfo,
    Error, Ext, MessageCallResult, ParamsType, Result, Schedule, TrapKind,
};

/// The parts of the enclosing frame's `ActionParams` that `Externalities`
/// needs on hand without borrowing the whole struct (address, origin, gas
/// price, and apparent value for `DELEGATECALL` pass-through).
#[derive(Debug, Clone, Copy)]
pub struct OriginInfo {
    pub address: Address,
    pub origin: Address,
    pub gas_price: U256,
    pub value: U256,
}

impl OriginInfo {
    pub fn from_params(params: &ActionParams) -> Self {
        OriginInfo {
            address: params.address,
            origin: params.origin,
            gas_price: params.gas_price,
            value: params.value.value(),
        }
    }
}

pub struct Externalities<'a> {
    origin_info: OriginInfo,
    world: &'a mut World,
    journal: &'a mut Journal,
    savepoint: usize,
    env_info: &'a EnvInfo,
    depth: usize,
    schedule: &'a Schedule,
    static_flag: bool,
    chain_id: u64,
}

impl<'a> Externalities<'a> {
    pub fn new(
        origin_info: OriginInfo,
        world: &'a mut World,
        journal: &'a mut Journal,
        savepoint: usize,
        env_info: &'a EnvInfo,
        depth: usize,
        schedule: &'a Schedule,
        static_flag: bool,
        chain_id: u64,
    ) -> Self {
        Externalities {
            origin_info,
            world,
            journal,
            savepoint,
            env_info,
            depth,
            schedule,
            static_flag,
            chain_id,
        }
    }

    fn require_mutable(&self) -> Result<()> {
        if self.static_flag {
            Err(Error::MutableCallInStaticContext)
        } else {
            Ok(())
        }
    }

    fn build_create_params(
        &mut self,
        gas: &U256,
        value: &U256,
        code: &[u8],
        address_scheme: CreateContractAddress,
    ) -> (ActionParams, Address) {
        let sender = self.origin_info.address;
        let nonce = self.world.account(&sender).map(|a| a.nonce).unwrap_or(0);
        let address =
            calc_create_address(&sender, address_scheme, code, nonce).expect("address scheme covers all variants");

        let params = ActionParams {
            code_address: address,
            code_hash: Some(keccak_hash::keccak(code)),
            address,
            sender,
            origin: self.origin_info.origin,
            gas: *gas,
            gas_price: self.origin_info.gas_price,
            value: ActionValue::Transfer(*value),
            code: Some(Arc::new(code.to_vec())),
            data: None,
            call_type: CallType::None,
            params_type: ParamsType::Embedded,
        };
        (params, address)
    }
}

impl<'a> Ext for Externalities<'a> {
    fn initial_storage_at(&self, key: &H256) -> Result<H256> {
        Ok(self
            .world
            .account(&self.origin_info.address)
            .map(|a| a.original_storage_at(key))
            .unwrap_or_else(H256::zero))
    }

    fn storage_at(&self, key: &H256) -> Result<H256> {
        Ok(self
            .world
            .account(&self.origin_info.address)
            .map(|a| a.storage_at(key))
            .unwrap_or_else(H256::zero))
    }

    fn set_storage(&mut self, key: H256, value: H256) -> Result<()> {
        self.require_mutable()?;
        let address = self.origin_info.address;
        let prev = self
            .world
            .account(&address)
            .map(|a| a.storage_at(&key))
            .unwrap_or_else(H256::zero);
        if prev != value {
            self.journal
                .record_storage_change(self.savepoint, address, key, prev);
            self.world.account_mut(&address).storage.insert(key, value);
        }
        Ok(())
    }

    fn transient_storage_at(&self, key: &H256) -> Result<H256> {
        Ok(self
            .world
            .transient_storage
            .get(&(self.origin_info.address, *key))
            .cloned()
            .unwrap_or_else(H256::zero))
    }

    fn set_transient_storage(&mut self, key: H256, value: H256) -> Result<()> {
        self.require_mutable()?;
        let address = self.origin_info.address;
        let prev = self
            .world
            .transient_storage
            .get(&(address, key))
            .cloned()
            .unwrap_or_else(H256::zero);
        self.journal
            .record_transient_storage_change(self.savepoint, address, key, prev);
        self.world.transient_storage.insert((address, key), value);
        Ok(())
    }

    fn is_static(&self) -> bool {
        self.static_flag
    }

    fn exists(&self, address: &Address) -> Result<bool> {
        Ok(self.world.exists(address))
    }

    fn exists_and_not_null(&self, address: &Address) -> Result<bool> {
        Ok(self.world.exists(address) && !self.world.is_empty(address))
    }

    fn origin_balance(&self) -> Result<U256> {
        self.balance(&self.origin_info.address)
    }

    fn balance(&self, address: &Address) -> Result<U256> {
        Ok(self
            .world
            .account(address)
            .map(|a| a.balance)
            .unwrap_or_else(U256::zero))
    }

    fn blockhash(&mut self, number: &U256) -> H256 {
        let current = U256::from(self.env_info.number);
        if *number >= current || current - *number > U256::from(256) {
            return H256::zero();
        }
        let depth_from_head = (current - *number).as_u64() as usize;
        self.env_info
            .last_hashes
            .len()
            .checked_sub(depth_from_head)
            .and_then(|idx| self.env_info.last_hashes.get(idx))
            .cloned()
            .unwrap_or_else(H256::zero)
    }

    fn create(
        &mut self,
        gas: &U256,
        value: &U256,
        code: &[u8],
        address_scheme: CreateContractAddress,
        _trap: bool,
    ) -> std::result::Result<ContractCreateResult, TrapKind> {
        let (params, address) = self.build_create_params(gas, value, code, address_scheme);
        Err(TrapKind::Create(params, address))
    }

    fn calc_address(&self, code: &[u8], address_scheme: CreateContractAddress) -> Option<Address> {
        let sender = self.origin_info.address;
        let nonce = self.world.account(&sender).map(|a| a.nonce).unwrap_or(0);
        calc_create_address(&sender, address_scheme, code, nonce)
    }

    fn call(
        &mut self,
        gas: &U256,
        sender_address: &Address,
        receive_address: &Address,
        value: Option<U256>,
        data: &[u8],
        code_address: &Address,
        call_type: CallType,
        _trap: bool,
    ) -> std::result::Result<MessageCallResult, TrapKind> {
        let code = self.world.account(code_address).and_then(|a| a.code.clone());
        let code_hash = self.world.account(code_address).map(|a| a.code_hash());

        let action_value = match call_type {
            CallType::DelegateCall => ActionValue::Apparent(self.origin_info.value),
            _ => ActionValue::Transfer(value.unwrap_or_else(U256::zero)),
        };

        let params = ActionParams {
            code_address: *code_address,
            code_hash,
            address: *receive_address,
            sender: *sender_address,
            origin: self.origin_info.origin,
            gas: *gas,
            gas_price: self.origin_info.gas_price,
            value: action_value,
            code,
            data: Some(data.to_vec()),
            call_type,
            params_type: ParamsType::Separate,
        };

        Err(TrapKind::Call(params))
    }

    fn extcode(&self, address: &Address) -> Result<Option<Arc<Vec<u8>>>> {
        Ok(self.world.account(address).and_then(|a| a.code.clone()))
    }

    fn extcodehash(&self, address: &Address) -> Result<Option<H256>> {
        Ok(self.world.account(address).map(|a| a.code_hash()))
    }

    fn extcodesize(&self, address: &Address) -> Result<Option<usize>> {
        Ok(self
            .world
            .account(address)
            .map(|a| a.code.as_ref().map(|c| c.len()).unwrap_or(0)))
    }

    fn log(&mut self, topics: Vec<H256>, data: &[u8]) -> Result<()> {
        self.require_mutable()?;
        log::trace!(target: "evm", "LOG{} {:?}", topics.len(), self.origin_info.address);
        self.world.push_log(LogEntry {
            address: self.origin_info.address,
            topics,
            data: data.to_vec(),
        });
        Ok(())
    }

    fn suicide(&mut self, refund_address: &Address) -> Result<()> {
        self.require_mutable()?;
        let address = self.origin_info.address;
        let balance = self.balance(&address)?;

        if !balance.is_zero() {
            let refund_prev = self.balance(refund_address)?;
            self.journal
                .record_balance_change(self.savepoint, address, balance);
            self.journal
                .record_balance_change(self.savepoint, *refund_address, refund_prev);
            self.world.account_mut(&address).balance = U256::zero();
            self.world.account_mut(refund_address).balance = refund_prev + balance;
        }

        let marks_for_deletion =
            !self.schedule.eip6780_semantics || self.world.created_this_tx(&address);
        if marks_for_deletion && self.world.suicides.insert(address) {
            self.journal.record_suicide(self.savepoint, address);
        }
        Ok(())
    }

    fn schedule(&self) -> &Schedule {
        self.schedule
    }

    fn env_info(&self) -> &EnvInfo {
        self.env_info
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn depth(&self) -> usize {
        self.depth
    }

    fn add_sstore_refund(&mut self, value: usize) {
        let delta = value as i64;
        self.journal.record_refund_change(self.savepoint, delta);
        self.world.refund += delta;
    }

    fn sub_sstore_refund(&mut self, value: usize) {
        let delta = -(value as i64);
        self.journal.record_refund_change(self.savepoint, delta);
        self.world.refund += delta;
    }

    fn trace_next_instruction(&mut self, _pc: usize, _instruction: u8, _current_gas: U256) -> bool {
        log::enabled!(target: "evm_trace", log::Level::Trace)
    }

    fn trace_prepare_execute(
        &mut self,
        pc: usize,
        instruction: u8,
        gas_cost: U256,
        _mem_written: Option<(usize, usize)>,
        _store_written: Option<(U256, U256)>,
    ) {
        log::trace!(target: "evm_trace", "pc={} op={:#x} cost={}", pc, instruction, gas_cost);
    }

    fn trace_failed(&mut self) {
        log::trace!(target: "evm_trace", "step failed");
    }

    fn trace_executed(&mut self, gas_used: U256, stack_push: &[U256], _mem: &[u8]) {
        log::trace!(target: "evm_trace", "gas_used={} pushed={:?}", gas_used, stack_push);
    }

    fn al_is_enabled(&self) -> bool {
        self.world.access_list.is_enabled()
    }

    fn al_contains_storage_key(&self, address: &Address, key: &H256) -> bool {
        self.world.access_list.contains_storage_key(address, key)
    }

    fn al_insert_storage_key(&mut self, address: Address, key: H256) {
        if self.world.access_list.insert_storage_key(address, key) {
            self.journal
                .record_storage_key_warmed(self.savepoint, address, key);
        }
    }

    fn al_contains_address(&self, address: &Address) -> bool {
        self.world.access_list.contains_address(address)
    }

    fn al_insert_address(&mut self, address: Address) {
        if self.world.access_list.insert_address(address) {
            self.journal.record_address_warmed(self.savepoint, address);
        }
    }
}

/// `keccak(rlp([sender, nonce]))[12:]`, the `CREATE` address formula.
/// Exposed crate-wide so a top-level `CREATE` transaction (which has no
/// enclosing frame to ask `Ext::calc_address`) can compute its own target
/// address the same way.
pub(crate) fn create_address_from_sender_and_nonce(sender: &Address, nonce: u64) -> Address {
    let mut stream = rlp::RlpStream::new_list(2);
    stream.append(sender);
    stream.append(&nonce);
    let hash = keccak_hash::keccak(stream.as_raw());
    Address::from_slice(&hash[12..])
}

fn create_address_from_sender_salt_and_code_hash(sender: &Address, salt: H256, code: &[u8]) -> Address {
    let code_hash = keccak_hash::keccak(code);
    let mut buffer = [0u8; 85];
    buffer[0] = 0xff;
    buffer[1..21].copy_from_slice(sender.as_bytes());
    buffer[21..53].copy_from_slice(salt.as_bytes());
    buffer[53..85].copy_from_slice(code_hash.as_bytes());
    let hash = keccak_hash::keccak(&buffer[..]);
    Address::from_slice(&hash[12..])
}

/// Shared by `Externalities::create`/`calc_address`: both `CREATE2` and
/// `EOFCREATE` key off the same `sender ++ salt ++ keccak(code)` formula
/// (spec.md §4.3.6), so the two `CreateContractAddress` variants collapse to
/// one code path here.
fn calc_create_address(
    sender: &Address,
    scheme: CreateContractAddress,
    code: &[u8],
    nonce: u64,
) -> Option<Address> {
    match scheme {
        CreateContractAddress::FromSenderAndNonce => {
            Some(create_address_from_sender_and_nonce(sender, nonce))
        }
        CreateContractAddress::FromSenderSaltAndCodeHash(salt)
        | CreateContractAddress::FromSenderSaltAndCodeHashEof(salt) => Some(
            create_address_from_sender_salt_and_code_hash(sender, salt, code),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Journal;
    use vm::Schedule;

    fn ext<'a>(
        world: &'a mut World,
        journal: &'a mut Journal,
        checkpoint: usize,
        env_info: &'a EnvInfo,
        schedule: &'a Schedule,
        static_flag: bool,
    ) -> Externalities<'a> {
        let origin = OriginInfo::from_params(&ActionParams::default());
        Externalities::new(origin, world, journal, checkpoint, env_info, 0, schedule, static_flag, 1)
    }

    #[test]
    fn revert_rolls_back_transient_storage() {
        let mut world = World::new(true);
        let mut journal = Journal::new();
        let env_info = EnvInfo::default();
        let schedule = Schedule::new_cancun();
        let key = H256::zero();

        let checkpoint = journal.checkpoint();
        {
            let mut e = ext(&mut world, &mut journal, checkpoint, &env_info, &schedule, false);
            e.set_transient_storage(key, H256::from_low_u64_be(42)).unwrap();
        }
        assert_eq!(
            world
                .transient_storage
                .get(&(Address::zero(), key))
                .cloned()
                .unwrap_or_else(H256::zero),
            H256::from_low_u64_be(42)
        );

        journal.revert_to(&mut world, checkpoint);

        assert_eq!(
            world
                .transient_storage
                .get(&(Address::zero(), key))
                .cloned()
                .unwrap_or_else(H256::zero),
            H256::zero()
        );
    }

    #[test]
    fn set_storage_rejected_in_static_context() {
        let mut world = World::new(true);
        let mut journal = Journal::new();
        let env_info = EnvInfo::default();
        let schedule = Schedule::new_cancun();

        let checkpoint = journal.checkpoint();
        let mut e = ext(&mut world, &mut journal, checkpoint, &env_info, &schedule, true);
        let result = e.set_storage(H256::zero(), H256::from_low_u64_be(1));
        assert!(matches!(result, Err(Error::MutableCallInStaticContext)));
    }

    #[test]
    fn create2_address_is_deterministic_and_salt_sensitive() {
        let sender = Address::from_low_u64_be(0xAAAA);
        let code = vec![0x60, 0x01, 0x60, 0x00];
        let salt = H256::from_low_u64_be(1);
        let other_salt = H256::from_low_u64_be(2);

        let a1 = calc_create_address(
            &sender,
            CreateContractAddress::FromSenderSaltAndCodeHash(salt),
            &code,
            0,
        )
        .unwrap();
        let a2 = calc_create_address(
            &sender,
            CreateContractAddress::FromSenderSaltAndCodeHash(salt),
            &code,
            0,
        )
        .unwrap();
        let a3 = calc_create_address(
            &sender,
            CreateContractAddress::FromSenderSaltAndCodeHash(other_salt),
            &code,
            0,
        )
        .unwrap();

        assert_eq!(a1, a2);
        assert_ne!(a1, a3);
    }
}
