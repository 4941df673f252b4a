//! A minimal in-memory `Ext` used by `evm`'s interpreter tests so that
//! opcode behavior can be exercised without pulling in the `world`/
//! `executor` crates.

use crate::{
    AccessList, ActionParams, CallType, ContractCreateResult, CreateContractAddress, EnvInfo,
    Error, Ext, ExecTrapResult, GasLeft, MessageCallResult, Result, Schedule, TrapKind,
};
use ethereum_types::{Address, H256, U256};
use std::collections::HashMap;
use std::sync::Arc;

/// One recorded call made through `FakeExt::call`.
#[derive(Debug, PartialEq, Clone)]
pub struct FakeCall {
    pub call_type: FakeCallType,
    pub gas: U256,
    pub sender_address: Address,
    pub receive_address: Address,
    pub value: Option<U256>,
    pub data: Vec<u8>,
    pub code_address: Address,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum FakeCallType {
    Call,
    Create,
}

/// Fake externalities for interpreter unit tests. Everything not touched by
/// a test simply keeps its default value.
pub struct FakeExt {
    pub schedule: Schedule,
    pub store: HashMap<H256, H256>,
    pub transient_store: HashMap<H256, H256>,
    pub initial_store: HashMap<H256, H256>,
    pub balances: HashMap<Address, U256>,
    pub blockhashes: HashMap<U256, H256>,
    pub codes: HashMap<Address, Arc<Vec<u8>>>,
    pub logs: Vec<(Vec<H256>, Vec<u8>)>,
    pub calls: Vec<FakeCall>,
    pub suicides: Vec<Address>,
    pub sstore_clears: isize,
    pub depth: usize,
    pub chain_id: u64,
    pub is_static: bool,
    pub tracing: bool,
    pub env_info: EnvInfo,
    pub access_list: AccessList,
}

impl Default for FakeExt {
    fn default() -> Self {
        FakeExt {
            schedule: Schedule::new_frontier(),
            store: HashMap::new(),
            transient_store: HashMap::new(),
            initial_store: HashMap::new(),
            balances: HashMap::new(),
            blockhashes: HashMap::new(),
            codes: HashMap::new(),
            logs: Vec::new(),
            calls: Vec::new(),
            suicides: Vec::new(),
            sstore_clears: 0,
            depth: 0,
            chain_id: 1,
            is_static: false,
            tracing: false,
            env_info: EnvInfo::default(),
            access_list: AccessList::new(false),
        }
    }
}

impl FakeExt {
    pub fn new() -> Self {
        FakeExt::default()
    }

    pub fn new_byzantium() -> Self {
        let mut ext = FakeExt::default();
        ext.schedule = Schedule::new_byzantium();
        ext
    }

    pub fn new_london() -> Self {
        let mut ext = FakeExt::default();
        ext.schedule = Schedule::new_london();
        ext.access_list = AccessList::new(true);
        ext
    }

    pub fn new_cancun() -> Self {
        let mut ext = FakeExt::default();
        ext.schedule = Schedule::new_cancun();
        ext.access_list = AccessList::new(true);
        ext
    }
}

impl Ext for FakeExt {
    fn initial_storage_at(&self, key: &H256) -> Result<H256> {
        Ok(self
            .initial_store
            .get(key)
            .cloned()
            .unwrap_or_else(H256::zero))
    }

    fn storage_at(&self, key: &H256) -> Result<H256> {
        Ok(self.store.get(key).cloned().unwrap_or_else(H256::zero))
    }

    fn set_storage(&mut self, key: H256, value: H256) -> Result<()> {
        if self.is_static {
            return Err(Error::MutableCallInStaticContext);
        }
        self.store.insert(key, value);
        Ok(())
    }

    fn transient_storage_at(&self, key: &H256) -> Result<H256> {
        Ok(self
            .transient_store
            .get(key)
            .cloned()
            .unwrap_or_else(H256::zero))
    }

    fn set_transient_storage(&mut self, key: H256, value: H256) -> Result<()> {
        if self.is_static {
            return Err(Error::MutableCallInStaticContext);
        }
        self.transient_store.insert(key, value);
        Ok(())
    }

    fn is_static(&self) -> bool {
        self.is_static
    }

    fn exists(&self, address: &Address) -> Result<bool> {
        Ok(self.balances.contains_key(address) || self.codes.contains_key(address))
    }

    fn exists_and_not_null(&self, address: &Address) -> Result<bool> {
        Ok(self
            .balances
            .get(address)
            .map(|b| !b.is_zero())
            .unwrap_or(false)
            || self.codes.contains_key(address))
    }

    fn origin_balance(&self) -> Result<U256> {
        Ok(U256::zero())
    }

    fn balance(&self, address: &Address) -> Result<U256> {
        Ok(self.balances.get(address).cloned().unwrap_or_else(U256::zero))
    }

    fn blockhash(&mut self, number: &U256) -> H256 {
        self.blockhashes.get(number).cloned().unwrap_or_else(H256::zero)
    }

    fn create(
        &mut self,
        _gas: &U256,
        _value: &U256,
        _code: &[u8],
        _address_scheme: CreateContractAddress,
        _trap: bool,
    ) -> std::result::Result<ContractCreateResult, TrapKind> {
        Ok(ContractCreateResult::Failed)
    }

    fn calc_address(&self, _code: &[u8], _address_scheme: CreateContractAddress) -> Option<Address> {
        None
    }

    fn call(
        &mut self,
        gas: &U256,
        sender_address: &Address,
        receive_address: &Address,
        value: Option<U256>,
        data: &[u8],
        code_address: &Address,
        _call_type: CallType,
        _trap: bool,
    ) -> std::result::Result<MessageCallResult, TrapKind> {
        self.calls.push(FakeCall {
            call_type: FakeCallType::Call,
            gas: *gas,
            sender_address: *sender_address,
            receive_address: *receive_address,
            value,
            data: data.to_vec(),
            code_address: *code_address,
        });
        Ok(MessageCallResult::Success(*gas, crate::ReturnData::empty()))
    }

    fn extcode(&self, address: &Address) -> Result<Option<Arc<Vec<u8>>>> {
        Ok(self.codes.get(address).cloned())
    }

    fn extcodehash(&self, address: &Address) -> Result<Option<H256>> {
        Ok(self.codes.get(address).map(|c| keccak_hash::keccak(&**c)))
    }

    fn extcodesize(&self, address: &Address) -> Result<Option<usize>> {
        Ok(self.codes.get(address).map(|c| c.len()))
    }

    fn log(&mut self, topics: Vec<H256>, data: &[u8]) -> Result<()> {
        self.logs.push((topics, data.to_vec()));
        Ok(())
    }

    fn suicide(&mut self, refund_address: &Address) -> Result<()> {
        self.suicides.push(*refund_address);
        Ok(())
    }

    fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    fn env_info(&self) -> &EnvInfo {
        &self.env_info
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn depth(&self) -> usize {
        self.depth
    }

    fn add_sstore_refund(&mut self, value: usize) {
        self.sstore_clears += value as isize;
    }

    fn sub_sstore_refund(&mut self, value: usize) {
        self.sstore_clears -= value as isize;
    }

    fn trace_next_instruction(&mut self, _pc: usize, _instruction: u8, _current_gas: U256) -> bool {
        self.tracing
    }

    fn trace_prepare_execute(
        &mut self,
        _pc: usize,
        _instruction: u8,
        _gas_cost: U256,
        _mem_written: Option<(usize, usize)>,
        _store_written: Option<(U256, U256)>,
    ) {
    }

    fn trace_failed(&mut self) {}

    fn trace_executed(&mut self, _gas_used: U256, _stack_push: &[U256], _mem: &[u8]) {}

    fn al_is_enabled(&self) -> bool {
        self.access_list.is_enabled()
    }

    fn al_contains_storage_key(&self, address: &Address, key: &H256) -> bool {
        self.access_list.contains_storage_key(address, key)
    }

    fn al_insert_storage_key(&mut self, address: Address, key: H256) {
        self.access_list.insert_storage_key(address, key);
    }

    fn al_contains_address(&self, address: &Address) -> bool {
        self.access_list.contains_address(address)
    }

    fn al_insert_address(&mut self, address: Address) {
        self.access_list.insert_address(address);
    }
}

/// Drives a freshly-`exec`ed frame to completion assuming it never traps
/// into a child call/create, converting the result into the gas-left value
/// callers care about in unit tests.
pub fn test_finalize(result: ExecTrapResult<GasLeft>) -> Result<U256> {
    match result {
        Ok(Ok(GasLeft::Known(gas))) => Ok(gas),
        Ok(Ok(GasLeft::NeedsReturn { gas_left, .. })) => Ok(gas_left),
        Ok(Err(err)) => Err(err),
        Err(_) => panic!("test_finalize: frame trapped into a child call/create"),
    }
}

/// Convenience constructor mirroring the teacher's inline `ActionParams`
/// literals in interpreter tests.
pub fn test_action_params() -> ActionParams {
    ActionParams::default()
}
