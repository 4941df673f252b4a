//! Host interface and shared types for the EVM core.
//!
//! This crate plays the role the teacher's `vm` crate plays for
//! `evm`/`ethcore`: it defines the contract between the interpreter and
//! whatever owns world state, without depending on how that state is
//! stored. `evm` depends on `vm`; `world`/`executor` implement it.

mod access_list;
mod action_params;
mod error;
mod return_data;
pub mod schedule;

pub use access_list::AccessList;
pub use action_params::{ActionParams, ActionValue, CallType, CreateContractAddress, ParamsType};
pub use error::{Error, ExecTrapError, ExecTrapResult, Result, TrapError, TrapKind, TrapResult};
pub use return_data::ReturnData;
pub use schedule::Schedule;

use ethereum_types::{Address, H256, U256};
use std::sync::Arc;

/// Externally-visible world-state and block context, as seen by one `Ext`
/// (spec.md §6 "Block context").
#[derive(Debug, Clone, PartialEq)]
pub struct EnvInfo {
    /// The block number.
    pub number: u64,
    /// The block author (`COINBASE`).
    pub author: Address,
    /// The block timestamp.
    pub timestamp: u64,
    /// The block difficulty, or `PREVRANDAO` post-Paris.
    pub difficulty: U256,
    /// The most recent 256 block hashes.
    pub last_hashes: Arc<Vec<H256>>,
    /// The block gas limit.
    pub gas_limit: U256,
    /// Total gas used in the block up to this transaction.
    pub gas_used: U256,
    /// EIP-1559 base fee, if active.
    pub base_fee: Option<U256>,
    /// EIP-4844 blob base fee, if active.
    pub blob_base_fee: Option<U256>,
    /// Versioned hashes of the blobs attached to the current transaction
    /// (EIP-4844 `BLOBHASH`).
    pub blob_versioned_hashes: Vec<H256>,
}

impl Default for EnvInfo {
    fn default() -> Self {
        EnvInfo {
            number: 0,
            author: Address::zero(),
            timestamp: 0,
            difficulty: U256::zero(),
            last_hashes: Arc::new(Vec::new()),
            gas_limit: U256::zero(),
            gas_used: U256::zero(),
            base_fee: None,
            blob_base_fee: None,
            blob_versioned_hashes: Vec::new(),
        }
    }
}

/// Result of a successfully-executed (non-trapped, non-errored) frame.
#[derive(Debug, PartialEq)]
pub enum GasLeft {
    /// Known gas left, no output produced (`STOP`, falling off the end of
    /// code, or an implicit halt).
    Known(U256),
    /// Gas left plus output that still needs to be copied out of memory
    /// (`RETURN`/`REVERT`).
    NeedsReturn {
        /// Remaining gas.
        gas_left: U256,
        /// Return data (already sliced from frame memory).
        data: ReturnData,
        /// Whether the state mutations performed by the frame should be
        /// applied (`true` for `RETURN`, `false` for `REVERT`).
        apply_state: bool,
    },
}

/// Outcome of driving a message-call child frame to completion, observed by
/// the parent (spec.md §4.3.5 step 6).
#[derive(Debug, PartialEq)]
pub enum MessageCallResult {
    /// Child frame succeeded.
    Success(U256, ReturnData),
    /// Child frame reverted.
    Reverted(U256, ReturnData),
    /// Child frame was never created (depth/balance check failed).
    Failed,
}

/// Outcome of driving a contract-creation child frame to completion
/// (spec.md §4.3.6).
#[derive(Debug, PartialEq)]
pub enum ContractCreateResult {
    /// Contract was successfully created.
    Created(Address, U256),
    /// Creation reverted, returning unused gas and the revert reason.
    Reverted(U256, ReturnData),
    /// Contract creation failed (depth/balance/collision check failed
    /// before a child frame was even created).
    Failed,
}

/// The host capability set the interpreter executes against (spec.md §6).
///
/// An `Ext` implementation owns exactly one frame's view onto world state:
/// its own address, its static-context flag, and a handle back to whatever
/// drives nested calls (see `TrapKind`/`TrapError`, and `executor::Executive`
/// in this workspace).
pub trait Ext {
    /// Returns the original storage value at `key` (the value as of the
    /// start of the transaction), used by the EIP-2200 SSTORE formula.
    fn initial_storage_at(&self, key: &H256) -> Result<H256>;

    /// Returns the storage value at `key` for the address this frame runs
    /// against.
    fn storage_at(&self, key: &H256) -> Result<H256>;

    /// Sets the storage value at `key`, failing in a static context.
    fn set_storage(&mut self, key: H256, value: H256) -> Result<()>;

    /// Returns the transient storage value at `key` (EIP-1153).
    fn transient_storage_at(&self, key: &H256) -> Result<H256>;

    /// Sets the transient storage value at `key`, failing in a static
    /// context. Never persisted; discarded at transaction end.
    fn set_transient_storage(&mut self, key: H256, value: H256) -> Result<()>;

    /// Whether this frame runs in a static (non-state-modifying) context.
    fn is_static(&self) -> bool;

    /// Determine whether an account exists.
    fn exists(&self, address: &Address) -> Result<bool>;

    /// Determine whether an account exists and is not null (zero balance,
    /// zero nonce, empty code).
    fn exists_and_not_null(&self, address: &Address) -> Result<bool>;

    /// Balance of the address executing this frame.
    fn origin_balance(&self) -> Result<U256>;

    /// Balance of the given account.
    fn balance(&self, address: &Address) -> Result<U256>;

    /// Returns the hash of one of the 256 most recent complete blocks.
    fn blockhash(&mut self, number: &U256) -> H256;

    /// Creates a new contract. `trap` selects between executing inline
    /// (used by tests/`FakeExt`) and trapping out to the driver loop (used
    /// in production, see `TrapKind::Create`).
    fn create(
        &mut self,
        gas: &U256,
        value: &U256,
        code: &[u8],
        address_scheme: CreateContractAddress,
        trap: bool,
    ) -> std::result::Result<ContractCreateResult, TrapKind>;

    /// Computes the would-be address of a `CREATE`/`CREATE2` without
    /// actually creating anything (used to warm the address before the gas
    /// check, spec.md §4.3.5 step 2).
    fn calc_address(&self, code: &[u8], address_scheme: CreateContractAddress) -> Option<Address>;

    /// Message call to another contract.
    fn call(
        &mut self,
        gas: &U256,
        sender_address: &Address,
        receive_address: &Address,
        value: Option<U256>,
        data: &[u8],
        code_address: &Address,
        call_type: CallType,
        trap: bool,
    ) -> std::result::Result<MessageCallResult, TrapKind>;

    /// Returns code at given address.
    fn extcode(&self, address: &Address) -> Result<Option<Arc<Vec<u8>>>>;

    /// Returns code hash at given address.
    fn extcodehash(&self, address: &Address) -> Result<Option<H256>>;

    /// Returns code size at given address.
    fn extcodesize(&self, address: &Address) -> Result<Option<usize>>;

    /// Creates log entry with given topics and data.
    fn log(&mut self, topics: Vec<H256>, data: &[u8]) -> Result<()>;

    /// Marks an account for destruction, transferring its balance to
    /// `refund_address` (spec.md §4.3.7).
    fn suicide(&mut self, refund_address: &Address) -> Result<()>;

    /// Returns schedule of the fork rules for this frame.
    fn schedule(&self) -> &Schedule;

    /// Returns block context.
    fn env_info(&self) -> &EnvInfo;

    /// Chain ID (`CHAINID`).
    fn chain_id(&self) -> u64;

    /// Current call depth.
    fn depth(&self) -> usize;

    /// Increases the refund counter by `value`.
    fn add_sstore_refund(&mut self, value: usize);

    /// Decreases the refund counter by `value`.
    fn sub_sstore_refund(&mut self, value: usize);

    /// Trace the next instruction; returning `false` disables further
    /// per-step tracing for the remainder of the frame.
    fn trace_next_instruction(&mut self, pc: usize, instruction: u8, current_gas: U256) -> bool;

    /// Trace prepared cost/memory/storage side effects before execution.
    fn trace_prepare_execute(
        &mut self,
        pc: usize,
        instruction: u8,
        gas_cost: U256,
        mem_written: Option<(usize, usize)>,
        store_written: Option<(U256, U256)>,
    );

    /// Trace that the current instruction failed.
    fn trace_failed(&mut self);

    /// Trace the instruction's effects after successful execution.
    fn trace_executed(&mut self, gas_used: U256, stack_push: &[U256], mem: &[u8]);

    /// Whether EIP-2929/2930 access-list accounting is active.
    fn al_is_enabled(&self) -> bool;

    /// Whether `(address, key)` has already been warmed this transaction.
    fn al_contains_storage_key(&self, address: &Address, key: &H256) -> bool;

    /// Warms `(address, key)` for the remainder of the transaction.
    fn al_insert_storage_key(&mut self, address: Address, key: H256);

    /// Whether `address` has already been warmed this transaction.
    fn al_contains_address(&self, address: &Address) -> bool;

    /// Warms `address` for the remainder of the transaction.
    fn al_insert_address(&mut self, address: Address);
}

/// A boxed, not-yet-run `Interpreter`, returned by `Interpreter::new` and
/// consumed by whoever drives the step loop.
pub trait Exec {
    /// Execute the action. Returns either the result, or `Err` carrying the
    /// trapped child-call/create params plus a boxed continuation
    /// (`ResumeCall`/`ResumeCreate`) to hand the child's result back to.
    fn exec(self: Box<Self>, ext: &mut dyn Ext) -> ExecTrapResult<GasLeft>;
}

/// Resumes a trapped `Exec` after its message-call child has finished.
pub trait ResumeCall {
    fn resume_call(self: Box<Self>, result: MessageCallResult) -> Box<dyn Exec>;
}

/// Resumes a trapped `Exec` after its contract-creation child has finished.
pub trait ResumeCreate {
    fn resume_create(self: Box<Self>, result: ContractCreateResult) -> Box<dyn Exec>;
}

pub mod tests;
