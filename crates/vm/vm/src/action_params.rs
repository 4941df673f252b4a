//! Message-call and contract-creation parameters.

use ethereum_types::{Address, H256, U256};
use parity_bytes::Bytes;
use std::sync::Arc;

/// Transaction value and the way it is observed by the callee.
#[derive(Clone, Copy, Debug)]
pub enum ActionValue {
    /// Value that should be transferred
    Transfer(U256),
    /// Value that should be observed by `CALLVALUE` without an actual transfer
    /// (used by `DELEGATECALL`, which keeps the parent's value and sender).
    Apparent(U256),
}

impl ActionValue {
    pub fn value(&self) -> U256 {
        match *self {
            ActionValue::Transfer(x) | ActionValue::Apparent(x) => x,
        }
    }
}

/// The kind of call that produced a frame; distinguishes sender/recipient/
/// code-address wiring and static-context inheritance (spec.md §4.3.5,
/// §9 "Inheritance for call variants").
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CallType {
    /// Not a call, but a regular `CREATE`/`CREATE2`/`EOFCREATE`.
    None,
    /// CALLCODE, same as Call but code is executed in the context of the
    /// caller and not on a different account.
    CallCode,
    /// Value transferred and executed in the context of the callee.
    Call,
    /// Value not transferred, but executed in the context of the caller.
    DelegateCall,
    /// Neither transferred nor executed in the context of the callee; any
    /// state modification fails.
    StaticCall,
}

/// How the contract address of a `CREATE`/`CREATE2`/`EOFCREATE` is derived.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CreateContractAddress {
    /// `keccak(rlp([sender, sender_nonce]))[12:]`
    FromSenderAndNonce,
    /// `keccak(0xff ++ sender ++ salt ++ keccak(init_code))[12:]`
    FromSenderSaltAndCodeHash(H256),
    /// Address of an account that is guaranteed to be brand new, used for
    /// EOF `EOFCREATE`'s deterministic address derivation.
    FromSenderSaltAndCodeHashEof(H256),
}

/// Indicates whether account's code or input data is to be used.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ParamsType {
    /// Provide call params separately.
    Separate,
    /// Embed call params into code.
    Embedded,
}

/// Action (call/create) input params. Everything required to execute a
/// message call or contract creation that a fresh `Interpreter` needs.
#[derive(Debug, Clone)]
pub struct ActionParams {
    /// Address of currently executed code.
    pub code_address: Address,
    /// Hash of currently executed code.
    pub code_hash: Option<H256>,
    /// Receive address. Usually equal to code_address, except when called
    /// using `CALLCODE`/`DELEGATECALL`.
    pub address: Address,
    /// Sender of current part of the transaction.
    pub sender: Address,
    /// Transaction initiator.
    pub origin: Address,
    /// Gas paid up front for transaction execution.
    pub gas: U256,
    /// Gas price.
    pub gas_price: U256,
    /// Transaction value.
    pub value: ActionValue,
    /// Code being executed.
    pub code: Option<Arc<Bytes>>,
    /// Input data.
    pub data: Option<Bytes>,
    /// Type of call.
    pub call_type: CallType,
    /// Param types encoding.
    pub params_type: ParamsType,
}

impl Default for ActionParams {
    /// Returns default `ActionParams` initialized with zeros.
    fn default() -> ActionParams {
        ActionParams {
            code_address: Address::zero(),
            code_hash: Some(keccak_hash::KECCAK_EMPTY),
            address: Address::zero(),
            sender: Address::zero(),
            origin: Address::zero(),
            gas: U256::zero(),
            gas_price: U256::zero(),
            value: ActionValue::Transfer(U256::zero()),
            code: None,
            data: None,
            call_type: CallType::None,
            params_type: ParamsType::Separate,
        }
    }
}
