//! Drives one call/create frame to completion: builds `ActionParams` for a
//! child frame, constructs an `Interpreter` via `evm::Factory`, and on a
//! `TrapError::Call`/`TrapError::Create` recurses into itself before handing
//! the child's result back via `ResumeCall`/`ResumeCreate`. Plays the role
//! the teacher's (unretrieved) `executive.rs` plays for `State<Backend>`.

use ethcore_builtin::Precompile;
use ethereum_types::{Address, U256};
use parity_bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::Arc;
use vm::{
    ActionParams, ActionValue, CallType, ContractCreateResult, EnvInfo, Error as VmError, Exec,
    GasLeft, MessageCallResult, Result as VmResult, ReturnData, Schedule, TrapError,
};
use world::{Externalities, Journal, OriginInfo, World};

/// Cost of depositing one byte of returned code (EIP-170 onward).
const CONTRACT_CODE_GAS_PER_BYTE: u64 = 200;

/// Outcome of driving a frame, and everything it trapped into, to
/// completion (spec.md §6 "Outcome").
#[derive(Debug)]
pub enum Outcome {
    Success {
        gas_left: U256,
        output: Bytes,
        refund: i64,
    },
    Revert {
        gas_left: U256,
        output: Bytes,
    },
    Halt {
        reason: VmError,
    },
}

pub struct Executive<'a> {
    env_info: &'a EnvInfo,
    schedule: &'a Schedule,
    chain_id: u64,
    builtins: &'a BTreeMap<Address, Box<dyn Precompile>>,
    factory: evm::Factory,
}

impl<'a> Executive<'a> {
    pub fn new(
        env_info: &'a EnvInfo,
        schedule: &'a Schedule,
        chain_id: u64,
        builtins: &'a BTreeMap<Address, Box<dyn Precompile>>,
    ) -> Self {
        Executive {
            env_info,
            schedule,
            chain_id,
            builtins,
            factory: evm::Factory::new(evm::VMType::Interpreter, 32 * 1024),
        }
    }

    /// Drives a `CALL`/`CALLCODE`/`DELEGATECALL`/`STATICCALL` frame
    /// (spec.md §4.3.5). The caller (the top-level transaction driver, or
    /// this same function one level up) is responsible for the depth and
    /// balance pre-checks; by the time a frame traps here those have
    /// already passed.
    pub fn call(
        &self,
        world: &mut World,
        journal: &mut Journal,
        params: ActionParams,
        depth: usize,
        static_flag: bool,
    ) -> Outcome {
        if let Some(builtin) = self.builtins.get(&params.code_address) {
            return self.call_builtin(builtin.as_ref(), world, journal, params);
        }

        let checkpoint = journal.checkpoint();
        if let Err(reason) = self.transfer_value(world, journal, checkpoint, &params) {
            journal.revert_to(world, checkpoint);
            return Outcome::Halt { reason };
        }
        self.run(world, journal, params, depth, static_flag, checkpoint)
    }

    /// Drives a `CREATE`/`CREATE2`/`EOFCREATE` frame (spec.md §4.3.6):
    /// collision check, nonce bump, value transfer, run the init code, then
    /// deposit the returned code if it passes size/prefix/gas checks.
    pub fn create(
        &self,
        world: &mut World,
        journal: &mut Journal,
        params: ActionParams,
        depth: usize,
        static_flag: bool,
    ) -> Outcome {
        let checkpoint = journal.checkpoint();
        let address = params.address;
        let sender = params.sender;
        let init_code_len = params.code.as_ref().map(|c| c.len()).unwrap_or(0);

        if init_code_len > vm::schedule::MAX_INITCODE_SIZE {
            journal.revert_to(world, checkpoint);
            return Outcome::Halt {
                reason: VmError::CodeTooLarge,
            };
        }
        if world.exists(&address) && !world.is_empty(&address) {
            journal.revert_to(world, checkpoint);
            return Outcome::Halt {
                reason: VmError::CreateCollision,
            };
        }

        let sender_nonce = world.account(&sender).map(|a| a.nonce).unwrap_or(0);
        journal.record_nonce_change(checkpoint, sender, sender_nonce);
        world.account_mut(&sender).nonce = sender_nonce + 1;

        journal.record_account_created(checkpoint, address);
        world.account_mut(&address);
        world.note_created_this_tx(address);

        if let Err(reason) = self.transfer_value(world, journal, checkpoint, &params) {
            journal.revert_to(world, checkpoint);
            return Outcome::Halt { reason };
        }

        match self.run(world, journal, params, depth, static_flag, checkpoint) {
            Outcome::Success {
                gas_left,
                output,
                refund,
            } => self.deposit_code(world, journal, checkpoint, address, gas_left, output, refund),
            other => other,
        }
    }

    fn deposit_code(
        &self,
        world: &mut World,
        journal: &mut Journal,
        checkpoint: usize,
        address: Address,
        gas_left: U256,
        output: Bytes,
        refund: i64,
    ) -> Outcome {
        if !output.is_empty() && output[0] == 0xef && self.schedule.eip3541 {
            journal.revert_to(world, checkpoint);
            return Outcome::Halt {
                reason: VmError::InvalidContractPrefix,
            };
        }
        if output.len() > self.schedule.create_data_limit {
            journal.revert_to(world, checkpoint);
            return Outcome::Halt {
                reason: VmError::CodeTooLarge,
            };
        }
        let deposit_cost = U256::from(CONTRACT_CODE_GAS_PER_BYTE) * U256::from(output.len());
        if gas_left < deposit_cost {
            journal.revert_to(world, checkpoint);
            return Outcome::Halt {
                reason: VmError::OutOfGas,
            };
        }

        let prev_code = world.account(&address).and_then(|a| a.code.clone());
        journal.record_code_change(checkpoint, address, prev_code);
        world.account_mut(&address).code = Some(Arc::new(output.clone()));

        Outcome::Success {
            gas_left: gas_left - deposit_cost,
            output,
            refund,
        }
    }

    /// Moves `value` from `params.sender` to `params.address`, journaling
    /// both prior balances. `DELEGATECALL`'s `ActionValue::Apparent` never
    /// moves value, it only threads the enclosing frame's value through for
    /// `CALLVALUE`, so it is a no-op here.
    fn transfer_value(
        &self,
        world: &mut World,
        journal: &mut Journal,
        checkpoint: usize,
        params: &ActionParams,
    ) -> VmResult<()> {
        let value = match params.value {
            ActionValue::Transfer(value) => value,
            ActionValue::Apparent(_) => return Ok(()),
        };
        if value.is_zero() {
            return Ok(());
        }

        let sender_balance = world.account(&params.sender).map(|a| a.balance).unwrap_or_default();
        if sender_balance < value {
            return Err(VmError::Internal(
                "insufficient balance for value transfer".into(),
            ));
        }
        let receiver_balance = world
            .account(&params.address)
            .map(|a| a.balance)
            .unwrap_or_default();

        journal.record_balance_change(checkpoint, params.sender, sender_balance);
        journal.record_balance_change(checkpoint, params.address, receiver_balance);
        world.account_mut(&params.sender).balance = sender_balance - value;
        world.account_mut(&params.address).balance = receiver_balance + value;
        Ok(())
    }

    fn call_builtin(
        &self,
        builtin: &dyn Precompile,
        world: &mut World,
        journal: &mut Journal,
        params: ActionParams,
    ) -> Outcome {
        let checkpoint = journal.checkpoint();
        if let Err(reason) = self.transfer_value(world, journal, checkpoint, &params) {
            journal.revert_to(world, checkpoint);
            return Outcome::Halt { reason };
        }

        let input = params.data.unwrap_or_default();
        let cost = U256::from(builtin.gas_required(&input));
        if cost > params.gas {
            journal.revert_to(world, checkpoint);
            return Outcome::Halt {
                reason: VmError::OutOfGas,
            };
        }

        match builtin.execute(&input) {
            Ok(output) => {
                journal.commit(checkpoint);
                Outcome::Success {
                    gas_left: params.gas - cost,
                    output,
                    refund: 0,
                }
            }
            Err(message) => {
                journal.revert_to(world, checkpoint);
                Outcome::Halt {
                    reason: VmError::BuiltIn(message),
                }
            }
        }
    }

    /// Builds a fresh `Externalities` each loop iteration (so `world` and
    /// `journal` are free again for a recursive `call`/`create` while the
    /// child frame runs, rather than staying borrowed for the whole frame)
    /// and drives the interpreter loop, recursing on every
    /// `TrapError::Call`/`TrapError::Create` until the frame finishes.
    fn run(
        &self,
        world: &mut World,
        journal: &mut Journal,
        params: ActionParams,
        depth: usize,
        static_flag: bool,
        checkpoint: usize,
    ) -> Outcome {
        let origin_info = OriginInfo::from_params(&params);
        let mut exec: Box<dyn Exec> = self.factory.create(params, self.schedule, depth);

        loop {
            let mut ext = Externalities::new(
                origin_info,
                world,
                journal,
                checkpoint,
                self.env_info,
                depth,
                self.schedule,
                static_flag,
                self.chain_id,
            );

            match exec.exec(&mut ext) {
                Ok(Ok(GasLeft::Known(gas_left))) => {
                    journal.commit(checkpoint);
                    return Outcome::Success {
                        gas_left,
                        output: Vec::new(),
                        refund: world.refund(),
                    };
                }
                Ok(Ok(GasLeft::NeedsReturn {
                    gas_left,
                    data,
                    apply_state,
                })) => {
                    if apply_state {
                        journal.commit(checkpoint);
                        return Outcome::Success {
                            gas_left,
                            output: data.to_vec(),
                            refund: world.refund(),
                        };
                    }
                    let output = data.to_vec();
                    journal.revert_to(world, checkpoint);
                    return Outcome::Revert { gas_left, output };
                }
                Ok(Err(reason)) => {
                    journal.revert_to(world, checkpoint);
                    return Outcome::Halt { reason };
                }
                Err(TrapError::Call(child_params, resume)) => {
                    let child_static = static_flag || child_params.call_type == CallType::StaticCall;
                    let outcome = self.call(world, journal, child_params, depth + 1, child_static);
                    exec = resume.resume_call(outcome_to_message_result(outcome));
                }
                Err(TrapError::Create(child_params, new_address, resume)) => {
                    let outcome = self.create(world, journal, child_params, depth + 1, static_flag);
                    exec = resume.resume_create(outcome_to_create_result(outcome, new_address));
                }
            }
        }
    }
}

fn outcome_to_message_result(outcome: Outcome) -> MessageCallResult {
    match outcome {
        Outcome::Success { gas_left, output, .. } => {
            let len = output.len();
            MessageCallResult::Success(gas_left, ReturnData::new(output, 0, len))
        }
        Outcome::Revert { gas_left, output } => {
            let len = output.len();
            MessageCallResult::Reverted(gas_left, ReturnData::new(output, 0, len))
        }
        Outcome::Halt { .. } => MessageCallResult::Failed,
    }
}

fn outcome_to_create_result(outcome: Outcome, address: Address) -> ContractCreateResult {
    match outcome {
        Outcome::Success { gas_left, .. } => ContractCreateResult::Created(address, gas_left),
        Outcome::Revert { gas_left, output } => {
            let len = output.len();
            ContractCreateResult::Reverted(gas_left, ReturnData::new(output, 0, len))
        }
        Outcome::Halt { .. } => ContractCreateResult::Failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use vm::{ActionParams, ActionValue, CallType, EnvInfo, ParamsType, Schedule};
    use world::{Journal, World};

    fn env() -> EnvInfo {
        EnvInfo::default()
    }

    #[test]
    fn call_dispatches_to_identity_builtin() {
        let env_info = env();
        let schedule = Schedule::new_cancun();
        let builtins = ethcore_builtin::builtins();
        let executive = Executive::new(&env_info, &schedule, 1, &builtins);

        let mut world = World::new(true);
        let mut journal = Journal::new();

        let identity = ethereum_types::Address::from_low_u64_be(4);
        let params = ActionParams {
            code_address: identity,
            address: identity,
            gas: U256::from(1_000_000),
            value: ActionValue::Transfer(U256::zero()),
            data: Some(b"hello world".to_vec()),
            call_type: CallType::Call,
            params_type: ParamsType::Separate,
            ..ActionParams::default()
        };

        match executive.call(&mut world, &mut journal, params, 0, false) {
            Outcome::Success { output, .. } => assert_eq!(output, b"hello world".to_vec()),
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[test]
    fn call_transfers_value_to_codeless_account() {
        let env_info = env();
        let schedule = Schedule::new_cancun();
        let builtins: BTreeMap<ethereum_types::Address, Box<dyn Precompile>> = BTreeMap::new();
        let executive = Executive::new(&env_info, &schedule, 1, &builtins);

        let mut world = World::new(true);
        let mut journal = Journal::new();

        let sender = ethereum_types::Address::from_low_u64_be(0xA11CE);
        let receiver = ethereum_types::Address::from_low_u64_be(0xB0B);
        world.account_mut(&sender).balance = U256::from(1_000);

        let params = ActionParams {
            code_address: receiver,
            address: receiver,
            sender,
            gas: U256::from(100_000),
            value: ActionValue::Transfer(U256::from(400)),
            call_type: CallType::Call,
            params_type: ParamsType::Separate,
            ..ActionParams::default()
        };

        match executive.call(&mut world, &mut journal, params, 0, false) {
            Outcome::Success { .. } => {}
            other => panic!("expected success, got {:?}", other),
        }
        assert_eq!(world.account(&sender).unwrap().balance, U256::from(600));
        assert_eq!(world.account(&receiver).unwrap().balance, U256::from(400));
    }

    #[test]
    fn create_deploys_empty_runtime_code_and_bumps_nonce() {
        let env_info = env();
        let schedule = Schedule::new_cancun();
        let builtins: BTreeMap<ethereum_types::Address, Box<dyn Precompile>> = BTreeMap::new();
        let executive = Executive::new(&env_info, &schedule, 1, &builtins);

        let mut world = World::new(true);
        let mut journal = Journal::new();

        let sender = ethereum_types::Address::from_low_u64_be(0xA11CE);
        world.account_mut(&sender).balance = U256::from(1_000);

        let new_address = ethereum_types::Address::from_low_u64_be(0xC0DE);
        // PUSH1 0x00, PUSH1 0x00, RETURN: deploys zero-length runtime code.
        let init_code: Vec<u8> = vec![0x60, 0x00, 0x60, 0x00, 0xf3];

        let params = ActionParams {
            code_address: new_address,
            address: new_address,
            sender,
            gas: U256::from(200_000),
            value: ActionValue::Transfer(U256::zero()),
            code: Some(Arc::new(init_code)),
            call_type: CallType::None,
            params_type: ParamsType::Embedded,
            ..ActionParams::default()
        };

        match executive.create(&mut world, &mut journal, params, 0, false) {
            Outcome::Success { output, .. } => assert!(output.is_empty()),
            other => panic!("expected success, got {:?}", other),
        }
        assert_eq!(world.account(&sender).unwrap().nonce, 1);
        assert!(world.created_this_tx(&new_address));
        assert!(world.account(&new_address).unwrap().code.is_some());
    }

    #[test]
    fn create_collision_halts_without_running_init_code() {
        let env_info = env();
        let schedule = Schedule::new_cancun();
        let builtins: BTreeMap<ethereum_types::Address, Box<dyn Precompile>> = BTreeMap::new();
        let executive = Executive::new(&env_info, &schedule, 1, &builtins);

        let mut world = World::new(true);
        let mut journal = Journal::new();

        let sender = ethereum_types::Address::from_low_u64_be(0xA11CE);
        let existing = ethereum_types::Address::from_low_u64_be(0xC0DE);
        world.account_mut(&existing).balance = U256::from(1);

        let params = ActionParams {
            code_address: existing,
            address: existing,
            sender,
            gas: U256::from(50_000),
            value: ActionValue::Transfer(U256::zero()),
            code: Some(Arc::new(vec![0x00])),
            call_type: CallType::None,
            params_type: ParamsType::Embedded,
            ..ActionParams::default()
        };

        match executive.create(&mut world, &mut journal, params, 0, false) {
            Outcome::Halt { reason: VmError::CreateCollision } => {}
            other => panic!("expected CreateCollision halt, got {:?}", other),
        }
    }

    #[test]
    fn call_revert_rolls_back_storage_change() {
        let env_info = env();
        let schedule = Schedule::new_cancun();
        let builtins: BTreeMap<ethereum_types::Address, Box<dyn Precompile>> = BTreeMap::new();
        let executive = Executive::new(&env_info, &schedule, 1, &builtins);

        let mut world = World::new(true);
        let mut journal = Journal::new();

        let callee = ethereum_types::Address::from_low_u64_be(0xBEEF);
        world.account_mut(&callee).balance = U256::zero();
        // PUSH1 0x63 PUSH1 0x00 SSTORE PUSH1 0x00 PUSH1 0x00 REVERT: writes
        // slot 0 = 99, then unwinds.
        let code: Vec<u8> = vec![
            0x60, 0x63, 0x60, 0x00, 0x55, 0x60, 0x00, 0x60, 0x00, 0xfd,
        ];
        world.account_mut(&callee).code = Some(Arc::new(code.clone()));

        let params = ActionParams {
            code_address: callee,
            address: callee,
            gas: U256::from(100_000),
            value: ActionValue::Transfer(U256::zero()),
            code: Some(Arc::new(code)),
            call_type: CallType::Call,
            params_type: ParamsType::Separate,
            ..ActionParams::default()
        };

        match executive.call(&mut world, &mut journal, params, 0, false) {
            Outcome::Revert { .. } => {}
            other => panic!("expected revert, got {:?}", other),
        }
        assert_eq!(
            world.account(&callee).unwrap().storage_at(&ethereum_types::H256::zero()),
            ethereum_types::H256::zero()
        );
    }
}
