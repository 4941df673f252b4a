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

//! Rust VM implementation

#[macro_use]
mod informant;
mod gasometer;
mod memory;
mod shared_cache;
mod stack;

use bytes::Bytes;
use ethereum_types::{Address, BigEndianHash, H256, U256};
use hash::keccak;
use num_bigint::BigUint;
use std::{cmp, marker::PhantomData, sync::Arc};

use vm::{
    self, ActionParams, ActionValue, CallType, ContractCreateResult, CreateContractAddress,
    GasLeft, MessageCallResult, ParamsType, ReturnData, Schedule, TrapError, TrapKind,
};

use eof;
use evm::CostType;
use instructions::{self, Instruction, InstructionInfo};

pub use self::shared_cache::SharedCache;
use self::{
    gasometer::Gasometer,
    memory::Memory,
    stack::{Stack, VecStack},
};

use bit_set::BitSet;

const GASOMETER_PROOF: &str = "If gasometer is None, Err is immediately returned in step; this function is only called by step; qed";

type ProgramCounter = usize;

const ONE: U256 = U256([1, 0, 0, 0]);
const TWO: U256 = U256([2, 0, 0, 0]);
const TWO_POW_5: U256 = U256([0x20, 0, 0, 0]);
const TWO_POW_8: U256 = U256([0x100, 0, 0, 0]);
const TWO_POW_16: U256 = U256([0x10000, 0, 0, 0]);
const TWO_POW_24: U256 = U256([0x1000000, 0, 0, 0]);
const TWO_POW_64: U256 = U256([0, 0x1, 0, 0]); // 0x1 00000000 00000000
const TWO_POW_96: U256 = U256([0, 0x100000000, 0, 0]); //0x1 00000000 00000000 00000000
const TWO_POW_224: U256 = U256([0, 0, 0, 0x100000000]); //0x1 00000000 00000000 00000000 00000000 00000000 00000000 00000000
const TWO_POW_248: U256 = U256([0, 0, 0, 0x100000000000000]); //0x1 00000000 00000000 00000000 00000000 00000000 00000000 00000000 000000

/// Maximum depth of the EOF `CALLF`/`RETF` internal call stack, per
/// https://eips.ethereum.org/EIPS/eip-4750.
pub const MAX_EOF_CALL_STACK_SIZE: usize = 1024;

fn to_biguint(x: U256) -> BigUint {
    let mut bytes = [0u8; 32];
    x.to_little_endian(&mut bytes);
    BigUint::from_bytes_le(&bytes)
}

fn from_biguint(x: BigUint) -> U256 {
    let bytes = x.to_bytes_le();
    U256::from_little_endian(&bytes)
}

/// Abstraction over raw vector of Bytes. Easier state management of PC.
struct CodeReader {
    position: ProgramCounter,
    code: Arc<Bytes>,
}

impl CodeReader {
    /// Create new code reader - starting at position 0.
    fn new(code: Arc<Bytes>) -> Self {
        CodeReader { code, position: 0 }
    }

    /// Get `no_of_bytes` from code and convert to U256. Move PC
    fn read(&mut self, no_of_bytes: usize) -> U256 {
        let pos = self.position;
        self.position += no_of_bytes;
        let max = cmp::min(pos + no_of_bytes, self.code.len());
        U256::from(&self.code[pos..max])
    }

    fn len(&self) -> usize {
        self.code.len()
    }
}

enum InstructionResult<Gas> {
    Ok,
    UnusedGas(Gas),
    JumpToPosition(U256),
    StopExecutionNeedsReturn {
        /// Gas left.
        gas: Gas,
        /// Return data offset.
        init_off: U256,
        /// Return data size.
        init_size: U256,
        /// Apply or revert state changes.
        apply: bool,
    },
    /// Like `StopExecutionNeedsReturn`, but the returned bytes were already
    /// assembled (EOF `RETURNCONTRACT`'s deploy container plus aux data)
    /// rather than sliced straight out of frame memory.
    StopExecutionReturnBytes {
        /// Gas left.
        gas: Gas,
        /// Deployed code to apply.
        data: Bytes,
    },
    StopExecution,
    Trap(TrapKind),
}

/// ActionParams without code, so that it can be feed into CodeReader.
#[derive(Debug)]
struct InterpreterParams {
    /// Address of currently executed code.
    pub _code_address: Address,
    /// Hash of currently executed code.
    pub code_hash: Option<H256>,
    /// Receive address. Usually equal to code_address,
    /// except when called using CALLCODE.
    pub address: Address,
    /// Sender of current part of the transaction.
    pub sender: Address,
    /// Transaction initiator.
    pub origin: Address,
    /// Gas paid up front for transaction execution
    pub gas: U256,
    /// Gas price.
    pub gas_price: U256,
    /// Transaction value.
    pub value: ActionValue,
    /// Input data.
    pub data: Option<Bytes>,
    /// Type of call
    pub _call_type: CallType,
    /// Param types encoding
    pub _params_type: ParamsType,
}

impl From<ActionParams> for InterpreterParams {
    fn from(params: ActionParams) -> Self {
        InterpreterParams {
            _code_address: params.code_address,
            code_hash: params.code_hash,
            address: params.address,
            sender: params.sender,
            origin: params.origin,
            gas: params.gas,
            gas_price: params.gas_price,
            value: params.value,
            data: params.data,
            _call_type: params.call_type,
            _params_type: params.params_type,
        }
    }
}

/// Stepping result returned by interpreter.
pub enum InterpreterResult {
    /// The VM has already stopped.
    Stopped,
    /// The VM has just finished execution in the current step.
    Done(vm::Result<GasLeft>),
    /// The VM can continue to run.
    Continue,
    Trap(TrapKind),
}

/// Intepreter EVM implementation
pub struct Interpreter<Cost: CostType> {
    mem: Vec<u8>,
    cache: Arc<SharedCache>,
    params: InterpreterParams,
    reader: CodeReader,
    return_data: ReturnData,
    informant: informant::EvmInformant,
    do_trace: bool,
    done: bool,
    valid_jump_destinations: Option<Arc<BitSet>>,
    gasometer: Option<Gasometer<Cost>>,
    stack: VecStack<U256>,
    resume_output_range: Option<(U256, U256)>,
    resume_result: Option<InstructionResult<Cost>>,
    last_stack_ret_len: usize,
    /// Whether `params.code` is an EOF container (EIP-3540); gates which
    /// opcodes are legal and how `CALLF`/`RETF`/`JUMPF`, `RJUMP*` and the
    /// data section opcodes interpret the code stream.
    is_eof: bool,
    /// Code sections of the container, indexed by `CALLF`/`JUMPF`. Empty for
    /// legacy code.
    eof_sections: Vec<Arc<Bytes>>,
    /// Sub-containers, indexed by `EOFCREATE`/`RETURNCONTRACT`.
    eof_containers: Vec<Arc<Bytes>>,
    /// The container's data section, addressed by `DATALOAD`/`DATALOADN`/
    /// `DATASIZE`/`DATACOPY`.
    eof_data: Arc<Bytes>,
    /// Index of the code section currently executing.
    eof_section: usize,
    /// `CALLF` return addresses: `(caller_section, caller_position)`.
    eof_call_stack: Vec<(usize, usize)>,
    /// Set just before trapping out for `EXTCALL`/`EXTDELEGATECALL`/
    /// `EXTSTATICCALL`, so `resume_call` knows to apply EIP-7069's
    /// 0=success/1=revert/2=failure convention instead of the legacy
    /// 1=success/0=failure one.
    ext_call_pending: bool,
    _type: PhantomData<Cost>,
}

impl<Cost: 'static + CostType> vm::Exec for Interpreter<Cost> {
    fn exec(mut self: Box<Self>, ext: &mut dyn vm::Ext) -> vm::ExecTrapResult<GasLeft> {
        loop {
            let result = self.step(ext);
            match result {
                InterpreterResult::Continue => {}
                InterpreterResult::Done(value) => return Ok(value),
                InterpreterResult::Trap(trap) => match trap {
                    TrapKind::Call(params) => {
                        return Err(TrapError::Call(params, self));
                    }
                    TrapKind::Create(params, address) => {
                        return Err(TrapError::Create(params, address, self));
                    }
                },
                InterpreterResult::Stopped => panic!("Attempted to execute an already stopped VM."),
            }
        }
    }
}

impl<Cost: 'static + CostType> vm::ResumeCall for Interpreter<Cost> {
    fn resume_call(mut self: Box<Self>, result: MessageCallResult) -> Box<dyn vm::Exec> {
        {
            let this = &mut *self;
            let (out_off, out_size) = this.resume_output_range.take().expect("Box<ResumeCall> is obtained from a call opcode; resume_output_range is always set after those opcodes are executed; qed");
            let ext_call = std::mem::replace(&mut this.ext_call_pending, false);

            match result {
                MessageCallResult::Success(gas_left, data) => {
                    let output = this.mem.writeable_slice(out_off, out_size);
                    let len = cmp::min(output.len(), data.len());
                    output[..len].copy_from_slice(&data[..len]);

                    this.return_data = data;
                    this.stack.push(if ext_call { U256::zero() } else { U256::one() });
                    this.resume_result = Some(InstructionResult::UnusedGas(
                        Cost::from_u256(gas_left)
                            .expect("Gas left cannot be greater than current one"),
                    ));
                }
                MessageCallResult::Reverted(gas_left, data) => {
                    let output = this.mem.writeable_slice(out_off, out_size);
                    let len = cmp::min(output.len(), data.len());
                    output[..len].copy_from_slice(&data[..len]);

                    this.return_data = data;
                    this.stack.push(if ext_call { U256::one() } else { U256::zero() });
                    this.resume_result = Some(InstructionResult::UnusedGas(
                        Cost::from_u256(gas_left)
                            .expect("Gas left cannot be greater than current one"),
                    ));
                }
                MessageCallResult::Failed => {
                    this.stack.push(if ext_call { U256::from(2u8) } else { U256::zero() });
                    this.resume_result = Some(InstructionResult::Ok);
                }
            }
        }
        self
    }
}

impl<Cost: 'static + CostType> vm::ResumeCreate for Interpreter<Cost> {
    fn resume_create(mut self: Box<Self>, result: ContractCreateResult) -> Box<dyn vm::Exec> {
        match result {
            ContractCreateResult::Created(address, gas_left) => {
                self.stack.push(address_to_u256(address));
                self.resume_result = Some(InstructionResult::UnusedGas(
                    Cost::from_u256(gas_left).expect("Gas left cannot be greater."),
                ));
            }
            ContractCreateResult::Reverted(gas_left, return_data) => {
                self.stack.push(U256::zero());
                self.return_data = return_data;
                self.resume_result = Some(InstructionResult::UnusedGas(
                    Cost::from_u256(gas_left).expect("Gas left cannot be greater."),
                ));
            }
            ContractCreateResult::Failed => {
                self.stack.push(U256::zero());
                self.resume_result = Some(InstructionResult::Ok);
            }
        }
        self
    }
}

impl<Cost: CostType> Interpreter<Cost> {
    /// Create a new `Interpreter` instance with shared cache.
    pub fn new(
        mut params: ActionParams,
        cache: Arc<SharedCache>,
        schedule: &Schedule,
        depth: usize,
    ) -> Interpreter<Cost> {
        let code = params.code.take().expect("VM always called with code; qed");

        let mut is_eof = false;
        let mut eof_sections: Vec<Arc<Bytes>> = Vec::new();
        let mut eof_containers: Vec<Arc<Bytes>> = Vec::new();
        let mut eof_data: Arc<Bytes> = Arc::new(Vec::new());

        let reader = if schedule.have_eof && eof::has_eof_magic(&code) {
            match eof::parse(&code) {
                Ok(container) => {
                    eof_sections = container.code_sections.into_iter().map(Arc::new).collect();
                    eof_containers = container
                        .container_sections
                        .into_iter()
                        .map(Arc::new)
                        .collect();
                    eof_data = Arc::new(container.data);
                    is_eof = true;
                    CodeReader::new(eof_sections[0].clone())
                }
                Err(_) => CodeReader::new(code),
            }
        } else {
            CodeReader::new(code)
        };

        let params = InterpreterParams::from(params);
        let informant = informant::EvmInformant::new(depth);
        let valid_jump_destinations = None;
        let gasometer = Cost::from_u256(params.gas)
            .ok()
            .map(|gas| Gasometer::<Cost>::new(gas));
        let stack = VecStack::with_capacity(schedule.stack_limit, U256::zero());

        Interpreter {
            cache,
            params,
            reader,
            informant,
            valid_jump_destinations,
            gasometer,
            stack,
            done: false,
            // Overridden in `step_inner` based on
            // the result of `ext.trace_next_instruction`.
            do_trace: true,
            mem: Vec::new(),
            return_data: ReturnData::empty(),
            last_stack_ret_len: 0,
            resume_output_range: None,
            resume_result: None,
            is_eof,
            eof_sections,
            eof_containers,
            eof_data,
            eof_section: 0,
            eof_call_stack: Vec::with_capacity(MAX_EOF_CALL_STACK_SIZE),
            ext_call_pending: false,
            _type: PhantomData,
        }
    }

    /// Execute a single step on the VM.
    #[inline(always)]
    pub fn step(&mut self, ext: &mut dyn vm::Ext) -> InterpreterResult {
        if self.done {
            return InterpreterResult::Stopped;
        }

        let result = if self.gasometer.is_none() {
            InterpreterResult::Done(Err(vm::Error::OutOfGas))
        } else if self.reader.len() == 0 {
            let current_gas = self
                .gasometer
                .as_ref()
                .expect("Gasometer None case is checked above; qed")
                .current_gas
                .as_u256();
            InterpreterResult::Done(Ok(GasLeft::Known(current_gas)))
        } else {
            self.step_inner(ext)
        };

        if let &InterpreterResult::Done(_) = &result {
            self.done = true;
            self.informant.done();
        }
        result
    }

    /// Inner helper function for step.
    #[inline(always)]
    fn step_inner(&mut self, ext: &mut dyn vm::Ext) -> InterpreterResult {
        let result = match self.resume_result.take() {
            Some(result) => result,
            None => {
                let opcode = self.reader.code[self.reader.position];
                let instruction = Instruction::from_u8(opcode);
                self.reader.position += 1;

                // TODO: make compile-time removable if too much of a performance hit.
                self.do_trace = self.do_trace
                    && ext.trace_next_instruction(
                        self.reader.position - 1,
                        opcode,
                        self.gasometer
                            .as_mut()
                            .expect(GASOMETER_PROOF)
                            .current_gas
                            .as_u256(),
                    );

                let instruction = match instruction {
                    Some(i) => i,
                    None => {
                        return InterpreterResult::Done(Err(vm::Error::BadInstruction {
                            instruction: opcode,
                        }))
                    }
                };

                let info = instruction.info();
                self.last_stack_ret_len = info.ret;
                if let Err(e) = self.verify_instruction(ext, instruction, info) {
                    return InterpreterResult::Done(Err(e));
                };

                // Calculate gas cost
                let requirements = match self
                    .gasometer
                    .as_mut()
                    .expect(GASOMETER_PROOF)
                    .requirements(
                        ext,
                        instruction,
                        info,
                        &self.stack,
                        &self.params.address,
                        self.mem.size(),
                    ) {
                    Ok(t) => t,
                    Err(e) => return InterpreterResult::Done(Err(e)),
                };
                if self.do_trace {
                    ext.trace_prepare_execute(
                        self.reader.position - 1,
                        opcode,
                        requirements.gas_cost.as_u256(),
                        Self::mem_written(instruction, &self.stack),
                        Self::store_written(instruction, &self.stack),
                    );
                }
                if let Err(e) = self
                    .gasometer
                    .as_mut()
                    .expect(GASOMETER_PROOF)
                    .verify_gas(&requirements.gas_cost)
                {
                    if self.do_trace {
                        ext.trace_failed();
                    }
                    return InterpreterResult::Done(Err(e));
                }
                self.mem.expand(requirements.memory_required_size);
                self.gasometer
                    .as_mut()
                    .expect(GASOMETER_PROOF)
                    .current_mem_gas = requirements.memory_total_gas;
                self.gasometer.as_mut().expect(GASOMETER_PROOF).current_gas =
                    self.gasometer.as_mut().expect(GASOMETER_PROOF).current_gas
                        - requirements.gas_cost;

                evm_debug!({
                    self.informant.before_instruction(
                        self.reader.position,
                        instruction,
                        info,
                        &self.gasometer.as_mut().expect(GASOMETER_PROOF).current_gas,
                        &self.stack,
                    )
                });

                // Execute instruction
                let current_gas = self.gasometer.as_mut().expect(GASOMETER_PROOF).current_gas;

                evm_debug!({ self.informant.after_instruction(instruction) });
                match self.exec_instruction(current_gas, ext, instruction, requirements.provide_gas)
                {
                    Err(x) => {
                        if self.do_trace {
                            ext.trace_failed();
                        }
                        return InterpreterResult::Done(Err(x));
                    }
                    Ok(x) => x,
                }
            }
        };

        if let InstructionResult::Trap(trap) = result {
            return InterpreterResult::Trap(trap);
        }

        if let InstructionResult::UnusedGas(ref gas) = result {
            self.gasometer.as_mut().expect(GASOMETER_PROOF).current_gas =
                self.gasometer.as_mut().expect(GASOMETER_PROOF).current_gas + *gas;
        }

        if self.do_trace {
            ext.trace_executed(
                self.gasometer
                    .as_mut()
                    .expect(GASOMETER_PROOF)
                    .current_gas
                    .as_u256(),
                self.stack.peek_top(self.last_stack_ret_len),
                &self.mem,
            );
        }

        // Advance
        match result {
            InstructionResult::JumpToPosition(position) => {
                if self.valid_jump_destinations.is_none() {
                    self.valid_jump_destinations = Some(
                        self.cache
                            .jump_destinations(&self.params.code_hash, &self.reader.code),
                    );
                }
                let jump_destinations = self
                    .valid_jump_destinations
                    .as_ref()
                    .expect("jump_destinations are initialized on first jump; qed");
                let pos = match self.verify_jump(position, jump_destinations) {
                    Ok(x) => x,
                    Err(e) => return InterpreterResult::Done(Err(e)),
                };
                self.reader.position = pos;
            }
            InstructionResult::StopExecutionNeedsReturn {
                gas,
                init_off,
                init_size,
                apply,
            } => {
                let mem = std::mem::take(&mut self.mem);
                return InterpreterResult::Done(Ok(GasLeft::NeedsReturn {
                    gas_left: gas.as_u256(),
                    data: mem.into_return_data(init_off, init_size),
                    apply_state: apply,
                }));
            }
            InstructionResult::StopExecutionReturnBytes { gas, data } => {
                let len = data.len();
                return InterpreterResult::Done(Ok(GasLeft::NeedsReturn {
                    gas_left: gas.as_u256(),
                    data: ReturnData::new(data, 0, len),
                    apply_state: true,
                }));
            }
            InstructionResult::StopExecution => {
                return InterpreterResult::Done(Ok(GasLeft::Known(
                    self.gasometer
                        .as_mut()
                        .expect(GASOMETER_PROOF)
                        .current_gas
                        .as_u256(),
                )));
            }
            _ => {}
        }

        if self.reader.position >= self.reader.len() {
            return InterpreterResult::Done(Ok(GasLeft::Known(
                self.gasometer
                    .as_mut()
                    .expect(GASOMETER_PROOF)
                    .current_gas
                    .as_u256(),
            )));
        }

        InterpreterResult::Continue
    }

    fn verify_instruction(
        &self,
        ext: &dyn vm::Ext,
        instruction: Instruction,
        info: &InstructionInfo,
    ) -> vm::Result<()> {
        let schedule = ext.schedule();

        use instructions::*;
        if (instruction == DELEGATECALL && !schedule.have_delegate_call)
            || (instruction == CREATE2 && !schedule.have_create2)
            || (instruction == STATICCALL && !schedule.have_static_call)
            || ((instruction == RETURNDATACOPY || instruction == RETURNDATASIZE)
                && !schedule.have_return_data)
            || (instruction == REVERT && !schedule.have_revert)
            || ((instruction == SHL || instruction == SHR || instruction == SAR)
                && !schedule.have_bitwise_shifting)
            || (instruction == EXTCODEHASH && !schedule.have_extcodehash)
            || (instruction == CHAINID && !schedule.have_chain_id)
            || (instruction == SELFBALANCE && !schedule.have_selfbalance)
            || (instruction == BASEFEE && !schedule.eip3198)
            || (instruction == PUSH0 && !schedule.have_push0)
            || ((instruction == TLOAD || instruction == TSTORE)
                && !schedule.have_transient_storage)
            || (instruction == MCOPY && !schedule.have_mcopy)
            || ((instruction == BLOBHASH || instruction == BLOBBASEFEE)
                && !schedule.have_blob_fields)
        {
            return Err(vm::Error::BadInstruction {
                instruction: instruction as u8,
            });
        }

        if self.is_eof {
            if instruction.is_banned_in_eof() {
                return Err(vm::Error::BadInstruction {
                    instruction: instruction as u8,
                });
            }
        } else if instruction.is_eof_only() {
            return Err(vm::Error::BadInstruction {
                instruction: instruction as u8,
            });
        }

        if !self.stack.has(info.args) {
            Err(vm::Error::StackUnderflow {
                instruction: info.name,
                wanted: info.args,
                on_stack: self.stack.size(),
            })
        } else if self.stack.size() - info.args + info.ret > schedule.stack_limit {
            Err(vm::Error::OutOfStack {
                instruction: info.name,
                wanted: info.ret - info.args,
                limit: schedule.stack_limit,
            })
        } else {
            Ok(())
        }
    }

    fn mem_written(instruction: Instruction, stack: &dyn Stack<U256>) -> Option<(usize, usize)> {
        let read = |pos| stack.peek(pos).low_u64() as usize;
        let written = match instruction {
            instructions::MSTORE | instructions::MLOAD => Some((read(0), 32)),
            instructions::MSTORE8 => Some((read(0), 1)),
            instructions::CALLDATACOPY
            | instructions::CODECOPY
            | instructions::RETURNDATACOPY
            | instructions::DATACOPY => Some((read(0), read(2))),
            instructions::EXTCODECOPY => Some((read(1), read(3))),
            instructions::MCOPY => Some((read(0), read(2))),
            instructions::CALL | instructions::CALLCODE => Some((read(5), read(6))),
            instructions::DELEGATECALL | instructions::STATICCALL => Some((read(4), read(5))),
            _ => None,
        };

        match written {
            Some((offset, size)) if !memory::is_valid_range(offset, size) => None,
            written => written,
        }
    }

    fn store_written(instruction: Instruction, stack: &dyn Stack<U256>) -> Option<(U256, U256)> {
        match instruction {
            instructions::SSTORE => Some((*stack.peek(0), *stack.peek(1))),
            _ => None,
        }
    }

    /// Reads a 32-byte word starting at `big_id` from `data`, zero-padding
    /// past the end (shared by `CALLDATALOAD` and `DATALOAD`).
    fn read_word_zero_padded(data: &[u8], big_id: U256) -> U256 {
        let id = big_id.low_u64() as usize;
        let max = id.wrapping_add(32);
        let bound = cmp::min(data.len(), max);
        if id < bound && big_id < U256::from(data.len()) {
            let mut v = [0u8; 32];
            v[0..bound - id].clone_from_slice(&data[id..bound]);
            U256::from(&v[..])
        } else {
            U256::zero()
        }
    }

    fn exec_instruction(
        &mut self,
        gas: Cost,
        ext: &mut dyn vm::Ext,
        instruction: Instruction,
        provided: Option<Cost>,
    ) -> vm::Result<InstructionResult<Cost>> {
        match instruction {
            instructions::JUMP => {
                let jump = self.stack.pop_back();
                return Ok(InstructionResult::JumpToPosition(jump));
            }
            instructions::JUMPI => {
                let jump = self.stack.pop_back();
                let condition = self.stack.pop_back();
                if !condition.is_zero() {
                    return Ok(InstructionResult::JumpToPosition(jump));
                }
            }
            instructions::JUMPDEST => {
                // ignore
            }
            instructions::RJUMP => {
                let raw = self.reader.read(2).low_u32() as u16 as i16;
                self.reader.position = (self.reader.position as i64 + raw as i64) as usize;
            }
            instructions::RJUMPI => {
                let condition = self.stack.pop_back();
                let raw = self.reader.read(2).low_u32() as u16 as i16;
                if !condition.is_zero() {
                    self.reader.position = (self.reader.position as i64 + raw as i64) as usize;
                }
            }
            instructions::RJUMPV => {
                let case = self.stack.pop_back();
                let max_index = self.reader.read(1).low_u32() as usize;
                let mut target_offset: i64 = 0;
                for i in 0..=max_index {
                    let raw = self.reader.read(2).low_u32() as u16 as i16;
                    if case == U256::from(i) {
                        target_offset = raw as i64;
                    }
                }
                self.reader.position = (self.reader.position as i64 + target_offset) as usize;
            }
            instructions::CALLF => {
                let section_index = self.reader.read(2).low_u32() as usize;
                if self.eof_call_stack.len() >= MAX_EOF_CALL_STACK_SIZE {
                    return Err(vm::Error::OutOfSubStack {
                        wanted: 1,
                        limit: MAX_EOF_CALL_STACK_SIZE,
                    });
                }
                let target = self
                    .eof_sections
                    .get(section_index)
                    .ok_or(vm::Error::BadInstruction {
                        instruction: instructions::CALLF as u8,
                    })?
                    .clone();
                self.eof_call_stack
                    .push((self.eof_section, self.reader.position));
                self.eof_section = section_index;
                self.reader = CodeReader::new(target);
            }
            instructions::RETF => match self.eof_call_stack.pop() {
                Some((section, pos)) => {
                    self.eof_section = section;
                    let mut reader = CodeReader::new(self.eof_sections[section].clone());
                    reader.position = pos;
                    self.reader = reader;
                }
                None => return Ok(InstructionResult::StopExecution),
            },
            instructions::JUMPF => {
                let section_index = self.reader.read(2).low_u32() as usize;
                let target = self
                    .eof_sections
                    .get(section_index)
                    .ok_or(vm::Error::BadInstruction {
                        instruction: instructions::JUMPF as u8,
                    })?
                    .clone();
                self.eof_section = section_index;
                self.reader = CodeReader::new(target);
            }
            instructions::DUPN => {
                let position = self.reader.read(1).low_u32() as usize;
                if !self.stack.has(position + 1) {
                    return Err(vm::Error::StackUnderflow {
                        instruction: instruction.info().name,
                        wanted: position + 1,
                        on_stack: self.stack.size(),
                    });
                }
                let val = *self.stack.peek(position);
                self.stack.push(val);
            }
            instructions::SWAPN => {
                let position = self.reader.read(1).low_u32() as usize + 1;
                if !self.stack.has(position + 1) {
                    return Err(vm::Error::StackUnderflow {
                        instruction: instruction.info().name,
                        wanted: position + 1,
                        on_stack: self.stack.size(),
                    });
                }
                self.stack.swap_with_top(position);
            }
            instructions::EXCHANGE => {
                let imm = self.reader.read(1).low_u32() as u8;
                let n = (imm >> 4) as usize + 1;
                let m = (imm & 0x0f) as usize + 1;
                if !self.stack.has(n + m + 1) {
                    return Err(vm::Error::StackUnderflow {
                        instruction: instruction.info().name,
                        wanted: n + m + 1,
                        on_stack: self.stack.size(),
                    });
                }
                self.stack.swap(n, n + m);
            }
            instructions::DATALOAD => {
                let offset = self.stack.pop_back();
                let word = Self::read_word_zero_padded(&self.eof_data, offset);
                self.stack.push(word);
            }
            instructions::DATALOADN => {
                let offset = self.reader.read(2);
                let word = Self::read_word_zero_padded(&self.eof_data, offset);
                self.stack.push(word);
            }
            instructions::DATASIZE => {
                self.stack.push(U256::from(self.eof_data.len()));
            }
            instructions::DATACOPY => {
                Self::copy_data_to_memory(&mut self.mem, &mut self.stack, &self.eof_data);
            }
            instructions::EOFCREATE => {
                let container_index = self.reader.read(1).low_u32() as usize;
                let value = self.stack.pop_back();
                let input_off = self.stack.pop_back();
                let input_size = self.stack.pop_back();
                let salt = self.stack.pop_back();

                let create_gas = provided.expect("`provided` comes through Self::exec from `Gasometer::get_gas_cost_mem`; `gas_gas_mem_cost` guarantees `Some` when instruction is `EOFCREATE`; qed");

                if ext.is_static() {
                    return Err(vm::Error::MutableCallInStaticContext);
                }

                self.return_data = ReturnData::empty();

                let can_create = ext.balance(&self.params.address)? >= value
                    && ext.depth() < ext.schedule().max_depth;
                if !can_create {
                    self.stack.push(U256::zero());
                    return Ok(InstructionResult::UnusedGas(create_gas));
                }

                let sub_container = self
                    .eof_containers
                    .get(container_index)
                    .ok_or(vm::Error::BadInstruction {
                        instruction: instructions::EOFCREATE as u8,
                    })?
                    .clone();
                let mut init_code = (*sub_container).clone();
                init_code.extend_from_slice(self.mem.read_slice(input_off, input_size));

                let address_scheme =
                    CreateContractAddress::FromSenderSaltAndCodeHashEof(BigEndianHash::from_uint(&salt));

                if let Some(contract_address) = ext.calc_address(&init_code, address_scheme) {
                    ext.al_insert_address(contract_address);
                }

                let create_result = ext.create(
                    &create_gas.as_u256(),
                    &value,
                    &init_code,
                    address_scheme,
                    true,
                );
                return match create_result {
                    Ok(ContractCreateResult::Created(address, gas_left)) => {
                        self.stack.push(address_to_u256(address));
                        Ok(InstructionResult::UnusedGas(
                            Cost::from_u256(gas_left).expect("Gas left cannot be greater."),
                        ))
                    }
                    Ok(ContractCreateResult::Reverted(gas_left, return_data)) => {
                        self.stack.push(U256::zero());
                        self.return_data = return_data;
                        Ok(InstructionResult::UnusedGas(
                            Cost::from_u256(gas_left).expect("Gas left cannot be greater."),
                        ))
                    }
                    Ok(ContractCreateResult::Failed) => {
                        self.stack.push(U256::zero());
                        Ok(InstructionResult::Ok)
                    }
                    Err(trap) => Ok(InstructionResult::Trap(trap)),
                };
            }
            instructions::RETURNCONTRACT => {
                let container_index = self.reader.read(1).low_u32() as usize;
                let aux_off = self.stack.pop_back();
                let aux_size = self.stack.pop_back();

                let template = self
                    .eof_containers
                    .get(container_index)
                    .ok_or(vm::Error::BadInstruction {
                        instruction: instructions::RETURNCONTRACT as u8,
                    })?
                    .clone();
                let mut deployed = (*template).clone();
                deployed.extend_from_slice(self.mem.read_slice(aux_off, aux_size));

                return Ok(InstructionResult::StopExecutionReturnBytes {
                    gas,
                    data: deployed,
                });
            }
            instructions::CREATE | instructions::CREATE2 => {
                let endowment = self.stack.pop_back();
                let init_off = self.stack.pop_back();
                let init_size = self.stack.pop_back();
                let address_scheme = match instruction {
                    instructions::CREATE => CreateContractAddress::FromSenderAndNonce,
                    instructions::CREATE2 => CreateContractAddress::FromSenderSaltAndCodeHash(
                        BigEndianHash::from_uint(&self.stack.pop_back()),
                    ),
                    _ => unreachable!("instruction can only be CREATE/CREATE2 checked above; qed"),
                };

                let create_gas = provided.expect("`provided` comes through Self::exec from `Gasometer::get_gas_cost_mem`; `gas_gas_mem_cost` guarantees `Some` when instruction is `CALL`/`CALLCODE`/`DELEGATECALL`/`CREATE`; this is `CREATE`; qed");

                if ext.is_static() {
                    return Err(vm::Error::MutableCallInStaticContext);
                }

                // clear return data buffer before creating new call frame.
                self.return_data = ReturnData::empty();

                let can_create = ext.balance(&self.params.address)? >= endowment
                    && ext.depth() < ext.schedule().max_depth;
                if !can_create {
                    self.stack.push(U256::zero());
                    return Ok(InstructionResult::UnusedGas(create_gas));
                }

                let contract_address = {
                    let contract_code = self.mem.read_slice(init_off, init_size);
                    ext.calc_address(contract_code, address_scheme)
                };

                if let Some(contract_address) = contract_address {
                    ext.al_insert_address(contract_address);
                }

                let contract_code = self.mem.read_slice(init_off, init_size);

                let create_result = ext.create(
                    &create_gas.as_u256(),
                    &endowment,
                    contract_code,
                    address_scheme,
                    true,
                );
                return match create_result {
                    Ok(ContractCreateResult::Created(address, gas_left)) => {
                        self.stack.push(address_to_u256(address));
                        Ok(InstructionResult::UnusedGas(
                            Cost::from_u256(gas_left).expect("Gas left cannot be greater."),
                        ))
                    }
                    Ok(ContractCreateResult::Reverted(gas_left, return_data)) => {
                        self.stack.push(U256::zero());
                        self.return_data = return_data;
                        Ok(InstructionResult::UnusedGas(
                            Cost::from_u256(gas_left).expect("Gas left cannot be greater."),
                        ))
                    }
                    Ok(ContractCreateResult::Failed) => {
                        self.stack.push(U256::zero());
                        Ok(InstructionResult::Ok)
                    }
                    Err(trap) => Ok(InstructionResult::Trap(trap)),
                };
            }
            instructions::CALL
            | instructions::CALLCODE
            | instructions::DELEGATECALL
            | instructions::STATICCALL => {
                assert!(
                    ext.schedule().call_value_transfer_gas > ext.schedule().call_stipend,
                    "overflow possible"
                );

                self.stack.pop_back();
                let call_gas = provided.expect("`provided` comes through Self::exec from `Gasometer::get_gas_cost_mem`; `gas_gas_mem_cost` guarantees `Some` when instruction is `CALL`/`CALLCODE`/`DELEGATECALL`; this is one of `CALL`/`CALLCODE`/`DELEGATECALL`; qed");
                let code_address = self.stack.pop_back();
                let code_address = u256_to_address(&code_address);

                let value = if instruction == instructions::DELEGATECALL {
                    None
                } else if instruction == instructions::STATICCALL {
                    Some(U256::zero())
                } else {
                    Some(self.stack.pop_back())
                };

                let in_off = self.stack.pop_back();
                let in_size = self.stack.pop_back();
                let out_off = self.stack.pop_back();
                let out_size = self.stack.pop_back();

                // Add stipend (only CALL|CALLCODE when value > 0)
                let call_gas = call_gas
                    .overflow_add(value.map_or_else(
                        || Cost::from(0),
                        |val| match val.is_zero() {
                            false => Cost::from(ext.schedule().call_stipend),
                            true => Cost::from(0),
                        },
                    ))
                    .0;

                ext.al_insert_address(code_address);

                // Get sender & receive addresses, check if we have balance
                let (sender_address, receive_address, has_balance, call_type) = match instruction {
                    instructions::CALL => {
                        if ext.is_static() && value.is_some_and(|v| !v.is_zero()) {
                            return Err(vm::Error::MutableCallInStaticContext);
                        }
                        let has_balance = ext.balance(&self.params.address)?
                            >= value.expect("value set for all but delegate call; qed");
                        (
                            &self.params.address,
                            &code_address,
                            has_balance,
                            CallType::Call,
                        )
                    }
                    instructions::CALLCODE => {
                        let has_balance = ext.balance(&self.params.address)?
                            >= value.expect("value set for all but delegate call; qed");
                        (
                            &self.params.address,
                            &self.params.address,
                            has_balance,
                            CallType::CallCode,
                        )
                    }
                    instructions::DELEGATECALL => (
                        &self.params.sender,
                        &self.params.address,
                        true,
                        CallType::DelegateCall,
                    ),
                    instructions::STATICCALL => (
                        &self.params.address,
                        &code_address,
                        true,
                        CallType::StaticCall,
                    ),
                    _ => panic!("Unexpected instruction {:?} in CALL branch.", instruction),
                };

                // clear return data buffer before creating new call frame.
                self.return_data = ReturnData::empty();

                let can_call = has_balance && ext.depth() < ext.schedule().max_depth;
                if !can_call {
                    self.stack.push(U256::zero());
                    return Ok(InstructionResult::UnusedGas(call_gas));
                }

                let call_result = {
                    let input = self.mem.read_slice(in_off, in_size);
                    ext.call(
                        &call_gas.as_u256(),
                        sender_address,
                        receive_address,
                        value,
                        input,
                        &code_address,
                        call_type,
                        true,
                    )
                };

                self.resume_output_range = Some((out_off, out_size));

                return match call_result {
                    Ok(MessageCallResult::Success(gas_left, data)) => {
                        let output = self.mem.writeable_slice(out_off, out_size);
                        let len = cmp::min(output.len(), data.len());
                        output[..len].copy_from_slice(&data[..len]);

                        self.stack.push(U256::one());
                        self.return_data = data;
                        Ok(InstructionResult::UnusedGas(
                            Cost::from_u256(gas_left)
                                .expect("Gas left cannot be greater than current one"),
                        ))
                    }
                    Ok(MessageCallResult::Reverted(gas_left, data)) => {
                        let output = self.mem.writeable_slice(out_off, out_size);
                        let len = cmp::min(output.len(), data.len());
                        output[..len].copy_from_slice(&data[..len]);

                        self.stack.push(U256::zero());
                        self.return_data = data;
                        Ok(InstructionResult::UnusedGas(
                            Cost::from_u256(gas_left)
                                .expect("Gas left cannot be greater than current one"),
                        ))
                    }
                    Ok(MessageCallResult::Failed) => {
                        self.stack.push(U256::zero());
                        Ok(InstructionResult::Ok)
                    }
                    Err(trap) => Ok(InstructionResult::Trap(trap)),
                };
            }
            instructions::EXTCALL | instructions::EXTDELEGATECALL | instructions::EXTSTATICCALL => {
                let address = u256_to_address(&self.stack.pop_back());
                let in_off = self.stack.pop_back();
                let in_size = self.stack.pop_back();
                let value = if instruction == instructions::EXTCALL {
                    Some(self.stack.pop_back())
                } else if instruction == instructions::EXTSTATICCALL {
                    Some(U256::zero())
                } else {
                    None
                };

                let call_gas = provided.expect("`provided` comes through Self::exec from `Gasometer::get_gas_cost_mem`; `gas_gas_mem_cost` guarantees `Some` when instruction is `EXTCALL`/`EXTDELEGATECALL`/`EXTSTATICCALL`; qed");

                ext.al_insert_address(address);

                let (sender_address, receive_address, has_balance, call_type) = match instruction {
                    instructions::EXTCALL => {
                        if ext.is_static() && value.is_some_and(|v| !v.is_zero()) {
                            return Err(vm::Error::MutableCallInStaticContext);
                        }
                        let has_balance = ext.balance(&self.params.address)?
                            >= value.expect("value set for EXTCALL; qed");
                        (&self.params.address, &address, has_balance, CallType::Call)
                    }
                    instructions::EXTDELEGATECALL => (
                        &self.params.sender,
                        &self.params.address,
                        true,
                        CallType::DelegateCall,
                    ),
                    instructions::EXTSTATICCALL => {
                        (&self.params.address, &address, true, CallType::StaticCall)
                    }
                    _ => panic!("Unexpected instruction {:?} in EXTCALL branch.", instruction),
                };

                self.return_data = ReturnData::empty();

                let can_call = has_balance && ext.depth() < ext.schedule().max_depth;
                if !can_call {
                    self.stack.push(U256::from(2u8));
                    return Ok(InstructionResult::UnusedGas(call_gas));
                }

                self.ext_call_pending = true;
                let call_result = {
                    let input = self.mem.read_slice(in_off, in_size);
                    ext.call(
                        &call_gas.as_u256(),
                        sender_address,
                        receive_address,
                        value,
                        input,
                        &address,
                        call_type,
                        true,
                    )
                };

                self.resume_output_range = Some((U256::zero(), U256::zero()));

                return match call_result {
                    Ok(MessageCallResult::Success(gas_left, data)) => {
                        self.return_data = data;
                        self.stack.push(U256::zero());
                        Ok(InstructionResult::UnusedGas(
                            Cost::from_u256(gas_left)
                                .expect("Gas left cannot be greater than current one"),
                        ))
                    }
                    Ok(MessageCallResult::Reverted(gas_left, data)) => {
                        self.return_data = data;
                        self.stack.push(U256::one());
                        Ok(InstructionResult::UnusedGas(
                            Cost::from_u256(gas_left)
                                .expect("Gas left cannot be greater than current one"),
                        ))
                    }
                    Ok(MessageCallResult::Failed) => {
                        self.stack.push(U256::from(2u8));
                        Ok(InstructionResult::Ok)
                    }
                    Err(trap) => Ok(InstructionResult::Trap(trap)),
                };
            }
            instructions::RETURN => {
                let init_off = self.stack.pop_back();
                let init_size = self.stack.pop_back();

                return Ok(InstructionResult::StopExecutionNeedsReturn {
                    gas,
                    init_off,
                    init_size,
                    apply: true,
                });
            }
            instructions::REVERT => {
                let init_off = self.stack.pop_back();
                let init_size = self.stack.pop_back();

                return Ok(InstructionResult::StopExecutionNeedsReturn {
                    gas,
                    init_off,
                    init_size,
                    apply: false,
                });
            }
            instructions::STOP => {
                return Ok(InstructionResult::StopExecution);
            }
            instructions::SUICIDE => {
                let address = u256_to_address(&self.stack.pop_back());
                ext.al_insert_address(address);
                ext.suicide(&address)?;
                return Ok(InstructionResult::StopExecution);
            }
            instructions::LOG0
            | instructions::LOG1
            | instructions::LOG2
            | instructions::LOG3
            | instructions::LOG4 => {
                let no_of_topics = instruction
                    .log_topics()
                    .expect("log_topics always return some for LOG* instructions; qed");

                let offset = self.stack.pop_back();
                let size = self.stack.pop_back();
                let topics = self
                    .stack
                    .pop_n(no_of_topics)
                    .iter()
                    .map(BigEndianHash::from_uint)
                    .collect();
                ext.log(topics, self.mem.read_slice(offset, size))?;
            }
            instructions::PUSH0 => {
                self.stack.push(U256::zero());
            }
            instructions::PUSH1
            | instructions::PUSH2
            | instructions::PUSH3
            | instructions::PUSH4
            | instructions::PUSH5
            | instructions::PUSH6
            | instructions::PUSH7
            | instructions::PUSH8
            | instructions::PUSH9
            | instructions::PUSH10
            | instructions::PUSH11
            | instructions::PUSH12
            | instructions::PUSH13
            | instructions::PUSH14
            | instructions::PUSH15
            | instructions::PUSH16
            | instructions::PUSH17
            | instructions::PUSH18
            | instructions::PUSH19
            | instructions::PUSH20
            | instructions::PUSH21
            | instructions::PUSH22
            | instructions::PUSH23
            | instructions::PUSH24
            | instructions::PUSH25
            | instructions::PUSH26
            | instructions::PUSH27
            | instructions::PUSH28
            | instructions::PUSH29
            | instructions::PUSH30
            | instructions::PUSH31
            | instructions::PUSH32 => {
                let bytes = instruction
                    .push_bytes()
                    .expect("push_bytes always return some for PUSH* instructions");
                let val = self.reader.read(bytes);
                self.stack.push(val);
            }
            instructions::MLOAD => {
                let word = self.mem.read(self.stack.pop_back());
                self.stack.push(word);
            }
            instructions::MSTORE => {
                let offset = self.stack.pop_back();
                let word = self.stack.pop_back();
                Memory::write(&mut self.mem, offset, word);
            }
            instructions::MSTORE8 => {
                let offset = self.stack.pop_back();
                let byte = self.stack.pop_back();
                self.mem.write_byte(offset, byte);
            }
            instructions::MSIZE => {
                self.stack.push(U256::from(self.mem.size()));
            }
            instructions::MCOPY => {
                let dest_offset = self.stack.pop_back();
                let source_offset = self.stack.pop_back();
                let size = self.stack.pop_back();
                self.mem.copy_within(dest_offset, source_offset, size);
            }
            instructions::SHA3 => {
                let offset = self.stack.pop_back();
                let size = self.stack.pop_back();
                let k = keccak(self.mem.read_slice(offset, size));
                self.stack.push(k.into_uint());
            }
            instructions::SLOAD => {
                let key = BigEndianHash::from_uint(&self.stack.pop_back());
                let word = ext.storage_at(&key)?.into_uint();
                self.stack.push(word);

                ext.al_insert_storage_key(self.params.address, key);
            }
            instructions::SSTORE => {
                let key = BigEndianHash::from_uint(&self.stack.pop_back());
                let val = self.stack.pop_back();

                let current_val = ext.storage_at(&key)?.into_uint();
                // Increase refund for clear
                if ext.schedule().eip1283 {
                    let original_val = ext.initial_storage_at(&key)?.into_uint();
                    gasometer::handle_eip1283_sstore_clears_refund(
                        ext,
                        &original_val,
                        &current_val,
                        &val,
                    );
                } else if !current_val.is_zero() && val.is_zero() {
                    let sstore_clears_schedule = ext.schedule().sstore_refund_gas;
                    ext.add_sstore_refund(sstore_clears_schedule);
                }
                ext.set_storage(key, BigEndianHash::from_uint(&val))?;
                ext.al_insert_storage_key(self.params.address, key);
            }
            instructions::TLOAD => {
                let key = BigEndianHash::from_uint(&self.stack.pop_back());
                let word = ext.transient_storage_at(&key)?.into_uint();
                self.stack.push(word);
            }
            instructions::TSTORE => {
                let key = BigEndianHash::from_uint(&self.stack.pop_back());
                let val = self.stack.pop_back();
                ext.set_transient_storage(key, BigEndianHash::from_uint(&val))?;
            }
            instructions::PC => {
                self.stack.push(U256::from(self.reader.position - 1));
            }
            instructions::GAS => {
                self.stack.push(gas.as_u256());
            }
            instructions::ADDRESS => {
                self.stack.push(address_to_u256(self.params.address));
            }
            instructions::ORIGIN => {
                self.stack.push(address_to_u256(self.params.origin));
            }
            instructions::BALANCE => {
                let address = u256_to_address(&self.stack.pop_back());
                let balance = ext.balance(&address)?;
                self.stack.push(balance);
                ext.al_insert_address(address);
            }
            instructions::CALLER => {
                self.stack.push(address_to_u256(self.params.sender));
            }
            instructions::CALLVALUE => {
                self.stack.push(match self.params.value {
                    ActionValue::Transfer(val) | ActionValue::Apparent(val) => val,
                });
            }
            instructions::CALLDATALOAD => {
                let big_id = self.stack.pop_back();
                let word = self.params.data.as_ref().map_or(U256::zero(), |data| {
                    Self::read_word_zero_padded(data, big_id)
                });
                self.stack.push(word);
            }
            instructions::CALLDATASIZE => {
                self.stack
                    .push(U256::from(self.params.data.as_ref().map_or(0, |l| l.len())));
            }
            instructions::CODESIZE => {
                self.stack.push(U256::from(self.reader.len()));
            }
            instructions::RETURNDATASIZE => self.stack.push(U256::from(self.return_data.len())),
            instructions::EXTCODESIZE => {
                let address = u256_to_address(&self.stack.pop_back());
                let len = ext.extcodesize(&address)?.unwrap_or(0);

                ext.al_insert_address(address);
                self.stack.push(U256::from(len));
            }
            instructions::EXTCODEHASH => {
                let address = u256_to_address(&self.stack.pop_back());
                let hash = ext.extcodehash(&address)?.unwrap_or_else(H256::zero);

                ext.al_insert_address(address);
                self.stack.push(hash.into_uint());
            }
            instructions::CALLDATACOPY => {
                Self::copy_data_to_memory(
                    &mut self.mem,
                    &mut self.stack,
                    self.params
                        .data
                        .as_ref()
                        .map_or_else(|| &[] as &[u8], |d| d as &[u8]),
                );
            }
            instructions::RETURNDATACOPY => {
                {
                    let source_offset = self.stack.peek(1);
                    let size = self.stack.peek(2);
                    let return_data_len = U256::from(self.return_data.len());
                    if source_offset.saturating_add(*size) > return_data_len {
                        return Err(vm::Error::OutOfBounds);
                    }
                }
                Self::copy_data_to_memory(&mut self.mem, &mut self.stack, &self.return_data);
            }
            instructions::CODECOPY => {
                Self::copy_data_to_memory(&mut self.mem, &mut self.stack, &self.reader.code);
            }
            instructions::EXTCODECOPY => {
                let address = u256_to_address(&self.stack.pop_back());
                let code = ext.extcode(&address)?;
                Self::copy_data_to_memory(
                    &mut self.mem,
                    &mut self.stack,
                    code.as_ref().map(|c| &(*c)[..]).unwrap_or(&[]),
                );
                ext.al_insert_address(address);
            }
            instructions::GASPRICE => {
                self.stack.push(self.params.gas_price);
            }
            instructions::BLOCKHASH => {
                let block_number = self.stack.pop_back();
                let block_hash = ext.blockhash(&block_number);
                self.stack.push(block_hash.into_uint());
            }
            instructions::COINBASE => {
                self.stack.push(address_to_u256(ext.env_info().author));
            }
            instructions::TIMESTAMP => {
                self.stack.push(U256::from(ext.env_info().timestamp));
            }
            instructions::NUMBER => {
                self.stack.push(U256::from(ext.env_info().number));
            }
            instructions::DIFFICULTY => {
                self.stack.push(ext.env_info().difficulty);
            }
            instructions::GASLIMIT => {
                self.stack.push(ext.env_info().gas_limit);
            }
            instructions::CHAINID => self.stack.push(ext.chain_id().into()),
            instructions::SELFBALANCE => {
                self.stack.push(ext.balance(&self.params.address)?);
            }
            instructions::BASEFEE => {
                self.stack.push(ext.env_info().base_fee.unwrap_or_default());
            }
            instructions::BLOBHASH => {
                let index = self.stack.pop_back();
                let idx = if index > U256::from(u32::MAX) {
                    usize::MAX
                } else {
                    index.low_u64() as usize
                };
                let hash = ext
                    .env_info()
                    .blob_versioned_hashes
                    .get(idx)
                    .cloned()
                    .unwrap_or_else(H256::zero);
                self.stack.push(hash.into_uint());
            }
            instructions::BLOBBASEFEE => {
                self.stack
                    .push(ext.env_info().blob_base_fee.unwrap_or_default());
            }

            // Stack instructions
            instructions::DUP1
            | instructions::DUP2
            | instructions::DUP3
            | instructions::DUP4
            | instructions::DUP5
            | instructions::DUP6
            | instructions::DUP7
            | instructions::DUP8
            | instructions::DUP9
            | instructions::DUP10
            | instructions::DUP11
            | instructions::DUP12
            | instructions::DUP13
            | instructions::DUP14
            | instructions::DUP15
            | instructions::DUP16 => {
                let position = instruction
                    .dup_position()
                    .expect("dup_position always return some for DUP* instructions");
                let val = *self.stack.peek(position);
                self.stack.push(val);
            }
            instructions::SWAP1
            | instructions::SWAP2
            | instructions::SWAP3
            | instructions::SWAP4
            | instructions::SWAP5
            | instructions::SWAP6
            | instructions::SWAP7
            | instructions::SWAP8
            | instructions::SWAP9
            | instructions::SWAP10
            | instructions::SWAP11
            | instructions::SWAP12
            | instructions::SWAP13
            | instructions::SWAP14
            | instructions::SWAP15
            | instructions::SWAP16 => {
                let position = instruction
                    .swap_position()
                    .expect("swap_position always return some for SWAP* instructions");
                self.stack.swap_with_top(position)
            }
            instructions::POP => {
                self.stack.pop_back();
            }
            instructions::ADD => {
                let a = self.stack.pop_back();
                let b = self.stack.pop_back();
                self.stack.push(a.overflowing_add(b).0);
            }
            instructions::MUL => {
                let a = self.stack.pop_back();
                let b = self.stack.pop_back();
                self.stack.push(a.overflowing_mul(b).0);
            }
            instructions::SUB => {
                let a = self.stack.pop_back();
                let b = self.stack.pop_back();
                self.stack.push(a.overflowing_sub(b).0);
            }
            instructions::DIV => {
                let a = self.stack.pop_back();
                let b = self.stack.pop_back();
                self.stack.push(if !b.is_zero() {
                    match b {
                        ONE => a,
                        TWO => a >> 1,
                        TWO_POW_5 => a >> 5,
                        TWO_POW_8 => a >> 8,
                        TWO_POW_16 => a >> 16,
                        TWO_POW_24 => a >> 24,
                        TWO_POW_64 => a >> 64,
                        TWO_POW_96 => a >> 96,
                        TWO_POW_224 => a >> 224,
                        TWO_POW_248 => a >> 248,
                        _ => a / b,
                    }
                } else {
                    U256::zero()
                });
            }
            instructions::MOD => {
                let a = self.stack.pop_back();
                let b = self.stack.pop_back();
                self.stack
                    .push(if !b.is_zero() { a % b } else { U256::zero() });
            }
            instructions::SDIV => {
                let (a, sign_a) = get_and_reset_sign(self.stack.pop_back());
                let (b, sign_b) = get_and_reset_sign(self.stack.pop_back());

                // -2^255
                let min = (U256::one() << 255) - U256::one();
                self.stack.push(if b.is_zero() {
                    U256::zero()
                } else if a == min && b == !U256::zero() {
                    min
                } else {
                    let c = a / b;
                    set_sign(c, sign_a ^ sign_b)
                });
            }
            instructions::SMOD => {
                let ua = self.stack.pop_back();
                let ub = self.stack.pop_back();
                let (a, sign_a) = get_and_reset_sign(ua);
                let b = get_and_reset_sign(ub).0;

                self.stack.push(if !b.is_zero() {
                    let c = a % b;
                    set_sign(c, sign_a)
                } else {
                    U256::zero()
                });
            }
            instructions::EXP => {
                let base = self.stack.pop_back();
                let expon = self.stack.pop_back();
                let res = base.overflowing_pow(expon).0;
                self.stack.push(res);
            }
            instructions::NOT => {
                let a = self.stack.pop_back();
                self.stack.push(!a);
            }
            instructions::LT => {
                let a = self.stack.pop_back();
                let b = self.stack.pop_back();
                self.stack.push(Self::bool_to_u256(a < b));
            }
            instructions::SLT => {
                let (a, neg_a) = get_and_reset_sign(self.stack.pop_back());
                let (b, neg_b) = get_and_reset_sign(self.stack.pop_back());

                let is_positive_lt = a < b && !(neg_a | neg_b);
                let is_negative_lt = a > b && (neg_a & neg_b);
                let has_different_signs = neg_a && !neg_b;

                self.stack.push(Self::bool_to_u256(
                    is_positive_lt | is_negative_lt | has_different_signs,
                ));
            }
            instructions::GT => {
                let a = self.stack.pop_back();
                let b = self.stack.pop_back();
                self.stack.push(Self::bool_to_u256(a > b));
            }
            instructions::SGT => {
                let (a, neg_a) = get_and_reset_sign(self.stack.pop_back());
                let (b, neg_b) = get_and_reset_sign(self.stack.pop_back());

                let is_positive_gt = a > b && !(neg_a | neg_b);
                let is_negative_gt = a < b && (neg_a & neg_b);
                let has_different_signs = !neg_a && neg_b;

                self.stack.push(Self::bool_to_u256(
                    is_positive_gt | is_negative_gt | has_different_signs,
                ));
            }
            instructions::EQ => {
                let a = self.stack.pop_back();
                let b = self.stack.pop_back();
                self.stack.push(Self::bool_to_u256(a == b));
            }
            instructions::ISZERO => {
                let a = self.stack.pop_back();
                self.stack.push(Self::bool_to_u256(a.is_zero()));
            }
            instructions::AND => {
                let a = self.stack.pop_back();
                let b = self.stack.pop_back();
                self.stack.push(a & b);
            }
            instructions::OR => {
                let a = self.stack.pop_back();
                let b = self.stack.pop_back();
                self.stack.push(a | b);
            }
            instructions::XOR => {
                let a = self.stack.pop_back();
                let b = self.stack.pop_back();
                self.stack.push(a ^ b);
            }
            instructions::BYTE => {
                let word = self.stack.pop_back();
                let val = self.stack.pop_back();
                let byte = match word < U256::from(32) {
                    true => (val >> (8 * (31 - word.low_u64() as usize))) & U256::from(0xff),
                    false => U256::zero(),
                };
                self.stack.push(byte);
            }
            instructions::ADDMOD => {
                let a = self.stack.pop_back();
                let b = self.stack.pop_back();
                let c = self.stack.pop_back();

                self.stack.push(if !c.is_zero() {
                    let a_num = to_biguint(a);
                    let b_num = to_biguint(b);
                    let c_num = to_biguint(c);
                    let res = a_num + b_num;
                    let x = res % c_num;
                    from_biguint(x)
                } else {
                    U256::zero()
                });
            }
            instructions::MULMOD => {
                let a = self.stack.pop_back();
                let b = self.stack.pop_back();
                let c = self.stack.pop_back();

                self.stack.push(if !c.is_zero() {
                    let a_num = to_biguint(a);
                    let b_num = to_biguint(b);
                    let c_num = to_biguint(c);
                    let res = a_num * b_num;
                    let x = res % c_num;
                    from_biguint(x)
                } else {
                    U256::zero()
                });
            }
            instructions::SIGNEXTEND => {
                let bit = self.stack.pop_back();
                if bit < U256::from(32) {
                    let number = self.stack.pop_back();
                    let bit_position = (bit.low_u64() * 8 + 7) as usize;

                    let bit = number.bit(bit_position);
                    let mask = (U256::one() << bit_position) - U256::one();
                    self.stack
                        .push(if bit { number | !mask } else { number & mask });
                }
            }
            instructions::SHL => {
                const CONST_256: U256 = U256([256, 0, 0, 0]);

                let shift = self.stack.pop_back();
                let value = self.stack.pop_back();

                let result = if shift >= CONST_256 {
                    U256::zero()
                } else {
                    value << (shift.as_u32() as usize)
                };
                self.stack.push(result);
            }
            instructions::SHR => {
                const CONST_256: U256 = U256([256, 0, 0, 0]);

                let shift = self.stack.pop_back();
                let value = self.stack.pop_back();

                let result = if shift >= CONST_256 {
                    U256::zero()
                } else {
                    value >> (shift.as_u32() as usize)
                };
                self.stack.push(result);
            }
            instructions::SAR => {
                // We cannot use get_and_reset_sign/set_sign here, because the rounding looks different.

                const CONST_256: U256 = U256([256, 0, 0, 0]);
                const CONST_HIBIT: U256 = U256([0, 0, 0, 0x8000000000000000]);

                let shift = self.stack.pop_back();
                let value = self.stack.pop_back();
                let sign = value & CONST_HIBIT != U256::zero();

                let result = if shift >= CONST_256 {
                    if sign {
                        U256::max_value()
                    } else {
                        U256::zero()
                    }
                } else {
                    let shift = shift.as_u32() as usize;
                    let mut shifted = value >> shift;
                    if sign {
                        shifted = shifted | (U256::max_value() << (256 - shift));
                    }
                    shifted
                };
                self.stack.push(result);
            }
            instructions::INVALID => {
                return Err(vm::Error::BadInstruction {
                    instruction: instructions::INVALID as u8,
                });
            }
        };
        Ok(InstructionResult::Ok)
    }

    fn copy_data_to_memory(mem: &mut Vec<u8>, stack: &mut dyn Stack<U256>, source: &[u8]) {
        let dest_offset = stack.pop_back();
        let source_offset = stack.pop_back();
        let size = stack.pop_back();
        let source_size = U256::from(source.len());

        let output_end = match source_offset > source_size
            || size > source_size
            || source_offset + size > source_size
        {
            true => {
                let zero_slice = if source_offset > source_size {
                    mem.writeable_slice(dest_offset, size)
                } else {
                    mem.writeable_slice(
                        dest_offset + source_size - source_offset,
                        source_offset + size - source_size,
                    )
                };
                for i in zero_slice.iter_mut() {
                    *i = 0;
                }
                source.len()
            }
            false => (size.low_u64() + source_offset.low_u64()) as usize,
        };

        if source_offset < source_size {
            let output_begin = source_offset.low_u64() as usize;
            mem.write_slice(dest_offset, &source[output_begin..output_end]);
        }
    }

    fn verify_jump(&self, jump_u: U256, valid_jump_destinations: &BitSet) -> vm::Result<usize> {
        let jump = jump_u.low_u64() as usize;

        if valid_jump_destinations.contains(jump) && U256::from(jump) == jump_u {
            Ok(jump)
        } else {
            // Note: if jump > usize, BadJumpDestination value is trimmed
            Err(vm::Error::BadJumpDestination { destination: jump })
        }
    }

    fn bool_to_u256(val: bool) -> U256 {
        if val {
            U256::one()
        } else {
            U256::zero()
        }
    }
}

fn get_and_reset_sign(value: U256) -> (U256, bool) {
    let U256(arr) = value;
    let sign = arr[3].leading_zeros() == 0;
    (set_sign(value, sign), sign)
}

fn set_sign(value: U256, sign: bool) -> U256 {
    if sign {
        (!U256::zero() ^ value).overflowing_add(U256::one()).0
    } else {
        value
    }
}

#[inline]
fn u256_to_address(value: &U256) -> Address {
    let addr: H256 = BigEndianHash::from_uint(value);
    Address::from(addr)
}

#[inline]
fn address_to_u256(value: Address) -> U256 {
    H256::from(value).into_uint()
}

#[cfg(test)]
mod tests {
    use ethereum_types::Address;
    use factory::Factory;
    use rustc_hex::FromHex;
    use std::sync::Arc;
    use vm::{
        self,
        tests::{test_finalize, FakeExt},
        ActionParams, ActionValue, Exec,
    };
    use vmtype::VMType;

    fn interpreter(params: ActionParams, ext: &dyn vm::Ext) -> Box<dyn Exec> {
        Factory::new(VMType::Interpreter, 1).create(params, ext.schedule(), ext.depth())
    }

    #[test]
    fn should_not_fail_on_tracing_mem() {
        let code = "7feeffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff006000527faaffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffaa6020526000620f120660406000601773945304eb96065b2a98b57a48a06ae28d285a71b56101f4f1600055".from_hex().unwrap();

        let mut params = ActionParams::default();
        params.address = Address::from_low_u64_be(5);
        params.gas = 300_000.into();
        params.gas_price = 1.into();
        params.value = ActionValue::Transfer(100_000.into());
        params.code = Some(Arc::new(code));
        let mut ext = FakeExt::new();
        ext.balances
            .insert(Address::from_low_u64_be(5), 1_000_000_000.into());
        ext.tracing = true;

        let gas_left = {
            let vm = interpreter(params, &ext);
            test_finalize(vm.exec(&mut ext).ok().unwrap()).unwrap()
        };

        assert_eq!(ext.calls.len(), 1);
        assert_eq!(gas_left, 248_212.into());
    }

    #[test]
    fn should_not_overflow_returndata() {
        let code = "6001600160000360003e00".from_hex().unwrap();

        let mut params = ActionParams::default();
        params.address = Address::from_low_u64_be(5);
        params.gas = 300_000.into();
        params.gas_price = 1.into();
        params.code = Some(Arc::new(code));
        let mut ext = FakeExt::new_byzantium();
        ext.balances
            .insert(Address::from_low_u64_be(5), 1_000_000_000.into());
        ext.tracing = true;

        let err = {
            let vm = interpreter(params, &ext);
            test_finalize(vm.exec(&mut ext).ok().unwrap())
                .err()
                .unwrap()
        };

        assert_eq!(err, ::vm::Error::OutOfBounds);
    }

    #[test]
    fn push0_pushes_zero() {
        let code = "5f6000556000".from_hex().unwrap(); // PUSH0 PUSH1 0 SSTORE PUSH1 0

        let mut params = ActionParams::default();
        params.address = Address::from_low_u64_be(5);
        params.gas = 100_000.into();
        params.code = Some(Arc::new(code));
        let mut ext = FakeExt::new_cancun();
        ext.balances
            .insert(Address::from_low_u64_be(5), 1_000_000_000.into());

        let vm = interpreter(params, &ext);
        test_finalize(vm.exec(&mut ext).ok().unwrap()).unwrap();

        assert_eq!(
            ext.store.get(&Default::default()).cloned().unwrap_or_default(),
            Default::default()
        );
    }

    #[test]
    fn mcopy_copies_overlapping_regions() {
        // PUSH1 5 PUSH1 0 PUSH1 32 MSTORE PUSH1 0 (placeholder to make memory non-empty)
        // Build memory [0..32) = 0x0102030405...(32 bytes), then MCOPY to overlap.
        let mut code = Vec::new();
        // MSTORE8 five bytes 1,2,3,4,5 at offsets 0..5 to make a visible pattern.
        for (i, b) in [1u8, 2, 3, 4, 5].iter().enumerate() {
            code.extend_from_slice(&[0x60, *b, 0x60, i as u8, 0x53]); // PUSH1 b PUSH1 i MSTORE8
        }
        // MCOPY: size=3 src=0 dest=2 -> copies [1,2,3] into offset 2..5, overlapping.
        code.extend_from_slice(&[0x60, 3, 0x60, 0, 0x60, 2, 0x5e]); // PUSH1 3 PUSH1 0 PUSH1 2 MCOPY
        code.push(0x00); // STOP

        let mut params = ActionParams::default();
        params.address = Address::from_low_u64_be(5);
        params.gas = 100_000.into();
        params.code = Some(Arc::new(code));
        let mut ext = FakeExt::new_cancun();
        ext.balances
            .insert(Address::from_low_u64_be(5), 1_000_000_000.into());

        let vm = interpreter(params, &ext);
        test_finalize(vm.exec(&mut ext).ok().unwrap()).unwrap();
    }

    #[test]
    fn rejects_eof_only_opcode_in_legacy_code() {
        let code = vec![instructions::Instruction::CALLF as u8, 0x00, 0x00];

        let mut params = ActionParams::default();
        params.address = Address::from_low_u64_be(5);
        params.gas = 100_000.into();
        params.code = Some(Arc::new(code));
        let mut ext = FakeExt::new_cancun();

        let vm = interpreter(params, &ext);
        let err = test_finalize(vm.exec(&mut ext).ok().unwrap()).err().unwrap();
        assert_eq!(
            err,
            ::vm::Error::BadInstruction {
                instruction: instructions::Instruction::CALLF as u8
            }
        );
    }

    #[test]
    fn runs_simple_eof_container() {
        // Type section: inputs=0, outputs=0x80 (non-returning), max_stack_height=1.
        // Code section 0: PUSH1 0x2a, POP, STOP (3 + 1 + 1 = not needed, just PUSH1 POP STOP).
        let types = [0u8, 0x80, 0x00, 0x01];
        let body = [0x60, 0x2a, 0x50, 0x00]; // PUSH1 0x2a POP STOP
        let mut raw = vec![0xef, 0x00, 0x01];
        raw.push(0x01); // kind type
        raw.extend_from_slice(&(types.len() as u16).to_be_bytes());
        raw.push(0x02); // kind code
        raw.extend_from_slice(&1u16.to_be_bytes());
        raw.extend_from_slice(&(body.len() as u16).to_be_bytes());
        raw.push(0x04); // kind data
        raw.extend_from_slice(&0u16.to_be_bytes());
        raw.push(0x00); // terminator
        raw.extend_from_slice(&types);
        raw.extend_from_slice(&body);

        let mut params = ActionParams::default();
        params.address = Address::from_low_u64_be(5);
        params.gas = 100_000.into();
        params.code = Some(Arc::new(raw));
        let mut ext = FakeExt::new_cancun();
        ext.schedule.have_eof = true;

        let vm = interpreter(params, &ext);
        test_finalize(vm.exec(&mut ext).ok().unwrap()).unwrap();
    }

    fn returned_word(params: ActionParams, ext: &mut FakeExt) -> U256 {
        let vm = interpreter(params, &*ext);
        match vm.exec(ext).ok().unwrap() {
            Ok(vm::GasLeft::NeedsReturn { data, .. }) => U256::from(&*data),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn add_and_return() {
        // PUSH1 1 PUSH1 2 ADD PUSH1 0 MSTORE PUSH1 0x20 PUSH1 0 RETURN
        let code = vec![
            0x60, 0x01, 0x60, 0x02, 0x01, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3,
        ];

        let mut params = ActionParams::default();
        params.address = Address::from_low_u64_be(5);
        params.gas = 100_000.into();
        params.code = Some(Arc::new(code));
        let mut ext = FakeExt::new_cancun();

        assert_eq!(returned_word(params, &mut ext), U256::from(3));
    }

    #[test]
    fn signed_comparison_handles_negative_operands() {
        // PUSH32 INT256_MIN PUSH1 0 SGT PUSH1 0 MSTORE PUSH1 0x20 PUSH1 0 RETURN
        let mut code = vec![0x7f, 0x80];
        code.extend_from_slice(&[0x00; 31]); // INT256_MIN = 0x8000...000
        code.extend_from_slice(&[0x60, 0x00]); // PUSH1 0
        code.push(0x13); // SGT: (0 > INT256_MIN) = 1
        code.extend_from_slice(&[0x60, 0x00, 0x52]); // PUSH1 0 MSTORE
        code.extend_from_slice(&[0x60, 0x20, 0x60, 0x00, 0xf3]); // PUSH1 0x20 PUSH1 0 RETURN

        let mut params = ActionParams::default();
        params.address = Address::from_low_u64_be(5);
        params.gas = 100_000.into();
        params.code = Some(Arc::new(code));
        let mut ext = FakeExt::new_cancun();

        assert_eq!(returned_word(params, &mut ext), U256::from(1));
    }

    #[test]
    fn division_by_zero_pushes_zero() {
        // PUSH1 0 PUSH1 42 DIV PUSH1 0 MSTORE PUSH1 0x20 PUSH1 0 RETURN
        let code = vec![
            0x60, 0x00, 0x60, 0x2a, 0x04, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3,
        ];

        let mut params = ActionParams::default();
        params.address = Address::from_low_u64_be(5);
        params.gas = 100_000.into();
        params.code = Some(Arc::new(code));
        let mut ext = FakeExt::new_cancun();

        assert_eq!(returned_word(params, &mut ext), U256::zero());
    }

    #[test]
    fn sstore_fails_in_static_call() {
        let code = "600160005500".from_hex().unwrap(); // PUSH1 1 PUSH1 0 SSTORE STOP

        let mut params = ActionParams::default();
        params.address = Address::from_low_u64_be(5);
        params.gas = 100_000.into();
        params.code = Some(Arc::new(code));
        let mut ext = FakeExt::new_cancun();
        ext.is_static = true;

        let vm = interpreter(params, &ext);
        let err = test_finalize(vm.exec(&mut ext).ok().unwrap()).err().unwrap();
        assert_eq!(err, ::vm::Error::MutableCallInStaticContext);
    }

    #[test]
    fn out_of_gas_on_memory_expansion() {
        // PUSH32 0xff...ff PUSH4 0xffffffff MSTORE: forces a huge memory
        // expansion far beyond what the supplied gas can pay for.
        let mut code = vec![0x7f];
        code.extend_from_slice(&[0xff; 32]);
        code.extend_from_slice(&[0x63, 0xff, 0xff, 0xff, 0xff]);
        code.push(0x52); // MSTORE

        let mut params = ActionParams::default();
        params.address = Address::from_low_u64_be(5);
        params.gas = 100_000.into();
        params.code = Some(Arc::new(code));
        let mut ext = FakeExt::new_cancun();

        let vm = interpreter(params, &ext);
        let err = test_finalize(vm.exec(&mut ext).ok().unwrap()).err().unwrap();
        assert_eq!(err, ::vm::Error::OutOfGas);
    }
}
