//! Per-instruction gas cost formulas, parameterized by `Schedule`.

use ethereum_types::{Address, U256};
use evm::CostType;
use instructions::{self, Instruction, InstructionInfo};
use interpreter::stack::Stack;
use std::cmp;
use vm::{self, Schedule};

/// Gas cost plus the memory side effects of executing one instruction.
pub struct InstructionRequirements<Gas> {
    /// Total gas cost, static plus dynamic.
    pub gas_cost: Gas,
    /// Gas to forward to a child call/create, if this is one.
    pub provide_gas: Option<Gas>,
    /// Memory size (bytes) the instruction needs available.
    pub memory_required_size: usize,
    /// Total (not incremental) memory gas charged so far, for bookkeeping.
    pub memory_total_gas: Gas,
}

/// Running gas counter for one frame.
pub struct Gasometer<Gas> {
    pub current_gas: Gas,
    pub current_mem_gas: Gas,
}

impl<Gas: CostType> Gasometer<Gas> {
    pub fn new(current_gas: Gas) -> Self {
        Gasometer {
            current_gas,
            current_mem_gas: Gas::from(0),
        }
    }

    /// Fails with `OutOfGas` unless at least `gas_cost` remains.
    pub fn verify_gas(&self, gas_cost: &Gas) -> vm::Result<()> {
        if self.current_gas < *gas_cost {
            Err(vm::Error::OutOfGas)
        } else {
            Ok(())
        }
    }

    /// Computes the static and dynamic cost of `instruction`, plus any
    /// memory it needs expanded into, without mutating `self` or `ext`
    /// beyond access-list warming (which must happen regardless of whether
    /// gas later turns out to be insufficient, matching mainnet clients).
    pub fn requirements(
        &mut self,
        ext: &mut dyn vm::Ext,
        instruction: Instruction,
        info: &InstructionInfo,
        stack: &dyn Stack<U256>,
        current_address: &Address,
        current_mem_size: usize,
    ) -> vm::Result<InstructionRequirements<Gas>> {
        let schedule = ext.schedule();
        let tier = instructions_tier_gas(instruction, schedule);

        let mut gas = Gas::from(tier);
        let mut provide_gas = None;
        let mut mem_size = current_mem_size;

        use instructions::*;
        match instruction {
            SSTORE => {
                if schedule.eip1706 && self.current_gas.as_u256() <= U256::from(vm::schedule::SSTORE_STIPEND)
                {
                    return Err(vm::Error::OutOfGas);
                }
                let key: ethereum_types::H256 = ethereum_types::BigEndianHash::from_uint(stack.peek(0));
                let cold = warm_storage(ext, current_address, &key);
                let new_value = *stack.peek(1);
                let current_value = ext.storage_at(&key)?.into_uint();
                let sstore_cost = if !schedule.eip1283 {
                    if current_value.is_zero() && !new_value.is_zero() {
                        schedule.sstore_set_gas
                    } else {
                        schedule.sstore_reset_gas
                    }
                } else {
                    sstore_eip1283_cost(ext, schedule, &key, &current_value, &new_value)?
                };
                gas = gas.overflow_add(Gas::from(sstore_cost)).0;
                if cold {
                    gas = gas.overflow_add(Gas::from(schedule.cold_sload_cost)).0;
                }
            }
            SLOAD => {
                let key: ethereum_types::H256 = ethereum_types::BigEndianHash::from_uint(stack.peek(0));
                let cold = warm_storage(ext, current_address, &key);
                gas = gas.overflow_add(Gas::from(if cold {
                    schedule.cold_sload_cost
                } else {
                    schedule.warm_storage_read_cost
                })).0;
            }
            TLOAD | TSTORE => {
                gas = gas.overflow_add(Gas::from(schedule.warm_storage_read_cost)).0;
            }
            MLOAD | MSTORE => {
                mem_size = cmp::max(mem_size, mem_needed_const(stack.peek(0), 32)?);
            }
            MSTORE8 => {
                mem_size = cmp::max(mem_size, mem_needed_const(stack.peek(0), 1)?);
            }
            MCOPY => {
                let len = *stack.peek(2);
                gas = gas
                    .overflow_add(Gas::from(schedule.copy_gas * words(len)))
                    .0;
                mem_size = cmp::max(mem_size, mem_needed(stack.peek(0), len)?);
                mem_size = cmp::max(mem_size, mem_needed(stack.peek(1), len)?);
            }
            RETURN | REVERT | RETURNCONTRACT => {
                mem_size = cmp::max(mem_size, mem_needed(stack.peek(0), *stack.peek(1))?);
            }
            SHA3 => {
                let len = *stack.peek(1);
                gas = gas
                    .overflow_add(Gas::from(schedule.sha3_word_gas * words(len)))
                    .0;
                mem_size = cmp::max(mem_size, mem_needed(stack.peek(0), len)?);
            }
            CALLDATACOPY | CODECOPY | RETURNDATACOPY | DATACOPY => {
                let len = *stack.peek(2);
                gas = gas
                    .overflow_add(Gas::from(schedule.copy_gas * words(len)))
                    .0;
                mem_size = cmp::max(mem_size, mem_needed(stack.peek(0), len)?);
            }
            EXTCODECOPY => {
                let address = u256_to_address(stack.peek(0));
                let len = *stack.peek(3);
                let cold = warm_address(ext, &address);
                gas = gas
                    .overflow_add(Gas::from(if cold {
                        schedule.extcodecopy_base_gas + schedule.cold_account_access_cost
                            - schedule.warm_storage_read_cost
                    } else {
                        schedule.extcodecopy_base_gas
                    }))
                    .0;
                gas = gas
                    .overflow_add(Gas::from(schedule.copy_gas * words(len)))
                    .0;
                mem_size = cmp::max(mem_size, mem_needed(stack.peek(1), len)?);
            }
            EXTCODESIZE | EXTCODEHASH | BALANCE => {
                let address = u256_to_address(stack.peek(0));
                let base = warm_address_base(ext, schedule, &address);
                gas = gas.overflow_add(Gas::from(base)).0;
            }
            LOG0 | LOG1 | LOG2 | LOG3 | LOG4 => {
                let topics = instruction.log_topics().expect("LOG* always has topics; qed");
                let len = *stack.peek(1);
                gas = gas
                    .overflow_add(Gas::from(schedule.log_gas + topics * schedule.log_topic_gas))
                    .0;
                gas = gas
                    .overflow_add(Gas::from(schedule.log_data_gas * bytes_len(len)))
                    .0;
                mem_size = cmp::max(mem_size, mem_needed(stack.peek(0), len)?);
            }
            EXP => {
                let expon = *stack.peek(1);
                let bytes = ((expon.bits() + 7) / 8) as usize;
                gas = gas
                    .overflow_add(Gas::from(bytes * schedule.exp_byte_gas))
                    .0;
            }
            CREATE | CREATE2 | EOFCREATE => {
                let len = *stack.peek(2);
                mem_size = cmp::max(mem_size, mem_needed(stack.peek(1), len)?);
                if instruction == CREATE2 {
                    gas = gas
                        .overflow_add(Gas::from(schedule.sha3_word_gas * words(len)))
                        .0;
                }
                if schedule.eip3860 {
                    gas = gas
                        .overflow_add(Gas::from(vm::schedule::INITCODE_WORD_GAS * words(len)))
                        .0;
                }
                gas = gas.overflow_add(Gas::from(schedule.create_gas)).0;
                let available = self.current_gas - gas;
                let capped = available - available.overflow_div_64();
                provide_gas = Some(capped);
            }
            CALL | CALLCODE | DELEGATECALL | STATICCALL => {
                let requested = *stack.peek(0);
                let address = u256_to_address(stack.peek(1));
                let value = if instruction == CALL || instruction == CALLCODE {
                    *stack.peek(2)
                } else {
                    U256::zero()
                };
                let value_arg_count = if instruction == DELEGATECALL || instruction == STATICCALL {
                    0
                } else {
                    1
                };
                let in_off = *stack.peek(2 + value_arg_count);
                let in_len = *stack.peek(3 + value_arg_count);
                let out_off = *stack.peek(4 + value_arg_count);
                let out_len = *stack.peek(5 + value_arg_count);

                let cold = warm_address(ext, &address);
                gas = gas
                    .overflow_add(Gas::from(if cold {
                        schedule.cold_account_access_cost
                    } else {
                        schedule.warm_storage_read_cost
                    }))
                    .0;

                if !value.is_zero() {
                    gas = gas.overflow_add(Gas::from(schedule.call_value_transfer_gas)).0;
                    if !ext.exists_and_not_null(&address)? {
                        gas = gas.overflow_add(Gas::from(schedule.call_new_account_gas)).0;
                    }
                }

                mem_size = cmp::max(mem_size, mem_needed(&in_off, in_len)?);
                mem_size = cmp::max(mem_size, mem_needed(&out_off, out_len)?);

                let available = self.current_gas - gas;
                let capped = available - available.overflow_div_64();
                let mut child_gas = if requested.is_zero() || requested > capped.as_u256() {
                    capped
                } else {
                    Gas::from_u256(requested)?
                };
                if !value.is_zero() {
                    child_gas = child_gas.overflow_add(Gas::from(schedule.call_stipend)).0;
                }
                provide_gas = Some(child_gas);
            }
            EXTCALL | EXTDELEGATECALL | EXTSTATICCALL => {
                let address = u256_to_address(stack.peek(0));
                let in_off = *stack.peek(1);
                let in_len = *stack.peek(2);
                let value = if instruction == EXTCALL {
                    *stack.peek(3)
                } else {
                    U256::zero()
                };

                let cold = warm_address(ext, &address);
                gas = gas
                    .overflow_add(Gas::from(if cold {
                        schedule.cold_account_access_cost
                    } else {
                        schedule.warm_storage_read_cost
                    }))
                    .0;

                if !value.is_zero() {
                    gas = gas.overflow_add(Gas::from(schedule.call_value_transfer_gas)).0;
                    if !ext.exists_and_not_null(&address)? {
                        gas = gas.overflow_add(Gas::from(schedule.call_new_account_gas)).0;
                    }
                }

                mem_size = cmp::max(mem_size, mem_needed(&in_off, in_len)?);

                let available = self.current_gas - gas;
                let mut child_gas = available - available.overflow_div_64();
                if !value.is_zero() {
                    child_gas = child_gas.overflow_add(Gas::from(schedule.call_stipend)).0;
                }
                provide_gas = Some(child_gas);
            }
            SELFDESTRUCT => {
                let address = u256_to_address(stack.peek(0));
                let cold = warm_address(ext, &address);
                if cold {
                    gas = gas.overflow_add(Gas::from(schedule.cold_account_access_cost)).0;
                }
                if !schedule.no_empty && ext.exists_and_not_null(&address)? {
                    gas = gas.overflow_add(Gas::from(schedule.suicide_to_new_account_cost)).0;
                }
            }
            _ => {}
        }

        let mem_gas_cost = self.mem_gas_cost(schedule, mem_size)?;

        Ok(InstructionRequirements {
            gas_cost: gas.overflow_add(mem_gas_cost).0,
            provide_gas,
            memory_required_size: mem_size,
            memory_total_gas: self.current_mem_gas.overflow_add(mem_gas_cost).0,
        })
    }

    fn mem_gas_cost(&self, schedule: &Schedule, mem_size: usize) -> vm::Result<Gas> {
        let active_words = ((mem_size + 31) / 32) as u128;
        let linear = active_words * schedule.memory_gas as u128;
        let quad = active_words * active_words / schedule.quad_coeff_div as u128;
        let total = Gas::from((linear + quad) as usize);
        if total < self.current_mem_gas {
            Ok(Gas::from(0))
        } else {
            Ok(total - self.current_mem_gas)
        }
    }
}

trait Div64 {
    fn overflow_div_64(self) -> Self;
}

impl<Gas: CostType> Div64 for Gas {
    fn overflow_div_64(self) -> Self {
        Gas::from((self.as_u256() / 64).low_u64() as usize)
    }
}

fn instructions_tier_gas(instruction: Instruction, schedule: &Schedule) -> usize {
    use instructions::*;
    match instruction {
        STOP | RETURN | REVERT | INVALID | SELFDESTRUCT => 0,
        ADDRESS | ORIGIN | CALLER | CALLVALUE | CALLDATASIZE | CODESIZE | GASPRICE | COINBASE
        | TIMESTAMP | NUMBER | DIFFICULTY | GASLIMIT | POP | PC | MSIZE | GAS | CHAINID
        | SELFBALANCE | BASEFEE | BLOBBASEFEE | PUSH0 | RETURNDATASIZE | DATASIZE => 2,
        PUSH1..=PUSH32 | DUP1..=DUP16 | SWAP1..=SWAP16 | ADD | SUB | LT | GT | SLT | SGT | EQ
        | ISZERO | AND | OR | XOR | NOT | BYTE | SHL | SHR | SAR | CALLDATALOAD | MLOAD
        | MSTORE | MSTORE8 | BLOBHASH => 3,
        MUL | DIV | SDIV | MOD | SMOD | SIGNEXTEND => 5,
        ADDMOD | MULMOD | JUMP => 8,
        JUMPI => 10,
        JUMPDEST => schedule.jumpdest_gas,
        BLOCKHASH => schedule.blockhash_gas,
        CALLDATACOPY | CODECOPY | RETURNDATACOPY | DATACOPY | MCOPY => 3,
        SHA3 => schedule.sha3_gas,
        SLOAD | SSTORE | TLOAD | TSTORE => 0, // fully computed in requirements()
        BALANCE | EXTCODESIZE | EXTCODEHASH => 0,
        EXTCODECOPY => 0,
        LOG0 | LOG1 | LOG2 | LOG3 | LOG4 => 0,
        EXP => schedule.exp_gas,
        CREATE | CREATE2 | EOFCREATE => 0,
        CALL | CALLCODE | DELEGATECALL | STATICCALL | EXTCALL | EXTDELEGATECALL
        | EXTSTATICCALL => 0,
        RJUMP => 2,
        RJUMPI => 4,
        RJUMPV => 4,
        CALLF | RETF | JUMPF => 5,
        DUPN | SWAPN | EXCHANGE => 3,
        RETURNCONTRACT => 0,
        DATALOAD | DATALOADN => 3,
    }
}

fn words(len: U256) -> usize {
    let bytes = bytes_len(len);
    (bytes + 31) / 32
}

fn bytes_len(len: U256) -> usize {
    if len > U256::from(u32::MAX) {
        u32::MAX as usize
    } else {
        len.low_u64() as usize
    }
}

fn mem_needed_const(offset: &U256, size: u64) -> vm::Result<usize> {
    mem_needed(offset, U256::from(size))
}

fn mem_needed(offset: &U256, size: U256) -> vm::Result<usize> {
    if size.is_zero() {
        return Ok(0);
    }
    let end = offset.saturating_add(size);
    if end > U256::from(u32::MAX) {
        return Err(vm::Error::OutOfBounds);
    }
    Ok(end.low_u64() as usize)
}

fn u256_to_address(value: &U256) -> Address {
    let h: ethereum_types::H256 = ethereum_types::BigEndianHash::from_uint(value);
    Address::from(h)
}

fn warm_storage(ext: &mut dyn vm::Ext, address: &Address, key: &ethereum_types::H256) -> bool {
    if !ext.al_is_enabled() {
        return false;
    }
    let cold = !ext.al_contains_storage_key(address, key);
    ext.al_insert_storage_key(*address, *key);
    cold
}

fn warm_address(ext: &mut dyn vm::Ext, address: &Address) -> bool {
    if !ext.al_is_enabled() {
        return false;
    }
    let cold = !ext.al_contains_address(address);
    ext.al_insert_address(*address);
    cold
}

fn warm_address_base(ext: &mut dyn vm::Ext, schedule: &Schedule, address: &Address) -> usize {
    let cold = warm_address(ext, address);
    if !ext.al_is_enabled() {
        schedule.extcodesize_gas
    } else if cold {
        schedule.cold_account_access_cost
    } else {
        schedule.warm_storage_read_cost
    }
}

fn sstore_eip1283_cost(
    ext: &dyn vm::Ext,
    schedule: &Schedule,
    key: &ethereum_types::H256,
    current: &U256,
    new: &U256,
) -> vm::Result<usize> {
    if new == current {
        return Ok(schedule.warm_storage_read_cost);
    }
    let original = ext.initial_storage_at(key)?.into_uint();
    Ok(if &original == current {
        if original.is_zero() {
            schedule.sstore_set_gas
        } else {
            schedule.sstore_reset_gas
        }
    } else {
        schedule.warm_storage_read_cost
    })
}

/// Applies the EIP-1283/EIP-3529 refund adjustment for a `SSTORE`.
pub fn handle_eip1283_sstore_clears_refund(
    ext: &mut dyn vm::Ext,
    original: &U256,
    current: &U256,
    new: &U256,
) {
    let schedule = ext.schedule();
    let sstore_clears_schedule = schedule.sstore_refund_gas;

    if current == new {
        return;
    }

    if original == current {
        if !original.is_zero() && new.is_zero() {
            ext.add_sstore_refund(sstore_clears_schedule);
        }
    } else {
        if !original.is_zero() {
            if current.is_zero() {
                ext.sub_sstore_refund(sstore_clears_schedule);
            } else if new.is_zero() {
                ext.add_sstore_refund(sstore_clears_schedule);
            }
        }
        if original == new {
            if original.is_zero() {
                ext.add_sstore_refund(ext.schedule().sstore_set_gas - ext.schedule().warm_storage_read_cost);
            } else {
                ext.add_sstore_refund(ext.schedule().sstore_reset_gas - ext.schedule().warm_storage_read_cost);
            }
        }
    }
}
