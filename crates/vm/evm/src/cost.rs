//! Abstraction over the gas counter's representation.
//!
//! Most executions never get close to `u64::MAX` gas, so the interpreter is
//! generic over a `CostType` and the `Factory` picks a cheap `u64` counter
//! whenever the starting gas fits, falling back to `U256` otherwise.

use ethereum_types::U256;
use std::fmt;
use std::ops::{Add, Sub};

/// A type that can represent and saturate the remaining-gas counter.
pub trait CostType:
    Sized + Add<Output = Self> + Sub<Output = Self> + PartialOrd + Copy + Send + fmt::Debug
{
    /// Convert from an arbitrary `usize` base cost.
    fn from(val: usize) -> Self;
    /// Convert to `U256` for stack pushes (`GAS` opcode) and host calls.
    fn as_u256(&self) -> U256;
    /// Convert from `U256`, failing if it doesn't fit.
    fn from_u256(val: U256) -> Result<Self, vm::Error>;
    /// Checked addition.
    fn overflow_add(self, other: Self) -> (Self, bool);
    /// Checked multiplication.
    fn overflow_mul(self, other: Self) -> (Self, bool);
    /// Checked `self * other + add`, used by the memory-expansion formula.
    fn overflow_mul_add(self, other: Self, add: Self) -> (Self, bool) {
        let (mul, o1) = self.overflow_mul(other);
        let (sum, o2) = mul.overflow_add(add);
        (sum, o1 || o2)
    }
}

impl CostType for U256 {
    fn from(val: usize) -> Self {
        U256::from(val)
    }

    fn as_u256(&self) -> U256 {
        *self
    }

    fn from_u256(val: U256) -> Result<Self, vm::Error> {
        Ok(val)
    }

    fn overflow_add(self, other: Self) -> (Self, bool) {
        self.overflowing_add(other)
    }

    fn overflow_mul(self, other: Self) -> (Self, bool) {
        self.overflowing_mul(other)
    }
}

impl CostType for u64 {
    fn from(val: usize) -> Self {
        val as u64
    }

    fn as_u256(&self) -> U256 {
        U256::from(*self)
    }

    fn from_u256(val: U256) -> Result<Self, vm::Error> {
        if val <= U256::from(u64::MAX) {
            Ok(val.low_u64())
        } else {
            Err(vm::Error::OutOfGas)
        }
    }

    fn overflow_add(self, other: Self) -> (Self, bool) {
        self.overflowing_add(other)
    }

    fn overflow_mul(self, other: Self) -> (Self, bool) {
        self.overflowing_mul(other)
    }
}
