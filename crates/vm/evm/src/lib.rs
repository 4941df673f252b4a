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

//! EVM & EOF bytecode interpreter, plus the `Factory` that selects which
//! gas-counter representation to run a call frame with.

extern crate bit_set;
extern crate ethereum_types;
extern crate keccak_hash as hash;
extern crate lazy_static;
extern crate log;
extern crate lru_cache;
extern crate num_bigint;
extern crate parity_bytes as bytes;
extern crate parking_lot;
extern crate vm;

#[cfg(test)]
extern crate rustc_hex;

mod cost;
pub mod eof;
mod factory;
pub mod instructions;
mod interpreter;
mod vmtype;

pub use cost::CostType;
pub use factory::Factory;
pub use interpreter::{Interpreter, SharedCache};
pub use vmtype::VMType;
