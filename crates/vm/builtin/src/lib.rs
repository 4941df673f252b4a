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

//! Fixed-address precompiled ("builtin") contracts: `ECRECOVER`, `SHA256`,
//! `RIPEMD160`, `IDENTITY`, `MODEXP`, the ALT_BN128 curve operations,
//! `BLAKE2F`, EIP-4844 `POINT_EVALUATION` and the EIP-2537 BLS12-381
//! operations. Addresses `0x01..0x11` (Istanbul-era gas costs for `0x01..0x09`;
//! fork-specific repricing is not modeled, see DESIGN.md).

mod bls12_381;
mod kzg;

pub use bls12_381::{Bls12G1Add, Bls12G1Msm, Bls12G2Add, Bls12G2Msm, Bls12MapFp2ToG2, Bls12MapFpToG1, Bls12Pairing};
pub use kzg::PointEvaluation;

use byteorder::{BigEndian, ByteOrder};
use ethereum_types::{H256, U256};
use num::{BigUint, Zero};
use parity_crypto::publickey::{public_to_address, recover, Message, Signature};
use std::{cmp, collections::BTreeMap, convert::TryInto};
use substrate_bn as bn;
use substrate_bn::Group;

/// A builtin's error is always a `&'static str`, matching `vm::Error::BuiltIn`
/// and requiring no allocation on the failure path.
pub type Result<T> = std::result::Result<T, &'static str>;

/// A fixed-address native contract.
pub trait Precompile: Send + Sync {
    /// Gas charged before `execute` runs. Input longer than the schedule
    /// allows is still priced (and then fails at execution).
    fn gas_required(&self, input: &[u8]) -> u64;
    /// Run the precompile. An `Err` means the call consumes all its gas and
    /// returns `success = 0` with no output, same as any other exceptional
    /// halt (spec.md §4.4).
    fn execute(&self, input: &[u8]) -> Result<Vec<u8>>;
}

/// Reads `input[offset..offset+32]` as a big-endian `U256`, zero-padding
/// past the end of `input` (every precompile's calldata is conceptually
/// infinite, zero-extended).
fn read_u256(input: &[u8], offset: usize) -> U256 {
    let mut buf = [0u8; 32];
    let len = input.len();
    if offset < len {
        let end = cmp::min(offset + 32, len);
        buf[..end - offset].copy_from_slice(&input[offset..end]);
    }
    U256::from_big_endian(&buf)
}

fn read_slice_padded(input: &[u8], offset: usize, size: usize) -> Vec<u8> {
    let mut out = vec![0u8; size];
    let len = input.len();
    if offset < len {
        let end = cmp::min(offset + size, len);
        out[..end - offset].copy_from_slice(&input[offset..end]);
    }
    out
}

/// `0x01`: recovers the signer address of a secp256k1 signature.
pub struct EcRecover;

impl Precompile for EcRecover {
    fn gas_required(&self, _input: &[u8]) -> u64 {
        3_000
    }

    fn execute(&self, input: &[u8]) -> Result<Vec<u8>> {
        let hash = H256::from_slice(&read_slice_padded(input, 0, 32));
        let v = read_u256(input, 32);
        let r = H256::from_slice(&read_slice_padded(input, 64, 32));
        let s = H256::from_slice(&read_slice_padded(input, 96, 32));

        let bit = if v == U256::from(27) {
            0
        } else if v == U256::from(28) {
            1
        } else {
            return Ok(Vec::new());
        };

        let mut sig = [0u8; 65];
        sig[0..32].copy_from_slice(r.as_bytes());
        sig[32..64].copy_from_slice(s.as_bytes());
        sig[64] = bit;

        let message = match Message::from_slice(hash.as_bytes()) {
            Ok(m) => m,
            Err(_) => return Ok(Vec::new()),
        };
        let signature = Signature::from_rsv(&r, &s, bit);
        match recover(&signature, &message) {
            Ok(public) => {
                let address = public_to_address(&public);
                let mut out = vec![0u8; 32];
                out[12..32].copy_from_slice(address.as_bytes());
                Ok(out)
            }
            Err(_) => Ok(Vec::new()),
        }
    }
}

/// `0x02`: SHA-256.
pub struct Sha256;

impl Precompile for Sha256 {
    fn gas_required(&self, input: &[u8]) -> u64 {
        60 + 12 * ((input.len() as u64 + 31) / 32)
    }

    fn execute(&self, input: &[u8]) -> Result<Vec<u8>> {
        use sha2::Digest;
        let mut hasher = sha2::Sha256::new();
        hasher.input(input);
        Ok(hasher.result().to_vec())
    }
}

/// `0x03`: RIPEMD-160, left-padded to 32 bytes.
pub struct Ripemd160;

impl Precompile for Ripemd160 {
    fn gas_required(&self, input: &[u8]) -> u64 {
        600 + 120 * ((input.len() as u64 + 31) / 32)
    }

    fn execute(&self, input: &[u8]) -> Result<Vec<u8>> {
        use ripemd160::Digest;
        let mut hasher = ripemd160::Ripemd160::new();
        hasher.input(input);
        let digest = hasher.result();
        let mut out = vec![0u8; 32];
        out[12..32].copy_from_slice(&digest);
        Ok(out)
    }
}

/// `0x04`: returns its input unchanged.
pub struct Identity;

impl Precompile for Identity {
    fn gas_required(&self, input: &[u8]) -> u64 {
        15 + 3 * ((input.len() as u64 + 31) / 32)
    }

    fn execute(&self, input: &[u8]) -> Result<Vec<u8>> {
        Ok(input.to_vec())
    }
}

/// `0x05`: `base^exp % modulus` over arbitrary-length big integers
/// (EIP-198/EIP-2565).
pub struct Modexp;

impl Modexp {
    fn lengths(input: &[u8]) -> (usize, usize, usize) {
        let base_len = read_u256(input, 0).low_u64() as usize;
        let exp_len = read_u256(input, 32).low_u64() as usize;
        let mod_len = read_u256(input, 64).low_u64() as usize;
        (base_len, exp_len, mod_len)
    }

    /// EIP-2565 `ceil(max(len,8)/8)^2` multiplication-complexity estimate.
    fn mult_complexity(x: u64) -> u64 {
        let words = (x + 7) / 8;
        words * words
    }
}

impl Precompile for Modexp {
    fn gas_required(&self, input: &[u8]) -> u64 {
        let (base_len, exp_len, mod_len) = Self::lengths(input);
        let header_len = 96;

        let exp_bytes = read_slice_padded(input, header_len + base_len, cmp::min(exp_len, 32));
        let exp_low = BigUint::from_bytes_be(&exp_bytes);
        let adjusted_exp_len = if exp_len <= 32 {
            if exp_low.is_zero() {
                0
            } else {
                (exp_low.bits() as u64).saturating_sub(1)
            }
        } else {
            let top = if exp_low.is_zero() {
                0
            } else {
                (exp_low.bits() as u64).saturating_sub(1)
            };
            8 * (exp_len as u64 - 32) + top
        };

        let max_len = cmp::max(base_len, mod_len) as u64;
        let gas = Self::mult_complexity(max_len) * cmp::max(adjusted_exp_len, 1) / 3;
        cmp::max(gas, 200)
    }

    fn execute(&self, input: &[u8]) -> Result<Vec<u8>> {
        let (base_len, exp_len, mod_len) = Self::lengths(input);
        let header_len = 96;

        let base = BigUint::from_bytes_be(&read_slice_padded(input, header_len, base_len));
        let exp = BigUint::from_bytes_be(&read_slice_padded(input, header_len + base_len, exp_len));
        let modulus = BigUint::from_bytes_be(&read_slice_padded(
            input,
            header_len + base_len + exp_len,
            mod_len,
        ));

        let result = if modulus.is_zero() {
            BigUint::zero()
        } else {
            base.modpow(&exp, &modulus)
        };

        let mut out = vec![0u8; mod_len];
        let bytes = result.to_bytes_be();
        let bytes = if bytes == [0] { &[][..] } else { &bytes[..] };
        if bytes.len() <= mod_len {
            out[mod_len - bytes.len()..].copy_from_slice(bytes);
        }
        Ok(out)
    }
}

fn bn128_field_element(input: &[u8], offset: usize) -> Result<bn::Fq> {
    bn::Fq::from_slice(&read_slice_padded(input, offset, 32)).map_err(|_| "invalid field element")
}

fn bn128_g1_point(input: &[u8], offset: usize) -> Result<bn::G1> {
    let px = bn128_field_element(input, offset)?;
    let py = bn128_field_element(input, offset + 32)?;
    if px.is_zero() && py.is_zero() {
        Ok(bn::G1::zero())
    } else {
        bn::AffineG1::new(px, py)
            .map(Into::into)
            .map_err(|_| "invalid curve point")
    }
}

/// `0x06`: ALT_BN128 point addition.
pub struct Bn128Add;

impl Precompile for Bn128Add {
    fn gas_required(&self, _input: &[u8]) -> u64 {
        150
    }

    fn execute(&self, input: &[u8]) -> Result<Vec<u8>> {
        let p1 = bn128_g1_point(input, 0)?;
        let p2 = bn128_g1_point(input, 64)?;

        let mut out = vec![0u8; 64];
        if let Some(sum) = bn::AffineG1::from_jacobian(p1 + p2) {
            sum.x().to_big_endian(&mut out[0..32]).map_err(|_| "field encode error")?;
            sum.y().to_big_endian(&mut out[32..64]).map_err(|_| "field encode error")?;
        }
        Ok(out)
    }
}

/// `0x07`: ALT_BN128 scalar multiplication.
pub struct Bn128Mul;

impl Precompile for Bn128Mul {
    fn gas_required(&self, _input: &[u8]) -> u64 {
        6_000
    }

    fn execute(&self, input: &[u8]) -> Result<Vec<u8>> {
        let p = bn128_g1_point(input, 0)?;
        let scalar_bytes = read_slice_padded(input, 64, 32);
        let scalar = bn::Fr::from_slice(&scalar_bytes).map_err(|_| "invalid scalar")?;

        let mut out = vec![0u8; 64];
        if let Some(product) = bn::AffineG1::from_jacobian(p * scalar) {
            product.x().to_big_endian(&mut out[0..32]).map_err(|_| "field encode error")?;
            product.y().to_big_endian(&mut out[32..64]).map_err(|_| "field encode error")?;
        }
        Ok(out)
    }
}

/// `0x08`: ALT_BN128 pairing check.
pub struct Bn128Pairing;

impl Precompile for Bn128Pairing {
    fn gas_required(&self, input: &[u8]) -> u64 {
        let pairs = input.len() as u64 / 192;
        45_000 + 34_000 * pairs
    }

    fn execute(&self, input: &[u8]) -> Result<Vec<u8>> {
        if input.len() % 192 != 0 {
            return Err("invalid input length, must be multiple of 192 bytes");
        }

        let mut pairs = Vec::with_capacity(input.len() / 192);
        for chunk in input.chunks(192) {
            let p = bn128_g1_point(chunk, 0)?;

            let ax = bn128_field_element(chunk, 64)?;
            let ay = bn128_field_element(chunk, 96)?;
            let bx = bn128_field_element(chunk, 128)?;
            let by = bn128_field_element(chunk, 160)?;
            let twist_x = bn::Fq2::new(ay, ax);
            let twist_y = bn::Fq2::new(by, bx);

            let q = if twist_x.is_zero() && twist_y.is_zero() {
                bn::G2::zero()
            } else {
                bn::AffineG2::new(twist_x, twist_y)
                    .map(Into::into)
                    .map_err(|_| "invalid curve point")?
            };
            pairs.push((p, q));
        }

        let success = bn::pairing_batch(&pairs) == bn::Gt::one();
        let mut out = vec![0u8; 32];
        if success {
            out[31] = 1;
        }
        Ok(out)
    }
}

/// `0x09`: the BLAKE2b `F` compression function (EIP-152), exposed so smart
/// contracts can implement BLAKE2b-based protocols natively.
pub struct Blake2F;

impl Blake2F {
    const INPUT_LENGTH: usize = 213;
}

impl Precompile for Blake2F {
    fn gas_required(&self, input: &[u8]) -> u64 {
        if input.len() != Self::INPUT_LENGTH {
            return 0;
        }
        BigEndian::read_u32(&input[0..4]) as u64
    }

    fn execute(&self, input: &[u8]) -> Result<Vec<u8>> {
        if input.len() != Self::INPUT_LENGTH {
            return Err("input length for Blake2 F precompile should be exactly 213 bytes");
        }

        let rounds = BigEndian::read_u32(&input[0..4]);
        let f = match input[212] {
            0 => false,
            1 => true,
            _ => return Err("incorrect final block indicator flag"),
        };

        let mut h = [0u64; 8];
        for (i, word) in h.iter_mut().enumerate() {
            *word = u64::from_le_bytes(input[4 + i * 8..12 + i * 8].try_into().unwrap());
        }
        let mut m = [0u64; 16];
        for (i, word) in m.iter_mut().enumerate() {
            *word = u64::from_le_bytes(input[68 + i * 8..76 + i * 8].try_into().unwrap());
        }
        let t = [
            u64::from_le_bytes(input[196..204].try_into().unwrap()),
            u64::from_le_bytes(input[204..212].try_into().unwrap()),
        ];

        eip_152::compress(&mut h, m, t, f, rounds as usize);

        let mut out = vec![0u8; 64];
        for (i, word) in h.iter().enumerate() {
            out[i * 8..i * 8 + 8].copy_from_slice(&word.to_le_bytes());
        }
        Ok(out)
    }
}

/// Builds the address -> precompile table for addresses `0x01..0x11`.
pub fn builtins() -> BTreeMap<ethereum_types::Address, Box<dyn Precompile>> {
    let mut map: BTreeMap<ethereum_types::Address, Box<dyn Precompile>> = BTreeMap::new();
    map.insert(ethereum_types::Address::from_low_u64_be(1), Box::new(EcRecover));
    map.insert(ethereum_types::Address::from_low_u64_be(2), Box::new(Sha256));
    map.insert(ethereum_types::Address::from_low_u64_be(3), Box::new(Ripemd160));
    map.insert(ethereum_types::Address::from_low_u64_be(4), Box::new(Identity));
    map.insert(ethereum_types::Address::from_low_u64_be(5), Box::new(Modexp));
    map.insert(ethereum_types::Address::from_low_u64_be(6), Box::new(Bn128Add));
    map.insert(ethereum_types::Address::from_low_u64_be(7), Box::new(Bn128Mul));
    map.insert(ethereum_types::Address::from_low_u64_be(8), Box::new(Bn128Pairing));
    map.insert(ethereum_types::Address::from_low_u64_be(9), Box::new(Blake2F));
    map.insert(ethereum_types::Address::from_low_u64_be(0x0a), Box::new(PointEvaluation));
    map.insert(ethereum_types::Address::from_low_u64_be(0x0b), Box::new(Bls12G1Add));
    map.insert(ethereum_types::Address::from_low_u64_be(0x0c), Box::new(Bls12G1Msm));
    map.insert(ethereum_types::Address::from_low_u64_be(0x0d), Box::new(Bls12G2Add));
    map.insert(ethereum_types::Address::from_low_u64_be(0x0e), Box::new(Bls12G2Msm));
    map.insert(ethereum_types::Address::from_low_u64_be(0x0f), Box::new(Bls12Pairing));
    map.insert(ethereum_types::Address::from_low_u64_be(0x10), Box::new(Bls12MapFpToG1));
    map.insert(ethereum_types::Address::from_low_u64_be(0x11), Box::new(Bls12MapFp2ToG2));
    map
}

/// Largest builtin address, for cheap "is this even a builtin" range checks
/// in the caller (addresses past this are ordinary accounts).
pub fn max_builtin_address() -> ethereum_types::Address {
    ethereum_types::Address::from_low_u64_be(0x11)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_echoes_input() {
        let out = Identity.execute(b"hello").unwrap();
        assert_eq!(out, b"hello");
    }

    #[test]
    fn sha256_hashes_empty_input() {
        let out = Sha256.execute(&[]).unwrap();
        let expected: Vec<u8> = (0..32)
            .map(|i| {
                u8::from_str_radix(
                    &"e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
                        [i * 2..i * 2 + 2],
                    16,
                )
                .unwrap()
            })
            .collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn modexp_zero_modulus_returns_zero() {
        // base_len=1, exp_len=1, mod_len=1, base=2, exp=2, modulus=0
        let mut input = vec![0u8; 96];
        input[31] = 1;
        input[63] = 1;
        input[95] = 1;
        input.push(2); // base
        input.push(2); // exp
        input.push(0); // modulus
        let out = Modexp.execute(&input).unwrap();
        assert_eq!(out, vec![0u8]);
    }

    #[test]
    fn builtins_cover_addresses_one_through_0x11() {
        let table = builtins();
        assert_eq!(table.len(), 17);
        assert!(table.contains_key(&ethereum_types::Address::from_low_u64_be(0x0a)));
        assert!(table.contains_key(&ethereum_types::Address::from_low_u64_be(0x11)));
    }
}
