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

//! `0x0a`: EIP-4844 `POINT_EVALUATION`, verifying that a KZG commitment opens
//! to a claimed value at a claimed point, and that the commitment matches a
//! blob's versioned hash.

use crate::{Precompile, Result};
use c_kzg::{Bytes32, Bytes48, KzgProof, KzgSettings};
use ethereum_types::U256;
use sha2::Digest;
use std::convert::TryInto;
use std::env;

const VERSIONED_HASH_VERSION_KZG: u8 = 1;
const FIELD_ELEMENTS_PER_BLOB: u64 = 4096;
const BLS_MODULUS: &str = "52435875175126190479447740508185965837690552500527637822603658699938581184513";
const GAS_COST: u64 = 50_000;

lazy_static::lazy_static! {
    /// Loaded from `ETHCORE_KZG_TRUSTED_SETUP`, lazily, once. A node that
    /// hasn't been pointed at a trusted setup file fails every
    /// `POINT_EVALUATION` call, same as it would fail to validate any
    /// blob-carrying block.
    static ref TRUSTED_SETUP: std::result::Result<KzgSettings, String> = {
        let path = env::var("ETHCORE_KZG_TRUSTED_SETUP")
            .map_err(|_| "ETHCORE_KZG_TRUSTED_SETUP not set".to_string())?;
        KzgSettings::load_trusted_setup_file(path.as_ref())
            .map_err(|e| format!("failed to load KZG trusted setup: {:?}", e))
    };
}

fn matches_versioned_hash(commitment: &[u8], versioned_hash: &[u8]) -> bool {
    let mut hasher = sha2::Sha256::new();
    hasher.input(commitment);
    let mut hash = hasher.result().to_vec();
    hash[0] = VERSIONED_HASH_VERSION_KZG;
    hash == versioned_hash
}

pub struct PointEvaluation;

impl Precompile for PointEvaluation {
    fn gas_required(&self, _input: &[u8]) -> u64 {
        GAS_COST
    }

    fn execute(&self, input: &[u8]) -> Result<Vec<u8>> {
        if input.len() != 192 {
            return Err("invalid input length, must be 192 bytes");
        }

        let versioned_hash = &input[0..32];
        let z = &input[32..64];
        let y = &input[64..96];
        let commitment = &input[96..144];
        let proof = &input[144..192];

        if !matches_versioned_hash(commitment, versioned_hash) {
            return Err("commitment does not match versioned hash");
        }

        let settings = TRUSTED_SETUP.as_ref().map_err(|_| "KZG trusted setup unavailable")?;

        let commitment: [u8; 48] = commitment.try_into().expect("slice is 48 bytes");
        let commitment = Bytes48::new(commitment);
        let z: [u8; 32] = z.try_into().expect("slice is 32 bytes");
        let z = Bytes32::new(z);
        let y: [u8; 32] = y.try_into().expect("slice is 32 bytes");
        let y = Bytes32::new(y);
        let proof: [u8; 48] = proof.try_into().expect("slice is 48 bytes");
        let proof = Bytes48::new(proof);

        let valid = KzgProof::verify_kzg_proof(&commitment, &z, &y, &proof, settings)
            .map_err(|_| "KZG proof verification failed")?;
        if !valid {
            return Err("invalid KZG proof");
        }

        let mut out = vec![0u8; 64];
        U256::from(FIELD_ELEMENTS_PER_BLOB).to_big_endian(&mut out[0..32]);
        U256::from_dec_str(BLS_MODULUS)
            .expect("BLS_MODULUS is a valid decimal literal")
            .to_big_endian(&mut out[32..64]);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_length_input() {
        let err = PointEvaluation.execute(&[0u8; 10]).unwrap_err();
        assert_eq!(err, "invalid input length, must be 192 bytes");
    }

    #[test]
    fn rejects_commitment_hash_mismatch() {
        let input = vec![0u8; 192];
        let err = PointEvaluation.execute(&input).unwrap_err();
        assert_eq!(err, "commitment does not match versioned hash");
    }

    #[test]
    fn gas_cost_is_fixed() {
        assert_eq!(PointEvaluation.gas_required(&[]), 50_000);
        assert_eq!(PointEvaluation.gas_required(&[0u8; 192]), 50_000);
    }
}
