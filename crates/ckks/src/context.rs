// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::error::CkksError;
use crate::ntt::NttTable;
use crate::params::CkksParams;
use crate::zq::{inv_mod, pow_mod};
use num_bigint::BigUint;
use std::sync::Arc;

/// Per-chain-position CRT data for reconstructing centered coefficients.
#[derive(Debug, Clone)]
pub(crate) struct CrtBasis {
    pub product: BigUint,
    pub half: BigUint,
    /// `Q / q_i` for each active prime.
    pub punctured: Vec<BigUint>,
    /// `(Q / q_i)^{-1} mod q_i` for each active prime.
    pub inv: Vec<u64>,
}

/// Precomputed state shared by every key, plaintext and ciphertext derived
/// from one parameter set.
#[derive(Debug)]
pub struct CkksContext {
    pub params: CkksParams,
    /// Ciphertext primes followed by the special prime.
    pub(crate) moduli_ext: Vec<u64>,
    /// NTT tables in the same order as `moduli_ext`.
    pub(crate) tables: Vec<NttTable>,
    /// `special^{-1} mod q_i` for the key-switch mod-down.
    pub(crate) special_inv: Vec<u64>,
    /// `q_i^{-1} mod q_j` (j < i) for rescaling.
    pub(crate) drop_inv: Vec<Vec<u64>>,
    pub(crate) crt: Vec<CrtBasis>,
    /// Slot position of each canonical-embedding orbit element.
    pub(crate) slot_index: Vec<usize>,
}

impl CkksContext {
    pub fn new(params: CkksParams) -> Result<Arc<Self>, CkksError> {
        let degree = params.degree;
        let mut moduli_ext = params.moduli.clone();
        moduli_ext.push(params.special);
        let tables = moduli_ext
            .iter()
            .map(|&q| NttTable::new(degree, q))
            .collect::<Result<Vec<_>, _>>()?;

        let special_inv = params
            .moduli
            .iter()
            .map(|&q| inv_mod(params.special % q, q))
            .collect();

        let drop_inv = (0..params.moduli.len())
            .map(|i| {
                (0..i)
                    .map(|j| inv_mod(params.moduli[i] % params.moduli[j], params.moduli[j]))
                    .collect()
            })
            .collect();

        let crt = (0..params.level)
            .map(|pos| {
                let active = &params.moduli[..params.level - pos];
                let product = active.iter().map(|&q| BigUint::from(q)).product::<BigUint>();
                let punctured: Vec<BigUint> = active
                    .iter()
                    .map(|&q| &product / BigUint::from(q))
                    .collect();
                let inv = active
                    .iter()
                    .zip(&punctured)
                    .map(|(&q, p)| {
                        let reduced: u64 =
                            (p % BigUint::from(q)).try_into().expect("residue fits u64");
                        inv_mod(reduced, q)
                    })
                    .collect();
                CrtBasis {
                    half: &product / 2u32,
                    product,
                    punctured,
                    inv,
                }
            })
            .collect();

        // Orbit of 5 modulo 2N: slot k of the embedding is the evaluation
        // at zeta^(5^k), which is the odd power 2*j + 1 with j stored here.
        let two_n = 2 * degree as u64;
        let mut slot_index = Vec::with_capacity(degree / 2);
        let mut power = 1u64;
        for _ in 0..degree / 2 {
            slot_index.push(((power - 1) / 2) as usize);
            power = power * 5 % two_n;
        }

        Ok(Arc::new(Self {
            params,
            moduli_ext,
            tables,
            special_inv,
            drop_inv,
            crt,
            slot_index,
        }))
    }

    /// Number of active ciphertext primes at a chain position.
    pub fn active(&self, pos: usize) -> usize {
        debug_assert!(pos < self.params.level);
        self.params.level - pos
    }

    pub(crate) fn tables_at(&self, pos: usize) -> &[NttTable] {
        &self.tables[..self.active(pos)]
    }

    pub fn moduli_at(&self, pos: usize) -> &[u64] {
        &self.params.moduli[..self.active(pos)]
    }

    /// All key-material primes: the full ciphertext chain plus the special
    /// prime.
    pub(crate) fn key_moduli(&self) -> &[u64] {
        &self.moduli_ext
    }

    pub(crate) fn key_tables(&self) -> &[NttTable] {
        &self.tables
    }

    /// The Galois group element realizing a left rotation by `steps` slots.
    pub fn galois_element(&self, steps: usize) -> usize {
        let two_n = 2 * self.params.degree as u64;
        pow_mod(5, steps as u64, two_n) as usize
    }
}
