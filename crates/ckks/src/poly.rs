// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! Polynomials in `Z_Q[X]/(X^N + 1)` with the composite modulus `Q` held
//! as independent residue rows, one per prime.

use crate::ntt::NttTable;
use crate::zq::{add_mod, mul_mod, neg_mod, sub_mod};
use serde::{Deserialize, Serialize};

/// Residue-number-system polynomial. Row `i` holds the coefficients (or
/// NTT evaluations) modulo the `i`-th prime of the active basis; the basis
/// itself lives with the context, keyed by chain position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RnsPoly {
    pub rows: Vec<Vec<u64>>,
    pub ntt_form: bool,
}

impl RnsPoly {
    pub fn zero(row_count: usize, degree: usize, ntt_form: bool) -> Self {
        Self {
            rows: vec![vec![0u64; degree]; row_count],
            ntt_form,
        }
    }

    /// Lift small signed coefficients into every residue row (coefficient
    /// form).
    pub fn from_signed(coeffs: &[i64], moduli: &[u64]) -> Self {
        let rows = moduli
            .iter()
            .map(|&q| {
                coeffs
                    .iter()
                    .map(|&c| (c.rem_euclid(q as i64)) as u64)
                    .collect()
            })
            .collect();
        Self {
            rows,
            ntt_form: false,
        }
    }

    /// Lift wide signed coefficients (freshly encoded values) into every
    /// residue row (coefficient form).
    pub fn from_wide(coeffs: &[i128], moduli: &[u64]) -> Self {
        let rows = moduli
            .iter()
            .map(|&q| {
                coeffs
                    .iter()
                    .map(|&c| (c.rem_euclid(q as i128)) as u64)
                    .collect()
            })
            .collect();
        Self {
            rows,
            ntt_form: false,
        }
    }

    pub fn degree(&self) -> usize {
        self.rows.first().map(Vec::len).unwrap_or(0)
    }

    pub fn to_ntt(&mut self, tables: &[NttTable]) {
        debug_assert!(!self.ntt_form);
        debug_assert_eq!(self.rows.len(), tables.len());
        for (row, table) in self.rows.iter_mut().zip(tables) {
            table.forward(row);
        }
        self.ntt_form = true;
    }

    pub fn to_coeff(&mut self, tables: &[NttTable]) {
        debug_assert!(self.ntt_form);
        debug_assert_eq!(self.rows.len(), tables.len());
        for (row, table) in self.rows.iter_mut().zip(tables) {
            table.inverse(row);
        }
        self.ntt_form = false;
    }

    pub fn add_assign(&mut self, other: &Self, moduli: &[u64]) {
        debug_assert_eq!(self.ntt_form, other.ntt_form);
        for ((a, b), &q) in self.rows.iter_mut().zip(&other.rows).zip(moduli) {
            for (x, &y) in a.iter_mut().zip(b) {
                *x = add_mod(*x, y, q);
            }
        }
    }

    pub fn sub_assign(&mut self, other: &Self, moduli: &[u64]) {
        debug_assert_eq!(self.ntt_form, other.ntt_form);
        for ((a, b), &q) in self.rows.iter_mut().zip(&other.rows).zip(moduli) {
            for (x, &y) in a.iter_mut().zip(b) {
                *x = sub_mod(*x, y, q);
            }
        }
    }

    pub fn neg_assign(&mut self, moduli: &[u64]) {
        for (row, &q) in self.rows.iter_mut().zip(moduli) {
            for x in row.iter_mut() {
                *x = neg_mod(*x, q);
            }
        }
    }

    /// Pointwise product; both operands must be in evaluation form.
    pub fn mul(&self, other: &Self, moduli: &[u64]) -> Self {
        debug_assert!(self.ntt_form && other.ntt_form);
        let rows = self
            .rows
            .iter()
            .zip(&other.rows)
            .zip(moduli)
            .map(|((a, b), &q)| {
                a.iter()
                    .zip(b)
                    .map(|(&x, &y)| mul_mod(x, y, q))
                    .collect()
            })
            .collect();
        Self {
            rows,
            ntt_form: true,
        }
    }

    /// Fused accumulation `self += a ⊙ b` in evaluation form.
    pub fn add_mul_assign(&mut self, a: &Self, b: &Self, moduli: &[u64]) {
        debug_assert!(self.ntt_form && a.ntt_form && b.ntt_form);
        for (((acc, x), y), &q) in self
            .rows
            .iter_mut()
            .zip(&a.rows)
            .zip(&b.rows)
            .zip(moduli)
        {
            for ((r, &u), &v) in acc.iter_mut().zip(x).zip(y) {
                *r = add_mod(*r, mul_mod(u, v, q), q);
            }
        }
    }

    /// The Galois automorphism `X → X^g` on a coefficient-form polynomial.
    pub fn automorphism(&self, g: usize, moduli: &[u64]) -> Self {
        debug_assert!(!self.ntt_form);
        let n = self.degree();
        let two_n = 2 * n;
        let rows = self
            .rows
            .iter()
            .zip(moduli)
            .map(|(row, &q)| {
                let mut out = vec![0u64; n];
                for (i, &c) in row.iter().enumerate() {
                    let j = (i * g) % two_n;
                    if j < n {
                        out[j] = c;
                    } else {
                        out[j - n] = neg_mod(c, q);
                    }
                }
                out
            })
            .collect();
        Self {
            rows,
            ntt_form: false,
        }
    }

    /// Restrict to the first `row_count` residue rows.
    pub fn truncated(&self, row_count: usize) -> Self {
        Self {
            rows: self.rows[..row_count].to_vec(),
            ntt_form: self.ntt_form,
        }
    }
}
