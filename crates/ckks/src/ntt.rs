// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! Negacyclic number-theoretic transform over one prime field.
//!
//! The twiddle factors are powers of a primitive `2N`-th root of unity
//! stored in bit-reversed order, so the forward transform (Cooley-Tukey)
//! and the inverse transform (Gentleman-Sande) run without separate
//! pre/post twisting.

use crate::error::CkksError;
use crate::zq::{add_mod, inv_mod, mul_mod, primitive_root, sub_mod};

#[derive(Debug, Clone)]
pub struct NttTable {
    pub modulus: u64,
    degree: usize,
    psi_rev: Vec<u64>,
    ipsi_rev: Vec<u64>,
    degree_inv: u64,
}

fn bit_reverse(value: usize, bits: u32) -> usize {
    value.reverse_bits() >> (usize::BITS - bits)
}

impl NttTable {
    pub fn new(degree: usize, modulus: u64) -> Result<Self, CkksError> {
        let psi = primitive_root(modulus, 2 * degree as u64)?;
        let ipsi = inv_mod(psi, modulus);
        let bits = degree.trailing_zeros();

        let mut psi_rev = vec![0u64; degree];
        let mut ipsi_rev = vec![0u64; degree];
        let mut power = 1u64;
        let mut ipower = 1u64;
        for i in 0..degree {
            psi_rev[bit_reverse(i, bits)] = power;
            ipsi_rev[bit_reverse(i, bits)] = ipower;
            power = mul_mod(power, psi, modulus);
            ipower = mul_mod(ipower, ipsi, modulus);
        }

        Ok(Self {
            modulus,
            degree,
            psi_rev,
            ipsi_rev,
            degree_inv: inv_mod(degree as u64, modulus),
        })
    }

    /// Coefficient form to evaluation form.
    pub fn forward(&self, a: &mut [u64]) {
        debug_assert_eq!(a.len(), self.degree);
        let q = self.modulus;
        let n = self.degree;
        let mut t = n;
        let mut m = 1;
        while m < n {
            t >>= 1;
            for i in 0..m {
                let s = self.psi_rev[m + i];
                let j1 = 2 * i * t;
                for j in j1..j1 + t {
                    let u = a[j];
                    let v = mul_mod(a[j + t], s, q);
                    a[j] = add_mod(u, v, q);
                    a[j + t] = sub_mod(u, v, q);
                }
            }
            m <<= 1;
        }
    }

    /// Evaluation form back to coefficient form.
    pub fn inverse(&self, a: &mut [u64]) {
        debug_assert_eq!(a.len(), self.degree);
        let q = self.modulus;
        let n = self.degree;
        let mut t = 1;
        let mut m = n;
        while m > 1 {
            let h = m >> 1;
            let mut j1 = 0;
            for i in 0..h {
                let s = self.ipsi_rev[h + i];
                for j in j1..j1 + t {
                    let u = a[j];
                    let v = a[j + t];
                    a[j] = add_mod(u, v, q);
                    a[j + t] = mul_mod(sub_mod(u, v, q), s, q);
                }
                j1 += 2 * t;
            }
            t <<= 1;
            m = h;
        }
        for x in a.iter_mut() {
            *x = mul_mod(*x, self.degree_inv, q);
        }
    }
}
