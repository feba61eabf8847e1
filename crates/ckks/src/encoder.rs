// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! Canonical-embedding encoder.
//!
//! A real vector of up to `N / 2` slots is placed on the orbit of `5`
//! inside the odd powers of a primitive `2N`-th root of unity; one inverse
//! FFT of size `N` plus a `zeta^i` twist turns the slot values into ring
//! coefficients, which are scaled and rounded into RNS residues.

use crate::context::CkksContext;
use crate::error::CkksError;
use crate::poly::RnsPoly;
use crate::zq::mul_mod;
use num::complex::Complex64;
use num_bigint::{BigInt, BigUint};
use num_traits::ToPrimitive;
use std::f64::consts::PI;

/// An encoded (unencrypted) vector together with its scale and chain
/// position.
#[derive(Debug, Clone)]
pub struct Plaintext {
    pub poly: RnsPoly,
    pub scale: f64,
    pub pos: usize,
}

/// In-place radix-2 FFT; `invert` selects the inverse transform (negative
/// exponent kernel and 1/N normalization).
fn fft(a: &mut [Complex64], invert: bool) {
    let n = a.len();
    let mut j = 0usize;
    for i in 1..n {
        let mut bit = n >> 1;
        while j & bit != 0 {
            j ^= bit;
            bit >>= 1;
        }
        j |= bit;
        if i < j {
            a.swap(i, j);
        }
    }

    let mut len = 2;
    while len <= n {
        let angle = 2.0 * PI / len as f64 * if invert { -1.0 } else { 1.0 };
        let step = Complex64::from_polar(1.0, angle);
        for chunk in a.chunks_mut(len) {
            let mut w = Complex64::new(1.0, 0.0);
            for k in 0..len / 2 {
                let u = chunk[k];
                let v = chunk[k + len / 2] * w;
                chunk[k] = u + v;
                chunk[k + len / 2] = u - v;
                w *= step;
            }
        }
        len <<= 1;
    }

    if invert {
        let scale = 1.0 / n as f64;
        for x in a.iter_mut() {
            *x *= scale;
        }
    }
}

impl CkksContext {
    /// Encode a real vector at the given scale and chain position.
    pub fn encode(
        &self,
        values: &[f64],
        scale: f64,
        pos: usize,
    ) -> Result<Plaintext, CkksError> {
        let n = self.params.degree;
        let slots = self.params.slots();
        if values.len() > slots {
            return Err(CkksError::TooManyValues(values.len(), slots));
        }

        let mut embedding = vec![Complex64::new(0.0, 0.0); n];
        for (k, &v) in values.iter().enumerate() {
            let j = self.slot_index[k];
            embedding[j] = Complex64::new(v, 0.0);
            embedding[n - 1 - j] = Complex64::new(v, 0.0);
        }
        fft(&mut embedding, true);

        let mut coeffs = vec![0i128; n];
        for (i, (c, t)) in coeffs.iter_mut().zip(&embedding).enumerate() {
            let twist = Complex64::from_polar(1.0, -PI * i as f64 / n as f64);
            *c = ((t * twist).re * scale).round() as i128;
        }

        let mut poly = RnsPoly::from_wide(&coeffs, self.moduli_at(pos));
        poly.to_ntt(self.tables_at(pos));
        Ok(Plaintext { poly, scale, pos })
    }

    /// Encode one scalar replicated into every slot. The constant
    /// polynomial `round(value * scale)` evaluates to the same value at
    /// every embedding point, so no FFT is needed.
    pub fn encode_replicated(
        &self,
        value: f64,
        scale: f64,
        pos: usize,
    ) -> Result<Plaintext, CkksError> {
        let n = self.params.degree;
        let mut coeffs = vec![0i128; n];
        coeffs[0] = (value * scale).round() as i128;
        let mut poly = RnsPoly::from_wide(&coeffs, self.moduli_at(pos));
        poly.to_ntt(self.tables_at(pos));
        Ok(Plaintext { poly, scale, pos })
    }

    /// Decode a plaintext back into its full slot vector.
    pub fn decode(&self, plain: &Plaintext) -> Vec<f64> {
        let n = self.params.degree;
        let mut poly = plain.poly.clone();
        poly.to_coeff(self.tables_at(plain.pos));

        let basis = &self.crt[plain.pos];
        let moduli = self.moduli_at(plain.pos);
        let mut buf = vec![Complex64::new(0.0, 0.0); n];
        for (i, slot) in buf.iter_mut().enumerate() {
            let mut acc = BigUint::from(0u32);
            for (j, row) in poly.rows.iter().enumerate() {
                let weight = mul_mod(row[i], basis.inv[j], moduli[j]);
                acc += &basis.punctured[j] * BigUint::from(weight);
            }
            acc %= &basis.product;
            let centered = if acc > basis.half {
                BigInt::from(acc) - BigInt::from(basis.product.clone())
            } else {
                BigInt::from(acc)
            };
            let value = centered.to_f64().unwrap_or(0.0) / plain.scale;
            let twist = Complex64::from_polar(1.0, PI * i as f64 / n as f64);
            *slot = Complex64::new(value, 0.0) * twist;
        }

        fft(&mut buf, false);
        self.slot_index.iter().map(|&j| buf[j].re).collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::context::CkksContext;
    use crate::error::CkksError;
    use crate::params::CkksParams;

    fn context(degree: usize) -> std::sync::Arc<CkksContext> {
        CkksContext::new(CkksParams::new(degree, 2, 2f64.powi(40)).unwrap()).unwrap()
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let ctx = context(64);
        let values = [3.5, -1.25, 0.0, 123456.789, 2.0e-3];
        let plain = ctx.encode(&values, 2f64.powi(40), 0).unwrap();
        let decoded = ctx.decode(&plain);
        for (d, v) in decoded.iter().zip(&values) {
            assert!((d - v).abs() < 1e-6, "expected {v}, got {d}");
        }
        for d in &decoded[values.len()..] {
            assert!(d.abs() < 1e-6);
        }
    }

    #[test]
    fn test_replicated_encoding_hits_every_slot() {
        let ctx = context(64);
        let plain = ctx.encode_replicated(-7.5, 2f64.powi(40), 0).unwrap();
        for slot in ctx.decode(&plain) {
            assert!((slot + 7.5).abs() < 1e-9);
        }
    }

    #[test]
    fn test_overfull_vector_rejected() {
        let ctx = context(64);
        let too_long = vec![1.0; 33];
        assert!(matches!(
            ctx.encode(&too_long, 2f64.powi(40), 0),
            Err(CkksError::TooManyValues(33, 32))
        ));
    }
}
