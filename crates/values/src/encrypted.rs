// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! Encrypted vector values.
//!
//! An [`EncValue`] couples a CKKS ciphertext with the evaluation-key
//! handle it was produced under and the semantic length of the encrypted
//! vector (ciphertext slots are padded; decryption truncates back).
//!
//! Before any binary operation the two ciphertexts are normalized onto a
//! common footing: the combined scale is forced under the chain budget,
//! scales are matched by rescaling, levels are matched by modulus
//! switching, both copies are relinearized and their stored scale is
//! pinned to the canonical power of two. Normalization always works on
//! fresh copies, so values already resolved elsewhere are never mutated.

use crate::error::EvalError;
use pib_ckks::{Ciphertext, EvalKeys};
use std::sync::Arc;

#[derive(Clone)]
pub struct EncValue {
    pub ciphertext: Ciphertext,
    pub keys: Arc<EvalKeys>,
    len: usize,
    /// Retained scalar for constants bound into the formula; lets
    /// division and exponentiation use the true value instead of the
    /// ciphertext.
    pub plain: Option<f64>,
}

/// Truncated log2 of a scale, the unit the budget guard reasons in.
fn magnitude(scale: f64) -> i64 {
    scale.log2().floor() as i64
}

impl EncValue {
    pub fn new(ciphertext: Ciphertext, keys: Arc<EvalKeys>, len: usize) -> Self {
        Self {
            ciphertext,
            keys,
            len,
            plain: None,
        }
    }

    /// Encrypt a scalar constant under the same key bundle, replicated
    /// across all slots so it broadcasts elementwise. The cleartext value
    /// is retained alongside.
    pub fn constant(keys: &Arc<EvalKeys>, value: f64) -> Result<Self, EvalError> {
        let ciphertext = keys.encrypt_replicated(value)?;
        Ok(Self {
            ciphertext,
            keys: keys.clone(),
            len: 1,
            plain: Some(value),
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn byte_size(&self) -> usize {
        self.ciphertext.byte_size()
    }

    /// Normalize two operands per the chain discipline; any backend
    /// failure along the way degrades to the offload signal.
    fn normalized_pair(
        &self,
        other: &EncValue,
    ) -> Result<(Ciphertext, Ciphertext), EvalError> {
        let eval = &self.keys.evaluator;
        let budget = self.keys.ctx.params.scale_budget_bits() as i64;
        let mut a = self.ciphertext.clone();
        let mut b = other.ciphertext.clone();

        // Budget guard: burn chain on the operand with more of it left
        // (ties go to self) until the combined scale fits.
        while magnitude(a.scale) + magnitude(b.scale) > budget {
            tracing::debug!(
                self_scale = magnitude(a.scale),
                other_scale = magnitude(b.scale),
                budget,
                "combined scale over budget, rescaling"
            );
            if a.pos <= b.pos {
                a = eval.rescale_to_next(&a).map_err(|_| EvalError::Offload)?;
            } else {
                b = eval.rescale_to_next(&b).map_err(|_| EvalError::Offload)?;
            }
        }

        // Scale match: walk the larger scale down to the smaller one.
        loop {
            let (ma, mb) = (magnitude(a.scale), magnitude(b.scale));
            if ma == mb {
                break;
            }
            if ma > mb {
                a = eval.rescale_to_next(&a).map_err(|_| EvalError::Offload)?;
            } else {
                b = eval.rescale_to_next(&b).map_err(|_| EvalError::Offload)?;
            }
        }

        // Level match: meet at the deeper chain position.
        let deepest = a.pos.max(b.pos);
        a = eval
            .mod_switch_to(&a, deepest)
            .map_err(|_| EvalError::Offload)?;
        b = eval
            .mod_switch_to(&b, deepest)
            .map_err(|_| EvalError::Offload)?;

        // Relinearize and pin the stored scale to the canonical power of
        // two to suppress drift from inexact rescaling primes.
        a = eval
            .relinearize(&a, &self.keys.relin)
            .map_err(|_| EvalError::Offload)?;
        b = eval
            .relinearize(&b, &self.keys.relin)
            .map_err(|_| EvalError::Offload)?;
        a.scale = (magnitude(a.scale) as f64).exp2();
        b.scale = (magnitude(b.scale) as f64).exp2();

        Ok((a, b))
    }

    pub fn add(&self, other: &EncValue) -> Result<EncValue, EvalError> {
        let (a, b) = self.normalized_pair(other)?;
        let eval = &self.keys.evaluator;
        let sum = eval.add(&a, &b).map_err(|_| EvalError::Offload)?;
        let sum = eval
            .relinearize(&sum, &self.keys.relin)
            .map_err(|_| EvalError::Offload)?;
        Ok(EncValue::new(
            sum,
            self.keys.clone(),
            self.len.max(other.len),
        ))
    }

    pub fn sub(&self, other: &EncValue) -> Result<EncValue, EvalError> {
        let (a, b) = self.normalized_pair(other)?;
        let eval = &self.keys.evaluator;
        let diff = eval.sub(&a, &b).map_err(|_| EvalError::Offload)?;
        let diff = eval
            .relinearize(&diff, &self.keys.relin)
            .map_err(|_| EvalError::Offload)?;
        Ok(EncValue::new(
            diff,
            self.keys.clone(),
            self.len.max(other.len),
        ))
    }

    pub fn mul(&self, other: &EncValue) -> Result<EncValue, EvalError> {
        let (a, b) = self.normalized_pair(other)?;
        let eval = &self.keys.evaluator;
        let product = eval.multiply(&a, &b).map_err(|_| EvalError::Offload)?;
        let product = eval
            .relinearize(&product, &self.keys.relin)
            .map_err(|_| EvalError::Offload)?;
        let product = eval
            .rescale_to_next(&product)
            .map_err(|_| EvalError::Offload)?;
        Ok(EncValue::new(
            product,
            self.keys.clone(),
            self.len.max(other.len),
        ))
    }

    pub fn neg(&self) -> EncValue {
        let negated = self.keys.evaluator.negate(&self.ciphertext);
        EncValue::new(negated, self.keys.clone(), self.len)
    }

    /// Slot-fold the vector into its sum by rotate-and-add: one rotation
    /// per power of two, with an extra round when the length is not a
    /// power of two. Only slot 0 of the result is meaningful, matching
    /// the semantic length of 1.
    pub fn add_over_n(&self) -> Result<EncValue, EvalError> {
        if self.len <= 1 {
            let mut out = self.clone();
            out.len = 1;
            return Ok(out);
        }
        let eval = &self.keys.evaluator;
        let mut rounds = self.len.ilog2();
        if !self.len.is_power_of_two() {
            rounds += 1;
        }
        let mut cipher = self.ciphertext.clone();
        for i in 0..rounds {
            let rotated = eval
                .rotate(&cipher, 1usize << i, &self.keys.galois)
                .map_err(|_| EvalError::Offload)?;
            cipher = eval.add(&cipher, &rotated).map_err(|_| EvalError::Offload)?;
        }
        Ok(EncValue::new(cipher, self.keys.clone(), 1))
    }

    /// Division by a formula constant: multiply with the encrypted
    /// reciprocal.
    pub fn div_by_const(&self, divisor: f64) -> Result<EncValue, EvalError> {
        let reciprocal = EncValue::constant(&self.keys, 1.0 / divisor)?;
        let mut out = self.mul(&reciprocal)?;
        out.len = self.len;
        Ok(out)
    }

    /// Exponentiation by a formula constant, restricted to positive
    /// integer exponents evaluated as repeated multiplication by self.
    pub fn pow_const(&self, exponent: f64) -> Result<EncValue, EvalError> {
        if exponent < 1.0 || exponent.fract() != 0.0 {
            return Err(EvalError::Offload);
        }
        let mut out = self.clone();
        for _ in 1..exponent as u64 {
            out = out.mul(self)?;
        }
        out.len = self.len;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pib_ckks::{CkksContext, CkksParams, KeyBundle, SharedRng};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use std::sync::Mutex;

    const SCALE: f64 = 1099511627776.0; // 2^40

    fn bundle(level: usize) -> KeyBundle {
        let rng: SharedRng = Arc::new(Mutex::new(ChaCha20Rng::from_seed([9u8; 32])));
        let params = CkksParams::new(64, level, SCALE).unwrap();
        KeyBundle::generate(CkksContext::new(params).unwrap(), rng)
    }

    fn encrypt(bundle: &KeyBundle, values: &[f64]) -> EncValue {
        let ct = bundle.eval.encrypt_vector(values).unwrap();
        EncValue::new(ct, bundle.eval.clone(), values.len())
    }

    fn decrypt(bundle: &KeyBundle, value: &EncValue) -> Vec<f64> {
        let mut slots = bundle.decrypt_vector(&value.ciphertext).unwrap();
        slots.truncate(value.len());
        slots
    }

    fn assert_close(actual: &[f64], expected: &[f64], tolerance: f64) {
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < tolerance, "expected {e}, got {a}");
        }
    }

    #[test]
    fn test_add_sub_preserve_operands() {
        let b = bundle(3);
        let x = encrypt(&b, &[1.0, 2.0, 3.0]);
        let y = encrypt(&b, &[0.5, 0.5, 0.5]);
        let sum = x.add(&y).unwrap();
        let diff = x.sub(&y).unwrap();
        assert_close(&decrypt(&b, &sum), &[1.5, 2.5, 3.5], 1e-3);
        assert_close(&decrypt(&b, &diff), &[0.5, 1.5, 2.5], 1e-3);
        // Operands untouched by normalization.
        assert_close(&decrypt(&b, &x), &[1.0, 2.0, 3.0], 1e-3);
        assert_eq!(x.ciphertext.pos, 0);
    }

    #[test]
    fn test_mul_rescales_and_tracks_length() {
        let b = bundle(3);
        let x = encrypt(&b, &[2.0, 3.0]);
        let y = encrypt(&b, &[4.0, -1.0]);
        let product = x.mul(&y).unwrap();
        assert_eq!(product.len(), 2);
        assert_eq!(product.ciphertext.pos, 1);
        assert_close(&decrypt(&b, &product), &[8.0, -3.0], 1e-2);
    }

    #[test]
    fn test_mixed_level_operands_normalize() {
        let b = bundle(3);
        let x = encrypt(&b, &[2.0]);
        let y = encrypt(&b, &[5.0]);
        let deep = x.mul(&y).unwrap(); // now at pos 1
        let fresh = encrypt(&b, &[1.0]);
        let sum = deep.add(&fresh).unwrap();
        assert_close(&decrypt(&b, &sum), &[11.0], 1e-2);
    }

    #[test]
    fn test_constant_broadcasts() {
        let b = bundle(3);
        let x = encrypt(&b, &[1.0, 2.0, 3.0]);
        let c = EncValue::constant(&b.eval, 10.0).unwrap();
        assert_eq!(c.len(), 1);
        assert_eq!(c.plain, Some(10.0));
        let shifted = x.add(&c).unwrap();
        assert_close(&decrypt(&b, &shifted), &[11.0, 12.0, 13.0], 1e-2);
        let scaled = x.mul(&c).unwrap();
        assert_close(&decrypt(&b, &scaled), &[10.0, 20.0, 30.0], 1e-2);
    }

    #[test]
    fn test_div_by_const_and_pow_const() {
        let b = bundle(3);
        let x = encrypt(&b, &[8.0, 2.0]);
        let halved = x.div_by_const(2.0).unwrap();
        assert_eq!(halved.len(), 2);
        assert_close(&decrypt(&b, &halved), &[4.0, 1.0], 1e-2);

        let squared = x.pow_const(2.0).unwrap();
        assert_close(&decrypt(&b, &squared), &[64.0, 4.0], 1e-1);
        assert!(matches!(x.pow_const(0.5), Err(EvalError::Offload)));
    }

    #[test]
    fn test_add_over_n_power_of_two() {
        let b = bundle(3);
        let x = encrypt(&b, &[1.0, 2.0, 3.0, 4.0]);
        let sum = x.add_over_n().unwrap();
        assert_eq!(sum.len(), 1);
        assert_close(&decrypt(&b, &sum), &[10.0], 1e-2);
    }

    #[test]
    fn test_add_over_n_odd_length() {
        let b = bundle(3);
        let x = encrypt(&b, &[1.0, 2.0, 3.0]);
        let sum = x.add_over_n().unwrap();
        assert_close(&decrypt(&b, &sum), &[6.0], 1e-2);
    }

    #[test]
    fn test_budget_exhaustion_signals_offload() {
        let b = bundle(2); // one rescaling prime: a single product fits, two cannot
        let x = encrypt(&b, &[2.0]);
        let squared = x.mul(&x).unwrap();
        assert!(matches!(squared.mul(&squared), Err(EvalError::Offload)));
    }
}
