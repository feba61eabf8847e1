// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! Leveled homomorphic operations on CKKS ciphertexts.

use crate::context::CkksContext;
use crate::error::CkksError;
use crate::keys::{GaloisKeys, KSwitchKey, RelinKey};
use crate::poly::RnsPoly;
use crate::zq::{add_mod, mul_mod, sub_mod};
use serde::Serialize;
use std::sync::Arc;

/// A CKKS ciphertext: two (transiently three) ring elements, the chain
/// position and the encoding scale of the encrypted vector.
#[derive(Debug, Clone, Serialize)]
pub struct Ciphertext {
    pub polys: Vec<RnsPoly>,
    pub pos: usize,
    pub scale: f64,
}

impl Ciphertext {
    /// Serialized size, used by the traffic accounting.
    pub fn byte_size(&self) -> usize {
        bincode::serialized_size(self).map(|s| s as usize).unwrap_or(0)
    }
}

pub struct Evaluator {
    ctx: Arc<CkksContext>,
}

impl Evaluator {
    pub fn new(ctx: Arc<CkksContext>) -> Self {
        Self { ctx }
    }

    fn check_pair(&self, a: &Ciphertext, b: &Ciphertext) -> Result<(), CkksError> {
        if a.pos != b.pos {
            return Err(CkksError::PositionMismatch(a.pos, b.pos));
        }
        if a.polys.len() != b.polys.len() {
            return Err(CkksError::UnsupportedSize(b.polys.len()));
        }
        Ok(())
    }

    pub fn add(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext, CkksError> {
        self.check_pair(a, b)?;
        let moduli = self.ctx.moduli_at(a.pos);
        let mut out = a.clone();
        for (dst, src) in out.polys.iter_mut().zip(&b.polys) {
            dst.add_assign(src, moduli);
        }
        Ok(out)
    }

    pub fn sub(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext, CkksError> {
        self.check_pair(a, b)?;
        let moduli = self.ctx.moduli_at(a.pos);
        let mut out = a.clone();
        for (dst, src) in out.polys.iter_mut().zip(&b.polys) {
            dst.sub_assign(src, moduli);
        }
        Ok(out)
    }

    pub fn negate(&self, a: &Ciphertext) -> Ciphertext {
        let moduli = self.ctx.moduli_at(a.pos);
        let mut out = a.clone();
        for poly in out.polys.iter_mut() {
            poly.neg_assign(moduli);
        }
        out
    }

    /// Tensor product; the result has three polynomials and the product
    /// scale, and still needs `relinearize` and `rescale_to_next`.
    pub fn multiply(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext, CkksError> {
        self.check_pair(a, b)?;
        if a.polys.len() != 2 {
            return Err(CkksError::UnsupportedSize(a.polys.len()));
        }
        let moduli = self.ctx.moduli_at(a.pos);
        let d0 = a.polys[0].mul(&b.polys[0], moduli);
        let mut d1 = a.polys[0].mul(&b.polys[1], moduli);
        d1.add_mul_assign(&a.polys[1], &b.polys[0], moduli);
        let d2 = a.polys[1].mul(&b.polys[1], moduli);
        Ok(Ciphertext {
            polys: vec![d0, d1, d2],
            pos: a.pos,
            scale: a.scale * b.scale,
        })
    }

    /// Fold third-degree components back onto the secret; a two-element
    /// ciphertext passes through unchanged.
    pub fn relinearize(
        &self,
        ct: &Ciphertext,
        rk: &RelinKey,
    ) -> Result<Ciphertext, CkksError> {
        match ct.polys.len() {
            2 => Ok(ct.clone()),
            3 => {
                let moduli = self.ctx.moduli_at(ct.pos);
                let mut d2 = ct.polys[2].clone();
                d2.to_coeff(self.ctx.tables_at(ct.pos));
                let (k0, k1) = self.key_switch(&d2, &rk.0, ct.pos);
                let mut c0 = ct.polys[0].clone();
                c0.add_assign(&k0, moduli);
                let mut c1 = ct.polys[1].clone();
                c1.add_assign(&k1, moduli);
                Ok(Ciphertext {
                    polys: vec![c0, c1],
                    pos: ct.pos,
                    scale: ct.scale,
                })
            }
            other => Err(CkksError::UnsupportedSize(other)),
        }
    }

    /// Drop the deepest active prime, dividing the encrypted values (and
    /// the scale) by it.
    pub fn rescale_to_next(&self, ct: &Ciphertext) -> Result<Ciphertext, CkksError> {
        let active = self.ctx.active(ct.pos);
        if active == 1 {
            return Err(CkksError::LevelExhausted);
        }
        let drop_idx = active - 1;
        let q_drop = self.ctx.params.moduli[drop_idx];
        let half = q_drop / 2;
        let tables = self.ctx.tables_at(ct.pos);
        let next_tables = self.ctx.tables_at(ct.pos + 1);
        let moduli = self.ctx.moduli_at(ct.pos);

        let polys = ct
            .polys
            .iter()
            .map(|poly| {
                let mut work = poly.clone();
                work.to_coeff(tables);
                for j in 0..drop_idx {
                    let q = moduli[j];
                    let inv = self.ctx.drop_inv[drop_idx][j];
                    // Split borrows: the dropped row is read, row j written.
                    let (head, tail) = work.rows.split_at_mut(drop_idx);
                    let dropped = &tail[0];
                    for (dst, &r) in head[j].iter_mut().zip(dropped) {
                        let diff = if r > half {
                            add_mod(*dst, (q_drop - r) % q, q)
                        } else {
                            sub_mod(*dst, r % q, q)
                        };
                        *dst = mul_mod(diff, inv, q);
                    }
                }
                work.rows.truncate(drop_idx);
                work.to_ntt(next_tables);
                work
            })
            .collect();

        Ok(Ciphertext {
            polys,
            pos: ct.pos + 1,
            scale: ct.scale / q_drop as f64,
        })
    }

    /// Walk the ciphertext to a deeper chain position without changing the
    /// encrypted values.
    pub fn mod_switch_to(&self, ct: &Ciphertext, pos: usize) -> Result<Ciphertext, CkksError> {
        if pos < ct.pos {
            return Err(CkksError::InvalidSwitch(ct.pos, pos));
        }
        if pos >= self.ctx.params.level {
            return Err(CkksError::LevelExhausted);
        }
        let active = self.ctx.active(pos);
        let polys = ct.polys.iter().map(|p| p.truncated(active)).collect();
        Ok(Ciphertext {
            polys,
            pos,
            scale: ct.scale,
        })
    }

    /// Left-rotate the slot vector, decomposing the step into the stored
    /// power-of-two Galois keys.
    pub fn rotate(
        &self,
        ct: &Ciphertext,
        steps: usize,
        gk: &GaloisKeys,
    ) -> Result<Ciphertext, CkksError> {
        if ct.polys.len() != 2 {
            return Err(CkksError::UnsupportedSize(ct.polys.len()));
        }
        let slots = self.ctx.params.slots();
        let mut remaining = steps % slots;
        let mut out = ct.clone();
        let mut step = 1;
        while remaining != 0 {
            if remaining & step != 0 {
                out = self.rotate_once(&out, step, gk)?;
                remaining ^= step;
            }
            step <<= 1;
        }
        Ok(out)
    }

    fn rotate_once(
        &self,
        ct: &Ciphertext,
        step: usize,
        gk: &GaloisKeys,
    ) -> Result<Ciphertext, CkksError> {
        let (g, key) = gk
            .keys
            .get(&step)
            .ok_or(CkksError::MissingGaloisKey(step))?;
        let moduli = self.ctx.moduli_at(ct.pos);
        let tables = self.ctx.tables_at(ct.pos);

        let mut c0 = ct.polys[0].clone();
        c0.to_coeff(tables);
        let mut c0 = c0.automorphism(*g, moduli);
        c0.to_ntt(tables);

        let mut c1 = ct.polys[1].clone();
        c1.to_coeff(tables);
        let c1 = c1.automorphism(*g, moduli);

        let (k0, k1) = self.key_switch(&c1, key, ct.pos);
        c0.add_assign(&k0, moduli);
        Ok(Ciphertext {
            polys: vec![c0, k1],
            pos: ct.pos,
            scale: ct.scale,
        })
    }

    /// Per-prime key switch of a coefficient-form ring element; returns the
    /// two result polynomials in evaluation form over the active basis.
    fn key_switch(
        &self,
        digits: &RnsPoly,
        key: &KSwitchKey,
        pos: usize,
    ) -> (RnsPoly, RnsPoly) {
        let ctx = &self.ctx;
        let degree = ctx.params.degree;
        let m = ctx.active(pos);
        let level = ctx.params.level;

        // Accumulators over the active primes plus the special prime.
        let mut acc0 = RnsPoly::zero(m + 1, degree, true);
        let mut acc1 = RnsPoly::zero(m + 1, degree, true);

        for (i, digit) in digits.rows.iter().enumerate().take(m) {
            for r in 0..=m {
                // Row m of the accumulator is the special prime, which the
                // switch keys keep at index `level`.
                let (q, table, krow) = if r < m {
                    (ctx.moduli_ext[r], &ctx.tables[r], r)
                } else {
                    (ctx.params.special, &ctx.tables[level], level)
                };
                let mut lifted: Vec<u64> = digit.iter().map(|&x| x % q).collect();
                table.forward(&mut lifted);
                let comp = &key.comps[i];
                for ((dst0, dst1), (&l, (&k0, &k1))) in acc0.rows[r]
                    .iter_mut()
                    .zip(acc1.rows[r].iter_mut())
                    .zip(lifted.iter().zip(comp.0.rows[krow].iter().zip(&comp.1.rows[krow])))
                {
                    *dst0 = add_mod(*dst0, mul_mod(l, k0, q), q);
                    *dst1 = add_mod(*dst1, mul_mod(l, k1, q), q);
                }
            }
        }

        (self.mod_down(acc0, pos), self.mod_down(acc1, pos))
    }

    /// Divide an extended-basis accumulator by the special prime with
    /// rounding, returning to the active basis.
    fn mod_down(&self, mut poly: RnsPoly, pos: usize) -> RnsPoly {
        let ctx = &self.ctx;
        let m = ctx.active(pos);
        let level = ctx.params.level;
        let sp = ctx.params.special;
        let half = sp / 2;

        for r in 0..m {
            let table = &ctx.tables[r];
            table.inverse(&mut poly.rows[r]);
        }
        ctx.tables[level].inverse(&mut poly.rows[m]);

        for j in 0..m {
            let q = ctx.moduli_ext[j];
            let inv = ctx.special_inv[j];
            let (head, tail) = poly.rows.split_at_mut(m);
            let special_row = &tail[0];
            for (dst, &r) in head[j].iter_mut().zip(special_row) {
                let diff = if r > half {
                    add_mod(*dst, (sp - r) % q, q)
                } else {
                    sub_mod(*dst, r % q, q)
                };
                *dst = mul_mod(diff, inv, q);
            }
        }

        poly.rows.truncate(m);
        poly.ntt_form = false;
        let mut out = poly;
        out.to_ntt(ctx.tables_at(pos));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyGenerator;
    use crate::params::CkksParams;
    use crate::SharedRng;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use std::sync::Mutex;

    struct Fixture {
        ctx: Arc<CkksContext>,
        evaluator: Evaluator,
        encryptor: crate::keys::Encryptor,
        decryptor: crate::keys::Decryptor,
        relin: RelinKey,
        galois: GaloisKeys,
    }

    fn fixture(degree: usize, level: usize, scale: f64) -> Fixture {
        let rng: SharedRng = Arc::new(Mutex::new(ChaCha20Rng::from_seed([7u8; 32])));
        let params = CkksParams::new(degree, level, scale).unwrap();
        let ctx = CkksContext::new(params).unwrap();
        let keygen = KeyGenerator::new(ctx.clone(), rng.clone());
        let sk = keygen.secret_key();
        let pk = keygen.public_key(&sk);
        let relin = keygen.relin_key(&sk);
        let galois = keygen.galois_keys(&sk);
        Fixture {
            evaluator: Evaluator::new(ctx.clone()),
            encryptor: crate::keys::Encryptor::new(ctx.clone(), pk, rng),
            decryptor: crate::keys::Decryptor::new(ctx.clone(), sk),
            ctx,
            relin,
            galois,
        }
    }

    fn decrypt_values(fx: &Fixture, ct: &Ciphertext) -> Vec<f64> {
        let plain = fx.decryptor.decrypt(ct).unwrap();
        fx.ctx.decode(&plain)
    }

    fn assert_close(actual: &[f64], expected: &[f64], tolerance: f64) {
        for (a, e) in actual.iter().zip(expected) {
            assert!(
                (a - e).abs() < tolerance,
                "expected {e}, got {a} (tolerance {tolerance})"
            );
        }
    }

    const SCALE: f64 = 1099511627776.0; // 2^40

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let fx = fixture(64, 3, SCALE);
        let values = [1.5, -2.25, 3.125, 1000.0];
        let plain = fx.ctx.encode(&values, SCALE, 0).unwrap();
        let ct = fx.encryptor.encrypt(&plain).unwrap();
        let decoded = decrypt_values(&fx, &ct);
        assert_close(&decoded[..4], &values, 1e-6);
        assert_close(&decoded[4..8], &[0.0; 4], 1e-6);
    }

    #[test]
    fn test_homomorphic_add_sub() {
        let fx = fixture(64, 3, SCALE);
        let a = [1.0, 2.0, 3.0];
        let b = [0.5, -1.0, 10.0];
        let ca = fx
            .encryptor
            .encrypt(&fx.ctx.encode(&a, SCALE, 0).unwrap())
            .unwrap();
        let cb = fx
            .encryptor
            .encrypt(&fx.ctx.encode(&b, SCALE, 0).unwrap())
            .unwrap();
        let sum = fx.evaluator.add(&ca, &cb).unwrap();
        let diff = fx.evaluator.sub(&ca, &cb).unwrap();
        assert_close(&decrypt_values(&fx, &sum)[..3], &[1.5, 1.0, 13.0], 1e-6);
        assert_close(&decrypt_values(&fx, &diff)[..3], &[0.5, 3.0, -7.0], 1e-6);
    }

    #[test]
    fn test_negate() {
        let fx = fixture(64, 2, SCALE);
        let ct = fx
            .encryptor
            .encrypt(&fx.ctx.encode(&[4.0, -2.0], SCALE, 0).unwrap())
            .unwrap();
        let neg = fx.evaluator.negate(&ct);
        assert_close(&decrypt_values(&fx, &neg)[..2], &[-4.0, 2.0], 1e-6);
    }

    #[test]
    fn test_multiply_relinearize_rescale() {
        let fx = fixture(64, 3, SCALE);
        let a = [1.5, 2.0, -3.0];
        let b = [4.0, 0.5, 2.0];
        let ca = fx
            .encryptor
            .encrypt(&fx.ctx.encode(&a, SCALE, 0).unwrap())
            .unwrap();
        let cb = fx
            .encryptor
            .encrypt(&fx.ctx.encode(&b, SCALE, 0).unwrap())
            .unwrap();
        let product = fx.evaluator.multiply(&ca, &cb).unwrap();
        assert_eq!(product.polys.len(), 3);
        let relined = fx.evaluator.relinearize(&product, &fx.relin).unwrap();
        assert_eq!(relined.polys.len(), 2);
        let rescaled = fx.evaluator.rescale_to_next(&relined).unwrap();
        assert_eq!(rescaled.pos, 1);
        // Scale stays within a fraction of a bit of 2^40.
        assert!((rescaled.scale.log2() - 40.0).abs() < 0.01);
        assert_close(&decrypt_values(&fx, &rescaled)[..3], &[6.0, 1.0, -6.0], 1e-3);
    }

    #[test]
    fn test_rotation_shifts_slots() {
        let fx = fixture(64, 2, SCALE);
        let slots = fx.ctx.params.slots();
        let values: Vec<f64> = (0..slots).map(|i| i as f64).collect();
        let ct = fx
            .encryptor
            .encrypt(&fx.ctx.encode(&values, SCALE, 0).unwrap())
            .unwrap();
        for steps in [1usize, 2, 3] {
            let rotated = fx.evaluator.rotate(&ct, steps, &fx.galois).unwrap();
            let decoded = decrypt_values(&fx, &rotated);
            for k in 0..slots {
                let expected = values[(k + steps) % slots];
                assert!(
                    (decoded[k] - expected).abs() < 1e-3,
                    "step {steps}, slot {k}: expected {expected}, got {}",
                    decoded[k]
                );
            }
        }
    }

    #[test]
    fn test_mod_switch_walks_deeper_only() {
        let fx = fixture(64, 3, SCALE);
        let ct = fx
            .encryptor
            .encrypt(&fx.ctx.encode(&[2.0], SCALE, 0).unwrap())
            .unwrap();
        let deeper = fx.evaluator.mod_switch_to(&ct, 2).unwrap();
        assert_eq!(deeper.pos, 2);
        assert_close(&decrypt_values(&fx, &deeper)[..1], &[2.0], 1e-6);
        assert!(matches!(
            fx.evaluator.mod_switch_to(&deeper, 0),
            Err(CkksError::InvalidSwitch(2, 0))
        ));
    }

    #[test]
    fn test_rescale_exhaustion() {
        let fx = fixture(64, 2, SCALE);
        let ct = fx
            .encryptor
            .encrypt(&fx.ctx.encode(&[1.0], SCALE, 0).unwrap())
            .unwrap();
        let once = fx.evaluator.rescale_to_next(&ct).unwrap();
        assert!(matches!(
            fx.evaluator.rescale_to_next(&once),
            Err(CkksError::LevelExhausted)
        ));
    }
}
