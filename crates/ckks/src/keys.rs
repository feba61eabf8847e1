// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! Key material: secret/public key pair, relinearization key and Galois
//! rotation keys.
//!
//! Key switching uses per-prime decomposition: component `i` of a switch
//! key encrypts `special * target` on residue row `i` alone. Accumulating
//! `digit_i * component_i` over the active rows and dividing by the
//! special prime re-expresses `target * poly` under the original secret.

use crate::context::CkksContext;
use crate::encoder::Plaintext;
use crate::error::CkksError;
use crate::evaluator::Ciphertext;
use crate::poly::RnsPoly;
use crate::zq::{add_mod, mul_mod};
use crate::SharedRng;
use rand::Rng;
use rand_chacha::ChaCha20Rng;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Centered binomial pairs per coefficient; variance 10 matches the usual
/// sigma of about 3.2.
const NOISE_PAIRS: usize = 20;

fn sample_ternary(degree: usize, rng: &mut ChaCha20Rng) -> Vec<i64> {
    (0..degree).map(|_| rng.gen_range(-1i64..=1)).collect()
}

fn sample_noise(degree: usize, rng: &mut ChaCha20Rng) -> Vec<i64> {
    (0..degree)
        .map(|_| {
            let mut acc = 0i64;
            for _ in 0..NOISE_PAIRS {
                acc += rng.gen::<bool>() as i64 - rng.gen::<bool>() as i64;
            }
            acc
        })
        .collect()
}

/// Uniform element of the RNS ring, sampled directly in evaluation form.
fn sample_uniform(degree: usize, moduli: &[u64], rng: &mut ChaCha20Rng) -> RnsPoly {
    let rows = moduli
        .iter()
        .map(|&q| (0..degree).map(|_| rng.gen_range(0..q)).collect())
        .collect();
    RnsPoly {
        rows,
        ntt_form: true,
    }
}

pub struct SecretKey {
    pub(crate) coeffs: Vec<i64>,
    /// NTT form over the full chain plus the special prime.
    pub(crate) ntt_full: RnsPoly,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicKey {
    pub(crate) b: RnsPoly,
    pub(crate) a: RnsPoly,
}

/// One key-switching key: `level` components over the extended basis.
#[derive(Debug, Clone, Serialize)]
pub struct KSwitchKey {
    pub(crate) comps: Vec<(RnsPoly, RnsPoly)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelinKey(pub(crate) KSwitchKey);

/// Rotation keys for every power-of-two step below the slot count.
#[derive(Debug, Clone, Serialize)]
pub struct GaloisKeys {
    pub(crate) keys: HashMap<usize, (usize, KSwitchKey)>,
}

impl GaloisKeys {
    pub fn steps(&self) -> Vec<usize> {
        let mut steps: Vec<usize> = self.keys.keys().copied().collect();
        steps.sort_unstable();
        steps
    }
}

pub struct KeyGenerator {
    ctx: Arc<CkksContext>,
    rng: SharedRng,
}

impl KeyGenerator {
    pub fn new(ctx: Arc<CkksContext>, rng: SharedRng) -> Self {
        Self { ctx, rng }
    }

    pub fn secret_key(&self) -> SecretKey {
        let degree = self.ctx.params.degree;
        let coeffs = sample_ternary(degree, &mut self.rng.lock().unwrap());
        let mut ntt_full = RnsPoly::from_signed(&coeffs, self.ctx.key_moduli());
        ntt_full.to_ntt(self.ctx.key_tables());
        SecretKey { coeffs, ntt_full }
    }

    pub fn public_key(&self, sk: &SecretKey) -> PublicKey {
        let ctx = &self.ctx;
        let degree = ctx.params.degree;
        let level = ctx.params.level;
        let moduli = ctx.moduli_at(0);
        let tables = ctx.tables_at(0);
        let mut rng = self.rng.lock().unwrap();

        let a = sample_uniform(degree, moduli, &mut rng);
        let mut e = RnsPoly::from_signed(&sample_noise(degree, &mut rng), moduli);
        e.to_ntt(tables);

        let s = sk.ntt_full.truncated(level);
        let mut b = a.mul(&s, moduli);
        b.neg_assign(moduli);
        b.add_assign(&e, moduli);
        PublicKey { b, a }
    }

    pub fn relin_key(&self, sk: &SecretKey) -> RelinKey {
        let squared = sk.ntt_full.mul(&sk.ntt_full, self.ctx.key_moduli());
        RelinKey(self.switch_key(&squared, sk))
    }

    pub fn galois_keys(&self, sk: &SecretKey) -> GaloisKeys {
        let ctx = &self.ctx;
        let n = ctx.params.degree;
        let two_n = 2 * n;
        let mut keys = HashMap::new();
        let mut step = 1;
        while step < ctx.params.slots() {
            let g = ctx.galois_element(step);
            let mut rotated = vec![0i64; n];
            for (i, &c) in sk.coeffs.iter().enumerate() {
                let j = (i * g) % two_n;
                if j < n {
                    rotated[j] = c;
                } else {
                    rotated[j - n] = -c;
                }
            }
            let mut target = RnsPoly::from_signed(&rotated, ctx.key_moduli());
            target.to_ntt(ctx.key_tables());
            keys.insert(step, (g, self.switch_key(&target, sk)));
            step <<= 1;
        }
        GaloisKeys { keys }
    }

    /// Switch key encrypting `target` under `sk`, one component per
    /// ciphertext prime.
    fn switch_key(&self, target: &RnsPoly, sk: &SecretKey) -> KSwitchKey {
        let ctx = &self.ctx;
        let degree = ctx.params.degree;
        let moduli = ctx.key_moduli();
        let tables = ctx.key_tables();
        let mut rng = self.rng.lock().unwrap();

        let comps = (0..ctx.params.level)
            .map(|i| {
                let a_i = sample_uniform(degree, moduli, &mut rng);
                let mut e_i = RnsPoly::from_signed(&sample_noise(degree, &mut rng), moduli);
                e_i.to_ntt(tables);

                let mut b_i = a_i.mul(&sk.ntt_full, moduli);
                b_i.neg_assign(moduli);
                b_i.add_assign(&e_i, moduli);

                let q_i = moduli[i];
                let factor = ctx.params.special % q_i;
                for (dst, &t) in b_i.rows[i].iter_mut().zip(&target.rows[i]) {
                    *dst = add_mod(*dst, mul_mod(factor, t, q_i), q_i);
                }
                (b_i, a_i)
            })
            .collect();
        KSwitchKey { comps }
    }
}

pub struct Encryptor {
    ctx: Arc<CkksContext>,
    pk: PublicKey,
    rng: SharedRng,
}

impl Encryptor {
    pub fn new(ctx: Arc<CkksContext>, pk: PublicKey, rng: SharedRng) -> Self {
        Self { ctx, pk, rng }
    }

    pub fn encrypt(&self, plain: &Plaintext) -> Result<Ciphertext, CkksError> {
        let ctx = &self.ctx;
        let degree = ctx.params.degree;
        let active = ctx.active(plain.pos);
        let moduli = ctx.moduli_at(plain.pos);
        let tables = ctx.tables_at(plain.pos);
        let mut rng = self.rng.lock().unwrap();

        let mut u = RnsPoly::from_signed(&sample_ternary(degree, &mut rng), moduli);
        u.to_ntt(tables);
        let mut e0 = RnsPoly::from_signed(&sample_noise(degree, &mut rng), moduli);
        e0.to_ntt(tables);
        let mut e1 = RnsPoly::from_signed(&sample_noise(degree, &mut rng), moduli);
        e1.to_ntt(tables);

        let mut c0 = self.pk.b.truncated(active).mul(&u, moduli);
        c0.add_assign(&e0, moduli);
        c0.add_assign(&plain.poly, moduli);
        let mut c1 = self.pk.a.truncated(active).mul(&u, moduli);
        c1.add_assign(&e1, moduli);

        Ok(Ciphertext {
            polys: vec![c0, c1],
            pos: plain.pos,
            scale: plain.scale,
        })
    }
}

pub struct Decryptor {
    ctx: Arc<CkksContext>,
    sk: SecretKey,
}

impl Decryptor {
    pub fn new(ctx: Arc<CkksContext>, sk: SecretKey) -> Self {
        Self { ctx, sk }
    }

    /// Fold the ciphertext polynomials over powers of the secret.
    pub fn decrypt(&self, ct: &Ciphertext) -> Result<Plaintext, CkksError> {
        if ct.polys.len() < 2 {
            return Err(CkksError::UnsupportedSize(ct.polys.len()));
        }
        let ctx = &self.ctx;
        let active = ctx.active(ct.pos);
        let moduli = ctx.moduli_at(ct.pos);
        let s = self.sk.ntt_full.truncated(active);

        let mut acc = ct.polys.last().expect("non-empty ciphertext").clone();
        for poly in ct.polys.iter().rev().skip(1) {
            acc = acc.mul(&s, moduli);
            acc.add_assign(poly, moduli);
        }
        Ok(Plaintext {
            poly: acc,
            scale: ct.scale,
            pos: ct.pos,
        })
    }
}
