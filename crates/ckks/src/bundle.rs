// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! Bundled key material for one principal.
//!
//! The decryption key never leaves the [`KeyBundle`]; the [`EvalKeys`]
//! subset is what an untrusted evaluator receives: encryption, evaluation,
//! relinearization and rotation capability plus the encoding scale and the
//! chain layout, but no way to decrypt.

use crate::context::CkksContext;
use crate::error::CkksError;
use crate::evaluator::{Ciphertext, Evaluator};
use crate::keys::{Decryptor, Encryptor, GaloisKeys, KeyGenerator, RelinKey};
use crate::SharedRng;
use std::sync::Arc;

/// Public evaluation material shared with the proxy.
pub struct EvalKeys {
    pub ctx: Arc<CkksContext>,
    pub evaluator: Evaluator,
    pub relin: RelinKey,
    pub galois: GaloisKeys,
    encryptor: Encryptor,
    pub scale: f64,
}

impl EvalKeys {
    /// Encrypt a vector at the canonical scale, fresh chain position.
    pub fn encrypt_vector(&self, values: &[f64]) -> Result<Ciphertext, CkksError> {
        let plain = self.ctx.encode(values, self.scale, 0)?;
        self.encryptor.encrypt(&plain)
    }

    /// Encrypt one scalar replicated across every slot.
    pub fn encrypt_replicated(&self, value: f64) -> Result<Ciphertext, CkksError> {
        let plain = self.ctx.encode_replicated(value, self.scale, 0)?;
        self.encryptor.encrypt(&plain)
    }
}

/// Full key material: evaluation subset plus the private decryptor.
pub struct KeyBundle {
    pub eval: Arc<EvalKeys>,
    decryptor: Decryptor,
    /// Serialized size of public key, relinearization key and Galois keys.
    pub key_material_size: usize,
}

impl KeyBundle {
    pub fn generate(ctx: Arc<CkksContext>, rng: SharedRng) -> KeyBundle {
        let keygen = KeyGenerator::new(ctx.clone(), rng.clone());
        let sk = keygen.secret_key();
        let pk = keygen.public_key(&sk);
        let relin = keygen.relin_key(&sk);
        let galois = keygen.galois_keys(&sk);

        let key_material_size = [
            bincode::serialized_size(&pk).unwrap_or(0),
            bincode::serialized_size(&relin).unwrap_or(0),
            bincode::serialized_size(&galois).unwrap_or(0),
        ]
        .iter()
        .sum::<u64>() as usize;

        let scale = ctx.params.scale;
        let decryptor = Decryptor::new(ctx.clone(), sk);
        KeyBundle {
            eval: Arc::new(EvalKeys {
                evaluator: Evaluator::new(ctx.clone()),
                relin,
                galois,
                encryptor: Encryptor::new(ctx.clone(), pk, rng),
                scale,
                ctx,
            }),
            decryptor,
            key_material_size,
        }
    }

    /// Decrypt into the full slot vector; callers truncate to the semantic
    /// length.
    pub fn decrypt_vector(&self, ct: &Ciphertext) -> Result<Vec<f64>, CkksError> {
        let plain = self.decryptor.decrypt(ct)?;
        Ok(self.eval.ctx.decode(&plain))
    }
}
