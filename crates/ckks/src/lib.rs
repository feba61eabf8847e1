// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! # CKKS Backend
//!
//! A compact RNS-CKKS implementation for approximate homomorphic arithmetic
//! over real vectors.
//!
//! ## Features
//!
//! - Residue-number-system polynomial arithmetic over NTT-friendly primes.
//! - Canonical-embedding encoder mapping real vectors into ring elements.
//! - Secret/public keys, relinearization and Galois (rotation) keys with
//!   special-prime key switching.
//! - Leveled evaluation: add, subtract, negate, multiply, rescale,
//!   modulus switching and slot rotation.
//!
//! The modulus chain follows the `[60, 40, …, 40, 60]` layout: one 60-bit
//! base prime, `level - 1` 40-bit rescaling primes and one 60-bit special
//! prime reserved for key switching.

mod bundle;
mod context;
mod encoder;
mod error;
mod evaluator;
mod keys;
mod ntt;
mod params;
mod poly;
mod zq;

pub use bundle::{EvalKeys, KeyBundle};
pub use context::CkksContext;
pub use encoder::Plaintext;
pub use error::CkksError;
pub use evaluator::{Ciphertext, Evaluator};
pub use keys::{
    Decryptor, Encryptor, GaloisKeys, KeyGenerator, PublicKey, RelinKey, SecretKey,
};
pub use params::CkksParams;
pub use poly::RnsPoly;

use rand_chacha::ChaCha20Rng;
use std::sync::{Arc, Mutex};

pub type SharedRng = Arc<Mutex<ChaCha20Rng>>;
