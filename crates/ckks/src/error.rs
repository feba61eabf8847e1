// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use thiserror::Error;

/// Errors that can occur inside the CKKS backend.
#[derive(Debug, Error)]
pub enum CkksError {
    /// Ring degree is not a power of two or is too small
    #[error("ring degree must be a power of two of at least 8, got {0}")]
    InvalidDegree(usize),

    /// Multiplicative budget is below the scheme minimum
    #[error("level budget must be at least 2, got {0}")]
    InvalidLevel(usize),

    /// Encoding scale is unusable
    #[error("encoding scale must be greater than one, got {0}")]
    InvalidScale(f64),

    /// Prime search ran out of candidates
    #[error("could not find enough NTT-friendly primes for degree {0}")]
    PrimeSearch(usize),

    /// Rescaling requested with no rescaling prime left on the chain
    #[error("no further rescaling prime available on the modulus chain")]
    LevelExhausted,

    /// Two ciphertexts live at different chain positions
    #[error("chain position mismatch: {0} vs {1}")]
    PositionMismatch(usize, usize),

    /// Encoded vector does not fit the slot count
    #[error("vector of length {0} exceeds the {1} available slots")]
    TooManyValues(usize, usize),

    /// Modulus switch must walk towards the chain tail
    #[error("cannot switch from chain position {0} back to position {1}")]
    InvalidSwitch(usize, usize),

    /// Ciphertext has an unexpected number of polynomials
    #[error("unsupported ciphertext size {0}")]
    UnsupportedSize(usize),

    /// Rotation step without a generated Galois key
    #[error("rotation by {0} steps has no Galois key")]
    MissingGaloisKey(usize),
}
