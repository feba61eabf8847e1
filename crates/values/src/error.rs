// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use pib_ckks::CkksError;
use thiserror::Error;

/// Errors surfacing from value arithmetic and operand construction.
///
/// `Offload` is the only recoverable variant: it asks the proxy to route
/// the operation through the participant. Every other variant is fatal.
#[derive(Debug, Error)]
pub enum EvalError {
    /// The operation cannot be evaluated on ciphertexts locally, or the
    /// scale/level budget ran out mid-computation.
    #[error("operation must be offloaded to the input owner")]
    Offload,

    /// Elementwise operation over vectors of incompatible dimensions
    #[error("vector dimension mismatch: {0} vs {1}")]
    Dimension(usize, usize),

    /// Operand list does not match the operation's declared shape
    #[error("invalid operands: {0}")]
    Arity(String),

    /// Plain and encrypted values mixed in one operand list
    #[error("operand list mixes plain and encrypted values")]
    MixedOperands,

    /// A constant-taking kernel received an operand without its scalar
    #[error("constant operand carries no plain scalar")]
    MissingConstant,

    /// Lookup of a value that was never resolved
    #[error("value '{0}' has not been resolved yet")]
    NotResolved(String),

    /// Double insertion into the write-once table
    #[error("value '{0}' was already resolved")]
    AlreadyResolved(String),

    /// Fatal failure in the CKKS backend outside any recoverable path
    #[error("crypto backend failure: {0}")]
    Crypto(#[from] CkksError),
}
