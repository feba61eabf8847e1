// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! # Dual-Mode Values
//!
//! The benchmarking pipeline evaluates KPI formulas over vectors that are
//! either cleartext ([`VecValue`]) or CKKS ciphertexts ([`EncValue`]).
//! Both variants sit behind the [`Value`] enum; the operation kernels in
//! [`ops`] dispatch once at the top and otherwise treat the two modes
//! uniformly.
//!
//! Encrypted values support only the arithmetic CKKS can express locally.
//! Everything else fails with [`EvalError::Offload`], the one recoverable
//! error: the proxy answers it by round-tripping the operation through the
//! input owner.

mod encrypted;
mod error;
pub mod ops;
mod plain;
mod resolved;
mod value;

pub use encrypted::EncValue;
pub use error::EvalError;
pub use ops::OpKind;
pub use plain::VecValue;
pub use resolved::ResolvedValues;
pub use value::Value;
