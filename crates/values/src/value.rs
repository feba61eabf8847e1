// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! The tagged variant over the two value backends.

use crate::encrypted::EncValue;
use crate::error::EvalError;
use crate::plain::VecValue;

/// A resolved computation value: either a cleartext vector or a CKKS
/// ciphertext. Kernels dispatch on the variant once; operations the
/// encrypted arm cannot express locally return [`EvalError::Offload`].
#[derive(Clone)]
pub enum Value {
    Plain(VecValue),
    Enc(EncValue),
}

impl Value {
    pub fn len(&self) -> usize {
        match self {
            Value::Plain(v) => v.len(),
            Value::Enc(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self, Value::Enc(_))
    }

    /// Serialized ciphertext size; cleartext values carry no traffic.
    pub fn byte_size(&self) -> usize {
        match self {
            Value::Plain(_) => 0,
            Value::Enc(v) => v.byte_size(),
        }
    }

    pub fn as_plain(&self) -> Result<&VecValue, EvalError> {
        match self {
            Value::Plain(v) => Ok(v),
            Value::Enc(_) => Err(EvalError::MixedOperands),
        }
    }

    pub fn as_enc(&self) -> Result<&EncValue, EvalError> {
        match self {
            Value::Enc(v) => Ok(v),
            Value::Plain(_) => Err(EvalError::MixedOperands),
        }
    }

    pub fn add(&self, other: &Value) -> Result<Value, EvalError> {
        match (self, other) {
            (Value::Plain(a), Value::Plain(b)) => Ok(Value::Plain(a.add(b)?)),
            (Value::Enc(a), Value::Enc(b)) => Ok(Value::Enc(a.add(b)?)),
            _ => Err(EvalError::MixedOperands),
        }
    }

    pub fn sub(&self, other: &Value) -> Result<Value, EvalError> {
        match (self, other) {
            (Value::Plain(a), Value::Plain(b)) => Ok(Value::Plain(a.sub(b)?)),
            (Value::Enc(a), Value::Enc(b)) => Ok(Value::Enc(a.sub(b)?)),
            _ => Err(EvalError::MixedOperands),
        }
    }

    pub fn mul(&self, other: &Value) -> Result<Value, EvalError> {
        match (self, other) {
            (Value::Plain(a), Value::Plain(b)) => Ok(Value::Plain(a.mul(b)?)),
            (Value::Enc(a), Value::Enc(b)) => Ok(Value::Enc(a.mul(b)?)),
            _ => Err(EvalError::MixedOperands),
        }
    }

    /// Division by an arbitrary value has no ciphertext circuit.
    pub fn div(&self, other: &Value) -> Result<Value, EvalError> {
        match (self, other) {
            (Value::Plain(a), Value::Plain(b)) => Ok(Value::Plain(a.div(b)?)),
            (Value::Enc(_), Value::Enc(_)) => Err(EvalError::Offload),
            _ => Err(EvalError::MixedOperands),
        }
    }

    /// Exponentiation by an arbitrary value has no ciphertext circuit.
    pub fn pow(&self, other: &Value) -> Result<Value, EvalError> {
        match (self, other) {
            (Value::Plain(a), Value::Plain(b)) => Ok(Value::Plain(a.pow(b)?)),
            (Value::Enc(_), Value::Enc(_)) => Err(EvalError::Offload),
            _ => Err(EvalError::MixedOperands),
        }
    }

    pub fn neg(&self) -> Value {
        match self {
            Value::Plain(v) => Value::Plain(v.neg()),
            Value::Enc(v) => Value::Enc(v.neg()),
        }
    }

    pub fn abs(&self) -> Result<Value, EvalError> {
        match self {
            Value::Plain(v) => Ok(Value::Plain(v.abs())),
            Value::Enc(_) => Err(EvalError::Offload),
        }
    }

    pub fn sqrt(&self) -> Result<Value, EvalError> {
        match self {
            Value::Plain(v) => Ok(Value::Plain(v.sqrt())),
            Value::Enc(_) => Err(EvalError::Offload),
        }
    }

    pub fn add_over_n(&self) -> Result<Value, EvalError> {
        match self {
            Value::Plain(v) => Ok(Value::Plain(v.add_over_n())),
            Value::Enc(v) => Ok(Value::Enc(v.add_over_n()?)),
        }
    }

    pub fn min_over_n(&self) -> Result<Value, EvalError> {
        match self {
            Value::Plain(v) => Ok(Value::Plain(v.min_over_n())),
            Value::Enc(_) => Err(EvalError::Offload),
        }
    }

    pub fn max_over_n(&self) -> Result<Value, EvalError> {
        match self {
            Value::Plain(v) => Ok(Value::Plain(v.max_over_n())),
            Value::Enc(_) => Err(EvalError::Offload),
        }
    }
}
