// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! The closed catalog of atomic operations: arity rules, operand tuple
//! construction and the kernels themselves.
//!
//! Constants are always stored in the second slot of the constructed
//! operand list, regardless of which side of the operation they sit on.

use crate::encrypted::EncValue;
use crate::error::EvalError;
use crate::plain::VecValue;
use crate::value::Value;
use pib_ckks::EvalKeys;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Operand shape classes of the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// One or more variable operands
    Nary,
    /// Exactly two variable operands
    Binary,
    /// One variable operand plus a required constant
    VarWithConst,
    /// Exactly one variable operand
    Unary,
    /// No variable operands, only a required constant
    Nullary,
}

/// The closed set of atomic operation names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpKind {
    Addition,
    AdditionConst,
    AdditionOverN,
    Absolute,
    DefConst,
    Division,
    DivisionConstVar,
    DivisionVarConst,
    Maxima,
    MaximaOverN,
    Minima,
    MinimaOverN,
    Multiplication,
    MultiplicationConst,
    Squareroot,
    Subtraction,
    SubtractionConstVar,
    SubtractionVarConst,
    Power,
    PowerConst,
    PowerBaseConst,
}

impl OpKind {
    pub fn name(&self) -> &'static str {
        match self {
            OpKind::Addition => "Addition",
            OpKind::AdditionConst => "AdditionConst",
            OpKind::AdditionOverN => "AdditionOverN",
            OpKind::Absolute => "Absolute",
            OpKind::DefConst => "DefConst",
            OpKind::Division => "Division",
            OpKind::DivisionConstVar => "DivisionConstVar",
            OpKind::DivisionVarConst => "DivisionVarConst",
            OpKind::Maxima => "Maxima",
            OpKind::MaximaOverN => "MaximaOverN",
            OpKind::Minima => "Minima",
            OpKind::MinimaOverN => "MinimaOverN",
            OpKind::Multiplication => "Multiplication",
            OpKind::MultiplicationConst => "MultiplicationConst",
            OpKind::Squareroot => "Squareroot",
            OpKind::Subtraction => "Subtraction",
            OpKind::SubtractionConstVar => "SubtractionConstVar",
            OpKind::SubtractionVarConst => "SubtractionVarConst",
            OpKind::Power => "Power",
            OpKind::PowerConst => "PowerConst",
            OpKind::PowerBaseConst => "PowerBaseConst",
        }
    }

    pub fn arity(&self) -> Arity {
        match self {
            OpKind::Addition
            | OpKind::Subtraction
            | OpKind::Multiplication
            | OpKind::Minima
            | OpKind::Maxima => Arity::Nary,
            OpKind::Division | OpKind::Power => Arity::Binary,
            OpKind::AdditionConst
            | OpKind::SubtractionVarConst
            | OpKind::SubtractionConstVar
            | OpKind::MultiplicationConst
            | OpKind::DivisionVarConst
            | OpKind::DivisionConstVar
            | OpKind::PowerConst
            | OpKind::PowerBaseConst => Arity::VarWithConst,
            OpKind::Squareroot
            | OpKind::Absolute
            | OpKind::AdditionOverN
            | OpKind::MinimaOverN
            | OpKind::MaximaOverN => Arity::Unary,
            OpKind::DefConst => Arity::Nullary,
        }
    }

    pub fn takes_constant(&self) -> bool {
        matches!(self.arity(), Arity::VarWithConst | Arity::Nullary)
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OpKind {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_name(s).ok_or_else(|| EvalError::Arity(format!("unknown operation '{s}'")))
    }
}

fn parse_name(s: &str) -> Option<OpKind> {
    use OpKind::*;
    Some(match s {
        "Addition" => Addition,
        "AdditionConst" => AdditionConst,
        "AdditionOverN" => AdditionOverN,
        "Absolute" => Absolute,
        "DefConst" => DefConst,
        "Division" => Division,
        "DivisionConstVar" => DivisionConstVar,
        "DivisionVarConst" => DivisionVarConst,
        "Maxima" => Maxima,
        "MaximaOverN" => MaximaOverN,
        "Minima" => Minima,
        "MinimaOverN" => MinimaOverN,
        "Multiplication" => Multiplication,
        "MultiplicationConst" => MultiplicationConst,
        "Squareroot" => Squareroot,
        "Subtraction" => Subtraction,
        "SubtractionConstVar" => SubtractionConstVar,
        "SubtractionVarConst" => SubtractionVarConst,
        "Power" => Power,
        "PowerConst" => PowerConst,
        "PowerBaseConst" => PowerBaseConst,
        _ => return None,
    })
}

/// Assemble the operand tuple for one atomic: validate the arity and
/// constant rules, then append the constant operand where the operation
/// takes one (plain length-1 in cleartext mode, encrypted and replicated
/// under the participant's bundle otherwise).
pub fn build_operands(
    op: OpKind,
    resolved: Vec<Value>,
    constant: Option<f64>,
    keys: Option<&Arc<EvalKeys>>,
) -> Result<Vec<Value>, EvalError> {
    let make_constant = |c: f64| -> Result<Value, EvalError> {
        match keys {
            None => Ok(Value::Plain(VecValue::scalar(c))),
            Some(keys) => Ok(Value::Enc(EncValue::constant(keys, c)?)),
        }
    };

    match op.arity() {
        Arity::Nary => {
            if resolved.is_empty() {
                return Err(EvalError::Arity(format!(
                    "{op} expects at least one variable operand"
                )));
            }
            if constant.is_some() {
                return Err(EvalError::Arity(format!("{op} has an unused constant")));
            }
            Ok(resolved)
        }
        Arity::Binary => {
            if resolved.len() != 2 {
                return Err(EvalError::Arity(format!(
                    "{op} expects exactly two variable operands, got {}",
                    resolved.len()
                )));
            }
            if constant.is_some() {
                return Err(EvalError::Arity(format!("{op} has an unused constant")));
            }
            Ok(resolved)
        }
        Arity::VarWithConst => {
            if resolved.len() != 1 {
                return Err(EvalError::Arity(format!(
                    "{op} expects one variable operand, got {}",
                    resolved.len()
                )));
            }
            let c = constant.ok_or_else(|| {
                EvalError::Arity(format!("{op} requires a constant but none was given"))
            })?;
            let mut operands = resolved;
            operands.push(make_constant(c)?);
            Ok(operands)
        }
        Arity::Unary => {
            if resolved.len() != 1 {
                return Err(EvalError::Arity(format!(
                    "{op} expects exactly one variable operand, got {}",
                    resolved.len()
                )));
            }
            if constant.is_some() {
                return Err(EvalError::Arity(format!("{op} has an unused constant")));
            }
            Ok(resolved)
        }
        Arity::Nullary => {
            if !resolved.is_empty() {
                return Err(EvalError::Arity(format!(
                    "{op} expects no variable operands, got {}",
                    resolved.len()
                )));
            }
            let c = constant.ok_or_else(|| {
                EvalError::Arity(format!("{op} requires a constant but none was given"))
            })?;
            Ok(vec![make_constant(c)?])
        }
    }
}

/// Evaluate one atomic operation over its assembled operand tuple.
pub fn apply(op: OpKind, operands: &[Value]) -> Result<Value, EvalError> {
    match op {
        OpKind::DefConst => Ok(operands[0].clone()),

        OpKind::Addition => fold(operands, Value::add),
        OpKind::Subtraction => {
            // A single operand means negation.
            if operands.len() == 1 {
                return Ok(operands[0].neg());
            }
            fold(operands, Value::sub)
        }
        OpKind::Multiplication => fold(operands, Value::mul),

        OpKind::Minima => extremum(operands, Ordering::Less),
        OpKind::Maxima => extremum(operands, Ordering::Greater),

        OpKind::Division => operands[0].div(&operands[1]),
        OpKind::Power => operands[0].pow(&operands[1]),

        OpKind::AdditionConst => operands[0].add(&operands[1]),
        OpKind::SubtractionVarConst => operands[0].sub(&operands[1]),
        OpKind::SubtractionConstVar => operands[1].sub(&operands[0]),
        OpKind::MultiplicationConst => operands[0].mul(&operands[1]),
        OpKind::DivisionVarConst => match &operands[0] {
            Value::Plain(_) => operands[0].div(&operands[1]),
            Value::Enc(var) => {
                let divisor = operands[1]
                    .as_enc()?
                    .plain
                    .ok_or(EvalError::MissingConstant)?;
                Ok(Value::Enc(var.div_by_const(divisor)?))
            }
        },
        OpKind::DivisionConstVar => operands[1].div(&operands[0]),
        OpKind::PowerConst => match &operands[0] {
            Value::Plain(_) => operands[0].pow(&operands[1]),
            Value::Enc(var) => {
                let exponent = operands[1]
                    .as_enc()?
                    .plain
                    .ok_or(EvalError::MissingConstant)?;
                Ok(Value::Enc(var.pow_const(exponent)?))
            }
        },
        OpKind::PowerBaseConst => operands[1].pow(&operands[0]),

        OpKind::Squareroot => operands[0].sqrt(),
        OpKind::Absolute => operands[0].abs(),
        OpKind::AdditionOverN => operands[0].add_over_n(),
        OpKind::MinimaOverN => operands[0].min_over_n(),
        OpKind::MaximaOverN => operands[0].max_over_n(),
    }
}

fn fold(
    operands: &[Value],
    f: impl Fn(&Value, &Value) -> Result<Value, EvalError>,
) -> Result<Value, EvalError> {
    let mut acc = operands[0].clone();
    for operand in &operands[1..] {
        acc = f(&acc, operand)?;
    }
    Ok(acc)
}

/// Lexicographic minimum or maximum over plain vector operands;
/// comparisons have no ciphertext circuit.
fn extremum(operands: &[Value], keep: Ordering) -> Result<Value, EvalError> {
    if operands.iter().any(Value::is_encrypted) {
        if operands.len() == 1 {
            return Ok(operands[0].clone());
        }
        return Err(EvalError::Offload);
    }
    let mut best = operands[0].as_plain()?;
    for operand in &operands[1..] {
        let candidate = operand.as_plain()?;
        if candidate.cmp_lex(best)? == keep {
            best = candidate;
        }
    }
    Ok(Value::Plain(best.clone()))
}
