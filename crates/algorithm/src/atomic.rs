// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::error::AlgorithmError;
use pib_values::ops::Arity;
use pib_values::OpKind;
use serde::Deserialize;

/// One named operation of a KPI formula catalog. Unknown YAML fields are
/// ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct Atomic {
    pub name: String,
    pub op: OpKind,
    #[serde(default)]
    pub var: Vec<String>,
    pub is_kpi: bool,
    #[serde(default)]
    pub constant: Option<f64>,
}

impl Atomic {
    /// Synthetic leaf standing in for a required input: resolves to the
    /// input itself and is filtered from the schedule.
    pub(crate) fn required_input(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            op: OpKind::AdditionConst,
            var: Vec::new(),
            is_kpi: false,
            constant: Some(0.0),
        }
    }

    /// Enforce the arity and constant rules of the operation class.
    pub(crate) fn validate(&self) -> Result<(), AlgorithmError> {
        let schema = |reason: String| AlgorithmError::Schema {
            name: self.name.clone(),
            reason,
        };

        let var_ok = match self.op.arity() {
            Arity::Nary => !self.var.is_empty(),
            Arity::Binary => self.var.len() == 2,
            Arity::VarWithConst | Arity::Unary => self.var.len() == 1,
            Arity::Nullary => self.var.is_empty(),
        };
        if !var_ok {
            return Err(schema(format!(
                "operation {} does not accept {} input references",
                self.op,
                self.var.len()
            )));
        }

        if self.op.takes_constant() && self.constant.is_none() {
            return Err(schema(format!("operation {} requires a constant", self.op)));
        }
        if !self.op.takes_constant() && self.constant.is_some() {
            return Err(schema(format!(
                "operation {} does not take a constant",
                self.op
            )));
        }
        Ok(())
    }
}
