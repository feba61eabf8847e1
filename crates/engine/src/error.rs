// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use pib_algorithm::AlgorithmError;
use pib_ckks::CkksError;
use pib_values::EvalError;
use thiserror::Error;

/// Fatal pipeline errors. The offload signal never reaches this level:
/// the proxy recovers it in place, and a failed offload surfaces as
/// [`EngineError::Budget`].
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("schema error: {0}")]
    Schema(String),

    #[error(transparent)]
    Algorithm(#[from] AlgorithmError),

    #[error("evaluation failed: {0}")]
    Eval(#[from] EvalError),

    #[error("crypto setup failed: {0}")]
    Crypto(#[from] CkksError),

    #[error("offloaded operation failed on the participant: {0}")]
    Budget(String),

    #[error("aggregation dimension mismatch for KPI '{kpi}': expected {expected}, got {got}")]
    AggregationDimension {
        kpi: String,
        expected: usize,
        got: usize,
    },

    #[error("participant '{participant}' provided no KPI '{kpi}' for aggregation")]
    MissingKpi { participant: String, kpi: String },

    #[error(
        "statistics server refuses to release results for fewer than {k} participants (got {got})"
    )]
    KAnonymity { k: usize, got: usize },

    #[error("could not read participant input: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed participant input: {0}")]
    Parse(#[from] serde_yaml::Error),
}
