// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use thiserror::Error;

/// Fatal catalog errors: schema problems at parse time, graph problems at
/// schedule time.
#[derive(Debug, Error)]
pub enum AlgorithmError {
    #[error("could not read algorithm catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed algorithm catalog: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("atomic name '{0}' is defined more than once")]
    DuplicateName(String),

    #[error("atomic '{name}': {reason}")]
    Schema { name: String, reason: String },

    #[error("cyclic dependency through atomic '{0}'")]
    Cycle(String),
}
