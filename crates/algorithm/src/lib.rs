// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! # KPI Formula Catalogs
//!
//! Parses a YAML catalog of atomic operations into a dependency DAG,
//! synthesizes leaf atomics for the inputs the catalog references but
//! never defines, partitions KPIs from intermediates and emits a
//! topologically ordered execution schedule. Cyclic catalogs are
//! rejected.

mod algorithm;
mod atomic;
mod error;

pub use algorithm::Algorithm;
pub use atomic::Atomic;
pub use error::AlgorithmError;
