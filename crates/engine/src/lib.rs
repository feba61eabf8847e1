// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! # Benchmarking Engines
//!
//! The three principals of the benchmarking pipeline and the glue between
//! them:
//!
//! - [`Participant`]: owns the raw input vectors and the private FHE key.
//!   Encrypts inputs, answers offload requests, decrypts its own KPI
//!   results and re-encrypts them for aggregation.
//! - [`Proxy`]: the untrusted evaluator. Walks the scheduled formula DAG
//!   over a participant's values, computing locally where the ciphertext
//!   arithmetic allows it and falling back to the participant otherwise,
//!   and aggregates the per-KPI sums across participants.
//! - [`StatisticsServer`]: holds the second FHE key, decrypts the per-KPI
//!   sums, enforces k-anonymity and emits per-slot averages.
//!
//! [`runner`] wires the phases together: parallel per-participant
//! benchmarking, a join barrier, aggregation and the plaintext accuracy
//! pass.

pub mod crypto;
mod error;
pub mod metrics;
mod participant;
mod proxy;
pub mod runner;
mod server;

pub use error::EngineError;
pub use metrics::{EvalMetrics, MetricsSnapshot};
pub use participant::{CipherInput, Participant, ProvidedInputs, ProvidedVar};
pub use proxy::{KpiAggregate, Proxy};
pub use server::{Statistic, StatisticsServer};
