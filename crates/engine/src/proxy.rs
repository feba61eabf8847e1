// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! The untrusted evaluator.
//!
//! Walks the topological schedule of the formula catalog over one
//! participant's values. Every atomic is attempted locally unless it is in
//! the configured offload set or is a multiplication over non-scalar
//! operands; a local attempt that raises the offload signal (chain budget
//! exhausted) is routed to the participant transparently. Non-KPI entries
//! are evicted from the resolved-values table on a fixed cadence to bound
//! ciphertext memory.

use crate::error::EngineError;
use crate::metrics::EvalMetrics;
use crate::participant::{CipherInput, Participant, ProvidedVar};
use pib_algorithm::{Algorithm, Atomic};
use pib_ckks::EvalKeys;
use pib_config::AppConfig;
use pib_values::{ops, EncValue, EvalError, OpKind, ResolvedValues, Value, VecValue};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Atomics between two eviction sweeps of the resolved-values table.
const EVICTION_INTERVAL: usize = 100;

pub struct Proxy {
    algorithm: Algorithm,
    offload: HashSet<OpKind>,
    encrypted: bool,
    metrics: Arc<EvalMetrics>,
}

/// The per-KPI aggregate forwarded to the statistics server. Minimum and
/// maximum have no comparison circuit under FHE and are reported as zero.
pub struct KpiAggregate {
    pub sum: EncValue,
    pub len: usize,
    pub count: usize,
}

impl Proxy {
    pub fn new(config: &AppConfig, algorithm: Algorithm, metrics: Arc<EvalMetrics>) -> Self {
        let offload = config.offload_set();
        if !offload.is_empty() {
            info!(?offload, "proxy will force-offload configured operations");
        }
        Self {
            algorithm,
            offload,
            encrypted: config.is_encrypted(),
            metrics,
        }
    }

    pub fn algorithm(&self) -> &Algorithm {
        &self.algorithm
    }

    /// Evaluate the full schedule for one participant and return the
    /// surviving table: exactly the per-KPI results.
    pub fn compute_kpis(
        &self,
        participant: &Participant,
    ) -> Result<ResolvedValues, EngineError> {
        let keys = participant.eval_keys();
        let mut resolved = ResolvedValues::new();

        // Required inputs seed the table; the upload is dropped as soon as
        // its values are lifted.
        let provided = participant.provide_inputs()?;
        let mut vars = provided.vars;
        for required in &self.algorithm.required {
            let var = vars.remove(required).ok_or_else(|| {
                EngineError::Schema(format!(
                    "participant '{}' did not provide required variable '{required}'",
                    participant.name
                ))
            })?;
            let value = match var {
                ProvidedVar::Plain(values) => Value::Plain(VecValue::new(values)),
                ProvidedVar::Cipher { ciphertext, len } => {
                    let keys = keys.as_ref().ok_or_else(|| {
                        EngineError::Schema(format!(
                            "participant '{}' sent ciphertexts without evaluation keys",
                            participant.name
                        ))
                    })?;
                    Value::Enc(EncValue::new(ciphertext, keys.clone(), len))
                }
            };
            resolved.insert(required, value)?;
        }
        drop(vars);

        let schedule: Vec<&Atomic> = self.algorithm.schedule().collect();
        for (idx, atomic) in schedule.iter().enumerate() {
            let value = self.compute_atomic(atomic, &resolved, keys.as_ref(), participant)?;
            resolved.insert(&atomic.name, value)?;

            if self.encrypted && (idx + 1) % EVICTION_INTERVAL == 0 {
                self.evict_unreferenced(&mut resolved, &schedule[idx + 1..]);
            }
        }

        // Only the KPIs leave the proxy.
        let discard: Vec<String> = self
            .algorithm
            .non_kpis
            .iter()
            .chain(self.algorithm.required.iter())
            .cloned()
            .collect();
        resolved.remove_named(discard);
        Ok(resolved)
    }

    fn compute_atomic(
        &self,
        atomic: &Atomic,
        resolved: &ResolvedValues,
        keys: Option<&Arc<EvalKeys>>,
        participant: &Participant,
    ) -> Result<Value, EngineError> {
        let mut fetched = Vec::with_capacity(atomic.var.len());
        for name in &atomic.var {
            fetched.push(resolved.get(name)?.clone());
        }
        let operands = ops::build_operands(atomic.op, fetched, atomic.constant, keys)?;

        // Multiplying non-scalar vectors is routed through the participant
        // even though the slotwise circuit exists; see the catalog notes.
        let non_scalar_mul = atomic.op == OpKind::Multiplication
            && operands.iter().any(|operand| operand.len() > 1);
        if self.offload.contains(&atomic.op) || non_scalar_mul {
            return self.offload_atomic(atomic, &operands, participant);
        }

        let start = Instant::now();
        match ops::apply(atomic.op, &operands) {
            Ok(value) => {
                self.metrics.record_local_op(start.elapsed());
                Ok(value)
            }
            Err(EvalError::Offload) => {
                warn!(
                    atomic = %atomic.name,
                    op = %atomic.op,
                    "local evaluation hit the chain budget, offloading"
                );
                self.offload_atomic(atomic, &operands, participant)
            }
            Err(fatal) => Err(fatal.into()),
        }
    }

    /// Round-trip one operation through the participant, accounting the
    /// ciphertext traffic.
    fn offload_atomic(
        &self,
        atomic: &Atomic,
        operands: &[Value],
        participant: &Participant,
    ) -> Result<Value, EngineError> {
        if self.encrypted {
            let upload: usize = operands.iter().map(Value::byte_size).sum();
            self.metrics.record_traffic(upload);
            self.metrics.count_uploads(operands.len());
            self.metrics.count_downloads(1);
            for operand in operands {
                if operand.is_encrypted() {
                    self.metrics.record_cipher_size(operand.byte_size());
                }
            }
        }

        debug!(atomic = %atomic.name, op = %atomic.op, "offloading to participant");
        let start = Instant::now();
        let value = participant.compute_offloaded(atomic.op, operands)?;
        self.metrics.record_offload_op(start.elapsed());
        Ok(value)
    }

    /// Drop every non-KPI entry no remaining atomic references.
    fn evict_unreferenced(&self, resolved: &mut ResolvedValues, remaining: &[&Atomic]) {
        let still_needed: HashSet<&str> = remaining
            .iter()
            .flat_map(|atomic| atomic.var.iter().map(String::as_str))
            .collect();
        let discard: Vec<String> = resolved
            .names()
            .filter(|name| !still_needed.contains(name) && self.algorithm.non_kpis.contains(*name))
            .map(str::to_owned)
            .collect();
        if !discard.is_empty() {
            debug!(evicted = discard.len(), "evicting unreferenced intermediates");
            resolved.remove_named(discard);
        }
    }

    /// Sum each KPI over all participants under the statistics key. All
    /// submissions must agree on the KPI dimension.
    pub fn aggregate_kpis(
        &self,
        submissions: &[(String, BTreeMap<String, CipherInput>)],
        statistics_keys: &Arc<EvalKeys>,
    ) -> Result<BTreeMap<String, KpiAggregate>, EngineError> {
        let mut aggregates = BTreeMap::new();
        for kpi in &self.algorithm.kpis {
            let mut len = 0usize;
            let mut operands: Vec<Value> = Vec::with_capacity(submissions.len());
            for (participant, submission) in submissions {
                let input = submission.get(kpi).ok_or_else(|| EngineError::MissingKpi {
                    participant: participant.clone(),
                    kpi: kpi.clone(),
                })?;
                if operands.is_empty() {
                    len = input.len;
                } else if input.len != len {
                    return Err(EngineError::AggregationDimension {
                        kpi: kpi.clone(),
                        expected: len,
                        got: input.len,
                    });
                }
                operands.push(Value::Enc(EncValue::new(
                    input.ciphertext.clone(),
                    statistics_keys.clone(),
                    input.len,
                )));
            }

            let sum = ops::apply(OpKind::Addition, &operands)?;
            let Value::Enc(sum) = sum else {
                return Err(EngineError::Schema(
                    "aggregation must produce an encrypted sum".into(),
                ));
            };
            aggregates.insert(
                kpi.clone(),
                KpiAggregate {
                    sum,
                    len,
                    count: submissions.len(),
                },
            );
        }
        Ok(aggregates)
    }
}
