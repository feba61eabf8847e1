// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! The statistics server.
//!
//! Holds the second FHE key of the pipeline. Receives per-KPI encrypted
//! sums from the proxy, decrypts them, refuses to release anything
//! computed from fewer than k participants and emits per-slot averages.
//! Minimum and maximum would need comparisons under FHE and are reported
//! as zero.

use crate::crypto;
use crate::error::EngineError;
use crate::proxy::KpiAggregate;
use pib_ckks::{EvalKeys, KeyBundle, SharedRng};
use pib_config::AppConfig;
use pib_values::EvalError;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Group statistics for one KPI.
#[derive(Debug, Clone)]
pub struct Statistic {
    pub avg: Vec<f64>,
    pub min: f64,
    pub max: f64,
}

pub struct StatisticsServer {
    bundle: KeyBundle,
}

impl StatisticsServer {
    pub fn new(config: &AppConfig, rng: SharedRng) -> Result<Self, EngineError> {
        let ctx = crypto::statistics_context(&config.crypto)?;
        let bundle = KeyBundle::generate(ctx, rng);
        info!("statistics server key material ready");
        Ok(Self { bundle })
    }

    /// The public bundle participants re-encrypt their KPIs under.
    pub fn provide_crypto(&self) -> Arc<EvalKeys> {
        self.bundle.eval.clone()
    }

    /// Decrypt the aggregates and release averages, enforcing the
    /// k-anonymity gate.
    pub fn compute_statistics(
        &self,
        aggregates: &BTreeMap<String, KpiAggregate>,
        k: usize,
    ) -> Result<BTreeMap<String, Statistic>, EngineError> {
        let mut statistics = BTreeMap::new();
        for (kpi, aggregate) in aggregates {
            if aggregate.count < k {
                warn!(kpi = %kpi, count = aggregate.count, k, "k-anonymity violation");
                return Err(EngineError::KAnonymity {
                    k,
                    got: aggregate.count,
                });
            }

            let mut sum = self
                .bundle
                .decrypt_vector(&aggregate.sum.ciphertext)
                .map_err(EvalError::from)?;
            sum.truncate(aggregate.len);
            let avg = sum
                .into_iter()
                .map(|slot| slot / aggregate.count as f64)
                .collect();
            statistics.insert(
                kpi.clone(),
                Statistic {
                    avg,
                    min: 0.0,
                    max: 0.0,
                },
            );
        }
        Ok(statistics)
    }
}
