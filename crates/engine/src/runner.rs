// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! Multi-participant orchestration.
//!
//! One worker per input file runs the benchmarking phase; workers share
//! only the read-only proxy and the metrics sink and join at a barrier
//! before aggregation. Input files are taken in lexicographic order so
//! aggregation order is reproducible. After an encrypted run the whole
//! pipeline is recomputed on cleartext to measure the numeric drift of
//! the FHE results.

use crate::error::EngineError;
use crate::metrics::EvalMetrics;
use crate::participant::Participant;
use crate::proxy::Proxy;
use crate::server::{Statistic, StatisticsServer};
use pib_algorithm::Algorithm;
use pib_ckks::SharedRng;
use pib_config::{AppConfig, Mode};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{info, warn};

/// Decrypted per-participant view of one finished run.
pub struct ParticipantReport {
    pub name: String,
    pub kpis: BTreeMap<String, Vec<f64>>,
}

pub struct BenchmarkOutcome {
    pub participants: Vec<ParticipantReport>,
    /// Group statistics; `None` when aggregation was skipped.
    pub statistics: Option<BTreeMap<String, Statistic>>,
}

/// Every `*.yaml` file of the input directory, lexicographically sorted.
pub fn input_files(dir: &Path) -> Result<Vec<PathBuf>, EngineError> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file() && path.extension().map(|ext| ext == "yaml").unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Run benchmarking and aggregation once, in the configured mode.
pub fn run(
    config: &AppConfig,
    algorithm_path: &Path,
    inputs_dir: &Path,
    metrics: Arc<EvalMetrics>,
) -> Result<BenchmarkOutcome, EngineError> {
    let files = input_files(inputs_dir)?;
    if files.is_empty() {
        return Err(EngineError::Schema(format!(
            "no participant input files found in {}",
            inputs_dir.display()
        )));
    }
    metrics.set_sample(&algorithm_path.display().to_string());

    let algorithm = Algorithm::from_file(algorithm_path)?;
    if let Some((name, depth)) = algorithm
        .multiplicative_depths()
        .into_iter()
        .max_by_key(|(_, depth)| *depth)
    {
        info!(atomic = %name, depth, "deepest multiplication chain in catalog");
    }
    let proxy = Proxy::new(config, algorithm, metrics.clone());
    let rng: SharedRng = Arc::new(Mutex::new(ChaCha20Rng::from_entropy()));
    let server = StatisticsServer::new(config, rng.clone())?;

    info!(participants = files.len(), mode = ?config.mode, "starting benchmarking");
    let bench_start = Instant::now();
    let mut participants = files
        .par_iter()
        .map(|path| -> Result<Participant, EngineError> {
            let start = Instant::now();
            let mut participant = Participant::from_file(
                config,
                path,
                &proxy.algorithm().required,
                metrics.clone(),
                rng.clone(),
            )?;
            let resolved = proxy.compute_kpis(&participant)?;
            participant.accept_results(&resolved)?;
            metrics.record_client_benchmark(start.elapsed());
            info!(participant = %participant.name, "benchmarking done");
            Ok(participant)
        })
        .collect::<Result<Vec<Participant>, EngineError>>()?;
    metrics.set_benchmarking(bench_start.elapsed());

    let statistics = if participants.len() > 1 {
        let statistics_keys = server.provide_crypto();

        let mut submissions = Vec::with_capacity(participants.len());
        for participant in &participants {
            let start = Instant::now();
            let submission = participant.prepare_aggregation(&statistics_keys)?;
            metrics.record_client_agg(start.elapsed());
            submissions.push((participant.name.clone(), submission));
        }

        let start = Instant::now();
        let aggregates = proxy.aggregate_kpis(&submissions, &statistics_keys)?;
        metrics.set_proxy_agg(start.elapsed());

        let start = Instant::now();
        let statistics = server.compute_statistics(&aggregates, participants.len())?;
        metrics.set_server_agg(start.elapsed());
        info!(kpis = statistics.len(), "aggregation done");

        for participant in &mut participants {
            participant.accept_aggregation(statistics.clone());
        }
        Some(statistics)
    } else {
        warn!("only one participant took part, skipping aggregation");
        None
    };

    let participants = participants
        .into_iter()
        .map(|p| {
            let name = p.name.clone();
            ParticipantReport {
                kpis: p.results.unwrap_or_default(),
                name,
            }
        })
        .collect();
    Ok(BenchmarkOutcome {
        participants,
        statistics,
    })
}

/// Run in the configured mode, then recompute on cleartext and record the
/// mean first-slot deviation of every KPI as the accuracy metric.
pub fn run_with_accuracy(
    config: &AppConfig,
    algorithm_path: &Path,
    inputs_dir: &Path,
    metrics: Arc<EvalMetrics>,
) -> Result<BenchmarkOutcome, EngineError> {
    let outcome = run(config, algorithm_path, inputs_dir, metrics.clone())?;
    if config.is_encrypted() {
        info!("recomputing on cleartext for the accuracy comparison");
        let mut reference_config = config.clone();
        reference_config.mode = Mode::Plaintext;
        reference_config.evaluation = false;
        let reference = run(
            &reference_config,
            algorithm_path,
            inputs_dir,
            EvalMetrics::new(false),
        )?;
        metrics.set_accuracy(accuracy_pct(&reference, &outcome));
    }
    Ok(outcome)
}

/// Mean percentual first-slot deviation between the cleartext reference
/// and the measured run; individual drifts beyond 2% are logged.
fn accuracy_pct(reference: &BenchmarkOutcome, measured: &BenchmarkOutcome) -> f64 {
    let mut deviations = Vec::new();
    for (ref_part, measured_part) in reference.participants.iter().zip(&measured.participants) {
        for (kpi, ref_values) in &ref_part.kpis {
            let Some(measured_values) = measured_part.kpis.get(kpi) else {
                continue;
            };
            let (Some(&r0), Some(&m0)) = (ref_values.first(), measured_values.first()) else {
                continue;
            };
            if r0 == 0.0 {
                continue;
            }
            let loss = (r0 - m0).abs() / r0.abs() * 100.0;
            if loss > 2.0 {
                warn!(
                    participant = %ref_part.name,
                    kpi = %kpi,
                    reference = r0,
                    measured = m0,
                    loss_pct = loss,
                    "encrypted result drifted beyond tolerance"
                );
            }
            deviations.push(loss);
        }
    }
    if deviations.is_empty() {
        0.0
    } else {
        deviations.iter().sum::<f64>() / deviations.len() as f64
    }
}
