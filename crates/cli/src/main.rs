// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use anyhow::{Context, Result};
use clap::Parser;
use pib_config::{load_config, AppConfig};
use pib_engine::{runner, EvalMetrics};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Privacy-preserving industry benchmarking over CKKS.
#[derive(Parser)]
#[command(name = "pib", version, about)]
struct Cli {
    /// Atomic algorithm catalog (YAML)
    #[arg(short = 'a', long = "algorithms")]
    algorithms: PathBuf,

    /// Directory holding the participant input files (comp00.yaml, ...)
    #[arg(short = 'i', long = "inputs")]
    inputs: PathBuf,

    /// File the evaluation results row is appended to
    #[arg(short = 'e', long = "eval", default_value = "results.csv")]
    eval: PathBuf,

    /// Run configuration (YAML); defaults apply when omitted
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };

    let metrics = EvalMetrics::new(config.evaluation);
    let outcome = runner::run_with_accuracy(&config, &cli.algorithms, &cli.inputs, metrics.clone())
        .context("benchmarking pipeline failed")?;

    for participant in &outcome.participants {
        for (kpi, values) in &participant.kpis {
            info!(participant = %participant.name, kpi = %kpi, ?values, "KPI result");
        }
    }
    if let Some(statistics) = &outcome.statistics {
        for (kpi, statistic) in statistics {
            info!(kpi = %kpi, avg = ?statistic.avg, "group statistic");
        }
    }

    if config.evaluation {
        metrics
            .write_csv(&cli.eval)
            .with_context(|| format!("could not write evaluation to {}", cli.eval.display()))?;
        info!(path = %cli.eval.display(), "evaluation row appended");
    }

    Ok(())
}
