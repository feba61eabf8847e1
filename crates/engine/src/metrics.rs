// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! Evaluation metrics sink.
//!
//! One process-wide instance shared by every worker; writes go through a
//! single mutex and are additive, so their order across workers does not
//! matter. A disabled sink (accuracy pass) swallows every record.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Inner {
    traffic_bytes: u64,
    ciphers_up: u64,
    ciphers_down: u64,
    cipher_size: BTreeMap<usize, u64>,
    op_local: Vec<f64>,
    op_offload: Vec<f64>,
    levels: usize,
    benchmarking_clients: Vec<f64>,
    client_agg: Vec<f64>,
    keygen: f64,
    keygen_size: usize,
    sample: String,
    benchmarking: f64,
    proxy_agg: f64,
    server_agg: f64,
    accuracy: f64,
}

pub struct EvalMetrics {
    enabled: bool,
    inner: Mutex<Inner>,
}

impl EvalMetrics {
    pub fn new(enabled: bool) -> Arc<Self> {
        Arc::new(Self {
            enabled,
            inner: Mutex::new(Inner::default()),
        })
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    fn with<F: FnOnce(&mut Inner)>(&self, f: F) {
        if self.enabled {
            f(&mut self.inner.lock().unwrap());
        }
    }

    pub fn record_local_op(&self, duration: Duration) {
        self.with(|m| m.op_local.push(duration.as_secs_f64()));
    }

    pub fn record_offload_op(&self, duration: Duration) {
        self.with(|m| m.op_offload.push(duration.as_secs_f64()));
    }

    pub fn record_traffic(&self, bytes: usize) {
        self.with(|m| m.traffic_bytes += bytes as u64);
    }

    pub fn count_uploads(&self, ciphers: usize) {
        self.with(|m| m.ciphers_up += ciphers as u64);
    }

    pub fn count_downloads(&self, ciphers: usize) {
        self.with(|m| m.ciphers_down += ciphers as u64);
    }

    pub fn record_cipher_size(&self, bytes: usize) {
        self.with(|m| *m.cipher_size.entry(bytes).or_insert(0) += 1);
    }

    pub fn set_levels(&self, levels: usize) {
        self.with(|m| m.levels = levels);
    }

    pub fn record_keygen(&self, duration: Duration, key_material_size: usize) {
        self.with(|m| {
            m.keygen = duration.as_secs_f64();
            m.keygen_size = key_material_size;
        });
    }

    pub fn set_sample(&self, sample: &str) {
        self.with(|m| m.sample = sample.to_owned());
    }

    pub fn record_client_benchmark(&self, duration: Duration) {
        self.with(|m| m.benchmarking_clients.push(duration.as_secs_f64()));
    }

    pub fn record_client_agg(&self, duration: Duration) {
        self.with(|m| m.client_agg.push(duration.as_secs_f64()));
    }

    pub fn set_benchmarking(&self, duration: Duration) {
        self.with(|m| m.benchmarking = duration.as_secs_f64());
    }

    pub fn set_proxy_agg(&self, duration: Duration) {
        self.with(|m| m.proxy_agg = duration.as_secs_f64());
    }

    pub fn set_server_agg(&self, duration: Duration) {
        self.with(|m| m.server_agg = duration.as_secs_f64());
    }

    pub fn set_accuracy(&self, accuracy: f64) {
        self.with(|m| m.accuracy = accuracy);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let m = self.inner.lock().unwrap();
        let total_ops = m.op_local.len() + m.op_offload.len();
        MetricsSnapshot {
            traffic_bytes: m.traffic_bytes,
            ciphers_up: m.ciphers_up,
            ciphers_down: m.ciphers_down,
            cipher_size: m.cipher_size.clone(),
            op_local: mean(&m.op_local),
            op_offload: mean(&m.op_offload),
            op_offload_count: m.op_offload.len(),
            offloaded_pct: if total_ops == 0 {
                0.0
            } else {
                m.op_offload.len() as f64 / total_ops as f64
            },
            levels: m.levels,
            benchmarking_clients: mean(&m.benchmarking_clients),
            client_agg: mean(&m.client_agg),
            keygen: m.keygen,
            keygen_size: m.keygen_size,
            sample: m.sample.clone(),
            benchmarking: m.benchmarking,
            proxy_agg: m.proxy_agg,
            server_agg: m.server_agg,
            accuracy: m.accuracy,
        }
    }

    /// Append one CSV row of the collected metrics, emitting the header
    /// when the file is empty or new.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let snapshot = self.snapshot();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        if file.metadata()?.len() == 0 {
            writeln!(file, "{}", MetricsSnapshot::CSV_HEADER)?;
        }
        writeln!(file, "{}", snapshot.to_csv_row())?;
        Ok(())
    }
}

/// The flattened, averaged form that lands in the results CSV.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub traffic_bytes: u64,
    pub ciphers_up: u64,
    pub ciphers_down: u64,
    /// Histogram of observed ciphertext byte sizes.
    pub cipher_size: BTreeMap<usize, u64>,
    /// Mean duration of locally computed operations; -1 when none ran.
    pub op_local: f64,
    /// Mean duration of offloaded operations; -1 when none ran.
    pub op_offload: f64,
    pub op_offload_count: usize,
    pub offloaded_pct: f64,
    pub levels: usize,
    pub benchmarking_clients: f64,
    pub client_agg: f64,
    pub keygen: f64,
    pub keygen_size: usize,
    pub sample: String,
    pub benchmarking: f64,
    pub proxy_agg: f64,
    pub server_agg: f64,
    pub accuracy: f64,
}

impl MetricsSnapshot {
    pub const CSV_HEADER: &'static str = "traffic_bytes,ciphers_up,ciphers_down,cipher_size,\
op_local,op_offload,op_offload_count,offloaded_pct,levels,benchmarking_clients,client_agg,\
keygen,keygen_size,sample,benchmarking,proxy_agg,server_agg,accuracy";

    pub fn to_csv_row(&self) -> String {
        let sizes = serde_json::to_string(&self.cipher_size).unwrap_or_default();
        [
            self.traffic_bytes.to_string(),
            self.ciphers_up.to_string(),
            self.ciphers_down.to_string(),
            csv_escape(&sizes),
            self.op_local.to_string(),
            self.op_offload.to_string(),
            self.op_offload_count.to_string(),
            self.offloaded_pct.to_string(),
            self.levels.to_string(),
            self.benchmarking_clients.to_string(),
            self.client_agg.to_string(),
            self.keygen.to_string(),
            self.keygen_size.to_string(),
            csv_escape(&self.sample),
            self.benchmarking.to_string(),
            self.proxy_agg.to_string(),
            self.server_agg.to_string(),
            self.accuracy.to_string(),
        ]
        .join(",")
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        -1.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_sink_swallows_records() {
        let metrics = EvalMetrics::new(false);
        metrics.record_traffic(100);
        metrics.count_uploads(2);
        metrics.record_local_op(Duration::from_millis(5));
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.traffic_bytes, 0);
        assert_eq!(snapshot.ciphers_up, 0);
        assert_eq!(snapshot.op_local, -1.0);
    }

    #[test]
    fn test_offload_percentage() {
        let metrics = EvalMetrics::new(true);
        metrics.record_local_op(Duration::from_millis(1));
        metrics.record_local_op(Duration::from_millis(3));
        metrics.record_local_op(Duration::from_millis(2));
        metrics.record_offload_op(Duration::from_millis(8));
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.op_offload_count, 1);
        assert!((snapshot.offloaded_pct - 0.25).abs() < 1e-12);
        assert!((snapshot.op_local - 0.002).abs() < 1e-9);
    }

    #[test]
    fn test_csv_append_with_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        let metrics = EvalMetrics::new(true);
        metrics.record_traffic(42);
        metrics.record_cipher_size(1024);
        metrics.set_sample("algorithms/atomics.yaml");
        metrics.write_csv(&path).unwrap();
        metrics.write_csv(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("traffic_bytes,ciphers_up"));
        assert!(lines[1].starts_with("42,"));
        // The histogram cell is quoted because of its separators.
        assert!(lines[1].contains("\"{\"\"1024\"\":1}\""));
    }
}
