// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! End-to-end pipeline scenarios over both evaluation modes.
//!
//! The encrypted scenarios run on a reduced ring degree to keep key
//! generation fast; the chain discipline is identical to the production
//! degrees.

use pib_config::{AppConfig, CryptoConfig, Mode};
use pib_engine::{runner, EngineError, EvalMetrics};
use std::path::PathBuf;
use tempfile::TempDir;

struct Setup {
    _dir: TempDir,
    algorithm: PathBuf,
    inputs: PathBuf,
}

fn setup(catalog: &str, inputs: &[(&str, &str)]) -> Setup {
    let dir = tempfile::tempdir().unwrap();
    let algorithm = dir.path().join("algorithm.yaml");
    std::fs::write(&algorithm, catalog).unwrap();
    let inputs_dir = dir.path().join("inputs");
    std::fs::create_dir(&inputs_dir).unwrap();
    for (name, content) in inputs {
        std::fs::write(inputs_dir.join(name), content).unwrap();
    }
    Setup {
        algorithm,
        inputs: inputs_dir,
        _dir: dir,
    }
}

fn config(mode: Mode, evaluation: bool) -> AppConfig {
    AppConfig {
        mode,
        crypto: CryptoConfig {
            // Reduced degree for test speed; not a production parameter.
            polymod: 2048,
            level: 3,
            scale: 2f64.powi(40),
        },
        offload: Vec::new(),
        evaluation,
        networking: false,
    }
}

fn assert_close(actual: &[f64], expected: &[f64], tolerance_pct: f64) {
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(expected) {
        let bound = if *e == 0.0 {
            tolerance_pct / 100.0
        } else {
            e.abs() * tolerance_pct / 100.0
        };
        assert!(
            (a - e).abs() <= bound,
            "expected {e}, got {a} (tolerance {tolerance_pct}%)"
        );
    }
}

#[test]
fn test_single_participant_cleartext() {
    let setup = setup(
        r#"
operations:
  - name: a
    op: DefConst
    constant: 3.0
    is_kpi: false
  - name: b
    op: DefConst
    constant: 4.0
    is_kpi: false
  - name: s
    op: Addition
    var: [a, b]
    is_kpi: false
  - name: k
    op: Addition
    var: [s]
    is_kpi: true
"#,
        &[("comp00.yaml", "vars: []\n")],
    );

    let metrics = EvalMetrics::new(false);
    let outcome = runner::run(
        &config(Mode::Plaintext, false),
        &setup.algorithm,
        &setup.inputs,
        metrics,
    )
    .unwrap();

    assert_eq!(outcome.participants.len(), 1);
    let kpis = &outcome.participants[0].kpis;
    // Only the KPI survives the proxy's final eviction.
    assert_eq!(kpis.len(), 1);
    assert_eq!(kpis["k"], vec![7.0]);
    assert!(outcome.statistics.is_none());
}

#[test]
fn test_two_participants_cleartext_aggregation() {
    let setup = setup(
        r#"
operations:
  - name: kpi
    op: AdditionConst
    var: [x]
    constant: 1.0
    is_kpi: true
"#,
        &[
            ("comp00.yaml", "vars:\n  - name: x\n    values: [2.0, 4.0]\n"),
            ("comp01.yaml", "vars:\n  - name: x\n    values: [6.0, 8.0]\n"),
        ],
    );

    let metrics = EvalMetrics::new(false);
    let outcome = runner::run(
        &config(Mode::Plaintext, false),
        &setup.algorithm,
        &setup.inputs,
        metrics,
    )
    .unwrap();

    assert_eq!(outcome.participants.len(), 2);
    assert_eq!(outcome.participants[0].name, "comp00");
    assert_eq!(outcome.participants[0].kpis["kpi"], vec![3.0, 5.0]);
    assert_eq!(outcome.participants[1].kpis["kpi"], vec![7.0, 9.0]);

    let statistics = outcome.statistics.expect("aggregation must run");
    let kpi = &statistics["kpi"];
    assert_close(&kpi.avg, &[5.0, 7.0], 1.0);
    assert_eq!(kpi.min, 0.0);
    assert_eq!(kpi.max, 0.0);
}

#[test]
fn test_encrypted_local_only_operations() {
    let setup = setup(
        r#"
operations:
  - name: y
    op: MultiplicationConst
    var: [x]
    constant: 2.0
    is_kpi: false
  - name: kpi
    op: AdditionConst
    var: [y]
    constant: 1.0
    is_kpi: true
"#,
        &[("comp00.yaml", "vars:\n  - name: x\n    values: [1.0, 2.0, 3.0]\n")],
    );

    let metrics = EvalMetrics::new(true);
    let outcome = runner::run(
        &config(Mode::Encrypted, true),
        &setup.algorithm,
        &setup.inputs,
        metrics.clone(),
    )
    .unwrap();

    assert_close(&outcome.participants[0].kpis["kpi"], &[3.0, 5.0, 7.0], 2.0);
    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.op_offload_count, 0);
    assert_eq!(snapshot.levels, 3);
    assert!(snapshot.keygen_size > 0);
}

#[test]
fn test_encrypted_division_offloads() {
    let setup = setup(
        r#"
operations:
  - name: z
    op: Division
    var: [a, b]
    is_kpi: true
"#,
        &[(
            "comp00.yaml",
            "vars:\n  - name: a\n    values: [8.0, 4.0]\n  - name: b\n    values: [2.0, 4.0]\n",
        )],
    );

    let metrics = EvalMetrics::new(true);
    let outcome = runner::run(
        &config(Mode::Encrypted, true),
        &setup.algorithm,
        &setup.inputs,
        metrics.clone(),
    )
    .unwrap();

    assert_close(&outcome.participants[0].kpis["z"], &[4.0, 1.0], 2.0);
    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.ciphers_up, 2);
    assert_eq!(snapshot.ciphers_down, 1);
    assert_eq!(snapshot.op_offload_count, 1);
    assert!(snapshot.traffic_bytes > 0);
    assert!(!snapshot.cipher_size.is_empty());
}

#[test]
fn test_scale_exhaustion_falls_back_transparently() {
    let mut catalog = String::from("operations:\n");
    let mut previous = String::from("x");
    for i in 1..=10 {
        let name = format!("m{i}");
        let is_kpi = i == 10;
        catalog.push_str(&format!(
            "  - name: {name}\n    op: MultiplicationConst\n    var: [{previous}]\n    constant: 1.5\n    is_kpi: {is_kpi}\n",
        ));
        previous = name;
    }
    let setup = setup(&catalog, &[("comp00.yaml", "vars:\n  - name: x\n    values: [2.0]\n")]);

    let metrics = EvalMetrics::new(true);
    let outcome = runner::run_with_accuracy(
        &config(Mode::Encrypted, true),
        &setup.algorithm,
        &setup.inputs,
        metrics.clone(),
    )
    .unwrap();

    let expected = 2.0 * 1.5f64.powi(10);
    assert_close(&outcome.participants[0].kpis["m10"], &[expected], 2.0);

    let snapshot = metrics.snapshot();
    // The chain budget cannot carry ten multiplications at level 3.
    assert!(snapshot.op_offload_count >= 1);
    assert!(snapshot.accuracy < 2.0);
}

#[test]
fn test_cyclic_catalog_rejected() {
    let setup = setup(
        r#"
operations:
  - name: a
    op: Addition
    var: [b]
    is_kpi: false
  - name: b
    op: Addition
    var: [a]
    is_kpi: true
"#,
        &[("comp00.yaml", "vars: []\n")],
    );

    let result = runner::run(
        &config(Mode::Plaintext, false),
        &setup.algorithm,
        &setup.inputs,
        EvalMetrics::new(false),
    );
    assert!(matches!(result, Err(EngineError::Algorithm(_))));
}

#[test]
fn test_missing_required_input_rejected() {
    let setup = setup(
        r#"
operations:
  - name: kpi
    op: AdditionConst
    var: [x]
    constant: 1.0
    is_kpi: true
"#,
        &[("comp00.yaml", "vars:\n  - name: unrelated\n    values: [1.0]\n")],
    );

    let result = runner::run(
        &config(Mode::Plaintext, false),
        &setup.algorithm,
        &setup.inputs,
        EvalMetrics::new(false),
    );
    assert!(matches!(result, Err(EngineError::Schema(_))));
}

#[test]
fn test_k_anonymity_gate() {
    use pib_ckks::SharedRng;
    use pib_engine::{KpiAggregate, StatisticsServer};
    use pib_values::EncValue;
    use rand::SeedableRng;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    let rng: SharedRng = Arc::new(Mutex::new(rand_chacha::ChaCha20Rng::from_seed([1u8; 32])));
    let server = StatisticsServer::new(&config(Mode::Encrypted, false), rng).unwrap();
    let keys = server.provide_crypto();

    let ciphertext = keys.encrypt_vector(&[10.0]).unwrap();
    let mut aggregates = BTreeMap::new();
    aggregates.insert(
        "kpi".to_owned(),
        KpiAggregate {
            sum: EncValue::new(ciphertext, keys.clone(), 1),
            len: 1,
            count: 2,
        },
    );

    assert!(matches!(
        server.compute_statistics(&aggregates, 3),
        Err(EngineError::KAnonymity { k: 3, got: 2 })
    ));
    // With enough participants the same aggregate is released.
    let statistics = server.compute_statistics(&aggregates, 2).unwrap();
    assert_close(&statistics["kpi"].avg, &[5.0], 1.0);
}
