// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! The input owner.
//!
//! A participant reads its variable file, verifies it covers the
//! algorithm's required inputs and, in encrypted mode, generates its own
//! CKKS key bundle. It hands the proxy only ciphertexts plus evaluation
//! keys; the decryption key never leaves this struct. During evaluation
//! it acts as the decrypt-and-recompute oracle behind the offload path.

use crate::crypto;
use crate::error::EngineError;
use crate::metrics::EvalMetrics;
use crate::server::Statistic;
use pib_ckks::{Ciphertext, EvalKeys, KeyBundle, SharedRng};
use pib_config::{AppConfig, Mode};
use pib_values::{ops, EncValue, EvalError, OpKind, ResolvedValues, Value, VecValue};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Deserialize)]
struct InputFile {
    vars: Vec<InputVar>,
}

#[derive(Deserialize)]
struct InputVar {
    name: String,
    values: Vec<f64>,
}

/// One variable as the proxy receives it.
pub enum ProvidedVar {
    Plain(Vec<f64>),
    Cipher { ciphertext: Ciphertext, len: usize },
}

/// The upload from a participant to the proxy.
pub struct ProvidedInputs {
    pub vars: HashMap<String, ProvidedVar>,
}

/// One encrypted KPI result as submitted for aggregation.
pub struct CipherInput {
    pub ciphertext: Ciphertext,
    pub len: usize,
}

pub struct Participant {
    pub name: String,
    inputs: HashMap<String, Vec<f64>>,
    mode: Mode,
    bundle: Option<KeyBundle>,
    metrics: Arc<EvalMetrics>,
    /// Decrypted per-KPI results, set once the proxy returns.
    pub results: Option<BTreeMap<String, Vec<f64>>>,
    /// Group statistics received after aggregation.
    pub aggregation_results: Option<BTreeMap<String, Statistic>>,
}

impl Participant {
    /// Build a participant from its input file, verifying the required
    /// variables and generating key material when the run is encrypted.
    pub fn from_file<P: AsRef<Path>>(
        config: &AppConfig,
        path: P,
        required: &BTreeSet<String>,
        metrics: Arc<EvalMetrics>,
        rng: SharedRng,
    ) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let raw = std::fs::read_to_string(path)?;
        let parsed: InputFile = serde_yaml::from_str(&raw)?;
        let mut inputs = HashMap::new();
        for var in parsed.vars {
            if inputs.insert(var.name.clone(), var.values).is_some() {
                return Err(EngineError::Schema(format!(
                    "participant '{name}': input variable '{}' given twice",
                    var.name
                )));
            }
        }

        for required_var in required {
            if !inputs.contains_key(required_var) {
                return Err(EngineError::Schema(format!(
                    "participant '{name}': required variable '{required_var}' missing from input"
                )));
            }
        }

        let bundle = match config.mode {
            Mode::Plaintext => None,
            Mode::Encrypted => {
                let ctx = crypto::participant_context(&config.crypto)?;
                Some(crypto::generate_bundle(ctx, rng, &metrics))
            }
        };

        info!(participant = %name, variables = inputs.len(), mode = ?config.mode, "participant ready");
        Ok(Self {
            name,
            inputs,
            mode: config.mode,
            bundle,
            metrics,
            results: None,
            aggregation_results: None,
        })
    }

    /// The evaluation-key subset the proxy computes with; `None` in
    /// plaintext mode.
    pub fn eval_keys(&self) -> Option<Arc<EvalKeys>> {
        self.bundle.as_ref().map(|b| b.eval.clone())
    }

    /// Package the inputs for the proxy: raw values in plaintext mode,
    /// freshly encrypted ciphertexts tagged with their semantic length
    /// otherwise.
    pub fn provide_inputs(&self) -> Result<ProvidedInputs, EngineError> {
        let mut vars = HashMap::new();
        match &self.bundle {
            None => {
                for (name, values) in &self.inputs {
                    vars.insert(name.clone(), ProvidedVar::Plain(values.clone()));
                }
            }
            Some(bundle) => {
                for (name, values) in &self.inputs {
                    let ciphertext = bundle
                        .eval
                        .encrypt_vector(values)
                        .map_err(EvalError::from)?;
                    vars.insert(
                        name.clone(),
                        ProvidedVar::Cipher {
                            ciphertext,
                            len: values.len(),
                        },
                    );
                }
            }
        }
        Ok(ProvidedInputs { vars })
    }

    /// Offload service: decrypt the operand tuple, run the plain kernel
    /// the cleartext mode would use, re-encrypt the result under the own
    /// bundle. In plaintext mode the kernel runs directly.
    pub fn compute_offloaded(
        &self,
        op: OpKind,
        operands: &[Value],
    ) -> Result<Value, EngineError> {
        let Some(bundle) = &self.bundle else {
            return ops::apply(op, operands).map_err(|e| budget_or_fatal(op, e));
        };

        let mut cleartext = Vec::with_capacity(operands.len());
        for operand in operands {
            match operand {
                Value::Plain(v) => cleartext.push(Value::Plain(v.clone())),
                Value::Enc(enc) => {
                    let mut slots = bundle
                        .decrypt_vector(&enc.ciphertext)
                        .map_err(EvalError::from)?;
                    slots.truncate(enc.len());
                    cleartext.push(Value::Plain(VecValue::new(slots)));
                }
            }
        }

        let result = ops::apply(op, &cleartext).map_err(|e| budget_or_fatal(op, e))?;
        let result = result.as_plain()?;

        let ciphertext = bundle
            .eval
            .encrypt_vector(result.values())
            .map_err(EvalError::from)?;
        let enc_result = EncValue::new(ciphertext, bundle.eval.clone(), result.len());
        self.metrics.record_traffic(enc_result.byte_size());
        self.metrics.record_cipher_size(enc_result.byte_size());
        debug!(participant = %self.name, %op, len = result.len(), "served offloaded operation");
        Ok(Value::Enc(enc_result))
    }

    /// Take over the proxy's surviving result table, decrypting the KPIs
    /// (and truncating to their semantic lengths) in encrypted mode.
    pub fn accept_results(&mut self, resolved: &ResolvedValues) -> Result<(), EngineError> {
        let mut results = BTreeMap::new();
        for (name, value) in resolved.iter() {
            let values = match value {
                Value::Plain(v) => v.values().to_vec(),
                Value::Enc(enc) => {
                    let bundle = self.bundle.as_ref().ok_or_else(|| {
                        EngineError::Schema(format!(
                            "participant '{}' received ciphertext results in plaintext mode",
                            self.name
                        ))
                    })?;
                    let mut slots = bundle
                        .decrypt_vector(&enc.ciphertext)
                        .map_err(EvalError::from)?;
                    slots.truncate(enc.len());
                    slots
                }
            };
            results.insert(name.to_owned(), values);
        }
        self.results = Some(results);
        Ok(())
    }

    /// Re-encode the decrypted KPI results under the statistics server's
    /// public bundle for aggregation.
    pub fn prepare_aggregation(
        &self,
        statistics_keys: &Arc<EvalKeys>,
    ) -> Result<BTreeMap<String, CipherInput>, EngineError> {
        let results = self.results.as_ref().ok_or_else(|| {
            EngineError::Schema(format!(
                "participant '{}' has no results to aggregate",
                self.name
            ))
        })?;

        let mut aggregates = BTreeMap::new();
        for (kpi, values) in results {
            let ciphertext = statistics_keys
                .encrypt_vector(values)
                .map_err(EvalError::from)?;
            aggregates.insert(
                kpi.clone(),
                CipherInput {
                    ciphertext,
                    len: values.len(),
                },
            );
        }
        Ok(aggregates)
    }

    pub fn accept_aggregation(&mut self, statistics: BTreeMap<String, Statistic>) {
        self.aggregation_results = Some(statistics);
    }

    pub fn is_encrypted(&self) -> bool {
        self.mode == Mode::Encrypted
    }
}

/// A plain kernel has no offload fallback left; the signal coming back
/// from the participant side means the budget error class.
fn budget_or_fatal(op: OpKind, err: EvalError) -> EngineError {
    match err {
        EvalError::Offload => EngineError::Budget(format!(
            "operation {op} not computable on the participant either"
        )),
        other => other.into(),
    }
}
