// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use anyhow::{Context, Result};
use figment::{
    providers::{Format, Serialized, Yaml},
    Figment,
};
use pib_values::OpKind;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// Whether the pipeline runs on cleartext vectors or CKKS ciphertexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Plaintext,
    Encrypted,
}

/// CKKS parameters for the participant contexts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Poly modulus degree; 8192, 16384 or 32768.
    pub polymod: usize,
    /// Multiplicative-depth budget; the coefficient moduli are derived as
    /// `[60, 40, …, 40, 60]` of length `level + 1`.
    pub level: usize,
    /// Encoding scale for participant values.
    pub scale: f64,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            polymod: 8192,
            level: 3,
            scale: 2f64.powi(40),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub mode: Mode,
    pub crypto: CryptoConfig,
    /// Operations forced to the participant regardless of local
    /// feasibility.
    pub offload: Vec<OpKind>,
    /// Record evaluation metrics and write them to the results CSV.
    pub evaluation: bool,
    /// Wire transport between the principals; the in-process design keeps
    /// this off.
    pub networking: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Plaintext,
            crypto: CryptoConfig::default(),
            offload: Vec::new(),
            evaluation: false,
            networking: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("crypto.polymod must be 8192, 16384 or 32768, got {0}")]
    InvalidPolymod(usize),

    #[error("crypto.level must be at least 2, got {0}")]
    InvalidLevel(usize),

    #[error("crypto.scale must be a finite value greater than one, got {0}")]
    InvalidScale(f64),

    #[error("networking between principals is not implemented; set networking: false")]
    NetworkingUnsupported,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if ![8192, 16384, 32768].contains(&self.crypto.polymod) {
            return Err(ConfigError::InvalidPolymod(self.crypto.polymod));
        }
        if self.crypto.level < 2 {
            return Err(ConfigError::InvalidLevel(self.crypto.level));
        }
        if !self.crypto.scale.is_finite() || self.crypto.scale <= 1.0 {
            return Err(ConfigError::InvalidScale(self.crypto.scale));
        }
        if self.networking {
            return Err(ConfigError::NetworkingUnsupported);
        }
        Ok(())
    }

    pub fn offload_set(&self) -> HashSet<OpKind> {
        self.offload.iter().copied().collect()
    }

    pub fn is_encrypted(&self) -> bool {
        self.mode == Mode::Encrypted
    }
}

/// Load the configuration at `path` over the defaults.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
        .merge(Yaml::file(path.as_ref()))
        .extract()
        .context("Could not parse configuration")?;
    config.validate().context("Invalid configuration")?;
    tracing::debug!(path = %path.as_ref().display(), ?config, "loaded configuration");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn load_str(yaml: &str) -> Result<AppConfig> {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        load_config(file.path())
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.mode, Mode::Plaintext);
        assert_eq!(config.crypto.polymod, 8192);
        assert_eq!(config.crypto.level, 3);
        assert!(!config.evaluation);
        assert!(config.offload.is_empty());
        config.validate().unwrap();
    }

    #[test]
    fn test_load_encrypted_run() {
        let config = load_str(
            r#"
mode: encrypted
crypto:
  polymod: 16384
  level: 4
  scale: 1099511627776.0
offload: [Division, Squareroot]
evaluation: true
"#,
        )
        .unwrap();
        assert!(config.is_encrypted());
        assert_eq!(config.crypto.polymod, 16384);
        assert_eq!(config.crypto.level, 4);
        assert!(config.evaluation);
        assert!(config.offload_set().contains(&OpKind::Division));
        assert!(config.offload_set().contains(&OpKind::Squareroot));
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = load_str("mode: encrypted\n").unwrap();
        assert!(config.is_encrypted());
        assert_eq!(config.crypto.polymod, 8192);
        assert_eq!(config.crypto.scale, 2f64.powi(40));
    }

    #[test]
    fn test_invalid_polymod_rejected() {
        assert!(load_str("crypto:\n  polymod: 4096\n").is_err());
    }

    #[test]
    fn test_networking_rejected() {
        assert!(load_str("networking: true\n").is_err());
    }

    #[test]
    fn test_unknown_offload_op_rejected() {
        assert!(load_str("offload: [Teleportation]\n").is_err());
    }
}
