// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! # Run Configuration
//!
//! YAML configuration for a benchmarking run, layered over defaults with
//! figment. Recognized options: evaluation mode, CKKS crypto parameters,
//! the forced-offload operation list and the evaluation/networking flags.

mod app_config;

pub use app_config::{load_config, AppConfig, ConfigError, CryptoConfig, Mode};
