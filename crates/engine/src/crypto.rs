// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! Key material factory: one CKKS context and key bundle per principal.

use crate::error::EngineError;
use crate::metrics::EvalMetrics;
use pib_ckks::{CkksContext, CkksParams, KeyBundle, SharedRng};
use pib_config::CryptoConfig;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Aggregation sums stay small, so the statistics server encodes at a
/// coarser scale than the participants.
pub const STATISTICS_SCALE: f64 = 1048576.0; // 2^20

pub fn participant_context(crypto: &CryptoConfig) -> Result<Arc<CkksContext>, EngineError> {
    let params = CkksParams::new(crypto.polymod, crypto.level, crypto.scale)?;
    Ok(CkksContext::new(params)?)
}

pub fn statistics_context(crypto: &CryptoConfig) -> Result<Arc<CkksContext>, EngineError> {
    let params = CkksParams::new(crypto.polymod, crypto.level, STATISTICS_SCALE)?;
    Ok(CkksContext::new(params)?)
}

/// Generate a full key bundle, feeding keygen duration and key-material
/// size into the metrics sink.
pub fn generate_bundle(
    ctx: Arc<CkksContext>,
    rng: SharedRng,
    metrics: &EvalMetrics,
) -> KeyBundle {
    let start = Instant::now();
    let level = ctx.params.level;
    let bundle = KeyBundle::generate(ctx, rng);
    metrics.record_keygen(start.elapsed(), bundle.key_material_size);
    metrics.set_levels(level);
    info!(
        level,
        key_material_size = bundle.key_material_size,
        elapsed = ?start.elapsed(),
        "generated CKKS key bundle"
    );
    bundle
}
