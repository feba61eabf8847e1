// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::error::CkksError;
use crate::zq::chain_primes;

/// Encryption parameters for one CKKS context.
///
/// `level` is the multiplicative budget: the number of ciphertext primes on
/// the modulus chain. A fresh ciphertext sits at chain position 0 with all
/// `level` primes active; every rescale moves it one position deeper and
/// drops one prime.
#[derive(Debug, Clone)]
pub struct CkksParams {
    /// Ring degree N (power of two). Slot count is N / 2.
    pub degree: usize,
    /// Number of ciphertext primes on the chain.
    pub level: usize,
    /// Canonical encoding scale, conventionally a power of two.
    pub scale: f64,
    /// Ciphertext primes, 60-bit base prime first, then 40-bit rescaling
    /// primes.
    pub moduli: Vec<u64>,
    /// 60-bit prime reserved for key switching.
    pub special: u64,
}

impl CkksParams {
    pub fn new(degree: usize, level: usize, scale: f64) -> Result<Self, CkksError> {
        if !degree.is_power_of_two() || degree < 8 {
            return Err(CkksError::InvalidDegree(degree));
        }
        if level < 2 {
            return Err(CkksError::InvalidLevel(level));
        }
        if !(scale > 1.0) || !scale.is_finite() {
            return Err(CkksError::InvalidScale(scale));
        }
        let (moduli, special) = chain_primes(degree, level)?;
        tracing::debug!(
            degree,
            level,
            ?moduli,
            special,
            "derived CKKS modulus chain"
        );
        Ok(Self {
            degree,
            level,
            scale,
            moduli,
            special,
        })
    }

    pub fn slots(&self) -> usize {
        self.degree / 2
    }

    /// Upper bound on the summed log2 scales of two operands before a
    /// product stops fitting the chain: one 40-bit budget unit per prime.
    pub fn scale_budget_bits(&self) -> u32 {
        self.level as u32 * 40
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_validation() {
        assert!(CkksParams::new(1000, 3, 2f64.powi(40)).is_err());
        assert!(CkksParams::new(1024, 1, 2f64.powi(40)).is_err());
        assert!(CkksParams::new(1024, 3, 1.0).is_err());
        let params = CkksParams::new(1024, 3, 2f64.powi(40)).unwrap();
        assert_eq!(params.moduli.len(), 3);
        assert_eq!(params.slots(), 512);
        assert_eq!(params.scale_budget_bits(), 120);
    }
}
