// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! Cleartext vector values.

use crate::error::EvalError;
use std::cmp::Ordering;

/// An immutable real vector; scalars are length 1. Every operation
/// returns a fresh value and leaves its operands untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct VecValue {
    data: Vec<f64>,
}

impl VecValue {
    pub fn new(data: Vec<f64>) -> Self {
        Self { data }
    }

    pub fn scalar(value: f64) -> Self {
        Self { data: vec![value] }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.data
    }

    pub fn into_values(self) -> Vec<f64> {
        self.data
    }

    /// Elementwise combination. A length-1 operand broadcasts against a
    /// vector; any other length mismatch is a dimension error.
    fn zip_with(
        &self,
        other: &VecValue,
        f: impl Fn(f64, f64) -> f64,
    ) -> Result<VecValue, EvalError> {
        let (a, b) = (&self.data, &other.data);
        let out = if a.len() == b.len() {
            a.iter().zip(b).map(|(&x, &y)| f(x, y)).collect()
        } else if a.len() == 1 {
            b.iter().map(|&y| f(a[0], y)).collect()
        } else if b.len() == 1 {
            a.iter().map(|&x| f(x, b[0])).collect()
        } else {
            return Err(EvalError::Dimension(a.len(), b.len()));
        };
        Ok(VecValue::new(out))
    }

    pub fn add(&self, other: &VecValue) -> Result<VecValue, EvalError> {
        self.zip_with(other, |x, y| x + y)
    }

    pub fn sub(&self, other: &VecValue) -> Result<VecValue, EvalError> {
        self.zip_with(other, |x, y| x - y)
    }

    pub fn mul(&self, other: &VecValue) -> Result<VecValue, EvalError> {
        self.zip_with(other, |x, y| x * y)
    }

    pub fn div(&self, other: &VecValue) -> Result<VecValue, EvalError> {
        self.zip_with(other, |x, y| x / y)
    }

    pub fn pow(&self, other: &VecValue) -> Result<VecValue, EvalError> {
        self.zip_with(other, pow_element)
    }

    pub fn neg(&self) -> VecValue {
        VecValue::new(self.data.iter().map(|x| -x).collect())
    }

    pub fn abs(&self) -> VecValue {
        VecValue::new(self.data.iter().map(|x| x.abs()).collect())
    }

    /// Square root of the absolute value. Rounding drift can push formula
    /// results that are non-negative on paper slightly below zero; taking
    /// the absolute value first keeps the result finite.
    pub fn sqrt(&self) -> VecValue {
        VecValue::new(self.data.iter().map(|x| x.abs().sqrt()).collect())
    }

    pub fn add_over_n(&self) -> VecValue {
        VecValue::scalar(self.data.iter().sum())
    }

    pub fn min_over_n(&self) -> VecValue {
        VecValue::scalar(self.data.iter().copied().fold(f64::INFINITY, f64::min))
    }

    pub fn max_over_n(&self) -> VecValue {
        VecValue::scalar(self.data.iter().copied().fold(f64::NEG_INFINITY, f64::max))
    }

    /// Lexicographic comparison across slots; ties on every slot compare
    /// equal. Vectors of different dimension cannot be ordered.
    pub fn cmp_lex(&self, other: &VecValue) -> Result<Ordering, EvalError> {
        if self.len() != other.len() {
            return Err(EvalError::Dimension(self.len(), other.len()));
        }
        for (a, b) in self.data.iter().zip(&other.data) {
            if a < b {
                return Ok(Ordering::Less);
            }
            if a > b {
                return Ok(Ordering::Greater);
            }
        }
        Ok(Ordering::Equal)
    }
}

/// Negative bases with fractional exponents have no real power; fall back
/// to the truncated integer exponent as the formula catalogs intend.
fn pow_element(base: f64, exponent: f64) -> f64 {
    if base < 0.0 && exponent.fract() != 0.0 {
        base.powi(exponent.trunc() as i32)
    } else {
        base.powf(exponent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elementwise_arithmetic() {
        let a = VecValue::new(vec![1.0, 2.0, 3.0]);
        let b = VecValue::new(vec![4.0, 5.0, 6.0]);
        assert_eq!(a.add(&b).unwrap().values(), &[5.0, 7.0, 9.0]);
        assert_eq!(b.sub(&a).unwrap().values(), &[3.0, 3.0, 3.0]);
        assert_eq!(a.mul(&b).unwrap().values(), &[4.0, 10.0, 18.0]);
        assert_eq!(b.div(&a).unwrap().values(), &[4.0, 2.5, 2.0]);
    }

    #[test]
    fn test_scalar_broadcast() {
        let v = VecValue::new(vec![2.0, 4.0]);
        let c = VecValue::scalar(1.0);
        assert_eq!(v.add(&c).unwrap().values(), &[3.0, 5.0]);
        assert_eq!(c.sub(&v).unwrap().values(), &[-1.0, -3.0]);
    }

    #[test]
    fn test_dimension_mismatch_fails() {
        let a = VecValue::new(vec![1.0, 2.0]);
        let b = VecValue::new(vec![1.0, 2.0, 3.0]);
        assert!(matches!(a.add(&b), Err(EvalError::Dimension(2, 3))));
    }

    #[test]
    fn test_reductions() {
        let v = VecValue::new(vec![3.0, -1.0, 2.5]);
        assert_eq!(v.add_over_n().values(), &[4.5]);
        assert_eq!(v.min_over_n().values(), &[-1.0]);
        assert_eq!(v.max_over_n().values(), &[3.0]);
        assert_eq!(v.add_over_n().len(), 1);
    }

    #[test]
    fn test_sqrt_takes_absolute_first() {
        let v = VecValue::new(vec![-4.0, 9.0]);
        assert_eq!(v.sqrt().values(), &[2.0, 3.0]);
    }

    #[test]
    fn test_pow_negative_base_fractional_exponent() {
        let base = VecValue::new(vec![-2.0]);
        let exp = VecValue::scalar(2.5);
        // Falls back to the integer part of the exponent.
        assert_eq!(base.pow(&exp).unwrap().values(), &[4.0]);
    }

    #[test]
    fn test_lexicographic_order() {
        let a = VecValue::new(vec![1.0, 9.0]);
        let b = VecValue::new(vec![1.0, 2.0]);
        assert_eq!(a.cmp_lex(&b).unwrap(), Ordering::Greater);
        assert_eq!(b.cmp_lex(&a).unwrap(), Ordering::Less);
        assert_eq!(a.cmp_lex(&a).unwrap(), Ordering::Equal);
        let short = VecValue::scalar(1.0);
        assert!(a.cmp_lex(&short).is_err());
    }
}
