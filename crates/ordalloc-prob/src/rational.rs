use num::rational::BigRational;
use num::traits::{One, Signed, ToPrimitive, Zero};
use num::BigInt;
use std::mem;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RationalError {
    #[error("Rational too large for f64 conversion ({digits} digits)")]
    PrecisionOverflow { digits: usize },
    #[error("Cannot represent non-finite value {0} as a rational")]
    NonFinite(f64),
}

/// Exact rational `numer / denom`.
pub fn ratio(numer: u64, denom: u64) -> BigRational {
    BigRational::new(BigInt::from(numer), BigInt::from(denom))
}

/// Convert to the nearest `f64`.
pub fn to_f64(r: &BigRational) -> Result<f64, RationalError> {
    if r.is_zero() {
        return Ok(0.0);
    }
    match r.to_f64() {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(RationalError::PrecisionOverflow {
            digits: r.numer().to_string().len().max(r.denom().to_string().len()),
        }),
    }
}

/// The exact rational value of a finite `f64`.
pub fn from_f64(x: f64) -> Result<BigRational, RationalError> {
    BigRational::from_float(x).ok_or(RationalError::NonFinite(x))
}

/// The simplest rational within `max_error` of `x`.
///
/// Walks the continued-fraction convergents of the exact value of `x` and
/// returns the first one close enough, so `snap(1.0 / 3.0, 1e-12)` is
/// exactly one third. With `max_error == 0.0` the result equals `from_f64`.
pub fn snap(x: f64, max_error: f64) -> Result<BigRational, RationalError> {
    let exact = from_f64(x)?;
    let bound = from_f64(max_error.abs())?;
    let (mut h_prev, mut h) = (BigInt::zero(), BigInt::one());
    let (mut k_prev, mut k) = (BigInt::one(), BigInt::zero());
    let mut rest = exact.clone();
    loop {
        let a = rest.floor().to_integer();
        let h_next = &a * &h + &h_prev;
        let k_next = &a * &k + &k_prev;
        h_prev = mem::replace(&mut h, h_next);
        k_prev = mem::replace(&mut k, k_next);
        let approx = BigRational::new(h.clone(), k.clone());
        let frac = &rest - BigRational::from_integer(a);
        if frac.is_zero() || (&approx - &exact).abs() <= bound {
            return Ok(approx);
        }
        rest = frac.recip();
    }
}

/// Convert a rational matrix entrywise to `f64`.
pub fn rational_matrix_to_f64(matrix: &[Vec<BigRational>]) -> Result<Vec<Vec<f64>>, RationalError> {
    matrix
        .iter()
        .map(|row| row.iter().map(to_f64).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_simple_fractions() {
        assert_eq!(to_f64(&ratio(1, 2)).unwrap(), 0.5);
        assert!((to_f64(&ratio(1, 3)).unwrap() - 1.0 / 3.0).abs() < 1e-15);
        assert_eq!(to_f64(&BigRational::zero()).unwrap(), 0.0);
    }

    #[test]
    fn from_f64_is_exact_for_dyadic_values() {
        assert_eq!(from_f64(0.25).unwrap(), ratio(1, 4));
        assert!(from_f64(f64::NAN).is_err());
        assert!(from_f64(f64::INFINITY).is_err());
    }

    #[test]
    fn snap_recovers_small_denominators() {
        assert_eq!(snap(1.0 / 3.0, 1e-12).unwrap(), ratio(1, 3));
        assert_eq!(snap(2.0 / 3.0, 1e-12).unwrap(), ratio(2, 3));
        assert_eq!(snap(1.0 / 12.0, 1e-12).unwrap(), ratio(1, 12));
        assert_eq!(snap(0.25, 1e-12).unwrap(), ratio(1, 4));
        assert_eq!(snap(1.0, 1e-12).unwrap(), ratio(1, 1));
        assert_eq!(snap(0.0, 1e-12).unwrap(), BigRational::zero());
    }

    #[test]
    fn snap_stays_within_the_error() {
        let x = 0.3333335;
        let snapped = snap(x, 1e-12).unwrap();
        assert!((to_f64(&snapped).unwrap() - x).abs() <= 1e-12);
        assert_ne!(snapped, ratio(1, 3));
        assert_eq!(snap(1.0 / 3.0, 0.0).unwrap(), from_f64(1.0 / 3.0).unwrap());
        assert!(snap(f64::NAN, 1e-12).is_err());
    }

    #[test]
    fn huge_rationals_overflow() {
        let huge = BigRational::from_integer(BigInt::from(10).pow(400u32));
        assert!(matches!(
            to_f64(&huge),
            Err(RationalError::PrecisionOverflow { .. })
        ));
    }

    #[test]
    fn matrix_conversion_keeps_shape() {
        let m = vec![vec![ratio(1, 2), ratio(1, 2)], vec![ratio(1, 2), ratio(1, 2)]];
        assert_eq!(
            rational_matrix_to_f64(&m).unwrap(),
            vec![vec![0.5, 0.5], vec![0.5, 0.5]]
        );
    }
}
