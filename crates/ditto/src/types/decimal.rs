//! Fixed-point decimal payload for the immutable seed set.
//!
//! Represented as coefficient × 10^exponent with an arbitrary-precision
//! coefficient. Instances are immutable once allocated; the engine only
//! ever aliases them, so the type needs construction, equality, and
//! display, not arithmetic.

use std::fmt;

use num_bigint::BigInt;
use num_traits::{Signed, Zero};

/// Immutable fixed-point decimal: `coefficient * 10^exponent`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Decimal {
    coefficient: BigInt,
    exponent: i32,
}

impl Decimal {
    /// Creates a decimal from a coefficient and a power-of-ten exponent.
    pub fn new(coefficient: impl Into<BigInt>, exponent: i32) -> Self {
        Self {
            coefficient: coefficient.into(),
            exponent,
        }
    }

    /// The coefficient.
    #[must_use]
    pub fn coefficient(&self) -> &BigInt {
        &self.coefficient
    }

    /// The power-of-ten exponent.
    #[must_use]
    pub fn exponent(&self) -> i32 {
        self.exponent
    }

    /// Canonical form with trailing zeros folded into the exponent.
    ///
    /// `1200 * 10^-2` and `12 * 10^0` display differently but normalize to
    /// the same value, which is what structural comparison of two
    /// independently constructed graphs usually wants.
    #[must_use]
    pub fn normalized(&self) -> Self {
        if self.coefficient.is_zero() {
            return Self::new(0, 0);
        }
        let mut coefficient = self.coefficient.clone();
        let mut exponent = self.exponent;
        let ten = BigInt::from(10);
        while (&coefficient % &ten).is_zero() {
            coefficient /= &ten;
            exponent += 1;
        }
        Self { coefficient, exponent }
    }
}

impl From<i64> for Decimal {
    fn from(value: i64) -> Self {
        Self::new(value, 0)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.exponent >= 0 {
            let zeros = "0".repeat(self.exponent.unsigned_abs() as usize);
            return write!(f, "{coefficient}{zeros}", coefficient = self.coefficient);
        }
        let digits = self.coefficient.abs().to_string();
        let sign = if self.coefficient.is_negative() { "-" } else { "" };
        let scale = self.exponent.unsigned_abs() as usize;
        if digits.len() > scale {
            let split = digits.len() - scale;
            write!(f, "{sign}{int}.{frac}", int = &digits[..split], frac = &digits[split..])
        } else {
            let pad = "0".repeat(scale - digits.len());
            write!(f, "{sign}0.{pad}{digits}")
        }
    }
}
