//! Fixed-point cycle and coin arithmetic.
//!
//! Cycles and coin are both `Share` (i64). Frequency is a fixed-point value
//! with one decimal place. One cycle at frequency F is worth `1 / F` coin:
//!
//! ```text
//! coin   = cycles * DASCOIN_DEFAULT_ASSET_PRECISION * FREQUENCY_PRECISION / frequency
//! cycles = coin * frequency / (DASCOIN_DEFAULT_ASSET_PRECISION * FREQUENCY_PRECISION)
//! ```
//!
//! The cycle -> coin direction never rounds: an inexact division would mint
//! or destroy a fraction of a share, so it is reported as an error instead.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{CONVERSION_SCALE, FREQUENCY_PRECISION};
use crate::error::CyclexError;
use crate::types::Share;

// ── Frequency ────────────────────────────────────────────────────────────────

/// Network frequency scaled by `FREQUENCY_PRECISION`. Zero means "no lock"
/// when stored on a license.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Debug)]
pub struct Frequency(pub Share);

impl Frequency {
    pub const NONE: Frequency = Frequency(0);

    pub fn new(raw: Share) -> Self {
        Self(raw)
    }

    pub fn value(&self) -> Share {
        self.0
    }

    /// True if this value can be used as a conversion divisor.
    pub fn is_set(&self) -> bool {
        self.0 > 0
    }

    /// `self` if set, otherwise `fallback`.
    pub fn or(self, fallback: Frequency) -> Frequency {
        if self.is_set() {
            self
        } else {
            fallback
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}",
            self.0 / FREQUENCY_PRECISION,
            (self.0 % FREQUENCY_PRECISION).abs()
        )
    }
}

// ── Conversions ──────────────────────────────────────────────────────────────

fn overflow(op: &str) -> CyclexError {
    CyclexError::ArithmeticError(format!("overflow in {op}"))
}

fn check_inputs(amount: Share, frequency: Frequency, op: &str) -> Result<(), CyclexError> {
    if !frequency.is_set() {
        return Err(CyclexError::ArithmeticError(format!(
            "{op}: frequency must be positive, got {}",
            frequency.0
        )));
    }
    if amount < 0 {
        return Err(CyclexError::ArithmeticError(format!(
            "{op}: negative amount {amount}"
        )));
    }
    Ok(())
}

/// Convert cycles to coin shares at `frequency`. Fails unless the result is
/// an exact number of shares.
pub fn cycles_to_dascoin(cycles: Share, frequency: Frequency) -> Result<Share, CyclexError> {
    check_inputs(cycles, frequency, "cycles_to_dascoin")?;
    let scaled = cycles
        .checked_mul(CONVERSION_SCALE)
        .ok_or_else(|| overflow("cycles_to_dascoin"))?;
    if scaled % frequency.0 != 0 {
        return Err(CyclexError::ArithmeticError(format!(
            "{cycles} cycles do not convert exactly at frequency {frequency}"
        )));
    }
    Ok(scaled / frequency.0)
}

/// Convert coin shares to cycles at `frequency`, rounding down.
pub fn dascoin_to_cycles(amount: Share, frequency: Frequency) -> Result<Share, CyclexError> {
    check_inputs(amount, frequency, "dascoin_to_cycles")?;
    let scaled = amount
        .checked_mul(frequency.0)
        .ok_or_else(|| overflow("dascoin_to_cycles"))?;
    Ok(scaled / CONVERSION_SCALE)
}

/// True if `cycles` converts to a whole number of shares at `frequency`.
pub fn converts_exactly(cycles: Share, frequency: Frequency) -> bool {
    cycles_to_dascoin(cycles, frequency).is_ok()
}

/// Smallest cycle increment that converts exactly at `frequency`.
pub fn cycle_step(frequency: Frequency) -> Share {
    frequency.0 / gcd(CONVERSION_SCALE, frequency.0)
}

/// Largest `c <= cap` whose coin value is exact and does not exceed `budget`.
pub fn max_exact_cycles(budget: Share, frequency: Frequency, cap: Share) -> Result<Share, CyclexError> {
    let upper = dascoin_to_cycles(budget, frequency)?.min(cap).max(0);
    let step = cycle_step(frequency);
    Ok(upper - upper % step)
}

/// `base + base * percentage / 100`, checked.
pub fn apply_bonus(base: Share, percentage: Share) -> Result<Share, CyclexError> {
    let bonus = base
        .checked_mul(percentage)
        .ok_or_else(|| overflow("apply_bonus"))?
        / 100;
    base.checked_add(bonus).ok_or_else(|| overflow("apply_bonus"))
}

/// Checked addition reported as an arithmetic error.
pub fn add_shares(a: Share, b: Share) -> Result<Share, CyclexError> {
    a.checked_add(b).ok_or_else(|| overflow("add"))
}

/// Checked subtraction reported as an arithmetic error.
pub fn sub_shares(a: Share, b: Share) -> Result<Share, CyclexError> {
    a.checked_sub(b).ok_or_else(|| overflow("sub"))
}

fn gcd(mut a: Share, mut b: Share) -> Share {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a.abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convert_dascoin_cycles() {
        // 10000 cycles at 30.0 is 333.333333... coin: not representable.
        assert!(matches!(
            cycles_to_dascoin(10_000, Frequency(300)),
            Err(CyclexError::ArithmeticError(_))
        ));
        assert_eq!(dascoin_to_cycles(33_333_333, Frequency(300)).unwrap(), 9_999);
        assert_eq!(cycles_to_dascoin(200, Frequency(200)).unwrap(), 1_000_000);
    }

    #[test]
    fn exact_conversions_invert() {
        for (c, f) in [(200, 200), (600, 200), (9, 300), (1_100, 20), (12_100, 200), (7, 1)] {
            let coin = cycles_to_dascoin(c, Frequency(f)).unwrap();
            assert_eq!(dascoin_to_cycles(coin, Frequency(f)).unwrap(), c, "c={c} f={f}");
        }
    }

    #[test]
    fn overflow_is_an_error() {
        assert!(cycles_to_dascoin(i64::MAX / 2, Frequency(200)).is_err());
        assert!(dascoin_to_cycles(i64::MAX, Frequency(200)).is_err());
        assert!(apply_bonus(i64::MAX, 50).is_err());
    }

    #[test]
    fn zero_frequency_rejected() {
        assert!(cycles_to_dascoin(100, Frequency::NONE).is_err());
        assert!(dascoin_to_cycles(100, Frequency(-5)).is_err());
    }

    #[test]
    fn max_exact_cycles_respects_budget_and_step() {
        assert_eq!(max_exact_cycles(1_000_000, Frequency(200), 600).unwrap(), 200);
        assert_eq!(max_exact_cycles(10_000_000, Frequency(200), 600).unwrap(), 600);
        // Step at 30.0 is 3 cycles.
        assert_eq!(cycle_step(Frequency(300)), 3);
        let c = max_exact_cycles(999_999, Frequency(300), 1_000).unwrap();
        assert_eq!(c, 297);
        assert!(cycles_to_dascoin(c, Frequency(300)).unwrap() <= 999_999);
        assert_eq!(max_exact_cycles(0, Frequency(300), 1_000).unwrap(), 0);
    }

    #[test]
    fn bonus_is_exact_half() {
        assert_eq!(apply_bonus(1_100, 50).unwrap(), 1_650);
        assert_eq!(apply_bonus(11_000, 10).unwrap(), 12_100);
        assert_eq!(apply_bonus(500, 0).unwrap(), 500);
    }

    #[test]
    fn frequency_display() {
        assert_eq!(Frequency(200).to_string(), "20.0");
        assert_eq!(Frequency(25).to_string(), "2.5");
    }
}
