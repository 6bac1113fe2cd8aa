//! # Money Module
//!
//! Tax and rounding rules for every amount that ends up in a DTE.
//!
//! ## Why Decimal?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In binary floating point:                                              │
//! │    1.005 × 100 = 100.49999999999999  → rounds to 1.00  ❌ WRONG!        │
//! │                                                                         │
//! │  The authority recomputes our totals. A one-cent drift between the     │
//! │  line items and the summary is a rejected document.                    │
//! │                                                                         │
//! │  OUR SOLUTION: rust_decimal                                            │
//! │    Exact base-10 arithmetic, explicit rounding at fixed scales:        │
//! │    • amounts     → 2 decimal places                                    │
//! │    • unit prices → 5 decimal places                                    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rounding Rule
//! Ties round half-up (away from zero): `0.125 → 0.13`, `0.135 → 0.14`.
//! Fiscal amounts in this jurisdiction are always positive, so away-from-zero
//! and half-up coincide.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

// =============================================================================
// Constants
// =============================================================================

/// IVA rate applied to every taxable line (13%).
pub const DEFAULT_IVA_RATE: Decimal = Decimal::from_parts(13, 0, 0, false, 2);

/// Decimal places for monetary amounts.
pub const DEFAULT_AMOUNT_SCALE: u32 = 2;

/// Decimal places for unit prices.
pub const DEFAULT_UNIT_PRICE_SCALE: u32 = 5;

/// Tolerance for comparing rounded totals (0.01).
pub const AMOUNT_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Rounds to `scale` places with ties going away from zero.
///
/// ## Example
/// ```rust
/// use dte_core::money::round_half_up;
/// use rust_decimal::Decimal;
///
/// let value = Decimal::new(125, 3); // 0.125
/// assert_eq!(round_half_up(value, 2), Decimal::new(13, 2));
/// ```
#[inline]
pub fn round_half_up(value: Decimal, scale: u32) -> Decimal {
    value.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero)
}

// =============================================================================
// Tax Policy
// =============================================================================

/// Named tax and rounding parameters.
///
/// Kept out of the composer so a rate change is a config edit, not a release.
///
/// ## Example Config
/// ```toml
/// [tax]
/// iva_rate = 0.13
/// amount_scale = 2
/// unit_price_scale = 5
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxPolicy {
    /// IVA rate as a fraction (0.13 = 13%).
    #[serde(default = "default_iva_rate")]
    pub iva_rate: Decimal,

    /// Decimal places for amounts.
    #[serde(default = "default_amount_scale")]
    pub amount_scale: u32,

    /// Decimal places for unit prices.
    #[serde(default = "default_unit_price_scale")]
    pub unit_price_scale: u32,
}

fn default_iva_rate() -> Decimal {
    DEFAULT_IVA_RATE
}

fn default_amount_scale() -> u32 {
    DEFAULT_AMOUNT_SCALE
}

fn default_unit_price_scale() -> u32 {
    DEFAULT_UNIT_PRICE_SCALE
}

impl Default for TaxPolicy {
    fn default() -> Self {
        TaxPolicy {
            iva_rate: DEFAULT_IVA_RATE,
            amount_scale: DEFAULT_AMOUNT_SCALE,
            unit_price_scale: DEFAULT_UNIT_PRICE_SCALE,
        }
    }
}

impl TaxPolicy {
    /// Rounds a monetary amount.
    #[inline]
    pub fn round_amount(&self, value: Decimal) -> Decimal {
        round_half_up(value, self.amount_scale)
    }

    /// Rounds a unit price.
    #[inline]
    pub fn round_unit_price(&self, value: Decimal) -> Decimal {
        round_half_up(value, self.unit_price_scale)
    }

    /// Unrounded IVA for a taxable amount. `None` on overflow.
    #[inline]
    pub fn tax_on(&self, taxable: Decimal) -> Option<Decimal> {
        taxable.checked_mul(self.iva_rate)
    }
}

// =============================================================================
// Line Amounts
// =============================================================================

/// Unrounded amounts for one line.
///
/// Rounding happens only when values are written into the document, and the
/// summary is built from the unrounded sums.
///
/// ## User Workflow
/// ```text
/// Line: 2 × $10.00
///      │
///      ▼
/// LineAmounts::compute ← THIS FUNCTION
///      │
///      ├── subtotal = 20.00
///      ├── tax      = 2.60   (13%)
///      └── total    = 22.60
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineAmounts {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

impl LineAmounts {
    /// Computes subtotal, tax and total for `quantity × unit_price`.
    ///
    /// Returns `None` when any amount falls outside `Decimal`'s range.
    pub fn compute(quantity: Decimal, unit_price: Decimal, policy: &TaxPolicy) -> Option<Self> {
        let subtotal = quantity.checked_mul(unit_price)?;
        let tax = policy.tax_on(subtotal)?;
        Some(LineAmounts {
            subtotal,
            tax,
            total: subtotal.checked_add(tax)?,
        })
    }
}

/// Running totals over every line of a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    /// Sum of line subtotals.
    pub gravado: Decimal,
    /// Sum of line taxes.
    pub iva: Decimal,
    /// Sum of line totals.
    pub venta: Decimal,
}

impl Totals {
    /// Adds one line to the running totals.
    ///
    /// On overflow returns `None` and leaves the totals untouched.
    pub fn accumulate(&mut self, line: &LineAmounts) -> Option<()> {
        let next = Totals {
            gravado: self.gravado.checked_add(line.subtotal)?,
            iva: self.iva.checked_add(line.tax)?,
            venta: self.venta.checked_add(line.total)?,
        };
        *self = next;
        Some(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_round_half_up_ties() {
        assert_eq!(round_half_up(dec!(0.125), 2), dec!(0.13));
        assert_eq!(round_half_up(dec!(0.135), 2), dec!(0.14));
        assert_eq!(round_half_up(dec!(2.675), 2), dec!(2.68));
        assert_eq!(round_half_up(dec!(0.124999), 2), dec!(0.12));
    }

    #[test]
    fn test_unit_price_scale() {
        let policy = TaxPolicy::default();
        assert_eq!(policy.round_unit_price(dec!(1.234565)), dec!(1.23457));
        assert_eq!(policy.round_unit_price(dec!(10)), dec!(10));
    }

    #[test]
    fn test_line_amounts() {
        let policy = TaxPolicy::default();
        let line = LineAmounts::compute(dec!(2), dec!(10.00), &policy).unwrap();
        assert_eq!(line.subtotal, dec!(20.00));
        assert_eq!(line.tax, dec!(2.6000));
        assert_eq!(line.total, dec!(22.6000));
    }

    #[test]
    fn test_totals_accumulate() {
        let policy = TaxPolicy::default();
        let mut totals = Totals::default();
        for (qty, price) in [(dec!(2), dec!(10.00)), (dec!(1), dec!(5.00))] {
            let line = LineAmounts::compute(qty, price, &policy).unwrap();
            totals.accumulate(&line).unwrap();
        }

        assert_eq!(policy.round_amount(totals.gravado), dec!(25.00));
        assert_eq!(policy.round_amount(totals.iva), dec!(3.25));
        assert_eq!(policy.round_amount(totals.venta), dec!(28.25));
    }

    #[test]
    fn test_custom_rate() {
        let policy = TaxPolicy {
            iva_rate: dec!(0.15),
            ..TaxPolicy::default()
        };
        let line = LineAmounts::compute(dec!(1), dec!(100), &policy).unwrap();
        assert_eq!(policy.round_amount(line.tax), dec!(15.00));
    }

    #[test]
    fn test_overflow_is_reported_not_panicked() {
        let policy = TaxPolicy::default();
        assert!(LineAmounts::compute(Decimal::MAX, dec!(2), &policy).is_none());
        // subtotal fits, subtotal + tax does not
        assert!(LineAmounts::compute(Decimal::MAX, Decimal::ONE, &policy).is_none());

        let big = LineAmounts {
            subtotal: Decimal::MAX,
            tax: Decimal::ZERO,
            total: Decimal::MAX,
        };
        let mut totals = Totals::default();
        assert!(totals.accumulate(&big).is_some());
        assert!(totals.accumulate(&big).is_none());
        assert_eq!(totals.gravado, Decimal::MAX);
    }

    #[test]
    fn test_policy_defaults_when_fields_missing() {
        let policy: TaxPolicy = serde_json::from_str("{}").unwrap();
        assert_eq!(policy, TaxPolicy::default());
        assert_eq!(policy.iva_rate, dec!(0.13));
    }
}
