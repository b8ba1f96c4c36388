//! # Money Module
//!
//! Provides the `Money` type for unit costs, sale prices and valuations.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  Inventory valuation sums thousands of qty × cost products. Every      │
//! │  lot cost is stored in integer cents, so Σ(remaining × unit_cost)      │
//! │  and the ledger's Σ(subtotal) agree to the cent, always.               │
//! │                                                                         │
//! │  The only division in the engine (weighted average) is done in         │
//! │  rust_decimal and rounded back to cents with Bankers Rounding.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use lotkeeper_core::money::Money;
//!
//! let unit_cost = Money::from_cents(1099); // $10.99
//! let subtotal = unit_cost.multiply_quantity(3);
//! assert_eq!(subtotal.cents(), 3297);
//! ```

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// Signed so that ledger reconstruction can carry outbound (negative)
/// subtotals through the same arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ## Example
    /// ```rust
    /// use lotkeeper_core::money::Money;
    ///
    /// let price = Money::from_cents(1099);
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit (dollars) portion.
    #[inline]
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is negative.
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use lotkeeper_core::money::Money;
    ///
    /// // 5 units taken from a lot landed at $1.00
    /// let cogs = Money::from_cents(100).multiply_quantity(5);
    /// assert_eq!(cogs.cents(), 500);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Returns the value as an exact decimal number of cents.
    #[inline]
    pub fn to_decimal_cents(&self) -> Decimal {
        Decimal::from(self.0)
    }

    /// Rounds a decimal amount of cents to whole cents.
    ///
    /// Uses Bankers Rounding (round half to even) so averaging many lots
    /// does not drift systematically up or down.
    ///
    /// ## Example
    /// ```rust
    /// use lotkeeper_core::money::Money;
    /// use rust_decimal::Decimal;
    ///
    /// assert_eq!(Money::from_decimal_cents(Decimal::new(1105, 1)).cents(), 110); // 110.5 → 110
    /// assert_eq!(Money::from_decimal_cents(Decimal::new(1115, 1)).cents(), 112); // 111.5 → 112
    /// ```
    pub fn from_decimal_cents(cents: Decimal) -> Self {
        let rounded = cents.round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven);
        // Decimal → i64 only fails beyond ±9.2e18 cents, far past any inventory value
        Money(i64::try_from(rounded).unwrap_or(if rounded.is_sign_negative() {
            i64::MIN
        } else {
            i64::MAX
        }))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display implementation for logs and diagnostics.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}${}.{:02}",
            sign,
            self.dollars().abs(),
            self.cents_part()
        )
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
