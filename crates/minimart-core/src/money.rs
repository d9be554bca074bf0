//! # Money Module
//!
//! `Money` and `DiscountRate`: the only two numeric types that touch prices.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌                                  │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    Every line is rounded to the cent once, then summed exactly.        │
//! │    A persisted sale total therefore always equals the cart total.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rounding
//! All divisions go through [`round_div`], which rounds half away from zero
//! (150.005 → 150.01, -0.005 → -0.01).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

/// Basis points in 100%.
pub const BPS_SCALE: i64 = 10_000;

/// Divides `numerator` by a positive `denominator`, rounding half away from zero.
///
/// ## Example
/// ```rust
/// use minimart_core::money::round_div;
///
/// assert_eq!(round_div(25, 10), 3);
/// assert_eq!(round_div(-25, 10), -3);
/// assert_eq!(round_div(24, 10), 2);
/// ```
pub fn round_div(numerator: i128, denominator: i128) -> i128 {
    let half = denominator / 2;
    if numerator >= 0 {
        (numerator + half) / denominator
    } else {
        (numerator - half) / denominator
    }
}

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
///
/// Signed so that refunds, credit payments and ledger reversals can be
/// expressed directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ## Example
    /// ```rust
    /// use minimart_core::money::Money;
    ///
    /// let price = Money::from_cents(15000); // 150.00
    /// assert_eq!(price.cents(), 15000);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// For negative amounts only the major unit carries the sign:
    /// `from_major_minor(-5, 50)` is -5.50.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Clamps negative values to zero.
    ///
    /// Used for change due: `max(0, paid - total)`.
    #[inline]
    pub const fn non_negative(&self) -> Self {
        if self.0 < 0 {
            Money(0)
        } else {
            *self
        }
    }

    /// Returns `rate` of this amount, rounded to the cent.
    ///
    /// ## Example
    /// ```rust
    /// use minimart_core::money::{DiscountRate, Money};
    ///
    /// let subtotal = Money::from_cents(1000);
    /// let part = subtotal.percentage(DiscountRate::from_bps(825)); // 8.25%
    /// // 10.00 × 8.25% = 0.825 → 0.83
    /// assert_eq!(part.cents(), 83);
    /// ```
    pub fn percentage(&self, rate: DiscountRate) -> Money {
        let cents = round_div(self.0 as i128 * rate.bps() as i128, BPS_SCALE as i128);
        Money(cents as i64)
    }

    /// Multiplies a unit amount by a quantity.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Line amount for `qty` units of `self` after a per-unit discount.
    ///
    /// The discounted unit price is never rounded on its own; rounding happens
    /// once on the line, so `qty` units never drift from `qty × price`.
    ///
    /// ## Example
    /// ```rust
    /// use minimart_core::money::{DiscountRate, Money};
    ///
    /// // 3 × 9.99 at 15% off = 25.4745 → 25.47
    /// let line = Money::from_cents(999).discounted_line(DiscountRate::from_percent(15), 3);
    /// assert_eq!(line.cents(), 2547);
    /// ```
    pub fn discounted_line(&self, discount: DiscountRate, qty: i64) -> Money {
        let kept = BPS_SCALE - discount.bps() as i64;
        let cents = round_div(
            self.0 as i128 * kept as i128 * qty as i128,
            BPS_SCALE as i128,
        );
        Money(cents as i64)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Plain decimal rendering ("270.00"); currency symbols are a display concern.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
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

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
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
        iter.fold(Money::zero(), Add::add)
    }
}

// =============================================================================
// Discount Rate
// =============================================================================

/// A percentage expressed in basis points (1 bps = 0.01%).
///
/// Valid rates are 0..=10000. Construction does not clamp; callers that take
/// user input go through [`crate::validation::validate_discount_bps`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct DiscountRate(u32);

impl DiscountRate {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        DiscountRate(bps)
    }

    /// Whole-percent convenience: `from_percent(10)` is 10%.
    #[inline]
    pub const fn from_percent(pct: u32) -> Self {
        DiscountRate(pct * 100)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        DiscountRate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for DiscountRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
