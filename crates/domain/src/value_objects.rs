//! Value objects shared by the order and inventory models.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize};

/// Money amount, always held at two decimal places.
///
/// Backed by a decimal rather than a float so that line totals, tax and order
/// totals add up exactly. Every constructor rounds half away from zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Money(#[serde(with = "rust_decimal::serde::float")] Decimal);

impl Money {
    /// Creates a money amount, rounding to cents.
    pub fn new(amount: Decimal) -> Self {
        Self(round_cents(amount))
    }

    /// Creates a money amount from a whole number of cents.
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Returns the underlying decimal amount.
    pub fn amount(&self) -> Decimal {
        self.0
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Multiplies by a quantity.
    pub fn multiply(&self, quantity: u32) -> Money {
        Money::new(self.0 * Decimal::from(quantity))
    }

    /// Applies a rate (e.g. a tax rate of `0.12`), rounding to cents.
    pub fn apply_rate(&self, rate: Decimal) -> Money {
        Money::new(self.0 * rate)
    }
}

fn round_cents(amount: Decimal) -> Decimal {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        rust_decimal::serde::float::deserialize(deserializer).map(Money::new)
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Money::new(amount)
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money(self.0 - rhs.0)
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn new_rounds_half_away_from_zero() {
        assert_eq!(Money::new(dec!(1.005)).amount(), dec!(1.01));
        assert_eq!(Money::new(dec!(1.004)).amount(), dec!(1.00));
        assert_eq!(Money::new(dec!(-1.005)).amount(), dec!(-1.01));
    }

    #[test]
    fn from_cents_matches_decimal() {
        assert_eq!(Money::from_cents(1250), Money::new(dec!(12.5)));
    }

    #[test]
    fn multiply_by_quantity() {
        assert_eq!(Money::new(dec!(4.99)).multiply(3), Money::new(dec!(14.97)));
    }

    #[test]
    fn apply_rate_rounds_to_cents() {
        // 12.34 * 0.12 = 1.4808
        assert_eq!(Money::new(dec!(12.34)).apply_rate(dec!(0.12)), Money::new(dec!(1.48)));
    }

    #[test]
    fn sum_of_amounts() {
        let total: Money = [Money::from_cents(100), Money::from_cents(250)]
            .into_iter()
            .sum();
        assert_eq!(total, Money::from_cents(350));
    }

    #[test]
    fn negative_detection() {
        assert!(Money::new(dec!(-0.01)).is_negative());
        assert!(!Money::zero().is_negative());
        assert!(!Money::new(dec!(-0.001)).is_negative());
    }

    #[test]
    fn display_keeps_two_places() {
        assert_eq!(Money::new(dec!(7)).to_string(), "7.00");
    }

    #[test]
    fn serializes_as_json_number() {
        let json = serde_json::to_string(&Money::new(dec!(9.5))).unwrap();
        assert_eq!(json, "9.5");
        let back: Money = serde_json::from_str("9.5").unwrap();
        assert_eq!(back, Money::new(dec!(9.50)));
        let rounded: Money = serde_json::from_str("4.999").unwrap();
        assert_eq!(rounded.amount(), dec!(5.00));
    }
}
