//! Server-side order totals.

use rust_decimal::Decimal;

use super::OrderError;
use crate::Money;

/// Subtotal, tax and total of an order, computed from frozen unit prices.
///
/// `tax = round2(subtotal × tax_rate)` and `total_amount = subtotal + tax`,
/// so the totals invariant holds by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub tax: Money,
    pub total_amount: Money,
}

impl OrderTotals {
    /// Computes totals from `(unit_price, quantity)` lines.
    pub fn compute(lines: impl IntoIterator<Item = (Money, u32)>, tax_rate: Decimal) -> Self {
        let subtotal: Money = lines
            .into_iter()
            .map(|(price, quantity)| price.multiply(quantity))
            .sum();
        let tax = subtotal.apply_rate(tax_rate);
        Self {
            subtotal,
            tax,
            total_amount: subtotal + tax,
        }
    }

    /// Compares client-supplied totals with these, field by field.
    pub fn verify(
        &self,
        subtotal: Money,
        tax: Money,
        total_amount: Money,
    ) -> Result<(), OrderError> {
        let fields = [
            ("subtotal", self.subtotal, subtotal),
            ("tax", self.tax, tax),
            ("totalAmount", self.total_amount, total_amount),
        ];
        for (field, expected, supplied) in fields {
            if expected != supplied {
                return Err(OrderError::TotalsMismatch {
                    field,
                    expected,
                    supplied,
                });
            }
        }
        Ok(())
    }
}
