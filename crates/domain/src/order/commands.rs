//! Order commands.

use common::{CustomerId, ProductId, StaffId};
use serde::{Deserialize, Serialize};

use super::OrderError;
use crate::Money;

/// How the order is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderType {
    DineIn,
    TakeOut,
    Delivery,
}

impl OrderType {
    /// Returns the wire name of the order type.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::DineIn => "dine-in",
            OrderType::TakeOut => "take-out",
            OrderType::Delivery => "delivery",
        }
    }
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderType {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dine-in" => Ok(OrderType::DineIn),
            "take-out" => Ok(OrderType::TakeOut),
            "delivery" => Ok(OrderType::Delivery),
            other => Err(OrderError::InvalidOrderType(other.to_string())),
        }
    }
}

/// One requested line of a [`PlaceOrder`] command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceOrderItem {
    pub product_id: ProductId,
    pub quantity: u32,

    /// Unit price as shown to the cashier. Must match the catalog price.
    pub unit_price: Money,

    pub notes: Option<String>,
}

impl PlaceOrderItem {
    /// Creates a line item without notes.
    pub fn new(product_id: ProductId, quantity: u32, unit_price: Money) -> Self {
        Self {
            product_id,
            quantity,
            unit_price,
            notes: None,
        }
    }

    /// Attaches kitchen notes to the line.
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Command to place an order and deduct its ingredients from stock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceOrder {
    pub order_type: OrderType,

    /// Staff member placing the order; recorded on the order and on every
    /// ledger entry it produces.
    pub staff_id: StaffId,

    pub customer_id: Option<CustomerId>,
    pub payment_method: String,
    pub items: Vec<PlaceOrderItem>,

    /// Totals as computed by the client. Checked against the server-side
    /// computation before anything is written.
    pub subtotal: Money,
    pub tax: Money,
    pub total_amount: Money,
}

impl PlaceOrder {
    /// Checks the request shape. Runs before any transaction is opened.
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.items.is_empty() {
            return Err(OrderError::NoItems);
        }

        if self.payment_method.trim().is_empty() {
            return Err(OrderError::MissingPaymentMethod);
        }

        for item in &self.items {
            if item.quantity == 0 {
                return Err(OrderError::InvalidQuantity {
                    product_id: item.product_id,
                    quantity: 0,
                });
            }
            if item.unit_price.is_negative() {
                return Err(OrderError::InvalidPrice {
                    product_id: item.product_id,
                    price: item.unit_price,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command() -> PlaceOrder {
        PlaceOrder {
            order_type: OrderType::TakeOut,
            staff_id: StaffId::new(1),
            customer_id: None,
            payment_method: "cash".to_string(),
            items: vec![PlaceOrderItem::new(ProductId::new(1), 2, Money::from_cents(500))],
            subtotal: Money::from_cents(1000),
            tax: Money::from_cents(120),
            total_amount: Money::from_cents(1120),
        }
    }

    #[test]
    fn valid_command_passes() {
        assert!(command().validate().is_ok());
    }

    #[test]
    fn rejects_empty_items() {
        let mut cmd = command();
        cmd.items.clear();
        assert!(matches!(cmd.validate(), Err(OrderError::NoItems)));
    }

    #[test]
    fn rejects_zero_quantity() {
        let mut cmd = command();
        cmd.items[0].quantity = 0;
        assert!(matches!(
            cmd.validate(),
            Err(OrderError::InvalidQuantity { quantity: 0, .. })
        ));
    }

    #[test]
    fn rejects_negative_price() {
        let mut cmd = command();
        cmd.items[0].unit_price = Money::from_cents(-1);
        assert!(matches!(
            cmd.validate(),
            Err(OrderError::InvalidPrice { .. })
        ));
    }

    #[test]
    fn rejects_blank_payment_method() {
        let mut cmd = command();
        cmd.payment_method = "  ".to_string();
        assert!(matches!(
            cmd.validate(),
            Err(OrderError::MissingPaymentMethod)
        ));
    }

    #[test]
    fn order_type_wire_names() {
        assert_eq!("dine-in".parse::<OrderType>().unwrap(), OrderType::DineIn);
        assert_eq!("take-out".parse::<OrderType>().unwrap(), OrderType::TakeOut);
        assert_eq!("delivery".parse::<OrderType>().unwrap(), OrderType::Delivery);
        assert!("drive-thru".parse::<OrderType>().is_err());
        assert_eq!(
            serde_json::to_string(&OrderType::TakeOut).unwrap(),
            "\"take-out\""
        );
    }
}
