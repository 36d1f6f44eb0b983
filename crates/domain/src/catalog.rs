//! Menu products, ingredients and the recipes that link them.

use common::{IngredientId, ProductId, SupplierId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::Money;

/// A sellable menu product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,

    /// Current catalog price. Copied onto order items at placement.
    pub price: Money,

    /// Whether the product can be ordered right now.
    pub available: bool,
}

/// Fields for registering a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub price: Money,
    pub available: bool,
}

impl NewProduct {
    pub fn new(name: impl Into<String>, price: Money) -> Self {
        Self {
            name: name.into(),
            price,
            available: true,
        }
    }
}

/// A stock-tracked ingredient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: IngredientId,
    pub name: String,

    /// Unit of measure, e.g. `kg`, `pcs`, `liters`.
    pub unit: String,

    /// Current stock. Never negative.
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,

    /// Reorder threshold; at or below it the ingredient is low on stock.
    #[serde(with = "rust_decimal::serde::float")]
    pub threshold: Decimal,

    pub supplier_id: Option<SupplierId>,

    /// Soft-disable flag. Ingredients are never deleted because their ledger
    /// history must be kept.
    pub active: bool,
}

impl Ingredient {
    /// Returns true if the quantity is at or below the reorder threshold.
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.threshold
    }
}

/// Fields for registering an ingredient.
///
/// The starting quantity is recorded as an `initial_stock` ledger entry.
#[derive(Debug, Clone)]
pub struct NewIngredient {
    pub name: String,
    pub unit: String,
    pub initial_quantity: Decimal,
    pub threshold: Decimal,
    pub supplier_id: Option<SupplierId>,
}

impl NewIngredient {
    pub fn new(
        name: impl Into<String>,
        unit: impl Into<String>,
        initial_quantity: Decimal,
        threshold: Decimal,
    ) -> Self {
        Self {
            name: name.into(),
            unit: unit.into(),
            initial_quantity,
            threshold,
            supplier_id: None,
        }
    }
}

/// Quantity of one ingredient consumed by one unit of one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeLine {
    pub product_id: ProductId,
    pub ingredient_id: IngredientId,
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity_needed: Decimal,
}

impl RecipeLine {
    pub fn new(
        product_id: ProductId,
        ingredient_id: IngredientId,
        quantity_needed: Decimal,
    ) -> Self {
        Self {
            product_id,
            ingredient_id,
            quantity_needed,
        }
    }

    /// Stock needed to make `units` of the product.
    pub fn required_for(&self, units: u32) -> Decimal {
        self.quantity_needed * Decimal::from(units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn recipe_line_scales_with_units() {
        let line = RecipeLine::new(ProductId::new(1), IngredientId::new(1), dec!(0.15));
        assert_eq!(line.required_for(4), dec!(0.60));
        assert_eq!(line.required_for(1), dec!(0.15));
    }

    #[test]
    fn low_stock_is_inclusive_of_threshold() {
        let mut flour = Ingredient {
            id: IngredientId::new(1),
            name: "Flour".to_string(),
            unit: "kg".to_string(),
            quantity: dec!(2),
            threshold: dec!(2),
            supplier_id: None,
            active: true,
        };
        assert!(flour.is_low_stock());
        flour.quantity = dec!(2.001);
        assert!(!flour.is_low_stock());
    }
}
