//! Menu setup: products and their recipes.

use common::{IngredientId, ProductId};
use domain::{NewProduct, Product, RecipeLine};
use rust_decimal::Decimal;
use store::StoreTx;

use crate::error::{FulfillmentError, Result};

/// Writes menu data through the caller's transaction.
pub struct Catalog;

impl Catalog {
    pub async fn add_product<T: StoreTx>(tx: &mut T, product: NewProduct) -> Result<Product> {
        if product.name.trim().is_empty() {
            return Err(FulfillmentError::Validation(
                "Product name is required.".to_string(),
            ));
        }
        if product.price.is_negative() {
            return Err(FulfillmentError::Validation(format!(
                "Price of {} must not be negative.",
                product.name
            )));
        }
        Ok(tx.insert_product(product).await?)
    }

    /// Declares that one unit of `product_id` consumes `quantity_needed` of
    /// `ingredient_id`.
    pub async fn add_recipe_line<T: StoreTx>(
        tx: &mut T,
        product_id: ProductId,
        ingredient_id: IngredientId,
        quantity_needed: Decimal,
    ) -> Result<RecipeLine> {
        if quantity_needed <= Decimal::ZERO {
            return Err(FulfillmentError::Validation(format!(
                "Recipe quantity must be positive, got {quantity_needed}."
            )));
        }
        if tx.product(product_id).await?.is_none() {
            return Err(FulfillmentError::NotFound(format!(
                "Product {product_id} not found."
            )));
        }
        if tx.ingredient(ingredient_id).await?.is_none() {
            return Err(FulfillmentError::NotFound(format!(
                "Ingredient {ingredient_id} not found."
            )));
        }

        let line = RecipeLine::new(product_id, ingredient_id, quantity_needed);
        tx.insert_recipe_line(&line).await?;
        Ok(line)
    }
}
