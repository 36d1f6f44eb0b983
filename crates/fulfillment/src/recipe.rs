//! Product recipes.

use common::ProductId;
use domain::RecipeLine;
use store::StoreTx;

use crate::error::{FulfillmentError, Result};

/// Looks up which ingredients one unit of a product consumes.
pub struct RecipeResolver;

impl RecipeResolver {
    /// Returns the recipe of `product_id` in ascending ingredient id.
    ///
    /// A product without recipe lines yields an empty list.
    pub async fn resolve<T: StoreTx>(tx: &mut T, product_id: ProductId) -> Result<Vec<RecipeLine>> {
        if tx.product(product_id).await?.is_none() {
            return Err(FulfillmentError::NotFound(format!(
                "Product {product_id} not found."
            )));
        }
        Ok(tx.recipe_lines(product_id).await?)
    }
}
