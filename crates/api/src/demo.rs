//! Demo catalog for running without a database.

use common::{StaffId, SupplierId};
use domain::{Money, NewIngredient, NewProduct};
use fulfillment::{Catalog, StockLedger};
use rust_decimal::Decimal;
use store::{Store, StoreTx};

/// Staff id recorded on the opening stock entries.
const SEED_MANAGER: StaffId = StaffId::new(3);

/// (name, unit, quantity, threshold, supplier)
const INGREDIENTS: &[(&str, &str, i64, i64, i64)] = &[
    ("Tomato", "kg", 50, 5, 1),
    ("Chicken Breast", "kg", 30, 3, 2),
    ("Lettuce", "heads", 20, 5, 1),
    ("Bread Buns", "pcs", 100, 20, 1),
    ("Cheese Slices", "kg", 5, 1, 2),
    ("Cola", "cans", 200, 24, 3),
    ("Ice Cream", "liters", 10, 2, 3),
    ("Potatoes", "kg", 40, 10, 1),
];

/// (name, price in cents, recipe as (ingredient index, thousandths per unit))
const PRODUCTS: &[(&str, i64, &[(usize, i64)])] = &[
    (
        "Chicken Sandwich",
        25000,
        &[(1, 150), (0, 50), (2, 100), (3, 1000)],
    ),
    ("Caesar Salad", 18000, &[(2, 200)]),
    ("French Fries", 8000, &[(7, 200)]),
    ("Cola Can", 5000, &[(5, 1000)]),
    ("Ice Cream Scoop", 7000, &[(6, 100)]),
];

/// Fills an empty store with a small restaurant menu.
pub async fn seed<S: Store>(store: &S) -> fulfillment::Result<()> {
    let mut tx = store.begin().await?;

    let mut ingredients = Vec::with_capacity(INGREDIENTS.len());
    for &(name, unit, quantity, threshold, supplier) in INGREDIENTS {
        let mut new =
            NewIngredient::new(name, unit, Decimal::from(quantity), Decimal::from(threshold));
        new.supplier_id = Some(SupplierId::new(supplier));
        let ingredient = StockLedger::register_ingredient(&mut tx, &new, SEED_MANAGER).await?;
        ingredients.push(ingredient.id);
    }

    for &(name, cents, recipe) in PRODUCTS {
        let new = NewProduct::new(name, Money::from_cents(cents));
        let product = Catalog::add_product(&mut tx, new).await?;
        for &(index, thousandths) in recipe {
            Catalog::add_recipe_line(
                &mut tx,
                product.id,
                ingredients[index],
                Decimal::new(thousandths, 3),
            )
            .await?;
        }
    }

    tx.commit().await?;
    tracing::info!(
        ingredients = INGREDIENTS.len(),
        products = PRODUCTS.len(),
        "demo catalog seeded"
    );
    Ok(())
}
