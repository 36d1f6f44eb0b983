use async_trait::async_trait;
use common::{IngredientId, OrderId, ProductId};
use domain::{
    Ingredient, LedgerEntry, NewIngredient, NewLedgerEntry, NewProduct, Order, OrderItem, Product,
    RecipeLine,
};
use rust_decimal::Decimal;

use crate::Result;

/// Entry point of a storage backend.
///
/// A store hands out transactions; every read and write of the fulfillment
/// subsystem goes through an explicit [`StoreTx`] handle. There is no ambient
/// connection.
#[async_trait]
pub trait Store: Clone + Send + Sync + 'static {
    /// Transaction handle type.
    type Tx: StoreTx;

    /// Opens a new transaction.
    async fn begin(&self) -> Result<Self::Tx>;
}

/// An open transaction.
///
/// Nothing written through the handle is visible to other transactions until
/// [`StoreTx::commit`]. Dropping the handle without committing rolls back
/// every write and releases every row lock it holds.
///
/// Row locks (`lock_*`) are exclusive and held until the transaction ends.
/// Writes to an ingredient's quantity or an order's status require the
/// corresponding row lock.
#[async_trait]
pub trait StoreTx: Send + Sized {
    // -- Catalog --

    /// Inserts a product and returns it with its assigned id.
    async fn insert_product(&mut self, product: NewProduct) -> Result<Product>;

    /// Reads a product.
    async fn product(&mut self, id: ProductId) -> Result<Option<Product>>;

    /// Adds a recipe line. A product has at most one line per ingredient.
    async fn insert_recipe_line(&mut self, line: &RecipeLine) -> Result<()>;

    /// Returns the recipe of a product in ascending ingredient id.
    async fn recipe_lines(&mut self, product_id: ProductId) -> Result<Vec<RecipeLine>>;

    // -- Inventory --

    /// Inserts an ingredient with `initial_quantity` as its stock.
    ///
    /// The new row is writable by this transaction without taking its lock.
    async fn insert_ingredient(&mut self, ingredient: &NewIngredient) -> Result<Ingredient>;

    /// Reads an ingredient without locking it.
    async fn ingredient(&mut self, id: IngredientId) -> Result<Option<Ingredient>>;

    /// Takes the exclusive lock on an ingredient row and reads it.
    ///
    /// Waits for any other transaction holding the lock. Fails with
    /// `Conflict` if the lock is not granted within the store's lock timeout.
    async fn lock_ingredient(&mut self, id: IngredientId) -> Result<Option<Ingredient>>;

    /// Overwrites an ingredient's quantity. Requires the row lock.
    async fn update_ingredient_quantity(&mut self, id: IngredientId, quantity: Decimal)
    -> Result<()>;

    /// Sets the soft-disable flag of an ingredient. Requires the row lock.
    async fn update_ingredient_active(&mut self, id: IngredientId, active: bool) -> Result<()>;

    /// Active ingredients at or below their threshold, ordered by name.
    async fn low_stock_ingredients(&mut self) -> Result<Vec<Ingredient>>;

    /// Appends a ledger entry and returns it with id and timestamp.
    async fn append_ledger_entry(&mut self, entry: NewLedgerEntry) -> Result<LedgerEntry>;

    /// Ledger entries of an ingredient, newest first.
    async fn ledger_entries(
        &mut self,
        ingredient_id: IngredientId,
        limit: Option<usize>,
    ) -> Result<Vec<LedgerEntry>>;

    /// Ledger entries written for an order, oldest first.
    async fn ledger_entries_for_order(&mut self, order_id: OrderId) -> Result<Vec<LedgerEntry>>;

    /// Sum of all quantity changes recorded for an ingredient.
    async fn ledger_sum(&mut self, ingredient_id: IngredientId) -> Result<Decimal>;

    // -- Orders --

    /// Reserves a fresh order id. Ids of rolled-back orders are not reused.
    async fn next_order_id(&mut self) -> Result<OrderId>;

    /// Inserts an order under an id from [`StoreTx::next_order_id`].
    ///
    /// Fails with `DuplicateOrderNumber` without aborting the transaction if
    /// the order number is taken, so the caller can retry with a new number.
    async fn insert_order(&mut self, order: &Order) -> Result<()>;

    /// Inserts the items of an order.
    async fn insert_order_items(&mut self, items: &[OrderItem]) -> Result<()>;

    /// Reads an order without locking it.
    async fn order(&mut self, id: OrderId) -> Result<Option<Order>>;

    /// Takes the exclusive lock on an order row and reads it.
    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>>;

    /// Items of an order in insertion order.
    async fn order_items(&mut self, order_id: OrderId) -> Result<Vec<OrderItem>>;

    /// Persists `status` and `completed_at` of an order. Requires the row lock.
    async fn update_order_status(&mut self, order: &Order) -> Result<()>;

    // -- Transaction control --

    /// Makes every write of this transaction visible atomically.
    async fn commit(self) -> Result<()>;

    /// Discards every write of this transaction.
    async fn rollback(self) -> Result<()>;
}
