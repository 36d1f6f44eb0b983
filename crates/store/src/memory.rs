use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use common::{IngredientId, LedgerEntryId, OrderId, ProductId};
use domain::{
    Ingredient, LedgerEntry, NewIngredient, NewLedgerEntry, NewProduct, Order, OrderItem, Product,
    RecipeLine,
};
use rust_decimal::Decimal;
use tokio::sync::{OwnedMutexGuard, RwLock};

use crate::{
    Result, StoreError,
    store::{Store, StoreTx},
};

/// Default wait for a row lock before giving up with `Conflict`.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(2);

/// Committed rows, or the rows staged by one transaction.
#[derive(Debug, Default)]
struct Tables {
    products: BTreeMap<ProductId, Product>,
    ingredients: BTreeMap<IngredientId, Ingredient>,
    recipe_lines: Vec<RecipeLine>,
    ledger: Vec<LedgerEntry>,
    orders: BTreeMap<OrderId, Order>,
    order_items: Vec<OrderItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RowKey {
    Ingredient(IngredientId),
    Order(OrderId),
}

impl std::fmt::Display for RowKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowKey::Ingredient(id) => write!(f, "ingredient {id}"),
            RowKey::Order(id) => write!(f, "order {id}"),
        }
    }
}

/// A value a unique constraint covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum UniqueKey {
    OrderNumber(String),
    IngredientName(String),
    RecipeLine(ProductId, IngredientId),
}

impl Tables {
    fn contains_unique(&self, key: &UniqueKey) -> bool {
        match key {
            UniqueKey::OrderNumber(number) => {
                self.orders.values().any(|o| &o.order_number == number)
            }
            UniqueKey::IngredientName(name) => self.ingredients.values().any(|i| &i.name == name),
            UniqueKey::RecipeLine(product_id, ingredient_id) => self
                .recipe_lines
                .iter()
                .any(|l| l.product_id == *product_id && l.ingredient_id == *ingredient_id),
        }
    }
}

#[derive(Debug, Default)]
struct Sequences {
    product: AtomicI64,
    ingredient: AtomicI64,
    ledger: AtomicI64,
    order: AtomicI64,
}

fn next(seq: &AtomicI64) -> i64 {
    seq.fetch_add(1, Ordering::SeqCst) + 1
}

struct Shared {
    tables: RwLock<Tables>,
    row_locks: Mutex<HashMap<RowKey, Arc<tokio::sync::Mutex<()>>>>,
    /// Unique values staged by open transactions. Checked under a `tables`
    /// guard so a value is never free in both places at once.
    reservations: Mutex<HashSet<UniqueKey>>,
    sequences: Sequences,
    lock_timeout: Duration,
}

fn lock_sync<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory store for tests and the demo server.
///
/// Row locks are per-row async mutexes whose owned guards live in the
/// transaction, so a second transaction touching the same ingredient waits
/// exactly like it would on `SELECT … FOR UPDATE`. Writes are staged in the
/// transaction and applied to the committed tables in one step on commit.
#[derive(Clone)]
pub struct InMemoryStore {
    shared: Arc<Shared>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    /// Creates a new empty store with a custom row-lock timeout.
    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                tables: RwLock::new(Tables::default()),
                row_locks: Mutex::new(HashMap::new()),
                reservations: Mutex::new(HashSet::new()),
                sequences: Sequences::default(),
                lock_timeout,
            }),
        }
    }

    /// Returns the committed state of an ingredient.
    pub async fn committed_ingredient(&self, id: IngredientId) -> Option<Ingredient> {
        self.shared.tables.read().await.ingredients.get(&id).cloned()
    }

    /// Returns every committed ledger entry in insertion order.
    pub async fn committed_ledger(&self) -> Vec<LedgerEntry> {
        self.shared.tables.read().await.ledger.clone()
    }

    /// Returns every committed order.
    pub async fn committed_orders(&self) -> Vec<Order> {
        self.shared
            .tables
            .read()
            .await
            .orders
            .values()
            .cloned()
            .collect()
    }

    /// Returns the number of committed order items.
    pub async fn committed_order_item_count(&self) -> usize {
        self.shared.tables.read().await.order_items.len()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Tx = InMemoryTx;

    async fn begin(&self) -> Result<InMemoryTx> {
        Ok(InMemoryTx {
            shared: self.shared.clone(),
            guards: HashMap::new(),
            staged: Tables::default(),
            created_ingredients: HashSet::new(),
            reservations: Vec::new(),
            finished: false,
        })
    }
}

/// Transaction over an [`InMemoryStore`].
pub struct InMemoryTx {
    shared: Arc<Shared>,
    guards: HashMap<RowKey, OwnedMutexGuard<()>>,
    staged: Tables,
    created_ingredients: HashSet<IngredientId>,
    reservations: Vec<UniqueKey>,
    finished: bool,
}

impl InMemoryTx {
    async fn acquire(&mut self, key: RowKey) -> Result<()> {
        if self.guards.contains_key(&key) {
            return Ok(());
        }

        let mutex = lock_sync(&self.shared.row_locks)
            .entry(key)
            .or_default()
            .clone();

        let guard = tokio::time::timeout(self.shared.lock_timeout, mutex.lock_owned())
            .await
            .map_err(|_| {
                tracing::warn!(row = %key, "row lock wait timed out");
                StoreError::Conflict(format!(
                    "lock on {key} not granted within {}ms",
                    self.shared.lock_timeout.as_millis()
                ))
            })?;

        self.guards.insert(key, guard);
        Ok(())
    }

    fn holds(&self, key: RowKey) -> bool {
        self.guards.contains_key(&key)
    }

    async fn read_ingredient(&self, id: IngredientId) -> Option<Ingredient> {
        if let Some(staged) = self.staged.ingredients.get(&id) {
            return Some(staged.clone());
        }
        self.shared.tables.read().await.ingredients.get(&id).cloned()
    }

    async fn read_order(&self, id: OrderId) -> Option<Order> {
        if let Some(staged) = self.staged.orders.get(&id) {
            return Some(staged.clone());
        }
        self.shared.tables.read().await.orders.get(&id).cloned()
    }

    async fn writable_ingredient(&self, id: IngredientId) -> Result<Ingredient> {
        if !self.holds(RowKey::Ingredient(id)) && !self.created_ingredients.contains(&id) {
            return Err(StoreError::LockNotHeld(RowKey::Ingredient(id).to_string()));
        }
        self.read_ingredient(id)
            .await
            .ok_or_else(|| StoreError::Constraint(format!("ingredient {id} does not exist")))
    }

    /// Claims `key` for this transaction. Returns false if a committed row
    /// or any open transaction, this one included, already holds it.
    async fn claim(&mut self, key: UniqueKey) -> bool {
        {
            let tables = self.shared.tables.read().await;
            let mut reserved = lock_sync(&self.shared.reservations);
            if reserved.contains(&key) || tables.contains_unique(&key) {
                return false;
            }
            reserved.insert(key.clone());
        }
        self.reservations.push(key);
        true
    }

    fn release_reservations(&mut self) {
        if self.reservations.is_empty() {
            return;
        }
        let mut reserved = lock_sync(&self.shared.reservations);
        for key in self.reservations.drain(..) {
            reserved.remove(&key);
        }
    }

    /// Unlocks every held row and forgets the mutexes nobody else waits on.
    fn release_row_locks(&mut self) {
        if self.guards.is_empty() {
            return;
        }
        let mut row_locks = lock_sync(&self.shared.row_locks);
        for (key, guard) in self.guards.drain() {
            drop(guard);
            if let Some(mutex) = row_locks.get(&key)
                && Arc::strong_count(mutex) == 1
            {
                row_locks.remove(&key);
            }
        }
    }
}

impl Drop for InMemoryTx {
    fn drop(&mut self) {
        if !self.finished {
            self.release_reservations();
        }
        self.release_row_locks();
    }
}

#[async_trait]
impl StoreTx for InMemoryTx {
    async fn insert_product(&mut self, product: NewProduct) -> Result<Product> {
        let product = Product {
            id: ProductId::new(next(&self.shared.sequences.product)),
            name: product.name,
            price: product.price,
            available: product.available,
        };
        self.staged.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn product(&mut self, id: ProductId) -> Result<Option<Product>> {
        if let Some(staged) = self.staged.products.get(&id) {
            return Ok(Some(staged.clone()));
        }
        Ok(self.shared.tables.read().await.products.get(&id).cloned())
    }

    async fn insert_recipe_line(&mut self, line: &RecipeLine) -> Result<()> {
        if line.quantity_needed <= Decimal::ZERO {
            return Err(StoreError::Constraint(format!(
                "recipe quantity must be positive, got {}",
                line.quantity_needed
            )));
        }
        if self.product(line.product_id).await?.is_none() {
            return Err(StoreError::Constraint(format!(
                "product {} does not exist",
                line.product_id
            )));
        }
        if self.read_ingredient(line.ingredient_id).await.is_none() {
            return Err(StoreError::Constraint(format!(
                "ingredient {} does not exist",
                line.ingredient_id
            )));
        }

        let key = UniqueKey::RecipeLine(line.product_id, line.ingredient_id);
        if !self.claim(key).await {
            return Err(StoreError::Constraint(format!(
                "product {} already uses ingredient {}",
                line.product_id, line.ingredient_id
            )));
        }

        self.staged.recipe_lines.push(line.clone());
        Ok(())
    }

    async fn recipe_lines(&mut self, product_id: ProductId) -> Result<Vec<RecipeLine>> {
        let tables = self.shared.tables.read().await;
        let mut lines: Vec<_> = tables
            .recipe_lines
            .iter()
            .chain(self.staged.recipe_lines.iter())
            .filter(|l| l.product_id == product_id)
            .cloned()
            .collect();
        lines.sort_by_key(|l| l.ingredient_id);
        Ok(lines)
    }

    async fn insert_ingredient(&mut self, ingredient: &NewIngredient) -> Result<Ingredient> {
        if ingredient.initial_quantity < Decimal::ZERO {
            return Err(StoreError::Constraint(format!(
                "ingredient quantity must not be negative, got {}",
                ingredient.initial_quantity
            )));
        }

        if !self.claim(UniqueKey::IngredientName(ingredient.name.clone())).await {
            return Err(StoreError::Constraint(format!(
                "ingredient name {} already exists",
                ingredient.name
            )));
        }

        let created = Ingredient {
            id: IngredientId::new(next(&self.shared.sequences.ingredient)),
            name: ingredient.name.clone(),
            unit: ingredient.unit.clone(),
            quantity: ingredient.initial_quantity,
            threshold: ingredient.threshold,
            supplier_id: ingredient.supplier_id,
            active: true,
        };
        self.created_ingredients.insert(created.id);
        self.staged.ingredients.insert(created.id, created.clone());
        Ok(created)
    }

    async fn ingredient(&mut self, id: IngredientId) -> Result<Option<Ingredient>> {
        Ok(self.read_ingredient(id).await)
    }

    async fn lock_ingredient(&mut self, id: IngredientId) -> Result<Option<Ingredient>> {
        if self.read_ingredient(id).await.is_none() {
            return Ok(None);
        }
        self.acquire(RowKey::Ingredient(id)).await?;
        Ok(self.read_ingredient(id).await)
    }

    async fn update_ingredient_quantity(
        &mut self,
        id: IngredientId,
        quantity: Decimal,
    ) -> Result<()> {
        if quantity < Decimal::ZERO {
            return Err(StoreError::Constraint(format!(
                "ingredient {id} quantity would become {quantity}"
            )));
        }
        let mut ingredient = self.writable_ingredient(id).await?;
        ingredient.quantity = quantity;
        self.staged.ingredients.insert(id, ingredient);
        Ok(())
    }

    async fn update_ingredient_active(&mut self, id: IngredientId, active: bool) -> Result<()> {
        let mut ingredient = self.writable_ingredient(id).await?;
        ingredient.active = active;
        self.staged.ingredients.insert(id, ingredient);
        Ok(())
    }

    async fn low_stock_ingredients(&mut self) -> Result<Vec<Ingredient>> {
        let tables = self.shared.tables.read().await;
        let mut merged = tables.ingredients.clone();
        merged.extend(
            self.staged
                .ingredients
                .iter()
                .map(|(id, i)| (*id, i.clone())),
        );
        let mut low: Vec<_> = merged
            .into_values()
            .filter(|i| i.active && i.is_low_stock())
            .collect();
        low.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(low)
    }

    async fn append_ledger_entry(&mut self, entry: NewLedgerEntry) -> Result<LedgerEntry> {
        if self.read_ingredient(entry.ingredient_id).await.is_none() {
            return Err(StoreError::Constraint(format!(
                "ingredient {} does not exist",
                entry.ingredient_id
            )));
        }
        let entry = LedgerEntry {
            id: LedgerEntryId::new(next(&self.shared.sequences.ledger)),
            ingredient_id: entry.ingredient_id,
            quantity_change: entry.quantity_change,
            reason: entry.reason,
            user_id: entry.user_id,
            order_id: entry.order_id,
            timestamp: Utc::now(),
        };
        self.staged.ledger.push(entry.clone());
        Ok(entry)
    }

    async fn ledger_entries(
        &mut self,
        ingredient_id: IngredientId,
        limit: Option<usize>,
    ) -> Result<Vec<LedgerEntry>> {
        let tables = self.shared.tables.read().await;
        let mut entries: Vec<_> = tables
            .ledger
            .iter()
            .chain(self.staged.ledger.iter())
            .filter(|e| e.ingredient_id == ingredient_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.id.cmp(&a.id));
        if let Some(limit) = limit {
            entries.truncate(limit);
        }
        Ok(entries)
    }

    async fn ledger_entries_for_order(&mut self, order_id: OrderId) -> Result<Vec<LedgerEntry>> {
        let tables = self.shared.tables.read().await;
        let mut entries: Vec<_> = tables
            .ledger
            .iter()
            .chain(self.staged.ledger.iter())
            .filter(|e| e.order_id == Some(order_id))
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.id);
        Ok(entries)
    }

    async fn ledger_sum(&mut self, ingredient_id: IngredientId) -> Result<Decimal> {
        let tables = self.shared.tables.read().await;
        Ok(tables
            .ledger
            .iter()
            .chain(self.staged.ledger.iter())
            .filter(|e| e.ingredient_id == ingredient_id)
            .map(|e| e.quantity_change)
            .sum())
    }

    async fn next_order_id(&mut self) -> Result<OrderId> {
        Ok(OrderId::new(next(&self.shared.sequences.order)))
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        if !order.totals_consistent() {
            return Err(StoreError::Constraint(format!(
                "order {} total {} is not subtotal {} + tax {}",
                order.order_number, order.total_amount, order.subtotal, order.tax
            )));
        }

        if !self.claim(UniqueKey::OrderNumber(order.order_number.clone())).await {
            return Err(StoreError::DuplicateOrderNumber(order.order_number.clone()));
        }
        self.staged.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn insert_order_items(&mut self, items: &[OrderItem]) -> Result<()> {
        for item in items {
            if item.quantity == 0 {
                return Err(StoreError::Constraint(format!(
                    "order item for product {} has zero quantity",
                    item.product_id
                )));
            }
            if self.read_order(item.order_id).await.is_none() {
                return Err(StoreError::Constraint(format!(
                    "order {} does not exist",
                    item.order_id
                )));
            }
        }
        self.staged.order_items.extend_from_slice(items);
        Ok(())
    }

    async fn order(&mut self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.read_order(id).await)
    }

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        if self.read_order(id).await.is_none() {
            return Ok(None);
        }
        self.acquire(RowKey::Order(id)).await?;
        Ok(self.read_order(id).await)
    }

    async fn order_items(&mut self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        let tables = self.shared.tables.read().await;
        Ok(tables
            .order_items
            .iter()
            .chain(self.staged.order_items.iter())
            .filter(|i| i.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn update_order_status(&mut self, order: &Order) -> Result<()> {
        let staged_here = self.staged.orders.contains_key(&order.id);
        if !self.holds(RowKey::Order(order.id)) && !staged_here {
            return Err(StoreError::LockNotHeld(RowKey::Order(order.id).to_string()));
        }
        let mut current = self
            .read_order(order.id)
            .await
            .ok_or_else(|| StoreError::Constraint(format!("order {} does not exist", order.id)))?;
        current.status = order.status;
        current.completed_at = order.completed_at;
        self.staged.orders.insert(order.id, current);
        Ok(())
    }

    async fn commit(mut self) -> Result<()> {
        let staged = std::mem::take(&mut self.staged);
        let shared = Arc::clone(&self.shared);
        {
            let mut tables = shared.tables.write().await;
            tables.products.extend(staged.products);
            tables.ingredients.extend(staged.ingredients);
            tables.recipe_lines.extend(staged.recipe_lines);
            tables.ledger.extend(staged.ledger);
            tables.orders.extend(staged.orders);
            tables.order_items.extend(staged.order_items);

            // The values now live in `tables`; drop the reservations before
            // readers can look at either.
            self.release_reservations();
        }
        self.finished = true;
        // Row locks are released when `self` drops here.
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        drop(self);
        Ok(())
    }
}
