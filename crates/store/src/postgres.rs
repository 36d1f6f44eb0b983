use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use common::{CustomerId, IngredientId, LedgerEntryId, OrderId, ProductId, StaffId, SupplierId};
use domain::{
    Ingredient, LedgerEntry, Money, NewIngredient, NewLedgerEntry, NewProduct, Order, OrderItem,
    Product, RecipeLine,
};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};

use crate::{
    Result, StoreError,
    memory::DEFAULT_LOCK_TIMEOUT,
    store::{Store, StoreTx},
};

/// PostgreSQL-backed store.
///
/// Every transaction sets `lock_timeout` locally, so a `FOR UPDATE` that
/// waits too long fails with SQLSTATE 55P03 and surfaces as `Conflict`.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self::with_lock_timeout(pool, DEFAULT_LOCK_TIMEOUT)
    }

    /// Creates a new PostgreSQL store with a custom row-lock timeout.
    pub fn with_lock_timeout(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::info!("database migrations applied");
        Ok(())
    }
}

#[async_trait]
impl Store for PostgresStore {
    type Tx = PostgresTx;

    async fn begin(&self) -> Result<PostgresTx> {
        let mut tx = self.pool.begin().await?;

        // SET does not take bind parameters.
        let set_timeout = format!(
            "SET LOCAL lock_timeout = '{}ms'",
            self.lock_timeout.as_millis()
        );
        sqlx::query(&set_timeout).execute(&mut *tx).await?;

        Ok(PostgresTx {
            tx,
            locked_ingredients: HashSet::new(),
            locked_orders: HashSet::new(),
        })
    }
}

/// Transaction over a [`PostgresStore`].
pub struct PostgresTx {
    tx: Transaction<'static, Postgres>,
    locked_ingredients: HashSet<IngredientId>,
    locked_orders: HashSet<OrderId>,
}

fn decode<T, E: std::fmt::Display>(
    column: &str,
    value: std::result::Result<T, E>,
) -> Result<T> {
    value.map_err(|e| StoreError::Decode(format!("{column}: {e}")))
}

fn row_to_product(row: PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::new(row.try_get("id")?),
        name: row.try_get("name")?,
        price: Money::new(row.try_get("price")?),
        available: row.try_get("available")?,
    })
}

fn row_to_ingredient(row: PgRow) -> Result<Ingredient> {
    Ok(Ingredient {
        id: IngredientId::new(row.try_get("id")?),
        name: row.try_get("name")?,
        unit: row.try_get("unit")?,
        quantity: row.try_get("quantity")?,
        threshold: row.try_get("threshold")?,
        supplier_id: row
            .try_get::<Option<i64>, _>("supplier_id")?
            .map(SupplierId::new),
        active: row.try_get("active")?,
    })
}

fn row_to_recipe_line(row: PgRow) -> Result<RecipeLine> {
    Ok(RecipeLine {
        product_id: ProductId::new(row.try_get("product_id")?),
        ingredient_id: IngredientId::new(row.try_get("ingredient_id")?),
        quantity_needed: row.try_get("quantity_needed")?,
    })
}

fn row_to_ledger_entry(row: PgRow) -> Result<LedgerEntry> {
    let reason: String = row.try_get("reason")?;
    Ok(LedgerEntry {
        id: LedgerEntryId::new(row.try_get("id")?),
        ingredient_id: IngredientId::new(row.try_get("ingredient_id")?),
        quantity_change: row.try_get("quantity_change")?,
        reason: decode("reason", reason.parse())?,
        user_id: StaffId::new(row.try_get("user_id")?),
        order_id: row.try_get::<Option<i64>, _>("order_id")?.map(OrderId::new),
        timestamp: row.try_get("timestamp")?,
    })
}

fn row_to_order(row: PgRow) -> Result<Order> {
    let order_type: String = row.try_get("order_type")?;
    let status: String = row.try_get("status")?;
    Ok(Order {
        id: OrderId::new(row.try_get("id")?),
        order_number: row.try_get("order_number")?,
        order_type: decode("order_type", order_type.parse())?,
        status: decode("status", status.parse())?,
        staff_id: StaffId::new(row.try_get("staff_id")?),
        customer_id: row
            .try_get::<Option<i64>, _>("customer_id")?
            .map(CustomerId::new),
        subtotal: Money::new(row.try_get("subtotal")?),
        tax: Money::new(row.try_get("tax")?),
        total_amount: Money::new(row.try_get("total_amount")?),
        payment_method: row.try_get("payment_method")?,
        created_at: row.try_get("created_at")?,
        completed_at: row.try_get("completed_at")?,
    })
}

fn row_to_order_item(row: PgRow) -> Result<OrderItem> {
    let quantity: i32 = row.try_get("quantity")?;
    Ok(OrderItem {
        order_id: OrderId::new(row.try_get("order_id")?),
        product_id: ProductId::new(row.try_get("product_id")?),
        quantity: decode("quantity", u32::try_from(quantity))?,
        unit_price: Money::new(row.try_get("unit_price")?),
        notes: row.try_get("notes")?,
    })
}

const INGREDIENT_COLUMNS: &str = "id, name, unit, quantity, threshold, supplier_id, active";

const ORDER_COLUMNS: &str = "id, order_number, order_type, status, staff_id, customer_id, \
     subtotal, tax, total_amount, payment_method, created_at, completed_at";

const LEDGER_COLUMNS: &str =
    "id, ingredient_id, quantity_change, reason, user_id, order_id, timestamp";

#[async_trait]
impl StoreTx for PostgresTx {
    async fn insert_product(&mut self, product: NewProduct) -> Result<Product> {
        let row = sqlx::query(
            r#"
            INSERT INTO products (name, price, available)
            VALUES ($1, $2, $3)
            RETURNING id, name, price, available
            "#,
        )
        .bind(&product.name)
        .bind(product.price.amount())
        .bind(product.available)
        .fetch_one(&mut *self.tx)
        .await?;

        row_to_product(row)
    }

    async fn product(&mut self, id: ProductId) -> Result<Option<Product>> {
        sqlx::query("SELECT id, name, price, available FROM products WHERE id = $1")
            .bind(id.as_i64())
            .fetch_optional(&mut *self.tx)
            .await?
            .map(row_to_product)
            .transpose()
    }

    async fn insert_recipe_line(&mut self, line: &RecipeLine) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO product_ingredients (product_id, ingredient_id, quantity_needed)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(line.product_id.as_i64())
        .bind(line.ingredient_id.as_i64())
        .bind(line.quantity_needed)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn recipe_lines(&mut self, product_id: ProductId) -> Result<Vec<RecipeLine>> {
        let rows = sqlx::query(
            r#"
            SELECT product_id, ingredient_id, quantity_needed
            FROM product_ingredients
            WHERE product_id = $1
            ORDER BY ingredient_id ASC
            "#,
        )
        .bind(product_id.as_i64())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(row_to_recipe_line).collect()
    }

    async fn insert_ingredient(&mut self, ingredient: &NewIngredient) -> Result<Ingredient> {
        let sql = format!(
            "INSERT INTO ingredients (name, unit, quantity, threshold, supplier_id) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {INGREDIENT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&ingredient.name)
            .bind(&ingredient.unit)
            .bind(ingredient.initial_quantity)
            .bind(ingredient.threshold)
            .bind(ingredient.supplier_id.map(|s| s.as_i64()))
            .fetch_one(&mut *self.tx)
            .await?;

        let created = row_to_ingredient(row)?;
        // A row inserted by this transaction is invisible to everyone else.
        self.locked_ingredients.insert(created.id);
        Ok(created)
    }

    async fn ingredient(&mut self, id: IngredientId) -> Result<Option<Ingredient>> {
        let sql = format!("SELECT {INGREDIENT_COLUMNS} FROM ingredients WHERE id = $1");
        sqlx::query(&sql)
            .bind(id.as_i64())
            .fetch_optional(&mut *self.tx)
            .await?
            .map(row_to_ingredient)
            .transpose()
    }

    async fn lock_ingredient(&mut self, id: IngredientId) -> Result<Option<Ingredient>> {
        let sql = format!("SELECT {INGREDIENT_COLUMNS} FROM ingredients WHERE id = $1 FOR UPDATE");
        let ingredient = sqlx::query(&sql)
            .bind(id.as_i64())
            .fetch_optional(&mut *self.tx)
            .await?
            .map(row_to_ingredient)
            .transpose()?;

        if ingredient.is_some() {
            self.locked_ingredients.insert(id);
        }
        Ok(ingredient)
    }

    async fn update_ingredient_quantity(
        &mut self,
        id: IngredientId,
        quantity: Decimal,
    ) -> Result<()> {
        if !self.locked_ingredients.contains(&id) {
            return Err(StoreError::LockNotHeld(format!("ingredient {id}")));
        }
        sqlx::query("UPDATE ingredients SET quantity = $2, updated_at = NOW() WHERE id = $1")
            .bind(id.as_i64())
            .bind(quantity)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn update_ingredient_active(&mut self, id: IngredientId, active: bool) -> Result<()> {
        if !self.locked_ingredients.contains(&id) {
            return Err(StoreError::LockNotHeld(format!("ingredient {id}")));
        }
        sqlx::query("UPDATE ingredients SET active = $2, updated_at = NOW() WHERE id = $1")
            .bind(id.as_i64())
            .bind(active)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn low_stock_ingredients(&mut self) -> Result<Vec<Ingredient>> {
        let sql = format!(
            "SELECT {INGREDIENT_COLUMNS} FROM ingredients \
             WHERE active AND quantity <= threshold ORDER BY name ASC"
        );
        let rows = sqlx::query(&sql).fetch_all(&mut *self.tx).await?;
        rows.into_iter().map(row_to_ingredient).collect()
    }

    async fn append_ledger_entry(&mut self, entry: NewLedgerEntry) -> Result<LedgerEntry> {
        let sql = format!(
            "INSERT INTO inventory_logs \
             (ingredient_id, quantity_change, reason, user_id, order_id) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {LEDGER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(entry.ingredient_id.as_i64())
            .bind(entry.quantity_change)
            .bind(entry.reason.as_str())
            .bind(entry.user_id.as_i64())
            .bind(entry.order_id.map(|o| o.as_i64()))
            .fetch_one(&mut *self.tx)
            .await?;

        row_to_ledger_entry(row)
    }

    async fn ledger_entries(
        &mut self,
        ingredient_id: IngredientId,
        limit: Option<usize>,
    ) -> Result<Vec<LedgerEntry>> {
        // LIMIT NULL means no limit.
        let limit = limit.map(|l| i64::try_from(l).unwrap_or(i64::MAX));
        let sql = format!(
            "SELECT {LEDGER_COLUMNS} FROM inventory_logs \
             WHERE ingredient_id = $1 ORDER BY id DESC LIMIT $2"
        );
        let rows = sqlx::query(&sql)
            .bind(ingredient_id.as_i64())
            .bind(limit)
            .fetch_all(&mut *self.tx)
            .await?;

        rows.into_iter().map(row_to_ledger_entry).collect()
    }

    async fn ledger_entries_for_order(&mut self, order_id: OrderId) -> Result<Vec<LedgerEntry>> {
        let sql = format!(
            "SELECT {LEDGER_COLUMNS} FROM inventory_logs WHERE order_id = $1 ORDER BY id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(order_id.as_i64())
            .fetch_all(&mut *self.tx)
            .await?;

        rows.into_iter().map(row_to_ledger_entry).collect()
    }

    async fn ledger_sum(&mut self, ingredient_id: IngredientId) -> Result<Decimal> {
        let sum: Decimal = sqlx::query_scalar(
            "SELECT COALESCE(SUM(quantity_change), 0) FROM inventory_logs WHERE ingredient_id = $1",
        )
        .bind(ingredient_id.as_i64())
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(sum)
    }

    async fn next_order_id(&mut self) -> Result<OrderId> {
        let id: i64 = sqlx::query_scalar("SELECT nextval(pg_get_serial_sequence('orders', 'id'))")
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(OrderId::new(id))
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        // ON CONFLICT keeps the transaction usable when the number is taken.
        let result = sqlx::query(
            r#"
            INSERT INTO orders (id, order_number, order_type, status, staff_id,
                                customer_id, subtotal, tax, total_amount, payment_method,
                                created_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (order_number) DO NOTHING
            "#,
        )
        .bind(order.id.as_i64())
        .bind(&order.order_number)
        .bind(order.order_type.as_str())
        .bind(order.status.as_str())
        .bind(order.staff_id.as_i64())
        .bind(order.customer_id.map(|c| c.as_i64()))
        .bind(order.subtotal.amount())
        .bind(order.tax.amount())
        .bind(order.total_amount.amount())
        .bind(&order.payment_method)
        .bind(order.created_at)
        .bind(order.completed_at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::DuplicateOrderNumber(order.order_number.clone()));
        }

        // The inserted row is ours until commit.
        self.locked_orders.insert(order.id);
        Ok(())
    }

    async fn insert_order_items(&mut self, items: &[OrderItem]) -> Result<()> {
        for item in items {
            let quantity = i32::try_from(item.quantity).map_err(|_| {
                StoreError::Constraint(format!(
                    "order item quantity {} out of range",
                    item.quantity
                ))
            })?;

            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, product_id, quantity, unit_price, notes)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(item.order_id.as_i64())
            .bind(item.product_id.as_i64())
            .bind(quantity)
            .bind(item.unit_price.amount())
            .bind(&item.notes)
            .execute(&mut *self.tx)
            .await?;
        }
        Ok(())
    }

    async fn order(&mut self, id: OrderId) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        sqlx::query(&sql)
            .bind(id.as_i64())
            .fetch_optional(&mut *self.tx)
            .await?
            .map(row_to_order)
            .transpose()
    }

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE");
        let order = sqlx::query(&sql)
            .bind(id.as_i64())
            .fetch_optional(&mut *self.tx)
            .await?
            .map(row_to_order)
            .transpose()?;

        if order.is_some() {
            self.locked_orders.insert(id);
        }
        Ok(order)
    }

    async fn order_items(&mut self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        let rows = sqlx::query(
            r#"
            SELECT order_id, product_id, quantity, unit_price, notes
            FROM order_items
            WHERE order_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(order_id.as_i64())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(row_to_order_item).collect()
    }

    async fn update_order_status(&mut self, order: &Order) -> Result<()> {
        if !self.locked_orders.contains(&order.id) {
            return Err(StoreError::LockNotHeld(format!("order {}", order.id)));
        }
        sqlx::query("UPDATE orders SET status = $2, completed_at = $3 WHERE id = $1")
            .bind(order.id.as_i64())
            .bind(order.status.as_str())
            .bind(order.completed_at)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        tracing::debug!(
            ingredients = self.locked_ingredients.len(),
            orders = self.locked_orders.len(),
            "committing transaction"
        );
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
