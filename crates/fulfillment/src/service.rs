//! Order placement.

use std::time::{Duration, Instant};

use chrono::Utc;
use common::{IngredientId, OrderId};
use domain::{
    Order, OrderError, OrderItem, OrderStatus, OrderTotals, PlaceOrder, Product, RecipeLine,
};
use rust_decimal::Decimal;
use serde::Serialize;
use store::{Store, StoreError, StoreTx};

use crate::error::{FulfillmentError, Result};
use crate::ledger::{DeductionContext, StockLedger};
use crate::order_number;
use crate::recipe::RecipeResolver;
use crate::repository::{OrderDetails, OrderRepository};

/// How many fresh order numbers to try before giving up.
const MAX_ORDER_NUMBER_ATTEMPTS: usize = 5;

/// Tunables of order placement.
#[derive(Debug, Clone, Copy)]
pub struct FulfillmentConfig {
    /// Applied to the subtotal, e.g. `0.12` for 12%.
    pub tax_rate: Decimal,

    /// Upper bound for one whole `place_order` call.
    pub order_timeout: Duration,
}

impl Default for FulfillmentConfig {
    fn default() -> Self {
        Self {
            tax_rate: Decimal::new(12, 2),
            order_timeout: Duration::from_secs(5),
        }
    }
}

/// What the caller gets back for a placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderConfirmation {
    pub order_id: OrderId,
    pub order_number: String,
}

/// One planned deduction: `required` of an ingredient for one order line.
struct Deduction {
    line: usize,
    ingredient_id: IngredientId,
    required: Decimal,
}

/// Places orders and deducts their ingredients from stock as one unit.
///
/// A placed order, its items, the ingredient decrements and their ledger
/// entries are committed together or not at all.
#[derive(Clone)]
pub struct OrderFulfillmentService<S: Store> {
    store: S,
    config: FulfillmentConfig,
}

impl<S: Store> OrderFulfillmentService<S> {
    /// Creates a new service with the default configuration.
    pub fn new(store: S) -> Self {
        Self::with_config(store, FulfillmentConfig::default())
    }

    pub fn with_config(store: S, config: FulfillmentConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &FulfillmentConfig {
        &self.config
    }

    /// Places an order.
    ///
    /// The request shape is validated before a transaction is opened. Inside
    /// the transaction, prices and totals are checked against the catalog,
    /// every touched ingredient is locked in ascending id order and then
    /// deducted line by line. The first shortfall rolls everything back.
    ///
    /// The configured timeout bounds everything up to the commit. Once the
    /// commit is issued it runs to completion, so a `Timeout` always means
    /// nothing was written.
    #[tracing::instrument(
        skip(self, request),
        fields(staff_id = %request.staff_id, items = request.items.len())
    )]
    pub async fn place_order(&self, request: PlaceOrder) -> Result<OrderConfirmation> {
        metrics::counter!("order_placement_attempts_total").increment(1);
        let start = Instant::now();

        let result = match request.validate() {
            Ok(()) => self.place_in_transaction(&request).await,
            Err(e) => Err(e.into()),
        };

        metrics::histogram!("order_placement_duration_seconds")
            .record(start.elapsed().as_secs_f64());

        match &result {
            Ok(confirmation) => {
                metrics::counter!("orders_placed_total").increment(1);
                tracing::info!(
                    order_id = %confirmation.order_id,
                    order_number = %confirmation.order_number,
                    "order placed"
                );
            }
            Err(e) => {
                metrics::counter!("orders_rejected_total", "reason" => e.kind()).increment(1);
                if let FulfillmentError::Persistence(source) = e {
                    tracing::error!(error = %source, "order placement failed");
                } else {
                    tracing::warn!(error = %e, kind = e.kind(), "order rejected");
                }
            }
        }

        result
    }

    /// Loads an order with its items.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, id: OrderId) -> Result<OrderDetails> {
        let mut tx = self.store.begin().await?;
        let details = OrderRepository::load(&mut tx, id).await?;
        tx.rollback().await?;
        details.ok_or_else(|| FulfillmentError::NotFound(format!("Order {id} not found.")))
    }

    async fn place_in_transaction(&self, request: &PlaceOrder) -> Result<OrderConfirmation> {
        let timeout = self.config.order_timeout;
        // Dropping the staged transaction on timeout rolls it back.
        let (tx, confirmation) = tokio::time::timeout(timeout, self.stage(request))
            .await
            .unwrap_or(Err(FulfillmentError::Timeout(timeout)))?;

        // Not bounded: cancelling a commit in flight would leave its outcome
        // unknown to the caller.
        tx.commit().await?;
        Ok(confirmation)
    }

    /// Runs the whole placement in a fresh transaction and hands it back
    /// uncommitted.
    async fn stage(&self, request: &PlaceOrder) -> Result<(S::Tx, OrderConfirmation)> {
        let mut tx = self.store.begin().await?;
        match self.fulfill(&mut tx, request).await {
            Ok(confirmation) => Ok((tx, confirmation)),
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "rollback after failed placement failed");
                }
                Err(e)
            }
        }
    }

    async fn fulfill(&self, tx: &mut S::Tx, request: &PlaceOrder) -> Result<OrderConfirmation> {
        // Reserved first so usage entries can point at the order.
        let order_id = tx.next_order_id().await?;

        let products = Self::load_products(tx, request).await?;

        let totals = OrderTotals::compute(
            products
                .iter()
                .zip(&request.items)
                .map(|(product, item)| (product.price, item.quantity)),
            self.config.tax_rate,
        );
        totals.verify(request.subtotal, request.tax, request.total_amount)?;

        let mut deductions = Vec::new();
        for (line, (product, item)) in products.iter().zip(&request.items).enumerate() {
            let recipe: Vec<RecipeLine> = RecipeResolver::resolve(tx, product.id).await?;
            deductions.extend(recipe.into_iter().map(|r| Deduction {
                line,
                ingredient_id: r.ingredient_id,
                required: r.required_for(item.quantity),
            }));
        }

        StockLedger::lock(tx, deductions.iter().map(|d| d.ingredient_id)).await?;

        let context = DeductionContext::order_usage(order_id, request.staff_id);
        for deduction in &deductions {
            StockLedger::reserve_and_deduct(
                tx,
                deduction.ingredient_id,
                deduction.required,
                &context,
            )
            .await
            .map_err(|e| e.for_product(&products[deduction.line].name))?;
        }

        let mut order = Order {
            id: order_id,
            order_number: String::new(),
            order_type: request.order_type,
            status: OrderStatus::Pending,
            staff_id: request.staff_id,
            customer_id: request.customer_id,
            subtotal: totals.subtotal,
            tax: totals.tax,
            total_amount: totals.total_amount,
            payment_method: request.payment_method.trim().to_string(),
            created_at: Utc::now(),
            completed_at: None,
        };
        Self::insert_with_unique_number(tx, &mut order).await?;

        let items: Vec<OrderItem> = products
            .iter()
            .zip(&request.items)
            .map(|(product, item)| OrderItem {
                order_id,
                product_id: product.id,
                quantity: item.quantity,
                unit_price: product.price,
                notes: item.notes.clone(),
            })
            .collect();
        OrderRepository::insert_items(tx, &items).await?;

        Ok(OrderConfirmation {
            order_id,
            order_number: order.order_number,
        })
    }

    /// Resolves every line's product and checks it against the catalog.
    async fn load_products(tx: &mut S::Tx, request: &PlaceOrder) -> Result<Vec<Product>> {
        let mut products = Vec::with_capacity(request.items.len());
        for item in &request.items {
            let product = tx.product(item.product_id).await?.ok_or_else(|| {
                FulfillmentError::NotFound(format!("Product {} not found.", item.product_id))
            })?;

            if !product.available {
                return Err(OrderError::ProductUnavailable {
                    product_id: product.id,
                    name: product.name,
                }
                .into());
            }
            if item.unit_price != product.price {
                return Err(OrderError::PriceMismatch {
                    product_id: product.id,
                    name: product.name,
                    catalog: product.price,
                    supplied: item.unit_price,
                }
                .into());
            }
            products.push(product);
        }
        Ok(products)
    }

    async fn insert_with_unique_number(tx: &mut S::Tx, order: &mut Order) -> Result<()> {
        for attempt in 1..=MAX_ORDER_NUMBER_ATTEMPTS {
            order.order_number = order_number::generate(order.created_at);
            match OrderRepository::insert(tx, order).await {
                Ok(()) => return Ok(()),
                Err(StoreError::DuplicateOrderNumber(number)) => {
                    tracing::warn!(%number, attempt, "order number collision, regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(FulfillmentError::Conflict(format!(
            "no unique order number after {MAX_ORDER_NUMBER_ATTEMPTS} attempts"
        )))
    }
}
