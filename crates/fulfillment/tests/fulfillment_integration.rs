//! Integration tests for order placement against the in-memory store.

use std::time::Duration;

use async_trait::async_trait;
use common::{IngredientId, OrderId, ProductId, StaffId};
use domain::{
    Ingredient, LedgerEntry, LedgerReason, Money, NewIngredient, NewLedgerEntry, NewProduct,
    Order, OrderItem, OrderStatus, OrderTotals, OrderType, PlaceOrder, PlaceOrderItem, Product,
    RecipeLine,
};
use fulfillment::{
    Catalog, FulfillmentConfig, FulfillmentError, OrderFulfillmentService, StockLedger,
};
use futures_util::future::join_all;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use store::{InMemoryStore, InMemoryTx, Store, StoreTx};

const CASHIER: StaffId = StaffId::new(10);
const MANAGER: StaffId = StaffId::new(1);

struct TestHarness {
    store: InMemoryStore,
    service: OrderFulfillmentService<InMemoryStore>,
    flour: IngredientId,
    tomato: IngredientId,
    pizza: ProductId,
    salad: ProductId,
    water: ProductId,
}

impl TestHarness {
    async fn new() -> Self {
        Self::with(InMemoryStore::new(), FulfillmentConfig::default()).await
    }

    /// Flour 10kg (threshold 2), tomato 5pcs; pizza uses 3kg flour, salad
    /// uses 2 tomatoes, water uses nothing.
    async fn with(store: InMemoryStore, config: FulfillmentConfig) -> Self {
        let mut tx = store.begin().await.unwrap();
        let flour = StockLedger::register_ingredient(
            &mut tx,
            &NewIngredient::new("Flour", "kg", dec!(10), dec!(2)),
            MANAGER,
        )
        .await
        .unwrap()
        .id;
        let tomato = StockLedger::register_ingredient(
            &mut tx,
            &NewIngredient::new("Tomato", "pcs", dec!(5), dec!(1)),
            MANAGER,
        )
        .await
        .unwrap()
        .id;

        let pizza = Catalog::add_product(&mut tx, NewProduct::new("Pizza", Money::from_cents(1000)))
            .await
            .unwrap()
            .id;
        let salad = Catalog::add_product(&mut tx, NewProduct::new("Salad", Money::from_cents(450)))
            .await
            .unwrap()
            .id;
        let water = Catalog::add_product(&mut tx, NewProduct::new("Water", Money::from_cents(100)))
            .await
            .unwrap()
            .id;

        Catalog::add_recipe_line(&mut tx, pizza, flour, dec!(3))
            .await
            .unwrap();
        Catalog::add_recipe_line(&mut tx, salad, tomato, dec!(2))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let service = OrderFulfillmentService::with_config(store.clone(), config);
        Self {
            store,
            service,
            flour,
            tomato,
            pizza,
            salad,
            water,
        }
    }

    fn price(&self, product: ProductId) -> Money {
        if product == self.pizza {
            Money::from_cents(1000)
        } else if product == self.salad {
            Money::from_cents(450)
        } else {
            Money::from_cents(100)
        }
    }

    /// A request whose prices and totals agree with the catalog.
    fn request(&self, lines: &[(ProductId, u32)]) -> PlaceOrder {
        let items: Vec<PlaceOrderItem> = lines
            .iter()
            .map(|&(product, quantity)| PlaceOrderItem::new(product, quantity, self.price(product)))
            .collect();
        let totals = OrderTotals::compute(
            items.iter().map(|i| (i.unit_price, i.quantity)),
            self.service.config().tax_rate,
        );
        PlaceOrder {
            order_type: OrderType::DineIn,
            staff_id: CASHIER,
            customer_id: None,
            payment_method: "cash".to_string(),
            items,
            subtotal: totals.subtotal,
            tax: totals.tax,
            total_amount: totals.total_amount,
        }
    }

    async fn quantity(&self, id: IngredientId) -> Decimal {
        self.store.committed_ingredient(id).await.unwrap().quantity
    }

    async fn assert_balanced(&self) {
        let mut tx = self.store.begin().await.unwrap();
        for id in [self.flour, self.tomato] {
            let rec = StockLedger::reconcile(&mut tx, id).await.unwrap();
            assert!(rec.balanced, "ledger out of balance: {rec:?}");
        }
    }
}

#[tokio::test]
async fn three_pizzas_leave_one_kilo_of_flour() {
    let h = TestHarness::new().await;

    let confirmation = h
        .service
        .place_order(h.request(&[(h.pizza, 3)]))
        .await
        .unwrap();
    assert!(confirmation.order_number.starts_with("ORD-"));

    assert_eq!(h.quantity(h.flour).await, dec!(1));

    let usage: Vec<_> = h
        .store
        .committed_ledger()
        .await
        .into_iter()
        .filter(|e| e.reason == LedgerReason::OrderUsage)
        .collect();
    assert_eq!(usage.len(), 1);
    assert_eq!(usage[0].ingredient_id, h.flour);
    assert_eq!(usage[0].quantity_change, dec!(-9));
    assert_eq!(usage[0].order_id, Some(confirmation.order_id));
    assert_eq!(usage[0].user_id, CASHIER);

    let orders = h.store.committed_orders().await;
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].status, OrderStatus::Pending);
    assert_eq!(orders[0].total_amount, Money::from_cents(3360));

    h.assert_balanced().await;
}

#[tokio::test]
async fn four_pizzas_are_rejected_without_side_effects() {
    let h = TestHarness::new().await;

    let err = h
        .service
        .place_order(h.request(&[(h.pizza, 4)]))
        .await
        .unwrap_err();

    match &err {
        FulfillmentError::InsufficientStock {
            ingredient_id,
            ingredient,
            product,
            required,
            available,
        } => {
            assert_eq!(*ingredient_id, h.flour);
            assert_eq!(ingredient, "Flour");
            assert_eq!(product.as_deref(), Some("Pizza"));
            assert_eq!(*required, dec!(12));
            assert_eq!(*available, dec!(10));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.to_string(), "Insufficient stock for Flour to make Pizza.");
    assert!(!err.is_retryable());

    assert_eq!(h.quantity(h.flour).await, dec!(10));
    assert!(h.store.committed_orders().await.is_empty());
    assert_eq!(h.store.committed_ledger().await.len(), 2);
}

#[tokio::test]
async fn shortfall_on_second_line_undoes_first_line() {
    let h = TestHarness::new().await;

    let err = h
        .service
        .place_order(h.request(&[(h.salad, 2), (h.pizza, 4)]))
        .await
        .unwrap_err();
    assert!(matches!(err, FulfillmentError::InsufficientStock { .. }));

    assert_eq!(h.quantity(h.tomato).await, dec!(5));
    assert_eq!(h.quantity(h.flour).await, dec!(10));
    assert!(h.store.committed_orders().await.is_empty());
    assert_eq!(h.store.committed_order_item_count().await, 0);
    h.assert_balanced().await;
}

#[tokio::test]
async fn product_without_recipe_moves_no_stock() {
    let h = TestHarness::new().await;

    h.service
        .place_order(h.request(&[(h.water, 2)]))
        .await
        .unwrap();

    assert_eq!(h.store.committed_ledger().await.len(), 2);
    assert_eq!(h.store.committed_orders().await.len(), 1);
    assert_eq!(h.store.committed_order_item_count().await, 1);
}

#[tokio::test]
async fn unknown_product_is_not_found() {
    let h = TestHarness::new().await;

    let mut request = h.request(&[(h.pizza, 1)]);
    request.items.push(PlaceOrderItem::new(
        ProductId::new(999),
        1,
        Money::from_cents(0),
    ));

    let err = h.service.place_order(request).await.unwrap_err();
    assert!(matches!(err, FulfillmentError::NotFound(_)));
    assert_eq!(err.to_string(), "Product 999 not found.");
    assert_eq!(h.quantity(h.flour).await, dec!(10));
}

#[tokio::test]
async fn client_price_must_match_catalog() {
    let h = TestHarness::new().await;

    let mut request = h.request(&[(h.pizza, 1)]);
    request.items[0].unit_price = Money::from_cents(1);

    let err = h.service.place_order(request).await.unwrap_err();
    assert!(matches!(err, FulfillmentError::Validation(_)));
    assert!(h.store.committed_orders().await.is_empty());
}

#[tokio::test]
async fn client_totals_must_match_server_totals() {
    let h = TestHarness::new().await;

    let mut request = h.request(&[(h.pizza, 1)]);
    request.total_amount = request.total_amount + Money::from_cents(1);

    let err = h.service.place_order(request).await.unwrap_err();
    assert!(matches!(err, FulfillmentError::Validation(ref m) if m.contains("totalAmount")));
    assert_eq!(h.quantity(h.flour).await, dec!(10));
}

#[tokio::test]
async fn malformed_requests_are_rejected_up_front() {
    let h = TestHarness::new().await;

    let mut empty = h.request(&[(h.pizza, 1)]);
    empty.items.clear();
    assert!(matches!(
        h.service.place_order(empty).await,
        Err(FulfillmentError::Validation(_))
    ));

    let mut zero = h.request(&[(h.pizza, 1)]);
    zero.items[0].quantity = 0;
    assert!(matches!(
        h.service.place_order(zero).await,
        Err(FulfillmentError::Validation(_))
    ));

    let mut no_payment = h.request(&[(h.pizza, 1)]);
    no_payment.payment_method = "  ".to_string();
    assert!(matches!(
        h.service.place_order(no_payment).await,
        Err(FulfillmentError::Validation(_))
    ));
}

#[tokio::test]
async fn unavailable_product_is_rejected() {
    let h = TestHarness::new().await;

    let mut tx = h.store.begin().await.unwrap();
    let mut soldout = NewProduct::new("Soup", Money::from_cents(300));
    soldout.available = false;
    let soup = Catalog::add_product(&mut tx, soldout).await.unwrap();
    tx.commit().await.unwrap();

    let mut request = h.request(&[(h.pizza, 1)]);
    request.items[0] = PlaceOrderItem::new(soup.id, 1, Money::from_cents(300));
    let totals = OrderTotals::compute([(Money::from_cents(300), 1)], dec!(0.12));
    request.subtotal = totals.subtotal;
    request.tax = totals.tax;
    request.total_amount = totals.total_amount;

    let err = h.service.place_order(request).await.unwrap_err();
    assert!(matches!(err, FulfillmentError::Validation(ref m) if m.contains("Soup")));
}

#[tokio::test]
async fn placed_order_keeps_catalog_price_and_notes() {
    let h = TestHarness::new().await;

    let mut request = h.request(&[(h.pizza, 2), (h.salad, 1)]);
    request.items[1] = request.items[1].clone().with_notes("no onions");
    let confirmation = h.service.place_order(request).await.unwrap();

    let details = h.service.get_order(confirmation.order_id).await.unwrap();
    assert_eq!(details.order.order_number, confirmation.order_number);
    assert_eq!(details.items.len(), 2);
    assert_eq!(details.items[0].unit_price, Money::from_cents(1000));
    assert_eq!(details.items[1].notes.as_deref(), Some("no onions"));
    assert_eq!(details.order.subtotal, Money::from_cents(2450));
    assert_eq!(details.order.tax, Money::from_cents(294));
}

#[tokio::test]
async fn missing_order_is_not_found() {
    let h = TestHarness::new().await;
    let err = h
        .service
        .get_order(common::OrderId::new(12345))
        .await
        .unwrap_err();
    assert!(matches!(err, FulfillmentError::NotFound(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_orders_exceeding_stock_let_exactly_one_through() {
    let h = TestHarness::new().await;

    let a = h.service.clone();
    let b = h.service.clone();
    let ra = h.request(&[(h.pizza, 2)]);
    let rb = h.request(&[(h.pizza, 2)]);
    let (first, second) = tokio::join!(
        tokio::spawn(async move { a.place_order(ra).await }),
        tokio::spawn(async move { b.place_order(rb).await }),
    );
    let results = [first.unwrap(), second.unwrap()];

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(succeeded, 1);
    assert!(results.iter().any(|r| matches!(
        r,
        Err(FulfillmentError::InsufficientStock { available, .. }) if *available == dec!(4)
    )));
    assert_eq!(h.quantity(h.flour).await, dec!(4));
    h.assert_balanced().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_concurrent_orders_never_oversell() {
    let h = TestHarness::new().await;

    let tasks = (0..10).map(|_| {
        let service = h.service.clone();
        let request = h.request(&[(h.pizza, 1)]);
        tokio::spawn(async move { service.place_order(request).await })
    });
    let results: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(succeeded, 3);
    assert_eq!(h.quantity(h.flour).await, dec!(1));
    assert_eq!(h.store.committed_orders().await.len(), 3);
    h.assert_balanced().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn opposite_line_orders_do_not_deadlock() {
    let h = TestHarness::new().await;

    let tasks = (0..4).map(|i| {
        let service = h.service.clone();
        let lines = if i % 2 == 0 {
            [(h.pizza, 1), (h.salad, 1)]
        } else {
            [(h.salad, 1), (h.pizza, 1)]
        };
        let request = h.request(&lines);
        tokio::spawn(async move { service.place_order(request).await })
    });
    let results: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    // 10kg flour covers 3 pizzas, 5 tomatoes cover 2 salads.
    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(succeeded, 2);
    assert!(results.iter().all(|r| match r {
        Ok(_) => true,
        Err(e) => matches!(e, FulfillmentError::InsufficientStock { .. }),
    }));
    assert_eq!(h.quantity(h.flour).await, dec!(4));
    assert_eq!(h.quantity(h.tomato).await, dec!(1));
    h.assert_balanced().await;
}

#[tokio::test]
async fn held_lock_turns_into_retryable_conflict() {
    let store = InMemoryStore::with_lock_timeout(Duration::from_millis(50));
    let h = TestHarness::with(store, FulfillmentConfig::default()).await;

    let mut holder = h.store.begin().await.unwrap();
    holder.lock_ingredient(h.flour).await.unwrap();

    let err = h
        .service
        .place_order(h.request(&[(h.pizza, 1)]))
        .await
        .unwrap_err();
    assert!(matches!(err, FulfillmentError::Conflict(_)));
    assert!(err.is_retryable());

    holder.rollback().await.unwrap();
    h.service
        .place_order(h.request(&[(h.pizza, 1)]))
        .await
        .unwrap();
}

#[tokio::test]
async fn slow_placement_times_out_and_rolls_back() {
    let store = InMemoryStore::with_lock_timeout(Duration::from_secs(10));
    let config = FulfillmentConfig {
        order_timeout: Duration::from_millis(50),
        ..FulfillmentConfig::default()
    };
    let h = TestHarness::with(store, config).await;

    let mut holder = h.store.begin().await.unwrap();
    holder.lock_ingredient(h.tomato).await.unwrap();

    // Salad waits on the tomato lock; nothing of the order may survive.
    let err = h
        .service
        .place_order(h.request(&[(h.salad, 1)]))
        .await
        .unwrap_err();
    assert!(matches!(err, FulfillmentError::Timeout(_)));
    assert!(err.is_retryable());

    holder.rollback().await.unwrap();
    assert!(h.store.committed_orders().await.is_empty());
    assert_eq!(h.quantity(h.tomato).await, dec!(5));
}

/// Delegates to the in-memory store but acknowledges commits late.
#[derive(Clone)]
struct SlowCommitStore {
    inner: InMemoryStore,
    ack_delay: Duration,
}

struct SlowCommitTx {
    inner: InMemoryTx,
    ack_delay: Duration,
}

#[async_trait]
impl Store for SlowCommitStore {
    type Tx = SlowCommitTx;

    async fn begin(&self) -> store::Result<SlowCommitTx> {
        Ok(SlowCommitTx {
            inner: self.inner.begin().await?,
            ack_delay: self.ack_delay,
        })
    }
}

#[async_trait]
impl StoreTx for SlowCommitTx {
    async fn insert_product(&mut self, product: NewProduct) -> store::Result<Product> {
        self.inner.insert_product(product).await
    }

    async fn product(&mut self, id: ProductId) -> store::Result<Option<Product>> {
        self.inner.product(id).await
    }

    async fn insert_recipe_line(&mut self, line: &RecipeLine) -> store::Result<()> {
        self.inner.insert_recipe_line(line).await
    }

    async fn recipe_lines(&mut self, product_id: ProductId) -> store::Result<Vec<RecipeLine>> {
        self.inner.recipe_lines(product_id).await
    }

    async fn insert_ingredient(&mut self, ingredient: &NewIngredient) -> store::Result<Ingredient> {
        self.inner.insert_ingredient(ingredient).await
    }

    async fn ingredient(&mut self, id: IngredientId) -> store::Result<Option<Ingredient>> {
        self.inner.ingredient(id).await
    }

    async fn lock_ingredient(&mut self, id: IngredientId) -> store::Result<Option<Ingredient>> {
        self.inner.lock_ingredient(id).await
    }

    async fn update_ingredient_quantity(
        &mut self,
        id: IngredientId,
        quantity: Decimal,
    ) -> store::Result<()> {
        self.inner.update_ingredient_quantity(id, quantity).await
    }

    async fn update_ingredient_active(
        &mut self,
        id: IngredientId,
        active: bool,
    ) -> store::Result<()> {
        self.inner.update_ingredient_active(id, active).await
    }

    async fn low_stock_ingredients(&mut self) -> store::Result<Vec<Ingredient>> {
        self.inner.low_stock_ingredients().await
    }

    async fn append_ledger_entry(&mut self, entry: NewLedgerEntry) -> store::Result<LedgerEntry> {
        self.inner.append_ledger_entry(entry).await
    }

    async fn ledger_entries(
        &mut self,
        ingredient_id: IngredientId,
        limit: Option<usize>,
    ) -> store::Result<Vec<LedgerEntry>> {
        self.inner.ledger_entries(ingredient_id, limit).await
    }

    async fn ledger_entries_for_order(
        &mut self,
        order_id: OrderId,
    ) -> store::Result<Vec<LedgerEntry>> {
        self.inner.ledger_entries_for_order(order_id).await
    }

    async fn ledger_sum(&mut self, ingredient_id: IngredientId) -> store::Result<Decimal> {
        self.inner.ledger_sum(ingredient_id).await
    }

    async fn next_order_id(&mut self) -> store::Result<OrderId> {
        self.inner.next_order_id().await
    }

    async fn insert_order(&mut self, order: &Order) -> store::Result<()> {
        self.inner.insert_order(order).await
    }

    async fn insert_order_items(&mut self, items: &[OrderItem]) -> store::Result<()> {
        self.inner.insert_order_items(items).await
    }

    async fn order(&mut self, id: OrderId) -> store::Result<Option<Order>> {
        self.inner.order(id).await
    }

    async fn lock_order(&mut self, id: OrderId) -> store::Result<Option<Order>> {
        self.inner.lock_order(id).await
    }

    async fn order_items(&mut self, order_id: OrderId) -> store::Result<Vec<OrderItem>> {
        self.inner.order_items(order_id).await
    }

    async fn update_order_status(&mut self, order: &Order) -> store::Result<()> {
        self.inner.update_order_status(order).await
    }

    async fn commit(self) -> store::Result<()> {
        self.inner.commit().await?;
        tokio::time::sleep(self.ack_delay).await;
        Ok(())
    }

    async fn rollback(self) -> store::Result<()> {
        self.inner.rollback().await
    }
}

#[tokio::test]
async fn slow_commit_acknowledgement_is_not_reported_as_timeout() {
    let h = TestHarness::new().await;
    let config = FulfillmentConfig {
        order_timeout: Duration::from_millis(50),
        ..FulfillmentConfig::default()
    };
    let slow = OrderFulfillmentService::with_config(
        SlowCommitStore {
            inner: h.store.clone(),
            ack_delay: Duration::from_millis(200),
        },
        config,
    );

    // The commit lands before the timeout would fire; the caller must see
    // the order it produced, never a retryable failure.
    let confirmation = slow.place_order(h.request(&[(h.pizza, 1)])).await.unwrap();

    let orders = h.store.committed_orders().await;
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].order_number, confirmation.order_number);
    assert_eq!(h.quantity(h.flour).await, dec!(7));
    h.assert_balanced().await;
}
