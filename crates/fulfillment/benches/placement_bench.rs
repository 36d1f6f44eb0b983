use common::StaffId;
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{Money, NewIngredient, NewProduct, OrderTotals, OrderType, PlaceOrder, PlaceOrderItem};
use fulfillment::{Catalog, OrderFulfillmentService, StockLedger};
use rust_decimal_macros::dec;
use store::{InMemoryStore, Store, StoreTx};

fn setup(rt: &tokio::runtime::Runtime) -> (OrderFulfillmentService<InMemoryStore>, PlaceOrder) {
    rt.block_on(async {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let flour = StockLedger::register_ingredient(
            &mut tx,
            &NewIngredient::new("Flour", "kg", dec!(1000000), dec!(10)),
            StaffId::new(1),
        )
        .await
        .unwrap();
        let cheese = StockLedger::register_ingredient(
            &mut tx,
            &NewIngredient::new("Cheese", "kg", dec!(1000000), dec!(10)),
            StaffId::new(1),
        )
        .await
        .unwrap();
        let pizza = Catalog::add_product(&mut tx, NewProduct::new("Pizza", Money::from_cents(1250)))
            .await
            .unwrap();
        Catalog::add_recipe_line(&mut tx, pizza.id, flour.id, dec!(0.3))
            .await
            .unwrap();
        Catalog::add_recipe_line(&mut tx, pizza.id, cheese.id, dec!(0.15))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let items = vec![PlaceOrderItem::new(pizza.id, 2, Money::from_cents(1250))];
        let totals = OrderTotals::compute([(Money::from_cents(1250), 2)], dec!(0.12));
        let request = PlaceOrder {
            order_type: OrderType::TakeOut,
            staff_id: StaffId::new(2),
            customer_id: None,
            payment_method: "card".to_string(),
            items,
            subtotal: totals.subtotal,
            tax: totals.tax,
            total_amount: totals.total_amount,
        };
        (OrderFulfillmentService::new(store), request)
    })
}

fn bench_place_order(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (service, request) = setup(&rt);

    c.bench_function("fulfillment/place_order", |b| {
        b.iter(|| {
            rt.block_on(async {
                service.place_order(request.clone()).await.unwrap();
            });
        });
    });
}

fn bench_rejected_order(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (service, mut request) = setup(&rt);
    request.items[0].quantity = 10_000_000;
    let totals = OrderTotals::compute([(Money::from_cents(1250), 10_000_000)], dec!(0.12));
    request.subtotal = totals.subtotal;
    request.tax = totals.tax;
    request.total_amount = totals.total_amount;

    c.bench_function("fulfillment/rejected_insufficient_stock", |b| {
        b.iter(|| {
            rt.block_on(async {
                service.place_order(request.clone()).await.unwrap_err();
            });
        });
    });
}

criterion_group!(benches, bench_place_order, bench_rejected_order);
criterion_main!(benches);
