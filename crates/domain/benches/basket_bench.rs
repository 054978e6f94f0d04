use common::{Money, ProductId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{BasketService, CancellationPolicy, CheckoutDetails, OrderService};
use store::{CatalogStore, InMemoryStore, NewCategory, NewProduct};

fn seeded_store(rt: &tokio::runtime::Runtime, quantity: i32) -> (InMemoryStore, ProductId) {
    rt.block_on(async {
        let store = InMemoryStore::new();
        let category = store
            .create_category(NewCategory::new("Bench", true))
            .await
            .unwrap();
        let product = store
            .create_product(NewProduct {
                name: "Benchmark Widget".to_string(),
                sku: "BENCH-1".to_string(),
                unit_price: Money::from_cents(1000),
                quantity,
                category_id: category.id,
            })
            .await
            .unwrap();
        (store, product.id)
    })
}

fn bench_add_and_remove(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (store, product_id) = seeded_store(&rt, 1_000);
    let service = BasketService::new(store);

    c.bench_function("basket/add_then_remove", |b| {
        b.iter(|| {
            rt.block_on(async {
                service.add_item("bench", product_id, 1).await.unwrap();
                service.remove_item("bench", product_id).await.unwrap();
            });
        });
    });
}

fn bench_resize(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (store, product_id) = seeded_store(&rt, 1_000);
    let service = BasketService::new(store);
    rt.block_on(async { service.add_item("bench", product_id, 1).await.unwrap() });

    let mut grow = true;
    c.bench_function("basket/resize", |b| {
        b.iter(|| {
            let quantity = if grow { 5 } else { 1 };
            grow = !grow;
            rt.block_on(async {
                service
                    .update_item("bench", product_id, quantity)
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_checkout(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (store, product_id) = seeded_store(&rt, i32::MAX);
    let baskets = BasketService::new(store.clone());
    let orders = OrderService::new(store, CancellationPolicy::default());

    c.bench_function("order/add_and_checkout", |b| {
        b.iter(|| {
            rt.block_on(async {
                baskets.add_item("bench", product_id, 2).await.unwrap();
                orders
                    .create_order(
                        "bench",
                        CheckoutDetails {
                            name: "Bench".to_string(),
                            address: "Somewhere".to_string(),
                            phone_number: "555-0000".to_string(),
                            card_number: "4111111111111111".to_string(),
                            card_exp: "12/30".to_string(),
                            card_cvv: "123".to_string(),
                        },
                    )
                    .await
                    .unwrap();
            });
        });
    });
}

criterion_group!(benches, bench_add_and_remove, bench_resize, bench_checkout);
criterion_main!(benches);
