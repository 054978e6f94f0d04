//! Integration tests for the basket manager.
//!
//! These tests verify that stock moves in lock-step with basket lines,
//! including under concurrent reservations.

use common::{Money, ProductId};
use domain::{BasketService, DomainError, ErrorKind};
use store::{BasketStore, CatalogStore, InMemoryStore, NewCategory, NewProduct, Product};

async fn setup(stock: i32) -> (BasketService<InMemoryStore>, InMemoryStore, Product) {
    let store = InMemoryStore::new();
    let category = store
        .create_category(NewCategory::new("Kitchen", true))
        .await
        .unwrap();
    let product = store
        .create_product(NewProduct {
            name: "Kettle".to_string(),
            sku: "KTL-01".to_string(),
            unit_price: Money::from_cents(3450),
            quantity: stock,
            category_id: category.id,
        })
        .await
        .unwrap();

    (BasketService::new(store.clone()), store, product)
}

async fn stock(store: &InMemoryStore, product_id: ProductId) -> i32 {
    store.get_product(product_id).await.unwrap().unwrap().quantity
}

mod reservations {
    use super::*;

    #[tokio::test]
    async fn add_update_remove_scenario() {
        let (service, store, product) = setup(5).await;

        service.add_item("alice", product.id, 3).await.unwrap();
        assert_eq!(stock(&store, product.id).await, 2);

        let err = service.add_item("alice", product.id, 3).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::InsufficientStock {
                requested: 3,
                available: 2,
                ..
            }
        ));
        assert_eq!(stock(&store, product.id).await, 2);

        let line = service.update_item("alice", product.id, 1).await.unwrap();
        assert_eq!(line.quantity, 1);
        assert_eq!(stock(&store, product.id).await, 4);

        let released = service.remove_item("alice", product.id).await.unwrap();
        assert_eq!(released, 1);
        assert_eq!(stock(&store, product.id).await, 5);

        let basket = service.get_basket("alice").await.unwrap();
        assert!(basket.item(product.id).is_none());
    }

    #[tokio::test]
    async fn add_takes_exactly_the_requested_units() {
        let (service, store, product) = setup(10).await;

        service.add_item("alice", product.id, 10).await.unwrap();
        assert_eq!(stock(&store, product.id).await, 0);

        let err = service.add_item("bob", product.id, 1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn adding_same_product_twice_merges_lines() {
        let (service, store, product) = setup(10).await;

        service.add_item("alice", product.id, 2).await.unwrap();
        service.add_item("alice", product.id, 3).await.unwrap();

        let basket = service.get_basket("alice").await.unwrap();
        assert_eq!(basket.items.len(), 1);
        assert_eq!(basket.items[0].quantity, 5);
        assert_eq!(stock(&store, product.id).await, 5);
    }

    #[tokio::test]
    async fn update_counts_the_current_reservation_as_available() {
        let (service, store, product) = setup(6).await;
        service.add_item("alice", product.id, 4).await.unwrap();

        // 2 on hand plus 4 already held: growing to 6 is allowed.
        service.update_item("alice", product.id, 6).await.unwrap();
        assert_eq!(stock(&store, product.id).await, 0);

        let err = service
            .update_item("alice", product.id, 7)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::InsufficientStock {
                requested: 7,
                available: 6,
                ..
            }
        ));
        assert_eq!(stock(&store, product.id).await, 0);
    }

    #[tokio::test]
    async fn update_rejects_non_positive_quantity() {
        let (service, store, product) = setup(6).await;
        service.add_item("alice", product.id, 2).await.unwrap();

        let err = service
            .update_item("alice", product.id, 0)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let basket = store.find_basket("alice").await.unwrap().unwrap();
        assert_eq!(basket.items[0].quantity, 2);
    }
}

mod invariants {
    use super::*;

    #[tokio::test]
    async fn stock_plus_reservations_is_constant() {
        let (service, store, product) = setup(20).await;
        let users = ["alice", "bob", "carol"];

        // (user index, operation, quantity): 0 = add, 1 = update, 2 = remove
        let steps: [(usize, u8, i32); 11] = [
            (0, 0, 4),
            (1, 0, 7),
            (0, 1, 9),
            (2, 0, 5),
            (1, 1, 1),
            (2, 0, 30),
            (0, 2, 0),
            (2, 1, 12),
            (1, 2, 0),
            (1, 1, 3),
            (2, 0, 2),
        ];

        for (user, op, quantity) in steps {
            let username = users[user];
            // Individual steps may fail; the total must hold regardless.
            let _ = match op {
                0 => service
                    .add_item(username, product.id, quantity)
                    .await
                    .map(|_| ()),
                1 => service
                    .update_item(username, product.id, quantity)
                    .await
                    .map(|_| ()),
                _ => service
                    .remove_item(username, product.id)
                    .await
                    .map(|_| ()),
            };

            assert_eq!(store.accounted_units(product.id).await, 20);
            assert!(stock(&store, product.id).await >= 0);
        }
    }

    #[tokio::test]
    async fn no_line_ever_holds_zero_units() {
        let (service, store, product) = setup(3).await;
        service.add_item("alice", product.id, 3).await.unwrap();

        assert!(service.update_item("alice", product.id, 0).await.is_err());
        service.remove_item("alice", product.id).await.unwrap();

        let basket = store.find_basket("alice").await.unwrap().unwrap();
        assert!(basket.items.iter().all(|item| item.quantity > 0));
        assert!(basket.is_empty());
    }
}

mod concurrency {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_adds_succeed_exactly_stock_times() {
        const STOCK: i32 = 8;
        const CALLERS: usize = 25;

        let (service, store, product) = setup(STOCK).await;
        let product_id = product.id;

        let attempts = (0..CALLERS).map(|i| {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .add_item(&format!("user-{i}"), product_id, 1)
                    .await
            })
        });
        let results = futures_util::future::join_all(attempts).await;

        let successes = results.iter().filter(|r| matches!(r, Ok(Ok(_)))).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Ok(Err(DomainError::InsufficientStock { .. }))))
            .count();

        assert_eq!(successes, STOCK as usize);
        assert_eq!(conflicts, CALLERS - STOCK as usize);
        assert_eq!(stock(&store, product_id).await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_adds_create_one_basket() {
        let (service, store, product) = setup(50).await;
        let product_id = product.id;

        let attempts = (0..10).map(|_| {
            let service = service.clone();
            tokio::spawn(async move { service.add_item("alice", product_id, 1).await })
        });
        futures_util::future::join_all(attempts).await;

        let basket = store.find_basket("alice").await.unwrap().unwrap();
        assert_eq!(basket.items.len(), 1);
        assert_eq!(basket.items[0].quantity, 10);
        assert_eq!(stock(&store, product_id).await, 40);
    }
}
