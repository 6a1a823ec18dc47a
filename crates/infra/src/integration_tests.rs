//! Integration tests for the full order pipeline.
//!
//! Service → CommandDispatcher → EventStore → OrderBoard / NotificationSink
//!
//! Verifies:
//! - End-to-end scenarios across order, kitchen and payment services
//! - Concurrent writers on one order never lose an update
//! - Table occupancy follows the orders bound to it
//! - One notification per committed event, plus service summaries

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use brigade_catalog::{
    InMemoryCatalog, ProductCatalog, ProductId, ProductInfo, Station, StationId, StationType,
    TableId, TableInfo, TableRegistry, TableStatus,
};
use brigade_core::{AggregateId, AggregateRoot, DomainError, ExpectedVersion, InMemorySequence, UserId};
use brigade_events::{NotificationSink, NotifyError, RecordingNotificationSink};
use brigade_orders::{
    ItemAdded, ItemStatus, KitchenStatus, ORDER_AGGREGATE_TYPE, OrderEvent, OrderId, OrderItemId,
    OrderStatus, PaymentMethod,
};

use crate::command_dispatcher::DispatchError;
use crate::event_store::{EventStore, EventStoreError, InMemoryEventStore, StoredEvent, UncommittedEvent};
use crate::services::{
    CreateOrderRequest, ItemOutcome, KitchenDispatcher, OrderCore, OrderService, PaymentReconciler,
    RecordPaymentRequest, SplitRequest, UpdateItemRequest,
};

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn waiter() -> UserId {
    UserId::from_uuid(Uuid::from_u128(10))
}

fn supervisor() -> UserId {
    UserId::from_uuid(Uuid::from_u128(11))
}

struct Fixture {
    core: OrderCore,
    orders: OrderService,
    kitchen: KitchenDispatcher,
    payments: PaymentReconciler,
    catalog: Arc<InMemoryCatalog>,
    notifications: Arc<RecordingNotificationSink>,
    store: Arc<dyn EventStore>,
    grill: ProductId,
    salad: ProductId,
    beer: ProductId,
    orphan: ProductId,
    table: TableId,
}

impl Fixture {
    fn new() -> Self {
        Self::with_store(Arc::new(InMemoryEventStore::new()))
    }

    fn with_store(store: Arc<dyn EventStore>) -> Self {
        let notifications = Arc::new(RecordingNotificationSink::new());
        Self::with_parts(store, notifications.clone(), notifications)
    }

    fn with_parts(
        store: Arc<dyn EventStore>,
        sink: Arc<dyn NotificationSink>,
        notifications: Arc<RecordingNotificationSink>,
    ) -> Self {
        let catalog = Arc::new(InMemoryCatalog::new());

        let kitchen_station = StationId::new();
        let bar_station = StationId::new();
        catalog.upsert_station(Station {
            id: kitchen_station,
            name: "Hot line".into(),
            station_type: StationType::Kitchen,
        });
        catalog.upsert_station(Station {
            id: bar_station,
            name: "Bar".into(),
            station_type: StationType::Bar,
        });

        let product = |name: &str, price: &str, stations: Vec<StationId>| {
            let id = ProductId::new();
            catalog.upsert_product(ProductInfo {
                id,
                name: name.into(),
                price: dec(price),
                station_ids: stations,
            });
            id
        };
        let grill = product("Burger", "5.00", vec![kitchen_station]);
        let salad = product("Salad", "10.00", vec![kitchen_station]);
        let beer = product("Beer", "4.50", vec![bar_station]);
        let orphan = product("Special", "7.00", vec![]);

        let table = TableId::new();
        catalog.upsert_table(TableInfo {
            id: table,
            name: "T1".into(),
            area: Some("Terrace".into()),
            status: TableStatus::Available,
        });

        let core = OrderCore::new(
            store.clone(),
            sink,
            catalog.clone(),
            catalog.clone(),
            Arc::new(InMemorySequence::new()),
        );

        Self {
            orders: OrderService::new(core.clone()),
            kitchen: KitchenDispatcher::new(core.clone()),
            payments: PaymentReconciler::new(core.clone()),
            core,
            catalog,
            notifications,
            store,
            grill,
            salad,
            beer,
            orphan,
            table,
        }
    }

    async fn open(&self, table: Option<TableId>) -> OrderId {
        self.orders
            .create_order(CreateOrderRequest {
                table_id: table,
                customer_id: None,
                opened_by: waiter(),
            })
            .await
            .unwrap()
            .id_typed()
    }

    async fn add(&self, order_id: OrderId, product: ProductId, qty: &str) -> OrderItemId {
        let order = self.orders.add_item(order_id, product, dec(qty), None).await.unwrap();
        order.items().last().unwrap().item_id
    }

    fn table_status(&self) -> TableStatus {
        self.catalog.resolve_table(self.table).unwrap().status
    }

    fn payment(amount: &str) -> RecordPaymentRequest {
        RecordPaymentRequest {
            amount: dec(amount),
            method: PaymentMethod::Card,
            splits: vec![],
            received_by: Some(waiter()),
        }
    }
}

#[tokio::test]
async fn scenario_a_partial_then_full_payment_completes_and_frees_table() {
    let fx = Fixture::new();
    let order_id = fx.open(Some(fx.table)).await;
    assert_eq!(fx.table_status(), TableStatus::Occupied);

    fx.add(order_id, fx.grill, "2").await;
    fx.add(order_id, fx.salad, "1").await;
    fx.orders.send_to_kitchen(order_id, waiter()).await.unwrap();
    let served = fx
        .kitchen
        .mark_items_ready_for_station(order_id, StationType::Kitchen)
        .await
        .unwrap();
    assert_eq!(served.status(), OrderStatus::Served);
    assert_eq!(served.total_amount(), dec("20.00"));

    let first = fx.payments.record_payment(order_id, Fixture::payment("12")).await.unwrap();
    assert_eq!(first.remaining, dec("8.00"));
    assert!(!first.fully_paid);
    assert_eq!(first.order_status, OrderStatus::Served);
    assert_eq!(fx.table_status(), TableStatus::Occupied);

    let second = fx.payments.record_payment(order_id, Fixture::payment("8")).await.unwrap();
    assert!(second.fully_paid);
    assert_eq!(second.remaining, Decimal::ZERO);
    assert_eq!(second.order_status, OrderStatus::Completed);

    let order = fx.orders.get_order(order_id).await.unwrap();
    assert!(order.live_items().all(|i| i.kitchen_status == KitchenStatus::Served));
    assert_eq!(fx.table_status(), TableStatus::Available);

    let types = fx.notifications.event_types();
    assert!(types.contains(&"order.completed".to_string()));
    assert!(types.contains(&"table.released".to_string()));
    assert_eq!(types.iter().filter(|t| *t == "payment.processed").count(), 2);
    assert_eq!(types.iter().filter(|t| *t == "order.item_served").count(), 2);
}

#[tokio::test]
async fn scenario_b_split_mismatch_is_rejected_without_state_change() {
    let fx = Fixture::new();
    let order_id = fx.open(None).await;
    fx.add(order_id, fx.salad, "2").await;

    let err = fx
        .payments
        .record_payment(
            order_id,
            RecordPaymentRequest {
                splits: vec![
                    SplitRequest {
                        payer_name: "Ana".into(),
                        amount: dec("12"),
                    },
                    SplitRequest {
                        payer_name: "Ben".into(),
                        amount: dec("9"),
                    },
                ],
                ..Fixture::payment("20")
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::Domain(DomainError::SplitMismatch { .. })));
    let summary = fx.payments.payment_summary(order_id).await.unwrap();
    assert_eq!(summary.paid, Decimal::ZERO);
    assert!(summary.payments.is_empty());
}

#[tokio::test]
async fn scenario_c_unroutable_product_keeps_order_open() {
    let fx = Fixture::new();
    let order_id = fx.open(None).await;
    fx.add(order_id, fx.grill, "1").await;
    fx.add(order_id, fx.orphan, "1").await;

    let err = fx.orders.send_to_kitchen(order_id, waiter()).await.unwrap_err();
    match err {
        DispatchError::Domain(DomainError::UnroutableItem(products)) => {
            assert!(products.contains(&fx.orphan.to_string()));
        }
        other => panic!("expected UnroutableItem, got {other:?}"),
    }

    let order = fx.orders.get_order(order_id).await.unwrap();
    assert_eq!(order.status(), OrderStatus::Open);
    assert!(fx.kitchen.pending_by_station_type(StationType::Kitchen).is_empty());
}

#[tokio::test]
async fn scenario_d_station_marks_only_its_own_items() {
    let fx = Fixture::new();
    let order_id = fx.open(None).await;
    let burger = fx.add(order_id, fx.grill, "1").await;
    let beer = fx.add(order_id, fx.beer, "1").await;
    fx.orders.send_to_kitchen(order_id, waiter()).await.unwrap();

    assert_eq!(fx.kitchen.pending_by_station_type(StationType::Bar).len(), 1);
    assert_eq!(fx.kitchen.pending_by_station_type(StationType::Kitchen).len(), 1);

    let order = fx
        .kitchen
        .mark_items_ready_for_station(order_id, StationType::Kitchen)
        .await
        .unwrap();

    assert_eq!(order.item(burger).unwrap().kitchen_status, KitchenStatus::Ready);
    assert_eq!(order.item(beer).unwrap().kitchen_status, KitchenStatus::Pending);
    assert_eq!(order.status(), OrderStatus::SentToKitchen);

    assert!(fx.kitchen.pending_by_station_type(StationType::Kitchen).is_empty());
    let bar = fx.kitchen.pending_by_station_type(StationType::Bar);
    assert_eq!(bar.len(), 1);
    assert_eq!(bar[0].item_id, beer);
}

#[tokio::test]
async fn pending_view_lists_oldest_orders_first() {
    let fx = Fixture::new();
    let first = fx.open(None).await;
    let second = fx.open(None).await;
    for id in [second, first] {
        fx.add(id, fx.grill, "1").await;
        fx.orders.send_to_kitchen(id, waiter()).await.unwrap();
    }

    let pending = fx.kitchen.pending_by_station_type(StationType::Kitchen);
    let order_ids: Vec<_> = pending.iter().map(|p| p.order_id).collect();
    assert_eq!(order_ids, vec![first, second]);
}

#[tokio::test]
async fn marking_a_station_type_without_stations_is_not_found() {
    let fx = Fixture::new();
    let order_id = fx.open(None).await;
    fx.add(order_id, fx.grill, "1").await;
    fx.orders.send_to_kitchen(order_id, waiter()).await.unwrap();

    let err = fx
        .kitchen
        .mark_items_ready_for_station(order_id, StationType::Other)
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Domain(DomainError::NotFound(_))));
}

#[tokio::test]
async fn marking_the_same_item_twice_is_idempotent() {
    let fx = Fixture::new();
    let order_id = fx.open(None).await;
    let burger = fx.add(order_id, fx.grill, "1").await;
    fx.add(order_id, fx.beer, "1").await;
    fx.orders.send_to_kitchen(order_id, waiter()).await.unwrap();

    let once = fx.kitchen.mark_specific_item_ready(order_id, burger).await.unwrap();
    let twice = fx.kitchen.mark_specific_item_ready(order_id, burger).await.unwrap();

    assert_eq!(once.version(), twice.version());
    assert_eq!(once.items(), twice.items());
}

#[tokio::test]
async fn supervisor_override_marks_every_station_ready() {
    let fx = Fixture::new();
    let order_id = fx.open(None).await;
    fx.add(order_id, fx.grill, "1").await;
    fx.add(order_id, fx.beer, "1").await;
    fx.orders.send_to_kitchen(order_id, waiter()).await.unwrap();

    let order = fx.kitchen.mark_order_ready(order_id, supervisor()).await.unwrap();

    assert_eq!(order.status(), OrderStatus::Served);
    assert!(fx.notifications.event_types().contains(&"order.marked_ready".to_string()));
}

#[tokio::test]
async fn removing_the_last_item_closes_the_order_and_frees_the_table() {
    let fx = Fixture::new();
    let order_id = fx.open(Some(fx.table)).await;
    let item = fx.add(order_id, fx.salad, "1").await;

    let outcome = fx.orders.remove_item(order_id, item).await.unwrap();

    assert!(matches!(outcome, ItemOutcome::OrderClosed { order_id: id } if id == order_id));
    assert_eq!(fx.table_status(), TableStatus::Available);
    assert!(fx.orders.active_orders().is_empty());
}

#[tokio::test]
async fn quantity_to_zero_behaves_as_removal() {
    let fx = Fixture::new();
    let order_id = fx.open(None).await;
    let burger = fx.add(order_id, fx.grill, "2").await;
    fx.add(order_id, fx.salad, "1").await;

    let outcome = fx.orders.update_item_quantity(order_id, burger, Decimal::ZERO).await.unwrap();

    let ItemOutcome::Updated(order) = outcome else {
        panic!("order should stay open with one live item");
    };
    assert_eq!(order.live_items().count(), 1);
    assert_eq!(order.total_amount(), dec("10.00"));
}

#[tokio::test]
async fn update_item_changes_notes_and_cancels_by_product() {
    let fx = Fixture::new();
    let order_id = fx.open(None).await;
    fx.add(order_id, fx.grill, "1").await;
    fx.add(order_id, fx.salad, "1").await;

    let outcome = fx
        .orders
        .update_item(
            order_id,
            UpdateItemRequest {
                product_id: fx.grill,
                quantity: dec("3"),
                notes: Some("no onions".into()),
                status: None,
            },
        )
        .await
        .unwrap();
    let ItemOutcome::Updated(order) = outcome else {
        panic!("expected an updated order");
    };
    assert_eq!(order.total_amount(), dec("25.00"));

    let outcome = fx
        .orders
        .update_item(
            order_id,
            UpdateItemRequest {
                product_id: fx.salad,
                quantity: dec("1"),
                notes: None,
                status: Some(ItemStatus::Cancelled),
            },
        )
        .await
        .unwrap();
    let ItemOutcome::Updated(order) = outcome else {
        panic!("expected an updated order");
    };
    assert_eq!(order.total_amount(), dec("15.00"));
}

#[tokio::test]
async fn cancelling_after_preparation_needs_a_supervisor() {
    let fx = Fixture::new();
    let order_id = fx.open(Some(fx.table)).await;
    fx.add(order_id, fx.grill, "1").await;
    fx.orders.send_to_kitchen(order_id, waiter()).await.unwrap();
    fx.kitchen
        .mark_items_ready_for_station(order_id, StationType::Kitchen)
        .await
        .unwrap();

    let err = fx
        .orders
        .cancel_order(order_id, "guest left".into(), waiter(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Domain(DomainError::SupervisorApprovalRequired(_))));

    let order = fx
        .orders
        .cancel_order(order_id, "guest left".into(), waiter(), Some(supervisor()))
        .await
        .unwrap();
    assert_eq!(order.status(), OrderStatus::Cancelled);
    assert_eq!(fx.table_status(), TableStatus::Available);
}

#[tokio::test]
async fn table_stays_occupied_while_another_order_uses_it() {
    let fx = Fixture::new();
    let first = fx.open(Some(fx.table)).await;
    let _second = fx.open(Some(fx.table)).await;

    fx.orders
        .cancel_order(first, "duplicate".into(), waiter(), None)
        .await
        .unwrap();

    assert_eq!(fx.table_status(), TableStatus::Occupied);
}

#[tokio::test]
async fn unknown_table_or_product_is_not_found() {
    let fx = Fixture::new();
    let err = fx
        .orders
        .create_order(CreateOrderRequest {
            table_id: Some(TableId::new()),
            customer_id: None,
            opened_by: waiter(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Domain(DomainError::NotFound(_))));

    let order_id = fx.open(None).await;
    let err = fx
        .orders
        .add_item(order_id, ProductId::new(), dec("1"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Domain(DomainError::NotFound(_))));

    let err = fx.orders.get_order(OrderId::generate()).await.unwrap_err();
    assert!(matches!(err, DispatchError::Domain(DomainError::NotFound(_))));
}

#[tokio::test]
async fn order_numbers_come_from_the_sequence() {
    let fx = Fixture::new();
    let a = fx.open(None).await;
    let b = fx.open(None).await;

    assert_eq!(fx.orders.get_order(a).await.unwrap().order_number(), 1);
    assert_eq!(fx.orders.get_order(b).await.unwrap().order_number(), 2);
}

#[tokio::test]
async fn voiding_restores_balance_without_touching_status() {
    let fx = Fixture::new();
    let order_id = fx.open(None).await;
    fx.add(order_id, fx.salad, "1").await;
    fx.orders.send_to_kitchen(order_id, waiter()).await.unwrap();
    fx.kitchen.mark_order_ready(order_id, supervisor()).await.unwrap();
    fx.payments.request_bill(order_id).await.unwrap();

    let receipt = fx.payments.record_payment(order_id, Fixture::payment("10")).await.unwrap();
    assert_eq!(receipt.order_status, OrderStatus::Completed);

    let summary = fx
        .payments
        .void_payment(receipt.payment.payment_id, Some("card declined".into()))
        .await
        .unwrap();
    assert_eq!(summary.order_status, OrderStatus::Completed);
    assert_eq!(summary.paid, Decimal::ZERO);
    assert_eq!(summary.remaining, dec("10.00"));
    assert!(summary.payments[0].voided);

    let again = fx
        .payments
        .void_payment(receipt.payment.payment_id, None)
        .await
        .unwrap();
    assert_eq!(again, summary);
}

#[tokio::test]
async fn voiding_an_unknown_payment_is_not_found() {
    let fx = Fixture::new();
    let err = fx
        .payments
        .void_payment(brigade_orders::PaymentId::new(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Domain(DomainError::NotFound(_))));
}

#[tokio::test]
async fn partial_payment_reopens_a_requested_bill() {
    let fx = Fixture::new();
    let order_id = fx.open(None).await;
    fx.add(order_id, fx.salad, "2").await;
    fx.orders.send_to_kitchen(order_id, waiter()).await.unwrap();
    fx.kitchen
        .mark_items_ready_for_station(order_id, StationType::Kitchen)
        .await
        .unwrap();
    let bill = fx.payments.request_bill(order_id).await.unwrap();
    assert_eq!(bill.order_status, OrderStatus::ReadyToPay);

    let receipt = fx.payments.record_payment(order_id, Fixture::payment("5")).await.unwrap();
    assert_eq!(receipt.order_status, OrderStatus::Served);

    let err = fx
        .payments
        .record_payment(order_id, Fixture::payment("15.02"))
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Domain(DomainError::Overpayment { .. })));
}

#[tokio::test]
async fn every_committed_event_is_notified_once() {
    let fx = Fixture::new();
    let order_id = fx.open(None).await;
    fx.add(order_id, fx.grill, "1").await;
    fx.orders.send_to_kitchen(order_id, waiter()).await.unwrap();

    let stored = fx.store.load_stream(order_id.0).await.unwrap();
    let notified: Vec<_> = fx
        .notifications
        .recorded()
        .into_iter()
        .filter(|n| n.event_type.starts_with("order."))
        .collect();

    assert_eq!(notified.len(), stored.len());
    for (n, s) in notified.iter().zip(&stored) {
        assert_eq!(n.event_type, s.event_type);
        assert_eq!(n.payload["sequence_number"], s.sequence_number);
    }
}

struct UnreachableSink;

impl NotificationSink for UnreachableSink {
    fn emit(&self, _event_type: &str, _payload: serde_json::Value) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("broker offline".into()))
    }
}

#[tokio::test]
async fn failed_notifications_never_undo_committed_state() {
    let fx = Fixture::with_parts(
        Arc::new(InMemoryEventStore::new()),
        Arc::new(UnreachableSink),
        Arc::new(RecordingNotificationSink::new()),
    );
    let order_id = fx.open(Some(fx.table)).await;
    assert_eq!(fx.table_status(), TableStatus::Occupied);

    fx.add(order_id, fx.grill, "2").await;
    fx.orders.send_to_kitchen(order_id, waiter()).await.unwrap();
    fx.kitchen
        .mark_items_ready_for_station(order_id, StationType::Kitchen)
        .await
        .unwrap();
    let receipt = fx.payments.record_payment(order_id, Fixture::payment("10.00")).await.unwrap();
    assert!(receipt.fully_paid);
    assert_eq!(receipt.order_status, OrderStatus::Completed);

    let stream = fx.store.load_stream(order_id.0).await.unwrap();
    let order = fx.orders.get_order(order_id).await.unwrap();
    assert_eq!(stream.len() as u64, order.version());
    assert_eq!(stream.last().unwrap().event_type, "order.completed");
    assert_eq!(order.status(), OrderStatus::Completed);
    assert_eq!(fx.table_status(), TableStatus::Available);
    assert!(fx.notifications.recorded().is_empty());
}

#[tokio::test]
async fn undecodable_committed_payload_leaves_the_table_alone() {
    let fx = Fixture::new();
    let order_id = fx.open(Some(fx.table)).await;
    let order = fx.orders.get_order(order_id).await.unwrap();
    fx.notifications.clear();

    let bogus = StoredEvent {
        event_id: Uuid::now_v7(),
        aggregate_id: order_id.0,
        aggregate_type: ORDER_AGGREGATE_TYPE.to_string(),
        sequence_number: order.version() + 1,
        event_type: "order.unknown".into(),
        event_version: 1,
        occurred_at: Utc::now(),
        payload: serde_json::json!({ "type": "order_unknown" }),
    };
    fx.core.after_commit(&order, &[bogus]);

    assert_eq!(fx.table_status(), TableStatus::Occupied);
    assert!(fx.notifications.recorded().is_empty());
    assert_eq!(fx.orders.active_orders().len(), 1);
}

#[tokio::test]
async fn board_rebuild_matches_live_snapshots() {
    let fx = Fixture::new();
    let order_id = fx.open(None).await;
    fx.add(order_id, fx.grill, "2").await;
    fx.orders.send_to_kitchen(order_id, waiter()).await.unwrap();

    let core = OrderCore::new(
        fx.store.clone(),
        Arc::new(RecordingNotificationSink::new()),
        fx.catalog.clone(),
        fx.catalog.clone(),
        Arc::new(InMemorySequence::new()),
    );
    let replayed = core.rebuild_board().await.unwrap();

    assert_eq!(replayed, 3);
    let rebuilt = core.board().get(&order_id).unwrap();
    let live = fx.orders.get_order(order_id).await.unwrap();
    assert_eq!(rebuilt.version(), live.version());
    assert_eq!(rebuilt.items(), live.items());
    assert_eq!(rebuilt.status(), live.status());
}

/// Store that commits a competing waiter's item right before the first append
/// it sees, so that append hits a version conflict.
struct CompetingWaiterStore {
    inner: InMemoryEventStore,
    competitor: Mutex<Option<ItemAdded>>,
}

#[async_trait]
impl EventStore for CompetingWaiterStore {
    async fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let competing = if events
            .first()
            .is_some_and(|e| e.event_type == "order.item_added")
        {
            self.competitor.lock().unwrap().take()
        } else {
            None
        };

        if let Some(mut added) = competing {
            let aggregate_id = events[0].aggregate_id;
            added.order_id = OrderId::new(aggregate_id);
            let current = self.inner.load_stream(aggregate_id).await?.len() as u64;
            let event = UncommittedEvent::from_typed(
                aggregate_id,
                ORDER_AGGREGATE_TYPE,
                Uuid::now_v7(),
                &OrderEvent::ItemAdded(added),
            )?;
            self.inner.append(vec![event], ExpectedVersion::Exact(current)).await?;
        }

        self.inner.append(events, expected_version).await
    }

    async fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.inner.load_stream(aggregate_id).await
    }

    async fn load_all(&self, aggregate_type: &str) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.inner.load_all(aggregate_type).await
    }
}

#[tokio::test]
async fn concurrent_waiters_never_lose_an_item() {
    let store = Arc::new(CompetingWaiterStore {
        inner: InMemoryEventStore::new(),
        competitor: Mutex::new(None),
    });
    let fx = Fixture::with_store(store.clone());
    let order_id = fx.open(None).await;

    *store.competitor.lock().unwrap() = Some(ItemAdded {
        order_id,
        item_id: OrderItemId::new(),
        product_id: fx.beer,
        product_name: "Beer".into(),
        quantity: dec("1"),
        unit_price: dec("4.50"),
        notes: None,
        route: fx.catalog.resolve_station(fx.beer),
        occurred_at: Utc::now(),
    });

    let order = fx.orders.add_item(order_id, fx.salad, dec("1"), None).await.unwrap();

    assert_eq!(order.live_items().count(), 2);
    assert_eq!(order.total_amount(), dec("14.50"));
    assert_eq!(fx.orders.get_order(order_id).await.unwrap().total_amount(), dec("14.50"));
    assert_eq!(fx.orders.active_orders()[0].total_amount(), dec("14.50"));
}

#[tokio::test]
async fn conflicts_surface_once_retries_are_exhausted() {
    struct AlwaysConflicting(InMemoryEventStore);

    #[async_trait]
    impl EventStore for AlwaysConflicting {
        async fn append(
            &self,
            events: Vec<UncommittedEvent>,
            expected_version: ExpectedVersion,
        ) -> Result<Vec<StoredEvent>, EventStoreError> {
            if events.first().is_some_and(|e| e.event_type == "order.created") {
                return self.0.append(events, expected_version).await;
            }
            Err(EventStoreError::Concurrency("simulated competing writer".into()))
        }

        async fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, EventStoreError> {
            self.0.load_stream(aggregate_id).await
        }

        async fn load_all(&self, aggregate_type: &str) -> Result<Vec<StoredEvent>, EventStoreError> {
            self.0.load_all(aggregate_type).await
        }
    }

    let fx = Fixture::with_store(Arc::new(AlwaysConflicting(InMemoryEventStore::new())));
    let order_id = fx.open(None).await;

    let err = fx.orders.add_item(order_id, fx.grill, dec("1"), None).await.unwrap_err();

    assert!(err.is_concurrency());
    let order = fx.orders.get_order(order_id).await.unwrap();
    assert!(order.items().is_empty());
}
