use serde_json::Value as JsonValue;
use thiserror::Error;

use brigade_catalog::{StationType, TableId};
use brigade_core::{Aggregate, AggregateRoot};
use brigade_events::EventEnvelope;
use brigade_orders::{
    ORDER_AGGREGATE_TYPE, Order, OrderEvent, OrderId, PaymentId, PendingItemView,
    pending_items_for_station,
};

use crate::event_store::StoredEvent;
use crate::read_model::{InMemoryReadStore, ReadStore};

#[derive(Debug, Error)]
pub enum OrderBoardError {
    #[error("failed to deserialize order event: {0}")]
    Deserialize(String),
    #[error("event does not belong to this stream: {0}")]
    StreamMismatch(String),
    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Latest snapshot of every order, for cross-order queries (station queues,
/// active board, payment lookup, table occupancy).
///
/// The cursor of each order is its snapshot version, which equals the sequence
/// number of the last applied event.
#[derive(Debug)]
pub struct OrderBoardProjection<S = InMemoryReadStore<OrderId, Order>>
where
    S: ReadStore<OrderId, Order>,
{
    store: S,
}

impl OrderBoardProjection {
    pub fn in_memory() -> Self {
        Self::new(InMemoryReadStore::new())
    }
}

impl Default for OrderBoardProjection {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl<S> OrderBoardProjection<S>
where
    S: ReadStore<OrderId, Order>,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn get(&self, order_id: &OrderId) -> Option<Order> {
        self.store.get(order_id)
    }

    pub fn list(&self) -> Vec<Order> {
        self.store.list()
    }

    /// Non-terminal orders, oldest first.
    pub fn active_orders(&self) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .store
            .list()
            .into_iter()
            .filter(|o| o.is_created() && !o.status().is_terminal())
            .collect();
        orders.sort_by_key(|o| (o.opened_at(), o.order_number()));
        orders
    }

    pub fn pending_for_station(&self, station_type: StationType) -> Vec<PendingItemView> {
        let orders = self.store.list();
        pending_items_for_station(orders.iter(), station_type)
    }

    pub fn order_for_payment(&self, payment_id: PaymentId) -> Option<OrderId> {
        self.store
            .list()
            .into_iter()
            .find(|o| o.payment(payment_id).is_some())
            .map(|o| o.id_typed())
    }

    /// Active orders bound to `table_id`.
    pub fn active_orders_for_table(&self, table_id: TableId) -> Vec<OrderId> {
        self.active_orders()
            .into_iter()
            .filter(|o| o.table_id() == Some(table_id))
            .map(|o| o.id_typed())
            .collect()
    }

    /// Store a snapshot produced by a commit, unless a newer one is already present.
    pub fn record_snapshot(&self, order: &Order) {
        let order_id = order.id_typed();
        self.store.upsert_with(order_id, &|current| match current {
            Some(existing) if existing.version() >= order.version() => None,
            _ => Some(order.clone()),
        });
    }

    /// Apply one committed event. Duplicates are skipped; gaps are rejected.
    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), OrderBoardError> {
        if envelope.aggregate_type() != ORDER_AGGREGATE_TYPE {
            return Ok(());
        }

        let order_id = OrderId::new(envelope.aggregate_id());
        let seq = envelope.sequence_number();
        let mut order = self
            .store
            .get(&order_id)
            .unwrap_or_else(|| Order::empty(order_id));

        let last = order.version();
        if seq == 0 {
            return Err(OrderBoardError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            return Ok(());
        }
        if seq != last + 1 {
            return Err(OrderBoardError::NonMonotonicSequence { last, found: seq });
        }

        let ev: OrderEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| OrderBoardError::Deserialize(e.to_string()))?;

        if let OrderEvent::OrderOpened(opened) = &ev {
            if opened.order_id != order_id {
                return Err(OrderBoardError::StreamMismatch(
                    "event order_id does not match envelope aggregate_id".to_string(),
                ));
            }
        }

        order.apply(&ev);
        self.record_snapshot(&order);
        Ok(())
    }

    /// Drop everything and replay `events` (each stream in sequence order).
    pub fn rebuild_from_scratch(&self, events: &[StoredEvent]) -> Result<(), OrderBoardError> {
        self.store.clear();
        for stored in events {
            self.apply_envelope(&stored.to_envelope())?;
        }
        Ok(())
    }
}
