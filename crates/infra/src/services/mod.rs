//! Application services driving the Order aggregate.
//!
//! Every mutation runs through the dispatcher with bounded conflict retry. The
//! services do the lookups the aggregate must not do (catalog prices, station
//! routes, order numbers) and own the post-commit side effects: read-model
//! update, table occupancy, and summary notifications.

pub mod kitchen;
pub mod orders;
pub mod payments;

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use brigade_catalog::{ProductCatalog, TableId, TableRegistry, TableStatus};
use brigade_core::{DomainError, SequenceGenerator};
use brigade_events::NotificationSink;
use brigade_orders::{
    EMPTIED_REASON, ORDER_AGGREGATE_TYPE, Order, OrderCommand, OrderEvent, OrderId, OrderStatus,
};

use crate::command_dispatcher::{CommandDispatcher, DispatchError, Executed};
use crate::event_store::{EventStore, StoredEvent};
use crate::projections::OrderBoardProjection;

pub use kitchen::KitchenDispatcher;
pub use orders::{CreateOrderRequest, ItemOutcome, OrderService, UpdateItemRequest};
pub use payments::{PaymentReconciler, RecordPaymentRequest, SplitRequest};

/// Dispatcher over type-erased collaborators.
pub type OrderDispatcher = CommandDispatcher<Arc<dyn EventStore>, Arc<dyn NotificationSink>>;

/// Default number of extra attempts after a version conflict.
pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 3;

/// Collaborators shared by the order, kitchen and payment services.
#[derive(Clone)]
pub struct OrderCore {
    dispatcher: Arc<OrderDispatcher>,
    board: Arc<OrderBoardProjection>,
    catalog: Arc<dyn ProductCatalog>,
    tables: Arc<dyn TableRegistry>,
    sequence: Arc<dyn SequenceGenerator>,
    notifier: Arc<dyn NotificationSink>,
    max_retries: u32,
}

impl core::fmt::Debug for OrderCore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OrderCore")
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl OrderCore {
    pub fn new(
        store: Arc<dyn EventStore>,
        notifier: Arc<dyn NotificationSink>,
        catalog: Arc<dyn ProductCatalog>,
        tables: Arc<dyn TableRegistry>,
        sequence: Arc<dyn SequenceGenerator>,
    ) -> Self {
        Self {
            dispatcher: Arc::new(CommandDispatcher::new(store, notifier.clone())),
            board: Arc::new(OrderBoardProjection::in_memory()),
            catalog,
            tables,
            sequence,
            notifier,
            max_retries: DEFAULT_MAX_CONFLICT_RETRIES,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn board(&self) -> &OrderBoardProjection {
        &self.board
    }

    pub fn catalog(&self) -> &dyn ProductCatalog {
        self.catalog.as_ref()
    }

    pub fn tables(&self) -> &dyn TableRegistry {
        self.tables.as_ref()
    }

    /// Rehydrate an order from its stream; `NotFound` when it was never opened.
    pub async fn load_order(&self, order_id: OrderId) -> Result<Order, DispatchError> {
        let order = self.dispatcher.load(order_id.0, |_| Order::empty(order_id)).await?;
        if !order.is_created() {
            return Err(DomainError::not_found(format!("order {order_id}")).into());
        }
        Ok(order)
    }

    /// Rebuild the order board from the event store.
    pub async fn rebuild_board(&self) -> Result<usize, DispatchError> {
        let events = self.dispatcher.store().load_all(ORDER_AGGREGATE_TYPE).await?;
        self.board
            .rebuild_from_scratch(&events)
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        Ok(events.len())
    }

    /// Run `build` against the freshly loaded order, commit with retry, then
    /// apply post-commit effects.
    pub(crate) async fn execute<B>(&self, order_id: OrderId, build: B) -> Result<Order, DispatchError>
    where
        B: FnMut(&Order) -> Result<OrderCommand, DomainError> + Send,
    {
        let Executed {
            aggregate,
            committed,
        } = self
            .dispatcher
            .execute_with_retry(
                order_id.0,
                ORDER_AGGREGATE_TYPE,
                move |_| Order::empty(order_id),
                build,
                self.max_retries,
            )
            .await?;

        self.after_commit(&aggregate, &committed);
        Ok(aggregate)
    }

    /// Post-commit effects. Failures here are logged and never fail the caller.
    pub(crate) fn after_commit(&self, order: &Order, committed: &[StoredEvent]) {
        if committed.is_empty() {
            return;
        }
        self.board.record_snapshot(order);

        let events: Vec<OrderEvent> = committed
            .iter()
            .filter_map(|stored| match serde_json::from_value(stored.payload.clone()) {
                Ok(event) => Some(event),
                Err(err) => {
                    tracing::warn!(
                        order_id = %order.id_typed(),
                        event_type = %stored.event_type,
                        sequence_number = stored.sequence_number,
                        error = %err,
                        "committed payload is not an order event; skipping table update"
                    );
                    None
                }
            })
            .collect();

        let Some(table_id) = order.table_id() else {
            return;
        };

        if events.iter().any(|e| matches!(e, OrderEvent::OrderOpened(_))) {
            self.set_table(order.id_typed(), table_id, TableStatus::Occupied, "table.occupied");
        }

        let closed = events.iter().any(|e| {
            matches!(
                e,
                OrderEvent::OrderCompleted(_) | OrderEvent::OrderCancelled(_) | OrderEvent::OrderEmptied(_)
            )
        });
        if closed && order.status().is_terminal() {
            let still_used = self
                .board
                .active_orders_for_table(table_id)
                .into_iter()
                .any(|id| id != order.id_typed());
            if still_used {
                tracing::debug!(%table_id, order_id = %order.id_typed(), "table still has active orders");
            } else {
                self.set_table(order.id_typed(), table_id, TableStatus::Available, "table.released");
            }
        }
    }

    fn set_table(&self, order_id: OrderId, table_id: TableId, status: TableStatus, event_type: &str) {
        if let Err(err) = self.tables.set_table_status(table_id, status) {
            tracing::warn!(%order_id, %table_id, error = %err, "failed to update table status");
            return;
        }
        self.emit(
            event_type,
            json!({
                "table_id": table_id,
                "order_id": order_id,
                "status": status,
                "at": Utc::now(),
            }),
        );
    }

    pub(crate) fn emit(&self, event_type: &str, payload: serde_json::Value) {
        if let Err(err) = self.notifier.emit(event_type, payload) {
            tracing::warn!(event_type, error = %err, "failed to emit notification");
        }
    }
}

/// `order closed` outcome detection for item mutations.
pub(crate) fn was_emptied(order: &Order) -> bool {
    order.status() == OrderStatus::Cancelled
        && order.cancellation().is_some_and(|c| c.reason == EMPTIED_REASON)
}
