//! Station-facing operations: pending views and readiness.

use chrono::Utc;

use brigade_catalog::StationType;
use brigade_core::{DomainError, UserId};
use brigade_orders::{
    MarkItemsReadyForStation, MarkOrderReady, MarkSpecificItemReady, Order, OrderCommand, OrderId,
    OrderItemId, PendingItemView,
};

use super::OrderCore;
use crate::command_dispatcher::DispatchError;

#[derive(Debug, Clone)]
pub struct KitchenDispatcher {
    core: OrderCore,
}

impl KitchenDispatcher {
    pub fn new(core: OrderCore) -> Self {
        Self { core }
    }

    /// Dispatched items still pending at stations of `station_type`, oldest
    /// order first. A snapshot per call.
    pub fn pending_by_station_type(&self, station_type: StationType) -> Vec<PendingItemView> {
        self.core.board().pending_for_station(station_type)
    }

    /// Mark ready the pending items of one order routed to `station_type`.
    /// Items routed to other stations are untouched.
    #[tracing::instrument(skip_all, fields(%order_id, %station_type))]
    pub async fn mark_items_ready_for_station(
        &self,
        order_id: OrderId,
        station_type: StationType,
    ) -> Result<Order, DispatchError> {
        if self.core.catalog().stations_of_type(station_type).is_empty() {
            return Err(DomainError::not_found(format!("station of type {station_type}")).into());
        }

        self.core
            .execute(order_id, move |_| {
                Ok(OrderCommand::MarkItemsReadyForStation(MarkItemsReadyForStation {
                    order_id,
                    station_type,
                    occurred_at: Utc::now(),
                }))
            })
            .await
    }

    #[tracing::instrument(skip_all, fields(%order_id, %item_id))]
    pub async fn mark_specific_item_ready(
        &self,
        order_id: OrderId,
        item_id: OrderItemId,
    ) -> Result<Order, DispatchError> {
        self.core
            .execute(order_id, move |_| {
                Ok(OrderCommand::MarkSpecificItemReady(MarkSpecificItemReady {
                    order_id,
                    item_id,
                    occurred_at: Utc::now(),
                }))
            })
            .await
    }

    /// Supervisory override: every pending item becomes ready regardless of station.
    #[tracing::instrument(skip_all, fields(%order_id, %acting_user))]
    pub async fn mark_order_ready(&self, order_id: OrderId, acting_user: UserId) -> Result<Order, DispatchError> {
        let order = self
            .core
            .execute(order_id, move |_| {
                Ok(OrderCommand::MarkOrderReady(MarkOrderReady {
                    order_id,
                    acting_user,
                    occurred_at: Utc::now(),
                }))
            })
            .await?;

        tracing::info!(%order_id, %acting_user, "order marked ready by override");
        Ok(order)
    }
}
