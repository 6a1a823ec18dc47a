//! Station-scoped kitchen dispatch.
//!
//! A station only ever sees and advances items routed to its own station type.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use brigade_catalog::{ProductId, StationId, StationType, TableId};
use brigade_core::DomainError;

use crate::order::{
    DispatchedItem, ItemReady, KitchenStatus, MarkItemsReadyForStation, MarkOrderReady,
    MarkSpecificItemReady, Order, OrderEvent, OrderId, OrderItemId, OrderMarkedReady,
    OrderSentToKitchen, OrderStatus, PreparedItem, SendToKitchen, StationItemsReady,
};

/// One pending item as shown on a station screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingItemView {
    pub order_id: OrderId,
    pub order_number: u64,
    pub table_id: Option<TableId>,
    pub opened_at: Option<DateTime<Utc>>,
    pub item_id: OrderItemId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: Decimal,
    pub notes: Option<String>,
    pub station_id: StationId,
    pub station_type: StationType,
    pub added_at: DateTime<Utc>,
}

/// Pending items for `station_type` across `orders`, oldest order first.
///
/// Only dispatched items of non-terminal orders are visible.
pub fn pending_items_for_station<'a>(
    orders: impl IntoIterator<Item = &'a Order>,
    station_type: StationType,
) -> Vec<PendingItemView> {
    let mut views: Vec<PendingItemView> = orders
        .into_iter()
        .filter(|o| o.is_created() && !o.status().is_terminal())
        .flat_map(|order| {
            order
                .live_items()
                .filter(move |i| i.kitchen_status == KitchenStatus::Pending)
                .filter_map(move |item| {
                    let route = item.route.filter(|r| r.station_type == station_type)?;
                    Some(PendingItemView {
                        order_id: order.id_typed(),
                        order_number: order.order_number(),
                        table_id: order.table_id(),
                        opened_at: order.opened_at(),
                        item_id: item.item_id,
                        product_id: item.product_id,
                        product_name: item.product_name.clone(),
                        quantity: item.quantity,
                        notes: item.notes.clone(),
                        station_id: route.station_id,
                        station_type: route.station_type,
                        added_at: item.added_at,
                    })
                })
        })
        .collect();

    views.sort_by(|a, b| {
        (a.opened_at, a.order_number, a.added_at).cmp(&(b.opened_at, b.order_number, b.added_at))
    });
    views
}

impl Order {
    /// Pending items of this order routed to `station_type`.
    pub fn pending_for_station(&self, station_type: StationType) -> Vec<PendingItemView> {
        pending_items_for_station(std::iter::once(self), station_type)
    }

    fn ensure_in_kitchen(&self, action: &str) -> Result<(), DomainError> {
        self.ensure_not_terminal(action)?;
        if self.status == OrderStatus::Open {
            return Err(DomainError::invalid_transition(format!(
                "cannot {action}: order has not been sent to the kitchen"
            )));
        }
        Ok(())
    }

    pub(crate) fn handle_send_to_kitchen(
        &self,
        cmd: &SendToKitchen,
    ) -> Result<Vec<OrderEvent>, DomainError> {
        if self.status != OrderStatus::Open {
            return Err(DomainError::invalid_transition(format!(
                "cannot send to kitchen: order is {}",
                self.status
            )));
        }
        if self.live_items().next().is_none() {
            return Err(DomainError::invalid_transition(
                "cannot send an order without items to the kitchen",
            ));
        }

        let mut dispatched = Vec::new();
        let mut unroutable = Vec::new();
        for item in self.live_items() {
            let route = item.route.or_else(|| {
                cmd.routes
                    .iter()
                    .find(|r| r.item_id == item.item_id)
                    .and_then(|r| r.route)
            });
            match route {
                Some(route) => dispatched.push(DispatchedItem {
                    item_id: item.item_id,
                    route,
                }),
                None => unroutable.push(item.product_id.to_string()),
            }
        }

        if !unroutable.is_empty() {
            unroutable.dedup();
            return Err(DomainError::unroutable(unroutable.join(", ")));
        }

        Ok(vec![OrderEvent::OrderSentToKitchen(OrderSentToKitchen {
            order_id: self.id,
            dispatched,
            acting_user: cmd.acting_user,
            occurred_at: cmd.occurred_at,
        })])
    }

    pub(crate) fn handle_mark_station_ready(
        &self,
        cmd: &MarkItemsReadyForStation,
    ) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_in_kitchen("mark station items ready")?;

        let items: Vec<PreparedItem> = self
            .live_items()
            .filter(|i| i.kitchen_status == KitchenStatus::Pending)
            .filter_map(|i| {
                let route = i.route.filter(|r| r.station_type == cmd.station_type)?;
                Some(PreparedItem {
                    item_id: i.item_id,
                    station_id: Some(route.station_id),
                })
            })
            .collect();

        if items.is_empty() {
            return Ok(vec![]);
        }

        let events = vec![OrderEvent::StationItemsReady(StationItemsReady {
            order_id: self.id,
            station_type: cmd.station_type,
            items,
            occurred_at: cmd.occurred_at,
        })];
        self.with_status_transition(events, cmd.occurred_at)
    }

    pub(crate) fn handle_mark_item_ready(
        &self,
        cmd: &MarkSpecificItemReady,
    ) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_in_kitchen("mark items ready")?;

        let item = self.item(cmd.item_id).ok_or_else(|| {
            DomainError::not_found(format!("item {} on order {}", cmd.item_id, self.id))
        })?;

        match item.kitchen_status {
            KitchenStatus::Ready | KitchenStatus::Served => return Ok(vec![]),
            KitchenStatus::Cancelled => {
                return Err(DomainError::invalid_transition(format!(
                    "item {} has been removed",
                    cmd.item_id
                )));
            }
            KitchenStatus::Pending => {}
        }

        let events = vec![OrderEvent::ItemReady(ItemReady {
            order_id: self.id,
            item: PreparedItem {
                item_id: item.item_id,
                station_id: item.route.map(|r| r.station_id),
            },
            occurred_at: cmd.occurred_at,
        })];
        self.with_status_transition(events, cmd.occurred_at)
    }

    pub(crate) fn handle_mark_order_ready(
        &self,
        cmd: &MarkOrderReady,
    ) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_in_kitchen("mark order ready")?;

        let items: Vec<PreparedItem> = self
            .live_items()
            .filter(|i| i.kitchen_status == KitchenStatus::Pending)
            .map(|i| PreparedItem {
                item_id: i.item_id,
                station_id: i.route.map(|r| r.station_id),
            })
            .collect();

        if items.is_empty() {
            return Ok(vec![]);
        }

        let events = vec![OrderEvent::OrderMarkedReady(OrderMarkedReady {
            order_id: self.id,
            items,
            acting_user: cmd.acting_user,
            occurred_at: cmd.occurred_at,
        })];
        self.with_status_transition(events, cmd.occurred_at)
    }
}
