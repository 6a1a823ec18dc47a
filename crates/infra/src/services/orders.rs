//! Waiter-facing order operations.

use chrono::Utc;
use rust_decimal::Decimal;

use brigade_catalog::{ProductId, TableId};
use brigade_core::{DomainError, UserId};
use brigade_orders::{
    AddItem, ApplyItemDiscount, CancelOrder, CustomerId, ItemRoute, ItemStatus, OpenOrder, Order,
    OrderCommand, OrderId, OrderItemId, RemoveItem, SendToKitchen, UpdateItem, UpdateItemQuantity,
};

use super::{OrderCore, was_emptied};
use crate::command_dispatcher::DispatchError;

/// Scope used for human-facing order numbers.
pub const ORDER_NUMBER_SCOPE: &str = "order";

#[derive(Debug, Clone)]
pub struct CreateOrderRequest {
    pub table_id: Option<TableId>,
    pub customer_id: Option<CustomerId>,
    pub opened_by: UserId,
}

#[derive(Debug, Clone)]
pub struct UpdateItemRequest {
    pub product_id: ProductId,
    pub quantity: Decimal,
    pub notes: Option<String>,
    pub status: Option<ItemStatus>,
}

/// Result of an item mutation. Removing the last live item closes the order,
/// which callers must treat as a deletion rather than an update.
#[derive(Debug, Clone)]
pub enum ItemOutcome {
    Updated(Order),
    OrderClosed { order_id: OrderId },
}

impl ItemOutcome {
    fn from_order(order: Order) -> Self {
        if was_emptied(&order) {
            ItemOutcome::OrderClosed {
                order_id: order.id_typed(),
            }
        } else {
            ItemOutcome::Updated(order)
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrderService {
    core: OrderCore,
}

impl OrderService {
    pub fn new(core: OrderCore) -> Self {
        Self { core }
    }

    #[tracing::instrument(skip_all, fields(opened_by = %req.opened_by))]
    pub async fn create_order(&self, req: CreateOrderRequest) -> Result<Order, DispatchError> {
        if let Some(table_id) = req.table_id {
            if self.core.tables().resolve_table(table_id).is_none() {
                return Err(DomainError::not_found(format!("table {table_id}")).into());
            }
        }

        let order_id = OrderId::generate();
        let order_number = self.core.sequence.next(ORDER_NUMBER_SCOPE);
        let order = self
            .core
            .execute(order_id, move |_| {
                Ok(OrderCommand::OpenOrder(OpenOrder {
                    order_id,
                    order_number,
                    table_id: req.table_id,
                    customer_id: req.customer_id,
                    opened_by: req.opened_by,
                    occurred_at: Utc::now(),
                }))
            })
            .await?;

        tracing::info!(%order_id, order_number, "order opened");
        Ok(order)
    }

    pub async fn get_order(&self, order_id: OrderId) -> Result<Order, DispatchError> {
        self.core.load_order(order_id).await
    }

    /// Non-terminal orders from the board, oldest first.
    pub fn active_orders(&self) -> Vec<Order> {
        self.core.board().active_orders()
    }

    #[tracing::instrument(skip_all, fields(%order_id, %product_id))]
    pub async fn add_item(
        &self,
        order_id: OrderId,
        product_id: ProductId,
        quantity: Decimal,
        notes: Option<String>,
    ) -> Result<Order, DispatchError> {
        let product = self
            .core
            .catalog()
            .product(product_id)
            .ok_or_else(|| DomainError::not_found(format!("product {product_id}")))?;
        let route = self.core.catalog().resolve_station(product_id);
        let item_id = OrderItemId::new();

        self.core
            .execute(order_id, move |_| {
                Ok(OrderCommand::AddItem(AddItem {
                    order_id,
                    item_id,
                    product_id,
                    product_name: product.name.clone(),
                    quantity,
                    unit_price: product.price,
                    notes: notes.clone(),
                    route,
                    occurred_at: Utc::now(),
                }))
            })
            .await
    }

    #[tracing::instrument(skip_all, fields(%order_id, %item_id))]
    pub async fn remove_item(&self, order_id: OrderId, item_id: OrderItemId) -> Result<ItemOutcome, DispatchError> {
        let order = self
            .core
            .execute(order_id, move |_| {
                Ok(OrderCommand::RemoveItem(RemoveItem {
                    order_id,
                    item_id,
                    occurred_at: Utc::now(),
                }))
            })
            .await?;
        Ok(ItemOutcome::from_order(order))
    }

    #[tracing::instrument(skip_all, fields(%order_id, %item_id))]
    pub async fn update_item_quantity(
        &self,
        order_id: OrderId,
        item_id: OrderItemId,
        quantity: Decimal,
    ) -> Result<ItemOutcome, DispatchError> {
        let order = self
            .core
            .execute(order_id, move |_| {
                Ok(OrderCommand::UpdateItemQuantity(UpdateItemQuantity {
                    order_id,
                    item_id,
                    quantity,
                    occurred_at: Utc::now(),
                }))
            })
            .await?;
        Ok(ItemOutcome::from_order(order))
    }

    #[tracing::instrument(skip_all, fields(%order_id, product_id = %req.product_id))]
    pub async fn update_item(&self, order_id: OrderId, req: UpdateItemRequest) -> Result<ItemOutcome, DispatchError> {
        let order = self
            .core
            .execute(order_id, move |_| {
                Ok(OrderCommand::UpdateItem(UpdateItem {
                    order_id,
                    product_id: req.product_id,
                    quantity: req.quantity,
                    notes: req.notes.clone(),
                    status: req.status,
                    occurred_at: Utc::now(),
                }))
            })
            .await?;
        Ok(ItemOutcome::from_order(order))
    }

    #[tracing::instrument(skip_all, fields(%order_id, %item_id))]
    pub async fn apply_item_discount(
        &self,
        order_id: OrderId,
        item_id: OrderItemId,
        discount: Decimal,
    ) -> Result<Order, DispatchError> {
        self.core
            .execute(order_id, move |_| {
                Ok(OrderCommand::ApplyItemDiscount(ApplyItemDiscount {
                    order_id,
                    item_id,
                    discount,
                    occurred_at: Utc::now(),
                }))
            })
            .await
    }

    /// Dispatch every live item. Routes are resolved against the catalog from
    /// the freshly loaded order on each attempt.
    #[tracing::instrument(skip_all, fields(%order_id))]
    pub async fn send_to_kitchen(&self, order_id: OrderId, acting_user: UserId) -> Result<Order, DispatchError> {
        let catalog = self.core.catalog.clone();
        self.core
            .execute(order_id, move |order| {
                let routes = order
                    .live_items()
                    .map(|item| ItemRoute {
                        item_id: item.item_id,
                        product_id: item.product_id,
                        route: item.route.or_else(|| catalog.resolve_station(item.product_id)),
                    })
                    .collect();
                Ok(OrderCommand::SendToKitchen(SendToKitchen {
                    order_id,
                    routes,
                    acting_user,
                    occurred_at: Utc::now(),
                }))
            })
            .await
    }

    #[tracing::instrument(skip_all, fields(%order_id, %acting_user))]
    pub async fn cancel_order(
        &self,
        order_id: OrderId,
        reason: String,
        acting_user: UserId,
        supervisor: Option<UserId>,
    ) -> Result<Order, DispatchError> {
        let order = self
            .core
            .execute(order_id, move |_| {
                Ok(OrderCommand::CancelOrder(CancelOrder {
                    order_id,
                    reason: reason.clone(),
                    acting_user,
                    supervisor,
                    occurred_at: Utc::now(),
                }))
            })
            .await?;

        tracing::info!(%order_id, "order cancelled");
        Ok(order)
    }
}
