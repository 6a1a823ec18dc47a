use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use brigade_catalog::{ProductId, TableId};
use brigade_core::{AggregateRoot, UserId};
use brigade_infra::services::{ItemOutcome, SplitRequest};
use brigade_orders::{
    Cancellation, CustomerId, ItemStatus, Order, OrderId, OrderItem, OrderStatus, Payment,
    PaymentMethod,
};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub table_id: Option<TableId>,
    pub customer_id: Option<CustomerId>,
    pub opened_by: UserId,
}

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: ProductId,
    pub quantity: Decimal,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub product_id: ProductId,
    pub quantity: Decimal,
    pub notes: Option<String>,
    pub status: Option<ItemStatus>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct ApplyDiscountRequest {
    pub discount: Decimal,
}

/// Body of the send/ready actions that record who acted.
#[derive(Debug, Deserialize)]
pub struct ActingUserRequest {
    pub acting_user: UserId,
}

#[derive(Debug, Deserialize)]
pub struct CancelOrderRequest {
    pub reason: String,
    pub acting_user: UserId,
    pub supervisor_id: Option<UserId>,
}

#[derive(Debug, Deserialize)]
pub struct SplitRequestBody {
    pub payer_name: String,
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct RecordPaymentRequest {
    pub amount: Decimal,
    pub method: PaymentMethod,
    #[serde(default)]
    pub splits: Vec<SplitRequestBody>,
    pub received_by: Option<UserId>,
}

impl From<RecordPaymentRequest> for brigade_infra::services::RecordPaymentRequest {
    fn from(body: RecordPaymentRequest) -> Self {
        Self {
            amount: body.amount,
            method: body.method,
            splits: body
                .splits
                .into_iter()
                .map(|s| SplitRequest {
                    payer_name: s.payer_name,
                    amount: s.amount,
                })
                .collect(),
            received_by: body.received_by,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct VoidPaymentRequest {
    pub reason: Option<String>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: OrderId,
    pub order_number: u64,
    pub table_id: Option<TableId>,
    pub customer_id: Option<CustomerId>,
    pub status: OrderStatus,
    pub total: Decimal,
    pub paid: Decimal,
    pub remaining: Decimal,
    pub items: Vec<OrderItem>,
    pub payments: Vec<Payment>,
    pub cancellation: Option<Cancellation>,
    pub opened_by: Option<UserId>,
    pub opened_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub version: u64,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id_typed(),
            order_number: order.order_number(),
            table_id: order.table_id(),
            customer_id: order.customer_id(),
            status: order.status(),
            total: order.total_amount(),
            paid: order.paid_amount(),
            remaining: order.remaining_balance(),
            items: order.items().to_vec(),
            payments: order.payments().to_vec(),
            cancellation: order.cancellation().cloned(),
            opened_by: order.opened_by(),
            opened_at: order.opened_at(),
            closed_at: order.closed_at(),
            version: order.version(),
        }
    }
}

/// Item mutations answer either the updated order or the closed-order outcome.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ItemOutcomeResponse {
    Updated(OrderResponse),
    Closed { outcome: &'static str, order_id: OrderId },
}

impl From<ItemOutcome> for ItemOutcomeResponse {
    fn from(outcome: ItemOutcome) -> Self {
        match outcome {
            ItemOutcome::Updated(order) => ItemOutcomeResponse::Updated(OrderResponse::from(&order)),
            ItemOutcome::OrderClosed { order_id } => ItemOutcomeResponse::Closed {
                outcome: "order_closed",
                order_id,
            },
        }
    }
}
