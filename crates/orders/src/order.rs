use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use brigade_catalog::{ProductId, StationId, StationRoute, StationType, TableId};
use brigade_core::{Aggregate, AggregateId, AggregateRoot, DomainError, UserId, impl_uuid_newtype};
use brigade_events::Event;

use crate::payment::{Payment, PaymentMethod, SplitPayment};

/// Aggregate type name used for event streams.
pub const ORDER_AGGREGATE_TYPE: &str = "order";

/// Order identifier (one event stream per order).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub AggregateId);

impl OrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    pub fn generate() -> Self {
        Self(AggregateId::new())
    }
}

impl core::fmt::Display for OrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl core::str::FromStr for OrderId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Item identifier, unique within its order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderItemId(Uuid);

impl_uuid_newtype!(OrderItemId, "OrderItemId");

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(Uuid);

impl_uuid_newtype!(CustomerId, "CustomerId");

/// Order status lifecycle.
///
/// `Open -> SentToKitchen -> Served -> ReadyToPay -> Completed`, with `Cancelled`
/// reachable from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Open,
    SentToKitchen,
    Served,
    ReadyToPay,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// The kitchen has received the order (items are routed to stations).
    pub fn is_dispatched(&self) -> bool {
        matches!(
            self,
            OrderStatus::SentToKitchen | OrderStatus::Served | OrderStatus::ReadyToPay
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Open => "open",
            OrderStatus::SentToKitchen => "sent_to_kitchen",
            OrderStatus::Served => "served",
            OrderStatus::ReadyToPay => "ready_to_pay",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order-level item status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Ready,
    Served,
    Cancelled,
}

impl core::str::FromStr for ItemStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(ItemStatus::Pending),
            "ready" => Ok(ItemStatus::Ready),
            "served" => Ok(ItemStatus::Served),
            "cancelled" | "canceled" => Ok(ItemStatus::Cancelled),
            other => Err(DomainError::validation(format!("unknown item status '{other}'"))),
        }
    }
}

/// Station preparation progress, tracked apart from the item status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KitchenStatus {
    Pending,
    Ready,
    Served,
    Cancelled,
}

impl KitchenStatus {
    pub fn is_prepared(&self) -> bool {
        matches!(self, KitchenStatus::Ready | KitchenStatus::Served)
    }
}

/// Order line. Owned exclusively by its order and never hard-deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub item_id: OrderItemId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: Decimal,
    /// Captured when the item is added; never changes afterwards.
    pub unit_price: Decimal,
    pub discount: Decimal,
    pub notes: Option<String>,
    pub status: ItemStatus,
    pub kitchen_status: KitchenStatus,
    /// Set when the item is dispatched to a station.
    pub route: Option<StationRoute>,
    pub prepared_by: Option<StationId>,
    pub prepared_at: Option<DateTime<Utc>>,
    pub added_at: DateTime<Utc>,
}

impl OrderItem {
    pub fn is_live(&self) -> bool {
        self.status != ItemStatus::Cancelled
    }

    pub fn is_dispatched(&self) -> bool {
        self.route.is_some()
    }

    pub fn station_type(&self) -> Option<StationType> {
        self.route.map(|r| r.station_type)
    }

    pub fn subtotal(&self) -> Decimal {
        self.quantity * self.unit_price
    }

    pub fn line_total(&self) -> Decimal {
        self.subtotal() - self.discount
    }

    fn mark_prepared(&mut self, station_id: Option<StationId>, at: DateTime<Utc>) {
        self.kitchen_status = KitchenStatus::Ready;
        self.status = ItemStatus::Ready;
        self.prepared_by = station_id.or(self.route.map(|r| r.station_id));
        self.prepared_at = Some(at);
    }
}

/// Sum of line totals over live items.
pub fn calculate_total(items: &[OrderItem]) -> Decimal {
    items
        .iter()
        .filter(|i| i.is_live())
        .map(OrderItem::line_total)
        .sum()
}

/// Who closed an order without payment, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancellation {
    pub reason: String,
    pub cancelled_by: Option<UserId>,
    pub supervisor: Option<UserId>,
    pub cancelled_at: DateTime<Utc>,
}

/// Aggregate root: Order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub(crate) id: OrderId,
    pub(crate) order_number: u64,
    pub(crate) table_id: Option<TableId>,
    pub(crate) customer_id: Option<CustomerId>,
    pub(crate) opened_by: Option<UserId>,
    pub(crate) opened_at: Option<DateTime<Utc>>,
    pub(crate) closed_at: Option<DateTime<Utc>>,
    pub(crate) status: OrderStatus,
    pub(crate) items: Vec<OrderItem>,
    pub(crate) payments: Vec<Payment>,
    pub(crate) total_amount: Decimal,
    pub(crate) cancellation: Option<Cancellation>,
    pub(crate) version: u64,
    #[serde(skip)]
    pub(crate) created: bool,
}

impl Order {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: OrderId) -> Self {
        Self {
            id,
            order_number: 0,
            table_id: None,
            customer_id: None,
            opened_by: None,
            opened_at: None,
            closed_at: None,
            status: OrderStatus::Open,
            items: Vec::new(),
            payments: Vec::new(),
            total_amount: Decimal::ZERO,
            cancellation: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn order_number(&self) -> u64 {
        self.order_number
    }

    pub fn table_id(&self) -> Option<TableId> {
        self.table_id
    }

    pub fn customer_id(&self) -> Option<CustomerId> {
        self.customer_id
    }

    pub fn opened_by(&self) -> Option<UserId> {
        self.opened_by
    }

    pub fn opened_at(&self) -> Option<DateTime<Utc>> {
        self.opened_at
    }

    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.closed_at
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn live_items(&self) -> impl Iterator<Item = &OrderItem> {
        self.items.iter().filter(|i| i.is_live())
    }

    pub fn item(&self, item_id: OrderItemId) -> Option<&OrderItem> {
        self.items.iter().find(|i| i.item_id == item_id)
    }

    pub fn payments(&self) -> &[Payment] {
        &self.payments
    }

    pub fn payment(&self, payment_id: crate::PaymentId) -> Option<&Payment> {
        self.payments.iter().find(|p| p.payment_id == payment_id)
    }

    /// Cached total; rewritten by `apply` after every item mutation.
    pub fn total_amount(&self) -> Decimal {
        self.total_amount
    }

    pub fn cancellation(&self) -> Option<&Cancellation> {
        self.cancellation.as_ref()
    }

    /// True when every live item has been prepared (and there is at least one).
    pub fn all_live_items_prepared(&self) -> bool {
        let mut live = self.live_items().peekable();
        live.peek().is_some() && live.all(|i| i.kitchen_status.is_prepared())
    }

    /// Items may be added or changed.
    pub fn is_editable(&self) -> bool {
        matches!(
            self.status,
            OrderStatus::Open | OrderStatus::SentToKitchen | OrderStatus::Served
        )
    }

    fn recompute_total(&mut self) {
        self.total_amount = calculate_total(&self.items);
    }

    fn item_mut(&mut self, item_id: OrderItemId) -> Option<&mut OrderItem> {
        self.items.iter_mut().find(|i| i.item_id == item_id)
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

// --- commands ---------------------------------------------------------------

/// Command: OpenOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenOrder {
    pub order_id: OrderId,
    /// Drawn from the sequence generator by the caller.
    pub order_number: u64,
    pub table_id: Option<TableId>,
    pub customer_id: Option<CustomerId>,
    pub opened_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddItem.
///
/// Carries the product name and unit price captured from the catalog, and the
/// resolved station route (required once the order has been dispatched).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddItem {
    pub order_id: OrderId,
    pub item_id: OrderItemId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub notes: Option<String>,
    pub route: Option<StationRoute>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveItem {
    pub order_id: OrderId,
    pub item_id: OrderItemId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateItemQuantity. A quantity of zero or less removes the item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateItemQuantity {
    pub order_id: OrderId,
    pub item_id: OrderItemId,
    pub quantity: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateItem. Targets the first live item of `product_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateItem {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: Decimal,
    pub notes: Option<String>,
    pub status: Option<ItemStatus>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApplyItemDiscount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyItemDiscount {
    pub order_id: OrderId,
    pub item_id: OrderItemId,
    pub discount: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Station route resolved for one item at dispatch time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRoute {
    pub item_id: OrderItemId,
    pub product_id: ProductId,
    /// `None` when no station resolves for the product.
    pub route: Option<StationRoute>,
}

/// Command: SendToKitchen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendToKitchen {
    pub order_id: OrderId,
    pub routes: Vec<ItemRoute>,
    pub acting_user: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkItemsReadyForStation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkItemsReadyForStation {
    pub order_id: OrderId,
    pub station_type: StationType,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkSpecificItemReady.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkSpecificItemReady {
    pub order_id: OrderId,
    pub item_id: OrderItemId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkOrderReady (supervisory override across all stations).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkOrderReady {
    pub order_id: OrderId,
    pub acting_user: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOrder {
    pub order_id: OrderId,
    pub reason: String,
    pub acting_user: UserId,
    pub supervisor: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RequestBill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestBill {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordPayment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPayment {
    pub order_id: OrderId,
    pub payment_id: crate::PaymentId,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub splits: Vec<SplitPayment>,
    pub received_by: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: VoidPayment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoidPayment {
    pub order_id: OrderId,
    pub payment_id: crate::PaymentId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderCommand {
    OpenOrder(OpenOrder),
    AddItem(AddItem),
    RemoveItem(RemoveItem),
    UpdateItemQuantity(UpdateItemQuantity),
    UpdateItem(UpdateItem),
    ApplyItemDiscount(ApplyItemDiscount),
    SendToKitchen(SendToKitchen),
    MarkItemsReadyForStation(MarkItemsReadyForStation),
    MarkSpecificItemReady(MarkSpecificItemReady),
    MarkOrderReady(MarkOrderReady),
    CancelOrder(CancelOrder),
    RequestBill(RequestBill),
    RecordPayment(RecordPayment),
    VoidPayment(VoidPayment),
}

impl OrderCommand {
    pub fn order_id(&self) -> OrderId {
        match self {
            OrderCommand::OpenOrder(c) => c.order_id,
            OrderCommand::AddItem(c) => c.order_id,
            OrderCommand::RemoveItem(c) => c.order_id,
            OrderCommand::UpdateItemQuantity(c) => c.order_id,
            OrderCommand::UpdateItem(c) => c.order_id,
            OrderCommand::ApplyItemDiscount(c) => c.order_id,
            OrderCommand::SendToKitchen(c) => c.order_id,
            OrderCommand::MarkItemsReadyForStation(c) => c.order_id,
            OrderCommand::MarkSpecificItemReady(c) => c.order_id,
            OrderCommand::MarkOrderReady(c) => c.order_id,
            OrderCommand::CancelOrder(c) => c.order_id,
            OrderCommand::RequestBill(c) => c.order_id,
            OrderCommand::RecordPayment(c) => c.order_id,
            OrderCommand::VoidPayment(c) => c.order_id,
        }
    }
}

// --- events -----------------------------------------------------------------

/// Event: OrderOpened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderOpened {
    pub order_id: OrderId,
    pub order_number: u64,
    pub table_id: Option<TableId>,
    pub customer_id: Option<CustomerId>,
    pub opened_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAdded {
    pub order_id: OrderId,
    pub item_id: OrderItemId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub notes: Option<String>,
    pub route: Option<StationRoute>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemQuantityChanged. `discount` is the (possibly clamped) discount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemQuantityChanged {
    pub order_id: OrderId,
    pub item_id: OrderItemId,
    pub quantity: Decimal,
    pub discount: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemNotesChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemNotesChanged {
    pub order_id: OrderId,
    pub item_id: OrderItemId,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemDiscountApplied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDiscountApplied {
    pub order_id: OrderId,
    pub item_id: OrderItemId,
    pub discount: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemRemoved (soft removal; the item stays for the kitchen audit trail).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRemoved {
    pub order_id: OrderId,
    pub item_id: OrderItemId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemServed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemServed {
    pub order_id: OrderId,
    pub item_id: OrderItemId,
    pub occurred_at: DateTime<Utc>,
}

/// Station assignment recorded at dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchedItem {
    pub item_id: OrderItemId,
    pub route: StationRoute,
}

/// Event: OrderSentToKitchen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSentToKitchen {
    pub order_id: OrderId,
    pub dispatched: Vec<DispatchedItem>,
    pub acting_user: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// An item that reached `Ready`, and the station that prepared it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedItem {
    pub item_id: OrderItemId,
    pub station_id: Option<StationId>,
}

/// Event: StationItemsReady (one station type finished its batch).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationItemsReady {
    pub order_id: OrderId,
    pub station_type: StationType,
    pub items: Vec<PreparedItem>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemReady (single item).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemReady {
    pub order_id: OrderId,
    pub item: PreparedItem,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderMarkedReady (supervisory override).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderMarkedReady {
    pub order_id: OrderId,
    pub items: Vec<PreparedItem>,
    pub acting_user: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderServed (every live item prepared).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderServed {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderReturnedToKitchen (a pending item appeared on a served order).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderReturnedToKitchen {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BillRequested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillRequested {
    pub order_id: OrderId,
    pub total: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BillReopened (partial payment on an order awaiting payment).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillReopened {
    pub order_id: OrderId,
    pub remaining: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecorded {
    pub order_id: OrderId,
    pub payment: Payment,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderCompleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCompleted {
    pub order_id: OrderId,
    pub total: Decimal,
    pub paid: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentVoided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentVoided {
    pub order_id: OrderId,
    pub payment_id: crate::PaymentId,
    pub amount: Decimal,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancelled {
    pub order_id: OrderId,
    pub reason: String,
    pub acting_user: UserId,
    pub supervisor: Option<UserId>,
    pub cancelled_items: Vec<OrderItemId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderEmptied (the last live item was removed; the order is closed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEmptied {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Reason recorded on orders closed by removing their last item.
pub const EMPTIED_REASON: &str = "emptied";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    OrderOpened(OrderOpened),
    ItemAdded(ItemAdded),
    ItemQuantityChanged(ItemQuantityChanged),
    ItemNotesChanged(ItemNotesChanged),
    ItemDiscountApplied(ItemDiscountApplied),
    ItemRemoved(ItemRemoved),
    ItemServed(ItemServed),
    OrderSentToKitchen(OrderSentToKitchen),
    StationItemsReady(StationItemsReady),
    ItemReady(ItemReady),
    OrderMarkedReady(OrderMarkedReady),
    OrderServed(OrderServed),
    OrderReturnedToKitchen(OrderReturnedToKitchen),
    BillRequested(BillRequested),
    BillReopened(BillReopened),
    PaymentRecorded(PaymentRecorded),
    OrderCompleted(OrderCompleted),
    PaymentVoided(PaymentVoided),
    OrderCancelled(OrderCancelled),
    OrderEmptied(OrderEmptied),
}

impl Event for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderOpened(_) => "order.created",
            OrderEvent::ItemAdded(_) => "order.item_added",
            OrderEvent::ItemQuantityChanged(_) => "order.item_quantity_changed",
            OrderEvent::ItemNotesChanged(_) => "order.item_notes_changed",
            OrderEvent::ItemDiscountApplied(_) => "order.item_discount_applied",
            OrderEvent::ItemRemoved(_) => "order.item_removed",
            OrderEvent::ItemServed(_) => "order.item_served",
            OrderEvent::OrderSentToKitchen(_) => "order.sent_to_kitchen",
            OrderEvent::StationItemsReady(_) => "order.station_items_ready",
            OrderEvent::ItemReady(_) => "order.item_ready",
            OrderEvent::OrderMarkedReady(_) => "order.marked_ready",
            OrderEvent::OrderServed(_) => "order.served",
            OrderEvent::OrderReturnedToKitchen(_) => "order.returned_to_kitchen",
            OrderEvent::BillRequested(_) => "order.bill_requested",
            OrderEvent::BillReopened(_) => "order.bill_reopened",
            OrderEvent::PaymentRecorded(_) => "order.payment_recorded",
            OrderEvent::OrderCompleted(_) => "order.completed",
            OrderEvent::PaymentVoided(_) => "order.payment_voided",
            OrderEvent::OrderCancelled(_) => "order.cancelled",
            OrderEvent::OrderEmptied(_) => "order.emptied",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderOpened(e) => e.occurred_at,
            OrderEvent::ItemAdded(e) => e.occurred_at,
            OrderEvent::ItemQuantityChanged(e) => e.occurred_at,
            OrderEvent::ItemNotesChanged(e) => e.occurred_at,
            OrderEvent::ItemDiscountApplied(e) => e.occurred_at,
            OrderEvent::ItemRemoved(e) => e.occurred_at,
            OrderEvent::ItemServed(e) => e.occurred_at,
            OrderEvent::OrderSentToKitchen(e) => e.occurred_at,
            OrderEvent::StationItemsReady(e) => e.occurred_at,
            OrderEvent::ItemReady(e) => e.occurred_at,
            OrderEvent::OrderMarkedReady(e) => e.occurred_at,
            OrderEvent::OrderServed(e) => e.occurred_at,
            OrderEvent::OrderReturnedToKitchen(e) => e.occurred_at,
            OrderEvent::BillRequested(e) => e.occurred_at,
            OrderEvent::BillReopened(e) => e.occurred_at,
            OrderEvent::PaymentRecorded(e) => e.occurred_at,
            OrderEvent::OrderCompleted(e) => e.occurred_at,
            OrderEvent::PaymentVoided(e) => e.occurred_at,
            OrderEvent::OrderCancelled(e) => e.occurred_at,
            OrderEvent::OrderEmptied(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Order {
    type Command = OrderCommand;
    type Event = OrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OrderEvent::OrderOpened(e) => {
                self.id = e.order_id;
                self.order_number = e.order_number;
                self.table_id = e.table_id;
                self.customer_id = e.customer_id;
                self.opened_by = Some(e.opened_by);
                self.opened_at = Some(e.occurred_at);
                self.status = OrderStatus::Open;
                self.created = true;
            }
            OrderEvent::ItemAdded(e) => {
                self.items.push(OrderItem {
                    item_id: e.item_id,
                    product_id: e.product_id,
                    product_name: e.product_name.clone(),
                    quantity: e.quantity,
                    unit_price: e.unit_price,
                    discount: Decimal::ZERO,
                    notes: e.notes.clone(),
                    status: ItemStatus::Pending,
                    kitchen_status: KitchenStatus::Pending,
                    route: e.route,
                    prepared_by: None,
                    prepared_at: None,
                    added_at: e.occurred_at,
                });
                self.recompute_total();
            }
            OrderEvent::ItemQuantityChanged(e) => {
                if let Some(item) = self.item_mut(e.item_id) {
                    item.quantity = e.quantity;
                    item.discount = e.discount;
                }
                self.recompute_total();
            }
            OrderEvent::ItemNotesChanged(e) => {
                if let Some(item) = self.item_mut(e.item_id) {
                    item.notes = e.notes.clone();
                }
            }
            OrderEvent::ItemDiscountApplied(e) => {
                if let Some(item) = self.item_mut(e.item_id) {
                    item.discount = e.discount;
                }
                self.recompute_total();
            }
            OrderEvent::ItemRemoved(e) => {
                if let Some(item) = self.item_mut(e.item_id) {
                    item.status = ItemStatus::Cancelled;
                    item.kitchen_status = KitchenStatus::Cancelled;
                }
                self.recompute_total();
            }
            OrderEvent::ItemServed(e) => {
                if let Some(item) = self.item_mut(e.item_id) {
                    item.status = ItemStatus::Served;
                    item.kitchen_status = KitchenStatus::Served;
                }
            }
            OrderEvent::OrderSentToKitchen(e) => {
                for d in &e.dispatched {
                    if let Some(item) = self.item_mut(d.item_id) {
                        item.route = Some(d.route);
                    }
                }
                self.status = OrderStatus::SentToKitchen;
            }
            OrderEvent::StationItemsReady(e) => {
                for p in &e.items {
                    if let Some(item) = self.item_mut(p.item_id) {
                        item.mark_prepared(p.station_id, e.occurred_at);
                    }
                }
            }
            OrderEvent::ItemReady(e) => {
                if let Some(item) = self.item_mut(e.item.item_id) {
                    item.mark_prepared(e.item.station_id, e.occurred_at);
                }
            }
            OrderEvent::OrderMarkedReady(e) => {
                for p in &e.items {
                    if let Some(item) = self.item_mut(p.item_id) {
                        item.mark_prepared(p.station_id, e.occurred_at);
                    }
                }
            }
            OrderEvent::OrderServed(_) => {
                self.status = OrderStatus::Served;
            }
            OrderEvent::OrderReturnedToKitchen(_) => {
                self.status = OrderStatus::SentToKitchen;
            }
            OrderEvent::BillRequested(_) => {
                self.status = OrderStatus::ReadyToPay;
            }
            OrderEvent::BillReopened(_) => {
                self.status = OrderStatus::Served;
            }
            OrderEvent::PaymentRecorded(e) => {
                self.payments.push(e.payment.clone());
            }
            OrderEvent::OrderCompleted(e) => {
                self.status = OrderStatus::Completed;
                self.closed_at = Some(e.occurred_at);
            }
            OrderEvent::PaymentVoided(e) => {
                if let Some(p) = self.payments.iter_mut().find(|p| p.payment_id == e.payment_id) {
                    p.voided = true;
                    p.voided_at = Some(e.occurred_at);
                    p.void_reason = e.reason.clone();
                }
            }
            OrderEvent::OrderCancelled(e) => {
                for item in self.items.iter_mut().filter(|i| i.is_live()) {
                    item.status = ItemStatus::Cancelled;
                    item.kitchen_status = KitchenStatus::Cancelled;
                }
                self.recompute_total();
                self.status = OrderStatus::Cancelled;
                self.closed_at = Some(e.occurred_at);
                self.cancellation = Some(Cancellation {
                    reason: e.reason.clone(),
                    cancelled_by: Some(e.acting_user),
                    supervisor: e.supervisor,
                    cancelled_at: e.occurred_at,
                });
            }
            OrderEvent::OrderEmptied(e) => {
                self.status = OrderStatus::Cancelled;
                self.closed_at = Some(e.occurred_at);
                self.cancellation = Some(Cancellation {
                    reason: EMPTIED_REASON.to_string(),
                    cancelled_by: None,
                    supervisor: None,
                    cancelled_at: e.occurred_at,
                });
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        self.ensure_order_id(command.order_id())?;

        match command {
            OrderCommand::OpenOrder(cmd) => self.handle_open(cmd),
            _ if !self.created => Err(DomainError::not_found(format!("order {}", self.id))),
            OrderCommand::AddItem(cmd) => self.handle_add_item(cmd),
            OrderCommand::RemoveItem(cmd) => self.handle_remove_item(cmd),
            OrderCommand::UpdateItemQuantity(cmd) => self.handle_update_quantity(cmd),
            OrderCommand::UpdateItem(cmd) => self.handle_update_item(cmd),
            OrderCommand::ApplyItemDiscount(cmd) => self.handle_apply_discount(cmd),
            OrderCommand::SendToKitchen(cmd) => self.handle_send_to_kitchen(cmd),
            OrderCommand::MarkItemsReadyForStation(cmd) => self.handle_mark_station_ready(cmd),
            OrderCommand::MarkSpecificItemReady(cmd) => self.handle_mark_item_ready(cmd),
            OrderCommand::MarkOrderReady(cmd) => self.handle_mark_order_ready(cmd),
            OrderCommand::CancelOrder(cmd) => self.handle_cancel(cmd),
            OrderCommand::RequestBill(cmd) => self.handle_request_bill(cmd),
            OrderCommand::RecordPayment(cmd) => self.handle_record_payment(cmd),
            OrderCommand::VoidPayment(cmd) => self.handle_void_payment(cmd),
        }
    }
}

impl Order {
    fn ensure_order_id(&self, order_id: OrderId) -> Result<(), DomainError> {
        if self.id != order_id {
            return Err(DomainError::validation("order_id mismatch"));
        }
        Ok(())
    }

    pub(crate) fn ensure_not_terminal(&self, action: &str) -> Result<(), DomainError> {
        if self.status.is_terminal() {
            return Err(DomainError::invalid_transition(format!(
                "cannot {action}: order is {}",
                self.status
            )));
        }
        Ok(())
    }

    fn ensure_editable(&self, action: &str) -> Result<(), DomainError> {
        if !self.is_editable() {
            return Err(DomainError::invalid_transition(format!(
                "cannot {action}: order is {}",
                self.status
            )));
        }
        Ok(())
    }

    fn live_item(&self, item_id: OrderItemId) -> Result<&OrderItem, DomainError> {
        self.item(item_id)
            .filter(|i| i.is_live())
            .ok_or_else(|| DomainError::not_found(format!("item {item_id} on order {}", self.id)))
    }

    /// Replays `events` on a copy of the order and appends the status
    /// transition implied by the resulting item set.
    ///
    /// - `SentToKitchen` becomes `Served` once every live item is prepared.
    /// - `Served` goes back to `SentToKitchen` when a pending item appears.
    ///
    /// Also rejects item changes that would push the total below what has
    /// already been paid.
    pub(crate) fn with_status_transition(
        &self,
        mut events: Vec<OrderEvent>,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<OrderEvent>, DomainError> {
        if events.is_empty() {
            return Ok(events);
        }

        let mut projected = self.clone();
        for ev in &events {
            projected.apply(ev);
        }

        let paid = projected.paid_amount();
        if paid > projected.total_amount {
            return Err(DomainError::invariant(format!(
                "order total {} would drop below the amount already paid {paid}",
                projected.total_amount
            )));
        }

        let prepared = projected.all_live_items_prepared();
        match projected.status {
            OrderStatus::SentToKitchen if prepared => {
                events.push(OrderEvent::OrderServed(OrderServed {
                    order_id: self.id,
                    occurred_at,
                }));
            }
            OrderStatus::Served if !prepared => {
                events.push(OrderEvent::OrderReturnedToKitchen(OrderReturnedToKitchen {
                    order_id: self.id,
                    occurred_at,
                }));
            }
            _ => {}
        }

        Ok(events)
    }

    /// Removal events for `item_id`; closes the order when no live item remains.
    fn removal_events(&self, item_id: OrderItemId, occurred_at: DateTime<Utc>) -> Vec<OrderEvent> {
        let mut events = vec![OrderEvent::ItemRemoved(ItemRemoved {
            order_id: self.id,
            item_id,
            occurred_at,
        })];
        let remaining_live = self.live_items().filter(|i| i.item_id != item_id).count();
        if remaining_live == 0 {
            events.push(OrderEvent::OrderEmptied(OrderEmptied {
                order_id: self.id,
                occurred_at,
            }));
        }
        events
    }

    fn remove(&self, item_id: OrderItemId, occurred_at: DateTime<Utc>) -> Result<Vec<OrderEvent>, DomainError> {
        let events = self.removal_events(item_id, occurred_at);
        self.with_status_transition(events, occurred_at)
    }

    fn handle_open(&self, cmd: &OpenOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::invalid_transition("order already opened"));
        }

        Ok(vec![OrderEvent::OrderOpened(OrderOpened {
            order_id: cmd.order_id,
            order_number: cmd.order_number,
            table_id: cmd.table_id,
            customer_id: cmd.customer_id,
            opened_by: cmd.opened_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_item(&self, cmd: &AddItem) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_editable("add items")?;

        if cmd.quantity <= Decimal::ZERO {
            return Ok(vec![]);
        }
        if cmd.unit_price < Decimal::ZERO {
            return Err(DomainError::validation("unit price cannot be negative"));
        }
        if self.item(cmd.item_id).is_some() {
            return Err(DomainError::validation(format!("item {} already exists", cmd.item_id)));
        }
        if self.status.is_dispatched() && cmd.route.is_none() {
            return Err(DomainError::unroutable(cmd.product_id.to_string()));
        }

        // Items added before dispatch are routed when the order is sent.
        let route = if self.status.is_dispatched() { cmd.route } else { None };

        let events = vec![OrderEvent::ItemAdded(ItemAdded {
            order_id: self.id,
            item_id: cmd.item_id,
            product_id: cmd.product_id,
            product_name: cmd.product_name.clone(),
            quantity: cmd.quantity,
            unit_price: cmd.unit_price,
            notes: cmd.notes.clone(),
            route,
            occurred_at: cmd.occurred_at,
        })];
        self.with_status_transition(events, cmd.occurred_at)
    }

    fn handle_remove_item(&self, cmd: &RemoveItem) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_editable("remove items")?;

        let item = self
            .item(cmd.item_id)
            .ok_or_else(|| DomainError::not_found(format!("item {} on order {}", cmd.item_id, self.id)))?;
        if !item.is_live() {
            return Ok(vec![]);
        }

        self.remove(cmd.item_id, cmd.occurred_at)
    }

    fn quantity_events(
        &self,
        item: &OrderItem,
        quantity: Decimal,
        occurred_at: DateTime<Utc>,
    ) -> Vec<OrderEvent> {
        if quantity == item.quantity {
            return vec![];
        }
        let subtotal = quantity * item.unit_price;
        vec![OrderEvent::ItemQuantityChanged(ItemQuantityChanged {
            order_id: self.id,
            item_id: item.item_id,
            quantity,
            discount: item.discount.min(subtotal),
            occurred_at,
        })]
    }

    fn handle_update_quantity(&self, cmd: &UpdateItemQuantity) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_editable("change item quantities")?;
        let item = self.live_item(cmd.item_id)?;

        if cmd.quantity <= Decimal::ZERO {
            return self.remove(item.item_id, cmd.occurred_at);
        }

        let events = self.quantity_events(item, cmd.quantity, cmd.occurred_at);
        self.with_status_transition(events, cmd.occurred_at)
    }

    fn handle_update_item(&self, cmd: &UpdateItem) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_editable("update items")?;

        let item = self
            .live_items()
            .find(|i| i.product_id == cmd.product_id)
            .ok_or_else(|| {
                DomainError::not_found(format!("item for product {} on order {}", cmd.product_id, self.id))
            })?;

        if cmd.quantity <= Decimal::ZERO || cmd.status == Some(ItemStatus::Cancelled) {
            return self.remove(item.item_id, cmd.occurred_at);
        }

        let mut events = self.quantity_events(item, cmd.quantity, cmd.occurred_at);

        if cmd.notes.is_some() && cmd.notes != item.notes {
            events.push(OrderEvent::ItemNotesChanged(ItemNotesChanged {
                order_id: self.id,
                item_id: item.item_id,
                notes: cmd.notes.clone(),
                occurred_at: cmd.occurred_at,
            }));
        }

        match cmd.status {
            None => {}
            Some(status) if status == item.status => {}
            Some(ItemStatus::Served) if item.kitchen_status == KitchenStatus::Ready => {
                events.push(OrderEvent::ItemServed(ItemServed {
                    order_id: self.id,
                    item_id: item.item_id,
                    occurred_at: cmd.occurred_at,
                }));
            }
            Some(status) => {
                return Err(DomainError::invalid_transition(format!(
                    "item {} cannot move from {:?} to {:?}",
                    item.item_id, item.status, status
                )));
            }
        }

        self.with_status_transition(events, cmd.occurred_at)
    }

    fn handle_apply_discount(&self, cmd: &ApplyItemDiscount) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_editable("discount items")?;
        let item = self.live_item(cmd.item_id)?;

        if cmd.discount < Decimal::ZERO || cmd.discount > item.subtotal() {
            return Err(DomainError::validation(format!(
                "discount {} must be between 0 and the line subtotal {}",
                cmd.discount,
                item.subtotal()
            )));
        }
        if cmd.discount == item.discount {
            return Ok(vec![]);
        }

        let events = vec![OrderEvent::ItemDiscountApplied(ItemDiscountApplied {
            order_id: self.id,
            item_id: item.item_id,
            discount: cmd.discount,
            occurred_at: cmd.occurred_at,
        })];
        self.with_status_transition(events, cmd.occurred_at)
    }

    fn handle_cancel(&self, cmd: &CancelOrder) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_not_terminal("cancel")?;

        if cmd.reason.trim().is_empty() {
            return Err(DomainError::validation("cancellation reason is required"));
        }
        if self.payments.iter().any(|p| !p.voided) {
            return Err(DomainError::invalid_transition(
                "cannot cancel an order with recorded payments; void them first",
            ));
        }

        let prepared = self.live_items().any(|i| i.kitchen_status.is_prepared());
        if prepared {
            match cmd.supervisor {
                Some(supervisor) if supervisor != cmd.acting_user => {}
                Some(_) => {
                    return Err(DomainError::supervisor_required(
                        "the supervisor must be someone other than the acting user",
                    ));
                }
                None => {
                    return Err(DomainError::supervisor_required(
                        "items have already been prepared",
                    ));
                }
            }
        }

        Ok(vec![OrderEvent::OrderCancelled(OrderCancelled {
            order_id: self.id,
            reason: cmd.reason.trim().to_string(),
            acting_user: cmd.acting_user,
            supervisor: cmd.supervisor,
            cancelled_items: self.live_items().map(|i| i.item_id).collect(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;

    #[test]
    fn open_order_emits_order_opened() {
        let order = Order::empty(order_id());
        let events = order
            .handle(&OrderCommand::OpenOrder(OpenOrder {
                order_id: order_id(),
                order_number: 7,
                table_id: None,
                customer_id: None,
                opened_by: waiter(),
                occurred_at: t0(),
            }))
            .unwrap();

        assert_eq!(events.len(), 1);
        match &events[0] {
            OrderEvent::OrderOpened(e) => assert_eq!(e.order_number, 7),
            other => panic!("expected OrderOpened, got {other:?}"),
        }
    }

    #[test]
    fn commands_on_unopened_order_are_not_found() {
        let order = Order::empty(order_id());
        let err = order
            .handle(&OrderCommand::RequestBill(RequestBill {
                order_id: order_id(),
                occurred_at: t0(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[test]
    fn total_is_recomputed_after_item_mutations() {
        let mut order = open_order();
        let a = add_item(&mut order, "5.00", "2", None);
        add_item(&mut order, "10.00", "1", None);
        assert_eq!(order.total_amount(), dec("20.00"));

        run(
            &mut order,
            OrderCommand::UpdateItemQuantity(UpdateItemQuantity {
                order_id: order_id(),
                item_id: a,
                quantity: dec("3"),
                occurred_at: t0(),
            }),
        )
        .unwrap();
        assert_eq!(order.total_amount(), dec("25.00"));

        run(
            &mut order,
            OrderCommand::ApplyItemDiscount(ApplyItemDiscount {
                order_id: order_id(),
                item_id: a,
                discount: dec("1.50"),
                occurred_at: t0(),
            }),
        )
        .unwrap();
        assert_eq!(order.total_amount(), dec("23.50"));
        assert_eq!(order.total_amount(), calculate_total(order.items()));
    }

    #[test]
    fn add_item_with_non_positive_quantity_is_a_noop() {
        let mut order = open_order();
        let events = run(
            &mut order,
            OrderCommand::AddItem(add_item_cmd("4.00", "0", None)),
        )
        .unwrap();
        assert!(events.is_empty());
        assert!(order.items().is_empty());
    }

    #[test]
    fn add_item_to_completed_order_is_rejected() {
        let mut order = open_order();
        add_item(&mut order, "5.00", "1", None);
        pay(&mut order, "5.00").unwrap();
        assert_eq!(order.status(), OrderStatus::Completed);

        let err = run(&mut order, OrderCommand::AddItem(add_item_cmd("1.00", "1", None))).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }

    #[test]
    fn lowering_quantity_clamps_discount() {
        let mut order = open_order();
        let a = add_item(&mut order, "10.00", "2", None);
        run(
            &mut order,
            OrderCommand::ApplyItemDiscount(ApplyItemDiscount {
                order_id: order_id(),
                item_id: a,
                discount: dec("15.00"),
                occurred_at: t0(),
            }),
        )
        .unwrap();

        run(
            &mut order,
            OrderCommand::UpdateItemQuantity(UpdateItemQuantity {
                order_id: order_id(),
                item_id: a,
                quantity: dec("1"),
                occurred_at: t0(),
            }),
        )
        .unwrap();

        assert_eq!(order.item(a).unwrap().discount, dec("10.00"));
        assert_eq!(order.total_amount(), Decimal::ZERO);
    }

    #[test]
    fn discount_above_subtotal_is_rejected() {
        let mut order = open_order();
        let a = add_item(&mut order, "3.00", "1", None);
        let err = run(
            &mut order,
            OrderCommand::ApplyItemDiscount(ApplyItemDiscount {
                order_id: order_id(),
                item_id: a,
                discount: dec("3.01"),
                occurred_at: t0(),
            }),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn removing_last_item_empties_and_closes_the_order() {
        let mut order = open_order();
        let a = add_item(&mut order, "5.00", "1", None);

        let events = run(
            &mut order,
            OrderCommand::RemoveItem(RemoveItem {
                order_id: order_id(),
                item_id: a,
                occurred_at: t0(),
            }),
        )
        .unwrap();

        assert!(events.iter().any(|e| matches!(e, OrderEvent::OrderEmptied(_))));
        assert_eq!(order.status(), OrderStatus::Cancelled);
        assert_eq!(order.cancellation().unwrap().reason, EMPTIED_REASON);
        // Soft removal: the item is retained.
        assert_eq!(order.items().len(), 1);
        assert_eq!(order.items()[0].status, ItemStatus::Cancelled);
    }

    #[test]
    fn quantity_to_zero_behaves_as_removal() {
        let mut order = open_order();
        let a = add_item(&mut order, "5.00", "1", None);
        add_item(&mut order, "2.00", "1", None);

        run(
            &mut order,
            OrderCommand::UpdateItemQuantity(UpdateItemQuantity {
                order_id: order_id(),
                item_id: a,
                quantity: Decimal::ZERO,
                occurred_at: t0(),
            }),
        )
        .unwrap();

        assert_eq!(order.item(a).unwrap().status, ItemStatus::Cancelled);
        assert_eq!(order.total_amount(), dec("2.00"));
        assert_eq!(order.status(), OrderStatus::Open);
    }

    #[test]
    fn removing_an_already_removed_item_is_a_noop() {
        let mut order = open_order();
        let a = add_item(&mut order, "5.00", "1", None);
        add_item(&mut order, "2.00", "1", None);
        let remove = OrderCommand::RemoveItem(RemoveItem {
            order_id: order_id(),
            item_id: a,
            occurred_at: t0(),
        });
        run(&mut order, remove.clone()).unwrap();
        let events = run(&mut order, remove).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn removal_cannot_drop_total_below_paid() {
        let mut order = open_order();
        let a = add_item(&mut order, "10.00", "1", None);
        add_item(&mut order, "5.00", "1", None);
        pay(&mut order, "12.00").unwrap();

        let err = run(
            &mut order,
            OrderCommand::RemoveItem(RemoveItem {
                order_id: order_id(),
                item_id: a,
                occurred_at: t0(),
            }),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
        assert_eq!(order.total_amount(), dec("15.00"));
    }

    #[test]
    fn update_item_targets_first_live_item_of_product() {
        let mut order = open_order();
        let cmd = add_item_cmd("4.00", "1", None);
        let product_id = cmd.product_id;
        run(&mut order, OrderCommand::AddItem(cmd)).unwrap();

        run(
            &mut order,
            OrderCommand::UpdateItem(UpdateItem {
                order_id: order_id(),
                product_id,
                quantity: dec("2"),
                notes: Some("no ice".into()),
                status: None,
                occurred_at: t0(),
            }),
        )
        .unwrap();

        let item = &order.items()[0];
        assert_eq!(item.quantity, dec("2"));
        assert_eq!(item.notes.as_deref(), Some("no ice"));
        assert_eq!(order.total_amount(), dec("8.00"));
    }

    #[test]
    fn update_item_cannot_serve_unprepared_item() {
        let mut order = open_order();
        let cmd = add_item_cmd("4.00", "1", None);
        let product_id = cmd.product_id;
        run(&mut order, OrderCommand::AddItem(cmd)).unwrap();

        let err = run(
            &mut order,
            OrderCommand::UpdateItem(UpdateItem {
                order_id: order_id(),
                product_id,
                quantity: dec("1"),
                notes: None,
                status: Some(ItemStatus::Served),
                occurred_at: t0(),
            }),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }

    #[test]
    fn cancel_requires_distinct_supervisor_once_items_are_prepared() {
        let mut order = open_order();
        add_item(&mut order, "5.00", "1", None);
        send(&mut order, StationType::Kitchen).unwrap();
        mark_station(&mut order, StationType::Kitchen).unwrap();

        let cancel = |supervisor| {
            OrderCommand::CancelOrder(CancelOrder {
                order_id: order_id(),
                reason: "guest left".into(),
                acting_user: waiter(),
                supervisor,
                occurred_at: t0(),
            })
        };

        assert!(matches!(
            order.handle(&cancel(None)).unwrap_err(),
            DomainError::SupervisorApprovalRequired(_)
        ));
        assert!(matches!(
            order.handle(&cancel(Some(waiter()))).unwrap_err(),
            DomainError::SupervisorApprovalRequired(_)
        ));

        run(&mut order, cancel(Some(supervisor()))).unwrap();
        assert_eq!(order.status(), OrderStatus::Cancelled);
        assert_eq!(order.total_amount(), Decimal::ZERO);
        assert_eq!(order.cancellation().unwrap().supervisor, Some(supervisor()));
    }

    #[test]
    fn cancel_without_prepared_items_needs_no_supervisor() {
        let mut order = open_order();
        add_item(&mut order, "5.00", "1", None);
        send(&mut order, StationType::Bar).unwrap();
        run(
            &mut order,
            OrderCommand::CancelOrder(CancelOrder {
                order_id: order_id(),
                reason: "duplicate ticket".into(),
                acting_user: waiter(),
                supervisor: None,
                occurred_at: t0(),
            }),
        )
        .unwrap();
        assert_eq!(order.status(), OrderStatus::Cancelled);
    }

    #[test]
    fn cancel_with_live_payments_is_rejected() {
        let mut order = open_order();
        add_item(&mut order, "10.00", "1", None);
        pay(&mut order, "4.00").unwrap();

        let err = order
            .handle(&OrderCommand::CancelOrder(CancelOrder {
                order_id: order_id(),
                reason: "guest left".into(),
                acting_user: waiter(),
                supervisor: None,
                occurred_at: t0(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }

    #[test]
    fn cancelled_order_rejects_further_cancellation() {
        let mut order = open_order();
        add_item(&mut order, "5.00", "1", None);
        let cancel = OrderCommand::CancelOrder(CancelOrder {
            order_id: order_id(),
            reason: "mistake".into(),
            acting_user: waiter(),
            supervisor: None,
            occurred_at: t0(),
        });
        run(&mut order, cancel.clone()).unwrap();
        assert!(matches!(
            order.handle(&cancel).unwrap_err(),
            DomainError::InvalidTransition(_)
        ));
    }

    #[test]
    fn version_increments_per_event() {
        let mut order = open_order();
        assert_eq!(order.version(), 1);
        add_item(&mut order, "5.00", "1", None);
        assert_eq!(order.version(), 2);
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let order = open_order();
        let cmd = OrderCommand::AddItem(add_item_cmd("5.00", "1", None));
        let before = order.clone();

        let events1 = order.handle(&cmd).unwrap();
        let events2 = order.handle(&cmd).unwrap();

        assert_eq!(order, before);
        assert_eq!(events1, events2);
    }

    #[test]
    fn apply_is_deterministic() {
        let mut source = Order::empty(order_id());
        let mut events = Vec::new();
        events.extend(run(&mut source, OrderCommand::OpenOrder(open_cmd())).unwrap());
        events.extend(run(&mut source, OrderCommand::AddItem(add_item_cmd("5.00", "2", None))).unwrap());
        events.extend(run(&mut source, OrderCommand::AddItem(add_item_cmd("1.25", "4", None))).unwrap());
        events.extend(send(&mut source, StationType::Kitchen).unwrap());

        let mut a = Order::empty(order_id());
        let mut b = Order::empty(order_id());
        for e in &events {
            a.apply(e);
            b.apply(e);
        }
        assert_eq!(a, b);
        assert_eq!(a.total_amount(), source.total_amount());
        assert_eq!(a.status(), OrderStatus::SentToKitchen);
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = OrderEvent::OrderServed(OrderServed {
            order_id: order_id(),
            occurred_at: t0(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "order_served");
        let back: OrderEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
        assert_eq!(event.event_type(), "order.served");
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Add { cents: i64, qty: i64 },
            Remove(usize),
            SetQuantity(usize, i64),
            Discount(usize, u8),
            Pay(i64),
            Void(usize),
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (0i64..5_000, -1i64..6).prop_map(|(cents, qty)| Op::Add { cents, qty }),
                (0usize..8).prop_map(Op::Remove),
                (0usize..8, -1i64..6).prop_map(|(i, q)| Op::SetQuantity(i, q)),
                (0usize..8, 0u8..=100).prop_map(|(i, pct)| Op::Discount(i, pct)),
                (1i64..6_000).prop_map(Op::Pay),
                (0usize..4).prop_map(Op::Void),
            ]
        }

        fn command_for(order: &Order, op: &Op) -> Option<OrderCommand> {
            let item_at = |i: usize| order.items().get(i % order.items().len().max(1));
            Some(match op {
                Op::Add { cents, qty } => OrderCommand::AddItem(AddItem {
                    quantity: Decimal::from(*qty),
                    unit_price: Decimal::new(*cents, 2),
                    ..add_item_cmd("0", "1", None)
                }),
                Op::Remove(i) => OrderCommand::RemoveItem(RemoveItem {
                    order_id: order_id(),
                    item_id: item_at(*i)?.item_id,
                    occurred_at: t0(),
                }),
                Op::SetQuantity(i, q) => OrderCommand::UpdateItemQuantity(UpdateItemQuantity {
                    order_id: order_id(),
                    item_id: item_at(*i)?.item_id,
                    quantity: Decimal::from(*q),
                    occurred_at: t0(),
                }),
                Op::Discount(i, pct) => {
                    let item = item_at(*i)?;
                    OrderCommand::ApplyItemDiscount(ApplyItemDiscount {
                        order_id: order_id(),
                        item_id: item.item_id,
                        discount: (item.subtotal() * Decimal::from(*pct) / Decimal::from(100)).round_dp(2),
                        occurred_at: t0(),
                    })
                }
                Op::Pay(cents) => OrderCommand::RecordPayment(RecordPayment {
                    order_id: order_id(),
                    payment_id: crate::PaymentId::new(),
                    amount: Decimal::new(*cents, 2),
                    method: PaymentMethod::Card,
                    splits: vec![],
                    received_by: None,
                    occurred_at: t0(),
                }),
                Op::Void(i) => OrderCommand::VoidPayment(VoidPayment {
                    order_id: order_id(),
                    payment_id: order.payments().get(*i % order.payments().len().max(1))?.payment_id,
                    reason: None,
                    occurred_at: t0(),
                }),
            })
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            /// Property: the cached total always equals the sum of live line totals,
            /// and non-voided payments never exceed it.
            #[test]
            fn totals_and_payments_stay_consistent(ops in proptest::collection::vec(op(), 1..40)) {
                let mut order = open_order();

                for op in &ops {
                    let Some(cmd) = command_for(&order, op) else { continue };
                    let before = order.clone();
                    if run(&mut order, cmd).is_err() {
                        prop_assert_eq!(&order, &before);
                    }

                    let expected: Decimal = order
                        .items()
                        .iter()
                        .filter(|i| i.status != ItemStatus::Cancelled)
                        .map(|i| i.quantity * i.unit_price - i.discount)
                        .sum();
                    prop_assert_eq!(order.total_amount(), expected);
                    prop_assert!(order.paid_amount() <= order.total_amount());
                    prop_assert!(order.live_items().all(|i| i.discount <= i.subtotal()));
                }
            }

            /// Property: marking one station ready never touches another station's items,
            /// and the order is Served iff every live item is prepared.
            #[test]
            fn station_marking_is_isolated(
                stations in proptest::collection::vec(0u8..3, 1..10),
                marks in proptest::collection::vec(0u8..3, 1..6),
            ) {
                let to_type = |n: u8| match n {
                    0 => StationType::Kitchen,
                    1 => StationType::Bar,
                    _ => StationType::Other,
                };
                let mut order = open_order();
                let ids: Vec<(OrderItemId, StationType)> = stations
                    .iter()
                    .map(|n| (add_item(&mut order, "2.50", "1", None), to_type(*n)))
                    .collect();
                send_routed(&mut order, |item| {
                    ids.iter().find(|(id, _)| *id == item.item_id).map(|(_, st)| route(*st))
                })
                .unwrap();

                for m in marks {
                    let st = to_type(m);
                    let before = order.clone();
                    mark_station(&mut order, st).unwrap();

                    for (b, a) in before.items().iter().zip(order.items()) {
                        if b.station_type() != Some(st) {
                            prop_assert_eq!(b.kitchen_status, a.kitchen_status);
                        } else {
                            prop_assert!(a.kitchen_status.is_prepared());
                        }
                    }
                    prop_assert_eq!(
                        order.status() == OrderStatus::Served,
                        order.all_live_items_prepared()
                    );
                }
            }
        }
    }
}
