//! Orders domain module (event-sourced).
//!
//! The Order aggregate owns its items and payments. Kitchen dispatch and
//! payment reconciliation are decided here as pure, deterministic domain
//! logic (no IO, no HTTP, no storage); lookups happen in the callers and travel
//! inside the commands.

pub mod kitchen;
pub mod order;
pub mod payment;

#[cfg(test)]
pub(crate) mod testing;

pub use kitchen::{PendingItemView, pending_items_for_station};
pub use order::{
    AddItem, ApplyItemDiscount, BillReopened, BillRequested, CancelOrder, Cancellation,
    CustomerId, DispatchedItem, EMPTIED_REASON, ItemAdded, ItemDiscountApplied, ItemNotesChanged,
    ItemQuantityChanged, ItemReady, ItemRemoved, ItemRoute, ItemServed, ItemStatus, KitchenStatus,
    MarkItemsReadyForStation, MarkOrderReady, MarkSpecificItemReady, ORDER_AGGREGATE_TYPE,
    OpenOrder, Order, OrderCancelled, OrderCommand, OrderCompleted, OrderEmptied, OrderEvent,
    OrderId, OrderItem, OrderItemId, OrderMarkedReady, OrderOpened, OrderReturnedToKitchen,
    OrderSentToKitchen, OrderServed, OrderStatus, PaymentRecorded, PaymentVoided, PreparedItem,
    RecordPayment, RemoveItem, RequestBill, SendToKitchen, StationItemsReady, UpdateItem,
    UpdateItemQuantity, VoidPayment, calculate_total,
};
pub use payment::{
    Payment, PaymentId, PaymentMethod, PaymentReceipt, PaymentSummary, SplitPayment,
    SplitPaymentId,
};
