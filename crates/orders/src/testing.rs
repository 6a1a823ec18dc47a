//! Fixtures shared by the unit tests of this crate.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use brigade_catalog::{ProductId, StationId, StationRoute, StationType};
use brigade_core::{AggregateId, DomainResult, UserId};
use brigade_events::execute;

use crate::order::{
    AddItem, ItemRoute, MarkItemsReadyForStation, OpenOrder, Order, OrderCommand, OrderEvent,
    OrderId, OrderItem, OrderItemId, RecordPayment, SendToKitchen,
};
use crate::payment::{PaymentId, PaymentMethod, SplitPayment};

pub fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 18, 0, 0).unwrap()
}

pub fn order_id() -> OrderId {
    OrderId::new(AggregateId::from_uuid(Uuid::from_u128(1)))
}

pub fn waiter() -> UserId {
    UserId::from_uuid(Uuid::from_u128(10))
}

pub fn supervisor() -> UserId {
    UserId::from_uuid(Uuid::from_u128(11))
}

pub fn route(station_type: StationType) -> StationRoute {
    let n = match station_type {
        StationType::Kitchen => 100,
        StationType::Bar => 101,
        StationType::Other => 102,
    };
    StationRoute {
        station_id: StationId::from_uuid(Uuid::from_u128(n)),
        station_type,
    }
}

pub fn run(order: &mut Order, command: OrderCommand) -> DomainResult<Vec<OrderEvent>> {
    execute(order, &command)
}

pub fn open_cmd() -> OpenOrder {
    OpenOrder {
        order_id: order_id(),
        order_number: 1,
        table_id: None,
        customer_id: None,
        opened_by: waiter(),
        occurred_at: t0(),
    }
}

pub fn open_order() -> Order {
    let mut order = Order::empty(order_id());
    run(&mut order, OrderCommand::OpenOrder(open_cmd())).unwrap();
    order
}

pub fn open_order_at(id: OrderId, order_number: u64, at: DateTime<Utc>) -> Order {
    let mut order = Order::empty(id);
    run(
        &mut order,
        OrderCommand::OpenOrder(OpenOrder {
            order_id: id,
            order_number,
            occurred_at: at,
            ..open_cmd()
        }),
    )
    .unwrap();
    order
}

pub fn add_item_cmd(price: &str, qty: &str, route: Option<StationRoute>) -> AddItem {
    AddItem {
        order_id: order_id(),
        item_id: OrderItemId::new(),
        product_id: ProductId::new(),
        product_name: "Dish".into(),
        quantity: dec(qty),
        unit_price: dec(price),
        notes: None,
        route,
        occurred_at: t0(),
    }
}

/// Adds an item to `order` (whatever its id) and returns the new item id.
pub fn add_item(order: &mut Order, price: &str, qty: &str, route: Option<StationRoute>) -> OrderItemId {
    let cmd = AddItem {
        order_id: order.id_typed(),
        ..add_item_cmd(price, qty, route)
    };
    let item_id = cmd.item_id;
    run(order, OrderCommand::AddItem(cmd)).unwrap();
    item_id
}

pub fn send_routed(
    order: &mut Order,
    resolve: impl Fn(&OrderItem) -> Option<StationRoute>,
) -> DomainResult<Vec<OrderEvent>> {
    let routes = order
        .live_items()
        .map(|i| ItemRoute {
            item_id: i.item_id,
            product_id: i.product_id,
            route: resolve(i),
        })
        .collect();
    let order_id = order.id_typed();
    run(
        order,
        OrderCommand::SendToKitchen(SendToKitchen {
            order_id,
            routes,
            acting_user: waiter(),
            occurred_at: t0(),
        }),
    )
}

pub fn send(order: &mut Order, station_type: StationType) -> DomainResult<Vec<OrderEvent>> {
    send_routed(order, |_| Some(route(station_type)))
}

pub fn mark_station(order: &mut Order, station_type: StationType) -> DomainResult<Vec<OrderEvent>> {
    let order_id = order.id_typed();
    run(
        order,
        OrderCommand::MarkItemsReadyForStation(MarkItemsReadyForStation {
            order_id,
            station_type,
            occurred_at: t0(),
        }),
    )
}

pub fn pay_with(order: &mut Order, amount: &str, splits: Vec<SplitPayment>) -> DomainResult<Vec<OrderEvent>> {
    let order_id = order.id_typed();
    run(
        order,
        OrderCommand::RecordPayment(RecordPayment {
            order_id,
            payment_id: PaymentId::new(),
            amount: dec(amount),
            method: PaymentMethod::Cash,
            splits,
            received_by: None,
            occurred_at: t0(),
        }),
    )
}

pub fn pay(order: &mut Order, amount: &str) -> DomainResult<Vec<OrderEvent>> {
    pay_with(order, amount, Vec::new())
}
