use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};

use brigade_infra::services::{CreateOrderRequest, UpdateItemRequest};
use brigade_orders::{OrderId, OrderItemId};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_order).get(list_active_orders))
        .route("/:id", get(get_order))
        .route("/:id/items", post(add_item).put(update_item))
        .route("/:id/items/:item_id", axum::routing::delete(remove_item))
        .route("/:id/items/:item_id/quantity", put(update_item_quantity))
        .route("/:id/items/:item_id/discount", put(apply_item_discount))
        .route("/:id/send", post(send_to_kitchen))
        .route("/:id/cancel", post(cancel_order))
        .route("/:id/bill", post(crate::app::routes::payments::request_bill))
        .route(
            "/:id/payments",
            post(crate::app::routes::payments::record_payment).get(crate::app::routes::payments::payment_summary),
        )
}

fn order_response(status: StatusCode, order: &brigade_orders::Order) -> axum::response::Response {
    (status, Json(dto::OrderResponse::from(order))).into_response()
}

pub async fn create_order(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateOrderRequest>,
) -> axum::response::Response {
    let req = CreateOrderRequest {
        table_id: body.table_id,
        customer_id: body.customer_id,
        opened_by: body.opened_by,
    };
    match services.orders.create_order(req).await {
        Ok(order) => order_response(StatusCode::CREATED, &order),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn list_active_orders(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    let orders: Vec<dto::OrderResponse> = services
        .orders
        .active_orders()
        .iter()
        .map(dto::OrderResponse::from)
        .collect();
    (StatusCode::OK, Json(orders)).into_response()
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id: OrderId = match errors::parse_path(&id, "order id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.orders.get_order(order_id).await {
        Ok(order) => order_response(StatusCode::OK, &order),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn add_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::AddItemRequest>,
) -> axum::response::Response {
    let order_id: OrderId = match errors::parse_path(&id, "order id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services
        .orders
        .add_item(order_id, body.product_id, body.quantity, body.notes)
        .await
    {
        Ok(order) => order_response(StatusCode::OK, &order),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn update_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateItemRequest>,
) -> axum::response::Response {
    let order_id: OrderId = match errors::parse_path(&id, "order id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let req = UpdateItemRequest {
        product_id: body.product_id,
        quantity: body.quantity,
        notes: body.notes,
        status: body.status,
    };
    match services.orders.update_item(order_id, req).await {
        Ok(outcome) => (StatusCode::OK, Json(dto::ItemOutcomeResponse::from(outcome))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn remove_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path((id, item_id)): Path<(String, String)>,
) -> axum::response::Response {
    let (order_id, item_id) = match parse_item_path(&id, &item_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.orders.remove_item(order_id, item_id).await {
        Ok(outcome) => (StatusCode::OK, Json(dto::ItemOutcomeResponse::from(outcome))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn update_item_quantity(
    Extension(services): Extension<Arc<AppServices>>,
    Path((id, item_id)): Path<(String, String)>,
    Json(body): Json<dto::UpdateQuantityRequest>,
) -> axum::response::Response {
    let (order_id, item_id) = match parse_item_path(&id, &item_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services
        .orders
        .update_item_quantity(order_id, item_id, body.quantity)
        .await
    {
        Ok(outcome) => (StatusCode::OK, Json(dto::ItemOutcomeResponse::from(outcome))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn apply_item_discount(
    Extension(services): Extension<Arc<AppServices>>,
    Path((id, item_id)): Path<(String, String)>,
    Json(body): Json<dto::ApplyDiscountRequest>,
) -> axum::response::Response {
    let (order_id, item_id) = match parse_item_path(&id, &item_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services
        .orders
        .apply_item_discount(order_id, item_id, body.discount)
        .await
    {
        Ok(order) => order_response(StatusCode::OK, &order),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn send_to_kitchen(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::ActingUserRequest>,
) -> axum::response::Response {
    let order_id: OrderId = match errors::parse_path(&id, "order id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.orders.send_to_kitchen(order_id, body.acting_user).await {
        Ok(order) => order_response(StatusCode::OK, &order),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn cancel_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::CancelOrderRequest>,
) -> axum::response::Response {
    let order_id: OrderId = match errors::parse_path(&id, "order id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services
        .orders
        .cancel_order(order_id, body.reason, body.acting_user, body.supervisor_id)
        .await
    {
        Ok(order) => order_response(StatusCode::OK, &order),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub(crate) fn parse_item_path(id: &str, item_id: &str) -> Result<(OrderId, OrderItemId), axum::response::Response> {
    let order_id = errors::parse_path(id, "order id")?;
    let item_id = errors::parse_path(item_id, "item id")?;
    Ok((order_id, item_id))
}
