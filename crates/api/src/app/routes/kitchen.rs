use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use brigade_catalog::StationType;
use brigade_orders::OrderId;

use crate::app::routes::orders::parse_item_path;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/stations/:station_type/pending", get(pending_by_station))
        .route("/orders/:id/stations/:station_type/ready", post(mark_station_ready))
        .route("/orders/:id/items/:item_id/ready", post(mark_item_ready))
        .route("/orders/:id/ready", post(mark_order_ready))
}

fn parse_station_type(raw: &str) -> Result<StationType, axum::response::Response> {
    raw.parse().map_err(errors::domain_error_to_response)
}

/// GET /kitchen/stations/:station_type/pending
///
/// Snapshot of pending items for one station type, oldest order first.
pub async fn pending_by_station(
    Extension(services): Extension<Arc<AppServices>>,
    Path(station_type): Path<String>,
) -> axum::response::Response {
    let station_type = match parse_station_type(&station_type) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let pending = services.kitchen.pending_by_station_type(station_type);
    (StatusCode::OK, Json(pending)).into_response()
}

pub async fn mark_station_ready(
    Extension(services): Extension<Arc<AppServices>>,
    Path((id, station_type)): Path<(String, String)>,
) -> axum::response::Response {
    let order_id: OrderId = match errors::parse_path(&id, "order id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let station_type = match parse_station_type(&station_type) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services
        .kitchen
        .mark_items_ready_for_station(order_id, station_type)
        .await
    {
        Ok(order) => (StatusCode::OK, Json(dto::OrderResponse::from(&order))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn mark_item_ready(
    Extension(services): Extension<Arc<AppServices>>,
    Path((id, item_id)): Path<(String, String)>,
) -> axum::response::Response {
    let (order_id, item_id) = match parse_item_path(&id, &item_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.kitchen.mark_specific_item_ready(order_id, item_id).await {
        Ok(order) => (StatusCode::OK, Json(dto::OrderResponse::from(&order))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

/// POST /kitchen/orders/:id/ready
///
/// Supervisory override across all stations.
pub async fn mark_order_ready(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::ActingUserRequest>,
) -> axum::response::Response {
    let order_id: OrderId = match errors::parse_path(&id, "order id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.kitchen.mark_order_ready(order_id, body.acting_user).await {
        Ok(order) => (StatusCode::OK, Json(dto::OrderResponse::from(&order))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
