use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};

use brigade_orders::{OrderId, PaymentId};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

/// Payment-addressed endpoints. Order-addressed billing routes are mounted
/// under `/orders`.
pub fn router() -> Router {
    Router::new().route("/:payment_id/void", post(void_payment))
}

pub async fn request_bill(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id: OrderId = match errors::parse_path(&id, "order id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.payments.request_bill(order_id).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn record_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::RecordPaymentRequest>,
) -> axum::response::Response {
    let order_id: OrderId = match errors::parse_path(&id, "order id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.payments.record_payment(order_id, body.into()).await {
        Ok(receipt) => (StatusCode::CREATED, Json(receipt)).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn payment_summary(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id: OrderId = match errors::parse_path(&id, "order id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.payments.payment_summary(order_id).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn void_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Path(payment_id): Path<String>,
    body: Option<Json<dto::VoidPaymentRequest>>,
) -> axum::response::Response {
    let payment_id: PaymentId = match errors::parse_path(&payment_id, "payment id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Json(body) = body.unwrap_or_default();
    match services.payments.void_payment(payment_id, body.reason).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
