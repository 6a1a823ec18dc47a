use axum::{Router, routing::get};

pub mod kitchen;
pub mod orders;
pub mod payments;
pub mod system;

/// Router for every domain endpoint.
pub fn router() -> Router {
    Router::new()
        .route("/stream", get(system::stream))
        .nest("/orders", orders::router())
        .nest("/payments", payments::router())
        .nest("/kitchen", kitchen::router())
}
