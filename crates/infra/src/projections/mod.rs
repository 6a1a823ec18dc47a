//! Projection implementations (read model builders).
//!
//! Projections consume committed order events and build query-optimized read
//! models. They are rebuildable from the event store and idempotent under
//! at-least-once delivery.

pub mod order_board;

pub use order_board::{OrderBoardError, OrderBoardProjection};
