//! Infrastructure layer: event store, command dispatch, read models,
//! application services and configuration.

pub mod command_dispatcher;
pub mod config;
pub mod event_store;
pub mod projections;
pub mod read_model;
pub mod services;

#[cfg(test)]
mod integration_tests;

pub use command_dispatcher::{CommandDispatcher, DispatchError, Executed};
pub use crate::config::AppConfig;
pub use event_store::{EventStore, EventStoreError, InMemoryEventStore, StoredEvent, UncommittedEvent};
pub use projections::{OrderBoardError, OrderBoardProjection};
pub use read_model::{InMemoryReadStore, ReadStore};
pub use services::{
    CreateOrderRequest, ItemOutcome, KitchenDispatcher, OrderCore, OrderService, PaymentReconciler,
    RecordPaymentRequest, SplitRequest, UpdateItemRequest,
};
