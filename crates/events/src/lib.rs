//! `brigade-events`: event mechanics shared by the domain and infrastructure.
//!
//! - `Event`: the contract every domain event satisfies
//! - `EventEnvelope`: stream metadata around a persisted event
//! - `EventBus`: pub/sub fan-out (in-memory implementation included)
//! - `NotificationSink`: the boundary towards connected clients

pub mod bus;
pub mod envelope;
pub mod event;
pub mod handler;
pub mod in_memory_bus;
pub mod notification;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use handler::execute;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use notification::{
    BusNotificationSink, NotificationSink, Notification, NotifyError, RecordingNotificationSink,
};
