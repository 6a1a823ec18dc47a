//! Outbound notifications towards connected clients (kitchen screens, POS
//! terminals, dashboards).
//!
//! Notifications are emitted only after a successful commit. A failed emit
//! never rolls back or fails the operation that produced it; callers log it.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::bus::EventBus;

/// A single outbound message: a dotted event type plus a JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub event_type: String,
    pub payload: JsonValue,
    pub emitted_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(event_type: impl Into<String>, payload: JsonValue) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
            emitted_at: Utc::now(),
        }
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Fire-and-forget event emission boundary.
pub trait NotificationSink: Send + Sync {
    fn emit(&self, event_type: &str, payload: JsonValue) -> Result<(), NotifyError>;
}

impl<S> NotificationSink for Arc<S>
where
    S: NotificationSink + ?Sized,
{
    fn emit(&self, event_type: &str, payload: JsonValue) -> Result<(), NotifyError> {
        (**self).emit(event_type, payload)
    }
}

/// Sink that publishes notifications onto an [`EventBus`].
#[derive(Debug)]
pub struct BusNotificationSink<B> {
    bus: B,
}

impl<B> BusNotificationSink<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<B> NotificationSink for BusNotificationSink<B>
where
    B: EventBus<Notification>,
{
    fn emit(&self, event_type: &str, payload: JsonValue) -> Result<(), NotifyError> {
        self.bus
            .publish(Notification::new(event_type, payload))
            .map_err(|e| NotifyError::Transport(format!("{e:?}")))
    }
}

/// Sink that keeps every notification in memory. Used by tests.
#[derive(Debug, Default)]
pub struct RecordingNotificationSink {
    recorded: Mutex<Vec<Notification>>,
}

impl RecordingNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<Notification> {
        self.recorded.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn event_types(&self) -> Vec<String> {
        self.recorded()
            .into_iter()
            .map(|n| n.event_type)
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut r) = self.recorded.lock() {
            r.clear();
        }
    }
}

impl NotificationSink for RecordingNotificationSink {
    fn emit(&self, event_type: &str, payload: JsonValue) -> Result<(), NotifyError> {
        let mut recorded = self
            .recorded
            .lock()
            .map_err(|_| NotifyError::Transport("recording sink lock poisoned".into()))?;
        recorded.push(Notification::new(event_type, payload));
        Ok(())
    }
}
