//! Service wiring: event store, notification bus, catalog and the order
//! services, plus the bus → SSE bridge.

use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use tokio::sync::broadcast;
use tokio_stream::{StreamExt, wrappers::BroadcastStream};

use brigade_catalog::InMemoryCatalog;
use brigade_core::InMemorySequence;
use brigade_events::{BusNotificationSink, EventBus, InMemoryEventBus, Notification};
use brigade_infra::{
    AppConfig, InMemoryEventStore, KitchenDispatcher, OrderCore, OrderService, PaymentReconciler,
};

/// Everything the handlers need, shared behind an `Arc`.
pub struct AppServices {
    pub orders: OrderService,
    pub kitchen: KitchenDispatcher,
    pub payments: PaymentReconciler,
    pub catalog: Arc<InMemoryCatalog>,
    realtime_tx: broadcast::Sender<Notification>,
}

impl AppServices {
    pub fn realtime_tx(&self) -> &broadcast::Sender<Notification> {
        &self.realtime_tx
    }
}

/// In-memory wiring (single process). Must run inside a tokio runtime: the
/// notification bridge runs on a blocking task.
pub fn build_services(config: &AppConfig, catalog: Arc<InMemoryCatalog>) -> AppServices {
    let store = Arc::new(InMemoryEventStore::new());
    let bus: Arc<InMemoryEventBus<Notification>> = Arc::new(InMemoryEventBus::new());
    let notifier = Arc::new(BusNotificationSink::new(bus.clone()));

    let core = OrderCore::new(
        store,
        notifier,
        catalog.clone(),
        catalog.clone(),
        Arc::new(InMemorySequence::new()),
    )
    .with_max_retries(config.max_conflict_retries);

    let (realtime_tx, _realtime_rx) = broadcast::channel::<Notification>(config.notification_buffer.max(1));

    // Background bridge: bus -> broadcast (lossy; no backpressure on the core).
    // Ends once every publisher is dropped.
    {
        let sub = bus.subscribe();
        let realtime_tx = realtime_tx.clone();
        tokio::task::spawn_blocking(move || {
            while let Ok(notification) = sub.recv() {
                let _ = realtime_tx.send(notification);
            }
            tracing::debug!("notification bus closed; bridge stopped");
        });
    }

    AppServices {
        orders: OrderService::new(core.clone()),
        kitchen: KitchenDispatcher::new(core.clone()),
        payments: PaymentReconciler::new(core),
        catalog,
        realtime_tx,
    }
}

pub fn notification_sse_stream(
    services: Arc<AppServices>,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = services.realtime_tx().subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(n) => {
            let data = serde_json::to_string(&n).unwrap_or_else(|_| "{}".to_string());
            Some(Ok(SseEvent::default().event(n.event_type).data(data)))
        }
        Err(err) => {
            tracing::warn!(error = %err, "sse subscriber lagged; notifications dropped");
            None
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
