//! Command execution pipeline for event-sourced aggregates.
//!
//! ```text
//! Command
//!   ↓
//! 1. Load the aggregate stream
//!   ↓
//! 2. Rehydrate (apply history to a fresh aggregate)
//!   ↓
//! 3. Handle command (pure decision, produces events)
//!   ↓
//! 4. Append with ExpectedVersion::Exact(loaded version)
//!   ↓
//! 5. Emit one notification per committed event (fire-and-forget)
//! ```
//!
//! A version conflict at step 4 means another actor committed to the same
//! stream in between. `execute_with_retry` re-runs steps 1-4 from a fresh load,
//! rebuilding the command against the new state, a bounded number of times.
//! Different aggregates are different streams and never contend.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value as JsonValue, json};
use thiserror::Error;
use uuid::Uuid;

use brigade_core::{Aggregate, AggregateId, AggregateRoot, DomainError, ExpectedVersion};
use brigade_events::NotificationSink;

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Deterministic domain failure, surfaced unmodified.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Optimistic concurrency failure (retries exhausted or not attempted).
    #[error("concurrency conflict: {0}")]
    Concurrency(String),

    /// Historical payload could not be deserialized into the aggregate event type.
    #[error("failed to deserialize stored event: {0}")]
    Deserialize(String),

    /// The event store failed.
    #[error(transparent)]
    Store(EventStoreError),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            other => DispatchError::Store(other),
        }
    }
}

impl DispatchError {
    pub fn is_concurrency(&self) -> bool {
        matches!(
            self,
            DispatchError::Concurrency(_) | DispatchError::Domain(DomainError::Conflict(_))
        )
    }
}

/// Result of a successful dispatch: the aggregate after the committed events
/// and the events as stored.
#[derive(Debug, Clone)]
pub struct Executed<A> {
    pub aggregate: A,
    pub committed: Vec<StoredEvent>,
}

/// Reusable command execution engine for event-sourced aggregates.
///
/// - `S`: event store
/// - `N`: notification sink receiving committed events
#[derive(Debug)]
pub struct CommandDispatcher<S, N> {
    store: S,
    notifier: N,
}

impl<S, N> CommandDispatcher<S, N> {
    pub fn new(store: S, notifier: N) -> Self {
        Self { store, notifier }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }
}

impl<S, N> CommandDispatcher<S, N>
where
    S: EventStore,
    N: NotificationSink,
{
    /// Load and rehydrate an aggregate (a fresh instance when the stream is empty).
    pub async fn load<A>(
        &self,
        aggregate_id: AggregateId,
        make_aggregate: impl FnOnce(AggregateId) -> A + Send,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate + Send,
        A::Event: DeserializeOwned,
    {
        let history = self.store.load_stream(aggregate_id).await?;
        validate_loaded_stream(aggregate_id, &history)?;

        let mut aggregate = make_aggregate(aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;
        Ok(aggregate)
    }

    /// Dispatch a single command once (no retry on conflict).
    pub async fn dispatch<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A + Send,
    ) -> Result<Executed<A>, DispatchError>
    where
        A: Aggregate<Error = DomainError> + Send,
        A::Command: Send + Sync,
        A::Event: brigade_events::Event + Serialize + DeserializeOwned + Send + Sync,
    {
        let aggregate = self.load(aggregate_id, make_aggregate).await?;
        self.commit(aggregate_id, aggregate_type, aggregate, &command).await
    }

    /// Build a command from freshly loaded state, decide, and append; on a
    /// version conflict start over from a new load, at most `max_retries` extra
    /// times.
    ///
    /// `build` may run more than once. It must derive the intent from the
    /// aggregate it is given, never from state cached by the caller.
    pub async fn execute_with_retry<A, F, B>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        make_aggregate: F,
        mut build: B,
        max_retries: u32,
    ) -> Result<Executed<A>, DispatchError>
    where
        A: Aggregate<Error = DomainError> + Send,
        A::Command: Send + Sync,
        A::Event: brigade_events::Event + Serialize + DeserializeOwned + Send + Sync,
        F: Fn(AggregateId) -> A + Send + Sync,
        B: FnMut(&A) -> Result<A::Command, DomainError> + Send,
    {
        let mut attempt = 0u32;
        loop {
            let aggregate = self.load(aggregate_id, &make_aggregate).await?;
            let command = build(&aggregate)?;

            match self.commit(aggregate_id, aggregate_type, aggregate, &command).await {
                Err(err) if err.is_concurrency() && attempt < max_retries => {
                    attempt += 1;
                    tracing::debug!(
                        %aggregate_id,
                        attempt,
                        max_retries,
                        error = %err,
                        "version conflict; retrying from a fresh load"
                    );
                }
                other => return other,
            }
        }
    }

    async fn commit<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        mut aggregate: A,
        command: &A::Command,
    ) -> Result<Executed<A>, DispatchError>
    where
        A: Aggregate<Error = DomainError> + Send,
        A::Command: Send + Sync,
        A::Event: brigade_events::Event + Serialize + DeserializeOwned + Send + Sync,
    {
        let decided = aggregate.handle(command)?;
        if decided.is_empty() {
            return Ok(Executed {
                aggregate,
                committed: vec![],
            });
        }

        let expected = ExpectedVersion::Exact(aggregate.version());
        let uncommitted = decided
            .iter()
            .map(|ev| UncommittedEvent::from_typed(aggregate_id, aggregate_type, Uuid::now_v7(), ev))
            .collect::<Result<Vec<_>, _>>()?;

        let committed = self.store.append(uncommitted, expected).await?;
        for ev in &decided {
            aggregate.apply(ev);
        }

        tracing::debug!(
            %aggregate_id,
            aggregate_type,
            events = committed.len(),
            version = aggregate.version(),
            "events committed"
        );

        self.emit_committed(&committed);

        Ok(Executed {
            aggregate,
            committed,
        })
    }

    /// Emission happens strictly after the append; failures are logged and
    /// never undo or fail the commit.
    fn emit_committed(&self, committed: &[StoredEvent]) {
        for stored in committed {
            let payload = notification_payload(stored);
            if let Err(err) = self.notifier.emit(&stored.event_type, payload) {
                tracing::warn!(
                    aggregate_id = %stored.aggregate_id,
                    event_type = %stored.event_type,
                    error = %err,
                    "failed to emit notification for committed event"
                );
            }
        }
    }
}

fn notification_payload(stored: &StoredEvent) -> JsonValue {
    json!({
        "aggregate_id": stored.aggregate_id,
        "aggregate_type": stored.aggregate_type,
        "sequence_number": stored.sequence_number,
        "occurred_at": stored.occurred_at,
        "event": stored.payload,
    })
}

fn validate_loaded_stream(aggregate_id: AggregateId, stream: &[StoredEvent]) -> Result<(), DispatchError> {
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            ))));
        }
        if e.sequence_number != last + 1 {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "non-contiguous sequence_number in loaded stream (last={last}, found={})",
                e.sequence_number
            ))));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    for stored in history {
        let ev: A::Event = serde_json::from_value(stored.payload.clone())
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }
    Ok(())
}
