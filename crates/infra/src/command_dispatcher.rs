//! Command execution pipeline (application-level orchestration).
//!
//! ```text
//! Command
//!   ↓
//! 1. Load events from store (owner-scoped)
//!   ↓
//! 2. Rehydrate aggregate (apply historical events to rebuild state)
//!   ↓
//! 3. Handle command (pure decision logic, produces events)
//!   ↓
//! 4. Persist events to store (append-only, optimistic concurrency check)
//!   ↓
//! 5. Publish events to bus
//! ```
//!
//! The same flow serves quotes and invoices. The dispatcher composes the
//! `EventStore` and `EventBus` traits and performs no IO of its own.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

use lumenr_core::{Aggregate, AggregateId, DomainError, ExpectedVersion, UserId};
use lumenr_events::{EventBus, EventEnvelope};

use crate::catalog::CatalogError;
use crate::clients::ClientDirectoryError;
use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Optimistic concurrency failure (stale stream version).
    #[error("concurrency conflict: {0}")]
    Concurrency(String),
    /// A store returned or was handed events of another owner or stream.
    #[error("owner isolation violation: {0}")]
    OwnerIsolation(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("illegal state transition from '{from}' to '{to}'")]
    IllegalTransition { from: String, to: String },
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
    #[error("unauthorized")]
    Unauthorized,
    /// Missing document, or one owned by someone else.
    #[error("not found")]
    NotFound,
    /// Historical payloads no longer match the aggregate's event type.
    #[error("failed to deserialize stored event: {0}")]
    Deserialize(String),
    #[error(transparent)]
    Store(EventStoreError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("client directory failure: {0}")]
    Clients(String),
    /// Publication failed after a successful append.
    #[error("event publication failed: {0}")]
    Publish(String),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            EventStoreError::OwnerIsolation(msg) => DispatchError::OwnerIsolation(msg),
            other => DispatchError::Store(other),
        }
    }
}

impl From<ClientDirectoryError> for DispatchError {
    fn from(value: ClientDirectoryError) -> Self {
        match value {
            ClientDirectoryError::Validation(msg) => DispatchError::Validation(msg),
            ClientDirectoryError::Backend(msg) => DispatchError::Clients(msg),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => DispatchError::Validation(msg),
            DomainError::IllegalTransition { from, to } => {
                DispatchError::IllegalTransition { from, to }
            }
            DomainError::InvariantViolation(msg) => DispatchError::InvariantViolation(msg),
            DomainError::Conflict(msg) => DispatchError::Concurrency(msg),
            DomainError::Unauthorized => DispatchError::Unauthorized,
            DomainError::NotFound => DispatchError::NotFound,
            DomainError::InvalidId(msg) => DispatchError::Validation(msg),
        }
    }
}

/// Result of a successful dispatch: the aggregate after the new events were
/// applied, and the events as stored.
#[derive(Debug, Clone)]
pub struct Committed<A> {
    pub aggregate: A,
    pub events: Vec<StoredEvent>,
}

/// Reusable command execution engine for event-sourced aggregates.
///
/// Events are persisted before publication; if the append fails nothing is
/// published. If publication fails after a successful append the error is
/// returned, but the events stay committed.
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Dispatch a command through the full event-sourcing pipeline.
    ///
    /// The stream is loaded for `owner_id` only, so a document of another owner
    /// rehydrates as empty and the aggregate answers `NotFound`. A stream of
    /// another aggregate type is not found either. The append expects the
    /// exact version that was loaded.
    #[instrument(
        skip(self, command, make_aggregate),
        fields(owner_id = %owner_id, aggregate_id = %aggregate_id),
        err
    )]
    pub async fn dispatch<A>(
        &self,
        owner_id: UserId,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Committed<A>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: lumenr_events::Event + Serialize + DeserializeOwned,
    {
        // 1) Load history (owner-scoped)
        let history = self.store.load_stream(owner_id, aggregate_id).await?;
        validate_loaded_stream(owner_id, aggregate_id, &history)?;
        ensure_stream_type(aggregate_type, &history)?;
        let expected = ExpectedVersion::Exact(stream_version(&history));

        // 2) Rehydrate aggregate
        let mut aggregate = make_aggregate(aggregate_id);
        apply_history(&mut aggregate, &history)?;

        // 3) Decide events (no mutation)
        let decided = aggregate.handle(&command)?;
        if decided.is_empty() {
            return Ok(Committed {
                aggregate,
                events: vec![],
            });
        }

        // 4) Persist (append-only, optimistic)
        let uncommitted = decided
            .iter()
            .map(|ev| {
                UncommittedEvent::from_typed(
                    owner_id,
                    aggregate_id,
                    aggregate_type,
                    Uuid::now_v7(),
                    ev,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let committed = self.store.append(uncommitted, expected).await?;

        for ev in &decided {
            aggregate.apply(ev);
        }

        // 5) Publish committed events (after append)
        for stored in &committed {
            self.bus
                .publish(stored.to_envelope())
                .map_err(|e| DispatchError::Publish(format!("{e:?}")))?;
        }

        Ok(Committed {
            aggregate,
            events: committed,
        })
    }

    /// Rehydrate one aggregate for `owner_id`.
    ///
    /// An unknown stream yields the fresh aggregate from `make_aggregate`;
    /// callers decide whether that means not-found. A stream of another
    /// aggregate type is `NotFound`.
    pub async fn load<A>(
        &self,
        owner_id: UserId,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let history = self.store.load_stream(owner_id, aggregate_id).await?;
        validate_loaded_stream(owner_id, aggregate_id, &history)?;
        ensure_stream_type(aggregate_type, &history)?;

        let mut aggregate = make_aggregate(aggregate_id);
        apply_history(&mut aggregate, &history)?;
        Ok(aggregate)
    }

    /// Rehydrate every aggregate of `aggregate_type` owned by `owner_id`.
    pub async fn load_all<A>(
        &self,
        owner_id: UserId,
        aggregate_type: &str,
        make_aggregate: impl Fn(AggregateId) -> A,
    ) -> Result<Vec<A>, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let ids = self.store.list_aggregates(owner_id, aggregate_type).await?;

        let mut aggregates = Vec::with_capacity(ids.len());
        for id in ids {
            aggregates.push(self.load(owner_id, id, aggregate_type, &make_aggregate).await?);
        }
        Ok(aggregates)
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream(
    owner_id: UserId,
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    // A buggy backend must not leak another owner's events into this stream.
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.owner_id != owner_id {
            return Err(DispatchError::OwnerIsolation(format!(
                "loaded stream contains wrong owner_id at index {idx}"
            )));
        }
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::OwnerIsolation(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            )));
        }
        if e.sequence_number <= last {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                e.sequence_number
            ))));
        }
        last = e.sequence_number;
    }
    Ok(())
}

/// Ids are unique across aggregate types, so an id of another type is simply
/// not a document of the requested kind.
fn ensure_stream_type(aggregate_type: &str, stream: &[StoredEvent]) -> Result<(), DispatchError> {
    match stream.first() {
        Some(first) if first.aggregate_type != aggregate_type => Err(DispatchError::NotFound),
        _ => Ok(()),
    }
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    use lumenr_core::{AggregateRoot, ClientId};
    use lumenr_events::InMemoryEventBus;
    use lumenr_pricing::{ItemKind, LineItem, LineItemId, TaxRate};
    use lumenr_quotes::{CreateQuote, Quote, QuoteCommand, QuoteId, QuoteStatus, SendQuote};

    use crate::event_store::InMemoryEventStore;

    type TestDispatcher =
        CommandDispatcher<Arc<InMemoryEventStore>, Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>>;

    fn dispatcher() -> TestDispatcher {
        CommandDispatcher::new(
            Arc::new(InMemoryEventStore::new()),
            Arc::new(InMemoryEventBus::new()),
        )
    }

    fn create(owner_id: UserId, quote_id: QuoteId) -> QuoteCommand {
        let item = LineItem::priced(
            LineItemId::new(),
            ItemKind::Service,
            None,
            "Consulting",
            "",
            2,
            dec!(100),
        )
        .unwrap();
        QuoteCommand::CreateQuote(CreateQuote {
            owner_id,
            quote_id,
            client_id: ClientId::new(),
            items: vec![item],
            tax_rate: TaxRate::new(dec!(13)).unwrap(),
            notes: None,
            valid_until: None,
            occurred_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
        })
    }

    #[tokio::test]
    async fn dispatch_persists_publishes_and_returns_new_state() {
        let d = dispatcher();
        let subscription = d.bus().subscribe();
        let owner = UserId::new();
        let id = AggregateId::new();

        let committed = d
            .dispatch(owner, id, "quotes.quote", create(owner, QuoteId::new(id)), |id| {
                Quote::empty(QuoteId::new(id))
            })
            .await
            .unwrap();

        assert_eq!(committed.events.len(), 1);
        assert_eq!(committed.aggregate.version(), 1);
        assert_eq!(committed.aggregate.totals().total, dec!(226.00));

        let envelope = subscription.try_recv().unwrap();
        assert_eq!(envelope.event_type(), "quotes.quote.created");
        assert_eq!(envelope.owner_id(), owner);
    }

    #[tokio::test]
    async fn load_replays_the_stream() {
        let d = dispatcher();
        let owner = UserId::new();
        let id = AggregateId::new();
        let quote_id = QuoteId::new(id);
        d.dispatch(owner, id, "quotes.quote", create(owner, quote_id), |id| {
            Quote::empty(QuoteId::new(id))
        })
        .await
        .unwrap();
        d.dispatch(
            owner,
            id,
            "quotes.quote",
            QuoteCommand::SendQuote(SendQuote {
                owner_id: owner,
                quote_id,
                occurred_at: Utc::now(),
            }),
            |id| Quote::empty(QuoteId::new(id)),
        )
        .await
        .unwrap();

        let quote: Quote = d
            .load(owner, id, "quotes.quote", |id| Quote::empty(QuoteId::new(id)))
            .await
            .unwrap();

        assert_eq!(quote.status(), QuoteStatus::Sent);
        assert_eq!(quote.version(), 2);
    }

    #[tokio::test]
    async fn foreign_owner_sees_not_found() {
        let d = dispatcher();
        let owner = UserId::new();
        let intruder = UserId::new();
        let id = AggregateId::new();
        let quote_id = QuoteId::new(id);
        d.dispatch(owner, id, "quotes.quote", create(owner, quote_id), |id| {
            Quote::empty(QuoteId::new(id))
        })
        .await
        .unwrap();

        let err = d
            .dispatch(
                intruder,
                id,
                "quotes.quote",
                QuoteCommand::SendQuote(SendQuote {
                    owner_id: intruder,
                    quote_id,
                    occurred_at: Utc::now(),
                }),
                |id| Quote::empty(QuoteId::new(id)),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::NotFound));
    }

    #[tokio::test]
    async fn domain_errors_do_not_append() {
        let d = dispatcher();
        let owner = UserId::new();
        let id = AggregateId::new();
        let quote_id = QuoteId::new(id);
        d.dispatch(owner, id, "quotes.quote", create(owner, quote_id), |id| {
            Quote::empty(QuoteId::new(id))
        })
        .await
        .unwrap();

        let err = d
            .dispatch(owner, id, "quotes.quote", create(owner, quote_id), |id| {
                Quote::empty(QuoteId::new(id))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::Concurrency(_)));
        assert_eq!(d.store().load_stream(owner, id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn load_all_lists_only_the_owners_documents() {
        let d = dispatcher();
        let owner = UserId::new();
        let other = UserId::new();
        for who in [owner, owner, other] {
            let id = AggregateId::new();
            d.dispatch(who, id, "quotes.quote", create(who, QuoteId::new(id)), |id| {
                Quote::empty(QuoteId::new(id))
            })
            .await
            .unwrap();
        }

        let quotes: Vec<Quote> = d
            .load_all(owner, "quotes.quote", |id| Quote::empty(QuoteId::new(id)))
            .await
            .unwrap();

        assert_eq!(quotes.len(), 2);
        assert!(quotes.iter().all(|q| q.owner_id() == Some(owner)));
    }

    #[tokio::test]
    async fn stream_of_another_type_is_not_found() {
        let d = dispatcher();
        let owner = UserId::new();
        let id = AggregateId::new();
        let quote_id = QuoteId::new(id);
        d.dispatch(owner, id, "quotes.quote", create(owner, quote_id), |id| {
            Quote::empty(QuoteId::new(id))
        })
        .await
        .unwrap();

        let loaded = d
            .load(owner, id, "invoicing.invoice", |id| Quote::empty(QuoteId::new(id)))
            .await;
        let dispatched = d
            .dispatch(
                owner,
                id,
                "invoicing.invoice",
                QuoteCommand::SendQuote(SendQuote {
                    owner_id: owner,
                    quote_id,
                    occurred_at: Utc::now(),
                }),
                |id| Quote::empty(QuoteId::new(id)),
            )
            .await;

        assert!(matches!(loaded, Err(DispatchError::NotFound)));
        assert!(matches!(dispatched, Err(DispatchError::NotFound)));
        assert_eq!(d.store().load_stream(owner, id).await.unwrap().len(), 1);
    }
}
