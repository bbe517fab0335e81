//! Infrastructure layer: event storage, command dispatch, collaborators
//! (catalog, clients, tax rates) and the application services built on them.

use std::sync::Arc;

use serde_json::Value as JsonValue;

use lumenr_events::{EventEnvelope, InMemoryEventBus};

pub mod catalog;
pub mod clients;
pub mod command_dispatcher;
pub mod conversion;
pub mod event_store;
pub mod expiry;
pub mod invoices;
pub mod pricing;
pub mod quotes;

#[cfg(test)]
mod testing;

/// Bus carrying committed events as JSON envelopes.
pub type EnvelopeBus = InMemoryEventBus<EventEnvelope<JsonValue>>;

/// Dispatcher over a type-erased store, shared by every service.
pub type Dispatcher =
    command_dispatcher::CommandDispatcher<Arc<dyn event_store::EventStore>, Arc<EnvelopeBus>>;
