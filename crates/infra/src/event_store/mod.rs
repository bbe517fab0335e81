//! Append-only event store boundary.
//!
//! Owner-scoped event streams, one per quote or invoice, behind a storage
//! agnostic trait with in-memory and Postgres backends.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
