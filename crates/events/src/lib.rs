//! Domain events and their distribution.
//!
//! Quotes and invoices emit typed events; the infrastructure layer persists
//! them as JSON and publishes envelopes on a bus for downstream consumers.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
