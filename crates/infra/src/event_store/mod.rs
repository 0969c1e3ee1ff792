//! Append-only, shop-scoped event storage.

pub mod in_memory;
#[path = "trait.rs"]
pub mod store_trait;

pub use in_memory::InMemoryEventStore;
pub use store_trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
