//! `velora-infra` — infrastructure composition for the storefront platform.
//!
//! Event store + bus wiring, the command dispatch pipeline, and the
//! disposable read models (projections) the HTTP layer queries.

pub mod command_dispatcher;
pub mod event_store;
pub mod projections;
pub mod read_model;

pub use command_dispatcher::{CommandDispatcher, DispatchError};
pub use event_store::{EventStore, EventStoreError, InMemoryEventStore, StoredEvent, UncommittedEvent};
pub use read_model::{paginate, InMemoryShopStore, Page, Paged, ShopStore, PAGE_SIZE};
