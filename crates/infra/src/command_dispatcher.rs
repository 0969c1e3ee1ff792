//! Command execution pipeline (application-level orchestration).
//!
//! Implements the command dispatch pattern for event-sourced aggregates:
//!
//! ```text
//! Command
//!   ↓
//! 1. Load events from store (shop-scoped)
//!   ↓
//! 2. Rehydrate aggregate (apply historical events to rebuild state)
//!   ↓
//! 3. Handle command (pure decision logic, produces events)
//!   ↓
//! 4. Persist events to store (append-only, optimistic concurrency check)
//!   ↓
//! 5. Publish events to bus (for projections, handlers, etc.)
//! ```
//!
//! Shop isolation, optimistic concurrency, and event ordering are enforced
//! here so domain code stays pure. If publication fails after a successful
//! append, the error is surfaced but the events are already durable —
//! at-least-once delivery, consumers must be idempotent.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use velora_core::{Aggregate, AggregateId, DomainError, ExpectedVersion, ShopId};
use velora_events::{EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug)]
pub enum DispatchError {
    /// Optimistic concurrency failure (e.g. stale aggregate version).
    Concurrency(String),
    /// Shop isolation violation (cross-shop or cross-aggregate stream mixing).
    ShopIsolation(String),
    /// Domain validation failure (deterministic).
    Validation(String),
    /// Domain invariant failure (deterministic).
    InvariantViolation(String),
    /// Domain authorization failure.
    Unauthorized,
    /// Domain-level not found.
    NotFound,
    /// Failed to deserialize historical event payloads into the aggregate event type.
    Deserialize(String),
    /// Persisting to the event store failed.
    Store(EventStoreError),
    /// Publication failed after a successful append (at-least-once; retry may duplicate).
    Publish(String),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match &value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg.clone()),
            EventStoreError::ShopIsolation(msg) => DispatchError::ShopIsolation(msg.clone()),
            _ => DispatchError::Store(value),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => DispatchError::Validation(msg),
            DomainError::InvariantViolation(msg) => DispatchError::InvariantViolation(msg),
            DomainError::Conflict(msg) => DispatchError::Concurrency(msg),
            DomainError::Unauthorized => DispatchError::Unauthorized,
            DomainError::NotFound => DispatchError::NotFound,
            DomainError::InvalidId(msg) => DispatchError::Validation(msg),
        }
    }
}

/// Reusable command execution engine for event-sourced aggregates.
///
/// Generic over the store and bus so tests run fully in memory and real
/// backends can be swapped in without touching domain code.
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn into_parts(self) -> (S, B) {
        (self.store, self.bus)
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Dispatch a command through the full event-sourcing pipeline.
    ///
    /// The `make_aggregate` closure lets the dispatcher work with any
    /// aggregate type without knowing how to construct it (e.g.
    /// `Product::empty(id)`). Returns the committed events with their
    /// assigned sequence numbers.
    pub fn dispatch<A>(
        &self,
        shop_id: ShopId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        command: A::Command,
        make_aggregate: impl FnOnce(ShopId, AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: velora_events::Event + Serialize + DeserializeOwned,
    {
        // 1) Load history (shop-scoped)
        let history = self.store.load_stream(shop_id, aggregate_id)?;
        validate_loaded_stream(shop_id, aggregate_id, &history)?;
        let expected = ExpectedVersion::Exact(stream_version(&history));

        // 2) Rehydrate aggregate
        let mut aggregate = make_aggregate(shop_id, aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;

        // 3) Decide events (no mutation)
        let decided = aggregate.handle(&command).map_err(DispatchError::from)?;
        if decided.is_empty() {
            return Ok(vec![]);
        }

        // 4) Persist (append-only, optimistic)
        let aggregate_type = aggregate_type.into();
        let uncommitted = decided
            .iter()
            .map(|ev| {
                UncommittedEvent::from_typed(
                    shop_id,
                    aggregate_id,
                    aggregate_type.clone(),
                    Uuid::now_v7(),
                    ev,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let committed = self.store.append(uncommitted, expected)?;

        // 5) Publish committed events (after append)
        for stored in &committed {
            self.bus
                .publish(stored.to_envelope())
                .map_err(|e| DispatchError::Publish(format!("{e:?}")))?;
        }

        Ok(committed)
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream(
    shop_id: ShopId,
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    // Enforce shop isolation even if a buggy backend returns cross-shop data.
    // Also ensure the stream is monotonically increasing by sequence number.
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.shop_id != shop_id {
            return Err(DispatchError::ShopIsolation(format!(
                "loaded stream contains wrong shop_id at index {idx}"
            )));
        }
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::ShopIsolation(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            )));
        }
        if e.sequence_number == 0 {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(
                "stored event has sequence_number=0".to_string(),
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

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    // Ensure deterministic ordering.
    let mut sorted = history.to_vec();
    sorted.sort_by_key(|e| e.sequence_number);

    for stored in sorted {
        let ev: A::Event = serde_json::from_value(stored.payload)
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Arc;

    use velora_events::InMemoryEventBus;
    use velora_inventory::{
        InventoryCommand, LedgerId, MovementReason, OpenLedger, RecordMovement, StockLedger,
    };

    use crate::event_store::InMemoryEventStore;

    type TestBus = InMemoryEventBus<EventEnvelope<JsonValue>>;

    fn dispatcher() -> CommandDispatcher<Arc<InMemoryEventStore>, Arc<TestBus>> {
        CommandDispatcher::new(Arc::new(InMemoryEventStore::new()), Arc::new(TestBus::new()))
    }

    #[test]
    fn dispatch_persists_and_publishes_in_order() {
        let dispatcher = dispatcher();
        let shop_id = ShopId::new();
        let aggregate_id = AggregateId::new();
        let ledger_id = LedgerId::new(aggregate_id);

        let (_store, bus) = (&dispatcher.store, &dispatcher.bus);
        let sub = bus.subscribe();

        let committed = dispatcher
            .dispatch::<StockLedger>(
                shop_id,
                aggregate_id,
                "inventory.ledger",
                InventoryCommand::OpenLedger(OpenLedger {
                    shop_id,
                    ledger_id,
                    occurred_at: Utc::now(),
                }),
                |_s, id| StockLedger::empty(LedgerId::new(id)),
            )
            .unwrap();
        assert_eq!(committed.len(), 1);
        assert_eq!(committed[0].sequence_number, 1);

        let committed = dispatcher
            .dispatch::<StockLedger>(
                shop_id,
                aggregate_id,
                "inventory.ledger",
                InventoryCommand::RecordMovement(RecordMovement {
                    shop_id,
                    ledger_id,
                    delta: 12,
                    reason: MovementReason::Receipt,
                    occurred_at: Utc::now(),
                }),
                |_s, id| StockLedger::empty(LedgerId::new(id)),
            )
            .unwrap();
        assert_eq!(committed[0].sequence_number, 2);

        let first = sub.try_recv().unwrap();
        let second = sub.try_recv().unwrap();
        assert_eq!(first.sequence_number(), 1);
        assert_eq!(second.sequence_number(), 2);
        assert_eq!(first.aggregate_type(), "inventory.ledger");
    }

    #[test]
    fn domain_errors_map_to_dispatch_errors() {
        let dispatcher = dispatcher();
        let shop_id = ShopId::new();
        let aggregate_id = AggregateId::new();
        let ledger_id = LedgerId::new(aggregate_id);

        // Movement without an opened ledger: domain NotFound.
        let err = dispatcher
            .dispatch::<StockLedger>(
                shop_id,
                aggregate_id,
                "inventory.ledger",
                InventoryCommand::RecordMovement(RecordMovement {
                    shop_id,
                    ledger_id,
                    delta: 1,
                    reason: MovementReason::Receipt,
                    occurred_at: Utc::now(),
                }),
                |_s, id| StockLedger::empty(LedgerId::new(id)),
            )
            .unwrap_err();
        assert!(matches!(err, DispatchError::NotFound));
    }

    #[test]
    fn rehydration_reflects_prior_events() {
        let dispatcher = dispatcher();
        let shop_id = ShopId::new();
        let aggregate_id = AggregateId::new();
        let ledger_id = LedgerId::new(aggregate_id);

        dispatcher
            .dispatch::<StockLedger>(
                shop_id,
                aggregate_id,
                "inventory.ledger",
                InventoryCommand::OpenLedger(OpenLedger {
                    shop_id,
                    ledger_id,
                    occurred_at: Utc::now(),
                }),
                |_s, id| StockLedger::empty(LedgerId::new(id)),
            )
            .unwrap();
        dispatcher
            .dispatch::<StockLedger>(
                shop_id,
                aggregate_id,
                "inventory.ledger",
                InventoryCommand::RecordMovement(RecordMovement {
                    shop_id,
                    ledger_id,
                    delta: 3,
                    reason: MovementReason::Receipt,
                    occurred_at: Utc::now(),
                }),
                |_s, id| StockLedger::empty(LedgerId::new(id)),
            )
            .unwrap();

        // Shipping 4 exceeds the rehydrated quantity of 3.
        let err = dispatcher
            .dispatch::<StockLedger>(
                shop_id,
                aggregate_id,
                "inventory.ledger",
                InventoryCommand::RecordMovement(RecordMovement {
                    shop_id,
                    ledger_id,
                    delta: -4,
                    reason: MovementReason::Shipment,
                    occurred_at: Utc::now(),
                }),
                |_s, id| StockLedger::empty(LedgerId::new(id)),
            )
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvariantViolation(_)));
    }
}
