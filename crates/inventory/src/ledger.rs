use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use velora_core::{Aggregate, AggregateId, AggregateRoot, DomainError, ShopId};
use velora_events::Event;

/// Stock ledger identifier. One ledger exists per product; the ledger shares
/// the product's aggregate id so the stock stream and the catalog stream line
/// up without a mapping table.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LedgerId(pub AggregateId);

impl LedgerId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for LedgerId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Why a stock movement happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementReason {
    Receipt,
    Shipment,
    Adjustment,
}

impl core::str::FromStr for MovementReason {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "receipt" => Ok(MovementReason::Receipt),
            "shipment" => Ok(MovementReason::Shipment),
            "adjustment" => Ok(MovementReason::Adjustment),
            other => Err(DomainError::validation(format!(
                "unknown movement reason '{other}'"
            ))),
        }
    }
}

/// Aggregate root: StockLedger (running quantity per product).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockLedger {
    id: LedgerId,
    shop_id: Option<ShopId>,
    quantity: i64,
    version: u64,
    created: bool,
}

impl StockLedger {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: LedgerId) -> Self {
        Self {
            id,
            shop_id: None,
            quantity: 0,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> LedgerId {
        self.id
    }

    pub fn shop_id(&self) -> Option<ShopId> {
        self.shop_id
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }
}

impl AggregateRoot for StockLedger {
    type Id = LedgerId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: OpenLedger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenLedger {
    pub shop_id: ShopId,
    pub ledger_id: LedgerId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordMovement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMovement {
    pub shop_id: ShopId,
    pub ledger_id: LedgerId,
    pub delta: i64,
    pub reason: MovementReason,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryCommand {
    OpenLedger(OpenLedger),
    RecordMovement(RecordMovement),
}

/// Event: LedgerOpened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerOpened {
    pub shop_id: ShopId,
    pub ledger_id: LedgerId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockMoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMoved {
    pub shop_id: ShopId,
    pub ledger_id: LedgerId,
    pub delta: i64,
    pub reason: MovementReason,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryEvent {
    LedgerOpened(LedgerOpened),
    StockMoved(StockMoved),
}

impl Event for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::LedgerOpened(_) => "inventory.ledger.opened",
            InventoryEvent::StockMoved(_) => "inventory.ledger.stock_moved",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InventoryEvent::LedgerOpened(e) => e.occurred_at,
            InventoryEvent::StockMoved(e) => e.occurred_at,
        }
    }
}

impl Aggregate for StockLedger {
    type Command = InventoryCommand;
    type Event = InventoryEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InventoryEvent::LedgerOpened(e) => {
                self.id = e.ledger_id;
                self.shop_id = Some(e.shop_id);
                self.quantity = 0;
                self.created = true;
            }
            InventoryEvent::StockMoved(e) => {
                self.quantity += e.delta;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InventoryCommand::OpenLedger(cmd) => self.handle_open(cmd),
            InventoryCommand::RecordMovement(cmd) => self.handle_movement(cmd),
        }
    }
}

impl StockLedger {
    fn ensure_shop(&self, shop_id: ShopId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.shop_id != Some(shop_id) {
            return Err(DomainError::invariant("shop mismatch"));
        }
        Ok(())
    }

    fn ensure_ledger_id(&self, ledger_id: LedgerId) -> Result<(), DomainError> {
        if self.id != ledger_id {
            return Err(DomainError::invariant("ledger_id mismatch"));
        }
        Ok(())
    }

    fn handle_open(&self, cmd: &OpenLedger) -> Result<Vec<InventoryEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("ledger already exists"));
        }
        Ok(vec![InventoryEvent::LedgerOpened(LedgerOpened {
            shop_id: cmd.shop_id,
            ledger_id: cmd.ledger_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_movement(&self, cmd: &RecordMovement) -> Result<Vec<InventoryEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_shop(cmd.shop_id)?;
        self.ensure_ledger_id(cmd.ledger_id)?;

        if cmd.delta == 0 {
            return Err(DomainError::validation("delta cannot be zero"));
        }

        let new_quantity = self.quantity + cmd.delta;
        if new_quantity < 0 {
            return Err(DomainError::invariant("stock cannot go negative"));
        }

        Ok(vec![InventoryEvent::StockMoved(StockMoved {
            shop_id: cmd.shop_id,
            ledger_id: cmd.ledger_id,
            delta: cmd.delta,
            reason: cmd.reason,
            occurred_at: cmd.occurred_at,
        })])
    }
}
