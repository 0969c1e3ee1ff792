use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use velora_core::{Aggregate, AggregateId, AggregateRoot, CustomerId, DomainError, ShopId};
use velora_events::Event;
use velora_sales::SalesOrderId;

/// Invoice identifier (shop-scoped via `shop_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceId(pub AggregateId);

impl InvoiceId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Invoice status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Issued,
    Posted,
}

/// Aggregate root: Invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    id: InvoiceId,
    shop_id: Option<ShopId>,
    order_id: Option<SalesOrderId>,
    customer_id: Option<CustomerId>,
    total: u64,
    due_date: Option<DateTime<Utc>>,
    status: InvoiceStatus,
    version: u64,
    created: bool,
}

impl Invoice {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: InvoiceId) -> Self {
        Self {
            id,
            shop_id: None,
            order_id: None,
            customer_id: None,
            total: 0,
            due_date: None,
            status: InvoiceStatus::Issued,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> InvoiceId {
        self.id
    }

    pub fn shop_id(&self) -> Option<ShopId> {
        self.shop_id
    }

    pub fn order_id(&self) -> Option<SalesOrderId> {
        self.order_id
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn due_date(&self) -> Option<DateTime<Utc>> {
        self.due_date
    }

    pub fn status(&self) -> InvoiceStatus {
        self.status
    }
}

impl AggregateRoot for Invoice {
    type Id = InvoiceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: IssueInvoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueInvoice {
    pub shop_id: ShopId,
    pub invoice_id: InvoiceId,
    pub order_id: SalesOrderId,
    pub customer_id: CustomerId,
    pub total: u64,
    pub due_date: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: PostInvoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostInvoice {
    pub shop_id: ShopId,
    pub invoice_id: InvoiceId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceCommand {
    IssueInvoice(IssueInvoice),
    PostInvoice(PostInvoice),
}

/// Event: InvoiceIssued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceIssued {
    pub shop_id: ShopId,
    pub invoice_id: InvoiceId,
    pub order_id: SalesOrderId,
    pub customer_id: CustomerId,
    pub total: u64,
    pub due_date: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoicePosted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoicePosted {
    pub shop_id: ShopId,
    pub invoice_id: InvoiceId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceEvent {
    InvoiceIssued(InvoiceIssued),
    InvoicePosted(InvoicePosted),
}

impl Event for InvoiceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InvoiceEvent::InvoiceIssued(_) => "invoicing.invoice.issued",
            InvoiceEvent::InvoicePosted(_) => "invoicing.invoice.posted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InvoiceEvent::InvoiceIssued(e) => e.occurred_at,
            InvoiceEvent::InvoicePosted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Invoice {
    type Command = InvoiceCommand;
    type Event = InvoiceEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InvoiceEvent::InvoiceIssued(e) => {
                self.id = e.invoice_id;
                self.shop_id = Some(e.shop_id);
                self.order_id = Some(e.order_id);
                self.customer_id = Some(e.customer_id);
                self.total = e.total;
                self.due_date = Some(e.due_date);
                self.status = InvoiceStatus::Issued;
                self.created = true;
            }
            InvoiceEvent::InvoicePosted(_) => {
                self.status = InvoiceStatus::Posted;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InvoiceCommand::IssueInvoice(cmd) => self.handle_issue(cmd),
            InvoiceCommand::PostInvoice(cmd) => self.handle_post(cmd),
        }
    }
}

impl Invoice {
    fn handle_issue(&self, cmd: &IssueInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("invoice already exists"));
        }

        if cmd.total == 0 {
            return Err(DomainError::validation("invoice total must be positive"));
        }

        if cmd.due_date < cmd.occurred_at {
            return Err(DomainError::validation("due_date cannot be in the past"));
        }

        Ok(vec![InvoiceEvent::InvoiceIssued(InvoiceIssued {
            shop_id: cmd.shop_id,
            invoice_id: cmd.invoice_id,
            order_id: cmd.order_id,
            customer_id: cmd.customer_id,
            total: cmd.total,
            due_date: cmd.due_date,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_post(&self, cmd: &PostInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }

        if self.shop_id != Some(cmd.shop_id) {
            return Err(DomainError::invariant("shop mismatch"));
        }

        if self.id != cmd.invoice_id {
            return Err(DomainError::invariant("invoice_id mismatch"));
        }

        if self.status == InvoiceStatus::Posted {
            return Err(DomainError::conflict("invoice is already posted"));
        }

        Ok(vec![InvoiceEvent::InvoicePosted(InvoicePosted {
            shop_id: cmd.shop_id,
            invoice_id: cmd.invoice_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
