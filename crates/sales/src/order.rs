use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use velora_catalog::ProductId;
use velora_core::{Aggregate, AggregateId, AggregateRoot, CustomerId, DomainError, ShopId};
use velora_events::Event;

/// Sales order identifier (shop-scoped via `shop_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SalesOrderId(pub AggregateId);

impl SalesOrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for SalesOrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Retail vs. business customer classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerType {
    B2c,
    B2b,
}

impl CustomerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerType::B2c => "b2c",
            CustomerType::B2b => "b2b",
        }
    }
}

impl core::str::FromStr for CustomerType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "b2c" => Ok(CustomerType::B2c),
            "b2b" => Ok(CustomerType::B2b),
            other => Err(DomainError::validation(format!(
                "unknown customer type '{other}'"
            ))),
        }
    }
}

/// How the order reached the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSource {
    Storefront,
    Backoffice,
}

/// Delivery options offered at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMethod {
    Standard,
    Express,
    Pickup,
}

impl core::str::FromStr for DeliveryMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(DeliveryMethod::Standard),
            "express" => Ok(DeliveryMethod::Express),
            "pickup" => Ok(DeliveryMethod::Pickup),
            other => Err(DomainError::validation(format!(
                "unknown delivery method '{other}'"
            ))),
        }
    }
}

/// Payment terms derived from the customer type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentTerms {
    #[serde(rename = "immediate")]
    Immediate,
    #[serde(rename = "30_days")]
    Net30,
}

impl PaymentTerms {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentTerms::Immediate => "immediate",
            PaymentTerms::Net30 => "30_days",
        }
    }

    /// Days until payment is due.
    pub fn due_in_days(&self) -> i64 {
        match self {
            PaymentTerms::Immediate => 0,
            PaymentTerms::Net30 => 30,
        }
    }
}

/// Terms policy: retail pays immediately, business on 30-day terms.
pub fn payment_terms_for(customer_type: CustomerType) -> PaymentTerms {
    match customer_type {
        CustomerType::B2c => PaymentTerms::Immediate,
        CustomerType::B2b => PaymentTerms::Net30,
    }
}

/// Pricing policy: business customers get the configured B2B price when one
/// exists, the list price otherwise.
pub fn unit_price_for(customer_type: CustomerType, list_price: u64, b2b_price: Option<u64>) -> u64 {
    match customer_type {
        CustomerType::B2c => list_price,
        CustomerType::B2b => b2b_price.unwrap_or(list_price),
    }
}

/// Sales order status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Draft,
    Confirmed,
    Invoiced,
}

/// Order line: product, quantity, unit price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub line_no: u32,
    pub product_id: ProductId,
    pub quantity: i64,
    /// Price in smallest currency unit (e.g., cents).
    pub unit_price: u64,
}

/// Availability snapshot entry passed into stock-sensitive commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductAvailability {
    pub product_id: ProductId,
    pub quantity_available: i64,
}

/// Price book entry for customer-type repricing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinePrice {
    pub product_id: ProductId,
    pub unit_price: u64,
}

/// Aggregate root: SalesOrder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalesOrder {
    id: SalesOrderId,
    shop_id: Option<ShopId>,
    customer_id: Option<CustomerId>,
    customer_type: CustomerType,
    source: OrderSource,
    status: OrderStatus,
    delivery_method: Option<DeliveryMethod>,
    tracking_number: Option<String>,
    payment_terms: PaymentTerms,
    lines: Vec<OrderLine>,
    version: u64,
    created: bool,
}

impl SalesOrder {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: SalesOrderId) -> Self {
        Self {
            id,
            shop_id: None,
            customer_id: None,
            customer_type: CustomerType::B2c,
            source: OrderSource::Storefront,
            status: OrderStatus::Draft,
            delivery_method: None,
            tracking_number: None,
            payment_terms: PaymentTerms::Immediate,
            lines: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> SalesOrderId {
        self.id
    }

    pub fn shop_id(&self) -> Option<ShopId> {
        self.shop_id
    }

    pub fn customer_id(&self) -> Option<CustomerId> {
        self.customer_id
    }

    pub fn customer_type(&self) -> CustomerType {
        self.customer_type
    }

    pub fn source(&self) -> OrderSource {
        self.source
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn delivery_method(&self) -> Option<DeliveryMethod> {
        self.delivery_method
    }

    pub fn tracking_number(&self) -> Option<&str> {
        self.tracking_number.as_deref()
    }

    pub fn payment_terms(&self) -> PaymentTerms {
        self.payment_terms
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn is_modifiable(&self) -> bool {
        matches!(self.status, OrderStatus::Draft)
    }

    /// Order total in smallest currency unit.
    pub fn total(&self) -> u64 {
        self.lines
            .iter()
            .map(|l| l.quantity.max(0) as u64 * l.unit_price)
            .sum()
    }
}

impl AggregateRoot for SalesOrder {
    type Id = SalesOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: OpenOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenOrder {
    pub shop_id: ShopId,
    pub order_id: SalesOrderId,
    pub customer_id: CustomerId,
    pub source: OrderSource,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateLine (cart add/set semantics; quantity 0 removes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateLine {
    pub shop_id: ShopId,
    pub order_id: SalesOrderId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: u64,
    /// Availability snapshot taken by the caller at request time.
    pub quantity_available: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetCustomerType (draft-only; reprices every line).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetCustomerType {
    pub shop_id: ShopId,
    pub order_id: SalesOrderId,
    pub customer_type: CustomerType,
    pub price_book: Vec<LinePrice>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetDeliveryMethod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetDeliveryMethod {
    pub shop_id: ShopId,
    pub order_id: SalesOrderId,
    pub delivery_method: DeliveryMethod,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ConfirmOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmOrder {
    pub shop_id: ShopId,
    pub order_id: SalesOrderId,
    /// Availability snapshot taken by the caller at confirmation time.
    pub availability: Vec<ProductAvailability>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AssignTracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignTracking {
    pub shop_id: ShopId,
    pub order_id: SalesOrderId,
    pub tracking_number: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkInvoiced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkInvoiced {
    pub shop_id: ShopId,
    pub order_id: SalesOrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SalesOrderCommand {
    OpenOrder(OpenOrder),
    UpdateLine(UpdateLine),
    SetCustomerType(SetCustomerType),
    SetDeliveryMethod(SetDeliveryMethod),
    ConfirmOrder(ConfirmOrder),
    AssignTracking(AssignTracking),
    MarkInvoiced(MarkInvoiced),
}

/// Event: OrderOpened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderOpened {
    pub shop_id: ShopId,
    pub order_id: SalesOrderId,
    pub customer_id: CustomerId,
    pub customer_type: CustomerType,
    pub source: OrderSource,
    pub payment_terms: PaymentTerms,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineUpdated {
    pub shop_id: ShopId,
    pub order_id: SalesOrderId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineRemoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRemoved {
    pub shop_id: ShopId,
    pub order_id: SalesOrderId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CustomerTypeChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerTypeChanged {
    pub shop_id: ShopId,
    pub order_id: SalesOrderId,
    pub customer_type: CustomerType,
    pub payment_terms: PaymentTerms,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineRepriced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRepriced {
    pub shop_id: ShopId,
    pub order_id: SalesOrderId,
    pub line_no: u32,
    pub unit_price: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DeliveryMethodSet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryMethodSet {
    pub shop_id: ShopId,
    pub order_id: SalesOrderId,
    pub delivery_method: DeliveryMethod,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderConfirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderConfirmed {
    pub shop_id: ShopId,
    pub order_id: SalesOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TrackingAssigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingAssigned {
    pub shop_id: ShopId,
    pub order_id: SalesOrderId,
    pub tracking_number: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderInvoiced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderInvoiced {
    pub shop_id: ShopId,
    pub order_id: SalesOrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SalesOrderEvent {
    OrderOpened(OrderOpened),
    LineUpdated(LineUpdated),
    LineRemoved(LineRemoved),
    CustomerTypeChanged(CustomerTypeChanged),
    LineRepriced(LineRepriced),
    DeliveryMethodSet(DeliveryMethodSet),
    OrderConfirmed(OrderConfirmed),
    TrackingAssigned(TrackingAssigned),
    OrderInvoiced(OrderInvoiced),
}

impl Event for SalesOrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SalesOrderEvent::OrderOpened(_) => "sales.order.opened",
            SalesOrderEvent::LineUpdated(_) => "sales.order.line_updated",
            SalesOrderEvent::LineRemoved(_) => "sales.order.line_removed",
            SalesOrderEvent::CustomerTypeChanged(_) => "sales.order.customer_type_changed",
            SalesOrderEvent::LineRepriced(_) => "sales.order.line_repriced",
            SalesOrderEvent::DeliveryMethodSet(_) => "sales.order.delivery_method_set",
            SalesOrderEvent::OrderConfirmed(_) => "sales.order.confirmed",
            SalesOrderEvent::TrackingAssigned(_) => "sales.order.tracking_assigned",
            SalesOrderEvent::OrderInvoiced(_) => "sales.order.invoiced",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SalesOrderEvent::OrderOpened(e) => e.occurred_at,
            SalesOrderEvent::LineUpdated(e) => e.occurred_at,
            SalesOrderEvent::LineRemoved(e) => e.occurred_at,
            SalesOrderEvent::CustomerTypeChanged(e) => e.occurred_at,
            SalesOrderEvent::LineRepriced(e) => e.occurred_at,
            SalesOrderEvent::DeliveryMethodSet(e) => e.occurred_at,
            SalesOrderEvent::OrderConfirmed(e) => e.occurred_at,
            SalesOrderEvent::TrackingAssigned(e) => e.occurred_at,
            SalesOrderEvent::OrderInvoiced(e) => e.occurred_at,
        }
    }
}

impl Aggregate for SalesOrder {
    type Command = SalesOrderCommand;
    type Event = SalesOrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SalesOrderEvent::OrderOpened(e) => {
                self.id = e.order_id;
                self.shop_id = Some(e.shop_id);
                self.customer_id = Some(e.customer_id);
                self.customer_type = e.customer_type;
                self.source = e.source;
                self.status = OrderStatus::Draft;
                self.payment_terms = e.payment_terms;
                self.lines.clear();
                self.created = true;
            }
            SalesOrderEvent::LineUpdated(e) => {
                if let Some(line) = self.lines.iter_mut().find(|l| l.product_id == e.product_id) {
                    line.quantity = e.quantity;
                    line.unit_price = e.unit_price;
                } else {
                    let line_no = (self.lines.len() as u32) + 1;
                    self.lines.push(OrderLine {
                        line_no,
                        product_id: e.product_id,
                        quantity: e.quantity,
                        unit_price: e.unit_price,
                    });
                }
            }
            SalesOrderEvent::LineRemoved(e) => {
                self.lines.retain(|l| l.product_id != e.product_id);
            }
            SalesOrderEvent::CustomerTypeChanged(e) => {
                self.customer_type = e.customer_type;
                self.payment_terms = e.payment_terms;
            }
            SalesOrderEvent::LineRepriced(e) => {
                if let Some(line) = self.lines.iter_mut().find(|l| l.line_no == e.line_no) {
                    line.unit_price = e.unit_price;
                }
            }
            SalesOrderEvent::DeliveryMethodSet(e) => {
                self.delivery_method = Some(e.delivery_method);
            }
            SalesOrderEvent::OrderConfirmed(_) => {
                self.status = OrderStatus::Confirmed;
            }
            SalesOrderEvent::TrackingAssigned(e) => {
                self.tracking_number = Some(e.tracking_number.clone());
            }
            SalesOrderEvent::OrderInvoiced(_) => {
                self.status = OrderStatus::Invoiced;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SalesOrderCommand::OpenOrder(cmd) => self.handle_open(cmd),
            SalesOrderCommand::UpdateLine(cmd) => self.handle_update_line(cmd),
            SalesOrderCommand::SetCustomerType(cmd) => self.handle_set_customer_type(cmd),
            SalesOrderCommand::SetDeliveryMethod(cmd) => self.handle_set_delivery(cmd),
            SalesOrderCommand::ConfirmOrder(cmd) => self.handle_confirm(cmd),
            SalesOrderCommand::AssignTracking(cmd) => self.handle_assign_tracking(cmd),
            SalesOrderCommand::MarkInvoiced(cmd) => self.handle_mark_invoiced(cmd),
        }
    }
}

impl SalesOrder {
    fn ensure_shop(&self, shop_id: ShopId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.shop_id != Some(shop_id) {
            return Err(DomainError::invariant("shop mismatch"));
        }
        Ok(())
    }

    fn ensure_order_id(&self, order_id: SalesOrderId) -> Result<(), DomainError> {
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    fn ensure_exists(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn ensure_draft(&self) -> Result<(), DomainError> {
        if !self.is_modifiable() {
            return Err(DomainError::invariant(
                "cannot modify order once it is confirmed or invoiced",
            ));
        }
        Ok(())
    }

    fn handle_open(&self, cmd: &OpenOrder) -> Result<Vec<SalesOrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("order already exists"));
        }

        // Storefront orders start as retail; the type can be switched before
        // confirmation.
        let customer_type = CustomerType::B2c;

        Ok(vec![SalesOrderEvent::OrderOpened(OrderOpened {
            shop_id: cmd.shop_id,
            order_id: cmd.order_id,
            customer_id: cmd.customer_id,
            customer_type,
            source: cmd.source,
            payment_terms: payment_terms_for(customer_type),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_line(&self, cmd: &UpdateLine) -> Result<Vec<SalesOrderEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_shop(cmd.shop_id)?;
        self.ensure_order_id(cmd.order_id)?;
        self.ensure_draft()?;

        if cmd.quantity < 0 {
            return Err(DomainError::validation("quantity cannot be negative"));
        }

        if cmd.quantity == 0 {
            if self.lines.iter().any(|l| l.product_id == cmd.product_id) {
                return Ok(vec![SalesOrderEvent::LineRemoved(LineRemoved {
                    shop_id: cmd.shop_id,
                    order_id: cmd.order_id,
                    product_id: cmd.product_id,
                    occurred_at: cmd.occurred_at,
                })]);
            }
            return Err(DomainError::validation("no line to remove for product"));
        }

        if cmd.unit_price == 0 {
            return Err(DomainError::validation("unit_price must be positive"));
        }

        if cmd.quantity > cmd.quantity_available {
            return Err(DomainError::invariant(format!(
                "insufficient stock for product {}: requested {}, available {}",
                cmd.product_id, cmd.quantity, cmd.quantity_available
            )));
        }

        Ok(vec![SalesOrderEvent::LineUpdated(LineUpdated {
            shop_id: cmd.shop_id,
            order_id: cmd.order_id,
            product_id: cmd.product_id,
            quantity: cmd.quantity,
            unit_price: cmd.unit_price,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_customer_type(
        &self,
        cmd: &SetCustomerType,
    ) -> Result<Vec<SalesOrderEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_shop(cmd.shop_id)?;
        self.ensure_order_id(cmd.order_id)?;
        self.ensure_draft()?;

        if cmd.customer_type == self.customer_type {
            return Err(DomainError::conflict("customer type unchanged"));
        }

        let mut events = vec![SalesOrderEvent::CustomerTypeChanged(CustomerTypeChanged {
            shop_id: cmd.shop_id,
            order_id: cmd.order_id,
            customer_type: cmd.customer_type,
            payment_terms: payment_terms_for(cmd.customer_type),
            occurred_at: cmd.occurred_at,
        })];

        // Every line is repriced from the supplied price book.
        for line in &self.lines {
            let price = cmd
                .price_book
                .iter()
                .find(|p| p.product_id == line.product_id)
                .ok_or_else(|| {
                    DomainError::validation(format!(
                        "price book is missing product {}",
                        line.product_id
                    ))
                })?;

            events.push(SalesOrderEvent::LineRepriced(LineRepriced {
                shop_id: cmd.shop_id,
                order_id: cmd.order_id,
                line_no: line.line_no,
                unit_price: price.unit_price,
                occurred_at: cmd.occurred_at,
            }));
        }

        Ok(events)
    }

    fn handle_set_delivery(
        &self,
        cmd: &SetDeliveryMethod,
    ) -> Result<Vec<SalesOrderEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_shop(cmd.shop_id)?;
        self.ensure_order_id(cmd.order_id)?;
        self.ensure_draft()?;

        Ok(vec![SalesOrderEvent::DeliveryMethodSet(DeliveryMethodSet {
            shop_id: cmd.shop_id,
            order_id: cmd.order_id,
            delivery_method: cmd.delivery_method,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_confirm(&self, cmd: &ConfirmOrder) -> Result<Vec<SalesOrderEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_shop(cmd.shop_id)?;
        self.ensure_order_id(cmd.order_id)?;

        if self.status != OrderStatus::Draft {
            return Err(DomainError::invariant("only draft orders can be confirmed"));
        }

        if self.lines.is_empty() {
            return Err(DomainError::validation("cannot confirm order without lines"));
        }

        // Best-effort availability check against the caller's snapshot; the
        // first insufficient line blocks the transition.
        for line in &self.lines {
            let available = cmd
                .availability
                .iter()
                .find(|a| a.product_id == line.product_id)
                .map(|a| a.quantity_available)
                .unwrap_or(0);

            if line.quantity > available {
                return Err(DomainError::invariant(format!(
                    "insufficient stock for product {}: requested {}, available {}",
                    line.product_id, line.quantity, available
                )));
            }
        }

        Ok(vec![SalesOrderEvent::OrderConfirmed(OrderConfirmed {
            shop_id: cmd.shop_id,
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_assign_tracking(
        &self,
        cmd: &AssignTracking,
    ) -> Result<Vec<SalesOrderEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_shop(cmd.shop_id)?;
        self.ensure_order_id(cmd.order_id)?;

        if self.status == OrderStatus::Draft {
            return Err(DomainError::invariant(
                "tracking can only be assigned after confirmation",
            ));
        }

        if cmd.tracking_number.trim().is_empty() {
            return Err(DomainError::validation("tracking_number cannot be empty"));
        }

        if self.tracking_number.is_some() {
            return Err(DomainError::conflict("tracking number already assigned"));
        }

        Ok(vec![SalesOrderEvent::TrackingAssigned(TrackingAssigned {
            shop_id: cmd.shop_id,
            order_id: cmd.order_id,
            tracking_number: cmd.tracking_number.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_invoiced(
        &self,
        cmd: &MarkInvoiced,
    ) -> Result<Vec<SalesOrderEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_shop(cmd.shop_id)?;
        self.ensure_order_id(cmd.order_id)?;

        if self.status != OrderStatus::Confirmed {
            return Err(DomainError::invariant(
                "cannot invoice order that is not confirmed",
            ));
        }

        Ok(vec![SalesOrderEvent::OrderInvoiced(OrderInvoiced {
            shop_id: cmd.shop_id,
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
