//! `velora-invoicing` — invoices issued for confirmed storefront orders.

pub mod invoice;

pub use invoice::{
    Invoice, InvoiceCommand, InvoiceEvent, InvoiceId, InvoiceStatus, IssueInvoice, PostInvoice,
};
