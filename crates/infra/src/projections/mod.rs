//! Disposable read models maintained from the event stream.
//!
//! Every projection follows the same contract: consume published envelopes,
//! enforce shop isolation and per-stream monotonic sequence cursors
//! (idempotent under at-least-once delivery), and stay rebuildable from
//! scratch.

pub mod catalog;
mod cursor;
pub mod invoices;
pub mod reviews;
pub mod sales_orders;
pub mod stock;
pub mod wishlist;
