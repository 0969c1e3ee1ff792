//! `velora-sales` — sales order domain (cart, B2B/B2C policy, confirmation).

pub mod order;

pub use order::{
    payment_terms_for, unit_price_for, AssignTracking, ConfirmOrder, CustomerType, DeliveryMethod,
    LinePrice, MarkInvoiced, OpenOrder, OrderLine, OrderSource, OrderStatus, PaymentTerms,
    ProductAvailability, SalesOrder, SalesOrderCommand, SalesOrderEvent, SalesOrderId,
    SetCustomerType, SetDeliveryMethod, UpdateLine,
};
