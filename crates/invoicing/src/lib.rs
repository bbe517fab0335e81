//! Invoicing domain module (event-sourced).
//!
//! Invoices are either created standalone or issued from an accepted quote as
//! a by-value snapshot. After issue they follow their own payment lifecycle.

pub mod invoice;

pub use invoice::{
    AttachInvoicePdf, CancelInvoice, CreateInvoice, Invoice, InvoiceCancelled, InvoiceCommand,
    InvoiceEvent, InvoiceId, InvoiceIssued, InvoiceMarkedOverdue, InvoicePdfAttached,
    InvoiceStatus, IssueInvoiceFromQuote, MarkOverdue, PaymentRegistered, RegisterPayment,
};
