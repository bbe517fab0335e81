//! Quotes domain module (event-sourced).
//!
//! Business rules for the quote lifecycle: draft, sent, then accepted,
//! rejected or expired. Pure domain logic; persistence and conversion into
//! invoices live in `lumenr-infra`.

pub mod quote;

pub use quote::{
    AcceptQuote, AttachQuotePdf, CreateQuote, ExpireQuote, Quote, QuoteAccepted, QuoteCommand,
    QuoteCreated, QuoteEvent, QuoteExpired, QuoteId, QuotePdfAttached, QuoteRejected, QuoteRevised,
    QuoteSent, QuoteStatus, RejectQuote, ReviseQuote, SendQuote,
};
