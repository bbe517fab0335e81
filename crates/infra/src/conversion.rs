//! Quote-to-invoice conversion.
//!
//! An accepted quote is copied by value into a new, independent invoice. The
//! quote itself is not modified, and converting the same quote again issues
//! another invoice.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{info, instrument};

use lumenr_auth::Principal;
use lumenr_core::AggregateId;
use lumenr_invoicing::{Invoice, InvoiceCommand, InvoiceId, IssueInvoiceFromQuote};
use lumenr_quotes::{Quote, QuoteId, QuoteStatus};

use crate::Dispatcher;
use crate::command_dispatcher::DispatchError;
use crate::invoices::{INVOICE_AGGREGATE_TYPE, empty_invoice};
use crate::quotes::QUOTE_AGGREGATE_TYPE;

#[derive(Debug, Error)]
pub enum ConversionError {
    /// Missing quote, or one owned by someone else.
    #[error("quote not found")]
    QuoteNotFound,

    #[error("only accepted quotes may be converted (quote is {status})")]
    NotAccepted { status: QuoteStatus },

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Days between conversion and the due date of the issued invoice.
pub const CONVERTED_INVOICE_DUE_DAYS: i64 = 30;

pub struct QuoteConverter {
    dispatcher: Arc<Dispatcher>,
}

impl QuoteConverter {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Issue an unpaid invoice from the principal's accepted quote.
    ///
    /// Items, totals, client and notes are copied; the invoice is due
    /// [`CONVERTED_INVOICE_DUE_DAYS`] after `now`.
    #[instrument(skip(self, principal), fields(owner_id = %principal.user_id()), err)]
    pub async fn convert(
        &self,
        principal: &Principal,
        quote_id: QuoteId,
        now: DateTime<Utc>,
    ) -> Result<Invoice, ConversionError> {
        let owner_id = principal.user_id();
        let quote: Quote = self
            .dispatcher
            .load(owner_id, quote_id.0, QUOTE_AGGREGATE_TYPE, |id| {
                Quote::empty(QuoteId::new(id))
            })
            .await
            .map_err(|e| match e {
                DispatchError::NotFound => ConversionError::QuoteNotFound,
                other => other.into(),
            })?;

        let Some(client_id) = quote.client_id().filter(|_| quote.is_created()) else {
            return Err(ConversionError::QuoteNotFound);
        };
        if !quote.is_conversion_allowed() {
            return Err(ConversionError::NotAccepted {
                status: quote.status(),
            });
        }

        let id = AggregateId::new();
        let invoice_id = InvoiceId::new(id);
        let committed = self
            .dispatcher
            .dispatch(
                owner_id,
                id,
                INVOICE_AGGREGATE_TYPE,
                InvoiceCommand::IssueInvoiceFromQuote(IssueInvoiceFromQuote {
                    owner_id,
                    invoice_id,
                    quote_id,
                    client_id,
                    items: quote.items().to_vec(),
                    tax_rate: quote.tax_rate(),
                    totals: quote.totals(),
                    notes: quote.notes().map(str::to_string),
                    due_date: now + Duration::days(CONVERTED_INVOICE_DUE_DAYS),
                    occurred_at: now,
                }),
                empty_invoice,
            )
            .await?;

        info!(
            quote_id = %quote_id,
            invoice_id = %invoice_id,
            total = %committed.aggregate.totals().total,
            "quote converted to invoice"
        );
        Ok(committed.aggregate)
    }
}
