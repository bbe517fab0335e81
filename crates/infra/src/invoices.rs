//! Invoice application service.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tracing::info;

use lumenr_auth::Principal;
use lumenr_core::{AggregateId, ClientId};
use lumenr_invoicing::{
    AttachInvoicePdf, CancelInvoice, CreateInvoice, Invoice, InvoiceCommand, InvoiceId,
    MarkOverdue, RegisterPayment,
};
use lumenr_pricing::{LineItemInput, TaxRate};

use crate::Dispatcher;
use crate::command_dispatcher::DispatchError;
use crate::pricing::{PricingService, require_items};

pub const INVOICE_AGGREGATE_TYPE: &str = "invoicing.invoice";

/// Days between issue and due date when none is given.
pub const DEFAULT_DUE_DAYS: i64 = 30;

/// Upper bound for a configured due-day count.
pub const MAX_DUE_DAYS: i64 = 3650;

/// A standalone invoice as submitted by its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceDraft {
    pub client_id: ClientId,
    pub items: Vec<LineItemInput>,
    pub tax_rate: Option<TaxRate>,
    pub notes: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
}

pub(crate) fn empty_invoice(id: AggregateId) -> Invoice {
    Invoice::empty(InvoiceId::new(id))
}

pub struct InvoiceService {
    dispatcher: Arc<Dispatcher>,
    pricing: Arc<PricingService>,
    due_days: i64,
}

impl InvoiceService {
    /// `due_days` applies to standalone invoices and is kept within
    /// `0..=MAX_DUE_DAYS`.
    pub fn new(dispatcher: Arc<Dispatcher>, pricing: Arc<PricingService>, due_days: i64) -> Self {
        Self {
            dispatcher,
            pricing,
            due_days: due_days.clamp(0, MAX_DUE_DAYS),
        }
    }

    pub async fn create(
        &self,
        principal: &Principal,
        draft: InvoiceDraft,
        now: DateTime<Utc>,
    ) -> Result<Invoice, DispatchError> {
        require_items(&draft.items, "an invoice")?;

        let owner_id = principal.user_id();
        let priced = self
            .pricing
            .price_for_client(owner_id, draft.client_id, &draft.items, draft.tax_rate, &[])
            .await?;

        let id = AggregateId::new();
        let invoice_id = InvoiceId::new(id);
        let committed = self
            .dispatcher
            .dispatch(
                owner_id,
                id,
                INVOICE_AGGREGATE_TYPE,
                InvoiceCommand::CreateInvoice(CreateInvoice {
                    owner_id,
                    invoice_id,
                    client_id: draft.client_id,
                    items: priced.items,
                    tax_rate: priced.tax_rate,
                    notes: draft.notes,
                    due_date: draft
                        .due_date
                        .unwrap_or(now + Duration::days(self.due_days)),
                    occurred_at: now,
                }),
                empty_invoice,
            )
            .await?;

        info!(
            invoice_id = %invoice_id,
            total = %committed.aggregate.totals().total,
            "invoice created"
        );
        Ok(committed.aggregate)
    }

    pub async fn register_payment(
        &self,
        principal: &Principal,
        invoice_id: InvoiceId,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Invoice, DispatchError> {
        let owner_id = principal.user_id();
        let invoice = self
            .execute(
                principal,
                invoice_id,
                InvoiceCommand::RegisterPayment(RegisterPayment {
                    owner_id,
                    invoice_id,
                    amount,
                    occurred_at: now,
                }),
            )
            .await?;

        info!(
            invoice_id = %invoice_id,
            amount = %amount,
            status = %invoice.status(),
            "payment registered"
        );
        Ok(invoice)
    }

    pub async fn mark_overdue(
        &self,
        principal: &Principal,
        invoice_id: InvoiceId,
        now: DateTime<Utc>,
    ) -> Result<Invoice, DispatchError> {
        let owner_id = principal.user_id();
        self.execute(
            principal,
            invoice_id,
            InvoiceCommand::MarkOverdue(MarkOverdue {
                owner_id,
                invoice_id,
                occurred_at: now,
            }),
        )
        .await
    }

    pub async fn cancel(
        &self,
        principal: &Principal,
        invoice_id: InvoiceId,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Invoice, DispatchError> {
        let owner_id = principal.user_id();
        self.execute(
            principal,
            invoice_id,
            InvoiceCommand::CancelInvoice(CancelInvoice {
                owner_id,
                invoice_id,
                reason,
                occurred_at: now,
            }),
        )
        .await
    }

    pub async fn attach_pdf(
        &self,
        principal: &Principal,
        invoice_id: InvoiceId,
        pdf_url: String,
        now: DateTime<Utc>,
    ) -> Result<Invoice, DispatchError> {
        let owner_id = principal.user_id();
        self.execute(
            principal,
            invoice_id,
            InvoiceCommand::AttachInvoicePdf(AttachInvoicePdf {
                owner_id,
                invoice_id,
                pdf_url,
                occurred_at: now,
            }),
        )
        .await
    }

    pub async fn get(
        &self,
        principal: &Principal,
        invoice_id: InvoiceId,
    ) -> Result<Invoice, DispatchError> {
        let invoice = self
            .dispatcher
            .load(
                principal.user_id(),
                invoice_id.0,
                INVOICE_AGGREGATE_TYPE,
                empty_invoice,
            )
            .await?;
        if !invoice.is_created() {
            return Err(DispatchError::NotFound);
        }
        Ok(invoice)
    }

    pub async fn list(&self, principal: &Principal) -> Result<Vec<Invoice>, DispatchError> {
        self.dispatcher
            .load_all(principal.user_id(), INVOICE_AGGREGATE_TYPE, empty_invoice)
            .await
    }

    async fn execute(
        &self,
        principal: &Principal,
        invoice_id: InvoiceId,
        command: InvoiceCommand,
    ) -> Result<Invoice, DispatchError> {
        let committed = self
            .dispatcher
            .dispatch(
                principal.user_id(),
                invoice_id.0,
                INVOICE_AGGREGATE_TYPE,
                command,
                empty_invoice,
            )
            .await?;
        Ok(committed.aggregate)
    }
}
