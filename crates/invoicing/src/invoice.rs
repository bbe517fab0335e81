use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use lumenr_core::{Aggregate, AggregateId, AggregateRoot, ClientId, DomainError, UserId};
use lumenr_events::Event;
use lumenr_pricing::{LineItem, TaxRate, Totals, compute_aggregates, round_money};
use lumenr_quotes::QuoteId;

/// Invoice identifier (owner-scoped via `owner_id` fields in events/commands).
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
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Unpaid,
    PartiallyPaid,
    Paid,
    Overdue,
    Cancelled,
}

impl core::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            InvoiceStatus::Unpaid => "unpaid",
            InvoiceStatus::PartiallyPaid => "partially_paid",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Aggregate root: Invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    id: InvoiceId,
    owner_id: Option<UserId>,
    client_id: Option<ClientId>,
    quote_id: Option<QuoteId>,
    items: Vec<LineItem>,
    tax_rate: TaxRate,
    totals: Totals,
    amount_paid: Decimal,
    status: InvoiceStatus,
    due_date: Option<DateTime<Utc>>,
    paid_at: Option<DateTime<Utc>>,
    notes: Option<String>,
    pdf_url: Option<String>,
    created_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Invoice {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: InvoiceId) -> Self {
        Self {
            id,
            owner_id: None,
            client_id: None,
            quote_id: None,
            items: Vec::new(),
            tax_rate: TaxRate::ZERO,
            totals: Totals::default(),
            amount_paid: Decimal::ZERO,
            status: InvoiceStatus::Unpaid,
            due_date: None,
            paid_at: None,
            notes: None,
            pdf_url: None,
            created_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> InvoiceId {
        self.id
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn owner_id(&self) -> Option<UserId> {
        self.owner_id
    }

    pub fn client_id(&self) -> Option<ClientId> {
        self.client_id
    }

    /// Source quote, if this invoice was issued from one. Weak reference only.
    pub fn quote_id(&self) -> Option<QuoteId> {
        self.quote_id
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn tax_rate(&self) -> TaxRate {
        self.tax_rate
    }

    pub fn totals(&self) -> Totals {
        self.totals
    }

    pub fn amount_paid(&self) -> Decimal {
        self.amount_paid
    }

    /// What the client owes in total: the document total rounded to cents.
    ///
    /// Line totals and the subtotal keep sub-cent precision, payments do not.
    pub fn amount_due(&self) -> Decimal {
        round_money(self.totals.total)
    }

    pub fn outstanding_amount(&self) -> Decimal {
        (self.amount_due() - self.amount_paid).max(Decimal::ZERO)
    }

    pub fn status(&self) -> InvoiceStatus {
        self.status
    }

    pub fn due_date(&self) -> Option<DateTime<Utc>> {
        self.due_date
    }

    pub fn paid_at(&self) -> Option<DateTime<Utc>> {
        self.paid_at
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn pdf_url(&self) -> Option<&str> {
        self.pdf_url.as_deref()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// Invariant: cannot pay a cancelled or settled invoice.
    pub fn can_accept_payment(&self) -> bool {
        matches!(
            self.status,
            InvoiceStatus::Unpaid | InvoiceStatus::PartiallyPaid | InvoiceStatus::Overdue
        ) && self.outstanding_amount() > Decimal::ZERO
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

/// Command: CreateInvoice (standalone, not derived from a quote).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateInvoice {
    pub owner_id: UserId,
    pub invoice_id: InvoiceId,
    pub client_id: ClientId,
    pub items: Vec<LineItem>,
    pub tax_rate: TaxRate,
    pub notes: Option<String>,
    pub due_date: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: IssueInvoiceFromQuote.
///
/// Carries a by-value snapshot of the accepted quote. The aggregate does not
/// look at the quote itself; the converter checks the quote's status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueInvoiceFromQuote {
    pub owner_id: UserId,
    pub invoice_id: InvoiceId,
    pub quote_id: QuoteId,
    pub client_id: ClientId,
    pub items: Vec<LineItem>,
    pub tax_rate: TaxRate,
    pub totals: Totals,
    pub notes: Option<String>,
    pub due_date: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RegisterPayment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterPayment {
    pub owner_id: UserId,
    pub invoice_id: InvoiceId,
    pub amount: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkOverdue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkOverdue {
    pub owner_id: UserId,
    pub invoice_id: InvoiceId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelInvoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelInvoice {
    pub owner_id: UserId,
    pub invoice_id: InvoiceId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AttachInvoicePdf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachInvoicePdf {
    pub owner_id: UserId,
    pub invoice_id: InvoiceId,
    pub pdf_url: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceCommand {
    CreateInvoice(CreateInvoice),
    IssueInvoiceFromQuote(IssueInvoiceFromQuote),
    RegisterPayment(RegisterPayment),
    MarkOverdue(MarkOverdue),
    CancelInvoice(CancelInvoice),
    AttachInvoicePdf(AttachInvoicePdf),
}

/// Event: InvoiceIssued (both standalone and quote-derived invoices).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceIssued {
    pub owner_id: UserId,
    pub invoice_id: InvoiceId,
    pub quote_id: Option<QuoteId>,
    pub client_id: ClientId,
    pub items: Vec<LineItem>,
    pub tax_rate: TaxRate,
    pub totals: Totals,
    pub notes: Option<String>,
    pub due_date: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRegistered {
    pub owner_id: UserId,
    pub invoice_id: InvoiceId,
    pub amount: Decimal,
    pub new_amount_paid: Decimal,
    pub paid_in_full: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoiceMarkedOverdue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceMarkedOverdue {
    pub owner_id: UserId,
    pub invoice_id: InvoiceId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoiceCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceCancelled {
    pub owner_id: UserId,
    pub invoice_id: InvoiceId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoicePdfAttached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoicePdfAttached {
    pub owner_id: UserId,
    pub invoice_id: InvoiceId,
    pub pdf_url: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceEvent {
    InvoiceIssued(InvoiceIssued),
    PaymentRegistered(PaymentRegistered),
    InvoiceMarkedOverdue(InvoiceMarkedOverdue),
    InvoiceCancelled(InvoiceCancelled),
    InvoicePdfAttached(InvoicePdfAttached),
}

impl Event for InvoiceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InvoiceEvent::InvoiceIssued(_) => "invoicing.invoice.issued",
            InvoiceEvent::PaymentRegistered(_) => "invoicing.invoice.payment_registered",
            InvoiceEvent::InvoiceMarkedOverdue(_) => "invoicing.invoice.marked_overdue",
            InvoiceEvent::InvoiceCancelled(_) => "invoicing.invoice.cancelled",
            InvoiceEvent::InvoicePdfAttached(_) => "invoicing.invoice.pdf_attached",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InvoiceEvent::InvoiceIssued(e) => e.occurred_at,
            InvoiceEvent::PaymentRegistered(e) => e.occurred_at,
            InvoiceEvent::InvoiceMarkedOverdue(e) => e.occurred_at,
            InvoiceEvent::InvoiceCancelled(e) => e.occurred_at,
            InvoiceEvent::InvoicePdfAttached(e) => e.occurred_at,
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
                self.owner_id = Some(e.owner_id);
                self.client_id = Some(e.client_id);
                self.quote_id = e.quote_id;
                self.items = e.items.clone();
                self.tax_rate = e.tax_rate;
                self.totals = e.totals;
                self.notes = e.notes.clone();
                self.due_date = Some(e.due_date);
                self.amount_paid = Decimal::ZERO;
                self.paid_at = None;
                self.pdf_url = None;
                self.status = InvoiceStatus::Unpaid;
                self.created_at = Some(e.occurred_at);
                self.created = true;
            }
            InvoiceEvent::PaymentRegistered(e) => {
                self.amount_paid = e.new_amount_paid;
                if e.paid_in_full {
                    self.status = InvoiceStatus::Paid;
                    if self.paid_at.is_none() {
                        self.paid_at = Some(e.occurred_at);
                    }
                } else {
                    self.status = InvoiceStatus::PartiallyPaid;
                }
            }
            InvoiceEvent::InvoiceMarkedOverdue(_) => {
                self.status = InvoiceStatus::Overdue;
            }
            InvoiceEvent::InvoiceCancelled(_) => {
                self.status = InvoiceStatus::Cancelled;
            }
            InvoiceEvent::InvoicePdfAttached(e) => {
                self.pdf_url = Some(e.pdf_url.clone());
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InvoiceCommand::CreateInvoice(cmd) => self.handle_create(cmd),
            InvoiceCommand::IssueInvoiceFromQuote(cmd) => self.handle_issue_from_quote(cmd),
            InvoiceCommand::RegisterPayment(cmd) => self.handle_register_payment(cmd),
            InvoiceCommand::MarkOverdue(cmd) => self.handle_mark_overdue(cmd),
            InvoiceCommand::CancelInvoice(cmd) => self.handle_cancel(cmd),
            InvoiceCommand::AttachInvoicePdf(cmd) => self.handle_attach_pdf(cmd),
        }
    }
}

impl Invoice {
    fn ensure_visible_to(
        &self,
        owner_id: UserId,
        invoice_id: InvoiceId,
    ) -> Result<(), DomainError> {
        if !self.created || self.owner_id != Some(owner_id) {
            return Err(DomainError::not_found());
        }
        if self.id != invoice_id {
            return Err(DomainError::invariant("invoice_id mismatch"));
        }
        Ok(())
    }

    fn ensure_not_created(&self) -> Result<(), DomainError> {
        if self.created {
            return Err(DomainError::conflict("invoice already exists"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_not_created()?;

        if cmd.items.is_empty() {
            return Err(DomainError::validation(
                "cannot create an invoice without line items",
            ));
        }

        Ok(vec![InvoiceEvent::InvoiceIssued(InvoiceIssued {
            owner_id: cmd.owner_id,
            invoice_id: cmd.invoice_id,
            quote_id: None,
            client_id: cmd.client_id,
            items: cmd.items.clone(),
            tax_rate: cmd.tax_rate,
            totals: compute_aggregates(&cmd.items, cmd.tax_rate),
            notes: cmd.notes.clone(),
            due_date: cmd.due_date,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_issue_from_quote(
        &self,
        cmd: &IssueInvoiceFromQuote,
    ) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_not_created()?;

        // The snapshot is copied by value; refuse one that is not self-consistent.
        if !cmd.totals.matches(&cmd.items, cmd.tax_rate) {
            return Err(DomainError::invariant(
                "quote totals do not match its line items",
            ));
        }

        Ok(vec![InvoiceEvent::InvoiceIssued(InvoiceIssued {
            owner_id: cmd.owner_id,
            invoice_id: cmd.invoice_id,
            quote_id: Some(cmd.quote_id),
            client_id: cmd.client_id,
            items: cmd.items.clone(),
            tax_rate: cmd.tax_rate,
            totals: cmd.totals,
            notes: cmd.notes.clone(),
            due_date: cmd.due_date,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_register_payment(
        &self,
        cmd: &RegisterPayment,
    ) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_visible_to(cmd.owner_id, cmd.invoice_id)?;

        if !self.can_accept_payment() {
            return Err(DomainError::invariant(format!(
                "cannot register payment on a {} invoice",
                self.status
            )));
        }

        if cmd.amount <= Decimal::ZERO {
            return Err(DomainError::validation("payment amount must be positive"));
        }
        // Compared before summing: an arbitrary amount must not reach the addition.
        let outstanding = self.outstanding_amount();
        if cmd.amount > outstanding {
            return Err(DomainError::invariant("cannot overpay invoice"));
        }
        if round_money(cmd.amount) != cmd.amount {
            return Err(DomainError::validation(
                "payment amount must not have more than two decimal places",
            ));
        }

        let new_amount_paid = self.amount_paid + cmd.amount;

        Ok(vec![InvoiceEvent::PaymentRegistered(PaymentRegistered {
            owner_id: cmd.owner_id,
            invoice_id: cmd.invoice_id,
            amount: cmd.amount,
            new_amount_paid,
            paid_in_full: cmd.amount == outstanding,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_overdue(&self, cmd: &MarkOverdue) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_visible_to(cmd.owner_id, cmd.invoice_id)?;

        if !matches!(
            self.status,
            InvoiceStatus::Unpaid | InvoiceStatus::PartiallyPaid
        ) {
            return Err(DomainError::illegal_transition(
                self.status,
                InvoiceStatus::Overdue,
            ));
        }

        if self.due_date.is_some_and(|due| cmd.occurred_at <= due) {
            return Err(DomainError::invariant("invoice is not past its due date"));
        }

        Ok(vec![InvoiceEvent::InvoiceMarkedOverdue(InvoiceMarkedOverdue {
            owner_id: cmd.owner_id,
            invoice_id: cmd.invoice_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_visible_to(cmd.owner_id, cmd.invoice_id)?;

        if matches!(self.status, InvoiceStatus::Paid | InvoiceStatus::Cancelled) {
            return Err(DomainError::illegal_transition(
                self.status,
                InvoiceStatus::Cancelled,
            ));
        }

        Ok(vec![InvoiceEvent::InvoiceCancelled(InvoiceCancelled {
            owner_id: cmd.owner_id,
            invoice_id: cmd.invoice_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_attach_pdf(
        &self,
        cmd: &AttachInvoicePdf,
    ) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_visible_to(cmd.owner_id, cmd.invoice_id)?;

        if cmd.pdf_url.trim().is_empty() {
            return Err(DomainError::validation("pdf_url must not be empty"));
        }

        Ok(vec![InvoiceEvent::InvoicePdfAttached(InvoicePdfAttached {
            owner_id: cmd.owner_id,
            invoice_id: cmd.invoice_id,
            pdf_url: cmd.pdf_url.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}
