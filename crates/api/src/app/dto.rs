use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};

use lumenr_core::ClientId;
use lumenr_infra::{clients::ClientProfile, invoices::InvoiceDraft, pricing::PricedItems, quotes::QuoteDraft};
use lumenr_invoicing::Invoice;
use lumenr_pricing::{CatalogEntry, CatalogEntryId, ItemKind, LineItemInput, TaxRate};
use lumenr_quotes::Quote;

// -------------------------
// Request DTOs
// -------------------------

/// Body of `POST /quotes` and `PUT /quotes/:id`.
///
/// Totals a client sends along (`subtotal`, `tax`, `total`, `line_total`)
/// are not part of the schema and are dropped during deserialization.
#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    pub client_id: ClientId,
    pub items: Vec<LineItemInput>,
    #[serde(default)]
    pub tax_rate: Option<TaxRate>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub valid_until: Option<DateTime<Utc>>,
}

impl From<QuoteRequest> for QuoteDraft {
    fn from(req: QuoteRequest) -> Self {
        QuoteDraft {
            client_id: req.client_id,
            items: req.items,
            tax_rate: req.tax_rate,
            notes: req.notes,
            valid_until: req.valid_until,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct InvoiceRequest {
    pub client_id: ClientId,
    pub items: Vec<LineItemInput>,
    #[serde(default)]
    pub tax_rate: Option<TaxRate>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
}

impl From<InvoiceRequest> for InvoiceDraft {
    fn from(req: InvoiceRequest) -> Self {
        InvoiceDraft {
            client_id: req.client_id,
            items: req.items,
            tax_rate: req.tax_rate,
            notes: req.notes,
            due_date: req.due_date,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterPaymentRequest {
    pub amount: Decimal,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelInvoiceRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AttachPdfRequest {
    pub pdf_url: String,
}

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    #[serde(default)]
    pub client_id: Option<ClientId>,
    pub items: Vec<LineItemInput>,
    #[serde(default)]
    pub tax_rate: Option<TaxRate>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterClientRequest {
    pub name: String,
    pub country: String,
    #[serde(default)]
    pub province: Option<String>,
}

impl RegisterClientRequest {
    pub fn into_profile(self, id: ClientId) -> ClientProfile {
        ClientProfile {
            id,
            name: self.name,
            country: self.country,
            province: self.province,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CatalogEntryRequest {
    pub kind: ItemKind,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub unit_price: Decimal,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl CatalogEntryRequest {
    pub fn into_entry(self, id: CatalogEntryId) -> CatalogEntry {
        CatalogEntry {
            id,
            kind: self.kind,
            name: self.name,
            description: self.description,
            unit_price: self.unit_price,
            active: self.active,
        }
    }
}

// -------------------------
// Response mapping
// -------------------------

pub fn quote_to_json(quote: &Quote) -> JsonValue {
    let totals = quote.totals();
    json!({
        "id": quote.id_typed(),
        "client_id": quote.client_id(),
        "status": quote.status(),
        "items": quote.items(),
        "tax_rate": quote.tax_rate(),
        "subtotal": totals.subtotal,
        "tax": totals.tax,
        "total": totals.total,
        "notes": quote.notes(),
        "pdf_url": quote.pdf_url(),
        "valid_until": quote.valid_until(),
        "created_at": quote.created_at(),
        "updated_at": quote.updated_at(),
    })
}

pub fn invoice_to_json(invoice: &Invoice) -> JsonValue {
    let totals = invoice.totals();
    json!({
        "id": invoice.id_typed(),
        "client_id": invoice.client_id(),
        "quote_id": invoice.quote_id(),
        "status": invoice.status(),
        "items": invoice.items(),
        "tax_rate": invoice.tax_rate(),
        "subtotal": totals.subtotal,
        "tax": totals.tax,
        "total": totals.total,
        "amount_due": invoice.amount_due(),
        "amount_paid": invoice.amount_paid(),
        "outstanding": invoice.outstanding_amount(),
        "due_date": invoice.due_date(),
        "paid_at": invoice.paid_at(),
        "notes": invoice.notes(),
        "pdf_url": invoice.pdf_url(),
        "created_at": invoice.created_at(),
    })
}

pub fn priced_to_json(priced: &PricedItems) -> JsonValue {
    json!({
        "items": priced.items,
        "tax_rate": priced.tax_rate,
        "subtotal": priced.totals.subtotal,
        "tax": priced.totals.tax,
        "total": priced.totals.total,
    })
}
