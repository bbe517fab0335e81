//! Quote application service: principal-scoped commands and queries.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use lumenr_auth::Principal;
use lumenr_core::{AggregateId, ClientId};
use lumenr_pricing::{LineItemInput, TaxRate};
use lumenr_quotes::{
    AcceptQuote, AttachQuotePdf, CreateQuote, ExpireQuote, Quote, QuoteCommand, QuoteId,
    RejectQuote, ReviseQuote, SendQuote,
};

use crate::Dispatcher;
use crate::command_dispatcher::DispatchError;
use crate::pricing::PricingService;

pub const QUOTE_AGGREGATE_TYPE: &str = "quotes.quote";

/// Editable content of a quote as submitted by its owner.
///
/// A revision replaces all of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteDraft {
    pub client_id: ClientId,
    pub items: Vec<LineItemInput>,
    /// Explicit rate; `None` resolves the client's regional rate.
    pub tax_rate: Option<TaxRate>,
    pub notes: Option<String>,
    pub valid_until: Option<DateTime<Utc>>,
}

/// A status change requested by the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteTransition {
    Send,
    Accept,
    Reject,
    Expire,
}

pub struct QuoteService {
    dispatcher: Arc<Dispatcher>,
    pricing: Arc<PricingService>,
}

fn empty_quote(id: AggregateId) -> Quote {
    Quote::empty(QuoteId::new(id))
}

impl QuoteService {
    pub fn new(dispatcher: Arc<Dispatcher>, pricing: Arc<PricingService>) -> Self {
        Self {
            dispatcher,
            pricing,
        }
    }

    pub async fn create(
        &self,
        principal: &Principal,
        draft: QuoteDraft,
        now: DateTime<Utc>,
    ) -> Result<Quote, DispatchError> {
        let owner_id = principal.user_id();
        let priced = self
            .pricing
            .price_for_client(owner_id, draft.client_id, &draft.items, draft.tax_rate, &[])
            .await?;

        let id = AggregateId::new();
        let quote_id = QuoteId::new(id);
        let committed = self
            .dispatcher
            .dispatch(
                owner_id,
                id,
                QUOTE_AGGREGATE_TYPE,
                QuoteCommand::CreateQuote(CreateQuote {
                    owner_id,
                    quote_id,
                    client_id: draft.client_id,
                    items: priced.items,
                    tax_rate: priced.tax_rate,
                    notes: draft.notes,
                    valid_until: draft.valid_until,
                    occurred_at: now,
                }),
                empty_quote,
            )
            .await?;

        info!(
            quote_id = %quote_id,
            total = %committed.aggregate.totals().total,
            "quote created"
        );
        Ok(committed.aggregate)
    }

    /// Replace the content of a draft or sent quote; totals are recomputed.
    ///
    /// Without an explicit rate the quote keeps the rate it was last priced
    /// with.
    pub async fn revise(
        &self,
        principal: &Principal,
        quote_id: QuoteId,
        draft: QuoteDraft,
        now: DateTime<Utc>,
    ) -> Result<Quote, DispatchError> {
        let owner_id = principal.user_id();
        let current = self.get(principal, quote_id).await?;
        let priced = self
            .pricing
            .price_for_client(
                owner_id,
                draft.client_id,
                &draft.items,
                draft.tax_rate.or(Some(current.tax_rate())),
                current.items(),
            )
            .await?;

        let committed = self
            .dispatcher
            .dispatch(
                owner_id,
                quote_id.0,
                QUOTE_AGGREGATE_TYPE,
                QuoteCommand::ReviseQuote(ReviseQuote {
                    owner_id,
                    quote_id,
                    client_id: draft.client_id,
                    items: priced.items,
                    tax_rate: priced.tax_rate,
                    notes: draft.notes,
                    valid_until: draft.valid_until,
                    occurred_at: now,
                }),
                empty_quote,
            )
            .await?;

        info!(quote_id = %quote_id, "quote revised");
        Ok(committed.aggregate)
    }

    pub async fn transition(
        &self,
        principal: &Principal,
        quote_id: QuoteId,
        transition: QuoteTransition,
        now: DateTime<Utc>,
    ) -> Result<Quote, DispatchError> {
        let owner_id = principal.user_id();
        let command = match transition {
            QuoteTransition::Send => QuoteCommand::SendQuote(SendQuote {
                owner_id,
                quote_id,
                occurred_at: now,
            }),
            QuoteTransition::Accept => QuoteCommand::AcceptQuote(AcceptQuote {
                owner_id,
                quote_id,
                occurred_at: now,
            }),
            QuoteTransition::Reject => QuoteCommand::RejectQuote(RejectQuote {
                owner_id,
                quote_id,
                occurred_at: now,
            }),
            QuoteTransition::Expire => QuoteCommand::ExpireQuote(ExpireQuote {
                owner_id,
                quote_id,
                occurred_at: now,
            }),
        };

        let committed = self
            .dispatcher
            .dispatch(owner_id, quote_id.0, QUOTE_AGGREGATE_TYPE, command, empty_quote)
            .await?;

        info!(
            quote_id = %quote_id,
            status = %committed.aggregate.status(),
            "quote status changed"
        );
        Ok(committed.aggregate)
    }

    pub async fn attach_pdf(
        &self,
        principal: &Principal,
        quote_id: QuoteId,
        pdf_url: String,
        now: DateTime<Utc>,
    ) -> Result<Quote, DispatchError> {
        let owner_id = principal.user_id();
        let committed = self
            .dispatcher
            .dispatch(
                owner_id,
                quote_id.0,
                QUOTE_AGGREGATE_TYPE,
                QuoteCommand::AttachQuotePdf(AttachQuotePdf {
                    owner_id,
                    quote_id,
                    pdf_url,
                    occurred_at: now,
                }),
                empty_quote,
            )
            .await?;
        Ok(committed.aggregate)
    }

    /// The principal's quote, or not-found (also for quotes of other owners).
    pub async fn get(&self, principal: &Principal, quote_id: QuoteId) -> Result<Quote, DispatchError> {
        let quote = self
            .dispatcher
            .load(principal.user_id(), quote_id.0, QUOTE_AGGREGATE_TYPE, empty_quote)
            .await?;
        if !quote.is_created() {
            return Err(DispatchError::NotFound);
        }
        Ok(quote)
    }

    pub async fn list(&self, principal: &Principal) -> Result<Vec<Quote>, DispatchError> {
        self.dispatcher
            .load_all(principal.user_id(), QUOTE_AGGREGATE_TYPE, empty_quote)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    use lumenr_core::UserId;
    use lumenr_pricing::ItemKind;
    use lumenr_quotes::QuoteStatus;

    use crate::testing::Harness;

    fn draft(client_id: ClientId) -> QuoteDraft {
        QuoteDraft {
            client_id,
            items: vec![
                LineItemInput::custom(ItemKind::Service, "Design", 2, dec!(100.00)),
                LineItemInput::custom(ItemKind::Product, "Print", 1, dec!(50.00)),
            ],
            tax_rate: None,
            notes: Some("Thanks!".to_string()),
            valid_until: None,
        }
    }

    #[tokio::test]
    async fn create_prices_items_server_side() {
        let h = Harness::new();
        let client = h.client_in("ON");

        let quote = h.quotes.create(&h.principal, draft(client), h.now).await.unwrap();

        assert_eq!(quote.status(), QuoteStatus::Draft);
        assert_eq!(quote.totals().subtotal, dec!(250.00));
        assert_eq!(quote.totals().tax, dec!(32.50));
        assert_eq!(quote.totals().total, dec!(282.50));
        assert_eq!(quote.owner_id(), Some(h.principal.user_id()));
    }

    #[tokio::test]
    async fn revise_recomputes_totals() {
        let h = Harness::new();
        let client = h.client_in("ON");
        let quote = h.quotes.create(&h.principal, draft(client), h.now).await.unwrap();

        let mut changed = draft(client);
        changed.items.truncate(1);
        let revised = h
            .quotes
            .revise(&h.principal, quote.id_typed(), changed, h.now)
            .await
            .unwrap();

        assert_eq!(revised.totals().subtotal, dec!(200.00));
        assert_eq!(revised.totals().tax, dec!(26.00));
        assert_eq!(revised.totals().total, dec!(226.00));
    }

    #[tokio::test]
    async fn revise_keeps_the_last_rate_unless_a_new_one_is_given() {
        let h = Harness::new();
        let client = h.client_in("ON");
        let mut explicit = draft(client);
        explicit.tax_rate = Some(TaxRate::new(dec!(5)).unwrap());
        let quote = h.quotes.create(&h.principal, explicit, h.now).await.unwrap();

        let kept = h
            .quotes
            .revise(&h.principal, quote.id_typed(), draft(client), h.now)
            .await
            .unwrap();
        assert_eq!(kept.tax_rate().percent(), dec!(5));
        assert_eq!(kept.totals().tax, dec!(12.50));

        let mut replaced = draft(client);
        replaced.tax_rate = Some(TaxRate::new(dec!(15)).unwrap());
        let revised = h
            .quotes
            .revise(&h.principal, quote.id_typed(), replaced, h.now)
            .await
            .unwrap();
        assert_eq!(revised.totals().tax, dec!(37.50));
        assert_eq!(revised.totals().total, dec!(287.50));
    }

    #[tokio::test]
    async fn lifecycle_and_illegal_transition() {
        let h = Harness::new();
        let client = h.client_in("ON");
        let id = h
            .quotes
            .create(&h.principal, draft(client), h.now)
            .await
            .unwrap()
            .id_typed();

        let err = h
            .quotes
            .transition(&h.principal, id, QuoteTransition::Accept, h.now)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::IllegalTransition { .. }));

        h.quotes
            .transition(&h.principal, id, QuoteTransition::Send, h.now)
            .await
            .unwrap();
        let accepted = h
            .quotes
            .transition(&h.principal, id, QuoteTransition::Accept, h.now)
            .await
            .unwrap();

        assert_eq!(accepted.status(), QuoteStatus::Accepted);
        assert_eq!(
            h.quotes.get(&h.principal, id).await.unwrap().status(),
            QuoteStatus::Accepted
        );
    }

    #[tokio::test]
    async fn other_owners_cannot_see_or_change_a_quote() {
        let h = Harness::new();
        let client = h.client_in("ON");
        let id = h
            .quotes
            .create(&h.principal, draft(client), h.now)
            .await
            .unwrap()
            .id_typed();
        let intruder = Principal::new(UserId::new());

        assert!(matches!(
            h.quotes.get(&intruder, id).await,
            Err(DispatchError::NotFound)
        ));
        assert!(matches!(
            h.quotes
                .transition(&intruder, id, QuoteTransition::Send, h.now)
                .await,
            Err(DispatchError::NotFound)
        ));
        assert!(h.quotes.list(&intruder).await.unwrap().is_empty());
        assert_eq!(h.quotes.list(&h.principal).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn ids_of_other_document_types_are_not_found() {
        let h = Harness::new();
        let client = h.client_in("ON");
        let quote = h.quotes.create(&h.principal, draft(client), h.now).await.unwrap();
        let invoice = h
            .invoices
            .create(
                &h.principal,
                crate::invoices::InvoiceDraft {
                    client_id: client,
                    items: draft(client).items,
                    tax_rate: None,
                    notes: None,
                    due_date: None,
                },
                h.now,
            )
            .await
            .unwrap();
        let invoice_as_quote = QuoteId::new(invoice.id_typed().0);

        assert!(matches!(
            h.quotes.get(&h.principal, invoice_as_quote).await,
            Err(DispatchError::NotFound)
        ));
        assert!(matches!(
            h.quotes
                .transition(&h.principal, invoice_as_quote, QuoteTransition::Send, h.now)
                .await,
            Err(DispatchError::NotFound)
        ));
        assert!(matches!(
            h.invoices
                .get(&h.principal, lumenr_invoicing::InvoiceId::new(quote.id_typed().0))
                .await,
            Err(DispatchError::NotFound)
        ));
    }

    #[tokio::test]
    async fn attach_pdf_passes_url_through() {
        let h = Harness::new();
        let client = h.client_in("ON");
        let id = h
            .quotes
            .create(&h.principal, draft(client), h.now)
            .await
            .unwrap()
            .id_typed();

        let quote = h
            .quotes
            .attach_pdf(&h.principal, id, "https://files.example/q.pdf".to_string(), h.now)
            .await
            .unwrap();

        assert_eq!(quote.pdf_url(), Some("https://files.example/q.pdf"));
    }
}
