//! Time-based quote expiry.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use lumenr_auth::Principal;
use lumenr_core::AggregateId;
use lumenr_quotes::{ExpireQuote, Quote, QuoteCommand, QuoteId};

use crate::Dispatcher;
use crate::command_dispatcher::DispatchError;
use crate::quotes::QUOTE_AGGREGATE_TYPE;

fn empty_quote(id: AggregateId) -> Quote {
    Quote::empty(QuoteId::new(id))
}

pub struct QuoteExpiry {
    dispatcher: Arc<Dispatcher>,
}

impl QuoteExpiry {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Expire every draft or sent quote of the principal whose `valid_until`
    /// is at or before `now`. Returns the ids that were expired.
    ///
    /// A quote that changed concurrently is skipped and picked up by the next
    /// sweep if it is still due.
    pub async fn expire_due(
        &self,
        principal: &Principal,
        now: DateTime<Utc>,
    ) -> Result<Vec<QuoteId>, DispatchError> {
        let owner_id = principal.user_id();
        let quotes = self
            .dispatcher
            .load_all(owner_id, QUOTE_AGGREGATE_TYPE, empty_quote)
            .await?;

        let mut expired = Vec::new();
        for quote in quotes.iter().filter(|q| q.is_due_for_expiry(now)) {
            let quote_id = quote.id_typed();
            let result = self
                .dispatcher
                .dispatch(
                    owner_id,
                    quote_id.0,
                    QUOTE_AGGREGATE_TYPE,
                    QuoteCommand::ExpireQuote(ExpireQuote {
                        owner_id,
                        quote_id,
                        occurred_at: now,
                    }),
                    empty_quote,
                )
                .await;

            match result {
                Ok(_) => expired.push(quote_id),
                Err(DispatchError::Concurrency(_) | DispatchError::IllegalTransition { .. }) => {
                    warn!(quote_id = %quote_id, "quote changed during expiry sweep; skipped");
                }
                Err(other) => return Err(other),
            }
        }

        if !expired.is_empty() {
            info!(count = expired.len(), "expired quotes");
        }
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    use lumenr_core::{ClientId, UserId};
    use lumenr_pricing::{ItemKind, LineItemInput};
    use lumenr_quotes::QuoteStatus;

    use crate::quotes::{QuoteDraft, QuoteTransition};
    use crate::testing::Harness;

    async fn quote(h: &Harness, client: ClientId, valid_until: Option<DateTime<Utc>>) -> QuoteId {
        h.quotes
            .create(
                &h.principal,
                QuoteDraft {
                    client_id: client,
                    items: vec![LineItemInput::custom(ItemKind::Product, "Tile", 10, dec!(3.50))],
                    tax_rate: None,
                    notes: None,
                    valid_until,
                },
                h.now,
            )
            .await
            .unwrap()
            .id_typed()
    }

    #[tokio::test]
    async fn expires_only_open_quotes_past_validity() {
        let h = Harness::new();
        let client = h.client_in("ON");
        let lapsed_draft = quote(&h, client, Some(h.now - Duration::days(1))).await;
        let lapsed_sent = quote(&h, client, Some(h.now)).await;
        h.quotes
            .transition(&h.principal, lapsed_sent, QuoteTransition::Send, h.now)
            .await
            .unwrap();
        let still_valid = quote(&h, client, Some(h.now + Duration::days(7))).await;
        let open_ended = quote(&h, client, None).await;
        let accepted = quote(&h, client, Some(h.now - Duration::days(1))).await;
        for step in [QuoteTransition::Send, QuoteTransition::Accept] {
            h.quotes
                .transition(&h.principal, accepted, step, h.now)
                .await
                .unwrap();
        }

        let expired = QuoteExpiry::new(h.dispatcher.clone())
            .expire_due(&h.principal, h.now)
            .await
            .unwrap();

        assert_eq!(expired, vec![lapsed_draft, lapsed_sent]);
        for (id, status) in [
            (lapsed_draft, QuoteStatus::Expired),
            (lapsed_sent, QuoteStatus::Expired),
            (still_valid, QuoteStatus::Draft),
            (open_ended, QuoteStatus::Draft),
            (accepted, QuoteStatus::Accepted),
        ] {
            assert_eq!(h.quotes.get(&h.principal, id).await.unwrap().status(), status);
        }
    }

    #[tokio::test]
    async fn sweep_is_scoped_to_the_principal() {
        let h = Harness::new();
        let client = h.client_in("ON");
        let lapsed = quote(&h, client, Some(h.now - Duration::days(1))).await;

        let expired = QuoteExpiry::new(h.dispatcher.clone())
            .expire_due(&Principal::new(UserId::new()), h.now)
            .await
            .unwrap();

        assert!(expired.is_empty());
        assert_eq!(
            h.quotes.get(&h.principal, lapsed).await.unwrap().status(),
            QuoteStatus::Draft
        );
    }
}
