use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lumenr_core::{Aggregate, AggregateId, AggregateRoot, ClientId, DomainError, UserId};
use lumenr_events::Event;
use lumenr_pricing::{LineItem, TaxRate, Totals, compute_aggregates};

/// Quote identifier (owner-scoped via `owner_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuoteId(pub AggregateId);

impl QuoteId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for QuoteId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Quote status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteStatus {
    Draft,
    Sent,
    Accepted,
    Rejected,
    Expired,
}

impl QuoteStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            QuoteStatus::Accepted | QuoteStatus::Rejected | QuoteStatus::Expired
        )
    }

    /// Whether `self -> to` is an edge of the lifecycle graph.
    pub fn can_transition_to(self, to: QuoteStatus) -> bool {
        matches!(
            (self, to),
            (QuoteStatus::Draft, QuoteStatus::Sent)
                | (QuoteStatus::Sent, QuoteStatus::Accepted)
                | (QuoteStatus::Sent, QuoteStatus::Rejected)
                | (QuoteStatus::Draft, QuoteStatus::Expired)
                | (QuoteStatus::Sent, QuoteStatus::Expired)
        )
    }
}

impl core::fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            QuoteStatus::Draft => "draft",
            QuoteStatus::Sent => "sent",
            QuoteStatus::Accepted => "accepted",
            QuoteStatus::Rejected => "rejected",
            QuoteStatus::Expired => "expired",
        };
        f.write_str(s)
    }
}

/// Aggregate root: Quote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    id: QuoteId,
    owner_id: Option<UserId>,
    client_id: Option<ClientId>,
    items: Vec<LineItem>,
    tax_rate: TaxRate,
    totals: Totals,
    status: QuoteStatus,
    notes: Option<String>,
    pdf_url: Option<String>,
    valid_until: Option<DateTime<Utc>>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Quote {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: QuoteId) -> Self {
        Self {
            id,
            owner_id: None,
            client_id: None,
            items: Vec::new(),
            tax_rate: TaxRate::ZERO,
            totals: Totals::default(),
            status: QuoteStatus::Draft,
            notes: None,
            pdf_url: None,
            valid_until: None,
            created_at: None,
            updated_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> QuoteId {
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

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn tax_rate(&self) -> TaxRate {
        self.tax_rate
    }

    pub fn totals(&self) -> Totals {
        self.totals
    }

    pub fn status(&self) -> QuoteStatus {
        self.status
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn pdf_url(&self) -> Option<&str> {
        self.pdf_url.as_deref()
    }

    pub fn valid_until(&self) -> Option<DateTime<Utc>> {
        self.valid_until
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn is_modifiable(&self) -> bool {
        matches!(self.status, QuoteStatus::Draft | QuoteStatus::Sent)
    }

    pub fn is_conversion_allowed(&self) -> bool {
        matches!(self.status, QuoteStatus::Accepted)
    }

    /// Whether a time-based expiry at `now` would apply.
    pub fn is_due_for_expiry(&self, now: DateTime<Utc>) -> bool {
        self.created
            && self.status.can_transition_to(QuoteStatus::Expired)
            && self.valid_until.is_some_and(|until| until <= now)
    }
}

impl AggregateRoot for Quote {
    type Id = QuoteId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateQuote.
///
/// Any totals the caller may have computed are not part of the command; they
/// are always derived from `items` and `tax_rate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateQuote {
    pub owner_id: UserId,
    pub quote_id: QuoteId,
    pub client_id: ClientId,
    pub items: Vec<LineItem>,
    pub tax_rate: TaxRate,
    pub notes: Option<String>,
    pub valid_until: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReviseQuote (full replacement of the editable fields).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviseQuote {
    pub owner_id: UserId,
    pub quote_id: QuoteId,
    pub client_id: ClientId,
    pub items: Vec<LineItem>,
    pub tax_rate: TaxRate,
    pub notes: Option<String>,
    pub valid_until: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SendQuote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendQuote {
    pub owner_id: UserId,
    pub quote_id: QuoteId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AcceptQuote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptQuote {
    pub owner_id: UserId,
    pub quote_id: QuoteId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RejectQuote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectQuote {
    pub owner_id: UserId,
    pub quote_id: QuoteId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ExpireQuote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpireQuote {
    pub owner_id: UserId,
    pub quote_id: QuoteId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AttachQuotePdf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachQuotePdf {
    pub owner_id: UserId,
    pub quote_id: QuoteId,
    pub pdf_url: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuoteCommand {
    CreateQuote(CreateQuote),
    ReviseQuote(ReviseQuote),
    SendQuote(SendQuote),
    AcceptQuote(AcceptQuote),
    RejectQuote(RejectQuote),
    ExpireQuote(ExpireQuote),
    AttachQuotePdf(AttachQuotePdf),
}

/// Event: QuoteCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteCreated {
    pub owner_id: UserId,
    pub quote_id: QuoteId,
    pub client_id: ClientId,
    pub items: Vec<LineItem>,
    pub tax_rate: TaxRate,
    pub totals: Totals,
    pub notes: Option<String>,
    pub valid_until: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: QuoteRevised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRevised {
    pub owner_id: UserId,
    pub quote_id: QuoteId,
    pub client_id: ClientId,
    pub items: Vec<LineItem>,
    pub tax_rate: TaxRate,
    pub totals: Totals,
    pub notes: Option<String>,
    pub valid_until: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: QuoteSent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteSent {
    pub owner_id: UserId,
    pub quote_id: QuoteId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: QuoteAccepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteAccepted {
    pub owner_id: UserId,
    pub quote_id: QuoteId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: QuoteRejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRejected {
    pub owner_id: UserId,
    pub quote_id: QuoteId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: QuoteExpired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteExpired {
    pub owner_id: UserId,
    pub quote_id: QuoteId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: QuotePdfAttached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotePdfAttached {
    pub owner_id: UserId,
    pub quote_id: QuoteId,
    pub pdf_url: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuoteEvent {
    QuoteCreated(QuoteCreated),
    QuoteRevised(QuoteRevised),
    QuoteSent(QuoteSent),
    QuoteAccepted(QuoteAccepted),
    QuoteRejected(QuoteRejected),
    QuoteExpired(QuoteExpired),
    QuotePdfAttached(QuotePdfAttached),
}

impl Event for QuoteEvent {
    fn event_type(&self) -> &'static str {
        match self {
            QuoteEvent::QuoteCreated(_) => "quotes.quote.created",
            QuoteEvent::QuoteRevised(_) => "quotes.quote.revised",
            QuoteEvent::QuoteSent(_) => "quotes.quote.sent",
            QuoteEvent::QuoteAccepted(_) => "quotes.quote.accepted",
            QuoteEvent::QuoteRejected(_) => "quotes.quote.rejected",
            QuoteEvent::QuoteExpired(_) => "quotes.quote.expired",
            QuoteEvent::QuotePdfAttached(_) => "quotes.quote.pdf_attached",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            QuoteEvent::QuoteCreated(e) => e.occurred_at,
            QuoteEvent::QuoteRevised(e) => e.occurred_at,
            QuoteEvent::QuoteSent(e) => e.occurred_at,
            QuoteEvent::QuoteAccepted(e) => e.occurred_at,
            QuoteEvent::QuoteRejected(e) => e.occurred_at,
            QuoteEvent::QuoteExpired(e) => e.occurred_at,
            QuoteEvent::QuotePdfAttached(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Quote {
    type Command = QuoteCommand;
    type Event = QuoteEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            QuoteEvent::QuoteCreated(e) => {
                self.id = e.quote_id;
                self.owner_id = Some(e.owner_id);
                self.client_id = Some(e.client_id);
                self.items = e.items.clone();
                self.tax_rate = e.tax_rate;
                self.totals = e.totals;
                self.notes = e.notes.clone();
                self.valid_until = e.valid_until;
                self.status = QuoteStatus::Draft;
                self.created_at = Some(e.occurred_at);
                self.created = true;
            }
            QuoteEvent::QuoteRevised(e) => {
                self.client_id = Some(e.client_id);
                self.items = e.items.clone();
                self.tax_rate = e.tax_rate;
                self.totals = e.totals;
                self.notes = e.notes.clone();
                self.valid_until = e.valid_until;
            }
            QuoteEvent::QuoteSent(_) => self.status = QuoteStatus::Sent,
            QuoteEvent::QuoteAccepted(_) => self.status = QuoteStatus::Accepted,
            QuoteEvent::QuoteRejected(_) => self.status = QuoteStatus::Rejected,
            QuoteEvent::QuoteExpired(_) => self.status = QuoteStatus::Expired,
            QuoteEvent::QuotePdfAttached(e) => {
                self.pdf_url = Some(e.pdf_url.clone());
            }
        }

        self.updated_at = Some(event.occurred_at());
        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            QuoteCommand::CreateQuote(cmd) => self.handle_create(cmd),
            QuoteCommand::ReviseQuote(cmd) => self.handle_revise(cmd),
            QuoteCommand::SendQuote(cmd) => self.handle_send(cmd),
            QuoteCommand::AcceptQuote(cmd) => self.handle_accept(cmd),
            QuoteCommand::RejectQuote(cmd) => self.handle_reject(cmd),
            QuoteCommand::ExpireQuote(cmd) => self.handle_expire(cmd),
            QuoteCommand::AttachQuotePdf(cmd) => self.handle_attach_pdf(cmd),
        }
    }
}

impl Quote {
    /// Existence and ownership check shared by every command on a created quote.
    ///
    /// A quote owned by someone else is reported exactly like a missing one.
    fn ensure_visible_to(&self, owner_id: UserId, quote_id: QuoteId) -> Result<(), DomainError> {
        if !self.created || self.owner_id != Some(owner_id) {
            return Err(DomainError::not_found());
        }
        if self.id != quote_id {
            return Err(DomainError::invariant("quote_id mismatch"));
        }
        Ok(())
    }

    fn ensure_transition(&self, to: QuoteStatus) -> Result<(), DomainError> {
        if !self.status.can_transition_to(to) {
            return Err(DomainError::illegal_transition(self.status, to));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateQuote) -> Result<Vec<QuoteEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("quote already exists"));
        }

        Ok(vec![QuoteEvent::QuoteCreated(QuoteCreated {
            owner_id: cmd.owner_id,
            quote_id: cmd.quote_id,
            client_id: cmd.client_id,
            items: cmd.items.clone(),
            tax_rate: cmd.tax_rate,
            totals: compute_aggregates(&cmd.items, cmd.tax_rate),
            notes: cmd.notes.clone(),
            valid_until: cmd.valid_until,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_revise(&self, cmd: &ReviseQuote) -> Result<Vec<QuoteEvent>, DomainError> {
        self.ensure_visible_to(cmd.owner_id, cmd.quote_id)?;

        // Only open quotes take revisions; a revision keeps the status.
        if !self.is_modifiable() {
            return Err(DomainError::illegal_transition(self.status, "revised"));
        }

        Ok(vec![QuoteEvent::QuoteRevised(QuoteRevised {
            owner_id: cmd.owner_id,
            quote_id: cmd.quote_id,
            client_id: cmd.client_id,
            items: cmd.items.clone(),
            tax_rate: cmd.tax_rate,
            totals: compute_aggregates(&cmd.items, cmd.tax_rate),
            notes: cmd.notes.clone(),
            valid_until: cmd.valid_until,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_send(&self, cmd: &SendQuote) -> Result<Vec<QuoteEvent>, DomainError> {
        self.ensure_visible_to(cmd.owner_id, cmd.quote_id)?;
        self.ensure_transition(QuoteStatus::Sent)?;

        if self.items.is_empty() {
            return Err(DomainError::validation(
                "cannot send a quote without line items",
            ));
        }

        Ok(vec![QuoteEvent::QuoteSent(QuoteSent {
            owner_id: cmd.owner_id,
            quote_id: cmd.quote_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_accept(&self, cmd: &AcceptQuote) -> Result<Vec<QuoteEvent>, DomainError> {
        self.ensure_visible_to(cmd.owner_id, cmd.quote_id)?;
        self.ensure_transition(QuoteStatus::Accepted)?;

        Ok(vec![QuoteEvent::QuoteAccepted(QuoteAccepted {
            owner_id: cmd.owner_id,
            quote_id: cmd.quote_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reject(&self, cmd: &RejectQuote) -> Result<Vec<QuoteEvent>, DomainError> {
        self.ensure_visible_to(cmd.owner_id, cmd.quote_id)?;
        self.ensure_transition(QuoteStatus::Rejected)?;

        Ok(vec![QuoteEvent::QuoteRejected(QuoteRejected {
            owner_id: cmd.owner_id,
            quote_id: cmd.quote_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_expire(&self, cmd: &ExpireQuote) -> Result<Vec<QuoteEvent>, DomainError> {
        self.ensure_visible_to(cmd.owner_id, cmd.quote_id)?;
        self.ensure_transition(QuoteStatus::Expired)?;

        Ok(vec![QuoteEvent::QuoteExpired(QuoteExpired {
            owner_id: cmd.owner_id,
            quote_id: cmd.quote_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_attach_pdf(&self, cmd: &AttachQuotePdf) -> Result<Vec<QuoteEvent>, DomainError> {
        self.ensure_visible_to(cmd.owner_id, cmd.quote_id)?;

        if cmd.pdf_url.trim().is_empty() {
            return Err(DomainError::validation("pdf_url must not be empty"));
        }

        Ok(vec![QuoteEvent::QuotePdfAttached(QuotePdfAttached {
            owner_id: cmd.owner_id,
            quote_id: cmd.quote_id,
            pdf_url: cmd.pdf_url.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use lumenr_pricing::{ItemKind, LineItemId};
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    const ALL_STATUSES: [QuoteStatus; 5] = [
        QuoteStatus::Draft,
        QuoteStatus::Sent,
        QuoteStatus::Accepted,
        QuoteStatus::Rejected,
        QuoteStatus::Expired,
    ];

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn item(quantity: u32, unit_price: Decimal) -> LineItem {
        LineItem::priced(
            LineItemId::new(),
            ItemKind::Service,
            None,
            "Consulting",
            "",
            quantity,
            unit_price,
        )
        .unwrap()
    }

    fn ontario() -> TaxRate {
        TaxRate::new(dec!(13)).unwrap()
    }

    struct Fixture {
        owner_id: UserId,
        quote_id: QuoteId,
        client_id: ClientId,
        quote: Quote,
    }

    impl Fixture {
        fn new() -> Self {
            let quote_id = QuoteId::new(AggregateId::new());
            Self {
                owner_id: UserId::new(),
                quote_id,
                client_id: ClientId::new(),
                quote: Quote::empty(quote_id),
            }
        }

        fn execute(&mut self, cmd: QuoteCommand) -> Result<(), DomainError> {
            let events = self.quote.handle(&cmd)?;
            for event in &events {
                self.quote.apply(event);
            }
            Ok(())
        }

        fn create_cmd(&self, items: Vec<LineItem>) -> QuoteCommand {
            QuoteCommand::CreateQuote(CreateQuote {
                owner_id: self.owner_id,
                quote_id: self.quote_id,
                client_id: self.client_id,
                items,
                tax_rate: ontario(),
                notes: Some("Net 30".to_string()),
                valid_until: None,
                occurred_at: test_time(),
            })
        }

        fn created_with(items: Vec<LineItem>) -> Self {
            let mut fx = Self::new();
            let cmd = fx.create_cmd(items);
            fx.execute(cmd).unwrap();
            fx
        }

        fn send(&self) -> QuoteCommand {
            QuoteCommand::SendQuote(SendQuote {
                owner_id: self.owner_id,
                quote_id: self.quote_id,
                occurred_at: test_time(),
            })
        }

        fn accept(&self) -> QuoteCommand {
            QuoteCommand::AcceptQuote(AcceptQuote {
                owner_id: self.owner_id,
                quote_id: self.quote_id,
                occurred_at: test_time(),
            })
        }

        fn reject(&self) -> QuoteCommand {
            QuoteCommand::RejectQuote(RejectQuote {
                owner_id: self.owner_id,
                quote_id: self.quote_id,
                occurred_at: test_time(),
            })
        }

        fn expire(&self) -> QuoteCommand {
            QuoteCommand::ExpireQuote(ExpireQuote {
                owner_id: self.owner_id,
                quote_id: self.quote_id,
                occurred_at: test_time(),
            })
        }

        fn revise(&self, items: Vec<LineItem>) -> QuoteCommand {
            QuoteCommand::ReviseQuote(ReviseQuote {
                owner_id: self.owner_id,
                quote_id: self.quote_id,
                client_id: self.client_id,
                items,
                tax_rate: ontario(),
                notes: None,
                valid_until: None,
                occurred_at: test_time(),
            })
        }

        fn command_towards(&self, to: QuoteStatus) -> QuoteCommand {
            match to {
                QuoteStatus::Sent => self.send(),
                QuoteStatus::Accepted => self.accept(),
                QuoteStatus::Rejected => self.reject(),
                QuoteStatus::Expired => self.expire(),
                QuoteStatus::Draft => unreachable!("no command leads back to draft"),
            }
        }

        /// Drive a fresh quote (with one item) into `status`.
        fn in_status(status: QuoteStatus) -> Self {
            let mut fx = Self::created_with(vec![item(1, dec!(10))]);
            let path: &[QuoteStatus] = match status {
                QuoteStatus::Draft => &[],
                QuoteStatus::Sent => &[QuoteStatus::Sent],
                QuoteStatus::Accepted => &[QuoteStatus::Sent, QuoteStatus::Accepted],
                QuoteStatus::Rejected => &[QuoteStatus::Sent, QuoteStatus::Rejected],
                QuoteStatus::Expired => &[QuoteStatus::Expired],
            };
            for step in path {
                let cmd = fx.command_towards(*step);
                fx.execute(cmd).unwrap();
            }
            assert_eq!(fx.quote.status(), status);
            fx
        }
    }

    #[test]
    fn create_quote_emits_created_event_with_server_totals() {
        let fx = Fixture::new();
        let cmd = fx.create_cmd(vec![item(2, dec!(100.00)), item(1, dec!(50.00))]);

        let events = fx.quote.handle(&cmd).unwrap();
        assert_eq!(events.len(), 1);

        match &events[0] {
            QuoteEvent::QuoteCreated(e) => {
                assert_eq!(e.owner_id, fx.owner_id);
                assert_eq!(e.quote_id, fx.quote_id);
                assert_eq!(e.totals.subtotal, dec!(250.00));
                assert_eq!(e.totals.tax, dec!(32.50));
                assert_eq!(e.totals.total, dec!(282.50));
            }
            _ => panic!("Expected QuoteCreated event"),
        }
    }

    #[test]
    fn new_quote_starts_in_draft() {
        let fx = Fixture::created_with(vec![]);
        assert_eq!(fx.quote.status(), QuoteStatus::Draft);
        assert!(fx.quote.created_at().is_some());
        assert_eq!(fx.quote.notes(), Some("Net 30"));
    }

    #[test]
    fn creating_twice_is_a_conflict() {
        let fx = Fixture::created_with(vec![]);
        let err = fx.quote.handle(&fx.create_cmd(vec![])).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn sending_empty_draft_is_rejected() {
        let mut fx = Fixture::created_with(vec![]);
        let err = fx.execute(fx.send()).unwrap_err();

        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(fx.quote.status(), QuoteStatus::Draft);
    }

    #[test]
    fn full_lifecycle_draft_to_sent_to_accepted() {
        let mut fx = Fixture::created_with(vec![item(3, dec!(600))]);

        fx.execute(fx.send()).unwrap();
        assert_eq!(fx.quote.status(), QuoteStatus::Sent);

        fx.execute(fx.accept()).unwrap();
        assert_eq!(fx.quote.status(), QuoteStatus::Accepted);
        assert!(fx.quote.is_conversion_allowed());
        assert_eq!(fx.quote.totals().subtotal, dec!(1800));
        assert_eq!(fx.quote.totals().tax, dec!(234.00));
        assert_eq!(fx.quote.totals().total, dec!(2034.00));
    }

    #[test]
    fn draft_cannot_be_accepted_or_rejected_directly() {
        let mut fx = Fixture::in_status(QuoteStatus::Draft);

        for cmd in [fx.accept(), fx.reject()] {
            let err = fx.execute(cmd).unwrap_err();
            assert!(matches!(err, DomainError::IllegalTransition { .. }));
            assert_eq!(fx.quote.status(), QuoteStatus::Draft);
        }
    }

    #[test]
    fn sent_quote_cannot_be_sent_again() {
        let mut fx = Fixture::in_status(QuoteStatus::Sent);
        let err = fx.execute(fx.send()).unwrap_err();

        assert_eq!(err, DomainError::illegal_transition("sent", "sent"));
        assert_eq!(fx.quote.status(), QuoteStatus::Sent);
    }

    #[test]
    fn no_transition_leads_back_to_draft() {
        for from in ALL_STATUSES {
            assert!(!from.can_transition_to(QuoteStatus::Draft));
        }
    }

    #[test]
    fn transition_table_matches_lifecycle() {
        let legal = [
            (QuoteStatus::Draft, QuoteStatus::Sent),
            (QuoteStatus::Sent, QuoteStatus::Accepted),
            (QuoteStatus::Sent, QuoteStatus::Rejected),
            (QuoteStatus::Draft, QuoteStatus::Expired),
            (QuoteStatus::Sent, QuoteStatus::Expired),
        ];
        for from in ALL_STATUSES {
            for to in ALL_STATUSES {
                assert_eq!(
                    from.can_transition_to(to),
                    legal.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn terminal_states_reject_every_transition() {
        for terminal in [
            QuoteStatus::Accepted,
            QuoteStatus::Rejected,
            QuoteStatus::Expired,
        ] {
            assert!(terminal.is_terminal());
            for to in [
                QuoteStatus::Sent,
                QuoteStatus::Accepted,
                QuoteStatus::Rejected,
                QuoteStatus::Expired,
            ] {
                let mut fx = Fixture::in_status(terminal);
                let version = fx.quote.version();

                let err = fx.execute(fx.command_towards(to)).unwrap_err();

                assert_eq!(err, DomainError::illegal_transition(terminal, to));
                assert_eq!(fx.quote.status(), terminal);
                assert_eq!(fx.quote.version(), version);
            }
        }
    }

    #[test]
    fn draft_and_sent_can_expire() {
        for from in [QuoteStatus::Draft, QuoteStatus::Sent] {
            let mut fx = Fixture::in_status(from);
            fx.execute(fx.expire()).unwrap();
            assert_eq!(fx.quote.status(), QuoteStatus::Expired);
        }
    }

    #[test]
    fn revision_recomputes_totals() {
        let mut fx = Fixture::created_with(vec![item(1, dec!(10))]);
        fx.execute(fx.send()).unwrap();

        fx.execute(fx.revise(vec![item(2, dec!(100.00)), item(1, dec!(50.00))]))
            .unwrap();

        assert_eq!(fx.quote.status(), QuoteStatus::Sent);
        assert_eq!(fx.quote.items().len(), 2);
        assert_eq!(fx.quote.totals().total, dec!(282.50));
        assert!(fx.quote.totals().matches(fx.quote.items(), fx.quote.tax_rate()));
    }

    #[test]
    fn closed_quotes_cannot_be_revised() {
        for status in [
            QuoteStatus::Accepted,
            QuoteStatus::Rejected,
            QuoteStatus::Expired,
        ] {
            let mut fx = Fixture::in_status(status);
            let before = fx.quote.clone();

            let err = fx.execute(fx.revise(vec![item(9, dec!(9))])).unwrap_err();

            assert_eq!(err, DomainError::illegal_transition(status, "revised"));
            assert_eq!(fx.quote, before);
        }
    }

    #[test]
    fn foreign_owner_is_reported_as_not_found() {
        let fx = Fixture::in_status(QuoteStatus::Sent);
        let cmd = QuoteCommand::AcceptQuote(AcceptQuote {
            owner_id: UserId::new(),
            quote_id: fx.quote_id,
            occurred_at: test_time(),
        });

        assert_eq!(fx.quote.handle(&cmd).unwrap_err(), DomainError::NotFound);
    }

    #[test]
    fn commands_on_missing_quote_are_not_found() {
        let fx = Fixture::new();
        assert_eq!(fx.quote.handle(&fx.send()).unwrap_err(), DomainError::NotFound);
    }

    #[test]
    fn pdf_url_is_attached_in_any_status() {
        let mut fx = Fixture::in_status(QuoteStatus::Accepted);
        let cmd = QuoteCommand::AttachQuotePdf(AttachQuotePdf {
            owner_id: fx.owner_id,
            quote_id: fx.quote_id,
            pdf_url: "https://files.example.com/q-1.pdf".to_string(),
            occurred_at: test_time(),
        });

        fx.execute(cmd).unwrap();

        assert_eq!(fx.quote.pdf_url(), Some("https://files.example.com/q-1.pdf"));
        assert_eq!(fx.quote.status(), QuoteStatus::Accepted);
    }

    #[test]
    fn expiry_due_only_past_valid_until() {
        let now = test_time();
        let mut fx = Fixture::new();
        let cmd = QuoteCommand::CreateQuote(CreateQuote {
            owner_id: fx.owner_id,
            quote_id: fx.quote_id,
            client_id: fx.client_id,
            items: vec![],
            tax_rate: TaxRate::ZERO,
            notes: None,
            valid_until: Some(now + Duration::days(14)),
            occurred_at: now,
        });
        fx.execute(cmd).unwrap();

        assert!(!fx.quote.is_due_for_expiry(now));
        assert!(fx.quote.is_due_for_expiry(now + Duration::days(14)));
        assert!(!Quote::empty(fx.quote_id).is_due_for_expiry(now + Duration::days(30)));
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let fx = Fixture::created_with(vec![item(1, dec!(10))]);
        let before = fx.quote.clone();

        let events1 = fx.quote.handle(&fx.send()).unwrap();
        let events2 = fx.quote.handle(&fx.send()).unwrap();

        assert_eq!(fx.quote, before);
        assert_eq!(events1.len(), events2.len());
    }

    #[test]
    fn apply_is_deterministic() {
        let fx = Fixture::created_with(vec![item(2, dec!(5))]);
        let owner_id = fx.owner_id;
        let quote_id = fx.quote_id;
        let at = test_time();

        let events = vec![
            QuoteEvent::QuoteCreated(QuoteCreated {
                owner_id,
                quote_id,
                client_id: fx.client_id,
                items: vec![item(2, dec!(5))],
                tax_rate: ontario(),
                totals: compute_aggregates(&[item(2, dec!(5))], ontario()),
                notes: None,
                valid_until: None,
                occurred_at: at,
            }),
            QuoteEvent::QuoteSent(QuoteSent {
                owner_id,
                quote_id,
                occurred_at: at,
            }),
        ];

        let mut a = Quote::empty(quote_id);
        let mut b = Quote::empty(quote_id);
        for e in &events {
            a.apply(e);
            b.apply(e);
        }

        assert_eq!(a.version(), 2);
        assert_eq!(a.version(), b.version());
        assert_eq!(a.status(), b.status());
        assert_eq!(a.totals(), b.totals());
        assert_eq!(a.status(), QuoteStatus::Sent);
    }

    #[test]
    fn events_round_trip_through_json() {
        let fx = Fixture::new();
        let events = fx
            .quote
            .handle(&fx.create_cmd(vec![item(2, dec!(19.99))]))
            .unwrap();

        let json = serde_json::to_value(&events[0]).unwrap();
        let back: QuoteEvent = serde_json::from_value(json).unwrap();

        assert_eq!(back, events[0]);
    }

    fn status_strategy() -> impl Strategy<Value = QuoteStatus> {
        prop::sample::select(ALL_STATUSES.to_vec())
    }

    proptest! {
        /// Property: a transition outside the lifecycle table leaves the status
        /// unchanged and reports an illegal transition.
        #[test]
        fn illegal_transitions_leave_status_unchanged(
            from in status_strategy(),
            to in status_strategy(),
        ) {
            prop_assume!(to != QuoteStatus::Draft);
            prop_assume!(!from.can_transition_to(to));

            let mut fx = Fixture::in_status(from);
            let result = fx.execute(fx.command_towards(to));

            prop_assert_eq!(result, Err(DomainError::illegal_transition(from, to)));
            prop_assert_eq!(fx.quote.status(), from);
        }
    }
}
