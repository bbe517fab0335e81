use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use lumenr_auth::Principal;
use lumenr_core::{ClientId, UserId};
use lumenr_pricing::ProvincialTaxTable;

use crate::catalog::InMemoryCatalog;
use crate::clients::{ClientProfile, InMemoryClientDirectory};
use crate::command_dispatcher::CommandDispatcher;
use crate::conversion::QuoteConverter;
use crate::event_store::{EventStore, InMemoryEventStore};
use crate::invoices::{DEFAULT_DUE_DAYS, InvoiceService};
use crate::pricing::PricingService;
use crate::quotes::QuoteService;
use crate::{Dispatcher, EnvelopeBus};

/// In-memory wiring of every service for one signed-in owner.
pub(crate) struct Harness {
    pub principal: Principal,
    pub now: DateTime<Utc>,
    pub dispatcher: Arc<Dispatcher>,
    pub clients: Arc<InMemoryClientDirectory>,
    pub pricing: Arc<PricingService>,
    pub quotes: QuoteService,
    pub invoices: InvoiceService,
    pub converter: QuoteConverter,
}

impl Harness {
    pub fn new() -> Self {
        let store: Arc<dyn EventStore> = Arc::new(InMemoryEventStore::new());
        let dispatcher: Arc<Dispatcher> =
            Arc::new(CommandDispatcher::new(store, Arc::new(EnvelopeBus::new())));
        let clients = Arc::new(InMemoryClientDirectory::new());
        let pricing = Arc::new(PricingService::new(
            Arc::new(InMemoryCatalog::new()),
            clients.clone(),
            Arc::new(ProvincialTaxTable),
        ));

        Self {
            principal: Principal::new(UserId::new()),
            now: Utc.with_ymd_and_hms(2026, 5, 4, 15, 30, 0).unwrap(),
            quotes: QuoteService::new(dispatcher.clone(), pricing.clone()),
            invoices: InvoiceService::new(dispatcher.clone(), pricing.clone(), DEFAULT_DUE_DAYS),
            converter: QuoteConverter::new(dispatcher.clone()),
            dispatcher,
            clients,
            pricing,
        }
    }

    /// Register a Canadian client of the principal in `province`.
    pub fn client_in(&self, province: &str) -> ClientId {
        let profile = ClientProfile {
            id: ClientId::new(),
            name: format!("Client in {province}"),
            country: "CA".to_string(),
            province: Some(province.to_string()),
        };
        let id = profile.id;
        self.clients
            .insert(self.principal.user_id(), profile)
            .unwrap();
        id
    }
}
