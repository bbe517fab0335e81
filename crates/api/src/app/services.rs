use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use lumenr_events::EventBus;
use lumenr_infra::{
    Dispatcher, EnvelopeBus,
    catalog::{CatalogSource, InMemoryCatalog, PostgresCatalog},
    clients::{ClientDirectory, InMemoryClientDirectory, PostgresClientDirectory},
    command_dispatcher::CommandDispatcher,
    conversion::QuoteConverter,
    event_store::{EventStore, InMemoryEventStore, PostgresEventStore},
    expiry::QuoteExpiry,
    invoices::InvoiceService,
    pricing::PricingService,
    quotes::QuoteService,
};
use lumenr_pricing::ProvincialTaxTable;

use crate::config::AppConfig;

/// Every application service the handlers call, wired over one store and bus.
pub struct AppServices {
    pub quotes: QuoteService,
    pub invoices: InvoiceService,
    pub converter: QuoteConverter,
    pub expiry: QuoteExpiry,
    pub pricing: Arc<PricingService>,
}

impl AppServices {
    /// Volatile wiring for dev and tests.
    pub fn in_memory(invoice_due_days: i64) -> Self {
        let store: Arc<dyn EventStore> = Arc::new(InMemoryEventStore::new());
        Self::wire(
            store,
            Arc::new(InMemoryCatalog::new()),
            Arc::new(InMemoryClientDirectory::new()),
            invoice_due_days,
        )
    }

    /// Event store, catalog and client directory in Postgres.
    pub async fn postgres(database_url: &str, invoice_due_days: i64) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        let store: Arc<dyn EventStore> = Arc::new(PostgresEventStore::new(pool.clone()));
        Ok(Self::wire(
            store,
            Arc::new(PostgresCatalog::new(pool.clone())),
            Arc::new(PostgresClientDirectory::new(pool)),
            invoice_due_days,
        ))
    }

    pub async fn from_config(config: &AppConfig) -> Result<Self, sqlx::Error> {
        match (config.use_persistent_stores, config.database_url.as_deref()) {
            (true, Some(url)) => {
                info!("using Postgres event store, catalog and client directory");
                Self::postgres(url, config.invoice_due_days).await
            }
            _ => {
                warn!("using in-memory stores; data is lost on restart");
                Ok(Self::in_memory(config.invoice_due_days))
            }
        }
    }

    fn wire(
        store: Arc<dyn EventStore>,
        catalog: Arc<dyn CatalogSource>,
        clients: Arc<dyn ClientDirectory>,
        invoice_due_days: i64,
    ) -> Self {
        let bus = Arc::new(EnvelopeBus::new());
        spawn_event_log(&bus);

        let dispatcher: Arc<Dispatcher> = Arc::new(CommandDispatcher::new(store, bus));
        let pricing = Arc::new(PricingService::new(
            catalog,
            clients,
            Arc::new(ProvincialTaxTable),
        ));

        Self {
            quotes: QuoteService::new(dispatcher.clone(), pricing.clone()),
            invoices: InvoiceService::new(dispatcher.clone(), pricing.clone(), invoice_due_days),
            converter: QuoteConverter::new(dispatcher.clone()),
            expiry: QuoteExpiry::new(dispatcher),
            pricing,
        }
    }
}

/// Log every committed event. The thread ends once the bus is dropped.
fn spawn_event_log(bus: &EnvelopeBus) {
    let sub = bus.subscribe();
    let spawned = std::thread::Builder::new()
        .name("lumenr-event-log".to_string())
        .spawn(move || {
            while let Ok(env) = sub.recv() {
                info!(
                    owner_id = %env.owner_id(),
                    aggregate_type = env.aggregate_type(),
                    aggregate_id = %env.aggregate_id(),
                    event_type = env.event_type(),
                    sequence_number = env.sequence_number(),
                    "event committed"
                );
            }
        });

    if let Err(e) = spawned {
        warn!(error = %e, "event log thread not started");
    }
}
