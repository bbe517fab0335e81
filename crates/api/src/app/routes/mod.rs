use axum::{
    Router,
    routing::{get, post},
};

pub mod catalog;
pub mod clients;
pub mod invoices;
pub mod pricing;
pub mod quotes;
pub mod system;

/// Router for all authenticated (owner-scoped) endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/expiry/run", post(quotes::expire_due_quotes))
        .nest("/quotes", quotes::router())
        .nest("/invoices", invoices::router())
        .nest("/clients", clients::router())
        .nest("/catalog", catalog::router())
        .nest("/pricing", pricing::router())
}
