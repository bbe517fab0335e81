//! HTTP application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store, bus and application service wiring
//! - `routes/`: HTTP routes + handlers (one file per resource)
//! - `dto.rs`: request bodies and JSON views of quotes and invoices
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use lumenr_infra::invoices::DEFAULT_DUE_DAYS;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

use services::AppServices;

/// Router over fresh in-memory services.
pub fn build_app(jwt_secret: String) -> Router {
    build_app_with(jwt_secret, Arc::new(AppServices::in_memory(DEFAULT_DUE_DAYS)))
}

/// Router over the given services: `/health` is public, everything else
/// requires a valid bearer token.
pub fn build_app_with(jwt_secret: String, services: Arc<AppServices>) -> Router {
    let jwt = Arc::new(lumenr_auth::Hs256JwtValidator::new(jwt_secret.into_bytes()));
    let auth_state = middleware::AuthState { jwt };

    let protected = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .layer(ServiceBuilder::new())
}
