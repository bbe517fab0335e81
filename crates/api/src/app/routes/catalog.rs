use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{post, put},
    Json, Router,
};
use uuid::Uuid;

use lumenr_auth::Principal;
use lumenr_pricing::CatalogEntryId;

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_entry).get(list_entries))
        .route("/:id", put(update_entry))
}

pub async fn create_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<dto::CatalogEntryRequest>,
) -> axum::response::Response {
    let entry = body.into_entry(CatalogEntryId::new());
    match services
        .pricing
        .save_catalog_entry(principal.user_id(), entry.clone())
        .await
    {
        Ok(()) => (StatusCode::CREATED, Json(entry)).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

/// Replace an entry. Retiring it (`"active": false`) keeps it out of new
/// selections; documents that copied it are unaffected.
pub async fn update_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(body): Json<dto::CatalogEntryRequest>,
) -> axum::response::Response {
    let entry_id = match Uuid::parse_str(&id) {
        Ok(v) => CatalogEntryId::from_uuid(v),
        Err(_) => return errors::invalid_id("catalog entry"),
    };
    let entry = body.into_entry(entry_id);
    match services
        .pricing
        .save_catalog_entry(principal.user_id(), entry.clone())
        .await
    {
        Ok(()) => (StatusCode::OK, Json(entry)).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn list_entries(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
) -> axum::response::Response {
    match services.pricing.catalog(principal.user_id()).await {
        Ok(catalog) => (StatusCode::OK, Json(catalog.entries())).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
