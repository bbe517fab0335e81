use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use lumenr_auth::Principal;
use lumenr_core::ClientId;
use lumenr_infra::command_dispatcher::DispatchError;

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", post(register_client).get(list_clients))
        .route("/:id", get(get_client))
}

pub async fn register_client(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<dto::RegisterClientRequest>,
) -> axum::response::Response {
    let profile = body.into_profile(ClientId::new());
    match services
        .pricing
        .clients()
        .register(principal.user_id(), profile.clone())
        .await
    {
        Ok(()) => (StatusCode::CREATED, Json(profile)).into_response(),
        Err(e) => errors::dispatch_error_to_response(DispatchError::from(e)),
    }
}

pub async fn list_clients(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
) -> axum::response::Response {
    match services.pricing.clients().list(principal.user_id()).await {
        Ok(clients) => (StatusCode::OK, Json(clients)).into_response(),
        Err(e) => errors::dispatch_error_to_response(DispatchError::from(e)),
    }
}

pub async fn get_client(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let client_id: ClientId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("client"),
    };
    match services.pricing.client(principal.user_id(), client_id).await {
        Ok(profile) => (StatusCode::OK, Json(profile)).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
