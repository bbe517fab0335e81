use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};

use lumenr_auth::Principal;

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new().route("/preview", post(preview))
}

/// Totals for an unsaved item list. Nothing is stored.
pub async fn preview(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<dto::PreviewRequest>,
) -> axum::response::Response {
    match services
        .pricing
        .preview(principal.user_id(), body.client_id, &body.items, body.tax_rate)
        .await
    {
        Ok(priced) => (StatusCode::OK, Json(dto::priced_to_json(&priced))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
