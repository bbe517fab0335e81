use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use lumenr_auth::Principal;
use lumenr_core::AggregateId;
use lumenr_infra::quotes::QuoteTransition;
use lumenr_quotes::QuoteId;

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_quote).get(list_quotes))
        .route("/:id", get(get_quote).put(revise_quote))
        .route("/:id/send", post(send_quote))
        .route("/:id/accept", post(accept_quote))
        .route("/:id/reject", post(reject_quote))
        .route("/:id/expire", post(expire_quote))
        .route("/:id/convert", post(convert_quote))
        .route("/:id/pdf", post(attach_quote_pdf))
}

fn parse_quote_id(id: &str) -> Result<QuoteId, axum::response::Response> {
    id.parse::<AggregateId>()
        .map(QuoteId::new)
        .map_err(|_| errors::invalid_id("quote"))
}

pub async fn create_quote(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<dto::QuoteRequest>,
) -> axum::response::Response {
    match services.quotes.create(&principal, body.into(), Utc::now()).await {
        Ok(quote) => (StatusCode::CREATED, Json(dto::quote_to_json(&quote))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn list_quotes(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
) -> axum::response::Response {
    match services.quotes.list(&principal).await {
        Ok(quotes) => {
            let out: Vec<_> = quotes.iter().map(dto::quote_to_json).collect();
            (StatusCode::OK, Json(out)).into_response()
        }
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn get_quote(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let quote_id = match parse_quote_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services.quotes.get(&principal, quote_id).await {
        Ok(quote) => (StatusCode::OK, Json(dto::quote_to_json(&quote))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn revise_quote(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(body): Json<dto::QuoteRequest>,
) -> axum::response::Response {
    let quote_id = match parse_quote_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services
        .quotes
        .revise(&principal, quote_id, body.into(), Utc::now())
        .await
    {
        Ok(quote) => (StatusCode::OK, Json(dto::quote_to_json(&quote))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

async fn transition(
    services: &AppServices,
    principal: &Principal,
    id: &str,
    transition: QuoteTransition,
) -> axum::response::Response {
    let quote_id = match parse_quote_id(id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services
        .quotes
        .transition(principal, quote_id, transition, Utc::now())
        .await
    {
        Ok(quote) => (StatusCode::OK, Json(dto::quote_to_json(&quote))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn send_quote(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> axum::response::Response {
    transition(&services, &principal, &id, QuoteTransition::Send).await
}

pub async fn accept_quote(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> axum::response::Response {
    transition(&services, &principal, &id, QuoteTransition::Accept).await
}

pub async fn reject_quote(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> axum::response::Response {
    transition(&services, &principal, &id, QuoteTransition::Reject).await
}

pub async fn expire_quote(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> axum::response::Response {
    transition(&services, &principal, &id, QuoteTransition::Expire).await
}

pub async fn convert_quote(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let quote_id = match parse_quote_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services.converter.convert(&principal, quote_id, Utc::now()).await {
        Ok(invoice) => (StatusCode::CREATED, Json(dto::invoice_to_json(&invoice))).into_response(),
        Err(e) => errors::conversion_error_to_response(e),
    }
}

pub async fn attach_quote_pdf(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(body): Json<dto::AttachPdfRequest>,
) -> axum::response::Response {
    let quote_id = match parse_quote_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services
        .quotes
        .attach_pdf(&principal, quote_id, body.pdf_url, Utc::now())
        .await
    {
        Ok(quote) => (StatusCode::OK, Json(dto::quote_to_json(&quote))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

/// Expire the caller's open quotes whose validity has lapsed.
pub async fn expire_due_quotes(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
) -> axum::response::Response {
    match services.expiry.expire_due(&principal, Utc::now()).await {
        Ok(expired) => (
            StatusCode::OK,
            Json(serde_json::json!({ "expired": expired })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
