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
use lumenr_invoicing::{Invoice, InvoiceId};
use lumenr_infra::command_dispatcher::DispatchError;

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_invoice).get(list_invoices))
        .route("/:id", get(get_invoice))
        .route("/:id/payments", post(register_invoice_payment))
        .route("/:id/cancel", post(cancel_invoice))
        .route("/:id/mark-overdue", post(mark_invoice_overdue))
        .route("/:id/pdf", post(attach_invoice_pdf))
}

fn parse_invoice_id(id: &str) -> Result<InvoiceId, axum::response::Response> {
    id.parse::<AggregateId>()
        .map(InvoiceId::new)
        .map_err(|_| errors::invalid_id("invoice"))
}

fn respond(result: Result<Invoice, DispatchError>) -> axum::response::Response {
    match result {
        Ok(invoice) => (StatusCode::OK, Json(dto::invoice_to_json(&invoice))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn create_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<dto::InvoiceRequest>,
) -> axum::response::Response {
    match services.invoices.create(&principal, body.into(), Utc::now()).await {
        Ok(invoice) => (StatusCode::CREATED, Json(dto::invoice_to_json(&invoice))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn list_invoices(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
) -> axum::response::Response {
    match services.invoices.list(&principal).await {
        Ok(invoices) => {
            let out: Vec<_> = invoices.iter().map(dto::invoice_to_json).collect();
            (StatusCode::OK, Json(out)).into_response()
        }
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn get_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let invoice_id = match parse_invoice_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    respond(services.invoices.get(&principal, invoice_id).await)
}

pub async fn register_invoice_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(body): Json<dto::RegisterPaymentRequest>,
) -> axum::response::Response {
    let invoice_id = match parse_invoice_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    respond(
        services
            .invoices
            .register_payment(&principal, invoice_id, body.amount, Utc::now())
            .await,
    )
}

/// The body is optional; `{"reason": "..."}` is recorded when present.
pub async fn cancel_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    body: Option<Json<dto::CancelInvoiceRequest>>,
) -> axum::response::Response {
    let invoice_id = match parse_invoice_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let reason = body.and_then(|Json(b)| b.reason);
    respond(
        services
            .invoices
            .cancel(&principal, invoice_id, reason, Utc::now())
            .await,
    )
}

pub async fn mark_invoice_overdue(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let invoice_id = match parse_invoice_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    respond(
        services
            .invoices
            .mark_overdue(&principal, invoice_id, Utc::now())
            .await,
    )
}

pub async fn attach_invoice_pdf(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(body): Json<dto::AttachPdfRequest>,
) -> axum::response::Response {
    let invoice_id = match parse_invoice_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    respond(
        services
            .invoices
            .attach_pdf(&principal, invoice_id, body.pdf_url, Utc::now())
            .await,
    )
}
