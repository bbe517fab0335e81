use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use tracing::error;

use lumenr_infra::command_dispatcher::DispatchError;
use lumenr_infra::conversion::ConversionError;

pub fn dispatch_error_to_response(err: DispatchError) -> axum::response::Response {
    match err {
        DispatchError::Concurrency(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DispatchError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DispatchError::IllegalTransition { from, to } => json_error(
            StatusCode::CONFLICT,
            "illegal_transition",
            format!("cannot move from '{from}' to '{to}'"),
        ),
        DispatchError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        DispatchError::Unauthorized => {
            json_error(StatusCode::UNAUTHORIZED, "unauthorized", "unauthorized")
        }
        DispatchError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        other => internal_error(other),
    }
}

pub fn conversion_error_to_response(err: ConversionError) -> axum::response::Response {
    match err {
        ConversionError::QuoteNotFound => {
            json_error(StatusCode::NOT_FOUND, "not_found", "quote not found")
        }
        ConversionError::NotAccepted { status } => json_error(
            StatusCode::CONFLICT,
            "illegal_transition",
            format!("only accepted quotes may be converted (quote is {status})"),
        ),
        ConversionError::Dispatch(e) => dispatch_error_to_response(e),
    }
}

/// Store, catalog, payload and publication failures. Details go to the log,
/// not to the caller.
fn internal_error(err: DispatchError) -> axum::response::Response {
    error!(error = %err, "request failed");
    let code = match err {
        DispatchError::Publish(_) => "publish_error",
        DispatchError::Deserialize(_) => "deserialize_error",
        DispatchError::OwnerIsolation(_) => "owner_isolation",
        DispatchError::Catalog(_) => "catalog_error",
        DispatchError::Clients(_) => "client_directory_error",
        _ => "store_error",
    };
    json_error(StatusCode::INTERNAL_SERVER_ERROR, code, "internal error")
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn invalid_id(what: &str) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what} id"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumenr_quotes::QuoteStatus;

    #[test]
    fn domain_failures_map_to_client_errors() {
        let cases = [
            (DispatchError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (DispatchError::NotFound, StatusCode::NOT_FOUND),
            (
                DispatchError::IllegalTransition {
                    from: "draft".into(),
                    to: "accepted".into(),
                },
                StatusCode::CONFLICT,
            ),
            (DispatchError::InvariantViolation("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (DispatchError::Concurrency("x".into()), StatusCode::CONFLICT),
            (DispatchError::Publish("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (DispatchError::Clients("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            assert_eq!(dispatch_error_to_response(err).status(), status);
        }
    }

    #[test]
    fn unaccepted_quote_conversion_is_a_conflict() {
        let res = conversion_error_to_response(ConversionError::NotAccepted {
            status: QuoteStatus::Sent,
        });
        assert_eq!(res.status(), StatusCode::CONFLICT);

        let res = conversion_error_to_response(ConversionError::QuoteNotFound);
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
