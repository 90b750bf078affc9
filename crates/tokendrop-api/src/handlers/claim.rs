use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tokendrop_types::{DisbursementOutcome, TokendropError, VerificationError};

use crate::state::AppState;
use crate::wire::{ClaimBody, ClaimResponse};

/// `POST /api/claim`
pub async fn handle_claim(State(state): State<AppState>, body: Bytes) -> Response {
    let request = match ClaimBody::from_slice(&body).and_then(ClaimBody::into_request) {
        Ok(request) => request,
        Err(e) => return rejected(&e),
    };

    match state.service.disburse(request).await {
        Ok(DisbursementOutcome::Disbursed(receipt)) => (
            StatusCode::OK,
            Json(ClaimResponse::disbursed(receipt.transaction_id.as_str())),
        )
            .into_response(),
        Ok(DisbursementOutcome::AlreadyClaimed { .. }) => {
            (StatusCode::CONFLICT, Json(ClaimResponse::already_claimed())).into_response()
        }
        Err(TokendropError::Verification(e)) => rejected(&e),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, Json(ClaimResponse::error(e.to_string()))).into_response(),
    }
}

fn rejected(error: &VerificationError) -> Response {
    tracing::debug!(reason = error.reason_code(), detail = %error, "Claim request rejected");
    (StatusCode::BAD_REQUEST, Json(ClaimResponse::error(error.reason_code()))).into_response()
}
