//! Payment processor webhook endpoint.
//!
//! Deliveries are authenticated by signature before the body is parsed;
//! an unverifiable delivery is rejected with 401 and never touches state.
//! Events for unknown payment references are acknowledged and dropped, and
//! repeated deliveries are absorbed by the idempotent entry allocation.

use crate::http::error::AppError;
use crate::http::signature;
use crate::http::state::AppState;
use crate::providers::gateway::PaymentGateway;
use crate::providers::ledger_store::LedgerStore;
use crate::providers::market_store::MarketStore;
use crate::providers::raffle_store::RaffleStore;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

/// Signature header sent by the processor.
pub const SIGNATURE_HEADER: &str = "webhook-signature";
/// Timestamp header sent by the processor.
pub const TIMESTAMP_HEADER: &str = "webhook-timestamp";

#[derive(Debug, Deserialize)]
struct WebhookEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: WebhookData,
}

#[derive(Debug, Deserialize)]
struct WebhookData {
    payment_ref: String,
}

/// `POST /webhooks/payments`.
pub async fn payments<M, L, R, G>(
    State(state): State<AppState<M, L, R, G>>,
    headers: HeaderMap,
    body: String,
) -> Result<(StatusCode, Json<Value>), AppError>
where
    M: MarketStore + 'static,
    L: LedgerStore + 'static,
    R: RaffleStore + 'static,
    G: PaymentGateway + 'static,
{
    let provided = header_value(&headers, SIGNATURE_HEADER);
    let timestamp = header_value(&headers, TIMESTAMP_HEADER);
    let (Some(provided), Some(timestamp)) = (provided, timestamp) else {
        return Ok(unauthorized("missing signature headers"));
    };

    if let Err(err) = signature::verify(
        &state.webhook.secret,
        timestamp,
        &body,
        provided,
        Utc::now().timestamp(),
        state.webhook.tolerance,
    ) {
        tracing::warn!(error = %err, "rejected webhook delivery");
        return Ok(unauthorized(&err.to_string()));
    }

    let event: WebhookEvent = match serde_json::from_str(&body) {
        Ok(event) => event,
        Err(err) => {
            tracing::warn!(error = %err, "malformed webhook payload");
            return Ok((
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "malformed payload" })),
            ));
        }
    };

    match event.event_type.as_str() {
        "payment.succeeded" => {
            state
                .raffles
                .handle_payment_event(&event.data.payment_ref, true)
                .await?;
        }
        "payment.failed" => {
            state
                .raffles
                .handle_payment_event(&event.data.payment_ref, false)
                .await?;
        }
        other => {
            tracing::debug!(event_type = other, "ignoring webhook event type");
        }
    }

    Ok((StatusCode::OK, Json(json!({ "received": true }))))
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn unauthorized(reason: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": reason })),
    )
}
