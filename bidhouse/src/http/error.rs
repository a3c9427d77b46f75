//! Bridges domain errors to HTTP responses.

use crate::error::MarketError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Wrapper turning [`MarketError`] into an HTTP response.
///
/// Validation errors map to 4xx with machine-readable detail (a rejected
/// low bid carries the current price and required minimum so clients can
/// re-bid without another round trip); gateway failures surface as 502 and
/// store failures as 500 with the detail kept server-side.
#[derive(Debug)]
pub struct AppError(pub MarketError);

impl From<MarketError> for AppError {
    fn from(err: MarketError) -> Self {
        Self(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self.0 {
            MarketError::BidTooLow {
                current_price,
                minimum,
                increment,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({
                    "error": self.0.to_string(),
                    "code": "bid_too_low",
                    "current_price": current_price.minor(),
                    "min_bid": minimum.minor(),
                    "increment": increment.minor(),
                }),
            ),
            MarketError::AuctionNotActive
            | MarketError::AuctionEnded
            | MarketError::SelfBidNotAllowed
            | MarketError::InvalidQuantity
            | MarketError::InvalidAmount
            | MarketError::RaffleNotOpen => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "error": self.0.to_string() }),
            ),
            MarketError::NotFound { resource } => (
                StatusCode::NOT_FOUND,
                json!({ "error": self.0.to_string(), "resource": resource }),
            ),
            MarketError::InsufficientFunds => (
                StatusCode::PAYMENT_REQUIRED,
                json!({ "error": self.0.to_string() }),
            ),
            MarketError::PriceChanged
            | MarketError::AlreadyEntered
            | MarketError::RaffleSoldOut
            | MarketError::SellerPaymentNotConfigured => (
                StatusCode::CONFLICT,
                json!({ "error": self.0.to_string() }),
            ),
            MarketError::PaymentAuthorizationFailed { .. } | MarketError::CaptureFailed { .. } => (
                StatusCode::PAYMENT_REQUIRED,
                json!({ "error": self.0.to_string() }),
            ),
            MarketError::GatewayError { .. } => {
                tracing::error!(error = %self.0, "gateway failure surfaced to client");
                (
                    StatusCode::BAD_GATEWAY,
                    json!({ "error": "payment gateway unavailable" }),
                )
            }
            MarketError::Database(_) | MarketError::Internal(_) => {
                tracing::error!(error = %self.0, "internal failure surfaced to client");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "internal error" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Money;

    #[test]
    fn bid_too_low_maps_to_unprocessable() {
        let response = AppError(MarketError::BidTooLow {
            current_price: Money::from_minor(90),
            minimum: Money::from_minor(91),
            increment: Money::from_minor(1),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn conflicts_map_to_409() {
        let response = AppError(MarketError::PriceChanged).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn store_failures_hide_detail() {
        let response = AppError(MarketError::Database("connection reset".to_string()))
            .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
