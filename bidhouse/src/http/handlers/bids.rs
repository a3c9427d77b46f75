//! Bid placement endpoint.

use crate::bidding::BidFunding;
use crate::error::MarketError;
use crate::http::error::AppError;
use crate::http::state::AppState;
use crate::providers::gateway::PaymentGateway;
use crate::providers::ledger_store::LedgerStore;
use crate::providers::market_store::MarketStore;
use crate::providers::raffle_store::RaffleStore;
use crate::types::{AuctionId, Bid, Money, PaymentMethod, UserId};
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body for `POST /api/bids`.
#[derive(Debug, Deserialize)]
pub struct PlaceBidRequest {
    /// Auction to bid on.
    pub auction_id: Uuid,
    /// Bidding user.
    pub bidder_id: Uuid,
    /// Bid amount in minor units.
    pub amount: i64,
    /// Funding rail: `card` or `ledger`.
    pub payment_method: PaymentMethod,
    /// Card token; required when `payment_method` is `card`.
    pub payment_method_id: Option<String>,
}

/// Response for an accepted bid.
#[derive(Debug, Serialize)]
pub struct PlaceBidResponse {
    /// The committed bid.
    pub bid: Bid,
    /// Auction price after the placement.
    pub new_current_price: i64,
    /// Funding rail the bid used.
    pub payment_method: PaymentMethod,
    /// Points held when the bid was funded from the ledger.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bidcoin_hold: Option<i64>,
}

/// `POST /api/bids`: validate, fund and commit a bid.
pub async fn place_bid<M, L, R, G>(
    State(state): State<AppState<M, L, R, G>>,
    Json(request): Json<PlaceBidRequest>,
) -> Result<(StatusCode, Json<PlaceBidResponse>), AppError>
where
    M: MarketStore + 'static,
    L: LedgerStore + 'static,
    R: RaffleStore + 'static,
    G: PaymentGateway + 'static,
{
    if request.amount <= 0 {
        return Err(AppError(MarketError::InvalidAmount));
    }
    let funding = match request.payment_method {
        PaymentMethod::Card => {
            let payment_method_id = request.payment_method_id.ok_or(AppError(
                MarketError::PaymentAuthorizationFailed {
                    reason: "payment_method_id is required for card bids".to_string(),
                },
            ))?;
            BidFunding::Card { payment_method_id }
        }
        PaymentMethod::Ledger => BidFunding::Ledger,
    };

    let placed = state
        .bids
        .place_bid(
            AuctionId::from_uuid(request.auction_id),
            UserId::from_uuid(request.bidder_id),
            Money::from_minor(request.amount),
            funding,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(PlaceBidResponse {
            new_current_price: placed.new_price.minor(),
            payment_method: placed.bid.payment_method,
            bidcoin_hold: placed.bid.ledger_hold.map(|held| held.value()),
            bid: placed.bid,
        }),
    ))
}
