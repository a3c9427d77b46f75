//! Auction listing and settlement endpoints.

use crate::error::MarketError;
use crate::http::error::AppError;
use crate::http::state::AppState;
use crate::providers::gateway::PaymentGateway;
use crate::providers::ledger_store::LedgerStore;
use crate::providers::market_store::MarketStore;
use crate::providers::raffle_store::RaffleStore;
use crate::settlement::SettlementReport;
use crate::types::{
    minimum_increment, required_minimum, Auction, AuctionId, Money, UserId,
};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body for `POST /api/auctions`.
#[derive(Debug, Deserialize)]
pub struct CreateAuctionRequest {
    /// Listing seller.
    pub seller_id: Uuid,
    /// Opening price in minor units.
    pub starting_price: i64,
    /// When bidding closes.
    pub end_time: DateTime<Utc>,
}

/// Auction representation returned by the API.
#[derive(Debug, Serialize)]
pub struct AuctionResponse {
    /// Auction identifier.
    pub id: Uuid,
    /// Listing seller.
    pub seller_id: Uuid,
    /// Opening price in minor units.
    pub starting_price: i64,
    /// Current price in minor units.
    pub current_price: i64,
    /// Lowest acceptable next bid.
    pub min_bid: i64,
    /// Increment band in effect.
    pub increment: i64,
    /// When bidding closes.
    pub end_time: DateTime<Utc>,
    /// Lifecycle status.
    pub status: String,
    /// When the listing was created.
    pub created_at: DateTime<Utc>,
}

impl From<Auction> for AuctionResponse {
    fn from(auction: Auction) -> Self {
        Self {
            id: *auction.id.as_uuid(),
            seller_id: *auction.seller_id.as_uuid(),
            starting_price: auction.starting_price.minor(),
            current_price: auction.current_price.minor(),
            min_bid: required_minimum(auction.current_price).minor(),
            increment: minimum_increment(auction.current_price).minor(),
            end_time: auction.end_time,
            status: auction.status.as_str().to_string(),
            created_at: auction.created_at,
        }
    }
}

/// `POST /api/auctions`: create an active listing.
pub async fn create_auction<M, L, R, G>(
    State(state): State<AppState<M, L, R, G>>,
    Json(request): Json<CreateAuctionRequest>,
) -> Result<(StatusCode, Json<AuctionResponse>), AppError>
where
    M: MarketStore + 'static,
    L: LedgerStore + 'static,
    R: RaffleStore + 'static,
    G: PaymentGateway + 'static,
{
    if request.starting_price < 0 {
        return Err(AppError(MarketError::InvalidAmount));
    }
    let now = Utc::now();
    if request.end_time <= now {
        return Err(AppError(MarketError::AuctionEnded));
    }

    let auction = Auction::new(
        AuctionId::new(),
        UserId::from_uuid(request.seller_id),
        Money::from_minor(request.starting_price),
        request.end_time,
        now,
    );
    state.market.create_auction(&auction).await?;
    Ok((StatusCode::CREATED, Json(auction.into())))
}

/// `GET /api/auctions/:id`.
pub async fn get_auction<M, L, R, G>(
    State(state): State<AppState<M, L, R, G>>,
    Path(id): Path<Uuid>,
) -> Result<Json<AuctionResponse>, AppError>
where
    M: MarketStore + 'static,
    L: LedgerStore + 'static,
    R: RaffleStore + 'static,
    G: PaymentGateway + 'static,
{
    let auction = state.market.get_auction(AuctionId::from_uuid(id)).await?;
    Ok(Json(auction.into()))
}

/// `POST /api/auctions/:id/complete`: settle an ended auction.
pub async fn complete_auction<M, L, R, G>(
    State(state): State<AppState<M, L, R, G>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SettlementReport>, AppError>
where
    M: MarketStore + 'static,
    L: LedgerStore + 'static,
    R: RaffleStore + 'static,
    G: PaymentGateway + 'static,
{
    let report = state
        .settlement
        .complete_auction(AuctionId::from_uuid(id))
        .await?;
    Ok(Json(report))
}
