//! Raffle endpoints: creation, lookup, purchase and finalization.

use crate::http::error::AppError;
use crate::http::state::AppState;
use crate::providers::gateway::PaymentGateway;
use crate::providers::ledger_store::LedgerStore;
use crate::providers::market_store::MarketStore;
use crate::providers::raffle_store::RaffleStore;
use crate::raffle::PurchaseFunding;
use crate::types::{Money, PaymentMethod, Raffle, RaffleId, UserId};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body for `POST /api/raffles`.
#[derive(Debug, Deserialize)]
pub struct CreateRaffleRequest {
    /// Display title.
    pub title: String,
    /// Price per ticket in minor units.
    pub ticket_price: i64,
    /// Hard cap on entries.
    pub max_entries: u32,
}

/// Raffle representation returned by the API.
#[derive(Debug, Serialize)]
pub struct RaffleResponse {
    /// Raffle identifier.
    pub id: Uuid,
    /// Display title.
    pub title: String,
    /// Price per ticket in minor units.
    pub ticket_price: i64,
    /// Hard cap on entries.
    pub max_entries: u32,
    /// Entries allocated so far.
    pub tickets_sold: u32,
    /// Tickets still available.
    pub remaining: u32,
    /// Lifecycle status.
    pub status: String,
}

impl From<Raffle> for RaffleResponse {
    fn from(raffle: Raffle) -> Self {
        Self {
            id: *raffle.id.as_uuid(),
            remaining: raffle.remaining(),
            title: raffle.title,
            ticket_price: raffle.ticket_price.minor(),
            max_entries: raffle.max_entries,
            tickets_sold: raffle.tickets_sold,
            status: raffle.status.as_str().to_string(),
        }
    }
}

/// Body for `POST /api/raffles/:id/purchase`.
#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    /// Buying user.
    pub buyer_id: Uuid,
    /// Tickets requested; clamped to remaining inventory.
    pub quantity: u32,
    /// Funding rail: `card` or `ledger`.
    pub payment_method: PaymentMethod,
}

/// Response for an initiated purchase.
#[derive(Debug, Serialize)]
pub struct PurchaseResponse {
    /// Purchase identifier.
    pub purchase_id: Uuid,
    /// Tickets reserved by the purchase (after clamping).
    pub quantity: u32,
    /// Entries allocated so far (zero until a card payment confirms).
    pub granted: u32,
    /// Amount charged or to be charged, in minor units.
    pub amount: i64,
    /// Confirmation state.
    pub status: String,
    /// Processor payment intent backing a card purchase; the client echoes
    /// it back to finalize.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,
    /// Client secret for confirming a card payment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
}

/// Body for `POST /api/raffles/:id/purchase/finalize`.
#[derive(Debug, Deserialize)]
pub struct FinalizeRequest {
    /// Payment intent whose purchase should be finalized.
    pub payment_intent_id: String,
}

/// Response for a finalized purchase.
#[derive(Debug, Serialize)]
pub struct FinalizeResponse {
    /// Purchase identifier.
    pub purchase_id: Uuid,
    /// Entries the purchase holds.
    pub entries: u32,
}

/// `POST /api/raffles`: open a raffle.
pub async fn create_raffle<M, L, R, G>(
    State(state): State<AppState<M, L, R, G>>,
    Json(request): Json<CreateRaffleRequest>,
) -> Result<(StatusCode, Json<RaffleResponse>), AppError>
where
    M: MarketStore + 'static,
    L: LedgerStore + 'static,
    R: RaffleStore + 'static,
    G: PaymentGateway + 'static,
{
    let raffle = state
        .raffles
        .create_raffle(
            request.title,
            Money::from_minor(request.ticket_price),
            request.max_entries,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(raffle.into())))
}

/// `GET /api/raffles/:id`.
pub async fn get_raffle<M, L, R, G>(
    State(state): State<AppState<M, L, R, G>>,
    Path(id): Path<Uuid>,
) -> Result<Json<RaffleResponse>, AppError>
where
    M: MarketStore + 'static,
    L: LedgerStore + 'static,
    R: RaffleStore + 'static,
    G: PaymentGateway + 'static,
{
    let raffle = state.raffles.get_raffle(RaffleId::from_uuid(id)).await?;
    Ok(Json(raffle.into()))
}

/// `POST /api/raffles/:id/purchase`: buy tickets.
pub async fn purchase_tickets<M, L, R, G>(
    State(state): State<AppState<M, L, R, G>>,
    Path(id): Path<Uuid>,
    Json(request): Json<PurchaseRequest>,
) -> Result<(StatusCode, Json<PurchaseResponse>), AppError>
where
    M: MarketStore + 'static,
    L: LedgerStore + 'static,
    R: RaffleStore + 'static,
    G: PaymentGateway + 'static,
{
    let funding = match request.payment_method {
        PaymentMethod::Card => PurchaseFunding::Card,
        PaymentMethod::Ledger => PurchaseFunding::Ledger,
    };
    let result = state
        .raffles
        .purchase_tickets(
            RaffleId::from_uuid(id),
            UserId::from_uuid(request.buyer_id),
            request.quantity,
            funding,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(PurchaseResponse {
            purchase_id: *result.purchase.id.as_uuid(),
            quantity: result.purchase.quantity,
            granted: result.granted,
            amount: result.purchase.amount.minor(),
            status: result.purchase.status.as_str().to_string(),
            payment_intent_id: result.purchase.payment_ref.clone(),
            client_secret: result.client_secret,
        }),
    ))
}

/// `POST /api/raffles/:id/purchase/finalize`: allocate entries after a
/// card payment, verifying with the processor first.
pub async fn finalize_purchase<M, L, R, G>(
    State(state): State<AppState<M, L, R, G>>,
    Path(id): Path<Uuid>,
    Json(request): Json<FinalizeRequest>,
) -> Result<Json<FinalizeResponse>, AppError>
where
    M: MarketStore + 'static,
    L: LedgerStore + 'static,
    R: RaffleStore + 'static,
    G: PaymentGateway + 'static,
{
    let finalized = state
        .raffles
        .finalize_purchase(RaffleId::from_uuid(id), &request.payment_intent_id)
        .await?;
    Ok(Json(FinalizeResponse {
        purchase_id: *finalized.purchase_id.as_uuid(),
        entries: finalized.entries,
    }))
}
