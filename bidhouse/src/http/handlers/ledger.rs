//! Ledger read endpoints.

use crate::http::error::AppError;
use crate::http::state::AppState;
use crate::providers::gateway::PaymentGateway;
use crate::providers::ledger_store::LedgerStore;
use crate::providers::market_store::MarketStore;
use crate::providers::raffle_store::RaffleStore;
use crate::types::{LedgerTransaction, UserId};
use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

/// Response for `GET /api/ledger/:user_id/balance`.
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    /// Account owner.
    pub user_id: Uuid,
    /// Current balance in points.
    pub balance: i64,
}

/// `GET /api/ledger/:user_id/balance`.
pub async fn balance<M, L, R, G>(
    State(state): State<AppState<M, L, R, G>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<BalanceResponse>, AppError>
where
    M: MarketStore + 'static,
    L: LedgerStore + 'static,
    R: RaffleStore + 'static,
    G: PaymentGateway + 'static,
{
    let balance = state.ledger.balance(UserId::from_uuid(user_id)).await?;
    Ok(Json(BalanceResponse {
        user_id,
        balance: balance.value(),
    }))
}

/// `GET /api/ledger/:user_id/history`: full transaction list, newest
/// first.
pub async fn history<M, L, R, G>(
    State(state): State<AppState<M, L, R, G>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<LedgerTransaction>>, AppError>
where
    M: MarketStore + 'static,
    L: LedgerStore + 'static,
    R: RaffleStore + 'static,
    G: PaymentGateway + 'static,
{
    let history = state.ledger.history(UserId::from_uuid(user_id)).await?;
    Ok(Json(history))
}
