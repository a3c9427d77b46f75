//! Router composition.

use crate::http::handlers::{auctions, bids, health, ledger, raffles, webhook};
use crate::http::state::AppState;
use crate::providers::gateway::PaymentGateway;
use crate::providers::ledger_store::LedgerStore;
use crate::providers::market_store::MarketStore;
use crate::providers::raffle_store::RaffleStore;
use axum::routing::{get, post};
use axum::Router;

/// Build the application router over any provider set.
///
/// # Example
///
/// ```ignore
/// let state = AppState::new(market, ledger, raffles, gateway, fees, webhook);
/// let app = app_router(state);
/// axum::serve(listener, app).await?;
/// ```
pub fn app_router<M, L, R, G>(state: AppState<M, L, R, G>) -> Router
where
    M: MarketStore + 'static,
    L: LedgerStore + 'static,
    R: RaffleStore + 'static,
    G: PaymentGateway + 'static,
{
    Router::new()
        .route("/health", get(health::health))
        // Auctions
        .route("/api/auctions", post(auctions::create_auction::<M, L, R, G>))
        .route("/api/auctions/:id", get(auctions::get_auction::<M, L, R, G>))
        .route(
            "/api/auctions/:id/complete",
            post(auctions::complete_auction::<M, L, R, G>),
        )
        // Bids
        .route("/api/bids", post(bids::place_bid::<M, L, R, G>))
        // Raffles
        .route("/api/raffles", post(raffles::create_raffle::<M, L, R, G>))
        .route("/api/raffles/:id", get(raffles::get_raffle::<M, L, R, G>))
        .route(
            "/api/raffles/:id/purchase",
            post(raffles::purchase_tickets::<M, L, R, G>),
        )
        .route(
            "/api/raffles/:id/purchase/finalize",
            post(raffles::finalize_purchase::<M, L, R, G>),
        )
        // Ledger
        .route(
            "/api/ledger/:user_id/balance",
            get(ledger::balance::<M, L, R, G>),
        )
        .route(
            "/api/ledger/:user_id/history",
            get(ledger::history::<M, L, R, G>),
        )
        // Processor callbacks
        .route("/webhooks/payments", post(webhook::payments::<M, L, R, G>))
        .with_state(state)
}
