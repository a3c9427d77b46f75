//! Shared application state for HTTP handlers.

use crate::bidding::BidEngine;
use crate::ledger::Ledger;
use crate::providers::gateway::PaymentGateway;
use crate::providers::ledger_store::LedgerStore;
use crate::providers::market_store::MarketStore;
use crate::providers::raffle_store::RaffleStore;
use crate::raffle::RaffleService;
use crate::settlement::SettlementService;
use std::sync::Arc;

/// Webhook verification parameters carried into the webhook handler.
#[derive(Clone)]
pub struct WebhookConfig {
    /// Shared secret the processor signs deliveries with.
    pub secret: String,
    /// Accepted timestamp skew in seconds.
    pub tolerance: u64,
}

/// Application state, generic over the provider implementations.
///
/// Production wires `PostgresStore` and `RestPaymentGateway`; tests wire
/// the in-memory mocks. Handlers take whichever through the same generic
/// parameters.
pub struct AppState<M, L, R, G> {
    /// Bid placement engine.
    pub bids: Arc<BidEngine<M, L, G>>,
    /// Auction settlement service.
    pub settlement: Arc<SettlementService<M, L, G>>,
    /// Raffle ticket sales.
    pub raffles: Arc<RaffleService<R, L, G>>,
    /// Point-currency ledger.
    pub ledger: Arc<Ledger<L>>,
    /// Auction/bid store, for listing reads and auction creation.
    pub market: Arc<M>,
    /// Webhook verification parameters.
    pub webhook: WebhookConfig,
}

impl<M, L, R, G> Clone for AppState<M, L, R, G> {
    fn clone(&self) -> Self {
        Self {
            bids: Arc::clone(&self.bids),
            settlement: Arc::clone(&self.settlement),
            raffles: Arc::clone(&self.raffles),
            ledger: Arc::clone(&self.ledger),
            market: Arc::clone(&self.market),
            webhook: self.webhook.clone(),
        }
    }
}

impl<M, L, R, G> AppState<M, L, R, G>
where
    M: MarketStore + Clone,
    L: LedgerStore + Clone,
    R: RaffleStore,
    G: PaymentGateway + Clone,
{
    /// Assemble the state from provider instances and fee policy.
    pub fn new(
        market: M,
        ledger_store: L,
        raffle_store: R,
        gateway: G,
        fees: crate::config::FeesConfig,
        webhook: WebhookConfig,
    ) -> Self {
        let ledger = Ledger::new(ledger_store.clone());
        Self {
            bids: Arc::new(BidEngine::new(
                market.clone(),
                Ledger::new(ledger_store.clone()),
                gateway.clone(),
                fees.clone(),
            )),
            settlement: Arc::new(SettlementService::new(
                market.clone(),
                Ledger::new(ledger_store),
                gateway.clone(),
                fees,
            )),
            raffles: Arc::new(RaffleService::new(raffle_store, ledger.clone(), gateway)),
            ledger: Arc::new(ledger),
            market: Arc::new(market),
            webhook,
        }
    }
}
