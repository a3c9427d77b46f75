//! In-memory provider implementations for testing.
//!
//! The mocks keep the real concurrency semantics of their Postgres
//! counterparts (conditional commits, claim flips, atomic inventory
//! clamps) behind a single in-process lock, so service-level tests
//! exercise the same races the production stores arbitrate.

mod gateway;
mod ledger;
mod market;
mod raffle;

pub use gateway::MockPaymentGateway;
pub use ledger::MockLedgerStore;
pub use market::MockMarketStore;
pub use raffle::MockRaffleStore;

use crate::error::MarketError;

pub(crate) fn poisoned() -> MarketError {
    MarketError::Internal("mock state lock poisoned".to_string())
}
