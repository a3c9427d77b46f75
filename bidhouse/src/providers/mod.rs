//! Marketplace providers.
//!
//! This module defines traits for every external dependency the marketplace
//! core talks to: the transactional store (auctions/bids/payments, ledger,
//! raffles) and the remote payment processor. The services depend on these
//! traits, never on concrete clients, so the whole core is testable with the
//! in-memory implementations in [`crate::mocks`].
//!
//! Concrete implementations:
//! - **Production**: [`crate::stores::postgres::PostgresStore`] and
//!   [`RestPaymentGateway`]
//! - **Testing**: the mocks (in-memory, deterministic, with real atomic
//!   semantics so concurrency properties still hold)

pub mod gateway;
pub mod ledger_store;
pub mod market_store;
pub mod raffle_store;
pub mod rest_gateway;

pub use gateway::{
    Authorization, AuthorizationMetadata, AuthorizationRequest, Capture, PaymentGateway,
    PaymentIntent, PaymentOutcome, Transfer,
};
pub use ledger_store::LedgerStore;
pub use market_store::MarketStore;
pub use raffle_store::{EntryAllocation, RaffleStore};
pub use rest_gateway::RestPaymentGateway;
