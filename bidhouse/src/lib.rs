//! BidHouse: auction settlement and value-transfer engine for an online
//! bidding marketplace.
//!
//! The crate is organized around capability traits and the services that
//! drive them:
//!
//! - [`bidding::BidEngine`] validates, funds and atomically commits bids,
//!   enforcing the price-band increment rule and releasing superseded
//!   authorization holds.
//! - [`settlement::SettlementService`] fences an ended auction, captures
//!   the winner's hold, splits funds between seller and platform, and
//!   sweeps losing holds.
//! - [`ledger::Ledger`] is the append-only point-currency ledger; balances
//!   never go negative and every change is an immutable row.
//! - [`raffle::RaffleService`] sells finite raffle inventory with a strict
//!   entry cap under concurrent purchases.
//!
//! Providers live in [`providers`] (traits), [`stores`] (`PostgreSQL`) and
//! [`mocks`] (in-memory, for tests). The HTTP surface in [`http`] is
//! generic over the provider set, so integration tests drive the real
//! router against mocks.

pub mod bidding;
pub mod config;
pub mod error;
pub mod http;
pub mod ledger;
pub mod mocks;
pub mod providers;
pub mod raffle;
pub mod settlement;
pub mod stores;
pub mod types;

pub use config::Config;
pub use error::{MarketError, Result};
