//! Request handlers, grouped by resource.

pub mod auctions;
pub mod bids;
pub mod health;
pub mod ledger;
pub mod raffles;
pub mod webhook;
