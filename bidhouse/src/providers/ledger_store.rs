//! Ledger store trait.

use crate::error::Result;
use crate::types::{LedgerEntryType, LedgerTransaction, Points, UserId};
use std::future::Future;

/// Atomic point-currency storage.
///
/// The single mutation entry point is [`LedgerStore::adjust_balance`]; no
/// component may read-then-write a balance around it. The Postgres
/// implementation delegates to the `ledger_adjust_balance` stored procedure
/// so the zero-crossing check and the transaction row commit atomically.
pub trait LedgerStore: Send + Sync {
    /// Apply a signed change to a user's balance and append the matching
    /// immutable transaction row.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientFunds` when the resulting balance would be
    /// negative; in that case nothing is written.
    fn adjust_balance(
        &self,
        user_id: UserId,
        change: Points,
        entry_type: LedgerEntryType,
        reference: Option<&str>,
        metadata: serde_json::Value,
    ) -> impl Future<Output = Result<Points>> + Send;

    /// Current balance; zero for users with no transactions.
    ///
    /// # Errors
    ///
    /// Returns `Database` on store failure.
    fn balance(&self, user_id: UserId) -> impl Future<Output = Result<Points>> + Send;

    /// Full transaction history, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Database` on store failure.
    fn history(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Vec<LedgerTransaction>>> + Send;
}
