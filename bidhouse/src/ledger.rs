//! Point-currency ledger service ("bidcoins").
//!
//! Thin verb layer over [`LedgerStore`]: every mutation goes through the
//! store's atomic `adjust_balance`, which enforces the non-negativity rule
//! and appends the immutable transaction row in the same transaction. The
//! service never reads a balance to decide whether a debit fits; the store
//! answers that atomically.

use crate::error::Result;
use crate::providers::ledger_store::LedgerStore;
use crate::types::{LedgerEntryType, LedgerTransaction, Points, UserId};
use serde_json::json;

/// Ledger operations over an injected store.
#[derive(Clone)]
pub struct Ledger<L> {
    store: L,
}

impl<L: LedgerStore> Ledger<L> {
    /// Creates a ledger service over `store`.
    pub const fn new(store: L) -> Self {
        Self { store }
    }

    /// Current balance; zero for users with no history.
    ///
    /// # Errors
    ///
    /// Returns `Database` on store failure.
    pub async fn balance(&self, user_id: UserId) -> Result<Points> {
        self.store.balance(user_id).await
    }

    /// Full transaction history, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Database` on store failure.
    pub async fn history(&self, user_id: UserId) -> Result<Vec<LedgerTransaction>> {
        self.store.history(user_id).await
    }

    /// Credit points to a user (bonuses, rewards, seller proceeds).
    ///
    /// # Errors
    ///
    /// Returns `Database` on store failure.
    pub async fn award(
        &self,
        user_id: UserId,
        amount: Points,
        entry_type: LedgerEntryType,
        reference: Option<&str>,
    ) -> Result<Points> {
        let new_balance = self
            .store
            .adjust_balance(user_id, amount, entry_type, reference, json!({}))
            .await?;
        tracing::info!(
            user_id = %user_id,
            amount = amount.value(),
            entry_type = entry_type.as_str(),
            balance = new_balance.value(),
            "points awarded"
        );
        Ok(new_balance)
    }

    /// Debit points from a user for a purchase.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientFunds` when the balance cannot cover it; nothing
    /// is written in that case.
    pub async fn spend(
        &self,
        user_id: UserId,
        amount: Points,
        entry_type: LedgerEntryType,
        reference: Option<&str>,
    ) -> Result<Points> {
        self.store
            .adjust_balance(user_id, amount.negated(), entry_type, reference, json!({}))
            .await
    }

    /// Place a hold: debit `amount` against `reference` (a bid id).
    ///
    /// The debit and its later [`Self::release_hold`] credit carry the same
    /// reference, so the pair is auditable from the history alone.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientFunds` when the balance cannot cover the hold.
    pub async fn hold(&self, user_id: UserId, amount: Points, reference: &str) -> Result<Points> {
        self.store
            .adjust_balance(
                user_id,
                amount.negated(),
                LedgerEntryType::Hold,
                Some(reference),
                json!({ "held": amount.value() }),
            )
            .await
    }

    /// Release a previously placed hold: credit the held amount back.
    ///
    /// Callers must have claimed the release first (the store's
    /// `holds_released` flip); this method itself is a plain credit.
    ///
    /// # Errors
    ///
    /// Returns `Database` on store failure.
    pub async fn release_hold(
        &self,
        user_id: UserId,
        amount: Points,
        reference: &str,
    ) -> Result<Points> {
        let new_balance = self
            .store
            .adjust_balance(
                user_id,
                amount,
                LedgerEntryType::HoldRelease,
                Some(reference),
                json!({ "released": amount.value() }),
            )
            .await?;
        tracing::debug!(
            user_id = %user_id,
            amount = amount.value(),
            reference,
            "ledger hold released"
        );
        Ok(new_balance)
    }
}
