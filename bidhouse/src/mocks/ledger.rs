//! Mock ledger store.

use super::poisoned;
use crate::error::{MarketError, Result};
use crate::providers::ledger_store::LedgerStore;
use crate::types::{LedgerEntryType, LedgerTransaction, Points, UserId};
use chrono::Utc;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Debug, Default)]
struct LedgerState {
    balances: HashMap<UserId, i64>,
    transactions: Vec<LedgerTransaction>,
}

/// In-memory ledger with the same atomic non-negativity rule as the
/// Postgres stored procedure: the balance check, the balance write and the
/// transaction row happen under one lock.
#[derive(Debug, Clone, Default)]
pub struct MockLedgerStore {
    state: Arc<Mutex<LedgerState>>,
}

impl MockLedgerStore {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a balance directly, bypassing the transaction log.
    ///
    /// # Panics
    ///
    /// Panics if the state lock is poisoned.
    #[allow(clippy::unwrap_used)]
    pub fn seed_balance(&self, user_id: UserId, balance: i64) {
        self.state.lock().unwrap().balances.insert(user_id, balance);
    }
}

impl LedgerStore for MockLedgerStore {
    fn adjust_balance(
        &self,
        user_id: UserId,
        change: Points,
        entry_type: LedgerEntryType,
        reference: Option<&str>,
        metadata: serde_json::Value,
    ) -> impl Future<Output = Result<Points>> + Send {
        let state = Arc::clone(&self.state);
        let reference = reference.map(str::to_string);

        async move {
            let mut guard = state.lock().map_err(|_| poisoned())?;
            let current = guard.balances.get(&user_id).copied().unwrap_or(0);
            let next = current
                .checked_add(change.value())
                .ok_or_else(|| MarketError::Internal("balance overflow".to_string()))?;
            if next < 0 {
                return Err(MarketError::InsufficientFunds);
            }
            guard.balances.insert(user_id, next);
            guard.transactions.push(LedgerTransaction {
                id: Uuid::new_v4(),
                user_id,
                change,
                entry_type,
                reference,
                metadata,
                created_at: Utc::now(),
            });
            Ok(Points::new(next))
        }
    }

    fn balance(&self, user_id: UserId) -> impl Future<Output = Result<Points>> + Send {
        let state = Arc::clone(&self.state);

        async move {
            let guard = state.lock().map_err(|_| poisoned())?;
            Ok(Points::new(guard.balances.get(&user_id).copied().unwrap_or(0)))
        }
    }

    fn history(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Vec<LedgerTransaction>>> + Send {
        let state = Arc::clone(&self.state);

        async move {
            let guard = state.lock().map_err(|_| poisoned())?;
            let mut rows: Vec<LedgerTransaction> = guard
                .transactions
                .iter()
                .filter(|t| t.user_id == user_id)
                .cloned()
                .collect();
            rows.reverse();
            Ok(rows)
        }
    }
}
