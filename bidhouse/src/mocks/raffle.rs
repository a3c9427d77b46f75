//! Mock raffle store.

use super::poisoned;
use crate::error::{MarketError, Result};
use crate::providers::raffle_store::{EntryAllocation, RaffleStore};
use crate::types::{
    PurchaseId, PurchaseStatus, Raffle, RaffleEntry, RaffleId, RafflePurchase, UserId,
};
use chrono::Utc;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Debug, Default)]
struct RaffleState {
    raffles: HashMap<RaffleId, Raffle>,
    purchases: HashMap<PurchaseId, RafflePurchase>,
    entries: Vec<RaffleEntry>,
}

impl RaffleState {
    fn entry_count(&self, raffle_id: RaffleId) -> u32 {
        u32::try_from(
            self.entries
                .iter()
                .filter(|e| e.raffle_id == raffle_id)
                .count(),
        )
        .unwrap_or(u32::MAX)
    }
}

/// In-memory raffle store.
///
/// `allocate_entries` performs the status flip, the inventory clamp and
/// the entry inserts under one lock, matching the single transaction the
/// Postgres implementation uses. Racing allocations therefore never exceed
/// `max_entries` in total.
#[derive(Debug, Clone, Default)]
pub struct MockRaffleStore {
    state: Arc<Mutex<RaffleState>>,
}

impl MockRaffleStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a raffle directly.
    ///
    /// # Panics
    ///
    /// Panics if the state lock is poisoned.
    #[allow(clippy::unwrap_used)]
    pub fn seed_raffle(&self, raffle: Raffle) {
        self.state.lock().unwrap().raffles.insert(raffle.id, raffle);
    }

    /// Snapshot a purchase row for assertions.
    ///
    /// # Panics
    ///
    /// Panics if the state lock is poisoned.
    #[allow(clippy::unwrap_used)]
    #[must_use]
    pub fn purchase_snapshot(&self, id: PurchaseId) -> Option<RafflePurchase> {
        self.state.lock().unwrap().purchases.get(&id).cloned()
    }
}

impl RaffleStore for MockRaffleStore {
    fn create_raffle(&self, raffle: &Raffle) -> impl Future<Output = Result<()>> + Send {
        let state = Arc::clone(&self.state);
        let raffle = raffle.clone();

        async move {
            state
                .lock()
                .map_err(|_| poisoned())?
                .raffles
                .insert(raffle.id, raffle);
            Ok(())
        }
    }

    fn get_raffle(&self, id: RaffleId) -> impl Future<Output = Result<Raffle>> + Send {
        let state = Arc::clone(&self.state);

        async move {
            let guard = state.lock().map_err(|_| poisoned())?;
            let mut raffle = guard
                .raffles
                .get(&id)
                .cloned()
                .ok_or(MarketError::NotFound { resource: "raffle" })?;
            raffle.tickets_sold = guard.entry_count(id);
            Ok(raffle)
        }
    }

    fn find_purchase(
        &self,
        raffle_id: RaffleId,
        buyer_id: UserId,
    ) -> impl Future<Output = Result<Option<RafflePurchase>>> + Send {
        let state = Arc::clone(&self.state);

        async move {
            let guard = state.lock().map_err(|_| poisoned())?;
            Ok(guard
                .purchases
                .values()
                .find(|p| {
                    p.raffle_id == raffle_id
                        && p.buyer_id == buyer_id
                        && p.status != PurchaseStatus::Failed
                })
                .cloned())
        }
    }

    fn find_purchase_by_payment_ref(
        &self,
        payment_ref: &str,
    ) -> impl Future<Output = Result<Option<RafflePurchase>>> + Send {
        let state = Arc::clone(&self.state);
        let payment_ref = payment_ref.to_string();

        async move {
            let guard = state.lock().map_err(|_| poisoned())?;
            Ok(guard
                .purchases
                .values()
                .find(|p| p.payment_ref.as_deref() == Some(payment_ref.as_str()))
                .cloned())
        }
    }

    fn create_purchase(
        &self,
        purchase: &RafflePurchase,
    ) -> impl Future<Output = Result<()>> + Send {
        let state = Arc::clone(&self.state);
        let purchase = purchase.clone();

        async move {
            let mut guard = state.lock().map_err(|_| poisoned())?;
            let duplicate = guard.purchases.values().any(|p| {
                p.raffle_id == purchase.raffle_id
                    && p.buyer_id == purchase.buyer_id
                    && p.status != PurchaseStatus::Failed
            });
            if duplicate {
                return Err(MarketError::AlreadyEntered);
            }
            guard.purchases.insert(purchase.id, purchase);
            Ok(())
        }
    }

    fn set_payment_ref(
        &self,
        purchase_id: PurchaseId,
        payment_ref: &str,
    ) -> impl Future<Output = Result<()>> + Send {
        let state = Arc::clone(&self.state);
        let payment_ref = payment_ref.to_string();

        async move {
            let mut guard = state.lock().map_err(|_| poisoned())?;
            let purchase =
                guard
                    .purchases
                    .get_mut(&purchase_id)
                    .ok_or(MarketError::NotFound {
                        resource: "purchase",
                    })?;
            purchase.payment_ref = Some(payment_ref);
            Ok(())
        }
    }

    fn allocate_entries(
        &self,
        purchase_id: PurchaseId,
    ) -> impl Future<Output = Result<EntryAllocation>> + Send {
        let state = Arc::clone(&self.state);

        async move {
            let mut guard = state.lock().map_err(|_| poisoned())?;

            let purchase = guard
                .purchases
                .get(&purchase_id)
                .cloned()
                .ok_or(MarketError::NotFound {
                    resource: "purchase",
                })?;
            if purchase.status != PurchaseStatus::Pending {
                let existing = u32::try_from(
                    guard
                        .entries
                        .iter()
                        .filter(|e| e.purchase_id == purchase_id)
                        .count(),
                )
                .unwrap_or(u32::MAX);
                return Ok(EntryAllocation::AlreadyFinalized { existing });
            }

            let raffle = guard
                .raffles
                .get(&purchase.raffle_id)
                .cloned()
                .ok_or(MarketError::NotFound { resource: "raffle" })?;
            let sold = guard.entry_count(purchase.raffle_id);
            let remaining = raffle.max_entries.saturating_sub(sold);
            let granted = purchase.quantity.min(remaining);

            for i in 0..granted {
                guard.entries.push(RaffleEntry {
                    id: Uuid::new_v4(),
                    raffle_id: purchase.raffle_id,
                    purchase_id,
                    buyer_id: purchase.buyer_id,
                    ticket_number: sold + i + 1,
                    created_at: Utc::now(),
                });
            }
            if let Some(p) = guard.purchases.get_mut(&purchase_id) {
                p.status = PurchaseStatus::Succeeded;
            }
            if let Some(r) = guard.raffles.get_mut(&purchase.raffle_id) {
                r.tickets_sold = sold + granted;
            }

            Ok(EntryAllocation::Granted { granted })
        }
    }

    fn mark_purchase_failed(
        &self,
        purchase_id: PurchaseId,
    ) -> impl Future<Output = Result<()>> + Send {
        let state = Arc::clone(&self.state);

        async move {
            let mut guard = state.lock().map_err(|_| poisoned())?;
            if let Some(purchase) = guard.purchases.get_mut(&purchase_id) {
                purchase.status = PurchaseStatus::Failed;
            }
            Ok(())
        }
    }

    fn entry_count(&self, raffle_id: RaffleId) -> impl Future<Output = Result<u32>> + Send {
        let state = Arc::clone(&self.state);

        async move {
            let guard = state.lock().map_err(|_| poisoned())?;
            Ok(guard.entry_count(raffle_id))
        }
    }

    fn entries_for_purchase(
        &self,
        purchase_id: PurchaseId,
    ) -> impl Future<Output = Result<Vec<RaffleEntry>>> + Send {
        let state = Arc::clone(&self.state);

        async move {
            let guard = state.lock().map_err(|_| poisoned())?;
            Ok(guard
                .entries
                .iter()
                .filter(|e| e.purchase_id == purchase_id)
                .cloned()
                .collect())
        }
    }
}
