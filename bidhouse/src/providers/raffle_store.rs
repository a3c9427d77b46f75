//! Raffle inventory store trait.

use crate::error::Result;
use crate::types::{PurchaseId, Raffle, RaffleEntry, RaffleId, RafflePurchase, UserId};
use std::future::Future;

/// Outcome of an entry allocation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryAllocation {
    /// This call transitioned the purchase to succeeded and inserted
    /// `granted` entries (clamped to remaining inventory).
    Granted {
        /// Tickets actually allocated.
        granted: u32,
    },
    /// The purchase had already been finalized by an earlier call (webhook
    /// and finalize racing); `existing` entries stand, nothing was inserted.
    AlreadyFinalized {
        /// Entries the purchase already holds.
        existing: u32,
    },
}

/// Transactional store for raffles, purchases and entries.
///
/// Entry allocation is the oversell-critical path: the implementation must
/// bound `count(entries) <= max_entries` with a single atomic
/// decrement-if-available update, not a read-then-write.
pub trait RaffleStore: Send + Sync {
    /// Insert a new raffle.
    ///
    /// # Errors
    ///
    /// Returns `Database` on store failure.
    fn create_raffle(&self, raffle: &Raffle) -> impl Future<Output = Result<()>> + Send;

    /// Load a raffle by id, with a fresh `tickets_sold` count.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the raffle does not exist.
    fn get_raffle(&self, id: RaffleId) -> impl Future<Output = Result<Raffle>> + Send;

    /// A buyer's existing non-failed purchase in a raffle, if any (one per
    /// buyer; a failed payment frees the slot for a retry).
    ///
    /// # Errors
    ///
    /// Returns `Database` on store failure.
    fn find_purchase(
        &self,
        raffle_id: RaffleId,
        buyer_id: UserId,
    ) -> impl Future<Output = Result<Option<RafflePurchase>>> + Send;

    /// Look up a purchase by its external payment reference; the webhook
    /// and finalize paths resolve events through this.
    ///
    /// # Errors
    ///
    /// Returns `Database` on store failure.
    fn find_purchase_by_payment_ref(
        &self,
        payment_ref: &str,
    ) -> impl Future<Output = Result<Option<RafflePurchase>>> + Send;

    /// Insert a purchase row. The per-buyer uniqueness constraint turns a
    /// concurrent duplicate into `AlreadyEntered`.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyEntered` on a duplicate buyer, `Database` otherwise.
    fn create_purchase(&self, purchase: &RafflePurchase)
    -> impl Future<Output = Result<()>> + Send;

    /// Attach the external payment reference to a pending purchase.
    ///
    /// The purchase row is inserted before the remote payment is created so
    /// the per-buyer uniqueness claim happens first; the reference arrives
    /// a moment later through this call.
    ///
    /// # Errors
    ///
    /// Returns `Database` on store failure.
    fn set_payment_ref(
        &self,
        purchase_id: PurchaseId,
        payment_ref: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Finalize a purchase: transition pending -> succeeded and insert one
    /// entry row per granted ticket, clamped to a freshly read remaining
    /// count, all in one transaction.
    ///
    /// Idempotent: a purchase that already succeeded reports
    /// [`EntryAllocation::AlreadyFinalized`] and inserts nothing, so the
    /// webhook and the client-driven finalize can race safely.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown purchase, `Database` otherwise.
    fn allocate_entries(
        &self,
        purchase_id: PurchaseId,
    ) -> impl Future<Output = Result<EntryAllocation>> + Send;

    /// Mark a pending purchase failed (processor reported a failed charge).
    ///
    /// # Errors
    ///
    /// Returns `Database` on store failure.
    fn mark_purchase_failed(
        &self,
        purchase_id: PurchaseId,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Total entries allocated in a raffle.
    ///
    /// # Errors
    ///
    /// Returns `Database` on store failure.
    fn entry_count(&self, raffle_id: RaffleId) -> impl Future<Output = Result<u32>> + Send;

    /// Entries allocated to a purchase.
    ///
    /// # Errors
    ///
    /// Returns `Database` on store failure.
    fn entries_for_purchase(
        &self,
        purchase_id: PurchaseId,
    ) -> impl Future<Output = Result<Vec<RaffleEntry>>> + Send;
}
