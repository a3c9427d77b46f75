//! Auction, bid and payment store trait.
//!
//! The methods here are the transactional units the bid engine and
//! settlement service rely on. Anything that must be observed atomically
//! (new leader + price bump + outbid cascade; completion + capture marker +
//! payment row) is a single method, so no reader can see a half-applied
//! placement or settlement.

use crate::error::Result;
use crate::types::{
    Auction, AuctionId, Bid, BidId, Payment, PaymentId, PaymentRecordStatus, SellerAccount, UserId,
};
use std::future::Future;

/// Transactional store for auctions, bids, payments and seller payout
/// configuration.
pub trait MarketStore: Send + Sync {
    /// Insert a new auction listing.
    ///
    /// # Errors
    ///
    /// Returns `Database` on store failure.
    fn create_auction(&self, auction: &Auction) -> impl Future<Output = Result<()>> + Send;

    /// Load an auction by id.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the auction does not exist.
    fn get_auction(&self, id: AuctionId) -> impl Future<Output = Result<Auction>> + Send;

    /// Load a bid by id.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the bid does not exist.
    fn get_bid(&self, id: BidId) -> impl Future<Output = Result<Bid>> + Send;

    /// The auction's current leader, if any.
    ///
    /// # Errors
    ///
    /// Returns `Database` on store failure.
    fn active_bid(&self, auction_id: AuctionId) -> impl Future<Output = Result<Option<Bid>>> + Send;

    /// Seller payout configuration, if the seller has one.
    ///
    /// # Errors
    ///
    /// Returns `Database` on store failure.
    fn seller_account(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Option<SellerAccount>>> + Send;

    /// Commit a validated placement: insert `bid` as the new active leader,
    /// raise `current_price` to its amount, and mark every other active bid
    /// outbid, all in one transaction serialized per auction.
    ///
    /// The auction row is re-checked under lock: it must still be active and
    /// its price must still equal `expected_price`.
    ///
    /// # Errors
    ///
    /// Returns `PriceChanged` when a concurrent placement won the race, and
    /// `AuctionNotActive` when the status moved; the caller compensates the
    /// hold it took and surfaces the conflict.
    fn commit_placement(
        &self,
        expected_price: crate::types::Money,
        bid: &Bid,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Flip `holds_released` false -> true for a bid, returning the bid only
    /// to the caller that won the flip.
    ///
    /// Whoever gets `Some` back owns performing the actual release (gateway
    /// cancel or ledger credit); everyone else sees `None`. This is what
    /// makes hold release exactly-once.
    ///
    /// # Errors
    ///
    /// Returns `Database` on store failure.
    fn claim_hold_release(&self, bid_id: BidId)
    -> impl Future<Output = Result<Option<Bid>>> + Send;

    /// Reopen a claimed hold release after the release itself failed.
    ///
    /// Flips `holds_released` back to false so the bid shows up in
    /// [`Self::open_hold_bids`] again and a later sweep can re-claim it.
    /// Without this, a claim whose gateway cancel or ledger credit failed
    /// would strand the funds where no sweep can find them.
    ///
    /// # Errors
    ///
    /// Returns `Database` on store failure.
    fn reopen_hold(&self, bid_id: BidId) -> impl Future<Output = Result<()>> + Send;

    /// Mark a bid cancelled after its hold was released at settlement.
    ///
    /// # Errors
    ///
    /// Returns `Database` on store failure.
    fn mark_bid_cancelled(&self, bid_id: BidId) -> impl Future<Output = Result<()>> + Send;

    /// Fence an auction for settlement: conditionally transition
    /// `active -> ended` and return the fresh row.
    ///
    /// Once ended, no placement can commit (placements re-check status under
    /// lock), so the winner selected afterwards cannot be superseded.
    /// Already-ended and already-completed auctions are returned as-is; the
    /// caller reads the status off the returned row.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the auction does not exist.
    fn fence_auction(&self, id: AuctionId) -> impl Future<Output = Result<Auction>> + Send;

    /// The settlement candidate: highest-amount active bid, ties broken by
    /// earliest `created_at`.
    ///
    /// (Equal amounts cannot occur while the increment rule is enforced;
    /// the ordering keeps the rule deterministic should that ever relax.)
    ///
    /// # Errors
    ///
    /// Returns `Database` on store failure.
    fn winning_candidate(
        &self,
        auction_id: AuctionId,
    ) -> impl Future<Output = Result<Option<Bid>>> + Send;

    /// The payment record for an auction, if settlement already ran.
    ///
    /// # Errors
    ///
    /// Returns `Database` on store failure.
    fn find_payment(
        &self,
        auction_id: AuctionId,
    ) -> impl Future<Output = Result<Option<Payment>>> + Send;

    /// Commit a settlement: auction -> completed, winning bid ->
    /// captured/winning, payment row inserted, in one transaction run only
    /// after capture succeeded (capture is the point of no return).
    ///
    /// # Errors
    ///
    /// Returns `Database` on store failure.
    fn record_completion(
        &self,
        auction_id: AuctionId,
        winning_bid_id: BidId,
        payment: &Payment,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Bids on the auction whose holds are still outstanding.
    ///
    /// The winning bid never appears here: its status is `winning` once
    /// settlement commits, and its hold is consumed by the capture (or the
    /// standing ledger debit), not released. Callers run only after
    /// `record_completion`.
    ///
    /// # Errors
    ///
    /// Returns `Database` on store failure.
    fn open_hold_bids(
        &self,
        auction_id: AuctionId,
    ) -> impl Future<Output = Result<Vec<Bid>>> + Send;

    /// Record the outcome of the post-capture seller transfer.
    ///
    /// # Errors
    ///
    /// Returns `Database` on store failure.
    fn set_transfer_result(
        &self,
        payment_id: PaymentId,
        transfer_ref: Option<&str>,
        status: PaymentRecordStatus,
    ) -> impl Future<Output = Result<()>> + Send;
}
