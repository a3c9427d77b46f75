//! Mock auction/bid/payment store.

use super::poisoned;
use crate::error::{MarketError, Result};
use crate::providers::market_store::MarketStore;
use crate::types::{
    Auction, AuctionId, AuctionStatus, Bid, BidId, BidStatus, Money, Payment, PaymentId,
    PaymentRecordStatus, SellerAccount, UserId,
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct MarketState {
    auctions: HashMap<AuctionId, Auction>,
    bids: HashMap<BidId, Bid>,
    payments: HashMap<AuctionId, Payment>,
    sellers: HashMap<UserId, SellerAccount>,
}

/// In-memory market store.
///
/// `commit_placement`, `claim_hold_release` and `fence_auction` carry the
/// same conditional semantics as the Postgres implementation; concurrent
/// callers racing through them observe identical winner/loser outcomes.
#[derive(Debug, Clone, Default)]
pub struct MockMarketStore {
    state: Arc<Mutex<MarketState>>,
}

impl MockMarketStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an auction directly.
    ///
    /// # Panics
    ///
    /// Panics if the state lock is poisoned.
    #[allow(clippy::unwrap_used)]
    pub fn seed_auction(&self, auction: Auction) {
        self.state.lock().unwrap().auctions.insert(auction.id, auction);
    }

    /// Insert a seller payout configuration directly.
    ///
    /// # Panics
    ///
    /// Panics if the state lock is poisoned.
    #[allow(clippy::unwrap_used)]
    pub fn seed_seller(&self, account: SellerAccount) {
        self.state.lock().unwrap().sellers.insert(account.user_id, account);
    }

    /// Snapshot a bid row for assertions.
    ///
    /// # Panics
    ///
    /// Panics if the state lock is poisoned.
    #[allow(clippy::unwrap_used)]
    #[must_use]
    pub fn bid_snapshot(&self, id: BidId) -> Option<Bid> {
        self.state.lock().unwrap().bids.get(&id).cloned()
    }

    /// Snapshot an auction row for assertions.
    ///
    /// # Panics
    ///
    /// Panics if the state lock is poisoned.
    #[allow(clippy::unwrap_used)]
    #[must_use]
    pub fn auction_snapshot(&self, id: AuctionId) -> Option<Auction> {
        self.state.lock().unwrap().auctions.get(&id).cloned()
    }
}

impl MarketStore for MockMarketStore {
    fn create_auction(&self, auction: &Auction) -> impl Future<Output = Result<()>> + Send {
        let state = Arc::clone(&self.state);
        let auction = auction.clone();

        async move {
            state
                .lock()
                .map_err(|_| poisoned())?
                .auctions
                .insert(auction.id, auction);
            Ok(())
        }
    }

    fn get_auction(&self, id: AuctionId) -> impl Future<Output = Result<Auction>> + Send {
        let state = Arc::clone(&self.state);

        async move {
            state
                .lock()
                .map_err(|_| poisoned())?
                .auctions
                .get(&id)
                .cloned()
                .ok_or(MarketError::NotFound {
                    resource: "auction",
                })
        }
    }

    fn get_bid(&self, id: BidId) -> impl Future<Output = Result<Bid>> + Send {
        let state = Arc::clone(&self.state);

        async move {
            state
                .lock()
                .map_err(|_| poisoned())?
                .bids
                .get(&id)
                .cloned()
                .ok_or(MarketError::NotFound { resource: "bid" })
        }
    }

    fn active_bid(&self, auction_id: AuctionId) -> impl Future<Output = Result<Option<Bid>>> + Send {
        let state = Arc::clone(&self.state);

        async move {
            let guard = state.lock().map_err(|_| poisoned())?;
            Ok(guard
                .bids
                .values()
                .find(|b| b.auction_id == auction_id && b.status == BidStatus::Active)
                .cloned())
        }
    }

    fn seller_account(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Option<SellerAccount>>> + Send {
        let state = Arc::clone(&self.state);

        async move {
            let guard = state.lock().map_err(|_| poisoned())?;
            Ok(guard.sellers.get(&user_id).cloned())
        }
    }

    fn commit_placement(
        &self,
        expected_price: Money,
        bid: &Bid,
    ) -> impl Future<Output = Result<()>> + Send {
        let state = Arc::clone(&self.state);
        let bid = bid.clone();

        async move {
            let mut guard = state.lock().map_err(|_| poisoned())?;
            let auction = guard
                .auctions
                .get_mut(&bid.auction_id)
                .ok_or(MarketError::NotFound {
                    resource: "auction",
                })?;
            if auction.status != AuctionStatus::Active {
                return Err(MarketError::AuctionNotActive);
            }
            if auction.current_price != expected_price {
                return Err(MarketError::PriceChanged);
            }
            auction.current_price = bid.amount;
            let auction_id = bid.auction_id;
            for other in guard.bids.values_mut() {
                if other.auction_id == auction_id && other.status == BidStatus::Active {
                    other.status = BidStatus::Outbid;
                }
            }
            guard.bids.insert(bid.id, bid);
            Ok(())
        }
    }

    fn claim_hold_release(
        &self,
        bid_id: BidId,
    ) -> impl Future<Output = Result<Option<Bid>>> + Send {
        let state = Arc::clone(&self.state);

        async move {
            let mut guard = state.lock().map_err(|_| poisoned())?;
            match guard.bids.get_mut(&bid_id) {
                Some(bid) if !bid.holds_released => {
                    bid.holds_released = true;
                    Ok(Some(bid.clone()))
                }
                _ => Ok(None),
            }
        }
    }

    fn reopen_hold(&self, bid_id: BidId) -> impl Future<Output = Result<()>> + Send {
        let state = Arc::clone(&self.state);

        async move {
            let mut guard = state.lock().map_err(|_| poisoned())?;
            if let Some(bid) = guard.bids.get_mut(&bid_id) {
                bid.holds_released = false;
            }
            Ok(())
        }
    }

    fn mark_bid_cancelled(&self, bid_id: BidId) -> impl Future<Output = Result<()>> + Send {
        let state = Arc::clone(&self.state);

        async move {
            let mut guard = state.lock().map_err(|_| poisoned())?;
            if let Some(bid) = guard.bids.get_mut(&bid_id) {
                bid.status = BidStatus::Cancelled;
                bid.authorization_status = crate::types::AuthorizationStatus::Cancelled;
            }
            Ok(())
        }
    }

    fn fence_auction(&self, id: AuctionId) -> impl Future<Output = Result<Auction>> + Send {
        let state = Arc::clone(&self.state);

        async move {
            let mut guard = state.lock().map_err(|_| poisoned())?;
            let auction = guard.auctions.get_mut(&id).ok_or(MarketError::NotFound {
                resource: "auction",
            })?;
            if auction.status == AuctionStatus::Active {
                auction.status = AuctionStatus::Ended;
            }
            Ok(auction.clone())
        }
    }

    fn winning_candidate(
        &self,
        auction_id: AuctionId,
    ) -> impl Future<Output = Result<Option<Bid>>> + Send {
        let state = Arc::clone(&self.state);

        async move {
            let guard = state.lock().map_err(|_| poisoned())?;
            let winner = guard
                .bids
                .values()
                .filter(|b| b.auction_id == auction_id && b.status == BidStatus::Active)
                .max_by(|a, b| {
                    a.amount
                        .cmp(&b.amount)
                        .then_with(|| b.created_at.cmp(&a.created_at))
                })
                .cloned();
            Ok(winner)
        }
    }

    fn find_payment(
        &self,
        auction_id: AuctionId,
    ) -> impl Future<Output = Result<Option<Payment>>> + Send {
        let state = Arc::clone(&self.state);

        async move {
            let guard = state.lock().map_err(|_| poisoned())?;
            Ok(guard.payments.get(&auction_id).cloned())
        }
    }

    fn record_completion(
        &self,
        auction_id: AuctionId,
        winning_bid_id: BidId,
        payment: &Payment,
    ) -> impl Future<Output = Result<()>> + Send {
        let state = Arc::clone(&self.state);
        let payment = payment.clone();

        async move {
            let mut guard = state.lock().map_err(|_| poisoned())?;
            let auction = guard
                .auctions
                .get_mut(&auction_id)
                .ok_or(MarketError::NotFound {
                    resource: "auction",
                })?;
            auction.status = AuctionStatus::Completed;
            if let Some(bid) = guard.bids.get_mut(&winning_bid_id) {
                bid.status = BidStatus::Winning;
                bid.authorization_status = crate::types::AuthorizationStatus::Captured;
            }
            guard.payments.insert(auction_id, payment);
            Ok(())
        }
    }

    fn open_hold_bids(
        &self,
        auction_id: AuctionId,
    ) -> impl Future<Output = Result<Vec<Bid>>> + Send {
        let state = Arc::clone(&self.state);

        async move {
            let guard = state.lock().map_err(|_| poisoned())?;
            Ok(guard
                .bids
                .values()
                .filter(|b| {
                    b.auction_id == auction_id
                        && !b.holds_released
                        && b.status != BidStatus::Winning
                })
                .cloned()
                .collect())
        }
    }

    fn set_transfer_result(
        &self,
        payment_id: PaymentId,
        transfer_ref: Option<&str>,
        status: PaymentRecordStatus,
    ) -> impl Future<Output = Result<()>> + Send {
        let state = Arc::clone(&self.state);
        let transfer_ref = transfer_ref.map(str::to_string);

        async move {
            let mut guard = state.lock().map_err(|_| poisoned())?;
            for payment in guard.payments.values_mut() {
                if payment.id == payment_id {
                    payment.transfer_ref = transfer_ref;
                    payment.status = status;
                    return Ok(());
                }
            }
            Err(MarketError::NotFound {
                resource: "payment",
            })
        }
    }
}
