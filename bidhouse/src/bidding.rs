//! Bid engine: validation, funding and atomic placement.
//!
//! A placement runs in three phases:
//!
//! 1. **Validate** against a snapshot of the auction (status, end time,
//!    self-bid, increment rule). Validation failures have no side effects.
//! 2. **Fund** the bid: a card authorization hold at the gateway, or a
//!    ledger hold. This is remote I/O and happens outside any store lock.
//! 3. **Commit** through [`MarketStore::commit_placement`], which re-checks
//!    the auction under lock. If a concurrent bid won the race the commit
//!    fails with `PriceChanged` and the hold taken in phase 2 is
//!    compensated before the error surfaces.
//!
//! Superseded holds are released *after* a successful commit, via the
//! store's `claim_hold_release` flip, so a failed commit never strands the
//! standing leader without a hold.

use crate::config::FeesConfig;
use crate::error::{MarketError, Result};
use crate::ledger::Ledger;
use crate::providers::gateway::{AuthorizationMetadata, AuthorizationRequest, PaymentGateway};
use crate::providers::ledger_store::LedgerStore;
use crate::providers::market_store::MarketStore;
use crate::types::{
    minimum_increment, required_minimum, Auction, AuctionId, AuctionStatus, AuthorizationStatus,
    Bid, BidId, BidStatus, Money, PaymentMethod, Points, UserId,
};
use chrono::Utc;

/// How a bid is funded.
#[derive(Debug, Clone, PartialEq)]
pub enum BidFunding {
    /// Card authorization hold through the external processor.
    Card {
        /// Card token supplied by the client.
        payment_method_id: String,
    },
    /// Internal point-currency hold.
    Ledger,
}

impl BidFunding {
    const fn method(&self) -> PaymentMethod {
        match self {
            Self::Card { .. } => PaymentMethod::Card,
            Self::Ledger => PaymentMethod::Ledger,
        }
    }
}

/// A validated, funded and committed placement.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedBid {
    /// The committed bid, now the auction's leader.
    pub bid: Bid,
    /// Price the auction stands at after the placement.
    pub new_price: Money,
}

/// The bid engine, generic over its store, ledger and gateway providers.
#[derive(Clone)]
pub struct BidEngine<M, L, G> {
    market: M,
    ledger: Ledger<L>,
    gateway: G,
    fees: FeesConfig,
}

impl<M, L, G> BidEngine<M, L, G>
where
    M: MarketStore,
    L: LedgerStore,
    G: PaymentGateway,
{
    /// Creates a bid engine over the given providers.
    pub const fn new(market: M, ledger: Ledger<L>, gateway: G, fees: FeesConfig) -> Self {
        Self {
            market,
            ledger,
            gateway,
            fees,
        }
    }

    /// Place a bid on an auction.
    ///
    /// # Errors
    ///
    /// Validation errors (`AuctionNotActive`, `AuctionEnded`,
    /// `SelfBidNotAllowed`, `BidTooLow`) are returned with no side effects.
    /// `InsufficientFunds` and `PaymentAuthorizationFailed` mean funding
    /// failed and nothing was committed. `PriceChanged` means a concurrent
    /// bid won the race; the hold taken for this bid has been compensated
    /// and the caller should re-read the price and retry.
    pub async fn place_bid(
        &self,
        auction_id: AuctionId,
        bidder_id: UserId,
        amount: Money,
        funding: BidFunding,
    ) -> Result<PlacedBid> {
        let auction = self.market.get_auction(auction_id).await?;
        Self::validate(&auction, bidder_id, amount)?;

        // Snapshot the leader before funding; its hold is released only
        // after our commit succeeds.
        let previous = self.market.active_bid(auction_id).await?;

        let bid_id = BidId::new();
        let bid = self.fund(&auction, bid_id, bidder_id, amount, &funding).await?;

        if let Err(err) = self.market.commit_placement(auction.current_price, &bid).await {
            self.compensate_hold(&bid).await;
            return Err(err);
        }

        tracing::info!(
            auction_id = %auction_id,
            bid_id = %bid.id,
            amount = amount.minor(),
            method = bid.payment_method.as_str(),
            "bid placed"
        );

        if let Some(prev) = previous {
            self.release_superseded(&prev).await;
        }

        Ok(PlacedBid {
            new_price: bid.amount,
            bid,
        })
    }

    fn validate(auction: &Auction, bidder_id: UserId, amount: Money) -> Result<()> {
        if auction.status != AuctionStatus::Active {
            return Err(MarketError::AuctionNotActive);
        }
        if Utc::now() >= auction.end_time {
            return Err(MarketError::AuctionEnded);
        }
        if auction.seller_id == bidder_id {
            return Err(MarketError::SelfBidNotAllowed);
        }
        let minimum = required_minimum(auction.current_price);
        if amount < minimum {
            return Err(MarketError::BidTooLow {
                current_price: auction.current_price,
                minimum,
                increment: minimum_increment(auction.current_price),
            });
        }
        Ok(())
    }

    /// Reserve funds for the bid and build the row to commit.
    async fn fund(
        &self,
        auction: &Auction,
        bid_id: BidId,
        bidder_id: UserId,
        amount: Money,
        funding: &BidFunding,
    ) -> Result<Bid> {
        let (authorization_ref, ledger_hold) = match funding {
            BidFunding::Card { payment_method_id } => {
                let seller = self
                    .market
                    .seller_account(auction.seller_id)
                    .await?
                    .ok_or(MarketError::SellerPaymentNotConfigured)?;
                let platform_fee = amount.fee_at_bps(self.fees.platform_fee_bps);
                let authorization = self
                    .gateway
                    .authorize_and_hold(AuthorizationRequest {
                        amount,
                        buyer_ref: bidder_id.to_string(),
                        payment_method_id: payment_method_id.clone(),
                        seller_account: seller.payout_account.clone(),
                        platform_fee,
                        metadata: AuthorizationMetadata {
                            fee_bps: self.fees.platform_fee_bps,
                            destination_account: seller.payout_account,
                            country: seller.country,
                            auction_id: auction.id.to_string(),
                        },
                    })
                    .await?;
                (Some(authorization.reference), None)
            }
            BidFunding::Ledger => {
                let held = Points::from_money(amount);
                self.ledger
                    .hold(bidder_id, held, &bid_id.to_string())
                    .await?;
                (None, Some(held))
            }
        };

        Ok(Bid {
            id: bid_id,
            auction_id: auction.id,
            bidder_id,
            amount,
            payment_method: funding.method(),
            authorization_status: AuthorizationStatus::Authorized,
            status: BidStatus::Active,
            authorization_ref,
            ledger_hold,
            holds_released: false,
            created_at: Utc::now(),
        })
    }

    /// Undo this bid's own hold after a failed commit. Failures here are
    /// logged, not surfaced; the commit error is what the caller needs.
    async fn compensate_hold(&self, bid: &Bid) {
        match (&bid.authorization_ref, bid.ledger_hold) {
            (Some(auth_ref), _) => {
                if let Err(err) = self.gateway.cancel_authorization(auth_ref).await {
                    tracing::error!(
                        bid_id = %bid.id,
                        authorization = %auth_ref,
                        error = %err,
                        "failed to cancel authorization after lost placement race; \
                         hold will expire at the processor"
                    );
                }
            }
            (None, Some(held)) => {
                if let Err(err) = self
                    .ledger
                    .release_hold(bid.bidder_id, held, &bid.id.to_string())
                    .await
                {
                    tracing::error!(
                        bid_id = %bid.id,
                        error = %err,
                        "failed to return ledger hold after lost placement race"
                    );
                }
            }
            (None, None) => {}
        }
    }

    /// Release the hold behind a superseded leader, exactly once.
    ///
    /// The `claim_hold_release` flip decides ownership; losing the claim
    /// means settlement (or another placement) already released it. A
    /// failed release after a won claim reopens the claim so the
    /// settlement sweep can retry it, rather than failing the accepted
    /// bid.
    async fn release_superseded(&self, previous: &Bid) {
        let claimed = match self.market.claim_hold_release(previous.id).await {
            Ok(claimed) => claimed,
            Err(err) => {
                tracing::error!(
                    bid_id = %previous.id,
                    error = %err,
                    "failed to claim hold release for outbid leader"
                );
                return;
            }
        };
        let Some(bid) = claimed else {
            return;
        };

        let result = match (&bid.authorization_ref, bid.ledger_hold) {
            (Some(auth_ref), _) => self.gateway.cancel_authorization(auth_ref).await,
            (None, Some(held)) => self
                .ledger
                .release_hold(bid.bidder_id, held, &bid.id.to_string())
                .await
                .map(|_| ()),
            (None, None) => Ok(()),
        };

        match result {
            Ok(()) => {
                tracing::debug!(bid_id = %bid.id, "outbid hold released");
            }
            Err(err) => {
                tracing::error!(
                    bid_id = %bid.id,
                    error = %err,
                    "failed to release outbid hold; reopening for the settlement sweep"
                );
                if let Err(reopen_err) = self.market.reopen_hold(bid.id).await {
                    tracing::error!(
                        bid_id = %bid.id,
                        error = %reopen_err,
                        "failed to reopen hold claim; manual release required"
                    );
                }
            }
        }
    }
}
