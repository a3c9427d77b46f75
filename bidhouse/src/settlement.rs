//! Auction settlement: winner selection, capture and fund split.
//!
//! Settlement is fenced and phased:
//!
//! 1. **Fence**: conditionally transition the auction `active -> ended` so
//!    no further placement can commit, then select the winning candidate
//!    (highest amount, earliest placement on a tie).
//! 2. **Capture**: convert the winner's authorization into a charge. This
//!    is the point of no return; any failure before it leaves the auction
//!    ended-but-unsettled and safe to retry, and a successful capture is
//!    never rolled back.
//! 3. **Record**: commit completion (auction -> completed, winning bid ->
//!    captured, payment row) in one store transaction.
//! 4. **Post-commit**: seller transfer or seller point credit, bonus
//!    awards, losing-hold releases. Each step is wrapped individually; a
//!    failure is recorded and reported, never allowed to unwind the
//!    capture or block the other steps.

use crate::config::FeesConfig;
use crate::error::{MarketError, Result};
use crate::ledger::Ledger;
use crate::providers::gateway::PaymentGateway;
use crate::providers::ledger_store::LedgerStore;
use crate::providers::market_store::MarketStore;
use crate::types::{
    Auction, AuctionId, AuctionStatus, Bid, LedgerEntryType, Payment, PaymentId, PaymentMethod,
    PaymentRecordStatus, Points,
};
use chrono::Utc;
use serde::Serialize;

/// What a settlement call accomplished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementOutcome {
    /// This call settled the auction.
    Completed,
    /// A previous call already settled it; nothing was charged again.
    AlreadyCompleted,
    /// The auction ended with no bids; there is nothing to settle.
    NoBids,
}

/// Report of a settlement run.
///
/// `warnings` lists best-effort post-commit steps that failed (transfer,
/// bonus award, hold release); the settlement itself still succeeded and
/// each failure was also logged.
#[derive(Debug, Clone, Serialize)]
pub struct SettlementReport {
    /// What happened.
    pub outcome: SettlementOutcome,
    /// The payment record, when one exists.
    pub payment: Option<Payment>,
    /// Losing holds released by this call.
    pub released_holds: u32,
    /// Post-commit steps that failed and need attention.
    pub warnings: Vec<String>,
}

/// Settlement service, generic over its providers.
#[derive(Clone)]
pub struct SettlementService<M, L, G> {
    market: M,
    ledger: Ledger<L>,
    gateway: G,
    fees: FeesConfig,
}

impl<M, L, G> SettlementService<M, L, G>
where
    M: MarketStore,
    L: LedgerStore,
    G: PaymentGateway,
{
    /// Creates a settlement service over the given providers.
    pub const fn new(market: M, ledger: Ledger<L>, gateway: G, fees: FeesConfig) -> Self {
        Self {
            market,
            ledger,
            gateway,
            fees,
        }
    }

    /// Settle an auction.
    ///
    /// Idempotent: calling it again after success reports
    /// [`SettlementOutcome::AlreadyCompleted`] without charging anyone
    /// twice. A capture failure leaves the auction ended and retryable.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown auction, `AuctionNotActive` for a
    /// draft or cancelled one, and `CaptureFailed`/`GatewayError` when the
    /// winner's charge could not go through.
    pub async fn complete_auction(&self, auction_id: AuctionId) -> Result<SettlementReport> {
        let auction = self.market.fence_auction(auction_id).await?;

        match auction.status {
            AuctionStatus::Completed => {
                // Re-run the hold sweep: a crash after the completion
                // commit can leave losing holds outstanding, and this is
                // the only path a retry reaches.
                let payment = self.market.find_payment(auction_id).await?;
                let mut warnings = Vec::new();
                let released_holds = self.release_losing_holds(&auction, &mut warnings).await;
                return Ok(SettlementReport {
                    outcome: SettlementOutcome::AlreadyCompleted,
                    payment,
                    released_holds,
                    warnings,
                });
            }
            AuctionStatus::Draft | AuctionStatus::Cancelled => {
                return Err(MarketError::AuctionNotActive);
            }
            AuctionStatus::Active | AuctionStatus::Ended => {}
        }

        let Some(winner) = self.market.winning_candidate(auction_id).await? else {
            tracing::info!(auction_id = %auction_id, "auction ended with no bids");
            return Ok(SettlementReport {
                outcome: SettlementOutcome::NoBids,
                payment: None,
                released_holds: 0,
                warnings: Vec::new(),
            });
        };

        let gross = winner.amount;
        let platform_fee = gross.fee_at_bps(self.fees.platform_fee_bps);
        let seller_amount = gross
            .checked_sub(platform_fee)
            .ok_or_else(|| MarketError::Internal("fee exceeds gross amount".to_string()))?;

        // Point of no return for card winners.
        let split_configured = match winner.payment_method {
            PaymentMethod::Card => {
                let auth_ref = winner.authorization_ref.as_deref().ok_or_else(|| {
                    MarketError::Internal(format!("card bid {} has no authorization", winner.id))
                })?;
                let capture = self
                    .gateway
                    .capture(auth_ref, &format!("capture-{auction_id}"))
                    .await?;
                if capture.already_captured {
                    tracing::warn!(
                        auction_id = %auction_id,
                        bid_id = %winner.id,
                        "authorization was already captured; resuming settlement"
                    );
                }
                capture.split_configured
            }
            // The ledger hold debit already moved the funds; it stands.
            PaymentMethod::Ledger => true,
        };

        let payment = Payment {
            id: PaymentId::new(),
            auction_id,
            buyer_id: winner.bidder_id,
            seller_id: auction.seller_id,
            gross_amount: gross,
            platform_fee,
            seller_amount,
            payment_method: winner.payment_method,
            transfer_ref: None,
            status: if split_configured {
                PaymentRecordStatus::Completed
            } else {
                PaymentRecordStatus::TransferPending
            },
            created_at: Utc::now(),
        };
        self.market
            .record_completion(auction_id, winner.id, &payment)
            .await?;

        tracing::info!(
            auction_id = %auction_id,
            bid_id = %winner.id,
            gross = gross.minor(),
            platform_fee = platform_fee.minor(),
            seller_amount = seller_amount.minor(),
            "auction settled"
        );

        let mut warnings = Vec::new();
        let mut payment = payment;

        match (winner.payment_method, split_configured) {
            (PaymentMethod::Card, false) => {
                self.transfer_seller_share(&auction, &mut payment, &mut warnings)
                    .await;
            }
            (PaymentMethod::Card, true) => {}
            (PaymentMethod::Ledger, _) => {
                self.credit_seller_points(&auction, &payment, &mut warnings)
                    .await;
            }
        }

        self.award_bonuses(&auction, &winner, &mut warnings).await;
        let released_holds = self.release_losing_holds(&auction, &mut warnings).await;

        Ok(SettlementReport {
            outcome: SettlementOutcome::Completed,
            payment: Some(payment),
            released_holds,
            warnings,
        })
    }

    /// Explicit transfer of the seller share when the processor did not
    /// split at capture. A failure marks the payment `transfer_failed` for
    /// a later manual retry; the capture is never unwound.
    async fn transfer_seller_share(
        &self,
        auction: &Auction,
        payment: &mut Payment,
        warnings: &mut Vec<String>,
    ) {
        let destination = match self.market.seller_account(auction.seller_id).await {
            Ok(Some(account)) => account.payout_account,
            Ok(None) => {
                self.record_transfer_failure(payment, "seller has no payout destination", warnings)
                    .await;
                return;
            }
            Err(err) => {
                self.record_transfer_failure(payment, &err.to_string(), warnings)
                    .await;
                return;
            }
        };

        let transfer = self
            .gateway
            .create_transfer(
                payment.seller_amount,
                &destination,
                &format!("transfer-{}", payment.id),
            )
            .await;

        match transfer {
            Ok(transfer) => {
                payment.transfer_ref = Some(transfer.reference.clone());
                payment.status = PaymentRecordStatus::Completed;
                if let Err(err) = self
                    .market
                    .set_transfer_result(
                        payment.id,
                        Some(&transfer.reference),
                        PaymentRecordStatus::Completed,
                    )
                    .await
                {
                    warnings.push(format!("transfer succeeded but was not recorded: {err}"));
                    tracing::error!(
                        payment_id = %payment.id,
                        transfer = %transfer.reference,
                        error = %err,
                        "failed to record successful transfer"
                    );
                }
            }
            Err(err) => {
                self.record_transfer_failure(payment, &err.to_string(), warnings)
                    .await;
            }
        }
    }

    async fn record_transfer_failure(
        &self,
        payment: &mut Payment,
        reason: &str,
        warnings: &mut Vec<String>,
    ) {
        payment.status = PaymentRecordStatus::TransferFailed;
        warnings.push(format!("seller transfer failed: {reason}"));
        tracing::error!(
            payment_id = %payment.id,
            reason,
            "seller transfer failed; payment marked for manual retry"
        );
        if let Err(err) = self
            .market
            .set_transfer_result(payment.id, None, PaymentRecordStatus::TransferFailed)
            .await
        {
            warnings.push(format!("transfer failure was not recorded: {err}"));
            tracing::error!(
                payment_id = %payment.id,
                error = %err,
                "failed to record transfer failure"
            );
        }
    }

    /// Ledger-funded sales settle internally: the winner's hold debit
    /// stands and the seller is credited their share in points.
    async fn credit_seller_points(
        &self,
        auction: &Auction,
        payment: &Payment,
        warnings: &mut Vec<String>,
    ) {
        if let Err(err) = self
            .ledger
            .award(
                auction.seller_id,
                Points::from_money(payment.seller_amount),
                LedgerEntryType::AuctionSale,
                Some(&auction.id.to_string()),
            )
            .await
        {
            warnings.push(format!("seller point credit failed: {err}"));
            tracing::error!(
                auction_id = %auction.id,
                seller_id = %auction.seller_id,
                error = %err,
                "failed to credit seller proceeds"
            );
        }
    }

    /// Loyalty bonus for both parties, in points, as a fraction of the
    /// final price.
    async fn award_bonuses(&self, auction: &Auction, winner: &Bid, warnings: &mut Vec<String>) {
        if self.fees.bonus_award_bps == 0 {
            return;
        }
        let bonus = Points::from_money(winner.amount.fee_at_bps(self.fees.bonus_award_bps));
        if bonus == Points::ZERO {
            return;
        }
        let reference = auction.id.to_string();

        for (user_id, entry_type) in [
            (auction.seller_id, LedgerEntryType::AuctionSale),
            (winner.bidder_id, LedgerEntryType::AuctionPurchase),
        ] {
            if let Err(err) = self
                .ledger
                .award(user_id, bonus, entry_type, Some(&reference))
                .await
            {
                warnings.push(format!("bonus award to {user_id} failed: {err}"));
                tracing::warn!(
                    auction_id = %auction.id,
                    user_id = %user_id,
                    error = %err,
                    "failed to award settlement bonus"
                );
            }
        }
    }

    /// Release every losing hold still outstanding, each exactly once via
    /// the `holds_released` claim. A claim whose release fails is reopened
    /// so the next settlement call can retry it.
    async fn release_losing_holds(&self, auction: &Auction, warnings: &mut Vec<String>) -> u32 {
        let losers = match self.market.open_hold_bids(auction.id).await {
            Ok(losers) => losers,
            Err(err) => {
                warnings.push(format!("could not list losing holds: {err}"));
                tracing::error!(
                    auction_id = %auction.id,
                    error = %err,
                    "failed to list outstanding losing holds"
                );
                return 0;
            }
        };

        let mut released = 0;
        for loser in losers {
            let claimed = match self.market.claim_hold_release(loser.id).await {
                Ok(Some(bid)) => bid,
                Ok(None) => continue,
                Err(err) => {
                    warnings.push(format!("hold release claim for bid {} failed: {err}", loser.id));
                    continue;
                }
            };

            let result = match (&claimed.authorization_ref, claimed.ledger_hold) {
                (Some(auth_ref), _) => self.gateway.cancel_authorization(auth_ref).await,
                (None, Some(held)) => self
                    .ledger
                    .release_hold(claimed.bidder_id, held, &claimed.id.to_string())
                    .await
                    .map(|_| ()),
                (None, None) => Ok(()),
            };

            match result {
                Ok(()) => {
                    released += 1;
                    if let Err(err) = self.market.mark_bid_cancelled(claimed.id).await {
                        warnings.push(format!(
                            "bid {} hold released but not marked cancelled: {err}",
                            claimed.id
                        ));
                    }
                }
                Err(err) => {
                    warnings.push(format!("hold release for bid {} failed: {err}", claimed.id));
                    tracing::error!(
                        bid_id = %claimed.id,
                        error = %err,
                        "failed to release losing hold; reopening for the next sweep"
                    );
                    if let Err(reopen_err) = self.market.reopen_hold(claimed.id).await {
                        warnings.push(format!(
                            "bid {} hold claim could not be reopened: {reopen_err}",
                            claimed.id
                        ));
                    }
                }
            }
        }
        released
    }
}
