//! Raffle ticket sales with strict inventory.
//!
//! Two funding paths share one allocation primitive:
//!
//! - **Ledger**: charge points and allocate entries in the same call.
//! - **Card**: create a confirm-later payment; entries are allocated when
//!   the processor confirms the charge, through the webhook or through
//!   client-driven finalization (which verifies with the processor rather
//!   than trusting the client).
//!
//! All allocation funnels through [`RaffleStore::allocate_entries`], whose
//! atomic clamp against remaining inventory is what makes the entry cap
//! strict under concurrency. Requests for more tickets than remain are
//! clamped, never rejected; only a fully sold-out raffle refuses a buyer.

use crate::error::{MarketError, Result};
use crate::ledger::Ledger;
use crate::providers::gateway::{PaymentGateway, PaymentOutcome};
use crate::providers::ledger_store::LedgerStore;
use crate::providers::raffle_store::{EntryAllocation, RaffleStore};
use crate::types::{
    LedgerEntryType, Money, PaymentMethod, Points, PurchaseId, PurchaseStatus, Raffle, RaffleId,
    RafflePurchase, RaffleStatus, UserId,
};
use chrono::Utc;

/// How a raffle purchase is funded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseFunding {
    /// Pay with ledger points; entries are allocated immediately.
    Ledger,
    /// Pay by card; entries are allocated on processor confirmation.
    Card,
}

/// Result of initiating a ticket purchase.
#[derive(Debug, Clone, PartialEq)]
pub struct TicketPurchase {
    /// The purchase record.
    pub purchase: RafflePurchase,
    /// Entries allocated so far (zero until a card purchase confirms).
    pub granted: u32,
    /// Client secret for confirming a card payment, when one is needed.
    pub client_secret: Option<String>,
}

/// Result of finalizing a purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalizedPurchase {
    /// The purchase that was finalized.
    pub purchase_id: PurchaseId,
    /// Entries the purchase holds after finalization.
    pub entries: u32,
}

/// Raffle service, generic over its providers.
#[derive(Clone)]
pub struct RaffleService<R, L, G> {
    raffles: R,
    ledger: Ledger<L>,
    gateway: G,
}

impl<R, L, G> RaffleService<R, L, G>
where
    R: RaffleStore,
    L: LedgerStore,
    G: PaymentGateway,
{
    /// Creates a raffle service over the given providers.
    pub const fn new(raffles: R, ledger: Ledger<L>, gateway: G) -> Self {
        Self {
            raffles,
            ledger,
            gateway,
        }
    }

    /// Open a new raffle.
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuantity` for a zero entry cap, `Database` on store
    /// failure.
    pub async fn create_raffle(
        &self,
        title: String,
        ticket_price: Money,
        max_entries: u32,
    ) -> Result<Raffle> {
        if max_entries == 0 {
            return Err(MarketError::InvalidQuantity);
        }
        let raffle = Raffle {
            id: RaffleId::new(),
            title,
            ticket_price,
            max_entries,
            tickets_sold: 0,
            status: RaffleStatus::Active,
            created_at: Utc::now(),
        };
        self.raffles.create_raffle(&raffle).await?;
        tracing::info!(
            raffle_id = %raffle.id,
            max_entries,
            ticket_price = ticket_price.minor(),
            "raffle opened"
        );
        Ok(raffle)
    }

    /// Load a raffle with a fresh sold count.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown raffle.
    pub async fn get_raffle(&self, id: RaffleId) -> Result<Raffle> {
        self.raffles.get_raffle(id).await
    }

    /// Initiate a ticket purchase.
    ///
    /// The requested quantity is clamped to remaining inventory; the buyer
    /// pays for what they get, never for clamped-away tickets. One purchase
    /// per buyer per raffle.
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuantity` for zero tickets, `RaffleNotOpen` and
    /// `RaffleSoldOut` on inventory state, `AlreadyEntered` for a repeat
    /// buyer, `InsufficientFunds` on the ledger path and `GatewayError` on
    /// the card path.
    pub async fn purchase_tickets(
        &self,
        raffle_id: RaffleId,
        buyer_id: UserId,
        quantity: u32,
        funding: PurchaseFunding,
    ) -> Result<TicketPurchase> {
        if quantity == 0 {
            return Err(MarketError::InvalidQuantity);
        }

        let raffle = self.raffles.get_raffle(raffle_id).await?;
        if raffle.status != RaffleStatus::Active {
            return Err(MarketError::RaffleNotOpen);
        }
        let remaining = raffle.remaining();
        if remaining == 0 {
            return Err(MarketError::RaffleSoldOut);
        }
        if self
            .raffles
            .find_purchase(raffle_id, buyer_id)
            .await?
            .is_some()
        {
            return Err(MarketError::AlreadyEntered);
        }

        let clamped = quantity.min(remaining);
        let amount = raffle
            .ticket_price
            .checked_mul(clamped)
            .ok_or_else(|| MarketError::Internal("purchase amount overflow".to_string()))?;

        let purchase = RafflePurchase {
            id: PurchaseId::new(),
            raffle_id,
            buyer_id,
            quantity: clamped,
            amount,
            payment_method: match funding {
                PurchaseFunding::Ledger => PaymentMethod::Ledger,
                PurchaseFunding::Card => PaymentMethod::Card,
            },
            payment_ref: None,
            status: PurchaseStatus::Pending,
            created_at: Utc::now(),
        };
        // Claims the one-per-buyer slot before any money moves.
        self.raffles.create_purchase(&purchase).await?;

        match funding {
            PurchaseFunding::Ledger => self.settle_ledger_purchase(&raffle, purchase).await,
            PurchaseFunding::Card => self.open_card_purchase(purchase).await,
        }
    }

    /// Ledger path: charge points, then allocate in the same request.
    async fn settle_ledger_purchase(
        &self,
        raffle: &Raffle,
        mut purchase: RafflePurchase,
    ) -> Result<TicketPurchase> {
        let charge = Points::from_money(purchase.amount);
        if let Err(err) = self
            .ledger
            .spend(
                purchase.buyer_id,
                charge,
                LedgerEntryType::RafflePurchase,
                Some(&purchase.id.to_string()),
            )
            .await
        {
            if let Err(mark_err) = self.raffles.mark_purchase_failed(purchase.id).await {
                tracing::error!(
                    purchase_id = %purchase.id,
                    error = %mark_err,
                    "failed to mark unpaid purchase failed"
                );
            }
            return Err(err);
        }

        let granted = self.allocate(&purchase).await?;

        // Inventory can shrink between the quantity clamp and allocation;
        // the shortfall is refunded as a new offsetting row.
        if granted < purchase.quantity {
            let shortfall = purchase.quantity - granted;
            let refund = raffle
                .ticket_price
                .checked_mul(shortfall)
                .map(Points::from_money)
                .unwrap_or(Points::ZERO);
            if let Err(err) = self
                .ledger
                .award(
                    purchase.buyer_id,
                    refund,
                    LedgerEntryType::RafflePurchase,
                    Some(&purchase.id.to_string()),
                )
                .await
            {
                tracing::error!(
                    purchase_id = %purchase.id,
                    shortfall,
                    error = %err,
                    "failed to refund clamped-away tickets"
                );
            }
        }

        if granted == 0 {
            return Err(MarketError::RaffleSoldOut);
        }

        purchase.status = PurchaseStatus::Succeeded;
        Ok(TicketPurchase {
            purchase,
            granted,
            client_secret: None,
        })
    }

    /// Card path: create the confirm-later payment and hand the client
    /// secret back; entries wait for confirmation.
    async fn open_card_purchase(&self, mut purchase: RafflePurchase) -> Result<TicketPurchase> {
        let intent = match self
            .gateway
            .create_payment(
                purchase.amount,
                &purchase.buyer_id.to_string(),
                purchase.id,
                &format!("raffle-{}", purchase.id),
            )
            .await
        {
            Ok(intent) => intent,
            Err(err) => {
                if let Err(mark_err) = self.raffles.mark_purchase_failed(purchase.id).await {
                    tracing::error!(
                        purchase_id = %purchase.id,
                        error = %mark_err,
                        "failed to mark unpayable purchase failed"
                    );
                }
                return Err(err);
            }
        };

        self.raffles.set_payment_ref(purchase.id, &intent.id).await?;
        purchase.payment_ref = Some(intent.id);

        tracing::info!(
            purchase_id = %purchase.id,
            quantity = purchase.quantity,
            "card raffle purchase awaiting confirmation"
        );

        Ok(TicketPurchase {
            purchase,
            granted: 0,
            client_secret: Some(intent.client_secret),
        })
    }

    /// Client-driven finalization of a card purchase, keyed by the payment
    /// intent the purchase was opened with.
    ///
    /// Verifies the charge with the processor before allocating; safe to
    /// race with the webhook (allocation is idempotent).
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when no purchase on this raffle carries the
    /// reference, and `PaymentAuthorizationFailed` when the charge has not
    /// succeeded.
    pub async fn finalize_purchase(
        &self,
        raffle_id: RaffleId,
        payment_ref: &str,
    ) -> Result<FinalizedPurchase> {
        let purchase = self
            .raffles
            .find_purchase_by_payment_ref(payment_ref)
            .await?
            .filter(|p| p.raffle_id == raffle_id)
            .ok_or(MarketError::NotFound {
                resource: "purchase",
            })?;

        match purchase.status {
            PurchaseStatus::Succeeded => {
                let entries = self.raffles.entries_for_purchase(purchase.id).await?;
                return Ok(FinalizedPurchase {
                    purchase_id: purchase.id,
                    entries: u32::try_from(entries.len()).unwrap_or(u32::MAX),
                });
            }
            PurchaseStatus::Failed => {
                return Err(MarketError::PaymentAuthorizationFailed {
                    reason: "payment failed".to_string(),
                });
            }
            PurchaseStatus::Pending => {}
        }

        match self.gateway.payment_status(payment_ref).await? {
            PaymentOutcome::Succeeded => {
                let entries = self.allocate(&purchase).await?;
                Ok(FinalizedPurchase {
                    purchase_id: purchase.id,
                    entries,
                })
            }
            PaymentOutcome::Pending => Err(MarketError::PaymentAuthorizationFailed {
                reason: "payment not confirmed yet".to_string(),
            }),
            PaymentOutcome::Failed => {
                self.raffles.mark_purchase_failed(purchase.id).await?;
                Err(MarketError::PaymentAuthorizationFailed {
                    reason: "payment failed".to_string(),
                })
            }
        }
    }

    /// Apply a processor payment event to the purchase it references.
    ///
    /// Unknown references are ignored (the processor may carry events for
    /// other products); repeated deliveries are absorbed by the idempotent
    /// allocation.
    ///
    /// # Errors
    ///
    /// Returns `Database` on store failure.
    pub async fn handle_payment_event(&self, payment_ref: &str, succeeded: bool) -> Result<()> {
        let Some(purchase) = self.raffles.find_purchase_by_payment_ref(payment_ref).await? else {
            tracing::debug!(payment_ref, "payment event for unknown purchase, ignoring");
            return Ok(());
        };

        if succeeded {
            let granted = self.allocate(&purchase).await?;
            tracing::info!(
                purchase_id = %purchase.id,
                granted,
                "payment confirmed, entries allocated"
            );
        } else {
            self.raffles.mark_purchase_failed(purchase.id).await?;
            tracing::info!(purchase_id = %purchase.id, "payment failed, purchase closed");
        }
        Ok(())
    }

    /// Allocate entries for a purchase, absorbing the already-finalized
    /// case. Under-grants on a confirmed card charge are flagged for a
    /// manual refund.
    async fn allocate(&self, purchase: &RafflePurchase) -> Result<u32> {
        let granted = match self.raffles.allocate_entries(purchase.id).await? {
            EntryAllocation::Granted { granted } => granted,
            EntryAllocation::AlreadyFinalized { existing } => return Ok(existing),
        };

        if granted < purchase.quantity && purchase.payment_method == PaymentMethod::Card {
            tracing::error!(
                purchase_id = %purchase.id,
                paid_for = purchase.quantity,
                granted,
                "card purchase under-allocated; shortfall needs a manual refund"
            );
        }
        Ok(granted)
    }
}
