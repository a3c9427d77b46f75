//! Payment gateway capability trait.
//!
//! Abstraction over an external payment processor: authorize-and-hold,
//! capture, cancel, transfer, and confirm-later payments for raffle
//! checkout. Every call is remote, slow and fallible; the adapter never
//! retries internally; callers own the retry policy. Capture, transfer and
//! payment creation take idempotency keys so caller- or processor-side
//! retries cannot double-charge.

use crate::error::Result;
use crate::types::{Money, PurchaseId};
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Request to place an authorization hold against a buyer's card.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorizationRequest {
    /// Amount to hold.
    pub amount: Money,
    /// Processor-side customer reference of the buyer.
    pub buyer_ref: String,
    /// Card token supplied by the client.
    pub payment_method_id: String,
    /// Seller's payout destination account.
    pub seller_account: String,
    /// Platform fee to split out at capture time.
    pub platform_fee: Money,
    /// Policy snapshot recorded on the authorization.
    pub metadata: AuthorizationMetadata,
}

/// Policy snapshot tagged onto an authorization.
///
/// Settlement can happen long after placement; recording the fee rate and
/// destination here means it never re-derives pricing from seller
/// configuration that may have changed in between.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationMetadata {
    /// Platform fee rate at authorization time, in basis points.
    pub fee_bps: u32,
    /// Destination account the split points at.
    pub destination_account: String,
    /// Seller account country.
    pub country: String,
    /// Auction the hold backs.
    pub auction_id: String,
}

/// A placed authorization hold.
#[derive(Debug, Clone, PartialEq)]
pub struct Authorization {
    /// Processor reference for the hold.
    pub reference: String,
    /// Whether the processor will split funds to the seller at capture
    /// time; when false, settlement issues an explicit transfer.
    pub split_configured: bool,
}

/// Result of capturing an authorization.
#[derive(Debug, Clone, PartialEq)]
pub struct Capture {
    /// Processor reference for the charge.
    pub reference: String,
    /// Split policy recovered from the authorization metadata.
    pub split_configured: bool,
    /// True when the authorization had already reached a terminal
    /// succeeded state; treated as success, never re-charged.
    pub already_captured: bool,
}

/// A transfer of the seller share to their payout destination.
#[derive(Debug, Clone, PartialEq)]
pub struct Transfer {
    /// Processor reference for the transfer.
    pub reference: String,
}

/// A confirm-later payment for raffle checkout.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentIntent {
    /// Processor payment reference; webhook events carry it back.
    pub id: String,
    /// Client secret the buyer's browser uses to confirm the charge.
    pub client_secret: String,
}

/// Processor-side state of a confirm-later payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// The charge went through.
    Succeeded,
    /// The buyer has not confirmed yet.
    Pending,
    /// The charge failed.
    Failed,
}

/// Payment gateway capability.
///
/// # Implementation Notes
///
/// - Calls must have a bounded timeout; on timeout the caller must not
///   assume success.
/// - Errors map to `MarketError::PaymentAuthorizationFailed`,
///   `CaptureFailed` or `GatewayError` depending on the operation.
pub trait PaymentGateway: Send + Sync {
    /// Place an authorization hold for `request.amount`.
    ///
    /// # Errors
    ///
    /// Returns `PaymentAuthorizationFailed` when the processor declines or
    /// the call times out.
    fn authorize_and_hold(
        &self,
        request: AuthorizationRequest,
    ) -> impl Future<Output = Result<Authorization>> + Send;

    /// Convert a held authorization into a charge.
    ///
    /// Terminal succeeded states report `already_captured = true` instead
    /// of failing, so settlement retries stay idempotent.
    ///
    /// # Errors
    ///
    /// Returns `CaptureFailed` when the authorization is in any
    /// non-capturable, non-succeeded state.
    fn capture(
        &self,
        authorization_ref: &str,
        idempotency_key: &str,
    ) -> impl Future<Output = Result<Capture>> + Send;

    /// Release a held authorization without charging.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` on processor or network failure.
    fn cancel_authorization(
        &self,
        authorization_ref: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Move the seller share to their payout destination.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` on processor or network failure; the caller
    /// records the payment as `transfer_failed` and never unwinds the
    /// capture.
    fn create_transfer(
        &self,
        amount: Money,
        destination: &str,
        idempotency_key: &str,
    ) -> impl Future<Output = Result<Transfer>> + Send;

    /// Create a confirm-later charge for a raffle purchase.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` on processor or network failure.
    fn create_payment(
        &self,
        amount: Money,
        buyer_ref: &str,
        purchase_id: PurchaseId,
        idempotency_key: &str,
    ) -> impl Future<Output = Result<PaymentIntent>> + Send;

    /// Look up the current state of a confirm-later payment.
    ///
    /// Client-driven finalization verifies through this rather than
    /// trusting the caller's claim that the charge succeeded.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` on processor or network failure.
    fn payment_status(
        &self,
        payment_ref: &str,
    ) -> impl Future<Output = Result<PaymentOutcome>> + Send;
}
