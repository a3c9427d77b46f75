//! Error types for marketplace operations.

use crate::types::Money;
use thiserror::Error;

/// Result type alias for marketplace operations.
pub type Result<T> = std::result::Result<T, MarketError>;

/// Error taxonomy for the marketplace core.
///
/// Variants are grouped by how callers should react: validation errors are
/// rejected with no side effects, conflicts carry enough detail to retry
/// sensibly, and external failures are retryable after any held funds have
/// been compensated.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MarketError {
    // ═══════════════════════════════════════════════════════════
    // Validation Errors
    // ═══════════════════════════════════════════════════════════

    /// The auction is not open for bids.
    #[error("Auction is not active")]
    AuctionNotActive,

    /// The auction's end time has passed.
    #[error("Auction has ended")]
    AuctionEnded,

    /// A seller attempted to bid on their own auction.
    #[error("Sellers cannot bid on their own auctions")]
    SelfBidNotAllowed,

    /// The bid does not reach the required minimum.
    #[error("Bid too low: minimum is {minimum}")]
    BidTooLow {
        /// Price the auction currently stands at.
        current_price: Money,
        /// Lowest acceptable bid (`current_price + increment`).
        minimum: Money,
        /// Increment band in effect at the current price.
        increment: Money,
    },

    /// The requested ticket quantity is zero.
    #[error("Quantity must be at least 1")]
    InvalidQuantity,

    /// A monetary amount is out of range for the operation.
    #[error("Invalid amount")]
    InvalidAmount,

    /// The raffle is not selling tickets.
    #[error("Raffle is not open")]
    RaffleNotOpen,

    // ═══════════════════════════════════════════════════════════
    // Resource Conflicts
    // ═══════════════════════════════════════════════════════════

    /// A ledger adjustment would take the balance below zero.
    #[error("Insufficient ledger balance")]
    InsufficientFunds,

    /// A concurrent bid changed the price between validation and commit.
    #[error("Auction price changed, retry with the new minimum")]
    PriceChanged,

    /// The buyer already holds entries in this raffle.
    #[error("Buyer already has entries in this raffle")]
    AlreadyEntered,

    /// Every ticket in the raffle has been sold.
    #[error("Raffle is sold out")]
    RaffleSoldOut,

    /// The requested resource does not exist.
    #[error("{resource} not found")]
    NotFound {
        /// Kind of resource looked up.
        resource: &'static str,
    },

    /// The seller has no payout destination configured.
    #[error("Seller has no payout destination configured")]
    SellerPaymentNotConfigured,

    // ═══════════════════════════════════════════════════════════
    // External Dependency Failures
    // ═══════════════════════════════════════════════════════════

    /// The processor declined or failed to authorize the hold. A timed-out
    /// authorization lands here too; a timeout is never treated as success.
    #[error("Payment authorization failed: {reason}")]
    PaymentAuthorizationFailed {
        /// Processor-reported reason.
        reason: String,
    },

    /// Capture of the winning authorization failed in a non-terminal way;
    /// settlement aborts before mutating any rows.
    #[error("Capture failed: {reason}")]
    CaptureFailed {
        /// Processor-reported reason.
        reason: String,
    },

    /// A gateway call failed (network, timeout, 5xx).
    #[error("Payment gateway error: {reason}")]
    GatewayError {
        /// Underlying reason.
        reason: String,
    },

    // ═══════════════════════════════════════════════════════════
    // System Errors
    // ═══════════════════════════════════════════════════════════

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// Internal invariant violation.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MarketError {
    /// Returns `true` for errors caused by invalid input or state; these are
    /// rejected before any side effect takes place.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::AuctionNotActive
                | Self::AuctionEnded
                | Self::SelfBidNotAllowed
                | Self::BidTooLow { .. }
                | Self::InvalidQuantity
                | Self::InvalidAmount
                | Self::RaffleNotOpen
        )
    }

    /// Returns `true` for conflicts the caller can resolve and retry
    /// (a new minimum, topping up a balance, backing off).
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::InsufficientFunds
                | Self::PriceChanged
                | Self::AlreadyEntered
                | Self::RaffleSoldOut
        )
    }

    /// Returns `true` when retrying the same call later may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::GatewayError { .. } | Self::PaymentAuthorizationFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_is_disjoint_for_the_common_variants() {
        let too_low = MarketError::BidTooLow {
            current_price: Money::from_minor(90),
            minimum: Money::from_minor(91),
            increment: Money::from_minor(1),
        };
        assert!(too_low.is_validation());
        assert!(!too_low.is_conflict());

        assert!(MarketError::InsufficientFunds.is_conflict());
        assert!(!MarketError::InsufficientFunds.is_retryable());

        let gateway = MarketError::GatewayError {
            reason: "timeout".to_string(),
        };
        assert!(gateway.is_retryable());
        assert!(!gateway.is_validation());
    }
}
