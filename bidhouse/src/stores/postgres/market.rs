//! `PostgreSQL` market store: auctions, bids, payments, seller accounts.

use super::{db_err, parse_status, PostgresStore};
use crate::error::{MarketError, Result};
use crate::providers::market_store::MarketStore;
use crate::types::{
    Auction, AuctionId, AuctionStatus, AuthorizationStatus, Bid, BidId, BidStatus, Money, Payment,
    PaymentId, PaymentMethod, PaymentRecordStatus, Points, SellerAccount, UserId,
};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

const AUCTION_COLUMNS: &str =
    "id, seller_id, starting_price, current_price, end_time, status, created_at";
const BID_COLUMNS: &str = "id, auction_id, bidder_id, amount, payment_method, \
     authorization_status, status, authorization_ref, ledger_hold, holds_released, created_at";
const PAYMENT_COLUMNS: &str = "id, auction_id, buyer_id, seller_id, gross_amount, platform_fee, \
     seller_amount, payment_method, transfer_ref, status, created_at";

fn auction_from_row(row: &PgRow) -> Result<Auction> {
    let decode = |e| db_err("auction decode failed", e);
    let status: String = row.try_get("status").map_err(decode)?;
    Ok(Auction {
        id: AuctionId::from_uuid(row.try_get::<Uuid, _>("id").map_err(decode)?),
        seller_id: UserId::from_uuid(row.try_get::<Uuid, _>("seller_id").map_err(decode)?),
        starting_price: Money::from_minor(row.try_get::<i64, _>("starting_price").map_err(decode)?),
        current_price: Money::from_minor(row.try_get::<i64, _>("current_price").map_err(decode)?),
        end_time: row.try_get::<DateTime<Utc>, _>("end_time").map_err(decode)?,
        status: parse_status(AuctionStatus::parse, &status, "status")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(decode)?,
    })
}

fn bid_from_row(row: &PgRow) -> Result<Bid> {
    let decode = |e| db_err("bid decode failed", e);
    let payment_method: String = row.try_get("payment_method").map_err(decode)?;
    let authorization_status: String = row.try_get("authorization_status").map_err(decode)?;
    let status: String = row.try_get("status").map_err(decode)?;
    Ok(Bid {
        id: BidId::from_uuid(row.try_get::<Uuid, _>("id").map_err(decode)?),
        auction_id: AuctionId::from_uuid(row.try_get::<Uuid, _>("auction_id").map_err(decode)?),
        bidder_id: UserId::from_uuid(row.try_get::<Uuid, _>("bidder_id").map_err(decode)?),
        amount: Money::from_minor(row.try_get::<i64, _>("amount").map_err(decode)?),
        payment_method: parse_status(PaymentMethod::parse, &payment_method, "payment_method")?,
        authorization_status: parse_status(
            AuthorizationStatus::parse,
            &authorization_status,
            "authorization_status",
        )?,
        status: parse_status(BidStatus::parse, &status, "status")?,
        authorization_ref: row
            .try_get::<Option<String>, _>("authorization_ref")
            .map_err(decode)?,
        ledger_hold: row
            .try_get::<Option<i64>, _>("ledger_hold")
            .map_err(decode)?
            .map(Points::new),
        holds_released: row.try_get::<bool, _>("holds_released").map_err(decode)?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(decode)?,
    })
}

fn payment_from_row(row: &PgRow) -> Result<Payment> {
    let decode = |e| db_err("payment decode failed", e);
    let payment_method: String = row.try_get("payment_method").map_err(decode)?;
    let status: String = row.try_get("status").map_err(decode)?;
    Ok(Payment {
        id: PaymentId::from_uuid(row.try_get::<Uuid, _>("id").map_err(decode)?),
        auction_id: AuctionId::from_uuid(row.try_get::<Uuid, _>("auction_id").map_err(decode)?),
        buyer_id: UserId::from_uuid(row.try_get::<Uuid, _>("buyer_id").map_err(decode)?),
        seller_id: UserId::from_uuid(row.try_get::<Uuid, _>("seller_id").map_err(decode)?),
        gross_amount: Money::from_minor(row.try_get::<i64, _>("gross_amount").map_err(decode)?),
        platform_fee: Money::from_minor(row.try_get::<i64, _>("platform_fee").map_err(decode)?),
        seller_amount: Money::from_minor(row.try_get::<i64, _>("seller_amount").map_err(decode)?),
        payment_method: parse_status(PaymentMethod::parse, &payment_method, "payment_method")?,
        transfer_ref: row
            .try_get::<Option<String>, _>("transfer_ref")
            .map_err(decode)?,
        status: parse_status(PaymentRecordStatus::parse, &status, "status")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(decode)?,
    })
}

impl MarketStore for PostgresStore {
    async fn create_auction(&self, auction: &Auction) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO auctions
                (id, seller_id, starting_price, current_price, end_time, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(auction.id.as_uuid())
        .bind(auction.seller_id.as_uuid())
        .bind(auction.starting_price.minor())
        .bind(auction.current_price.minor())
        .bind(auction.end_time)
        .bind(auction.status.as_str())
        .bind(auction.created_at)
        .execute(self.pool())
        .await
        .map_err(|e| db_err("auction insert failed", e))?;
        Ok(())
    }

    async fn get_auction(&self, id: AuctionId) -> Result<Auction> {
        let row = sqlx::query(&format!(
            "SELECT {AUCTION_COLUMNS} FROM auctions WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| db_err("auction lookup failed", e))?
        .ok_or(MarketError::NotFound {
            resource: "auction",
        })?;
        auction_from_row(&row)
    }

    async fn get_bid(&self, id: BidId) -> Result<Bid> {
        let row = sqlx::query(&format!("SELECT {BID_COLUMNS} FROM bids WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(self.pool())
            .await
            .map_err(|e| db_err("bid lookup failed", e))?
            .ok_or(MarketError::NotFound { resource: "bid" })?;
        bid_from_row(&row)
    }

    async fn active_bid(&self, auction_id: AuctionId) -> Result<Option<Bid>> {
        let row = sqlx::query(&format!(
            "SELECT {BID_COLUMNS} FROM bids WHERE auction_id = $1 AND status = 'active'"
        ))
        .bind(auction_id.as_uuid())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| db_err("active bid lookup failed", e))?;
        row.as_ref().map(bid_from_row).transpose()
    }

    async fn seller_account(&self, user_id: UserId) -> Result<Option<SellerAccount>> {
        let row = sqlx::query(
            r"
            SELECT user_id, payout_account, country, automatic_transfers
            FROM seller_accounts
            WHERE user_id = $1
            ",
        )
        .bind(user_id.as_uuid())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| db_err("seller account lookup failed", e))?;

        row.map(|row| {
            let decode = |e| db_err("seller account decode failed", e);
            Ok(SellerAccount {
                user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id").map_err(decode)?),
                payout_account: row.try_get("payout_account").map_err(decode)?,
                country: row.try_get("country").map_err(decode)?,
                automatic_transfers: row.try_get("automatic_transfers").map_err(decode)?,
            })
        })
        .transpose()
    }

    async fn commit_placement(&self, expected_price: Money, bid: &Bid) -> Result<()> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| db_err("placement transaction begin failed", e))?;

        // Serialize placements per auction on the row lock, then re-check
        // what was validated outside it.
        let row = sqlx::query("SELECT status, current_price FROM auctions WHERE id = $1 FOR UPDATE")
            .bind(bid.auction_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| db_err("auction lock failed", e))?
            .ok_or(MarketError::NotFound {
                resource: "auction",
            })?;

        let status: String = row
            .try_get("status")
            .map_err(|e| db_err("auction decode failed", e))?;
        if parse_status(AuctionStatus::parse, &status, "status")? != AuctionStatus::Active {
            return Err(MarketError::AuctionNotActive);
        }
        let current_price: i64 = row
            .try_get("current_price")
            .map_err(|e| db_err("auction decode failed", e))?;
        if current_price != expected_price.minor() {
            return Err(MarketError::PriceChanged);
        }

        sqlx::query("UPDATE auctions SET current_price = $2 WHERE id = $1")
            .bind(bid.auction_id.as_uuid())
            .bind(bid.amount.minor())
            .execute(&mut *tx)
            .await
            .map_err(|e| db_err("price update failed", e))?;

        sqlx::query("UPDATE bids SET status = 'outbid' WHERE auction_id = $1 AND status = 'active'")
            .bind(bid.auction_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| db_err("outbid cascade failed", e))?;

        sqlx::query(&format!(
            r"
            INSERT INTO bids ({BID_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "
        ))
        .bind(bid.id.as_uuid())
        .bind(bid.auction_id.as_uuid())
        .bind(bid.bidder_id.as_uuid())
        .bind(bid.amount.minor())
        .bind(bid.payment_method.as_str())
        .bind(bid.authorization_status.as_str())
        .bind(bid.status.as_str())
        .bind(bid.authorization_ref.as_deref())
        .bind(bid.ledger_hold.map(|p| p.value()))
        .bind(bid.holds_released)
        .bind(bid.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_err("bid insert failed", e))?;

        tx.commit()
            .await
            .map_err(|e| db_err("placement commit failed", e))
    }

    async fn claim_hold_release(&self, bid_id: BidId) -> Result<Option<Bid>> {
        let row = sqlx::query(&format!(
            r"
            UPDATE bids SET holds_released = TRUE
            WHERE id = $1 AND holds_released = FALSE
            RETURNING {BID_COLUMNS}
            "
        ))
        .bind(bid_id.as_uuid())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| db_err("hold release claim failed", e))?;
        row.as_ref().map(bid_from_row).transpose()
    }

    async fn reopen_hold(&self, bid_id: BidId) -> Result<()> {
        sqlx::query("UPDATE bids SET holds_released = FALSE WHERE id = $1")
            .bind(bid_id.as_uuid())
            .execute(self.pool())
            .await
            .map_err(|e| db_err("hold reopen failed", e))?;
        Ok(())
    }

    async fn mark_bid_cancelled(&self, bid_id: BidId) -> Result<()> {
        sqlx::query(
            "UPDATE bids SET status = 'cancelled', authorization_status = 'cancelled' \
             WHERE id = $1",
        )
        .bind(bid_id.as_uuid())
        .execute(self.pool())
        .await
        .map_err(|e| db_err("bid cancel failed", e))?;
        Ok(())
    }

    async fn fence_auction(&self, id: AuctionId) -> Result<Auction> {
        // Conditional transition; already-ended and completed rows pass
        // through untouched and are read back below.
        sqlx::query("UPDATE auctions SET status = 'ended' WHERE id = $1 AND status = 'active'")
            .bind(id.as_uuid())
            .execute(self.pool())
            .await
            .map_err(|e| db_err("auction fence failed", e))?;

        self.get_auction(id).await
    }

    async fn winning_candidate(&self, auction_id: AuctionId) -> Result<Option<Bid>> {
        let row = sqlx::query(&format!(
            r"
            SELECT {BID_COLUMNS} FROM bids
            WHERE auction_id = $1 AND status = 'active'
            ORDER BY amount DESC, created_at ASC
            LIMIT 1
            "
        ))
        .bind(auction_id.as_uuid())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| db_err("winner query failed", e))?;
        row.as_ref().map(bid_from_row).transpose()
    }

    async fn find_payment(&self, auction_id: AuctionId) -> Result<Option<Payment>> {
        let row = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE auction_id = $1"
        ))
        .bind(auction_id.as_uuid())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| db_err("payment lookup failed", e))?;
        row.as_ref().map(payment_from_row).transpose()
    }

    async fn record_completion(
        &self,
        auction_id: AuctionId,
        winning_bid_id: BidId,
        payment: &Payment,
    ) -> Result<()> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| db_err("completion transaction begin failed", e))?;

        sqlx::query("UPDATE auctions SET status = 'completed' WHERE id = $1")
            .bind(auction_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| db_err("auction completion failed", e))?;

        sqlx::query(
            "UPDATE bids SET status = 'winning', authorization_status = 'captured' \
             WHERE id = $1",
        )
        .bind(winning_bid_id.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(|e| db_err("winning bid update failed", e))?;

        sqlx::query(&format!(
            r"
            INSERT INTO payments ({PAYMENT_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "
        ))
        .bind(payment.id.as_uuid())
        .bind(payment.auction_id.as_uuid())
        .bind(payment.buyer_id.as_uuid())
        .bind(payment.seller_id.as_uuid())
        .bind(payment.gross_amount.minor())
        .bind(payment.platform_fee.minor())
        .bind(payment.seller_amount.minor())
        .bind(payment.payment_method.as_str())
        .bind(payment.transfer_ref.as_deref())
        .bind(payment.status.as_str())
        .bind(payment.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_err("payment insert failed", e))?;

        tx.commit()
            .await
            .map_err(|e| db_err("completion commit failed", e))
    }

    async fn open_hold_bids(&self, auction_id: AuctionId) -> Result<Vec<Bid>> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {BID_COLUMNS} FROM bids
            WHERE auction_id = $1 AND holds_released = FALSE AND status <> 'winning'
            "
        ))
        .bind(auction_id.as_uuid())
        .fetch_all(self.pool())
        .await
        .map_err(|e| db_err("open holds query failed", e))?;
        rows.iter().map(bid_from_row).collect()
    }

    async fn set_transfer_result(
        &self,
        payment_id: PaymentId,
        transfer_ref: Option<&str>,
        status: PaymentRecordStatus,
    ) -> Result<()> {
        sqlx::query("UPDATE payments SET transfer_ref = $2, status = $3 WHERE id = $1")
            .bind(payment_id.as_uuid())
            .bind(transfer_ref)
            .bind(status.as_str())
            .execute(self.pool())
            .await
            .map_err(|e| db_err("transfer result update failed", e))?;
        Ok(())
    }
}
