//! `PostgreSQL` raffle store.

use super::{db_err, is_unique_violation, parse_status, PostgresStore};
use crate::error::{MarketError, Result};
use crate::providers::raffle_store::{EntryAllocation, RaffleStore};
use crate::types::{
    Money, PaymentMethod, PurchaseId, PurchaseStatus, Raffle, RaffleEntry, RaffleId,
    RafflePurchase, RaffleStatus, UserId,
};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

const PURCHASE_COLUMNS: &str =
    "id, raffle_id, buyer_id, quantity, amount, payment_method, payment_ref, status, created_at";

#[allow(clippy::cast_sign_loss)] // counts and quantities are non-negative by schema
fn purchase_from_row(row: &PgRow) -> Result<RafflePurchase> {
    let decode = |e| db_err("purchase decode failed", e);
    let payment_method: String = row.try_get("payment_method").map_err(decode)?;
    let status: String = row.try_get("status").map_err(decode)?;
    Ok(RafflePurchase {
        id: PurchaseId::from_uuid(row.try_get::<Uuid, _>("id").map_err(decode)?),
        raffle_id: RaffleId::from_uuid(row.try_get::<Uuid, _>("raffle_id").map_err(decode)?),
        buyer_id: UserId::from_uuid(row.try_get::<Uuid, _>("buyer_id").map_err(decode)?),
        quantity: row.try_get::<i32, _>("quantity").map_err(decode)? as u32,
        amount: Money::from_minor(row.try_get::<i64, _>("amount").map_err(decode)?),
        payment_method: parse_status(PaymentMethod::parse, &payment_method, "payment_method")?,
        payment_ref: row
            .try_get::<Option<String>, _>("payment_ref")
            .map_err(decode)?,
        status: parse_status(PurchaseStatus::parse, &status, "status")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(decode)?,
    })
}

#[allow(clippy::cast_sign_loss)]
fn entry_from_row(row: &PgRow) -> Result<RaffleEntry> {
    let decode = |e| db_err("entry decode failed", e);
    Ok(RaffleEntry {
        id: row.try_get::<Uuid, _>("id").map_err(decode)?,
        raffle_id: RaffleId::from_uuid(row.try_get::<Uuid, _>("raffle_id").map_err(decode)?),
        purchase_id: PurchaseId::from_uuid(row.try_get::<Uuid, _>("purchase_id").map_err(decode)?),
        buyer_id: UserId::from_uuid(row.try_get::<Uuid, _>("buyer_id").map_err(decode)?),
        ticket_number: row.try_get::<i32, _>("ticket_number").map_err(decode)? as u32,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(decode)?,
    })
}

impl RaffleStore for PostgresStore {
    async fn create_raffle(&self, raffle: &Raffle) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO raffles
                (id, title, ticket_price, max_entries, tickets_sold, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(raffle.id.as_uuid())
        .bind(&raffle.title)
        .bind(raffle.ticket_price.minor())
        .bind(i64::from(raffle.max_entries))
        .bind(i64::from(raffle.tickets_sold))
        .bind(raffle.status.as_str())
        .bind(raffle.created_at)
        .execute(self.pool())
        .await
        .map_err(|e| db_err("raffle insert failed", e))?;
        Ok(())
    }

    #[allow(clippy::cast_sign_loss)]
    async fn get_raffle(&self, id: RaffleId) -> Result<Raffle> {
        let row = sqlx::query(
            r"
            SELECT r.id, r.title, r.ticket_price, r.max_entries, r.status, r.created_at,
                   (SELECT COUNT(*) FROM raffle_entries e WHERE e.raffle_id = r.id) AS sold
            FROM raffles r
            WHERE r.id = $1
            ",
        )
        .bind(id.as_uuid())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| db_err("raffle lookup failed", e))?
        .ok_or(MarketError::NotFound { resource: "raffle" })?;

        let decode = |e| db_err("raffle decode failed", e);
        let status: String = row.try_get("status").map_err(decode)?;
        Ok(Raffle {
            id: RaffleId::from_uuid(row.try_get::<Uuid, _>("id").map_err(decode)?),
            title: row.try_get("title").map_err(decode)?,
            ticket_price: Money::from_minor(row.try_get::<i64, _>("ticket_price").map_err(decode)?),
            max_entries: row.try_get::<i32, _>("max_entries").map_err(decode)? as u32,
            tickets_sold: row.try_get::<i64, _>("sold").map_err(decode)? as u32,
            status: parse_status(RaffleStatus::parse, &status, "status")?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(decode)?,
        })
    }

    async fn find_purchase(
        &self,
        raffle_id: RaffleId,
        buyer_id: UserId,
    ) -> Result<Option<RafflePurchase>> {
        let row = sqlx::query(&format!(
            r"
            SELECT {PURCHASE_COLUMNS} FROM raffle_purchases
            WHERE raffle_id = $1 AND buyer_id = $2 AND status <> 'failed'
            "
        ))
        .bind(raffle_id.as_uuid())
        .bind(buyer_id.as_uuid())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| db_err("purchase lookup failed", e))?;
        row.as_ref().map(purchase_from_row).transpose()
    }

    async fn find_purchase_by_payment_ref(
        &self,
        payment_ref: &str,
    ) -> Result<Option<RafflePurchase>> {
        let row = sqlx::query(&format!(
            "SELECT {PURCHASE_COLUMNS} FROM raffle_purchases WHERE payment_ref = $1"
        ))
        .bind(payment_ref)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| db_err("purchase lookup failed", e))?;
        row.as_ref().map(purchase_from_row).transpose()
    }

    async fn create_purchase(&self, purchase: &RafflePurchase) -> Result<()> {
        sqlx::query(&format!(
            r"
            INSERT INTO raffle_purchases ({PURCHASE_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "
        ))
        .bind(purchase.id.as_uuid())
        .bind(purchase.raffle_id.as_uuid())
        .bind(purchase.buyer_id.as_uuid())
        .bind(i64::from(purchase.quantity))
        .bind(purchase.amount.minor())
        .bind(purchase.payment_method.as_str())
        .bind(purchase.payment_ref.as_deref())
        .bind(purchase.status.as_str())
        .bind(purchase.created_at)
        .execute(self.pool())
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                MarketError::AlreadyEntered
            } else {
                db_err("purchase insert failed", e)
            }
        })?;
        Ok(())
    }

    async fn set_payment_ref(&self, purchase_id: PurchaseId, payment_ref: &str) -> Result<()> {
        sqlx::query("UPDATE raffle_purchases SET payment_ref = $2 WHERE id = $1")
            .bind(purchase_id.as_uuid())
            .bind(payment_ref)
            .execute(self.pool())
            .await
            .map_err(|e| db_err("payment ref update failed", e))?;
        Ok(())
    }

    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    async fn allocate_entries(&self, purchase_id: PurchaseId) -> Result<EntryAllocation> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| db_err("allocation transaction begin failed", e))?;

        let row = sqlx::query(&format!(
            "SELECT {PURCHASE_COLUMNS} FROM raffle_purchases WHERE id = $1 FOR UPDATE"
        ))
        .bind(purchase_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| db_err("purchase lock failed", e))?
        .ok_or(MarketError::NotFound {
            resource: "purchase",
        })?;
        let purchase = purchase_from_row(&row)?;

        if purchase.status != PurchaseStatus::Pending {
            let existing: i64 =
                sqlx::query("SELECT COUNT(*) AS n FROM raffle_entries WHERE purchase_id = $1")
                    .bind(purchase_id.as_uuid())
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(|e| db_err("entry count failed", e))?
                    .try_get("n")
                    .map_err(|e| db_err("entry count decode failed", e))?;
            return Ok(EntryAllocation::AlreadyFinalized {
                existing: existing as u32,
            });
        }

        // Lock the raffle row to serialize allocations, then clamp against
        // a count taken under that lock. This is the guarantee that the cap
        // holds under concurrent confirmations.
        let raffle_row = sqlx::query("SELECT max_entries FROM raffles WHERE id = $1 FOR UPDATE")
            .bind(purchase.raffle_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| db_err("raffle lock failed", e))?
            .ok_or(MarketError::NotFound { resource: "raffle" })?;
        let max_entries: i32 = raffle_row
            .try_get("max_entries")
            .map_err(|e| db_err("raffle decode failed", e))?;

        let sold: i64 = sqlx::query("SELECT COUNT(*) AS n FROM raffle_entries WHERE raffle_id = $1")
            .bind(purchase.raffle_id.as_uuid())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| db_err("entry count failed", e))?
            .try_get("n")
            .map_err(|e| db_err("entry count decode failed", e))?;

        let remaining = (i64::from(max_entries) - sold).max(0) as u32;
        let granted = purchase.quantity.min(remaining);

        for i in 0..granted {
            sqlx::query(
                r"
                INSERT INTO raffle_entries (raffle_id, purchase_id, buyer_id, ticket_number)
                VALUES ($1, $2, $3, $4)
                ",
            )
            .bind(purchase.raffle_id.as_uuid())
            .bind(purchase_id.as_uuid())
            .bind(purchase.buyer_id.as_uuid())
            .bind(sold as i32 + i as i32 + 1)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_err("entry insert failed", e))?;
        }

        sqlx::query("UPDATE raffle_purchases SET status = 'succeeded' WHERE id = $1")
            .bind(purchase_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| db_err("purchase finalize failed", e))?;

        sqlx::query("UPDATE raffles SET tickets_sold = $2 WHERE id = $1")
            .bind(purchase.raffle_id.as_uuid())
            .bind(sold as i32 + granted as i32)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_err("sold count update failed", e))?;

        tx.commit()
            .await
            .map_err(|e| db_err("allocation commit failed", e))?;

        Ok(EntryAllocation::Granted { granted })
    }

    async fn mark_purchase_failed(&self, purchase_id: PurchaseId) -> Result<()> {
        sqlx::query("UPDATE raffle_purchases SET status = 'failed' WHERE id = $1")
            .bind(purchase_id.as_uuid())
            .execute(self.pool())
            .await
            .map_err(|e| db_err("purchase failure update failed", e))?;
        Ok(())
    }

    #[allow(clippy::cast_sign_loss)]
    async fn entry_count(&self, raffle_id: RaffleId) -> Result<u32> {
        let n: i64 = sqlx::query("SELECT COUNT(*) AS n FROM raffle_entries WHERE raffle_id = $1")
            .bind(raffle_id.as_uuid())
            .fetch_one(self.pool())
            .await
            .map_err(|e| db_err("entry count failed", e))?
            .try_get("n")
            .map_err(|e| db_err("entry count decode failed", e))?;
        Ok(n as u32)
    }

    async fn entries_for_purchase(&self, purchase_id: PurchaseId) -> Result<Vec<RaffleEntry>> {
        let rows = sqlx::query(
            r"
            SELECT id, raffle_id, purchase_id, buyer_id, ticket_number, created_at
            FROM raffle_entries
            WHERE purchase_id = $1
            ORDER BY ticket_number
            ",
        )
        .bind(purchase_id.as_uuid())
        .fetch_all(self.pool())
        .await
        .map_err(|e| db_err("entries query failed", e))?;
        rows.iter().map(entry_from_row).collect()
    }
}
