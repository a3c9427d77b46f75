//! `PostgreSQL` ledger store.

use super::{db_err, is_insufficient_funds, parse_status, PostgresStore};
use crate::error::{MarketError, Result};
use crate::providers::ledger_store::LedgerStore;
use crate::types::{LedgerEntryType, LedgerTransaction, Points, UserId};
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

impl LedgerStore for PostgresStore {
    async fn adjust_balance(
        &self,
        user_id: UserId,
        change: Points,
        entry_type: LedgerEntryType,
        reference: Option<&str>,
        metadata: serde_json::Value,
    ) -> Result<Points> {
        let row = sqlx::query("SELECT ledger_adjust_balance($1, $2, $3, $4, $5) AS balance")
            .bind(user_id.as_uuid())
            .bind(change.value())
            .bind(entry_type.as_str())
            .bind(reference)
            .bind(metadata)
            .fetch_one(self.pool())
            .await
            .map_err(|e| {
                if is_insufficient_funds(&e) {
                    MarketError::InsufficientFunds
                } else {
                    db_err("ledger adjustment failed", e)
                }
            })?;

        let balance: i64 = row
            .try_get("balance")
            .map_err(|e| db_err("ledger balance decode failed", e))?;
        Ok(Points::new(balance))
    }

    async fn balance(&self, user_id: UserId) -> Result<Points> {
        let row = sqlx::query("SELECT balance FROM ledger_accounts WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .fetch_optional(self.pool())
            .await
            .map_err(|e| db_err("balance lookup failed", e))?;

        match row {
            Some(row) => {
                let balance: i64 = row
                    .try_get("balance")
                    .map_err(|e| db_err("balance decode failed", e))?;
                Ok(Points::new(balance))
            }
            None => Ok(Points::ZERO),
        }
    }

    async fn history(&self, user_id: UserId) -> Result<Vec<LedgerTransaction>> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, change, entry_type, reference, metadata, created_at
            FROM ledger_transactions
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            ",
        )
        .bind(user_id.as_uuid())
        .fetch_all(self.pool())
        .await
        .map_err(|e| db_err("history query failed", e))?;

        rows.into_iter()
            .map(|row| {
                let entry_type: String = row
                    .try_get("entry_type")
                    .map_err(|e| db_err("transaction decode failed", e))?;
                Ok(LedgerTransaction {
                    id: row
                        .try_get::<Uuid, _>("id")
                        .map_err(|e| db_err("transaction decode failed", e))?,
                    user_id: UserId::from_uuid(
                        row.try_get::<Uuid, _>("user_id")
                            .map_err(|e| db_err("transaction decode failed", e))?,
                    ),
                    change: Points::new(
                        row.try_get::<i64, _>("change")
                            .map_err(|e| db_err("transaction decode failed", e))?,
                    ),
                    entry_type: parse_status(LedgerEntryType::parse, &entry_type, "entry_type")?,
                    reference: row
                        .try_get::<Option<String>, _>("reference")
                        .map_err(|e| db_err("transaction decode failed", e))?,
                    metadata: row
                        .try_get::<serde_json::Value, _>("metadata")
                        .map_err(|e| db_err("transaction decode failed", e))?,
                    created_at: row
                        .try_get::<DateTime<Utc>, _>("created_at")
                        .map_err(|e| db_err("transaction decode failed", e))?,
                })
            })
            .collect()
    }
}
