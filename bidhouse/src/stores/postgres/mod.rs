//! `PostgreSQL`-backed stores.
//!
//! One [`PostgresStore`] implements all three store traits over a shared
//! pool. Queries run at runtime (no compile-time database), and the
//! concurrency-critical paths use row locks and conditional updates rather
//! than read-then-write sequences:
//!
//! - placement commits `SELECT ... FOR UPDATE` the auction row and
//!   re-checks status and price under the lock;
//! - hold-release claims are a conditional flip of `holds_released`;
//! - ledger mutations go through the `ledger_adjust_balance` stored
//!   procedure;
//! - raffle entry allocation locks the purchase and raffle rows and clamps
//!   against a count taken under those locks.

mod ledger;
mod market;
mod raffle;

use crate::error::{MarketError, Result};
use sqlx::PgPool;

/// Shared store over a `PostgreSQL` pool.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Access the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    ///
    /// # Errors
    ///
    /// Returns `Database` if migrations fail.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| MarketError::Database(format!("migration failed: {e}")))?;
        Ok(())
    }
}

/// SQLSTATE raised by `ledger_adjust_balance` on a zero-crossing debit.
const INSUFFICIENT_FUNDS_SQLSTATE: &str = "P0001";
/// SQLSTATE for unique constraint violations.
const UNIQUE_VIOLATION_SQLSTATE: &str = "23505";

pub(crate) fn db_err(context: &str, error: sqlx::Error) -> MarketError {
    MarketError::Database(format!("{context}: {error}"))
}

pub(crate) fn sqlstate(error: &sqlx::Error) -> Option<String> {
    match error {
        sqlx::Error::Database(db) => db.code().map(|c| c.to_string()),
        _ => None,
    }
}

pub(crate) fn is_insufficient_funds(error: &sqlx::Error) -> bool {
    sqlstate(error).as_deref() == Some(INSUFFICIENT_FUNDS_SQLSTATE)
}

pub(crate) fn is_unique_violation(error: &sqlx::Error) -> bool {
    sqlstate(error).as_deref() == Some(UNIQUE_VIOLATION_SQLSTATE)
}

pub(crate) fn parse_status<T>(
    parse: impl Fn(&str) -> Option<T>,
    raw: &str,
    column: &str,
) -> Result<T> {
    parse(raw).ok_or_else(|| MarketError::Database(format!("invalid {column} value '{raw}'")))
}
