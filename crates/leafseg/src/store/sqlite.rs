//! SQLite-backed segment store.
//!
//! One row per tag:
//!
//! ```sql
//! CREATE TABLE segments (
//!     biz_tag     TEXT PRIMARY KEY,
//!     max_id      INTEGER NOT NULL,
//!     step        INTEGER NOT NULL,
//!     description TEXT NOT NULL DEFAULT '',
//!     update_time TEXT NOT NULL DEFAULT (datetime('now'))
//! );
//! ```
//!
//! `advance` runs `UPDATE ... SET max_id = max_id + step` and reads the
//! post-update row back inside the same immediate transaction, so
//! concurrent advancers for one tag serialize on the row write and each
//! commit hands out a disjoint window.

use std::sync::Mutex;
use std::time::Duration;

use rusqlite::{params, Connection, TransactionBehavior};
use tracing::debug;

use crate::{Error, Result, SegmentLease, SegmentStore};

/// Deadline for a single advance transaction. Contention past this bound
/// surfaces as a store error rather than an open-ended stall.
pub const ADVANCE_TIMEOUT: Duration = Duration::from_secs(2);

/// [`SegmentStore`] over a SQLite database.
///
/// The connection is serialized behind a mutex; the busy timeout covers
/// lock waits against other writers of the same database file.
pub struct SqliteSegmentStore {
    conn: Mutex<Connection>,
    table: String,
}

impl SqliteSegmentStore {
    /// Opens (or creates) the database at `dsn` and binds the store to
    /// `table`.
    ///
    /// `dsn` is a filesystem path or `:memory:`. The table name is
    /// interpolated into SQL (it cannot be bound as a parameter) and must
    /// be a bare identifier.
    pub fn open(dsn: &str, table: &str) -> Result<Self> {
        if !is_bare_identifier(table) {
            return Err(Error::InvalidTable {
                table: table.to_string(),
            });
        }
        let conn = Connection::open(dsn)?;
        conn.busy_timeout(ADVANCE_TIMEOUT)?;
        Ok(Self {
            conn: Mutex::new(conn),
            table: table.to_string(),
        })
    }

    /// Creates the segments table if it does not already exist.
    pub fn ensure_schema(&self) -> Result<()> {
        let conn = self.conn.lock()?;
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                biz_tag     TEXT PRIMARY KEY,
                max_id      INTEGER NOT NULL,
                step        INTEGER NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                update_time TEXT NOT NULL DEFAULT (datetime('now'))
            )",
            self.table
        ))?;
        Ok(())
    }

    /// Inserts a tag row if absent; an existing row is left untouched.
    /// `step` is the window size every future advance will grant.
    pub fn seed_tag(&self, tag: &str, max_id: i64, step: i64, description: &str) -> Result<()> {
        let conn = self.conn.lock()?;
        conn.execute(
            &format!(
                "INSERT OR IGNORE INTO {} (biz_tag, max_id, step, description)
                 VALUES (?1, ?2, ?3, ?4)",
                self.table
            ),
            params![tag, max_id, step, description],
        )?;
        Ok(())
    }
}

impl SegmentStore for SqliteSegmentStore {
    fn advance(&self, tag: &str) -> Result<SegmentLease> {
        let mut conn = self.conn.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let updated = tx.execute(
            &format!(
                "UPDATE {} SET max_id = max_id + step, update_time = datetime('now')
                 WHERE biz_tag = ?1",
                self.table
            ),
            params![tag],
        )?;
        if updated == 0 {
            // Dropping the transaction rolls it back.
            return Err(Error::TagNotFound {
                tag: tag.to_string(),
            });
        }

        let lease = tx.query_row(
            &format!("SELECT max_id, step FROM {} WHERE biz_tag = ?1", self.table),
            params![tag],
            |row| {
                Ok(SegmentLease {
                    max_id: row.get(0)?,
                    step: row.get(1)?,
                })
            },
        )?;

        tx.commit()?;
        debug!(tag, max_id = lease.max_id, step = lease.step, "advanced window");
        Ok(lease)
    }
}

fn is_bare_identifier(table: &str) -> bool {
    let mut chars = table.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
