//! # Activity Log Repository
//!
//! Append-only audit trail. Engines append inside the same transaction as
//! the mutation they describe, so an entry exists iff the operation
//! committed.

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::debug;

use crate::error::DbResult;
use meridian_core::ActivityEntry;

/// Repository for the activity log.
#[derive(Debug, Clone)]
pub struct ActivityRepository {
    pool: SqlitePool,
}

impl ActivityRepository {
    /// Creates a new ActivityRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ActivityRepository { pool }
    }

    /// Appends an entry outside any transaction (standalone events like
    /// settings edits).
    pub async fn append(&self, user_id: i64, action: &str) -> DbResult<ActivityEntry> {
        let now = Utc::now();
        debug!(user_id = %user_id, action = %action, "Recording activity");

        let result =
            sqlx::query("INSERT INTO activity_log (user_id, action, created_at) VALUES (?1, ?2, ?3)")
                .bind(user_id)
                .bind(action)
                .bind(now)
                .execute(&self.pool)
                .await?;

        Ok(ActivityEntry {
            id: result.last_insert_rowid(),
            user_id,
            action: action.to_string(),
            created_at: now,
        })
    }

    /// Lists entries, newest first, paged.
    pub async fn list_recent(&self, limit: u32, offset: u32) -> DbResult<Vec<ActivityEntry>> {
        let entries = sqlx::query_as::<_, ActivityEntry>(
            r#"
            SELECT id, user_id, action, created_at
            FROM activity_log
            ORDER BY created_at DESC, id DESC
            LIMIT ?1 OFFSET ?2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}

/// Appends an entry within a caller-owned transaction.
///
/// Used by the engines so the audit entry commits or rolls back with the
/// operation it records.
pub(crate) async fn append_in_tx(
    tx: &mut Transaction<'_, Sqlite>,
    user_id: i64,
    action: &str,
    at: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query("INSERT INTO activity_log (user_id, action, created_at) VALUES (?1, ?2, ?3)")
        .bind(user_id)
        .bind(action)
        .bind(at)
        .execute(&mut **tx)
        .await?;

    Ok(())
}
