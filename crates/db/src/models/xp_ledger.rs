use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, Type};
use strum_macros::{Display, EnumIter, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use super::completion_event::EventKind;

/// Coarse analytics bucket for an award
#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, Hash, TS, EnumString, Display, EnumIter,
)]
#[sqlx(type_name = "xp_category", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum XpCategory {
    Routine,
    Task,
    Health,
    Focus,
    Habit,
}

/// Immutable ledger row, one per accepted award
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, TS)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_id: String,
    pub kind: EventKind,
    pub total_xp: i64,
    pub category: XpCategory,
    pub occurred_at: DateTime<Utc>,
    pub inserted_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub user_id: Uuid,
    pub event_id: String,
    pub kind: EventKind,
    pub total_xp: i64,
    pub category: XpCategory,
    pub occurred_at: DateTime<Utc>,
}

const LEDGER_COLUMNS: &str =
    "id, user_id, event_id, kind, total_xp, category, occurred_at, inserted_at";

impl LedgerEntry {
    pub async fn exists<'e, E>(
        executor: E,
        user_id: Uuid,
        event_id: &str,
    ) -> Result<bool, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM xp_ledger_entries WHERE user_id = $1 AND event_id = $2",
        )
        .bind(user_id)
        .bind(event_id)
        .fetch_one(executor)
        .await?;
        Ok(count > 0)
    }

    /// Insert a ledger row. Fails with a unique violation if `(user_id, event_id)` exists.
    pub async fn create<'e, E>(executor: E, data: &NewLedgerEntry) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let id = Uuid::new_v4();
        sqlx::query_as::<_, LedgerEntry>(&format!(
            r#"INSERT INTO xp_ledger_entries (id, user_id, event_id, kind, total_xp, category, occurred_at, occurred_at_ms)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
               RETURNING {LEDGER_COLUMNS}"#
        ))
        .bind(id)
        .bind(data.user_id)
        .bind(&data.event_id)
        .bind(data.kind)
        .bind(data.total_xp)
        .bind(data.category)
        .bind(data.occurred_at)
        .bind(data.occurred_at.timestamp_millis())
        .fetch_one(executor)
        .await
    }

    /// All rows for a user in insertion order
    pub async fn find_by_user_id<'e, E>(executor: E, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, LedgerEntry>(&format!(
            r#"SELECT {LEDGER_COLUMNS}
               FROM xp_ledger_entries
               WHERE user_id = $1
               ORDER BY rowid ASC"#
        ))
        .bind(user_id)
        .fetch_all(executor)
        .await
    }

    /// Rows whose `occurred_at` lies in `[start, end)`, oldest first
    pub async fn find_in_range<'e, E>(
        executor: E,
        user_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, LedgerEntry>(&format!(
            r#"SELECT {LEDGER_COLUMNS}
               FROM xp_ledger_entries
               WHERE user_id = $1
                 AND occurred_at_ms >= $2
                 AND occurred_at_ms < $3
               ORDER BY occurred_at_ms ASC, rowid ASC"#
        ))
        .bind(user_id)
        .bind(start.timestamp_millis())
        .bind(end.timestamp_millis())
        .fetch_all(executor)
        .await
    }

    /// Most recently inserted rows first
    pub async fn find_recent<'e, E>(
        executor: E,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, LedgerEntry>(&format!(
            r#"SELECT {LEDGER_COLUMNS}
               FROM xp_ledger_entries
               WHERE user_id = $1
               ORDER BY rowid DESC
               LIMIT $2"#
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(executor)
        .await
    }

    pub async fn count_by_user_id<'e, E>(executor: E, user_id: Uuid) -> Result<i64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM xp_ledger_entries WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(executor)
            .await
    }
}
