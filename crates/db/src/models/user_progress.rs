use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite};
use ts_rs::TS;
use uuid::Uuid;

/// Derived per-user aggregate. Recomputable from the ledger at any time.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq, TS)]
pub struct UserProgress {
    pub user_id: Uuid,
    pub total_xp_lifetime: i64,
    pub current_level: i64,
    pub current_streak_days: i64,
    pub longest_streak_days: i64,
    pub last_event_date: Option<NaiveDate>,
}

impl UserProgress {
    /// Progress of a user with no ledger rows
    pub fn empty(user_id: Uuid) -> Self {
        Self {
            user_id,
            total_xp_lifetime: 0,
            current_level: 1,
            current_streak_days: 0,
            longest_streak_days: 0,
            last_event_date: None,
        }
    }

    pub async fn find_by_user_id<'e, E>(
        executor: E,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, UserProgress>(
            r#"SELECT user_id, total_xp_lifetime, current_level, current_streak_days, longest_streak_days, last_event_date
               FROM user_progress
               WHERE user_id = $1"#,
        )
        .bind(user_id)
        .fetch_optional(executor)
        .await
    }

    pub async fn upsert<'e, E>(executor: E, progress: &UserProgress) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query(
            r#"INSERT INTO user_progress (user_id, total_xp_lifetime, current_level, current_streak_days, longest_streak_days, last_event_date)
               VALUES ($1, $2, $3, $4, $5, $6)
               ON CONFLICT(user_id) DO UPDATE SET
                   total_xp_lifetime = excluded.total_xp_lifetime,
                   current_level = excluded.current_level,
                   current_streak_days = excluded.current_streak_days,
                   longest_streak_days = excluded.longest_streak_days,
                   last_event_date = excluded.last_event_date,
                   updated_at = datetime('now', 'subsec')"#,
        )
        .bind(progress.user_id)
        .bind(progress.total_xp_lifetime)
        .bind(progress.current_level)
        .bind(progress.current_streak_days)
        .bind(progress.longest_streak_days)
        .bind(progress.last_event_date)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn delete<'e, E>(executor: E, user_id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM user_progress WHERE user_id = $1")
            .bind(user_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
