//! Append-only XP ledger and the derived per-user progress it maintains.

use std::{collections::BTreeSet, sync::Arc};

use chrono::NaiveDate;
use dashmap::DashMap;
use db::{
    DBService,
    models::{
        completion_event::CompletionEvent,
        user_progress::UserProgress,
        xp_ledger::{LedgerEntry, NewLedgerEntry},
    },
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    xp_analytics::{longest_run, run_ending_at},
    xp_calendar::ReferenceCalendar,
    xp_policy::LevelCurve,
    xp_rules::{ValidationError, XpAward, XpRuleEngine},
};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("event {event_id} already recorded for user {user_id}")]
    DuplicateEvent { user_id: Uuid, event_id: String },
    #[error("storage failure: {0}")]
    Storage(#[from] sqlx::Error),
}

impl LedgerError {
    /// Replays of an already recorded event are expected and safe to ignore
    pub fn is_duplicate(&self) -> bool {
        matches!(self, LedgerError::DuplicateEvent { .. })
    }
}

/// Where a lifetime XP total sits on the level curve
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelInfo {
    pub level: i64,
    pub total_xp: i64,
    pub level_floor_xp: i64,
    pub next_level_xp: i64,
    pub xp_into_level: i64,
    pub xp_to_next_level: i64,
}

impl LevelInfo {
    pub fn for_total(total_xp: i64, curve: &LevelCurve) -> Self {
        let level = curve.level_for(total_xp);
        let level_floor_xp = curve.threshold(level);
        let next_level_xp = curve.threshold(level + 1);
        Self {
            level,
            total_xp,
            level_floor_xp,
            next_level_xp,
            xp_into_level: total_xp - level_floor_xp,
            xp_to_next_level: (next_level_xp - total_xp).max(0),
        }
    }
}

/// Fold one accepted award into `progress`.
///
/// Streaks count distinct local days: same day keeps the streak, the next day
/// extends it, a gap of two or more days restarts it at 1. A back-dated award
/// adds XP only; callers re-derive the streak with [`apply_streaks`].
pub fn advance_progress(
    progress: &UserProgress,
    day: NaiveDate,
    xp: i64,
    curve: &LevelCurve,
) -> UserProgress {
    let mut next = progress.clone();
    next.total_xp_lifetime = progress.total_xp_lifetime.saturating_add(xp);
    next.current_level = curve.level_for(next.total_xp_lifetime);

    match progress.last_event_date {
        None => {
            next.current_streak_days = 1;
            next.last_event_date = Some(day);
        }
        Some(last) => match (day - last).num_days() {
            0 => next.current_streak_days = progress.current_streak_days.max(1),
            1 => {
                next.current_streak_days = progress.current_streak_days + 1;
                next.last_event_date = Some(day);
            }
            gap if gap >= 2 => {
                next.current_streak_days = 1;
                next.last_event_date = Some(day);
            }
            _ => {}
        },
    }

    next.longest_streak_days = progress.longest_streak_days.max(next.current_streak_days);
    next
}

/// Set both streak counters from the distinct active local days. The current
/// streak is the run ending on `last_event_date`.
pub fn apply_streaks(progress: &mut UserProgress, active_days: &BTreeSet<NaiveDate>) {
    progress.current_streak_days = progress
        .last_event_date
        .map_or(0, |last| run_ending_at(active_days, last));
    progress.longest_streak_days = longest_run(active_days);
}

fn active_days(entries: &[LedgerEntry], calendar: &ReferenceCalendar) -> BTreeSet<NaiveDate> {
    entries
        .iter()
        .map(|entry| calendar.local_date(entry.occurred_at))
        .collect()
}

/// Replay ledger rows, in insertion order, from an empty progress
pub fn replay_progress(
    user_id: Uuid,
    entries: &[LedgerEntry],
    calendar: &ReferenceCalendar,
    curve: &LevelCurve,
) -> UserProgress {
    let mut progress = entries
        .iter()
        .fold(UserProgress::empty(user_id), |progress, entry| {
            advance_progress(
                &progress,
                calendar.local_date(entry.occurred_at),
                entry.total_xp,
                curve,
            )
        });
    if !entries.is_empty() {
        apply_streaks(&mut progress, &active_days(entries, calendar));
    }
    progress
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation())
}

/// Sole writer of the XP ledger. Writes for one user are serialised; different
/// users proceed independently.
#[derive(Clone)]
pub struct ProgressLedger {
    db: DBService,
    engine: XpRuleEngine,
    user_locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
}

impl ProgressLedger {
    pub fn new(db: DBService, engine: XpRuleEngine) -> Self {
        Self {
            db,
            engine,
            user_locks: Arc::new(DashMap::new()),
        }
    }

    pub fn engine(&self) -> &XpRuleEngine {
        &self.engine
    }

    fn user_lock(&self, user_id: Uuid) -> Arc<Mutex<()>> {
        self.user_locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }

    /// Drop the map's lock once only the map and `lock` still reference it
    fn release_user_lock(&self, user_id: Uuid, lock: Arc<Mutex<()>>) {
        self.user_locks
            .remove_if(&user_id, |_, held| Arc::ptr_eq(held, &lock) && Arc::strong_count(held) == 2);
    }

    /// Score and record a completion event in one step
    pub async fn record_event(
        &self,
        event: &CompletionEvent,
    ) -> Result<(XpAward, LedgerEntry), LedgerError> {
        let award = self.engine.compute(event)?;
        let entry = self.record(event.user_id, &award).await?;
        Ok((award, entry))
    }

    /// Append `award` for `user_id` and update the user's progress in the same
    /// transaction. Rejects an already recorded `(user_id, event_id)`.
    pub async fn record(&self, user_id: Uuid, award: &XpAward) -> Result<LedgerEntry, LedgerError> {
        if !award.is_consistent() {
            return Err(ValidationError::InconsistentAward {
                event_id: award.event_id.clone(),
            }
            .into());
        }

        let lock = self.user_lock(user_id);
        let result = {
            let _guard = lock.lock().await;
            self.record_locked(user_id, award).await
        };
        self.release_user_lock(user_id, lock);
        result
    }

    async fn record_locked(&self, user_id: Uuid, award: &XpAward) -> Result<LedgerEntry, LedgerError> {
        let mut tx = self.db.pool.begin_with("BEGIN IMMEDIATE").await?;

        if LedgerEntry::exists(&mut *tx, user_id, &award.event_id).await? {
            debug!(
                user_id = %user_id,
                event_id = %award.event_id,
                "XP ledger: duplicate event ignored"
            );
            return Err(LedgerError::DuplicateEvent {
                user_id,
                event_id: award.event_id.clone(),
            });
        }

        let new_entry = NewLedgerEntry {
            user_id,
            event_id: award.event_id.clone(),
            kind: award.kind,
            total_xp: i64::from(award.total_xp),
            category: award.category,
            occurred_at: award.occurred_at,
        };

        let entry = match LedgerEntry::create(&mut *tx, &new_entry).await {
            Ok(entry) => entry,
            Err(e) if is_unique_violation(&e) => {
                return Err(LedgerError::DuplicateEvent {
                    user_id,
                    event_id: award.event_id.clone(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let previous = UserProgress::find_by_user_id(&mut *tx, user_id)
            .await?
            .unwrap_or_else(|| UserProgress::empty(user_id));
        let day = self.engine.calendar().local_date(entry.occurred_at);
        let mut progress =
            advance_progress(&previous, day, entry.total_xp, &self.engine.policy().levels);
        if previous.last_event_date.is_some_and(|last| day < last) {
            let entries = LedgerEntry::find_by_user_id(&mut *tx, user_id).await?;
            apply_streaks(&mut progress, &active_days(&entries, &self.engine.calendar()));
        }
        UserProgress::upsert(&mut *tx, &progress).await?;

        tx.commit().await?;

        info!(
            user_id = %user_id,
            event_id = %entry.event_id,
            xp = entry.total_xp,
            category = %entry.category,
            total_xp = progress.total_xp_lifetime,
            level = progress.current_level,
            streak = progress.current_streak_days,
            "XP ledger: award recorded"
        );

        if progress.current_level > previous.current_level {
            info!(
                user_id = %user_id,
                level = progress.current_level,
                "XP ledger: level up"
            );
        }

        Ok(entry)
    }

    /// Latest committed progress; a user with no awards gets zeroed progress
    pub async fn get_user_progress(&self, user_id: Uuid) -> Result<UserProgress, LedgerError> {
        Ok(UserProgress::find_by_user_id(&self.db.pool, user_id)
            .await?
            .unwrap_or_else(|| UserProgress::empty(user_id)))
    }

    pub async fn level_info(&self, user_id: Uuid) -> Result<LevelInfo, LedgerError> {
        let progress = self.get_user_progress(user_id).await?;
        Ok(LevelInfo::for_total(
            progress.total_xp_lifetime,
            &self.engine.policy().levels,
        ))
    }

    pub async fn recent_entries(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        Ok(LedgerEntry::find_recent(&self.db.pool, user_id, limit.max(0)).await?)
    }

    /// Discard the derived progress row and rebuild it from the ledger
    pub async fn rebuild_progress(&self, user_id: Uuid) -> Result<UserProgress, LedgerError> {
        let lock = self.user_lock(user_id);
        let result = {
            let _guard = lock.lock().await;
            self.rebuild_locked(user_id).await
        };
        self.release_user_lock(user_id, lock);
        result
    }

    async fn rebuild_locked(&self, user_id: Uuid) -> Result<UserProgress, LedgerError> {
        let mut tx = self.db.pool.begin_with("BEGIN IMMEDIATE").await?;
        let entries = LedgerEntry::find_by_user_id(&mut *tx, user_id).await?;
        let progress = replay_progress(
            user_id,
            &entries,
            &self.engine.calendar(),
            &self.engine.policy().levels,
        );

        if entries.is_empty() {
            UserProgress::delete(&mut *tx, user_id).await?;
        } else {
            UserProgress::upsert(&mut *tx, &progress).await?;
        }
        tx.commit().await?;

        info!(
            user_id = %user_id,
            entries = entries.len(),
            total_xp = progress.total_xp_lifetime,
            "XP ledger: progress rebuilt"
        );

        Ok(progress)
    }
}
