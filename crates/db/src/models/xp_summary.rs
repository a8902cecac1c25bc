//! Read models produced by XP analytics. Never persisted; always recomputable
//! from `xp_ledger_entries`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::xp_ledger::XpCategory;

/// XP per category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct CategoryBreakdown {
    pub routine: i64,
    pub task: i64,
    pub health: i64,
    pub focus: i64,
    pub habit: i64,
}

impl CategoryBreakdown {
    pub fn add(&mut self, category: XpCategory, xp: i64) {
        *self.slot_mut(category) += xp;
    }

    pub fn merge(&mut self, other: &CategoryBreakdown) {
        self.routine += other.routine;
        self.task += other.task;
        self.health += other.health;
        self.focus += other.focus;
        self.habit += other.habit;
    }

    pub fn get(&self, category: XpCategory) -> i64 {
        match category {
            XpCategory::Routine => self.routine,
            XpCategory::Task => self.task,
            XpCategory::Health => self.health,
            XpCategory::Focus => self.focus,
            XpCategory::Habit => self.habit,
        }
    }

    pub fn total(&self) -> i64 {
        self.routine + self.task + self.health + self.focus + self.habit
    }

    fn slot_mut(&mut self, category: XpCategory) -> &mut i64 {
        match category {
            XpCategory::Routine => &mut self.routine,
            XpCategory::Task => &mut self.task,
            XpCategory::Health => &mut self.health,
            XpCategory::Focus => &mut self.focus,
            XpCategory::Habit => &mut self.habit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct DailyXpSummary {
    pub date: NaiveDate,
    pub total_xp: i64,
    pub event_count: i64,
    pub by_category: CategoryBreakdown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct DailyBreakdown {
    pub date: NaiveDate,
    pub total_xp: i64,
    pub event_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct WeeklyXpSummary {
    pub iso_year: i32,
    pub iso_week: u32,
    /// Monday
    pub week_start: NaiveDate,
    /// Sunday
    pub week_end: NaiveDate,
    pub total_xp: i64,
    pub event_count: i64,
    pub active_days: i64,
    pub average_daily_xp: f64,
    pub by_category: CategoryBreakdown,
    /// Monday through Sunday, always seven entries
    pub daily: Vec<DailyBreakdown>,
}

/// One ISO week of a month, clipped to the month's bounds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct WeeklyBreakdown {
    pub iso_week: u32,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub total_xp: i64,
    pub event_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct MonthlyXpSummary {
    pub year: i32,
    pub month: u32,
    pub month_start: NaiveDate,
    pub month_end: NaiveDate,
    pub total_xp: i64,
    pub event_count: i64,
    pub active_days: i64,
    pub average_daily_xp: f64,
    pub by_category: CategoryBreakdown,
    pub weekly: Vec<WeeklyBreakdown>,
    pub best_day: Option<DayRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub total_xp: i64,
    pub by_category: CategoryBreakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct TrendData {
    pub days: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_xp: i64,
    pub average_daily_xp: f64,
    /// Oldest first, exactly `days` entries
    pub points: Vec<TrendPoint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct DayRecord {
    pub date: NaiveDate,
    pub total_xp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct WeekRecord {
    pub week_start: NaiveDate,
    pub total_xp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct MonthRecord {
    pub year: i32,
    pub month: u32,
    pub total_xp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct AwardRecord {
    pub event_id: String,
    pub total_xp: i64,
    pub category: XpCategory,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct PersonalBests {
    pub best_day: Option<DayRecord>,
    pub best_week: Option<WeekRecord>,
    pub best_month: Option<MonthRecord>,
    pub largest_award: Option<AwardRecord>,
    pub longest_streak_days: i64,
    pub total_active_days: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct StreakData {
    /// Zero unless the run of active days reaches `as_of` or the day before
    pub current_streak_days: i64,
    pub longest_streak_days: i64,
    pub last_active_date: Option<NaiveDate>,
    pub active_today: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct HourBucket {
    pub hour: u32,
    pub total_xp: i64,
    pub event_count: i64,
    pub mean_xp: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct PeakProductivityData {
    /// Hours 0..=23 in the reference timezone
    pub hours: Vec<HourBucket>,
    /// Earliest of `peak_hours`
    pub peak_hour: Option<u32>,
    /// Every hour sharing the highest mean XP, ascending
    pub peak_hours: Vec<u32>,
    pub peak_mean_xp: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_breakdown_accumulates_per_slot() {
        let mut breakdown = CategoryBreakdown::default();
        breakdown.add(XpCategory::Focus, 40);
        breakdown.add(XpCategory::Focus, 5);
        breakdown.add(XpCategory::Habit, 10);

        assert_eq!(breakdown.get(XpCategory::Focus), 45);
        assert_eq!(breakdown.get(XpCategory::Habit), 10);
        assert_eq!(breakdown.get(XpCategory::Health), 0);
        assert_eq!(breakdown.total(), 55);
    }
}
