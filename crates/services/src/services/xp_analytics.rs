//! Read-only XP analytics over the ledger.
//!
//! Every summary is a pure function of the ledger rows passed in; the service
//! only decides which rows to load. Windows are local calendar days in the
//! reference timezone. A user with no rows gets zero-valued summaries.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use db::{
    DBService,
    models::{
        xp_ledger::LedgerEntry,
        xp_summary::{
            AwardRecord, CategoryBreakdown, DailyBreakdown, DailyXpSummary, DayRecord, HourBucket,
            MonthRecord, MonthlyXpSummary, PeakProductivityData, PersonalBests, StreakData,
            TrendData, TrendPoint, WeekRecord, WeeklyBreakdown, WeeklyXpSummary,
        },
    },
};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use super::{
    xp_calendar::{
        ReferenceCalendar, days_between, iso_week_end, iso_week_start, month_bounds, previous_day,
    },
    xp_rules::ValidationError,
};

/// Largest window `get_trend_data` will materialise, about ten years
pub const MAX_TREND_DAYS: u32 = 3660;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("storage failure: {0}")]
    Storage(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Copy, Default)]
struct DayTotals {
    xp: i64,
    count: i64,
    by_category: CategoryBreakdown,
}

impl DayTotals {
    fn add(&mut self, entry: &LedgerEntry) {
        self.xp += entry.total_xp;
        self.count += 1;
        self.by_category.add(entry.category, entry.total_xp);
    }
}

fn totals_by_day(entries: &[LedgerEntry], calendar: &ReferenceCalendar) -> BTreeMap<NaiveDate, DayTotals> {
    let mut days: BTreeMap<NaiveDate, DayTotals> = BTreeMap::new();
    for entry in entries {
        days.entry(calendar.local_date(entry.occurred_at))
            .or_default()
            .add(entry);
    }
    days
}

fn sum_range(
    days: &BTreeMap<NaiveDate, DayTotals>,
    first: NaiveDate,
    last: NaiveDate,
) -> DayTotals {
    days.range(first..=last)
        .fold(DayTotals::default(), |mut acc, (_, totals)| {
            acc.xp += totals.xp;
            acc.count += totals.count;
            acc.by_category.merge(&totals.by_category);
            acc
        })
}

fn average(total: i64, days: i64) -> f64 {
    if days <= 0 {
        0.0
    } else {
        total as f64 / days as f64
    }
}

/// Pick the max by `key`, keeping the earliest on ties (input must be ascending)
fn earliest_max<T, K: Ord + Copy>(items: impl IntoIterator<Item = T>, key: impl Fn(&T) -> K) -> Option<T> {
    items.into_iter().fold(None, |best: Option<T>, item| match best {
        Some(b) if key(&b) >= key(&item) => Some(b),
        _ => Some(item),
    })
}

pub fn daily_summary(
    entries: &[LedgerEntry],
    calendar: &ReferenceCalendar,
    date: NaiveDate,
) -> DailyXpSummary {
    let days = totals_by_day(entries, calendar);
    let totals = days.get(&date).copied().unwrap_or_default();
    DailyXpSummary {
        date,
        total_xp: totals.xp,
        event_count: totals.count,
        by_category: totals.by_category,
    }
}

/// ISO week (Monday to Sunday) containing `date`
pub fn weekly_summary(
    entries: &[LedgerEntry],
    calendar: &ReferenceCalendar,
    date: NaiveDate,
) -> WeeklyXpSummary {
    let days = totals_by_day(entries, calendar);
    let week_start = iso_week_start(date);
    let week_end = iso_week_end(date);
    let totals = sum_range(&days, week_start, week_end);

    let daily: Vec<DailyBreakdown> = days_between(week_start, week_end)
        .map(|day| {
            let t = days.get(&day).copied().unwrap_or_default();
            DailyBreakdown {
                date: day,
                total_xp: t.xp,
                event_count: t.count,
            }
        })
        .collect();
    let active_days = daily.iter().filter(|d| d.event_count > 0).count() as i64;
    let iso = date.iso_week();

    WeeklyXpSummary {
        iso_year: iso.year(),
        iso_week: iso.week(),
        week_start,
        week_end,
        total_xp: totals.xp,
        event_count: totals.count,
        active_days,
        average_daily_xp: average(totals.xp, 7),
        by_category: totals.by_category,
        daily,
    }
}

/// Calendar month containing `date`, broken down by ISO week
pub fn monthly_summary(
    entries: &[LedgerEntry],
    calendar: &ReferenceCalendar,
    date: NaiveDate,
) -> MonthlyXpSummary {
    let days = totals_by_day(entries, calendar);
    let (month_start, month_end) = month_bounds(date);
    let totals = sum_range(&days, month_start, month_end);

    let mut weekly = Vec::new();
    let mut week_start = iso_week_start(month_start);
    while week_start <= month_end {
        let start = week_start.max(month_start);
        let end = iso_week_end(week_start).min(month_end);
        let t = sum_range(&days, start, end);
        weekly.push(WeeklyBreakdown {
            iso_week: week_start.iso_week().week(),
            start,
            end,
            total_xp: t.xp,
            event_count: t.count,
        });
        match week_start.checked_add_days(Days::new(7)) {
            Some(next) => week_start = next,
            None => break,
        }
    }

    let in_month: Vec<(NaiveDate, DayTotals)> = days
        .range(month_start..=month_end)
        .map(|(d, t)| (*d, *t))
        .collect();
    let active_days = in_month.iter().filter(|(_, t)| t.count > 0).count() as i64;
    let best_day = earliest_max(in_month, |(_, t)| t.xp).map(|(date, t)| DayRecord {
        date,
        total_xp: t.xp,
    });
    let days_in_month = (month_end - month_start).num_days() + 1;

    MonthlyXpSummary {
        year: month_start.year(),
        month: month_start.month(),
        month_start,
        month_end,
        total_xp: totals.xp,
        event_count: totals.count,
        active_days,
        average_daily_xp: average(totals.xp, days_in_month),
        by_category: totals.by_category,
        weekly,
        best_day,
    }
}

/// Exactly `days` consecutive points ending at `end`; inactive days are zero
pub fn trend(
    entries: &[LedgerEntry],
    calendar: &ReferenceCalendar,
    days: u32,
    end: NaiveDate,
) -> TrendData {
    let totals = totals_by_day(entries, calendar);
    let start = end
        .checked_sub_days(Days::new(u64::from(days.saturating_sub(1))))
        .unwrap_or(end);

    let points: Vec<TrendPoint> = days_between(start, end)
        .map(|date| {
            let t = totals.get(&date).copied().unwrap_or_default();
            TrendPoint {
                date,
                total_xp: t.xp,
                by_category: t.by_category,
            }
        })
        .collect();
    let total_xp = points.iter().map(|p| p.total_xp).sum();

    TrendData {
        days,
        start_date: start,
        end_date: end,
        total_xp,
        average_daily_xp: average(total_xp, i64::from(days)),
        points,
    }
}

pub(crate) fn longest_run(days: &BTreeSet<NaiveDate>) -> i64 {
    let mut longest = 0;
    let mut run = 0;
    let mut previous: Option<NaiveDate> = None;
    for day in days {
        run = match previous {
            Some(p) if (*day - p).num_days() == 1 => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(*day);
    }
    longest
}

/// Consecutive active days ending on `last`, zero if `last` is inactive
pub(crate) fn run_ending_at(days: &BTreeSet<NaiveDate>, last: NaiveDate) -> i64 {
    let mut run = 0;
    let mut day = last;
    while days.contains(&day) {
        run += 1;
        let before = previous_day(day);
        if before == day {
            break;
        }
        day = before;
    }
    run
}

pub fn personal_bests(entries: &[LedgerEntry], calendar: &ReferenceCalendar) -> PersonalBests {
    let days = totals_by_day(entries, calendar);
    if days.is_empty() {
        return PersonalBests::default();
    }

    let best_day = earliest_max(days.iter(), |(_, t)| t.xp).map(|(date, t)| DayRecord {
        date: *date,
        total_xp: t.xp,
    });

    let mut weeks: BTreeMap<NaiveDate, i64> = BTreeMap::new();
    let mut months: BTreeMap<(i32, u32), i64> = BTreeMap::new();
    for (date, t) in &days {
        *weeks.entry(iso_week_start(*date)).or_default() += t.xp;
        *months.entry((date.year(), date.month())).or_default() += t.xp;
    }
    let best_week = earliest_max(weeks, |(_, xp)| *xp).map(|(week_start, total_xp)| WeekRecord {
        week_start,
        total_xp,
    });
    let best_month =
        earliest_max(months, |(_, xp)| *xp).map(|((year, month), total_xp)| MonthRecord {
            year,
            month,
            total_xp,
        });

    let mut chronological: Vec<&LedgerEntry> = entries.iter().collect();
    chronological.sort_by_key(|e| e.occurred_at);
    let largest_award = earliest_max(chronological, |e| e.total_xp).map(|e| AwardRecord {
        event_id: e.event_id.clone(),
        total_xp: e.total_xp,
        category: e.category,
        occurred_at: e.occurred_at,
    });

    let active: BTreeSet<NaiveDate> = days.keys().copied().collect();

    PersonalBests {
        best_day,
        best_week,
        best_month,
        largest_award,
        longest_streak_days: longest_run(&active),
        total_active_days: active.len() as i64,
    }
}

/// Streak as seen on `as_of`. Activity after `as_of` is ignored.
pub fn streak_data(
    entries: &[LedgerEntry],
    calendar: &ReferenceCalendar,
    as_of: NaiveDate,
) -> StreakData {
    let active: BTreeSet<NaiveDate> = entries
        .iter()
        .map(|e| calendar.local_date(e.occurred_at))
        .filter(|d| *d <= as_of)
        .collect();

    let active_today = active.contains(&as_of);
    let yesterday = previous_day(as_of);
    let anchor = if active_today {
        Some(as_of)
    } else if active.contains(&yesterday) {
        Some(yesterday)
    } else {
        None
    };

    StreakData {
        current_streak_days: anchor.map_or(0, |day| run_ending_at(&active, day)),
        longest_streak_days: longest_run(&active),
        last_active_date: active.iter().next_back().copied(),
        active_today,
    }
}

/// Hour-of-day buckets; the peak is the highest mean XP, earliest hour on ties
pub fn peak_productivity(entries: &[LedgerEntry], calendar: &ReferenceCalendar) -> PeakProductivityData {
    let mut totals = [(0i64, 0i64); 24];
    for entry in entries {
        let hour = calendar.local_hour(entry.occurred_at) as usize;
        totals[hour].0 += entry.total_xp;
        totals[hour].1 += 1;
    }

    let hours: Vec<HourBucket> = totals
        .iter()
        .enumerate()
        .map(|(hour, (xp, count))| HourBucket {
            hour: hour as u32,
            total_xp: *xp,
            event_count: *count,
            mean_xp: average(*xp, *count),
        })
        .collect();

    // Compare means exactly: a/b vs c/d  <=>  a*d vs c*b
    let mut best: Option<(i64, i64)> = None;
    let mut peak_hours: Vec<u32> = Vec::new();
    for bucket in hours.iter().filter(|b| b.event_count > 0) {
        let candidate = (bucket.total_xp, bucket.event_count);
        let ordering = match best {
            None => std::cmp::Ordering::Greater,
            Some((xp, count)) => (i128::from(candidate.0) * i128::from(count))
                .cmp(&(i128::from(xp) * i128::from(candidate.1))),
        };
        match ordering {
            std::cmp::Ordering::Greater => {
                best = Some(candidate);
                peak_hours = vec![bucket.hour];
            }
            std::cmp::Ordering::Equal => peak_hours.push(bucket.hour),
            std::cmp::Ordering::Less => {}
        }
    }

    PeakProductivityData {
        peak_hour: peak_hours.first().copied(),
        peak_mean_xp: best.map(|(xp, count)| average(xp, count)).unwrap_or(0.0),
        peak_hours,
        hours,
    }
}

/// Read side of the XP ledger
#[derive(Clone)]
pub struct XpAnalyticsService {
    db: DBService,
    calendar: ReferenceCalendar,
}

impl XpAnalyticsService {
    pub fn new(db: DBService, calendar: ReferenceCalendar) -> Self {
        Self { db, calendar }
    }

    async fn load_dates(
        &self,
        user_id: Uuid,
        first: NaiveDate,
        last: NaiveDate,
    ) -> Result<Vec<LedgerEntry>, AnalyticsError> {
        let (start, end) = self.calendar.range_for_dates(first, last);
        let entries = LedgerEntry::find_in_range(&self.db.pool, user_id, start, end).await?;
        debug!(
            user_id = %user_id,
            %first,
            %last,
            rows = entries.len(),
            "XP analytics: loaded ledger window"
        );
        Ok(entries)
    }

    async fn load_all(&self, user_id: Uuid) -> Result<Vec<LedgerEntry>, AnalyticsError> {
        let entries = LedgerEntry::find_by_user_id(&self.db.pool, user_id).await?;
        debug!(user_id = %user_id, rows = entries.len(), "XP analytics: loaded full ledger");
        Ok(entries)
    }

    pub async fn get_today_data(
        &self,
        user_id: Uuid,
        as_of: DateTime<Utc>,
    ) -> Result<DailyXpSummary, AnalyticsError> {
        let date = self.calendar.local_date(as_of);
        let entries = self.load_dates(user_id, date, date).await?;
        Ok(daily_summary(&entries, &self.calendar, date))
    }

    pub async fn get_weekly_data(
        &self,
        user_id: Uuid,
        as_of: DateTime<Utc>,
    ) -> Result<WeeklyXpSummary, AnalyticsError> {
        let date = self.calendar.local_date(as_of);
        let entries = self
            .load_dates(user_id, iso_week_start(date), iso_week_end(date))
            .await?;
        Ok(weekly_summary(&entries, &self.calendar, date))
    }

    pub async fn get_monthly_data(
        &self,
        user_id: Uuid,
        as_of: DateTime<Utc>,
    ) -> Result<MonthlyXpSummary, AnalyticsError> {
        let date = self.calendar.local_date(as_of);
        let (first, last) = month_bounds(date);
        let entries = self.load_dates(user_id, first, last).await?;
        Ok(monthly_summary(&entries, &self.calendar, date))
    }

    /// `days` must be within `1..=MAX_TREND_DAYS`
    pub async fn get_trend_data(
        &self,
        user_id: Uuid,
        days: i64,
        as_of: DateTime<Utc>,
    ) -> Result<TrendData, AnalyticsError> {
        let window = u32::try_from(days)
            .ok()
            .filter(|d| (1..=MAX_TREND_DAYS).contains(d))
            .ok_or(ValidationError::InvalidTrendWindow(days))?;

        let end = self.calendar.local_date(as_of);
        let start = end
            .checked_sub_days(Days::new(u64::from(window - 1)))
            .ok_or(ValidationError::InvalidTrendWindow(days))?;
        let entries = self.load_dates(user_id, start, end).await?;
        Ok(trend(&entries, &self.calendar, window, end))
    }

    pub async fn get_personal_bests(&self, user_id: Uuid) -> Result<PersonalBests, AnalyticsError> {
        let entries = self.load_all(user_id).await?;
        Ok(personal_bests(&entries, &self.calendar))
    }

    pub async fn get_streak_data(
        &self,
        user_id: Uuid,
        as_of: DateTime<Utc>,
    ) -> Result<StreakData, AnalyticsError> {
        let entries = self.load_all(user_id).await?;
        Ok(streak_data(&entries, &self.calendar, self.calendar.local_date(as_of)))
    }

    pub async fn get_peak_productivity_data(
        &self,
        user_id: Uuid,
    ) -> Result<PeakProductivityData, AnalyticsError> {
        let entries = self.load_all(user_id).await?;
        Ok(peak_productivity(&entries, &self.calendar))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, FixedOffset, TimeZone};
    use db::models::{
        completion_event::{CompletionEvent, EventKind},
        xp_ledger::XpCategory,
    };

    use super::*;
    use crate::services::{progress_ledger::ProgressLedger, xp_policy::XpPolicy, xp_rules::XpRuleEngine};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn entry(event_id: &str, occurred_at: DateTime<Utc>, xp: i64, category: XpCategory) -> LedgerEntry {
        LedgerEntry {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            event_id: event_id.to_string(),
            kind: EventKind::LightTask,
            total_xp: xp,
            category,
            occurred_at,
            inserted_at: occurred_at,
        }
    }

    #[test]
    fn test_daily_summary_groups_by_category() {
        let calendar = ReferenceCalendar::default();
        let entries = vec![
            entry("a", at(2026, 10, 19, 8), 15, XpCategory::Task),
            entry("b", at(2026, 10, 19, 9), 45, XpCategory::Focus),
            entry("c", at(2026, 10, 19, 22), 10, XpCategory::Task),
            entry("d", at(2026, 10, 18, 23), 99, XpCategory::Task),
        ];

        let summary = daily_summary(&entries, &calendar, date(2026, 10, 19));
        assert_eq!(summary.total_xp, 70);
        assert_eq!(summary.event_count, 3);
        assert_eq!(summary.by_category.task, 25);
        assert_eq!(summary.by_category.focus, 45);
        assert_eq!(summary.by_category.total(), summary.total_xp);
    }

    #[test]
    fn test_daily_summary_uses_reference_timezone() {
        // 23:00 UTC on the 18th is already the 19th at UTC+2
        let calendar = ReferenceCalendar::new(FixedOffset::east_opt(2 * 3600).unwrap());
        let entries = vec![entry("late", at(2026, 10, 18, 23), 20, XpCategory::Habit)];

        assert_eq!(daily_summary(&entries, &calendar, date(2026, 10, 19)).total_xp, 20);
        assert_eq!(daily_summary(&entries, &calendar, date(2026, 10, 18)).total_xp, 0);
    }

    #[test]
    fn test_weekly_summary_has_seven_days() {
        let calendar = ReferenceCalendar::default();
        let entries = vec![
            entry("mon", at(2026, 10, 12, 9), 10, XpCategory::Habit),
            entry("thu", at(2026, 10, 15, 9), 30, XpCategory::Task),
            entry("sun", at(2026, 10, 18, 9), 30, XpCategory::Focus),
            entry("next-mon", at(2026, 10, 19, 9), 500, XpCategory::Focus),
        ];

        let summary = weekly_summary(&entries, &calendar, date(2026, 10, 15));
        assert_eq!(summary.week_start, date(2026, 10, 12));
        assert_eq!(summary.week_end, date(2026, 10, 18));
        assert_eq!(summary.iso_week, 42);
        assert_eq!(summary.daily.len(), 7);
        assert_eq!(summary.total_xp, 70);
        assert_eq!(summary.active_days, 3);
        assert_eq!(summary.daily[3].total_xp, 30);
        assert_eq!(summary.daily[1].total_xp, 0);
        assert!((summary.average_daily_xp - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_monthly_summary_clips_weeks_to_month() {
        let calendar = ReferenceCalendar::default();
        let entries = vec![
            entry("a", at(2026, 3, 1, 9), 10, XpCategory::Routine),
            entry("b", at(2026, 3, 2, 9), 20, XpCategory::Task),
            entry("c", at(2026, 3, 2, 10), 20, XpCategory::Task),
            entry("d", at(2026, 3, 31, 9), 40, XpCategory::Focus),
            entry("e", at(2026, 2, 28, 9), 1000, XpCategory::Focus),
        ];

        let summary = monthly_summary(&entries, &calendar, date(2026, 3, 15));
        assert_eq!(summary.month_start, date(2026, 3, 1));
        assert_eq!(summary.month_end, date(2026, 3, 31));
        assert_eq!(summary.total_xp, 90);
        assert_eq!(summary.active_days, 3);

        // 2026-03-01 is a Sunday: first week is a single clipped day
        let first = &summary.weekly[0];
        assert_eq!((first.start, first.end), (date(2026, 3, 1), date(2026, 3, 1)));
        assert_eq!(first.iso_week, 9);
        assert_eq!(first.total_xp, 10);

        let last = summary.weekly.last().unwrap();
        assert_eq!(last.end, date(2026, 3, 31));
        assert_eq!(last.total_xp, 40);
        assert_eq!(summary.weekly.iter().map(|w| w.total_xp).sum::<i64>(), 90);

        assert_eq!(
            summary.best_day,
            Some(DayRecord {
                date: date(2026, 3, 2),
                total_xp: 40
            })
        );
    }

    #[test]
    fn test_trend_is_fixed_length_with_zero_days() {
        let calendar = ReferenceCalendar::default();
        let end = date(2026, 10, 19);
        let entries = vec![
            entry("a", at(2026, 10, 19, 9), 10, XpCategory::Habit),
            entry("b", at(2026, 10, 5, 9), 25, XpCategory::Task),
            entry("old", at(2026, 8, 1, 9), 999, XpCategory::Task),
        ];

        let data = trend(&entries, &calendar, 30, end);
        assert_eq!(data.points.len(), 30);
        assert_eq!(data.start_date, date(2026, 9, 20));
        assert_eq!(data.points.first().unwrap().date, data.start_date);
        assert_eq!(data.points.last().unwrap().date, end);
        assert_eq!(data.total_xp, 35);
        assert_eq!(data.points.iter().filter(|p| p.total_xp == 0).count(), 28);
        assert_eq!(data.points.last().unwrap().by_category.habit, 10);
    }

    #[test]
    fn test_streak_data_relative_to_as_of() {
        let calendar = ReferenceCalendar::default();
        let entries = vec![
            entry("a", at(2026, 10, 10, 9), 10, XpCategory::Habit),
            entry("b", at(2026, 10, 11, 9), 10, XpCategory::Habit),
            entry("c", at(2026, 10, 12, 9), 10, XpCategory::Habit),
            entry("d", at(2026, 10, 17, 9), 10, XpCategory::Habit),
            entry("e", at(2026, 10, 18, 9), 10, XpCategory::Habit),
        ];

        let yesterday_active = streak_data(&entries, &calendar, date(2026, 10, 19));
        assert_eq!(yesterday_active.current_streak_days, 2);
        assert_eq!(yesterday_active.longest_streak_days, 3);
        assert!(!yesterday_active.active_today);
        assert_eq!(yesterday_active.last_active_date, Some(date(2026, 10, 18)));

        let lapsed = streak_data(&entries, &calendar, date(2026, 10, 20));
        assert_eq!(lapsed.current_streak_days, 0);

        let earlier = streak_data(&entries, &calendar, date(2026, 10, 11));
        assert_eq!(earlier.current_streak_days, 2);
        assert!(earlier.active_today);
        assert_eq!(earlier.last_active_date, Some(date(2026, 10, 11)));
    }

    #[test]
    fn test_peak_productivity_breaks_ties_by_earliest_hour() {
        let calendar = ReferenceCalendar::default();
        let entries = vec![
            entry("a", at(2026, 10, 1, 14), 30, XpCategory::Task),
            entry("b", at(2026, 10, 2, 14), 10, XpCategory::Task),
            entry("c", at(2026, 10, 1, 9), 20, XpCategory::Task),
            entry("d", at(2026, 10, 1, 20), 5, XpCategory::Task),
        ];

        let data = peak_productivity(&entries, &calendar);
        assert_eq!(data.hours.len(), 24);
        assert_eq!(data.hours[14].event_count, 2);
        assert_eq!(data.peak_hours, vec![9, 14]);
        assert_eq!(data.peak_hour, Some(9));
        assert!((data.peak_mean_xp - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_personal_bests() {
        let calendar = ReferenceCalendar::default();
        let entries = vec![
            entry("a", at(2026, 9, 28, 9), 50, XpCategory::Task),
            entry("b", at(2026, 9, 29, 9), 50, XpCategory::Task),
            entry("c", at(2026, 10, 1, 9), 30, XpCategory::Task),
            entry("d", at(2026, 10, 1, 10), 70, XpCategory::Focus),
            entry("e", at(2026, 10, 2, 9), 70, XpCategory::Focus),
        ];

        let bests = personal_bests(&entries, &calendar);
        assert_eq!(
            bests.best_day,
            Some(DayRecord {
                date: date(2026, 10, 1),
                total_xp: 100
            })
        );
        assert_eq!(
            bests.best_week,
            Some(WeekRecord {
                week_start: date(2026, 9, 28),
                total_xp: 270
            })
        );
        assert_eq!(
            bests.best_month,
            Some(MonthRecord {
                year: 2026,
                month: 10,
                total_xp: 170
            })
        );
        assert_eq!(bests.largest_award.unwrap().event_id, "d");
        assert_eq!(bests.longest_streak_days, 2);
        assert_eq!(bests.total_active_days, 4);
    }

    #[test]
    fn test_empty_ledger_yields_zero_values() {
        let calendar = ReferenceCalendar::default();
        let day = date(2026, 10, 19);

        let daily = daily_summary(&[], &calendar, day);
        assert_eq!(daily.total_xp, 0);
        assert_eq!(daily.event_count, 0);
        assert_eq!(daily.by_category, CategoryBreakdown::default());

        assert_eq!(personal_bests(&[], &calendar), PersonalBests::default());
        assert_eq!(streak_data(&[], &calendar, day), StreakData::default());

        let peak = peak_productivity(&[], &calendar);
        assert_eq!(peak.peak_hour, None);
        assert!(peak.peak_hours.is_empty());
        assert!(peak.hours.iter().all(|h| h.event_count == 0 && h.mean_xp == 0.0));

        assert_eq!(weekly_summary(&[], &calendar, day).total_xp, 0);
        assert_eq!(monthly_summary(&[], &calendar, day).best_day, None);
    }

    async fn service() -> (XpAnalyticsService, ProgressLedger) {
        let db = DBService::new_in_memory().await.unwrap();
        let engine = XpRuleEngine::new(XpPolicy::default()).unwrap();
        let analytics = XpAnalyticsService::new(db.clone(), engine.calendar());
        (analytics, ProgressLedger::new(db, engine))
    }

    #[tokio::test]
    async fn test_new_user_gets_zeroed_today_data() {
        let (analytics, _) = service().await;
        let summary = analytics
            .get_today_data(Uuid::new_v4(), at(2026, 10, 19, 12))
            .await
            .unwrap();

        assert_eq!(summary.total_xp, 0);
        assert_eq!(summary.event_count, 0);
        assert_eq!(summary.by_category.total(), 0);
    }

    #[tokio::test]
    async fn test_trend_over_recorded_events() {
        let (analytics, ledger) = service().await;
        let user_id = Uuid::new_v4();
        let now = at(2026, 10, 19, 18);

        for (i, days_ago) in [0i64, 1, 1, 6, 40].into_iter().enumerate() {
            let event = CompletionEvent::new(
                format!("habit-{i}"),
                user_id,
                EventKind::Habit,
                now - Duration::days(days_ago),
            );
            ledger.record_event(&event).await.unwrap();
        }

        let data = analytics.get_trend_data(user_id, 30, now).await.unwrap();
        assert_eq!(data.points.len(), 30);
        assert_eq!(data.total_xp, 40);
        assert_eq!(data.points[29].total_xp, 10);
        assert_eq!(data.points[28].total_xp, 20);

        let today = analytics.get_today_data(user_id, now).await.unwrap();
        assert_eq!(today.by_category.habit, 10);

        let streak = analytics.get_streak_data(user_id, now).await.unwrap();
        assert_eq!(streak.current_streak_days, 2);

        let bests = analytics.get_personal_bests(user_id).await.unwrap();
        assert_eq!(bests.best_day.unwrap().total_xp, 20);
    }

    #[tokio::test]
    async fn test_trend_rejects_out_of_range_window() {
        let (analytics, _) = service().await;
        for days in [0, -3, i64::from(MAX_TREND_DAYS) + 1, 50_000_000] {
            let err = analytics
                .get_trend_data(Uuid::new_v4(), days, at(2026, 10, 19, 12))
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                AnalyticsError::Validation(ValidationError::InvalidTrendWindow(d)) if d == days
            ));
        }
    }

    #[tokio::test]
    async fn test_trend_accepts_largest_window() {
        let (analytics, _) = service().await;
        let data = analytics
            .get_trend_data(Uuid::new_v4(), i64::from(MAX_TREND_DAYS), at(2026, 10, 19, 12))
            .await
            .unwrap();

        assert_eq!(data.points.len(), MAX_TREND_DAYS as usize);
        assert_eq!(data.total_xp, 0);
    }
}
