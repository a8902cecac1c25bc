//! Calendar arithmetic in the fixed reference timezone shared by streaks and analytics.

use chrono::{DateTime, Datelike, Days, FixedOffset, NaiveDate, NaiveTime, Offset, Timelike, Utc};

use super::xp_policy::{CalendarPolicy, PolicyError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceCalendar {
    offset: FixedOffset,
}

impl Default for ReferenceCalendar {
    fn default() -> Self {
        Self { offset: Utc.fix() }
    }
}

impl ReferenceCalendar {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn from_policy(policy: &CalendarPolicy) -> Result<Self, PolicyError> {
        FixedOffset::east_opt(policy.utc_offset_minutes * 60)
            .map(Self::new)
            .ok_or_else(|| {
                PolicyError::Invalid(format!(
                    "calendar.utc_offset_minutes {} is not a valid offset",
                    policy.utc_offset_minutes
                ))
            })
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }

    pub fn local_hour(&self, at: DateTime<Utc>) -> u32 {
        at.with_timezone(&self.offset).hour()
    }

    /// UTC instant at which local `date` begins
    pub fn start_of_day(&self, date: NaiveDate) -> DateTime<Utc> {
        let local_midnight = date.and_time(NaiveTime::MIN);
        (local_midnight - chrono::Duration::seconds(i64::from(self.offset.local_minus_utc())))
            .and_utc()
    }

    /// Half-open UTC range `[start, end)` covering local dates `first..=last`
    pub fn range_for_dates(&self, first: NaiveDate, last: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.start_of_day(first), self.start_of_day(next_day(last)))
    }
}

pub fn next_day(date: NaiveDate) -> NaiveDate {
    date.checked_add_days(Days::new(1)).unwrap_or(date)
}

pub fn previous_day(date: NaiveDate) -> NaiveDate {
    date.checked_sub_days(Days::new(1)).unwrap_or(date)
}

/// Monday of the ISO week containing `date`
pub fn iso_week_start(date: NaiveDate) -> NaiveDate {
    let back = u64::from(date.weekday().num_days_from_monday());
    date.checked_sub_days(Days::new(back)).unwrap_or(date)
}

/// Sunday of the ISO week containing `date`
pub fn iso_week_end(date: NaiveDate) -> NaiveDate {
    iso_week_start(date)
        .checked_add_days(Days::new(6))
        .unwrap_or(date)
}

/// First and last day of the calendar month containing `date`
pub fn month_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = date.with_day(1).unwrap_or(date);
    let next_month_first = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
    };
    let last = next_month_first.map(previous_day).unwrap_or(first);
    (first, last)
}

/// Inclusive iterator over `first..=last`
pub fn days_between(first: NaiveDate, last: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    first.iter_days().take_while(move |day| *day <= last)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_local_date_respects_offset() {
        let calendar = ReferenceCalendar::new(FixedOffset::east_opt(-5 * 3600).unwrap());
        let at = Utc.with_ymd_and_hms(2026, 3, 10, 3, 30, 0).unwrap();

        assert_eq!(calendar.local_date(at), date(2026, 3, 9));
        assert_eq!(calendar.local_hour(at), 22);
        assert_eq!(ReferenceCalendar::default().local_date(at), date(2026, 3, 10));
    }

    #[test]
    fn test_start_of_day_is_local_midnight() {
        let calendar = ReferenceCalendar::new(FixedOffset::east_opt(2 * 3600).unwrap());
        assert_eq!(
            calendar.start_of_day(date(2026, 6, 1)),
            Utc.with_ymd_and_hms(2026, 5, 31, 22, 0, 0).unwrap()
        );

        let (start, end) = calendar.range_for_dates(date(2026, 6, 1), date(2026, 6, 7));
        assert_eq!(end - start, chrono::Duration::days(7));
    }

    #[test]
    fn test_iso_week_bounds() {
        // 2026-10-15 is a Thursday
        assert_eq!(iso_week_start(date(2026, 10, 15)), date(2026, 10, 12));
        assert_eq!(iso_week_end(date(2026, 10, 15)), date(2026, 10, 18));
        assert_eq!(iso_week_start(date(2026, 10, 12)), date(2026, 10, 12));
        assert_eq!(iso_week_end(date(2026, 10, 18)), date(2026, 10, 18));
    }

    #[test]
    fn test_month_bounds() {
        assert_eq!(month_bounds(date(2026, 2, 14)), (date(2026, 2, 1), date(2026, 2, 28)));
        assert_eq!(month_bounds(date(2028, 2, 14)), (date(2028, 2, 1), date(2028, 2, 29)));
        assert_eq!(month_bounds(date(2026, 12, 31)), (date(2026, 12, 1), date(2026, 12, 31)));
    }

    #[test]
    fn test_days_between_is_inclusive() {
        let days: Vec<_> = days_between(date(2026, 1, 30), date(2026, 2, 2)).collect();
        assert_eq!(days.len(), 4);
        assert_eq!(days[0], date(2026, 1, 30));
        assert_eq!(days[3], date(2026, 2, 2));
    }
}
