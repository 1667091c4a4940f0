use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, Duration, Local, Months, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

pub const MONTH_GRID_DAYS: usize = 42;
pub const WEEK_STRIP_DAYS: usize = 7;

/// One cell of a month grid or week strip. Derived on every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub is_current_month: bool,
    pub is_today: bool,
}

impl CalendarDay {
    pub fn day_number(&self) -> u32 {
        self.date.day()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarScope {
    Week,
    #[default]
    Month,
}

impl CalendarScope {
    /// Move `reference` by whole months or whole weeks. Month steps clamp the
    /// day to the length of the target month.
    pub fn shift(&self, reference: NaiveDate, by: i32) -> Option<NaiveDate> {
        match self {
            CalendarScope::Month => {
                let months = Months::new(by.unsigned_abs());
                if by >= 0 {
                    reference.checked_add_months(months)
                } else {
                    reference.checked_sub_months(months)
                }
            }
            CalendarScope::Week => reference.checked_add_signed(Duration::weeks(i64::from(by))),
        }
    }
}

impl fmt::Display for CalendarScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalendarScope::Week => f.write_str("week"),
            CalendarScope::Month => f.write_str("month"),
        }
    }
}

impl FromStr for CalendarScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "week" | "w" => Ok(CalendarScope::Week),
            "month" | "m" => Ok(CalendarScope::Month),
            other => Err(format!("unknown calendar scope `{other}`")),
        }
    }
}

/// Produces the day sequences painted by the calendar views.
///
/// `today` is read from the local clock unless pinned with [`with_today`].
///
/// [`with_today`]: CalendarDayGenerator::with_today
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarDayGenerator {
    first_weekday: Weekday,
    today: Option<NaiveDate>,
}

impl CalendarDayGenerator {
    pub fn new(first_weekday: Weekday) -> Self {
        Self {
            first_weekday,
            today: None,
        }
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn first_weekday(&self) -> Weekday {
        self.first_weekday
    }

    pub fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    pub fn month_grid(&self, reference: NaiveDate) -> Vec<CalendarDay> {
        month_grid(reference, self.first_weekday, self.today())
    }

    pub fn week_strip(&self, reference: NaiveDate) -> Vec<CalendarDay> {
        week_strip(reference, self.first_weekday, self.today())
    }

    pub fn days_for(&self, scope: CalendarScope, reference: NaiveDate) -> Vec<CalendarDay> {
        match scope {
            CalendarScope::Month => self.month_grid(reference),
            CalendarScope::Week => self.week_strip(reference),
        }
    }

    pub fn weekday_header(&self) -> [Weekday; 7] {
        ordered_weekdays(self.first_weekday)
    }
}

/// Six full weeks starting on the last `first_weekday` on or before the first
/// of the reference month. Empty when the range leaves the representable
/// calendar.
pub fn month_grid(
    reference: NaiveDate,
    first_weekday: Weekday,
    today: NaiveDate,
) -> Vec<CalendarDay> {
    let Some(first_of_month) = reference.with_day(1) else {
        return Vec::new();
    };
    let padding = days_after(first_of_month.weekday(), first_weekday);
    let Some(start) = first_of_month.checked_sub_days(Days::new(padding)) else {
        return Vec::new();
    };
    consecutive_days(start, MONTH_GRID_DAYS, reference, today)
}

/// The seven days of the week containing `reference`.
pub fn week_strip(
    reference: NaiveDate,
    first_weekday: Weekday,
    today: NaiveDate,
) -> Vec<CalendarDay> {
    let padding = days_after(reference.weekday(), first_weekday);
    let Some(start) = reference.checked_sub_days(Days::new(padding)) else {
        return Vec::new();
    };
    consecutive_days(start, WEEK_STRIP_DAYS, reference, today)
}

/// Weekdays in display order for a week starting on `first_weekday`.
pub fn ordered_weekdays(first_weekday: Weekday) -> [Weekday; 7] {
    let mut next = first_weekday;
    std::array::from_fn(|_| {
        let day = next;
        next = next.succ();
        day
    })
}

fn days_after(day: Weekday, first_weekday: Weekday) -> u64 {
    let offset = (7 + day.num_days_from_monday() - first_weekday.num_days_from_monday()) % 7;
    u64::from(offset)
}

fn consecutive_days(
    start: NaiveDate,
    count: usize,
    reference: NaiveDate,
    today: NaiveDate,
) -> Vec<CalendarDay> {
    let mut days = Vec::with_capacity(count);
    let mut current = start;
    for offset in 0..count {
        if offset > 0 {
            let Some(next) = current.succ_opt() else {
                return Vec::new();
            };
            current = next;
        }
        days.push(CalendarDay {
            date: current,
            is_current_month: current.year() == reference.year()
                && current.month() == reference.month(),
            is_today: current == today,
        });
    }
    days
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn days_in_month(year: i32, month: u32) -> usize {
        let first = date(year, month, 1);
        let next = first.checked_add_months(Months::new(1)).unwrap();
        next.signed_duration_since(first).num_days() as usize
    }

    fn assert_consecutive(days: &[CalendarDay]) {
        for pair in days.windows(2) {
            assert_eq!(pair[0].date.succ_opt(), Some(pair[1].date));
        }
    }

    #[test]
    fn january_grid_starts_on_sunday_before_the_first() {
        let days = month_grid(date(2025, 1, 15), Weekday::Sun, date(2030, 1, 1));
        assert_eq!(days.len(), MONTH_GRID_DAYS);
        assert_eq!(days[0].date, date(2024, 12, 29));
        assert_eq!(days[41].date, date(2025, 2, 8));
        assert_eq!(days.iter().filter(|day| day.is_current_month).count(), 31);
        assert!(days.iter().all(|day| !day.is_today));
        assert_consecutive(&days);
    }

    #[test]
    fn april_has_thirty_current_month_cells() {
        let days = month_grid(date(2025, 4, 30), Weekday::Mon, date(2025, 4, 30));
        assert_eq!(days.len(), MONTH_GRID_DAYS);
        assert_eq!(days[0].date, date(2025, 3, 31));
        let current: Vec<NaiveDate> = days
            .iter()
            .filter(|day| day.is_current_month)
            .map(|day| day.date)
            .collect();
        assert_eq!(current.len(), 30);
        assert_eq!(current.first(), Some(&date(2025, 4, 1)));
        assert_eq!(current.last(), Some(&date(2025, 4, 30)));
    }

    #[test]
    fn month_starting_on_week_start_has_no_leading_padding() {
        let days = month_grid(date(2026, 2, 10), Weekday::Sun, date(2026, 2, 10));
        assert_eq!(days[0].date, date(2026, 2, 1));
        assert!(days[0].is_current_month);
        assert_eq!(days.iter().filter(|day| day.is_current_month).count(), 28);
    }

    #[test]
    fn every_month_fills_a_rectangular_grid() {
        let starts = [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ];
        for year in [2023, 2024, 2025] {
            for month in 1..=12 {
                for first_weekday in starts {
                    let reference = date(year, month, 10);
                    let days = month_grid(reference, first_weekday, reference);
                    assert_eq!(days.len(), MONTH_GRID_DAYS);
                    assert_eq!(days[0].date.weekday(), first_weekday);
                    assert!(days[0].date <= date(year, month, 1));
                    assert_eq!(
                        days.iter().filter(|day| day.is_current_month).count(),
                        days_in_month(year, month)
                    );
                    assert_eq!(days.iter().filter(|day| day.is_today).count(), 1);
                    assert_consecutive(&days);
                }
            }
        }
    }

    #[test]
    fn leap_february_is_covered() {
        let days = month_grid(date(2024, 2, 29), Weekday::Sun, date(2024, 2, 29));
        assert_eq!(days.iter().filter(|day| day.is_current_month).count(), 29);
        let today: Vec<&CalendarDay> = days.iter().filter(|day| day.is_today).collect();
        assert_eq!(today.len(), 1);
        assert_eq!(today[0].date, date(2024, 2, 29));
    }

    #[test]
    fn today_in_padding_is_still_marked() {
        let days = month_grid(date(2025, 1, 15), Weekday::Sun, date(2024, 12, 30));
        let marked: Vec<&CalendarDay> = days.iter().filter(|day| day.is_today).collect();
        assert_eq!(marked.len(), 1);
        assert!(!marked[0].is_current_month);
    }

    #[test]
    fn week_strip_follows_week_start() {
        let sunday = week_strip(date(2025, 1, 1), Weekday::Sun, date(2025, 1, 2));
        assert_eq!(sunday.len(), WEEK_STRIP_DAYS);
        assert_eq!(sunday[0].date, date(2024, 12, 29));
        assert_eq!(sunday[6].date, date(2025, 1, 4));
        assert_eq!(sunday.iter().filter(|day| day.is_current_month).count(), 4);
        assert_eq!(sunday.iter().filter(|day| day.is_today).count(), 1);
        assert!(sunday[4].is_today);
        assert_consecutive(&sunday);

        let monday = week_strip(date(2025, 1, 1), Weekday::Mon, date(2025, 2, 1));
        assert_eq!(monday[0].date, date(2024, 12, 30));
        assert_eq!(monday[6].date, date(2025, 1, 5));
        assert!(monday.iter().all(|day| !day.is_today));
    }

    #[test]
    fn every_week_start_gives_seven_days_around_the_reference() {
        let starts = [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ];
        let references = [
            date(2024, 2, 29),
            date(2024, 12, 31),
            date(2025, 1, 1),
            date(2025, 3, 30),
            date(2025, 6, 2),
            date(2025, 11, 15),
        ];
        for reference in references {
            for first_weekday in starts {
                let days = week_strip(reference, first_weekday, reference);
                assert_eq!(days.len(), WEEK_STRIP_DAYS);
                assert_eq!(days[0].date.weekday(), first_weekday);
                assert!(days[0].date <= reference);
                assert!(days[6].date >= reference);
                assert_eq!(days.iter().filter(|day| day.is_today).count(), 1);
                assert_consecutive(&days);
            }
        }
    }

    #[test]
    fn week_strip_on_week_start_begins_at_reference() {
        let days = week_strip(date(2025, 6, 2), Weekday::Mon, date(2025, 6, 2));
        assert_eq!(days[0].date, date(2025, 6, 2));
        assert!(days[0].is_today);
    }

    #[test]
    fn ranges_past_the_calendar_limit_are_empty() {
        assert!(month_grid(NaiveDate::MAX, Weekday::Sun, NaiveDate::MAX).is_empty());
        assert!(week_strip(NaiveDate::MAX, NaiveDate::MAX.weekday(), NaiveDate::MAX).is_empty());
    }

    #[test]
    fn generator_dispatches_on_scope() {
        let generator = CalendarDayGenerator::new(Weekday::Sun).with_today(date(2025, 1, 5));
        assert_eq!(generator.today(), date(2025, 1, 5));
        assert_eq!(
            generator.days_for(CalendarScope::Month, date(2025, 1, 15)).len(),
            MONTH_GRID_DAYS
        );
        let week = generator.days_for(CalendarScope::Week, date(2025, 1, 15));
        assert_eq!(week, generator.week_strip(date(2025, 1, 15)));
        assert_eq!(week[0].date, date(2025, 1, 12));
    }

    #[test]
    fn weekday_header_rotates_from_first_weekday() {
        let header = CalendarDayGenerator::new(Weekday::Mon).weekday_header();
        assert_eq!(header[0], Weekday::Mon);
        assert_eq!(header[6], Weekday::Sun);
        assert_eq!(ordered_weekdays(Weekday::Sun)[1], Weekday::Mon);
    }

    #[test]
    fn shifting_clamps_month_end() {
        assert_eq!(
            CalendarScope::Month.shift(date(2025, 1, 31), 1),
            Some(date(2025, 2, 28))
        );
        assert_eq!(
            CalendarScope::Month.shift(date(2025, 3, 31), -1),
            Some(date(2025, 2, 28))
        );
        assert_eq!(
            CalendarScope::Week.shift(date(2025, 1, 1), -1),
            Some(date(2024, 12, 25))
        );
        assert_eq!(CalendarScope::Month.shift(NaiveDate::MAX, 1), None);
    }

    #[test]
    fn scope_parses_from_text() {
        assert_eq!("Week".parse::<CalendarScope>(), Ok(CalendarScope::Week));
        assert_eq!(" month ".parse::<CalendarScope>(), Ok(CalendarScope::Month));
        assert!("year".parse::<CalendarScope>().is_err());
    }
}
