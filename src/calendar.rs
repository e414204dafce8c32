//! Date arithmetic for the agenda and the dashboard counters.
//!
//! Appointments are stored as UTC instants. "Today", "this week" and "this
//! month" are decided in the clinic's time zone, and every range here is
//! half-open: `start <= t < end`.

use std::ops::Range;

use chrono::{DateTime, Datelike, Days, Duration, Months, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::Serialize;

/// Local midnight of `date` as a UTC instant. When midnight falls in a DST
/// gap the first valid instant after it is used.
pub fn start_of_day(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    let mut local = midnight;
    // Gaps are at most a couple of hours; step forward until one resolves.
    for _ in 0..4 {
        if let Some(instant) = tz.from_local_datetime(&local).earliest() {
            return instant.with_timezone(&Utc);
        }
        match local.checked_add_signed(Duration::minutes(30)) {
            Some(next) => local = next,
            None => break,
        }
    }
    Utc.from_utc_datetime(&midnight)
}

pub fn local_date(instant: DateTime<Utc>, tz: Tz) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

/// The helpers below return `None` when a boundary falls outside the range
/// `NaiveDate` can represent.
pub fn day_range(date: NaiveDate, tz: Tz) -> Option<Range<DateTime<Utc>>> {
    let next = date.checked_add_days(Days::new(1))?;
    Some(start_of_day(date, tz)..start_of_day(next, tz))
}

/// Monday on or before `date`.
pub fn week_start(date: NaiveDate) -> Option<NaiveDate> {
    date.checked_sub_days(Days::new(u64::from(date.weekday().num_days_from_monday())))
}

/// Monday 00:00 to the following Monday 00:00.
pub fn week_range(date: NaiveDate, tz: Tz) -> Option<Range<DateTime<Utc>>> {
    let monday = week_start(date)?;
    let next_monday = monday.checked_add_days(Days::new(7))?;
    Some(start_of_day(monday, tz)..start_of_day(next_monday, tz))
}

pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub fn month_range(date: NaiveDate, tz: Tz) -> Option<Range<DateTime<Utc>>> {
    let first = first_of_month(date);
    let next = first.checked_add_months(Months::new(1))?;
    Some(start_of_day(first, tz)..start_of_day(next, tz))
}

/// Every day shown on a Monday-first month calendar: from the Monday on or
/// before the 1st through the Sunday on or after the last day. Always a
/// whole number of weeks. `None` for an invalid year/month.
pub fn month_grid(year: i32, month: u32) -> Option<Vec<NaiveDate>> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let last = first
        .checked_add_months(Months::new(1))?
        .checked_sub_days(Days::new(1))?;
    let start = week_start(first)?;
    let end = week_start(last)?.checked_add_days(Days::new(6))?;

    Some(start.iter_days().take_while(|d| *d <= end).collect())
}

/// Seven consecutive days starting at the Monday of `date`'s week.
pub fn week_days(date: NaiveDate) -> Option<Vec<NaiveDate>> {
    let monday = week_start(date)?;
    (0..7).map(|i| monday.checked_add_days(Days::new(i))).collect()
}

/// Vertical position of an appointment block in the weekly agenda.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Block {
    pub top: f64,
    pub height: f64,
}

/// Quarter-hour cell of the weekly agenda, where a click books a new
/// appointment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Slot {
    pub hour: u32,
    pub minute: u32,
    pub top: f64,
}

/// Geometry of the weekly agenda column: hours `start_hour..=end_hour` are
/// drawn, each `hour_height` pixels tall.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgendaLayout {
    pub start_hour: u32,
    pub end_hour: u32,
    pub hour_height: f64,
    pub min_block_height: f64,
}

impl Default for AgendaLayout {
    fn default() -> Self {
        Self {
            start_hour: 7,
            end_hour: 24,
            hour_height: 60.0,
            min_block_height: 24.0,
        }
    }
}

impl AgendaLayout {
    fn offset(&self, hour: u32, minute: u32) -> f64 {
        (f64::from(hour) - f64::from(self.start_hour)) * self.hour_height
            + f64::from(minute) / 60.0 * self.hour_height
    }

    /// Total column height in pixels.
    pub fn column_height(&self) -> f64 {
        f64::from(self.end_hour - self.start_hour + 1) * self.hour_height
    }

    /// Block for an appointment starting at local `time`. `None` when the
    /// start hour is outside the drawn range.
    pub fn block(&self, time: NaiveTime, duration_minutes: i32) -> Option<Block> {
        if time.hour() < self.start_hour || time.hour() >= self.end_hour {
            return None;
        }
        let height = f64::from(duration_minutes.max(0)) / 60.0 * self.hour_height;
        Some(Block {
            top: self.offset(time.hour(), time.minute()),
            height: height.max(self.min_block_height),
        })
    }

    /// Offset of the current-time line, if the hour is on the column.
    pub fn now_marker(&self, time: NaiveTime) -> Option<f64> {
        if time.hour() < self.start_hour || time.hour() > self.end_hour {
            return None;
        }
        Some(self.offset(time.hour(), time.minute()))
    }

    /// Slot under a click `offset_px` from the top of the column, with the
    /// minute rounded down to a quarter hour.
    pub fn slot_at(&self, offset_px: f64) -> Slot {
        let total_minutes = (offset_px.max(0.0) / self.hour_height * 60.0).floor() as u32;
        let hour = total_minutes / 60 + self.start_hour;
        let minute = (total_minutes % 60) / 15 * 15;
        Slot {
            hour,
            minute,
            top: self.offset(hour, minute),
        }
    }

    /// Every bookable quarter hour from `start_hour` up to `end_hour`.
    pub fn slots(&self) -> Vec<Slot> {
        let cell = self.hour_height / 4.0;
        let count = (self.end_hour - self.start_hour) * 4;
        // Sample the middle of each cell so rounding never lands on a border.
        (0..count)
            .map(|i| self.slot_at((f64::from(i) + 0.5) * cell))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Europe::Lisbon;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn week_starts_on_monday() {
        // 2024-03-17 is a Sunday.
        assert_eq!(week_start(date(2024, 3, 17)), Some(date(2024, 3, 11)));
        assert_eq!(week_start(date(2024, 3, 11)), Some(date(2024, 3, 11)));
        let days = week_days(date(2024, 3, 13)).unwrap();
        assert_eq!(days.len(), 7);
        assert_eq!(days.last(), Some(&date(2024, 3, 17)));
    }

    #[test]
    fn day_range_follows_summer_time() {
        // Lisbon is UTC+1 in July.
        let range = day_range(date(2024, 7, 10), Lisbon).unwrap();
        assert_eq!(range.start, utc("2024-07-09T23:00:00Z"));
        assert_eq!(range.end, utc("2024-07-10T23:00:00Z"));
    }

    #[test]
    fn day_range_across_dst_change_is_23_hours() {
        // Clocks go forward on 2024-03-31 in Lisbon.
        let range = day_range(date(2024, 3, 31), Lisbon).unwrap();
        assert_eq!(range.end - range.start, Duration::hours(23));
    }

    #[test]
    fn month_range_wraps_the_year() {
        let range = month_range(date(2023, 12, 15), Lisbon).unwrap();
        assert_eq!(range.start, utc("2023-12-01T00:00:00Z"));
        assert_eq!(range.end, utc("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn ranges_at_the_end_of_the_calendar_are_none() {
        assert!(day_range(NaiveDate::MAX, Lisbon).is_none());
        assert!(week_range(NaiveDate::MAX, Lisbon).is_none());
        assert!(month_range(NaiveDate::MAX, Lisbon).is_none());
        assert!(week_days(NaiveDate::MAX).is_none());
        assert!(month_grid(NaiveDate::MAX.year(), NaiveDate::MAX.month()).is_none());

        // NaiveDate::MIN is not a Monday, so its week starts before it.
        assert!(week_start(NaiveDate::MIN).is_none());
        assert!(week_range(NaiveDate::MIN, Lisbon).is_none());
    }

    #[test]
    fn local_date_uses_clinic_zone() {
        assert_eq!(local_date(utc("2024-07-09T23:30:00Z"), Lisbon), date(2024, 7, 10));
    }

    #[test]
    fn month_grid_is_whole_weeks() {
        // February 2021 starts on a Monday and ends on a Sunday.
        let feb = month_grid(2021, 2).unwrap();
        assert_eq!(feb.len(), 28);
        assert_eq!(feb[0], date(2021, 2, 1));

        // March 2024 starts on a Friday and ends on a Sunday.
        let march = month_grid(2024, 3).unwrap();
        assert_eq!(march.len() % 7, 0);
        assert_eq!(march[0], date(2024, 2, 26));
        assert_eq!(*march.last().unwrap(), date(2024, 3, 31));

        assert!(month_grid(2024, 13).is_none());
    }

    #[test]
    fn block_geometry() {
        let layout = AgendaLayout::default();
        let block = layout
            .block(NaiveTime::from_hms_opt(9, 30, 0).unwrap(), 90)
            .unwrap();
        assert_eq!(block.top, 150.0);
        assert_eq!(block.height, 90.0);
    }

    #[test]
    fn short_blocks_get_minimum_height() {
        let layout = AgendaLayout::default();
        let block = layout
            .block(NaiveTime::from_hms_opt(7, 0, 0).unwrap(), 15)
            .unwrap();
        assert_eq!(block.top, 0.0);
        assert_eq!(block.height, 24.0);
    }

    #[test]
    fn early_appointments_are_not_drawn() {
        let layout = AgendaLayout::default();
        assert!(layout.block(NaiveTime::from_hms_opt(6, 45, 0).unwrap(), 60).is_none());
        assert!(layout.now_marker(NaiveTime::from_hms_opt(6, 59, 0).unwrap()).is_none());
        assert_eq!(
            layout.now_marker(NaiveTime::from_hms_opt(8, 15, 0).unwrap()),
            Some(75.0)
        );
    }

    #[test]
    fn click_offset_rounds_down_to_quarter_hour() {
        let layout = AgendaLayout::default();
        assert_eq!(layout.slot_at(0.0), Slot { hour: 7, minute: 0, top: 0.0 });
        assert_eq!(layout.slot_at(89.0), Slot { hour: 8, minute: 15, top: 75.0 });
        assert_eq!(layout.slot_at(-10.0), Slot { hour: 7, minute: 0, top: 0.0 });
        assert_eq!(layout.column_height(), 18.0 * 60.0);
    }

    #[test]
    fn slots_cover_every_quarter_hour() {
        let slots = AgendaLayout::default().slots();
        assert_eq!(slots.len(), 17 * 4);
        assert_eq!(slots[1], Slot { hour: 7, minute: 15, top: 15.0 });
        assert_eq!(slots.last(), Some(&Slot { hour: 23, minute: 45, top: 1005.0 }));
    }
}
