//! Weekly maintenance windows (`Day:HH:MM-Day:HH:MM`) and daily backup
//! windows (`HH:MM-HH:MM`).

use super::day::{DayOfWeek, MINUTES_PER_DAY, MINUTES_PER_WEEK};
use super::error::MaintenanceError;
use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

static DAY_TIME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<day>[A-Za-z]+):(?P<hour>\d{2}):(?P<minute>\d{2})$")
        .expect("Invalid day/time regex")
});

static TIME_OF_DAY_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<hour>\d{2}):(?P<minute>\d{2})$").expect("Invalid time of day regex")
});

/// Validates `HH` and `MM` captures
fn parse_hour_minute(hour: &str, minute: &str) -> Result<(u8, u8), String> {
    let hour: u8 = hour
        .parse()
        .map_err(|_| format!("hour '{}' is not numeric", hour))?;
    let minute: u8 = minute
        .parse()
        .map_err(|_| format!("minute '{}' is not numeric", minute))?;
    if hour > 23 {
        return Err(format!("hour {} is outside 00-23", hour));
    }
    if minute > 59 {
        return Err(format!("minute {} is outside 00-59", minute));
    }
    Ok((hour, minute))
}

fn parse_day_time(s: &str) -> Result<DayTime, String> {
    let captures = DAY_TIME_REGEX
        .captures(s)
        .ok_or_else(|| format!("'{}' does not match Day:HH:MM", s))?;

    let day = captures["day"]
        .parse::<DayOfWeek>()
        .map_err(|_| format!("unknown day code '{}'", &captures["day"]))?;
    let (hour, minute) = parse_hour_minute(&captures["hour"], &captures["minute"])?;

    Ok(DayTime { day, hour, minute })
}

fn parse_time_of_day(s: &str) -> Result<(u8, u8), String> {
    let captures = TIME_OF_DAY_REGEX
        .captures(s)
        .ok_or_else(|| format!("'{}' does not match HH:MM", s))?;
    parse_hour_minute(&captures["hour"], &captures["minute"])
}

/// A point in the week with minute precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DayTime {
    pub day: DayOfWeek,
    pub hour: u8,
    pub minute: u8,
}

impl DayTime {
    fn minute_of_day(&self) -> u64 {
        self.hour as u64 * 60 + self.minute as u64
    }

    /// Minutes elapsed since Sunday 00:00
    pub fn minute_of_week(&self) -> u64 {
        self.day.index() as u64 * MINUTES_PER_DAY + self.minute_of_day()
    }

    /// Moves forward by `minutes`, carrying into the day and wrapping the week.
    ///
    /// The day is advanced relative to `self.day`, so any multiple of a whole
    /// week lands on the same day and time.
    pub fn shift(&self, minutes: u64) -> Self {
        let total = self.minute_of_day() + minutes % MINUTES_PER_WEEK;
        let days = total / MINUTES_PER_DAY;
        let time_of_day = total % MINUTES_PER_DAY;

        Self {
            day: self.day.advance(days),
            hour: ((time_of_day / 60) % 24) as u8,
            minute: (time_of_day % 60) as u8,
        }
    }

    /// Next instant at or after `after` that falls on this day and time
    pub fn next_occurrence(&self, after: DateTime<Utc>) -> DateTime<Utc> {
        let truncated = after
            - Duration::seconds(after.second() as i64)
            - Duration::nanoseconds(after.nanosecond() as i64);

        let current = after.weekday().num_days_from_sunday() as u64 * MINUTES_PER_DAY
            + after.hour() as u64 * 60
            + after.minute() as u64;
        let mut delta = (self.minute_of_week() + MINUTES_PER_WEEK - current) % MINUTES_PER_WEEK;
        if delta == 0 && truncated < after {
            delta = MINUTES_PER_WEEK;
        }

        truncated + Duration::minutes(delta as i64)
    }
}

impl Display for DayTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{:02}:{:02}", self.day, self.hour, self.minute)
    }
}

impl FromStr for DayTime {
    type Err = MaintenanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_day_time(s).map_err(|reason| MaintenanceError::malformed(s, reason))
    }
}

/// A weekly recurring range, e.g. `Sat:17:00-Sat:17:30`.
///
/// Start and end are independent points in the week. An end earlier than the
/// start describes a range that crosses Saturday midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MaintenanceWindow {
    pub start: DayTime,
    pub end: DayTime,
}

impl MaintenanceWindow {
    pub fn new(start: DayTime, end: DayTime) -> Self {
        Self { start, end }
    }

    /// Both ends moved forward by the same number of minutes
    pub fn shift(&self, minutes: u64) -> Self {
        Self {
            start: self.start.shift(minutes),
            end: self.end.shift(minutes),
        }
    }

    /// Half-open range in minutes since Sunday 00:00. The end may exceed one
    /// week when the window wraps.
    pub(crate) fn week_minutes(&self) -> (u64, u64) {
        let start = self.start.minute_of_week();
        let mut end = self.end.minute_of_week();
        if end < start {
            end += MINUTES_PER_WEEK;
        }
        (start, end)
    }

    pub fn duration_minutes(&self) -> u64 {
        let (start, end) = self.week_minutes();
        end - start
    }
}

impl Display for MaintenanceWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

impl FromStr for MaintenanceWindow {
    type Err = MaintenanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s
            .split_once('-')
            .ok_or_else(|| MaintenanceError::malformed(s, "expected Day:HH:MM-Day:HH:MM"))?;

        let start = parse_day_time(start).map_err(|reason| MaintenanceError::malformed(s, reason))?;
        let end = parse_day_time(end).map_err(|reason| MaintenanceError::malformed(s, reason))?;

        Ok(Self { start, end })
    }
}

impl TryFrom<String> for MaintenanceWindow {
    type Error = MaintenanceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MaintenanceWindow> for String {
    fn from(window: MaintenanceWindow) -> Self {
        window.to_string()
    }
}

/// A daily recurring range, e.g. the backup window `16:00-16:30`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DailyWindow {
    pub start: (u8, u8),
    pub end: (u8, u8),
}

impl DailyWindow {
    fn day_minutes(&self) -> (i64, i64) {
        let start = self.start.0 as i64 * 60 + self.start.1 as i64;
        let mut end = self.end.0 as i64 * 60 + self.end.1 as i64;
        if end < start {
            end += MINUTES_PER_DAY as i64;
        }
        (start, end)
    }

    /// Whether any daily occurrence of this window intersects `window`
    pub fn overlaps(&self, window: &MaintenanceWindow) -> bool {
        let (backup_start, backup_end) = self.day_minutes();
        let (start, end) = window.week_minutes();
        let (start, end) = (start as i64, end as i64);
        if backup_start == backup_end || start == end {
            return false;
        }

        // a maintenance range ends before day 14, a backup may start on day -1
        (-1..15).any(|day| {
            let offset = day * MINUTES_PER_DAY as i64;
            offset + backup_start < end && start < offset + backup_end
        })
    }
}

impl Display for DailyWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:02}:{:02}-{:02}:{:02}",
            self.start.0, self.start.1, self.end.0, self.end.1
        )
    }
}

impl FromStr for DailyWindow {
    type Err = MaintenanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s
            .split_once('-')
            .ok_or_else(|| MaintenanceError::malformed(s, "expected HH:MM-HH:MM"))?;

        let start = parse_time_of_day(start).map_err(|reason| MaintenanceError::malformed(s, reason))?;
        let end = parse_time_of_day(end).map_err(|reason| MaintenanceError::malformed(s, reason))?;

        Ok(Self { start, end })
    }
}

impl TryFrom<String> for DailyWindow {
    type Error = MaintenanceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DailyWindow> for String {
    fn from(window: DailyWindow) -> Self {
        window.to_string()
    }
}

/// Shifts a textual `Day:HH:MM` forward by `shift_minutes`
pub fn shift_day_time(day_time: &str, shift_minutes: u64) -> Result<String, MaintenanceError> {
    let parsed: DayTime = day_time.parse()?;
    Ok(parsed.shift(shift_minutes).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn shift(s: &str, minutes: u64) -> String {
        shift_day_time(s, minutes).unwrap()
    }

    #[test]
    fn test_shift_zero_is_identity() {
        assert_eq!(shift("Tue:08:15", 0), "Tue:08:15");
        assert_eq!(shift("Sun:00:00", 0), "Sun:00:00");
    }

    #[test]
    fn test_shift_wraps_week_end() {
        assert_eq!(shift("Sat:23:50", 20), "Sun:00:10");
    }

    #[test]
    fn test_shift_full_week() {
        assert_eq!(shift("Wed:10:00", 7 * 1440), "Wed:10:00");
        assert_eq!(shift("Wed:10:00", 3 * 7 * 1440), "Wed:10:00");
    }

    #[test]
    fn test_shift_minute_carry() {
        assert_eq!(shift("Mon:12:45", 20), "Mon:13:05");
        assert_eq!(shift("Mon:23:59", 1), "Tue:00:00");
    }

    #[test]
    fn test_shift_is_deterministic_for_huge_offsets() {
        let a = shift("Fri:06:30", u64::MAX);
        let b = shift("Fri:06:30", u64::MAX);
        assert_eq!(a, b);
        assert!(a.parse::<DayTime>().is_ok());
    }

    #[test]
    fn test_day_time_rejects_out_of_range() {
        assert!("Mon:24:00".parse::<DayTime>().is_err());
        assert!("Mon:12:60".parse::<DayTime>().is_err());
        assert!("Mon:1:00".parse::<DayTime>().is_err());
        assert!("Mon:ab:00".parse::<DayTime>().is_err());
        assert!("Funday:10:00".parse::<DayTime>().is_err());
    }

    #[test]
    fn test_window_roundtrip_text() {
        let window: MaintenanceWindow = "sat:17:00-SAT:17:30".parse().unwrap();
        assert_eq!(window.to_string(), "Sat:17:00-Sat:17:30");
        assert_eq!(window.duration_minutes(), 30);
    }

    #[test]
    fn test_window_malformed_carries_whole_input() {
        let err = "Funday:25:99-Sat:17:30"
            .parse::<MaintenanceWindow>()
            .unwrap_err();
        match err {
            MaintenanceError::MalformedWindow { input, .. } => {
                assert_eq!(input, "Funday:25:99-Sat:17:30")
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_window_wrong_field_count() {
        assert!("Sat:17:00".parse::<MaintenanceWindow>().is_err());
        assert!("Sat:17:00-Sat:17:30-Sun:00:00"
            .parse::<MaintenanceWindow>()
            .is_err());
        assert!("Sat:17-Sat:17:30".parse::<MaintenanceWindow>().is_err());
    }

    #[test]
    fn test_window_crossing_week_end() {
        let window: MaintenanceWindow = "Sat:23:45-Sun:00:15".parse().unwrap();
        assert_eq!(window.duration_minutes(), 30);
    }

    #[test]
    fn test_window_serde_as_string() {
        let window: MaintenanceWindow = "Sat:17:00-Sat:17:30".parse().unwrap();
        let json = serde_json::to_string(&window).unwrap();
        assert_eq!(json, "\"Sat:17:00-Sat:17:30\"");
        let back: MaintenanceWindow = serde_json::from_str(&json).unwrap();
        assert_eq!(back, window);
        assert!(serde_json::from_str::<MaintenanceWindow>("\"nope\"").is_err());
    }

    #[test]
    fn test_daily_window_parse() {
        let backup: DailyWindow = "16:00-16:30".parse().unwrap();
        assert_eq!(backup.to_string(), "16:00-16:30");
        assert!("16:00".parse::<DailyWindow>().is_err());
        assert!("25:00-01:00".parse::<DailyWindow>().is_err());
    }

    #[test]
    fn test_daily_window_overlap() {
        let backup: DailyWindow = "16:00-16:30".parse().unwrap();
        let clear: MaintenanceWindow = "Sat:17:00-Sat:17:30".parse().unwrap();
        let touching: MaintenanceWindow = "Sat:16:30-Sat:17:00".parse().unwrap();
        let clash: MaintenanceWindow = "Tue:16:15-Tue:16:45".parse().unwrap();
        assert!(!backup.overlaps(&clear));
        assert!(!backup.overlaps(&touching));
        assert!(backup.overlaps(&clash));
    }

    #[test]
    fn test_daily_window_overlap_across_midnight() {
        let backup: DailyWindow = "23:30-00:30".parse().unwrap();
        let early_sunday: MaintenanceWindow = "Sun:00:00-Sun:00:20".parse().unwrap();
        let late_saturday: MaintenanceWindow = "Sat:23:40-Sun:00:10".parse().unwrap();
        let midday: MaintenanceWindow = "Wed:12:00-Wed:13:00".parse().unwrap();
        assert!(backup.overlaps(&early_sunday));
        assert!(backup.overlaps(&late_saturday));
        assert!(!backup.overlaps(&midday));
    }

    #[test]
    fn test_next_occurrence() {
        let start: DayTime = "Sat:17:00".parse().unwrap();
        let friday_noon = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();
        let next = start.next_occurrence(friday_noon);
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 10, 17, 17, 0, 0).unwrap());
        assert_eq!(next.weekday(), chrono::Weekday::Sat);
    }

    #[test]
    fn test_next_occurrence_exact_and_just_after() {
        let start: DayTime = "Sat:17:00".parse().unwrap();
        let exact = Utc.with_ymd_and_hms(2026, 10, 17, 17, 0, 0).unwrap();
        assert_eq!(start.next_occurrence(exact), exact);

        let just_after = Utc.with_ymd_and_hms(2026, 10, 17, 17, 0, 1).unwrap();
        assert_eq!(
            start.next_occurrence(just_after),
            Utc.with_ymd_and_hms(2026, 10, 24, 17, 0, 0).unwrap()
        );
    }
}
