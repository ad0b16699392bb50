//! Day-of-week handling for weekly maintenance windows.
//!
//! The week starts on Sunday (index 0), which is the ordering RDS uses for
//! `ddd:hh24:mi` ranges.

use super::error::MaintenanceError;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

pub const MINUTES_PER_DAY: u64 = 24 * 60;
pub const DAYS_PER_WEEK: u64 = 7;
pub const MINUTES_PER_WEEK: u64 = MINUTES_PER_DAY * DAYS_PER_WEEK;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DayOfWeek {
    Sun,
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
}

/// Canonical week ordering, index 0 = Sun
pub static DAYS: [DayOfWeek; 7] = [
    DayOfWeek::Sun,
    DayOfWeek::Mon,
    DayOfWeek::Tue,
    DayOfWeek::Wed,
    DayOfWeek::Thu,
    DayOfWeek::Fri,
    DayOfWeek::Sat,
];

impl DayOfWeek {
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Self {
        DAYS[index % DAYS.len()]
    }

    /// Day reached after moving `days` forward, wrapping across weeks
    pub fn advance(self, days: u64) -> Self {
        let offset = (days % DAYS_PER_WEEK) as usize;
        Self::from_index(self.index() + offset)
    }

    pub fn code(self) -> &'static str {
        match self {
            DayOfWeek::Sun => "Sun",
            DayOfWeek::Mon => "Mon",
            DayOfWeek::Tue => "Tue",
            DayOfWeek::Wed => "Wed",
            DayOfWeek::Thu => "Thu",
            DayOfWeek::Fri => "Fri",
            DayOfWeek::Sat => "Sat",
        }
    }
}

impl Display for DayOfWeek {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for DayOfWeek {
    type Err = MaintenanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DAYS.iter()
            .copied()
            .find(|day| day.code().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                MaintenanceError::malformed(s, format!("unknown day code '{}'", s))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_order_matches_index() {
        for (i, day) in DAYS.iter().enumerate() {
            assert_eq!(day.index(), i);
        }
        assert_eq!(DayOfWeek::Sun.index(), 0);
        assert_eq!(DayOfWeek::Sat.index(), 6);
    }

    #[test]
    fn test_advance_wraps_week() {
        assert_eq!(DayOfWeek::Sat.advance(1), DayOfWeek::Sun);
        assert_eq!(DayOfWeek::Wed.advance(7), DayOfWeek::Wed);
        assert_eq!(DayOfWeek::Mon.advance(15), DayOfWeek::Tue);
        assert_eq!(DayOfWeek::Fri.advance(0), DayOfWeek::Fri);
    }

    #[test]
    fn test_parse_day_codes() {
        assert_eq!("Sat".parse::<DayOfWeek>().unwrap(), DayOfWeek::Sat);
        assert_eq!("sun".parse::<DayOfWeek>().unwrap(), DayOfWeek::Sun);
        assert_eq!("WED".parse::<DayOfWeek>().unwrap(), DayOfWeek::Wed);
        assert!("Funday".parse::<DayOfWeek>().is_err());
        assert!("".parse::<DayOfWeek>().is_err());
    }

    #[test]
    fn test_display_is_canonical() {
        let day: DayOfWeek = "thu".parse().unwrap();
        assert_eq!(day.to_string(), "Thu");
    }
}
