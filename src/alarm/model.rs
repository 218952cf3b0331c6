use std::fmt;
use std::str::FromStr;

use chrono::{NaiveTime, Timelike};
use serde::{Serialize, Serializer};

use crate::error::{ClockError, ClockResult};

/// Time of day an alarm rings at, with minute precision.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct AlarmTime {
    time: NaiveTime,
}

impl AlarmTime {
    pub fn new(hour: u32, minute: u32) -> ClockResult<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0)
            .map(|time| Self { time })
            .ok_or_else(|| ClockError::InvalidAlarmTime(format!("{hour}:{minute}")))
    }

    pub fn parse(input: &str) -> ClockResult<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ClockError::EmptyAlarmTime);
        }
        NaiveTime::parse_from_str(trimmed, "%H:%M")
            .map(|time| Self { time })
            .map_err(|_| ClockError::InvalidAlarmTime(trimmed.to_string()))
    }

    pub fn hour(&self) -> u32 {
        self.time.hour()
    }

    pub fn minute(&self) -> u32 {
        self.time.minute()
    }

    pub fn as_naive(&self) -> NaiveTime {
        self.time
    }

    pub fn matches_minute<T: Timelike>(&self, now: &T) -> bool {
        now.hour() == self.hour() && now.minute() == self.minute()
    }
}

impl FromStr for AlarmTime {
    type Err = ClockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for AlarmTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl Serialize for AlarmTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct AlarmEntry {
    pub id: u64,
    pub time: AlarmTime,
    pub enabled: bool,
    pub label: String,
}

pub fn default_label(existing: usize) -> String {
    format!("Alarm {}", existing + 1)
}

#[cfg(test)]
mod tests {
    use chrono::{Local, TimeZone};

    use super::*;

    #[test]
    fn parses_hh_mm() {
        let time = AlarmTime::parse("08:05").expect("valid");
        assert_eq!(time.hour(), 8);
        assert_eq!(time.minute(), 5);
        assert_eq!(time.to_string(), "08:05");
        assert_eq!("23:59".parse::<AlarmTime>().expect("valid").to_string(), "23:59");
    }

    #[test]
    fn rejects_empty_and_malformed_times() {
        assert!(matches!(AlarmTime::parse(""), Err(ClockError::EmptyAlarmTime)));
        assert!(matches!(AlarmTime::parse("   "), Err(ClockError::EmptyAlarmTime)));
        let err = AlarmTime::parse("25:00").expect_err("hour out of range");
        assert!(err.to_string().contains("invalid alarm time '25:00'"));
        assert!(AlarmTime::parse("noon").is_err());
        assert!(AlarmTime::new(7, 60).is_err());
    }

    #[test]
    fn matches_by_hour_and_minute_only() {
        let time = AlarmTime::new(8, 0).expect("valid");
        let at = |h, m, s| {
            Local
                .with_ymd_and_hms(2026, 10, 19, h, m, s)
                .single()
                .expect("valid")
        };
        assert!(time.matches_minute(&at(8, 0, 0)));
        assert!(time.matches_minute(&at(8, 0, 59)));
        assert!(!time.matches_minute(&at(8, 1, 0)));
        assert!(!time.matches_minute(&at(20, 0, 0)));
    }

    #[test]
    fn serializes_as_clock_string() {
        let entry = AlarmEntry {
            id: 1,
            time: AlarmTime::new(6, 30).expect("valid"),
            enabled: true,
            label: default_label(0),
        };
        let json = serde_json::to_value(&entry).expect("json");
        assert_eq!(json["time"], "06:30");
        assert_eq!(json["label"], "Alarm 1");
    }
}
