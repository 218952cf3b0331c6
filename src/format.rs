use std::fmt;

use chrono::{DateTime, Datelike, Local, Timelike};

const MS_PER_SECOND: u64 = 1_000;
const MS_PER_MINUTE: u64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: u64 = 60 * MS_PER_MINUTE;

/// Always `HH:MM:SS`; hours are not wrapped at 24.
pub fn format_hms(ms: u64) -> String {
    let hours = ms / MS_PER_HOUR;
    let minutes = (ms % MS_PER_HOUR) / MS_PER_MINUTE;
    let seconds = (ms % MS_PER_MINUTE) / MS_PER_SECOND;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// `MM:SS`, widening to `HH:MM:SS` once an hour or more remains.
pub fn format_countdown(ms: u64) -> String {
    if ms >= MS_PER_HOUR {
        return format_hms(ms);
    }
    let minutes = ms / MS_PER_MINUTE;
    let seconds = (ms % MS_PER_MINUTE) / MS_PER_SECOND;
    format!("{minutes:02}:{seconds:02}")
}

pub fn format_countdown_seconds(seconds: u32) -> String {
    format_countdown(u64::from(seconds) * MS_PER_SECOND)
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct StopwatchFields {
    pub minutes: u64,
    pub seconds: u64,
    pub centiseconds: u64,
}

impl StopwatchFields {
    pub fn from_ms(ms: u64) -> Self {
        Self {
            minutes: ms / MS_PER_MINUTE,
            seconds: (ms % MS_PER_MINUTE) / MS_PER_SECOND,
            centiseconds: (ms % MS_PER_SECOND) / 10,
        }
    }
}

impl fmt::Display for StopwatchFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}.{:02}",
            self.minutes, self.seconds, self.centiseconds
        )
    }
}

pub fn format_stopwatch(ms: u64) -> String {
    StopwatchFields::from_ms(ms).to_string()
}

pub fn format_lap_delta(ms: u64) -> String {
    format!("+{}", StopwatchFields::from_ms(ms))
}

pub fn format_lap_label(id: u32) -> String {
    format!("LAP {id:02}")
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ClockFields {
    pub hours: String,
    pub minutes: String,
    pub seconds: String,
    pub weekday: String,
    pub date: String,
}

pub fn clock_fields(now: &DateTime<Local>) -> ClockFields {
    ClockFields {
        hours: format!("{:02}", now.hour()),
        minutes: format!("{:02}", now.minute()),
        seconds: format!("{:02}", now.second()),
        weekday: now.format("%A").to_string(),
        date: format!("{:02}/{:02}/{}", now.day(), now.month(), now.year()),
    }
}
