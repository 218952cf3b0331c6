//! Fixed-offset world clock.

use chrono::{DateTime, FixedOffset, Local, Offset, Utc};

use crate::error::{ClockError, ClockResult};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct WorldZone {
    pub id: &'static str,
    pub name: &'static str,
    pub city: &'static str,
    pub offset_minutes: i32,
}

const fn zone(
    id: &'static str,
    name: &'static str,
    city: &'static str,
    offset_minutes: i32,
) -> WorldZone {
    WorldZone {
        id,
        name,
        city,
        offset_minutes,
    }
}

pub const ZONES: &[WorldZone] = &[
    zone("utc", "UTC", "London", 0),
    zone("ist", "IST", "Mumbai", 330),
    zone("est", "EST", "New York", -300),
    zone("pst", "PST", "Los Angeles", -480),
    zone("cst", "CST", "Chicago", -360),
    zone("cet", "CET", "Paris", 60),
    zone("jst", "JST", "Tokyo", 540),
    zone("aest", "AEST", "Sydney", 600),
    zone("gmt", "GMT", "Dublin", 0),
    zone("hkt", "HKT", "Hong Kong", 480),
    zone("sgt", "SGT", "Singapore", 480),
    zone("brt", "BRT", "Sao Paulo", -180),
];

pub const DEFAULT_ZONES: [&str; 4] = ["ist", "utc", "est", "pst"];

pub fn find_zone(id: &str) -> ClockResult<&'static WorldZone> {
    let wanted = id.trim().to_ascii_lowercase();
    ZONES
        .iter()
        .find(|zone| zone.id == wanted)
        .ok_or_else(|| ClockError::UnknownZone(id.trim().to_string()))
}

impl WorldZone {
    pub fn fixed_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }

    pub fn offset_label(&self) -> String {
        format_offset(self.offset_minutes)
    }
}

/// `UTC+5:30`, `UTC-5`, `UTC+0`.
pub fn format_offset(offset_minutes: i32) -> String {
    let sign = if offset_minutes < 0 { '-' } else { '+' };
    let hours = offset_minutes.unsigned_abs() / 60;
    let minutes = offset_minutes.unsigned_abs() % 60;
    if minutes == 0 {
        format!("UTC{sign}{hours}")
    } else {
        format!("UTC{sign}{hours}:{minutes:02}")
    }
}

/// Difference between two zones in hours, e.g. `+5.5h` or `-3h`.
pub fn format_difference(from: &WorldZone, to: &WorldZone) -> String {
    let diff = to.offset_minutes - from.offset_minutes;
    let sign = if diff < 0 { '-' } else { '+' };
    let hours = f64::from(diff.unsigned_abs()) / 60.0;
    format!("{sign}{hours}h")
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ZoneReading {
    pub zone: WorldZone,
    pub time: String,
    pub date: String,
    /// Calendar days ahead of (positive) or behind the local date.
    pub day_shift: i64,
}

impl ZoneReading {
    pub fn day_marker(&self) -> &'static str {
        match self.day_shift {
            shift if shift > 0 => "+1 day",
            shift if shift < 0 => "-1 day",
            _ => "",
        }
    }
}

pub fn read_zone(zone: &WorldZone, now: &DateTime<Local>) -> ZoneReading {
    let zoned = now.with_timezone(&zone.fixed_offset());
    let day_shift = (zoned.date_naive() - now.date_naive()).num_days();
    ZoneReading {
        zone: *zone,
        time: zoned.format("%H:%M:%S").to_string(),
        date: zoned.format("%a, %d %b").to_string(),
        day_shift,
    }
}

/// Ordered set of zones shown by the world clock. Never empty.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ZoneSelection {
    zones: Vec<&'static WorldZone>,
}

impl Default for ZoneSelection {
    fn default() -> Self {
        Self {
            zones: DEFAULT_ZONES
                .iter()
                .filter_map(|id| find_zone(id).ok())
                .collect(),
        }
    }
}

impl ZoneSelection {
    pub fn from_ids<S: AsRef<str>>(ids: &[S]) -> ClockResult<Self> {
        let mut selection = Self { zones: Vec::new() };
        for id in ids {
            let zone = find_zone(id.as_ref())?;
            if !selection.contains(zone.id) {
                selection.zones.push(zone);
            }
        }
        if selection.zones.is_empty() {
            return Ok(Self::default());
        }
        Ok(selection)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.zones.iter().any(|zone| zone.id == id)
    }

    /// Adds or removes a zone. Returns whether it is selected afterwards;
    /// the last remaining zone stays selected.
    pub fn toggle(&mut self, id: &str) -> ClockResult<bool> {
        let zone = find_zone(id)?;
        if let Some(index) = self.zones.iter().position(|z| z.id == zone.id) {
            if self.zones.len() > 1 {
                self.zones.remove(index);
                return Ok(false);
            }
            return Ok(true);
        }
        self.zones.push(zone);
        Ok(true)
    }

    pub fn zones(&self) -> &[&'static WorldZone] {
        &self.zones
    }

    pub fn readings(&self, now: &DateTime<Local>) -> Vec<ZoneReading> {
        self.zones.iter().map(|zone| read_zone(zone, now)).collect()
    }

    /// Offset difference between each pair of neighbouring zones.
    pub fn differences(&self) -> Vec<(&'static str, &'static str, String)> {
        self.zones
            .windows(2)
            .map(|pair| (pair[0].name, pair[1].name, format_difference(pair[0], pair[1])))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn utc_instant(h: u32, m: u32) -> DateTime<Local> {
        Utc.with_ymd_and_hms(2026, 10, 19, h, m, 0)
            .single()
            .expect("valid")
            .with_timezone(&Local)
    }

    #[test]
    fn offsets_are_labelled_with_sign() {
        assert_eq!(format_offset(330), "UTC+5:30");
        assert_eq!(format_offset(-300), "UTC-5");
        assert_eq!(format_offset(0), "UTC+0");
        assert_eq!(find_zone("AEST").expect("known").offset_label(), "UTC+10");
    }

    #[test]
    fn unknown_zone_is_an_error() {
        let err = find_zone("mars").expect_err("unknown");
        assert_eq!(err.to_string(), "unknown time zone id 'mars'");
    }

    #[test]
    fn reading_applies_fixed_offset() {
        let ist = find_zone("ist").expect("known");
        let reading = read_zone(ist, &utc_instant(12, 0));
        assert_eq!(reading.time, "17:30:00");
        assert_eq!(reading.date, "Mon, 19 Oct");
    }

    #[test]
    fn day_shift_compares_against_local_date() {
        let now = utc_instant(23, 30);
        let jst = read_zone(find_zone("jst").expect("known"), &now);
        let local_date = now.date_naive();
        let jst_date = now.with_timezone(&jst.zone.fixed_offset()).date_naive();
        assert_eq!(jst.day_shift, (jst_date - local_date).num_days());
        assert_eq!(jst.date, "Tue, 20 Oct");
    }

    #[test]
    fn toggle_never_removes_last_zone() {
        let mut selection = ZoneSelection::from_ids(&["utc"]).expect("valid");
        assert!(selection.toggle("utc").expect("known"));
        assert_eq!(selection.zones().len(), 1);

        assert!(selection.toggle("jst").expect("known"));
        assert!(!selection.toggle("utc").expect("known"));
        assert_eq!(selection.zones()[0].id, "jst");
        assert!(selection.toggle("nowhere").is_err());
    }

    #[test]
    fn default_selection_and_differences() {
        let selection = ZoneSelection::default();
        let ids: Vec<_> = selection.zones().iter().map(|zone| zone.id).collect();
        assert_eq!(ids, DEFAULT_ZONES);
        assert_eq!(
            selection.differences(),
            vec![
                ("IST", "UTC", "-5.5h".to_string()),
                ("UTC", "EST", "-5h".to_string()),
                ("EST", "PST", "-3h".to_string()),
            ]
        );
        assert_eq!(selection.readings(&utc_instant(0, 0)).len(), 4);
    }

    #[test]
    fn duplicate_ids_collapse() {
        let selection = ZoneSelection::from_ids(&["utc", "UTC", "gmt"]).expect("valid");
        assert_eq!(selection.zones().len(), 2);
    }
}
