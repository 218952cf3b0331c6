use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::alarm::scheduler::{DEFAULT_CATCH_UP_MS, MAX_CATCH_UP_MS, MIN_CATCH_UP_MS, MatchMode};
use crate::countdown::{DEFAULT_STUDY_MINUTES, MAX_STUDY_MINUTES};
use crate::world::{DEFAULT_ZONES, ZoneSelection};

pub const DEFAULT_PRESETS: [u32; 5] = [15, 25, 45, 60, 90];
pub const DEFAULT_REFRESH_MS: u64 = 10;

#[derive(Debug, Clone)]
pub struct SuiteConfig {
    pub version: u32,
    pub study: StudySettings,
    pub stopwatch: StopwatchSettings,
    pub alarms: AlarmSettings,
    pub notifications: NotificationSettings,
    pub world: ZoneSelection,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            version: 1,
            study: StudySettings::default(),
            stopwatch: StopwatchSettings::default(),
            alarms: AlarmSettings::default(),
            notifications: NotificationSettings::default(),
            world: ZoneSelection::default(),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct StudySettings {
    pub default_minutes: u32,
    pub presets: Vec<u32>,
}

impl Default for StudySettings {
    fn default() -> Self {
        Self {
            default_minutes: DEFAULT_STUDY_MINUTES,
            presets: DEFAULT_PRESETS.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct StopwatchSettings {
    pub refresh_ms: u64,
}

impl Default for StopwatchSettings {
    fn default() -> Self {
        Self {
            refresh_ms: DEFAULT_REFRESH_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct AlarmSettings {
    pub match_mode: MatchMode,
    pub catch_up_ms: u64,
}

impl Default for AlarmSettings {
    fn default() -> Self {
        Self {
            match_mode: MatchMode::default(),
            catch_up_ms: DEFAULT_CATCH_UP_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct NotificationSettings {
    pub enabled: bool,
    pub sound: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            sound: true,
        }
    }
}

pub fn load_config(path: &Path) -> Result<SuiteConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("unable to read config file {}", path.display()))?;
    parse_config_text(&content)
}

pub fn parse_config_text(content: &str) -> Result<SuiteConfig> {
    let raw = serde_json::from_str::<ConfigFile>(content).map_err(|err| {
        let line = err.line();
        let column = err.column();
        anyhow::anyhow!("invalid JSON at line {line}, column {column}: {err}")
    })?;

    if raw.version != 1 {
        bail!(
            "unsupported config version {}; expected version 1",
            raw.version
        );
    }

    let study = raw.study;
    if !(1..=MAX_STUDY_MINUTES).contains(&study.default_minutes) {
        bail!(
            "study.default_minutes must be between 1 and {MAX_STUDY_MINUTES}, got {}",
            study.default_minutes
        );
    }
    if study.presets.is_empty() {
        bail!("study.presets must include at least one duration");
    }
    if let Some(bad) = study
        .presets
        .iter()
        .find(|minutes| !(1..=MAX_STUDY_MINUTES).contains(*minutes))
    {
        bail!("study preset {bad} must be between 1 and {MAX_STUDY_MINUTES} minutes");
    }
    if raw.stopwatch.refresh_ms == 0 {
        bail!("stopwatch.refresh_ms must be > 0");
    }
    if !(MIN_CATCH_UP_MS..=MAX_CATCH_UP_MS).contains(&raw.alarms.catch_up_ms) {
        bail!(
            "alarms.catch_up_ms must be between {MIN_CATCH_UP_MS} and {MAX_CATCH_UP_MS}, got {}",
            raw.alarms.catch_up_ms
        );
    }

    let world = ZoneSelection::from_ids(&raw.world.zones).context("invalid world.zones")?;

    Ok(SuiteConfig {
        version: raw.version,
        study: StudySettings {
            default_minutes: study.default_minutes,
            presets: study.presets,
        },
        stopwatch: StopwatchSettings {
            refresh_ms: raw.stopwatch.refresh_ms,
        },
        alarms: AlarmSettings {
            match_mode: raw.alarms.match_mode,
            catch_up_ms: raw.alarms.catch_up_ms,
        },
        notifications: NotificationSettings {
            enabled: raw.notifications.enabled,
            sound: raw.notifications.sound,
        },
        world,
    })
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    version: u32,
    #[serde(default)]
    study: StudyFile,
    #[serde(default)]
    stopwatch: StopwatchFile,
    #[serde(default)]
    alarms: AlarmsFile,
    #[serde(default)]
    notifications: NotificationsFile,
    #[serde(default)]
    world: WorldFile,
}

#[derive(Debug, Deserialize)]
struct StudyFile {
    #[serde(default = "default_study_minutes")]
    default_minutes: u32,
    #[serde(default = "default_presets")]
    presets: Vec<u32>,
}

impl Default for StudyFile {
    fn default() -> Self {
        Self {
            default_minutes: default_study_minutes(),
            presets: default_presets(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StopwatchFile {
    #[serde(default = "default_refresh_ms")]
    refresh_ms: u64,
}

impl Default for StopwatchFile {
    fn default() -> Self {
        Self {
            refresh_ms: default_refresh_ms(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AlarmsFile {
    #[serde(default)]
    match_mode: MatchMode,
    #[serde(default = "default_catch_up_ms")]
    catch_up_ms: u64,
}

impl Default for AlarmsFile {
    fn default() -> Self {
        Self {
            match_mode: MatchMode::default(),
            catch_up_ms: default_catch_up_ms(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct NotificationsFile {
    #[serde(default = "default_enabled")]
    enabled: bool,
    #[serde(default = "default_enabled")]
    sound: bool,
}

impl Default for NotificationsFile {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            sound: default_enabled(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WorldFile {
    #[serde(default = "default_zones")]
    zones: Vec<String>,
}

impl Default for WorldFile {
    fn default() -> Self {
        Self {
            zones: default_zones(),
        }
    }
}

fn default_study_minutes() -> u32 {
    DEFAULT_STUDY_MINUTES
}

fn default_presets() -> Vec<u32> {
    DEFAULT_PRESETS.to_vec()
}

fn default_refresh_ms() -> u64 {
    DEFAULT_REFRESH_MS
}

fn default_catch_up_ms() -> u64 {
    DEFAULT_CATCH_UP_MS
}

fn default_enabled() -> bool {
    true
}

fn default_zones() -> Vec<String> {
    DEFAULT_ZONES.iter().map(|id| id.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn minimal_file_uses_defaults() {
        let config = parse_config_text(r#"{ "version": 1 }"#).expect("valid config");
        assert_eq!(config.study, StudySettings::default());
        assert_eq!(config.stopwatch.refresh_ms, 10);
        assert_eq!(config.alarms.match_mode, MatchMode::MinuteCrossing);
        assert_eq!(config.alarms.catch_up_ms, 60_000);
        assert!(config.notifications.enabled);
        assert!(config.notifications.sound);
        assert_eq!(config.world, ZoneSelection::default());
    }

    #[test]
    fn parses_full_file() {
        let json = r#"
{
  "version": 1,
  "study": { "default_minutes": 50, "presets": [10, 50] },
  "stopwatch": { "refresh_ms": 40 },
  "alarms": { "match_mode": "exact_second", "catch_up_ms": 5000 },
  "notifications": { "enabled": false, "sound": false },
  "world": { "zones": ["jst", "cet"] }
}
"#;
        let config = parse_config_text(json).expect("valid config");
        assert_eq!(config.study.default_minutes, 50);
        assert_eq!(config.study.presets, vec![10, 50]);
        assert_eq!(config.stopwatch.refresh_ms, 40);
        assert_eq!(config.alarms.match_mode, MatchMode::ExactSecond);
        assert_eq!(config.alarms.catch_up_ms, 5_000);
        assert!(!config.notifications.enabled);
        let ids: Vec<_> = config.world.zones().iter().map(|zone| zone.id).collect();
        assert_eq!(ids, vec!["jst", "cet"]);
    }

    #[test]
    fn malformed_json_reports_position() {
        let err = parse_config_text("{ not-valid-json ").expect_err("malformed");
        assert!(err.to_string().contains("invalid JSON at line 1, column"));
    }

    #[test]
    fn rejects_unsupported_version() {
        let err = parse_config_text(r#"{ "version": 2 }"#).expect_err("version");
        assert!(err.to_string().contains("unsupported config version 2"));
    }

    #[test]
    fn rejects_out_of_range_minutes() {
        let err = parse_config_text(r#"{ "version": 1, "study": { "default_minutes": 0 } }"#)
            .expect_err("zero minutes");
        assert!(err.to_string().contains("study.default_minutes"));

        let err = parse_config_text(r#"{ "version": 1, "study": { "presets": [] } }"#)
            .expect_err("empty presets");
        assert!(err.to_string().contains("at least one duration"));

        let err = parse_config_text(r#"{ "version": 1, "study": { "presets": [25, 600] } }"#)
            .expect_err("long preset");
        assert!(err.to_string().contains("study preset 600"));
    }

    #[test]
    fn rejects_zero_refresh_and_unknown_zone() {
        let err = parse_config_text(r#"{ "version": 1, "stopwatch": { "refresh_ms": 0 } }"#)
            .expect_err("zero refresh");
        assert!(err.to_string().contains("refresh_ms must be > 0"));

        let err = parse_config_text(r#"{ "version": 1, "world": { "zones": ["mars"] } }"#)
            .expect_err("unknown zone");
        assert!(format!("{err:#}").contains("unknown time zone id 'mars'"));
    }

    #[test]
    fn rejects_catch_up_outside_one_second_to_one_day() {
        let err = parse_config_text(r#"{ "version": 1, "alarms": { "catch_up_ms": 500 } }"#)
            .expect_err("too short");
        assert!(err.to_string().contains("alarms.catch_up_ms must be between"));

        let huge = r#"{ "version": 1, "alarms": { "catch_up_ms": 18446744073709551615 } }"#;
        let err = parse_config_text(huge).expect_err("too long");
        assert!(err.to_string().contains("got 18446744073709551615"));

        let day = r#"{ "version": 1, "alarms": { "catch_up_ms": 86400000 } }"#;
        let config = parse_config_text(day).expect("one day is allowed");
        assert_eq!(config.alarms.catch_up_ms, 86_400_000);
    }

    #[test]
    fn unknown_match_mode_is_a_json_error() {
        let err = parse_config_text(r#"{ "version": 1, "alarms": { "match_mode": "whenever" } }"#)
            .expect_err("bad mode");
        assert!(err.to_string().contains("invalid JSON"));
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("clocksuite.json");
        fs::write(&path, r#"{ "version": 1, "study": { "default_minutes": 30 } }"#)
            .expect("write config");
        assert_eq!(load_config(&path).expect("load").study.default_minutes, 30);

        let missing = dir.path().join("missing.json");
        let err = load_config(&missing).expect_err("missing file");
        assert!(err.to_string().contains("unable to read config file"));
    }
}
