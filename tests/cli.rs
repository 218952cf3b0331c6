use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::tempdir;

fn valid_config_json() -> &'static str {
    r#"
{
  "version": 1,
  "study": { "default_minutes": 30, "presets": [15, 30, 60] },
  "stopwatch": { "refresh_ms": 10 },
  "alarms": { "match_mode": "minute_crossing", "catch_up_ms": 60000 },
  "notifications": { "enabled": false, "sound": false },
  "world": { "zones": ["jst", "cet"] }
}
"#
}

#[test]
fn clock_once_prints_time_and_date() {
    let mut cmd = cargo_bin_cmd!("clocksuite");
    cmd.arg("clock")
        .arg("--once")
        .assert()
        .success()
        .stdout(
            predicate::str::is_match(r"^\d{2}:\d{2}:\d{2}  \w+  \d{2}/\d{2}/\d{4}\n$")
                .expect("regex"),
        );
}

#[test]
fn world_prints_requested_zones() {
    let mut cmd = cargo_bin_cmd!("clocksuite");
    cmd.arg("world")
        .arg("--zones")
        .arg("utc,ist")
        .assert()
        .success()
        .stdout(predicate::str::contains("UTC"))
        .stdout(predicate::str::contains("UTC+5:30"))
        .stdout(predicate::str::contains("UTC -> IST +5.5h"));
}

#[test]
fn world_uses_zones_from_config() {
    let dir = tempdir().expect("tempdir");
    let config = dir.path().join("clocksuite.json");
    fs::write(&config, valid_config_json()).expect("write json");

    let mut cmd = cargo_bin_cmd!("clocksuite");
    cmd.arg("--config")
        .arg(config)
        .arg("world")
        .assert()
        .success()
        .stdout(predicate::str::contains("JST"))
        .stdout(predicate::str::contains("CET"))
        .stdout(predicate::str::contains("IST").not());
}

#[test]
fn world_rejects_unknown_zone() {
    let mut cmd = cargo_bin_cmd!("clocksuite");
    cmd.arg("world")
        .arg("--zones")
        .arg("mars")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown time zone id 'mars'"));
}

#[test]
fn malformed_json_fails_with_clear_error() {
    let dir = tempdir().expect("tempdir");
    let config = dir.path().join("clocksuite.json");
    fs::write(&config, "{ not-valid-json ").expect("write invalid json");

    let mut cmd = cargo_bin_cmd!("clocksuite");
    cmd.arg("--config")
        .arg(config)
        .arg("clock")
        .arg("--once")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid JSON"));
}

#[test]
fn unsupported_config_version_fails() {
    let dir = tempdir().expect("tempdir");
    let config = dir.path().join("clocksuite.json");
    fs::write(&config, r#"{ "version": 7 }"#).expect("write json");

    let mut cmd = cargo_bin_cmd!("clocksuite");
    cmd.arg("--config")
        .arg(config)
        .arg("clock")
        .arg("--once")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported config version 7"));
}

#[test]
fn alarm_rejects_invalid_time() {
    let mut cmd = cargo_bin_cmd!("clocksuite");
    cmd.arg("alarm")
        .arg("--at")
        .arg("25:00")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid alarm time '25:00'"));
}

#[test]
fn alarm_lists_entries_and_quits() {
    let dir = tempdir().expect("tempdir");
    let config = dir.path().join("clocksuite.json");
    fs::write(&config, valid_config_json()).expect("write json");

    let mut cmd = cargo_bin_cmd!("clocksuite");
    cmd.arg("--config")
        .arg(config)
        .arg("alarm")
        .arg("--at")
        .arg("06:30")
        .arg("--label")
        .arg("Run")
        .arg("--at")
        .arg("07:15")
        .write_stdin("a 09:00 Gym class\na 24:00\nd 1\nd 9\nl\nt 2\nq\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("1  06:30  Run"))
        .stdout(predicate::str::contains("2  07:15  Alarm 2"))
        .stdout(predicate::str::contains("added alarm 3"))
        .stdout(predicate::str::contains("deleted alarm 1 (Run)"))
        .stdout(predicate::str::contains("3  09:00  Gym class  armed"))
        .stdout(predicate::str::contains("1  06:30  Run  armed").not())
        .stdout(predicate::str::contains("alarm 2 off"))
        .stderr(predicate::str::contains("invalid alarm time '24:00'"))
        .stderr(predicate::str::contains("no alarm with id 9"));
}

#[test]
fn timer_starts_and_quits() {
    let dir = tempdir().expect("tempdir");
    let config = dir.path().join("clocksuite.json");
    fs::write(&config, valid_config_json()).expect("write json");

    let mut cmd = cargo_bin_cmd!("clocksuite");
    cmd.arg("--config")
        .arg(config)
        .arg("timer")
        .write_stdin("q\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Presets: 15m 30m 60m"))
        .stdout(predicate::str::contains("30:00"));
}

#[test]
fn stopwatch_records_a_lap() {
    let mut cmd = cargo_bin_cmd!("clocksuite");
    cmd.arg("stopwatch")
        .write_stdin("\nq\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("LAP 01"))
        .stdout(predicate::str::contains("Total"));
}

#[test]
fn diagnostics_prints_tick_summary() {
    let mut cmd = cargo_bin_cmd!("clocksuite");
    cmd.arg("diagnostics")
        .arg("--interval-ms")
        .arg("10")
        .arg("--seconds")
        .arg("0.2")
        .assert()
        .success()
        .stdout(predicate::str::contains("Timing source"))
        .stdout(predicate::str::contains("Tick summary"))
        .stdout(predicate::str::contains("Provider vs system clock"));
}

#[test]
fn diagnostics_rejects_out_of_range_seconds() {
    let mut cmd = cargo_bin_cmd!("clocksuite");
    cmd.arg("diagnostics")
        .arg("--seconds")
        .arg("1e30")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--seconds is out of range"));
}

#[test]
fn diagnostics_rejects_zero_interval() {
    let mut cmd = cargo_bin_cmd!("clocksuite");
    cmd.arg("diagnostics")
        .arg("--interval-ms")
        .arg("0")
        .arg("--seconds")
        .arg("0.1")
        .assert()
        .failure()
        .stderr(predicate::str::contains("greater than zero"));
}
