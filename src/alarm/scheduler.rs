use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use chrono::{
    DateTime, Local, LocalResult, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Timelike,
};
use parking_lot::Mutex;
use serde::Deserialize;
use tracing::{debug, info};

use crate::alarm::model::{AlarmEntry, AlarmTime, default_label};
use crate::error::ClockResult;
use crate::notify::{NotificationKind, Notifier, Playback};
use crate::tick::{CLOCK_TICK, TickSlot};
use crate::time_provider::TimeProvider;

pub const DEFAULT_CATCH_UP_MS: u64 = 60_000;
pub const MIN_CATCH_UP_MS: u64 = 1_000;
pub const MAX_CATCH_UP_MS: u64 = 86_400_000;

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Fire once when the tick stream crosses HH:MM:00, whatever second the
    /// tick lands on.
    #[default]
    MinuteCrossing,
    /// Fire only on a tick whose wall time is exactly HH:MM with seconds 0.
    ExactSecond,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum AlarmStatus {
    Disabled,
    Armed,
    Ringing,
}

#[derive(Debug, Clone)]
pub struct RuntimeAlarm {
    pub entry: AlarmEntry,
    last_fired: Option<DateTime<Local>>,
}

impl RuntimeAlarm {
    pub fn last_fired(&self) -> Option<DateTime<Local>> {
        self.last_fired
    }
}

#[derive(Debug, Clone, Default)]
pub struct TickOutcome {
    pub fired: Vec<AlarmEntry>,
}

impl TickOutcome {
    pub fn triggered(&self) -> usize {
        self.fired.len()
    }
}

pub struct ScheduleMatcher {
    alarms: Vec<RuntimeAlarm>,
    next_id: u64,
    active: Option<AlarmEntry>,
    mode: MatchMode,
    catch_up: TimeDelta,
    last_tick: Option<DateTime<Local>>,
}

impl Default for ScheduleMatcher {
    fn default() -> Self {
        Self::new(MatchMode::default(), DEFAULT_CATCH_UP_MS)
    }
}

impl ScheduleMatcher {
    pub fn new(mode: MatchMode, catch_up_ms: u64) -> Self {
        let catch_up_ms = catch_up_ms.clamp(MIN_CATCH_UP_MS, MAX_CATCH_UP_MS);
        let catch_up_ms = i64::try_from(catch_up_ms).unwrap_or(i64::MAX);
        Self {
            alarms: Vec::new(),
            next_id: 1,
            active: None,
            mode,
            catch_up: TimeDelta::try_milliseconds(catch_up_ms).unwrap_or(TimeDelta::days(1)),
            last_tick: None,
        }
    }

    /// Adds an enabled alarm. Returns `None` (and changes nothing) when the
    /// time is empty or not `HH:MM`.
    pub fn add(&mut self, time: &str, label: Option<&str>) -> Option<u64> {
        let time = match AlarmTime::parse(time) {
            Ok(time) => time,
            Err(err) => {
                debug!("alarm not added: {err}");
                return None;
            }
        };
        let label = match label.map(str::trim) {
            Some(label) if !label.is_empty() => label.to_string(),
            _ => default_label(self.alarms.len()),
        };

        let id = self.next_id;
        self.next_id += 1;
        debug!(id, %time, %label, "alarm added");
        self.alarms.push(RuntimeAlarm {
            entry: AlarmEntry {
                id,
                time,
                enabled: true,
                label,
            },
            last_fired: None,
        });
        Some(id)
    }

    pub fn toggle(&mut self, id: u64) -> Option<bool> {
        let runtime = self.alarms.iter_mut().find(|alarm| alarm.entry.id == id)?;
        runtime.entry.enabled = !runtime.entry.enabled;
        debug!(id, enabled = runtime.entry.enabled, "alarm toggled");
        Some(runtime.entry.enabled)
    }

    pub fn remove(&mut self, id: u64) -> Option<AlarmEntry> {
        let index = self.alarms.iter().position(|alarm| alarm.entry.id == id)?;
        Some(self.alarms.remove(index).entry)
    }

    pub fn tick(&mut self, now: DateTime<Local>) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        let window_start = match self.last_tick {
            Some(previous) if previous < now => now
                .checked_sub_signed(self.catch_up)
                .map_or(previous, |floor| previous.max(floor)),
            _ => now.checked_sub_signed(TimeDelta::seconds(1)).unwrap_or(now),
        };
        self.last_tick = Some(now);

        for runtime in &mut self.alarms {
            if !runtime.entry.enabled {
                continue;
            }

            let occurrence = match self.mode {
                MatchMode::MinuteCrossing => {
                    crossed_occurrence(runtime.entry.time, window_start, now)
                }
                MatchMode::ExactSecond => exact_second_occurrence(runtime.entry.time, now),
            };
            let Some(occurrence) = occurrence else {
                continue;
            };
            if runtime.last_fired == Some(occurrence) {
                continue;
            }

            runtime.last_fired = Some(occurrence);
            info!(id = runtime.entry.id, time = %runtime.entry.time, "alarm fired");
            outcome.fired.push(runtime.entry.clone());
        }

        if let Some(last) = outcome.fired.last() {
            self.active = Some(last.clone());
        }
        outcome
    }

    pub fn dismiss(&mut self) -> Option<AlarmEntry> {
        let dismissed = self.active.take();
        if let Some(entry) = &dismissed {
            debug!(id = entry.id, "alarm dismissed");
        }
        dismissed
    }

    pub fn active(&self) -> Option<&AlarmEntry> {
        self.active.as_ref()
    }

    pub fn alarms(&self) -> &[RuntimeAlarm] {
        &self.alarms
    }

    pub fn entries(&self) -> Vec<AlarmEntry> {
        self.alarms
            .iter()
            .map(|runtime| runtime.entry.clone())
            .collect()
    }

    pub fn status(&self, id: u64) -> Option<AlarmStatus> {
        let runtime = self.alarms.iter().find(|alarm| alarm.entry.id == id)?;
        Some(if !runtime.entry.enabled {
            AlarmStatus::Disabled
        } else if self.active.as_ref().is_some_and(|active| active.id == id) {
            AlarmStatus::Ringing
        } else {
            AlarmStatus::Armed
        })
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.alarms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alarms.is_empty()
    }
}

fn crossed_occurrence(
    time: AlarmTime,
    window_start: DateTime<Local>,
    now: DateTime<Local>,
) -> Option<DateTime<Local>> {
    let mut dates = vec![window_start.date_naive()];
    if now.date_naive() != window_start.date_naive() {
        dates.push(now.date_naive());
    }
    dates
        .into_iter()
        .filter_map(|date| occurrence_in_tz(&Local, date, time))
        .find(|candidate| window_start < *candidate && *candidate <= now)
}

fn exact_second_occurrence(time: AlarmTime, now: DateTime<Local>) -> Option<DateTime<Local>> {
    if !time.matches_minute(&now) || now.second() != 0 {
        return None;
    }
    now.with_nanosecond(0)
}

pub(crate) fn occurrence_in_tz<Tz>(
    timezone: &Tz,
    date: NaiveDate,
    time: AlarmTime,
) -> Option<DateTime<Tz>>
where
    Tz: TimeZone,
    Tz::Offset: Copy,
{
    resolve_local_datetime(timezone, date.and_time(time.as_naive()))
}

fn resolve_local_datetime<Tz>(timezone: &Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>>
where
    Tz: TimeZone,
    Tz::Offset: Copy,
{
    match timezone.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(first, _second) => Some(first),
        LocalResult::None => None,
    }
}

struct AlarmShared {
    matcher: ScheduleMatcher,
    ring: Playback,
}

/// Schedule matcher polled by a one-second ticker.
pub struct AlarmSystem {
    shared: Arc<Mutex<AlarmShared>>,
    slot: TickSlot,
    notifier: Arc<Notifier>,
    clock: Arc<dyn TimeProvider>,
    tick_interval: Duration,
}

impl AlarmSystem {
    pub fn new(
        matcher: ScheduleMatcher,
        notifier: Arc<Notifier>,
        clock: Arc<dyn TimeProvider>,
    ) -> Self {
        notifier.ensure_permission();
        Self {
            shared: Arc::new(Mutex::new(AlarmShared {
                matcher,
                ring: Playback::silent(),
            })),
            slot: TickSlot::new(),
            notifier,
            clock,
            tick_interval: CLOCK_TICK,
        }
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Starts polling the wall clock. Replaces any running poll.
    pub fn arm(&mut self) -> ClockResult<()> {
        let shared = Arc::clone(&self.shared);
        let notifier = Arc::clone(&self.notifier);
        self.slot.replace(
            "alarms",
            self.tick_interval,
            Arc::clone(&self.clock),
            move |now| {
                handle_tick(&shared, &notifier, now);
                ControlFlow::Continue(())
            },
        )
    }

    pub fn disarm(&mut self) {
        self.slot.cancel();
    }

    pub fn is_armed(&self) -> bool {
        self.slot.is_active()
    }

    pub fn add(&self, time: &str, label: Option<&str>) -> Option<u64> {
        self.shared.lock().matcher.add(time, label)
    }

    pub fn toggle(&self, id: u64) -> Option<bool> {
        self.shared.lock().matcher.toggle(id)
    }

    pub fn remove(&self, id: u64) -> Option<AlarmEntry> {
        self.shared.lock().matcher.remove(id)
    }

    /// Clears the active alarm and silences its ring.
    pub fn dismiss(&self) -> Option<AlarmEntry> {
        let mut shared = self.shared.lock();
        shared.ring.cancel();
        shared.matcher.dismiss()
    }

    pub fn active(&self) -> Option<AlarmEntry> {
        self.shared.lock().matcher.active().cloned()
    }

    pub fn is_ringing(&self) -> bool {
        self.shared.lock().ring.is_playing()
    }

    pub fn entries(&self) -> Vec<AlarmEntry> {
        self.shared.lock().matcher.entries()
    }

    pub fn status(&self, id: u64) -> Option<AlarmStatus> {
        self.shared.lock().matcher.status(id)
    }
}

fn handle_tick(shared: &Mutex<AlarmShared>, notifier: &Notifier, now: DateTime<Local>) {
    let mut shared = shared.lock();
    let outcome = shared.matcher.tick(now);
    let Some(entry) = outcome.fired.last() else {
        return;
    };
    shared.ring.cancel();
    shared.ring = notifier.notify_completion(&NotificationKind::AlarmRing {
        time: entry.time.to_string(),
        label: entry.label.clone(),
    });
}
