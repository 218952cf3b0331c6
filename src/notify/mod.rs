//! Audible and visible feedback when an engine reaches its trigger.
//!
//! Engines never talk to an audio device or notification service directly;
//! they hold a [`Notifier`] built from two collaborators, a [`ToneGenerator`]
//! and a [`NotificationCenter`]. Every call to
//! [`Notifier::notify_completion`] returns a [`Playback`] that owns the tone
//! and its repeat schedule; cancelling or dropping it silences the tone.

pub mod terminal;

#[cfg(feature = "desktop-notify")]
pub mod desktop;

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::ClockResult;
use crate::tick::Ticker;
use crate::time_provider::TimeProvider;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Waveform {
    Sine,
    Square,
}

pub trait Tone: Send {
    fn connect_to_output(&mut self) -> ClockResult<()>;
    fn set_gain(&mut self, level: f32);
    fn start(&mut self) -> ClockResult<()>;
    fn stop(&mut self);
}

pub trait ToneGenerator: Send + Sync {
    fn create_tone(&self, frequency_hz: f32, waveform: Waveform) -> ClockResult<Box<dyn Tone>>;
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Permission {
    Undecided,
    Granted,
    Denied,
}

pub trait NotificationCenter: Send + Sync {
    fn permission(&self) -> Permission;
    fn request_permission(&self) -> Permission;
    fn show(&self, title: &str, body: &str) -> ClockResult<()>;
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum NotificationKind {
    StudyComplete,
    AlarmRing { time: String, label: String },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TonePattern {
    Single { length: Duration },
    Pulse { period: Duration, toggles: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneProfile {
    pub frequency_hz: f32,
    pub waveform: Waveform,
    pub gain: f32,
    pub pattern: TonePattern,
}

pub const ALARM_PULSE_TOGGLES: u32 = 5;

impl NotificationKind {
    pub fn tone_profile(&self) -> ToneProfile {
        match self {
            NotificationKind::StudyComplete => ToneProfile {
                frequency_hz: 800.0,
                waveform: Waveform::Sine,
                gain: 0.3,
                pattern: TonePattern::Single {
                    length: Duration::from_millis(500),
                },
            },
            NotificationKind::AlarmRing { .. } => ToneProfile {
                frequency_hz: 880.0,
                waveform: Waveform::Square,
                gain: 0.2,
                pattern: TonePattern::Pulse {
                    period: Duration::from_millis(300),
                    toggles: ALARM_PULSE_TOGGLES,
                },
            },
        }
    }

    pub fn title(&self) -> String {
        match self {
            NotificationKind::StudyComplete => "Study Session Complete!".to_string(),
            NotificationKind::AlarmRing { label, .. } if label.trim().is_empty() => {
                "Alarm: Time!".to_string()
            }
            NotificationKind::AlarmRing { label, .. } => format!("Alarm: {label}"),
        }
    }

    pub fn body(&self) -> String {
        match self {
            NotificationKind::StudyComplete => "Great work! Time to take a break.".to_string(),
            NotificationKind::AlarmRing { time, .. } => format!("It's {time}"),
        }
    }
}

struct Voice {
    tone: Box<dyn Tone>,
    gain: f32,
    stopped: bool,
}

impl Voice {
    fn stop(&mut self) {
        if !self.stopped {
            self.tone.stop();
            self.stopped = true;
        }
    }
}

/// A playing (or finished) tone together with its repeat schedule.
#[derive(Default)]
pub struct Playback {
    voice: Option<Arc<Mutex<Voice>>>,
    schedule: Option<Ticker>,
}

impl Playback {
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn is_playing(&self) -> bool {
        self.voice
            .as_ref()
            .map(|voice| !voice.lock().stopped)
            .unwrap_or(false)
    }

    /// Stops the oscillator and clears the repeat schedule. Idempotent.
    pub fn cancel(&mut self) {
        if let Some(mut schedule) = self.schedule.take() {
            schedule.cancel();
        }
        if let Some(voice) = self.voice.take() {
            voice.lock().stop();
        }
    }
}

impl Drop for Playback {
    fn drop(&mut self) {
        self.cancel();
    }
}

pub struct Notifier {
    tones: Option<Arc<dyn ToneGenerator>>,
    notifications: Arc<dyn NotificationCenter>,
    clock: Arc<dyn TimeProvider>,
}

impl Notifier {
    /// `tones` is `None` when sound is switched off.
    pub fn new(
        tones: Option<Arc<dyn ToneGenerator>>,
        notifications: Arc<dyn NotificationCenter>,
        clock: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            tones,
            notifications,
            clock,
        }
    }

    /// Asks for notification permission if nobody has decided yet.
    pub fn ensure_permission(&self) -> Permission {
        match self.notifications.permission() {
            Permission::Undecided => {
                let decided = self.notifications.request_permission();
                debug!(?decided, "notification permission requested");
                decided
            }
            decided => decided,
        }
    }

    pub fn notify_completion(&self, kind: &NotificationKind) -> Playback {
        info!(title = %kind.title(), "notifying");
        if self.notifications.permission() == Permission::Granted {
            if let Err(err) = self.notifications.show(&kind.title(), &kind.body()) {
                warn!("visible notification failed, audible feedback only: {err}");
            }
        } else {
            debug!("notification permission not granted, audible feedback only");
        }

        match self.play(kind.tone_profile()) {
            Ok(playback) => playback,
            Err(err) => {
                warn!("tone playback unavailable: {err}");
                Playback::silent()
            }
        }
    }

    fn play(&self, profile: ToneProfile) -> ClockResult<Playback> {
        let Some(tones) = self.tones.as_ref() else {
            return Ok(Playback::silent());
        };

        let mut tone = tones.create_tone(profile.frequency_hz, profile.waveform)?;
        tone.connect_to_output()?;
        tone.set_gain(profile.gain);
        tone.start()?;
        let voice = Arc::new(Mutex::new(Voice {
            tone,
            gain: profile.gain,
            stopped: false,
        }));

        let schedule_voice = Arc::clone(&voice);
        let schedule = match profile.pattern {
            TonePattern::Single { length } => Ticker::start(
                "tone",
                length,
                Arc::clone(&self.clock),
                move |_| {
                    schedule_voice.lock().stop();
                    ControlFlow::Break(())
                },
            ),
            TonePattern::Pulse { period, toggles } => {
                let mut toggled = 0;
                Ticker::start("pulse", period, Arc::clone(&self.clock), move |_| {
                    let mut voice = schedule_voice.lock();
                    if toggled >= toggles || voice.stopped {
                        voice.stop();
                        return ControlFlow::Break(());
                    }
                    let level = voice.gain;
                    voice.gain = if level > 0.0 { 0.0 } else { profile.gain };
                    let next = voice.gain;
                    voice.tone.set_gain(next);
                    toggled += 1;
                    ControlFlow::Continue(())
                })
            }
        };

        match schedule {
            Ok(schedule) => Ok(Playback {
                voice: Some(voice),
                schedule: Some(schedule),
            }),
            Err(err) => {
                voice.lock().stop();
                Err(err)
            }
        }
    }
}
