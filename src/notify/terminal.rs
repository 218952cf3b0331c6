use std::io::{self, Write};

use parking_lot::Mutex;
use tracing::trace;

use crate::error::{ClockError, ClockResult};
use crate::notify::{NotificationCenter, Permission, Tone, ToneGenerator, Waveform};

const BELL: &[u8] = b"\x07";

/// Rings the terminal bell on every rising gain edge.
#[derive(Debug, Default)]
pub struct TerminalBell;

impl ToneGenerator for TerminalBell {
    fn create_tone(&self, frequency_hz: f32, waveform: Waveform) -> ClockResult<Box<dyn Tone>> {
        trace!(frequency_hz, ?waveform, "terminal tone created");
        Ok(Box::new(BellTone {
            connected: false,
            running: false,
            gain: 0.0,
        }))
    }
}

struct BellTone {
    connected: bool,
    running: bool,
    gain: f32,
}

impl BellTone {
    fn ring(&self) {
        if !(self.connected && self.running && self.gain > 0.0) {
            return;
        }
        let mut stderr = io::stderr().lock();
        let _ = stderr.write_all(BELL);
        let _ = stderr.flush();
    }
}

impl Tone for BellTone {
    fn connect_to_output(&mut self) -> ClockResult<()> {
        self.connected = true;
        Ok(())
    }

    fn set_gain(&mut self, level: f32) {
        let rising = self.gain <= 0.0 && level > 0.0;
        self.gain = level;
        if rising {
            self.ring();
        }
    }

    fn start(&mut self) -> ClockResult<()> {
        if !self.connected {
            return Err(ClockError::ToneUnavailable(
                "tone started before it was connected".to_string(),
            ));
        }
        self.running = true;
        self.ring();
        Ok(())
    }

    fn stop(&mut self) {
        self.running = false;
    }
}

/// Prints notifications as a banner line on stdout.
pub struct ConsoleNotifications {
    allowed: bool,
    permission: Mutex<Permission>,
}

impl ConsoleNotifications {
    pub fn new(allowed: bool) -> Self {
        Self {
            allowed,
            permission: Mutex::new(Permission::Undecided),
        }
    }
}

impl NotificationCenter for ConsoleNotifications {
    fn permission(&self) -> Permission {
        *self.permission.lock()
    }

    fn request_permission(&self) -> Permission {
        let mut permission = self.permission.lock();
        if *permission == Permission::Undecided {
            *permission = if self.allowed {
                Permission::Granted
            } else {
                Permission::Denied
            };
        }
        *permission
    }

    fn show(&self, title: &str, body: &str) -> ClockResult<()> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "\n*** {title} *** {body}")
            .and_then(|()| stdout.flush())
            .map_err(|err| ClockError::Notification(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn console_permission_is_decided_once() {
        let granted = ConsoleNotifications::new(true);
        assert_eq!(granted.permission(), Permission::Undecided);
        assert_eq!(granted.request_permission(), Permission::Granted);
        assert_eq!(granted.permission(), Permission::Granted);

        let denied = ConsoleNotifications::new(false);
        assert_eq!(denied.request_permission(), Permission::Denied);
        assert_eq!(denied.request_permission(), Permission::Denied);
    }

    #[test]
    fn bell_tone_requires_connection_before_start() {
        let mut tone = TerminalBell
            .create_tone(800.0, Waveform::Sine)
            .expect("tone");
        assert!(tone.start().is_err());
        tone.connect_to_output().expect("connect");
        tone.start().expect("start");
        tone.stop();
    }
}
