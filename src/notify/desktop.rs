use notify_rust::Notification;
#[cfg(all(unix, not(target_os = "macos")))]
use notify_rust::Urgency;

use crate::error::{ClockError, ClockResult};
use crate::notify::{NotificationCenter, Permission};

/// Desktop notifications through the platform notification daemon.
#[derive(Debug, Default)]
pub struct DesktopNotifications;

impl NotificationCenter for DesktopNotifications {
    fn permission(&self) -> Permission {
        Permission::Granted
    }

    fn request_permission(&self) -> Permission {
        Permission::Granted
    }

    fn show(&self, title: &str, body: &str) -> ClockResult<()> {
        let mut notification = Notification::new();
        notification
            .summary(title)
            .body(body)
            .appname("clocksuite")
            .icon("alarm-clock");
        #[cfg(all(unix, not(target_os = "macos")))]
        notification.urgency(Urgency::Critical);
        notification
            .show()
            .map(|_| ())
            .map_err(|err| ClockError::Notification(err.to_string()))
    }
}
