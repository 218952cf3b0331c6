//! Repeating tick source.
//!
//! A [`Ticker`] owns one thread that wakes every `interval`, reads the
//! current wall-clock instant from its [`TimeProvider`] and hands it to the
//! callback. Ticks are delivered strictly in order and never overlap. The
//! callback can end its own ticker by returning [`ControlFlow::Break`].
//!
//! [`TickSlot`] is the holder an engine keeps its ticker in: starting a new
//! ticker through the slot always cancels the previous one first, so an
//! engine never has two live timers.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use tracing::{debug, trace, warn};

use crate::error::ClockResult;
use crate::time_provider::TimeProvider;

pub const CLOCK_TICK: Duration = Duration::from_millis(1_000);
pub const STOPWATCH_TICK: Duration = Duration::from_millis(10);

pub struct Ticker {
    name: String,
    stop: Option<Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl Ticker {
    pub fn start<F>(
        name: &str,
        interval: Duration,
        clock: Arc<dyn TimeProvider>,
        on_tick: F,
    ) -> ClockResult<Self>
    where
        F: FnMut(DateTime<Local>) -> ControlFlow<()> + Send + 'static,
    {
        let interval = interval.max(Duration::from_millis(1));
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let join = thread::Builder::new()
            .name(format!("tick-{name}"))
            .spawn(move || run_tick_loop(interval, clock, stop_rx, on_tick))?;
        debug!(ticker = name, interval_ms = interval.as_millis() as u64, "ticker started");
        Ok(Self {
            name: name.to_string(),
            stop: Some(stop_tx),
            join: Some(join),
        })
    }

    /// Stops the ticker and waits for an in-flight tick to finish.
    ///
    /// Safe to call any number of times. After it returns the callback is
    /// never invoked again.
    pub fn cancel(&mut self) {
        let Some(stop) = self.stop.take() else {
            return;
        };
        drop(stop);
        if let Some(join) = self.join.take() {
            // A callback that drops its own ticker must not join itself.
            if join.thread().id() != thread::current().id() {
                if join.join().is_err() {
                    warn!(ticker = %self.name, "tick callback panicked");
                }
            }
        }
        debug!(ticker = %self.name, "ticker cancelled");
    }

    pub fn is_active(&self) -> bool {
        self.join
            .as_ref()
            .map(|join| !join.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn run_tick_loop<F>(
    interval: Duration,
    clock: Arc<dyn TimeProvider>,
    stop: mpsc::Receiver<()>,
    mut on_tick: F,
) where
    F: FnMut(DateTime<Local>) -> ControlFlow<()>,
{
    let mut next_tick = Instant::now() + interval;
    loop {
        let wait = next_tick.saturating_duration_since(Instant::now());
        match stop.recv_timeout(wait) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }

        if on_tick(clock.now()).is_break() {
            trace!("tick callback ended its ticker");
            break;
        }

        next_tick += interval;
        let current = Instant::now();
        if next_tick <= current {
            // Fell behind; skip the missed slots instead of bursting.
            let behind = current.duration_since(next_tick);
            let skipped = behind.as_nanos() / interval.as_nanos() + 1;
            next_tick += interval * u32::try_from(skipped).unwrap_or(u32::MAX);
        }
    }
}

/// The single timer handle an engine owns.
#[derive(Default)]
pub struct TickSlot {
    active: Option<Ticker>,
}

impl TickSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&mut self) {
        if let Some(mut ticker) = self.active.take() {
            ticker.cancel();
        }
    }

    /// Cancels whatever is running, then starts a fresh ticker.
    pub fn replace<F>(
        &mut self,
        name: &str,
        interval: Duration,
        clock: Arc<dyn TimeProvider>,
        on_tick: F,
    ) -> ClockResult<()>
    where
        F: FnMut(DateTime<Local>) -> ControlFlow<()> + Send + 'static,
    {
        self.cancel();
        self.active = Some(Ticker::start(name, interval, clock, on_tick)?);
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.active.as_ref().is_some_and(Ticker::is_active)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use super::*;
    use crate::time_provider::SoftwareTimeProvider;

    fn clock() -> Arc<dyn TimeProvider> {
        Arc::new(SoftwareTimeProvider::new())
    }

    fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        condition()
    }

    #[test]
    fn ticker_delivers_ticks_until_cancelled() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let mut ticker = Ticker::start("test", Duration::from_millis(2), clock(), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            ControlFlow::Continue(())
        })
        .expect("ticker");

        assert!(wait_for(|| count.load(Ordering::SeqCst) >= 3));
        ticker.cancel();
        let after_cancel = count.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(count.load(Ordering::SeqCst), after_cancel);
        assert!(!ticker.is_active());

        ticker.cancel();
        assert_eq!(count.load(Ordering::SeqCst), after_cancel);
    }

    #[test]
    fn callback_break_ends_ticker() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let ticker = Ticker::start("break", Duration::from_millis(1), clock(), move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) + 1 >= 3 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .expect("ticker");

        assert!(wait_for(|| !ticker.is_active()));
        thread::sleep(Duration::from_millis(10));
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn ticks_arrive_in_increasing_time_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut ticker = Ticker::start("order", Duration::from_millis(1), clock(), move |now| {
            sink.lock().push(now);
            ControlFlow::Continue(())
        })
        .expect("ticker");

        assert!(wait_for(|| seen.lock().len() >= 5));
        ticker.cancel();
        let seen = seen.lock();
        assert!(seen.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn slot_replace_keeps_a_single_live_ticker() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let mut slot = TickSlot::new();

        let counter = Arc::clone(&first);
        slot.replace("first", Duration::from_millis(1), clock(), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            ControlFlow::Continue(())
        })
        .expect("first");
        assert!(wait_for(|| first.load(Ordering::SeqCst) > 0));

        let counter = Arc::clone(&second);
        slot.replace("second", Duration::from_millis(1), clock(), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            ControlFlow::Continue(())
        })
        .expect("second");
        let first_frozen = first.load(Ordering::SeqCst);
        assert!(wait_for(|| second.load(Ordering::SeqCst) > 0));
        thread::sleep(Duration::from_millis(10));
        assert_eq!(first.load(Ordering::SeqCst), first_frozen);
        assert!(slot.is_active());

        slot.cancel();
        assert!(!slot.is_active());
    }
}
