use std::io::{self, BufRead, Write};
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use clocksuite::alarm::model::AlarmTime;
use clocksuite::alarm::scheduler::{AlarmStatus, AlarmSystem, ScheduleMatcher};
use clocksuite::config::{NotificationSettings, SuiteConfig, load_config};
use clocksuite::countdown::StudyTimer;
use clocksuite::diagnostics;
use clocksuite::format::{clock_fields, format_lap_delta, format_lap_label, format_stopwatch};
use clocksuite::notify::terminal::{ConsoleNotifications, TerminalBell};
use clocksuite::notify::{NotificationCenter, Notifier, ToneGenerator};
use clocksuite::stopwatch::StopwatchRunner;
use clocksuite::tick::{CLOCK_TICK, Ticker};
use clocksuite::time_provider::{SoftwareTimeProvider, TimeProvider};
use clocksuite::world::{ZoneReading, ZoneSelection};

const RENDER_INTERVAL: Duration = Duration::from_millis(100);
const PROGRESS_WIDTH: usize = 24;

#[derive(Parser, Debug)]
#[command(
    name = "clocksuite",
    version,
    about = "Terminal clock, world clock, study timer, stopwatch and alarms"
)]
struct Cli {
    /// JSON settings file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Live digital clock.
    Clock {
        #[arg(long)]
        once: bool,
    },
    /// Current time in the selected zones.
    World {
        #[arg(long, value_delimiter = ',')]
        zones: Vec<String>,
        #[arg(long)]
        watch: bool,
    },
    /// Study countdown.
    Timer {
        #[arg(long)]
        minutes: Option<String>,
    },
    /// Interactive stopwatch with laps.
    Stopwatch,
    /// Rings at the given times of day.
    Alarm {
        #[arg(long = "at", required = true)]
        at: Vec<String>,
        #[arg(long)]
        label: Vec<String>,
    },
    /// Measures tick lateness.
    Diagnostics {
        #[arg(long, default_value_t = 1_000)]
        interval_ms: u64,
        #[arg(long, default_value_t = 3.0)]
        seconds: f64,
    },
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let config = match cli.config.as_deref() {
        Some(path) => load_config(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => SuiteConfig::default(),
    };
    let clock: Arc<dyn TimeProvider> = Arc::new(SoftwareTimeProvider::new());
    debug!(source = clock.label(), "time source selected");

    match cli.command {
        Command::Clock { once } => run_clock(clock, once),
        Command::World { zones, watch } => {
            let selection = if zones.is_empty() {
                config.world.clone()
            } else {
                ZoneSelection::from_ids(&zones)?
            };
            run_world(clock, &selection, watch)
        }
        Command::Timer { minutes } => {
            let notifier = build_notifier(&config.notifications, &clock);
            run_timer(&config, minutes.as_deref(), clock, notifier)
        }
        Command::Stopwatch => run_stopwatch(&config, clock),
        Command::Alarm { at, label } => {
            let notifier = build_notifier(&config.notifications, &clock);
            run_alarms(&config, &at, &label, clock, notifier)
        }
        Command::Diagnostics {
            interval_ms,
            seconds,
        } => {
            if !seconds.is_finite() || seconds <= 0.0 {
                bail!("--seconds must be greater than zero");
            }
            let duration =
                Duration::try_from_secs_f64(seconds).context("--seconds is out of range")?;
            diagnostics::run_diagnostics(clock, Duration::from_millis(interval_ms), duration)?;
            Ok(())
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("clocksuite={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn build_notifier(
    settings: &NotificationSettings,
    clock: &Arc<dyn TimeProvider>,
) -> Arc<Notifier> {
    let tones = settings
        .sound
        .then(|| Arc::new(TerminalBell) as Arc<dyn ToneGenerator>);
    Arc::new(Notifier::new(
        tones,
        notification_center(settings),
        Arc::clone(clock),
    ))
}

#[cfg(feature = "desktop-notify")]
fn notification_center(settings: &NotificationSettings) -> Arc<dyn NotificationCenter> {
    if settings.enabled {
        Arc::new(clocksuite::notify::desktop::DesktopNotifications)
    } else {
        Arc::new(ConsoleNotifications::new(false))
    }
}

#[cfg(not(feature = "desktop-notify"))]
fn notification_center(settings: &NotificationSettings) -> Arc<dyn NotificationCenter> {
    Arc::new(ConsoleNotifications::new(settings.enabled))
}

/// Lines typed on stdin. The channel disconnects at end of input.
fn spawn_input() -> Result<Receiver<String>> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("stdin".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                if tx.send(line.trim().to_string()).is_err() {
                    break;
                }
            }
        })
        .context("failed to spawn input reader")?;
    Ok(rx)
}

fn poll_input(input: &Receiver<String>, wait: Duration) -> Option<String> {
    match input.recv_timeout(wait) {
        Ok(line) => Some(line),
        Err(RecvTimeoutError::Timeout) => None,
        Err(RecvTimeoutError::Disconnected) => {
            thread::sleep(wait);
            None
        }
    }
}

fn wait_for_quit(input: &Receiver<String>) {
    loop {
        if poll_input(input, RENDER_INTERVAL).as_deref() == Some("q") {
            return;
        }
    }
}

fn redraw(line: &str) {
    let mut stdout = io::stdout().lock();
    let _ = write!(stdout, "\r\x1b[2K{line}");
    let _ = stdout.flush();
}

fn render_clock(now: &DateTime<Local>) -> String {
    let fields = clock_fields(now);
    format!(
        "{}:{}:{}  {}  {}",
        fields.hours, fields.minutes, fields.seconds, fields.weekday, fields.date
    )
}

fn run_clock(clock: Arc<dyn TimeProvider>, once: bool) -> Result<()> {
    if once {
        println!("{}", render_clock(&clock.now()));
        return Ok(());
    }

    let input = spawn_input()?;
    redraw(&render_clock(&clock.now()));
    let mut ticker = Ticker::start("clock", CLOCK_TICK, Arc::clone(&clock), |now| {
        redraw(&render_clock(&now));
        ControlFlow::Continue(())
    })?;
    wait_for_quit(&input);
    ticker.cancel();
    println!();
    Ok(())
}

fn render_reading(reading: &ZoneReading) -> String {
    format!(
        "{:<5} {:<12} {}  {:<12} {:<9} {}",
        reading.zone.name,
        reading.zone.city,
        reading.time,
        reading.date,
        reading.zone.offset_label(),
        reading.day_marker()
    )
}

fn print_world(selection: &ZoneSelection, now: &DateTime<Local>) {
    for reading in selection.readings(now) {
        println!("{}", render_reading(&reading).trim_end());
    }
    let differences = selection.differences();
    if !differences.is_empty() {
        println!("Time differences:");
        for (from, to, diff) in differences {
            println!("  {from} -> {to} {diff}");
        }
    }
}

fn run_world(clock: Arc<dyn TimeProvider>, selection: &ZoneSelection, watch: bool) -> Result<()> {
    print_world(selection, &clock.now());
    if !watch {
        return Ok(());
    }

    let input = spawn_input()?;
    let mut selection = selection.clone();
    println!("Commands: <zone id> = toggle zone, q = quit");
    let mut next_render = Instant::now() + CLOCK_TICK;
    loop {
        if let Some(command) = poll_input(&input, RENDER_INTERVAL) {
            match command.as_str() {
                "q" => return Ok(()),
                "" => {}
                id => match selection.toggle(id) {
                    Ok(selected) => info!(zone = id, selected, "zone toggled"),
                    Err(err) => eprintln!("{err}"),
                },
            }
        }
        if Instant::now() >= next_render {
            println!();
            print_world(&selection, &clock.now());
            next_render += CLOCK_TICK;
        }
    }
}

fn render_progress(percent: f64) -> String {
    let filled = ((percent / 100.0) * PROGRESS_WIDTH as f64).round() as usize;
    let filled = filled.min(PROGRESS_WIDTH);
    format!(
        "[{}{}] {:>3.0}%",
        "#".repeat(filled),
        "-".repeat(PROGRESS_WIDTH - filled),
        percent
    )
}

fn run_timer(
    config: &SuiteConfig,
    minutes: Option<&str>,
    clock: Arc<dyn TimeProvider>,
    notifier: Arc<Notifier>,
) -> Result<()> {
    let mut timer = StudyTimer::new(config.study.default_minutes, notifier, clock);
    if let Some(minutes) = minutes {
        let applied = timer.configure(minutes);
        info!(applied, "study duration configured");
    }

    let presets: Vec<String> = config
        .study
        .presets
        .iter()
        .map(|minutes| format!("{minutes}m"))
        .collect();
    println!("Presets: {}", presets.join(" "));
    println!(
        "Commands: Enter = start/pause, r = reset, <minutes> or <preset>m = set duration, q = quit"
    );

    let input = spawn_input()?;
    timer.start()?;
    loop {
        redraw(&format!(
            "{}  {}  {}",
            timer.display(),
            render_progress(timer.progress()),
            timer.control_label()
        ));

        if timer.state().completed {
            println!();
            while timer.is_chiming() {
                thread::sleep(RENDER_INTERVAL);
            }
            return Ok(());
        }

        let Some(command) = poll_input(&input, RENDER_INTERVAL) else {
            continue;
        };
        match command.as_str() {
            "q" => break,
            "" | "p" => {
                if timer.state().running {
                    timer.pause();
                } else {
                    timer.start()?;
                }
            }
            "r" => timer.reset(),
            other => match other.strip_suffix('m').and_then(|m| m.parse::<u32>().ok()) {
                Some(preset) if config.study.presets.contains(&preset) => {
                    timer.apply_preset(preset);
                }
                _ => {
                    let applied = timer.configure(other);
                    info!(applied, "study duration configured");
                }
            },
        }
    }
    println!();
    Ok(())
}

fn print_laps(stopwatch: &StopwatchRunner) {
    for (lap, highlight) in stopwatch.laps() {
        let mark = match (highlight.best, highlight.worst) {
            (true, _) => "best",
            (_, true) => "worst",
            _ => "",
        };
        println!(
            "  {}  {}  {}  {}",
            format_lap_label(lap.id),
            format_lap_delta(lap.delta_ms),
            format_stopwatch(lap.absolute_ms),
            mark
        );
    }
}

fn run_stopwatch(config: &SuiteConfig, clock: Arc<dyn TimeProvider>) -> Result<()> {
    let mut stopwatch = StopwatchRunner::new(clock)
        .with_refresh_interval(Duration::from_millis(config.stopwatch.refresh_ms));
    println!("Commands: Enter = lap, p = pause/resume, r = reset, q = quit");

    let input = spawn_input()?;
    stopwatch.start()?;
    loop {
        redraw(&format!("{}  {}", stopwatch.display(), stopwatch.control_label()));
        let Some(command) = poll_input(&input, RENDER_INTERVAL) else {
            continue;
        };
        match command.as_str() {
            "q" => break,
            "" => {
                if let Some(lap) = stopwatch.lap() {
                    println!();
                    println!(
                        "{} {}",
                        format_lap_label(lap.id),
                        format_lap_delta(lap.delta_ms)
                    );
                }
            }
            "p" => {
                if stopwatch.is_running() {
                    stopwatch.pause();
                } else {
                    stopwatch.resume()?;
                }
            }
            "r" => {
                if !stopwatch.reset() {
                    println!();
                    println!("pause before resetting");
                }
            }
            other => debug!(command = other, "unknown stopwatch command"),
        }
    }

    stopwatch.pause();
    println!();
    println!("Total {}", stopwatch.display());
    print_laps(&stopwatch);
    Ok(())
}

fn run_alarms(
    config: &SuiteConfig,
    times: &[String],
    labels: &[String],
    clock: Arc<dyn TimeProvider>,
    notifier: Arc<Notifier>,
) -> Result<()> {
    if labels.len() > times.len() {
        bail!("got {} labels for {} alarm times", labels.len(), times.len());
    }
    for time in times {
        AlarmTime::parse(time).with_context(|| format!("invalid --at value '{time}'"))?;
    }

    let matcher = ScheduleMatcher::new(config.alarms.match_mode, config.alarms.catch_up_ms);
    let mut alarms = AlarmSystem::new(matcher, notifier, clock);
    for (index, time) in times.iter().enumerate() {
        let label = labels.get(index).map(String::as_str);
        if let Some(id) = alarms.add(time, label) {
            debug!(id, time = %time, "alarm scheduled");
        }
    }
    for entry in alarms.entries() {
        println!("{}  {}  {}", entry.id, entry.time, entry.label);
    }
    println!(
        "Commands: Enter = dismiss, a HH:MM [label] = add, d <id> = delete, t <id> = toggle, \
         l = list, q = quit"
    );

    let input = spawn_input()?;
    alarms.arm()?;
    let mut announced: Option<u64> = None;
    loop {
        let active = alarms.active();
        if let Some(entry) = &active {
            if announced != Some(entry.id) {
                println!("RINGING: {} {}", entry.time, entry.label);
                announced = Some(entry.id);
            }
        }

        let Some(command) = poll_input(&input, RENDER_INTERVAL) else {
            continue;
        };
        match command.split_whitespace().collect::<Vec<_>>().as_slice() {
            ["q"] => break,
            [] => {
                if let Some(entry) = alarms.dismiss() {
                    println!("dismissed {}", entry.label);
                }
                announced = None;
            }
            ["a", time, label @ ..] => {
                if let Err(err) = AlarmTime::parse(time) {
                    eprintln!("{err}");
                    continue;
                }
                let label = label.join(" ");
                match alarms.add(time, Some(&label)) {
                    Some(id) => println!("added alarm {id}"),
                    None => eprintln!("alarm {time} not added"),
                }
            }
            ["d", id] => match id.parse::<u64>().ok().and_then(|id| alarms.remove(id)) {
                Some(entry) => println!("deleted alarm {} ({})", entry.id, entry.label),
                None => eprintln!("no alarm with id {id}"),
            },
            ["t", id] => match id.parse::<u64>().ok().and_then(|id| alarms.toggle(id)) {
                Some(enabled) => println!("alarm {id} {}", if enabled { "on" } else { "off" }),
                None => eprintln!("no alarm with id {id}"),
            },
            ["l"] => {
                for entry in alarms.entries() {
                    let status = match alarms.status(entry.id) {
                        Some(AlarmStatus::Ringing) => "ringing",
                        Some(AlarmStatus::Disabled) => "off",
                        _ => "armed",
                    };
                    println!("{}  {}  {}  {}", entry.id, entry.time, entry.label, status);
                }
            }
            other => debug!(?other, "unknown alarm command"),
        }
    }

    alarms.disarm();
    let _ = alarms.dismiss();
    Ok(())
}
