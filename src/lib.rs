pub mod alarm;
pub mod config;
pub mod countdown;
pub mod diagnostics;
pub mod error;
pub mod format;
pub mod notify;
pub mod stopwatch;
pub mod tick;
pub mod time_provider;
pub mod world;
