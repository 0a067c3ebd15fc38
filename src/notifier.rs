//! Verbosity-aware progress reporting.
//!
//! [`Notifier`] sits on top of the `log` facade and `indicatif`:
//! - [`VerbosityLevel::Quiet`] → `info` messages drive a spinner while the daemon
//!   or the registry is being queried; warnings still reach the log.
//! - [`VerbosityLevel::Info`]/[`VerbosityLevel::Debug`]/[`VerbosityLevel::Trace`] →
//!   plain log lines, no spinner.
//!
//! Commands that hand the terminal to a child process or print a table call
//! [`Notifier::clear`] first.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::LevelFilter;
use std::cell::RefCell;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VerbosityLevel {
    Quiet = 0,
    Info = 1,
    Debug = 2,
    Trace = 3,
}

impl From<u8> for VerbosityLevel {
    fn from(level: u8) -> Self {
        match level {
            0 => VerbosityLevel::Quiet,
            1 => VerbosityLevel::Info,
            2 => VerbosityLevel::Debug,
            _ => VerbosityLevel::Trace,
        }
    }
}

impl VerbosityLevel {
    pub fn to_log_level(self) -> LevelFilter {
        match self {
            VerbosityLevel::Quiet => LevelFilter::Warn,
            VerbosityLevel::Info => LevelFilter::Info,
            VerbosityLevel::Debug => LevelFilter::Debug,
            VerbosityLevel::Trace => LevelFilter::Trace,
        }
    }
}

pub struct Notifier {
    verbosity: VerbosityLevel,
    spinner: RefCell<Option<ProgressBar>>,
    hidden: bool,
}

impl Notifier {
    pub fn new(verbosity_level: u8) -> Self {
        Self {
            verbosity: VerbosityLevel::from(verbosity_level),
            spinner: RefCell::new(None),
            hidden: false,
        }
    }

    /// A notifier that never draws, for tests and non-terminal use.
    pub fn silent() -> Self {
        Self {
            verbosity: VerbosityLevel::Quiet,
            spinner: RefCell::new(None),
            hidden: true,
        }
    }

    pub fn info(&self, message: &str) {
        match self.verbosity {
            VerbosityLevel::Quiet => {
                let mut spinner = self.spinner.borrow_mut();
                let spinner = spinner.get_or_insert_with(|| self.new_spinner());
                spinner.set_message(message.to_string());
            }
            _ => log::info!("{}", message),
        }
    }

    pub fn warn(&self, message: &str) {
        self.clear();
        log::warn!("{}", message);
    }

    /// Removes the spinner, if any, from the terminal.
    pub fn clear(&self) {
        if let Some(spinner) = self.spinner.borrow_mut().take() {
            spinner.finish_and_clear();
        }
    }

    fn new_spinner(&self) -> ProgressBar {
        if self.hidden {
            return ProgressBar::hidden();
        }
        let spinner = ProgressBar::new_spinner();
        spinner.set_draw_target(ProgressDrawTarget::stderr());
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            spinner.set_style(style);
        }
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner
    }
}

impl Drop for Notifier {
    fn drop(&mut self) {
        self.clear();
    }
}
