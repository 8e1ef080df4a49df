//! Session logger for LiveryFE.
//!
//! One file per session in the OS data directory, truncated at startup:
//!   Windows:  `%APPDATA%\LiveryFE\liveryfe.log`
//!   Linux:    `~/.local/share/LiveryFE/liveryfe.log`
//!   macOS:    `~/Library/Application Support/LiveryFE/liveryfe.log`
//!
//! Use the `log_info!` / `log_warn!` / `log_err!` macros anywhere in the
//! crate. Before `init()` (library use, tests) lines are dropped unless echo
//! is enabled. Logging never returns an error to the caller.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

static LOG_FILE: OnceLock<Mutex<File>> = OnceLock::new();
static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();
static ECHO: AtomicBool = AtomicBool::new(false);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn tag(&self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }
}

/// Mirror every log line to stderr (the CLI's `--verbose`).
pub fn set_echo(enabled: bool) {
    ECHO.store(enabled, Ordering::Relaxed);
}

pub fn write_line(line: &str) {
    if let Some(mutex) = LOG_FILE.get()
        && let Ok(mut file) = mutex.lock()
    {
        let _ = writeln!(file, "{}", line);
    }
}

/// Timestamped, level-tagged line.
pub fn write(level: Level, msg: &str) {
    let line = format_line(&timestamp(), level, msg);
    if ECHO.load(Ordering::Relaxed) {
        eprintln!("{}", line);
    }
    write_line(&line);
}

fn format_line(ts: &str, level: Level, msg: &str) -> String {
    format!("[{}] [{}] {}", ts, level.tag(), msg)
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Info, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Warn, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_err {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Error, &format!($($arg)*))
    };
}

/// Open the session log in the default location. See [`init_at`].
pub fn init() -> Option<PathBuf> {
    init_at(&log_file_path())
}

/// Create (or truncate) the log at `path` and install a panic hook that
/// mirrors panics into it. Only the first successful call takes effect.
/// Returns the active log path, `None` if the file could not be opened.
pub fn init_at(path: &Path) -> Option<PathBuf> {
    if let Some(active) = LOG_PATH.get() {
        return Some(active.clone());
    }

    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path);

    match file {
        Ok(f) => {
            let _ = LOG_PATH.set(path.to_path_buf());
            let _ = LOG_FILE.set(Mutex::new(f));
        }
        Err(e) => {
            eprintln!("[logger] Failed to open log file {:?}: {}", path, e);
            return None;
        }
    }

    write_line(&format!(
        "=== LiveryFE {} session started {} ===",
        env!("CARGO_PKG_VERSION"),
        human_timestamp()
    ));
    write_line(&format!("Log file: {}", path.display()));
    write_line("");

    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        write_line(&format!("[{}] [PANIC] {}", timestamp(), info));
        prev(info);
    }));

    LOG_PATH.get().cloned()
}

fn log_file_path() -> PathBuf {
    data_dir().join("LiveryFE").join("liveryfe.log")
}

/// Platform data directory (without the app sub-folder).
fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata);
        }
    }
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support");
        }
    }
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    PathBuf::from(".")
}

/// `HH:MM:SS.mmm` (UTC) within the current day.
fn timestamp() -> String {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => clock(d.as_secs(), d.subsec_millis()),
        Err(_) => "??:??:??.???".to_string(),
    }
}

fn clock(secs: u64, millis: u32) -> String {
    let h = (secs % 86400) / 3600;
    let m = (secs % 3600) / 60;
    let s = secs % 60;
    format!("{:02}:{:02}:{:02}.{:03}", h, m, s, millis)
}

fn human_timestamp() -> String {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => format!("(unix {})", d.as_secs()),
        Err(_) => "(unknown time)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_wraps_at_midnight() {
        assert_eq!(clock(0, 0), "00:00:00.000");
        assert_eq!(clock(86400 + 3661, 42), "01:01:01.042");
    }

    #[test]
    fn lines_carry_level_tags() {
        assert_eq!(format_line("12:00:00.000", Level::Warn, "font fallback"), "[12:00:00.000] [WARN] font fallback");
        assert_eq!(Level::Error.tag(), "ERROR");
    }

    #[test]
    fn logging_without_init_is_harmless() {
        log_info!("nothing to see {}", 1);
        log_err!("still fine");
    }
}
