use std::fs::{create_dir_all, read_to_string, write};
use std::path::PathBuf;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use tklog::{Format, LEVEL, LOG};

const LOG_FILE_ENV: &str = "KPDF_HIGHLIGHTS_LOG_FILE";
const LOG_FILE_NAME: &str = "highlights.log";
const LOGGING_STATE_FILE_NAME: &str = "highlights_logging_enabled";

static LOG_PATH: OnceLock<Option<PathBuf>> = OnceLock::new();
static FILE_LOGGING_ENABLED: AtomicBool = AtomicBool::new(false);
static FILE_HANDLER_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Per-user kPDF state directory shared by the log, the logging toggle and
/// the configuration file.
pub fn state_dir() -> PathBuf {
    if let Some(app_data) = std::env::var_os("APPDATA") {
        return PathBuf::from(app_data).join("kpdf");
    }

    if let Some(home) = std::env::var_os("HOME") {
        return PathBuf::from(home).join(".kpdf");
    }

    std::env::temp_dir().join("kpdf")
}

fn resolve_log_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(LOG_FILE_ENV)
        && !path.is_empty()
    {
        return Some(PathBuf::from(path));
    }

    Some(state_dir().join("logs").join(LOG_FILE_NAME))
}

fn logging_state_path() -> PathBuf {
    state_dir().join(LOGGING_STATE_FILE_NAME)
}

fn parse_enabled_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn persisted_logging_enabled() -> bool {
    read_to_string(logging_state_path())
        .map(|raw| parse_enabled_flag(&raw))
        .unwrap_or(false)
}

fn persist_logging_enabled(enabled: bool) {
    let path = logging_state_path();
    if let Some(parent) = path.parent() {
        let _ = create_dir_all(parent);
    }
    let _ = write(path, if enabled { "1" } else { "0" });
}

pub fn log_file_path() -> Option<PathBuf> {
    LOG_PATH.get_or_init(resolve_log_path).clone()
}

pub fn file_logging_enabled() -> bool {
    FILE_LOGGING_ENABLED.load(Ordering::Relaxed)
}

/// Turns on the rotating debug log and remembers the choice for later runs.
pub fn enable_file_logging() -> bool {
    if file_logging_enabled() {
        return true;
    }

    let Some(path) = log_file_path() else {
        eprintln!("[log] cannot enable file logging: no writable path");
        return false;
    };

    if let Some(parent) = path.parent()
        && let Err(err) = create_dir_all(parent)
    {
        eprintln!(
            "[log] failed to create log dir: {} | {}",
            parent.display(),
            err
        );
        return false;
    }

    if !FILE_HANDLER_INITIALIZED.swap(true, Ordering::Relaxed) {
        let path_string = path.to_string_lossy().to_string();
        LOG.set_cutmode_by_size(&path_string, 10 * 1024 * 1024, 5, true);
    }

    FILE_LOGGING_ENABLED.store(true, Ordering::Relaxed);
    persist_logging_enabled(true);
    true
}

pub fn disable_file_logging() {
    FILE_LOGGING_ENABLED.store(false, Ordering::Relaxed);
    persist_logging_enabled(false);
}

pub fn initialize() {
    LOG.set_level(LEVEL::Debug)
        .set_console(true)
        .set_format(Format::LevelFlag | Format::Date | Format::Time | Format::ShortFileName)
        .set_formatter("{level}{time} {file}:{message}\n");

    if persisted_logging_enabled() {
        let _ = enable_file_logging();
    }
}

/// Debug trace, written only while file logging is on.
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {{
        if $crate::logger::file_logging_enabled() {
            tklog::debug!(format!($($arg)*));
        }
    }};
}

/// Failures nobody awaits. Always logged.
#[macro_export]
macro_rules! warn_log {
    ($($arg:tt)*) => {{
        tklog::warn!(format!($($arg)*));
    }};
}
