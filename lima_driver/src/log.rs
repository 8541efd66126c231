//! Driver diagnostics
//!
//! Every component reports through the `driver_*!` macros, which forward to
//! the process-wide sink held by `Driver`. The sink defaults to a coloured
//! console printer and can be replaced with any `Logger`. Errors carry the
//! file and line that raised them.

use colored::*;
use std::time::SystemTime;
use chrono::{DateTime, Local};

/// Sink for driver diagnostics
///
/// Called from whichever thread drives a `Context`, hence `Send + Sync`.
///
/// # Example
///
/// ```no_run
/// use lima_driver::lima::Driver;
/// use lima_driver::lima::log::{Logger, LogEntry, LogSeverity};
///
/// /// Forwards only faults to stderr
/// struct FaultsOnly;
///
/// impl Logger for FaultsOnly {
///     fn log(&self, entry: &LogEntry) {
///         if entry.severity >= LogSeverity::Warn {
///             eprintln!("{}: {}", entry.source, entry.message);
///         }
///     }
/// }
///
/// Driver::set_logger(FaultsOnly);
/// ```
pub trait Logger: Send + Sync {
    fn log(&self, entry: &LogEntry);
}

/// One diagnostic record
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub severity: LogSeverity,
    pub timestamp: SystemTime,

    /// Reporting component, `lima::<Type>`
    pub source: String,

    pub message: String,

    /// Raising file, set for errors only
    pub file: Option<&'static str>,

    /// Raising line, set for errors only
    pub line: Option<u32>,
}

/// Ordered from most to least verbose
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogSeverity {
    /// Per-symbol and per-draw detail
    Trace,
    /// Link results, buffer traffic, presents
    Debug,
    /// Context lifecycle
    Info,
    /// Aborted frames and recoverable cleanup failures
    Warn,
    /// Every error returned to the caller
    Error,
}

/// Console sink installed until `Driver::set_logger` replaces it
///
/// Prints `[time] [SEVERITY] [source] message`, followed by ` (file:line)`
/// when the entry has a location.
pub struct DefaultLogger;

impl Logger for DefaultLogger {
    fn log(&self, entry: &LogEntry) {
        let datetime: DateTime<Local> = entry.timestamp.into();
        let timestamp = datetime.format("%Y-%m-%d %H:%M:%S%.3f").to_string();

        let severity_str = match entry.severity {
            LogSeverity::Trace => "TRACE".bright_black(),
            LogSeverity::Debug => "DEBUG".cyan(),
            LogSeverity::Info => "INFO ".green(),
            LogSeverity::Warn => "WARN ".yellow(),
            LogSeverity::Error => "ERROR".red().bold(),
        };

        let source = entry.source.bright_blue();

        if let (Some(file), Some(line)) = (entry.file, entry.line) {
            println!(
                "[{}] [{}] [{}] {} ({}:{})",
                timestamp,
                severity_str,
                source,
                entry.message,
                file,
                line
            );
        } else {
            println!(
                "[{}] [{}] [{}] {}",
                timestamp,
                severity_str,
                source,
                entry.message
            );
        }
    }
}

// ===== LOGGING MACROS =====

#[macro_export]
macro_rules! driver_trace {
    ($source:expr, $($arg:tt)*) => {
        $crate::lima::Driver::log(
            $crate::lima::log::LogSeverity::Trace,
            $source,
            format!($($arg)*)
        )
    };
}

/// ```no_run
/// lima_driver::driver_debug!("lima::Linker", "Merged {} symbols", 4);
/// ```
#[macro_export]
macro_rules! driver_debug {
    ($source:expr, $($arg:tt)*) => {
        $crate::lima::Driver::log(
            $crate::lima::log::LogSeverity::Debug,
            $source,
            format!($($arg)*)
        )
    };
}

#[macro_export]
macro_rules! driver_info {
    ($source:expr, $($arg:tt)*) => {
        $crate::lima::Driver::log(
            $crate::lima::log::LogSeverity::Info,
            $source,
            format!($($arg)*)
        )
    };
}

#[macro_export]
macro_rules! driver_warn {
    ($source:expr, $($arg:tt)*) => {
        $crate::lima::Driver::log(
            $crate::lima::log::LogSeverity::Warn,
            $source,
            format!($($arg)*)
        )
    };
}

/// Error severity, stamped with the caller's file and line
#[macro_export]
macro_rules! driver_error {
    ($source:expr, $($arg:tt)*) => {
        $crate::lima::Driver::log_detailed(
            $crate::lima::log::LogSeverity::Error,
            $source,
            format!($($arg)*),
            file!(),
            line!()
        )
    };
}

/// Report `err` and evaluate to it, for `ok_or_else` and `map_err`
///
/// ```no_run
/// use lima_driver::lima::Error;
///
/// let err = lima_driver::driver_err!("lima::Binder", Error::SymbolNotFound("uColor".to_string()));
/// ```
#[macro_export]
macro_rules! driver_err {
    ($source:expr, $err:expr) => {{
        let err: $crate::lima::Error = $err;
        $crate::driver_error!($source, "{}", err);
        err
    }};
}

/// Report `err` and return it as `Err` from the enclosing function
#[macro_export]
macro_rules! driver_bail {
    ($source:expr, $err:expr) => {
        return Err($crate::driver_err!($source, $err))
    };
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
