//! Crash reports.
//!
//! [`init_crash_reporting`] installs a process panic hook that writes a
//! [`CrashReport`] before the default hook runs. The hook fires at the panic
//! site, so the backtrace points at the offending code rather than at the
//! [`recover`](crate::panic::recover) boundary that later hands the panic to
//! the panic policy.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::panic;
use std::path::{Path, PathBuf};
use std::thread;

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use tracing::{error, info, warn};

use crate::panic::panic_message;

struct CrashReporter {
    app_name: String,
    report_dir: PathBuf,
}

static REPORTER: OnceCell<CrashReporter> = OnceCell::new();

/// Install the crash report hook. Only the first enabled call takes effect.
pub fn init_crash_reporting(enabled: bool, report_dir: &Path, app_name: &str) {
    if !enabled {
        return;
    }
    let reporter = CrashReporter {
        app_name: app_name.to_string(),
        report_dir: report_dir.to_path_buf(),
    };
    if REPORTER.set(reporter).is_err() {
        warn!("crash reporting already initialised");
        return;
    }

    if let Err(e) = fs::create_dir_all(report_dir) {
        warn!(dir = %report_dir.display(), "failed to create crash report directory: {}", e);
    }

    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        on_panic(panic_info);
        default_hook(panic_info);
    }));

    info!(dir = %report_dir.display(), "crash reporting initialised");
}

pub fn is_enabled() -> bool {
    REPORTER.get().is_some()
}

pub fn report_dir() -> Option<PathBuf> {
    REPORTER.get().map(|reporter| reporter.report_dir.clone())
}

fn on_panic(panic_info: &panic::PanicHookInfo) {
    let Some(reporter) = REPORTER.get() else {
        return;
    };
    let location = panic_info
        .location()
        .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
        .unwrap_or_else(|| "unknown location".to_string());
    let report = CrashReport::capture(
        &reporter.app_name,
        location,
        panic_message(panic_info.payload()),
    );
    error!(location = %report.location, "PANIC: {}", report.message);

    match report.write_to(&reporter.report_dir) {
        Ok(path) => info!("Crash report written to: {}", path.display()),
        Err(e) => error!("Failed to write crash report: {}", e),
    }
}

/// Everything recorded about one panic
#[derive(Debug)]
pub struct CrashReport {
    pub app_name: String,
    pub timestamp: DateTime<Utc>,
    pub pid: u32,
    pub thread: String,
    pub hostname: String,
    pub location: String,
    pub message: String,
    pub backtrace: backtrace::Backtrace,
}

impl CrashReport {
    /// Record a panic on the current thread, backtrace included.
    pub fn capture(app_name: &str, location: String, message: String) -> Self {
        Self {
            app_name: app_name.to_string(),
            timestamp: Utc::now(),
            pid: std::process::id(),
            thread: thread::current().name().unwrap_or("<unnamed>").to_string(),
            hostname: hostname::get()
                .map(|h| h.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "unknown".to_string()),
            location,
            message,
            backtrace: backtrace::Backtrace::new(),
        }
    }

    /// `crash-<app>-<timestamp>.txt`, with the app name reduced to file-safe characters
    pub fn file_name(&self) -> String {
        let app: String = self
            .app_name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        format!("crash-{}-{}.txt", app, self.timestamp.format("%Y%m%d-%H%M%S%.3f"))
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Forge crash report");
        let _ = writeln!(out, "==================");
        let _ = writeln!(out);
        for (key, value) in [
            ("Application", self.app_name.as_str()),
            ("Thread", self.thread.as_str()),
            ("Hostname", self.hostname.as_str()),
            ("OS", std::env::consts::OS),
            ("Arch", std::env::consts::ARCH),
            ("Location", self.location.as_str()),
            ("Message", self.message.as_str()),
        ] {
            let _ = writeln!(out, "{:<12} {}", format!("{}:", key), value);
        }
        let _ = writeln!(out, "{:<12} {}", "PID:", self.pid);
        let _ = writeln!(
            out,
            "{:<12} {}",
            "Timestamp:",
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        );
        let _ = writeln!(out);
        let _ = writeln!(out, "Backtrace");
        let _ = writeln!(out, "---------");
        let _ = writeln!(out, "{:?}", self.backtrace);
        out
    }

    /// Write the report into `dir` and return the file path. Every I/O error,
    /// including the final write, is returned.
    pub fn write_to(&self, dir: &Path) -> io::Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        fs::write(&path, self.render())?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_report_is_written_with_location_and_message() {
        let temp_dir = env::temp_dir().join(format!("forge-crash-test-{}", std::process::id()));
        let _ = fs::remove_dir_all(&temp_dir);

        let report = CrashReport::capture("Demo App", "src/app.rs:1:1".into(), "boom".into());
        let path = report.write_to(&temp_dir).unwrap();
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("crash-Demo_App-"));

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("Forge crash report"));
        assert!(contents.contains("src/app.rs:1:1"));
        assert!(contents.contains("boom"));

        let _ = fs::remove_dir_all(&temp_dir);
    }

    #[test]
    fn test_write_propagates_io_errors() {
        // A regular file where the report directory should be
        let blocker = env::temp_dir().join(format!("forge-crash-blocker-{}", std::process::id()));
        fs::write(&blocker, b"not a directory").unwrap();

        let report = CrashReport::capture("demo", "here".into(), "boom".into());
        assert!(report.write_to(&blocker).is_err());

        let _ = fs::remove_file(&blocker);
    }

    #[test]
    fn test_disabled_reporting_installs_nothing() {
        init_crash_reporting(false, &env::temp_dir(), "demo");
        assert!(!is_enabled());
        assert!(report_dir().is_none());
    }
}
