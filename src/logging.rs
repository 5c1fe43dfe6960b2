use anyhow::{Context, Result};
use camino::Utf8Path;
use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Prefix of the rotating log files, e.g. `horus.2026-10-19`
pub const LOG_PREFIX: &str = "horus";

/// Logging options read from the command line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogOptions {
    /// Use debug level instead of info (`RUST_LOG` overrides both)
    pub debug: bool,
    /// Mirror log lines to stderr
    pub console: bool,
}

impl LogOptions {
    /// Recognizes `--debug` and `--console`; other arguments are ignored
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut options = Self::default();
        for arg in args {
            match arg.as_ref() {
                "--debug" => options.debug = true,
                "--console" => options.console = true,
                _ => {}
            }
        }
        options
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(if self.debug { "debug" } else { "info" }))
    }
}

/// Setup logging with a daily rotating file appender in `log_dir`.
///
/// # Returns
/// A guard that must be held for the duration of the program to keep logging active
pub fn setup_logging(log_dir: &Utf8Path, options: LogOptions) -> Result<WorkerGuard> {
    if !log_dir.exists() {
        fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory: {}", log_dir))?;
    }

    let file_appender = rolling::daily(log_dir, LOG_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false) // No ANSI codes in log files
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let console_layer = options.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(options.filter())
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to install the global tracing subscriber")?;

    tracing::info!(
        "Logging initialized: dir={}, debug={}, console={}",
        log_dir,
        options.debug,
        options.console
    );

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_options_from_args() {
        let options = LogOptions::from_args(["horus", "--console", "--unknown"]);
        assert!(options.console);
        assert!(!options.debug);

        let options = LogOptions::from_args(["--debug"]);
        assert!(options.debug);
    }

    #[test]
    fn test_setup_logging_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let log_dir = Utf8PathBuf::try_from(temp_dir.path().join("logs")).unwrap();

        // A second global subscriber in the same test binary fails to install,
        // but the directory is created before that point either way.
        let _guard = setup_logging(&log_dir, LogOptions::default());

        assert!(log_dir.exists());
    }
}
