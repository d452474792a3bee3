//! Logging init: file sink (explicit path or XDG state dir) with graceful
//! fallback to stdout, and begin/end markers around each run.

use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,fahcanary=debug";

/// Where log lines go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSink {
    Stdout,
    File(PathBuf),
    /// Stdout because the intended file sink could not be resolved.
    StdoutFallback { reason: String },
}

impl LogSink {
    /// `explicit` if given, else the XDG default; stdout (with the reason
    /// kept) when the default location cannot be resolved.
    pub fn file_or_fallback(
        explicit: Option<PathBuf>,
        default: impl FnOnce() -> Result<PathBuf>,
    ) -> Self {
        match explicit {
            Some(path) => LogSink::File(path),
            None => match default() {
                Ok(path) => LogSink::File(path),
                Err(e) => LogSink::StdoutFallback {
                    reason: format!("{:#}", e),
                },
            },
        }
    }
}

/// Writer that is either a file or stdout (used when file clone fails).
enum FileOrStdout {
    File(fs::File),
    Stdout,
}

impl io::Write for FileOrStdout {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            FileOrStdout::File(f) => f.write(buf),
            FileOrStdout::Stdout => io::stdout().lock().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            FileOrStdout::File(f) => f.flush(),
            FileOrStdout::Stdout => io::stdout().lock().flush(),
        }
    }
}

struct FileMakeWriter(fs::File);

impl<'a> MakeWriter<'a> for FileMakeWriter {
    type Writer = FileOrStdout;

    fn make_writer(&'a self) -> Self::Writer {
        self.0
            .try_clone()
            .map(FileOrStdout::File)
            .unwrap_or(FileOrStdout::Stdout)
    }
}

/// `~/.local/state/fahcanary/fahcanary.log`.
pub fn default_log_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("fahcanary")?;
    let path = xdg_dirs
        .place_state_file("fahcanary.log")
        .context("failed to create log directory")?;
    Ok(path)
}

fn open_log_file(path: &Path) -> Result<fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber for `sink`. If the log file cannot be
/// opened, logging falls back to stdout and the reason is logged there.
/// Fails only if no subscriber could be installed at all.
pub fn init_logging(sink: &LogSink) -> Result<LogSession> {
    let (writer, fallback_reason) = select_writer(sink);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {}", e))?;

    if let Some(reason) = fallback_reason {
        tracing::warn!("falling back to stdout logging: {}", reason);
    }
    Ok(LogSession::begin())
}

/// Writer for `sink`, plus the reason when it had to fall back to stdout.
fn select_writer(sink: &LogSink) -> (BoxMakeWriter, Option<String>) {
    match sink {
        LogSink::Stdout => (BoxMakeWriter::new(io::stdout), None),
        LogSink::StdoutFallback { reason } => {
            (BoxMakeWriter::new(io::stdout), Some(reason.clone()))
        }
        LogSink::File(path) => match open_log_file(path) {
            Ok(file) => (BoxMakeWriter::new(FileMakeWriter(file)), None),
            Err(e) => (BoxMakeWriter::new(io::stdout), Some(format!("{:#}", e))),
        },
    }
}

/// Writes the opening marker on creation and the closing marker on drop.
#[derive(Debug)]
pub struct LogSession {
    _private: (),
}

impl LogSession {
    pub fn begin() -> Self {
        tracing::info!("========== BEGINNING LOG ==========");
        Self { _private: () }
    }
}

impl Drop for LogSession {
    fn drop(&mut self) {
        tracing::info!("=========== CLOSING LOG ===========");
    }
}
