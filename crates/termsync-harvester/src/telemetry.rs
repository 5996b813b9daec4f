//! Log output for the harvester binary.
//!
//! | Variable     | Effect                                             |
//! |--------------|----------------------------------------------------|
//! | `LOG_FORMAT` | `json` or `text` (default)                         |
//! | `LOG_FILE`   | write to this file, rotated daily, instead of stdout |
//! | `LOG_ANSI`   | force colors on or off                             |
//! | `RUST_LOG`   | filter directives                                  |

use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "termsync_harvester=info,termsync_db=info,termsync_core=info";
const DEFAULT_FILE_NAME: &str = "termsync-harvester.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub format: LogFormat,
    pub file: Option<PathBuf>,
    /// `None` means colors on stdout and none in files.
    pub ansi: Option<bool>,
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let format = match lookup("LOG_FORMAT") {
            Some(v) if v.trim().eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };
        let file = lookup("LOG_FILE")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);
        let ansi = lookup("LOG_ANSI").map(|v| matches!(v.trim(), "true" | "1"));
        Self { format, file, ansi }
    }

    /// Install the global subscriber. Keep the returned guard alive until
    /// exit or buffered file output is lost.
    pub fn init(&self) -> anyhow::Result<Option<WorkerGuard>> {
        let (writer, guard) = match &self.file {
            Some(path) => {
                let (dir, name) = split_log_path(path);
                let appender = tracing_appender::rolling::daily(dir, name);
                let (non_blocking, guard) = tracing_appender::non_blocking(appender);
                (BoxMakeWriter::new(non_blocking), Some(guard))
            }
            None => (BoxMakeWriter::new(std::io::stdout), None),
        };

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(self.ansi.unwrap_or(self.file.is_none()));
        let registry = tracing_subscriber::registry().with(filter);
        match self.format {
            LogFormat::Json => registry.with(layer.json()).try_init()?,
            LogFormat::Text => registry.with(layer).try_init()?,
        }
        Ok(guard)
    }
}

/// Directory and file name for the rolling appender.
fn split_log_path(path: &Path) -> (PathBuf, String) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
        .to_path_buf();
    let name = path
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or(DEFAULT_FILE_NAME)
        .to_string();
    (dir, name)
}
