use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::OnceLock;

use chrono::{DateTime, Local, NaiveDate};

use crate::layout::{daily_log_file_name, SwapLayout};

pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
    pub detail: Option<String>,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            level,
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn render(&self) -> String {
        let mut line = format!(
            "{} [{:<5}] {}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.level.as_str(),
            self.message
        );
        if let Some(detail) = &self.detail {
            line.push(' ');
            line.push_str(detail);
        }
        line
    }
}

#[derive(Debug)]
pub struct UpdateLog {
    dir: Option<PathBuf>,
    app_name: String,
    dir_ready: OnceLock<bool>,
}

impl UpdateLog {
    pub fn new(dir: impl Into<PathBuf>, app_name: impl Into<String>) -> Self {
        Self {
            dir: Some(dir.into()),
            app_name: app_name.into(),
            dir_ready: OnceLock::new(),
        }
    }

    pub fn for_layout(layout: &SwapLayout) -> Self {
        Self {
            dir: layout.log_dir().map(|dir| dir.to_path_buf()),
            app_name: layout.app_name().to_string(),
            dir_ready: OnceLock::new(),
        }
    }

    pub fn disabled() -> Self {
        Self {
            dir: None,
            app_name: String::new(),
            dir_ready: OnceLock::new(),
        }
    }

    pub fn path_for(&self, date: NaiveDate) -> Option<PathBuf> {
        self.dir
            .as_ref()
            .map(|dir| dir.join(daily_log_file_name(&self.app_name, date)))
    }

    pub fn current_path(&self) -> Option<PathBuf> {
        self.path_for(Local::now().date_naive())
    }

    pub fn info(&self, message: impl Into<String>) {
        self.record(&LogEntry::new(LogLevel::Info, message));
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.record(&LogEntry::new(LogLevel::Warn, message));
    }

    pub fn error(&self, message: impl Into<String>, err: &anyhow::Error) {
        self.record(&LogEntry::new(LogLevel::Error, message).with_detail(format!("{err:?}")));
    }

    pub fn record(&self, entry: &LogEntry) {
        match entry.level {
            LogLevel::Info => tracing::info!(target: "hotswap", "{}", entry.message),
            LogLevel::Warn => tracing::warn!(target: "hotswap", "{}", entry.message),
            LogLevel::Error => tracing::error!(
                target: "hotswap",
                detail = entry.detail.as_deref().unwrap_or_default(),
                "{}",
                entry.message
            ),
        }

        let Some(path) = self.path_for(entry.timestamp.date_naive()) else {
            return;
        };
        if !self.ensure_dir() {
            return;
        }

        let mut line = entry.render();
        line.push('\n');
        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut file| {
                file.write_all(line.as_bytes())?;
                file.flush()
            });
        if let Err(err) = written {
            tracing::debug!(path = %path.display(), "update log write failed: {err}");
        }
    }

    fn ensure_dir(&self) -> bool {
        let Some(dir) = &self.dir else {
            return false;
        };
        *self.dir_ready.get_or_init(|| match fs::create_dir_all(dir) {
            Ok(()) => true,
            Err(err) => {
                tracing::debug!(dir = %dir.display(), "update log disabled: {err}");
                false
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_pads_level_and_appends_detail() {
        let entry = LogEntry::new(LogLevel::Info, "replaced A.dll");
        let rendered = entry.render();
        assert!(rendered.ends_with(" [INFO ] replaced A.dll"), "{rendered}");

        let entry = LogEntry::new(LogLevel::Error, "apply failed").with_detail("boom");
        assert!(entry.render().ends_with(" [ERROR] apply failed boom"));
    }

    #[test]
    fn writes_lazily_into_dated_file() {
        let dir = tempfile::tempdir().expect("must create temp dir");
        let log_dir = dir.path().join("nested").join("logs");
        let log = UpdateLog::new(&log_dir, "overlay");
        assert!(!log_dir.exists(), "directory is created on first write");

        log.info("first");
        log.warn("second");

        let path = log.current_path().expect("log path");
        assert_eq!(
            path.file_name().and_then(|name| name.to_str()),
            Some(format!("overlay.{}.log", Local::now().format("%Y-%m-%d")).as_str())
        );
        let raw = fs::read_to_string(&path).expect("must read log");
        let lines = raw.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("[INFO ] first"));
        assert!(lines[1].ends_with("[WARN ] second"));
    }

    #[test]
    fn error_entries_carry_cause_chain() {
        let dir = tempfile::tempdir().expect("must create temp dir");
        let log = UpdateLog::new(dir.path(), "overlay");
        let err = anyhow::anyhow!("disk vanished").context("scan failed");

        log.error("critical error during apply", &err);

        let raw = fs::read_to_string(log.current_path().expect("log path")).expect("read log");
        assert!(raw.contains("[ERROR] critical error during apply"));
        assert!(raw.contains("scan failed"));
        assert!(raw.contains("disk vanished"));
    }

    #[test]
    fn unusable_directory_is_a_silent_no_op() {
        let dir = tempfile::tempdir().expect("must create temp dir");
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"file").expect("must write blocker");

        let log = UpdateLog::new(blocker.join("logs"), "overlay");
        log.info("dropped");
        log.error("also dropped", &anyhow::anyhow!("boom"));

        assert!(!blocker.join("logs").exists());
        UpdateLog::disabled().info("nowhere");
        assert!(UpdateLog::disabled().current_path().is_none());
    }
}
