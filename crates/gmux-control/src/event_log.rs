//! Event log controlled by `M929`.
//!
//! When enabled, non-success messages (and, at higher levels, everything)
//! are appended to a file with a timestamp. Logging failures are reported
//! through `tracing` and never fail the code being executed.

use chrono::Local;
use gmux_types::{Message, MessageType};
use std::fmt;
use std::path::PathBuf;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Verbosity selected with `M929 S`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventLogLevel {
    /// Logging disabled.
    #[default]
    Off,
    /// Warnings and errors.
    Warn,
    /// Everything.
    Info,
    /// Everything, plus daemon debug output.
    Debug,
}

impl EventLogLevel {
    /// Maps the `S` parameter of `M929`.
    #[must_use]
    pub fn from_m929(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Off),
            1 => Some(Self::Warn),
            2 => Some(Self::Info),
            3 => Some(Self::Debug),
            _ => None,
        }
    }

    fn includes(self, kind: MessageType) -> bool {
        match kind {
            MessageType::Error | MessageType::Warning => self >= Self::Warn,
            MessageType::Success => self >= Self::Info,
        }
    }
}

impl fmt::Display for EventLogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Off => "off",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
        };
        f.write_str(s)
    }
}

struct Sink {
    file: File,
    virtual_name: String,
    level: EventLogLevel,
}

/// The event log sink.
#[derive(Default)]
pub struct EventLog {
    sink: Mutex<Option<Sink>>,
}

impl EventLog {
    /// Creates a disabled event log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts logging to `physical`, replacing any active sink.
    ///
    /// # Errors
    ///
    /// Propagates file creation failures.
    pub async fn start(
        &self,
        physical: PathBuf,
        virtual_name: String,
        level: EventLogLevel,
    ) -> std::io::Result<()> {
        if let Some(parent) = physical.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&physical)
            .await?;
        let line = format!("{} Event logging started\n", timestamp());
        file.write_all(line.as_bytes()).await?;

        *self.sink.lock().await = Some(Sink {
            file,
            virtual_name,
            level,
        });
        Ok(())
    }

    /// Stops logging, if active.
    pub async fn stop(&self) {
        if let Some(mut sink) = self.sink.lock().await.take() {
            let line = format!("{} Event logging stopped\n", timestamp());
            if let Err(e) = sink.file.write_all(line.as_bytes()).await {
                tracing::warn!(error = %e, "failed to finalize event log");
            }
            let _ = sink.file.flush().await;
        }
    }

    /// Virtual path of the active log file, if any.
    pub async fn active_file(&self) -> Option<String> {
        self.sink
            .lock()
            .await
            .as_ref()
            .map(|s| s.virtual_name.clone())
    }

    /// Appends one message, subject to the level filter. Best effort.
    pub async fn record(&self, message: &Message) {
        let mut guard = self.sink.lock().await;
        let Some(sink) = guard.as_mut() else {
            return;
        };
        if !sink.level.includes(message.kind) {
            return;
        }
        let line = format!("{} {message}\n", timestamp());
        if let Err(e) = sink.file.write_all(line.as_bytes()).await {
            tracing::warn!(error = %e, "failed to append to event log");
        }
    }
}

fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_by_level() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sys/eventlog.txt");

        let log = EventLog::new();
        log.start(path.clone(), "0:/sys/eventlog.txt".into(), EventLogLevel::Warn)
            .await
            .unwrap();
        assert_eq!(log.active_file().await.as_deref(), Some("0:/sys/eventlog.txt"));

        log.record(&Message::error("heater fault")).await;
        log.record(&Message::success("chatter")).await; // below level
        log.stop().await;

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("Event logging started"));
        assert!(content.contains("Error: heater fault"));
        assert!(!content.contains("chatter"));
        assert!(content.contains("Event logging stopped"));
    }

    #[tokio::test]
    async fn info_level_records_success() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");

        let log = EventLog::new();
        log.start(path.clone(), "0:/sys/log.txt".into(), EventLogLevel::Info)
            .await
            .unwrap();
        log.record(&Message::success("all good")).await;
        log.stop().await;

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("all good"));
    }

    #[test]
    fn level_mapping() {
        assert_eq!(EventLogLevel::from_m929(0), Some(EventLogLevel::Off));
        assert_eq!(EventLogLevel::from_m929(1), Some(EventLogLevel::Warn));
        assert_eq!(EventLogLevel::from_m929(2), Some(EventLogLevel::Info));
        assert_eq!(EventLogLevel::from_m929(3), Some(EventLogLevel::Debug));
        assert_eq!(EventLogLevel::from_m929(4), None);
    }
}
