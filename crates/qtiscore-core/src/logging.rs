//! Diagnostic sink for scoring.
//!
//! Scoring never fails because of a bad rule tree; it reports what went wrong
//! through a [`ScoreLogger`] and carries on.

use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

/// Severity of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// One diagnostic, tagged with where in the batch it was raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<String>,
}

impl LogRecord {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            candidate: None,
            item: None,
            test: None,
        }
    }

    pub fn with_candidate(mut self, candidate: Option<&str>) -> Self {
        self.candidate = candidate.map(str::to_string);
        self
    }

    pub fn with_item(mut self, item: impl Into<String>) -> Self {
        self.item = Some(item.into());
        self
    }

    pub fn with_test(mut self, test: impl Into<String>) -> Self {
        self.test = Some(test.into());
        self
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.level)?;
        if let Some(candidate) = &self.candidate {
            write!(f, " candidate={candidate}")?;
        }
        if let Some(item) = &self.item {
            write!(f, " item={item}")?;
        }
        if let Some(test) = &self.test {
            write!(f, " test={test}")?;
        }
        write!(f, " {}", self.message)
    }
}

/// Receives diagnostics raised during scoring.
pub trait ScoreLogger: Send + Sync {
    fn log(&self, record: LogRecord);
}

/// Discards everything. Used when the caller supplies no logger.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLogger;

impl ScoreLogger for NullLogger {
    fn log(&self, _: LogRecord) {}
}

/// Forwards records to `tracing` with structured fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl ScoreLogger for TracingLogger {
    fn log(&self, record: LogRecord) {
        let candidate = record.candidate.as_deref().unwrap_or("-");
        let item = record.item.as_deref().unwrap_or("-");
        let test = record.test.as_deref().unwrap_or("-");
        match record.level {
            LogLevel::Debug => {
                tracing::debug!(candidate, item, test, "{}", record.message)
            }
            LogLevel::Info => tracing::info!(candidate, item, test, "{}", record.message),
            LogLevel::Warn => tracing::warn!(candidate, item, test, "{}", record.message),
            LogLevel::Error => {
                tracing::error!(candidate, item, test, "{}", record.message)
            }
        }
    }
}

/// Keeps every record in memory.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    records: Mutex<Vec<LogRecord>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the records collected so far.
    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    /// Number of records at the given level.
    pub fn count(&self, level: LogLevel) -> usize {
        self.records
            .lock()
            .map(|records| records.iter().filter(|r| r.level == level).count())
            .unwrap_or(0)
    }

    /// Whether any record at `level` contains `needle` in its message.
    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.records
            .lock()
            .map(|records| {
                records
                    .iter()
                    .any(|r| r.level == level && r.message.contains(needle))
            })
            .unwrap_or(false)
    }

    /// Take all records, leaving the logger empty.
    pub fn drain(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .map(|mut records| std::mem::take(&mut *records))
            .unwrap_or_default()
    }
}

impl ScoreLogger for MemoryLogger {
    fn log(&self, record: LogRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record);
        }
    }
}

impl<T: ScoreLogger + ?Sized> ScoreLogger for Arc<T> {
    fn log(&self, record: LogRecord) {
        (**self).log(record)
    }
}

/// Sends every record to both loggers.
impl<A: ScoreLogger, B: ScoreLogger> ScoreLogger for (A, B) {
    fn log(&self, record: LogRecord) {
        self.0.log(record.clone());
        self.1.log(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_logger_collects_and_filters() {
        let logger = MemoryLogger::new();
        logger.log(LogRecord::new(LogLevel::Warn, "Cannot find weight").with_item("ITM-1"));
        logger.log(LogRecord::new(LogLevel::Error, "Cannot cast value"));

        assert_eq!(logger.records().len(), 2);
        assert_eq!(logger.count(LogLevel::Warn), 1);
        assert!(logger.contains(LogLevel::Error, "cast"));
        assert!(!logger.contains(LogLevel::Warn, "cast"));

        assert_eq!(logger.drain().len(), 2);
        assert!(logger.records().is_empty());
    }

    #[test]
    fn tee_forwards_to_both() {
        let left = Arc::new(MemoryLogger::new());
        let right = Arc::new(MemoryLogger::new());
        let tee = (Arc::clone(&left), Arc::clone(&right));
        tee.log(LogRecord::new(LogLevel::Info, "No responseProcessing found"));
        assert_eq!(left.count(LogLevel::Info), 1);
        assert_eq!(right.count(LogLevel::Info), 1);
    }

    #[test]
    fn record_display_includes_scope() {
        let record = LogRecord::new(LogLevel::Error, "boom")
            .with_candidate(Some("cand-1"))
            .with_item("ITM-1");
        assert_eq!(record.to_string(), "[error] candidate=cand-1 item=ITM-1 boom");
    }

    #[test]
    fn levels_are_ordered() {
        assert!(LogLevel::Error > LogLevel::Warn);
        assert!(LogLevel::Info > LogLevel::Debug);
    }
}
