//! Shared types for tangoview
//!
//! This crate contains the event record and severity types used by the
//! store, the ingestion layer and the renderer.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// Severity
// ============================================================================

/// Log severity level, ordered from least to most severe
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    #[default]
    #[serde(alias = "debug")]
    Debug,
    #[serde(alias = "info")]
    Info,
    #[serde(alias = "warn", alias = "WARNING", alias = "warning")]
    Warn,
    #[serde(alias = "error")]
    Error,
    #[serde(alias = "fatal")]
    Fatal,
}

/// Error returned when a level name is not recognised
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown log level '{0}'")]
pub struct ParseLevelError(pub String);

impl Level {
    /// All levels, least severe first
    pub const ALL: [Level; 5] = [
        Level::Debug,
        Level::Info,
        Level::Warn,
        Level::Error,
        Level::Fatal,
    ];

    /// Map a TANGO device logging level (0 = OFF .. 5 = DEBUG)
    ///
    /// OFF has no event counterpart and yields `None`.
    pub fn from_tango(level: i64) -> Option<Self> {
        match level {
            1 => Some(Self::Fatal),
            2 => Some(Self::Error),
            3 => Some(Self::Warn),
            4 => Some(Self::Info),
            5 => Some(Self::Debug),
            _ => None,
        }
    }

    /// Display name as shown in the Level column
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
        }
    }
}

impl FromStr for Level {
    type Err = ParseLevelError;

    /// Parse log level from common formats
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "debug" | "dbg" | "debg" | "trace" => Ok(Self::Debug),
            "info" | "inf" | "information" => Ok(Self::Info),
            "warn" | "warning" | "wrn" => Ok(Self::Warn),
            "error" | "err" | "erro" => Ok(Self::Error),
            "fatal" | "panic" | "critical" | "crit" | "ftl" => Ok(Self::Fatal),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Table columns
// ============================================================================

/// Columns of the event table, in display order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Column {
    Trace,
    Time,
    Level,
    Source,
    Message,
}

impl Column {
    pub const ALL: [Column; 5] = [
        Column::Trace,
        Column::Time,
        Column::Level,
        Column::Source,
        Column::Message,
    ];

    /// Header text for this column
    pub fn name(&self) -> &'static str {
        match self {
            Self::Trace => "Trace",
            Self::Time => "Time",
            Self::Level => "Level",
            Self::Source => "Source",
            Self::Message => "Message",
        }
    }
}

/// Header names of the five table columns
pub const COLUMN_NAMES: [&str; 5] = ["Trace", "Time", "Level", "Source", "Message"];

// ============================================================================
// Event record
// ============================================================================

/// Render a millisecond timestamp as `DD/MM/YY HH:MM:SS.mmm` in local time
///
/// Values outside the calendar range are rendered as the raw number.
pub fn render_timestamp(timestamp_ms: i64) -> String {
    match DateTime::from_timestamp_millis(timestamp_ms) {
        Some(ts) => ts
            .with_timezone(&Local)
            .format("%d/%m/%y %H:%M:%S%.3f")
            .to_string(),
        None => format!("{timestamp_ms} ms"),
    }
}

/// A single log event received from a device
///
/// Records are built once and never mutated after being handed to the
/// store; the store shares them as `Arc<EventRecord>`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EventRecord {
    /// Milliseconds since the Unix epoch
    timestamp_ms: i64,

    /// Timestamp text, cached for display and time filtering
    rendered_timestamp: String,

    level: Level,

    /// Originating logger or device name
    source: String,

    thread: String,

    /// `None` is distinct from an empty message
    message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    stack_trace: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<String>,
}

impl EventRecord {
    pub fn new(
        timestamp_ms: i64,
        level: Level,
        source: impl Into<String>,
        thread: impl Into<String>,
        message: Option<String>,
    ) -> Self {
        Self {
            timestamp_ms,
            rendered_timestamp: render_timestamp(timestamp_ms),
            level,
            source: source.into(),
            thread: thread.into(),
            message,
            stack_trace: None,
            location: None,
        }
    }

    /// Attach a stack trace, one line per element
    pub fn with_stack_trace(mut self, lines: Vec<String>) -> Self {
        self.stack_trace = Some(lines);
        self
    }

    /// Attach location details (file, line, function)
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }

    pub fn rendered_timestamp(&self) -> &str {
        &self.rendered_timestamp
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn thread(&self) -> &str {
        &self.thread
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn stack_trace(&self) -> Option<&[String]> {
        self.stack_trace.as_deref()
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Whether the event carries a stack trace (the Trace column)
    pub fn has_trace(&self) -> bool {
        self.stack_trace.is_some()
    }

    /// Cell text for a table column
    pub fn cell(&self, column: Column) -> String {
        match column {
            Column::Trace => (if self.has_trace() { "yes" } else { "no" }).to_string(),
            Column::Time => self.rendered_timestamp.clone(),
            Column::Level => self.level.as_str().to_string(),
            Column::Source => self.source.clone(),
            Column::Message => self.message.clone().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(Level::Debug < Level::Info);
        assert!(Level::Info < Level::Warn);
        assert!(Level::Warn < Level::Error);
        assert!(Level::Error < Level::Fatal);
        assert_eq!(Level::default(), Level::Debug);
    }

    #[test]
    fn test_level_from_str_aliases() {
        assert_eq!("warning".parse::<Level>(), Ok(Level::Warn));
        assert_eq!(" ERR ".parse::<Level>(), Ok(Level::Error));
        assert_eq!("Crit".parse::<Level>(), Ok(Level::Fatal));
        assert!("loud".parse::<Level>().is_err());
    }

    #[test]
    fn test_level_from_tango() {
        assert_eq!(Level::from_tango(0), None);
        assert_eq!(Level::from_tango(1), Some(Level::Fatal));
        assert_eq!(Level::from_tango(3), Some(Level::Warn));
        assert_eq!(Level::from_tango(5), Some(Level::Debug));
        assert_eq!(Level::from_tango(6), None);
    }

    #[test]
    fn test_level_serde_names() {
        let level: Level = serde_json::from_str("\"warning\"").unwrap();
        assert_eq!(level, Level::Warn);
        assert_eq!(serde_json::to_string(&Level::Fatal).unwrap(), "\"FATAL\"");
    }

    #[test]
    fn test_rendered_timestamp_shape() {
        let rendered = render_timestamp(1_700_000_000_123);
        let bytes = rendered.as_bytes();
        assert_eq!(rendered.len(), 21);
        assert_eq!(bytes[2], b'/');
        assert_eq!(bytes[5], b'/');
        assert_eq!(bytes[8], b' ');
        assert_eq!(bytes[11], b':');
        assert_eq!(bytes[14], b':');
        assert_eq!(bytes[17], b'.');
        assert!(rendered.ends_with("123"));
    }

    #[test]
    fn test_out_of_range_timestamp_keeps_raw_value() {
        assert_eq!(render_timestamp(i64::MAX), format!("{} ms", i64::MAX));
        assert_eq!(render_timestamp(i64::MIN), format!("{} ms", i64::MIN));
    }

    #[test]
    fn test_record_is_cached_at_construction() {
        let record = EventRecord::new(42, Level::Info, "sys/tg_test/1", "main", None);
        assert_eq!(record.rendered_timestamp(), render_timestamp(42));
        assert_eq!(record.message(), None);
        assert!(!record.has_trace());
    }

    #[test]
    fn test_cells() {
        let record = EventRecord::new(0, Level::Error, "sys/tg_test/1", "worker", None)
            .with_stack_trace(vec!["at foo".to_string()]);
        assert_eq!(record.cell(Column::Trace), "yes");
        assert_eq!(record.cell(Column::Level), "ERROR");
        assert_eq!(record.cell(Column::Source), "sys/tg_test/1");
        assert_eq!(record.cell(Column::Message), "");

        let names: Vec<_> = Column::ALL.iter().map(|c| c.name()).collect();
        assert_eq!(names, COLUMN_NAMES);
    }
}
