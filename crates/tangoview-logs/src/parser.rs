use chrono::DateTime;
use serde::Deserialize;
use serde_json::Value;

use tangoview_types::{EventRecord, Level};

/// Event as written by the JSON-lines log forwarder
#[derive(Debug, Deserialize)]
struct WireEvent {
    /// Milliseconds since epoch, or an RFC 3339 string
    timestamp: Option<Value>,
    /// Level name or TANGO numeric level
    level: Option<Value>,
    #[serde(alias = "logger", alias = "device", alias = "category")]
    source: Option<String>,
    #[serde(alias = "thread_name")]
    thread: Option<String>,
    #[serde(alias = "msg")]
    message: Option<String>,
    #[serde(alias = "throwable")]
    stack_trace: Option<Vec<String>>,
    location: Option<String>,
}

/// Log parser turning forwarded log lines into event records
pub struct LogParser;

impl LogParser {
    /// Parse a line received from `source_name`
    ///
    /// JSON object lines carry their own fields; anything else is treated as
    /// plain text. `now_ms` stamps lines without a usable timestamp.
    pub fn parse(raw: &str, source_name: &str, now_ms: i64) -> EventRecord {
        if let Some(event) = Self::try_parse_json(raw, source_name, now_ms) {
            return event;
        }

        let (timestamp, content) = Self::extract_rfc3339_prefix(raw);
        let level = Self::extract_level_from_text(content).unwrap_or(Level::Info);
        EventRecord::new(
            timestamp.unwrap_or(now_ms),
            level,
            source_name,
            "",
            Some(content.to_string()),
        )
    }

    fn try_parse_json(raw: &str, source_name: &str, now_ms: i64) -> Option<EventRecord> {
        let trimmed = raw.trim();
        if !trimmed.starts_with('{') {
            return None;
        }
        let wire: WireEvent = serde_json::from_str(trimmed).ok()?;

        let timestamp = wire
            .timestamp
            .as_ref()
            .and_then(Self::timestamp_from_json)
            .unwrap_or(now_ms);
        let level = wire
            .level
            .as_ref()
            .and_then(Self::level_from_json)
            .unwrap_or(Level::Info);
        let source = wire.source.unwrap_or_else(|| source_name.to_string());

        let mut event = EventRecord::new(
            timestamp,
            level,
            source,
            wire.thread.unwrap_or_default(),
            wire.message,
        );
        if let Some(trace) = wire.stack_trace {
            event = event.with_stack_trace(trace);
        }
        if let Some(location) = wire.location {
            event = event.with_location(location);
        }
        Some(event)
    }

    fn timestamp_from_json(value: &Value) -> Option<i64> {
        match value {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|ts| ts.timestamp_millis()),
            _ => None,
        }
    }

    fn level_from_json(value: &Value) -> Option<Level> {
        match value {
            Value::String(s) => s.parse().ok(),
            Value::Number(n) => n.as_i64().and_then(Level::from_tango),
            _ => None,
        }
    }

    /// Split an RFC 3339 timestamp (e.g. `2024-01-15T10:30:00.123Z`) off the
    /// start of a line
    fn extract_rfc3339_prefix(raw: &str) -> (Option<i64>, &str) {
        let Some((head, rest)) = raw.split_once(char::is_whitespace) else {
            return (None, raw);
        };
        match DateTime::parse_from_rfc3339(head) {
            Ok(ts) => (Some(ts.timestamp_millis()), rest.trim_start()),
            Err(_) => (None, raw),
        }
    }

    /// Extract log level from plain text patterns
    fn extract_level_from_text(content: &str) -> Option<Level> {
        let upper = content.to_uppercase();

        // Bracketed patterns first: [ERROR], [WARN], ...
        let bracket_patterns = [
            ("[FATAL]", Level::Fatal),
            ("[CRITICAL]", Level::Fatal),
            ("[ERROR]", Level::Error),
            ("[ERR]", Level::Error),
            ("[WARN]", Level::Warn),
            ("[WARNING]", Level::Warn),
            ("[INFO]", Level::Info),
            ("[DEBUG]", Level::Debug),
        ];
        for (pattern, level) in bracket_patterns {
            if upper.contains(pattern) {
                return Some(level);
            }
        }

        let colon_patterns = [
            ("FATAL:", Level::Fatal),
            ("ERROR:", Level::Error),
            ("WARNING:", Level::Warn),
            ("WARN:", Level::Warn),
            ("INFO:", Level::Info),
            ("DEBUG:", Level::Debug),
        ];
        for (pattern, level) in colon_patterns {
            if upper.contains(pattern) {
                return Some(level);
            }
        }

        // Level as the first word, the usual log4j layout
        let first_word = upper.split_whitespace().next()?;
        first_word.parse().ok()
    }
}
