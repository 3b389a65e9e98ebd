//! Text rendering of the filtered view

use std::collections::HashMap;
use std::sync::Arc;

use tangoview_logs::{Column, EventRecord, EventSnapshot};

const TRACE_WIDTH: usize = 5;
const TIME_WIDTH: usize = 21;
const LEVEL_WIDTH: usize = 5;
const SOURCE_WIDTH: usize = 24;

fn format_row(cells: [&str; 5]) -> String {
    let [trace, time, level, source, message] = cells;
    format!(
        "{trace:<TRACE_WIDTH$} {time:<TIME_WIDTH$} {level:<LEVEL_WIDTH$} {source:<SOURCE_WIDTH$} {message}"
    )
}

pub fn table_header() -> String {
    format_row(Column::ALL.map(|c| c.name()))
}

pub fn table_row(event: &EventRecord) -> String {
    let cells = Column::ALL.map(|c| event.cell(c));
    format_row([
        if event.has_trace() { "*" } else { "" },
        cells[1].as_str(),
        cells[2].as_str(),
        cells[3].as_str(),
        // Multi-line messages stay on one row
        cells[4].replace('\n', " ").as_str(),
    ])
}

/// Header plus one line per event, newest first
pub fn render_table(events: &[Arc<EventRecord>]) -> String {
    let mut out = table_header();
    for event in events {
        out.push('\n');
        out.push_str(&table_row(event));
    }
    out
}

/// Full details of one event, as shown when a row is selected
pub fn render_detail(event: &EventRecord) -> String {
    let mut out = format!(
        "Time: {}  Level: {}  Device: {}  Thread: {}\n",
        event.rendered_timestamp(),
        event.level(),
        event.source(),
        event.thread()
    );
    out.push_str(event.message().unwrap_or("<no message>"));
    out.push('\n');

    if let Some(location) = event.location() {
        out.push_str(&format!("Location: {location}\n"));
    }
    if let Some(trace) = event.stack_trace() {
        out.push_str("Stack trace:\n");
        for line in trace {
            out.push_str("    ");
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

pub fn json_line(event: &EventRecord) -> serde_json::Result<String> {
    serde_json::to_string(event)
}

/// Remembers which visible rows follow mode already printed
#[derive(Default)]
pub struct FollowCursor {
    /// Printed rows still visible, keyed by address; holding the `Arc`
    /// keeps an address from being reused by a later record
    printed: HashMap<usize, Arc<EventRecord>>,
}

impl FollowCursor {
    /// Rows of `snapshot` not printed yet, oldest first
    pub fn take_new(&mut self, snapshot: &EventSnapshot) -> Vec<Arc<EventRecord>> {
        let mut visible = HashMap::with_capacity(snapshot.len());
        let mut new_rows = Vec::new();

        for event in snapshot.iter() {
            let key = Arc::as_ptr(event) as usize;
            if !self.printed.contains_key(&key) {
                new_rows.push(Arc::clone(event));
            }
            visible.insert(key, Arc::clone(event));
        }

        self.printed = visible;
        new_rows.reverse();
        new_rows
    }
}
