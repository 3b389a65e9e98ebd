use tangoview_types::{EventRecord, Level};

/// Filter selecting which retained events are visible
///
/// Text filters are case-sensitive substrings, trimmed when set. An empty
/// text filter matches everything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    /// Least severe level shown
    min_level: Level,

    /// Substring of the source (logger/device) name
    source: String,

    /// Substring of the rendered timestamp
    timestamp: String,

    /// Substring of the thread name
    thread: String,

    /// Substring of the message
    message: String,
}

impl FilterCriteria {
    /// Criteria matching every event
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_level(mut self, level: Level) -> Self {
        self.min_level = level;
        self
    }

    pub fn with_source(mut self, pattern: &str) -> Self {
        self.source = pattern.trim().to_string();
        self
    }

    pub fn with_timestamp(mut self, pattern: &str) -> Self {
        self.timestamp = pattern.trim().to_string();
        self
    }

    pub fn with_thread(mut self, pattern: &str) -> Self {
        self.thread = pattern.trim().to_string();
        self
    }

    pub fn with_message(mut self, pattern: &str) -> Self {
        self.message = pattern.trim().to_string();
        self
    }

    /// Check if an event matches these criteria
    pub fn matches(&self, event: &EventRecord) -> bool {
        if event.level() < self.min_level
            || !event.source().contains(&self.source)
            || !event.rendered_timestamp().contains(&self.timestamp)
            || !event.thread().contains(&self.thread)
        {
            return false;
        }

        match event.message() {
            // A missing message only passes when no message filter is set
            None => self.message.is_empty(),
            Some(message) => message.contains(&self.message),
        }
    }

    pub fn min_level(&self) -> Level {
        self.min_level
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn thread(&self) -> &str {
        &self.thread
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Check if the criteria match everything
    pub fn is_empty(&self) -> bool {
        self.min_level == Level::Debug
            && self.source.is_empty()
            && self.timestamp.is_empty()
            && self.thread.is_empty()
            && self.message.is_empty()
    }
}

/// Quick filter presets
pub struct FilterPresets;

impl FilterPresets {
    /// Filter for errors only
    pub fn errors_only() -> FilterCriteria {
        FilterCriteria::new().with_min_level(Level::Error)
    }

    /// Filter for warnings and above
    pub fn warnings_and_above() -> FilterCriteria {
        FilterCriteria::new().with_min_level(Level::Warn)
    }

    /// Filter for info and above (no debug)
    pub fn info_and_above() -> FilterCriteria {
        FilterCriteria::new().with_min_level(Level::Info)
    }
}
