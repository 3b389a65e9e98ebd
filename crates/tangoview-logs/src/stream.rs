use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::parser::LogParser;
use crate::store::EventStore;

/// Feeds log lines from any number of inputs into an [`EventStore`]
pub struct IngestManager {
    store: EventStore,

    /// Cancellation token for stopping readers
    cancel: CancellationToken,

    /// Active reader task handles
    tasks: Vec<tokio::task::JoinHandle<()>>,

    /// Lines read per logging source
    line_counters: Arc<RwLock<HashMap<String, AtomicU64>>>,
}

impl IngestManager {
    pub fn new(store: EventStore) -> Self {
        Self {
            store,
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
            line_counters: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Start reading lines from `reader`, tagging events with `name` when
    /// the line does not carry its own source
    pub fn add_source<R>(&mut self, name: impl Into<String>, reader: R)
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        let name = name.into();
        self.line_counters
            .write()
            .insert(name.clone(), AtomicU64::new(0));

        let cancel = self.cancel.clone();
        let store = self.store.clone();
        let line_counters = Arc::clone(&self.line_counters);

        let task = tokio::spawn(async move {
            let mut lines = reader.lines();

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,

                    result = lines.next_line() => {
                        match result {
                            Ok(Some(line)) => {
                                if line.trim().is_empty() {
                                    continue;
                                }
                                if let Some(counter) = line_counters.read().get(&name) {
                                    counter.fetch_add(1, Ordering::Relaxed);
                                }
                                let event = LogParser::parse(&line, &name, store.now_ms());
                                store.add_event(event);
                            }
                            Ok(None) => {
                                debug!(source = %name, "input ended");
                                break;
                            }
                            Err(e) => {
                                warn!(source = %name, error = %e, "error reading input");
                                break;
                            }
                        }
                    }
                }
            }
        });
        self.tasks.push(task);
    }

    /// Names of every source added so far
    pub fn sources(&self) -> Vec<String> {
        let mut names: Vec<_> = self.line_counters.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Lines read so far from a source
    pub fn lines_read(&self, name: &str) -> Option<u64> {
        self.line_counters
            .read()
            .get(name)
            .map(|c| c.load(Ordering::Relaxed))
    }

    /// Wait until every input has ended
    pub async fn join(&mut self) {
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!(error = %e, "input reader failed");
            }
        }
    }

    /// Stop all readers
    pub fn stop(&mut self) {
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            task.abort();
        }
        // Fresh token so sources can be added again
        self.cancel = CancellationToken::new();
    }

    /// Get the number of inputs still being read
    pub fn active_count(&self) -> usize {
        self.tasks.iter().filter(|t| !t.is_finished()).count()
    }
}

impl Drop for IngestManager {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use tangoview_types::Level;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn test_lines_become_pending_events() {
        let store = EventStore::new(StoreConfig::default()).unwrap();
        let mut ingest = IngestManager::new(store.clone());

        let input: &[u8] = b"[WARN] first\n\n{\"level\":\"FATAL\",\"timestamp\":5}\n";
        ingest.add_source("devices.log", BufReader::new(input));
        ingest.join().await;

        assert_eq!(ingest.sources(), vec!["devices.log"]);
        assert_eq!(ingest.lines_read("devices.log"), Some(2));
        assert_eq!(store.pending_count(), 2);

        store.tick();
        let levels: Vec<_> = store.snapshot().iter().map(|e| e.level()).collect();
        assert!(levels.contains(&Level::Warn));
        assert_eq!(store.event_at(1).unwrap().timestamp_ms(), 5);
    }

    #[tokio::test]
    async fn test_multiple_sources() {
        let store = EventStore::new(StoreConfig::default()).unwrap();
        let mut ingest = IngestManager::new(store.clone());

        let a: &[u8] = b"INFO a1\nINFO a2\n";
        let b: &[u8] = b"ERROR b1\n";
        ingest.add_source("b", BufReader::new(b));
        ingest.add_source("a", BufReader::new(a));
        ingest.join().await;

        assert_eq!(ingest.sources(), vec!["a", "b"]);
        assert_eq!(ingest.active_count(), 0);
        assert_eq!(store.pending_count(), 3);
    }

    #[tokio::test]
    async fn test_stop_aborts_open_inputs() {
        let store = EventStore::new(StoreConfig::default()).unwrap();
        let mut ingest = IngestManager::new(store);

        // Never yields a line: the writer half stays open
        let (_writer, reader) = tokio::io::duplex(64);
        ingest.add_source("pipe", BufReader::new(reader));
        assert_eq!(ingest.active_count(), 1);

        ingest.stop();
        assert_eq!(ingest.active_count(), 0);
    }
}
