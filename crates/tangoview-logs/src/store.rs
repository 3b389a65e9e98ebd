use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use tangoview_types::{COLUMN_NAMES, EventRecord, Level};

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::filter::FilterCriteria;
use crate::probe::{
    Clock, GcHint, MemoryPressureProbe, NoopGcHint, SystemClock, SystemMemoryProbe,
};

/// Shared, immutable snapshot of the filtered view
pub type EventSnapshot = Arc<[Arc<EventRecord>]>;

/// How the filtered view changed after a recompute
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewChange {
    /// Rows `0..count` are new; the rest of the view only shifted down
    RowsInserted { count: usize },
    /// The whole view must be redrawn
    Reset,
}

/// What a maintenance tick did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Paused with room left in the pending queue
    Skipped,
    Merged(TickReport),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Pending events moved into the master list
    pub merged: usize,
    pub eviction_ran: bool,
    /// Events removed by eviction
    pub evicted: usize,
    /// Set when the filtered view was recomputed
    pub change: Option<ViewChange>,
}

/// Counts per log level
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LevelCounts {
    pub debug: usize,
    pub info: usize,
    pub warn: usize,
    pub error: usize,
    pub fatal: usize,
}

impl LevelCounts {
    fn increment(&mut self, level: Level) {
        match level {
            Level::Debug => self.debug += 1,
            Level::Info => self.info += 1,
            Level::Warn => self.warn += 1,
            Level::Error => self.error += 1,
            Level::Fatal => self.fatal += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.debug + self.info + self.warn + self.error + self.fatal
    }
}

struct StoreState {
    /// Events waiting for the next merge, in arrival order
    pending: Vec<Arc<EventRecord>>,

    /// Every retained event, newest first
    all: Vec<Arc<EventRecord>>,

    /// Events of `all` matching `criteria`, same order
    filtered: EventSnapshot,

    /// `filtered` no longer reflects `all`; cleared by a finished recompute
    stale: bool,

    criteria: FilterCriteria,

    paused: bool,

    /// Free memory percentage seen by the previous tick
    last_free_memory: Option<f64>,

    /// Duration of the last view recompute done by a tick (ms)
    last_update_ms: i64,

    /// Bumped every time a new view is published
    generation: u64,
}

impl StoreState {
    fn new() -> Self {
        Self {
            pending: Vec::new(),
            all: Vec::new(),
            filtered: empty_snapshot(),
            stale: false,
            criteria: FilterCriteria::default(),
            paused: false,
            last_free_memory: None,
            last_update_ms: 0,
            generation: 0,
        }
    }
}

fn empty_snapshot() -> EventSnapshot {
    Arc::from(Vec::new())
}

/// Sort newest first; equal timestamps keep their relative order
fn sort_newest_first(events: &mut [Arc<EventRecord>]) {
    events.sort_by(|a, b| b.timestamp_ms().cmp(&a.timestamp_ms()));
}

/// Drop low-severity events from the oldest `fraction` of a newest-first list
///
/// Events at WARN or above are kept whatever their age. Returns the number of
/// events removed.
pub fn evict_oldest(events: &mut Vec<Arc<EventRecord>>, fraction: f64) -> usize {
    // NaN ends up as zero events below
    let fraction = fraction.clamp(0.0, 1.0);
    let before = events.len();
    let to_evict = (before as f64 * fraction).floor() as usize;
    if to_evict == 0 {
        return 0;
    }

    let keep = before - to_evict;
    let mut index = 0;
    events.retain(|event| {
        let newer = index < keep;
        index += 1;
        newer || event.level() >= Level::Warn
    });

    let removed = before - events.len();
    debug!(before, to_evict, removed, "evicted old events");
    removed
}

/// Call into an injected collaborator, turning a panic into `on_panic`
fn guarded<T>(call: impl FnOnce() -> Result<T>, on_panic: fn(String) -> StoreError) -> Result<T> {
    panic::catch_unwind(AssertUnwindSafe(call))
        .unwrap_or_else(|_| Err(on_panic("panicked".to_string())))
}

/// Thread-safe event store: pending queue, master list and filtered view
///
/// Producers call [`add_event`](Self::add_event); a maintenance task calls
/// [`tick`](Self::tick) periodically; readers use the row accessors. All of
/// them serialize on a single lock.
#[derive(Clone)]
pub struct EventStore {
    state: Arc<Mutex<StoreState>>,
    config: Arc<StoreConfig>,
    probe: Arc<dyn MemoryPressureProbe>,
    gc: Arc<dyn GcHint>,
    clock: Arc<dyn Clock>,
}

impl EventStore {
    /// Create a store measuring system memory and wall-clock time
    ///
    /// Fails when `config` does not pass [`StoreConfig::validate`].
    pub fn new(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            state: Arc::new(Mutex::new(StoreState::new())),
            config: Arc::new(config),
            probe: Arc::new(SystemMemoryProbe::new()),
            gc: Arc::new(NoopGcHint),
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_probe(mut self, probe: Arc<dyn MemoryPressureProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_gc_hint(mut self, gc: Arc<dyn GcHint>) -> Self {
        self.gc = gc;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Current time from the store's clock
    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Queue an event for the next merge
    pub fn add_event(&self, event: EventRecord) {
        self.state.lock().pending.push(Arc::new(event));
    }

    /// Run one maintenance cycle: evict if under pressure, merge pending
    /// events and refresh the filtered view
    pub fn tick(&self) -> TickOutcome {
        let mut state = self.state.lock();

        if state.paused && state.pending.len() < self.config.pending_overflow_threshold {
            return TickOutcome::Skipped;
        }

        let free_memory = self.free_memory_ratio(state.last_free_memory);
        debug!(
            last = ?state.last_free_memory,
            current = ?free_memory,
            "free memory [%]"
        );

        let mut report = TickReport::default();
        if self.should_evict(&state, free_memory) {
            report.eviction_ran = true;
            report.evicted = evict_oldest(&mut state.all, self.config.evict_fraction);
            state.filtered = empty_snapshot();
            state.stale = true;
            if let Err(e) = guarded(|| self.gc.request_gc(), StoreError::GcHint) {
                warn!(error = %e, "gc hint failed");
            }
            state.last_free_memory = self.free_memory_ratio(free_memory);
        } else {
            state.last_free_memory = free_memory;
        }

        let previous_head = state.all.first().map(|e| e.timestamp_ms());
        let pending = std::mem::take(&mut state.pending);
        // After an eviction or an interrupted recompute the old view is no base
        let mut inserted_to_front = !state.stale;
        let mut stale = state.stale;
        for event in &pending {
            inserted_to_front &= previous_head.is_none_or(|head| event.timestamp_ms() > head);
            stale |= state.criteria.matches(event);
        }
        state.stale = stale;
        report.merged = pending.len();
        state.all.extend(pending);

        if report.merged > 0 || report.eviction_ran {
            sort_newest_first(&mut state.all);
        }

        if stale {
            let (change, elapsed) = self.recompute_locked(&mut state, inserted_to_front);
            state.last_update_ms = elapsed;
            report.change = Some(change);
        }

        TickOutcome::Merged(report)
    }

    /// Free memory percentage, or `fallback` when the probe cannot tell
    fn free_memory_ratio(&self, fallback: Option<f64>) -> Option<f64> {
        match guarded(|| self.probe.sample(), StoreError::Probe) {
            Ok(sample) => match sample.free_ratio() {
                Some(ratio) => Some(ratio),
                None => {
                    warn!("memory probe reported no total; keeping last sample");
                    fallback
                }
            },
            Err(e) => {
                warn!(error = %e, "memory probe failed; keeping last sample");
                fallback
            }
        }
    }

    fn should_evict(&self, state: &StoreState, free_memory: Option<f64>) -> bool {
        let too_many = state.last_update_ms > self.config.slow_update_threshold_ms as i64
            && state.all.len() > self.config.count_threshold;

        // A jump in free memory that still leaves little free means the
        // allocator just reclaimed what it could
        let memory_low = match (state.last_free_memory, free_memory) {
            (Some(last), Some(current)) => {
                current - last > self.config.free_memory_rise
                    && current < self.config.free_memory_threshold
            }
            _ => false,
        };

        if too_many || memory_low {
            debug!(too_many, memory_low, events = state.all.len(), "eviction triggered");
        }
        too_many || memory_low
    }

    /// Rebuild the filtered view from `all`, returning the change and the
    /// time it took in ms
    fn recompute_locked(&self, state: &mut StoreState, inserted_to_front: bool) -> (ViewChange, i64) {
        let start = self.clock.now_ms();

        let previous_first = state.filtered.first().cloned();
        let filtered: EventSnapshot = state
            .all
            .iter()
            .filter(|e| state.criteria.matches(e))
            .cloned()
            .collect();

        let change = match previous_first {
            Some(first) if inserted_to_front => {
                match filtered.iter().position(|e| Arc::ptr_eq(e, &first)) {
                    Some(index) if index >= 1 => ViewChange::RowsInserted { count: index },
                    _ => {
                        warn!("previous first row missing after front insertion; resetting view");
                        ViewChange::Reset
                    }
                }
            }
            _ => ViewChange::Reset,
        };

        state.filtered = filtered;
        state.stale = false;
        state.generation += 1;

        let elapsed = self.clock.now_ms() - start;
        debug!(
            events = state.all.len(),
            visible = state.filtered.len(),
            elapsed_ms = elapsed,
            "filtered view updated"
        );
        (change, elapsed)
    }

    /// Number of rows in the filtered view
    pub fn row_count(&self) -> usize {
        self.state.lock().filtered.len()
    }

    /// Event at a row of the filtered view
    pub fn event_at(&self, row: usize) -> Result<Arc<EventRecord>> {
        let state = self.state.lock();
        state
            .filtered
            .get(row)
            .cloned()
            .ok_or(StoreError::OutOfRange {
                row,
                rows: state.filtered.len(),
            })
    }

    /// The whole filtered view (cheap: shares the current snapshot)
    pub fn snapshot(&self) -> EventSnapshot {
        Arc::clone(&self.state.lock().filtered)
    }

    pub fn column_names(&self) -> [&'static str; 5] {
        COLUMN_NAMES
    }

    /// Replace the filter and recompute the view immediately
    pub fn set_filter(&self, criteria: FilterCriteria) -> ViewChange {
        let mut state = self.state.lock();
        state.criteria = criteria;
        let (change, _) = self.recompute_locked(&mut state, false);
        change
    }

    pub fn filter(&self) -> FilterCriteria {
        self.state.lock().criteria.clone()
    }

    /// Flip the pause flag, returning the new value
    pub fn toggle_pause(&self) -> bool {
        let mut state = self.state.lock();
        state.paused = !state.paused;
        state.paused
    }

    pub fn set_paused(&self, paused: bool) {
        self.state.lock().paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    /// Drop every pending, retained and visible event
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.pending.clear();
        state.all.clear();
        state.filtered = empty_snapshot();
        state.stale = false;
        state.generation += 1;
    }

    /// Number of retained (merged) events
    pub fn total_count(&self) -> usize {
        self.state.lock().all.len()
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Counts per level over retained events
    pub fn level_counts(&self) -> LevelCounts {
        let state = self.state.lock();
        let mut counts = LevelCounts::default();
        for event in &state.all {
            counts.increment(event.level());
        }
        counts
    }

    /// Increases every time a new filtered view is published
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    #[cfg(test)]
    fn all_timestamps(&self) -> Vec<i64> {
        self.state
            .lock()
            .all
            .iter()
            .map(|e| e.timestamp_ms())
            .collect()
    }
}

impl std::fmt::Debug for EventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("EventStore")
            .field("pending", &state.pending.len())
            .field("all", &state.all.len())
            .field("filtered", &state.filtered.len())
            .field("paused", &state.paused)
            .finish()
    }
}
