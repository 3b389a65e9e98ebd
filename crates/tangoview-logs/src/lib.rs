//! Event store and ingestion for tangoview
//!
//! This crate provides the pending-queue / master-list / filtered-view
//! pipeline, its eviction policy and maintenance task, and the line
//! ingestion that feeds it.

mod config;
mod error;
mod filter;
mod maintenance;
mod parser;
mod probe;
mod store;
mod stream;

pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use filter::{FilterCriteria, FilterPresets};
pub use maintenance::MaintenanceTask;
pub use parser::LogParser;
pub use probe::{
    Clock, GcHint, ManualClock, MemoryPressureProbe, MemorySample, NoopGcHint, StaticProbe,
    SystemClock, SystemMemoryProbe,
};
pub use store::{
    EventSnapshot, EventStore, LevelCounts, TickOutcome, TickReport, ViewChange, evict_oldest,
};
pub use stream::IngestManager;

// Re-export types used in our public API
pub use tangoview_types::{COLUMN_NAMES, Column, EventRecord, Level};
