//! Collaborators the store consults during maintenance: memory pressure,
//! garbage-collection hints and wall-clock time.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

use parking_lot::Mutex;
use sysinfo::System;

use crate::error::{Result, StoreError};

/// Free and total memory at the time of a sample
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemorySample {
    pub free_bytes: u64,
    pub total_bytes: u64,
}

impl MemorySample {
    /// Free memory as a percentage of total (0-100)
    pub fn free_ratio(&self) -> Option<f64> {
        if self.total_bytes == 0 {
            return None;
        }
        Some(100.0 * self.free_bytes as f64 / self.total_bytes as f64)
    }
}

/// Source of memory pressure measurements
pub trait MemoryPressureProbe: Send + Sync {
    fn sample(&self) -> Result<MemorySample>;
}

/// Best-effort request to release memory; may do nothing
pub trait GcHint: Send + Sync {
    fn request_gc(&self) -> Result<()>;
}

/// Wall-clock milliseconds
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// Reads available and total RAM through sysinfo
pub struct SystemMemoryProbe {
    system: Mutex<System>,
}

impl SystemMemoryProbe {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SystemMemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPressureProbe for SystemMemoryProbe {
    fn sample(&self) -> Result<MemorySample> {
        let mut system = self.system.lock();
        system.refresh_memory();
        let sample = MemorySample {
            free_bytes: system.available_memory(),
            total_bytes: system.total_memory(),
        };
        if sample.total_bytes == 0 {
            return Err(StoreError::Probe(
                "total memory reported as zero".to_string(),
            ));
        }
        Ok(sample)
    }
}

/// Process memory is returned by the allocator on drop, nothing to request
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopGcHint;

impl GcHint for NoopGcHint {
    fn request_gc(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Manually driven clock for deterministic ticks
///
/// Every read returns the current time and then advances it by `step`
/// milliseconds, so a non-zero step makes each measured interval `step` long.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
    step: AtomicI64,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: AtomicI64::new(start_ms),
            step: AtomicI64::new(0),
        }
    }

    pub fn with_step(self, step_ms: i64) -> Self {
        self.step.store(step_ms, Ordering::SeqCst);
        self
    }

    pub fn set_step(&self, step_ms: i64) {
        self.step.store(step_ms, Ordering::SeqCst);
    }

    pub fn set(&self, now_ms: i64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: i64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        let step = self.step.load(Ordering::SeqCst);
        self.now.fetch_add(step, Ordering::SeqCst)
    }
}

/// Probe returning a fixed, adjustable sample
#[derive(Debug)]
pub struct StaticProbe {
    free_bytes: AtomicU64,
    total_bytes: AtomicU64,
    failing: AtomicBool,
}

impl StaticProbe {
    /// Probe reporting `free_percent` free out of 100 bytes
    pub fn new(free_percent: u64) -> Self {
        Self {
            free_bytes: AtomicU64::new(free_percent),
            total_bytes: AtomicU64::new(100),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_free_percent(&self, free_percent: u64) {
        self.free_bytes.store(free_percent, Ordering::SeqCst);
        self.total_bytes.store(100, Ordering::SeqCst);
    }

    /// Make subsequent samples fail
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl MemoryPressureProbe for StaticProbe {
    fn sample(&self) -> Result<MemorySample> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Probe("probe unavailable".to_string()));
        }
        Ok(MemorySample {
            free_bytes: self.free_bytes.load(Ordering::SeqCst),
            total_bytes: self.total_bytes.load(Ordering::SeqCst),
        })
    }
}
