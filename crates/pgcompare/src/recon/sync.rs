//! Shared synchronization state for one table's worker fleet.
//!
//! Typed counters and flags replace ad-hoc shared booleans: extractors
//! decrement a per-side running counter, the last one out raises that
//! side's complete flag, and loaders bump a completion counter the
//! reconciler can observe. The observer's throttle flag is a single
//! atomic boolean the extractors honor before each enqueue.

use crate::model::Side;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct SideState {
    running_extractors: AtomicUsize,
    complete: AtomicBool,
    rows_extracted: AtomicU64,
    rows_loaded: AtomicU64,
}

#[derive(Debug, Default)]
pub struct SyncState {
    source: SideState,
    target: SideState,
    loaders_complete: AtomicUsize,
    extract_errors: AtomicUsize,
    throttle: AtomicBool,
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    fn side(&self, side: Side) -> &SideState {
        match side {
            Side::Source => &self.source,
            Side::Target => &self.target,
        }
    }

    pub fn extractor_started(&self, side: Side) {
        self.side(side)
            .running_extractors
            .fetch_add(1, Ordering::SeqCst);
    }

    /// Mark one extractor finished; the last one raises the side's
    /// complete flag.
    pub fn extractor_finished(&self, side: Side) {
        let state = self.side(side);
        if state.running_extractors.fetch_sub(1, Ordering::SeqCst) == 1 {
            state.complete.store(true, Ordering::SeqCst);
        }
    }

    pub fn side_complete(&self, side: Side) -> bool {
        self.side(side).complete.load(Ordering::Relaxed)
    }

    pub fn add_rows_extracted(&self, side: Side, rows: u64) -> u64 {
        self.side(side)
            .rows_extracted
            .fetch_add(rows, Ordering::Relaxed)
            + rows
    }

    pub fn add_rows_loaded(&self, side: Side, rows: u64) {
        self.side(side)
            .rows_loaded
            .fetch_add(rows, Ordering::Relaxed);
    }

    pub fn rows_extracted(&self, side: Side) -> u64 {
        self.side(side).rows_extracted.load(Ordering::Relaxed)
    }

    pub fn rows_loaded(&self, side: Side) -> u64 {
        self.side(side).rows_loaded.load(Ordering::Relaxed)
    }

    /// Rows extracted but not yet persisted, across both sides. This is
    /// the volume the observer throttles on.
    pub fn backlog(&self) -> u64 {
        let extracted =
            self.rows_extracted(Side::Source) + self.rows_extracted(Side::Target);
        let loaded = self.rows_loaded(Side::Source) + self.rows_loaded(Side::Target);
        extracted.saturating_sub(loaded)
    }

    pub fn loader_finished(&self) {
        self.loaders_complete.fetch_add(1, Ordering::SeqCst);
    }

    pub fn loaders_complete(&self) -> usize {
        self.loaders_complete.load(Ordering::Relaxed)
    }

    pub fn record_extract_error(&self) {
        self.extract_errors.fetch_add(1, Ordering::SeqCst);
    }

    pub fn extract_errors(&self) -> usize {
        self.extract_errors.load(Ordering::Relaxed)
    }

    pub fn set_throttle(&self, on: bool) {
        self.throttle.store(on, Ordering::SeqCst);
    }

    pub fn is_throttled(&self) -> bool {
        self.throttle.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_extractor_raises_complete() {
        let sync = SyncState::new();
        sync.extractor_started(Side::Source);
        sync.extractor_started(Side::Source);
        assert!(!sync.side_complete(Side::Source));

        sync.extractor_finished(Side::Source);
        assert!(!sync.side_complete(Side::Source));
        sync.extractor_finished(Side::Source);
        assert!(sync.side_complete(Side::Source));
        assert!(!sync.side_complete(Side::Target));
    }

    #[test]
    fn backlog_tracks_extracted_minus_loaded() {
        let sync = SyncState::new();
        sync.add_rows_extracted(Side::Source, 1000);
        sync.add_rows_extracted(Side::Target, 500);
        assert_eq!(sync.backlog(), 1500);
        sync.add_rows_loaded(Side::Source, 900);
        assert_eq!(sync.backlog(), 600);
    }

    #[test]
    fn throttle_flag_round_trip() {
        let sync = SyncState::new();
        assert!(!sync.is_throttled());
        sync.set_throttle(true);
        assert!(sync.is_throttled());
        sync.set_throttle(false);
        assert!(!sync.is_throttled());
    }
}
