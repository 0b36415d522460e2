// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Id reservation with debounced persistence.
//
// `Store::next_id` hands out ids without writing the file on every call. The
// sequencer keeps, per table, the next id that is free in memory (the
// "watermark") and whether a flush timer is already armed. The store arms a
// single timer on the first reservation; later reservations update the
// watermark in place and leave the timer's deadline alone. When the timer
// fires the watermarks are merged into the freshly loaded document and
// written once.
//
// Ids reserved here are lost from disk if the process exits before the
// flush; the next run may hand them out again. `Store::insert` persists
// immediately and is the authoritative path.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Default idle window before reserved ids are written back.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// Pending id reservations for every table, plus the flush timer state.
#[derive(Debug)]
pub struct IdSequencer {
    /// How long after the first unflushed reservation the flush fires.
    debounce: Duration,
    /// Table name to the next id not yet handed out by this sequencer.
    pending: Mutex<BTreeMap<String, u64>>,
    /// Whether a flush is already scheduled.
    timer_armed: AtomicBool,
}

impl IdSequencer {
    /// Create a sequencer with the given debounce window.
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            pending: Mutex::new(BTreeMap::new()),
            timer_armed: AtomicBool::new(false),
        }
    }

    /// The configured debounce window.
    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Reserve the next id for `table`.
    ///
    /// `stored_next` is the next id according to the document on disk; the
    /// result is the larger of that and the in-memory watermark, and the
    /// watermark moves one past it.
    pub fn reserve(&self, table: &str, stored_next: u64) -> u64 {
        let mut pending = self.pending.lock().expect("sequencer lock");
        let watermark = pending.get(table).copied().unwrap_or(0);
        let id = stored_next.max(watermark).max(1);
        pending.insert(table.to_string(), id + 1);
        id
    }

    /// The in-memory watermark for `table`, if any reservation is unflushed.
    pub fn watermark(&self, table: &str) -> Option<u64> {
        self.pending
            .lock()
            .expect("sequencer lock")
            .get(table)
            .copied()
    }

    /// Whether any reservation is waiting to be flushed.
    pub fn has_pending(&self) -> bool {
        !self.pending.lock().expect("sequencer lock").is_empty()
    }

    /// Whether a flush timer is currently scheduled.
    pub fn is_armed(&self) -> bool {
        self.timer_armed.load(Ordering::SeqCst)
    }

    /// Claim the right to schedule the flush timer.
    ///
    /// Returns `true` for exactly one caller until the pending state is taken.
    pub(crate) fn try_arm(&self) -> bool {
        !self.timer_armed.swap(true, Ordering::SeqCst)
    }

    /// Take all watermarks for flushing and disarm the timer.
    pub(crate) fn take_pending(&self) -> BTreeMap<String, u64> {
        let mut pending = self.pending.lock().expect("sequencer lock");
        self.timer_armed.store(false, Ordering::SeqCst);
        std::mem::take(&mut *pending)
    }

    /// Put watermarks back after a failed flush so this process keeps
    /// honoring them.
    pub(crate) fn restore(&self, watermarks: BTreeMap<String, u64>) {
        let mut pending = self.pending.lock().expect("sequencer lock");
        for (table, next) in watermarks {
            let entry = pending.entry(table).or_insert(next);
            if next > *entry {
                *entry = next;
            }
        }
    }
}

impl Default for IdSequencer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_advances_watermark() {
        let sequencer = IdSequencer::default();
        assert_eq!(sequencer.reserve("orders", 1), 1);
        assert_eq!(sequencer.reserve("orders", 1), 2);
        assert_eq!(sequencer.reserve("orders", 1), 3);
        assert_eq!(sequencer.watermark("orders"), Some(4));
        assert_eq!(sequencer.watermark("users"), None);
    }

    #[test]
    fn test_reserve_respects_disk_value() {
        let sequencer = IdSequencer::default();
        assert_eq!(sequencer.reserve("orders", 1), 1);
        // An insert moved the on-disk sequence past the watermark.
        assert_eq!(sequencer.reserve("orders", 10), 10);
        assert_eq!(sequencer.watermark("orders"), Some(11));
    }

    #[test]
    fn test_arm_once_until_taken() {
        let sequencer = IdSequencer::default();
        assert!(sequencer.try_arm());
        assert!(!sequencer.try_arm());
        assert!(sequencer.is_armed());

        sequencer.reserve("users", 1);
        let taken = sequencer.take_pending();
        assert_eq!(taken.get("users"), Some(&2));
        assert!(!sequencer.has_pending());
        assert!(!sequencer.is_armed());
        assert!(sequencer.try_arm());
    }

    #[test]
    fn test_restore_keeps_highest_watermark() {
        let sequencer = IdSequencer::default();
        sequencer.reserve("users", 1);
        let taken = sequencer.take_pending();
        sequencer.reserve("users", 5);

        sequencer.restore(taken);
        assert_eq!(sequencer.watermark("users"), Some(6));
    }
}
