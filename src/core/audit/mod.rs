//! Progress reporting for compaction runs
//!
//! Compactors never render or print anything themselves. They report each
//! mutation to a [`CompactionObserver`], which a caller can use to drive a
//! progress bar, log intermediate layouts, or record an [`EventLog`].

use crate::block::FileId;
use crate::block_list::BlockList;
use crate::compactor::{CompactionStats, Policy};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A single mutation (or deliberate non-mutation) during compaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompactionEvent {
    /// One unit of `id` moved from the tail block to the first free slot
    ///
    /// `from_block` is the tail block index before the move. `to_block` is
    /// the index of the block holding the unit afterwards, which is the
    /// left neighbour when the unit extended a run of the same file.
    Transfer {
        id: FileId,
        from_block: usize,
        to_block: usize,
    },
    /// A whole file moved left; positions are unit offsets
    Relocate {
        id: FileId,
        size: u64,
        from: u64,
        to: u64,
    },
    /// A file was evaluated and left in place
    Skip { id: FileId, reason: SkipReason },
}

/// Why a whole file stayed where it was
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The file has zero length and owns no block
    Empty,
    /// No free run to the left is large enough
    NoFit,
}

/// Receives progress from a compactor
///
/// `total_work` is the number of events the run expects to report at most:
/// free units for [`Policy::Fragment`], file IDs for [`Policy::WholeFile`].
pub trait CompactionObserver {
    fn on_start(&mut self, _policy: Policy, _total_work: u64, _list: &BlockList) {}

    fn on_event(&mut self, event: &CompactionEvent, list: &BlockList);

    fn on_finish(&mut self, _stats: &CompactionStats, _list: &BlockList) {}
}

impl<F> CompactionObserver for F
where
    F: FnMut(&CompactionEvent, &BlockList),
{
    fn on_event(&mut self, event: &CompactionEvent, list: &BlockList) {
        self(event, list)
    }
}

/// Observer that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl CompactionObserver for NoopObserver {
    fn on_event(&mut self, _event: &CompactionEvent, _list: &BlockList) {}
}

/// Recorded event with an optional rendered layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Position of the event in the run, starting at 0
    pub sequence: u64,
    pub event: CompactionEvent,
    /// Layout after the event, kept only for small lists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<String>,
}

/// Bounded in-memory event recorder
///
/// Keeps the most recent `capacity` entries; older entries are dropped and
/// counted. Layout snapshots are taken while the list has fewer than
/// `render_limit` blocks.
#[derive(Debug, Clone)]
pub struct EventLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    render_limit: usize,
    dropped: u64,
    recorded: u64,
    total_work: u64,
    initial: Option<String>,
    stats: Option<CompactionStats>,
}

impl EventLog {
    /// Create a new event log
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of entries retained
    /// * `render_limit` - Block count below which layouts are rendered
    pub fn new(capacity: usize, render_limit: usize) -> Self {
        EventLog {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            render_limit,
            dropped: 0,
            recorded: 0,
            total_work: 0,
            initial: None,
            stats: None,
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries evicted to respect the capacity
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Layout before the first event, if small enough to render
    pub fn initial_layout(&self) -> Option<&str> {
        self.initial.as_deref()
    }

    /// Rendered layouts in order, starting with the initial one
    pub fn layouts(&self) -> impl Iterator<Item = &str> {
        self.initial
            .as_deref()
            .into_iter()
            .chain(self.entries.iter().filter_map(|e| e.snapshot.as_deref()))
    }

    /// Statistics reported when the run finished
    pub fn stats(&self) -> Option<&CompactionStats> {
        self.stats.as_ref()
    }

    /// Fraction of the expected work reported so far (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        if self.total_work == 0 {
            return 1.0;
        }
        (self.recorded as f64 / self.total_work as f64).min(1.0)
    }

    fn snapshot(&self, list: &BlockList) -> Option<String> {
        (list.len() < self.render_limit).then(|| list.render())
    }
}

impl CompactionObserver for EventLog {
    fn on_start(&mut self, _policy: Policy, total_work: u64, list: &BlockList) {
        self.total_work = total_work;
        self.initial = self.snapshot(list);
    }

    fn on_event(&mut self, event: &CompactionEvent, list: &BlockList) {
        if self.capacity == 0 {
            self.dropped += 1;
            self.recorded += 1;
            return;
        }

        if self.entries.len() == self.capacity {
            self.entries.pop_front();
            self.dropped += 1;
        }

        let snapshot = self.snapshot(list);
        self.entries.push_back(LogEntry {
            sequence: self.recorded,
            event: *event,
            snapshot,
        });
        self.recorded += 1;
    }

    fn on_finish(&mut self, stats: &CompactionStats, _list: &BlockList) {
        self.stats = Some(stats.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer(id: FileId) -> CompactionEvent {
        CompactionEvent::Transfer {
            id,
            from_block: 4,
            to_block: 1,
        }
    }

    #[test]
    fn test_event_log_records_snapshots() {
        let list = BlockList::parse("12345").unwrap();
        let mut log = EventLog::new(16, 30);

        log.on_start(Policy::Fragment, 4, &list);
        log.on_event(&transfer(2), &list);

        assert_eq!(log.initial_layout(), Some("0..111....22222"));
        assert_eq!(log.len(), 1);
        assert_eq!(log.layouts().count(), 2);
        assert_eq!(log.progress(), 0.25);
    }

    #[test]
    fn test_event_log_skips_large_layouts() {
        let list = BlockList::parse("12345").unwrap();
        let mut log = EventLog::new(16, 3);

        log.on_start(Policy::Fragment, 1, &list);
        log.on_event(&transfer(2), &list);

        assert!(log.initial_layout().is_none());
        assert!(log.entries().all(|e| e.snapshot.is_none()));
    }

    #[test]
    fn test_event_log_drops_oldest() {
        let list = BlockList::new();
        let mut log = EventLog::new(2, 30);

        for id in 0..5 {
            log.on_event(&transfer(id), &list);
        }

        assert_eq!(log.len(), 2);
        assert_eq!(log.dropped(), 3);
        let sequences: Vec<u64> = log.entries().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![3, 4]);
    }

    #[test]
    fn test_closure_observer() {
        let list = BlockList::new();
        let mut seen = Vec::new();
        {
            let mut observer = |event: &CompactionEvent, _: &BlockList| seen.push(*event);
            observer.on_event(&transfer(7), &list);
        }
        assert_eq!(seen, vec![transfer(7)]);
    }

    #[test]
    fn test_event_serializes_with_kind_tag() {
        let json = serde_json::to_string(&CompactionEvent::Skip {
            id: 3,
            reason: SkipReason::NoFit,
        })
        .unwrap();
        assert_eq!(json, r#"{"kind":"skip","id":3,"reason":"no_fit"}"#);
    }
}
