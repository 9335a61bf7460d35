//! Unit-granular compaction
//!
//! Moves file data one unit at a time from the end of the disk into the
//! leftmost free unit until no free unit precedes any file unit. Files may
//! end up split across several runs.

use super::{CompactionStats, Compactor, Policy, StepGuard};
use crate::audit::{CompactionEvent, CompactionObserver};
use crate::block_list::BlockList;
use crate::config::CompactionConfig;
use crate::error::{DiskMapError, Result};
use tracing::{debug, info, trace};

/// Policy A: fragmenting compactor
#[derive(Debug, Clone, Default)]
pub struct FragmentCompactor {
    verify_invariants: bool,
    max_steps: Option<u64>,
}

impl FragmentCompactor {
    pub fn new() -> Self {
        FragmentCompactor::default()
    }

    pub fn from_config(config: &CompactionConfig) -> Self {
        FragmentCompactor {
            verify_invariants: config.verify_invariants,
            max_steps: config.max_steps,
        }
    }

    /// Check every invariant after each transferred unit
    pub fn with_verification(mut self) -> Self {
        self.verify_invariants = true;
        self
    }

    /// Fail with `StepLimitReached` after `limit` transfers
    pub fn with_max_steps(mut self, limit: u64) -> Self {
        self.max_steps = Some(limit);
        self
    }

    /// Check if a free unit still precedes file data
    fn pending(list: &BlockList, cursor: usize) -> bool {
        list.find_last_occupied()
            .is_some_and(|last| list.find_free_in(cursor..last, 1).is_some())
    }

    /// Transfer one unit from the last file block to the first free unit
    ///
    /// Returns `None` once the first free block no longer precedes the last
    /// file block. `cursor` is a block index with no free block before it.
    fn step(list: &mut BlockList, cursor: usize) -> Option<CompactionEvent> {
        let (last, id) = list.find_last_file()?;
        let first = list.find_free_in(cursor..last, 1)?;

        // The unit leaves the tail and joins the trailing free run
        if list.shrink_or_remove(last, 1) {
            list.insert_or_merge_free(last, 1);
        } else {
            list.insert_or_merge_free(last + 1, 1);
        }

        // first < last, so the tail edits above left `first` in place
        list.shrink_or_remove(first, 1);
        let to = list.insert_or_extend_file(first, id, 1);

        Some(CompactionEvent::Transfer {
            id,
            from_block: last,
            to_block: to,
        })
    }
}

impl Compactor for FragmentCompactor {
    fn policy(&self) -> Policy {
        Policy::Fragment
    }

    fn compact_with(
        &mut self,
        list: &mut BlockList,
        observer: &mut dyn CompactionObserver,
    ) -> Result<CompactionStats> {
        let mut stats = CompactionStats::begin(Policy::Fragment, list);
        let guard = StepGuard::new(self.verify_invariants, list);

        info!(
            "Fragment compaction: {} blocks, {} units ({} free)",
            list.len(),
            list.total_size(),
            list.free_size()
        );
        observer.on_start(Policy::Fragment, list.free_size(), list);

        let mut cursor = 0;
        loop {
            if let Some(limit) = self.max_steps {
                if stats.steps >= limit && Self::pending(list, cursor) {
                    return Err(DiskMapError::StepLimitReached(limit));
                }
            }

            let Some(event) = Self::step(list, cursor) else {
                break;
            };

            if let CompactionEvent::Transfer { id, to_block, .. } = event {
                trace!("Moved one unit of file {} to block {}", id, to_block);
                // Everything left of the destination is file data
                cursor = to_block;
            }

            stats.steps += 1;
            stats.units_moved += 1;
            guard.check(list)?;
            observer.on_event(&event, list);
        }

        list.mark_compacted(Policy::Fragment);
        stats.finish(list);
        debug!(
            "Fragmentation score {:.4} -> {:.4}",
            stats.fragmentation_before, stats.fragmentation_after
        );
        info!("Fragment compaction finished after {} transfers", stats.steps);
        observer.on_finish(&stats, list);

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::EventLog;
    use crate::checksum::ChecksumCalculator;
    use crate::validation;

    fn compacted(input: &str) -> BlockList {
        let mut list = BlockList::parse(input).unwrap();
        FragmentCompactor::new()
            .with_verification()
            .compact(&mut list)
            .unwrap();
        list
    }

    #[test]
    fn test_small_example() {
        let list = compacted("12345");
        assert_eq!(list.render(), "022111222......");
        assert_eq!(ChecksumCalculator::compute(&list), 60);
    }

    #[test]
    fn test_canonical_example() {
        let list = compacted("2333133121414131402");
        assert_eq!(
            list.render(),
            "0099811188827773336446555566.............."
        );
        assert_eq!(ChecksumCalculator::compute(&list), 1928);
        validation::check_packed(&list).unwrap();
    }

    #[test]
    fn test_intermediate_layouts() {
        let mut list = BlockList::parse("12345").unwrap();
        let mut log = EventLog::new(64, 30);
        FragmentCompactor::new()
            .compact_with(&mut list, &mut log)
            .unwrap();

        let layouts: Vec<&str> = log.layouts().collect();
        assert_eq!(
            layouts,
            vec![
                "0..111....22222",
                "02.111....2222.",
                "022111....222..",
                "0221112...22...",
                "02211122..2....",
                "022111222......",
            ]
        );
        assert_eq!(log.stats().unwrap().steps, 5);
    }

    #[test]
    fn test_transfer_block_indices() {
        let mut list = BlockList::parse("12345").unwrap();
        let mut events = Vec::new();
        let mut observer = |event: &CompactionEvent, _: &BlockList| events.push(*event);
        FragmentCompactor::new()
            .compact_with(&mut list, &mut observer)
            .unwrap();

        // The second unit lands after the first and extends it in place
        assert_eq!(
            events[..2],
            [
                CompactionEvent::Transfer {
                    id: 2,
                    from_block: 4,
                    to_block: 1
                },
                CompactionEvent::Transfer {
                    id: 2,
                    from_block: 5,
                    to_block: 1
                },
            ]
        );
    }

    #[test]
    fn test_transfer_consumes_single_free_unit_before_tail() {
        // The last free unit sits right before the last file
        let list = compacted("1112");
        assert_eq!(list.render(), "01...");
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_already_packed_is_untouched() {
        let mut list = BlockList::parse("9").unwrap();
        let stats = FragmentCompactor::new().compact(&mut list).unwrap();
        assert_eq!(stats.steps, 0);
        assert_eq!(list.render(), "000000000");
    }

    #[test]
    fn test_empty_list() {
        let mut list = BlockList::new();
        let stats = FragmentCompactor::new().compact(&mut list).unwrap();
        assert_eq!(stats.steps, 0);
        assert_eq!(ChecksumCalculator::compute(&list), 0);
    }

    #[test]
    fn test_rerun_is_a_no_op() {
        let mut list = compacted("2333133121414131402");
        let before = list.clone();
        let stats = FragmentCompactor::new().compact(&mut list).unwrap();
        assert_eq!(stats.steps, 0);
        assert_eq!(list, before);
    }

    #[test]
    fn test_step_limit() {
        let mut list = BlockList::parse("12345").unwrap();
        let result = FragmentCompactor::new().with_max_steps(3).compact(&mut list);
        assert!(matches!(result, Err(DiskMapError::StepLimitReached(3))));
    }

    #[test]
    fn test_step_limit_not_hit_when_work_fits() {
        let mut list = BlockList::parse("12345").unwrap();
        let stats = FragmentCompactor::new()
            .with_max_steps(5)
            .compact(&mut list)
            .unwrap();
        assert_eq!(stats.steps, 5);
    }
}
