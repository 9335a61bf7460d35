//! Whole-file compaction
//!
//! Visits file IDs from highest to lowest and moves each file, intact, into
//! the leftmost free run that can hold it. The scan is leftmost-first rather
//! than best-fit: the first run large enough wins even when a tighter one
//! exists further right.
//!
//! Each ID is evaluated exactly once per list. A file that finds no room is
//! not retried when lower IDs later vacate space to its left, so a second
//! pass over a compacted list would not be a no-op; the list remembers that
//! it has been through a whole-file pass and later passes return at once.
//! Any mutation after the pass clears that mark.

use super::{CompactionStats, Compactor, Policy, StepGuard};
use crate::audit::{CompactionEvent, CompactionObserver, SkipReason};
use crate::block::FileId;
use crate::block_list::BlockList;
use crate::config::CompactionConfig;
use crate::error::Result;
use tracing::{debug, info};

/// Policy B: whole-file compactor
#[derive(Debug, Clone, Default)]
pub struct WholeFileCompactor {
    verify_invariants: bool,
}

impl WholeFileCompactor {
    pub fn new() -> Self {
        WholeFileCompactor::default()
    }

    pub fn from_config(config: &CompactionConfig) -> Self {
        WholeFileCompactor {
            verify_invariants: config.verify_invariants,
        }
    }

    /// Check every invariant after each evaluated file
    pub fn with_verification(mut self) -> Self {
        self.verify_invariants = true;
        self
    }

    /// Evaluate one file and move it if a free run to its left fits
    fn relocate(list: &mut BlockList, id: FileId) -> CompactionEvent {
        let Some(index) = list.position_of(id) else {
            return CompactionEvent::Skip {
                id,
                reason: SkipReason::Empty,
            };
        };

        let size = list.blocks()[index].size;
        // Files never move right, so only runs before the file qualify
        let Some(target) = list.find_free_in(0..index, size) else {
            return CompactionEvent::Skip {
                id,
                reason: SkipReason::NoFit,
            };
        };

        let from = list.unit_offset(index);
        let to = list.unit_offset(target);

        // target < index: releasing the old slot never shifts the target
        list.release_file(index);
        list.carve_file(target, id, size);

        CompactionEvent::Relocate { id, size, from, to }
    }
}

impl Compactor for WholeFileCompactor {
    fn policy(&self) -> Policy {
        Policy::WholeFile
    }

    fn compact_with(
        &mut self,
        list: &mut BlockList,
        observer: &mut dyn CompactionObserver,
    ) -> Result<CompactionStats> {
        let mut stats = CompactionStats::begin(Policy::WholeFile, list);

        if list.compacted_by() == Some(Policy::WholeFile) {
            debug!("List already went through a whole-file pass, nothing to do");
            stats.finish(list);
            observer.on_finish(&stats, list);
            return Ok(stats);
        }

        let guard = StepGuard::new(self.verify_invariants, list);
        let file_count = list.file_count();

        info!(
            "Whole-file compaction: {} blocks, {} files",
            list.len(),
            file_count
        );
        observer.on_start(Policy::WholeFile, file_count, list);

        for id in (0..file_count).rev() {
            let event = Self::relocate(list, id);

            match event {
                CompactionEvent::Relocate { size, from, to, .. } => {
                    debug!("Moved file {} ({} units) from {} to {}", id, size, from, to);
                    stats.steps += 1;
                    stats.units_moved += size;
                    stats.files_relocated += 1;
                }
                CompactionEvent::Skip { reason, .. } => {
                    debug!("Left file {} in place: {:?}", id, reason);
                    stats.files_skipped += 1;
                }
                CompactionEvent::Transfer { .. } => {}
            }

            guard.check(list)?;
            observer.on_event(&event, list);
        }

        list.mark_compacted(Policy::WholeFile);
        stats.finish(list);
        info!(
            "Whole-file compaction finished: {} moved, {} left in place",
            stats.files_relocated, stats.files_skipped
        );
        observer.on_finish(&stats, list);

        Ok(stats)
    }
}
