//! Compaction policies for block lists
//!
//! Two greedy strategies pack file data toward the front of the disk:
//! - [`fragment::FragmentCompactor`] moves one unit at a time and may split files
//! - [`whole_file::WholeFileCompactor`] moves whole files into the leftmost fit

pub mod fragment;
pub mod whole_file;

use crate::audit::{CompactionObserver, NoopObserver};
use crate::block_list::BlockList;
use crate::config::CompactionConfig;
use crate::error::{DiskMapError, Result};
use crate::validation;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use fragment::FragmentCompactor;
pub use whole_file::WholeFileCompactor;

/// Relocation policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Policy {
    /// Unit-granular moves from the tail into the first free unit
    #[default]
    Fragment,
    /// Whole-file moves into the leftmost free run that fits
    WholeFile,
}

impl Policy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Policy::Fragment => "fragment",
            Policy::WholeFile => "whole-file",
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Policy {
    type Err = DiskMapError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "fragment" | "a" | "1" => Ok(Policy::Fragment),
            "whole-file" | "whole_file" | "wholefile" | "b" | "2" => Ok(Policy::WholeFile),
            _ => Err(DiskMapError::UnknownPolicy(s.to_string())),
        }
    }
}

/// Counters collected over one compaction run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompactionStats {
    pub policy: Policy,
    /// Mutating steps performed
    pub steps: u64,
    /// Units written to a new position
    pub units_moved: u64,
    /// Files moved as a whole (whole-file policy only)
    pub files_relocated: u64,
    /// Files evaluated and left in place (whole-file policy only)
    pub files_skipped: u64,
    pub fragmentation_before: f64,
    pub fragmentation_after: f64,
}

impl CompactionStats {
    fn begin(policy: Policy, list: &BlockList) -> Self {
        CompactionStats {
            policy,
            fragmentation_before: list.fragmentation_score(),
            ..Default::default()
        }
    }

    fn finish(&mut self, list: &BlockList) {
        self.fragmentation_after = list.fragmentation_score();
    }
}

/// Compaction strategy trait
///
/// A compactor owns the list exclusively for the duration of a run and
/// reports every mutation to the observer.
pub trait Compactor {
    /// Policy implemented by this compactor
    fn policy(&self) -> Policy;

    /// Compact the list in place, reporting progress to `observer`
    fn compact_with(
        &mut self,
        list: &mut BlockList,
        observer: &mut dyn CompactionObserver,
    ) -> Result<CompactionStats>;

    /// Compact the list in place
    fn compact(&mut self, list: &mut BlockList) -> Result<CompactionStats> {
        self.compact_with(list, &mut NoopObserver)
    }
}

/// Run the compactor selected by `config.policy`
pub fn compact_list(
    list: &mut BlockList,
    config: &CompactionConfig,
    observer: &mut dyn CompactionObserver,
) -> Result<CompactionStats> {
    match config.policy {
        Policy::Fragment => FragmentCompactor::from_config(config).compact_with(list, observer),
        Policy::WholeFile => WholeFileCompactor::from_config(config).compact_with(list, observer),
    }
}

/// Per-step invariant checks, enabled by `verify_invariants`
#[derive(Debug, Clone, Copy)]
struct StepGuard {
    enabled: bool,
    total_size: u64,
}

impl StepGuard {
    fn new(enabled: bool, list: &BlockList) -> Self {
        StepGuard {
            enabled,
            total_size: list.total_size(),
        }
    }

    fn check(&self, list: &BlockList) -> Result<()> {
        if self.enabled {
            list.validate()?;
            validation::check_conservation(self.total_size, list)?;
        }
        Ok(())
    }
}
