//! # diskmap-rs - Block Compaction Engine
//!
//! `diskmap-rs` expands a run-length disk map into blocks of files and free
//! space, packs the file data toward the front of the disk using one of two
//! policies, and reports a position-weighted checksum of the result.
//!
//! - **Fragment** moves one unit at a time from the end of the disk into the
//!   first free unit, splitting files as needed
//! - **Whole-file** moves each file intact into the leftmost free run that fits,
//!   visiting files from the highest ID down
//!
//! ## Quick Start
//!
//! ```rust
//! use diskmap_rs::{compact, Policy, Result};
//!
//! # fn main() -> Result<()> {
//! assert_eq!(compact("2333133121414131402", Policy::Fragment)?, 1928);
//! assert_eq!(compact("2333133121414131402", Policy::WholeFile)?, 2858);
//! # Ok(())
//! # }
//! ```
//!
//! ## Observing Progress
//!
//! ```rust
//! use diskmap_rs::{DiskMapBuilder, EventLog, Policy, Result};
//!
//! # fn main() -> Result<()> {
//! let mut disk = DiskMapBuilder::new()
//!     .policy(Policy::Fragment)
//!     .with_verification()
//!     .build("12345")?;
//!
//! let mut log = EventLog::new(64, 30);
//! let report = disk.compact_with(&mut log)?;
//!
//! assert_eq!(report.checksum, 60);
//! assert_eq!(log.layouts().last(), Some("022111222......"));
//! # Ok(())
//! # }
//! ```

pub mod core;

// Re-export core modules internally so crate:: paths in core still work
#[allow(unused_imports)]
pub(crate) use crate::core::{audit, block, block_list, checksum, compactor, config, error, validation};

pub use crate::core::{
    audit::{CompactionEvent, CompactionObserver, EventLog, LogEntry, NoopObserver, SkipReason},
    block::{Block, Extent, FileId},
    block_list::BlockList,
    checksum::ChecksumCalculator,
    compactor::{
        compact_list, CompactionStats, Compactor, FragmentCompactor, Policy, WholeFileCompactor,
    },
    config::CompactionConfig,
    error::{DiskMapError, Result},
};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Parse, compact and checksum a disk map in one call
///
/// # Errors
///
/// Returns `DiskMapError::Parse` if `input` contains a non-digit.
pub fn compact(input: &str, policy: Policy) -> Result<u64> {
    let mut disk = DiskMap::with_config(input, CompactionConfig::new(policy))?;
    Ok(disk.compact()?.checksum)
}

/// Outcome of a compaction run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactionReport {
    pub checksum: u64,
    pub stats: CompactionStats,
}

impl CompactionReport {
    /// Pretty-printed JSON report
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// A parsed disk map bound to its compaction settings
#[derive(Debug, Clone)]
pub struct DiskMap {
    list: BlockList,
    config: CompactionConfig,
}

impl DiskMap {
    /// Parse a disk map with default settings
    pub fn parse(input: &str) -> Result<Self> {
        Self::with_config(input, CompactionConfig::default())
    }

    /// Parse a disk map with the given settings
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for out-of-range settings and `Parse` for
    /// malformed input.
    pub fn with_config(input: &str, config: CompactionConfig) -> Result<Self> {
        config.ensure_valid()?;
        let list = BlockList::parse(input)?;
        debug!(
            "Parsed disk map: {} blocks, {} files, {} units",
            list.len(),
            list.file_count(),
            list.total_size()
        );
        Ok(DiskMap { list, config })
    }

    pub fn list(&self) -> &BlockList {
        &self.list
    }

    pub fn config(&self) -> &CompactionConfig {
        &self.config
    }

    pub fn policy(&self) -> Policy {
        self.config.policy
    }

    /// Compact using the configured policy
    pub fn compact(&mut self) -> Result<CompactionReport> {
        self.compact_with(&mut NoopObserver)
    }

    /// Compact using the configured policy, reporting progress to `observer`
    pub fn compact_with(
        &mut self,
        observer: &mut dyn CompactionObserver,
    ) -> Result<CompactionReport> {
        let stats = compact_list(&mut self.list, &self.config, observer)?;
        Ok(CompactionReport {
            checksum: self.checksum(),
            stats,
        })
    }

    /// Checksum of the current layout
    pub fn checksum(&self) -> u64 {
        ChecksumCalculator::compute(&self.list)
    }

    /// Empty event log sized by the configured capacity and render limit
    pub fn event_log(&self) -> EventLog {
        EventLog::new(self.config.event_capacity, self.config.render_limit)
    }

    /// Layout expanded one glyph per unit
    pub fn render(&self) -> String {
        self.list.render()
    }

    pub fn into_list(self) -> BlockList {
        self.list
    }
}

/// Builder for customizing a compaction run
///
/// # Examples
///
/// ```rust
/// use diskmap_rs::{DiskMapBuilder, Policy};
///
/// # fn main() -> diskmap_rs::Result<()> {
/// let mut disk = DiskMapBuilder::new()
///     .policy(Policy::WholeFile)
///     .render_limit(16)
///     .build("2333133121414131402")?;
/// assert_eq!(disk.compact()?.checksum, 2858);
/// # Ok(())
/// # }
/// ```
pub struct DiskMapBuilder {
    config: CompactionConfig,
}

impl DiskMapBuilder {
    /// Create a new DiskMapBuilder with default settings
    pub fn new() -> Self {
        DiskMapBuilder {
            config: CompactionConfig::default(),
        }
    }

    /// Start from an existing configuration
    pub fn from_config(config: CompactionConfig) -> Self {
        DiskMapBuilder { config }
    }

    pub fn policy(mut self, policy: Policy) -> Self {
        self.config.policy = policy;
        self
    }

    /// Check invariants after every compaction step
    pub fn with_verification(mut self) -> Self {
        self.config.verify_invariants = true;
        self
    }

    /// Block count below which layouts are rendered into event logs
    pub fn render_limit(mut self, limit: usize) -> Self {
        self.config.render_limit = limit;
        self
    }

    /// Cap the number of fragment transfers
    pub fn max_steps(mut self, limit: u64) -> Self {
        self.config.max_steps = Some(limit);
        self
    }

    /// Parse `input` into a DiskMap with the configured settings
    pub fn build(self, input: &str) -> Result<DiskMap> {
        DiskMap::with_config(input, self.config)
    }
}

impl Default for DiskMapBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact_known_answers() {
        assert_eq!(compact("2333133121414131402", Policy::Fragment).unwrap(), 1928);
        assert_eq!(compact("2333133121414131402", Policy::WholeFile).unwrap(), 2858);
    }

    #[test]
    fn test_compact_empty_input() {
        assert_eq!(compact("", Policy::Fragment).unwrap(), 0);
        assert_eq!(compact("  \n", Policy::WholeFile).unwrap(), 0);
    }

    #[test]
    fn test_compact_rejects_bad_input() {
        let err = compact("12x", Policy::Fragment).unwrap_err();
        assert!(err.is_parse_error());
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let result = DiskMapBuilder::new().render_limit(0).build("12345");
        assert!(matches!(result, Err(DiskMapError::InvalidConfig(_))));
    }

    #[test]
    fn test_report_serializes() {
        let mut disk = DiskMap::parse("12345").unwrap();
        let report = disk.compact().unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["checksum"], 60);
        assert_eq!(json["stats"]["policy"], "fragment");
        assert_eq!(json["stats"]["steps"], 5);
    }

    #[test]
    fn test_report_to_json() {
        let mut disk = DiskMap::parse("12345").unwrap();
        let text = disk.compact().unwrap().to_json().unwrap();
        let report: CompactionReport = serde_json::from_str(&text).unwrap();
        assert_eq!(report.checksum, 60);
        assert_eq!(report.stats.units_moved, 5);
    }

    #[test]
    fn test_builder_from_config_sizes_event_log() {
        let config = CompactionConfig {
            event_capacity: 2,
            render_limit: 10,
            ..CompactionConfig::new(Policy::Fragment)
        };
        let mut disk = DiskMapBuilder::from_config(config).build("12345").unwrap();
        let mut log = disk.event_log();
        disk.compact_with(&mut log).unwrap();

        assert_eq!(log.len(), 2);
        assert_eq!(log.dropped(), 3);
        assert_eq!(log.layouts().last(), Some("022111222......"));
    }

    #[test]
    fn test_disk_map_accessors() {
        let disk = DiskMapBuilder::new()
            .policy(Policy::WholeFile)
            .build("12345")
            .unwrap();
        assert_eq!(disk.policy(), Policy::WholeFile);
        assert_eq!(disk.render(), "0..111....22222");
        assert_eq!(disk.checksum(), 132);
        assert_eq!(disk.into_list().file_count(), 3);
    }
}
