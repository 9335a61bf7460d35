//! Compaction configuration
//!
//! Settings can be built in code or loaded from TOML:
//!
//! ```toml
//! policy = "whole-file"
//! verify_invariants = true
//! render_limit = 30
//! event_capacity = 4096
//! ```

use crate::compactor::Policy;
use crate::error::{DiskMapError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use validator::Validate;

/// Options for a compaction run
///
/// # Examples
///
/// ```
/// use diskmap_rs::{CompactionConfig, Policy};
///
/// let config = CompactionConfig::from_toml_str(r#"policy = "whole-file""#).unwrap();
/// assert_eq!(config.policy, Policy::WholeFile);
/// assert_eq!(config.render_limit, 30);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct CompactionConfig {
    /// Relocation policy
    pub policy: Policy,

    /// Check structural invariants after every step
    pub verify_invariants: bool,

    /// Lists with at least this many blocks are not rendered into the log
    #[validate(range(min = 1, max = 4096))]
    pub render_limit: usize,

    /// Abort fragment compaction after this many unit transfers
    #[validate(range(min = 1))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_steps: Option<u64>,

    /// Events retained by the in-memory event log
    #[validate(range(min = 1))]
    pub event_capacity: usize,
}

impl CompactionConfig {
    /// Default render cut-off in blocks
    pub const DEFAULT_RENDER_LIMIT: usize = 30;

    /// Default event log capacity
    pub const DEFAULT_EVENT_CAPACITY: usize = 4096;

    pub fn new(policy: Policy) -> Self {
        CompactionConfig {
            policy,
            ..Default::default()
        }
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: CompactionConfig = toml::from_str(text)?;
        config.ensure_valid()?;
        Ok(config)
    }

    /// Load and validate a TOML config file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Serialize back to TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| DiskMapError::InvalidConfig(e.to_string()))
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` describing every out-of-range field.
    pub fn ensure_valid(&self) -> Result<()> {
        self.validate()
            .map_err(|e| DiskMapError::InvalidConfig(e.to_string()))
    }
}

impl Default for CompactionConfig {
    fn default() -> Self {
        CompactionConfig {
            policy: Policy::Fragment,
            verify_invariants: false,
            render_limit: Self::DEFAULT_RENDER_LIMIT,
            max_steps: None,
            event_capacity: Self::DEFAULT_EVENT_CAPACITY,
        }
    }
}
