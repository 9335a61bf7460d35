//! Core compaction engine
//!
//! - [`error`] - Error types for disk map operations
//! - [`block`] - Blocks and extents
//! - [`block_list`] - Ordered block sequence with split/merge primitives
//! - [`validation`] - Structural invariant checks
//! - [`compactor`] - Relocation policies:
//!   - [`compactor::fragment`] - Unit-granular, fragmenting
//!   - [`compactor::whole_file`] - Whole-file, leftmost fit
//! - [`checksum`] - Position-weighted checksum
//! - [`audit`] - Progress observers and event log
//! - [`config`] - Compaction configuration

pub mod audit;
pub mod block;
pub mod block_list;
pub mod checksum;
pub mod compactor;
pub mod config;
pub mod error;
pub mod validation;
