//! Structural invariant checks for block lists
//!
//! Compactors keep these invariants by construction. The checks here are
//! used by tests and by `verify_invariants` runs to catch a primitive that
//! broke them.

use crate::block::Block;
use crate::block_list::BlockList;
use crate::error::{DiskMapError, Result};

/// Check per-block invariants
///
/// # Rules
/// - Every block has at least one unit
/// - No two neighbouring blocks are both free
pub fn check_blocks(blocks: &[Block]) -> Result<()> {
    if let Some(index) = blocks.iter().position(|block| block.size == 0) {
        return Err(DiskMapError::InvariantViolation(format!(
            "block {} has zero size",
            index
        )));
    }

    if let Some(index) = blocks
        .windows(2)
        .position(|pair| pair[0].is_free() && pair[1].is_free())
    {
        return Err(DiskMapError::InvariantViolation(format!(
            "free blocks {} and {} are adjacent",
            index,
            index + 1
        )));
    }

    Ok(())
}

/// Check that compaction neither created nor destroyed capacity
pub fn check_conservation(expected_total: u64, list: &BlockList) -> Result<()> {
    let total = list.total_size();
    if total != expected_total {
        return Err(DiskMapError::InvariantViolation(format!(
            "total size changed from {} to {}",
            expected_total, total
        )));
    }
    Ok(())
}

/// Check that no free unit precedes a file unit
pub fn check_packed(list: &BlockList) -> Result<()> {
    match (list.find_first_free(1), list.find_last_occupied()) {
        (Some(free), Some(last)) if free < last => Err(DiskMapError::InvariantViolation(
            format!("free block {} precedes file block {}", free, last),
        )),
        _ => Ok(()),
    }
}

/// Check that every file occupies exactly one block
///
/// Neighbouring runs of the same file are reported separately: they point
/// at a primitive that failed to merge rather than at a scattered file.
pub fn check_unfragmented(list: &BlockList) -> Result<()> {
    for (id, extents) in list.file_extents() {
        if let Some(pair) = extents.windows(2).find(|pair| pair[0].is_adjacent(&pair[1])) {
            return Err(DiskMapError::InvariantViolation(format!(
                "file {} has unmerged runs at {} and {}",
                id, pair[0].start, pair[1].start
            )));
        }
        if extents.len() > 1 {
            return Err(DiskMapError::InvariantViolation(format!(
                "file {} is split across {} blocks",
                id,
                extents.len()
            )));
        }
    }
    Ok(())
}
