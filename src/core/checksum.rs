//! Position-weighted checksum over a compacted block list

use crate::block_list::BlockList;

/// Sums `position * file_id` over every occupied unit
///
/// Free units advance the position without contributing. The accumulator is
/// `u64`; realistic disk maps stay far below its range, and an overflow is a
/// contract violation rather than a recoverable error.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChecksumCalculator;

impl ChecksumCalculator {
    pub fn compute(list: &BlockList) -> u64 {
        let mut checksum = 0u64;
        let mut position = 0u64;

        for block in list.blocks() {
            if let Some(id) = block.id {
                // Closed form of sum(position..position + size) * id
                let positions = block.size * position + block.size * (block.size - 1) / 2;
                checksum += positions * id;
            }
            position += block.size;
        }

        checksum
    }
}
