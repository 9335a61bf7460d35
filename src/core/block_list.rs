//! Ordered, mutable sequence of blocks
//!
//! The list is a contiguous `Vec<Block>` addressed by index. Every primitive
//! keeps block sizes positive; the free-space primitives additionally keep
//! free runs coalesced so that no two free blocks are ever neighbours.
//!
//! Primitives treat a broken invariant (shrinking past zero, inserting an
//! empty run, addressing past the end) as a programming error and panic.

use crate::block::{Block, Extent, FileId};
use crate::compactor::Policy;
use crate::error::{DiskMapError, Result};
use crate::validation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

/// Run-length disk map expanded into blocks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockList {
    blocks: Vec<Block>,

    /// Number of file IDs handed out, including zero-length files
    file_count: u64,

    /// Policy of the last completed compaction, cleared by any mutation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    compacted_by: Option<Policy>,
}

impl BlockList {
    /// Create an empty block list
    pub fn new() -> Self {
        BlockList::default()
    }

    /// Parse a run-length disk map
    ///
    /// Digits alternate between file and free run lengths, starting with a
    /// file. Every file digit consumes the next file ID, even when its length
    /// is zero. Zero-length runs produce no block.
    ///
    /// # Errors
    ///
    /// Returns `DiskMapError::Parse` on the first non-digit character.
    ///
    /// # Examples
    ///
    /// ```
    /// use diskmap_rs::BlockList;
    ///
    /// let list = BlockList::parse("12345").unwrap();
    /// assert_eq!(list.render(), "0..111....22222");
    /// ```
    pub fn parse(text: &str) -> Result<Self> {
        let mut list = BlockList::new();

        for (offset, character) in text.trim().chars().enumerate() {
            let size = character
                .to_digit(10)
                .ok_or(DiskMapError::Parse { character, offset })? as u64;

            if offset % 2 == 0 {
                let id = list.file_count;
                list.file_count += 1;
                if size > 0 {
                    let end = list.blocks.len();
                    list.insert_file(end, id, size);
                }
            } else if size > 0 {
                // A zero-length file may have left a free run at the tail
                let end = list.blocks.len();
                list.insert_or_merge_free(end, size);
            }
        }

        Ok(list)
    }

    /// Build a list from explicit blocks, checking structural invariants
    pub fn from_blocks(blocks: Vec<Block>) -> Result<Self> {
        validation::check_blocks(&blocks)?;
        let file_count = blocks
            .iter()
            .filter_map(|block| block.id)
            .max()
            .map_or(0, |id| id + 1);

        Ok(BlockList {
            blocks,
            file_count,
            compacted_by: None,
        })
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Number of file IDs assigned at parse time
    pub fn file_count(&self) -> u64 {
        self.file_count
    }

    /// Policy that last finished compacting this list
    ///
    /// `None` once any primitive has changed the list since that pass.
    pub fn compacted_by(&self) -> Option<Policy> {
        self.compacted_by
    }

    pub(crate) fn mark_compacted(&mut self, policy: Policy) {
        self.compacted_by = Some(policy);
    }

    /// Sum of all block sizes
    pub fn total_size(&self) -> u64 {
        self.blocks.iter().map(|block| block.size).sum()
    }

    /// Number of free units
    pub fn free_size(&self) -> u64 {
        self.blocks
            .iter()
            .filter(|block| block.is_free())
            .map(|block| block.size)
            .sum()
    }

    /// Index of the rightmost occupied block
    pub fn find_last_occupied(&self) -> Option<usize> {
        self.blocks.iter().rposition(Block::is_occupied)
    }

    /// Index and owner of the rightmost occupied block
    pub fn find_last_file(&self) -> Option<(usize, FileId)> {
        self.blocks
            .iter()
            .enumerate()
            .rev()
            .find_map(|(index, block)| block.id.map(|id| (index, id)))
    }

    /// Index of the leftmost free block holding at least `min_size` units
    pub fn find_first_free(&self, min_size: u64) -> Option<usize> {
        self.find_free_in(0..self.blocks.len(), min_size)
    }

    /// Leftmost free block of at least `min_size` units within `range`
    ///
    /// The range is clamped to the list length.
    pub fn find_free_in(&self, range: Range<usize>, min_size: u64) -> Option<usize> {
        let end = range.end.min(self.blocks.len());
        let start = range.start.min(end);

        self.blocks[start..end]
            .iter()
            .position(|block| block.is_free() && block.size >= min_size)
            .map(|offset| start + offset)
    }

    /// Index of the first block owned by `id`
    pub fn position_of(&self, id: FileId) -> Option<usize> {
        self.blocks.iter().position(|block| block.holds(id))
    }

    /// Unit position where the block at `index` starts
    pub fn unit_offset(&self, index: usize) -> u64 {
        self.blocks[..index].iter().map(|block| block.size).sum()
    }

    /// Reduce a block by `amount` units, removing it when it reaches zero
    ///
    /// Returns `true` if the block was removed. Removing a file block can
    /// leave two free blocks side by side; callers restore coalescing with
    /// [`BlockList::insert_or_merge_free`].
    ///
    /// # Panics
    ///
    /// Panics if `amount` exceeds the block size.
    pub fn shrink_or_remove(&mut self, index: usize, amount: u64) -> bool {
        let block = &mut self.blocks[index];
        assert!(
            amount <= block.size,
            "cannot shrink block {} of size {} by {}",
            index,
            block.size,
            amount
        );

        block.size -= amount;
        self.compacted_by = None;
        if block.size == 0 {
            self.blocks.remove(index);
            true
        } else {
            false
        }
    }

    /// Add `amount` free units at the boundary before `index`
    ///
    /// Merges into a free neighbour on either side (or both, joining them)
    /// and returns the index of the resulting free block.
    ///
    /// # Panics
    ///
    /// Panics if `amount` is zero or `index` is past the end of the list.
    pub fn insert_or_merge_free(&mut self, index: usize, amount: u64) -> usize {
        assert!(amount > 0, "cannot insert an empty free run");
        assert!(index <= self.blocks.len(), "free insert at {} past end", index);
        self.compacted_by = None;

        let left_free = index > 0 && self.blocks[index - 1].is_free();
        let right_free = index < self.blocks.len() && self.blocks[index].is_free();

        match (left_free, right_free) {
            (true, true) => {
                let right = self.blocks.remove(index);
                self.blocks[index - 1].size += amount + right.size;
                index - 1
            }
            (true, false) => {
                self.blocks[index - 1].size += amount;
                index - 1
            }
            (false, true) => {
                self.blocks[index].size += amount;
                index
            }
            (false, false) => {
                self.blocks.insert(index, Block::free(amount));
                index
            }
        }
    }

    /// Insert a new file block at `index`
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero.
    pub fn insert_file(&mut self, index: usize, id: FileId, size: u64) {
        assert!(size > 0, "cannot insert empty block for file {}", id);
        self.compacted_by = None;
        self.blocks.insert(index, Block::file(id, size));
    }

    /// Place `amount` units of file `id` at `index`, extending a neighbour
    /// that already belongs to the same file
    ///
    /// Returns the index of the block now holding the units.
    pub fn insert_or_extend_file(&mut self, index: usize, id: FileId, amount: u64) -> usize {
        assert!(amount > 0, "cannot insert empty block for file {}", id);
        self.compacted_by = None;

        let left_same = index > 0 && self.blocks[index - 1].holds(id);
        let right_same = index < self.blocks.len() && self.blocks[index].holds(id);

        match (left_same, right_same) {
            (true, true) => {
                let right = self.blocks.remove(index);
                self.blocks[index - 1].size += amount + right.size;
                index - 1
            }
            (true, false) => {
                self.blocks[index - 1].size += amount;
                index - 1
            }
            (false, true) => {
                self.blocks[index].size += amount;
                index
            }
            (false, false) => {
                self.insert_file(index, id, amount);
                index
            }
        }
    }

    /// Turn the file block at `index` into free space
    ///
    /// Returns the index of the (possibly merged) free block.
    pub fn release_file(&mut self, index: usize) -> usize {
        assert!(
            self.blocks[index].is_occupied(),
            "block {} is already free",
            index
        );
        let block = self.blocks.remove(index);
        self.insert_or_merge_free(index, block.size)
    }

    /// Carve a file of `size` units out of the front of the free block at
    /// `index`, leaving any remainder free just after it
    pub fn carve_file(&mut self, index: usize, id: FileId, size: u64) {
        assert!(
            self.blocks[index].is_free(),
            "block {} is not free space",
            index
        );
        self.shrink_or_remove(index, size);
        self.insert_file(index, id, size);
    }

    /// Extents occupied by each file, in position order
    pub fn file_extents(&self) -> BTreeMap<FileId, Vec<Extent>> {
        let mut extents: BTreeMap<FileId, Vec<Extent>> = BTreeMap::new();
        let mut position = 0;

        for block in &self.blocks {
            if let Some(id) = block.id {
                extents
                    .entry(id)
                    .or_default()
                    .push(Extent::new(position, block.size));
            }
            position += block.size;
        }

        extents
    }

    /// Free runs that sit before the last file block
    pub fn interior_free_runs(&self) -> usize {
        match self.find_last_occupied() {
            Some(last) => self.blocks[..last].iter().filter(|b| b.is_free()).count(),
            None => 0,
        }
    }

    /// Fragmentation score (0.0 = all free space trails the data)
    ///
    /// Counts free runs stranded between file data, normalised by the
    /// number of free units.
    pub fn fragmentation_score(&self) -> f64 {
        let free = self.free_size();
        if free == 0 {
            return 0.0;
        }

        self.interior_free_runs() as f64 / free as f64
    }

    /// Check all structural invariants
    pub fn validate(&self) -> Result<()> {
        validation::check_blocks(&self.blocks)
    }

    /// Expand the list one glyph per unit
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for BlockList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for block in &self.blocks {
            let glyph = block.glyph();
            for _ in 0..block.size {
                write!(f, "{}", glyph)?;
            }
        }
        Ok(())
    }
}
