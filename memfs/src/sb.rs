use crate::error::{MemFSError, Result};
use crate::layout::{BLOCK_SIZE, DEFAULT_BLOCKS_COUNT, DEFAULT_HOP_LIMIT, MAX_INT};

/// Geometry the file system is mounted with.
///
/// Keeps the size of the block arena and the bound on path resolution. The number of
/// descriptors is not part of it, `mkfs` decides that when formatting.
#[derive(Debug, Clone, PartialEq)]
pub struct SuperBlock {
    /// Block numbers are stored in `INT_SIZE` bytes, which caps the arena at 65536 blocks.
    pub blocks_count: usize,
    /// Resolution steps allowed before a path is treated as a symlink cycle.
    pub hop_limit: usize,
}

impl Default for SuperBlock {
    fn default() -> Self {
        Self {
            blocks_count: DEFAULT_BLOCKS_COUNT,
            hop_limit: DEFAULT_HOP_LIMIT,
        }
    }
}

impl SuperBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of blocks in the arena.
    pub fn with_block_count(mut self, blocks: usize) -> Self {
        self.blocks_count = blocks;
        self
    }

    pub fn with_hop_limit(mut self, hops: usize) -> Self {
        self.hop_limit = hops;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.blocks_count == 0 || self.blocks_count > MAX_INT + 1 {
            return Err(MemFSError::InvalidArgument(format!(
                "block count must be within 1..={}, got {}",
                MAX_INT + 1,
                self.blocks_count
            )));
        }
        if self.hop_limit == 0 {
            return Err(MemFSError::InvalidArgument(
                "hop limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Usage counters reported by `statfs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsStats {
    pub block_size: usize,
    pub blocks_count: usize,
    pub free_blocks_count: usize,
    pub descriptors_count: usize,
    pub free_descriptors_count: usize,
}

impl FsStats {
    pub(crate) fn empty(blocks_count: usize) -> Self {
        Self {
            block_size: BLOCK_SIZE,
            blocks_count,
            free_blocks_count: blocks_count,
            descriptors_count: 0,
            free_descriptors_count: 0,
        }
    }
}
