use crate::error::{MemFSError, Result};
use crate::io::block::{Block, BlockNumber};

/// Emulates block storage in process memory. Nothing is ever written to a real device,
/// the arena lives exactly as long as the mounted file system.
pub struct BlockArena {
    blocks: Vec<Block>,
}

impl BlockArena {
    /// Allocates `block_count` zeroed, free blocks.
    pub fn new(block_count: usize) -> Self {
        debug_assert!(block_count > 0);
        BlockArena {
            blocks: vec![Block::default(); block_count],
        }
    }

    /// The total number of blocks available in the arena.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// # Errors
    ///
    /// Accessing a block out of range returns `OutOfRange`.
    pub fn block(&self, blocknr: BlockNumber) -> Result<&Block> {
        self.blocks.get(blocknr).ok_or_else(|| out_of_range(blocknr))
    }

    pub fn block_mut(&mut self, blocknr: BlockNumber) -> Result<&mut Block> {
        self.blocks
            .get_mut(blocknr)
            .ok_or_else(|| out_of_range(blocknr))
    }

    /// Zero out every block, as a fresh format would.
    pub fn zero_all(&mut self) {
        self.blocks.iter_mut().for_each(Block::clear);
    }
}

fn out_of_range(blocknr: BlockNumber) -> MemFSError {
    MemFSError::OutOfRange(format!(
        "block {} exceeds the arena upper bound",
        blocknr
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::BlockMode;

    #[test]
    fn arena_allocates_requested_blocks() {
        let arena = BlockArena::new(4);
        assert_eq!(arena.len(), 4);
        assert!(arena.block(3).unwrap().is_clear());
    }

    #[test]
    fn can_write_start_and_end_blocks() {
        let mut arena = BlockArena::new(2);
        arena.block_mut(0).unwrap().set_data(&[0x55; 8], 0).unwrap();
        arena.block_mut(1).unwrap().set_data(&[0x55; 8], 56).unwrap();

        assert_eq!(&arena.block(0).unwrap().bytes()[..8], &[0x55; 8]);
        assert_eq!(&arena.block(1).unwrap().bytes()[56..], &[0x55; 8]);
    }

    #[test]
    fn access_beyond_range_returns_error() {
        let mut arena = BlockArena::new(1);
        match arena.block_mut(1) {
            Err(MemFSError::OutOfRange(_)) => (),
            _ => panic!("expected an error, got a block instead"),
        }
    }

    #[test]
    fn zero_all_frees_every_block() {
        let mut arena = BlockArena::new(3);
        let block = arena.block_mut(2).unwrap();
        block.set_mode(BlockMode::Symlink);
        block.set_data(b"/x", 0).unwrap();

        arena.zero_all();
        assert_eq!(arena.block(2).unwrap().mode(), BlockMode::Free);
        assert!(arena.block(2).unwrap().is_clear());
    }
}
