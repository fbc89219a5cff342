use zerocopy::{AsBytes, FromBytes, LayoutVerified, Unaligned};

use crate::codec;
use crate::error::{MemFSError, Result};
use crate::layout::{BLOCK_SIZE, DATA_SIZE, FILENAME_SIZE, INT_SIZE, MAPPING_SIZE};

/// The block number to access ranging from 0 (the first block) to n - 1 (the last
/// block) where n is number of blocks in the arena.
pub type BlockNumber = usize;

/// How the bytes of a block are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockMode {
    /// Unused, all zero.
    Free,
    /// File payload followed by the number of the next block in the chain.
    DataAndLink,
    /// A run of fixed width `name: descriptor index` directory entries.
    Mappings,
    /// The padded target path of a symbolic link.
    Symlink,
}

/// One directory entry as laid out inside a mappings block. An all zero slot is free.
#[repr(C)]
#[derive(AsBytes, FromBytes, Unaligned, Clone, Copy)]
struct MappingEntry {
    name: [u8; FILENAME_SIZE],
    index: [u8; INT_SIZE],
}

impl MappingEntry {
    fn new(name: &str, descriptor_index: usize) -> Result<Self> {
        Ok(Self {
            name: codec::encode_name(name)?,
            index: codec::encode_int(descriptor_index)?,
        })
    }

    fn parse(chunk: &[u8]) -> Option<Self> {
        LayoutVerified::<&[u8], MappingEntry>::new_unaligned(chunk).map(|entry| *entry)
    }

    fn is_clear(&self) -> bool {
        codec::is_clear(self.as_bytes())
    }

    fn name(&self) -> Result<String> {
        codec::decode_name(&self.name)
    }

    fn descriptor_index(&self) -> Result<usize> {
        codec::decode_int(&self.index)
    }
}

/// A live directory entry read back from a mappings block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    pub name: String,
    pub descriptor_index: usize,
}

#[derive(Clone)]
pub struct Block {
    mode: BlockMode,
    space: [u8; BLOCK_SIZE],
}

impl Default for Block {
    fn default() -> Self {
        Self {
            mode: BlockMode::Free,
            space: [0; BLOCK_SIZE],
        }
    }
}

impl Block {
    pub fn mode(&self) -> BlockMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: BlockMode) {
        self.mode = mode;
    }

    pub fn bytes(&self) -> &[u8] {
        &self.space
    }

    pub fn is_clear(&self) -> bool {
        codec::is_clear(&self.space)
    }

    /// Zeroes the buffer and returns the block to `Free`.
    pub fn clear(&mut self) {
        self.space = [0; BLOCK_SIZE];
        self.mode = BlockMode::Free;
    }

    /// Copies `data` into the buffer starting at `offset`.
    ///
    /// # Errors
    ///
    /// Writing past the end of the block returns `OutOfRange`.
    pub fn set_data(&mut self, data: &[u8], offset: usize) -> Result<()> {
        let end = offset + data.len();
        if end > BLOCK_SIZE {
            return Err(MemFSError::OutOfRange(format!(
                "write of {} bytes at offset {} overflows a {} byte block",
                data.len(),
                offset,
                BLOCK_SIZE
            )));
        }
        self.space[offset..end].copy_from_slice(data);
        Ok(())
    }

    fn expect_mode(&self, mode: BlockMode) -> Result<()> {
        if self.mode != mode {
            return Err(MemFSError::TypeMismatch(format!(
                "block is {:?}, expected {:?}",
                self.mode, mode
            )));
        }
        Ok(())
    }

    // Data blocks.

    /// The payload region of a data block.
    pub fn data(&self) -> &[u8] {
        &self.space[..DATA_SIZE]
    }

    /// Number of the next block in the chain, 0 when this is the last one.
    pub fn link(&self) -> Result<usize> {
        self.expect_mode(BlockMode::DataAndLink)?;
        codec::decode_int(&self.space[DATA_SIZE..])
    }

    pub fn set_link(&mut self, next: BlockNumber) -> Result<()> {
        self.expect_mode(BlockMode::DataAndLink)?;
        let encoded = codec::encode_int(next)?;
        self.set_data(&encoded, DATA_SIZE)
    }

    // Mapping blocks.

    fn slots(&self) -> impl Iterator<Item = (usize, MappingEntry)> + '_ {
        self.space
            .chunks_exact(MAPPING_SIZE)
            .enumerate()
            .filter_map(|(slot, chunk)| MappingEntry::parse(chunk).map(|entry| (slot, entry)))
    }

    fn find_slot(&self, name: &str) -> Result<Option<(usize, MappingEntry)>> {
        let wanted = codec::canonical_name(name)?;
        for (slot, entry) in self.slots() {
            if !entry.is_clear() && entry.name()? == wanted {
                return Ok(Some((slot, entry)));
            }
        }
        Ok(None)
    }

    pub fn has_free_slot(&self) -> bool {
        self.slots().any(|(_, entry)| entry.is_clear())
    }

    /// Writes `name: descriptor_index` into the first free slot.
    ///
    /// # Errors
    ///
    /// Returns `ResourceExhausted` when every slot is taken, `TypeMismatch` if this is
    /// not a mappings block.
    pub fn create_mapping(&mut self, name: &str, descriptor_index: usize) -> Result<()> {
        self.expect_mode(BlockMode::Mappings)?;
        let entry = MappingEntry::new(name, descriptor_index)?;
        let slot = self
            .slots()
            .find(|(_, existing)| existing.is_clear())
            .map(|(slot, _)| slot)
            .ok_or(MemFSError::ResourceExhausted("directory full"))?;
        self.set_data(entry.as_bytes(), slot * MAPPING_SIZE)
    }

    pub fn descriptor_index(&self, name: &str) -> Result<usize> {
        self.expect_mode(BlockMode::Mappings)?;
        match self.find_slot(name)? {
            Some((_, entry)) => entry.descriptor_index(),
            None => Err(MemFSError::NotFound(name.to_string())),
        }
    }

    /// Frees the slot holding `name`. Returns whether there was one.
    pub fn delete_mapping(&mut self, name: &str) -> bool {
        if self.mode != BlockMode::Mappings {
            return false;
        }
        match self.find_slot(name) {
            Ok(Some((slot, _))) => {
                let start = slot * MAPPING_SIZE;
                self.space[start..start + MAPPING_SIZE].copy_from_slice(&[0; MAPPING_SIZE]);
                true
            }
            _ => false,
        }
    }

    /// Live entries in slot order.
    pub fn mappings(&self) -> Result<Vec<Mapping>> {
        self.expect_mode(BlockMode::Mappings)?;
        let mut mappings = Vec::new();
        for (_, entry) in self.slots().filter(|(_, entry)| !entry.is_clear()) {
            mappings.push(Mapping {
                name: entry.name()?,
                descriptor_index: entry.descriptor_index()?,
            });
        }
        Ok(mappings)
    }

    // Symlink blocks.

    pub fn set_symlink_target(&mut self, target: &str) -> Result<()> {
        self.expect_mode(BlockMode::Symlink)?;
        if target.len() > BLOCK_SIZE {
            return Err(MemFSError::TooLarge(target.len()));
        }
        self.space = [0; BLOCK_SIZE];
        self.set_data(target.as_bytes(), 0)
    }

    pub fn symlink_target(&self) -> Result<String> {
        self.expect_mode(BlockMode::Symlink)?;
        codec::decode_text(&self.space)
    }
}
