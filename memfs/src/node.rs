use std::fmt;

use crate::error::{MemFSError, Result};
use crate::io::BlockNumber;
use crate::layout::{BLOCK_SIZE, DATA_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorMode {
    File,
    Directory,
    Symlink,
    None,
}

impl fmt::Display for DescriptorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DescriptorMode::File => "File",
            DescriptorMode::Directory => "Directory",
            DescriptorMode::Symlink => "Symlink",
            DescriptorMode::None => "Not defined",
        };
        f.pad(name)
    }
}

/// Metadata for one file system object. Relationships to other descriptors are plain
/// indices into the owning `DescriptorTable`.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    is_used: bool,
    mode: DescriptorMode,
    /// The number of directory entries naming this descriptor.
    reference_count: usize,
    /// The total size of the file in bytes, always a whole number of data blocks.
    size: usize,
    /// For a file, the ordered chain of data blocks. For a directory or symlink, a single
    /// mappings or target block.
    links_blocks: Vec<BlockNumber>,
    /// Only meaningful for directories. The root is its own parent.
    parent_directory: usize,
}

impl Default for Descriptor {
    fn default() -> Self {
        Self {
            is_used: false,
            mode: DescriptorMode::None,
            reference_count: 0,
            size: 0,
            links_blocks: Vec::new(),
            parent_directory: 0,
        }
    }
}

impl Descriptor {
    pub fn is_used(&self) -> bool {
        self.is_used
    }

    pub fn mode(&self) -> DescriptorMode {
        self.mode
    }

    pub fn reference_count(&self) -> usize {
        self.reference_count
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn blocks(&self) -> &[BlockNumber] {
        &self.links_blocks
    }

    pub fn parent_directory(&self) -> usize {
        self.parent_directory
    }

    /// The mappings block of a directory or the target block of a symlink.
    pub fn first_block(&self) -> Result<BlockNumber> {
        self.links_blocks.first().copied().ok_or_else(|| {
            MemFSError::NotFound(format!("{} descriptor owns no blocks", self.mode))
        })
    }

    /// A new file starts with no blocks and one reference, the name it is created under.
    pub(crate) fn initiate_as_file(&mut self, blocks: Vec<BlockNumber>) {
        self.is_used = true;
        self.mode = DescriptorMode::File;
        self.reference_count = 1;
        self.links_blocks = blocks;
        self.parent_directory = 0;
        self.update_size();
    }

    pub(crate) fn initiate_as_directory(&mut self, block: BlockNumber, parent: usize) {
        self.is_used = true;
        self.mode = DescriptorMode::Directory;
        self.reference_count = 1;
        self.size = 0;
        self.links_blocks = vec![block];
        self.parent_directory = parent;
    }

    pub(crate) fn initiate_as_symlink(&mut self, block: BlockNumber) {
        self.is_used = true;
        self.mode = DescriptorMode::Symlink;
        self.reference_count = 1;
        self.size = BLOCK_SIZE;
        self.links_blocks = vec![block];
        self.parent_directory = 0;
    }

    pub(crate) fn blocks_mut(&mut self) -> &mut Vec<BlockNumber> {
        &mut self.links_blocks
    }

    pub(crate) fn acquire(&mut self) {
        self.reference_count += 1;
    }

    /// Drops one reference and returns how many remain.
    pub(crate) fn release(&mut self) -> usize {
        self.reference_count = self.reference_count.saturating_sub(1);
        self.reference_count
    }

    pub(crate) fn update_size(&mut self) {
        if self.mode == DescriptorMode::File {
            self.size = self.links_blocks.len() * DATA_SIZE;
        }
    }

    pub(crate) fn free(&mut self) {
        *self = Descriptor::default();
    }
}

/// Fixed capacity table of descriptors, sized at format time.
#[derive(Debug, Default)]
pub struct DescriptorTable {
    descriptors: Vec<Descriptor>,
}

impl DescriptorTable {
    pub fn new(count: usize) -> Self {
        Self {
            descriptors: vec![Descriptor::default(); count],
        }
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn free_count(&self) -> usize {
        self.descriptors.iter().filter(|d| !d.is_used).count()
    }

    pub fn find_free(&mut self) -> Result<(usize, &mut Descriptor)> {
        self.descriptors
            .iter_mut()
            .enumerate()
            .find(|(_, descriptor)| !descriptor.is_used)
            .ok_or(MemFSError::ResourceExhausted("no free descriptors"))
    }

    pub fn get(&self, index: usize) -> Result<&Descriptor> {
        self.descriptors
            .get(index)
            .ok_or_else(|| MemFSError::NotFound(format!("descriptor {}", index)))
    }

    pub fn get_mut(&mut self, index: usize) -> Result<&mut Descriptor> {
        self.descriptors
            .get_mut(index)
            .ok_or_else(|| MemFSError::NotFound(format!("descriptor {}", index)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Descriptor> {
        self.descriptors.iter()
    }
}
