use std::collections::HashMap;

use rand::Rng;

use crate::alloc::Bitmap;
use crate::codec;
use crate::error::{MemFSError, Result};
use crate::io::{BlockArena, BlockMode, BlockNumber};
use crate::layout::{BLOCK_SIZE, DATA_SIZE, MAX_INT, ROOT_DESCRIPTOR};
use crate::node::{Descriptor, DescriptorMode, DescriptorTable};
use crate::path::PathResolver;
use crate::sb::{FsStats, SuperBlock};

/// Numeric handle returned by `open`. Unrelated to the descriptor index it is bound to.
pub type FileHandle = u16;

/// One line of `ls` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LsEntry {
    pub name: String,
    pub mode: DescriptorMode,
    pub reference_count: usize,
    pub descriptor_index: usize,
    pub size: usize,
}

/// An in-memory block file system.
///
/// # Layout
/// ==========================================================================
/// | Block arena (SuperBlock::blocks_count blocks of BLOCK_SIZE bytes)       |
/// | Bitmap (one bit per block)                                              |
/// | Descriptor table (mkfs(n) entries, descriptor 0 is the root directory)  |
/// ==========================================================================
///
/// Every operation runs to completion and either fully applies or leaves the state as
/// it found it. Concurrent use needs one lock around the whole value.
pub struct MemFS {
    super_block: SuperBlock,
    blocks: BlockArena,
    data_map: Bitmap,
    descriptors: DescriptorTable,
    /// `numeric handle -> descriptor index` for every open file.
    open_files: HashMap<FileHandle, usize>,
    cwd: usize,
    route: Vec<String>,
}

impl MemFS {
    /// Allocates the block arena and bitmap. The result must be formatted with `mkfs`
    /// before any other operation.
    pub fn mount(super_block: SuperBlock) -> Result<Self> {
        super_block.validate()?;
        info!(
            "mounting {} blocks of {} bytes",
            super_block.blocks_count, BLOCK_SIZE
        );
        Ok(MemFS {
            blocks: BlockArena::new(super_block.blocks_count),
            data_map: Bitmap::new(super_block.blocks_count),
            descriptors: DescriptorTable::default(),
            open_files: HashMap::new(),
            cwd: ROOT_DESCRIPTOR,
            route: Vec::new(),
            super_block,
        })
    }

    /// Discards the arena and everything stored in it.
    pub fn unmount(self) {
        info!(
            "unmounting, dropping {} open handles",
            self.open_files.len()
        );
    }

    /// Formats the arena with `descriptors_count` descriptors and an empty root directory.
    pub fn mkfs(&mut self, descriptors_count: usize) -> Result<()> {
        if descriptors_count == 0 || descriptors_count > MAX_INT + 1 {
            return Err(MemFSError::InvalidArgument(format!(
                "descriptor count must be within 1..={}, got {}",
                MAX_INT + 1,
                descriptors_count
            )));
        }

        self.blocks.zero_all();
        self.data_map = Bitmap::new(self.super_block.blocks_count);
        self.open_files.clear();
        self.cwd = ROOT_DESCRIPTOR;
        self.route.clear();
        self.descriptors = DescriptorTable::new(descriptors_count);

        let root_block = self.allocate(1, BlockMode::Mappings)?[0];
        self.descriptors
            .get_mut(ROOT_DESCRIPTOR)?
            .initiate_as_directory(root_block, ROOT_DESCRIPTOR);
        info!(
            "formatted with {} descriptors, root directory in block {}",
            descriptors_count, root_block
        );
        Ok(())
    }

    pub fn create(&mut self, path: &str) -> Result<()> {
        self.formatted()?;
        let (parent, name) = self.resolver().parent_of(path, self.cwd)?;
        self.ensure_vacant(parent, &name)?;

        let (index, descriptor) = self.descriptors.find_free()?;
        descriptor.initiate_as_file(Vec::new());
        self.bind(parent, &name, index)?;
        info!("created file {} as descriptor {}", path, index);
        Ok(())
    }

    pub fn mkdir(&mut self, path: &str) -> Result<()> {
        self.formatted()?;
        let (parent, name) = self.resolver().parent_of(path, self.cwd)?;
        self.ensure_vacant(parent, &name)?;

        let index = self.descriptors.find_free()?.0;
        let block = self.allocate(1, BlockMode::Mappings)?[0];
        self.descriptors
            .get_mut(index)?
            .initiate_as_directory(block, parent);
        self.bind(parent, &name, index)?;
        info!("created directory {} as descriptor {}", path, index);
        Ok(())
    }

    pub fn rmdir(&mut self, path: &str) -> Result<()> {
        self.formatted()?;
        let entry = self.resolver().entry(path, self.cwd, false)?;
        let name = entry.name.ok_or_else(|| {
            MemFSError::InvalidArgument(format!("cannot remove \"{}\"", path))
        })?;

        let descriptor = self.descriptors.get(entry.descriptor)?;
        if descriptor.mode() != DescriptorMode::Directory {
            return Err(MemFSError::TypeMismatch(format!(
                "{} is not a directory",
                path
            )));
        }
        if !self.blocks.block(descriptor.first_block()?)?.is_clear() {
            return Err(MemFSError::NotEmpty(path.to_string()));
        }
        if self.is_ancestor_of_cwd(entry.descriptor)? {
            return Err(MemFSError::Busy(path.to_string()));
        }

        let parent_block = self.mappings_block(entry.parent)?;
        self.blocks.block_mut(parent_block)?.delete_mapping(&name);
        self.free_descriptor(entry.descriptor)?;
        info!("removed directory {}", path);
        Ok(())
    }

    /// Creates `path` as a symbolic link holding `target`. The target is not checked.
    pub fn symlink(&mut self, target: &str, path: &str) -> Result<()> {
        self.formatted()?;
        if target.len() > BLOCK_SIZE {
            return Err(MemFSError::TooLarge(target.len()));
        }
        if codec::trim(target).is_empty() {
            return Err(MemFSError::InvalidArgument(
                "symlink target is empty".to_string(),
            ));
        }
        let (parent, name) = self.resolver().parent_of(path, self.cwd)?;
        self.ensure_vacant(parent, &name)?;

        let index = self.descriptors.find_free()?.0;
        let block = self.allocate(1, BlockMode::Symlink)?[0];
        self.blocks.block_mut(block)?.set_symlink_target(target)?;
        self.descriptors.get_mut(index)?.initiate_as_symlink(block);
        self.bind(parent, &name, index)?;
        info!("linked {} -> {} as descriptor {}", path, target, index);
        Ok(())
    }

    /// Opens whatever `path` names, following a trailing symlink, and returns a fresh
    /// random handle for it.
    pub fn open(&mut self, path: &str) -> Result<FileHandle> {
        self.formatted()?;
        let entry = self.resolver().entry(path, self.cwd, true)?;
        if self.open_files.len() >= FileHandle::MAX as usize {
            return Err(MemFSError::ResourceExhausted("no free handles"));
        }

        let mut rng = rand::thread_rng();
        let handle = loop {
            let candidate: FileHandle = rng.gen_range(0..FileHandle::MAX);
            if !self.open_files.contains_key(&candidate) {
                break candidate;
            }
        };
        self.open_files.insert(handle, entry.descriptor);
        debug!("opened {} as handle {}", path, handle);
        Ok(handle)
    }

    pub fn close(&mut self, handle: FileHandle) -> Result<()> {
        self.open_files
            .remove(&handle)
            .map(|_| ())
            .ok_or_else(|| MemFSError::NotFound(format!("handle {} is not open", handle)))
    }

    /// Writes `data` at `offset`, appending blocks when the file is too short. Blocks are
    /// reserved up front, so running out of space leaves the file untouched.
    pub fn write(&mut self, handle: FileHandle, offset: usize, data: &[u8]) -> Result<()> {
        let index = self.opened(handle)?;
        let size = self.file(index)?.size();
        if data.is_empty() {
            return Ok(());
        }

        let total_size = end_of(offset, data.len())?;
        if total_size > size {
            self.grow(index, blocks_for(total_size - size))?;
        }

        let chain = self.descriptors.get(index)?.blocks().to_vec();
        let mut written = 0;
        while written < data.len() {
            let position = offset + written;
            let within = position % DATA_SIZE;
            let count = (DATA_SIZE - within).min(data.len() - written);
            let blocknr = chain_block(&chain, position / DATA_SIZE)?;
            self.blocks
                .block_mut(blocknr)?
                .set_data(&data[written..written + count], within)?;
            written += count;
        }

        self.descriptors.get_mut(index)?.update_size();
        debug!(
            "wrote {} bytes at offset {} through handle {}",
            data.len(),
            offset,
            handle
        );
        Ok(())
    }

    /// Reads `size` bytes at `offset`, or everything from `offset` on when `size` is
    /// `None`.
    pub fn read(&self, handle: FileHandle, offset: usize, size: Option<usize>) -> Result<Vec<u8>> {
        let descriptor = self.file(self.opened(handle)?)?;
        let file_size = descriptor.size();
        if offset > file_size {
            return Err(out_of_range(offset, 0, file_size));
        }
        let size = size.unwrap_or(file_size - offset);
        if end_of(offset, size)? > file_size {
            return Err(out_of_range(offset, size, file_size));
        }
        if size == 0 {
            return Ok(Vec::new());
        }

        let first = offset / DATA_SIZE;
        let last = blocks_for(offset + size);
        let mut gathered = Vec::with_capacity((last - first) * DATA_SIZE);
        for position in first..last {
            let blocknr = chain_block(descriptor.blocks(), position)?;
            gathered.extend_from_slice(self.blocks.block(blocknr)?.data());
        }

        let start = offset - first * DATA_SIZE;
        Ok(gathered[start..start + size].to_vec())
    }

    pub fn truncate(&mut self, path: &str, size: usize) -> Result<()> {
        self.formatted()?;
        let index = self.resolver().entry(path, self.cwd, true)?.descriptor;
        let current_size = self.file(index)?.size();

        if size > current_size {
            self.grow(index, blocks_for(size - current_size))?;
        } else if size < current_size {
            let retained = blocks_for(size);
            let excess = self
                .descriptors
                .get_mut(index)?
                .blocks_mut()
                .split_off(retained);
            for blocknr in excess {
                self.release_block(blocknr)?;
            }

            if let Some(&last) = self.descriptors.get(index)?.blocks().last() {
                // Bytes of the last block past the new size are cleared.
                let tail = size - (retained - 1) * DATA_SIZE;
                let block = self.blocks.block_mut(last)?;
                block.set_data(&[0; DATA_SIZE][..DATA_SIZE - tail], tail)?;
                block.set_link(0)?;
            }
        } else {
            debug!("truncate of {} leaves size unchanged", path);
            return Ok(());
        }

        self.descriptors.get_mut(index)?.update_size();
        info!(
            "truncated {} from {} to {} bytes",
            path,
            current_size,
            self.descriptors.get(index)?.size()
        );
        Ok(())
    }

    /// Adds `new_path` as another name for the file or symlink at `path`.
    pub fn link(&mut self, path: &str, new_path: &str) -> Result<()> {
        self.formatted()?;
        let entry = self.resolver().entry(path, self.cwd, false)?;
        if self.descriptors.get(entry.descriptor)?.mode() == DescriptorMode::Directory {
            return Err(MemFSError::TypeMismatch(format!(
                "{} is a directory, hard links to directories are not allowed",
                path
            )));
        }

        let (parent, name) = self.resolver().parent_of(new_path, self.cwd)?;
        self.ensure_vacant(parent, &name)?;
        self.bind(parent, &name, entry.descriptor)?;
        self.descriptors.get_mut(entry.descriptor)?.acquire();
        info!("linked {} to {}", new_path, path);
        Ok(())
    }

    /// Removes one name of a file or symlink. The last name going away frees its blocks.
    pub fn unlink(&mut self, path: &str) -> Result<()> {
        self.formatted()?;
        let entry = self.resolver().entry(path, self.cwd, false)?;
        let name = entry.name.ok_or_else(|| {
            MemFSError::InvalidArgument(format!("cannot unlink \"{}\"", path))
        })?;
        if self.descriptors.get(entry.descriptor)?.mode() == DescriptorMode::Directory {
            return Err(MemFSError::TypeMismatch(format!(
                "{} is a directory, use rmdir",
                path
            )));
        }

        let parent_block = self.mappings_block(entry.parent)?;
        self.blocks.block_mut(parent_block)?.delete_mapping(&name);
        if self.descriptors.get_mut(entry.descriptor)?.release() == 0 {
            info!(
                "descriptor {} has no references left, freeing it",
                entry.descriptor
            );
            self.free_descriptor(entry.descriptor)?;
        }
        Ok(())
    }

    pub fn cd(&mut self, path: &str) -> Result<()> {
        self.formatted()?;
        let resolved = self
            .resolver()
            .resolve(path, self.cwd, self.route.clone())?;
        self.cwd = resolved.descriptor;
        self.route = resolved.route;
        debug!("working directory is now {}", self.pwd());
        Ok(())
    }

    /// The rendered working directory.
    pub fn pwd(&self) -> String {
        format!("/{}", self.route.join("/"))
    }

    pub fn current_directory(&self) -> usize {
        self.cwd
    }

    pub fn ls(&self) -> Result<Vec<LsEntry>> {
        self.formatted()?;
        let block = self.blocks.block(self.mappings_block(self.cwd)?)?;
        block
            .mappings()?
            .into_iter()
            .map(|mapping| -> Result<LsEntry> {
                let descriptor = self.descriptors.get(mapping.descriptor_index)?;
                Ok(LsEntry {
                    name: mapping.name,
                    mode: descriptor.mode(),
                    reference_count: descriptor.reference_count(),
                    descriptor_index: mapping.descriptor_index,
                    size: descriptor.size(),
                })
            })
            .collect()
    }

    pub fn fstat(&self, descriptor_index: usize) -> Result<&Descriptor> {
        self.formatted()?;
        self.descriptors.get(descriptor_index)
    }

    pub fn statfs(&self) -> FsStats {
        FsStats {
            descriptors_count: self.descriptors.len(),
            free_descriptors_count: self.descriptors.free_count(),
            free_blocks_count: self.data_map.free_count(),
            ..FsStats::empty(self.super_block.blocks_count)
        }
    }

    fn formatted(&self) -> Result<()> {
        if self.descriptors.is_empty() {
            return Err(MemFSError::NotFormatted);
        }
        Ok(())
    }

    fn resolver(&self) -> PathResolver<'_> {
        PathResolver::new(&self.descriptors, &self.blocks, self.super_block.hop_limit)
    }

    fn mappings_block(&self, dir: usize) -> Result<BlockNumber> {
        self.descriptors.get(dir)?.first_block()
    }

    /// Checks that `name` can be added to directory `dir` without touching anything.
    fn ensure_vacant(&self, dir: usize, name: &str) -> Result<()> {
        let block = self.blocks.block(self.mappings_block(dir)?)?;
        match block.descriptor_index(name) {
            Ok(_) => return Err(MemFSError::AlreadyExists(name.to_string())),
            Err(MemFSError::NotFound(_)) => (),
            Err(e) => return Err(e),
        }
        if !block.has_free_slot() {
            return Err(MemFSError::ResourceExhausted("directory full"));
        }
        Ok(())
    }

    fn bind(&mut self, dir: usize, name: &str, index: usize) -> Result<()> {
        let block = self.mappings_block(dir)?;
        self.blocks.block_mut(block)?.create_mapping(name, index)
    }

    fn opened(&self, handle: FileHandle) -> Result<usize> {
        self.open_files
            .get(&handle)
            .copied()
            .ok_or_else(|| MemFSError::NotFound(format!("handle {} is not open", handle)))
    }

    fn file(&self, index: usize) -> Result<&Descriptor> {
        let descriptor = self.descriptors.get(index)?;
        if descriptor.mode() != DescriptorMode::File {
            return Err(MemFSError::TypeMismatch(format!(
                "descriptor {} is a {}, not a file",
                index,
                descriptor.mode()
            )));
        }
        Ok(descriptor)
    }

    /// Reserves `count` zeroed blocks in `mode`, all of them or none.
    fn allocate(&mut self, count: usize, mode: BlockMode) -> Result<Vec<BlockNumber>> {
        let reserved = self.data_map.reserve(count)?;
        for &blocknr in reserved.iter() {
            let block = self.blocks.block_mut(blocknr)?;
            block.clear();
            block.set_mode(mode);
        }
        debug!("allocated blocks {:?} as {:?}", reserved, mode);
        Ok(reserved)
    }

    /// Appends `count` data blocks to the chain of file `index`.
    fn grow(&mut self, index: usize, count: usize) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        let appended = self.allocate(count, BlockMode::DataAndLink)?;

        let mut previous = self.descriptors.get(index)?.blocks().last().copied();
        for &blocknr in appended.iter() {
            if let Some(prev) = previous {
                self.blocks.block_mut(prev)?.set_link(blocknr)?;
            }
            previous = Some(blocknr);
        }
        let descriptor = self.descriptors.get_mut(index)?;
        descriptor.blocks_mut().extend(appended);
        descriptor.update_size();
        Ok(())
    }

    fn release_block(&mut self, blocknr: BlockNumber) -> Result<()> {
        self.blocks.block_mut(blocknr)?.clear();
        self.data_map.reset(blocknr);
        debug!("released block {}", blocknr);
        Ok(())
    }

    /// Returns every block of descriptor `index` to the bitmap and resets it.
    fn free_descriptor(&mut self, index: usize) -> Result<()> {
        let blocks = self.descriptors.get(index)?.blocks().to_vec();
        for blocknr in blocks {
            self.release_block(blocknr)?;
        }
        self.descriptors.get_mut(index)?.free();

        let before = self.open_files.len();
        self.open_files.retain(|_, bound| *bound != index);
        let dropped = before - self.open_files.len();
        if dropped > 0 {
            warn!(
                "descriptor {} freed while open, dropped {} handles",
                index, dropped
            );
        }
        Ok(())
    }

    fn is_ancestor_of_cwd(&self, dir: usize) -> Result<bool> {
        let mut current = self.cwd;
        // The parent chain ends at the root, any longer walk means a corrupt table.
        for _ in 0..=self.descriptors.len() {
            if current == dir {
                return Ok(true);
            }
            if current == ROOT_DESCRIPTOR {
                return Ok(false);
            }
            current = self.descriptors.get(current)?.parent_directory();
        }
        Ok(false)
    }
}

/// Number of data blocks needed to hold `bytes`.
fn blocks_for(bytes: usize) -> usize {
    bytes / DATA_SIZE + (bytes % DATA_SIZE != 0) as usize
}

/// First byte past a `len` byte range starting at `offset`.
fn end_of(offset: usize, len: usize) -> Result<usize> {
    offset.checked_add(len).ok_or_else(|| {
        MemFSError::OutOfRange(format!(
            "{} bytes at offset {} overflow the address space",
            len, offset
        ))
    })
}

fn chain_block(chain: &[BlockNumber], position: usize) -> Result<BlockNumber> {
    chain.get(position).copied().ok_or_else(|| {
        MemFSError::OutOfRange(format!(
            "block {} of a {} block chain",
            position,
            chain.len()
        ))
    })
}

fn out_of_range(offset: usize, size: usize, file_size: usize) -> MemFSError {
    MemFSError::OutOfRange(format!(
        "{} bytes at offset {} exceed file size {}",
        size, offset, file_size
    ))
}
