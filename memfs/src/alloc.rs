use crate::error::{MemFSError, Result};

#[derive(Debug, PartialEq)]
pub enum State {
    Free,
    Used,
}

/// Tracks one bit per block in the arena, a set bit means the block is allocated.
#[derive(Debug, Clone)]
pub struct Bitmap {
    bitmap: Vec<u64>,
    /// Number of addressable bits. The last word may carry unused high bits.
    size: usize,
}

impl Bitmap {
    pub fn new(size: usize) -> Self {
        Self {
            bitmap: vec![0; (size + 63) / 64],
            size,
        }
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn get(&self, blocknr: usize) -> State {
        assert!(blocknr < self.size, "block {} outside bitmap", blocknr);
        // Grab the u64 containing the significant bit.
        let outer_offset = self.bitmap[blocknr / 64];

        let inner_offset = blocknr % 64;
        let mask = 0b01_u64 << inner_offset;
        match (outer_offset & mask) >> inner_offset {
            0 => State::Free,
            _ => State::Used,
        }
    }

    pub fn test(&self, blocknr: usize) -> bool {
        self.get(blocknr) == State::Used
    }

    pub fn set(&mut self, blocknr: usize) {
        assert!(blocknr < self.size, "block {} outside bitmap", blocknr);
        self.bitmap[blocknr / 64] |= 0b01_u64 << (blocknr % 64);
    }

    pub fn reset(&mut self, blocknr: usize) {
        assert!(blocknr < self.size, "block {} outside bitmap", blocknr);
        self.bitmap[blocknr / 64] &= !(0b01_u64 << (blocknr % 64));
    }

    pub fn free_count(&self) -> usize {
        NextAvailableAllocation::new(self).count()
    }

    /// Marks the lowest free block as used and returns it.
    pub fn first_free(&mut self) -> Result<usize> {
        self.reserve(1)?
            .pop()
            .ok_or(MemFSError::ResourceExhausted("no free blocks"))
    }

    /// Reserves `count` blocks or none at all. Candidates are collected before any bit
    /// flips, so running short leaves the bitmap exactly as it was.
    pub fn reserve(&mut self, count: usize) -> Result<Vec<usize>> {
        let picked: Vec<usize> = NextAvailableAllocation::new(self).take(count).collect();
        if picked.len() < count {
            return Err(MemFSError::ResourceExhausted("no free blocks"));
        }
        for &blocknr in picked.iter() {
            self.set(blocknr);
        }
        Ok(picked)
    }
}

/// Implements a naive block allocation policy for new data block requirements. This policy will
/// retrieve the next available sequential block and on each call to the iterator will return the
/// next consecutive available blocks.
///
/// The iterator only reads the bitmap, so a caller may look ahead and decide whether
/// enough blocks exist before committing any of them.
pub struct NextAvailableAllocation<'a> {
    /// Keeps track of the next starting place for looking for available blocks.
    marker: usize,
    bitmap: &'a Bitmap,
}

impl<'a> NextAvailableAllocation<'a> {
    pub fn new(bitmap: &'a Bitmap) -> Self {
        Self { marker: 0, bitmap }
    }
}

impl<'a> Iterator for NextAvailableAllocation<'a> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        for i in self.marker..self.bitmap.len() {
            if let State::Free = self.bitmap.get(i) {
                self.marker = i + 1;
                return Some(i);
            }
        }
        self.marker = self.bitmap.len();
        None
    }
}
