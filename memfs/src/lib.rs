//! A small Unix-like file system kept entirely in memory.
//!
//! Everything lives in a fixed arena of 64 byte blocks. Files are chains of data
//! blocks, directories are a single block of name to descriptor mappings and symbolic
//! links hold their target path in one block. `MemFS` is the entry point.

#[macro_use]
extern crate log;

pub mod alloc;
pub mod codec;
mod error;
mod fs;
pub mod io;
pub mod layout;
mod node;
pub mod path;
mod sb;

pub use crate::error::{MemFSError, Result};
pub use crate::fs::{FileHandle, LsEntry, MemFS};
pub use crate::node::{Descriptor, DescriptorMode, DescriptorTable};
pub use crate::sb::{FsStats, SuperBlock};
