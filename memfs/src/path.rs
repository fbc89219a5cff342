//! Path resolution over the descriptor table.
//!
//! Paths may be absolute or relative to a starting directory and may contain `.`, `..`
//! and symbolic links. A symlink met along the way is substituted by its target text
//! and resolution continues from the directory holding the link. Every step costs one
//! hop; running past the hop limit is the only guard against symlink cycles.

use crate::codec;
use crate::error::{MemFSError, Result};
use crate::io::BlockArena;
use crate::layout::ROOT_DESCRIPTOR;
use crate::node::{DescriptorMode, DescriptorTable};

/// The directory a path walk ended in.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub descriptor: usize,
    /// Components from the root to `descriptor`, used to render the working directory.
    pub route: Vec<String>,
    pub(crate) hops: usize,
}

/// A directory entry located by path.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// Directory whose mappings block holds the entry.
    pub parent: usize,
    /// `None` when the path ends in `/`, `.` or `..` and so names a directory itself.
    pub name: Option<String>,
    pub descriptor: usize,
}

pub struct PathResolver<'a> {
    descriptors: &'a DescriptorTable,
    blocks: &'a BlockArena,
    hop_limit: usize,
}

impl<'a> PathResolver<'a> {
    pub fn new(descriptors: &'a DescriptorTable, blocks: &'a BlockArena, hop_limit: usize) -> Self {
        Self {
            descriptors,
            blocks,
            hop_limit,
        }
    }

    /// Walks `path` from the directory `start`, extending `route` as directories are
    /// entered. Every component must be a directory or a symlink leading to one.
    pub fn resolve(&self, path: &str, start: usize, route: Vec<String>) -> Result<Resolved> {
        self.walk(path, start, route, 0)
    }

    /// Resolves everything but the last component and returns that directory along with
    /// the canonical form of the last component. Used when creating entries.
    pub fn parent_of(&self, path: &str, start: usize) -> Result<(usize, String)> {
        let (parent_path, name) = split_last(path).ok_or_else(|| {
            MemFSError::InvalidArgument(format!("\"{}\" does not end in a file name", path))
        })?;
        let parent = self.resolve(parent_path, start, Vec::new())?;
        Ok((parent.descriptor, codec::canonical_name(name)?))
    }

    /// Locates the entry `path` names. With `follow` set, a symlink in the last position
    /// is replaced by whatever its target names, however many links deep.
    pub fn entry(&self, path: &str, start: usize, follow: bool) -> Result<Entry> {
        let mut path = path.to_string();
        let mut start = start;
        let mut hops = 0;

        loop {
            let split = split_last(&path).map(|(dir, name)| (dir.to_string(), name.to_string()));
            let (parent_path, name) = match split {
                Some(split) => split,
                None => {
                    let resolved = self.walk(&path, start, Vec::new(), hops)?;
                    let parent = self.descriptors.get(resolved.descriptor)?.parent_directory();
                    return Ok(Entry {
                        parent,
                        name: None,
                        descriptor: resolved.descriptor,
                    });
                }
            };

            let parent = self.walk(&parent_path, start, Vec::new(), hops)?;
            hops = parent.hops;
            let descriptor = self.lookup(parent.descriptor, &name)?;

            if follow && self.descriptors.get(descriptor)?.mode() == DescriptorMode::Symlink {
                hops = self.hop(hops)?;
                path = self.symlink_target(descriptor)?;
                start = parent.descriptor;
                debug!("following symlink {} to {}", name, path);
                continue;
            }

            return Ok(Entry {
                parent: parent.descriptor,
                name: Some(codec::canonical_name(&name)?),
                descriptor,
            });
        }
    }

    fn walk(&self, path: &str, start: usize, route: Vec<String>, hops: usize) -> Result<Resolved> {
        let mut remaining = path.to_string();
        let mut current = start;
        let mut route = route;
        let mut hops = hops;

        loop {
            if remaining.is_empty() {
                return Ok(Resolved {
                    descriptor: current,
                    route,
                    hops,
                });
            }
            hops = self.hop(hops)?;

            if remaining.starts_with('/') {
                route.clear();
                current = ROOT_DESCRIPTOR;
                remaining = remaining.trim_start_matches('/').to_string();
                continue;
            }

            let (component, rest) = split_first(&remaining);
            let (component, rest) = (component.to_string(), rest.to_string());
            match component.as_str() {
                ".." => {
                    route.pop();
                    current = self.descriptors.get(current)?.parent_directory();
                }
                "." => {}
                name => {
                    let index = self.lookup(current, name)?;
                    match self.descriptors.get(index)?.mode() {
                        DescriptorMode::Directory => {
                            route.push(codec::canonical_name(name)?);
                            current = index;
                        }
                        DescriptorMode::Symlink => {
                            let target = self.symlink_target(index)?;
                            debug!("substituting symlink {} with {}", name, target);
                            remaining = if rest.is_empty() {
                                target
                            } else {
                                format!("{}/{}", target, rest)
                            };
                            continue;
                        }
                        _ => {
                            return Err(MemFSError::TypeMismatch(format!(
                                "{} is not a directory",
                                name
                            )))
                        }
                    }
                }
            }
            remaining = rest;
        }
    }

    fn hop(&self, hops: usize) -> Result<usize> {
        let hops = hops + 1;
        if hops > self.hop_limit {
            return Err(MemFSError::CycleOrTooDeep(self.hop_limit));
        }
        Ok(hops)
    }

    /// Finds `name` in the mappings block of directory `dir`.
    pub fn lookup(&self, dir: usize, name: &str) -> Result<usize> {
        let descriptor = self.descriptors.get(dir)?;
        if descriptor.mode() != DescriptorMode::Directory {
            return Err(MemFSError::TypeMismatch(format!(
                "descriptor {} is not a directory",
                dir
            )));
        }
        self.blocks
            .block(descriptor.first_block()?)?
            .descriptor_index(name)
    }

    fn symlink_target(&self, index: usize) -> Result<String> {
        let block = self.descriptors.get(index)?.first_block()?;
        self.blocks.block(block)?.symlink_target()
    }
}

/// Splits off the first component. Repeated separators after it are dropped.
fn split_first(path: &str) -> (&str, &str) {
    match path.find('/') {
        Some(i) => (&path[..i], path[i + 1..].trim_start_matches('/')),
        None => (path, ""),
    }
}

/// Splits a path into its directory part and final name. Returns `None` when there is
/// no final name, as for `/`, `.` or `d/..`.
pub fn split_last(path: &str) -> Option<(&str, &str)> {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    let (parent, name) = match trimmed.rfind('/') {
        Some(0) => ("/", &trimmed[1..]),
        Some(i) => (&trimmed[..i], &trimmed[i + 1..]),
        None => ("", trimmed),
    };
    if name == "." || name == ".." {
        return None;
    }
    Some((parent, name))
}
