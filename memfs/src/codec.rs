//! Fixed-width encodings used inside blocks: big endian integers of `INT_SIZE` bytes
//! and space padded UTF-8 names of `FILENAME_SIZE` bytes.

use std::convert::TryInto;

use crate::error::{MemFSError, Result};
use crate::layout::{FILENAME_SIZE, INT_SIZE, MAX_INT};

pub fn encode_int(value: usize) -> Result<[u8; INT_SIZE]> {
    if value > MAX_INT {
        return Err(MemFSError::OutOfRange(format!(
            "{} does not fit in {} bytes",
            value, INT_SIZE
        )));
    }
    Ok((value as u16).to_be_bytes())
}

pub fn decode_int(bytes: &[u8]) -> Result<usize> {
    let raw: [u8; INT_SIZE] = bytes.try_into().map_err(|_| {
        MemFSError::InvalidArgument(format!(
            "expected {} bytes for an integer, got {}",
            INT_SIZE,
            bytes.len()
        ))
    })?;
    Ok(u16::from_be_bytes(raw) as usize)
}

/// Strips the padding written around names and symlink targets.
pub fn trim(text: &str) -> &str {
    text.trim_matches(|c: char| c.is_control() || c.is_whitespace())
}

/// Returns the form a name takes once stored in a mapping slot. Lookups compare
/// canonical names, so "a-very-long-file-name" finds the entry stored as its first
/// `FILENAME_SIZE` bytes.
pub fn canonical_name(name: &str) -> Result<String> {
    let trimmed = trim(name);
    let mut end = trimmed.len().min(FILENAME_SIZE);
    // Never cut a multi-byte character in half.
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    let canonical = trim(&trimmed[..end]);

    if canonical.is_empty() || canonical == "." || canonical == ".." || canonical.contains('/') {
        return Err(MemFSError::InvalidArgument(format!(
            "\"{}\" is not a valid file name",
            name
        )));
    }
    Ok(canonical.to_string())
}

pub fn encode_name(name: &str) -> Result<[u8; FILENAME_SIZE]> {
    let canonical = canonical_name(name)?;
    let mut encoded = [b' '; FILENAME_SIZE];
    encoded[..canonical.len()].copy_from_slice(canonical.as_bytes());
    Ok(encoded)
}

pub fn decode_name(bytes: &[u8]) -> Result<String> {
    decode_text(bytes)
}

pub fn decode_text(bytes: &[u8]) -> Result<String> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| MemFSError::InvalidArgument(format!("block holds invalid UTF-8: {}", e)))?;
    Ok(trim(text).to_string())
}

pub fn is_clear(bytes: &[u8]) -> bool {
    bytes.iter().all(|&b| b == 0)
}
