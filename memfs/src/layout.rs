/// Size in bytes of every block in the arena.
pub const BLOCK_SIZE: usize = 64;
/// File names are truncated to this many bytes inside a mapping slot.
pub const FILENAME_SIZE: usize = 14;
/// Integers stored inside blocks are big endian and this wide.
pub const INT_SIZE: usize = 2;
/// One directory entry: a padded name followed by a descriptor index.
pub const MAPPING_SIZE: usize = FILENAME_SIZE + INT_SIZE;
/// Payload bytes of a data block, the trailing `INT_SIZE` bytes hold the next link.
pub const DATA_SIZE: usize = BLOCK_SIZE - INT_SIZE;
pub const MAPPINGS_PER_BLOCK: usize = BLOCK_SIZE / MAPPING_SIZE;

/// Largest value that fits in `INT_SIZE` bytes.
pub const MAX_INT: usize = (1 << (8 * INT_SIZE)) - 1;

/// Path resolution steps allowed before giving up on a symlink cycle.
pub const DEFAULT_HOP_LIMIT: usize = 50;
pub const DEFAULT_BLOCKS_COUNT: usize = 64;

/// Known locations.
pub const ROOT_DESCRIPTOR: usize = 0;
