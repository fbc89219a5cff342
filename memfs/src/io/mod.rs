mod arena;
mod block;

pub use arena::BlockArena;
pub use block::{Block, BlockMode, BlockNumber, Mapping};
