use thiserror::Error;

pub type Result<T> = std::result::Result<T, MemFSError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemFSError {
    /// No free block, no free descriptor, no free directory slot or no free handle.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(&'static str),
    #[error("not found: {0}")]
    NotFound(String),
    /// The operation was applied to the wrong kind of descriptor or block.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("out of range: {0}")]
    OutOfRange(String),
    #[error("directory not empty: {0}")]
    NotEmpty(String),
    #[error("path resolution exceeded {0} hops")]
    CycleOrTooDeep(usize),
    #[error("symlink target of {0} bytes does not fit in one block")]
    TooLarge(usize),
    #[error("entry already exists: {0}")]
    AlreadyExists(String),
    #[error("directory is in use: {0}")]
    Busy(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("file system has not been formatted, run mkfs first")]
    NotFormatted,
}
