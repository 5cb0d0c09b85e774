use thiserror::Error;

use super::types::PageId;

/// Storage engine error types
#[derive(Error, Debug)]
pub enum StrataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid page ID: {0}")]
    InvalidPageId(PageId),

    #[error("No space left in the page: left {free_space}, tuple size {tuple_size}")]
    NoSpaceLeft { free_space: u16, tuple_size: usize },

    #[error("Tuple has no bytes to store")]
    EmptyTuple,

    #[error("Value of {len} bytes exceeds the maximum of {max}")]
    ValueTooLong { len: usize, max: usize },

    #[error("Malformed tuple: {0}")]
    TupleDecode(String),

    #[error("Disk manager has been shut down")]
    DiskManagerShutdown,

    #[error("Disk scheduler has been shut down")]
    SchedulerShutdown,

    #[error("Channel error: {0}")]
    Channel(String),
}

impl StrataError {
    /// Returns true for the page-full condition, as opposed to I/O or decoding failures.
    pub fn is_no_space_left(&self) -> bool {
        matches!(self, StrataError::NoSpaceLeft { .. })
    }
}

pub type Result<T> = std::result::Result<T, StrataError>;
