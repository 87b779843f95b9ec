use thiserror::Error;

/// Result type local to pixmem-alloc.
pub type Result<T> = std::result::Result<T, Error>;

/// Bytes per megabyte in OOM messages.
const MB: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum Error {
    /// `size` is the total reservation, header included.
    #[error("out of memory --- size == {}MB", .size / MB)]
    OutOfMemory { size: usize },

    #[error("invalid allocation size: {size} bytes")]
    InvalidSize { size: usize },

    #[error("teardown callback failed: {0}")]
    Teardown(String),
}
