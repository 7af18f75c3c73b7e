//! Defines error types.
use thiserror::Error;

/// Crate result type (re-exported).
pub type Result<T> = std::result::Result<T, Error>;

/// Error types. All of them arise at construction; a failed read is an
/// ordinary outcome, not an error.
#[derive(Error, Debug)]
pub enum Error {
    /// Requested capacity was zero.
    #[error("ring buffer capacity must be non-zero")]
    ZeroCapacity,
    /// Requested capacity cannot be represented once rounded up to a power of two.
    #[error("ring buffer capacity too large, requested: {0}")]
    CapacityOverflow(usize),
    /// The aligned storage for the slot array could not be obtained.
    #[error("failed to map {size} bytes for the slot array: {source}")]
    Allocation {
        size: usize,
        #[source]
        source: std::io::Error,
    },
    /// A second writer was requested while one is still attached.
    #[error("ring buffer already has an attached writer")]
    WriterAlreadyAttached,
}

#[cold]
#[inline(never)]
pub(crate) const fn zero_capacity() -> Error {
    Error::ZeroCapacity
}

#[cold]
#[inline(never)]
pub(crate) const fn capacity_overflow(requested: usize) -> Error {
    Error::CapacityOverflow(requested)
}

#[cold]
#[inline(never)]
pub(crate) fn allocation(size: usize, source: std::io::Error) -> Error {
    Error::Allocation { size, source }
}

#[cold]
#[inline(never)]
pub(crate) const fn writer_already_attached() -> Error {
    Error::WriterAlreadyAttached
}
