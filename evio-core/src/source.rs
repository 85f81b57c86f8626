//! Record source abstraction.
//!
//! A record source is an opened EVIO container that hands out one record at
//! a time into a caller-owned word buffer.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors reported by a record source.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Cannot open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Bad file handle: {0}")]
    InvalidHandle(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid block header in block {block}: {reason}")]
    InvalidBlock { block: u32, reason: String },

    #[error("Truncated block {block}: file ends inside the block")]
    TruncatedBlock { block: u32 },

    #[error("Unexpected end of file inside a record")]
    UnexpectedEof,
}

/// Outcome of a successful read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// A record was copied into the buffer.
    Record,
    /// The source is exhausted.
    EndOfStream,
}

/// An opened container yielding raw records.
pub trait RecordSource {
    /// Format version recorded in the container.
    fn format_version(&mut self) -> Result<u32, SourceError>;

    /// Reads the next record into `buffer`.
    ///
    /// A record longer than the buffer is truncated to the buffer's length,
    /// with its length word intact.
    fn read_next(&mut self, buffer: &mut [u32]) -> Result<ReadStatus, SourceError>;

    /// Releases the underlying handle. Calling it more than once is allowed.
    fn close(&mut self) -> Result<(), SourceError>;
}

impl<S: RecordSource + ?Sized> RecordSource for Box<S> {
    fn format_version(&mut self) -> Result<u32, SourceError> {
        (**self).format_version()
    }

    fn read_next(&mut self, buffer: &mut [u32]) -> Result<ReadStatus, SourceError> {
        (**self).read_next(buffer)
    }

    fn close(&mut self) -> Result<(), SourceError> {
        (**self).close()
    }
}
