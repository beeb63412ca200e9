//! Open-time error reporting for [`Pages::open`](crate::Pages::open).
//!
//! Opening a database is the one operation with a closed, matchable error set:
//! callers routinely branch on "not a database file" vs "unsupported format
//! revision" vs "the filesystem said no". Every other failure in the crate is
//! an [`eyre::Report`] carrying a human-readable message.

use thiserror::Error;

/// Why a database file could not be opened.
#[derive(Debug, Error)]
pub enum OpenError {
    /// The file could not be opened or read. Carries the platform error.
    #[error("filesystem error: {0}")]
    FileSystem(#[from] std::io::Error),

    /// The file exists but is not a well-formed database: bad signature,
    /// unexpected page size, or a size that disagrees with the header.
    #[error("file format not recognised")]
    BadFile,

    /// The signature matched but the format revision is not one this driver
    /// understands.
    #[error("unsupported database format version")]
    Version,
}
