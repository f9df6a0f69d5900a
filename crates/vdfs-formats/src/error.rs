//! Error types for archive assembly and catalog reading

use thiserror::Error;

/// Result type for VDFS operations
pub type VdfsResult<T> = Result<T, VdfsError>;

/// Errors raised while building or reading a VDFS archive
///
/// Every variant is fatal to the build that raised it; no stage retries or
/// produces best-effort output.
#[derive(Debug, Error)]
pub enum VdfsError {
    /// Malformed input handed to the core
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Path segment that cannot be stored as a catalog name
    #[error("Invalid entry name {name:?} in {path}: {reason}")]
    InvalidName {
        /// Logical path containing the segment
        path: String,
        /// Offending segment
        name: String,
        /// Why the segment was rejected
        reason: &'static str,
    },

    /// Normalized name does not fit the fixed catalog name field
    #[error("Entry name too long in {path}: {name:?} is {len} bytes, limit is {max}")]
    NameTooLong {
        /// Logical path containing the segment
        path: String,
        /// Normalized segment
        name: String,
        /// Normalized length in bytes
        len: usize,
        /// Catalog name width
        max: usize,
    },

    /// A path is used both as a file and as a directory
    #[error("Entry kind conflict at {path}: already present as a {existing}")]
    KindConflict {
        /// Conflicting logical path
        path: String,
        /// Kind of the entry already in the tree
        existing: &'static str,
    },

    /// The same file path was inserted twice
    #[error("Duplicate file entry: {0}")]
    DuplicateEntry(String),

    /// Catalog record count exceeds the header counter range
    #[error("Too many catalog entries: {count} exceeds limit of {max}")]
    TooManyEntries {
        /// Records the tree would produce
        count: usize,
        /// Maximum supported record count
        max: usize,
    },

    /// Archive offsets or sizes overflow the 32-bit fields
    #[error("Archive too large: {entry} would end at byte {end}, limit is {max}")]
    DataTooLarge {
        /// Logical path of the entry crossing the limit
        entry: String,
        /// End offset the entry would have
        end: u64,
        /// Largest addressable archive size
        max: u64,
    },

    /// Reading a content source failed
    #[error("Failed to read {path}: {source}")]
    SourceRead {
        /// Logical path of the entry being packed
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Existing archive violates the container layout
    #[error("Malformed archive: {0}")]
    MalformedArchive(String),

    /// Binary read/write error
    #[error("Binary format error: {0}")]
    BinRw(#[from] binrw::Error),

    /// I/O error on the output container
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl VdfsError {
    /// Check if this error comes from the shape of the input tree
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::InvalidName { .. }
                | Self::NameTooLong { .. }
                | Self::KindConflict { .. }
                | Self::DuplicateEntry(_)
        )
    }

    /// Check if this error was caused by the filesystem
    pub fn is_io_error(&self) -> bool {
        matches!(self, Self::SourceRead { .. } | Self::Io(_))
    }
}
