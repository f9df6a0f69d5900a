//! Gothic VDFS archive assembly
//!
//! VDFS volumes (`.vdf`) are the container format of the ZenGin engine. A
//! volume is a 296-byte header, a flat catalog of 80-byte records and a data
//! region holding file contents back to back:
//!
//! ```text
//! +----------------+-------------------------+---------------------+
//! | header (296 B) | catalog (80 B x N)      | data region         |
//! +----------------+-------------------------+---------------------+
//! 0                296                       296 + 80 * N
//! ```
//!
//! The catalog stores the directory tree breadth-first: sibling runs are
//! contiguous, a directory record points at its first child by index and
//! carries its child count, and the last record of every run is flagged.
//!
//! Building an archive runs through four stages:
//!
//! 1. [`TreeBuilder`] collects logical entries into a sorted tree,
//!    normalizing names and rejecting conflicts.
//! 2. [`CatalogFlattener`] turns the tree into catalog order in one pass.
//! 3. [`DataPacker`] streams file contents into the data region in
//!    depth-first order, resolving every file's offset and size.
//! 4. [`ContainerWriter`] writes header and catalog in front of the data and
//!    publishes the result atomically.
//!
//! [`VdfsBuilder`] drives all four. [`ArchiveIndex`] reads the front matter of
//! an existing archive back.
//!
//! # Features
//!
//! - `parallel`: read sources on a bounded pool of blocking tasks
//!   ([`PackOptions::with_jobs`]). Output is byte-identical to a sequential
//!   build.

#![warn(missing_docs)]

pub mod builder;
pub mod catalog;
pub mod error;
pub mod flatten;
pub mod header;
pub mod index;
pub mod pack;
pub mod timestamp;
pub mod tree;
pub mod writer;

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
pub(crate) mod test_utils;

pub use builder::{BuildConfig, BuildSummary, VdfsBuilder};
pub use catalog::{
    CATALOG_ENTRY_SIZE, Catalog, CatalogRecord, ENTRY_FLAG_DIRECTORY, ENTRY_FLAG_LAST, EntryKind,
    NAME_SIZE, normalize_name,
};
pub use error::{VdfsError, VdfsResult};
pub use flatten::{CatalogFlattener, MAX_CATALOG_ENTRIES, flatten};
pub use header::{HEADER_SIZE, Signature, VdfsHeader};
pub use index::{ArchiveIndex, IndexEntry};
pub use pack::{DataPacker, MAX_ARCHIVE_SIZE, PackOptions, PackedCatalog};
pub use timestamp::DosTimestamp;
pub use tree::{ContentSource, LogicalEntry, TreeBuilder, TreeNode};
pub use writer::{CleanupRegistry, ContainerSummary, ContainerWriter, TEMP_PREFIX, TEMP_SUFFIX};
