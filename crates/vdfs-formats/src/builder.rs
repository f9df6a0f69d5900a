//! Archive builder
//!
//! Ties the pipeline together: logical entries go into a [`TreeBuilder`],
//! the finished tree is flattened into a catalog, and the container writer
//! packs the data and writes header and catalog.
//!
//! ```no_run
//! use vdfs_formats::{BuildConfig, VdfsBuilder};
//!
//! # fn main() -> vdfs_formats::VdfsResult<()> {
//! let mut builder = VdfsBuilder::new(BuildConfig::new("Textures"));
//! builder.add_file("_work/data/textures/_compiled/stone-c.tex", b"...".to_vec())?;
//! builder.add_directory("_work/data/meshes")?;
//! let summary = builder.write_to_path("TEXTURES.VDF")?;
//! println!("{} files", summary.file_count);
//! # Ok(())
//! # }
//! ```

use std::io::{Seek, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::info;

use crate::catalog::Catalog;
use crate::error::VdfsResult;
use crate::flatten::{CatalogFlattener, MAX_CATALOG_ENTRIES};
use crate::header::{Signature, VdfsHeader};
use crate::pack::{DataPacker, PackOptions};
use crate::timestamp::DosTimestamp;
use crate::tree::{ContentSource, LogicalEntry, TreeBuilder};
use crate::writer::{CleanupRegistry, ContainerSummary, ContainerWriter};

/// Archive-wide settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    /// Header comment, truncated to 256 bytes
    pub comment: String,
    /// Build time stored in the header
    pub timestamp: DateTime<Utc>,
    /// Volume signature
    pub signature: Signature,
}

impl BuildConfig {
    /// Configuration stamped with the current time
    pub fn new(comment: impl Into<String>) -> Self {
        Self {
            comment: comment.into(),
            timestamp: Utc::now(),
            signature: Signature::default(),
        }
    }

    /// Use a fixed build time (reproducible output)
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Use a specific volume signature
    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signature = signature;
        self
    }

    /// Header for this configuration with empty totals
    pub fn header(&self) -> VdfsHeader {
        VdfsHeader::new(
            &self.comment,
            self.signature,
            DosTimestamp::from_datetime(&self.timestamp),
        )
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self::new(String::new())
    }
}

/// Outcome of a successful build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSummary {
    /// Catalog records
    pub entry_count: u32,
    /// File records
    pub file_count: u32,
    /// Data region size in bytes
    pub data_size: u32,
    /// Total archive size in bytes
    pub total_size: u64,
    /// Destination, when written to a path
    pub path: Option<PathBuf>,
}

impl BuildSummary {
    fn new(container: ContainerSummary, path: Option<PathBuf>) -> Self {
        Self {
            entry_count: container.entry_count,
            file_count: container.file_count,
            data_size: container.data_size,
            total_size: container.total_size,
            path,
        }
    }
}

/// Builds one VDFS archive
#[derive(Debug)]
pub struct VdfsBuilder {
    config: BuildConfig,
    tree: TreeBuilder,
    pack_options: PackOptions,
    max_entries: usize,
    cleanup: Option<CleanupRegistry>,
}

impl VdfsBuilder {
    /// Create an empty builder
    pub fn new(config: BuildConfig) -> Self {
        Self {
            config,
            tree: TreeBuilder::new(),
            pack_options: PackOptions::default(),
            max_entries: MAX_CATALOG_ENTRIES,
            cleanup: None,
        }
    }

    /// Set data packing options
    pub fn with_pack_options(mut self, options: PackOptions) -> Self {
        self.pack_options = options;
        self
    }

    /// Lower the catalog entry limit
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Track temporary output files in `registry`
    pub fn with_cleanup_registry(mut self, registry: CleanupRegistry) -> Self {
        self.cleanup = Some(registry);
        self
    }

    /// Archive settings
    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Files added so far
    pub fn file_count(&self) -> usize {
        self.tree.file_count()
    }

    /// Add one logical entry
    pub fn add_entry(&mut self, entry: LogicalEntry) -> VdfsResult<()> {
        self.tree.insert(entry)
    }

    /// Add a file at a `/` or `\` separated path
    pub fn add_file(&mut self, path: &str, source: impl Into<ContentSource>) -> VdfsResult<()> {
        self.add_entry(LogicalEntry::file(path, source))
    }

    /// Add a directory, kept even when empty
    pub fn add_directory(&mut self, path: &str) -> VdfsResult<()> {
        self.add_entry(LogicalEntry::directory(path))
    }

    /// Add every entry, stopping at the first conflict
    pub fn extend(&mut self, entries: impl IntoIterator<Item = LogicalEntry>) -> VdfsResult<()> {
        self.tree.extend(entries)
    }

    fn into_writer(self) -> VdfsResult<(ContainerWriter, Catalog, Option<CleanupRegistry>)> {
        let catalog =
            CatalogFlattener::with_max_entries(self.max_entries).flatten(self.tree.finish())?;
        let writer =
            ContainerWriter::new(self.config.header(), DataPacker::new(self.pack_options));
        Ok((writer, catalog, self.cleanup))
    }

    /// Write the archive to a seekable sink
    pub fn write_to<W: Write + Seek>(self, sink: &mut W) -> VdfsResult<BuildSummary> {
        let (writer, catalog, _) = self.into_writer()?;
        let summary = BuildSummary::new(writer.write_to(catalog, sink)?, None);
        info!(
            "Built archive: {} entries, {} files, {} bytes",
            summary.entry_count, summary.file_count, summary.total_size
        );
        Ok(summary)
    }

    /// Write the archive to `path`, replacing it atomically
    pub fn write_to_path(self, path: impl AsRef<Path>) -> VdfsResult<BuildSummary> {
        let path = path.as_ref();
        let (writer, catalog, cleanup) = self.into_writer()?;
        let container = writer.write_to_path(catalog, path, cleanup.as_ref())?;
        let summary = BuildSummary::new(container, Some(path.to_path_buf()));
        info!(
            "Wrote {}: {} entries, {} files, {} bytes",
            path.display(),
            summary.entry_count,
            summary.file_count,
            summary.total_size
        );
        Ok(summary)
    }
}
