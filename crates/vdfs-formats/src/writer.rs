//! Container writer
//!
//! Layout on disk is header, catalog, data. The catalog can only be written
//! once every file offset is known, so the writer seeks past the header and
//! catalog, streams the data region, then seeks back and writes both.
//!
//! [`ContainerWriter::write_to_path`] writes into a temporary file next to
//! the destination and renames it into place only after everything has been
//! flushed and synced. A failed build never leaves a partial archive at the
//! destination.

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use binrw::BinWriterExt;
use parking_lot::Mutex;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::catalog::Catalog;
use crate::error::{VdfsError, VdfsResult};
use crate::header::{HEADER_SIZE, VdfsHeader};
use crate::pack::{DataPacker, PackedCatalog};

/// Prefix of temporary output files
pub const TEMP_PREFIX: &str = ".vdfs-";

/// Suffix of temporary output files
pub const TEMP_SUFFIX: &str = ".tmp";

/// Temporary files that must be removed if the process is interrupted
///
/// Clones share the same list. An interrupt handler calls
/// [`CleanupRegistry::remove_all`] before exiting; normal completion and
/// error paths unregister their own files.
#[derive(Debug, Clone, Default)]
pub struct CleanupRegistry {
    paths: Arc<Mutex<Vec<PathBuf>>>,
}

impl CleanupRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a temporary file
    pub fn register(&self, path: &Path) {
        self.paths.lock().push(path.to_path_buf());
    }

    /// Stop tracking a file that was renamed or already removed
    pub fn unregister(&self, path: &Path) {
        self.paths.lock().retain(|p| p != path);
    }

    /// Files currently tracked
    pub fn pending(&self) -> Vec<PathBuf> {
        self.paths.lock().clone()
    }

    /// Delete every tracked file, returning how many were removed
    pub fn remove_all(&self) -> usize {
        let paths = std::mem::take(&mut *self.paths.lock());
        let mut removed = 0;
        for path in paths {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove temporary file {}: {}", path.display(), e),
            }
        }
        removed
    }
}

/// Totals of a written container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerSummary {
    /// Catalog records
    pub entry_count: u32,
    /// File records
    pub file_count: u32,
    /// Data region size
    pub data_size: u32,
    /// Total container size in bytes
    pub total_size: u64,
}

/// Writes a flattened catalog and its data as one container
#[derive(Debug, Clone)]
pub struct ContainerWriter {
    header: VdfsHeader,
    packer: DataPacker,
}

impl ContainerWriter {
    /// Create a writer
    ///
    /// Only the comment, signature and timestamp of `header` are kept; counts
    /// and sizes are filled in from the catalog.
    pub fn new(header: VdfsHeader, packer: DataPacker) -> Self {
        Self { header, packer }
    }

    /// Write the container to a seekable sink starting at its current start
    pub fn write_to<W: Write + Seek>(
        &self,
        catalog: Catalog,
        sink: &mut W,
    ) -> VdfsResult<ContainerSummary> {
        let entry_count = u32::try_from(catalog.len()).map_err(|_| VdfsError::TooManyEntries {
            count: catalog.len(),
            max: u32::MAX as usize,
        })?;
        let data_start = HEADER_SIZE as u64 + catalog.byte_size();

        sink.seek(SeekFrom::Start(data_start))?;
        let packed = self.packer.pack(catalog, data_start, sink)?;

        let mut header = self.header.clone();
        header.update_totals(entry_count, packed.file_count as u32, packed.data_size);

        sink.seek(SeekFrom::Start(0))?;
        write_front_matter(&header, &packed, sink)?;
        sink.flush()?;

        let summary = ContainerSummary {
            entry_count,
            file_count: header.file_count,
            data_size: header.data_size,
            total_size: data_start + u64::from(header.data_size),
        };
        debug!(
            "Wrote container: {} entries, {} files, {} bytes",
            summary.entry_count, summary.file_count, summary.total_size
        );

        Ok(summary)
    }

    /// Write the container to `destination` atomically
    ///
    /// The temporary file lives in the destination directory so the final
    /// rename never crosses filesystems. When `registry` is given the
    /// temporary path is tracked for the lifetime of the write.
    pub fn write_to_path(
        &self,
        catalog: Catalog,
        destination: &Path,
        registry: Option<&CleanupRegistry>,
    ) -> VdfsResult<ContainerSummary> {
        let dir = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let temp = create_temp(dir, registry)?;
        let temp_path = temp.path().to_path_buf();
        debug!("Writing to temporary file {}", temp_path.display());

        let result = self.write_temp(catalog, temp, destination);

        if let Some(registry) = registry {
            registry.unregister(&temp_path);
        }

        result
    }

    fn write_temp(
        &self,
        catalog: Catalog,
        temp: NamedTempFile,
        destination: &Path,
    ) -> VdfsResult<ContainerSummary> {
        let mut sink = BufWriter::new(temp);
        let summary = self.write_to(catalog, &mut sink)?;

        let temp = sink.into_inner().map_err(|e| VdfsError::Io(e.into_error()))?;
        temp.as_file().sync_all()?;
        // A failed persist drops, and so deletes, the temporary file
        temp.persist(destination).map_err(|e| VdfsError::Io(e.error))?;

        Ok(summary)
    }
}

/// Create a temporary output file in `dir`
///
/// The path is registered before the file exists, so an interrupt at any
/// point after creation finds it in the registry.
fn create_temp(dir: &Path, registry: Option<&CleanupRegistry>) -> VdfsResult<NamedTempFile> {
    let temp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(TEMP_SUFFIX)
        .make_in(dir, |path| {
            if let Some(registry) = registry {
                registry.register(path);
            }
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create_new(true)
                .open(path);
            if let (Err(_), Some(registry)) = (&file, registry) {
                registry.unregister(path);
            }
            file
        })?;
    Ok(temp)
}

fn write_front_matter<W: Write + Seek>(
    header: &VdfsHeader,
    packed: &PackedCatalog,
    sink: &mut W,
) -> VdfsResult<()> {
    sink.write_le(header)?;
    for record in &packed.records {
        sink.write_le(record)?;
    }
    Ok(())
}
