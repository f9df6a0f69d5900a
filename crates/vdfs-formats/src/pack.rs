//! Data region packing
//!
//! File contents are appended to the data region in depth-first catalog
//! order. Each file record receives its absolute byte offset and length as
//! it is written; nothing is transformed on the way.

use std::io::{self, Read, Write};

use tracing::{debug, trace};

use crate::catalog::{Catalog, CatalogRecord, depth_first_walk};
use crate::error::{VdfsError, VdfsResult};
use crate::tree::ContentSource;

/// Read buffer size for streaming sources
pub const COPY_CHUNK_SIZE: usize = 64 * 1024;

/// Largest archive the 32-bit offset and size fields can address
pub const MAX_ARCHIVE_SIZE: u64 = u32::MAX as u64;

/// Chunks queued per reader on the concurrent path
#[cfg(feature = "parallel")]
const CHUNKS_PER_READER: usize = 4;

/// Packing options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackOptions {
    /// Concurrent source reads; 1 streams sources one at a time
    pub jobs: usize,
    /// Upper bound for the end of the data region
    pub max_archive_size: u64,
}

impl PackOptions {
    /// Set the number of concurrent reads (at least 1)
    ///
    /// Values above 1 only take effect with the `parallel` feature.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Lower the addressable archive size
    pub fn with_max_archive_size(mut self, max: u64) -> Self {
        self.max_archive_size = max.min(MAX_ARCHIVE_SIZE);
        self
    }
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            jobs: 1,
            max_archive_size: MAX_ARCHIVE_SIZE,
        }
    }
}

/// Catalog with every file offset and size resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedCatalog {
    /// Final records in index order
    pub records: Vec<CatalogRecord>,
    /// Records in the root sibling run
    pub root_count: usize,
    /// Number of file records
    pub file_count: usize,
    /// Bytes written to the data region
    pub data_size: u32,
}

/// File waiting to be packed: record index, catalog path, content
type PendingFile = (usize, String, ContentSource);

/// Write position inside the archive
#[derive(Debug)]
struct DataCursor {
    start: u64,
    position: u64,
    max: u64,
}

impl DataCursor {
    fn new(start: u64, max: u64) -> Self {
        Self {
            start,
            position: start,
            max,
        }
    }

    fn ensure_fits(&self, path: &str, len: u64) -> VdfsResult<()> {
        self.ensure_end(path, self.position.saturating_add(len))
    }

    fn ensure_end(&self, path: &str, end: u64) -> VdfsResult<()> {
        if end > self.max {
            return Err(VdfsError::DataTooLarge {
                entry: path.to_string(),
                end,
                max: self.max,
            });
        }
        Ok(())
    }

    fn commit(&mut self, record: &mut CatalogRecord, len: u64) {
        record.offset = self.position as u32;
        record.size = len as u32;
        self.position += len;
    }

    fn data_size(&self) -> u64 {
        self.position - self.start
    }
}

fn read_error(path: &str, source: io::Error) -> VdfsError {
    VdfsError::SourceRead {
        path: path.to_string(),
        source,
    }
}

/// Fill `buffer` from `reader`, retrying interrupted reads
fn read_chunk(reader: &mut dyn Read, buffer: &mut [u8]) -> io::Result<usize> {
    loop {
        match reader.read(buffer) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            result => return result,
        }
    }
}

/// Check the current source lengths against the size limit
///
/// Runs before any byte is copied, so an oversized source fails without
/// being read. Sources that grow afterwards are caught while copying.
fn check_sizes(files: &[PendingFile], cursor: &DataCursor) -> VdfsResult<()> {
    let mut end = cursor.position;
    for (_, path, source) in files {
        let len = source.byte_len().map_err(|e| read_error(path, e))?;
        end = end.saturating_add(len);
        cursor.ensure_end(path, end)?;
    }
    Ok(())
}

/// Read one source in [`COPY_CHUNK_SIZE`] pieces into `chunks`
///
/// Stops after the first error, or as soon as the receiver is gone.
#[cfg(feature = "parallel")]
fn stream_chunks(
    source: &ContentSource,
    chunks: &tokio::sync::mpsc::Sender<io::Result<bytes::Bytes>>,
) {
    let mut reader = match source.open() {
        Ok(reader) => reader,
        Err(e) => {
            let _ = chunks.blocking_send(Err(e));
            return;
        }
    };

    let mut buffer = vec![0u8; COPY_CHUNK_SIZE];
    loop {
        let chunk = match read_chunk(&mut reader, &mut buffer) {
            Ok(0) => return,
            Ok(n) => Ok(bytes::Bytes::copy_from_slice(&buffer[..n])),
            Err(e) => Err(e),
        };
        let failed = chunk.is_err();
        if chunks.blocking_send(chunk).is_err() || failed {
            return;
        }
    }
}

/// Copies file contents into the data region
#[derive(Debug, Clone, Copy, Default)]
pub struct DataPacker {
    options: PackOptions,
}

impl DataPacker {
    /// Create a packer
    pub fn new(options: PackOptions) -> Self {
        Self { options }
    }

    /// Packing options in use
    pub fn options(&self) -> &PackOptions {
        &self.options
    }

    /// Write every file of `catalog` to `sink`
    ///
    /// `sink` must be positioned at `data_start`, the absolute offset of the
    /// data region (header size plus catalog size). Any read failure aborts
    /// the whole pack.
    pub fn pack<W: Write>(
        &self,
        catalog: Catalog,
        data_start: u64,
        sink: &mut W,
    ) -> VdfsResult<PackedCatalog> {
        let walk = depth_first_walk(&catalog.records, catalog.root_count);
        let root_count = catalog.root_count;
        let (mut records, mut sources) = catalog.into_parts();

        let files: Vec<PendingFile> = walk
            .into_iter()
            .filter_map(|(index, path)| sources[index].take().map(|source| (index, path, source)))
            .collect();
        let file_count = files.len();

        let mut cursor = DataCursor::new(data_start, self.options.max_archive_size);
        cursor.ensure_fits("<catalog>", 0)?;
        check_sizes(&files, &cursor)?;

        if self.options.jobs > 1 && file_count > 1 {
            self.pack_concurrent(files, &mut records, &mut cursor, sink)?;
        } else {
            Self::pack_sequential(files, &mut records, &mut cursor, sink)?;
        }

        let data_size = cursor.data_size();
        debug!(
            "Packed {} files, {} bytes of data starting at {}",
            file_count, data_size, data_start
        );

        Ok(PackedCatalog {
            records,
            root_count,
            file_count,
            data_size: data_size as u32,
        })
    }

    fn pack_sequential<W: Write>(
        files: Vec<PendingFile>,
        records: &mut [CatalogRecord],
        cursor: &mut DataCursor,
        sink: &mut W,
    ) -> VdfsResult<()> {
        let mut buffer = vec![0u8; COPY_CHUNK_SIZE];

        for (index, path, source) in files {
            let mut reader = source.open().map_err(|e| read_error(&path, e))?;
            let mut copied = 0u64;

            loop {
                let read =
                    read_chunk(&mut reader, &mut buffer).map_err(|e| read_error(&path, e))?;
                if read == 0 {
                    break;
                }
                cursor.ensure_fits(&path, copied + read as u64)?;
                sink.write_all(&buffer[..read])?;
                copied += read as u64;
            }

            trace!("Packed {} ({} bytes at {})", path, copied, cursor.position);
            cursor.commit(&mut records[index], copied);
        }

        Ok(())
    }

    /// Read sources on a bounded worker pool, writing them in catalog order
    ///
    /// Each reader streams its file through a channel of
    /// [`CHUNKS_PER_READER`] chunks. At most `jobs` readers run at once,
    /// counting the one being written, so memory stays bounded by
    /// `jobs * CHUNKS_PER_READER * COPY_CHUNK_SIZE` whatever the file sizes.
    #[cfg(feature = "parallel")]
    fn pack_concurrent<W: Write>(
        &self,
        files: Vec<PendingFile>,
        records: &mut [CatalogRecord],
        cursor: &mut DataCursor,
        sink: &mut W,
    ) -> VdfsResult<()> {
        use futures::future;
        use futures::stream::{self, StreamExt};
        use tokio::sync::mpsc;

        let jobs = self.options.jobs;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(jobs)
            .thread_name("vdfs-reader")
            .build()?;

        let result = runtime.block_on(async {
            // Readers start when the ordered buffer pulls their file
            let mut readers = stream::iter(files)
                .map(|(index, path, source)| {
                    let (tx, rx) = mpsc::channel(CHUNKS_PER_READER);
                    let reader = tokio::task::spawn_blocking(move || stream_chunks(&source, &tx));
                    future::ready((index, path, rx, reader))
                })
                .buffered(jobs);

            while let Some((index, path, mut chunks, reader)) = readers.next().await {
                let mut copied = 0u64;
                while let Some(chunk) = chunks.recv().await {
                    let chunk = chunk.map_err(|e| read_error(&path, e))?;
                    cursor.ensure_fits(&path, copied + chunk.len() as u64)?;
                    sink.write_all(&chunk)?;
                    copied += chunk.len() as u64;
                }
                // A reader that died mid-file must not pass for end of file
                reader
                    .await
                    .map_err(|e| read_error(&path, io::Error::other(e)))?;

                trace!("Packed {} ({} bytes at {})", path, copied, cursor.position);
                cursor.commit(&mut records[index], copied);
            }

            Ok::<_, VdfsError>(())
        });

        runtime.shutdown_background();
        result
    }

    #[cfg(not(feature = "parallel"))]
    fn pack_concurrent<W: Write>(
        &self,
        files: Vec<PendingFile>,
        records: &mut [CatalogRecord],
        cursor: &mut DataCursor,
        sink: &mut W,
    ) -> VdfsResult<()> {
        debug!(
            "Concurrent reads requested ({} jobs) without the parallel feature, reading sequentially",
            self.options.jobs
        );
        Self::pack_sequential(files, records, cursor, sink)
    }
}
