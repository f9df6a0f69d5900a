//! Reading the header and catalog of an existing archive
//!
//! Used for listing archives and for checking what the builder wrote. Only
//! the front matter is loaded; file contents are never read.

use std::fmt;
use std::io::{Read, Seek, SeekFrom};

use binrw::BinReaderExt;
use tracing::debug;

use crate::catalog::{CatalogRecord, depth_first_walk};
use crate::error::{VdfsError, VdfsResult};
use crate::header::VdfsHeader;

/// Records reserved up front when reading a catalog
const INITIAL_RECORD_CAPACITY: usize = 4096;

/// One catalog record with its full path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry<'a> {
    /// Record index
    pub index: usize,
    /// Path with `\` separators
    pub path: String,
    /// Catalog record
    pub record: &'a CatalogRecord,
}

/// Parsed header and catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveIndex {
    header: VdfsHeader,
    records: Vec<CatalogRecord>,
}

impl ArchiveIndex {
    /// Read the header and catalog from the start of `reader`
    pub fn read<R: Read + Seek>(reader: &mut R) -> VdfsResult<Self> {
        reader.seek(SeekFrom::Start(0))?;
        let header: VdfsHeader = reader.read_le()?;
        header.validate()?;

        reader.seek(SeekFrom::Start(u64::from(header.catalog_offset)))?;
        let count = header.entry_count as usize;
        let mut records = Vec::with_capacity(count.min(INITIAL_RECORD_CAPACITY));
        for index in 0..count {
            let record: CatalogRecord = reader.read_le().map_err(|e| {
                VdfsError::MalformedArchive(format!(
                    "catalog record {index} of {count} unreadable: {e}"
                ))
            })?;
            records.push(record);
        }

        debug!("Read catalog with {} entries", records.len());
        Ok(Self { header, records })
    }

    /// Volume header
    pub fn header(&self) -> &VdfsHeader {
        &self.header
    }

    /// Records in index order
    pub fn records(&self) -> &[CatalogRecord] {
        &self.records
    }

    /// Length of the root run: up to and including the first last-sibling flag
    pub fn root_count(&self) -> usize {
        self.records
            .iter()
            .position(CatalogRecord::is_last_sibling)
            .map_or(0, |i| i + 1)
    }

    /// Every reachable record with its path, depth-first
    pub fn entries(&self) -> Vec<IndexEntry<'_>> {
        depth_first_walk(&self.records, self.root_count())
            .into_iter()
            .map(|(index, path)| IndexEntry {
                index,
                path,
                record: &self.records[index],
            })
            .collect()
    }

    /// Find a file or directory by path, case-insensitively
    pub fn find(&self, path: &str) -> Option<IndexEntry<'_>> {
        let wanted = path
            .trim_matches(['/', '\\'])
            .replace('/', "\\")
            .to_ascii_uppercase();
        self.entries().into_iter().find(|entry| entry.path == wanted)
    }

    /// Check the catalog structure against the header
    pub fn validate(&self) -> VdfsResult<()> {
        let records = &self.records;
        let len = records.len();
        let root_count = self.root_count();
        if len > 0 && root_count == 0 {
            return Err(malformed("root run has no last-sibling flag"));
        }

        let mut runs = vec![(None, 0..root_count)];
        for (index, record) in records.iter().enumerate() {
            let Some(range) = record.child_range() else {
                continue;
            };
            if range.end > len {
                return Err(malformed(format!(
                    "directory {index} children {range:?} exceed {len} records"
                )));
            }
            if !range.is_empty() && range.start <= index {
                return Err(malformed(format!(
                    "directory {index} points backwards to {}",
                    range.start
                )));
            }
            runs.push((Some(index), range));
        }

        let mut owner = vec![None; len];
        for (parent, run) in runs {
            for index in run.clone() {
                if owner[index].is_some() {
                    return Err(malformed(format!("record {index} belongs to two runs")));
                }
                owner[index] = Some(parent);

                let expect_last = index + 1 == run.end;
                if records[index].is_last_sibling() != expect_last {
                    return Err(malformed(format!(
                        "record {index} last-sibling flag is {}, expected {expect_last}",
                        records[index].is_last_sibling()
                    )));
                }
            }
        }
        if let Some(orphan) = owner.iter().position(Option::is_none) {
            return Err(malformed(format!("record {orphan} is unreachable")));
        }

        let files = records.iter().filter(|r| !r.is_directory()).count();
        if files != self.header.file_count as usize {
            return Err(malformed(format!(
                "header counts {} files, catalog has {files}",
                self.header.file_count
            )));
        }

        let data_start = self.header.data_offset();
        let data_end = data_start + u64::from(self.header.data_size);
        let mut used = 0u64;
        for (index, record) in records.iter().enumerate() {
            if record.is_directory() {
                continue;
            }
            let start = u64::from(record.offset);
            let end = start + u64::from(record.size);
            if start < data_start || end > data_end {
                return Err(malformed(format!(
                    "file {index} data {start}..{end} outside data region {data_start}..{data_end}"
                )));
            }
            used += u64::from(record.size);
        }
        if used > u64::from(self.header.data_size) {
            return Err(malformed(format!(
                "files hold {used} bytes, data region is {}",
                self.header.data_size
            )));
        }

        Ok(())
    }
}

fn malformed(message: impl Into<String>) -> VdfsError {
    VdfsError::MalformedArchive(message.into())
}

impl fmt::Display for ArchiveIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.header)?;
        for entry in self.entries() {
            if entry.record.is_directory() {
                writeln!(f, "  {}\\", entry.path)?;
            } else {
                writeln!(
                    f,
                    "  {} ({} bytes at {})",
                    entry.path, entry.record.size, entry.record.offset
                )?;
            }
        }
        Ok(())
    }
}
