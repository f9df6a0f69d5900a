//! Catalog records and entry name normalization
//!
//! The catalog is a flat array of fixed-size records. A directory record
//! points at a contiguous run of child records by index; the last record of
//! every run carries [`ENTRY_FLAG_LAST`]. There are no parent pointers, so a
//! reader rebuilds the hierarchy by walking runs from index 0.

use binrw::{BinRead, BinWrite};
use std::fmt;

use crate::error::{VdfsError, VdfsResult};
use crate::tree::ContentSource;

/// Width of the name field
pub const NAME_SIZE: usize = 64;

/// Serialized record size
pub const CATALOG_ENTRY_SIZE: usize = NAME_SIZE + 4 * 4;

/// Filler for unused name bytes
pub const NAME_PAD: u8 = 0x20;

/// Record describes a directory
pub const ENTRY_FLAG_DIRECTORY: u32 = 0x8000_0000;

/// Record terminates its sibling run
pub const ENTRY_FLAG_LAST: u32 = 0x4000_0000;

/// Entry kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Regular file with content
    File,
    /// Directory with children
    Directory,
}

impl EntryKind {
    /// Lowercase name for messages
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Directory => "directory",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalize one path segment into its catalog form
///
/// Names are upper-cased and must fit [`NAME_SIZE`] bytes. Only ASCII
/// names are accepted: the engine reads catalog names as single-byte
/// text, and ASCII case folding is the only folding that keeps sibling
/// names unique case-insensitively. `path` is only used for error context.
pub fn normalize_name(segment: &str, path: &str) -> VdfsResult<String> {
    let reason = if segment.is_empty() {
        Some("empty segment")
    } else if segment == "." || segment == ".." {
        Some("relative segment")
    } else if segment.contains(['/', '\\']) {
        Some("contains a path separator")
    } else if segment.contains('\0') {
        Some("contains a NUL byte")
    } else if !segment.is_ascii() {
        Some("contains a non-ASCII character")
    } else {
        None
    };
    if let Some(reason) = reason {
        return Err(VdfsError::InvalidName {
            path: path.to_string(),
            name: segment.to_string(),
            reason,
        });
    }

    let normalized = segment.to_ascii_uppercase();
    if normalized.len() > NAME_SIZE {
        return Err(VdfsError::NameTooLong {
            path: path.to_string(),
            len: normalized.len(),
            name: normalized,
            max: NAME_SIZE,
        });
    }

    Ok(normalized)
}

/// Pad a normalized name into the fixed name field
fn encode_name(name: &str) -> [u8; NAME_SIZE] {
    let mut field = [NAME_PAD; NAME_SIZE];
    let len = name.len().min(NAME_SIZE);
    field[..len].copy_from_slice(&name.as_bytes()[..len]);
    field
}

/// One catalog record (80 bytes, little-endian)
#[derive(Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct CatalogRecord {
    /// Upper-cased name, space padded
    pub name: [u8; NAME_SIZE],

    /// First child index (directory) or absolute data offset (file)
    pub offset: u32,

    /// Child count (directory) or byte length (file)
    pub size: u32,

    /// [`ENTRY_FLAG_DIRECTORY`] and [`ENTRY_FLAG_LAST`]
    pub flags: u32,

    /// Attribute bits, always written as zero
    pub attributes: u32,
}

impl CatalogRecord {
    /// File record with unresolved offset and size
    pub fn file(name: &str) -> Self {
        Self {
            name: encode_name(name),
            offset: 0,
            size: 0,
            flags: 0,
            attributes: 0,
        }
    }

    /// Directory record pointing at `child_count` records from `first_child`
    pub fn directory(name: &str, first_child: u32, child_count: u32) -> Self {
        Self {
            name: encode_name(name),
            offset: first_child,
            size: child_count,
            flags: ENTRY_FLAG_DIRECTORY,
            attributes: 0,
        }
    }

    /// Entry kind
    pub fn kind(&self) -> EntryKind {
        if self.is_directory() {
            EntryKind::Directory
        } else {
            EntryKind::File
        }
    }

    /// Check if this is a directory record
    pub fn is_directory(&self) -> bool {
        self.flags & ENTRY_FLAG_DIRECTORY != 0
    }

    /// Check if this record ends its sibling run
    pub fn is_last_sibling(&self) -> bool {
        self.flags & ENTRY_FLAG_LAST != 0
    }

    /// Set or clear the last-sibling flag
    pub fn set_last_sibling(&mut self, last: bool) {
        if last {
            self.flags |= ENTRY_FLAG_LAST;
        } else {
            self.flags &= !ENTRY_FLAG_LAST;
        }
    }

    /// Name with padding removed
    pub fn name(&self) -> String {
        let end = self
            .name
            .iter()
            .rposition(|&b| b != NAME_PAD && b != 0)
            .map_or(0, |i| i + 1);
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }

    /// Child index range of a directory record
    pub fn child_range(&self) -> Option<std::ops::Range<usize>> {
        self.is_directory()
            .then(|| self.offset as usize..self.offset as usize + self.size as usize)
    }
}

impl fmt::Debug for CatalogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogRecord")
            .field("name", &self.name())
            .field("kind", &self.kind())
            .field("offset", &self.offset)
            .field("size", &self.size)
            .field("last", &self.is_last_sibling())
            .finish()
    }
}

/// Flattened catalog with the content source of every file record
///
/// `sources[i]` is `Some` exactly when `records[i]` is a file.
#[derive(Debug)]
pub struct Catalog {
    pub(crate) records: Vec<CatalogRecord>,
    pub(crate) sources: Vec<Option<ContentSource>>,
    pub(crate) root_count: usize,
}

impl Catalog {
    /// Records in index order
    pub fn records(&self) -> &[CatalogRecord] {
        &self.records
    }

    /// Number of records in the root sibling run
    pub fn root_count(&self) -> usize {
        self.root_count
    }

    /// Total record count
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the catalog has no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of file records
    pub fn file_count(&self) -> usize {
        self.sources.iter().filter(|s| s.is_some()).count()
    }

    /// Serialized catalog size in bytes
    pub fn byte_size(&self) -> u64 {
        (self.records.len() * CATALOG_ENTRY_SIZE) as u64
    }

    /// Record indices in depth-first pre-order
    ///
    /// Walks the root run, descending into each directory's child range
    /// before continuing with the next sibling.
    pub fn depth_first_order(&self) -> Vec<usize> {
        depth_first_walk(&self.records, self.root_count)
            .into_iter()
            .map(|(index, _)| index)
            .collect()
    }

    /// Split into records and aligned sources
    pub fn into_parts(self) -> (Vec<CatalogRecord>, Vec<Option<ContentSource>>) {
        (self.records, self.sources)
    }
}

/// Separator used when joining catalog paths
pub const PATH_SEPARATOR: char = '\\';

/// Depth-first pre-order over a record array whose root run is `0..root_count`
///
/// Yields each record index with its full path, segments joined by
/// [`PATH_SEPARATOR`]. Ranges pointing outside the array or backwards are
/// skipped; validation is the caller's concern.
pub fn depth_first_walk(records: &[CatalogRecord], root_count: usize) -> Vec<(usize, String)> {
    let mut walk = Vec::with_capacity(records.len());
    let mut stack = vec![(0..root_count.min(records.len()), String::new())];

    while let Some((range, prefix)) = stack.last_mut() {
        let Some(index) = range.next() else {
            stack.pop();
            continue;
        };

        let mut path = prefix.clone();
        if !path.is_empty() {
            path.push(PATH_SEPARATOR);
        }
        path.push_str(&records[index].name());

        if let Some(children) = records[index].child_range() {
            if children.end <= records.len() && children.start > index {
                stack.push((children, path.clone()));
            }
        }
        walk.push((index, path));
    }

    walk
}
