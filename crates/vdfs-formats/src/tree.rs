//! In-memory directory tree built from logical entries
//!
//! The tree is the first pipeline stage. It owns every content source until
//! the flattener consumes it, and it is where naming rules and path conflicts
//! are enforced.

use bytes::Bytes;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};

use tracing::trace;

use crate::catalog::{EntryKind, normalize_name};
use crate::error::{VdfsError, VdfsResult};

/// Where a file's bytes come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSource {
    /// File on disk, opened when the data region is written
    Path(PathBuf),
    /// Bytes already in memory
    Memory(Bytes),
}

impl ContentSource {
    /// Open a reader over the content
    pub fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        match self {
            Self::Path(path) => Ok(Box::new(File::open(path)?)),
            Self::Memory(bytes) => Ok(Box::new(Cursor::new(bytes.clone()))),
        }
    }

    /// Content length without reading it
    pub fn byte_len(&self) -> io::Result<u64> {
        match self {
            Self::Path(path) => Ok(std::fs::metadata(path)?.len()),
            Self::Memory(bytes) => Ok(bytes.len() as u64),
        }
    }

    /// Filesystem path, if the content lives on disk
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Path(path) => Some(path),
            Self::Memory(_) => None,
        }
    }
}

impl From<PathBuf> for ContentSource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<Bytes> for ContentSource {
    fn from(bytes: Bytes) -> Self {
        Self::Memory(bytes)
    }
}

impl From<Vec<u8>> for ContentSource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Memory(Bytes::from(bytes))
    }
}

impl From<&'static [u8]> for ContentSource {
    fn from(bytes: &'static [u8]) -> Self {
        Self::Memory(Bytes::from_static(bytes))
    }
}

/// One path handed over by an input resolver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalEntry {
    /// Path segments, outermost first
    pub path: Vec<String>,
    /// File or directory
    pub kind: EntryKind,
    /// Content, present for files
    pub source: Option<ContentSource>,
}

impl LogicalEntry {
    /// File entry from a `/` or `\` separated path
    pub fn file(path: &str, source: impl Into<ContentSource>) -> Self {
        Self {
            path: split_path(path),
            kind: EntryKind::File,
            source: Some(source.into()),
        }
    }

    /// Directory entry from a `/` or `\` separated path
    pub fn directory(path: &str) -> Self {
        Self {
            path: split_path(path),
            kind: EntryKind::Directory,
            source: None,
        }
    }

    /// Entry from already split segments
    pub fn from_segments(
        path: Vec<String>,
        kind: EntryKind,
        source: Option<ContentSource>,
    ) -> Self {
        Self { path, kind, source }
    }

    /// Path joined with `/` for messages
    pub fn display_path(&self) -> String {
        self.path.join("/")
    }
}

/// Split on either separator, ignoring leading and trailing ones
fn split_path(path: &str) -> Vec<String> {
    let trimmed = path.trim_matches(['/', '\\']);
    if trimmed.is_empty() {
        return Vec::new();
    }
    trimmed.split(['/', '\\']).map(str::to_string).collect()
}

#[derive(Debug)]
enum NodeContent {
    Directory(BTreeMap<String, TreeNode>),
    File(ContentSource),
}

/// Node of the directory tree
///
/// Children are keyed by normalized name, so iteration order is the
/// catalog order.
#[derive(Debug)]
pub struct TreeNode {
    name: String,
    content: NodeContent,
}

impl TreeNode {
    fn new_directory(name: String) -> Self {
        Self {
            name,
            content: NodeContent::Directory(BTreeMap::new()),
        }
    }

    fn new_file(name: String, source: ContentSource) -> Self {
        Self {
            name,
            content: NodeContent::File(source),
        }
    }

    /// Empty root directory
    pub fn root() -> Self {
        Self::new_directory(String::new())
    }

    /// Normalized name; empty for the root
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Entry kind
    pub fn kind(&self) -> EntryKind {
        match self.content {
            NodeContent::Directory(_) => EntryKind::Directory,
            NodeContent::File(_) => EntryKind::File,
        }
    }

    /// Check if this node is a directory
    pub fn is_directory(&self) -> bool {
        matches!(self.content, NodeContent::Directory(_))
    }

    /// Content source of a file node
    pub fn source(&self) -> Option<&ContentSource> {
        match &self.content {
            NodeContent::File(source) => Some(source),
            NodeContent::Directory(_) => None,
        }
    }

    /// Direct children in catalog order (empty for files)
    pub fn children(&self) -> impl Iterator<Item = &TreeNode> {
        let children = match &self.content {
            NodeContent::Directory(children) => Some(children.values()),
            NodeContent::File(_) => None,
        };
        children.into_iter().flatten()
    }

    /// Number of direct children
    pub fn child_count(&self) -> usize {
        match &self.content {
            NodeContent::Directory(children) => children.len(),
            NodeContent::File(_) => 0,
        }
    }

    /// Look up a direct child by name, case-insensitively
    pub fn child(&self, name: &str) -> Option<&TreeNode> {
        match &self.content {
            NodeContent::Directory(children) => children.get(&name.to_ascii_uppercase()),
            NodeContent::File(_) => None,
        }
    }

    /// Number of nodes below this one
    pub fn descendant_count(&self) -> usize {
        self.children()
            .map(|child| 1 + child.descendant_count())
            .sum()
    }

    fn children_mut(&mut self) -> Option<&mut BTreeMap<String, TreeNode>> {
        match &mut self.content {
            NodeContent::Directory(children) => Some(children),
            NodeContent::File(_) => None,
        }
    }

    /// Take the children out of a directory node, in catalog order
    pub(crate) fn into_children(self) -> Vec<TreeNode> {
        match self.content {
            NodeContent::Directory(children) => children.into_values().collect(),
            NodeContent::File(_) => Vec::new(),
        }
    }

    /// Take the content source out of a file node
    pub(crate) fn into_source(self) -> Option<ContentSource> {
        match self.content {
            NodeContent::File(source) => Some(source),
            NodeContent::Directory(_) => None,
        }
    }
}

/// Builds the directory tree, rejecting conflicting entries
///
/// Entries from several resolvers (a base directory, glob lists, overlays)
/// can be fed into one builder; a clash between sources is reported the same
/// way as a clash within one source.
#[derive(Debug)]
pub struct TreeBuilder {
    root: TreeNode,
    files: usize,
}

impl TreeBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self {
            root: TreeNode::root(),
            files: 0,
        }
    }

    /// Build a tree from a complete entry list
    pub fn build(entries: impl IntoIterator<Item = LogicalEntry>) -> VdfsResult<TreeNode> {
        let mut builder = Self::new();
        builder.extend(entries)?;
        Ok(builder.finish())
    }

    /// Insert every entry, stopping at the first conflict
    pub fn extend(&mut self, entries: impl IntoIterator<Item = LogicalEntry>) -> VdfsResult<()> {
        for entry in entries {
            self.insert(entry)?;
        }
        Ok(())
    }

    /// Insert one entry, creating intermediate directories
    ///
    /// The entry is checked in full before the tree changes, so a rejected
    /// entry leaves no directories behind.
    pub fn insert(&mut self, entry: LogicalEntry) -> VdfsResult<()> {
        let logical = entry.display_path();
        let names = entry
            .path
            .iter()
            .map(|segment| normalize_name(segment, &logical))
            .collect::<VdfsResult<Vec<_>>>()?;
        let Some((last, parents)) = names.split_last() else {
            return match entry.kind {
                EntryKind::Directory => Ok(()),
                EntryKind::File => Err(VdfsError::Config(
                    "file entry with an empty path".to_string(),
                )),
            };
        };
        let source = match entry.kind {
            EntryKind::File => Some(entry.source.ok_or_else(|| {
                VdfsError::Config(format!("{logical}: file entry without content"))
            })?),
            EntryKind::Directory => None,
        };

        if self.check_placement(&entry.path, parents, last, entry.kind, &logical)? {
            return Ok(());
        }

        let mut node = &mut self.root;
        for name in parents {
            let children = node.children_mut().ok_or_else(|| {
                VdfsError::Config(format!("{logical}: parent is not a directory"))
            })?;
            node = children
                .entry(name.clone())
                .or_insert_with(|| TreeNode::new_directory(name.clone()));
        }
        let children = node
            .children_mut()
            .ok_or_else(|| VdfsError::Config(format!("{logical}: parent is not a directory")))?;

        match source {
            Some(source) => {
                children.insert(last.clone(), TreeNode::new_file(last.clone(), source));
                self.files += 1;
                trace!("Added file {}", logical);
            }
            None => {
                children.insert(last.clone(), TreeNode::new_directory(last.clone()));
                trace!("Added directory {}", logical);
            }
        }

        Ok(())
    }

    /// Check an entry against the tree without changing it
    ///
    /// Returns `true` when the entry is a directory that already exists.
    fn check_placement(
        &self,
        segments: &[String],
        parents: &[String],
        last: &str,
        kind: EntryKind,
        logical: &str,
    ) -> VdfsResult<bool> {
        let mut node = &self.root;
        for (depth, name) in parents.iter().enumerate() {
            match node.child(name) {
                Some(child) if child.is_directory() => node = child,
                Some(_) => {
                    return Err(VdfsError::KindConflict {
                        path: segments[..=depth].join("/"),
                        existing: EntryKind::File.as_str(),
                    });
                }
                None => return Ok(false),
            }
        }

        let Some(existing) = node.child(last) else {
            return Ok(false);
        };
        match (kind, existing.is_directory()) {
            (EntryKind::Directory, true) => Ok(true),
            (EntryKind::Directory, false) => Err(VdfsError::KindConflict {
                path: logical.to_string(),
                existing: EntryKind::File.as_str(),
            }),
            (EntryKind::File, true) => Err(VdfsError::KindConflict {
                path: logical.to_string(),
                existing: EntryKind::Directory.as_str(),
            }),
            (EntryKind::File, false) => Err(VdfsError::DuplicateEntry(logical.to_string())),
        }
    }

    /// Number of files inserted so far
    pub fn file_count(&self) -> usize {
        self.files
    }

    /// Root of the tree built so far
    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    /// Hand over the finished tree
    pub fn finish(self) -> TreeNode {
        self.root
    }
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
