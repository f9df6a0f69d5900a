//! Tree to catalog flattening
//!
//! Records are emitted level by level from a FIFO of sibling runs. The root
//! run takes indices `0..k`. Whenever a directory record is emitted, its
//! children are reserved the next free block of indices and its run is
//! queued; because runs leave the queue in the order their blocks were
//! reserved, every directory's children land exactly where its record says,
//! in a single pass with no back-patching.

use std::collections::VecDeque;

use tracing::debug;

use crate::catalog::{Catalog, CatalogRecord};
use crate::error::{VdfsError, VdfsResult};
use crate::tree::TreeNode;

/// Largest record count the 32-bit header counters can describe
pub const MAX_CATALOG_ENTRIES: usize = u32::MAX as usize;

/// Flattens a directory tree into catalog order
#[derive(Debug, Clone, Copy)]
pub struct CatalogFlattener {
    max_entries: usize,
}

impl CatalogFlattener {
    /// Flattener with the format's entry limit
    pub fn new() -> Self {
        Self {
            max_entries: MAX_CATALOG_ENTRIES,
        }
    }

    /// Flattener with a lower entry limit
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            max_entries: max_entries.min(MAX_CATALOG_ENTRIES),
        }
    }

    /// Consume the tree and produce the catalog
    pub fn flatten(&self, root: TreeNode) -> VdfsResult<Catalog> {
        let total = root.descendant_count();
        if total > self.max_entries {
            return Err(VdfsError::TooManyEntries {
                count: total,
                max: self.max_entries,
            });
        }

        let root_run = root.into_children();
        let root_count = root_run.len();

        let mut records = Vec::with_capacity(total);
        let mut sources = Vec::with_capacity(total);
        let mut reserved = root_count;
        let mut runs = VecDeque::from([root_run]);

        while let Some(run) = runs.pop_front() {
            let run_len = run.len();

            for (position, node) in run.into_iter().enumerate() {
                let mut record = if node.is_directory() {
                    let child_count = node.child_count();
                    let record =
                        CatalogRecord::directory(node.name(), reserved as u32, child_count as u32);
                    reserved += child_count;
                    runs.push_back(node.into_children());
                    sources.push(None);
                    record
                } else {
                    let record = CatalogRecord::file(node.name());
                    sources.push(node.into_source());
                    record
                };

                record.set_last_sibling(position + 1 == run_len);
                records.push(record);
            }
        }

        debug_assert_eq!(reserved, records.len());

        let catalog = Catalog {
            records,
            sources,
            root_count,
        };
        debug!(
            "Flattened catalog: {} entries ({} files, {} in root)",
            catalog.len(),
            catalog.file_count(),
            root_count
        );

        Ok(catalog)
    }
}

impl Default for CatalogFlattener {
    fn default() -> Self {
        Self::new()
    }
}

/// Flatten with the default entry limit
pub fn flatten(root: TreeNode) -> VdfsResult<Catalog> {
    CatalogFlattener::new().flatten(root)
}
