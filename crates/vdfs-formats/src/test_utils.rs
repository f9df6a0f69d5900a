//! Shared fixtures and invariant checks for unit tests

use chrono::{TimeZone, Utc};
use std::ops::Range;

use crate::builder::BuildConfig;
use crate::catalog::{Catalog, CatalogRecord};
use crate::header::Signature;
use crate::tree::{LogicalEntry, TreeBuilder, TreeNode};

/// `{"a/one.txt": "AB", "a/two.txt": "CD", "root.txt": "Z"}`
pub fn scenario_entries() -> Vec<LogicalEntry> {
    vec![
        LogicalEntry::file("a/one.txt", &b"AB"[..]),
        LogicalEntry::file("a/two.txt", &b"CD"[..]),
        LogicalEntry::file("root.txt", &b"Z"[..]),
    ]
}

/// Tree built from [`scenario_entries`]
pub fn scenario_tree() -> TreeNode {
    TreeBuilder::build(scenario_entries()).expect("scenario entries are valid")
}

/// Build configuration with a fixed timestamp
pub fn fixed_config(comment: &str) -> BuildConfig {
    BuildConfig::new(comment)
        .with_timestamp(Utc.with_ymd_and_hms(2001, 11, 19, 12, 30, 42).unwrap())
        .with_signature(Signature::Gothic2)
}

/// Assert the structural catalog invariants
///
/// - every directory range is in bounds and holds sorted, unique names
/// - each non-empty run carries exactly one last-sibling flag, on its end
/// - every record belongs to exactly one run
/// - file records and content sources line up
pub fn check_catalog_invariants(catalog: &Catalog) {
    let records = catalog.records();
    let mut covered = vec![false; records.len()];
    let mut runs = vec![0..catalog.root_count()];
    runs.extend(records.iter().filter_map(|r| r.child_range()));

    let mut non_empty_runs = 0;
    for run in runs {
        assert!(run.end <= records.len(), "run {run:?} out of bounds");
        if run.is_empty() {
            continue;
        }
        non_empty_runs += 1;

        for index in run.clone() {
            assert!(!covered[index], "record {index} is in two runs");
            covered[index] = true;
            assert_eq!(
                records[index].is_last_sibling(),
                index + 1 == run.end,
                "last flag of record {index}"
            );
        }

        let names: Vec<String> = records[run].iter().map(|r| r.name()).collect();
        assert!(
            names.windows(2).all(|pair| pair[0] < pair[1]),
            "run not sorted: {names:?}"
        );
    }

    assert!(covered.iter().all(|&c| c), "orphaned records");

    let last_flags = records.iter().filter(|r| r.is_last_sibling()).count();
    assert_eq!(last_flags, non_empty_runs);

    let (records, sources) = (catalog.records(), &catalog.sources);
    assert_eq!(records.len(), sources.len());
    for (record, source) in records.iter().zip(sources) {
        assert_eq!(record.is_directory(), source.is_none());
    }
}

/// Assert that every sibling run holds exactly the children of its tree node
///
/// `root` must be an identical copy of the tree the catalog was flattened
/// from.
pub fn check_catalog_matches_tree(catalog: &Catalog, root: &TreeNode) {
    check_run(catalog, 0..catalog.root_count(), root);
}

fn check_run(catalog: &Catalog, run: Range<usize>, node: &TreeNode) {
    let children: Vec<&TreeNode> = node.children().collect();
    let records = &catalog.records()[run.clone()];

    let names: Vec<String> = records.iter().map(CatalogRecord::name).collect();
    let expected: Vec<&str> = children.iter().map(|child| child.name()).collect();
    assert_eq!(names, expected, "children of {:?}", node.name());

    for ((index, record), child) in run.zip(records).zip(children) {
        assert_eq!(record.kind(), child.kind(), "kind of record {index}");
        assert_eq!(
            catalog.sources[index].as_ref(),
            child.source(),
            "source of record {index}"
        );
        if record.is_directory() {
            check_run(catalog, record.child_range().unwrap_or(0..0), child);
        }
    }
}
