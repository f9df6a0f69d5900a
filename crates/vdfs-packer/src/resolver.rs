//! Input resolution: turns directories, globs and overlays into logical entries.
//!
//! The base directory is walked in file name order. In glob mode an entry is
//! selected when an include pattern matches its relative path or one of its
//! ancestor directories and no exclude pattern does; selecting a directory
//! therefore selects everything below it. Overlays are always taken whole.

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, trace};
use vdfs_formats::{ContentSource, EntryKind, LogicalEntry};
use walkdir::WalkDir;

use crate::config::{ResolvedConfig, Selection};
use crate::error::{PackerError, PackerResult};

/// Compiled include and exclude patterns
#[derive(Debug, Clone)]
pub struct PathMatcher {
    include: GlobSet,
    exclude: GlobSet,
}

impl PathMatcher {
    /// Compile patterns; matching ignores case and `*` crosses separators
    pub fn new(include: &[String], exclude: &[String]) -> PackerResult<Self> {
        Ok(Self {
            include: compile_globset(include)?,
            exclude: compile_globset(exclude)?,
        })
    }

    /// Check a `/` separated relative path
    pub fn is_selected(&self, relative: &str) -> bool {
        let mut included = false;
        for candidate in self_and_ancestors(relative) {
            if self.exclude.is_match(candidate) {
                return false;
            }
            included |= self.include.is_match(candidate);
        }
        included
    }
}

fn compile_globset(patterns: &[String]) -> PackerResult<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let normalized = pattern.replace('\\', "/");
        let glob = GlobBuilder::new(normalized.trim_start_matches("./").trim_matches('/'))
            .case_insensitive(true)
            .literal_separator(false)
            .build()
            .map_err(|source| PackerError::Glob {
                pattern: pattern.clone(),
                source,
            })?;
        builder.add(glob);
    }
    builder.build().map_err(|source| PackerError::Glob {
        pattern: patterns.join(", "),
        source,
    })
}

/// `a/b/c` yields `a/b/c`, `a/b`, `a`
fn self_and_ancestors(relative: &str) -> impl Iterator<Item = &str> {
    std::iter::successors(Some(relative), |path| path.rsplit_once('/').map(|(parent, _)| parent))
}

/// UTF-8 path segments of `path` relative to `root`
fn relative_segments(root: &Path, path: &Path) -> PackerResult<Vec<String>> {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(segment) => Some(segment),
            _ => None,
        })
        .map(|segment| {
            segment
                .to_str()
                .map(str::to_string)
                .ok_or_else(|| PackerError::NonUtf8Path(path.to_path_buf()))
        })
        .collect()
}

/// Produces the entry list for one build
#[derive(Debug)]
pub struct InputResolver<'a> {
    config: &'a ResolvedConfig,
    matcher: Option<PathMatcher>,
}

impl<'a> InputResolver<'a> {
    /// Prepare a resolver, compiling the configured globs
    pub fn new(config: &'a ResolvedConfig) -> PackerResult<Self> {
        let matcher = match &config.selection {
            Selection::All => None,
            Selection::Globs { include, exclude } => Some(PathMatcher::new(include, exclude)?),
        };
        Ok(Self { config, matcher })
    }

    /// Walk the base directory and every overlay
    pub fn resolve(&self) -> PackerResult<Vec<LogicalEntry>> {
        let mut entries = Vec::new();

        self.walk(&self.config.base_dir, &[], self.matcher.as_ref(), &mut entries)?;
        let selected = entries.len();
        debug!(
            "Selected {} entries from {}",
            selected,
            self.config.base_dir.display()
        );

        for overlay in &self.config.overlays {
            let prefix: Vec<String> = overlay
                .prefix
                .split(['/', '\\'])
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            let before = entries.len();
            if !prefix.is_empty() {
                entries.push(LogicalEntry::from_segments(
                    prefix.clone(),
                    EntryKind::Directory,
                    None,
                ));
            }
            self.walk(&overlay.dir, &prefix, None, &mut entries)?;
            debug!(
                "Overlay {} added {} entries under '{}'",
                overlay.dir.display(),
                entries.len() - before,
                overlay.prefix
            );
        }

        Ok(entries)
    }

    fn walk(
        &self,
        root: &Path,
        prefix: &[String],
        matcher: Option<&PathMatcher>,
        entries: &mut Vec<LogicalEntry>,
    ) -> PackerResult<()> {
        let walker = WalkDir::new(root)
            .min_depth(1)
            .follow_links(true)
            .sort_by_file_name();

        for entry in walker {
            let entry = entry.map_err(|source| PackerError::Walk {
                path: root.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            let segments = relative_segments(root, path)?;

            if let Some(matcher) = matcher {
                if !matcher.is_selected(&segments.join("/")) {
                    continue;
                }
            }

            let mut logical = prefix.to_vec();
            logical.extend(segments);

            if entry.file_type().is_dir() {
                entries.push(LogicalEntry::from_segments(logical, EntryKind::Directory, None));
            } else if self.config.is_output(path) {
                debug!("Skipping output archive {}", path.display());
            } else if self.config.is_stale_temp(path) {
                debug!("Skipping leftover temporary file {}", path.display());
            } else {
                trace!("Resolved {}", path.display());
                entries.push(LogicalEntry::from_segments(
                    logical,
                    EntryKind::File,
                    Some(ContentSource::Path(PathBuf::from(path))),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn matcher(include: &[&str], exclude: &[&str]) -> PathMatcher {
        let owned = |v: &[&str]| v.iter().map(|s| (*s).to_string()).collect::<Vec<_>>();
        PathMatcher::new(&owned(include), &owned(exclude)).expect("Operation should succeed")
    }

    #[test]
    fn test_glob_matches_case_insensitively() {
        let m = matcher(&["Data/Textures/*.TEX"], &[]);
        assert!(m.is_selected("data/textures/stone.tex"));
        assert!(!m.is_selected("data/meshes/stone.msh"));
    }

    #[test]
    fn test_star_crosses_separators() {
        let m = matcher(&["data/*.tex"], &[]);
        assert!(m.is_selected("data/textures/_compiled/stone.tex"));
    }

    #[test]
    fn test_directory_match_selects_contents() {
        let m = matcher(&["Data/Meshes"], &[]);
        assert!(m.is_selected("Data/Meshes"));
        assert!(m.is_selected("Data/Meshes/_compiled/hero.mrm"));
        assert!(!m.is_selected("Data"));
    }

    #[test]
    fn test_exclude_wins_over_include() {
        let m = matcher(&["Data"], &["*.bak", "data/private"]);
        assert!(m.is_selected("Data/a.tex"));
        assert!(!m.is_selected("Data/a.bak"));
        assert!(!m.is_selected("Data/Private/secret.txt"));
    }

    #[test]
    fn test_backslash_patterns() {
        let m = matcher(&["Data\\Worlds\\*.zen"], &[]);
        assert!(m.is_selected("Data/Worlds/newworld.zen"));
    }

    #[test]
    fn test_invalid_glob() {
        let err = PathMatcher::new(&["data/[".to_string()], &[]).unwrap_err();
        assert!(matches!(err, PackerError::Glob { .. }));
    }

    #[test]
    fn test_ancestors() {
        let all: Vec<&str> = self_and_ancestors("a/b/c").collect();
        assert_eq!(all, vec!["a/b/c", "a/b", "a"]);
    }
}
