//! YAML pack scripts.
//!
//! ```yaml
//! comment: "Textures for the new world"
//! base_dir: ../_work
//! file_path: ../Data/Textures_Addon.vdf
//! file_include_globs:
//!   - "Data/Textures/_compiled/*"
//!   - "Data/Meshes"
//! file_exclude_globs:
//!   - "*.bak"
//! overlays:
//!   - dir: ../patches
//!     prefix: _work/Data/Scripts
//! ```
//!
//! Relative paths are resolved against the directory containing the script.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PackerError, PackerResult};

/// Extra directory mounted below a logical prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OverlaySpec {
    /// Directory on disk
    pub dir: PathBuf,
    /// Logical path the directory's contents are placed under
    #[serde(default)]
    pub prefix: String,
}

/// Parsed pack script
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackScript {
    /// Volume comment
    #[serde(default)]
    pub comment: String,
    /// Directory the globs are relative to
    #[serde(default)]
    pub base_dir: PathBuf,
    /// Output archive
    #[serde(default)]
    pub file_path: PathBuf,
    /// Paths to include, relative to `base_dir`
    #[serde(default)]
    pub file_include_globs: Vec<String>,
    /// Paths to leave out even when included
    #[serde(default)]
    pub file_exclude_globs: Vec<String>,
    /// Additional directories
    #[serde(default)]
    pub overlays: Vec<OverlaySpec>,
}

impl PackScript {
    /// Parse a script from YAML text
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    /// Load a script and resolve its relative paths against its directory
    pub fn load(path: &Path) -> PackerResult<Self> {
        let text = fs::read_to_string(path).map_err(|source| PackerError::ScriptRead {
            path: path.to_path_buf(),
            source,
        })?;
        let script = Self::from_yaml(&text).map_err(|source| PackerError::ScriptParse {
            path: path.to_path_buf(),
            source,
        })?;

        let root = path.parent().unwrap_or_else(|| Path::new(""));
        Ok(script.relative_to(root))
    }

    /// Anchor relative paths at `root`; empty paths stay empty
    pub fn relative_to(mut self, root: &Path) -> Self {
        let anchor = |path: &mut PathBuf| {
            if !path.as_os_str().is_empty() && path.is_relative() {
                *path = root.join(&*path);
            }
        };
        anchor(&mut self.base_dir);
        anchor(&mut self.file_path);
        for overlay in &mut self.overlays {
            anchor(&mut overlay.dir);
        }
        self
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_full_script() {
        let script = PackScript::from_yaml(
            r#"
comment: "Addon textures"
base_dir: _work
file_path: out/TEX.VDF
file_include_globs:
  - "Data/Textures/*"
file_exclude_globs:
  - "*.bak"
overlays:
  - dir: patches
    prefix: _work/Data
"#,
        )
        .expect("Operation should succeed");

        assert_eq!(script.comment, "Addon textures");
        assert_eq!(script.base_dir, PathBuf::from("_work"));
        assert_eq!(script.file_include_globs, vec!["Data/Textures/*"]);
        assert_eq!(script.file_exclude_globs, vec!["*.bak"]);
        assert_eq!(
            script.overlays,
            vec![OverlaySpec {
                dir: PathBuf::from("patches"),
                prefix: "_work/Data".to_string(),
            }]
        );
    }

    #[test]
    fn test_optional_fields_default() {
        let script = PackScript::from_yaml(
            "comment: x\nbase_dir: b\nfile_path: f.vdf\nfile_include_globs: ['*']\n",
        )
        .unwrap();
        assert!(script.file_exclude_globs.is_empty());
        assert!(script.overlays.is_empty());
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(PackScript::from_yaml("comment: x\nbase_directory: b\n").is_err());
    }

    #[test]
    fn test_relative_paths_anchor_at_script_dir() {
        let script = PackScript {
            base_dir: PathBuf::from("work"),
            file_path: PathBuf::new(),
            overlays: vec![OverlaySpec {
                dir: PathBuf::from("/abs/overlay"),
                prefix: String::new(),
            }],
            ..PackScript::default()
        }
        .relative_to(Path::new("/scripts"));

        assert_eq!(script.base_dir, PathBuf::from("/scripts/work"));
        assert_eq!(script.file_path, PathBuf::new());
        assert_eq!(script.overlays[0].dir, PathBuf::from("/abs/overlay"));
    }
}
