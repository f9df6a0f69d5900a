//! Error types for the packer front end.

use std::path::PathBuf;
use thiserror::Error;
use vdfs_formats::VdfsError;

/// Result type for packer operations
pub type PackerResult<T> = Result<T, PackerError>;

/// Errors raised while resolving inputs or driving a build
#[derive(Debug, Error)]
pub enum PackerError {
    /// Input path is neither a script nor a directory
    #[error("Input not found: {0}")]
    InputNotFound(PathBuf),

    /// Failed to read the script file
    #[error("Failed to read script {path}: {source}")]
    ScriptRead {
        /// Script path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Script is not valid YAML or has the wrong shape
    #[error("Invalid script {path}: {source}")]
    ScriptParse {
        /// Script path
        path: PathBuf,
        /// Parser error
        #[source]
        source: serde_yaml::Error,
    },

    /// A required setting is empty in the script and not overridden
    #[error("Missing {0}: empty in script and no override given")]
    MissingSetting(&'static str),

    /// Glob pattern failed to compile
    #[error("Invalid glob pattern '{pattern}': {source}")]
    Glob {
        /// Pattern as written
        pattern: String,
        /// Compile error
        #[source]
        source: globset::Error,
    },

    /// Directory traversal failed
    #[error("Failed to walk {path}: {source}")]
    Walk {
        /// Directory being walked
        path: PathBuf,
        /// Traversal error
        #[source]
        source: walkdir::Error,
    },

    /// Path component is not valid UTF-8
    #[error("Path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(PathBuf),

    /// Build timestamp outside the representable range
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(i64),

    /// Archive assembly failed
    #[error(transparent)]
    Vdfs(#[from] VdfsError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PackerError {
    /// Check if the error stems from user-provided configuration
    pub fn is_config_error(&self) -> bool {
        match self {
            Self::InputNotFound(_)
            | Self::ScriptParse { .. }
            | Self::MissingSetting(_)
            | Self::Glob { .. }
            | Self::NonUtf8Path(_)
            | Self::InvalidTimestamp(_) => true,
            Self::Vdfs(e) => e.is_input_error(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_classification() {
        assert!(PackerError::MissingSetting("base_dir").is_config_error());
        assert!(PackerError::Vdfs(VdfsError::DuplicateEntry("A".to_string())).is_config_error());
        assert!(
            !PackerError::Io(std::io::Error::from(std::io::ErrorKind::PermissionDenied))
                .is_config_error()
        );
    }

    #[test]
    fn test_vdfs_error_is_transparent() {
        let err = PackerError::from(VdfsError::DuplicateEntry("A/B.TXT".to_string()));
        assert_eq!(err.to_string(), "Duplicate file entry: A/B.TXT");
    }
}
