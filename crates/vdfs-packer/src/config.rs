//! Command line arguments and the resolved build configuration.
//!
//! Arguments are parsed with clap, then merged with the pack script (if the
//! input is one) into a [`ResolvedConfig`]. Command line values override
//! script values.
//!
//! # Example
//!
//! ```no_run
//! use clap::Parser;
//! use vdfs_packer::{PackerArgs, ResolvedConfig};
//!
//! let args = PackerArgs::parse_from(["vdfs-packer", "-c", "Mod data", "./_work"]);
//! let config = ResolvedConfig::from_args(&args).expect("Invalid configuration");
//! println!("Writing {}", config.output.display());
//! ```

use chrono::{DateTime, Utc};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use vdfs_formats::{BuildConfig, Signature, TEMP_PREFIX, TEMP_SUFFIX};

use crate::error::{PackerError, PackerResult};
use crate::script::{OverlaySpec, PackScript};

/// Output file name in directory mode
pub const DEFAULT_OUTPUT_NAME: &str = "DEFAULT.VDF";

/// Volume signature selectable on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SignatureArg {
    /// Gothic 1
    Gothic1,
    /// Gothic 2 and Night of the Raven
    #[default]
    Gothic2,
}

impl From<SignatureArg> for Signature {
    fn from(arg: SignatureArg) -> Self {
        match arg {
            SignatureArg::Gothic1 => Self::Gothic1,
            SignatureArg::Gothic2 => Self::Gothic2,
        }
    }
}

/// Packer command line
#[derive(Debug, Clone, Parser)]
#[command(
    name = "vdfs-packer",
    about = "Pack a directory or a YAML script into a Gothic VDFS archive",
    version,
    arg_required_else_help = true
)]
pub struct PackerArgs {
    /// YAML script or base directory
    pub input: PathBuf,

    /// Base directory override
    #[arg(short = 'b', long, value_name = "DIR", value_hint = clap::ValueHint::DirPath)]
    pub base_directory: Option<PathBuf>,

    /// Output file override
    #[arg(short = 'o', long, value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
    pub output_file: Option<PathBuf>,

    /// Comment stored in the volume header
    #[arg(short = 'c', long)]
    pub comment: Option<String>,

    /// Build time as Unix seconds, for reproducible archives
    #[arg(long, value_name = "SECS", env = "SOURCE_DATE_EPOCH")]
    pub timestamp: Option<i64>,

    /// Concurrent source reads (0 uses every core)
    #[arg(short = 'j', long, default_value_t = 1, env = "VDFS_PACKER_JOBS")]
    pub jobs: usize,

    /// Volume signature
    #[arg(long, value_enum, default_value_t = SignatureArg::Gothic2)]
    pub signature: SignatureArg,

    /// Print the catalog of an existing archive instead of building one
    #[arg(long)]
    pub list: bool,
}

/// Which files under the base directory end up in the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Everything, including empty directories
    All,
    /// Paths matching the include globs and none of the exclude globs
    Globs {
        /// Include patterns
        include: Vec<String>,
        /// Exclude patterns
        exclude: Vec<String>,
    },
}

/// Fully resolved build settings
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Directory the selection is relative to
    pub base_dir: PathBuf,
    /// Archive to write
    pub output: PathBuf,
    /// Files to take from `base_dir`
    pub selection: Selection,
    /// Extra directories mounted below logical prefixes
    pub overlays: Vec<OverlaySpec>,
    /// Header settings
    pub build: BuildConfig,
    /// Concurrent source reads
    pub jobs: usize,
}

impl ResolvedConfig {
    /// Merge command line arguments with the script they name, if any
    pub fn from_args(args: &PackerArgs) -> PackerResult<Self> {
        let timestamp = match args.timestamp {
            Some(secs) => {
                DateTime::<Utc>::from_timestamp(secs, 0).ok_or(PackerError::InvalidTimestamp(secs))?
            }
            None => Utc::now(),
        };
        let jobs = match args.jobs {
            0 => std::thread::available_parallelism().map_or(1, usize::from),
            n => n,
        };

        if args.input.is_dir() {
            Ok(Self::for_directory(args, timestamp, jobs))
        } else if args.input.is_file() {
            let script = PackScript::load(&args.input)?;
            Self::for_script(args, script, timestamp, jobs)
        } else {
            Err(PackerError::InputNotFound(args.input.clone()))
        }
    }

    fn for_directory(args: &PackerArgs, timestamp: DateTime<Utc>, jobs: usize) -> Self {
        let base_dir = args
            .base_directory
            .clone()
            .unwrap_or_else(|| args.input.clone());
        let output = args
            .output_file
            .clone()
            .unwrap_or_else(|| args.input.join(DEFAULT_OUTPUT_NAME));

        Self {
            base_dir,
            output,
            selection: Selection::All,
            overlays: Vec::new(),
            build: build_config(args.comment.clone().unwrap_or_default(), timestamp, args),
            jobs,
        }
    }

    fn for_script(
        args: &PackerArgs,
        script: PackScript,
        timestamp: DateTime<Utc>,
        jobs: usize,
    ) -> PackerResult<Self> {
        let base_dir = override_or(&args.base_directory, script.base_dir)
            .ok_or(PackerError::MissingSetting("base_dir"))?;
        let output = override_or(&args.output_file, script.file_path)
            .ok_or(PackerError::MissingSetting("file_path"))?;
        let comment = args.comment.clone().unwrap_or(script.comment);

        Ok(Self {
            base_dir,
            output,
            selection: Selection::Globs {
                include: script.file_include_globs,
                exclude: script.file_exclude_globs,
            },
            overlays: script.overlays,
            build: build_config(comment, timestamp, args),
            jobs,
        })
    }

    /// Check if `path` is the archive being written
    pub fn is_output(&self, path: &Path) -> bool {
        if path.file_name() != self.output.file_name() {
            return false;
        }
        match (path.canonicalize(), self.output.canonicalize()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }

    /// Check if `path` is a temporary archive left next to the output by an
    /// interrupted build
    pub fn is_stale_temp(&self, path: &Path) -> bool {
        let temp_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(TEMP_PREFIX) && name.ends_with(TEMP_SUFFIX));
        if !temp_name {
            return false;
        }

        let output_dir = match self.output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        match (path.parent().map(Path::canonicalize), output_dir.canonicalize()) {
            (Some(Ok(a)), Ok(b)) => a == b,
            _ => false,
        }
    }
}

fn override_or(cli: &Option<PathBuf>, script: PathBuf) -> Option<PathBuf> {
    cli.clone()
        .or_else(|| (!script.as_os_str().is_empty()).then_some(script))
}

fn build_config(comment: String, timestamp: DateTime<Utc>, args: &PackerArgs) -> BuildConfig {
    BuildConfig::new(comment)
        .with_timestamp(timestamp)
        .with_signature(args.signature.into())
}
