//! VDFS packer.
//!
//! Front end for [`vdfs_formats`]: resolves a directory or a YAML pack script
//! into logical entries and writes them as a Gothic VDFS archive.
//!
//! - `config`: command line arguments and the merged build configuration
//! - `script`: YAML pack scripts
//! - `resolver`: directory walking, glob selection and overlays
//! - `pipeline`: the pack and list operations
//!
//! # Example
//!
//! ```no_run
//! use clap::Parser;
//! use vdfs_formats::CleanupRegistry;
//! use vdfs_packer::{PackerArgs, ResolvedConfig, pipeline};
//!
//! fn main() -> anyhow::Result<()> {
//!     let args = PackerArgs::parse();
//!     let config = ResolvedConfig::from_args(&args)?;
//!     let summary = pipeline::pack(&config, &CleanupRegistry::new())?;
//!     println!("{} files packed", summary.file_count);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod config;
pub mod error;
pub mod pipeline;
pub mod resolver;
pub mod script;

pub use config::{PackerArgs, ResolvedConfig, Selection, SignatureArg};
pub use error::{PackerError, PackerResult};
pub use resolver::{InputResolver, PathMatcher};
pub use script::{OverlaySpec, PackScript};
