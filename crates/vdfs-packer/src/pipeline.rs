//! Build and list operations behind the command line.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;
use tracing::info;
use vdfs_formats::{ArchiveIndex, BuildSummary, CleanupRegistry, PackOptions, VdfsBuilder};

use crate::config::ResolvedConfig;
use crate::error::PackerResult;
use crate::resolver::InputResolver;

/// Resolve inputs and write the archive
///
/// Temporary output is tracked in `registry` until it has been renamed into
/// place, so an interrupt handler can remove it.
pub fn pack(config: &ResolvedConfig, registry: &CleanupRegistry) -> PackerResult<BuildSummary> {
    info!(
        "Packing {} into {}",
        config.base_dir.display(),
        config.output.display()
    );

    let entries = InputResolver::new(config)?.resolve()?;

    let mut builder = VdfsBuilder::new(config.build.clone())
        .with_pack_options(PackOptions::default().with_jobs(config.jobs))
        .with_cleanup_registry(registry.clone());
    builder.extend(entries)?;

    if let Some(parent) = config.output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    Ok(builder.write_to_path(&config.output)?)
}

/// Read and validate the catalog of an existing archive
pub fn list(path: &Path) -> PackerResult<ArchiveIndex> {
    let mut reader = BufReader::new(File::open(path)?);
    let index = ArchiveIndex::read(&mut reader)?;
    index.validate()?;
    Ok(index)
}
