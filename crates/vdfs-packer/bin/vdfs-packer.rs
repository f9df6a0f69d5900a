//! VDFS packer binary entry point.
//!
//! Thin wrapper around the vdfs-packer library that:
//! 1. Parses command-line arguments
//! 2. Initializes logging
//! 3. Resolves configuration
//! 4. Runs the build on a blocking task, racing it against Ctrl-C

use anyhow::Result;
use clap::Parser;
use vdfs_formats::CleanupRegistry;
use vdfs_packer::{PackerArgs, ResolvedConfig, pipeline};

/// Exit status after an interrupt (128 + SIGINT)
const INTERRUPTED_EXIT_CODE: i32 = 130;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = PackerArgs::parse();

    if args.list {
        let index = pipeline::list(&args.input)?;
        print!("{index}");
        return Ok(());
    }

    let config = ResolvedConfig::from_args(&args)?;
    tracing::debug!(
        "Configuration resolved: base={}, output={}, jobs={}",
        config.base_dir.display(),
        config.output.display(),
        config.jobs
    );

    let registry = CleanupRegistry::new();
    let build = tokio::task::spawn_blocking({
        let registry = registry.clone();
        move || pipeline::pack(&config, &registry)
    });

    tokio::select! {
        result = build => {
            let summary = result??;
            tracing::info!(
                "Done: {} entries, {} files, {} bytes",
                summary.entry_count,
                summary.file_count,
                summary.total_size
            );
            Ok(())
        }
        _ = tokio::signal::ctrl_c() => {
            let removed = registry.remove_all();
            tracing::warn!("Interrupted, removed {} temporary file(s)", removed);
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
    }
}
