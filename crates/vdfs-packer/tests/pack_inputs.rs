#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
//! Integration tests for input resolution and complete packs
//!
//! Each test lays out a small mod tree in a temporary directory, resolves it
//! in directory or script mode and checks the resulting archive catalog.

use clap::Parser;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use vdfs_formats::{CleanupRegistry, VdfsError};
use vdfs_packer::{InputResolver, PackerArgs, PackerError, ResolvedConfig, pipeline};

fn touch(root: &Path, relative: &str, contents: &[u8]) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn mod_tree(root: &Path) {
    touch(root, "Data/Textures/_compiled/stone-c.tex", b"tex1");
    touch(root, "Data/Textures/_compiled/wood-c.tex", b"tex2");
    touch(root, "Data/Textures/readme.bak", b"old");
    touch(root, "Data/Meshes/_compiled/hero.mrm", b"mesh");
    touch(root, "Data/Scripts/_compiled/gothic.dat", b"dat");
    fs::create_dir_all(root.join("Data/Music")).unwrap();
}

fn config_for(args: &[&str]) -> ResolvedConfig {
    let args = PackerArgs::try_parse_from(
        ["vdfs-packer", "--timestamp", "1000000000"]
            .into_iter()
            .chain(args.iter().copied()),
    )
    .unwrap();
    ResolvedConfig::from_args(&args).expect("Operation should succeed")
}

fn listed_paths(archive: &Path) -> Vec<String> {
    pipeline::list(archive)
        .expect("Operation should succeed")
        .entries()
        .into_iter()
        .map(|e| e.path)
        .collect()
}

#[test]
fn directory_mode_packs_everything() {
    let dir = TempDir::new().unwrap();
    let work = dir.path().join("_work");
    mod_tree(&work);

    let config = config_for(&[work.to_str().unwrap(), "-c", "full"]);
    let summary = pipeline::pack(&config, &CleanupRegistry::new()).unwrap();

    assert_eq!(summary.file_count, 5);
    assert_eq!(summary.path.as_deref(), Some(work.join("DEFAULT.VDF").as_path()));

    let paths = listed_paths(&work.join("DEFAULT.VDF"));
    assert!(paths.contains(&"DATA\\MUSIC".to_string()), "{paths:?}");
    assert!(paths.contains(&"DATA\\TEXTURES\\README.BAK".to_string()));
    assert!(!paths.iter().any(|p| p.contains("DEFAULT.VDF")));
}

#[test]
fn repacking_skips_previous_output() {
    let dir = TempDir::new().unwrap();
    let work = dir.path().join("_work");
    mod_tree(&work);

    let config = config_for(&[work.to_str().unwrap()]);
    pipeline::pack(&config, &CleanupRegistry::new()).unwrap();
    let first = fs::read(work.join("DEFAULT.VDF")).unwrap();

    // DEFAULT.VDF now sits in the walked tree
    pipeline::pack(&config, &CleanupRegistry::new()).unwrap();
    let second = fs::read(work.join("DEFAULT.VDF")).unwrap();

    assert_eq!(first, second);
}

#[test]
fn leftover_temporary_files_are_not_packed() {
    let dir = TempDir::new().unwrap();
    let work = dir.path().join("_work");
    mod_tree(&work);
    // Left behind by a killed build next to the output
    touch(&work, ".vdfs-Xy12Ab.tmp", b"partial archive");
    touch(&work, "Data/.vdfs-notours.tmp", b"user file");

    let config = config_for(&[work.to_str().unwrap()]);
    let summary = pipeline::pack(&config, &CleanupRegistry::new()).unwrap();
    assert_eq!(summary.file_count, 6);

    let paths = listed_paths(&work.join("DEFAULT.VDF"));
    assert!(!paths.iter().any(|p| p.starts_with(".VDFS-XY12AB")), "{paths:?}");
    assert!(paths.contains(&"DATA\\.VDFS-NOTOURS.TMP".to_string()), "{paths:?}");
}

#[test]
fn script_mode_applies_globs_and_overlays() {
    let dir = TempDir::new().unwrap();
    mod_tree(&dir.path().join("_work"));
    touch(dir.path(), "patch/gothic.dat", b"patched");
    touch(dir.path(), "patch/extra/ou.bin", b"ou");

    fs::write(
        dir.path().join("pack.yml"),
        r#"
comment: "Scripted"
base_dir: _work
file_path: out/MOD.VDF
file_include_globs:
  - "data/textures/*"
  - "Data/Meshes"
file_exclude_globs:
  - "*.bak"
overlays:
  - dir: patch
    prefix: Data/Patch
"#,
    )
    .unwrap();

    let config = config_for(&[dir.path().join("pack.yml").to_str().unwrap()]);
    let summary = pipeline::pack(&config, &CleanupRegistry::new()).unwrap();
    assert_eq!(summary.file_count, 5);

    let archive = dir.path().join("out/MOD.VDF");
    let index = pipeline::list(&archive).unwrap();
    assert_eq!(index.header().comment_text(), "Scripted");

    let files: Vec<String> = index
        .entries()
        .into_iter()
        .filter(|e| !e.record.is_directory())
        .map(|e| e.path)
        .collect();
    assert_eq!(
        files,
        vec![
            "DATA\\MESHES\\_COMPILED\\HERO.MRM",
            "DATA\\PATCH\\EXTRA\\OU.BIN",
            "DATA\\PATCH\\GOTHIC.DAT",
            "DATA\\TEXTURES\\_COMPILED\\STONE-C.TEX",
            "DATA\\TEXTURES\\_COMPILED\\WOOD-C.TEX",
        ]
    );
}

#[test]
fn overlay_duplicate_is_fatal() {
    let dir = TempDir::new().unwrap();
    mod_tree(&dir.path().join("_work"));
    touch(dir.path(), "patch/Scripts/_compiled/GOTHIC.DAT", b"patched");

    fs::write(
        dir.path().join("pack.yml"),
        "base_dir: _work\nfile_path: MOD.VDF\nfile_include_globs: ['Data/Scripts']\n\
         overlays:\n  - dir: patch\n    prefix: data\n",
    )
    .unwrap();

    let config = config_for(&[dir.path().join("pack.yml").to_str().unwrap()]);
    let err = pipeline::pack(&config, &CleanupRegistry::new()).unwrap_err();
    assert!(
        matches!(err, PackerError::Vdfs(VdfsError::DuplicateEntry(_))),
        "unexpected error: {err}"
    );
    assert!(!dir.path().join("MOD.VDF").exists());
}

#[test]
fn resolver_keeps_walk_order() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "b/2.txt", b"");
    touch(dir.path(), "a/1.txt", b"");

    let config = config_for(&[dir.path().to_str().unwrap()]);
    let entries = InputResolver::new(&config).unwrap().resolve().unwrap();
    let paths: Vec<String> = entries.iter().map(|e| e.display_path()).collect();
    assert_eq!(paths, vec!["a", "a/1.txt", "b", "b/2.txt"]);
}

#[test]
fn list_rejects_non_archive() {
    let dir = TempDir::new().unwrap();
    let bogus = dir.path().join("BOGUS.VDF");
    fs::write(&bogus, vec![0u8; 400]).unwrap();

    let err = pipeline::list(&bogus).unwrap_err();
    assert!(matches!(
        err,
        PackerError::Vdfs(VdfsError::MalformedArchive(_))
    ));
}
