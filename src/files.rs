//! Filesystem traversal for the indexing root.
//!
//! The core never decides which files qualify on its own: this module
//! resolves the configured root into a concrete, deterministic file list
//! using exclude-then-include glob matching.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::PathBuf;
use walkdir::WalkDir;

use crate::config::IndexingConfig;

/// Walk the indexing root and return all files that pass the glob filters,
/// sorted for stable processing order.
pub fn scan_files(config: &IndexingConfig) -> Result<Vec<PathBuf>> {
    let root = &config.root;
    if !root.is_dir() {
        bail!("Indexing root does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.include_globs)?;

    let mut default_excludes = vec![
        "**/.git/**".to_string(),
        "**/*.db".to_string(),
        "**/*.db-journal".to_string(),
        "**/*.sqlite".to_string(),
        "**/*.sqlite-wal".to_string(),
        "**/*.sqlite-shm".to_string(),
    ];
    default_excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut files = Vec::new();

    let walker = WalkDir::new(root).follow_links(config.follow_symlinks);
    for entry in walker {
        // One unreadable entry (permissions, dangling symlink) must not
        // abort the whole scan.
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                eprintln!("Warning: skipping unreadable entry: {err}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy();

        if exclude_set.is_match(rel_str.as_ref()) {
            continue;
        }
        if !include_set.is_match(rel_str.as_ref()) {
            continue;
        }

        files.push(path.to_path_buf());
    }

    files.sort();
    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn config_for(root: &std::path::Path) -> IndexingConfig {
        IndexingConfig {
            root: root.to_path_buf(),
            include_globs: vec!["**/*".to_string()],
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }

    #[test]
    fn test_scan_sorted_and_filtered() {
        let tmp = tempfile::TempDir::new().unwrap();
        fs::write(tmp.path().join("b.txt"), "beta").unwrap();
        fs::write(tmp.path().join("a.txt"), "alpha").unwrap();
        fs::write(tmp.path().join("index.db"), "binary").unwrap();
        fs::create_dir_all(tmp.path().join(".git")).unwrap();
        fs::write(tmp.path().join(".git/HEAD"), "ref").unwrap();

        let files = scan_files(&config_for(tmp.path())).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn test_exclude_globs_respected() {
        let tmp = tempfile::TempDir::new().unwrap();
        fs::write(tmp.path().join("keep.md"), "keep").unwrap();
        fs::write(tmp.path().join("skip.log"), "skip").unwrap();

        let mut config = config_for(tmp.path());
        config.exclude_globs = vec!["**/*.log".to_string()];

        let files = scan_files(&config).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("keep.md"));
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_entry_skipped() {
        let tmp = tempfile::TempDir::new().unwrap();
        fs::write(tmp.path().join("good.txt"), "good").unwrap();
        std::os::unix::fs::symlink(tmp.path().join("gone"), tmp.path().join("dangling")).unwrap();

        let mut config = config_for(tmp.path());
        config.follow_symlinks = true;

        let files = scan_files(&config).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("good.txt"));
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = config_for(&tmp.path().join("nope"));
        assert!(scan_files(&config).is_err());
    }
}
