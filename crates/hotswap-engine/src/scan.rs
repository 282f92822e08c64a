use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use hotswap_core::{StagedFile, SuffixConvention};
use walkdir::WalkDir;

pub fn scan_staged(root: &Path, convention: &SuffixConvention) -> Result<Vec<StagedFile>> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let mut staged = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry =
            entry.with_context(|| format!("failed to scan staged files in {}", root.display()))?;
        if !entry.file_type().is_file() || !convention.is_staged(entry.path()) {
            continue;
        }

        match StagedFile::from_staged_path(entry.path(), convention) {
            Some(file) => staged.push(file),
            None => tracing::warn!(
                path = %entry.path().display(),
                "ignoring staged file without a valid target name"
            ),
        }
    }
    Ok(staged)
}

pub fn scan_backups(root: &Path, convention: &SuffixConvention) -> Vec<PathBuf> {
    if !root.exists() {
        return Vec::new();
    }

    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::debug!("skipping unreadable entry during backup scan: {err}");
                None
            }
        })
        .filter(|entry| !entry.file_type().is_dir() && convention.is_backup(entry.path()))
        .map(|entry| entry.into_path())
        .collect()
}
