use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};

pub const DEFAULT_STAGED_SUFFIX: &str = ".new";
pub const DEFAULT_BACKUP_SUFFIX: &str = ".old";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuffixConvention {
    staged: String,
    backup: String,
}

impl Default for SuffixConvention {
    fn default() -> Self {
        Self {
            staged: DEFAULT_STAGED_SUFFIX.to_string(),
            backup: DEFAULT_BACKUP_SUFFIX.to_string(),
        }
    }
}

impl SuffixConvention {
    pub fn new(staged: impl Into<String>, backup: impl Into<String>) -> Result<Self> {
        let staged = staged.into();
        let backup = backup.into();
        validate_suffix("staged", &staged)?;
        validate_suffix("backup", &backup)?;
        let (staged_lower, backup_lower) = (staged.to_lowercase(), backup.to_lowercase());
        if staged_lower.ends_with(&backup_lower) || backup_lower.ends_with(&staged_lower) {
            return Err(anyhow!(
                "staged and backup suffixes must differ and neither may end with the other ('{staged}', '{backup}')"
            ));
        }
        Ok(Self { staged, backup })
    }

    pub fn staged_suffix(&self) -> &str {
        &self.staged
    }

    pub fn backup_suffix(&self) -> &str {
        &self.backup
    }

    pub fn is_staged(&self, path: &Path) -> bool {
        file_name_str(path).is_some_and(|name| strip_suffix(name, &self.staged).is_some())
    }

    pub fn is_backup(&self, path: &Path) -> bool {
        file_name_str(path).is_some_and(|name| strip_suffix(name, &self.backup).is_some())
    }

    /// Strips the staged suffix once. Names that would still be staged after
    /// stripping, or that strip down to nothing, have no target.
    pub fn target_for(&self, staged_path: &Path) -> Option<PathBuf> {
        let name = file_name_str(staged_path)?;
        let stem = strip_suffix(name, &self.staged)?;
        if stem.is_empty() || strip_suffix(stem, &self.staged).is_some() {
            return None;
        }
        Some(staged_path.with_file_name(stem))
    }

    pub fn staged_path_for(&self, target: &Path) -> PathBuf {
        let mut raw = target.as_os_str().to_os_string();
        raw.push(&self.staged);
        PathBuf::from(raw)
    }
}

fn file_name_str(path: &Path) -> Option<&str> {
    path.file_name().and_then(|name| name.to_str())
}

/// Windows file names are case-insensitive, so `A.DLL.NEW` is staged there.
fn strip_suffix<'a>(name: &'a str, suffix: &str) -> Option<&'a str> {
    if cfg!(windows) {
        let split = name.len().checked_sub(suffix.len())?;
        let tail = name.get(split..)?;
        tail.eq_ignore_ascii_case(suffix).then(|| &name[..split])
    } else {
        name.strip_suffix(suffix)
    }
}

fn validate_suffix(kind: &str, suffix: &str) -> Result<()> {
    if suffix.len() < 2 || !suffix.starts_with('.') {
        return Err(anyhow!(
            "{kind} suffix must start with '.' and name an extension: '{suffix}'"
        ));
    }
    if suffix.contains(['/', '\\']) {
        return Err(anyhow!(
            "{kind} suffix must not contain path separators: '{suffix}'"
        ));
    }
    Ok(())
}
