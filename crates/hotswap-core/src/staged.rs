use std::path::{Path, PathBuf};

use crate::naming::SuffixConvention;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StagedFile {
    pub staged_path: PathBuf,
    pub target_path: PathBuf,
}

impl StagedFile {
    pub fn from_staged_path(path: impl Into<PathBuf>, convention: &SuffixConvention) -> Option<Self> {
        let staged_path = path.into();
        let target_path = convention.target_for(&staged_path)?;
        Some(Self {
            staged_path,
            target_path,
        })
    }

    pub fn display_name(&self) -> String {
        self.target_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.target_path.display().to_string())
    }

    pub fn target_exists(&self) -> bool {
        path_exists(&self.target_path)
    }

    pub fn staged_exists(&self) -> bool {
        path_exists(&self.staged_path)
    }
}

fn path_exists(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}
