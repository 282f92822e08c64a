use std::fs;

use anyhow::{Context, Result};
use hotswap_core::StagedFile;

use crate::fs_utils::{clear_readonly, path_exists};

pub fn swap_now(file: &StagedFile) -> Result<()> {
    let target = &file.target_path;
    if path_exists(target) {
        clear_readonly(target)
            .with_context(|| format!("failed to clear read-only flag: {}", target.display()))?;
        fs::remove_file(target)
            .with_context(|| format!("failed to remove old file: {}", target.display()))?;
    }

    fs::rename(&file.staged_path, target).with_context(|| {
        format!(
            "failed to move {} into place at {}",
            file.staged_path.display(),
            target.display()
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hotswap_core::SuffixConvention;
    use std::path::Path;

    fn staged(path: &Path) -> StagedFile {
        StagedFile::from_staged_path(path, &SuffixConvention::default()).expect("staged name")
    }

    #[test]
    fn replaces_existing_target() {
        let dir = tempfile::tempdir().expect("must create temp dir");
        fs::write(dir.path().join("A.dll"), b"old").expect("write");
        fs::write(dir.path().join("A.dll.new"), b"new").expect("write");

        let file = staged(&dir.path().join("A.dll.new"));
        swap_now(&file).expect("swap must succeed");

        assert_eq!(fs::read(&file.target_path).expect("read"), b"new");
        assert!(!file.staged_exists());
    }

    #[test]
    fn installs_when_target_is_missing() {
        let dir = tempfile::tempdir().expect("must create temp dir");
        fs::write(dir.path().join("fresh.bin.new"), b"new").expect("write");

        let file = staged(&dir.path().join("fresh.bin.new"));
        swap_now(&file).expect("swap must succeed");
        assert_eq!(fs::read(&file.target_path).expect("read"), b"new");
    }

    #[test]
    fn replaces_read_only_target() {
        let dir = tempfile::tempdir().expect("must create temp dir");
        let target = dir.path().join("ro.dll");
        fs::write(&target, b"old").expect("write");
        let mut permissions = fs::metadata(&target).expect("metadata").permissions();
        permissions.set_readonly(true);
        fs::set_permissions(&target, permissions).expect("must set read-only");
        fs::write(dir.path().join("ro.dll.new"), b"new").expect("write");

        swap_now(&staged(&dir.path().join("ro.dll.new"))).expect("swap must succeed");
        assert_eq!(fs::read(&target).expect("read"), b"new");
    }

    #[test]
    fn reports_failure_and_keeps_staged_file() {
        let dir = tempfile::tempdir().expect("must create temp dir");
        let target = dir.path().join("busy.dll");
        fs::create_dir_all(target.join("inner")).expect("directory blocks removal");
        fs::write(dir.path().join("busy.dll.new"), b"new").expect("write");

        let file = staged(&dir.path().join("busy.dll.new"));
        let err = swap_now(&file).expect_err("directory target cannot be removed as a file");
        assert!(
            err.to_string().contains("failed to remove old file"),
            "unexpected error: {err}"
        );
        assert!(file.staged_exists());
    }
}
