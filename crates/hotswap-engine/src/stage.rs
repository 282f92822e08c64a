use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use hotswap_core::SuffixConvention;
use uuid::Uuid;

use crate::fs_utils::{clear_readonly, remove_file_if_exists};

pub fn stage_file(source: &Path, target: &Path, convention: &SuffixConvention) -> Result<PathBuf> {
    stage_file_with(source, target, convention, |from, to| fs::copy(from, to))
}

pub fn stage_file_with<CopyFn>(
    source: &Path,
    target: &Path,
    convention: &SuffixConvention,
    mut copy: CopyFn,
) -> Result<PathBuf>
where
    CopyFn: FnMut(&Path, &Path) -> io::Result<u64>,
{
    if !source.is_file() {
        return Err(anyhow!("staging source is not a file: {}", source.display()));
    }
    if convention.is_staged(target) || convention.is_backup(target) {
        return Err(anyhow!(
            "staging target must be the final file name, not a staged or backup name: {}",
            target.display()
        ));
    }

    let staged_path = convention.staged_path_for(target);
    if let Some(parent) = staged_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let partial = partial_path_for(&staged_path);
    if let Err(err) = copy(source, &partial) {
        let _ = remove_file_if_exists(&partial);
        return Err(err).with_context(|| {
            format!(
                "failed to copy {} to {}",
                source.display(),
                partial.display()
            )
        });
    }

    let placed = clear_readonly(&staged_path)
        .and_then(|()| remove_file_if_exists(&staged_path))
        .and_then(|()| fs::rename(&partial, &staged_path));
    if let Err(err) = placed {
        let _ = remove_file_if_exists(&partial);
        return Err(err)
            .with_context(|| format!("failed to place staged file: {}", staged_path.display()));
    }

    Ok(staged_path)
}

fn partial_path_for(staged_path: &Path) -> PathBuf {
    let mut raw = staged_path.as_os_str().to_os_string();
    raw.push(format!(".{}.partial", Uuid::new_v4().simple()));
    PathBuf::from(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_copy_under_staged_name() {
        let dir = tempfile::tempdir().expect("must create temp dir");
        let source = dir.path().join("download.bin");
        fs::write(&source, b"v2").expect("write");
        let target = dir.path().join("app").join("A.dll");

        let staged = stage_file(&source, &target, &SuffixConvention::default())
            .expect("must stage");

        assert_eq!(staged, dir.path().join("app").join("A.dll.new"));
        assert_eq!(fs::read(&staged).expect("read"), b"v2");
        assert!(source.exists(), "source is copied, not moved");
        let leftovers = fs::read_dir(dir.path().join("app"))
            .expect("read dir")
            .count();
        assert_eq!(leftovers, 1, "no partial files remain");
    }

    #[test]
    fn restaging_replaces_older_staged_copy() {
        let dir = tempfile::tempdir().expect("must create temp dir");
        let convention = SuffixConvention::default();
        let target = dir.path().join("B.dll");
        let first = dir.path().join("first");
        let second = dir.path().join("second");
        fs::write(&first, b"v2").expect("write");
        fs::write(&second, b"v3").expect("write");

        stage_file(&first, &target, &convention).expect("first stage");
        let staged = stage_file(&second, &target, &convention).expect("second stage");
        assert_eq!(fs::read(staged).expect("read"), b"v3");
    }

    #[test]
    fn failed_copy_leaves_no_partial_file() {
        let dir = tempfile::tempdir().expect("must create temp dir");
        let source = dir.path().join("download.bin");
        fs::write(&source, b"v2").expect("write");
        let target_dir = dir.path().join("app");

        let err = stage_file_with(
            &source,
            &target_dir.join("A.dll"),
            &SuffixConvention::default(),
            |_from, to| {
                fs::write(to, b"half")?;
                Err(io::Error::other("disk full"))
            },
        )
        .expect_err("copy must fail");

        assert!(format!("{err:#}").contains("disk full"), "{err:#}");
        let leftovers = fs::read_dir(&target_dir).expect("read dir").count();
        assert_eq!(leftovers, 0, "no partial or staged file remains");
    }

    #[test]
    fn rejects_staged_target_names_and_missing_sources() {
        let dir = tempfile::tempdir().expect("must create temp dir");
        let convention = SuffixConvention::default();
        let source = dir.path().join("src");
        fs::write(&source, b"x").expect("write");

        stage_file(&source, &dir.path().join("A.dll.new"), &convention)
            .expect_err("target already carries the staged suffix");
        stage_file(&dir.path().join("absent"), &dir.path().join("A.dll"), &convention)
            .expect_err("missing source");
    }
}
