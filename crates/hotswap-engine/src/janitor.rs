use std::io;
use std::path::Path;

use hotswap_core::SuffixConvention;

use crate::fs_utils::{clear_readonly, remove_file_if_exists};
use crate::log::UpdateLog;
use crate::scan::scan_backups;

pub fn sweep_backups(root: &Path, convention: &SuffixConvention, log: &UpdateLog) -> usize {
    sweep_backups_with(root, convention, log, remove_backup)
}

pub fn sweep_backups_with<Remove>(
    root: &Path,
    convention: &SuffixConvention,
    log: &UpdateLog,
    mut remove: Remove,
) -> usize
where
    Remove: FnMut(&Path) -> io::Result<()>,
{
    let mut removed = 0;
    for path in scan_backups(root, convention) {
        match remove(&path) {
            Ok(()) => removed += 1,
            Err(err) => {
                tracing::debug!(path = %path.display(), "leaving backup in place: {err}");
            }
        }
    }
    if removed > 0 {
        log.info(format!(
            "removed {removed} backup file(s) under {}",
            root.display()
        ));
    }
    removed
}

fn remove_backup(path: &Path) -> io::Result<()> {
    clear_readonly(path)?;
    remove_file_if_exists(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn removes_backups_recursively_and_leaves_other_files() {
        let dir = tempfile::tempdir().expect("must create temp dir");
        let root = dir.path();
        fs::create_dir_all(root.join("lib")).expect("must create dirs");
        fs::write(root.join("A.dll.old"), b"").expect("write");
        fs::write(root.join("lib/B.dll.old"), b"").expect("write");
        fs::write(root.join("A.dll"), b"").expect("write");
        fs::write(root.join("C.dll.new"), b"").expect("write");

        let removed = sweep_backups(root, &SuffixConvention::default(), &UpdateLog::disabled());

        assert_eq!(removed, 2);
        assert!(!root.join("A.dll.old").exists());
        assert!(!root.join("lib/B.dll.old").exists());
        assert!(root.join("A.dll").exists());
        assert!(root.join("C.dll.new").exists());
    }

    #[test]
    fn stuck_backup_does_not_block_the_rest() {
        let dir = tempfile::tempdir().expect("must create temp dir");
        let root = dir.path();
        for name in ["a.old", "b.old", "c.old"] {
            fs::write(root.join(name), b"").expect("write");
        }
        let stuck = root.join("b.old");

        let removed = sweep_backups_with(
            root,
            &SuffixConvention::default(),
            &UpdateLog::disabled(),
            |path| {
                if path == stuck {
                    return Err(io::Error::new(io::ErrorKind::PermissionDenied, "in use"));
                }
                remove_backup(path)
            },
        );

        assert_eq!(removed, 2);
        assert!(!root.join("a.old").exists());
        assert!(stuck.exists());
        assert!(!root.join("c.old").exists());
    }

    #[test]
    fn missing_root_removes_nothing() {
        let dir = tempfile::tempdir().expect("must create temp dir");
        let removed = sweep_backups(
            &dir.path().join("absent"),
            &SuffixConvention::default(),
            &UpdateLog::disabled(),
        );
        assert_eq!(removed, 0);
    }
}
