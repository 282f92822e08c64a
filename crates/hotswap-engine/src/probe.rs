use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Locked,
    Unlocked,
}

impl LockState {
    pub fn is_locked(self) -> bool {
        self == Self::Locked
    }
}

pub trait LockProbe: Send + Sync {
    fn probe(&self, path: &Path) -> LockState;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ExclusiveAccessProbe;

impl LockProbe for ExclusiveAccessProbe {
    fn probe(&self, path: &Path) -> LockState {
        if path.symlink_metadata().is_err() {
            return LockState::Unlocked;
        }

        match open_exclusive(path) {
            Ok(file) => {
                drop(file);
                LockState::Unlocked
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => LockState::Unlocked,
            Err(err) => {
                tracing::debug!(path = %path.display(), "exclusive open refused: {err}");
                LockState::Locked
            }
        }
    }
}

#[cfg(windows)]
fn open_exclusive(path: &Path) -> io::Result<File> {
    use std::os::windows::fs::OpenOptionsExt;

    OpenOptions::new()
        .read(true)
        .write(true)
        .share_mode(0)
        .open(path)
}

#[cfg(not(windows))]
fn open_exclusive(path: &Path) -> io::Result<File> {
    use fs2::FileExt;

    let file = OpenOptions::new().read(true).open(path)?;
    file.try_lock_exclusive()?;
    file.unlock()?;
    Ok(file)
}
