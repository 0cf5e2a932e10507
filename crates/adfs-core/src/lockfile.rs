use anyhow::Context;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Exclusive per-user lock held for the lifetime of a running server, so two
/// servers never share connection state for the same profiles.
#[derive(Debug)]
pub struct ServerLock {
    path: PathBuf,
    file: File,
}

impl ServerLock {
    pub fn try_acquire(path: &Path) -> anyhow::Result<Option<Self>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("create lock directory")?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("open lock {}", path.display()))?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                file.set_len(0).context("truncate lock")?;
                file.seek(SeekFrom::Start(0)).context("rewind lock")?;
                write!(file, "{}", std::process::id()).context("record lock owner")?;
                file.flush().context("flush lock")?;
                Ok(Some(Self {
                    path: path.to_path_buf(),
                    file,
                }))
            }
            Err(err) if is_lock_held(&err) => Ok(None),
            Err(err) => Err(err).context("lock exclusively"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ServerLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Pid recorded by whichever process holds (or last held) the lock.
pub fn lock_holder_pid(path: &Path) -> Option<u32> {
    let mut contents = String::new();
    File::open(path).ok()?.read_to_string(&mut contents).ok()?;
    contents.trim().parse().ok()
}

fn is_lock_held(err: &std::io::Error) -> bool {
    if err.kind() == std::io::ErrorKind::WouldBlock {
        return true;
    }
    // ERROR_LOCK_VIOLATION on Windows
    matches!(err.raw_os_error(), Some(33))
}
