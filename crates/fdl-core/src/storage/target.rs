//! The merge target: `<output>.part`, sized up front and renamed when complete.

use anyhow::{Context, Result};
use std::fs::File;
use std::path::{Path, PathBuf};

/// Temp file the merger writes fragments into at their planned offsets.
pub struct MergeTarget {
    file: File,
    temp: PathBuf,
}

impl MergeTarget {
    /// Create (or truncate) `<output>.part` and reserve `size` bytes when known.
    pub fn create(output: &Path, size: Option<u64>) -> Result<Self> {
        let temp = super::temp_path(output);
        let file = File::options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp)
            .with_context(|| format!("create output: {}", temp.display()))?;
        if let Some(size) = size.filter(|&n| n > 0) {
            reserve(&file, size).with_context(|| format!("reserve {size} bytes for {}", temp.display()))?;
        }
        Ok(Self { file, temp })
    }

    /// Positioned write; fragments may arrive in any order.
    pub fn write_at(&self, offset: u64, data: &[u8]) -> Result<()> {
        write_all_at(&self.file, offset, data)
            .with_context(|| format!("write {} bytes at {offset} to {}", data.len(), self.temp.display()))
    }

    /// Flush to disk and move the temp file onto `output`.
    pub fn commit(self, output: &Path) -> Result<()> {
        let MergeTarget { file, temp } = self;
        file.sync_all().context("sync merged output")?;
        drop(file);
        std::fs::rename(&temp, output)
            .with_context(|| format!("rename {} to {}", temp.display(), output.display()))
    }
}

#[cfg(unix)]
fn reserve(file: &File, size: u64) -> std::io::Result<()> {
    use std::os::unix::io::AsRawFd;
    let r = unsafe { libc::posix_fallocate(file.as_raw_fd(), 0, size as libc::off_t) };
    if r != 0 {
        tracing::debug!(errno = r, "posix_fallocate unavailable, extending with set_len");
        return file.set_len(size);
    }
    Ok(())
}

#[cfg(not(unix))]
fn reserve(file: &File, size: u64) -> std::io::Result<()> {
    file.set_len(size)
}

#[cfg(unix)]
fn write_all_at(file: &File, offset: u64, data: &[u8]) -> std::io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.write_all_at(data, offset)
}

#[cfg(not(unix))]
fn write_all_at(mut file: &File, offset: u64, data: &[u8]) -> std::io::Result<()> {
    use std::io::{Seek, SeekFrom, Write};
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(data)
}
