//! Disk I/O and file lifecycle.
//!
//! Fragment files live next to the output as `<output>_<index>`. The merge
//! writes them into a [`MergeTarget`] (`<output>.part`, reserved with
//! fallocate on Unix or set_len otherwise) which is renamed into place.

mod target;

pub use target::MergeTarget;

use std::path::{Path, PathBuf};

/// Path for the merge temp file: appends `.part` to the output path.
pub fn temp_path(output: &Path) -> PathBuf {
    let mut o = output.as_os_str().to_owned();
    o.push(".part");
    PathBuf::from(o)
}

/// Path of fragment file `index` for `output`: `<output>_<index>`.
pub fn fragment_path(output: &Path, index: usize) -> PathBuf {
    let mut o = output.as_os_str().to_owned();
    o.push(format!("_{index}"));
    PathBuf::from(o)
}
