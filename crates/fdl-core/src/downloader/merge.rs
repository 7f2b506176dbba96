//! Merge fragment files into the output, in index order, at planned offsets.

use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::segmenter::FragmentPlan;
use crate::storage::{self, MergeTarget};

/// Where one fragment file goes in the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentPart {
    pub index: usize,
    pub path: PathBuf,
    /// Absolute offset in the output.
    pub offset: u64,
    /// Planned length, if known.
    pub expected_len: Option<u64>,
}

/// Outcome of a merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub bytes_written: u64,
    /// Fragments whose file could not be read; their range stays zero-filled.
    pub missing: Vec<usize>,
}

/// One part per planned fragment, located at `<output>_<index>`.
pub fn parts_for(plan: &FragmentPlan, output: &Path) -> Vec<FragmentPart> {
    plan.fragments()
        .map(|f| FragmentPart {
            index: f.index,
            path: storage::fragment_path(output, f.index),
            offset: f.start,
            expected_len: f.len(),
        })
        .collect()
}

/// Writes each part at its offset into `<output>.part`, deletes the part file,
/// then renames the temp file to `output`.
///
/// A part that cannot be read is logged and skipped. Failing to create or write
/// the output itself is an error.
pub fn merge_fragments(
    parts: &[FragmentPart],
    output: &Path,
    total_size: Option<u64>,
) -> Result<MergeReport> {
    let target = MergeTarget::create(output, total_size)?;

    let mut report = MergeReport::default();
    for part in parts {
        let data = match fs::read(&part.path) {
            Ok(data) => data,
            Err(e) => {
                tracing::error!(fragment = part.index, path = %part.path.display(), "skipping fragment: {}", e);
                report.missing.push(part.index);
                continue;
            }
        };
        let data = match part.expected_len {
            Some(expected) if data.len() as u64 != expected => {
                tracing::warn!(
                    fragment = part.index,
                    expected,
                    actual = data.len(),
                    "fragment size differs from plan"
                );
                &data[..data.len().min(expected as usize)]
            }
            _ => &data[..],
        };
        target
            .write_at(part.offset, data)
            .with_context(|| format!("write fragment {}", part.index))?;
        report.bytes_written += data.len() as u64;

        if let Err(e) = fs::remove_file(&part.path) {
            tracing::warn!(path = %part.path.display(), "could not remove fragment file: {}", e);
        }
    }

    target.commit(output)?;
    Ok(report)
}

/// Best-effort removal of every fragment file of `plan` (after a fatal failure).
pub(crate) fn remove_fragments(plan: &FragmentPlan, output: &Path) {
    for index in 0..plan.fragment_count() {
        let path = storage::fragment_path(output, index);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %path.display(), "could not remove fragment file: {}", e),
        }
    }
}
