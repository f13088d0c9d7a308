use super::{ItemResult, StageContext, StageReport, walk};
use crate::models::{FileSubstitutions, PipelineStage};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::io;
use thiserror::Error;

/// Prefix of the temporary sibling a replacement is staged in
const STAGING_PREFIX: &str = ".bulkpatch-swap-";

#[derive(Error, Debug)]
enum SwapError {
    #[error("target has no parent directory")]
    NoParent,

    #[error("failed to copy replacement {from}: {error}")]
    Copy { from: Utf8PathBuf, error: io::Error },

    #[error("failed to remove original: {0}")]
    RemoveOriginal(io::Error),

    #[error("failed to move replacement into place: {0}")]
    Rename(io::Error),
}

/// Replaces files whose name matches a configured key with a copy of the replacement file.
#[derive(Debug, Clone, Default)]
pub struct FileSwapper {
    replacements: FileSubstitutions,
}

impl FileSwapper {
    pub fn new(replacements: FileSubstitutions) -> Self {
        Self { replacements }
    }

    /// Snapshot of (target, replacement source) pairs under `root`
    pub fn discover(&self, root: &Utf8Path) -> Vec<(Utf8PathBuf, Utf8PathBuf)> {
        if self.replacements.is_empty() {
            return Vec::new();
        }

        walk::collect_files(root, |path| {
            path.file_name()
                .is_some_and(|name| self.replacements.contains_key(name))
        })
        .into_iter()
        .filter_map(|target| {
            let source = self.replacements.get(target.file_name()?)?.clone();
            Some((target, source))
        })
        .collect()
    }

    pub fn swap_all(&self, root: &Utf8Path, ctx: &StageContext<'_>) -> StageReport {
        let matches = self.discover(root);
        tracing::info!(
            "Found {} files matching {} replacement rules under {}",
            matches.len(),
            self.replacements.len(),
            root
        );

        ctx.process_items(PipelineStage::Swapping, matches, |(target, source)| {
            Self::swap_file(&target, &source)
        })
    }

    /// Replace `target` with a copy of `source`.
    ///
    /// The copy is fully written to a temporary sibling before the original is removed, so a
    /// failing copy leaves the original untouched. The temporary file never outlives this call.
    pub fn swap_file(target: &Utf8Path, source: &Utf8Path) -> ItemResult {
        match copy_then_swap(target, source) {
            Ok(()) => ItemResult::processed(
                target,
                format!("Replaced file {} with {}", target, source),
            ),
            Err(e) => ItemResult::failed(target, format!("Error replacing file {}: {}", target, e)),
        }
    }
}

fn copy_then_swap(target: &Utf8Path, source: &Utf8Path) -> Result<(), SwapError> {
    let dir = target.parent().ok_or(SwapError::NoParent)?;
    let copy_err = |error: io::Error| SwapError::Copy {
        from: source.to_path_buf(),
        error,
    };

    let mut staged = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempfile_in(dir)
        .map_err(copy_err)?;

    let mut src = fs::File::open(source).map_err(copy_err)?;
    io::copy(&mut src, staged.as_file_mut()).map_err(copy_err)?;
    staged.as_file().sync_all().map_err(copy_err)?;

    let permissions = src.metadata().map_err(copy_err)?.permissions();
    fs::set_permissions(staged.path(), permissions).map_err(copy_err)?;

    fs::remove_file(target).map_err(SwapError::RemoveOriginal)?;

    // On failure the PersistError hands the temp file back; dropping it deletes it
    staged
        .persist(target)
        .map_err(|e| SwapError::Rename(e.error))?;

    Ok(())
}
