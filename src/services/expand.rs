use super::{ItemResult, SkipReason, StageContext, StageReport, walk};
use crate::models::{PendingArchiveSet, PipelineStage};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::io;
use thiserror::Error;
use zip::ZipArchive;
use zip::result::ZipError;

/// File extension recognised as an archive (case-sensitive, without the dot)
pub const ARCHIVE_EXTENSION: &str = "zip";

#[derive(Error, Debug)]
enum ExtractError {
    #[error("{0}")]
    Unreadable(io::Error),

    #[error("{0}")]
    Corrupt(#[from] ZipError),

    #[error("{0}")]
    Io(#[from] io::Error),
}

/// Expands every archive under a root into a same-named directory.
///
/// `a/b/pack.zip` becomes the directory `a/b/pack`; the archive itself is deleted and the
/// directory is recorded in the [`PendingArchiveSet`] so the collapse stage can rebuild it.
#[derive(Debug, Clone, Default)]
pub struct ArchiveExpander;

impl ArchiveExpander {
    pub fn new() -> Self {
        Self
    }

    /// Whether a path names an archive this stage handles
    pub fn is_archive(path: &Utf8Path) -> bool {
        path.extension() == Some(ARCHIVE_EXTENSION)
    }

    /// Directory an archive expands into (the archive path without its extension)
    pub fn target_dir(archive: &Utf8Path) -> Utf8PathBuf {
        archive.with_extension("")
    }

    /// Snapshot of all archives under `root`, taken before anything is extracted
    pub fn discover(&self, root: &Utf8Path) -> Vec<Utf8PathBuf> {
        walk::collect_files(root, Self::is_archive)
    }

    /// Expand every archive under `root`.
    ///
    /// Content extracted during this walk is not walked again, so archives nested inside
    /// archives stay packed.
    pub fn expand_all(
        &self,
        root: &Utf8Path,
        pending: &mut PendingArchiveSet,
        ctx: &StageContext<'_>,
    ) -> StageReport {
        let archives = self.discover(root);
        tracing::info!("Found {} archives under {}", archives.len(), root);

        ctx.process_items(PipelineStage::Expanding, archives, |archive| {
            self.expand_archive(&archive, pending)
        })
    }

    /// Expand a single archive and delete it.
    pub fn expand_archive(
        &self,
        archive: &Utf8Path,
        pending: &mut PendingArchiveSet,
    ) -> ItemResult {
        self.expand_archive_with(archive, pending, |path| fs::remove_file(path))
    }

    fn expand_archive_with<R>(
        &self,
        archive: &Utf8Path,
        pending: &mut PendingArchiveSet,
        remove_archive: R,
    ) -> ItemResult
    where
        R: FnOnce(&Utf8Path) -> io::Result<()>,
    {
        let target = Self::target_dir(archive);

        if target.exists() {
            return ItemResult::skipped(archive, SkipReason::TargetExists(target));
        }

        let count = match extract_zip(archive, &target) {
            Ok(count) => count,
            Err(e) => {
                remove_partial_extraction(&target);
                return match e {
                    ExtractError::Unreadable(e) => ItemResult {
                        message: format!("Unreadable zip file: {}", archive),
                        ..ItemResult::skipped(archive, SkipReason::CorruptArchive(e.to_string()))
                    },
                    ExtractError::Corrupt(e) => ItemResult {
                        message: format!("Bad zip file: {}", archive),
                        ..ItemResult::skipped(archive, SkipReason::CorruptArchive(e.to_string()))
                    },
                    ExtractError::Io(e) => {
                        ItemResult::failed(archive, format!("Error extracting {}: {}", archive, e))
                    }
                };
            }
        };

        // Extraction succeeded, so the directory has to be collapsed later either way
        pending.insert(target);

        match remove_archive(archive) {
            Ok(()) => ItemResult::processed(
                archive,
                format!("Unzipped {} ({} files)", archive, count),
            ),
            Err(e) => ItemResult::processed_with_error(
                archive,
                e.to_string(),
                format!("Unzipped {} but could not remove it: {}", archive, e),
            ),
        }
    }
}

/// Extract every entry of a ZIP archive below `dest`, returning the number of files written.
fn extract_zip(archive_path: &Utf8Path, dest: &Utf8Path) -> Result<usize, ExtractError> {
    let file = fs::File::open(archive_path).map_err(ExtractError::Unreadable)?;
    let mut archive = ZipArchive::new(file)?;

    fs::create_dir_all(dest)?;

    let mut count = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;

        let entry_path = match entry.enclosed_name() {
            Some(p) => p,
            None => {
                tracing::warn!(
                    "Skipping unsafe entry {:?} in {}",
                    entry.name(),
                    archive_path
                );
                continue;
            }
        };

        let output_path = dest.as_std_path().join(&entry_path);

        if entry.is_dir() {
            fs::create_dir_all(&output_path)?;
        } else {
            if let Some(parent) = output_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut outfile = fs::File::create(&output_path)?;
            io::copy(&mut entry, &mut outfile)?;
            count += 1;
        }
    }

    Ok(count)
}

fn remove_partial_extraction(target: &Utf8Path) {
    if target.exists() {
        if let Err(e) = fs::remove_dir_all(target) {
            tracing::warn!("Failed to clean up partial extraction {}: {}", target, e);
        }
    }
}
