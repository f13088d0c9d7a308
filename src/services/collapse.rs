use super::{ItemResult, StageContext, StageReport};
use crate::models::{PendingArchiveSet, PipelineStage};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::io;
use std::path::Path;
use walkdir::WalkDir;
use zip::result::ZipResult;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Entries at or above this size need ZIP64 extensions
const ZIP64_THRESHOLD: u64 = u32::MAX as u64;

/// Recompresses expanded directories into `<dir>.zip` and removes the directories.
#[derive(Debug, Clone, Default)]
pub struct ArchiveCollapser;

impl ArchiveCollapser {
    pub fn new() -> Self {
        Self
    }

    /// Archive path a directory collapses into
    pub fn archive_path(dir: &Utf8Path) -> Utf8PathBuf {
        Utf8PathBuf::from(format!("{}.zip", dir))
    }

    /// Collapse every pending directory.
    ///
    /// Successfully collapsed directories are removed from `pending`; failures stay in it so
    /// the caller can report them.
    pub fn collapse_all(
        &self,
        pending: &mut PendingArchiveSet,
        ctx: &StageContext<'_>,
    ) -> StageReport {
        let dirs = pending.to_vec();
        tracing::info!("Recompressing {} expanded directories", dirs.len());

        ctx.process_items(PipelineStage::Collapsing, dirs, |dir| {
            let result = self.collapse_directory(&dir);
            if result.is_processed() {
                pending.remove(&dir);
            }
            result
        })
    }

    /// Zip `dir` into `<dir>.zip`, then delete the directory.
    ///
    /// If the archive cannot be written the partial archive is removed and the directory is
    /// left in place.
    pub fn collapse_directory(&self, dir: &Utf8Path) -> ItemResult {
        let zip_path = Self::archive_path(dir);

        if !dir.is_dir() {
            return ItemResult::failed(
                dir,
                format!("Expanded directory no longer exists: {}", dir),
            );
        }

        if let Err(e) = write_zip(dir, &zip_path) {
            if zip_path.is_file() {
                if let Err(rm) = fs::remove_file(&zip_path) {
                    tracing::warn!("Failed to remove partial archive {}: {}", zip_path, rm);
                }
            }
            return ItemResult::failed(
                dir,
                format!("Error creating zip file {}: {}", zip_path, e),
            );
        }

        match fs::remove_dir_all(dir) {
            Ok(()) => ItemResult::processed(dir, format!("Created zip file {}", zip_path)),
            Err(e) => ItemResult::processed_with_error(
                dir,
                e.to_string(),
                format!(
                    "Created zip file {} but could not remove {}: {}",
                    zip_path, dir, e
                ),
            ),
        }
    }
}

/// Write every file below `dir` into a new Deflate archive at `zip_path`.
///
/// Any walk error aborts the write: the directory is deleted afterwards, so an archive with
/// missing entries would lose data.
fn write_zip(dir: &Utf8Path, zip_path: &Utf8Path) -> ZipResult<usize> {
    let file = fs::File::create(zip_path)?;
    let mut writer = ZipWriter::new(file);
    let base = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut count = 0;
    for entry in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        let path = entry.path();

        if path == dir.as_std_path() {
            continue;
        }

        let relative = path
            .strip_prefix(dir.as_std_path())
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let name = entry_name(relative)?;

        if entry.file_type().is_dir() {
            // Only empty directories need their own entry
            if fs::read_dir(path)?.next().is_none() {
                writer.add_directory(name, base)?;
            }
            continue;
        }

        // Symlinks to files are stored by content, like any other file
        if !path.is_file() {
            tracing::warn!("Not archiving special file {}", path.display());
            continue;
        }

        let size = fs::metadata(path)?.len();
        writer.start_file(name, base.large_file(size >= ZIP64_THRESHOLD))?;
        let mut src = fs::File::open(path)?;
        io::copy(&mut src, &mut writer)?;
        count += 1;
    }

    writer.finish()?;
    Ok(count)
}

/// Archive entry name: components of the relative path joined with `/`
fn entry_name(relative: &Path) -> io::Result<String> {
    let parts = relative
        .components()
        .map(|c| {
            c.as_os_str().to_str().ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("non UTF-8 path: {}", relative.display()),
                )
            })
        })
        .collect::<io::Result<Vec<&str>>>()?;

    Ok(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{NoopObserver, StopSignal};
    use crate::services::ItemStatus;
    use std::io::Read;
    use tempfile::TempDir;
    use zip::ZipArchive;

    fn utf8_root(temp_dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap()
    }

    fn read_entries(zip_path: &Utf8Path) -> Vec<(String, String, CompressionMethod)> {
        let mut archive = ZipArchive::new(fs::File::open(zip_path).unwrap()).unwrap();
        let mut entries = Vec::new();
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).unwrap();
            let mut content = String::new();
            if entry.is_file() {
                entry.read_to_string(&mut content).unwrap();
            }
            entries.push((entry.name().to_string(), content, entry.compression()));
        }
        entries
    }

    #[test]
    fn test_archive_path() {
        assert_eq!(
            ArchiveCollapser::archive_path(Utf8Path::new("/data/pack")),
            Utf8PathBuf::from("/data/pack.zip")
        );
    }

    #[test]
    fn test_collapse_directory_writes_relative_deflated_entries() {
        let temp_dir = TempDir::new().unwrap();
        let root = utf8_root(&temp_dir);
        let dir = root.join("a");
        fs::create_dir_all(dir.join("sub")).unwrap();
        fs::create_dir_all(dir.join("empty")).unwrap();
        fs::write(dir.join("readme.txt"), "NEWTOKEN").unwrap();
        fs::write(dir.join("sub/data.txt"), "data").unwrap();

        let result = ArchiveCollapser::new().collapse_directory(&dir);

        assert_eq!(result.status, ItemStatus::Processed);
        assert!(!dir.exists());

        let entries = read_entries(&root.join("a.zip"));
        let names: Vec<&str> = entries.iter().map(|(n, _, _)| n.as_str()).collect();
        assert_eq!(names, vec!["empty/", "readme.txt", "sub/data.txt"]);
        assert_eq!(entries[1].1, "NEWTOKEN");
        assert_eq!(entries[1].2, CompressionMethod::Deflated);
    }

    #[test]
    fn test_missing_directory_fails() {
        let temp_dir = TempDir::new().unwrap();
        let dir = utf8_root(&temp_dir).join("vanished");

        let result = ArchiveCollapser::new().collapse_directory(&dir);
        assert!(result.is_failed());
    }

    #[test]
    fn test_collapse_all_drains_successes_and_keeps_failures() {
        let temp_dir = TempDir::new().unwrap();
        let root = utf8_root(&temp_dir);
        fs::create_dir(root.join("good")).unwrap();
        fs::write(root.join("good/f.txt"), "f").unwrap();

        let mut pending = PendingArchiveSet::new();
        pending.insert(root.join("good"));
        pending.insert(root.join("missing"));

        let stop = StopSignal::never();
        let observer = NoopObserver;
        let ctx = StageContext::new(&stop, &observer);
        let report = ArchiveCollapser::new().collapse_all(&mut pending, &ctx);

        assert_eq!(report.processed(), 1);
        assert_eq!(report.failed(), 1);
        assert!(root.join("good.zip").exists());
        assert_eq!(pending.to_vec(), vec![root.join("missing")]);
    }

    #[test]
    fn test_unwritable_archive_path_keeps_directory_pending() {
        let temp_dir = TempDir::new().unwrap();
        let root = utf8_root(&temp_dir);
        fs::create_dir(root.join("d")).unwrap();
        fs::write(root.join("d/f.txt"), "f").unwrap();
        fs::create_dir(root.join("d.zip")).unwrap();

        let mut pending = PendingArchiveSet::new();
        pending.insert(root.join("d"));

        let stop = StopSignal::never();
        let observer = NoopObserver;
        let ctx = StageContext::new(&stop, &observer);
        let report = ArchiveCollapser::new().collapse_all(&mut pending, &ctx);

        assert_eq!(report.failed(), 1);
        assert_eq!(report.processed(), 0);
        assert_eq!(fs::read_to_string(root.join("d/f.txt")).unwrap(), "f");
        assert!(root.join("d.zip").is_dir());
        assert_eq!(pending.to_vec(), vec![root.join("d")]);
    }
}
