use camino::{Utf8Path, Utf8PathBuf};
use walkdir::WalkDir;

/// Collect every regular file under `root` that passes `filter`.
///
/// The walk is taken as a snapshot before any stage mutates the tree, in file-name order so
/// runs are reproducible. Symlinks are not followed. Unreadable entries and non-UTF-8 paths
/// are logged and left out.
pub fn collect_files<F>(root: &Utf8Path, mut filter: F) -> Vec<Utf8PathBuf>
where
    F: FnMut(&Utf8Path) -> bool,
{
    let mut files = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping unreadable entry under {}: {}", root, e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let path = match Utf8PathBuf::from_path_buf(entry.into_path()) {
            Ok(path) => path,
            Err(raw) => {
                tracing::warn!("Skipping non UTF-8 path: {}", raw.display());
                continue;
            }
        };

        if filter(&path) {
            files.push(path);
        }
    }

    files
}
