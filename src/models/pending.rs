use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeSet;

/// Directories created by archive expansion that still have to be recompressed.
///
/// Owned by a single pipeline run: it only grows during expansion and is drained during
/// collapse. Anything left at the end of a run is an archive that was not rebuilt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingArchiveSet {
    dirs: BTreeSet<Utf8PathBuf>,
}

impl PendingArchiveSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a directory; returns false if it was already pending
    pub fn insert(&mut self, dir: Utf8PathBuf) -> bool {
        self.dirs.insert(dir)
    }

    pub fn remove(&mut self, dir: &Utf8Path) -> bool {
        self.dirs.remove(dir)
    }

    pub fn contains(&self, dir: &Utf8Path) -> bool {
        self.dirs.contains(dir)
    }

    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Utf8PathBuf> {
        self.dirs.iter()
    }

    pub fn to_vec(&self) -> Vec<Utf8PathBuf> {
        self.dirs.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_remove() {
        let mut pending = PendingArchiveSet::new();
        assert!(pending.is_empty());

        assert!(pending.insert(Utf8PathBuf::from("/t/b")));
        assert!(pending.insert(Utf8PathBuf::from("/t/a")));
        assert!(!pending.insert(Utf8PathBuf::from("/t/a")));
        assert_eq!(pending.len(), 2);
        assert!(pending.contains(Utf8Path::new("/t/a")));

        assert!(pending.remove(Utf8Path::new("/t/a")));
        assert!(!pending.remove(Utf8Path::new("/t/a")));
        assert_eq!(pending.to_vec(), vec![Utf8PathBuf::from("/t/b")]);
    }
}
