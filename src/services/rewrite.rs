use super::{ItemResult, SkipReason, StageContext, StageReport, walk};
use crate::models::{PipelineStage, TextSubstitutions};
use camino::Utf8Path;
use std::fs;
use std::io;

/// Applies literal text substitutions to every text file under a root.
///
/// Substitutions run in configured order, each exactly once over the whole content, so a
/// later substitution sees the output of the earlier ones. There is no fixed-point loop.
#[derive(Debug, Clone, Default)]
pub struct ContentRewriter {
    substitutions: TextSubstitutions,
}

impl ContentRewriter {
    pub fn new(substitutions: TextSubstitutions) -> Self {
        Self { substitutions }
    }

    /// Apply all substitutions to `content` and return the result.
    ///
    /// Empty search strings are ignored.
    pub fn apply(&self, content: &str) -> String {
        self.substitutions
            .iter()
            .filter(|(old, _)| !old.is_empty())
            .fold(content.to_string(), |text, (old, new)| {
                if text.contains(old.as_str()) {
                    text.replace(old.as_str(), new)
                } else {
                    text
                }
            })
    }

    pub fn rewrite_all(&self, root: &Utf8Path, ctx: &StageContext<'_>) -> StageReport {
        let files = walk::collect_files(root, |_| true);
        tracing::info!(
            "Applying {} substitutions to {} files under {}",
            self.substitutions.len(),
            files.len(),
            root
        );

        ctx.process_items(PipelineStage::Rewriting, files, |file| {
            self.rewrite_file(&file)
        })
    }

    /// Rewrite one file in place.
    ///
    /// Binary (non UTF-8) and permission-denied files are skipped; the file is only written
    /// back when the content actually changed.
    pub fn rewrite_file(&self, path: &Utf8Path) -> ItemResult {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                return ItemResult::skipped(path, SkipReason::PermissionDenied);
            }
            Err(e) => {
                return ItemResult::failed(path, format!("Error processing file {}: {}", path, e));
            }
        };

        let content = match String::from_utf8(bytes) {
            Ok(content) => content,
            Err(_) => return ItemResult::skipped(path, SkipReason::NotText),
        };

        let updated = self.apply(&content);
        if updated == content {
            return ItemResult::unchanged(path);
        }

        match fs::write(path, updated) {
            Ok(()) => ItemResult::processed(path, format!("Processed file: {}", path)),
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                ItemResult::skipped(path, SkipReason::PermissionDenied)
            }
            Err(e) => ItemResult::failed(path, format!("Error processing file {}: {}", path, e)),
        }
    }
}
