use serde::Serialize;

use crate::FileDiff;
use crate::HunkLineKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchFilePreview {
    pub path: String,
    pub additions: usize,
    pub deletions: usize,
    pub is_new: bool,
    pub is_deleted: bool,
}

/// Derived summary of a parsed patch. Regenerated on every call, never
/// persisted; hunk consistency is the applier's job, not the preview's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchPreview {
    pub files: Vec<PatchFilePreview>,
    pub total_additions: usize,
    pub total_deletions: usize,
}

pub fn build_preview(diffs: &[FileDiff]) -> PatchPreview {
    let mut files = Vec::with_capacity(diffs.len());
    let mut total_additions = 0;
    let mut total_deletions = 0;

    for diff in diffs {
        let mut additions = 0;
        let mut deletions = 0;
        for hunk in &diff.hunks {
            for line in &hunk.lines {
                match line.kind {
                    HunkLineKind::Add => additions += 1,
                    HunkLineKind::Remove => deletions += 1,
                    HunkLineKind::Context => {}
                }
            }
        }
        total_additions += additions;
        total_deletions += deletions;
        files.push(PatchFilePreview {
            path: diff.path.clone(),
            additions,
            deletions,
            is_new: diff.is_new,
            is_deleted: diff.is_deleted,
        });
    }

    PatchPreview {
        files,
        total_additions,
        total_deletions,
    }
}
