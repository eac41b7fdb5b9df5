//! Pure unified-diff engine: parse diff text into per-file hunk sets, count
//! changes for previews, and replay hunks against known file content.
//!
//! This crate never touches the filesystem and knows nothing about sandbox
//! or approval policy. Hunk replay fails closed: context or removal lines
//! that do not match the original content exactly abort the file rather than
//! guessing an alignment.

mod parser;
mod preview;

pub use parser::parse_unified_diff;
pub use preview::PatchFilePreview;
pub use preview::PatchPreview;
pub use preview::build_preview;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatchError {
    #[error("invalid hunk header: {0}")]
    InvalidHunkHeader(String),
    #[error("found hunk header before file header")]
    HunkBeforeFileHeader,
    #[error("found hunk body line before file header")]
    BodyBeforeFileHeader,
    #[error("unable to determine file path from diff headers")]
    MissingFilePath,
    #[error("context mismatch while applying patch for {path}")]
    ContextMismatch { path: String },
    #[error("removal mismatch while applying patch for {path}")]
    RemovalMismatch { path: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HunkLineKind {
    Context,
    Add,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HunkLine {
    pub kind: HunkLineKind,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub old_start: usize,
    pub old_lines: usize,
    pub new_start: usize,
    pub new_lines: usize,
    pub lines: Vec<HunkLine>,
}

/// One file section of a unified diff. Hunks are ordered by ascending
/// `old_start`; `is_new` and `is_deleted` are never both true.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    pub path: String,
    pub hunks: Vec<Hunk>,
    pub is_new: bool,
    pub is_deleted: bool,
}

/// Replay a file's hunks against its original content.
///
/// Returns the reconstructed content, or `None` when the diff deletes the
/// file. `original` is `None` for files that do not exist yet. New files are
/// written newline-terminated: diff body lines each describe one full line.
pub fn apply_file_diff(
    diff: &FileDiff,
    original: Option<&str>,
) -> Result<Option<String>, PatchError> {
    let original_lines: Vec<&str> = match original {
        Some(content) => content.split('\n').collect(),
        None => Vec::new(),
    };
    let mut result_lines: Vec<&str> = Vec::new();
    // 0-based index of the next original line not yet consumed.
    let mut cursor: usize = 0;

    for hunk in &diff.hunks {
        let copy_until = hunk.old_start.saturating_sub(1);
        while cursor < copy_until && cursor < original_lines.len() {
            result_lines.push(original_lines[cursor]);
            cursor += 1;
        }

        let mut original_index = hunk.old_start.saturating_sub(1);
        for line in &hunk.lines {
            match line.kind {
                HunkLineKind::Context => {
                    let expected = original_lines.get(original_index).copied().unwrap_or("");
                    if expected != line.text {
                        return Err(PatchError::ContextMismatch {
                            path: diff.path.clone(),
                        });
                    }
                    result_lines.push(expected);
                    original_index += 1;
                }
                HunkLineKind::Remove => {
                    let expected = original_lines.get(original_index).copied().unwrap_or("");
                    if expected != line.text {
                        return Err(PatchError::RemovalMismatch {
                            path: diff.path.clone(),
                        });
                    }
                    original_index += 1;
                }
                HunkLineKind::Add => {
                    result_lines.push(&line.text);
                }
            }
        }

        cursor = original_index;
    }

    while cursor < original_lines.len() {
        result_lines.push(original_lines[cursor]);
        cursor += 1;
    }

    if diff.is_deleted {
        return Ok(None);
    }

    let mut content = result_lines.join("\n");
    if diff.is_new && !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    Ok(Some(content))
}
