use std::sync::LazyLock;

use regex::Regex;

use crate::FileDiff;
use crate::Hunk;
use crate::HunkLine;
use crate::HunkLineKind;
use crate::PatchError;

static HUNK_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").expect("hunk header regex compiles")
});

const NO_NEWLINE_MARKER: &str = "\\ No newline at end of file";

fn parse_hunk_header(header: &str) -> Result<(usize, usize, usize, usize), PatchError> {
    let captures = HUNK_HEADER
        .captures(header)
        .ok_or_else(|| PatchError::InvalidHunkHeader(header.to_string()))?;
    let number = |idx: usize, default: usize| -> usize {
        captures
            .get(idx)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(default)
    };
    Ok((number(1, 1), number(2, 1), number(3, 1), number(4, 1)))
}

/// Strip the conventional `a/` / `b/` prefixes git puts on header paths.
fn sanitize_path(raw: &str) -> &str {
    raw.strip_prefix("a/")
        .or_else(|| raw.strip_prefix("b/"))
        .unwrap_or(raw)
}

#[derive(Default)]
struct PendingHeader {
    old_path: Option<String>,
    new_path: Option<String>,
}

fn flush(files: &mut Vec<FileDiff>, current: &mut Option<FileDiff>) {
    if let Some(mut file) = current.take() {
        // Agents commonly emit creation diffs with literal a/ and b/ paths
        // instead of /dev/null; an empty old range marks those as new too.
        if !file.is_new
            && !file.is_deleted
            && file.hunks.len() == 1
            && file.hunks[0].old_start == 0
            && file.hunks[0].old_lines == 0
        {
            file.is_new = true;
        }
        files.push(file);
    }
}

/// Parse one diff document into an ordered list of per-file hunk sets.
///
/// Recognizes `diff --git` section boundaries, `---`/`+++` path headers
/// (`/dev/null` signals creation or deletion), `@@` hunk headers, and
/// `+`/`-`/space body lines. A bare blank line inside a hunk is an empty
/// context line; the "no newline at end of file" marker is ignored. The
/// final pending section is flushed at end of input.
pub fn parse_unified_diff(input: &str) -> Result<Vec<FileDiff>, PatchError> {
    let normalized = input.replace("\r\n", "\n");
    let mut files: Vec<FileDiff> = Vec::new();
    let mut current: Option<FileDiff> = None;
    let mut pending: Option<PendingHeader> = None;

    for line in normalized.split('\n') {
        if line.starts_with("diff --git") {
            flush(&mut files, &mut current);
            pending = None;
            continue;
        }

        if let Some(raw) = line.strip_prefix("--- ") {
            let header = pending.get_or_insert_with(PendingHeader::default);
            let raw = raw.trim();
            header.old_path = (raw != "/dev/null").then(|| sanitize_path(raw).to_string());
            continue;
        }

        if let Some(raw) = line.strip_prefix("+++ ") {
            let header = pending.get_or_insert_with(PendingHeader::default);
            let raw = raw.trim();
            header.new_path = (raw != "/dev/null").then(|| sanitize_path(raw).to_string());
            let path = header
                .new_path
                .clone()
                .or_else(|| header.old_path.clone())
                .ok_or(PatchError::MissingFilePath)?;
            let is_new = header.old_path.is_none() && header.new_path.is_some();
            let is_deleted = header.new_path.is_none() && header.old_path.is_some();
            flush(&mut files, &mut current);
            current = Some(FileDiff {
                path,
                hunks: Vec::new(),
                is_new,
                is_deleted,
            });
            continue;
        }

        if line.starts_with("@@") {
            let Some(file) = current.as_mut() else {
                return Err(PatchError::HunkBeforeFileHeader);
            };
            let (old_start, old_lines, new_start, new_lines) = parse_hunk_header(line)?;
            file.hunks.push(Hunk {
                old_start,
                old_lines,
                new_start,
                new_lines,
                lines: Vec::new(),
            });
            continue;
        }

        let Some(file) = current.as_mut() else {
            if line.starts_with(['+', '-']) || (line.starts_with(' ') && !line.trim().is_empty()) {
                return Err(PatchError::BodyBeforeFileHeader);
            }
            continue;
        };

        // Lines between the +++ header and the first @@ (index, mode, ...)
        // carry no hunk content.
        let Some(hunk) = file.hunks.last_mut() else {
            continue;
        };

        if line.starts_with(NO_NEWLINE_MARKER) {
            continue;
        }

        let (kind, text) = if let Some(rest) = line.strip_prefix('+') {
            (HunkLineKind::Add, rest)
        } else if let Some(rest) = line.strip_prefix('-') {
            (HunkLineKind::Remove, rest)
        } else if let Some(rest) = line.strip_prefix(' ') {
            (HunkLineKind::Context, rest)
        } else if line.trim().is_empty() {
            (HunkLineKind::Context, "")
        } else {
            continue;
        };
        hunk.lines.push(HunkLine {
            kind,
            text: text.to_string(),
        });
    }

    flush(&mut files, &mut current);
    Ok(files)
}
