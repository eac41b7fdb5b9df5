//! Transactional patch application: parse, validate containment, confirm,
//! back up, apply, and roll everything back on the first failure.

use std::path::Path;
use std::path::PathBuf;

use chrono::Utc;
use cordon_apply_patch::FileDiff;
use cordon_apply_patch::PatchPreview;
use cordon_apply_patch::apply_file_diff;
use cordon_apply_patch::build_preview;
use cordon_apply_patch::parse_unified_diff;
use cordon_protocol::ApprovalKind;
use cordon_protocol::AuditEvent;
use cordon_protocol::EventKind;
use serde_json::json;
use tracing::warn;

use crate::CoreError;
use crate::Result;
use crate::approvals::ApprovalPrompt;
use crate::approvals::Approvals;
use crate::approvals::request_approval;
use crate::events::AuditSink;
use crate::events::emit;
use crate::sandbox::SandboxPolicy;

pub struct ApplyOptions<'a> {
    pub auto_approve: bool,
    pub sandbox: &'a SandboxPolicy,
    pub approvals: &'a Approvals,
    pub prompt: &'a dyn ApprovalPrompt,
    pub sink: &'a dyn AuditSink,
    pub session_id: &'a str,
}

/// Outcome of one applier invocation. `applied` is false only on approval
/// denial; every failure after that point is an error with rollback already
/// performed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyPatchResult {
    pub applied: bool,
    pub preview: PatchPreview,
    pub changed: Vec<PathBuf>,
    pub backup_dir: Option<PathBuf>,
}

/// State needed to undo one already-applied file change.
struct AppliedFile {
    target: PathBuf,
    /// Content before the change, or None when the file did not exist.
    original: Option<String>,
}

/// Apply a unified diff against the workspace as a single transaction.
///
/// All targets are containment-checked before any byte is written, the whole
/// patch needs at most one confirmation, every pre-existing target is backed
/// up before the first mutation, and a mid-apply failure restores every
/// already-touched file before the error is returned.
pub async fn apply_patch(patch_text: &str, opts: ApplyOptions<'_>) -> Result<ApplyPatchResult> {
    let diffs = parse_unified_diff(patch_text)?;
    let preview = build_preview(&diffs);

    emit(
        opts.sink,
        AuditEvent::new(
            EventKind::PatchPreview,
            opts.session_id,
            Some(serde_json::to_value(&preview).unwrap_or_default()),
        ),
    )
    .await;

    // Fail closed before touching anything: every target must be writable
    // under the current mode, or no file changes at all.
    let targets: Vec<PathBuf> = diffs
        .iter()
        .map(|diff| resolve_target(opts.sandbox.workspace_root(), &diff.path))
        .collect();
    for target in &targets {
        opts.sandbox.assert_write_allowed(target)?;
    }

    if opts.approvals.needs_approval(ApprovalKind::Patch) {
        emit(
            opts.sink,
            AuditEvent::new(
                EventKind::ApprovalRequested,
                opts.session_id,
                Some(json!({ "kind": "patch", "files": preview.files.len() })),
            ),
        )
        .await;

        let message = format!(
            "Apply patch touching {} file(s) (+{} -{})?",
            preview.files.len(),
            preview.total_additions,
            preview.total_deletions
        );
        let confirmed = request_approval(opts.prompt, opts.auto_approve, &message).await?;
        let verdict_kind = if confirmed {
            EventKind::ApprovalGranted
        } else {
            EventKind::ApprovalDenied
        };
        emit(
            opts.sink,
            AuditEvent::new(
                verdict_kind,
                opts.session_id,
                Some(json!({ "kind": "patch" })),
            ),
        )
        .await;
        if !confirmed {
            return Ok(ApplyPatchResult {
                applied: false,
                preview,
                changed: Vec::new(),
                backup_dir: None,
            });
        }
    }

    // Snapshot phase: every pre-existing target is read and backed up before
    // the first mutation, so rollback never depends on a half-done backup.
    let backup_dir = opts
        .sandbox
        .workspace_root()
        .join(".cordon")
        .join("backup")
        .join(Utc::now().timestamp_millis().to_string());
    tokio::fs::create_dir_all(&backup_dir).await?;
    let mut originals: Vec<Option<String>> = Vec::with_capacity(targets.len());
    for target in &targets {
        originals.push(
            snapshot_file(target, &backup_dir, opts.sandbox.workspace_root()).await?,
        );
    }

    // Mutation phase, in diff order.
    let mut applied: Vec<AppliedFile> = Vec::with_capacity(diffs.len());
    for ((diff, target), original) in diffs.iter().zip(&targets).zip(&originals) {
        match write_file_diff(diff, target, original.as_deref()).await {
            Ok(()) => applied.push(AppliedFile {
                target: target.clone(),
                original: original.clone(),
            }),
            Err(err) => {
                rollback(&applied).await;
                emit(
                    opts.sink,
                    AuditEvent::new(
                        EventKind::PatchRollback,
                        opts.session_id,
                        Some(json!({
                            "failed_path": diff.path,
                            "restored": applied.len(),
                            "error": err.to_string(),
                        })),
                    ),
                )
                .await;
                return Err(err);
            }
        }
    }

    emit(
        opts.sink,
        AuditEvent::new(
            EventKind::PatchApplied,
            opts.session_id,
            Some(json!({
                "files": targets,
                "backup_dir": backup_dir,
            })),
        ),
    )
    .await;

    Ok(ApplyPatchResult {
        applied: true,
        preview,
        changed: targets,
        backup_dir: Some(backup_dir),
    })
}

/// Relative diff paths are anchored at the workspace root; absolute paths are
/// taken as-is and still subject to the containment check above.
fn resolve_target(workspace_root: &Path, diff_path: &str) -> PathBuf {
    let path = Path::new(diff_path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        workspace_root.join(path)
    }
}

/// Read a target's current content and, when it exists, copy it into the
/// backup directory at the same relative path. Missing files have nothing to
/// restore; their creation is undone by deletion instead.
async fn snapshot_file(
    target: &Path,
    backup_dir: &Path,
    workspace_root: &Path,
) -> Result<Option<String>> {
    let original = match tokio::fs::read_to_string(target).await {
        Ok(content) => Some(content),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
        Err(err) => return Err(CoreError::Io(err)),
    };

    if let Some(content) = &original {
        let backup_path = backup_dir.join(backup_relative(target, workspace_root));
        if let Some(parent) = backup_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&backup_path, content).await?;
    }
    Ok(original)
}

/// Backup location for a target, always relative so it lands inside the
/// backup directory. Targets under a writable root outside the workspace are
/// flattened to their normal path components.
fn backup_relative(target: &Path, workspace_root: &Path) -> PathBuf {
    match target.strip_prefix(workspace_root) {
        Ok(relative) => relative.to_path_buf(),
        Err(_) => target
            .components()
            .filter(|component| matches!(component, std::path::Component::Normal(_)))
            .collect(),
    }
}

/// Reconstruct one file per its diff and write the result, creating parent
/// directories as needed. A deletion diff removes the file instead.
async fn write_file_diff(
    diff: &FileDiff,
    target: &Path,
    original: Option<&str>,
) -> Result<()> {
    match apply_file_diff(diff, original)? {
        Some(content) => {
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(target, content).await?;
        }
        None => {
            if original.is_some() {
                tokio::fs::remove_file(target).await?;
            }
        }
    }
    Ok(())
}

/// Restore every already-applied file to its pre-patch state. Restoration
/// failures are logged and skipped; rollback must not mask the root error.
async fn rollback(applied: &[AppliedFile]) {
    for entry in applied.iter().rev() {
        let outcome = match &entry.original {
            Some(content) => tokio::fs::write(&entry.target, content).await,
            None => match tokio::fs::remove_file(&entry.target).await {
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
                other => other,
            },
        };
        if let Err(err) = outcome {
            warn!("rollback failed for {}: {err}", entry.target.display());
        }
    }
}
