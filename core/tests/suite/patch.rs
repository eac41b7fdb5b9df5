use anyhow::Result;
use cordon_core::CoreError;
use cordon_core::approvals::Approvals;
use cordon_core::approvals::StaticPrompt;
use cordon_core::patch::ApplyOptions;
use cordon_core::patch::apply_patch;
use cordon_core::sandbox::SandboxConfig;
use cordon_core::sandbox::SandboxPolicy;
use cordon_apply_patch::PatchError;
use cordon_protocol::ApprovalPolicy;
use cordon_protocol::EventKind;
use cordon_protocol::SandboxMode;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use crate::suite::RecordingSink;

fn policy(mode: SandboxMode, workspace: &TempDir) -> SandboxPolicy {
    SandboxPolicy::new(SandboxConfig {
        mode,
        workspace_root: workspace.path().to_path_buf(),
        writable_roots: Vec::new(),
        allow_restricted_network: false,
        allowed_domain_suffix: None,
    })
}

fn options<'a>(
    sandbox: &'a SandboxPolicy,
    approvals: &'a Approvals,
    prompt: &'a StaticPrompt,
    sink: &'a RecordingSink,
) -> ApplyOptions<'a> {
    ApplyOptions {
        auto_approve: false,
        sandbox,
        approvals,
        prompt,
        sink,
        session_id: "test-session",
    }
}

#[tokio::test]
async fn modifies_a_file_and_keeps_a_backup() -> Result<()> {
    let workspace = TempDir::new()?;
    let target = workspace.path().join("greeting.txt");
    tokio::fs::write(&target, "hello\nworld\n").await?;

    let sandbox = policy(SandboxMode::WorkspaceWrite, &workspace);
    let approvals = Approvals::new(ApprovalPolicy::Never);
    let prompt = StaticPrompt::new(true);
    let sink = RecordingSink::default();

    let patch = "--- a/greeting.txt\n\
                 +++ b/greeting.txt\n\
                 @@ -1,2 +1,2 @@\n \
                 hello\n\
                 -world\n\
                 +there\n";
    let result = apply_patch(patch, options(&sandbox, &approvals, &prompt, &sink)).await?;

    assert!(result.applied);
    assert_eq!(result.changed, vec![target.clone()]);
    assert_eq!(tokio::fs::read_to_string(&target).await?, "hello\nthere\n");

    let backup_dir = result.backup_dir.expect("backup dir recorded");
    let backup = backup_dir.join("greeting.txt");
    assert_eq!(tokio::fs::read_to_string(&backup).await?, "hello\nworld\n");

    assert_eq!(
        sink.kinds(),
        vec![EventKind::PatchPreview, EventKind::PatchApplied]
    );
    Ok(())
}

#[tokio::test]
async fn creates_a_new_file_with_trailing_newline() -> Result<()> {
    let workspace = TempDir::new()?;
    let sandbox = policy(SandboxMode::WorkspaceWrite, &workspace);
    let approvals = Approvals::new(ApprovalPolicy::Never);
    let prompt = StaticPrompt::new(true);
    let sink = RecordingSink::default();

    let patch = "--- /dev/null\n\
                 +++ b/hello.txt\n\
                 @@ -0,0 +1 @@\n\
                 +hello\n";
    let result = apply_patch(patch, options(&sandbox, &approvals, &prompt, &sink)).await?;

    assert!(result.applied);
    let created = workspace.path().join("hello.txt");
    assert_eq!(tokio::fs::read_to_string(&created).await?, "hello\n");
    // Even with nothing to snapshot the backup directory is materialized.
    let backup_dir = result.backup_dir.expect("backup dir recorded");
    assert!(backup_dir.is_dir());
    Ok(())
}

#[tokio::test]
async fn targets_under_a_writable_root_are_backed_up() -> Result<()> {
    let workspace = TempDir::new()?;
    let outside = TempDir::new()?;
    let target = outside.path().join("data.txt");
    tokio::fs::write(&target, "before\n").await?;

    let sandbox = SandboxPolicy::new(SandboxConfig {
        mode: SandboxMode::WorkspaceWrite,
        workspace_root: workspace.path().to_path_buf(),
        writable_roots: vec![outside.path().to_path_buf()],
        allow_restricted_network: false,
        allowed_domain_suffix: None,
    });
    let approvals = Approvals::new(ApprovalPolicy::Never);
    let prompt = StaticPrompt::new(true);
    let sink = RecordingSink::default();

    let patch = format!(
        "--- a/{target}\n\
         +++ b/{target}\n\
         @@ -1 +1 @@\n\
         -before\n\
         +after\n",
        target = target.display()
    );
    let result = apply_patch(&patch, options(&sandbox, &approvals, &prompt, &sink)).await?;

    assert!(result.applied);
    assert_eq!(tokio::fs::read_to_string(&target).await?, "after\n");

    // The absolute target is flattened to its normal components, so the
    // snapshot lands inside the backup directory rather than on top of the
    // target itself.
    let backup_dir = result.backup_dir.expect("backup dir recorded");
    let flattened: std::path::PathBuf = target
        .components()
        .filter(|component| matches!(component, std::path::Component::Normal(_)))
        .collect();
    assert_eq!(
        tokio::fs::read_to_string(backup_dir.join(flattened)).await?,
        "before\n"
    );
    Ok(())
}

#[tokio::test]
async fn deletes_a_file() -> Result<()> {
    let workspace = TempDir::new()?;
    let target = workspace.path().join("doomed.txt");
    tokio::fs::write(&target, "gone\n").await?;

    let sandbox = policy(SandboxMode::WorkspaceWrite, &workspace);
    let approvals = Approvals::new(ApprovalPolicy::Never);
    let prompt = StaticPrompt::new(true);
    let sink = RecordingSink::default();

    let patch = "--- a/doomed.txt\n\
                 +++ /dev/null\n\
                 @@ -1 +0,0 @@\n\
                 -gone\n";
    let result = apply_patch(patch, options(&sandbox, &approvals, &prompt, &sink)).await?;

    assert!(result.applied);
    assert!(!target.exists());
    Ok(())
}

#[tokio::test]
async fn rolls_back_every_change_on_mid_patch_failure() -> Result<()> {
    let workspace = TempDir::new()?;
    let existing = workspace.path().join("existing.txt");
    tokio::fs::write(&existing, "original\n").await?;

    let sandbox = policy(SandboxMode::WorkspaceWrite, &workspace);
    let approvals = Approvals::new(ApprovalPolicy::Never);
    let prompt = StaticPrompt::new(true);
    let sink = RecordingSink::default();

    // The first file applies cleanly; the second fails on stale context.
    let patch = "--- /dev/null\n\
                 +++ b/created.txt\n\
                 @@ -0,0 +1 @@\n\
                 +fresh\n\
                 --- a/existing.txt\n\
                 +++ b/existing.txt\n\
                 @@ -1 +1 @@\n\
                 -stale\n\
                 +updated\n";
    let err = apply_patch(patch, options(&sandbox, &approvals, &prompt, &sink))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CoreError::Patch(PatchError::RemovalMismatch { .. })
    ));
    // The created file is removed and the survivor is untouched.
    assert!(!workspace.path().join("created.txt").exists());
    assert_eq!(tokio::fs::read_to_string(&existing).await?, "original\n");
    assert_eq!(
        sink.kinds(),
        vec![EventKind::PatchPreview, EventKind::PatchRollback]
    );
    Ok(())
}

#[tokio::test]
async fn rejects_targets_outside_the_workspace_before_writing() -> Result<()> {
    let workspace = TempDir::new()?;
    let outside = TempDir::new()?;
    let inside = workspace.path().join("inside.txt");
    tokio::fs::write(&inside, "safe\n").await?;
    let escape = outside.path().join("escape.txt");

    let sandbox = policy(SandboxMode::WorkspaceWrite, &workspace);
    let approvals = Approvals::new(ApprovalPolicy::Never);
    let prompt = StaticPrompt::new(true);
    let sink = RecordingSink::default();

    // One valid target and one absolute path escaping the workspace; the
    // whole patch must be refused with nothing written.
    let patch = format!(
        "--- a/inside.txt\n\
         +++ b/inside.txt\n\
         @@ -1 +1 @@\n\
         -safe\n\
         +changed\n\
         --- /dev/null\n\
         +++ b/{escape}\n\
         @@ -0,0 +1 @@\n\
         +bad\n",
        escape = escape.display()
    );
    let err = apply_patch(&patch, options(&sandbox, &approvals, &prompt, &sink))
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::Sandbox(_)));
    assert_eq!(tokio::fs::read_to_string(&inside).await?, "safe\n");
    assert!(!escape.exists());
    Ok(())
}

#[tokio::test]
async fn parent_components_in_diff_paths_cannot_escape() -> Result<()> {
    let workspace = TempDir::new()?;
    let inner = workspace.path().join("inner");
    tokio::fs::create_dir_all(&inner).await?;

    let sandbox = SandboxPolicy::new(SandboxConfig {
        mode: SandboxMode::WorkspaceWrite,
        workspace_root: inner.clone(),
        writable_roots: Vec::new(),
        allow_restricted_network: false,
        allowed_domain_suffix: None,
    });
    let approvals = Approvals::new(ApprovalPolicy::Never);
    let prompt = StaticPrompt::new(true);
    let sink = RecordingSink::default();

    let patch = "--- /dev/null\n\
                 +++ b/../escaped.txt\n\
                 @@ -0,0 +1 @@\n\
                 +pwned\n";
    let err = apply_patch(
        patch,
        ApplyOptions {
            auto_approve: false,
            sandbox: &sandbox,
            approvals: &approvals,
            prompt: &prompt,
            sink: &sink,
            session_id: "test-session",
        },
    )
    .await
    .unwrap_err();

    assert!(matches!(err, CoreError::Sandbox(_)));
    assert!(!workspace.path().join("escaped.txt").exists());
    Ok(())
}

#[tokio::test]
async fn read_only_mode_refuses_all_writes() -> Result<()> {
    let workspace = TempDir::new()?;
    let sandbox = policy(SandboxMode::ReadOnly, &workspace);
    let approvals = Approvals::new(ApprovalPolicy::Never);
    let prompt = StaticPrompt::new(true);
    let sink = RecordingSink::default();

    let patch = "--- /dev/null\n\
                 +++ b/new.txt\n\
                 @@ -0,0 +1 @@\n\
                 +nope\n";
    let err = apply_patch(patch, options(&sandbox, &approvals, &prompt, &sink))
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::Sandbox(_)));
    assert!(!workspace.path().join("new.txt").exists());
    Ok(())
}

#[tokio::test]
async fn untrusted_denial_leaves_the_tree_untouched() -> Result<()> {
    let workspace = TempDir::new()?;
    let target = workspace.path().join("guarded.txt");
    tokio::fs::write(&target, "before\n").await?;

    let sandbox = policy(SandboxMode::WorkspaceWrite, &workspace);
    let approvals = Approvals::new(ApprovalPolicy::Untrusted);
    let prompt = StaticPrompt::new(false);
    let sink = RecordingSink::default();

    let patch = "--- a/guarded.txt\n\
                 +++ b/guarded.txt\n\
                 @@ -1 +1 @@\n\
                 -before\n\
                 +after\n";
    let result = apply_patch(patch, options(&sandbox, &approvals, &prompt, &sink)).await?;

    assert!(!result.applied);
    assert!(result.changed.is_empty());
    assert_eq!(result.preview.files.len(), 1);
    assert_eq!(result.backup_dir, None);
    assert_eq!(tokio::fs::read_to_string(&target).await?, "before\n");
    assert_eq!(
        sink.kinds(),
        vec![
            EventKind::PatchPreview,
            EventKind::ApprovalRequested,
            EventKind::ApprovalDenied,
        ]
    );
    Ok(())
}

#[tokio::test]
async fn single_approval_covers_a_multi_file_patch() -> Result<()> {
    let workspace = TempDir::new()?;
    let first = workspace.path().join("one.txt");
    let second = workspace.path().join("two.txt");
    tokio::fs::write(&first, "a\n").await?;
    tokio::fs::write(&second, "b\n").await?;

    let sandbox = policy(SandboxMode::WorkspaceWrite, &workspace);
    let approvals = Approvals::new(ApprovalPolicy::Untrusted);
    let prompt = StaticPrompt::new(true);
    let sink = RecordingSink::default();

    let patch = "--- a/one.txt\n\
                 +++ b/one.txt\n\
                 @@ -1 +1 @@\n\
                 -a\n\
                 +A\n\
                 --- a/two.txt\n\
                 +++ b/two.txt\n\
                 @@ -1 +1 @@\n\
                 -b\n\
                 +B\n";
    let result = apply_patch(patch, options(&sandbox, &approvals, &prompt, &sink)).await?;

    assert!(result.applied);
    assert_eq!(tokio::fs::read_to_string(&first).await?, "A\n");
    assert_eq!(tokio::fs::read_to_string(&second).await?, "B\n");
    assert_eq!(
        sink.kinds(),
        vec![
            EventKind::PatchPreview,
            EventKind::ApprovalRequested,
            EventKind::ApprovalGranted,
            EventKind::PatchApplied,
        ]
    );
    Ok(())
}
