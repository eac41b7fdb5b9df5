#![cfg(unix)]

use anyhow::Result;
use cordon_core::CoreError;
use cordon_core::approvals::Approvals;
use cordon_core::approvals::StaticPrompt;
use cordon_core::exec::ExecOptions;
use cordon_core::exec::run_command;
use cordon_core::sandbox::SandboxConfig;
use cordon_core::sandbox::SandboxPolicy;
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
) -> ExecOptions<'a> {
    ExecOptions {
        cwd: None,
        timeout_ms: None,
        env_allowlist: None,
        auto_approve: false,
        sandbox,
        approvals,
        prompt,
        sink,
        session_id: "test-session",
    }
}

#[tokio::test]
async fn captures_stdout_and_exit_code() -> Result<()> {
    let workspace = TempDir::new()?;
    let sandbox = policy(SandboxMode::WorkspaceWrite, &workspace);
    let approvals = Approvals::new(ApprovalPolicy::Never);
    let prompt = StaticPrompt::new(true);
    let sink = RecordingSink::default();

    let result = run_command(
        "printf 'out'; printf 'err' >&2",
        options(&sandbox, &approvals, &prompt, &sink),
    )
    .await?;

    assert!(result.ran);
    assert_eq!(result.exit_code, Some(0));
    assert_eq!(result.stdout, "out");
    assert_eq!(result.stderr, "err");
    assert!(!result.timed_out);
    assert_eq!(
        sink.kinds(),
        vec![
            EventKind::ExecPreview,
            EventKind::ExecStarted,
            EventKind::ExecFinished,
        ]
    );
    Ok(())
}

#[tokio::test]
async fn nonzero_exit_resolves_instead_of_erroring() -> Result<()> {
    let workspace = TempDir::new()?;
    let sandbox = policy(SandboxMode::WorkspaceWrite, &workspace);
    let approvals = Approvals::new(ApprovalPolicy::Never);
    let prompt = StaticPrompt::new(true);
    let sink = RecordingSink::default();

    let result = run_command("exit 3", options(&sandbox, &approvals, &prompt, &sink)).await?;

    assert!(result.ran);
    assert_eq!(result.exit_code, Some(3));
    Ok(())
}

#[tokio::test]
async fn denial_returns_without_spawning() -> Result<()> {
    let workspace = TempDir::new()?;
    let marker = workspace.path().join("touched");
    let sandbox = policy(SandboxMode::ReadOnly, &workspace);
    let approvals = Approvals::new(ApprovalPolicy::Never);
    let prompt = StaticPrompt::new(false);
    let sink = RecordingSink::default();

    let command = format!("touch {}", marker.display());
    let result = run_command(&command, options(&sandbox, &approvals, &prompt, &sink)).await?;

    assert!(!result.ran);
    assert_eq!(result.exit_code, None);
    assert_eq!(result.stdout, "");
    assert_eq!(result.duration_ms, 0);
    assert!(!marker.exists());
    // Denied before launch: no started/finished events follow the preview.
    assert_eq!(sink.kinds(), vec![EventKind::ExecPreview]);
    Ok(())
}

#[tokio::test]
async fn approval_unblocks_read_only_mode() -> Result<()> {
    let workspace = TempDir::new()?;
    let sandbox = policy(SandboxMode::ReadOnly, &workspace);
    let approvals = Approvals::new(ApprovalPolicy::Never);
    let prompt = StaticPrompt::new(true);
    let sink = RecordingSink::default();

    let result = run_command("printf ok", options(&sandbox, &approvals, &prompt, &sink)).await?;

    assert!(result.ran);
    assert_eq!(result.stdout, "ok");
    Ok(())
}

#[tokio::test]
async fn approval_never_lifts_the_containment_check() -> Result<()> {
    let workspace = TempDir::new()?;
    let outside = TempDir::new()?;
    let sandbox = policy(SandboxMode::WorkspaceWrite, &workspace);
    let approvals = Approvals::new(ApprovalPolicy::Never);
    let prompt = StaticPrompt::new(true);
    let sink = RecordingSink::default();

    let mut opts = options(&sandbox, &approvals, &prompt, &sink);
    opts.cwd = Some(outside.path().to_path_buf());
    opts.auto_approve = true;

    let err = run_command("true", opts).await.unwrap_err();
    assert!(matches!(err, CoreError::Sandbox(_)));
    // Blocked before launch.
    assert_eq!(sink.kinds(), vec![EventKind::ExecPreview]);
    Ok(())
}

#[tokio::test]
async fn parent_components_in_cwd_cannot_escape() -> Result<()> {
    let workspace = TempDir::new()?;
    let sandbox = policy(SandboxMode::WorkspaceWrite, &workspace);
    let approvals = Approvals::new(ApprovalPolicy::Never);
    let prompt = StaticPrompt::new(true);
    let sink = RecordingSink::default();

    let mut opts = options(&sandbox, &approvals, &prompt, &sink);
    opts.cwd = Some(workspace.path().join(".."));
    opts.auto_approve = true;

    let err = run_command("true", opts).await.unwrap_err();
    assert!(matches!(err, CoreError::Sandbox(_)));
    Ok(())
}

#[tokio::test]
async fn timeout_kills_but_keeps_partial_output() -> Result<()> {
    let workspace = TempDir::new()?;
    let sandbox = policy(SandboxMode::WorkspaceWrite, &workspace);
    let approvals = Approvals::new(ApprovalPolicy::Never);
    let prompt = StaticPrompt::new(true);
    let sink = RecordingSink::default();

    let mut opts = options(&sandbox, &approvals, &prompt, &sink);
    opts.timeout_ms = Some(300);

    let result = run_command("printf early; sleep 30", opts).await?;

    assert!(result.ran);
    assert!(result.timed_out);
    assert_eq!(result.stdout, "early");
    // Killed by signal, so no ordinary exit code.
    assert_eq!(result.exit_code, None);
    assert!(result.duration_ms >= 300);
    Ok(())
}

#[tokio::test]
async fn env_allowlist_strips_unlisted_variables() -> Result<()> {
    let workspace = TempDir::new()?;
    let sandbox = policy(SandboxMode::WorkspaceWrite, &workspace);
    let approvals = Approvals::new(ApprovalPolicy::Never);
    let prompt = StaticPrompt::new(true);
    let sink = RecordingSink::default();

    let mut opts = options(&sandbox, &approvals, &prompt, &sink);
    opts.env_allowlist = Some(vec!["PATH".to_string()]);

    let result = run_command("printf '%s' \"$HOME\"", opts).await?;

    assert!(result.ran);
    assert_eq!(result.stdout, "");
    Ok(())
}

#[tokio::test]
async fn untrusted_policy_gates_every_command() -> Result<()> {
    let workspace = TempDir::new()?;
    let sandbox = policy(SandboxMode::DangerFullAccess, &workspace);
    let approvals = Approvals::new(ApprovalPolicy::Untrusted);
    let prompt = StaticPrompt::new(false);
    let sink = RecordingSink::default();

    let result = run_command("true", options(&sandbox, &approvals, &prompt, &sink)).await?;

    assert!(!result.ran);
    Ok(())
}
