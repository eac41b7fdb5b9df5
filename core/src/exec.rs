//! Sandboxed command runner: one shell command under approval and
//! containment constraints, with incremental output capture and a timeout.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::process::Stdio;
use std::time::Duration;
use std::time::Instant;

use cordon_protocol::ApprovalKind;
use cordon_protocol::AuditEvent;
use cordon_protocol::EventKind;
use cordon_protocol::SandboxMode;
use serde_json::json;
use tokio::io::AsyncReadExt;
use tokio::io::BufReader;
use tokio::process::Command;

use crate::CoreError;
use crate::Result;
use crate::approvals::ApprovalPrompt;
use crate::approvals::Approvals;
use crate::approvals::request_approval;
use crate::env_filter::build_env;
use crate::env_filter::process_env;
use crate::events::AuditSink;
use crate::events::emit;
use crate::sandbox::SandboxPolicy;

// I/O buffer sizing
const READ_CHUNK_SIZE: usize = 8192; // bytes per read
const AGGREGATE_BUFFER_INITIAL_CAPACITY: usize = 8 * 1024;

pub struct ExecOptions<'a> {
    pub cwd: Option<PathBuf>,
    pub timeout_ms: Option<u64>,
    pub env_allowlist: Option<Vec<String>>,
    pub auto_approve: bool,
    pub sandbox: &'a SandboxPolicy,
    pub approvals: &'a Approvals,
    pub prompt: &'a dyn ApprovalPrompt,
    pub sink: &'a dyn AuditSink,
    pub session_id: &'a str,
}

/// Outcome of one runner invocation. `ran` is false only when approval was
/// denied; every other terminating case sets it true, success or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecResult {
    pub ran: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    pub timed_out: bool,
}

impl ExecResult {
    fn denied() -> Self {
        Self {
            ran: false,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: 0,
            timed_out: false,
        }
    }
}

#[cfg(unix)]
const SHELL: (&str, &str) = ("/bin/sh", "-c");
#[cfg(windows)]
const SHELL: (&str, &str) = ("cmd", "/C");

/// Execute one shell command under sandbox and approval constraints.
///
/// Ordinary command failure (a non-zero exit) resolves `Ok`; only policy
/// violations and spawn-level failures are errors. Audit events are emitted
/// in the fixed order preview → started → finished.
pub async fn run_command(command: &str, mut opts: ExecOptions<'_>) -> Result<ExecResult> {
    let cwd = opts
        .cwd
        .take()
        .unwrap_or_else(|| opts.sandbox.workspace_root().to_path_buf());

    emit(
        opts.sink,
        AuditEvent::new(
            EventKind::ExecPreview,
            opts.session_id,
            Some(json!({
                "command": command,
                "cwd": cwd,
                "timeout_ms": opts.timeout_ms,
                "env_allowlist": opts.env_allowlist,
            })),
        ),
    )
    .await;

    // Read-only mode always forces a confirmation; the grant doubles as the
    // exec override below.
    let requires_approval = opts.approvals.needs_approval(ApprovalKind::Exec)
        || opts.sandbox.mode() == SandboxMode::ReadOnly;

    let mut approved = opts.auto_approve;
    if requires_approval && !approved {
        let timeout_label = opts
            .timeout_ms
            .map_or_else(|| "default".to_string(), |ms| ms.to_string());
        let message = format!(
            "Execute command: \"{command}\"? cwd={} timeout={timeout_label}",
            cwd.display()
        );
        let confirmed = request_approval(opts.prompt, opts.auto_approve, &message).await?;
        if !confirmed {
            return Ok(ExecResult::denied());
        }
        approved = true;
    }

    // Re-validate containment even after approval: the grant lifts only the
    // read-only block, never the path check.
    opts.sandbox.assert_exec_allowed(&cwd, approved)?;

    let filtered_env = opts
        .env_allowlist
        .as_deref()
        .map(|allowlist| build_env(allowlist, &process_env()));

    emit(
        opts.sink,
        AuditEvent::new(
            EventKind::ExecStarted,
            opts.session_id,
            Some(json!({ "command": command, "cwd": cwd })),
        ),
    )
    .await;

    let start = Instant::now();
    let spawned = spawn_shell(command, &cwd, filtered_env.as_ref());
    let mut child = match spawned {
        Ok(child) => child,
        Err(err) => {
            emit(
                opts.sink,
                AuditEvent::new(
                    EventKind::ExecFinished,
                    opts.session_id,
                    Some(json!({
                        "command": command,
                        "cwd": cwd,
                        "code": Option::<i32>::None,
                        "duration_ms": 0,
                        "timed_out": false,
                        "error": err.to_string(),
                    })),
                ),
            )
            .await;
            return Err(CoreError::Spawn(err));
        }
    };

    let capture = consume_output(
        &mut child,
        opts.timeout_ms.map(Duration::from_millis),
    )
    .await;
    let duration_ms = start.elapsed().as_millis() as u64;

    match capture {
        Ok(captured) => {
            let result = ExecResult {
                ran: true,
                exit_code: captured.exit_status.code(),
                stdout: String::from_utf8_lossy(&captured.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&captured.stderr).into_owned(),
                duration_ms,
                timed_out: captured.timed_out,
            };
            emit(
                opts.sink,
                AuditEvent::new(
                    EventKind::ExecFinished,
                    opts.session_id,
                    Some(json!({
                        "command": command,
                        "cwd": cwd,
                        "code": result.exit_code,
                        "duration_ms": result.duration_ms,
                        "timed_out": result.timed_out,
                    })),
                ),
            )
            .await;
            Ok(result)
        }
        Err(err) => {
            emit(
                opts.sink,
                AuditEvent::new(
                    EventKind::ExecFinished,
                    opts.session_id,
                    Some(json!({
                        "command": command,
                        "cwd": cwd,
                        "code": Option::<i32>::None,
                        "duration_ms": duration_ms,
                        "timed_out": false,
                        "error": err.to_string(),
                    })),
                ),
            )
            .await;
            Err(err)
        }
    }
}

fn spawn_shell(
    command: &str,
    cwd: &std::path::Path,
    env: Option<&HashMap<String, String>>,
) -> std::io::Result<tokio::process::Child> {
    let (shell, flag) = SHELL;
    let mut cmd = Command::new(shell);
    cmd.arg(flag)
        .arg(command)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(env) = env {
        cmd.env_clear().envs(env);
    }
    cmd.spawn()
}

struct CapturedOutput {
    exit_status: ExitStatus,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    timed_out: bool,
}

/// Drive the child, its two pipes, and the optional timeout concurrently.
/// On expiry the child is killed but its pipes are still drained, so output
/// flushed before termination is preserved in the result.
async fn consume_output(
    child: &mut tokio::process::Child,
    timeout: Option<Duration>,
) -> Result<CapturedOutput> {
    let stdout_pipe = child
        .stdout
        .take()
        .ok_or_else(|| CoreError::Io(std::io::Error::other("stdout pipe unavailable")))?;
    let stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| CoreError::Io(std::io::Error::other("stderr pipe unavailable")))?;

    let mut stdout_reader = BufReader::new(stdout_pipe);
    let mut stderr_reader = BufReader::new(stderr_pipe);

    let mut out_stdout: Vec<u8> = Vec::with_capacity(AGGREGATE_BUFFER_INITIAL_CAPACITY);
    let mut out_stderr: Vec<u8> = Vec::with_capacity(AGGREGATE_BUFFER_INITIAL_CAPACITY);
    let mut tmp_stdout = [0u8; READ_CHUNK_SIZE];
    let mut tmp_stderr = [0u8; READ_CHUNK_SIZE];

    let mut stdout_open = true;
    let mut stderr_open = true;
    let mut timed_out = false;
    let mut exit_status: Option<ExitStatus> = None;

    let timeout_fut = async {
        match timeout {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(timeout_fut);

    while stdout_open || stderr_open || exit_status.is_none() {
        tokio::select! {
            _ = &mut timeout_fut, if !timed_out && exit_status.is_none() => {
                timed_out = true;
                let _ = child.start_kill();
            }

            res = child.wait(), if exit_status.is_none() => {
                exit_status = Some(res.map_err(CoreError::Io)?);
            }

            read = stdout_reader.read(&mut tmp_stdout), if stdout_open => {
                match read {
                    Ok(0) => stdout_open = false,
                    Ok(n) => out_stdout.extend_from_slice(&tmp_stdout[..n]),
                    Err(e) => return Err(CoreError::Io(e)),
                }
            }

            read = stderr_reader.read(&mut tmp_stderr), if stderr_open => {
                match read {
                    Ok(0) => stderr_open = false,
                    Ok(n) => out_stderr.extend_from_slice(&tmp_stderr[..n]),
                    Err(e) => return Err(CoreError::Io(e)),
                }
            }
        }
    }

    let exit_status =
        exit_status.ok_or_else(|| CoreError::Io(std::io::Error::other("missing exit status")))?;

    Ok(CapturedOutput {
        exit_status,
        stdout: out_stdout,
        stderr: out_stderr,
        timed_out,
    })
}
