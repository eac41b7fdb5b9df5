use std::path::PathBuf;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use cordon_protocol::ApprovalPolicy;
use cordon_protocol::SandboxMode;

/// Action-safety gate for autonomous coding agents: sandboxed command
/// execution, transactional patch application, and an append-only audit trail.
#[derive(Debug, Parser)]
#[clap(name = "cordon", version, bin_name = "cordon")]
pub struct Cli {
    /// Workspace root containing `.cordon/` (defaults to the current directory).
    #[clap(long, global = true, value_name = "DIR")]
    pub workspace: Option<PathBuf>,

    /// Emit audit events as JSON lines on stdout instead of human summaries.
    #[clap(long, global = true)]
    pub json: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Inspect or change the sandbox mode.
    Sandbox(SandboxArgs),

    /// Inspect or change the approval policy.
    Approvals(ApprovalsArgs),

    /// Run one shell command under the sandbox.
    Run(RunArgs),

    /// Apply patches to the workspace.
    Patch(PatchArgs),

    /// Replay the audit events of a recorded session.
    History(HistoryArgs),
}

#[derive(Debug, Args)]
pub struct SandboxArgs {
    #[clap(subcommand)]
    pub action: SandboxAction,
}

#[derive(Debug, Subcommand)]
pub enum SandboxAction {
    /// Print the active sandbox mode.
    Get,
    /// Persist a new sandbox mode.
    Set {
        /// One of read-only, workspace-write, danger-full-access.
        mode: SandboxMode,
    },
}

#[derive(Debug, Args)]
pub struct ApprovalsArgs {
    #[clap(subcommand)]
    pub action: ApprovalsAction,
}

#[derive(Debug, Subcommand)]
pub enum ApprovalsAction {
    /// Print the active approval policy.
    Get,
    /// Persist a new approval policy.
    Set {
        /// One of untrusted, on-failure, on-request, never.
        policy: ApprovalPolicy,
    },
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Shell command line to execute.
    pub command: String,

    /// Working directory for the command (defaults to the workspace root).
    #[clap(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Kill the command after this many milliseconds.
    #[clap(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Restrict the child environment to these variables (repeatable).
    #[clap(long = "env", value_name = "KEY")]
    pub env: Vec<String>,

    /// Skip the interactive confirmation.
    #[clap(long, short = 'y')]
    pub yes: bool,

    /// Override the configured sandbox mode for this invocation only.
    #[clap(long, value_name = "MODE")]
    pub sandbox: Option<SandboxMode>,

    /// Override the configured approval policy for this invocation only.
    #[clap(long, value_name = "POLICY")]
    pub approval: Option<ApprovalPolicy>,
}

#[derive(Debug, Args)]
pub struct PatchArgs {
    #[clap(subcommand)]
    pub action: PatchAction,
}

#[derive(Debug, Subcommand)]
pub enum PatchAction {
    /// Apply a unified diff as one transaction.
    Apply(PatchApplyArgs),
}

#[derive(Debug, Args)]
pub struct PatchApplyArgs {
    /// Read the diff from this file instead of stdin.
    #[clap(long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Skip the interactive confirmation.
    #[clap(long, short = 'y')]
    pub yes: bool,
}

#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Session to replay (defaults to the most recent one).
    pub session_id: Option<String>,
}
