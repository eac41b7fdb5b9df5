//! Approval gating: the policy deciding *whether* to ask, and the prompt
//! that does the asking.

use std::io;

use async_trait::async_trait;
use cordon_protocol::ApprovalKind;
use cordon_protocol::ApprovalPolicy;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;

/// Holder for the active approval policy. The value is replaced wholesale by
/// `set_policy`, never mutated in place.
#[derive(Debug, Clone, Copy)]
pub struct Approvals {
    policy: ApprovalPolicy,
}

impl Approvals {
    pub fn new(policy: ApprovalPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ApprovalPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: ApprovalPolicy) {
        self.policy = policy;
    }

    /// Total mapping from (policy, kind) to requires-confirmation. `kind` is
    /// currently unused but kept so the mapping can evolve without touching
    /// call sites; `on-request` and `on-failure` defer confirmation to
    /// workflow stages outside this core and so answer false here.
    pub fn needs_approval(&self, _kind: ApprovalKind) -> bool {
        match self.policy {
            ApprovalPolicy::Never => false,
            ApprovalPolicy::Untrusted => true,
            ApprovalPolicy::OnRequest => false,
            ApprovalPolicy::OnFailure => false,
        }
    }
}

/// Seam for the single side-effecting approval primitive, so orchestrators
/// can be exercised without a controlling terminal.
#[async_trait]
pub trait ApprovalPrompt: Send + Sync {
    async fn confirm(&self, message: &str) -> io::Result<bool>;
}

/// Interactive yes/no question on stdin/stdout. Case-insensitive `y`/`yes`
/// approves; anything else, including an empty line or end-of-input, denies.
#[derive(Debug, Default)]
pub struct TerminalPrompt;

#[async_trait]
impl ApprovalPrompt for TerminalPrompt {
    async fn confirm(&self, message: &str) -> io::Result<bool> {
        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(format!("{message} [y/N] ").as_bytes())
            .await?;
        stdout.flush().await?;

        // stdin is held only for this one read; the reader is dropped on
        // every exit path, error included.
        let mut reader = BufReader::new(tokio::io::stdin());
        let mut answer = String::new();
        let read = reader.read_line(&mut answer).await?;
        if read == 0 {
            return Ok(false);
        }
        let normalized = answer.trim().to_ascii_lowercase();
        Ok(normalized == "y" || normalized == "yes")
    }
}

/// Fixed-answer prompt for auto-approve paths and tests.
#[derive(Debug, Clone, Copy)]
pub struct StaticPrompt {
    answer: bool,
}

impl StaticPrompt {
    pub fn new(answer: bool) -> Self {
        Self { answer }
    }
}

#[async_trait]
impl ApprovalPrompt for StaticPrompt {
    async fn confirm(&self, _message: &str) -> io::Result<bool> {
        Ok(self.answer)
    }
}

/// Ask the operator, unless `auto_yes` short-circuits the interaction.
pub async fn request_approval(
    prompt: &dyn ApprovalPrompt,
    auto_yes: bool,
    message: &str,
) -> io::Result<bool> {
    if auto_yes {
        return Ok(true);
    }
    prompt.confirm(message).await
}
