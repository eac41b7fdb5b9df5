use serde::Deserialize;
use serde::Serialize;
use strum_macros::Display;
use strum_macros::EnumString;

/// Coarse permission level governing filesystem writes and command execution
/// scope. The most restrictive mode is the default.
#[derive(
    Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SandboxMode {
    #[serde(rename = "read-only")]
    #[default]
    ReadOnly,

    #[serde(rename = "workspace-write")]
    WorkspaceWrite,

    #[serde(rename = "danger-full-access")]
    DangerFullAccess,
}

/// Rule set deciding whether a privileged action requires interactive human
/// confirmation before it runs.
#[derive(
    Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ApprovalPolicy {
    /// Every privileged action must be confirmed.
    #[default]
    Untrusted,

    /// Confirmation is deferred to a retry-after-failure workflow upstream.
    OnFailure,

    /// Confirmation is driven by an explicit upstream request signal.
    OnRequest,

    /// Never ask; the caller accepts all actions.
    Never,
}

/// The class of privileged action being gated. The current mapping does not
/// distinguish kinds, but call sites pass the right one so the policy can
/// evolve without touching them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ApprovalKind {
    Patch,
    Exec,
    Net,
}
