use chrono::SecondsFormat;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use strum_macros::Display;

/// Tag for one safety-relevant action recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum EventKind {
    #[serde(rename = "approval.requested")]
    #[strum(serialize = "approval.requested")]
    ApprovalRequested,

    #[serde(rename = "approval.granted")]
    #[strum(serialize = "approval.granted")]
    ApprovalGranted,

    #[serde(rename = "approval.denied")]
    #[strum(serialize = "approval.denied")]
    ApprovalDenied,

    #[serde(rename = "patch.preview")]
    #[strum(serialize = "patch.preview")]
    PatchPreview,

    #[serde(rename = "patch.applied")]
    #[strum(serialize = "patch.applied")]
    PatchApplied,

    #[serde(rename = "patch.rollback")]
    #[strum(serialize = "patch.rollback")]
    PatchRollback,

    #[serde(rename = "exec.preview")]
    #[strum(serialize = "exec.preview")]
    ExecPreview,

    #[serde(rename = "exec.started")]
    #[strum(serialize = "exec.started")]
    ExecStarted,

    #[serde(rename = "exec.finished")]
    #[strum(serialize = "exec.finished")]
    ExecFinished,

    #[serde(rename = "sandbox.set")]
    #[strum(serialize = "sandbox.set")]
    SandboxSet,

    #[serde(rename = "approvals.set")]
    #[strum(serialize = "approvals.set")]
    ApprovalsSet,

    #[serde(rename = "validation.failed")]
    #[strum(serialize = "validation.failed")]
    ValidationFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRef {
    pub id: String,
}

/// One append-only audit record. Ordering within a session file is the only
/// guarantee consumers may rely on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub ts: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub session: SessionRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl AuditEvent {
    /// Stamp a new event with the current wall-clock time.
    pub fn new(kind: EventKind, session_id: &str, data: Option<Value>) -> Self {
        Self {
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            kind,
            session: SessionRef {
                id: session_id.to_string(),
            },
            data,
        }
    }
}
