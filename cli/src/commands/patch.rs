use std::path::Path;

use cordon_apply_patch::PatchError;
use cordon_core::CoreError;
use cordon_core::approvals::Approvals;
use cordon_core::approvals::TerminalPrompt;
use cordon_core::events::emit;
use cordon_core::patch::ApplyOptions;
use cordon_core::patch::apply_patch;
use cordon_core::sandbox::SandboxPolicy;
use cordon_protocol::AuditEvent;
use cordon_protocol::EventKind;
use serde_json::json;
use tokio::io::AsyncReadExt;

use crate::EXIT_FAILURE;
use crate::EXIT_VALIDATION;
use crate::cli::PatchAction;
use crate::cli::PatchArgs;
use crate::commands::audit_sink;
use crate::commands::new_session_id;
use crate::config::ConfigFile;

pub async fn run(args: PatchArgs, workspace_root: &Path, json: bool) -> anyhow::Result<u8> {
    let PatchAction::Apply(args) = args.action;

    let patch_text = match &args.file {
        Some(path) => tokio::fs::read_to_string(path).await?,
        None => {
            let mut buffer = String::new();
            tokio::io::stdin().read_to_string(&mut buffer).await?;
            buffer
        }
    };
    let config = ConfigFile::load(workspace_root).await?;
    let sandbox = SandboxPolicy::new(config.sandbox_config(workspace_root));
    let approvals = Approvals::new(config.approvals.policy);
    let prompt = TerminalPrompt;
    let session_id = new_session_id();
    let sink = audit_sink(workspace_root, &session_id, json);

    if patch_text.trim().is_empty() {
        emit(
            &sink,
            AuditEvent::new(
                EventKind::ValidationFailed,
                &session_id,
                Some(json!({ "reason": "empty patch input" })),
            ),
        )
        .await;
        eprintln!("cordon: empty patch input");
        return Ok(EXIT_VALIDATION);
    }

    let opts = ApplyOptions {
        auto_approve: args.yes,
        sandbox: &sandbox,
        approvals: &approvals,
        prompt: &prompt,
        sink: &sink,
        session_id: &session_id,
    };

    match apply_patch(&patch_text, opts).await {
        Ok(result) if !result.applied => {
            eprintln!("cordon: patch was not approved");
            Ok(EXIT_FAILURE)
        }
        Ok(result) => {
            if !json {
                println!("applied {} file(s)", result.changed.len());
                for path in &result.changed {
                    println!("  {}", path.display());
                }
            }
            Ok(0)
        }
        // A diff the parser rejects never touched the tree; that is caller
        // input error, unlike an apply or containment failure.
        Err(CoreError::Patch(err)) if is_parse_error(&err) => {
            eprintln!("cordon: invalid patch: {err}");
            Ok(EXIT_VALIDATION)
        }
        Err(err) => {
            eprintln!("cordon: {err}");
            Ok(EXIT_FAILURE)
        }
    }
}

fn is_parse_error(err: &PatchError) -> bool {
    matches!(
        err,
        PatchError::InvalidHunkHeader(_)
            | PatchError::HunkBeforeFileHeader
            | PatchError::BodyBeforeFileHeader
            | PatchError::MissingFilePath
    )
}
