use std::path::Path;

use cordon_core::events::emit;
use cordon_protocol::AuditEvent;
use cordon_protocol::EventKind;
use serde_json::json;

use crate::cli::SandboxAction;
use crate::cli::SandboxArgs;
use crate::commands::audit_sink;
use crate::commands::new_session_id;
use crate::config::ConfigFile;

pub async fn run(args: SandboxArgs, workspace_root: &Path, json: bool) -> anyhow::Result<u8> {
    match args.action {
        SandboxAction::Get => {
            let config = ConfigFile::load(workspace_root).await?;
            println!("{}", config.sandbox.mode);
            Ok(0)
        }
        SandboxAction::Set { mode } => {
            let mut config = ConfigFile::load(workspace_root).await?;
            let previous = config.sandbox.mode;
            config.sandbox.mode = mode;
            config.persist(workspace_root).await?;

            let session_id = new_session_id();
            let sink = audit_sink(workspace_root, &session_id, json);
            emit(
                &sink,
                AuditEvent::new(
                    EventKind::SandboxSet,
                    &session_id,
                    Some(json!({ "mode": mode, "previous": previous })),
                ),
            )
            .await;

            if !json {
                println!("sandbox mode set to {mode}");
            }
            Ok(0)
        }
    }
}
