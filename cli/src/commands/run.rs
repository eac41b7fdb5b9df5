use std::io::Write;
use std::path::Path;

use cordon_core::approvals::Approvals;
use cordon_core::approvals::TerminalPrompt;
use cordon_core::exec::ExecOptions;
use cordon_core::exec::run_command;
use cordon_core::sandbox::SandboxPolicy;
use serde_json::json;

use crate::EXIT_FAILURE;
use crate::cli::RunArgs;
use crate::commands::audit_sink;
use crate::commands::new_session_id;
use crate::config::ConfigFile;

pub async fn run(args: RunArgs, workspace_root: &Path, json: bool) -> anyhow::Result<u8> {
    let mut config = ConfigFile::load(workspace_root).await?;
    if let Some(mode) = args.sandbox {
        config.sandbox.mode = mode;
    }
    if let Some(policy) = args.approval {
        config.approvals.policy = policy;
    }

    let sandbox = SandboxPolicy::new(config.sandbox_config(workspace_root));
    let approvals = Approvals::new(config.approvals.policy);
    let prompt = TerminalPrompt;
    let session_id = new_session_id();
    let sink = audit_sink(workspace_root, &session_id, json);

    let env_allowlist = if args.env.is_empty() {
        config.exec.env_allowlist.take()
    } else {
        Some(args.env)
    };

    let opts = ExecOptions {
        cwd: args.cwd,
        timeout_ms: args.timeout_ms.or(config.exec.timeout_ms),
        env_allowlist,
        auto_approve: args.yes,
        sandbox: &sandbox,
        approvals: &approvals,
        prompt: &prompt,
        sink: &sink,
        session_id: &session_id,
    };

    let result = match run_command(&args.command, opts).await {
        Ok(result) => result,
        Err(err) => {
            eprintln!("cordon: {err}");
            return Ok(EXIT_FAILURE);
        }
    };

    if !result.ran {
        eprintln!("cordon: command was not approved");
        return Ok(EXIT_FAILURE);
    }

    if json {
        let summary = json!({
            "ran": result.ran,
            "exit_code": result.exit_code,
            "stdout": result.stdout,
            "stderr": result.stderr,
            "duration_ms": result.duration_ms,
            "timed_out": result.timed_out,
        });
        println!("{summary}");
    } else {
        print!("{}", result.stdout);
        std::io::stdout().flush()?;
        eprint!("{}", result.stderr);
        if result.timed_out {
            eprintln!("cordon: command timed out after {} ms", result.duration_ms);
        }
    }

    // Mirror the child's exit code; a kill or denial reads as plain failure.
    Ok(result
        .exit_code
        .map_or(EXIT_FAILURE, |code| code.clamp(0, 255) as u8))
}
