pub mod cli;
pub mod commands;
pub mod config;

pub use cli::Cli;
pub use cli::Command;

/// Denied, violated, or otherwise failed actions.
pub const EXIT_FAILURE: u8 = 1;
/// Malformed input caught before any side effect.
pub const EXIT_VALIDATION: u8 = 2;

pub async fn run_main(cli: Cli) -> anyhow::Result<u8> {
    let workspace_root = match cli.workspace {
        Some(dir) => std::path::absolute(dir)?,
        None => std::env::current_dir()?,
    };
    match cli.command {
        Command::Sandbox(args) => commands::sandbox::run(args, &workspace_root, cli.json).await,
        Command::Approvals(args) => commands::approvals::run(args, &workspace_root, cli.json).await,
        Command::Run(args) => commands::run::run(args, &workspace_root, cli.json).await,
        Command::Patch(args) => commands::patch::run(args, &workspace_root, cli.json).await,
        Command::History(args) => commands::history::run(args, &workspace_root, cli.json).await,
    }
}
