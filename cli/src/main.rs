use std::process::ExitCode;

use clap::Parser;
use cordon_cli::Cli;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cordon_cli::run_main(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("cordon: {err:#}");
            ExitCode::from(cordon_cli::EXIT_FAILURE)
        }
    }
}
