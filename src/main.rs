//! Housing Model Server - Main Entry Point

use clap::Parser;
use housing_model_server::cli::{cmd_build, cmd_serve, Cli, Commands};
use housing_model_server::server::{run_server, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "housing_model_server=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve { host, port, static_dir, dataset, target }) => {
            cmd_serve(&host, port, static_dir, dataset, target).await?;
        }
        Some(Commands::Build { dataset, target, output }) => {
            cmd_build(&dataset, &target, output.as_deref())?;
        }
        None => {
            run_server(ServerConfig::default()).await?;
        }
    }

    Ok(())
}
