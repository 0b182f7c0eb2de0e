#![forbid(unsafe_code)]

mod logging;
mod render;
mod signal;

use clap::{Parser, Subcommand};
use raylink_server::ServeArgs;

use crate::logging::LogArgs;
use crate::render::RenderArgs;

#[derive(Debug, Parser)]
#[command(name = "raylink", version, about)]
struct Cli {
    #[command(flatten)]
    log: LogArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the web root with cross-origin isolation headers.
    Serve(ServeArgs),
    /// Bootstrap the render module headless and keep it rendering.
    Render(RenderArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli.log.init()?;

    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Render(args) => render::run(args).await,
    }
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let server = raylink_server::start(args.into_config()).await?;
    signal::shutdown().await;
    server.shutdown().await
}
