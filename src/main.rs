use anyhow::Result;
use clap::Parser;
use nestegg::cli::{self, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    cli::runner::run(cli).await
}
