use anyhow::Result;
use clap::Parser;
use paper_digest::cli::{run, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    // A .env file may carry OPENAI_API_KEY for local runs.
    let env_file = dotenvy::dotenv().ok();

    tracing_subscriber::fmt::init();
    match &env_file {
        Some(path) => tracing::info!(path = %path.display(), "paper-digest starting, loaded .env"),
        None => tracing::info!("paper-digest starting without a .env file"),
    }

    let cli = Cli::parse();
    let result = run(cli).await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "paper-digest run failed");
    } else {
        tracing::info!("paper-digest run finished");
    }
    result
}
