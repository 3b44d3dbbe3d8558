/// # paper-digest CLI Interface (Module)
///
/// Command parsing and orchestration for the `paper-digest` binary. All
/// pipeline logic lives in [`paper_digest_core`]; this module wires the
/// loaded config to the arXiv client, the text-generation client and the
/// publisher.
///
/// ## Commands
/// - `generate`: fetch, summarize and write the dated Markdown digest.
/// - `publish`: render that digest to a static HTML page.
/// - `run`: both, in order (the scheduled entry point).
///
/// Programmatic and test use goes through [`run`] with a constructed [`Cli`].
use crate::load_config::{load_config, CliConfig};
use crate::openai::OpenAiClient;
use anyhow::Result;
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use paper_digest_core::download::ArxivClient;
use paper_digest_core::pipeline::generate_digest;
use paper_digest_core::publish::publish_newsletter;
use std::path::PathBuf;

/// CLI for paper-digest: summarize recent arXiv papers into a newsletter.
#[derive(Parser)]
#[clap(
    name = "paper-digest",
    version,
    about = "Summarize recent arXiv papers section by section and publish a weekly digest"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Path to the YAML config file
    #[clap(long)]
    pub config: PathBuf,
    /// Digest date (YYYY-MM-DD); defaults to today
    #[clap(long)]
    pub date: Option<NaiveDate>,
}

impl RunArgs {
    fn date(&self) -> NaiveDate {
        self.date.unwrap_or_else(|| Local::now().date_naive())
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch papers, summarize them and write the Markdown digest
    Generate(RunArgs),
    /// Render the Markdown digest for the date as an HTML page
    Publish(RunArgs),
    /// Generate, then publish
    Run(RunArgs),
}

async fn generate(config: &CliConfig, date: NaiveDate) -> Result<()> {
    let source = ArxivClient::new(&config.digest.fetch);
    let generator = OpenAiClient::new(&config.openai);
    match generate_digest(&config.digest, &source, &generator, date).await {
        Ok(report) => {
            tracing::info!(
                command = "generate",
                processed = report.processed.len(),
                skipped = report.skipped.len(),
                "Digest generation complete"
            );
            for skipped in &report.skipped {
                println!("skipped [{}] {}: {}", skipped.stage, skipped.title, skipped.reason);
            }
            println!(
                "Digest written to {} ({} papers, {} skipped)",
                report.written.markdown.display(),
                report.processed.len(),
                report.skipped.len()
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!(command = "generate", error = %e, "Digest generation failed");
            Err(anyhow::Error::new(e))
        }
    }
}

/// Publishing failures are reported but never fail the process.
fn publish(config: &CliConfig, date: NaiveDate) {
    match publish_newsletter(&config.digest.output, date) {
        Ok(path) => {
            tracing::info!(command = "publish", path = %path.display(), "Publishing complete");
            println!("Newsletter published to {}", path.display());
        }
        Err(e) => {
            tracing::error!(command = "publish", error = %e, "Publishing failed");
            println!("Publishing failed: {e}");
        }
    }
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Generate(args) => {
            let config = load_config(&args.config)?;
            tracing::info!(command = "generate", date = %args.date(), "Starting digest generation");
            generate(&config, args.date()).await
        }
        Commands::Publish(args) => {
            let config = load_config(&args.config)?;
            tracing::info!(command = "publish", date = %args.date(), "Starting publishing");
            publish(&config, args.date());
            Ok(())
        }
        Commands::Run(args) => {
            let config = load_config(&args.config)?;
            let date = args.date();
            tracing::info!(command = "run", %date, "Starting scheduled run");
            generate(&config, date).await?;
            publish(&config, date);
            Ok(())
        }
    }
}
