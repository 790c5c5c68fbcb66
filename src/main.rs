use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use linrep::batch;
use linrep::classify::FailureClassifier;
use linrep::cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // A failed run is logged and ends here; no exit-code contract.
    if let Err(err) = run(cli).await {
        error!("{err:#}");
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Extract {
            layout,
            input,
            output,
        } => {
            let files = batch::collect_pdf_files(&input)?;
            info!(files = files.len(), dir = %input.display(), "extracting reports");
            let records = batch::extract_files(&files, layout);
            batch::write_records(&records, &output)?;
        }
        Commands::Classify {
            input,
            output,
            model,
            max_retries,
            api_key,
            temperature,
        } => {
            let classifier =
                FailureClassifier::new(api_key, model)?.with_temperature(temperature);
            batch::classify_table(&input, &output, &classifier, max_retries).await?;
        }
    }
    Ok(())
}
