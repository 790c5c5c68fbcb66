use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::classify::client;
use crate::extract::ReportLayout;

#[derive(Parser)]
#[command(name = "linrep")]
#[command(about = "LINAC service report extraction and classification", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract structured fields from a directory of report PDFs
    Extract {
        /// Vendor report layout to apply
        #[arg(long, value_enum)]
        layout: ReportLayout,

        /// Directory containing the report PDFs
        #[arg(long)]
        input: PathBuf,

        /// Output CSV path
        #[arg(long)]
        output: PathBuf,
    },

    /// Classify report subjects and descriptions into failure types
    Classify {
        /// Input CSV with `subject` and `description` columns
        #[arg(long)]
        input: PathBuf,

        /// Output CSV path
        #[arg(long)]
        output: PathBuf,

        /// Model identifier
        #[arg(long, default_value = client::DEFAULT_MODEL)]
        model: String,

        /// Maximum attempts per report
        #[arg(long, default_value_t = client::DEFAULT_MAX_RETRIES)]
        max_retries: u32,

        /// API key; falls back to the OPENAI_API_KEY environment variable
        #[arg(long)]
        api_key: Option<String>,

        /// Sampling temperature
        #[arg(long, default_value_t = client::DEFAULT_TEMPERATURE)]
        temperature: f64,
    },
}
