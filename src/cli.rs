//! Command-line interface definitions and argument parsing

use crate::report::DATA_SAMPLE_ROWS;
use chrono::NaiveDate;
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

/// Sales analytics dashboard: KPIs, period comparison and RFM segments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the SQLite database (overrides SALES_DB_PATH)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load a sales CSV and replace the stored table with it
    Seed {
        /// Path to the input CSV file
        #[arg(short, long, default_value = "data/sales_data.csv")]
        csv: PathBuf,
    },

    /// Print KPIs, insights and customer segments for a date window
    Report(ReportArgs),

    /// Predict the segment of a customer from its RFM values
    Segment {
        /// R,F,M values as comma-separated string
        /// Example: --predict "30,10,500.0" for Recency=30, Frequency=10, Monetary=500.0
        #[arg(short, long)]
        predict: String,

        /// Number of customer segments
        #[arg(short = 'k', long)]
        clusters: Option<usize>,
    },
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ReportArgs {
    /// First day of the window (YYYY-MM-DD); defaults to the earliest sale
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Last day of the window (YYYY-MM-DD); defaults to the latest sale
    #[arg(long)]
    pub end: Option<NaiveDate>,

    /// Only include these products (repeatable)
    #[arg(long = "product")]
    pub products: Vec<String>,

    /// Only include these regions (repeatable)
    #[arg(long = "region")]
    pub regions: Vec<String>,

    /// Number of customer segments
    #[arg(short = 'k', long)]
    pub clusters: Option<usize>,

    /// Directory to write PNG charts into
    #[arg(long)]
    pub charts_dir: Option<PathBuf>,

    /// Write the filtered rows to this CSV file
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Rows of the filtered period to print as a sample (0 to skip)
    #[arg(long, default_value_t = DATA_SAMPLE_ROWS)]
    pub sample_rows: usize,
}

/// Parse RFM values from the predict string
/// Expected format: "recency,frequency,monetary"
pub fn parse_rfm_values(predict_str: &str) -> crate::Result<[f64; 3]> {
    let parts: Vec<&str> = predict_str.split(',').collect();
    if parts.len() != 3 {
        anyhow::bail!("Predict values must be in format 'recency,frequency,monetary'");
    }

    let mut values = [0.0; 3];
    for ((value, raw), name) in values
        .iter_mut()
        .zip(&parts)
        .zip(["recency", "frequency", "monetary"])
    {
        *value = raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid {} value: {}", name, raw))?;
    }

    Ok(values)
}
