use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "alpharag", about = "Resilient portfolio data resolution")]
pub struct Cli {
    /// Log level used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load a holdings CSV and print the normalized portfolio
    Ingest {
        path: PathBuf,
        /// Resolve every holding to its canonical key as well
        #[arg(long)]
        resolve: bool,
    },
    /// Resolve tickers to canonical instrument keys
    Resolve {
        #[arg(required = true)]
        symbols: Vec<String>,
    },
    /// Dataset metadata for a ticker
    Company {
        symbol: String,
        /// Also fetch company info through the data chain
        #[arg(long)]
        live: bool,
    },
    /// Current price through the data chain
    Quote {
        #[arg(required = true)]
        symbols: Vec<String>,
    },
    /// Daily bars through the data chain
    History {
        symbol: String,
        /// 1mo, 3mo, 6mo, 1y, 2y or 5y
        #[arg(long, default_value = "1y")]
        period: String,
    },
    /// Recommendations for a holdings CSV through the language-model chain
    Predict {
        path: PathBuf,
        /// JSON object of symbol -> sentiment in [-1, 1]
        #[arg(long)]
        sentiment: Option<String>,
        /// JSON object of symbol -> fundamentals score in [0, 10]
        #[arg(long)]
        scores: Option<String>,
        /// Extra context appended to the prompt
        #[arg(long, default_value = "")]
        context: String,
    },
    /// Probe every configured provider
    Health,
    /// Show cache and dataset status
    CacheInfo {
        /// Download a fresh dataset first
        #[arg(long)]
        refresh: bool,
    },
}
