use alpharag::cli::commands::{Cli, Commands};
use alpharag::config::AppConfig;
use alpharag::domain::entities::market::HistoryPeriod;
use alpharag::logging::init_logging;
use alpharag::AlphaRag;
use clap::Parser;
use std::collections::BTreeMap;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let app = match AppConfig::from_env().and_then(AlphaRag::new) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Error initializing alpharag: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run_command(app, cli.command).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run_command(app: AlphaRag, cmd: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        Commands::Ingest { path, resolve } => {
            let portfolio = app.load_portfolio(&path)?;
            if resolve {
                let keys = app.bulk_resolve(&portfolio.summary.symbols).await;
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "portfolio": portfolio,
                        "instrument_keys": keys,
                    }))?
                );
            } else {
                println!("{}", serde_json::to_string_pretty(&portfolio)?);
            }
        }
        Commands::Resolve { symbols } => {
            let mut resolutions = Vec::with_capacity(symbols.len());
            for s in &symbols {
                resolutions.push(app.resolve(s).await);
            }
            println!("{}", serde_json::to_string_pretty(&resolutions)?);
        }
        Commands::Company { symbol, live } => {
            let profile = app.company_profile(&symbol).await;
            if live {
                let info = app.company_info(&symbol).await;
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "profile": profile,
                        "info": info,
                    }))?
                );
            } else {
                let profile = profile.ok_or_else(|| format!("No dataset row for {symbol}"))?;
                println!("{}", serde_json::to_string_pretty(&profile)?);
            }
        }
        Commands::Quote { symbols } => {
            let quotes = app.current_prices(&symbols).await;
            println!("{}", serde_json::to_string_pretty(&quotes)?);
        }
        Commands::History { symbol, period } => {
            let period: HistoryPeriod = period.parse().map_err(|e: String| e)?;
            let outcome = app.historical_data(&symbol, period).await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::Predict {
            path,
            sentiment,
            scores,
            context,
        } => {
            let portfolio = app.load_portfolio(&path)?;
            let mut request = app.prediction_request(&portfolio).await;
            request.sentiment = parse_score_map(sentiment.as_deref())?;
            request.financial_scores = parse_score_map(scores.as_deref())?;
            request.context = context;
            let outcome = app.predict(&request).await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::Health => {
            let report = app.health().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::CacheInfo { refresh } => {
            if refresh && !app.refresh_dataset().await {
                eprintln!("Dataset refresh failed; showing current state");
            }
            let info = app.cache_info().await;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
    }
    Ok(())
}

/// Keys are normalized the same way holdings are, so `tcs` matches `TCS.NS`.
fn parse_score_map(json: Option<&str>) -> Result<BTreeMap<String, f64>, Box<dyn std::error::Error>> {
    let Some(json) = json else {
        return Ok(BTreeMap::new());
    };
    let raw: BTreeMap<String, f64> = serde_json::from_str(json)?;
    Ok(raw
        .into_iter()
        .map(|(k, v)| {
            let key = alpharag::domain::values::symbol::NormalizedSymbol::parse(&k)
                .map(|s| s.symbol)
                .unwrap_or(k);
            (key, v)
        })
        .collect())
}
