pub mod fallback;
pub mod ingest_portfolio;
pub mod market_data;
pub mod predictions;
pub mod prompt;
