pub mod chain_provider;
pub mod clock;
pub mod llm_provider;
pub mod market_data_provider;
pub mod resolution_store;
