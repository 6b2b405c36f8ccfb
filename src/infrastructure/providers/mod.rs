pub mod alpha_vantage;
pub mod mock;
pub mod upstox;
pub mod yahoo;

use crate::application::fallback::ProviderRegistry;
use crate::config::AppConfig;
use crate::domain::ports::market_data_provider::DataProvider;
use std::sync::Arc;

pub use alpha_vantage::AlphaVantageProvider;
pub use mock::{MockProvider, MOCK_PROVIDER};
pub use upstox::UpstoxProvider;
pub use yahoo::YahooProvider;

/// Every network-backed data provider, by chain name. `mock` is not listed:
/// it is always the terminal tier.
pub fn data_provider_registry() -> ProviderRegistry<dyn DataProvider, AppConfig> {
    ProviderRegistry::new()
        .register("yahoo", |c: &AppConfig| {
            Ok(Arc::new(YahooProvider::new(&c.yahoo, c.http_timeout)) as Arc<dyn DataProvider>)
        })
        .register("alpha_vantage", |c: &AppConfig| {
            Ok(Arc::new(AlphaVantageProvider::new(&c.alpha_vantage, c.http_timeout)?) as Arc<dyn DataProvider>)
        })
        .register("upstox", |c: &AppConfig| {
            Ok(Arc::new(UpstoxProvider::new(&c.upstox, c.http_timeout)?) as Arc<dyn DataProvider>)
        })
}
