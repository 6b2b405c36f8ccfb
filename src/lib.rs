pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod logging;

use crate::application::fallback::{ChainOutcome, FallbackChain};
use crate::application::ingest_portfolio::PortfolioIngester;
use crate::application::market_data::MarketDataService;
use crate::application::predictions::{PredictionService, EMERGENCY_RULES};
use crate::config::AppConfig;
use crate::domain::entities::holding::LoadedPortfolio;
use crate::domain::entities::instrument::{CompanyProfile, SymbolResolution};
use crate::domain::entities::market::{CompanyInfo, HistoryPeriod, PriceBar, PriceQuote};
use crate::domain::entities::prediction::{HoldingSnapshot, Prediction, PredictionRequest};
use crate::domain::error::{DomainError, IngestError};
use crate::domain::ports::chain_provider::ProviderHealth;
use crate::domain::ports::clock::{Clock, SystemClock};
use crate::domain::ports::llm_provider::LlmProvider;
use crate::domain::ports::market_data_provider::DataProvider;
use crate::domain::ports::resolution_store::ResolutionStore;
use crate::infrastructure::cache::{SharedCache, TtlCache};
use crate::infrastructure::llm::llm_provider_registry;
use crate::infrastructure::providers::{data_provider_registry, MOCK_PROVIDER};
use crate::infrastructure::resolvers::{InstrumentDataset, InstrumentResolver, ResolverCacheInfo};
use crate::infrastructure::sqlite::SqliteResolutionStore;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub data_chain: Vec<String>,
    pub llm_chain: Vec<String>,
    pub data_providers: Vec<ProviderHealth>,
    pub llm_providers: Vec<ProviderHealth>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheReport {
    pub cache_dir: String,
    /// Entries physically held by the shared in-memory cache.
    pub memory_entries: usize,
    pub resolver: ResolverCacheInfo,
}

pub struct AlphaRag {
    config: AppConfig,
    cache: Arc<SharedCache>,
    resolver: Arc<InstrumentResolver>,
    market_data: MarketDataService,
    predictions: PredictionService,
}

impl AlphaRag {
    /// Builds both provider chains from the names in `config`.
    pub fn new(config: AppConfig) -> Result<Self, DomainError> {
        let data_chain = FallbackChain::build(&config.data_chain, &data_provider_registry(), &config, MOCK_PROVIDER)?;
        let llm_chain = FallbackChain::build(&config.llm_chain, &llm_provider_registry(), &config, EMERGENCY_RULES)?;
        Self::with_chains(config, data_chain, llm_chain, Arc::new(SystemClock))
    }

    /// Wires already constructed chains.
    pub fn with_chains(
        config: AppConfig,
        data_chain: FallbackChain<dyn DataProvider>,
        llm_chain: FallbackChain<dyn LlmProvider>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, DomainError> {
        std::fs::create_dir_all(&config.cache_dir).map_err(|e| {
            DomainError::Config(format!("Cannot create cache dir {}: {e}", config.cache_dir.display()))
        })?;

        let cache: Arc<SharedCache> = Arc::new(TtlCache::with_clock(clock.clone()));
        let dataset = InstrumentDataset::new(
            config.dataset_path(),
            config.dataset_url.clone(),
            config.http_timeout,
            clock.clone(),
        );
        let mut resolver = InstrumentResolver::new(
            dataset,
            cache.clone(),
            config.matcher,
            config.cache_ttls.instrument,
        )
        .with_clock(clock);

        match SqliteResolutionStore::open(&config.resolution_db_path()) {
            Ok(store) => {
                let store: Arc<dyn ResolutionStore> = Arc::new(store);
                resolver = resolver.with_store(store);
            }
            Err(e) => warn!(error = %e, "Resolution store unavailable, resolutions will not persist"),
        }
        let resolver = Arc::new(resolver);

        Ok(Self {
            market_data: MarketDataService::new(data_chain, resolver.clone(), cache.clone(), config.cache_ttls),
            predictions: PredictionService::new(llm_chain),
            config,
            cache,
            resolver,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn load_portfolio(&self, path: &Path) -> Result<LoadedPortfolio, IngestError> {
        PortfolioIngester::load(path)
    }

    pub async fn resolve(&self, symbol: &str) -> SymbolResolution {
        self.resolver.resolve(symbol).await
    }

    pub async fn bulk_resolve(&self, symbols: &[String]) -> BTreeMap<String, String> {
        self.resolver.bulk_resolve(symbols).await
    }

    pub async fn company_profile(&self, symbol: &str) -> Option<CompanyProfile> {
        self.resolver.company_profile(symbol).await
    }

    pub async fn current_price(&self, symbol: &str) -> ChainOutcome<PriceQuote> {
        self.market_data.current_price(symbol).await
    }

    pub async fn current_prices(&self, symbols: &[String]) -> BTreeMap<String, ChainOutcome<PriceQuote>> {
        self.market_data.current_prices(symbols).await
    }

    pub async fn historical_data(&self, symbol: &str, period: HistoryPeriod) -> ChainOutcome<Vec<PriceBar>> {
        self.market_data.historical_data(symbol, period).await
    }

    pub async fn company_info(&self, symbol: &str) -> ChainOutcome<CompanyInfo> {
        self.market_data.company_info(symbol).await
    }

    /// Snapshot of a loaded portfolio for prediction. Holdings without a
    /// price in the file are priced through the data chain.
    pub async fn prediction_request(&self, portfolio: &LoadedPortfolio) -> PredictionRequest {
        let mut holdings = Vec::with_capacity(portfolio.holdings.len());
        for h in &portfolio.holdings {
            let current = match h.current_price {
                Some(price) => price,
                None => self.market_data.current_price(&h.symbol).await.value.price,
            };
            holdings.push(HoldingSnapshot::new(h.symbol.clone(), h.quantity, h.buy_price, current));
        }
        PredictionRequest {
            holdings,
            ..Default::default()
        }
    }

    pub async fn predict(&self, request: &PredictionRequest) -> ChainOutcome<Prediction> {
        self.predictions.generate(request).await
    }

    pub async fn health(&self) -> HealthReport {
        HealthReport {
            data_chain: self.market_data.chain_names(),
            llm_chain: self.predictions.chain_names(),
            data_providers: self.market_data.health_check().await,
            llm_providers: self.predictions.health_check().await,
        }
    }

    pub async fn cache_info(&self) -> CacheReport {
        CacheReport {
            cache_dir: self.config.cache_dir.display().to_string(),
            memory_entries: self.cache.len(),
            resolver: self.resolver.cache_info().await,
        }
    }

    pub async fn refresh_dataset(&self) -> bool {
        self.resolver.refresh_dataset().await
    }

    pub fn clear_memory_cache(&self) {
        self.cache.clear();
    }
}
