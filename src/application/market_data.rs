use crate::application::fallback::{ChainOutcome, FallbackChain};
use crate::domain::entities::instrument::SymbolResolution;
use crate::domain::entities::market::{CompanyInfo, HistoryPeriod, InstrumentRef, PriceBar, PriceQuote};
use crate::domain::error::ProviderError;
use crate::domain::ports::chain_provider::{ChainProvider, ProviderHealth};
use crate::domain::ports::market_data_provider::DataProvider;
use crate::domain::values::symbol::{clean_symbol, NormalizedSymbol};
use crate::infrastructure::cache::{CacheNamespace, CacheTtls, CachedValue, SharedCache};
use crate::infrastructure::providers::mock::MockProvider;
use crate::infrastructure::resolvers::InstrumentResolver;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Prices, history and company data over the data-provider chain.
///
/// Symbols are resolved once up front so providers receive canonical keys.
/// Live results are cached per namespace; terminal (mock) results are not,
/// so the next call tries the real providers again.
pub struct MarketDataService {
    chain: FallbackChain<dyn DataProvider>,
    mock: MockProvider,
    resolver: Arc<InstrumentResolver>,
    cache: Arc<SharedCache>,
    ttls: CacheTtls,
}

impl MarketDataService {
    pub fn new(
        chain: FallbackChain<dyn DataProvider>,
        resolver: Arc<InstrumentResolver>,
        cache: Arc<SharedCache>,
        ttls: CacheTtls,
    ) -> Self {
        Self {
            chain,
            mock: MockProvider::new(),
            resolver,
            cache,
            ttls,
        }
    }

    async fn instrument(&self, raw: &str) -> InstrumentRef {
        let resolution: SymbolResolution = self.resolver.resolve(raw).await;
        let base = NormalizedSymbol::parse(raw)
            .map(|s| s.base)
            .unwrap_or_else(|| clean_symbol(raw));
        InstrumentRef {
            symbol: resolution.normalized_symbol,
            base,
            canonical_key: resolution.canonical_key,
        }
    }

    fn store(&self, namespace: CacheNamespace, key: String, value: CachedValue) {
        self.cache.put(key, value, self.ttls.for_namespace(namespace));
    }

    pub async fn current_price(&self, raw: &str) -> ChainOutcome<PriceQuote> {
        let instrument = self.instrument(raw).await;
        let key = CacheNamespace::Quote.key(&[&instrument.symbol]);
        if let Some(CachedValue::Quote(quote)) = self.cache.get(&key) {
            debug!(symbol = %instrument.symbol, "Quote cache hit");
            let source = quote.source.clone();
            return ChainOutcome::from_cache(quote, source);
        }

        let instrument = &instrument;
        let outcome = self
            .chain
            .execute(
                "get_current_price",
                |p: Arc<dyn DataProvider>| async move { p.get_current_price(instrument).await },
                || self.mock.quote(instrument),
            )
            .await;
        if !outcome.degraded {
            self.store(CacheNamespace::Quote, key, CachedValue::Quote(outcome.value.clone()));
        }
        outcome
    }

    /// Quotes keyed by input symbol. Only symbols missing from the cache go
    /// through the chain; each is fetched in turn.
    pub async fn current_prices(&self, symbols: &[String]) -> BTreeMap<String, ChainOutcome<PriceQuote>> {
        let mut out = BTreeMap::new();
        for s in symbols {
            if out.contains_key(s) {
                continue;
            }
            let outcome = self.current_price(s).await;
            out.insert(s.clone(), outcome);
        }
        out
    }

    pub async fn historical_data(&self, raw: &str, period: HistoryPeriod) -> ChainOutcome<Vec<PriceBar>> {
        let instrument = self.instrument(raw).await;
        let key = CacheNamespace::History.key(&[&instrument.symbol, period.as_str()]);
        if let Some(CachedValue::History { bars, source }) = self.cache.get(&key) {
            debug!(symbol = %instrument.symbol, period = %period, "History cache hit");
            return ChainOutcome::from_cache(bars, source);
        }

        let instrument = &instrument;
        let outcome = self
            .chain
            .execute(
                "get_historical_data",
                |p: Arc<dyn DataProvider>| async move {
                    let bars = p.get_historical_data(instrument, period).await?;
                    if bars.is_empty() {
                        return Err(ProviderError::no_data(p.name(), &instrument.symbol));
                    }
                    Ok(bars)
                },
                || self.mock.history(instrument, period, Utc::now().date_naive()),
            )
            .await;
        if !outcome.degraded {
            self.store(
                CacheNamespace::History,
                key,
                CachedValue::History {
                    bars: outcome.value.clone(),
                    source: outcome.provider_used.clone(),
                },
            );
        }
        outcome
    }

    pub async fn company_info(&self, raw: &str) -> ChainOutcome<CompanyInfo> {
        let instrument = self.instrument(raw).await;
        let key = CacheNamespace::Company.key(&[&instrument.symbol]);
        if let Some(CachedValue::Company(info)) = self.cache.get(&key) {
            let source = info.source.clone();
            return ChainOutcome::from_cache(info, source);
        }

        let instrument = &instrument;
        let outcome = self
            .chain
            .execute(
                "get_company_info",
                |p: Arc<dyn DataProvider>| async move { p.get_company_info(instrument).await },
                || self.mock.company(instrument),
            )
            .await;
        if !outcome.degraded {
            self.store(CacheNamespace::Company, key, CachedValue::Company(outcome.value.clone()));
        }
        outcome
    }

    pub fn chain_names(&self) -> Vec<String> {
        self.chain.chain_names()
    }

    pub async fn available_providers(&self) -> Vec<String> {
        self.chain.available_providers().await
    }

    /// Health of every live provider, then the mock tier.
    pub async fn health_check(&self) -> Vec<ProviderHealth> {
        let mut report = self.chain.health_check_all().await;
        report.push(self.mock.health_check().await);
        report
    }
}
