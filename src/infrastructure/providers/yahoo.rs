use crate::config::YahooConfig;
use crate::domain::entities::market::{CompanyInfo, HistoryPeriod, InstrumentRef, PriceBar, PriceQuote};
use crate::domain::error::ProviderError;
use crate::domain::ports::chain_provider::{Capability, ChainProvider};
use crate::domain::ports::market_data_provider::DataProvider;
use crate::infrastructure::cache::TtlCache;
use crate::infrastructure::rate_limiter::IntervalRateLimiter;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

const NAME: &str = "yahoo";
const PROBE_SYMBOL: &str = "RELIANCE.NS";
const PROBE_TTL: Duration = Duration::from_secs(300);

/// Yahoo Finance via the v8 chart API (no auth required).
pub struct YahooProvider {
    base_url: String,
    client: reqwest::Client,
    limiter: IntervalRateLimiter,
    probe: TtlCache<(), bool>,
}

impl YahooProvider {
    pub fn new(config: &YahooConfig, timeout: Duration) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::builder()
                .user_agent(
                    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                     AppleWebKit/537.36 (KHTML, like Gecko) \
                     Chrome/120.0.0.0 Safari/537.36",
                )
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            limiter: IntervalRateLimiter::new(NAME, config.min_interval),
            probe: TtlCache::new(),
        }
    }

    async fn fetch_chart(&self, symbol: &str, range: &str) -> Result<ChartData, ProviderError> {
        self.limiter.acquire().await;

        let url = format!(
            "{}/v8/finance/chart/{symbol}?range={range}&interval=1d",
            self.base_url
        );
        debug!(provider = NAME, %url, "Fetching chart");

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::from_http(NAME, e))?;

        if !resp.status().is_success() {
            return Err(ProviderError::failed(
                NAME,
                format!("Yahoo API returned {} for {symbol}", resp.status()),
            ));
        }

        let data: ChartResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::failed(NAME, format!("Invalid chart payload: {e}")))?;

        if let Some(err) = data.chart.error {
            return Err(ProviderError::failed(NAME, format!("Yahoo error: {err}")));
        }

        data.chart
            .result
            .and_then(|mut r| if r.is_empty() { None } else { Some(r.swap_remove(0)) })
            .ok_or_else(|| ProviderError::no_data(NAME, symbol))
    }
}

#[derive(Debug, serde::Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, serde::Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, serde::Deserialize)]
struct ChartData {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    #[serde(default)]
    indicators: Option<Indicators>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    symbol: String,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    exchange_name: Option<String>,
    #[serde(default)]
    short_name: Option<String>,
    #[serde(default)]
    long_name: Option<String>,
    #[serde(default)]
    regular_market_price: Option<f64>,
    #[serde(default)]
    regular_market_time: Option<i64>,
}

#[derive(Debug, serde::Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteSeries>,
}

#[derive(Debug, Default, serde::Deserialize)]
struct QuoteSeries {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

/// Zips the parallel chart arrays into bars, skipping days with gaps.
fn bars_from_chart(data: &ChartData) -> Vec<PriceBar> {
    let Some(series) = data.indicators.as_ref().and_then(|i| i.quote.first()) else {
        return Vec::new();
    };
    let at = |v: &Vec<Option<f64>>, i: usize| v.get(i).copied().flatten();

    data.timestamp
        .iter()
        .enumerate()
        .filter_map(|(i, ts)| {
            let date = DateTime::<Utc>::from_timestamp(*ts, 0)?.date_naive();
            Some(PriceBar {
                date,
                open: at(&series.open, i)?,
                high: at(&series.high, i)?,
                low: at(&series.low, i)?,
                close: at(&series.close, i)?,
                volume: series.volume.get(i).copied().flatten().unwrap_or(0),
            })
        })
        .collect()
}

#[async_trait]
impl ChainProvider for YahooProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn capabilities(&self) -> Vec<Capability> {
        vec![Capability::Price, Capability::History, Capability::Info, Capability::Probe]
    }

    fn settings(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("base_url".to_string(), self.base_url.clone()),
            ("min_interval".to_string(), format!("{:?}", self.limiter.interval())),
        ])
    }

    /// Probes with a well-known ticker. The answer is memoized for a few
    /// minutes so a chain walk does not pay for a probe on every call.
    async fn is_available(&self) -> bool {
        if let Some(available) = self.probe.get(&()) {
            return available;
        }
        let available = match self.fetch_chart(PROBE_SYMBOL, "1d").await {
            Ok(data) => data.meta.regular_market_price.is_some(),
            Err(e) => {
                warn!(provider = NAME, error = %e, "Availability probe failed");
                false
            }
        };
        self.probe.put((), available, PROBE_TTL);
        available
    }
}

#[async_trait]
impl DataProvider for YahooProvider {
    async fn get_current_price(&self, instrument: &InstrumentRef) -> Result<PriceQuote, ProviderError> {
        let data = self.fetch_chart(&instrument.symbol, "1d").await?;
        let price = data
            .meta
            .regular_market_price
            .filter(|p| *p > 0.0)
            .ok_or_else(|| ProviderError::no_data(NAME, &instrument.symbol))?;

        Ok(PriceQuote {
            symbol: instrument.symbol.clone(),
            price,
            currency: data.meta.currency.unwrap_or_else(|| "INR".to_string()),
            as_of: data
                .meta
                .regular_market_time
                .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
                .unwrap_or_else(Utc::now),
            source: NAME.to_string(),
        })
    }

    async fn get_historical_data(
        &self,
        instrument: &InstrumentRef,
        period: HistoryPeriod,
    ) -> Result<Vec<PriceBar>, ProviderError> {
        let data = self.fetch_chart(&instrument.symbol, period.as_str()).await?;
        let bars = bars_from_chart(&data);
        if bars.is_empty() {
            return Err(ProviderError::no_data(NAME, &instrument.symbol));
        }
        Ok(bars)
    }

    async fn get_company_info(&self, instrument: &InstrumentRef) -> Result<CompanyInfo, ProviderError> {
        let meta = self.fetch_chart(&instrument.symbol, "1d").await?.meta;
        let name = meta
            .long_name
            .or(meta.short_name)
            .ok_or_else(|| ProviderError::no_data(NAME, &instrument.symbol))?;

        Ok(CompanyInfo {
            symbol: meta.symbol,
            name,
            sector: None,
            industry: None,
            market_cap: None,
            exchange: meta.exchange_name,
            currency: meta.currency,
            source: NAME.to_string(),
        })
    }
}
