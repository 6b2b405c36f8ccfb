use crate::config::AlphaVantageConfig;
use crate::domain::entities::market::{CompanyInfo, HistoryPeriod, InstrumentRef, PriceBar, PriceQuote};
use crate::domain::error::ProviderError;
use crate::domain::ports::chain_provider::{Capability, ChainProvider};
use crate::domain::ports::market_data_provider::DataProvider;
use crate::infrastructure::cache::TtlCache;
use crate::infrastructure::rate_limiter::IntervalRateLimiter;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

const NAME: &str = "alpha_vantage";
const PROBE_TTL: Duration = Duration::from_secs(300);

/// Alpha Vantage REST API. Requires a key; free-tier quota is five calls a
/// minute, enforced by the interval limiter.
pub struct AlphaVantageProvider {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
    limiter: IntervalRateLimiter,
    probe: TtlCache<(), bool>,
}

impl AlphaVantageProvider {
    pub fn new(config: &AlphaVantageConfig, timeout: Duration) -> Result<Self, ProviderError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| ProviderError::MissingCredentials {
                provider: NAME.to_string(),
                missing: "ALPHA_VANTAGE_API_KEY".to_string(),
            })?;

        Ok(Self {
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            limiter: IntervalRateLimiter::new(NAME, config.min_interval),
            probe: TtlCache::new(),
        })
    }

    /// Alpha Vantage lists Indian equities under the `.BSE` suffix.
    pub fn vendor_symbol(symbol: &str) -> String {
        match symbol.strip_suffix(".NS") {
            Some(base) => format!("{base}.BSE"),
            None => symbol.to_string(),
        }
    }

    async fn request(&self, function: &str, symbol: &str, extra: &[(&str, &str)]) -> Result<Value, ProviderError> {
        self.limiter.acquire().await;
        debug!(provider = NAME, function, symbol, "Alpha Vantage request");

        let mut query: Vec<(&str, &str)> = vec![
            ("function", function),
            ("symbol", symbol),
            ("apikey", self.api_key.as_str()),
        ];
        query.extend_from_slice(extra);

        let resp = self
            .client
            .get(format!("{}/query", self.base_url))
            .query(&query)
            .send()
            .await
            .map_err(|e| ProviderError::from_http(NAME, e))?;

        if !resp.status().is_success() {
            return Err(ProviderError::failed(
                NAME,
                format!("HTTP {} for {function}", resp.status()),
            ));
        }

        let data: Value = resp
            .json()
            .await
            .map_err(|e| ProviderError::failed(NAME, format!("Invalid JSON: {e}")))?;
        check_api_message(&data)?;
        Ok(data)
    }
}

/// Alpha Vantage reports errors and quota exhaustion with HTTP 200 and a
/// message field instead of data.
fn check_api_message(data: &Value) -> Result<(), ProviderError> {
    if let Some(msg) = data.get("Error Message").and_then(Value::as_str) {
        return Err(ProviderError::failed(NAME, msg));
    }
    if let Some(msg) = data.get("Note").and_then(Value::as_str) {
        return Err(ProviderError::failed(NAME, format!("API note: {msg}")));
    }
    if let Some(msg) = data.get("Information").and_then(Value::as_str) {
        if msg.to_lowercase().contains("rate limit") {
            return Err(ProviderError::failed(NAME, format!("Rate limit exceeded: {msg}")));
        }
    }
    Ok(())
}

fn parse_number(value: Option<&Value>) -> Option<f64> {
    value
        .and_then(Value::as_str)
        .and_then(|s| s.trim().parse::<f64>().ok())
}

fn parse_text(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "None" && *s != "N/A")
        .map(str::to_string)
}

fn parse_daily_series(data: &Value, since: NaiveDate) -> Vec<PriceBar> {
    let Some(series) = data.get("Time Series (Daily)").and_then(Value::as_object) else {
        return Vec::new();
    };
    let mut bars: Vec<PriceBar> = series
        .iter()
        .filter_map(|(date, values)| {
            let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
            if date < since {
                return None;
            }
            Some(PriceBar {
                date,
                open: parse_number(values.get("1. open"))?,
                high: parse_number(values.get("2. high"))?,
                low: parse_number(values.get("3. low"))?,
                close: parse_number(values.get("4. close"))?,
                volume: parse_number(values.get("5. volume")).unwrap_or(0.0) as u64,
            })
        })
        .collect();
    bars.sort_by_key(|b| b.date);
    bars
}

#[async_trait]
impl ChainProvider for AlphaVantageProvider {
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

    async fn is_available(&self) -> bool {
        if let Some(available) = self.probe.get(&()) {
            return available;
        }
        let available = match self.request("GLOBAL_QUOTE", "IBM", &[]).await {
            Ok(data) => data.get("Global Quote").is_some(),
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
impl DataProvider for AlphaVantageProvider {
    async fn get_current_price(&self, instrument: &InstrumentRef) -> Result<PriceQuote, ProviderError> {
        let av_symbol = Self::vendor_symbol(&instrument.symbol);
        let data = self.request("GLOBAL_QUOTE", &av_symbol, &[]).await?;
        let price = parse_number(data.get("Global Quote").and_then(|q| q.get("05. price")))
            .filter(|p| *p > 0.0)
            .ok_or_else(|| ProviderError::no_data(NAME, &av_symbol))?;

        Ok(PriceQuote {
            symbol: instrument.symbol.clone(),
            price,
            currency: "INR".to_string(),
            as_of: Utc::now(),
            source: NAME.to_string(),
        })
    }

    async fn get_historical_data(
        &self,
        instrument: &InstrumentRef,
        period: HistoryPeriod,
    ) -> Result<Vec<PriceBar>, ProviderError> {
        let av_symbol = Self::vendor_symbol(&instrument.symbol);
        // compact returns the last 100 sessions
        let output_size = if period.trading_days() > 100 { "full" } else { "compact" };
        let data = self
            .request("TIME_SERIES_DAILY", &av_symbol, &[("outputsize", output_size)])
            .await?;

        let since = Utc::now().date_naive() - chrono::Duration::days(period.days());
        let bars = parse_daily_series(&data, since);
        if bars.is_empty() {
            return Err(ProviderError::no_data(NAME, &av_symbol));
        }
        Ok(bars)
    }

    async fn get_company_info(&self, instrument: &InstrumentRef) -> Result<CompanyInfo, ProviderError> {
        let av_symbol = Self::vendor_symbol(&instrument.symbol);
        let data = self.request("OVERVIEW", &av_symbol, &[]).await?;
        if parse_text(data.get("Symbol")).is_none() {
            return Err(ProviderError::no_data(NAME, &av_symbol));
        }

        Ok(CompanyInfo {
            symbol: instrument.symbol.clone(),
            name: parse_text(data.get("Name")).unwrap_or_else(|| instrument.base.clone()),
            sector: parse_text(data.get("Sector")),
            industry: parse_text(data.get("Industry")),
            market_cap: parse_number(data.get("MarketCapitalization")),
            exchange: parse_text(data.get("Exchange")),
            currency: parse_text(data.get("Currency")),
            source: NAME.to_string(),
        })
    }
}
