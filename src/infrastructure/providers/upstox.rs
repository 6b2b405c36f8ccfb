use crate::config::UpstoxConfig;
use crate::domain::entities::market::{CompanyInfo, HistoryPeriod, InstrumentRef, PriceBar, PriceQuote};
use crate::domain::error::ProviderError;
use crate::domain::ports::chain_provider::{Capability, ChainProvider};
use crate::domain::ports::market_data_provider::DataProvider;
use crate::infrastructure::rate_limiter::IntervalRateLimiter;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

const NAME: &str = "upstox";
const PROBE_KEY: &str = "NSE_EQ|INE002A01018";

/// Upstox v2 market-quote and historical-candle APIs. Addresses instruments
/// by canonical key, so it depends on the resolver having done its job.
pub struct UpstoxProvider {
    access_token: String,
    base_url: String,
    client: reqwest::Client,
    limiter: IntervalRateLimiter,
}

#[derive(Debug, serde::Deserialize)]
struct Envelope {
    status: String,
    #[serde(default)]
    data: Value,
}

impl UpstoxProvider {
    pub fn new(config: &UpstoxConfig, timeout: Duration) -> Result<Self, ProviderError> {
        let access_token = config
            .access_token
            .clone()
            .ok_or_else(|| ProviderError::MissingCredentials {
                provider: NAME.to_string(),
                missing: "UPSTOX_ACCESS_TOKEN".to_string(),
            })?;

        Ok(Self {
            access_token,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            limiter: IntervalRateLimiter::new(NAME, config.min_interval),
        })
    }

    async fn get(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<Value, ProviderError> {
        self.limiter.acquire().await;
        debug!(provider = NAME, endpoint, "Upstox request");

        let resp = self
            .client
            .get(format!("{}{endpoint}", self.base_url))
            .bearer_auth(&self.access_token)
            .header("Accept", "application/json")
            .query(query)
            .send()
            .await
            .map_err(|e| ProviderError::from_http(NAME, e))?;

        if !resp.status().is_success() {
            return Err(ProviderError::failed(NAME, format!("HTTP {} for {endpoint}", resp.status())));
        }

        let envelope: Envelope = resp
            .json()
            .await
            .map_err(|e| ProviderError::failed(NAME, format!("Invalid JSON: {e}")))?;
        if envelope.status != "success" {
            return Err(ProviderError::failed(NAME, format!("status '{}'", envelope.status)));
        }
        Ok(envelope.data)
    }

    async fn quote_entry(&self, instrument: &InstrumentRef) -> Result<Value, ProviderError> {
        let data = self
            .get("/market-quote/quotes", &[("instrument_key", instrument.canonical_key.as_str())])
            .await?;
        find_quote(&data, instrument)
            .cloned()
            .ok_or_else(|| ProviderError::no_data(NAME, &instrument.symbol))
    }
}

/// The quote API keys its response by `SEGMENT:SYMBOL` rather than by the
/// requested instrument key, so match on any of the three identifiers.
fn find_quote<'a>(data: &'a Value, instrument: &InstrumentRef) -> Option<&'a Value> {
    let quotes = data.as_object()?;
    let suffix = format!(":{}", instrument.base);
    quotes
        .iter()
        .find(|(key, quote)| {
            quote.get("instrument_token").and_then(Value::as_str) == Some(instrument.canonical_key.as_str())
                || key.ends_with(&suffix)
                || quote.get("symbol").and_then(Value::as_str) == Some(instrument.base.as_str())
        })
        .map(|(_, quote)| quote)
        .or_else(|| quotes.get(&instrument.canonical_key))
}

/// Candles are `[timestamp, open, high, low, close, volume, oi]`, newest first.
fn parse_candles(data: &Value) -> Vec<PriceBar> {
    let Some(candles) = data.get("candles").and_then(Value::as_array) else {
        return Vec::new();
    };
    let mut bars: Vec<PriceBar> = candles
        .iter()
        .filter_map(|c| {
            let c = c.as_array()?;
            let date = DateTime::parse_from_rfc3339(c.first()?.as_str()?).ok()?.date_naive();
            Some(PriceBar {
                date,
                open: c.get(1)?.as_f64()?,
                high: c.get(2)?.as_f64()?,
                low: c.get(3)?.as_f64()?,
                close: c.get(4)?.as_f64()?,
                volume: c.get(5).and_then(Value::as_f64).unwrap_or(0.0) as u64,
            })
        })
        .collect();
    bars.sort_by_key(|b| b.date);
    bars
}

#[async_trait]
impl ChainProvider for UpstoxProvider {
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
        match self.get("/market-quote/quotes", &[("instrument_key", PROBE_KEY)]).await {
            Ok(_) => true,
            Err(e) => {
                warn!(provider = NAME, error = %e, "Availability probe failed");
                false
            }
        }
    }
}

#[async_trait]
impl DataProvider for UpstoxProvider {
    async fn get_current_price(&self, instrument: &InstrumentRef) -> Result<PriceQuote, ProviderError> {
        let quote = self.quote_entry(instrument).await?;
        let price = quote
            .get("last_price")
            .and_then(Value::as_f64)
            .filter(|p| *p > 0.0)
            .ok_or_else(|| ProviderError::no_data(NAME, &instrument.symbol))?;

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
        let to = Utc::now().date_naive();
        let from = to - ChronoDuration::days(period.days());
        // Path order is to-date before from-date.
        let endpoint = format!(
            "/historical-candle/{}/day/{}/{}",
            instrument.canonical_key.replace('|', "%7C"),
            to.format("%Y-%m-%d"),
            from.format("%Y-%m-%d"),
        );
        let bars = parse_candles(&self.get(&endpoint, &[]).await?);
        if bars.is_empty() {
            return Err(ProviderError::no_data(NAME, &instrument.symbol));
        }
        Ok(bars)
    }

    async fn get_company_info(&self, instrument: &InstrumentRef) -> Result<CompanyInfo, ProviderError> {
        let quote = self.quote_entry(instrument).await?;
        let exchange = instrument
            .canonical_key
            .split('_')
            .next()
            .map(str::to_string);

        Ok(CompanyInfo {
            symbol: instrument.symbol.clone(),
            name: quote
                .get("instrument_name")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| instrument.base.clone()),
            sector: None,
            industry: None,
            market_cap: None,
            exchange,
            currency: Some("INR".to_string()),
            source: NAME.to_string(),
        })
    }
}
