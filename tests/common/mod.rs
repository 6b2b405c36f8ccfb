//! Shared test helpers.
#![allow(dead_code)]

use alpharag::application::fallback::FallbackChain;
use alpharag::application::predictions::EMERGENCY_RULES;
use alpharag::config::AppConfig;
use alpharag::domain::entities::market::{CompanyInfo, HistoryPeriod, InstrumentRef, PriceBar, PriceQuote};
use alpharag::domain::entities::prediction::{Action, Prediction, PredictionRequest, Recommendation};
use alpharag::domain::error::ProviderError;
use alpharag::domain::ports::chain_provider::{Capability, ChainProvider};
use alpharag::domain::ports::clock::SystemClock;
use alpharag::domain::ports::llm_provider::LlmProvider;
use alpharag::domain::ports::market_data_provider::DataProvider;
use alpharag::infrastructure::providers::MOCK_PROVIDER;
use alpharag::AlphaRag;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Unreachable port; connections are refused immediately.
pub const OFFLINE_URL: &str = "http://127.0.0.1:1/complete.json";

/// Config that never touches the network: offline dataset, tempdir cache.
pub fn offline_config(cache_dir: &Path) -> AppConfig {
    AppConfig {
        cache_dir: cache_dir.to_path_buf(),
        dataset_url: OFFLINE_URL.to_string(),
        http_timeout: std::time::Duration::from_secs(2),
        ..AppConfig::default()
    }
}

pub fn setup(
    cache_dir: &Path,
    data: Vec<Arc<dyn DataProvider>>,
    llm: Vec<Arc<dyn LlmProvider>>,
) -> AlphaRag {
    AlphaRag::with_chains(
        offline_config(cache_dir),
        FallbackChain::new(data, MOCK_PROVIDER),
        FallbackChain::new(llm, EMERGENCY_RULES),
        Arc::new(SystemClock),
    )
    .unwrap()
}

/// Data provider with scripted behaviour and call counters.
pub struct StubData {
    pub name: &'static str,
    pub available: bool,
    pub fails: bool,
    pub price: f64,
    pub probes: AtomicUsize,
    pub calls: AtomicUsize,
}

impl StubData {
    pub fn new(name: &'static str, available: bool, fails: bool, price: f64) -> Arc<Self> {
        Arc::new(Self {
            name,
            available,
            fails,
            price,
            probes: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    fn call(&self) -> Result<(), ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fails {
            Err(ProviderError::failed(self.name, "scripted failure"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ChainProvider for StubData {
    fn name(&self) -> &str {
        self.name
    }

    fn capabilities(&self) -> Vec<Capability> {
        vec![Capability::Price, Capability::History, Capability::Info, Capability::Probe]
    }

    async fn is_available(&self) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.available
    }
}

#[async_trait]
impl DataProvider for StubData {
    async fn get_current_price(&self, instrument: &InstrumentRef) -> Result<PriceQuote, ProviderError> {
        self.call()?;
        Ok(PriceQuote {
            symbol: instrument.symbol.clone(),
            price: self.price,
            currency: "INR".into(),
            as_of: Utc::now(),
            source: self.name.to_string(),
        })
    }

    async fn get_historical_data(
        &self,
        _instrument: &InstrumentRef,
        _period: HistoryPeriod,
    ) -> Result<Vec<PriceBar>, ProviderError> {
        self.call()?;
        let date = NaiveDate::from_ymd_opt(2024, 3, 28).unwrap();
        Ok(vec![PriceBar {
            date,
            open: self.price,
            high: self.price,
            low: self.price,
            close: self.price,
            volume: 1,
        }])
    }

    async fn get_company_info(&self, instrument: &InstrumentRef) -> Result<CompanyInfo, ProviderError> {
        self.call()?;
        Ok(CompanyInfo {
            symbol: instrument.symbol.clone(),
            name: format!("{} from {}", instrument.base, self.name),
            sector: None,
            industry: None,
            market_cap: None,
            exchange: None,
            currency: None,
            source: self.name.to_string(),
        })
    }
}

#[derive(Clone, Copy)]
pub enum LlmBehaviour {
    Answers(Action),
    Unusable,
    Errors,
}

pub struct StubLlm {
    pub name: &'static str,
    pub behaviour: LlmBehaviour,
    pub calls: AtomicUsize,
}

impl StubLlm {
    pub fn new(name: &'static str, behaviour: LlmBehaviour) -> Arc<Self> {
        Arc::new(Self {
            name,
            behaviour,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainProvider for StubLlm {
    fn name(&self) -> &str {
        self.name
    }

    fn capabilities(&self) -> Vec<Capability> {
        vec![Capability::Generate]
    }

    async fn is_available(&self) -> bool {
        true
    }
}

#[async_trait]
impl LlmProvider for StubLlm {
    async fn generate(&self, request: &PredictionRequest) -> Result<Prediction, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let action = match self.behaviour {
            LlmBehaviour::Errors => return Err(ProviderError::failed(self.name, "quota exceeded")),
            LlmBehaviour::Unusable => None,
            LlmBehaviour::Answers(action) => Some(action),
        };
        let recommendations: BTreeMap<String, Recommendation> = match action {
            Some(action) => request
                .holdings
                .iter()
                .map(|h| {
                    (
                        h.symbol.clone(),
                        Recommendation {
                            action,
                            confidence: 9,
                            reasoning: format!("{} says so", self.name),
                        },
                    )
                })
                .collect(),
            None => BTreeMap::new(),
        };
        Ok(Prediction {
            recommendations,
            portfolio_analysis: String::new(),
            action_items: Vec::new(),
            market_insights: String::new(),
            generated_at: Utc::now(),
            fallback_mode: action.is_none(),
        })
    }
}

/// Minimal reference dataset in the vendor's JSON layout.
pub fn dataset_json() -> String {
    serde_json::json!([
        {"segment": "NSE_EQ", "name": "HDFC BANK LTD", "exchange": "NSE", "instrument_type": "EQ",
         "instrument_key": "NSE_EQ|INE040A01034", "trading_symbol": "HDFCBANK"},
        {"segment": "NSE_EQ", "name": "ZOMATO LIMITED", "exchange": "NSE", "instrument_type": "EQ",
         "instrument_key": "NSE_EQ|INE758T01015", "trading_symbol": "ZOMATO"},
        {"segment": "NSE_EQ", "name": "TATA STEEL LIMITED", "exchange": "NSE", "instrument_type": "EQ",
         "instrument_key": "NSE_EQ|INE081A01020", "trading_symbol": "TATASTEEL"},
        {"segment": "BSE_EQ", "name": "ZOMATO LIMITED", "exchange": "BSE", "instrument_type": "EQ",
         "instrument_key": "BSE_EQ|INE758T01015", "trading_symbol": "ZOMATO"},
        {"segment": "NSE_FO", "name": "ZOMATO FUT", "exchange": "NSE", "instrument_type": "FUT",
         "instrument_key": "NSE_FO|12345", "trading_symbol": "ZOMATO24MARFUT"}
    ])
    .to_string()
}
