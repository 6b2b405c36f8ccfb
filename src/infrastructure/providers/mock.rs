use crate::domain::entities::market::{CompanyInfo, HistoryPeriod, InstrumentRef, PriceBar, PriceQuote};
use crate::domain::error::ProviderError;
use crate::domain::ports::chain_provider::{Capability, ChainProvider};
use crate::domain::ports::market_data_provider::DataProvider;
use async_trait::async_trait;
use chrono::{Datelike, Duration, NaiveDate, Utc};

pub const MOCK_PROVIDER: &str = "mock";

struct KnownCompany {
    symbol: &'static str,
    price: f64,
    name: &'static str,
    sector: &'static str,
    industry: &'static str,
    market_cap: f64,
}

const KNOWN: &[KnownCompany] = &[
    KnownCompany {
        symbol: "RELIANCE.NS",
        price: 2847.65,
        name: "Reliance Industries Limited",
        sector: "Energy",
        industry: "Oil & Gas Refining & Marketing",
        market_cap: 1.8e12,
    },
    KnownCompany {
        symbol: "TCS.NS",
        price: 3687.45,
        name: "Tata Consultancy Services Limited",
        sector: "Technology",
        industry: "Information Technology Services",
        market_cap: 1.4e12,
    },
    KnownCompany {
        symbol: "INFY.NS",
        price: 1532.25,
        name: "Infosys Limited",
        sector: "Technology",
        industry: "Information Technology Services",
        market_cap: 6.5e11,
    },
];

/// Network-free terminal tier of the data chain.
///
/// Output is a pure function of the symbol (and, for history, the end date):
/// the same request always yields the same numbers. Unknown symbols get a
/// price derived from a hash of the ticker.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockProvider;

impl MockProvider {
    pub fn new() -> Self {
        Self
    }

    fn known(symbol: &str) -> Option<&'static KnownCompany> {
        KNOWN.iter().find(|k| k.symbol == symbol)
    }

    fn base_price(symbol: &str) -> f64 {
        match Self::known(symbol) {
            Some(k) => k.price,
            None => 100.0 + (seed(symbol) % 490_000) as f64 / 100.0,
        }
    }

    pub fn quote(&self, instrument: &InstrumentRef) -> PriceQuote {
        PriceQuote {
            symbol: instrument.symbol.clone(),
            price: Self::base_price(&instrument.symbol),
            currency: "INR".to_string(),
            as_of: Utc::now(),
            source: MOCK_PROVIDER.to_string(),
        }
    }

    /// Daily bars ending at `end`, oldest first, weekends skipped.
    pub fn history(&self, instrument: &InstrumentRef, period: HistoryPeriod, end: NaiveDate) -> Vec<PriceBar> {
        let base = Self::base_price(&instrument.symbol);
        let mut rng = Lcg(seed(&instrument.symbol));
        let start = end - Duration::days(period.days());

        let mut bars = Vec::with_capacity(period.trading_days());
        let mut close = base;
        let mut date = start;
        while date <= end {
            if date.weekday().number_from_monday() <= 5 {
                let drift = (rng.next_unit() - 0.5) * 0.02;
                let open = close;
                close = (open * (1.0 + drift)).max(0.01);
                let spread = base * 0.01 * rng.next_unit();
                bars.push(PriceBar {
                    date,
                    open,
                    high: open.max(close) + spread,
                    low: (open.min(close) - spread).max(0.01),
                    close,
                    volume: 1_000_000 + (rng.next_u64() % 4_000_000),
                });
            }
            date += Duration::days(1);
        }
        bars
    }

    pub fn company(&self, instrument: &InstrumentRef) -> CompanyInfo {
        let known = Self::known(&instrument.symbol);
        CompanyInfo {
            symbol: instrument.symbol.clone(),
            name: known
                .map(|k| k.name.to_string())
                .unwrap_or_else(|| instrument.base.clone()),
            sector: known.map(|k| k.sector.to_string()),
            industry: known.map(|k| k.industry.to_string()),
            market_cap: known.map(|k| k.market_cap),
            exchange: Some("NSI".to_string()),
            currency: Some("INR".to_string()),
            source: MOCK_PROVIDER.to_string(),
        }
    }
}

#[async_trait]
impl ChainProvider for MockProvider {
    fn name(&self) -> &str {
        MOCK_PROVIDER
    }

    fn capabilities(&self) -> Vec<Capability> {
        vec![Capability::Price, Capability::History, Capability::Info, Capability::Probe]
    }

    async fn is_available(&self) -> bool {
        true
    }
}

#[async_trait]
impl DataProvider for MockProvider {
    async fn get_current_price(&self, instrument: &InstrumentRef) -> Result<PriceQuote, ProviderError> {
        Ok(self.quote(instrument))
    }

    async fn get_historical_data(
        &self,
        instrument: &InstrumentRef,
        period: HistoryPeriod,
    ) -> Result<Vec<PriceBar>, ProviderError> {
        Ok(self.history(instrument, period, Utc::now().date_naive()))
    }

    async fn get_company_info(&self, instrument: &InstrumentRef) -> Result<CompanyInfo, ProviderError> {
        Ok(self.company(instrument))
    }
}

/// FNV-1a over the ticker bytes.
fn seed(symbol: &str) -> u64 {
    symbol.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, b| {
        (hash ^ b as u64).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

struct Lcg(u64);

impl Lcg {
    fn next_u64(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        self.0 >> 11
    }

    fn next_unit(&mut self) -> f64 {
        (self.next_u64() % 1_000_000) as f64 / 1_000_000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instrument(symbol: &str) -> InstrumentRef {
        let base = symbol.split('.').next().unwrap_or(symbol).to_string();
        InstrumentRef {
            symbol: symbol.to_string(),
            canonical_key: format!("NSE_EQ|{base}"),
            base,
        }
    }

    #[test]
    fn test_known_symbol_price() {
        let quote = MockProvider.quote(&instrument("TCS.NS"));
        assert_eq!(quote.price, 3687.45);
        assert_eq!(quote.source, "mock");
    }

    #[test]
    fn test_unknown_symbol_is_deterministic() {
        let a = MockProvider.quote(&instrument("ZZZ.NS"));
        let b = MockProvider.quote(&instrument("ZZZ.NS"));
        assert_eq!(a.price, b.price);
        assert!(a.price >= 100.0 && a.price < 5000.0);
    }

    #[test]
    fn test_history_shape() {
        let end = NaiveDate::from_ymd_opt(2024, 3, 29).unwrap();
        let bars = MockProvider.history(&instrument("INFY.NS"), HistoryPeriod::OneMonth, end);
        assert!(!bars.is_empty());
        assert!(bars.windows(2).all(|w| w[0].date < w[1].date));
        assert!(bars.iter().all(|b| b.low <= b.open && b.open <= b.high));
        assert_eq!(bars, MockProvider.history(&instrument("INFY.NS"), HistoryPeriod::OneMonth, end));
    }

    #[test]
    fn test_company_fallback_name() {
        let info = MockProvider.company(&instrument("ZZZ.NS"));
        assert_eq!(info.name, "ZZZ");
        assert!(info.sector.is_none());
    }
}
