use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What a data provider needs to address one instrument. Built by the
/// market data service from a resolver result so providers never resolve
/// symbols themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentRef {
    /// Vendor ticker, e.g. `RELIANCE.NS`.
    pub symbol: String,
    /// Suffix-free ticker, e.g. `RELIANCE`.
    pub base: String,
    /// Canonical key, e.g. `NSE_EQ|INE002A01018`.
    pub canonical_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub symbol: String,
    pub price: f64,
    pub currency: String,
    pub as_of: DateTime<Utc>,
    /// Provider that produced the quote.
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyInfo {
    pub symbol: String,
    pub name: String,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub market_cap: Option<f64>,
    pub exchange: Option<String>,
    pub currency: Option<String>,
    pub source: String,
}

/// Lookback window for historical bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HistoryPeriod {
    #[serde(rename = "1mo")]
    OneMonth,
    #[serde(rename = "3mo")]
    ThreeMonths,
    #[serde(rename = "6mo")]
    SixMonths,
    #[serde(rename = "1y")]
    OneYear,
    #[serde(rename = "2y")]
    TwoYears,
    #[serde(rename = "5y")]
    FiveYears,
}

impl HistoryPeriod {
    pub fn days(&self) -> i64 {
        match self {
            Self::OneMonth => 30,
            Self::ThreeMonths => 90,
            Self::SixMonths => 180,
            Self::OneYear => 365,
            Self::TwoYears => 730,
            Self::FiveYears => 1825,
        }
    }

    /// Trading days, roughly; used to size synthetic series.
    pub fn trading_days(&self) -> usize {
        (self.days() as usize * 5) / 7
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneMonth => "1mo",
            Self::ThreeMonths => "3mo",
            Self::SixMonths => "6mo",
            Self::OneYear => "1y",
            Self::TwoYears => "2y",
            Self::FiveYears => "5y",
        }
    }
}

impl Default for HistoryPeriod {
    fn default() -> Self {
        Self::OneYear
    }
}

impl fmt::Display for HistoryPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HistoryPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "1mo" => Ok(Self::OneMonth),
            "3mo" => Ok(Self::ThreeMonths),
            "6mo" => Ok(Self::SixMonths),
            "1y" => Ok(Self::OneYear),
            "2y" => Ok(Self::TwoYears),
            "5y" => Ok(Self::FiveYears),
            _ => Err(format!("Invalid period: '{s}' (expected 1mo, 3mo, 6mo, 1y, 2y or 5y)")),
        }
    }
}
