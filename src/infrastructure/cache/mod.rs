pub mod ttl_cache;

use crate::domain::entities::instrument::SymbolResolution;
use crate::domain::entities::market::{CompanyInfo, PriceBar, PriceQuote};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use ttl_cache::TtlCache;

/// Logical data kinds sharing the one cache store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheNamespace {
    Quote,
    History,
    Company,
    Instrument,
}

impl CacheNamespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheNamespace::Quote => "quote",
            CacheNamespace::History => "history",
            CacheNamespace::Company => "company",
            CacheNamespace::Instrument => "instrument",
        }
    }

    /// Format: `{namespace}:{part}[:{part}...]`
    pub fn key(&self, parts: &[&str]) -> String {
        let mut key = self.as_str().to_string();
        for part in parts {
            key.push(':');
            key.push_str(part);
        }
        key
    }
}

/// Time-to-live per namespace. Quotes go stale fastest, instrument
/// resolutions slowest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CacheTtls {
    pub quote: Duration,
    pub history: Duration,
    pub company: Duration,
    pub instrument: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            quote: Duration::from_secs(300),
            history: Duration::from_secs(1800),
            company: Duration::from_secs(3600),
            instrument: Duration::from_secs(86_400),
        }
    }
}

impl CacheTtls {
    pub fn for_namespace(&self, namespace: CacheNamespace) -> Duration {
        match namespace {
            CacheNamespace::Quote => self.quote,
            CacheNamespace::History => self.history,
            CacheNamespace::Company => self.company,
            CacheNamespace::Instrument => self.instrument,
        }
    }
}

/// Everything the shared store can hold.
#[derive(Debug, Clone)]
pub enum CachedValue {
    Quote(PriceQuote),
    History { bars: Vec<PriceBar>, source: String },
    Company(CompanyInfo),
    Resolution(SymbolResolution),
}

/// The process-wide cache shared by the market data service and the resolver.
pub type SharedCache = TtlCache<String, CachedValue>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_format() {
        assert_eq!(CacheNamespace::Quote.key(&["RELIANCE.NS"]), "quote:RELIANCE.NS");
        assert_eq!(
            CacheNamespace::History.key(&["TCS.NS", "1y"]),
            "history:TCS.NS:1y"
        );
    }

    #[test]
    fn test_quotes_expire_before_metadata() {
        let ttls = CacheTtls::default();
        assert!(ttls.for_namespace(CacheNamespace::Quote) < ttls.for_namespace(CacheNamespace::Company));
        assert!(ttls.for_namespace(CacheNamespace::Company) < ttls.for_namespace(CacheNamespace::Instrument));
    }
}
