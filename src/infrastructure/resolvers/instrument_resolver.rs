use crate::domain::entities::instrument::{CompanyProfile, SymbolResolution};
use crate::domain::ports::clock::{Clock, SystemClock};
use crate::domain::ports::resolution_store::ResolutionStore;
use crate::domain::values::confidence::Confidence;
use crate::domain::values::match_kind::MatchKind;
use crate::domain::values::similarity::FuzzyMatcher;
use crate::domain::values::symbol::{clean_symbol, Exchange, NormalizedSymbol};
use crate::infrastructure::cache::{CacheNamespace, CachedValue, SharedCache};
use crate::infrastructure::resolvers::dataset::{DatasetIndex, DatasetInfo, InstrumentDataset};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

/// Large caps that resolve without touching the dataset.
const MANUAL_KEYS: &[(&str, &str)] = &[
    ("RELIANCE.NS", "NSE_EQ|INE002A01018"),
    ("TCS.NS", "NSE_EQ|INE467B01029"),
    ("INFY.NS", "NSE_EQ|INE009A01021"),
    ("WIPRO.NS", "NSE_EQ|INE075A01022"),
    ("HDFCBANK.NS", "NSE_EQ|INE040A01034"),
    ("ICICIBANK.NS", "NSE_EQ|INE090A01021"),
    ("SBIN.NS", "NSE_EQ|INE062A01020"),
    ("LT.NS", "NSE_EQ|INE018A01030"),
    ("HCLTECH.NS", "NSE_EQ|INE860A01027"),
    ("TECHM.NS", "NSE_EQ|INE669C01036"),
    ("ADANIPORTS.NS", "NSE_EQ|INE742F01042"),
    ("HINDUNILVR.NS", "NSE_EQ|INE030A01027"),
    ("ITC.NS", "NSE_EQ|INE154A01025"),
    ("BHARTIARTL.NS", "NSE_EQ|INE397D01024"),
    ("MARUTI.NS", "NSE_EQ|INE585B01010"),
];

const EXACT_CONFIDENCE: f64 = 0.95;
const FUZZY_CONFIDENCE_CAP: f64 = 0.9;
const SYNTHESIZED_CONFIDENCE: f64 = 0.3;

/// Load outcomes are stamped with the day they were made on and redone
/// once the clock moves to another day.
enum DatasetState {
    NotLoaded,
    Missing { on: NaiveDate },
    Loaded { index: Arc<DatasetIndex>, on: NaiveDate },
}

#[derive(Debug, Default)]
struct Counters {
    dataset_loads: AtomicU64,
    dataset_scans: AtomicU64,
    cache_hits: AtomicU64,
    store_hits: AtomicU64,
    table_hits: AtomicU64,
    synthesized: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolverStats {
    pub dataset_loads: u64,
    /// Full passes over the dataset (exact or fuzzy search).
    pub dataset_scans: u64,
    pub cache_hits: u64,
    pub store_hits: u64,
    /// Hits on the manual/learned table.
    pub table_hits: u64,
    pub synthesized: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolverCacheInfo {
    pub dataset: DatasetInfo,
    pub dataset_rows: Option<usize>,
    pub table_entries: usize,
    pub persisted_entries: Option<usize>,
    pub stats: ResolverStats,
}

/// Maps loosely written tickers onto canonical instrument keys.
///
/// Lookup order: manual/learned table, shared cache, persisted store,
/// exact dataset match, fuzzy dataset match, synthesis. Every step
/// short-circuits and `resolve` never fails.
pub struct InstrumentResolver {
    dataset: InstrumentDataset,
    state: AsyncMutex<DatasetState>,
    table: Mutex<HashMap<String, (String, MatchKind)>>,
    cache: Arc<SharedCache>,
    store: Option<Arc<dyn ResolutionStore>>,
    matcher: FuzzyMatcher,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    counters: Counters,
}

impl InstrumentResolver {
    pub fn new(dataset: InstrumentDataset, cache: Arc<SharedCache>, matcher: FuzzyMatcher, ttl: Duration) -> Self {
        let table = MANUAL_KEYS
            .iter()
            .map(|(symbol, key)| (symbol.to_string(), (key.to_string(), MatchKind::Manual)))
            .collect();
        Self {
            dataset,
            state: AsyncMutex::new(DatasetState::NotLoaded),
            table: Mutex::new(table),
            cache,
            store: None,
            matcher,
            ttl,
            clock: Arc::new(SystemClock),
            counters: Counters::default(),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn ResolutionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub async fn resolve(&self, raw: &str) -> SymbolResolution {
        let Some(symbol) = NormalizedSymbol::parse(raw) else {
            warn!(input = raw, "Nothing symbol-like in input, synthesizing empty key");
            self.counters.synthesized.fetch_add(1, Ordering::Relaxed);
            let cleaned = clean_symbol(raw);
            return SymbolResolution {
                input_symbol: raw.to_string(),
                normalized_symbol: cleaned.clone(),
                canonical_key: format!("{}|{}", Exchange::default().segment(), cleaned),
                match_kind: MatchKind::Synthesized,
                confidence: Confidence::saturating(0.0),
            };
        };

        if let Some((key, kind)) = self.table_lookup(&symbol.symbol) {
            self.counters.table_hits.fetch_add(1, Ordering::Relaxed);
            debug!(symbol = %symbol, key = %key, kind = %kind, "Resolved from table");
            let confidence = match kind {
                MatchKind::Manual => Confidence::CERTAIN,
                _ => Confidence::saturating(EXACT_CONFIDENCE),
            };
            return resolution(raw, &symbol, key, kind, confidence);
        }

        let cache_key = CacheNamespace::Instrument.key(&[&symbol.symbol]);
        if let Some(CachedValue::Resolution(mut hit)) = self.cache.get(&cache_key) {
            self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
            debug!(symbol = %symbol, key = %hit.canonical_key, "Resolved from cache");
            hit.input_symbol = raw.to_string();
            return hit;
        }

        if let Some(mut stored) = self.stored(&symbol.symbol) {
            self.counters.store_hits.fetch_add(1, Ordering::Relaxed);
            stored.input_symbol = raw.to_string();
            self.remember(&cache_key, &stored, false);
            return stored;
        }

        let resolved = match self.dataset().await {
            Some(index) => self.search(raw, &symbol, &index),
            None => None,
        };

        let resolved = resolved.unwrap_or_else(|| {
            self.counters.synthesized.fetch_add(1, Ordering::Relaxed);
            let key = symbol.synthesized_key();
            warn!(symbol = %symbol, key = %key, "No dataset match, synthesizing key");
            resolution(
                raw,
                &symbol,
                key,
                MatchKind::Synthesized,
                Confidence::saturating(SYNTHESIZED_CONFIDENCE),
            )
        });

        self.remember(&cache_key, &resolved, true);
        resolved
    }

    /// Resolves each symbol in order. Keys are the inputs as given.
    pub async fn bulk_resolve(&self, symbols: &[String]) -> BTreeMap<String, String> {
        let mut mapping = BTreeMap::new();
        for s in symbols {
            let r = self.resolve(s).await;
            mapping.insert(s.clone(), r.canonical_key);
        }
        mapping
    }

    /// Dataset row for a resolved symbol, located via its canonical key.
    pub async fn company_profile(&self, raw: &str) -> Option<CompanyProfile> {
        let resolution = self.resolve(raw).await;
        let index = self.dataset().await?;
        let row = index.by_key(&resolution.canonical_key)?;
        Some(CompanyProfile {
            symbol: resolution.normalized_symbol,
            trading_symbol: row.trading_symbol.clone(),
            company_name: row.display_name.clone(),
            exchange: row.exchange.clone(),
            instrument_type: row.instrument_type.clone(),
            canonical_key: row.canonical_key.clone(),
            match_kind: resolution.match_kind,
        })
    }

    /// Forces a dataset download and swaps it in on success.
    pub async fn refresh_dataset(&self) -> bool {
        let mut state = self.state.lock().await;
        match self.dataset.download().await {
            Ok(index) => {
                self.counters.dataset_loads.fetch_add(1, Ordering::Relaxed);
                *state = DatasetState::Loaded {
                    index: Arc::new(index),
                    on: self.clock.now().date_naive(),
                };
                true
            }
            Err(e) => {
                warn!(error = %e, "Dataset refresh failed, keeping current state");
                false
            }
        }
    }

    pub async fn cache_info(&self) -> ResolverCacheInfo {
        let dataset_rows = match &*self.state.lock().await {
            DatasetState::Loaded { index, .. } => Some(index.len()),
            _ => None,
        };
        let persisted_entries = self.store.as_ref().and_then(|s| match s.count() {
            Ok(n) => Some(n),
            Err(e) => {
                warn!(error = %e, "Cannot count persisted resolutions");
                None
            }
        });
        ResolverCacheInfo {
            dataset: self.dataset.info(),
            dataset_rows,
            table_entries: self.table.lock().unwrap_or_else(|e| e.into_inner()).len(),
            persisted_entries,
            stats: self.stats(),
        }
    }

    pub fn stats(&self) -> ResolverStats {
        let c = &self.counters;
        ResolverStats {
            dataset_loads: c.dataset_loads.load(Ordering::Relaxed),
            dataset_scans: c.dataset_scans.load(Ordering::Relaxed),
            cache_hits: c.cache_hits.load(Ordering::Relaxed),
            store_hits: c.store_hits.load(Ordering::Relaxed),
            table_hits: c.table_hits.load(Ordering::Relaxed),
            synthesized: c.synthesized.load(Ordering::Relaxed),
        }
    }

    fn table_lookup(&self, symbol: &str) -> Option<(String, MatchKind)> {
        self.table
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(symbol)
            .cloned()
    }

    fn stored(&self, symbol: &str) -> Option<SymbolResolution> {
        let store = self.store.as_ref()?;
        let stored = match store.get(symbol) {
            Ok(found) => found?,
            Err(e) => {
                warn!(symbol, error = %e, "Resolution store read failed");
                return None;
            }
        };
        let age = (self.clock.now() - stored.resolved_at).to_std().unwrap_or(Duration::ZERO);
        if age >= self.ttl {
            debug!(symbol, "Persisted resolution expired");
            return None;
        }
        Some(stored.resolution)
    }

    fn remember(&self, cache_key: &str, resolution: &SymbolResolution, persist: bool) {
        self.cache.put(
            cache_key.to_string(),
            CachedValue::Resolution(resolution.clone()),
            self.ttl,
        );
        if !persist || !resolution.match_kind.is_persistable() {
            return;
        }
        if let Some(store) = &self.store {
            if let Err(e) = store.put(resolution, self.clock.now()) {
                warn!(symbol = %resolution.normalized_symbol, error = %e, "Resolution store write failed");
            }
        }
    }

    /// Loads the dataset on first use and again on the first lookup of each
    /// new day. A failed daily reload keeps the index already in memory; a
    /// failed first load is remembered until the day changes or
    /// `refresh_dataset` succeeds.
    async fn dataset(&self) -> Option<Arc<DatasetIndex>> {
        let today = self.clock.now().date_naive();
        let mut state = self.state.lock().await;
        match &*state {
            DatasetState::Loaded { index, on } if *on == today => return Some(index.clone()),
            DatasetState::Missing { on } if *on == today => return None,
            _ => {}
        }
        match self.dataset.load().await {
            Ok(index) => {
                self.counters.dataset_loads.fetch_add(1, Ordering::Relaxed);
                let index = Arc::new(index);
                *state = DatasetState::Loaded {
                    index: index.clone(),
                    on: today,
                };
                Some(index)
            }
            Err(e) => {
                let previous = match &*state {
                    DatasetState::Loaded { index, .. } => Some(index.clone()),
                    _ => None,
                };
                match previous {
                    Some(index) => {
                        warn!(error = %e, "Daily dataset reload failed, keeping previous index");
                        *state = DatasetState::Loaded {
                            index: index.clone(),
                            on: today,
                        };
                        Some(index)
                    }
                    None => {
                        warn!(error = %e, "Instrument dataset unavailable, resolver will synthesize keys");
                        *state = DatasetState::Missing { on: today };
                        None
                    }
                }
            }
        }
    }

    fn search(&self, raw: &str, symbol: &NormalizedSymbol, index: &DatasetIndex) -> Option<SymbolResolution> {
        let segment = symbol.exchange.segment();

        self.counters.dataset_scans.fetch_add(1, Ordering::Relaxed);
        if let Some(row) = index
            .equities(segment)
            .find(|r| r.trading_symbol.eq_ignore_ascii_case(&symbol.base) && !r.canonical_key.is_empty())
        {
            info!(symbol = %symbol, key = %row.canonical_key, "Exact dataset match");
            self.table
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(symbol.symbol.clone(), (row.canonical_key.clone(), MatchKind::Exact));
            return Some(resolution(
                raw,
                symbol,
                row.canonical_key.clone(),
                MatchKind::Exact,
                Confidence::saturating(EXACT_CONFIDENCE),
            ));
        }

        let candidates = index.equities(segment).filter(|r| !r.canonical_key.is_empty());
        let (row, score) = self
            .matcher
            .best_match(&symbol.base, candidates, |r| (r.trading_symbol.as_str(), r.display_name.as_str()))?;
        info!(
            symbol = %symbol,
            matched = %row.trading_symbol,
            key = %row.canonical_key,
            score,
            "Fuzzy dataset match"
        );
        Some(resolution(
            raw,
            symbol,
            row.canonical_key.clone(),
            MatchKind::Fuzzy,
            Confidence::saturating(score.min(FUZZY_CONFIDENCE_CAP)),
        ))
    }
}

fn resolution(
    raw: &str,
    symbol: &NormalizedSymbol,
    canonical_key: String,
    match_kind: MatchKind,
    confidence: Confidence,
) -> SymbolResolution {
    SymbolResolution {
        input_symbol: raw.to_string(),
        normalized_symbol: symbol.symbol.clone(),
        canonical_key,
        match_kind,
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::cache::TtlCache;

    fn offline_resolver(dir: &std::path::Path) -> InstrumentResolver {
        let dataset = InstrumentDataset::new(
            dir.join("instruments.json"),
            "http://127.0.0.1:1/",
            Duration::from_secs(1),
            Arc::new(SystemClock),
        );
        InstrumentResolver::new(
            dataset,
            Arc::new(TtlCache::new()),
            FuzzyMatcher::default(),
            Duration::from_secs(86_400),
        )
    }

    #[tokio::test]
    async fn test_manual_table_needs_no_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = offline_resolver(dir.path());
        let r = resolver.resolve(" reliance ").await;
        assert_eq!(r.canonical_key, "NSE_EQ|INE002A01018");
        assert_eq!(r.match_kind, MatchKind::Manual);
        assert_eq!(r.confidence, Confidence::CERTAIN);
        assert_eq!(resolver.stats().dataset_loads, 0);
    }

    #[tokio::test]
    async fn test_offline_synthesizes_bse_key() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = offline_resolver(dir.path());
        let r = resolver.resolve("NEWCO.BO").await;
        assert_eq!(r.canonical_key, "BSE_EQ|NEWCO");
        assert_eq!(r.match_kind, MatchKind::Synthesized);
    }

    #[tokio::test]
    async fn test_blank_input_never_fails() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = offline_resolver(dir.path());
        let r = resolver.resolve("  ").await;
        assert_eq!(r.match_kind, MatchKind::Synthesized);
        assert_eq!(r.confidence.value(), 0.0);
    }
}
