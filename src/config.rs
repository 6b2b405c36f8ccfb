//! Environment-driven configuration.
//!
//! Every section is a typed struct with documented defaults. Provider
//! constructors receive only their own section.

use crate::domain::error::DomainError;
use crate::domain::values::similarity::FuzzyMatcher;
use crate::infrastructure::cache::CacheTtls;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_DATASET_URL: &str =
    "https://assets.upstox.com/market-quote/instruments/exchange/complete.json";

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Holds the reference dataset and the resolution database. Default `cache`.
    pub cache_dir: PathBuf,
    pub dataset_url: String,
    /// Data providers in order. Default `yahoo, alpha_vantage, mock`.
    pub data_chain: Vec<String>,
    /// Language-model providers in order. Default `gemini, gpt, claude`.
    pub llm_chain: Vec<String>,
    pub cache_ttls: CacheTtls,
    pub matcher: FuzzyMatcher,
    /// Per-request deadline for every outbound HTTP call. Default 30s.
    pub http_timeout: Duration,
    pub yahoo: YahooConfig,
    pub alpha_vantage: AlphaVantageConfig,
    pub upstox: UpstoxConfig,
    pub gemini: LlmConfig,
    pub gpt: LlmConfig,
    pub claude: LlmConfig,
}

#[derive(Debug, Clone)]
pub struct YahooConfig {
    pub base_url: String,
    /// Minimum gap between calls. Default 500ms.
    pub min_interval: Duration,
}

impl Default for YahooConfig {
    fn default() -> Self {
        Self {
            base_url: "https://query1.finance.yahoo.com".to_string(),
            min_interval: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AlphaVantageConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    /// Free tier allows 5 calls a minute. Default 12s.
    pub min_interval: Duration,
}

impl Default for AlphaVantageConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://www.alphavantage.co".to_string(),
            min_interval: Duration::from_secs(12),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpstoxConfig {
    pub access_token: Option<String>,
    pub base_url: String,
    /// Default 100ms.
    pub min_interval: Duration,
}

impl Default for UpstoxConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            base_url: "https://api.upstox.com/v2".to_string(),
            min_interval: Duration::from_millis(100),
        }
    }
}

/// Settings shared by all language-model backends.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    /// Default 4000.
    pub max_tokens: u32,
    /// Default 0.7.
    pub temperature: f64,
    /// Default 30s.
    pub timeout: Duration,
}

impl LlmConfig {
    fn new(model: &str, base_url: &str) -> Self {
        Self {
            api_key: None,
            model: model.to_string(),
            base_url: base_url.to_string(),
            max_tokens: 4000,
            temperature: 0.7,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn gemini() -> Self {
        Self::new(
            "gemini-2.5-flash",
            "https://generativelanguage.googleapis.com/v1beta",
        )
    }

    pub fn gpt() -> Self {
        Self::new("gpt-4o-mini", "https://api.openai.com/v1")
    }

    pub fn claude() -> Self {
        Self::new("claude-3-sonnet-20240229", "https://api.anthropic.com/v1")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("cache"),
            dataset_url: DEFAULT_DATASET_URL.to_string(),
            data_chain: vec!["yahoo".into(), "alpha_vantage".into(), "mock".into()],
            llm_chain: vec!["gemini".into(), "gpt".into(), "claude".into()],
            cache_ttls: CacheTtls::default(),
            matcher: FuzzyMatcher::default(),
            http_timeout: Duration::from_secs(30),
            yahoo: YahooConfig::default(),
            alpha_vantage: AlphaVantageConfig::default(),
            upstox: UpstoxConfig::default(),
            gemini: LlmConfig::gemini(),
            gpt: LlmConfig::gpt(),
            claude: LlmConfig::claude(),
        }
    }
}

impl AppConfig {
    /// Loads `.env` if present, then reads the environment over the defaults.
    pub fn from_env() -> Result<Self, DomainError> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let data_chain = chain_from_env(
            "PRIMARY_DATA_PROVIDER",
            "FALLBACK_DATA_PROVIDERS",
            &defaults.data_chain,
        );
        let llm_chain = chain_from_env(
            "PRIMARY_LLM_PROVIDER",
            "FALLBACK_LLM_PROVIDERS",
            &defaults.llm_chain,
        );

        let defaults_ttl = defaults.cache_ttls;
        let cache_ttls = CacheTtls {
            quote: env_secs("ALPHARAG_QUOTE_TTL_SECS", defaults_ttl.quote),
            history: env_secs("ALPHARAG_HISTORY_TTL_SECS", defaults_ttl.history),
            company: env_secs("ALPHARAG_COMPANY_TTL_SECS", defaults_ttl.company),
            instrument: env_secs("ALPHARAG_INSTRUMENT_TTL_SECS", defaults_ttl.instrument),
        };

        let matcher = FuzzyMatcher {
            threshold: env_var_parse("ALPHARAG_FUZZY_THRESHOLD", defaults.matcher.threshold),
            jaccard_weight: env_var_parse("ALPHARAG_FUZZY_JACCARD_WEIGHT", defaults.matcher.jaccard_weight),
            length_weight: env_var_parse("ALPHARAG_FUZZY_LENGTH_WEIGHT", defaults.matcher.length_weight),
        };
        validate_matcher(&matcher)?;

        let http_timeout = env_secs("ALPHARAG_HTTP_TIMEOUT_SECS", defaults.http_timeout);

        let mut gemini = LlmConfig::gemini();
        gemini.api_key = first_env(&["GEMINI_API_KEY", "GOOGLE_API_KEY"]);
        let mut gpt = LlmConfig::gpt();
        gpt.api_key = first_env(&["OPENAI_API_KEY", "GPT_API_KEY"]);
        let mut claude = LlmConfig::claude();
        claude.api_key = first_env(&["ANTHROPIC_API_KEY", "CLAUDE_API_KEY"]);
        for llm in [&mut gemini, &mut gpt, &mut claude] {
            llm.timeout = http_timeout;
        }

        Ok(Self {
            cache_dir: std::env::var("ALPHARAG_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
            dataset_url: std::env::var("ALPHARAG_DATASET_URL").unwrap_or(defaults.dataset_url),
            data_chain,
            llm_chain,
            cache_ttls,
            matcher,
            http_timeout,
            yahoo: YahooConfig::default(),
            alpha_vantage: AlphaVantageConfig {
                api_key: first_env(&["ALPHA_VANTAGE_API_KEY"]),
                ..AlphaVantageConfig::default()
            },
            upstox: UpstoxConfig {
                access_token: first_env(&["UPSTOX_ACCESS_TOKEN"]),
                ..UpstoxConfig::default()
            },
            gemini,
            gpt,
            claude,
        })
    }

    pub fn dataset_path(&self) -> PathBuf {
        self.cache_dir.join("instruments.json")
    }

    pub fn resolution_db_path(&self) -> PathBuf {
        self.cache_dir.join("resolutions.db")
    }
}

fn validate_matcher(matcher: &FuzzyMatcher) -> Result<(), DomainError> {
    if !(0.0..=1.0).contains(&matcher.threshold) {
        return Err(DomainError::Config(format!(
            "fuzzy threshold must be within [0, 1], got {}",
            matcher.threshold
        )));
    }
    if matcher.jaccard_weight < 0.0 || matcher.length_weight < 0.0 {
        return Err(DomainError::Config("fuzzy weights must be non-negative".into()));
    }
    Ok(())
}

/// `primary` followed by the comma-separated `fallbacks`. Falls back to
/// `default` when the primary variable is unset.
fn chain_from_env(primary: &str, fallbacks: &str, default: &[String]) -> Vec<String> {
    let Some(primary) = non_empty_env(primary) else {
        return default.to_vec();
    };
    let mut chain = vec![primary.to_lowercase()];
    if let Some(rest) = non_empty_env(fallbacks) {
        chain.extend(parse_chain(&rest));
    }
    chain
}

pub fn parse_chain(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn first_env(keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| non_empty_env(key))
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_var_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chain() {
        assert_eq!(
            parse_chain(" Yahoo, alpha_vantage ,,MOCK "),
            vec!["yahoo", "alpha_vantage", "mock"]
        );
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.data_chain.last().map(String::as_str), Some("mock"));
        assert_eq!(config.dataset_path(), PathBuf::from("cache/instruments.json"));
        assert_eq!(config.alpha_vantage.min_interval, Duration::from_secs(12));
        assert_eq!(config.gemini.max_tokens, 4000);
    }

    #[test]
    fn test_matcher_validation() {
        assert!(validate_matcher(&FuzzyMatcher::default()).is_ok());
        assert!(validate_matcher(&FuzzyMatcher::default().with_threshold(1.5)).is_err());
    }
}
