pub mod claude;
pub mod gemini;
pub mod openai;

use crate::application::fallback::ProviderRegistry;
use crate::application::prompt::{build_prompt, parse_analysis};
use crate::config::{AppConfig, LlmConfig};
use crate::domain::entities::prediction::{Prediction, PredictionRequest};
use crate::domain::error::ProviderError;
use crate::domain::ports::chain_provider::{Capability, ChainProvider};
use crate::domain::ports::llm_provider::LlmProvider;
use crate::infrastructure::cache::TtlCache;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub use claude::ClaudeClient;
pub use gemini::GeminiClient;
pub use openai::OpenAiClient;

const PROBE_PROMPT: &str = "Hello, respond with 'API Working'";
const PROBE_MAX_TOKENS: u32 = 10;
const PROBE_TTL: Duration = Duration::from_secs(300);

/// One vendor's text-completion endpoint.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    fn name(&self) -> &str;

    /// Endpoint, model and sampling settings, without the key.
    fn settings(&self) -> BTreeMap<String, String>;

    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, ProviderError>;
}

/// Adapts a completion endpoint into a chain provider: builds the prompt,
/// parses the answer, and memoizes the availability probe.
pub struct ChatProvider<C> {
    client: C,
    max_tokens: u32,
    probe: TtlCache<(), bool>,
}

impl<C: CompletionClient> ChatProvider<C> {
    pub fn new(client: C, max_tokens: u32) -> Self {
        Self {
            client,
            max_tokens,
            probe: TtlCache::new(),
        }
    }
}

#[async_trait]
impl<C: CompletionClient> ChainProvider for ChatProvider<C> {
    fn name(&self) -> &str {
        self.client.name()
    }

    fn capabilities(&self) -> Vec<Capability> {
        vec![Capability::Generate, Capability::Probe]
    }

    fn settings(&self) -> BTreeMap<String, String> {
        let mut settings = self.client.settings();
        settings.insert("max_tokens".to_string(), self.max_tokens.to_string());
        settings
    }

    async fn is_available(&self) -> bool {
        if let Some(available) = self.probe.get(&()) {
            return available;
        }
        let available = match self.client.complete(PROBE_PROMPT, PROBE_MAX_TOKENS).await {
            Ok(_) => true,
            Err(e) => {
                warn!(provider = self.client.name(), error = %e, "Availability probe failed");
                false
            }
        };
        self.probe.put((), available, PROBE_TTL);
        available
    }
}

#[async_trait]
impl<C: CompletionClient> LlmProvider for ChatProvider<C> {
    async fn generate(&self, request: &PredictionRequest) -> Result<Prediction, ProviderError> {
        let prompt = build_prompt(request);
        info!(provider = self.client.name(), holdings = request.holdings.len(), "Generating predictions");
        let text = self.client.complete(&prompt, self.max_tokens).await?;
        Ok(parse_analysis(&text, request))
    }
}

fn require_key(provider: &str, config: &LlmConfig, env: &str) -> Result<String, ProviderError> {
    config.api_key.clone().ok_or_else(|| ProviderError::MissingCredentials {
        provider: provider.to_string(),
        missing: env.to_string(),
    })
}

pub(crate) fn client_settings(model: &str, base_url: &str, temperature: f64) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("model".to_string(), model.to_string()),
        ("base_url".to_string(), base_url.to_string()),
        ("temperature".to_string(), temperature.to_string()),
    ])
}

pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

/// Error body text, truncated for logs.
pub(crate) async fn error_body(resp: reqwest::Response) -> String {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    let body: String = body.chars().take(300).collect();
    format!("HTTP {status}: {body}")
}

pub fn llm_provider_registry() -> ProviderRegistry<dyn LlmProvider, AppConfig> {
    ProviderRegistry::new()
        .register("gemini", |c: &AppConfig| {
            let key = require_key("gemini", &c.gemini, "GEMINI_API_KEY")?;
            Ok(Arc::new(ChatProvider::new(GeminiClient::new(key, &c.gemini), c.gemini.max_tokens)) as Arc<dyn LlmProvider>)
        })
        .register("gpt", |c: &AppConfig| {
            let key = require_key("gpt", &c.gpt, "OPENAI_API_KEY")?;
            Ok(Arc::new(ChatProvider::new(OpenAiClient::new(key, &c.gpt), c.gpt.max_tokens)) as Arc<dyn LlmProvider>)
        })
        .register("claude", |c: &AppConfig| {
            let key = require_key("claude", &c.claude, "ANTHROPIC_API_KEY")?;
            Ok(Arc::new(ChatProvider::new(ClaudeClient::new(key, &c.claude), c.claude.max_tokens)) as Arc<dyn LlmProvider>)
        })
}
