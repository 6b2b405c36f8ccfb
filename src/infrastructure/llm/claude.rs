use super::{client_settings, error_body, http_client, CompletionClient};
use crate::config::LlmConfig;
use crate::domain::error::ProviderError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const NAME: &str = "claude";
const API_VERSION: &str = "2023-06-01";

/// Anthropic messages API.
pub struct ClaudeClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f64,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

impl ClaudeClient {
    pub fn new(api_key: String, config: &LlmConfig) -> Self {
        Self {
            client: http_client(config.timeout),
            api_key,
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            temperature: config.temperature,
        }
    }
}

#[async_trait::async_trait]
impl CompletionClient for ClaudeClient {
    fn name(&self) -> &str {
        NAME
    }

    fn settings(&self) -> BTreeMap<String, String> {
        client_settings(&self.model, &self.base_url, self.temperature)
    }

    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, ProviderError> {
        let resp = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&MessagesRequest {
                model: &self.model,
                max_tokens,
                temperature: self.temperature,
                messages: vec![Message {
                    role: "user",
                    content: prompt,
                }],
            })
            .send()
            .await
            .map_err(|e| ProviderError::from_http(NAME, e))?;

        if !resp.status().is_success() {
            return Err(ProviderError::failed(NAME, error_body(resp).await));
        }

        let result: MessagesResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::failed(NAME, format!("Parse error: {e}")))?;
        let text: String = result.content.into_iter().filter_map(|b| b.text).collect();
        if text.is_empty() {
            return Err(ProviderError::failed(NAME, "response had no text content"));
        }
        Ok(text)
    }
}
