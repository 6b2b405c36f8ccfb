use super::{client_settings, error_body, http_client, CompletionClient};
use crate::config::LlmConfig;
use crate::domain::error::ProviderError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const NAME: &str = "gpt";

/// OpenAI chat completions.
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f64,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
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
impl CompletionClient for OpenAiClient {
    fn name(&self) -> &str {
        NAME
    }

    fn settings(&self) -> BTreeMap<String, String> {
        client_settings(&self.model, &self.base_url, self.temperature)
    }

    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, ProviderError> {
        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&ChatRequest {
                model: &self.model,
                messages: vec![Message {
                    role: "user",
                    content: prompt,
                }],
                max_tokens,
                temperature: self.temperature,
            })
            .send()
            .await
            .map_err(|e| ProviderError::from_http(NAME, e))?;

        if !resp.status().is_success() {
            return Err(ProviderError::failed(NAME, error_body(resp).await));
        }

        let result: ChatResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::failed(NAME, format!("Parse error: {e}")))?;
        result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::failed(NAME, "response had no choices"))
    }
}
