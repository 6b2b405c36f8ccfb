use super::{client_settings, error_body, http_client, CompletionClient};
use crate::config::LlmConfig;
use crate::domain::error::ProviderError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const NAME: &str = "gemini";

/// Google Gemini `generateContent` REST endpoint. The key travels as a
/// query parameter.
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

impl GeminiClient {
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
impl CompletionClient for GeminiClient {
    fn name(&self) -> &str {
        NAME
    }

    fn settings(&self) -> BTreeMap<String, String> {
        client_settings(&self.model, &self.base_url, self.temperature)
    }

    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, ProviderError> {
        let resp = self
            .client
            .post(format!("{}/models/{}:generateContent", self.base_url, self.model))
            .query(&[("key", self.api_key.as_str())])
            .json(&GenerateRequest {
                contents: vec![Content {
                    parts: vec![Part { text: prompt }],
                }],
                generation_config: GenerationConfig {
                    temperature: self.temperature,
                    max_output_tokens: max_tokens,
                },
            })
            .send()
            .await
            .map_err(|e| ProviderError::from_http(NAME, e))?;

        if !resp.status().is_success() {
            return Err(ProviderError::failed(NAME, error_body(resp).await));
        }

        let result: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::failed(NAME, format!("Parse error: {e}")))?;

        result
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().find_map(|p| p.text))
            .ok_or_else(|| ProviderError::failed(NAME, "response had no candidates"))
    }
}
