use crate::domain::entities::prediction::{Prediction, PredictionRequest};
use crate::domain::error::ProviderError;
use crate::domain::ports::chain_provider::ChainProvider;
use async_trait::async_trait;

/// A language-model backend producing narrative predictions.
///
/// A provider that got a response it could not use should return a
/// prediction with `fallback_mode = true` rather than an error; both advance
/// the chain.
#[async_trait]
pub trait LlmProvider: ChainProvider {
    async fn generate(&self, request: &PredictionRequest) -> Result<Prediction, ProviderError>;
}
