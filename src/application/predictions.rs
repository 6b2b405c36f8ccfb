use crate::application::fallback::{ChainOutcome, FallbackChain};
use crate::domain::entities::prediction::{Action, Prediction, PredictionRequest, Recommendation};
use crate::domain::ports::chain_provider::ProviderHealth;
use crate::domain::ports::llm_provider::LlmProvider;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const EMERGENCY_RULES: &str = "emergency_rules";

/// Narrative predictions over the language-model chain. Exhaustion ends in
/// [`emergency_prediction`], so `generate` always answers.
pub struct PredictionService {
    chain: FallbackChain<dyn LlmProvider>,
}

impl PredictionService {
    pub fn new(chain: FallbackChain<dyn LlmProvider>) -> Self {
        Self { chain }
    }

    pub async fn generate(&self, request: &PredictionRequest) -> ChainOutcome<Prediction> {
        self.chain
            .execute(
                "generate_predictions",
                |provider: Arc<dyn LlmProvider>| async move { provider.generate(request).await },
                || emergency_prediction(request),
            )
            .await
    }

    pub fn chain_names(&self) -> Vec<String> {
        self.chain.chain_names()
    }

    pub async fn available_providers(&self) -> Vec<String> {
        self.chain.available_providers().await
    }

    pub async fn health_check(&self) -> Vec<ProviderHealth> {
        self.chain.health_check_all().await
    }
}

/// Rule-based recommendations used when no language model answered.
pub fn emergency_prediction(request: &PredictionRequest) -> Prediction {
    let recommendations: BTreeMap<String, Recommendation> = request
        .holdings
        .iter()
        .map(|h| {
            let sentiment = request.sentiment_for(&h.symbol);
            let recommendation = match request.financial_score_for(&h.symbol) {
                Some(score) => with_fundamentals(h.pnl_percent, sentiment, score),
                None => without_fundamentals(h.pnl_percent),
            };
            (h.symbol.clone(), recommendation)
        })
        .collect();

    Prediction {
        recommendations,
        portfolio_analysis: "Emergency analysis: All AI providers unavailable. Using rule-based recommendations."
            .to_string(),
        action_items: vec![
            "Check API connectivity and quotas".to_string(),
            "Verify API keys are valid".to_string(),
            "Monitor market manually until AI services restore".to_string(),
            "Consider manual portfolio review".to_string(),
        ],
        market_insights: "AI analysis unavailable. Recommendations are based on P&L, sentiment and fundamentals only."
            .to_string(),
        generated_at: Utc::now(),
        fallback_mode: false,
    }
}

fn rec(action: Action, confidence: u8, reasoning: String) -> Recommendation {
    Recommendation {
        action,
        confidence,
        reasoning,
    }
}

fn with_fundamentals(pnl: f64, sentiment: f64, score: f64) -> Recommendation {
    if score >= 7.0 && pnl < -10.0 && sentiment >= -0.1 {
        rec(
            Action::Buy,
            8,
            format!("Strong fundamentals ({score:.1}/10) with a {pnl:.1}% drawdown, averaging opportunity"),
        )
    } else if score <= 4.0 && pnl > 15.0 {
        rec(
            Action::Sell,
            7,
            format!("Weak fundamentals ({score:.1}/10) after a {pnl:.1}% gain, book profits"),
        )
    } else if pnl > 10.0 && sentiment < -0.2 {
        rec(
            Action::Sell,
            6,
            format!("Up {pnl:.1}% with negative sentiment ({sentiment:.2}), protect gains"),
        )
    } else if pnl < -5.0 && sentiment > 0.2 && score >= 6.0 {
        rec(
            Action::Buy,
            6,
            format!("Positive sentiment and decent fundamentals ({score:.1}/10) on a {pnl:.1}% dip"),
        )
    } else {
        rec(
            Action::Hold,
            5,
            format!("Fundamentals {score:.1}/10, P&L {pnl:.1}%, no strong signal"),
        )
    }
}

fn without_fundamentals(pnl: f64) -> Recommendation {
    if pnl > 15.0 {
        rec(Action::Sell, 6, format!("Up {pnl:.1}%, consider booking partial profits"))
    } else if pnl < -10.0 {
        rec(Action::Buy, 6, format!("Down {pnl:.1}%, potential averaging opportunity"))
    } else {
        rec(Action::Hold, 5, format!("P&L {pnl:.1}% within normal range"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::prediction::HoldingSnapshot;

    fn request(holdings: Vec<HoldingSnapshot>) -> PredictionRequest {
        PredictionRequest {
            holdings,
            ..Default::default()
        }
    }

    #[test]
    fn test_rules_without_fundamentals() {
        let p = emergency_prediction(&request(vec![
            HoldingSnapshot::new("UP.NS", 1.0, 100.0, 120.0),
            HoldingSnapshot::new("DOWN.NS", 1.0, 100.0, 85.0),
            HoldingSnapshot::new("FLAT.NS", 1.0, 100.0, 102.0),
        ]));
        assert_eq!(p.recommendations["UP.NS"].action, Action::Sell);
        assert_eq!(p.recommendations["DOWN.NS"].action, Action::Buy);
        assert_eq!(p.recommendations["FLAT.NS"].action, Action::Hold);
        assert_eq!(p.recommendations["FLAT.NS"].confidence, 5);
        assert!(!p.fallback_mode);
        assert_eq!(p.action_items.len(), 4);
    }

    #[test]
    fn test_rules_with_fundamentals() {
        let mut req = request(vec![
            HoldingSnapshot::new("STRONG.NS", 1.0, 100.0, 80.0),
            HoldingSnapshot::new("WEAK.NS", 1.0, 100.0, 130.0),
            HoldingSnapshot::new("GLOOMY.NS", 1.0, 100.0, 112.0),
        ]);
        req.financial_scores.insert("STRONG.NS".into(), 8.0);
        req.financial_scores.insert("WEAK.NS".into(), 3.0);
        req.financial_scores.insert("GLOOMY.NS".into(), 6.0);
        req.sentiment.insert("GLOOMY.NS".into(), -0.5);

        let p = emergency_prediction(&req);
        assert_eq!(p.recommendations["STRONG.NS"].action, Action::Buy);
        assert_eq!(p.recommendations["STRONG.NS"].confidence, 8);
        assert_eq!(p.recommendations["WEAK.NS"].action, Action::Sell);
        assert_eq!(p.recommendations["WEAK.NS"].confidence, 7);
        assert_eq!(p.recommendations["GLOOMY.NS"].action, Action::Sell);
        assert_eq!(p.recommendations["GLOOMY.NS"].confidence, 6);
    }

    #[test]
    fn test_strong_fundamentals_need_neutral_sentiment() {
        let mut req = request(vec![HoldingSnapshot::new("X.NS", 1.0, 100.0, 85.0)]);
        req.financial_scores.insert("X.NS".into(), 9.0);
        req.sentiment.insert("X.NS".into(), -0.4);
        let p = emergency_prediction(&req);
        assert_eq!(p.recommendations["X.NS"].action, Action::Hold);
    }

    #[tokio::test]
    async fn test_empty_chain_uses_rules() {
        let service = PredictionService::new(FallbackChain::new(Vec::new(), EMERGENCY_RULES));
        let outcome = service
            .generate(&request(vec![HoldingSnapshot::new("A.NS", 1.0, 100.0, 100.0)]))
            .await;
        assert!(outcome.degraded);
        assert_eq!(outcome.provider_used, EMERGENCY_RULES);
        assert_eq!(outcome.value.recommendations.len(), 1);
    }
}
