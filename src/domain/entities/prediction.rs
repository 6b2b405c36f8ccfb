use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Position as seen by a narrative generator: cost basis plus the latest price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingSnapshot {
    pub symbol: String,
    pub quantity: f64,
    pub buy_price: f64,
    pub current_price: f64,
    pub pnl_percent: f64,
}

impl HoldingSnapshot {
    pub fn new(symbol: impl Into<String>, quantity: f64, buy_price: f64, current_price: f64) -> Self {
        let pnl_percent = if buy_price > 0.0 {
            (current_price - buy_price) / buy_price * 100.0
        } else {
            0.0
        };
        Self {
            symbol: symbol.into(),
            quantity,
            buy_price,
            current_price,
            pnl_percent,
        }
    }
}

/// Input to every language-model provider and to the emergency rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub holdings: Vec<HoldingSnapshot>,
    /// Sentiment per symbol in `[-1, 1]`. Missing symbols count as neutral.
    #[serde(default)]
    pub sentiment: BTreeMap<String, f64>,
    /// Fundamentals health score per symbol, `0..=10`.
    #[serde(default)]
    pub financial_scores: BTreeMap<String, f64>,
    /// Free-form retrieved context appended to the prompt.
    #[serde(default)]
    pub context: String,
}

impl PredictionRequest {
    pub fn sentiment_for(&self, symbol: &str) -> f64 {
        self.sentiment.get(symbol).copied().unwrap_or(0.0)
    }

    pub fn financial_score_for(&self, symbol: &str) -> Option<f64> {
        self.financial_scores.get(symbol).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Buy => write!(f, "BUY"),
            Action::Sell => write!(f, "SELL"),
            Action::Hold => write!(f, "HOLD"),
        }
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BUY" => Ok(Action::Buy),
            "SELL" => Ok(Action::Sell),
            "HOLD" => Ok(Action::Hold),
            _ => Err(format!("Invalid action: '{s}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub action: Action,
    /// 1 (weak) to 10 (strong).
    pub confidence: u8,
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub recommendations: BTreeMap<String, Recommendation>,
    pub portfolio_analysis: String,
    pub action_items: Vec<String>,
    pub market_insights: String,
    pub generated_at: DateTime<Utc>,
    /// Set by a provider whose own response was unusable. The prediction
    /// chain treats such a result as a failure and moves on.
    #[serde(default)]
    pub fallback_mode: bool,
}
