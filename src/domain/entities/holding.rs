use crate::domain::values::portfolio_schema::PortfolioSchema;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One validated position. `quantity` and `buy_price` are always positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingRow {
    /// Normalized vendor symbol, e.g. `RELIANCE.NS`.
    pub symbol: String,
    pub quantity: f64,
    pub buy_price: f64,
    pub current_price: Option<f64>,
    pub purchase_date: Option<NaiveDate>,
}

impl HoldingRow {
    pub fn invested(&self) -> f64 {
        self.quantity * self.buy_price
    }

    pub fn base_symbol(&self) -> &str {
        self.symbol
            .rsplit_once('.')
            .map(|(base, _)| base)
            .unwrap_or(&self.symbol)
    }

    /// Unrealised P&L in percent, when a current price is known.
    pub fn pnl_percent(&self) -> Option<f64> {
        self.current_price
            .map(|price| (price - self.buy_price) / self.buy_price * 100.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    MissingSymbol,
    MissingQuantity,
    MissingPrice,
    NonPositiveQuantity(f64),
    NonPositivePrice(f64),
    /// The record could not be decoded as text.
    Malformed(String),
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSymbol => write!(f, "missing symbol"),
            Self::MissingQuantity => write!(f, "missing or unparseable quantity"),
            Self::MissingPrice => write!(f, "missing or unparseable buy price"),
            Self::NonPositiveQuantity(q) => write!(f, "non-positive quantity {q}"),
            Self::NonPositivePrice(p) => write!(f, "non-positive buy price {p}"),
            Self::Malformed(e) => write!(f, "malformed record: {e}"),
        }
    }
}

/// A data row rejected during validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroppedRow {
    /// 1-based data row number, header excluded.
    pub row: usize,
    pub raw_symbol: Option<String>,
    pub reason: DropReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub holding_count: usize,
    pub total_quantity: f64,
    pub total_invested: f64,
    pub symbols: Vec<String>,
    pub base_symbols: Vec<String>,
    pub schema: PortfolioSchema,
}

impl PortfolioSummary {
    pub fn from_holdings(holdings: &[HoldingRow], schema: PortfolioSchema) -> Self {
        Self {
            holding_count: holdings.len(),
            total_quantity: holdings.iter().map(|h| h.quantity).sum(),
            total_invested: holdings.iter().map(HoldingRow::invested).sum(),
            symbols: holdings.iter().map(|h| h.symbol.clone()).collect(),
            base_symbols: holdings.iter().map(|h| h.base_symbol().to_string()).collect(),
            schema,
        }
    }
}

/// Result of one successful load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadedPortfolio {
    pub schema: PortfolioSchema,
    pub columns: Vec<String>,
    pub holdings: Vec<HoldingRow>,
    pub dropped: Vec<DroppedRow>,
    pub summary: PortfolioSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(symbol: &str, quantity: f64, buy_price: f64, current: Option<f64>) -> HoldingRow {
        HoldingRow {
            symbol: symbol.to_string(),
            quantity,
            buy_price,
            current_price: current,
            purchase_date: None,
        }
    }

    #[test]
    fn test_summary_totals() {
        let holdings = vec![
            row("RELIANCE.NS", 10.0, 2500.0, None),
            row("TCS.BO", 2.0, 3500.0, None),
        ];
        let summary = PortfolioSummary::from_holdings(&holdings, PortfolioSchema::Manual);
        assert_eq!(summary.holding_count, 2);
        assert_eq!(summary.total_quantity, 12.0);
        assert_eq!(summary.total_invested, 32000.0);
        assert_eq!(summary.base_symbols, vec!["RELIANCE", "TCS"]);
    }

    #[test]
    fn test_pnl_percent() {
        let h = row("INFY.NS", 1.0, 100.0, Some(110.0));
        assert!((h.pnl_percent().unwrap() - 10.0).abs() < 1e-9);
        assert!(row("INFY.NS", 1.0, 100.0, None).pnl_percent().is_none());
    }
}
