use serde::{Deserialize, Serialize};
use std::fmt;

/// Shape of a holdings table, decided once per load from its header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortfolioSchema {
    /// Broker export: `Instrument, Qty., Avg. cost, LTP, Invested, Cur. val, P&L, ...`
    Upstox,
    /// Hand-written: `symbol, quantity, buy_price[, purchase_date]`
    Manual,
    Unknown,
}

impl fmt::Display for PortfolioSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upstox => write!(f, "upstox"),
            Self::Manual => write!(f, "manual"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}
