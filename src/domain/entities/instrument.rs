use crate::domain::values::confidence::Confidence;
use crate::domain::values::match_kind::MatchKind;
use serde::{Deserialize, Serialize};

/// One row of the reference instrument dataset. Field names follow the
/// vendor's `complete.json` layout on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentRecord {
    #[serde(default)]
    pub trading_symbol: String,
    #[serde(rename = "name", default)]
    pub display_name: String,
    /// Exchange segment, e.g. `NSE_EQ`.
    #[serde(rename = "segment", default)]
    pub exchange: String,
    #[serde(default)]
    pub instrument_type: String,
    #[serde(rename = "instrument_key", default)]
    pub canonical_key: String,
}

impl InstrumentRecord {
    pub fn is_equity_on(&self, segment: &str) -> bool {
        self.exchange == segment && self.instrument_type == "EQ"
    }
}

/// Outcome of resolving one ticker. Always carries provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolResolution {
    pub input_symbol: String,
    pub normalized_symbol: String,
    pub canonical_key: String,
    pub match_kind: MatchKind,
    pub confidence: Confidence,
}

/// Dataset metadata for a resolved ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub symbol: String,
    pub trading_symbol: String,
    pub company_name: String,
    pub exchange: String,
    pub instrument_type: String,
    pub canonical_key: String,
    pub match_kind: MatchKind,
}
