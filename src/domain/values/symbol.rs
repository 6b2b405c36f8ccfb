use serde::{Deserialize, Serialize};
use std::fmt;

/// Exchanges the resolver knows how to address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Exchange {
    #[default]
    Nse,
    Bse,
}

impl Exchange {
    /// Ticker suffix used by quote vendors (`RELIANCE.NS`).
    pub fn suffix(&self) -> &'static str {
        match self {
            Exchange::Nse => ".NS",
            Exchange::Bse => ".BO",
        }
    }

    /// Equity segment code used in canonical instrument keys (`NSE_EQ|...`).
    pub fn segment(&self) -> &'static str {
        match self {
            Exchange::Nse => "NSE_EQ",
            Exchange::Bse => "BSE_EQ",
        }
    }

    fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "NS" | "NSE" => Some(Exchange::Nse),
            "BO" | "BSE" => Some(Exchange::Bse),
            _ => None,
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exchange::Nse => write!(f, "NSE"),
            Exchange::Bse => write!(f, "BSE"),
        }
    }
}

/// A ticker in canonical vendor form: uppercase, cleaned, always carrying an
/// exchange suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NormalizedSymbol {
    /// Full form, e.g. `RELIANCE.NS`.
    pub symbol: String,
    /// Suffix-free form, e.g. `RELIANCE`.
    pub base: String,
    pub exchange: Exchange,
}

impl NormalizedSymbol {
    /// Normalizes a loosely written ticker. Returns `None` when nothing
    /// symbol-like survives cleaning.
    pub fn parse(raw: &str) -> Option<Self> {
        let cleaned = clean_symbol(raw);
        if cleaned.is_empty() {
            return None;
        }

        let (base, exchange) = match cleaned.rsplit_once('.') {
            Some((base, suffix)) => match Exchange::from_suffix(suffix) {
                Some(exchange) => (base, exchange),
                None => (cleaned.as_str(), Exchange::default()),
            },
            None => (cleaned.as_str(), Exchange::default()),
        };
        let base = base.trim_matches('.').to_string();

        if base.is_empty() {
            return None;
        }

        Some(Self {
            symbol: format!("{}{}", base, exchange.suffix()),
            base,
            exchange,
        })
    }

    /// Best-guess canonical key: `<segment>|<base>`.
    pub fn synthesized_key(&self) -> String {
        format!("{}|{}", self.exchange.segment(), self.base)
    }
}

impl fmt::Display for NormalizedSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol)
    }
}

/// Uppercases and strips quoting, whitespace and stray punctuation. Keeps the
/// characters that occur in real tickers (`M&M`, `BAJAJ-AUTO`, `.NS`).
pub fn clean_symbol(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '&' | '-' | '_'))
        .collect::<String>()
        .to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_suffix_appended() {
        let s = NormalizedSymbol::parse("reliance").unwrap();
        assert_eq!(s.symbol, "RELIANCE.NS");
        assert_eq!(s.base, "RELIANCE");
        assert_eq!(s.exchange, Exchange::Nse);
    }

    #[test]
    fn test_bse_suffix_kept() {
        let s = NormalizedSymbol::parse("  \"Tcs.bo\" ").unwrap();
        assert_eq!(s.symbol, "TCS.BO");
        assert_eq!(s.synthesized_key(), "BSE_EQ|TCS");
    }

    #[test]
    fn test_long_suffix_aliases() {
        assert_eq!(NormalizedSymbol::parse("INFY.NSE").unwrap().symbol, "INFY.NS");
        assert_eq!(NormalizedSymbol::parse("INFY.BSE").unwrap().symbol, "INFY.BO");
    }

    #[test]
    fn test_punctuation_in_ticker_preserved() {
        assert_eq!(NormalizedSymbol::parse("m&m").unwrap().symbol, "M&M.NS");
        assert_eq!(
            NormalizedSymbol::parse("bajaj-auto").unwrap().symbol,
            "BAJAJ-AUTO.NS"
        );
    }

    #[test]
    fn test_unknown_suffix_is_part_of_base() {
        let s = NormalizedSymbol::parse("BRK.B").unwrap();
        assert_eq!(s.base, "BRK.B");
        assert_eq!(s.symbol, "BRK.B.NS");
    }

    #[test]
    fn test_empty_input() {
        assert!(NormalizedSymbol::parse("  \"' ").is_none());
        assert!(NormalizedSymbol::parse(".NS").is_none());
    }
}
