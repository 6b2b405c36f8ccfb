use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a symbol was mapped onto its canonical key, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    /// Hard-coded override table
    Manual,
    /// Trading symbol equal to the base symbol in the reference dataset
    Exact,
    /// Best similarity-scored dataset row above the acceptance threshold
    Fuzzy,
    /// Built from the exchange segment and base symbol; nothing matched
    Synthesized,
}

impl MatchKind {
    /// Synthesized keys are guesses and must not outlive the process.
    pub fn is_persistable(&self) -> bool {
        !matches!(self, MatchKind::Synthesized)
    }
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manual => write!(f, "manual"),
            Self::Exact => write!(f, "exact"),
            Self::Fuzzy => write!(f, "fuzzy"),
            Self::Synthesized => write!(f, "synthesized"),
        }
    }
}

impl FromStr for MatchKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "manual" => Ok(Self::Manual),
            "exact" => Ok(Self::Exact),
            "fuzzy" => Ok(Self::Fuzzy),
            "synthesized" => Ok(Self::Synthesized),
            _ => Err(format!("Invalid match kind: '{s}'")),
        }
    }
}
