use serde::{Deserialize, Serialize};
use std::fmt;

/// Confidence attached to a resolution or estimate, always within `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Confidence(f64);

impl Confidence {
    pub const CERTAIN: Confidence = Confidence(1.0);

    /// Clamps into range instead of rejecting. NaN becomes zero.
    pub fn saturating(value: f64) -> Self {
        if value.is_nan() {
            return Confidence(0.0);
        }
        Confidence(value.clamp(0.0, 1.0))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}
