use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Operations a provider can take part in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Price,
    History,
    Info,
    Probe,
    Generate,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Price => write!(f, "price"),
            Capability::History => write!(f, "history"),
            Capability::Info => write!(f, "info"),
            Capability::Probe => write!(f, "probe"),
            Capability::Generate => write!(f, "generate"),
        }
    }
}

/// Immutable identity of a constructed provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub name: String,
    pub capabilities: Vec<Capability>,
    /// Non-secret settings such as endpoint, pacing and model.
    pub config: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderHealth {
    pub provider: String,
    pub healthy: bool,
    pub details: String,
    pub checked_at: DateTime<Utc>,
}

/// Contract shared by every provider that can sit in a fallback chain.
#[async_trait::async_trait]
pub trait ChainProvider: Send + Sync {
    /// Registry name, e.g. "yahoo" or "claude".
    fn name(&self) -> &str;

    fn capabilities(&self) -> Vec<Capability>;

    /// Cheap availability probe. Must not panic or error; unreachable means `false`.
    async fn is_available(&self) -> bool;

    /// Settings worth reporting. Credentials never appear here.
    fn settings(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    fn descriptor(&self) -> ProviderDescriptor {
        ProviderDescriptor {
            name: self.name().to_string(),
            capabilities: self.capabilities(),
            config: self.settings(),
        }
    }

    async fn health_check(&self) -> ProviderHealth {
        let healthy = self.is_available().await;
        ProviderHealth {
            provider: self.name().to_string(),
            healthy,
            details: if healthy {
                "api available".to_string()
            } else {
                "availability probe failed".to_string()
            },
            checked_at: Utc::now(),
        }
    }
}
