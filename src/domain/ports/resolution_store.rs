use crate::domain::entities::instrument::SymbolResolution;
use crate::domain::error::DomainError;
use chrono::{DateTime, Utc};

/// A resolution as persisted, with the time it was recorded.
#[derive(Debug, Clone)]
pub struct StoredResolution {
    pub resolution: SymbolResolution,
    pub resolved_at: DateTime<Utc>,
}

/// Durable cache of resolved symbols, keyed by normalized symbol.
pub trait ResolutionStore: Send + Sync {
    fn get(&self, normalized_symbol: &str) -> Result<Option<StoredResolution>, DomainError>;
    fn put(&self, resolution: &SymbolResolution, resolved_at: DateTime<Utc>) -> Result<(), DomainError>;
    fn count(&self) -> Result<usize, DomainError>;
    fn clear(&self) -> Result<(), DomainError>;
}
