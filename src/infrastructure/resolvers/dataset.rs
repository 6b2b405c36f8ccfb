//! Local copy of the reference instrument dataset.
//!
//! The copy counts as fresh when it was written on the current (UTC) day.
//! Otherwise a new copy is downloaded; if that fails the stale file is
//! reused. A file that cannot be parsed means there is no dataset.

use crate::domain::entities::instrument::InstrumentRecord;
use crate::domain::error::DatasetError;
use crate::domain::ports::clock::Clock;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Parsed dataset plus a lookup from canonical key to row.
#[derive(Debug, Default)]
pub struct DatasetIndex {
    records: Vec<InstrumentRecord>,
    by_key: HashMap<String, usize>,
}

impl DatasetIndex {
    pub fn new(records: Vec<InstrumentRecord>) -> Self {
        let mut by_key = HashMap::with_capacity(records.len());
        for (i, r) in records.iter().enumerate() {
            if !r.canonical_key.is_empty() {
                by_key.entry(r.canonical_key.clone()).or_insert(i);
            }
        }
        Self { records, by_key }
    }

    pub fn records(&self) -> &[InstrumentRecord] {
        &self.records
    }

    pub fn by_key(&self, canonical_key: &str) -> Option<&InstrumentRecord> {
        self.by_key.get(canonical_key).map(|&i| &self.records[i])
    }

    /// Equity rows on one exchange segment.
    pub fn equities<'a>(&'a self, segment: &'a str) -> impl Iterator<Item = &'a InstrumentRecord> + 'a {
        self.records.iter().filter(move |r| r.is_equity_on(segment))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetInfo {
    pub path: PathBuf,
    pub present: bool,
    pub size_bytes: u64,
    pub fetched_on: Option<NaiveDate>,
    pub stale: bool,
}

pub struct InstrumentDataset {
    path: PathBuf,
    url: String,
    client: reqwest::Client,
    clock: Arc<dyn Clock>,
}

impl InstrumentDataset {
    pub fn new(path: impl Into<PathBuf>, url: impl Into<String>, timeout: Duration, clock: Arc<dyn Clock>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .gzip(true)
            .build()
            .unwrap_or_default();
        Self {
            path: path.into(),
            url: url.into(),
            client,
            clock,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn fetched_on(&self) -> Option<NaiveDate> {
        let modified = std::fs::metadata(&self.path).ok()?.modified().ok()?;
        Some(DateTime::<Utc>::from(modified).date_naive())
    }

    pub fn is_stale(&self) -> bool {
        self.fetched_on() != Some(self.clock.now().date_naive())
    }

    pub fn info(&self) -> DatasetInfo {
        let size_bytes = std::fs::metadata(&self.path).map(|m| m.len()).ok();
        DatasetInfo {
            path: self.path.clone(),
            present: size_bytes.is_some(),
            size_bytes: size_bytes.unwrap_or(0),
            fetched_on: self.fetched_on(),
            stale: self.is_stale(),
        }
    }

    /// Returns the dataset, refreshing the local copy first when it is stale.
    pub async fn load(&self) -> Result<DatasetIndex, DatasetError> {
        if self.path.exists() && !self.is_stale() {
            return self.read_local();
        }

        match self.download().await {
            Ok(index) => Ok(index),
            Err(e) if self.path.exists() => {
                warn!(error = %e, path = %self.path.display(), "Dataset refresh failed, reusing stale copy");
                self.read_local()
            }
            Err(e) => {
                warn!(error = %e, "Dataset refresh failed and no local copy exists");
                Err(DatasetError::Unavailable)
            }
        }
    }

    /// Downloads a fresh copy regardless of staleness. The file is only
    /// replaced when the new body parses.
    pub async fn download(&self) -> Result<DatasetIndex, DatasetError> {
        info!(url = %self.url, "Downloading instrument dataset");
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| DatasetError::Download(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(DatasetError::Download(format!("HTTP {}", resp.status())));
        }
        let body = resp
            .bytes()
            .await
            .map_err(|e| DatasetError::Download(e.to_string()))?;

        let records: Vec<InstrumentRecord> = serde_json::from_slice(&body)?;
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(&self.path, &body)?;
        info!(rows = records.len(), bytes = body.len(), "Instrument dataset downloaded");
        Ok(DatasetIndex::new(records))
    }

    fn read_local(&self) -> Result<DatasetIndex, DatasetError> {
        let raw = std::fs::read(&self.path)?;
        let records: Vec<InstrumentRecord> = serde_json::from_slice(&raw)?;
        info!(rows = records.len(), path = %self.path.display(), "Instrument dataset loaded");
        Ok(DatasetIndex::new(records))
    }
}
