use crate::domain::entities::instrument::SymbolResolution;
use crate::domain::error::DomainError;
use crate::domain::ports::resolution_store::{ResolutionStore, StoredResolution};
use crate::domain::values::confidence::Confidence;
use crate::domain::values::match_kind::MatchKind;
use crate::infrastructure::sqlite::migrations::run_migrations;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tracing::warn;

pub struct SqliteResolutionStore {
    conn: Mutex<Connection>,
}

impl SqliteResolutionStore {
    pub fn new(conn: Connection) -> Result<Self, DomainError> {
        run_migrations(&conn).map_err(DomainError::Database)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open(path: &Path) -> Result<Self, DomainError> {
        let conn = Connection::open(path).map_err(|e| DomainError::Database(format!("DB error: {e}")))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| DomainError::Database(format!("WAL error: {e}")))?;
        Self::new(conn)
    }

    pub fn in_memory() -> Result<Self, DomainError> {
        let conn = Connection::open_in_memory().map_err(|e| DomainError::Database(format!("DB error: {e}")))?;
        Self::new(conn)
    }

    fn row_to_stored(row: &rusqlite::Row) -> Result<Option<StoredResolution>, rusqlite::Error> {
        let normalized_symbol: String = row.get(0)?;
        let kind_str: String = row.get(3)?;
        let confidence: f64 = row.get(4)?;
        let resolved_str: String = row.get(5)?;

        let Ok(match_kind) = kind_str.parse::<MatchKind>() else {
            warn!(symbol = %normalized_symbol, kind = %kind_str, "Ignoring stored resolution with unknown match kind");
            return Ok(None);
        };
        let Ok(resolved_at) = DateTime::parse_from_rfc3339(&resolved_str) else {
            warn!(symbol = %normalized_symbol, "Ignoring stored resolution with bad timestamp");
            return Ok(None);
        };

        Ok(Some(StoredResolution {
            resolution: SymbolResolution {
                input_symbol: row.get(1)?,
                normalized_symbol,
                canonical_key: row.get(2)?,
                match_kind,
                confidence: Confidence::saturating(confidence),
            },
            resolved_at: resolved_at.with_timezone(&Utc),
        }))
    }
}

impl ResolutionStore for SqliteResolutionStore {
    fn get(&self, normalized_symbol: &str) -> Result<Option<StoredResolution>, DomainError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let found = conn
            .query_row(
                "SELECT normalized_symbol, input_symbol, canonical_key, match_kind, confidence, resolved_at
                 FROM resolutions WHERE normalized_symbol = ?1",
                params![normalized_symbol],
                Self::row_to_stored,
            )
            .optional()?;
        Ok(found.flatten())
    }

    fn put(&self, resolution: &SymbolResolution, resolved_at: DateTime<Utc>) -> Result<(), DomainError> {
        if !resolution.match_kind.is_persistable() {
            return Ok(());
        }
        let conn = self
            .conn
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        conn.execute(
            "INSERT OR REPLACE INTO resolutions (normalized_symbol, input_symbol, canonical_key, match_kind, confidence, resolved_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                resolution.normalized_symbol,
                resolution.input_symbol,
                resolution.canonical_key,
                resolution.match_kind.to_string(),
                resolution.confidence.value(),
                resolved_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn count(&self) -> Result<usize, DomainError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM resolutions", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    fn clear(&self) -> Result<(), DomainError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        conn.execute("DELETE FROM resolutions", [])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolution(kind: MatchKind) -> SymbolResolution {
        SymbolResolution {
            input_symbol: "hdfcbnk".into(),
            normalized_symbol: "HDFCBNK.NS".into(),
            canonical_key: "NSE_EQ|INE040A01034".into(),
            match_kind: kind,
            confidence: Confidence::saturating(0.84),
        }
    }

    #[test]
    fn test_put_then_get() {
        let store = SqliteResolutionStore::in_memory().unwrap();
        let at = Utc::now();
        store.put(&resolution(MatchKind::Fuzzy), at).unwrap();

        let stored = store.get("HDFCBNK.NS").unwrap().unwrap();
        assert_eq!(stored.resolution, resolution(MatchKind::Fuzzy));
        assert_eq!(stored.resolved_at.timestamp(), at.timestamp());
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_synthesized_never_persisted() {
        let store = SqliteResolutionStore::in_memory().unwrap();
        store.put(&resolution(MatchKind::Synthesized), Utc::now()).unwrap();
        assert!(store.get("HDFCBNK.NS").unwrap().is_none());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_later_put_overwrites() {
        let store = SqliteResolutionStore::in_memory().unwrap();
        store.put(&resolution(MatchKind::Fuzzy), Utc::now()).unwrap();
        let mut exact = resolution(MatchKind::Exact);
        exact.canonical_key = "NSE_EQ|OTHER".into();
        store.put(&exact, Utc::now()).unwrap();

        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.get("HDFCBNK.NS").unwrap().unwrap().resolution.canonical_key, "NSE_EQ|OTHER");
        store.clear().unwrap();
        assert_eq!(store.count().unwrap(), 0);
    }
}
