use rusqlite::Connection;

pub fn run_migrations(conn: &Connection) -> Result<(), String> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS resolutions (
            normalized_symbol TEXT PRIMARY KEY,
            input_symbol TEXT NOT NULL,
            canonical_key TEXT NOT NULL,
            match_kind TEXT NOT NULL,
            confidence REAL NOT NULL,
            resolved_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_resolutions_key ON resolutions(canonical_key);
        "
    ).map_err(|e| format!("Migration failed: {e}"))
}
