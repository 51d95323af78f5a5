use anyhow::Result;
use rusqlite::Connection;

pub const SCHEMA_VERSION: i64 = 1;

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        BEGIN;
        CREATE TABLE IF NOT EXISTS meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        -- Scoped key/value entries; expires_at (unix millis) backs TTL locks.
        CREATE TABLE IF NOT EXISTS kv (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            expires_at INTEGER
        );

        CREATE TABLE IF NOT EXISTS sets (
            key TEXT NOT NULL,
            member TEXT NOT NULL,
            PRIMARY KEY (key, member)
        );

        CREATE INDEX IF NOT EXISTS idx_sets_key ON sets(key);

        CREATE TABLE IF NOT EXISTS hashes (
            key TEXT NOT NULL,
            field TEXT NOT NULL,
            value TEXT NOT NULL,
            PRIMARY KEY (key, field)
        );

        CREATE INDEX IF NOT EXISTS idx_hashes_key ON hashes(key);

        CREATE TABLE IF NOT EXISTS zsets (
            key TEXT NOT NULL,
            member TEXT NOT NULL,
            score REAL NOT NULL,
            PRIMARY KEY (key, member)
        );

        CREATE INDEX IF NOT EXISTS idx_zsets_key_score ON zsets(key, score);

        COMMIT;
        ",
    )?;

    let current: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(CAST(value AS INTEGER)), 0) FROM meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);
    if current < SCHEMA_VERSION {
        conn.execute(
            "INSERT INTO meta (key, value) VALUES ('schema_version', ?1)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            [SCHEMA_VERSION.to_string()],
        )?;
    }
    Ok(())
}
