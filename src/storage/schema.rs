//! Database schema and migrations.

use anyhow::Result;
use rusqlite::Connection;

/// Run all pending migrations.
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS daily_usage (
            date TEXT PRIMARY KEY,
            wifi_bytes INTEGER NOT NULL DEFAULT 0,
            mobile_bytes INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS speedtest_results (
            id INTEGER PRIMARY KEY,
            url TEXT NOT NULL,
            samples INTEGER NOT NULL,
            avg_mbps REAL NOT NULL,
            peak_mbps REAL NOT NULL,
            duration_secs REAL NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS scan_results (
            id INTEGER PRIMARY KEY,
            run_id TEXT NOT NULL,
            subnet TEXT,
            device_count INTEGER NOT NULL,
            result_json TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_speedtest_created ON speedtest_results(created_at);
        CREATE INDEX IF NOT EXISTS idx_scan_created ON scan_results(created_at);",
    )?;

    Ok(())
}
