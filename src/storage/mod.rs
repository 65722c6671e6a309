//! SQLite storage layer -- schema, queries, migrations.
//!
//! The pool is opened once at the composition root and passed down
//! explicitly; nothing in here is lazily initialized.

pub mod schema;

use anyhow::Result;
use r2d2::Pool as R2D2Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::scan::ScanReport;
use crate::speedtest::SpeedTestSummary;

/// Connection Pool type
pub type Pool = R2D2Pool<SqliteConnectionManager>;

/// Open (or create) the SQLite database and return a connection pool.
pub fn open_pool(path: &str) -> Result<Pool> {
    if let Some(dir) = std::path::Path::new(path).parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }

    let manager = SqliteConnectionManager::file(path).with_init(|c| {
        c.execute_batch(
            "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA temp_store = MEMORY;
                 PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;",
        )
    });

    let pool = R2D2Pool::new(manager)?;

    // Run migrations on a single connection
    let conn = pool.get()?;
    schema::migrate(&conn)?;

    Ok(pool)
}

/// Save a finished speed test to history.
pub fn save_speedtest(pool: &Pool, summary: &SpeedTestSummary) -> Result<()> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO speedtest_results (url, samples, avg_mbps, peak_mbps, duration_secs, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            summary.url,
            summary.samples,
            summary.avg_mbps,
            summary.peak_mbps,
            summary.duration_secs,
            summary.timestamp.to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// Recent speed tests, newest first.
pub fn speedtest_history(pool: &Pool, limit: u32) -> Result<Vec<serde_json::Value>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT url, samples, avg_mbps, peak_mbps, duration_secs, created_at
         FROM speedtest_results ORDER BY created_at DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map([limit], |row| {
        Ok(serde_json::json!({
            "url": row.get::<_, String>(0)?,
            "samples": row.get::<_, i64>(1)?,
            "avg_mbps": row.get::<_, f64>(2)?,
            "peak_mbps": row.get::<_, f64>(3)?,
            "duration_secs": row.get::<_, f64>(4)?,
            "created_at": row.get::<_, String>(5)?,
        }))
    })?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Save one scan run, devices serialized as JSON.
pub fn save_scan(pool: &Pool, report: &ScanReport) -> Result<()> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO scan_results (run_id, subnet, device_count, result_json, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            report.run_id.to_string(),
            report.subnet,
            report.devices.len() as i64,
            serde_json::to_string(&report.devices)?,
            report.timestamp.to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// Most recent scan, if any.
pub fn latest_scan(pool: &Pool) -> Result<Option<serde_json::Value>> {
    let conn = pool.get()?;
    let row = conn
        .query_row(
            "SELECT run_id, subnet, device_count, result_json, created_at
             FROM scan_results ORDER BY created_at DESC, id DESC LIMIT 1",
            [],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;

    match row {
        Some((run_id, subnet, device_count, result_json, created_at)) => {
            let devices: serde_json::Value = serde_json::from_str(&result_json)?;
            Ok(Some(serde_json::json!({
                "run_id": run_id,
                "subnet": subnet,
                "device_count": device_count,
                "devices": devices,
                "created_at": created_at,
            })))
        }
        None => Ok(None),
    }
}
