//! Daily usage ledger: one row per date with wifi/mobile byte counters,
//! plus the settings-backed daily limit and display formatting.

use crate::storage::Pool;
use anyhow::Result;
use serde::Serialize;

const SETTING_DAILY_LIMIT_MB: &str = "daily_limit_mb";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyUsage {
    /// "YYYY-MM-DD"
    pub date: String,
    pub wifi_bytes: i64,
    pub mobile_bytes: i64,
}

impl DailyUsage {
    pub fn total_bytes(&self) -> i64 {
        self.wifi_bytes + self.mobile_bytes
    }
}

/// Today's ledger key in local time.
pub fn today_key() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}

/// Add byte deltas to the row for `date`, creating it when absent.
pub fn add_usage(pool: &Pool, date: &str, wifi_bytes: i64, mobile_bytes: i64) -> Result<()> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO daily_usage (date, wifi_bytes, mobile_bytes) VALUES (?1, ?2, ?3)
         ON CONFLICT(date) DO UPDATE SET
             wifi_bytes = wifi_bytes + excluded.wifi_bytes,
             mobile_bytes = mobile_bytes + excluded.mobile_bytes,
             updated_at = datetime('now')",
        rusqlite::params![date, wifi_bytes, mobile_bytes],
    )?;
    Ok(())
}

pub fn usage_for_date(pool: &Pool, date: &str) -> Result<Option<DailyUsage>> {
    let conn = pool.get()?;
    let row = conn
        .query_row(
            "SELECT date, wifi_bytes, mobile_bytes FROM daily_usage WHERE date = ?1",
            [date],
            |row| {
                Ok(DailyUsage {
                    date: row.get(0)?,
                    wifi_bytes: row.get(1)?,
                    mobile_bytes: row.get(2)?,
                })
            },
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;
    Ok(row)
}

/// Most recent `days` rows, newest first.
pub fn history(pool: &Pool, days: u32) -> Result<Vec<DailyUsage>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT date, wifi_bytes, mobile_bytes FROM daily_usage
         ORDER BY date DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map([days], |row| {
        Ok(DailyUsage {
            date: row.get(0)?,
            wifi_bytes: row.get(1)?,
            mobile_bytes: row.get(2)?,
        })
    })?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Persist the daily limit in MiB. 0 clears it.
pub fn set_daily_limit_mb(pool: &Pool, limit_mb: i64) -> Result<()> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO settings (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
        rusqlite::params![SETTING_DAILY_LIMIT_MB, limit_mb.to_string()],
    )?;
    Ok(())
}

/// Configured daily limit in MiB; 0 means no limit.
pub fn daily_limit_mb(pool: &Pool) -> Result<i64> {
    let conn = pool.get()?;
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM settings WHERE key = ?1",
            [SETTING_DAILY_LIMIT_MB],
            |row| row.get(0),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;

    Ok(value.and_then(|v| v.parse().ok()).unwrap_or(0))
}

/// Has mobile usage crossed the limit? A limit of 0 never triggers.
pub fn over_limit(usage: &DailyUsage, limit_mb: i64) -> bool {
    limit_mb > 0 && usage.mobile_bytes / (1024 * 1024) >= limit_mb
}

/// "2.41 GB" / "13.5 MB" / "820 KB"
pub fn format_bytes(bytes: i64) -> String {
    let kb = bytes as f64 / 1024.0;
    let mb = kb / 1024.0;
    let gb = mb / 1024.0;
    if gb >= 1.0 {
        format!("{:.2} GB", gb)
    } else if mb >= 1.0 {
        format!("{:.1} MB", mb)
    } else {
        format!("{:.0} KB", kb)
    }
}

/// "1.5 MB/s" / "240 KB/s"
pub fn format_rate(bytes_per_sec: f64) -> String {
    let kb = bytes_per_sec / 1024.0;
    let mb = kb / 1024.0;
    if mb >= 1.0 {
        format!("{:.1} MB/s", mb)
    } else if kb >= 1.0 {
        format!("{:.0} KB/s", kb)
    } else {
        "0 KB/s".to_string()
    }
}
