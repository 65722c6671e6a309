//! Live rate monitor: samples interface counters once per second, feeds
//! the daily ledger and raises the data-limit alert.
//!
//! Lifecycle is a CancellationToken owned by the caller; there is no
//! polled "is running" flag.

use crate::config::MonitorConfig;
use crate::storage::Pool;
use crate::usage;
use anyhow::Result;
use std::time::Duration;
use sysinfo::Networks;
use tokio_util::sync::CancellationToken;

/// Run until `cancel` fires. `echo` prints the current rate to stdout
/// (interactive mode); the serve path logs instead.
pub async fn run(pool: Pool, cfg: MonitorConfig, cancel: CancellationToken, echo: bool) -> Result<()> {
    let mut networks = Networks::new_with_refreshed_list();
    let mut interval = tokio::time::interval(Duration::from_secs(cfg.interval_secs.max(1)));
    // First tick completes immediately; consume it so every later tick
    // spans a full interval.
    interval.tick().await;

    let mut ticks: u32 = 0;
    let mut alerted_on: Option<String> = None;
    tracing::info!(interval_secs = cfg.interval_secs, "monitor started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        networks.refresh(true);
        let mut wifi_delta: u64 = 0;
        let mut mobile_delta: u64 = 0;
        for (name, data) in networks.iter() {
            if is_loopback(name) {
                continue;
            }
            let delta = data.received() + data.transmitted();
            if is_mobile_interface(name) {
                mobile_delta += delta;
            } else {
                wifi_delta += delta;
            }
        }

        let total = wifi_delta + mobile_delta;
        let rate = total as f64 / cfg.interval_secs.max(1) as f64;
        if echo {
            println!("Speed: {}", usage::format_rate(rate));
        } else {
            tracing::debug!(rate = %usage::format_rate(rate), "current throughput");
        }

        let date = usage::today_key();
        usage::add_usage(&pool, &date, wifi_delta as i64, mobile_delta as i64)?;

        ticks += 1;
        if ticks % cfg.limit_check_every.max(1) == 0 {
            check_limit(&pool, &date, &mut alerted_on)?;
        }
    }

    tracing::info!("monitor stopped");
    Ok(())
}

fn check_limit(pool: &Pool, date: &str, alerted_on: &mut Option<String>) -> Result<()> {
    let limit_mb = usage::daily_limit_mb(pool)?;
    if limit_mb == 0 {
        return Ok(());
    }
    let Some(today) = usage::usage_for_date(pool, date)? else {
        return Ok(());
    };
    if usage::over_limit(&today, limit_mb) && alerted_on.as_deref() != Some(date) {
        tracing::warn!(
            date,
            limit_mb,
            used = %usage::format_bytes(today.mobile_bytes),
            "daily data limit reached"
        );
        println!(
            "Data limit reached: {} used of {} MB allowed today",
            usage::format_bytes(today.mobile_bytes),
            limit_mb
        );
        *alerted_on = Some(date.to_string());
    }
    Ok(())
}

/// Cellular-style interfaces count as mobile; everything else lands in
/// the wifi column.
fn is_mobile_interface(name: &str) -> bool {
    name.starts_with("wwan") || name.starts_with("rmnet") || name.starts_with("ppp")
}

fn is_loopback(name: &str) -> bool {
    name == "lo" || name.starts_with("lo0")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage;

    #[test]
    fn test_interface_classification() {
        assert!(is_mobile_interface("wwan0"));
        assert!(is_mobile_interface("rmnet_data1"));
        assert!(is_mobile_interface("ppp0"));
        assert!(!is_mobile_interface("wlan0"));
        assert!(!is_mobile_interface("eth0"));
        assert!(is_loopback("lo"));
        assert!(!is_loopback("eth0"));
    }

    #[tokio::test]
    async fn test_cancelled_monitor_stops_promptly() {
        let dir = tempfile::tempdir().unwrap();
        let pool = storage::open_pool(dir.path().join("m.db").to_str().unwrap()).unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            run(pool, MonitorConfig::default(), cancel, false),
        )
        .await;
        assert!(result.is_ok(), "monitor did not stop on cancellation");
        assert!(result.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_limit_alert_fires_once() {
        let dir = tempfile::tempdir().unwrap();
        let pool = storage::open_pool(dir.path().join("m.db").to_str().unwrap()).unwrap();

        usage::set_daily_limit_mb(&pool, 1).unwrap();
        usage::add_usage(&pool, "2026-08-30", 0, 2 * 1024 * 1024).unwrap();

        let mut alerted_on = None;
        check_limit(&pool, "2026-08-30", &mut alerted_on).unwrap();
        assert_eq!(alerted_on.as_deref(), Some("2026-08-30"));

        // Second check on the same day stays quiet (state unchanged).
        check_limit(&pool, "2026-08-30", &mut alerted_on).unwrap();
        assert_eq!(alerted_on.as_deref(), Some("2026-08-30"));
    }
}
