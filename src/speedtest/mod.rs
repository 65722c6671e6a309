//! Download speed test: streamed GET against a large synthetic payload,
//! throughput sampled once per 200 ms window.

mod engine;

use crate::config::SpeedTestConfig;
use anyhow::Result;
use bytes::Bytes;
use futures::Stream;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum SpeedTestError {
    #[error("server returned HTTP {status}")]
    BadStatus { status: u16 },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Aggregated outcome of one test run, persisted to history.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SpeedTestSummary {
    pub url: String,
    pub samples: u32,
    pub avg_mbps: f64,
    pub peak_mbps: f64,
    pub duration_secs: f64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Start a download test. Returns the receiving end of a finite,
/// non-restartable sample sequence (Mbps). The sequence ends when the
/// transfer completes, the ceiling elapses, or an error occurred (after
/// one terminal 0.0 sample).
pub fn start(cfg: &SpeedTestConfig) -> mpsc::Receiver<f64> {
    let (tx, rx) = mpsc::channel(64);
    let cfg = cfg.clone();

    tokio::spawn(async move {
        let window = Duration::from_millis(cfg.window_ms);
        let ceiling = Duration::from_secs(cfg.ceiling_secs);

        match open_stream(&cfg).await {
            Ok(stream) => {
                engine::pump_samples(Box::pin(stream), tx, window, ceiling).await;
                // Dropping the stream releases the connection.
            }
            Err(e) => {
                tracing::warn!(url = %cfg.url, "speed test failed: {}", e);
                let _ = tx.send(0.0).await;
            }
        }
    });

    rx
}

async fn open_stream(
    cfg: &SpeedTestConfig,
) -> Result<impl Stream<Item = Result<Bytes, reqwest::Error>>, SpeedTestError> {
    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(cfg.connect_timeout_secs))
        .read_timeout(Duration::from_secs(cfg.read_timeout_secs))
        .build()?;

    tracing::debug!(url = %cfg.url, "connecting to speed test server");
    let resp = client.get(&cfg.url).send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(SpeedTestError::BadStatus {
            status: status.as_u16(),
        });
    }
    tracing::debug!(%status, "connected");

    Ok(resp.bytes_stream())
}

/// Run a test to completion, printing samples as they arrive.
pub async fn run_test(cfg: &SpeedTestConfig) -> Result<SpeedTestSummary> {
    println!(
        "Running download test against {} ({}s ceiling)...",
        cfg.url, cfg.ceiling_secs
    );

    let started = std::time::Instant::now();
    let mut rx = start(cfg);

    let mut samples: u32 = 0;
    let mut sum = 0.0;
    let mut peak = 0.0f64;
    while let Some(mbps) = rx.recv().await {
        println!("  -> {:.2} Mbps", mbps);
        samples += 1;
        sum += mbps;
        peak = peak.max(mbps);
    }

    let avg = if samples > 0 { sum / samples as f64 } else { 0.0 };
    let summary = SpeedTestSummary {
        url: cfg.url.clone(),
        samples,
        avg_mbps: avg,
        peak_mbps: peak,
        duration_secs: started.elapsed().as_secs_f64(),
        timestamp: chrono::Utc::now(),
    };

    println!(
        "Download: {:.2} Mbps average, {:.2} Mbps peak ({} samples in {:.1}s)",
        summary.avg_mbps, summary.peak_mbps, summary.samples, summary.duration_secs
    );

    Ok(summary)
}
