//! Sliding-window download rate sampler.
//!
//! Consumes a byte stream and reports throughput once per window. Generic
//! over the stream so tests can feed a paced synthetic source.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Read granularity. Report and ceiling checks happen at this step even
/// when the transport hands over larger chunks.
const CHUNK_SIZE: usize = 8 * 1024;

/// Pump `source` through the rate estimator, sending one Mbps sample per
/// elapsed `window` on `tx`. Stops when the stream ends, the receiver is
/// dropped, or `ceiling` of wall-clock time has passed. A stream error
/// sends a single 0.0 sample and stops.
pub(crate) async fn pump_samples<S, E>(
    mut source: S,
    tx: mpsc::Sender<f64>,
    window: Duration,
    ceiling: Duration,
) where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    let started = Instant::now();
    let mut last_report = started;
    let mut window_bytes: u64 = 0;

    'read: while let Some(item) = source.next().await {
        let chunk = match item {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!("download stream error: {}", e);
                let _ = tx.send(0.0).await;
                return;
            }
        };

        for piece in chunk.chunks(CHUNK_SIZE) {
            window_bytes += piece.len() as u64;

            let now = Instant::now();
            let elapsed = now - last_report;
            if elapsed >= window {
                let mbps = to_mbps(window_bytes, elapsed);
                if tx.send(mbps).await.is_err() {
                    // Receiver gone; nobody is watching the test anymore.
                    return;
                }
                window_bytes = 0;
                last_report = now;
            }

            if now - started > ceiling {
                tracing::debug!(secs = ceiling.as_secs(), "ceiling reached, stopping test");
                break 'read;
            }
        }
    }
}

/// bytes-per-interval -> bits/sec -> Mbps.
fn to_mbps(bytes: u64, elapsed: Duration) -> f64 {
    let bytes_per_sec = bytes as f64 / elapsed.as_secs_f64();
    bytes_per_sec * 8.0 / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    /// A source that yields `chunks` pieces of `size` bytes, sleeping
    /// `pace` between each. Runs under tokio's paused clock so elapsed
    /// time is exact.
    fn paced_source(
        chunks: usize,
        size: usize,
        pace: Duration,
    ) -> impl Stream<Item = Result<Bytes, Infallible>> + Unpin {
        Box::pin(futures::stream::unfold(0usize, move |i| async move {
            if i >= chunks {
                return None;
            }
            tokio::time::sleep(pace).await;
            Some((Ok(Bytes::from(vec![0u8; size])), i + 1))
        }))
    }

    #[tokio::test(start_paused = true)]
    async fn test_samples_converge_to_source_rate() {
        // 8 KiB every 50 ms = 163840 B/s = 1.31072 Mbps.
        let source = paced_source(40, CHUNK_SIZE, Duration::from_millis(50));
        let (tx, mut rx) = mpsc::channel(64);

        pump_samples(
            source,
            tx,
            Duration::from_millis(200),
            Duration::from_secs(15),
        )
        .await;

        let mut samples = Vec::new();
        while let Some(s) = rx.recv().await {
            samples.push(s);
        }
        assert!(!samples.is_empty());
        for s in &samples {
            assert!((s - 1.31072).abs() < 0.01, "sample {} off target", s);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_at_most_one_sample_per_window() {
        // 2 s of transfer at one chunk per 50 ms -> at most 10 windows.
        let source = paced_source(40, CHUNK_SIZE, Duration::from_millis(50));
        let (tx, mut rx) = mpsc::channel(64);

        pump_samples(
            source,
            tx,
            Duration::from_millis(200),
            Duration::from_secs(15),
        )
        .await;

        let mut count = 0;
        while rx.recv().await.is_some() {
            count += 1;
        }
        assert!(count <= 10, "{} samples for 2s of transfer", count);
        assert!(count >= 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_error_emits_single_zero() {
        let source = Box::pin(futures::stream::iter(vec![Err::<Bytes, String>(
            "connection reset".to_string(),
        )]));
        let (tx, mut rx) = mpsc::channel(64);

        pump_samples(
            source,
            tx,
            Duration::from_millis(200),
            Duration::from_secs(15),
        )
        .await;

        assert_eq!(rx.recv().await, Some(0.0));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ceiling_stops_endless_stream() {
        // Endless source; the 1 s ceiling must end the loop.
        let source = Box::pin(futures::stream::unfold((), |()| async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Some((Ok::<_, Infallible>(Bytes::from(vec![0u8; CHUNK_SIZE])), ()))
        }));
        let (tx, mut rx) = mpsc::channel(64);

        let ran = tokio::time::timeout(
            Duration::from_secs(60),
            pump_samples(source, tx, Duration::from_millis(200), Duration::from_secs(1)),
        )
        .await;
        assert!(ran.is_ok(), "sampler did not stop at the ceiling");

        let mut count = 0;
        while rx.recv().await.is_some() {
            count += 1;
        }
        // ~5 windows fit in one second.
        assert!(count <= 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_sample_for_short_interval() {
        // Whole transfer finishes in 100 ms: under one window, so the
        // only acceptable outcome is zero samples.
        let source = paced_source(2, CHUNK_SIZE, Duration::from_millis(50));
        let (tx, mut rx) = mpsc::channel(64);

        pump_samples(
            source,
            tx,
            Duration::from_millis(200),
            Duration::from_secs(15),
        )
        .await;

        assert_eq!(rx.recv().await, None);
    }
}
