//! Reachability probes for the subnet sweep.
//!
//! Two mechanisms ship: shell-invoked `ping` (works unprivileged, ~1 s
//! timeout) and a raw-socket ICMP echo (needs CAP_NET_RAW, ~100 ms
//! timeout). A non-response within the timeout counts as "host absent".

use async_trait::async_trait;
use rand::random;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// A single yes/no reachability check. Implementations swallow their own
/// errors; an unreachable host and a failed probe look the same.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn is_reachable(&self, addr: Ipv4Addr) -> bool;
}

/// One shell-invoked ping per target.
pub struct PingProbe {
    timeout_secs: u64,
}

impl PingProbe {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            timeout_secs: timeout_secs.max(1),
        }
    }
}

#[async_trait]
impl ReachabilityProbe for PingProbe {
    async fn is_reachable(&self, addr: Ipv4Addr) -> bool {
        let output = tokio::process::Command::new("ping")
            .arg("-c")
            .arg("1")
            .arg("-W")
            .arg(self.timeout_secs.to_string())
            .arg("-q")
            .arg(addr.to_string())
            .output()
            .await;

        match output {
            Ok(out) => out.status.success(),
            Err(e) => {
                tracing::debug!(%addr, "ping exec failed: {}", e);
                false
            }
        }
    }
}

/// Raw-socket ICMP echo, one shared client across all probes.
pub struct IcmpEchoProbe {
    client: surge_ping::Client,
    timeout: Duration,
}

impl IcmpEchoProbe {
    /// Fails when the raw socket cannot be opened (missing CAP_NET_RAW).
    pub fn new(timeout_ms: u64) -> anyhow::Result<Self> {
        let client = surge_ping::Client::new(&surge_ping::Config::default())?;
        Ok(Self {
            client,
            timeout: Duration::from_millis(timeout_ms),
        })
    }
}

#[async_trait]
impl ReachabilityProbe for IcmpEchoProbe {
    async fn is_reachable(&self, addr: Ipv4Addr) -> bool {
        let mut pinger = self
            .client
            .pinger(IpAddr::V4(addr), surge_ping::PingIdentifier(random()))
            .await;
        pinger.timeout(self.timeout);
        pinger.ping(surge_ping::PingSequence(0), &[]).await.is_ok()
    }
}
