//! Subnet device scanner: probe every host of the local /24 concurrently
//! and report which addresses answered.

pub mod probe;

use self::probe::ReachabilityProbe;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::net::Ipv4Addr;
use std::sync::Arc;
use uuid::Uuid;

/// Host octets probed in one sweep: 1..=254.
pub const HOST_RANGE: std::ops::RangeInclusive<u8> = 1..=254;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// Host octet 1, by convention the router.
    Gateway,
    /// The scanning machine itself.
    #[serde(rename = "self")]
    SelfDevice,
    Device,
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceKind::Gateway => write!(f, "gateway"),
            DeviceKind::SelfDevice => write!(f, "self"),
            DeviceKind::Device => write!(f, "device"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Device {
    pub ip: Ipv4Addr,
    pub kind: DeviceKind,
}

#[derive(Debug, Serialize)]
pub struct ScanReport {
    pub run_id: Uuid,
    /// Dotted /24 prefix, e.g. "192.168.1". None when there was no
    /// active network to scan.
    pub subnet: Option<String>,
    pub devices: Vec<Device>,
    pub probes_sent: u32,
    pub elapsed_secs: f64,
    pub timestamp: DateTime<Utc>,
}

impl ScanReport {
    fn empty(run_id: Uuid) -> Self {
        Self {
            run_id,
            subnet: None,
            devices: Vec::new(),
            probes_sent: 0,
            elapsed_secs: 0.0,
            timestamp: Utc::now(),
        }
    }
}

/// Sweep the /24 around `local_ip`. All probes launch at once and the
/// scan finishes only after every one of them resolved. `local_ip` is
/// always present in the result tagged as self, answered or not; no
/// local address means an empty report with zero probes sent.
pub async fn scan_subnet(
    local_ip: Option<Ipv4Addr>,
    probe: Arc<dyn ReachabilityProbe>,
) -> ScanReport {
    let run_id = Uuid::new_v4();

    let Some(my_ip) = local_ip else {
        tracing::warn!("no active IPv4 network, nothing to scan");
        return ScanReport::empty(run_id);
    };

    let started = std::time::Instant::now();
    let [a, b, c, my_host] = my_ip.octets();
    let subnet = format!("{}.{}.{}", a, b, c);
    tracing::info!(%run_id, %subnet, "scanning subnet");

    let tasks: Vec<_> = HOST_RANGE
        .map(|host| {
            let probe = Arc::clone(&probe);
            let addr = Ipv4Addr::new(a, b, c, host);
            tokio::spawn(async move { probe.is_reachable(addr).await.then_some(host) })
        })
        .collect();
    let probes_sent = tasks.len() as u32;

    let mut devices = Vec::new();
    for joined in join_all(tasks).await {
        let Ok(Some(host)) = joined else { continue };
        devices.push(Device {
            ip: Ipv4Addr::new(a, b, c, host),
            kind: classify(host, my_host),
        });
    }

    // The scanner's own address is listed even when its probe missed.
    if !devices.iter().any(|d| d.kind == DeviceKind::SelfDevice) {
        devices.push(Device {
            ip: my_ip,
            kind: DeviceKind::SelfDevice,
        });
    }
    devices.sort_by_key(|d| d.ip.octets()[3]);

    let report = ScanReport {
        run_id,
        subnet: Some(subnet),
        devices,
        probes_sent,
        elapsed_secs: started.elapsed().as_secs_f64(),
        timestamp: Utc::now(),
    };
    tracing::info!(
        %run_id,
        devices = report.devices.len(),
        elapsed_secs = report.elapsed_secs,
        "scan complete"
    );
    report
}

fn classify(host: u8, my_host: u8) -> DeviceKind {
    if host == my_host {
        DeviceKind::SelfDevice
    } else if host == 1 {
        DeviceKind::Gateway
    } else {
        DeviceKind::Device
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FakeProbe {
        alive: HashSet<Ipv4Addr>,
        calls: AtomicU32,
    }

    impl FakeProbe {
        fn new(alive: &[Ipv4Addr]) -> Arc<Self> {
            Arc::new(Self {
                alive: alive.iter().copied().collect(),
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl ReachabilityProbe for FakeProbe {
        async fn is_reachable(&self, addr: Ipv4Addr) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.alive.contains(&addr)
        }
    }

    #[tokio::test]
    async fn test_no_local_ip_yields_empty_report_without_probes() {
        let probe = FakeProbe::new(&[]);
        let report = scan_subnet(None, probe.clone()).await;

        assert!(report.devices.is_empty());
        assert_eq!(report.probes_sent, 0);
        assert!(report.subnet.is_none());
        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_probes_all_254_hosts_once() {
        let me = Ipv4Addr::new(192, 168, 1, 5);
        let probe = FakeProbe::new(&[]);
        let report = scan_subnet(Some(me), probe.clone()).await;

        assert_eq!(report.probes_sent, 254);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 254);
        assert_eq!(report.subnet.as_deref(), Some("192.168.1"));
    }

    #[tokio::test]
    async fn test_self_always_listed_even_when_unreachable() {
        let me = Ipv4Addr::new(10, 0, 0, 42);
        // Self does not answer; only the gateway does.
        let probe = FakeProbe::new(&[Ipv4Addr::new(10, 0, 0, 1)]);
        let report = scan_subnet(Some(me), probe).await;

        let selfs: Vec<_> = report
            .devices
            .iter()
            .filter(|d| d.kind == DeviceKind::SelfDevice)
            .collect();
        assert_eq!(selfs.len(), 1);
        assert_eq!(selfs[0].ip, me);
    }

    #[tokio::test]
    async fn test_classification() {
        let me = Ipv4Addr::new(192, 168, 1, 5);
        let probe = FakeProbe::new(&[
            Ipv4Addr::new(192, 168, 1, 1),
            Ipv4Addr::new(192, 168, 1, 5),
            Ipv4Addr::new(192, 168, 1, 20),
        ]);
        let report = scan_subnet(Some(me), probe).await;

        assert_eq!(report.devices.len(), 3);
        assert_eq!(report.devices[0].kind, DeviceKind::Gateway);
        assert_eq!(report.devices[1].kind, DeviceKind::SelfDevice);
        assert_eq!(report.devices[2].kind, DeviceKind::Device);
        // Sorted by host octet.
        assert_eq!(report.devices[2].ip, Ipv4Addr::new(192, 168, 1, 20));
    }

    #[tokio::test]
    async fn test_self_tag_wins_over_gateway_tag() {
        let me = Ipv4Addr::new(192, 168, 1, 1);
        let probe = FakeProbe::new(&[me]);
        let report = scan_subnet(Some(me), probe).await;

        assert_eq!(report.devices.len(), 1);
        assert_eq!(report.devices[0].kind, DeviceKind::SelfDevice);
    }
}
