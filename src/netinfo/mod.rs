//! Local network status: default interface, IPv4 address and Wi-Fi link
//! details. Everything degrades to "not connected" rather than erroring.

use serde::Serialize;
use std::net::Ipv4Addr;
use std::process::Command;

#[derive(Debug, Clone, Serialize)]
pub struct NetworkStatus {
    pub interface: Option<String>,
    pub ipv4: Option<Ipv4Addr>,
    /// Present only when the default interface is an associated
    /// wireless link.
    pub wifi: Option<WifiLink>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WifiLink {
    pub ssid: Option<String>,
    pub bssid: Option<String>,
    pub freq_mhz: Option<u32>,
    pub signal_dbm: Option<i32>,
    pub tx_bitrate_mbps: Option<f32>,
}

/// IPv4 address of the default route's interface, if any.
pub fn local_ipv4() -> Option<Ipv4Addr> {
    let iface = netdev::get_default_interface().ok()?;
    iface.ipv4.first().map(|net| net.addr())
}

/// Snapshot of the current connection.
pub fn status() -> NetworkStatus {
    match netdev::get_default_interface() {
        Ok(iface) => {
            let ipv4 = iface.ipv4.first().map(|net| net.addr());
            let wifi = wifi_link(&iface.name);
            NetworkStatus {
                interface: Some(iface.name),
                ipv4,
                wifi,
            }
        }
        Err(e) => {
            tracing::debug!("no default interface: {}", e);
            NetworkStatus {
                interface: None,
                ipv4: None,
                wifi: None,
            }
        }
    }
}

/// Query `iw dev <iface> link`. None when iw is missing, the interface
/// is not wireless, or the link is down.
fn wifi_link(iface: &str) -> Option<WifiLink> {
    let output = Command::new("iw")
        .arg("dev")
        .arg(iface)
        .arg("link")
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    parse_iw_link(&String::from_utf8_lossy(&output.stdout))
}

// Expected shape:
//   Connected to 00:11:22:33:44:55 (on wlan0)
//   	SSID: MyNet
//   	freq: 5180
//   	signal: -50 dBm
//   	tx bitrate: 866.7 MBit/s
fn parse_iw_link(stdout: &str) -> Option<WifiLink> {
    if stdout.contains("Not connected.") || stdout.trim().is_empty() {
        return None;
    }

    let mut link = WifiLink::default();
    for line in stdout.lines() {
        let line = line.trim();
        if line.starts_with("Connected to") {
            link.bssid = line.split_whitespace().nth(2).map(str::to_string);
        } else if let Some(ssid) = line.strip_prefix("SSID: ") {
            link.ssid = Some(ssid.to_string());
        } else if let Some(freq) = line.strip_prefix("freq: ") {
            link.freq_mhz = freq.parse().ok();
        } else if let Some(signal) = line.strip_prefix("signal: ") {
            link.signal_dbm = signal.replace(" dBm", "").parse().ok();
        } else if let Some(tx) = line.strip_prefix("tx bitrate: ") {
            link.tx_bitrate_mbps = tx.split_whitespace().next().and_then(|v| v.parse().ok());
        }
    }

    if link.bssid.is_none() && link.ssid.is_none() {
        return None;
    }
    Some(link)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_connected_link() {
        let out = "Connected to 00:11:22:33:44:55 (on wlan0)\n\
                   \tSSID: HomeNet\n\
                   \tfreq: 5180\n\
                   \tsignal: -48 dBm\n\
                   \ttx bitrate: 866.7 MBit/s VHT-MCS 9 80MHz short GI VHT-NSS 2\n";
        let link = parse_iw_link(out).unwrap();
        assert_eq!(link.ssid.as_deref(), Some("HomeNet"));
        assert_eq!(link.bssid.as_deref(), Some("00:11:22:33:44:55"));
        assert_eq!(link.freq_mhz, Some(5180));
        assert_eq!(link.signal_dbm, Some(-48));
        assert_eq!(link.tx_bitrate_mbps, Some(866.7));
    }

    #[test]
    fn test_parse_not_connected() {
        assert!(parse_iw_link("Not connected.\n").is_none());
        assert!(parse_iw_link("").is_none());
    }
}
