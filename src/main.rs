use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use speedfinder::config::{self, ProbeMechanism};
use speedfinder::scan::probe::{IcmpEchoProbe, PingProbe, ReachabilityProbe};
use speedfinder::scan::DeviceKind;
use speedfinder::{monitor, netinfo, scan, speedtest, storage, usage};

#[derive(Parser)]
#[command(
    name = "speedfinder",
    about = "Network speed, data usage and LAN discovery toolkit",
    version,
    long_about = None
)]
struct Cli {
    /// Config file (TOML); defaults apply when absent
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the daemon (API server + usage monitor)
    Serve {
        /// Bind address (overrides config)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Run a download speed test
    SpeedTest {
        /// Download URL (overrides config)
        #[arg(long)]
        url: Option<String>,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Sweep the local /24 for reachable devices
    Scan {
        /// Probe mechanism: ping (unprivileged) or icmp (raw socket)
        #[arg(long)]
        probe: Option<String>,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Watch live throughput and record it into the daily ledger
    Monitor,

    /// Inspect or configure daily data usage
    Usage {
        #[command(subcommand)]
        action: UsageAction,
    },

    /// Show the current network connection
    Status {
        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum UsageAction {
    /// Show recent daily usage
    Show {
        /// Days of history
        #[arg(long, default_value = "7")]
        days: u32,
    },

    /// Set the daily mobile-data limit in MB (0 clears it)
    Limit {
        #[arg(long)]
        mb: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| cfg.bind.clone());
            tracing::info!(%bind, "Starting SpeedFinder daemon");
            speedfinder::serve(&bind, cfg).await?;
        }
        Commands::SpeedTest { url, json } => {
            let mut st_cfg = cfg.speedtest.clone();
            if let Some(url) = url {
                st_cfg.url = url;
            }

            let summary = speedtest::run_test(&st_cfg).await?;

            let pool = storage::open_pool(&cfg.db_path)?;
            storage::save_speedtest(&pool, &summary)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
        }
        Commands::Scan { probe, json } => {
            let mechanism = match probe.as_deref() {
                Some("ping") => ProbeMechanism::Ping,
                Some("icmp") => ProbeMechanism::Icmp,
                Some(other) => anyhow::bail!("unknown probe mechanism '{}'", other),
                None => cfg.scan.probe,
            };
            let probe: Arc<dyn ReachabilityProbe> = match mechanism {
                ProbeMechanism::Ping => Arc::new(PingProbe::new(cfg.scan.ping_timeout_secs)),
                ProbeMechanism::Icmp => Arc::new(IcmpEchoProbe::new(cfg.scan.icmp_timeout_ms)?),
            };

            let local_ip = netinfo::local_ipv4();
            let report = scan::scan_subnet(local_ip, probe).await;

            let pool = storage::open_pool(&cfg.db_path)?;
            storage::save_scan(&pool, &report)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else if report.subnet.is_none() {
                println!("No active network connection; nothing to scan.");
            } else {
                println!(
                    "Found {} active devices on {}.0/24 ({:.1}s):",
                    report.devices.len(),
                    report.subnet.as_deref().unwrap_or("?"),
                    report.elapsed_secs
                );
                for device in &report.devices {
                    let label = match device.kind {
                        DeviceKind::Gateway => "Gateway Router",
                        DeviceKind::SelfDevice => "(Me)",
                        DeviceKind::Device => "Device",
                    };
                    println!("  {:<15} {}", device.ip, label);
                }
            }
        }
        Commands::Monitor => {
            let pool = storage::open_pool(&cfg.db_path)?;
            let cancel = tokio_util::sync::CancellationToken::new();

            let signal_cancel = cancel.clone();
            tokio::spawn(async move {
                let _ = tokio::signal::ctrl_c().await;
                signal_cancel.cancel();
            });

            println!("Monitoring network throughput (Ctrl-C to stop)...");
            monitor::run(pool, cfg.monitor.clone(), cancel, true).await?;
        }
        Commands::Usage { action } => {
            let pool = storage::open_pool(&cfg.db_path)?;
            match action {
                UsageAction::Show { days } => {
                    let limit_mb = usage::daily_limit_mb(&pool)?;
                    let rows = usage::history(&pool, days)?;
                    if rows.is_empty() {
                        println!("No usage recorded yet. Run 'speedfinder monitor' to start.");
                    } else {
                        println!("{:<12} | {:>10} | {:>10} | {:>10}", "Date", "WiFi", "Mobile", "Total");
                        println!("{:-<12}-|-{:-<10}-|-{:-<10}-|-{:-<10}", "", "", "", "");
                        for row in &rows {
                            println!(
                                "{:<12} | {:>10} | {:>10} | {:>10}",
                                row.date,
                                usage::format_bytes(row.wifi_bytes),
                                usage::format_bytes(row.mobile_bytes),
                                usage::format_bytes(row.total_bytes()),
                            );
                        }
                    }
                    if limit_mb > 0 {
                        println!("\nDaily mobile limit: {} MB", limit_mb);
                    }
                }
                UsageAction::Limit { mb } => {
                    anyhow::ensure!(mb >= 0, "limit must not be negative");
                    usage::set_daily_limit_mb(&pool, mb)?;
                    if mb == 0 {
                        println!("Daily limit cleared.");
                    } else {
                        println!("Daily mobile limit set to {} MB.", mb);
                    }
                }
            }
        }
        Commands::Status { json } => {
            let status = netinfo::status();
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                match (&status.interface, status.ipv4) {
                    (Some(iface), Some(ip)) => {
                        println!("Interface: {}", iface);
                        println!("IPv4:      {}", ip);
                    }
                    _ => println!("Not connected."),
                }
                if let Some(wifi) = &status.wifi {
                    if let Some(ssid) = &wifi.ssid {
                        println!("SSID:      {}", ssid);
                    }
                    if let Some(signal) = wifi.signal_dbm {
                        println!("Signal:    {} dBm", signal);
                    }
                    if let Some(rate) = wifi.tx_bitrate_mbps {
                        println!("TX rate:   {:.1} Mbit/s", rate);
                    }
                }
            }
        }
    }

    Ok(())
}
