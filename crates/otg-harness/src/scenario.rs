//! Built-in and file-based test scenarios.
//!
//! A scenario file is TOML with three tables:
//!
//! ```toml
//! [controller]
//! url = "https://localhost:8443"
//! insecure = true
//!
//! [run]
//! verify_round_trip = true
//! capture_out = "cap.pcap"
//!
//! [config]
//! # ports, layer1, captures, flows as the controller expects them
//! ```
//!
//! Every `[run]` key is optional; see [`RunSettingsInput::resolve`] for
//! the defaults.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use otg_client::HttpControllerConfig;
use otg_model::{Config, Flow, MacAddr, Speed};
use serde::Deserialize;
use thiserror::Error;

use crate::runner::{CapturePort, PersistCapture, RunSettings, Settle};

pub const DEFAULT_CAPTURE_OUT: &str = "cap.pcap";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
/// Flow metric reads before a polling settle gives up.
pub const DEFAULT_MAX_POLLS: u32 = 20;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to read scenario {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid scenario TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid scenario: {0}")]
    Invalid(String),
}

// ── Built-in back-to-back scenario ──────────────────────────────────

const B2B_P1_MAC: MacAddr = MacAddr::new([0x00, 0xaa, 0x00, 0x00, 0x04, 0x00]);
const B2B_P2_MAC: MacAddr = MacAddr::new([0x00, 0xaa, 0x00, 0x00, 0x00, 0xaa]);
const B2B_P1_IP: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
const B2B_P2_IP: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 2);
const B2B_PACKETS: u64 = 1000;
const B2B_PPS: u64 = 1000;

/// Two ports wired back to back, one UDP flow each way.
///
/// `flow p1->p2` sends 128-byte frames with source ports 5000, 5002, ...
/// (10 values) and destination ports cycling through 4000/4044/4060/4074.
/// `flow p2->p1` sends 256-byte frames with source ports 6000, 6004, ...
/// and destination ports 8000/8044/8060/8074/8082/8084. Both send 1000
/// packets at 1000 pps over a 1 Gbps link with capture on both ports.
pub fn b2b(p1_location: &str, p2_location: &str) -> Config {
    let mut config = Config::new();
    config.port("p1", p1_location);
    config.port("p2", p2_location);
    config
        .layer1("ly")
        .speed(Speed::Speed1Gbps)
        .port_names(["p1", "p2"]);
    config.capture("cp").port_names(["p1", "p2"]);

    let f1 = config.flow("flow p1->p2");
    f1.tx_rx("p1", "p2");
    udp_flow(f1, 128, (B2B_P1_MAC, B2B_P2_MAC), (B2B_P1_IP, B2B_P2_IP));
    let udp = f1.packet.udp();
    udp.src_port.set_increment(5000, 2, 10);
    udp.dst_port.set_values([4000, 4044, 4060, 4074]);

    let f2 = config.flow("flow p2->p1");
    f2.tx_rx("p2", "p1");
    udp_flow(f2, 256, (B2B_P2_MAC, B2B_P1_MAC), (B2B_P2_IP, B2B_P1_IP));
    let udp = f2.packet.udp();
    udp.src_port.set_increment(6000, 4, 10);
    udp.dst_port.set_values([8000, 8044, 8060, 8074, 8082, 8084]);

    config
}

/// Size, rate, count, and the Ethernet/IPv4 part of the header stack.
fn udp_flow(
    flow: &mut Flow,
    size: u32,
    (src_mac, dst_mac): (MacAddr, MacAddr),
    (src_ip, dst_ip): (Ipv4Addr, Ipv4Addr),
) {
    flow.size_fixed(size)
        .rate_pps(B2B_PPS)
        .fixed_packets(B2B_PACKETS);
    let eth = flow.packet.ethernet();
    eth.src.set_value(src_mac);
    eth.dst.set_value(dst_mac);
    let ip = flow.packet.ipv4();
    ip.src.set_value(src_ip);
    ip.dst.set_value(dst_ip);
}

// ── Scenario files ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScenarioInput {
    pub controller: ControllerInput,
    pub run: RunSettingsInput,
    pub config: Config,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ControllerInput {
    pub url: String,
    pub timeout_secs: Option<u64>,
    pub insecure: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettleMode {
    #[default]
    None,
    PollTransmit,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RunSettingsInput {
    pub verify_round_trip: Option<bool>,
    pub stop_capture_before_fetch: Option<bool>,
    pub settle: SettleMode,
    pub poll_interval_ms: Option<u64>,
    pub max_polls: Option<u32>,
    /// Write a capture to disk at all. Defaults to true.
    pub persist_capture: Option<bool>,
    /// Port whose capture is written. Defaults to the last declared port.
    pub persist_port: Option<String>,
    pub capture_out: Option<PathBuf>,
}

impl RunSettingsInput {
    /// Fill in defaults: no round trip check, single-shot metrics read,
    /// capture of the last declared port written to `cap.pcap`.
    pub fn resolve(self) -> Result<RunSettings, ScenarioError> {
        let settle = match self.settle {
            SettleMode::None => Settle::None,
            SettleMode::PollTransmit => {
                let max_polls = self.max_polls.unwrap_or(DEFAULT_MAX_POLLS);
                if max_polls == 0 {
                    return Err(ScenarioError::Invalid(
                        "run.max_polls must be at least 1".into(),
                    ));
                }
                Settle::PollTransmit {
                    interval: Duration::from_millis(
                        self.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS),
                    ),
                    max_polls,
                }
            }
        };

        let persist = if self.persist_capture.unwrap_or(true) {
            let port = match self.persist_port {
                Some(name) if !name.trim().is_empty() => CapturePort::Named(name.trim().to_string()),
                _ => CapturePort::LastDeclared,
            };
            Some(PersistCapture {
                port,
                path: self
                    .capture_out
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_CAPTURE_OUT)),
            })
        } else {
            None
        };

        Ok(RunSettings {
            verify_round_trip: self.verify_round_trip.unwrap_or(false),
            settle,
            stop_capture_before_fetch: self.stop_capture_before_fetch.unwrap_or(false),
            persist,
        })
    }
}

/// A resolved scenario file.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub controller: HttpControllerConfig,
    pub settings: RunSettings,
    pub config: Config,
}

impl Scenario {
    pub fn from_toml_str(input: &str) -> Result<Self, ScenarioError> {
        let parsed: ScenarioInput = toml::from_str(input)?;
        parsed.resolve()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

impl ScenarioInput {
    pub fn resolve(self) -> Result<Scenario, ScenarioError> {
        let url = self.controller.url.trim();
        if url.is_empty() {
            return Err(ScenarioError::Invalid("controller.url must be set".into()));
        }
        let controller = HttpControllerConfig {
            base_url: url.to_string(),
            timeout: self.controller.timeout_secs.map(Duration::from_secs),
            insecure: self.controller.insecure,
        };
        Ok(Scenario {
            controller,
            settings: self.run.resolve()?,
            config: self.config,
        })
    }
}
