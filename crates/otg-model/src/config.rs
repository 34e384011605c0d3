//! Declarative test configuration.
//!
//! A [`Config`] is the whole topology pushed to a controller in one
//! `set_config` call. Entities are created through ordered-insertion
//! factories and referenced elsewhere by name. No reference is checked
//! here: duplicate names and dangling port names are only reported by the
//! controller when the config is submitted.

use serde::{Deserialize, Serialize};

use crate::packet::Packet;

// ── Config ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ports: Vec<Port>,
    pub layer1: Vec<Layer1>,
    pub captures: Vec<Capture>,
    pub flows: Vec<Flow>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a port and return a handle to it.
    pub fn port(&mut self, name: impl Into<String>, location: impl Into<String>) -> &mut Port {
        self.ports.push(Port {
            name: name.into(),
            location: Some(location.into()),
        });
        last(&mut self.ports)
    }

    /// Append a layer-1 setting (default speed, no ports yet).
    pub fn layer1(&mut self, name: impl Into<String>) -> &mut Layer1 {
        self.layer1.push(Layer1 {
            name: name.into(),
            port_names: Vec::new(),
            speed: Speed::default(),
        });
        last(&mut self.layer1)
    }

    /// Append a capture (no ports yet).
    pub fn capture(&mut self, name: impl Into<String>) -> &mut Capture {
        self.captures.push(Capture {
            name: name.into(),
            port_names: Vec::new(),
        });
        last(&mut self.captures)
    }

    /// Append a flow with default size, rate and duration.
    pub fn flow(&mut self, name: impl Into<String>) -> &mut Flow {
        self.flows.push(Flow::new(name));
        last(&mut self.flows)
    }

    pub fn find_flow_mut(&mut self, name: &str) -> Option<&mut Flow> {
        self.flows.iter_mut().find(|f| f.name == name)
    }

    pub fn port_names(&self) -> Vec<String> {
        self.ports.iter().map(|p| p.name.clone()).collect()
    }

    /// Sum of fixed packet counts across all flows.
    ///
    /// `None` if any flow has no fixed packet count, since the number of
    /// packets it sends is then not known up front, or if the sum does not
    /// fit in a `u64`.
    pub fn expected_packets(&self) -> Option<u64> {
        self.flows
            .iter()
            .try_fold(0u64, |acc, f| acc.checked_add(f.duration.fixed_packet_count()?))
    }
}

fn last<T>(items: &mut [T]) -> &mut T {
    match items.last_mut() {
        Some(item) => item,
        None => unreachable!("item was just pushed"),
    }
}

// ── Ports & layer 1 ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    pub name: String,
    /// Physical or virtual location, e.g. `eth1` or `host:5555`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer1 {
    pub name: String,
    #[serde(default)]
    pub port_names: Vec<String>,
    #[serde(default)]
    pub speed: Speed,
}

impl Layer1 {
    pub fn speed(&mut self, speed: Speed) -> &mut Self {
        self.speed = speed;
        self
    }

    pub fn port_names<I, S>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.port_names = names.into_iter().map(Into::into).collect();
        self
    }
}

/// Link speed applied by a layer-1 setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Speed {
    #[serde(rename = "speed_10_fd_mbps")]
    Speed10FdMbps,
    #[serde(rename = "speed_100_fd_mbps")]
    Speed100FdMbps,
    #[serde(rename = "speed_1_gbps")]
    Speed1Gbps,
    #[default]
    #[serde(rename = "speed_10_gbps")]
    Speed10Gbps,
    #[serde(rename = "speed_25_gbps")]
    Speed25Gbps,
    #[serde(rename = "speed_40_gbps")]
    Speed40Gbps,
    #[serde(rename = "speed_50_gbps")]
    Speed50Gbps,
    #[serde(rename = "speed_100_gbps")]
    Speed100Gbps,
    #[serde(rename = "speed_200_gbps")]
    Speed200Gbps,
    #[serde(rename = "speed_400_gbps")]
    Speed400Gbps,
}

impl Speed {
    pub fn bits_per_second(self) -> u64 {
        const MBPS: u64 = 1_000_000;
        const GBPS: u64 = 1_000 * MBPS;
        match self {
            Speed::Speed10FdMbps => 10 * MBPS,
            Speed::Speed100FdMbps => 100 * MBPS,
            Speed::Speed1Gbps => GBPS,
            Speed::Speed10Gbps => 10 * GBPS,
            Speed::Speed25Gbps => 25 * GBPS,
            Speed::Speed40Gbps => 40 * GBPS,
            Speed::Speed50Gbps => 50 * GBPS,
            Speed::Speed100Gbps => 100 * GBPS,
            Speed::Speed200Gbps => 200 * GBPS,
            Speed::Speed400Gbps => 400 * GBPS,
        }
    }
}

// ── Captures ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capture {
    pub name: String,
    #[serde(default)]
    pub port_names: Vec<String>,
}

impl Capture {
    pub fn port_names<I, S>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.port_names = names.into_iter().map(Into::into).collect();
        self
    }
}

// ── Flows ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    pub name: String,
    #[serde(default)]
    pub tx_rx: FlowTxRx,
    #[serde(default)]
    pub size: FlowSize,
    #[serde(default)]
    pub rate: FlowRate,
    #[serde(default)]
    pub duration: FlowDuration,
    #[serde(default)]
    pub packet: Packet,
}

impl Flow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tx_rx: FlowTxRx::default(),
            size: FlowSize::default(),
            rate: FlowRate::default(),
            duration: FlowDuration::default(),
            packet: Packet::default(),
        }
    }

    pub fn tx_rx(&mut self, tx_name: impl Into<String>, rx_name: impl Into<String>) -> &mut Self {
        self.tx_rx = FlowTxRx::Port {
            port: PortTxRx {
                tx_name: tx_name.into(),
                rx_name: rx_name.into(),
            },
        };
        self
    }

    pub fn size_fixed(&mut self, bytes: u32) -> &mut Self {
        self.size = FlowSize::Fixed { fixed: bytes };
        self
    }

    pub fn rate_pps(&mut self, pps: u64) -> &mut Self {
        self.rate = FlowRate::Pps { pps };
        self
    }

    /// Send exactly `packets` packets and stop.
    pub fn fixed_packets(&mut self, packets: u64) -> &mut Self {
        self.duration = FlowDuration::FixedPackets {
            fixed_packets: FixedPackets {
                packets,
                ..FixedPackets::default()
            },
        };
        self
    }

    pub fn tx_name(&self) -> &str {
        match &self.tx_rx {
            FlowTxRx::Port { port } => &port.tx_name,
        }
    }

    pub fn rx_name(&self) -> &str {
        match &self.tx_rx {
            FlowTxRx::Port { port } => &port.rx_name,
        }
    }
}

/// Where a flow's packets enter and leave.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "choice", rename_all = "snake_case")]
pub enum FlowTxRx {
    Port { port: PortTxRx },
}

impl Default for FlowTxRx {
    fn default() -> Self {
        FlowTxRx::Port {
            port: PortTxRx::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortTxRx {
    pub tx_name: String,
    pub rx_name: String,
}

/// Frame size in bytes, FCS included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "choice", rename_all = "snake_case")]
pub enum FlowSize {
    Fixed { fixed: u32 },
    Increment { increment: SizeIncrement },
    Random { random: SizeRandom },
}

impl Default for FlowSize {
    fn default() -> Self {
        FlowSize::Fixed { fixed: 64 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeIncrement {
    pub start: u32,
    pub end: u32,
    #[serde(default = "default_size_step")]
    pub step: u32,
}

fn default_size_step() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeRandom {
    pub min: u32,
    pub max: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "choice", rename_all = "snake_case")]
pub enum FlowRate {
    Pps { pps: u64 },
    Bps { bps: u64 },
    /// Share of the tx port's line rate, 0..=100.
    Percentage { percentage: f32 },
}

impl Default for FlowRate {
    fn default() -> Self {
        FlowRate::Pps { pps: 1000 }
    }
}

/// When a flow stops transmitting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "choice", rename_all = "snake_case")]
pub enum FlowDuration {
    FixedPackets { fixed_packets: FixedPackets },
    FixedSeconds { fixed_seconds: FixedSeconds },
    Continuous { continuous: Continuous },
}

impl Default for FlowDuration {
    fn default() -> Self {
        FlowDuration::FixedPackets {
            fixed_packets: FixedPackets::default(),
        }
    }
}

impl FlowDuration {
    /// Exact number of packets the flow sends, if known up front.
    pub fn fixed_packet_count(&self) -> Option<u64> {
        match self {
            FlowDuration::FixedPackets { fixed_packets } => Some(fixed_packets.packets),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixedPackets {
    pub packets: u64,
    /// Minimum inter-packet gap in bytes.
    pub gap: u32,
}

impl Default for FixedPackets {
    fn default() -> Self {
        Self { packets: 1, gap: 12 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixedSeconds {
    pub seconds: f64,
    pub gap: u32,
}

impl Default for FixedSeconds {
    fn default() -> Self {
        Self {
            seconds: 1.0,
            gap: 12,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Continuous {
    pub gap: u32,
}

impl Default for Continuous {
    fn default() -> Self {
        Self { gap: 12 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_port_config() -> Config {
        let mut cfg = Config::new();
        cfg.port("p1", "eth1");
        cfg.port("p2", "eth2");
        cfg.layer1("ly")
            .speed(Speed::Speed1Gbps)
            .port_names(["p1", "p2"]);
        cfg.capture("cp").port_names(["p1", "p2"]);
        cfg.flow("f1")
            .tx_rx("p1", "p2")
            .size_fixed(128)
            .rate_pps(1000)
            .fixed_packets(1000);
        cfg
    }

    #[test]
    fn factories_preserve_insertion_order() {
        let mut cfg = two_port_config();
        cfg.port("p0", "eth0");
        assert_eq!(cfg.port_names(), ["p1", "p2", "p0"]);
        assert_eq!(cfg.layer1[0].port_names, ["p1", "p2"]);
        assert_eq!(cfg.flows[0].tx_name(), "p1");
        assert_eq!(cfg.flows[0].rx_name(), "p2");
    }

    #[test]
    fn builder_accepts_duplicates_and_dangling_refs() {
        let mut cfg = Config::new();
        cfg.port("p1", "eth1");
        cfg.port("p1", "eth2");
        cfg.capture("cp").port_names(["nope"]);
        assert_eq!(cfg.ports.len(), 2);
        assert_eq!(cfg.captures[0].port_names, ["nope"]);
    }

    #[test]
    fn expected_packets_sums_fixed_counts() {
        let mut cfg = two_port_config();
        cfg.flow("f2").tx_rx("p2", "p1").fixed_packets(1000);
        cfg.flow("zero").tx_rx("p2", "p1").fixed_packets(0);
        assert_eq!(cfg.expected_packets(), Some(2000));

        cfg.flow("open").duration = FlowDuration::Continuous {
            continuous: Continuous::default(),
        };
        assert_eq!(cfg.expected_packets(), None);
    }

    #[test]
    fn expected_packets_overflow_is_none() {
        let mut cfg = two_port_config();
        cfg.flows[0].fixed_packets(u64::MAX);
        assert_eq!(cfg.expected_packets(), Some(u64::MAX));
        cfg.flow("f2").tx_rx("p2", "p1").fixed_packets(2);
        assert_eq!(cfg.expected_packets(), None);
    }

    #[test]
    fn default_flow_matches_controller_defaults() {
        let f = Flow::new("f");
        assert_eq!(f.size, FlowSize::Fixed { fixed: 64 });
        assert_eq!(f.rate, FlowRate::Pps { pps: 1000 });
        assert_eq!(f.duration.fixed_packet_count(), Some(1));
    }

    #[test]
    fn json_round_trip_keeps_content() {
        let mut cfg = two_port_config();
        let udp = cfg.flows[0].packet.udp();
        udp.dst_port.set_values([4000, 4044, 4060, 4074]);

        let json = serde_json::to_string(&cfg).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);

        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v["layer1"][0]["speed"], "speed_1_gbps");
        assert_eq!(v["flows"][0]["duration"]["choice"], "fixed_packets");
        assert_eq!(v["flows"][0]["duration"]["fixed_packets"]["packets"], 1000);
        assert_eq!(v["flows"][0]["tx_rx"]["port"]["rx_name"], "p2");
    }

    #[test]
    fn toml_round_trip_keeps_content() {
        let mut cfg = two_port_config();
        let eth = cfg.flows[0].packet.ethernet();
        eth.src.set_value("00:aa:00:00:04:00".parse().unwrap());
        cfg.flows[0].packet.udp().src_port.set_increment(5000, 2, 10);

        let text = toml::to_string(&cfg).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back, cfg);
    }
}
