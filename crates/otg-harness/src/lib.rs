//! Traffic-test harness.
//!
//! Pushes a [`otg_model::Config`] to a controller, starts capture and
//! transmission, then checks that every expected packet was sent and
//! received and that every captured frame is Ethernet/IPv4/UDP.
//!
//! - [`runner`]: the run sequence ([`Harness`])
//! - [`verify`]: packet count accounting
//! - [`capture`]: pcap parsing and per-frame checks
//! - [`frame`]: Ethernet/VLAN/IPv4/UDP/TCP decoder
//! - [`scenario`]: the built-in back-to-back scenario and TOML scenario files

pub mod capture;
pub mod frame;
pub mod runner;
pub mod scenario;
pub mod verify;

pub use capture::{CaptureSummary, verify_udp_capture};
pub use runner::{
    CapturePort, Harness, HarnessError, PersistCapture, RunReport, RunSettings, Settle,
};
pub use scenario::{Scenario, ScenarioError, b2b};
pub use verify::{PacketCounts, PortCount, VerifyError};
