//! Shared types for the OTG traffic-test harness.
//!
//! This crate contains:
//! - **Configuration**: ports, layer-1 settings, captures and flows, built
//!   through ordered-insertion factories on [`Config`]
//! - **Packet templates**: layered header descriptors whose fields are
//!   [`Pattern`]s (fixed value, explicit list or incrementing counter)
//! - **Control and results**: capture/transmit state changes, metrics
//!   requests and responses, capture requests
//! - **Error bodies**: the `{code, kind, errors}` document a controller
//!   returns when it rejects a request
//!
//! Everything here is plain data. Nothing is validated locally; the
//! controller decides what it accepts.

pub mod config;
pub mod control;
pub mod error;
pub mod metrics;
pub mod packet;
pub mod pattern;

pub use config::{
    Capture, Config, Continuous, FixedPackets, FixedSeconds, Flow, FlowDuration, FlowRate,
    FlowSize, FlowTxRx, Layer1, Port, PortTxRx, SizeIncrement, SizeRandom, Speed,
};
pub use control::{
    CaptureControl, CaptureRequest, CaptureState, ControlState, TransmitControl, TransmitState,
};
pub use error::{ErrorDetails, ErrorKind, Warnings};
pub use metrics::{
    CaptureStatus, FlowColumn, FlowMetric, FlowMetricsRequest, LinkState, MetricsRequest,
    MetricsResponse, PortColumn, PortMetric, PortMetricsRequest, TransmitStatus,
};
pub use packet::{EthernetHeader, FlowHeader, Ipv4Header, Packet, TcpHeader, UdpHeader};
pub use pattern::{Counter, MacAddr, MacParseError, Pattern, PatternValue};
