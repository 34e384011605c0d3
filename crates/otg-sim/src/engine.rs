//! Simulated controller state machine.
//!
//! Ports are wired back to back: every packet a flow sends on its tx port
//! arrives on its rx port. Transmission is synchronous, so by the time a
//! transmit-start call returns every bounded flow has finished and its
//! counters are final.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use otg_client::{Controller, ControllerError};
use otg_model::{
    CaptureRequest, CaptureState, CaptureStatus, Config, ControlState, Flow, FlowColumn,
    FlowDuration, FlowMetric, FlowRate, FlowSize, LinkState, MetricsRequest, MetricsResponse,
    PortColumn, PortMetric, TransmitState, TransmitStatus,
};
use rand::RngExt as _;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::error::SimError;
use crate::frame;
use crate::pcap::{self, CapturedFrame};
use crate::validate::validate;

/// Preamble and start-of-frame delimiter, counted for line-rate maths.
const PREAMBLE_LEN: u64 = 8;
/// Frames kept per capture port; later frames are counted but not stored.
pub const MAX_CAPTURED_FRAMES: usize = 1 << 20;
/// Packets sent per flow per start; timed flows are cut off here.
pub const MAX_SIMULATED_PACKETS: u64 = 10_000_000;

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    frames_tx: u64,
    frames_rx: u64,
    bytes_tx: u64,
    bytes_rx: u64,
}

#[derive(Debug, Default)]
struct FlowState {
    counters: Counters,
    transmit: TransmitStatus,
}

#[derive(Debug, Default)]
struct CaptureBuffer {
    armed: bool,
    frames: Vec<CapturedFrame>,
}

#[derive(Debug, Default)]
struct SimState {
    config: Config,
    ports: HashMap<String, Counters>,
    flows: HashMap<String, FlowState>,
    captures: HashMap<String, CaptureBuffer>,
}

/// In-process controller with back-to-back ports.
#[derive(Debug, Default)]
pub struct SimController {
    state: Mutex<SimState>,
}

impl SimController {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, SimState>, SimError> {
        self.state.lock().map_err(|_| SimError::Poisoned)
    }

    /// Validate and install a configuration, resetting all counters and
    /// capture buffers. A rejected config leaves the active one in place.
    pub fn apply_config(&self, config: Config) -> Result<(), SimError> {
        validate(&config).map_err(SimError::Invalid)?;

        let mut state = self.lock()?;
        state.ports = config
            .ports
            .iter()
            .map(|p| (p.name.clone(), Counters::default()))
            .collect();
        state.flows = config
            .flows
            .iter()
            .map(|f| (f.name.clone(), FlowState::default()))
            .collect();
        state.captures = config
            .captures
            .iter()
            .flat_map(|c| c.port_names.iter())
            .map(|p| (p.clone(), CaptureBuffer::default()))
            .collect();

        tracing::info!(
            ports = config.ports.len(),
            flows = config.flows.len(),
            captures = state.captures.len(),
            "configuration applied"
        );
        state.config = config;
        Ok(())
    }

    pub fn config(&self) -> Result<Config, SimError> {
        Ok(self.lock()?.config.clone())
    }

    pub fn control(&self, control: &ControlState) -> Result<(), SimError> {
        let mut state = self.lock()?;
        match control {
            ControlState::Capture { capture } => {
                let ports = capture_targets(&state, &capture.port_names)?;
                for port in ports {
                    if let Some(buf) = state.captures.get_mut(&port) {
                        match capture.state {
                            CaptureState::Start => {
                                buf.frames.clear();
                                buf.armed = true;
                            }
                            CaptureState::Stop => buf.armed = false,
                        }
                    }
                    tracing::debug!(port = %port, state = ?capture.state, "capture state changed");
                }
            }
            ControlState::Transmit { transmit } => {
                let flows = flow_targets(&state, &transmit.flow_names)?;
                match transmit.state {
                    TransmitState::Start => {
                        for name in flows {
                            transmit_flow(&mut state, &name);
                        }
                    }
                    TransmitState::Stop => {
                        for name in flows {
                            if let Some(flow) = state.flows.get_mut(&name) {
                                flow.transmit = TransmitStatus::Stopped;
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    pub fn metrics(&self, request: &MetricsRequest) -> Result<MetricsResponse, SimError> {
        let state = self.lock()?;
        match request {
            MetricsRequest::Port { port: req } => {
                let names = if req.port_names.is_empty() {
                    state.config.port_names()
                } else {
                    req.port_names.clone()
                };
                let mut port_metrics = Vec::with_capacity(names.len());
                for name in names {
                    let port = state
                        .config
                        .ports
                        .iter()
                        .find(|p| p.name == name)
                        .ok_or_else(|| SimError::UnknownPort(name.clone()))?;
                    let c = state.ports.get(&name).copied().unwrap_or_default();
                    let capturing = state.captures.get(&name).is_some_and(|b| b.armed);
                    port_metrics.push(PortMetric {
                        name: name.clone(),
                        location: port.location.clone(),
                        link: LinkState::Up,
                        capture: if capturing {
                            CaptureStatus::Started
                        } else {
                            CaptureStatus::Stopped
                        },
                        frames_tx: req.wants(PortColumn::FramesTx).then_some(c.frames_tx),
                        frames_rx: req.wants(PortColumn::FramesRx).then_some(c.frames_rx),
                        bytes_tx: req.wants(PortColumn::BytesTx).then_some(c.bytes_tx),
                        bytes_rx: req.wants(PortColumn::BytesRx).then_some(c.bytes_rx),
                        // Transmission completes synchronously, so nothing is in flight.
                        frames_tx_rate: req.wants(PortColumn::FramesTxRate).then_some(0.0),
                        frames_rx_rate: req.wants(PortColumn::FramesRxRate).then_some(0.0),
                    });
                }
                Ok(MetricsResponse::PortMetrics { port_metrics })
            }
            MetricsRequest::Flow { flow: req } => {
                let names = flow_targets(&state, &req.flow_names)?;
                let flow_metrics = names
                    .into_iter()
                    .map(|name| {
                        let f = state.flows.get(&name);
                        let c = f.map(|f| f.counters).unwrap_or_default();
                        FlowMetric {
                            transmit: f.map(|f| f.transmit).unwrap_or_default(),
                            frames_tx: req.wants(FlowColumn::FramesTx).then_some(c.frames_tx),
                            frames_rx: req.wants(FlowColumn::FramesRx).then_some(c.frames_rx),
                            bytes_tx: req.wants(FlowColumn::BytesTx).then_some(c.bytes_tx),
                            bytes_rx: req.wants(FlowColumn::BytesRx).then_some(c.bytes_rx),
                            name,
                        }
                    })
                    .collect();
                Ok(MetricsResponse::FlowMetrics { flow_metrics })
            }
        }
    }

    /// Current capture buffer of one port as a pcap stream.
    pub fn capture(&self, request: &CaptureRequest) -> Result<Vec<u8>, SimError> {
        let state = self.lock()?;
        let port = &request.port_name;
        if !state.ports.contains_key(port) {
            return Err(SimError::UnknownPort(port.clone()));
        }
        let buf = state
            .captures
            .get(port)
            .ok_or_else(|| SimError::NoCapture(port.clone()))?;
        Ok(pcap::encode(&buf.frames))
    }
}

/// Capture ports a control request applies to, in declaration order.
fn capture_targets(state: &SimState, names: &[String]) -> Result<Vec<String>, SimError> {
    if names.is_empty() {
        return Ok(state
            .config
            .captures
            .iter()
            .flat_map(|c| c.port_names.iter().cloned())
            .collect());
    }
    for name in names {
        if !state.ports.contains_key(name) {
            return Err(SimError::UnknownPort(name.clone()));
        }
        if !state.captures.contains_key(name) {
            return Err(SimError::NoCapture(name.clone()));
        }
    }
    Ok(names.to_vec())
}

fn flow_targets(state: &SimState, names: &[String]) -> Result<Vec<String>, SimError> {
    if names.is_empty() {
        return Ok(state.config.flows.iter().map(|f| f.name.clone()).collect());
    }
    for name in names {
        if !state.flows.contains_key(name) {
            return Err(SimError::UnknownFlow(name.clone()));
        }
    }
    Ok(names.to_vec())
}

/// Send every packet of a bounded flow and account for it on both ends.
fn transmit_flow(state: &mut SimState, name: &str) {
    let SimState {
        config,
        ports,
        flows,
        captures,
    } = state;
    let Some(flow) = config.flows.iter().find(|f| f.name == name) else {
        return;
    };
    let line_rate = line_rate_bps(config, flow.tx_name());
    let pps = effective_pps(flow, line_rate);
    let count = packet_count(flow, pps);

    let flow_state = flows.entry(flow.name.clone()).or_default();
    flow_state.counters = Counters::default();
    flow_state.transmit = TransmitStatus::Started;

    let base_ns = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default();
    let gap_ns = if pps > 0.0 { 1e9 / pps } else { 0.0 };
    let mut rng = StdRng::seed_from_u64(name_seed(&flow.name));
    let mut rx_capture = captures.get_mut(flow.rx_name()).filter(|b| b.armed);
    let mut dropped_from_capture = 0u64;

    for i in 0..count {
        let size = frame_size(&flow.size, i, &mut rng);
        let bytes = u64::from(size);

        if let Some(tx) = ports.get_mut(flow.tx_name()) {
            tx.frames_tx += 1;
            tx.bytes_tx += bytes;
        }
        if let Some(rx) = ports.get_mut(flow.rx_name()) {
            rx.frames_rx += 1;
            rx.bytes_rx += bytes;
        }
        let fc = &mut flow_state.counters;
        fc.frames_tx += 1;
        fc.frames_rx += 1;
        fc.bytes_tx += bytes;
        fc.bytes_rx += bytes;

        if let Some(buf) = rx_capture.as_deref_mut() {
            if buf.frames.len() < MAX_CAPTURED_FRAMES {
                buf.frames.push(CapturedFrame {
                    ts_ns: base_ns + (i as f64 * gap_ns) as u64,
                    data: frame::build_frame(&flow.packet.headers, i, size),
                });
            } else {
                dropped_from_capture += 1;
            }
        }
    }

    if dropped_from_capture > 0 {
        tracing::warn!(
            flow = %flow.name,
            dropped = dropped_from_capture,
            "capture buffer full, frames counted but not stored"
        );
    }
    flow_state.transmit = TransmitStatus::Stopped;
    tracing::debug!(flow = %flow.name, packets = count, pps, "flow transmitted");
}

fn line_rate_bps(config: &Config, port: &str) -> u64 {
    config
        .layer1
        .iter()
        .find(|l| l.port_names.iter().any(|p| p == port))
        .map(|l| l.speed)
        .unwrap_or_default()
        .bits_per_second()
}

fn mean_size(size: &FlowSize) -> f64 {
    match size {
        FlowSize::Fixed { fixed } => f64::from(*fixed),
        FlowSize::Increment { increment } => {
            (f64::from(increment.start) + f64::from(increment.end)) / 2.0
        }
        FlowSize::Random { random } => (f64::from(random.min) + f64::from(random.max)) / 2.0,
    }
}

fn inter_packet_gap(duration: &FlowDuration) -> u64 {
    match duration {
        FlowDuration::FixedPackets { fixed_packets } => u64::from(fixed_packets.gap),
        FlowDuration::FixedSeconds { fixed_seconds } => u64::from(fixed_seconds.gap),
        FlowDuration::Continuous { continuous } => u64::from(continuous.gap),
    }
}

/// Packets per second a flow's rate works out to on its tx port.
fn effective_pps(flow: &Flow, line_rate_bps: u64) -> f64 {
    let wire_bits =
        (mean_size(&flow.size) + (PREAMBLE_LEN + inter_packet_gap(&flow.duration)) as f64) * 8.0;
    match flow.rate {
        FlowRate::Pps { pps } => pps as f64,
        FlowRate::Bps { bps } => bps as f64 / wire_bits,
        FlowRate::Percentage { percentage } => {
            line_rate_bps as f64 * f64::from(percentage) / 100.0 / wire_bits
        }
    }
}

fn packet_count(flow: &Flow, pps: f64) -> u64 {
    match &flow.duration {
        FlowDuration::FixedPackets { fixed_packets } => fixed_packets.packets,
        FlowDuration::FixedSeconds { fixed_seconds } => {
            let wanted = (pps * fixed_seconds.seconds).floor();
            if wanted > MAX_SIMULATED_PACKETS as f64 {
                tracing::warn!(
                    flow = %flow.name,
                    wanted,
                    limit = MAX_SIMULATED_PACKETS,
                    "timed flow truncated"
                );
                MAX_SIMULATED_PACKETS
            } else {
                wanted as u64
            }
        }
        FlowDuration::Continuous { .. } => {
            tracing::warn!(flow = %flow.name, "continuous flows are not simulated");
            0
        }
    }
}

fn frame_size(size: &FlowSize, index: u64, rng: &mut StdRng) -> u32 {
    match size {
        FlowSize::Fixed { fixed } => *fixed,
        FlowSize::Increment { increment } => {
            let step = increment.step.max(1);
            let span = u64::from(increment.end.saturating_sub(increment.start) / step) + 1;
            increment.start + step * (index % span) as u32
        }
        FlowSize::Random { random } => {
            let range = random.max.saturating_sub(random.min);
            let pick = (rng.random::<f64>() * (f64::from(range) + 1.0)) as u32;
            random.min + pick.min(range)
        }
    }
}

/// FNV-1a of the flow name, so random sizes repeat across runs.
fn name_seed(name: &str) -> u64 {
    name.bytes().fold(0xcbf2_9ce4_8422_2325, |h, b| {
        (h ^ u64::from(b)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

impl Controller for SimController {
    fn set_config(&self, config: &Config) -> Result<(), ControllerError> {
        self.apply_config(config.clone())
            .map_err(|e| e.into_controller_error("set_config"))
    }

    fn get_config(&self) -> Result<Config, ControllerError> {
        self.config()
            .map_err(|e| e.into_controller_error("get_config"))
    }

    fn set_control_state(&self, state: &ControlState) -> Result<(), ControllerError> {
        self.control(state)
            .map_err(|e| e.into_controller_error("set_control_state"))
    }

    fn get_metrics(&self, request: &MetricsRequest) -> Result<MetricsResponse, ControllerError> {
        self.metrics(request)
            .map_err(|e| e.into_controller_error("get_metrics"))
    }

    fn get_capture(&self, request: &CaptureRequest) -> Result<Vec<u8>, ControllerError> {
        self.capture(request)
            .map_err(|e| e.into_controller_error("get_capture"))
    }
}

#[cfg(test)]
mod tests {
    use otg_model::FixedSeconds;

    use super::*;

    #[test]
    fn timed_flow_count_is_capped() {
        let mut flow = Flow::new("f");
        flow.duration = FlowDuration::FixedSeconds {
            fixed_seconds: FixedSeconds {
                seconds: 0.5,
                ..FixedSeconds::default()
            },
        };
        assert_eq!(packet_count(&flow, 1000.0), 500);

        flow.duration = FlowDuration::FixedSeconds {
            fixed_seconds: FixedSeconds {
                seconds: 1e9,
                ..FixedSeconds::default()
            },
        };
        assert_eq!(packet_count(&flow, 1e9), MAX_SIMULATED_PACKETS);
    }
}
