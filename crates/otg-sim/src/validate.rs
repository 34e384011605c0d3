//! Configuration acceptance checks.
//!
//! Every problem found is reported, not just the first, so a rejected
//! config can be fixed in one pass.

use std::collections::HashSet;

use otg_model::{Config, FlowDuration, FlowHeader, FlowRate, FlowSize, Pattern};

use crate::engine::MAX_SIMULATED_PACKETS;
use crate::frame::{FCS_LEN, headers_len};

/// Largest frame size accepted, FCS included.
pub const MAX_FRAME_SIZE: u32 = 9216;

/// Check a config before it replaces the active one.
pub fn validate(config: &Config) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    let ports = unique_names(
        "port",
        config.ports.iter().map(|p| p.name.as_str()),
        &mut errors,
    );

    unique_names(
        "layer1",
        config.layer1.iter().map(|l| l.name.as_str()),
        &mut errors,
    );
    let mut claimed = HashSet::new();
    for l1 in &config.layer1 {
        for port in &l1.port_names {
            check_port_ref(&ports, "layer1", &l1.name, port, &mut errors);
            if !claimed.insert(port.as_str()) {
                errors.push(format!(
                    "port {port:?} appears in more than one layer1 setting"
                ));
            }
        }
    }

    unique_names(
        "capture",
        config.captures.iter().map(|c| c.name.as_str()),
        &mut errors,
    );
    let mut captured = HashSet::new();
    for capture in &config.captures {
        for port in &capture.port_names {
            check_port_ref(&ports, "capture", &capture.name, port, &mut errors);
            if !captured.insert(port.as_str()) {
                errors.push(format!("port {port:?} appears in more than one capture"));
            }
        }
    }

    unique_names(
        "flow",
        config.flows.iter().map(|f| f.name.as_str()),
        &mut errors,
    );
    for flow in &config.flows {
        let name = flow.name.as_str();
        check_port_ref(&ports, "flow", name, flow.tx_name(), &mut errors);
        check_port_ref(&ports, "flow", name, flow.rx_name(), &mut errors);

        check_size(name, &flow.size, &flow.packet.headers, &mut errors);

        let rate_ok = match flow.rate {
            FlowRate::Pps { pps } => pps > 0,
            FlowRate::Bps { bps } => bps > 0,
            FlowRate::Percentage { percentage } => percentage > 0.0 && percentage <= 100.0,
        };
        if !rate_ok {
            errors.push(format!("flow {name:?}: rate must be positive"));
        }

        match &flow.duration {
            FlowDuration::FixedSeconds { fixed_seconds }
                if !fixed_seconds.seconds.is_finite() || fixed_seconds.seconds < 0.0 =>
            {
                errors.push(format!(
                    "flow {name:?}: fixed_seconds must be finite and >= 0"
                ));
            }
            FlowDuration::FixedPackets { fixed_packets }
                if fixed_packets.packets > MAX_SIMULATED_PACKETS =>
            {
                errors.push(format!(
                    "flow {name:?}: fixed_packets must be <= {MAX_SIMULATED_PACKETS}"
                ));
            }
            _ => {}
        }

        check_header_stack(name, &flow.packet.headers, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Frame sizes must hold the header stack plus FCS and stay within jumbo size.
fn check_size(flow: &str, size: &FlowSize, headers: &[FlowHeader], errors: &mut Vec<String>) {
    let min = (headers_len(headers) + FCS_LEN) as u32;
    let (low, high) = match size {
        FlowSize::Fixed { fixed } => (*fixed, *fixed),
        FlowSize::Increment { increment } => {
            if increment.step == 0 || increment.start > increment.end {
                errors.push(format!(
                    "flow {flow:?}: size increment needs start <= end and step >= 1"
                ));
                return;
            }
            (increment.start, increment.end)
        }
        FlowSize::Random { random } => {
            if random.min > random.max {
                errors.push(format!("flow {flow:?}: random size needs min <= max"));
                return;
            }
            (random.min, random.max)
        }
    };
    if low < min || high > MAX_FRAME_SIZE {
        errors.push(format!(
            "flow {flow:?}: frame size must be within {min}..={MAX_FRAME_SIZE} bytes"
        ));
    }
}

fn unique_names<'a>(
    kind: &str,
    names: impl Iterator<Item = &'a str>,
    errors: &mut Vec<String>,
) -> HashSet<&'a str> {
    let mut seen = HashSet::new();
    for name in names {
        if name.is_empty() {
            errors.push(format!("{kind} name must not be empty"));
        } else if !seen.insert(name) {
            errors.push(format!("duplicate {kind} name {name:?}"));
        }
    }
    seen
}

fn check_port_ref(
    ports: &HashSet<&str>,
    kind: &str,
    owner: &str,
    port: &str,
    errors: &mut Vec<String>,
) {
    if !ports.contains(port) {
        errors.push(format!("{kind} {owner:?} references unknown port {port:?}"));
    }
}

/// Ethernet first, then optionally IPv4, then optionally one of UDP/TCP.
fn check_header_stack(flow: &str, headers: &[FlowHeader], errors: &mut Vec<String>) {
    let kinds: Vec<&str> = headers.iter().map(FlowHeader::kind).collect();
    let valid = matches!(
        kinds.as_slice(),
        ["ethernet"] | ["ethernet", "ipv4"] | ["ethernet", "ipv4", "udp" | "tcp"]
    );
    if !valid {
        errors.push(format!(
            "flow {flow:?}: unsupported header stack [{}]",
            kinds.join(", ")
        ));
    }

    for header in headers {
        let kind = header.kind();
        match header {
            FlowHeader::Ethernet { ethernet } => {
                check_pattern(flow, kind, "dst", &ethernet.dst, errors);
                check_pattern(flow, kind, "src", &ethernet.src, errors);
                if let Some(p) = &ethernet.ether_type {
                    check_pattern(flow, kind, "ether_type", p, errors);
                }
            }
            FlowHeader::Ipv4 { ipv4 } => {
                check_pattern(flow, kind, "src", &ipv4.src, errors);
                check_pattern(flow, kind, "dst", &ipv4.dst, errors);
                check_pattern(flow, kind, "ttl", &ipv4.ttl, errors);
                if let Some(p) = &ipv4.protocol {
                    check_pattern(flow, kind, "protocol", p, errors);
                }
            }
            FlowHeader::Udp { udp } => {
                check_pattern(flow, kind, "src_port", &udp.src_port, errors);
                check_pattern(flow, kind, "dst_port", &udp.dst_port, errors);
            }
            FlowHeader::Tcp { tcp } => {
                check_pattern(flow, kind, "src_port", &tcp.src_port, errors);
                check_pattern(flow, kind, "dst_port", &tcp.dst_port, errors);
            }
        }
    }
}

fn check_pattern<T>(
    flow: &str,
    header: &str,
    field: &str,
    pattern: &Pattern<T>,
    errors: &mut Vec<String>,
) {
    match pattern {
        Pattern::Value { .. } => {}
        Pattern::Values { values } if values.is_empty() => {
            errors.push(format!("flow {flow:?}: {header}.{field} values must not be empty"));
        }
        Pattern::Increment { increment } if increment.count == 0 => {
            errors.push(format!("flow {flow:?}: {header}.{field} increment count must be >= 1"));
        }
        _ => {}
    }
}
