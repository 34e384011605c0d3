//! Layered packet templates.
//!
//! A flow's packet is an ordered stack of header descriptors, outermost
//! first. Appending a header returns a mutable handle to its fields so the
//! caller can fill them in place:
//!
//! ```
//! use otg_model::Packet;
//!
//! let mut packet = Packet::default();
//! packet.ethernet();
//! packet.ipv4();
//! packet.udp().dst_port.set_values([4000, 4044, 4060, 4074]);
//! assert_eq!(packet.headers.len(), 3);
//! ```

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::pattern::{MacAddr, Pattern};

// ── Packet ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Packet {
    pub headers: Vec<FlowHeader>,
}

/// One header in a packet template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "choice", rename_all = "snake_case")]
pub enum FlowHeader {
    Ethernet { ethernet: EthernetHeader },
    Ipv4 { ipv4: Ipv4Header },
    Udp { udp: UdpHeader },
    Tcp { tcp: TcpHeader },
}

impl FlowHeader {
    /// Short protocol name, as used in controller error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            FlowHeader::Ethernet { .. } => "ethernet",
            FlowHeader::Ipv4 { .. } => "ipv4",
            FlowHeader::Udp { .. } => "udp",
            FlowHeader::Tcp { .. } => "tcp",
        }
    }
}

impl Packet {
    pub fn ethernet(&mut self) -> &mut EthernetHeader {
        self.headers.push(FlowHeader::Ethernet {
            ethernet: EthernetHeader::default(),
        });
        match self.headers.last_mut() {
            Some(FlowHeader::Ethernet { ethernet }) => ethernet,
            _ => unreachable!("ethernet header was just pushed"),
        }
    }

    pub fn ipv4(&mut self) -> &mut Ipv4Header {
        self.headers.push(FlowHeader::Ipv4 {
            ipv4: Ipv4Header::default(),
        });
        match self.headers.last_mut() {
            Some(FlowHeader::Ipv4 { ipv4 }) => ipv4,
            _ => unreachable!("ipv4 header was just pushed"),
        }
    }

    pub fn udp(&mut self) -> &mut UdpHeader {
        self.headers.push(FlowHeader::Udp {
            udp: UdpHeader::default(),
        });
        match self.headers.last_mut() {
            Some(FlowHeader::Udp { udp }) => udp,
            _ => unreachable!("udp header was just pushed"),
        }
    }

    pub fn tcp(&mut self) -> &mut TcpHeader {
        self.headers.push(FlowHeader::Tcp {
            tcp: TcpHeader::default(),
        });
        match self.headers.last_mut() {
            Some(FlowHeader::Tcp { tcp }) => tcp,
            _ => unreachable!("tcp header was just pushed"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

// ── Header descriptors ──────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EthernetHeader {
    pub dst: Pattern<MacAddr>,
    pub src: Pattern<MacAddr>,
    /// `None` means the controller derives it from the next header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ether_type: Option<Pattern<u16>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ipv4Header {
    pub src: Pattern<Ipv4Addr>,
    pub dst: Pattern<Ipv4Addr>,
    pub ttl: Pattern<u8>,
    /// `None` means the controller derives it from the next header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<Pattern<u8>>,
}

impl Default for Ipv4Header {
    fn default() -> Self {
        Self {
            src: Pattern::value(Ipv4Addr::UNSPECIFIED),
            dst: Pattern::value(Ipv4Addr::UNSPECIFIED),
            ttl: Pattern::value(64),
            protocol: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UdpHeader {
    pub src_port: Pattern<u16>,
    pub dst_port: Pattern<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TcpHeader {
    pub src_port: Pattern<u16>,
    pub dst_port: Pattern<u16>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chained_headers_keep_order() {
        let mut packet = Packet::default();
        packet.ethernet().src.set_value(MacAddr::new([0, 0xaa, 0, 0, 4, 0]));
        packet.ipv4().dst.set_value(Ipv4Addr::new(10, 0, 0, 2));
        packet.udp().src_port.set_increment(5000, 2, 10);

        let kinds: Vec<_> = packet.headers.iter().map(FlowHeader::kind).collect();
        assert_eq!(kinds, ["ethernet", "ipv4", "udp"]);
    }

    #[test]
    fn ipv4_defaults() {
        let h = Ipv4Header::default();
        assert_eq!(h.ttl, Pattern::value(64));
        assert_eq!(h.src, Pattern::value(Ipv4Addr::UNSPECIFIED));
        assert!(h.protocol.is_none());
    }

    #[test]
    fn json_is_a_header_array() {
        let mut packet = Packet::default();
        packet.ethernet();
        packet.udp();
        let v = serde_json::to_value(&packet).unwrap();
        assert!(v.is_array());
        assert_eq!(v[0]["choice"], "ethernet");
        assert_eq!(v[1]["udp"]["dst_port"]["choice"], "value");

        let back: Packet = serde_json::from_value(v).unwrap();
        assert_eq!(back, packet);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let h: Ipv4Header = serde_json::from_str(r#"{"src":{"choice":"value","value":"10.0.0.1"}}"#)
            .unwrap();
        assert_eq!(h.src, Pattern::value(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(h.ttl, Pattern::value(64));
    }
}
