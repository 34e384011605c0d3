//! Captured frame decoding.
//!
//! ```text
//! Ethernet (14) [802.1Q / 802.1ad tag (4)]* | IPv4 (20+ options) | UDP (8) / TCP (20+)
//! ```
//!
//! Decoding stops at the first layer it does not understand; what it could
//! not look into is reported through [`Network`] and [`Transport`] rather
//! than as an error. Errors are reserved for frames that are malformed at a
//! layer they claim to carry.

use std::fmt;
use std::net::Ipv4Addr;

use bytes::Buf;
use otg_model::MacAddr;
use thiserror::Error;

pub const ETH_HEADER_LEN: usize = 14;
pub const VLAN_TAG_LEN: usize = 4;
pub const IPV4_MIN_HEADER_LEN: usize = 20;
pub const UDP_HEADER_LEN: usize = 8;
pub const TCP_MIN_HEADER_LEN: usize = 20;

pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const ETHERTYPE_VLAN: u16 = 0x8100;
pub const ETHERTYPE_QINQ: u16 = 0x88a8;
pub const IPPROTO_TCP: u8 = 6;
pub const IPPROTO_UDP: u8 = 17;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("{layer} header truncated: need {needed} bytes, have {available}")]
    Truncated {
        layer: &'static str,
        needed: usize,
        available: usize,
    },
    #[error("IP version {0} where IPv4 was expected")]
    BadIpVersion(u8),
    #[error("IPv4 header length {0} is below the 20-byte minimum")]
    BadHeaderLength(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub dst: MacAddr,
    pub src: MacAddr,
    /// VLAN IDs, outermost first.
    pub vlans: Vec<u16>,
    /// Ethertype after any VLAN tags.
    pub ether_type: u16,
    pub network: Network,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Network {
    Ipv4 {
        src: Ipv4Addr,
        dst: Ipv4Addr,
        ttl: u8,
        transport: Transport,
    },
    /// Anything other than IPv4; the payload is not examined.
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Udp {
        src_port: u16,
        dst_port: u16,
        /// UDP length field (header plus payload).
        length: u16,
    },
    Tcp {
        src_port: u16,
        dst_port: u16,
    },
    /// Non-first fragment; no transport header to read.
    Fragment { protocol: u8 },
    Other { protocol: u8 },
}

impl DecodedFrame {
    pub fn udp(&self) -> Option<(u16, u16)> {
        match self.network {
            Network::Ipv4 {
                transport: Transport::Udp {
                    src_port, dst_port, ..
                },
                ..
            } => Some((src_port, dst_port)),
            _ => None,
        }
    }

    pub fn is_udp(&self) -> bool {
        self.udp().is_some()
    }

    /// Short description of the innermost layer, for error messages.
    pub fn innermost(&self) -> Innermost {
        match &self.network {
            Network::Other => Innermost::EtherType(self.ether_type),
            Network::Ipv4 { transport, .. } => match *transport {
                Transport::Udp { .. } => Innermost::Udp,
                Transport::Tcp { .. } => Innermost::Tcp,
                Transport::Fragment { protocol } | Transport::Other { protocol } => {
                    Innermost::IpProtocol(protocol)
                }
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Innermost {
    EtherType(u16),
    IpProtocol(u8),
    Udp,
    Tcp,
}

impl fmt::Display for Innermost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Innermost::EtherType(t) => write!(f, "ethertype {t:#06x}"),
            Innermost::IpProtocol(p) => write!(f, "IP protocol {p}"),
            Innermost::Udp => f.write_str("UDP"),
            Innermost::Tcp => f.write_str("TCP"),
        }
    }
}

fn need(buf: &[u8], layer: &'static str, needed: usize) -> Result<(), DecodeError> {
    if buf.remaining() < needed {
        return Err(DecodeError::Truncated {
            layer,
            needed,
            available: buf.remaining(),
        });
    }
    Ok(())
}

fn get_mac(buf: &mut &[u8]) -> MacAddr {
    let mut octets = [0u8; 6];
    buf.copy_to_slice(&mut octets);
    MacAddr::new(octets)
}

/// Decode one captured frame. Never panics, whatever the input.
pub fn decode(data: &[u8]) -> Result<DecodedFrame, DecodeError> {
    let mut buf = data;

    need(buf, "Ethernet", ETH_HEADER_LEN)?;
    let dst = get_mac(&mut buf);
    let src = get_mac(&mut buf);
    let mut ether_type = buf.get_u16();

    let mut vlans = Vec::new();
    while ether_type == ETHERTYPE_VLAN || ether_type == ETHERTYPE_QINQ {
        need(buf, "VLAN", VLAN_TAG_LEN)?;
        vlans.push(buf.get_u16() & 0x0fff);
        ether_type = buf.get_u16();
    }

    let network = if ether_type == ETHERTYPE_IPV4 {
        decode_ipv4(buf)?
    } else {
        Network::Other
    };

    Ok(DecodedFrame {
        dst,
        src,
        vlans,
        ether_type,
        network,
    })
}

fn decode_ipv4(mut buf: &[u8]) -> Result<Network, DecodeError> {
    need(buf, "IPv4", IPV4_MIN_HEADER_LEN)?;
    let start = buf;

    let version_ihl = buf.get_u8();
    let version = version_ihl >> 4;
    if version != 4 {
        return Err(DecodeError::BadIpVersion(version));
    }
    let header_len = usize::from(version_ihl & 0x0f) * 4;
    if header_len < IPV4_MIN_HEADER_LEN {
        return Err(DecodeError::BadHeaderLength(header_len));
    }
    need(start, "IPv4", header_len)?;

    buf.advance(1); // DSCP/ECN
    let _total_len = buf.get_u16();
    let _ident = buf.get_u16();
    let fragment_offset = buf.get_u16() & 0x1fff;
    let ttl = buf.get_u8();
    let protocol = buf.get_u8();
    buf.advance(2); // checksum
    let src = Ipv4Addr::from(buf.get_u32());
    let dst = Ipv4Addr::from(buf.get_u32());
    buf.advance(header_len - IPV4_MIN_HEADER_LEN);

    let transport = if fragment_offset != 0 {
        Transport::Fragment { protocol }
    } else {
        match protocol {
            IPPROTO_UDP => {
                need(buf, "UDP", UDP_HEADER_LEN)?;
                let src_port = buf.get_u16();
                let dst_port = buf.get_u16();
                let length = buf.get_u16();
                Transport::Udp {
                    src_port,
                    dst_port,
                    length,
                }
            }
            IPPROTO_TCP => {
                need(buf, "TCP", TCP_MIN_HEADER_LEN)?;
                let src_port = buf.get_u16();
                let dst_port = buf.get_u16();
                Transport::Tcp { src_port, dst_port }
            }
            protocol => Transport::Other { protocol },
        }
    };

    Ok(Network::Ipv4 {
        src,
        dst,
        ttl,
        transport,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eth(ether_type: u16) -> Vec<u8> {
        let mut f = vec![0x00, 0xaa, 0x00, 0x00, 0x00, 0xaa];
        f.extend_from_slice(&[0x00, 0xaa, 0x00, 0x00, 0x04, 0x00]);
        f.extend_from_slice(&ether_type.to_be_bytes());
        f
    }

    fn ipv4(protocol: u8) -> Vec<u8> {
        vec![
            0x45, 0, 0, 124, 0, 1, 0, 0, 64, protocol, 0, 0, 10, 0, 0, 1, 10, 0, 0, 2,
        ]
    }

    fn udp(src: u16, dst: u16) -> Vec<u8> {
        let mut h = Vec::new();
        h.extend_from_slice(&src.to_be_bytes());
        h.extend_from_slice(&dst.to_be_bytes());
        h.extend_from_slice(&[0, 90, 0, 0]);
        h
    }

    #[test]
    fn decodes_eth_ipv4_udp() {
        let mut f = eth(ETHERTYPE_IPV4);
        f.extend(ipv4(IPPROTO_UDP));
        f.extend(udp(5000, 4044));
        f.resize(124, 0);

        let d = decode(&f).unwrap();
        assert_eq!(d.src.to_string(), "00:aa:00:00:04:00");
        assert_eq!(d.dst.to_string(), "00:aa:00:00:00:aa");
        assert_eq!(d.udp(), Some((5000, 4044)));
        match d.network {
            Network::Ipv4 { src, dst, ttl, .. } => {
                assert_eq!(src, Ipv4Addr::new(10, 0, 0, 1));
                assert_eq!(dst, Ipv4Addr::new(10, 0, 0, 2));
                assert_eq!(ttl, 64);
            }
            Network::Other => panic!("expected IPv4"),
        }
    }

    #[test]
    fn skips_vlan_tags() {
        let mut f = eth(ETHERTYPE_QINQ);
        f.extend_from_slice(&[0x00, 0x64]);
        f.extend_from_slice(&ETHERTYPE_VLAN.to_be_bytes());
        f.extend_from_slice(&[0x20, 0x0a]);
        f.extend_from_slice(&ETHERTYPE_IPV4.to_be_bytes());
        f.extend(ipv4(IPPROTO_UDP));
        f.extend(udp(1, 2));

        let d = decode(&f).unwrap();
        assert_eq!(d.vlans, vec![100, 10]);
        assert!(d.is_udp());
    }

    #[test]
    fn ipv4_options_are_skipped() {
        let mut f = eth(ETHERTYPE_IPV4);
        let mut ip = ipv4(IPPROTO_UDP);
        ip[0] = 0x46;
        ip.extend_from_slice(&[1, 1, 1, 0]);
        f.extend(ip);
        f.extend(udp(7, 9));
        assert_eq!(decode(&f).unwrap().udp(), Some((7, 9)));
    }

    #[test]
    fn tcp_and_other_protocols_are_not_udp() {
        let mut f = eth(ETHERTYPE_IPV4);
        f.extend(ipv4(IPPROTO_TCP));
        f.extend([0u8; 20]);
        let d = decode(&f).unwrap();
        assert!(!d.is_udp());
        assert_eq!(d.innermost(), Innermost::Tcp);

        let mut f = eth(ETHERTYPE_IPV4);
        f.extend(ipv4(253));
        assert_eq!(decode(&f).unwrap().innermost().to_string(), "IP protocol 253");

        let f = eth(0x88b5);
        assert_eq!(decode(&f).unwrap().innermost().to_string(), "ethertype 0x88b5");
    }

    #[test]
    fn truncation_names_the_layer() {
        let err = decode(&[0u8; 10]).unwrap_err();
        assert_eq!(
            err,
            DecodeError::Truncated {
                layer: "Ethernet",
                needed: 14,
                available: 10
            }
        );

        let mut f = eth(ETHERTYPE_IPV4);
        f.extend(ipv4(IPPROTO_UDP));
        f.extend([0u8; 3]);
        assert!(matches!(
            decode(&f).unwrap_err(),
            DecodeError::Truncated { layer: "UDP", .. }
        ));
    }

    #[test]
    fn bad_ip_header_fields() {
        let mut f = eth(ETHERTYPE_IPV4);
        let mut ip = ipv4(IPPROTO_UDP);
        ip[0] = 0x65;
        f.extend(ip);
        assert_eq!(decode(&f).unwrap_err(), DecodeError::BadIpVersion(6));

        let mut f = eth(ETHERTYPE_IPV4);
        let mut ip = ipv4(IPPROTO_UDP);
        ip[0] = 0x43;
        f.extend(ip);
        assert_eq!(decode(&f).unwrap_err(), DecodeError::BadHeaderLength(12));
    }

    #[test]
    fn later_fragments_carry_no_transport_header() {
        let mut f = eth(ETHERTYPE_IPV4);
        let mut ip = ipv4(IPPROTO_UDP);
        ip[7] = 0x10;
        f.extend(ip);
        let d = decode(&f).unwrap();
        assert!(!d.is_udp());
        assert_eq!(d.innermost(), Innermost::IpProtocol(IPPROTO_UDP));
    }
}
