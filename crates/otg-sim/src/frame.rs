//! Frame synthesis from a flow's header template.
//!
//! ```text
//! +----------+-----------+-----------+-----------------+
//! | Ethernet | IPv4 (20) | UDP (8) / | zero padding    |
//! |   (14)   | optional  | TCP (20)  | up to size - 4  |
//! +----------+-----------+-----------+-----------------+
//! ```
//!
//! The 4-byte FCS counted in a flow's size is not part of the captured
//! frame. A frame is never shorter than its headers.

use std::net::Ipv4Addr;

use bytes::{BufMut, BytesMut};
use otg_model::{FlowHeader, MacAddr, Pattern, PatternValue};

pub const ETH_LEN: usize = 14;
pub const IPV4_LEN: usize = 20;
pub const UDP_LEN: usize = 8;
pub const TCP_LEN: usize = 20;
pub const FCS_LEN: usize = 4;

pub const ETHERTYPE_IPV4: u16 = 0x0800;
/// IEEE local experimental ethertype, used when nothing follows Ethernet.
pub const ETHERTYPE_EXPERIMENTAL: u16 = 0x88B5;
pub const IPPROTO_TCP: u8 = 6;
pub const IPPROTO_UDP: u8 = 17;
/// RFC 3692 experimental protocol number, used when nothing follows IPv4.
pub const IPPROTO_EXPERIMENTAL: u8 = 253;

/// Bytes taken by the headers of a template.
pub fn headers_len(headers: &[FlowHeader]) -> usize {
    headers
        .iter()
        .map(|h| match h {
            FlowHeader::Ethernet { .. } => ETH_LEN,
            FlowHeader::Ipv4 { .. } => IPV4_LEN,
            FlowHeader::Udp { .. } => UDP_LEN,
            FlowHeader::Tcp { .. } => TCP_LEN,
        })
        .sum()
}

/// Build packet `index` of a flow whose frames are `size` bytes on the wire.
pub fn build_frame(headers: &[FlowHeader], index: u64, size: u32) -> Vec<u8> {
    let frame_len = (size as usize)
        .saturating_sub(FCS_LEN)
        .max(headers_len(headers));
    let mut buf = BytesMut::with_capacity(frame_len);

    for (pos, header) in headers.iter().enumerate() {
        let next = headers.get(pos + 1);
        match header {
            FlowHeader::Ethernet { ethernet } => {
                buf.put_slice(&field(&ethernet.dst, index, MacAddr::default()).octets());
                buf.put_slice(&field(&ethernet.src, index, MacAddr::default()).octets());
                let ether_type = match &ethernet.ether_type {
                    Some(p) => field(p, index, ETHERTYPE_EXPERIMENTAL),
                    None => match next {
                        Some(FlowHeader::Ipv4 { .. }) => ETHERTYPE_IPV4,
                        _ => ETHERTYPE_EXPERIMENTAL,
                    },
                };
                buf.put_u16(ether_type);
            }
            FlowHeader::Ipv4 { ipv4 } => {
                let start = buf.len();
                let protocol = match &ipv4.protocol {
                    Some(p) => field(p, index, IPPROTO_EXPERIMENTAL),
                    None => match next {
                        Some(FlowHeader::Udp { .. }) => IPPROTO_UDP,
                        Some(FlowHeader::Tcp { .. }) => IPPROTO_TCP,
                        _ => IPPROTO_EXPERIMENTAL,
                    },
                };
                let total_len = (frame_len - start).min(u16::MAX as usize) as u16;
                buf.put_u8(0x45); // version 4, IHL 5
                buf.put_u8(0); // DSCP/ECN
                buf.put_u16(total_len);
                buf.put_u16(index as u16); // identification
                buf.put_u16(0); // flags/fragment offset
                buf.put_u8(field(&ipv4.ttl, index, 64));
                buf.put_u8(protocol);
                buf.put_u16(0); // checksum, patched below
                buf.put_slice(&field(&ipv4.src, index, Ipv4Addr::UNSPECIFIED).octets());
                buf.put_slice(&field(&ipv4.dst, index, Ipv4Addr::UNSPECIFIED).octets());
                let csum = ipv4_checksum(&buf[start..start + IPV4_LEN]);
                buf[start + 10..start + 12].copy_from_slice(&csum.to_be_bytes());
            }
            FlowHeader::Udp { udp } => {
                let len = (frame_len - buf.len()).min(u16::MAX as usize) as u16;
                buf.put_u16(field(&udp.src_port, index, 0));
                buf.put_u16(field(&udp.dst_port, index, 0));
                buf.put_u16(len);
                buf.put_u16(0); // checksum optional over IPv4
            }
            FlowHeader::Tcp { tcp } => {
                buf.put_u16(field(&tcp.src_port, index, 0));
                buf.put_u16(field(&tcp.dst_port, index, 0));
                buf.put_u32(index as u32); // sequence
                buf.put_u32(0); // ack
                buf.put_u8(5 << 4); // data offset
                buf.put_u8(0x10); // ACK
                buf.put_u16(u16::MAX); // window
                buf.put_u16(0); // checksum
                buf.put_u16(0); // urgent pointer
            }
        }
    }

    buf.resize(frame_len, 0);
    buf.to_vec()
}

fn field<T: PatternValue>(pattern: &Pattern<T>, index: u64, fallback: T) -> T {
    pattern.nth(index).unwrap_or(fallback)
}

/// RFC 1071 ones-complement checksum over an IPv4 header.
pub fn ipv4_checksum(header: &[u8]) -> u16 {
    let mut sum: u32 = header
        .chunks(2)
        .map(|c| {
            let hi = u32::from(c[0]) << 8;
            let lo = c.get(1).copied().map(u32::from).unwrap_or(0);
            hi | lo
        })
        .sum();
    while sum > 0xFFFF {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    !(sum as u16)
}
