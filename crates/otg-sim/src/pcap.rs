//! Classic pcap encoding of a capture buffer.
//!
//! Little-endian, microsecond timestamps, link type Ethernet:
//!
//! ```text
//! global header (24): magic a1b2c3d4 | v2.4 | thiszone | sigfigs | snaplen | linktype
//! record header (16): ts_sec | ts_usec | incl_len | orig_len
//! ```

use bytes::{BufMut, BytesMut};

pub const PCAP_MAGIC: u32 = 0xa1b2_c3d4;
pub const PCAP_VERSION_MAJOR: u16 = 2;
pub const PCAP_VERSION_MINOR: u16 = 4;
pub const PCAP_SNAPLEN: u32 = 65_535;
pub const LINKTYPE_ETHERNET: u32 = 1;
pub const GLOBAL_HEADER_LEN: usize = 24;
pub const RECORD_HEADER_LEN: usize = 16;

/// One frame observed on a port.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// Nanoseconds since the Unix epoch.
    pub ts_ns: u64,
    pub data: Vec<u8>,
}

/// Encode frames as a complete pcap stream. No frames yields a bare
/// global header.
pub fn encode(frames: &[CapturedFrame]) -> Vec<u8> {
    let body: usize = frames
        .iter()
        .map(|f| RECORD_HEADER_LEN + f.data.len())
        .sum();
    let mut buf = BytesMut::with_capacity(GLOBAL_HEADER_LEN + body);

    buf.put_u32_le(PCAP_MAGIC);
    buf.put_u16_le(PCAP_VERSION_MAJOR);
    buf.put_u16_le(PCAP_VERSION_MINOR);
    buf.put_i32_le(0); // thiszone
    buf.put_u32_le(0); // sigfigs
    buf.put_u32_le(PCAP_SNAPLEN);
    buf.put_u32_le(LINKTYPE_ETHERNET);

    for frame in frames {
        let len = frame.data.len() as u32;
        buf.put_u32_le((frame.ts_ns / 1_000_000_000) as u32);
        buf.put_u32_le(((frame.ts_ns % 1_000_000_000) / 1_000) as u32);
        buf.put_u32_le(len);
        buf.put_u32_le(len);
        buf.put_slice(&frame.data);
    }

    buf.to_vec()
}
