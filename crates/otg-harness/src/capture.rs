//! Capture buffer verification.

use pcap_parser::{Linktype, PcapCapture};

use crate::frame;
use crate::verify::VerifyError;

/// What was found in one port's capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSummary {
    pub port: String,
    pub frames: usize,
    /// Size of the raw capture as downloaded.
    pub bytes: usize,
}

/// Check that every frame in a port's pcap stream is Ethernet/IPv4/UDP.
///
/// An empty stream is a capture with no frames.
pub fn verify_udp_capture(port: &str, bytes: &[u8]) -> Result<CaptureSummary, VerifyError> {
    if bytes.is_empty() {
        tracing::debug!(port, "empty capture");
        return Ok(CaptureSummary {
            port: port.to_string(),
            frames: 0,
            bytes: 0,
        });
    }

    let capture = PcapCapture::from_file(bytes).map_err(|e| VerifyError::Pcap {
        port: port.to_string(),
        message: format!("{e:?}"),
    })?;
    if capture.header.network != Linktype::ETHERNET {
        return Err(VerifyError::UnsupportedLinkType {
            port: port.to_string(),
            linktype: capture.header.network.0,
        });
    }

    for (index, block) in capture.blocks.iter().enumerate() {
        let decoded = frame::decode(block.data).map_err(|source| VerifyError::Decode {
            port: port.to_string(),
            index,
            source,
        })?;
        if !decoded.is_udp() {
            return Err(VerifyError::NotUdp {
                port: port.to_string(),
                index,
                found: decoded.innermost(),
            });
        }
    }

    tracing::debug!(port, frames = capture.blocks.len(), "capture verified");
    Ok(CaptureSummary {
        port: port.to_string(),
        frames: capture.blocks.len(),
        bytes: bytes.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pcap(linktype: u32, frames: &[Vec<u8>]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&0xa1b2_c3d4u32.to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes());
        out.extend_from_slice(&4u16.to_le_bytes());
        out.extend_from_slice(&0i32.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&65535u32.to_le_bytes());
        out.extend_from_slice(&linktype.to_le_bytes());
        for (i, f) in frames.iter().enumerate() {
            out.extend_from_slice(&(1_700_000_000u32 + i as u32).to_le_bytes());
            out.extend_from_slice(&0u32.to_le_bytes());
            out.extend_from_slice(&(f.len() as u32).to_le_bytes());
            out.extend_from_slice(&(f.len() as u32).to_le_bytes());
            out.extend_from_slice(f);
        }
        out
    }

    fn frame(protocol: u8) -> Vec<u8> {
        let mut f = vec![0u8; 12];
        f.extend_from_slice(&[0x08, 0x00]);
        f.extend_from_slice(&[
            0x45, 0, 0, 28, 0, 0, 0, 0, 64, protocol, 0, 0, 10, 0, 0, 1, 10, 0, 0, 2,
        ]);
        f.extend_from_slice(&[0x13, 0x88, 0x0f, 0xa0, 0, 8, 0, 0]);
        f.extend_from_slice(&[0u8; 12]);
        f
    }

    #[test]
    fn udp_frames_pass() {
        let bytes = pcap(1, &[frame(17), frame(17), frame(17)]);
        let summary = verify_udp_capture("p1", &bytes).unwrap();
        assert_eq!(summary.frames, 3);
        assert_eq!(summary.bytes, bytes.len());
    }

    #[test]
    fn empty_stream_and_header_only_are_zero_frames() {
        assert_eq!(verify_udp_capture("p1", &[]).unwrap().frames, 0);
        assert_eq!(verify_udp_capture("p1", &pcap(1, &[])).unwrap().frames, 0);
    }

    #[test]
    fn first_non_udp_frame_is_reported() {
        let bytes = pcap(1, &[frame(17), frame(6)]);
        match verify_udp_capture("p2", &bytes).unwrap_err() {
            VerifyError::NotUdp { port, index, .. } => {
                assert_eq!(port, "p2");
                assert_eq!(index, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn truncated_frame_is_a_decode_error() {
        let bytes = pcap(1, &[frame(17)[..20].to_vec()]);
        assert!(matches!(
            verify_udp_capture("p1", &bytes).unwrap_err(),
            VerifyError::Decode { index: 0, .. }
        ));
    }

    #[test]
    fn non_ethernet_link_type_is_refused() {
        let bytes = pcap(101, &[frame(17)]);
        assert!(matches!(
            verify_udp_capture("p1", &bytes).unwrap_err(),
            VerifyError::UnsupportedLinkType { linktype: 101, .. }
        ));
    }

    #[test]
    fn garbage_is_a_pcap_error() {
        assert!(matches!(
            verify_udp_capture("p1", b"not a capture at all").unwrap_err(),
            VerifyError::Pcap { .. }
        ));
    }
}
