//! Packet accounting checks.

use otg_model::{Config, MetricsResponse};
use thiserror::Error;

use crate::frame::{DecodeError, Innermost};

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("capture of port {port:?} is not a readable pcap stream: {message}")]
    Pcap { port: String, message: String },
    #[error("capture of port {port:?} has link type {linktype}, only Ethernet is supported")]
    UnsupportedLinkType { port: String, linktype: i32 },
    #[error("port {port:?} frame {index}: {source}")]
    Decode {
        port: String,
        index: usize,
        #[source]
        source: DecodeError,
    },
    #[error("port {port:?} frame {index} carries {found}, expected UDP")]
    NotUdp {
        port: String,
        index: usize,
        found: Innermost,
    },
    #[error("expected {expected} packets transmitted, controller reports {total_tx}")]
    TxMismatch { expected: u64, total_tx: u64 },
    #[error("expected at least {expected} packets received, controller reports {total_rx}")]
    RxShortfall { expected: u64, total_rx: u64 },
    #[error("port {port:?} metrics lack the {column} column")]
    MissingColumn { port: String, column: &'static str },
    #[error("flow {0:?} has no fixed packet count, expected total is undefined")]
    UnboundedFlow(String),
    #[error("expected port metrics, controller returned flow metrics")]
    UnexpectedMetrics,
    #[error("{what} overflows a 64-bit counter")]
    CounterOverflow { what: &'static str },
}

/// Frame totals reported for one port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortCount {
    pub name: String,
    pub frames_tx: u64,
    pub frames_rx: u64,
}

/// Expected versus reported packet totals of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketCounts {
    /// Sum of every flow's fixed packet count.
    pub expected: u64,
    pub total_tx: u64,
    pub total_rx: u64,
    pub ports: Vec<PortCount>,
}

impl PacketCounts {
    /// Sum port metrics and derive the expected total from `config`.
    pub fn from_metrics(metrics: &MetricsResponse, config: &Config) -> Result<Self, VerifyError> {
        let mut expected = 0u64;
        for flow in &config.flows {
            let packets = flow
                .duration
                .fixed_packet_count()
                .ok_or_else(|| VerifyError::UnboundedFlow(flow.name.clone()))?;
            expected = expected
                .checked_add(packets)
                .ok_or(VerifyError::CounterOverflow {
                    what: "expected packet total",
                })?;
        }

        let MetricsResponse::PortMetrics { port_metrics } = metrics else {
            return Err(VerifyError::UnexpectedMetrics);
        };

        let mut ports = Vec::with_capacity(port_metrics.len());
        for m in port_metrics {
            let missing = |column| VerifyError::MissingColumn {
                port: m.name.clone(),
                column,
            };
            ports.push(PortCount {
                name: m.name.clone(),
                frames_tx: m.frames_tx.ok_or_else(|| missing("frames_tx"))?,
                frames_rx: m.frames_rx.ok_or_else(|| missing("frames_rx"))?,
            });
        }

        Ok(Self {
            expected,
            total_tx: checked_total(ports.iter().map(|p| p.frames_tx), "total frames_tx")?,
            total_rx: checked_total(ports.iter().map(|p| p.frames_rx), "total frames_rx")?,
            ports,
        })
    }

    /// Every expected packet was sent, and at least as many were received.
    pub fn check(&self) -> Result<(), VerifyError> {
        if self.total_tx != self.expected {
            return Err(VerifyError::TxMismatch {
                expected: self.expected,
                total_tx: self.total_tx,
            });
        }
        if self.total_rx < self.expected {
            return Err(VerifyError::RxShortfall {
                expected: self.expected,
                total_rx: self.total_rx,
            });
        }
        Ok(())
    }
}

fn checked_total(
    mut values: impl Iterator<Item = u64>,
    what: &'static str,
) -> Result<u64, VerifyError> {
    values
        .try_fold(0u64, |acc, v| acc.checked_add(v))
        .ok_or(VerifyError::CounterOverflow { what })
}

#[cfg(test)]
mod tests {
    use otg_model::{FlowMetric, LinkState, PortMetric};

    use super::*;

    fn config(counts: &[u64]) -> Config {
        let mut config = Config::new();
        config.port("p1", "eth1");
        config.port("p2", "eth2");
        for (i, n) in counts.iter().enumerate() {
            config
                .flow(format!("f{i}"))
                .tx_rx("p1", "p2")
                .fixed_packets(*n);
        }
        config
    }

    fn port(name: &str, tx: Option<u64>, rx: Option<u64>) -> PortMetric {
        PortMetric {
            name: name.into(),
            location: None,
            link: LinkState::Up,
            capture: Default::default(),
            frames_tx: tx,
            frames_rx: rx,
            bytes_tx: None,
            bytes_rx: None,
            frames_tx_rate: None,
            frames_rx_rate: None,
        }
    }

    fn metrics(rows: Vec<PortMetric>) -> MetricsResponse {
        MetricsResponse::PortMetrics { port_metrics: rows }
    }

    #[test]
    fn sums_ports_and_flows() {
        let m = metrics(vec![
            port("p1", Some(1000), Some(1000)),
            port("p2", Some(1000), Some(1002)),
        ]);
        let counts = PacketCounts::from_metrics(&m, &config(&[1000, 1000])).unwrap();
        assert_eq!(counts.expected, 2000);
        assert_eq!(counts.total_tx, 2000);
        assert_eq!(counts.total_rx, 2002);
        assert_eq!(counts.ports[1].frames_rx, 1002);
        counts.check().unwrap();
    }

    #[test]
    fn tx_mismatch_and_rx_shortfall() {
        let m = metrics(vec![port("p1", Some(999), Some(1000))]);
        let err = PacketCounts::from_metrics(&m, &config(&[1000]))
            .unwrap()
            .check()
            .unwrap_err();
        assert!(matches!(
            err,
            VerifyError::TxMismatch {
                expected: 1000,
                total_tx: 999
            }
        ));

        let m = metrics(vec![port("p1", Some(1000), Some(10))]);
        let err = PacketCounts::from_metrics(&m, &config(&[1000]))
            .unwrap()
            .check()
            .unwrap_err();
        assert!(matches!(err, VerifyError::RxShortfall { total_rx: 10, .. }));
    }

    #[test]
    fn zero_packet_flow_contributes_nothing() {
        let m = metrics(vec![port("p1", Some(0), Some(0)), port("p2", Some(0), Some(0))]);
        let counts = PacketCounts::from_metrics(&m, &config(&[0])).unwrap();
        assert_eq!(counts.expected, 0);
        counts.check().unwrap();
    }

    #[test]
    fn missing_column_names_port_and_column() {
        let m = metrics(vec![port("p2", Some(5), None)]);
        let err = PacketCounts::from_metrics(&m, &config(&[5])).unwrap_err();
        assert_eq!(err.to_string(), "port \"p2\" metrics lack the frames_rx column");
    }

    #[test]
    fn non_fixed_duration_is_unbounded() {
        let mut cfg = config(&[5]);
        cfg.flows[0].duration = otg_model::FlowDuration::Continuous {
            continuous: Default::default(),
        };
        let m = metrics(vec![port("p1", Some(5), Some(5))]);
        let err = PacketCounts::from_metrics(&m, &cfg).unwrap_err();
        assert!(matches!(err, VerifyError::UnboundedFlow(name) if name == "f0"));
    }

    #[test]
    fn flow_metrics_are_rejected() {
        let m = MetricsResponse::FlowMetrics {
            flow_metrics: vec![FlowMetric {
                name: "f0".into(),
                transmit: Default::default(),
                frames_tx: Some(1),
                frames_rx: Some(1),
                bytes_tx: None,
                bytes_rx: None,
            }],
        };
        let err = PacketCounts::from_metrics(&m, &config(&[1])).unwrap_err();
        assert!(matches!(err, VerifyError::UnexpectedMetrics));
    }

    #[test]
    fn wrapping_tx_total_is_an_overflow() {
        // u64::MAX + 2001 would wrap to exactly the expected 2000.
        let m = metrics(vec![
            port("p1", Some(u64::MAX), Some(2000)),
            port("p2", Some(2001), Some(0)),
        ]);
        let err = PacketCounts::from_metrics(&m, &config(&[2000])).unwrap_err();
        assert!(matches!(
            err,
            VerifyError::CounterOverflow {
                what: "total frames_tx"
            }
        ));
    }

    #[test]
    fn rx_total_overflow() {
        let m = metrics(vec![
            port("p1", Some(1), Some(u64::MAX)),
            port("p2", Some(0), Some(1)),
        ]);
        let err = PacketCounts::from_metrics(&m, &config(&[1])).unwrap_err();
        assert!(matches!(
            err,
            VerifyError::CounterOverflow {
                what: "total frames_rx"
            }
        ));
    }

    #[test]
    fn expected_total_overflow() {
        let m = metrics(vec![port("p1", Some(0), Some(0))]);
        let err = PacketCounts::from_metrics(&m, &config(&[u64::MAX, 2])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "expected packet total overflows a 64-bit counter"
        );
    }
}
