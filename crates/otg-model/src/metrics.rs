//! Metrics requests and point-in-time results.
//!
//! Counters a request did not ask for are absent from the response rather
//! than zero, so a reader can tell "not requested" from "nothing sent".

use serde::{Deserialize, Serialize};

// ── Requests ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "choice", rename_all = "snake_case")]
pub enum MetricsRequest {
    Port { port: PortMetricsRequest },
    Flow { flow: FlowMetricsRequest },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortMetricsRequest {
    /// Empty means all ports.
    pub port_names: Vec<String>,
    /// Empty means all columns.
    pub column_names: Vec<PortColumn>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowMetricsRequest {
    /// Empty means all flows.
    pub flow_names: Vec<String>,
    /// Empty means all columns.
    pub metric_names: Vec<FlowColumn>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortColumn {
    FramesTx,
    FramesRx,
    BytesTx,
    BytesRx,
    FramesTxRate,
    FramesRxRate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowColumn {
    FramesTx,
    FramesRx,
    BytesTx,
    BytesRx,
}

impl MetricsRequest {
    pub fn ports<I, S>(port_names: I, columns: &[PortColumn]) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        MetricsRequest::Port {
            port: PortMetricsRequest {
                port_names: port_names.into_iter().map(Into::into).collect(),
                column_names: columns.to_vec(),
            },
        }
    }

    pub fn flows<I, S>(flow_names: I, columns: &[FlowColumn]) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        MetricsRequest::Flow {
            flow: FlowMetricsRequest {
                flow_names: flow_names.into_iter().map(Into::into).collect(),
                metric_names: columns.to_vec(),
            },
        }
    }
}

impl PortMetricsRequest {
    pub fn wants(&self, column: PortColumn) -> bool {
        self.column_names.is_empty() || self.column_names.contains(&column)
    }
}

impl FlowMetricsRequest {
    pub fn wants(&self, column: FlowColumn) -> bool {
        self.metric_names.is_empty() || self.metric_names.contains(&column)
    }
}

// ── Responses ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "choice", rename_all = "snake_case")]
pub enum MetricsResponse {
    PortMetrics { port_metrics: Vec<PortMetric> },
    FlowMetrics { flow_metrics: Vec<FlowMetric> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortMetric {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub link: LinkState,
    #[serde(default)]
    pub capture: CaptureStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frames_tx: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frames_rx: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes_tx: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes_rx: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frames_tx_rate: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frames_rx_rate: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowMetric {
    pub name: String,
    #[serde(default)]
    pub transmit: TransmitStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frames_tx: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frames_rx: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes_tx: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes_rx: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    #[default]
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureStatus {
    Started,
    #[default]
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransmitStatus {
    Started,
    #[default]
    Stopped,
    Paused,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_columns_mean_all() {
        let req = PortMetricsRequest::default();
        assert!(req.wants(PortColumn::BytesRx));

        let req = PortMetricsRequest {
            port_names: vec![],
            column_names: vec![PortColumn::FramesTx],
        };
        assert!(req.wants(PortColumn::FramesTx));
        assert!(!req.wants(PortColumn::FramesRx));
    }

    #[test]
    fn request_json_shape() {
        let req = MetricsRequest::ports(["p1", "p2"], &[PortColumn::FramesTx, PortColumn::FramesRx]);
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["choice"], "port");
        assert_eq!(v["port"]["column_names"][1], "frames_rx");
    }

    #[test]
    fn absent_counters_stay_absent() {
        let res: MetricsResponse = serde_json::from_str(
            r#"{"choice":"port_metrics","port_metrics":[{"name":"p1","frames_tx":10}]}"#,
        )
        .unwrap();
        let MetricsResponse::PortMetrics { port_metrics } = res else {
            panic!("expected port metrics");
        };
        assert_eq!(port_metrics[0].frames_tx, Some(10));
        assert_eq!(port_metrics[0].frames_rx, None);
        assert_eq!(port_metrics[0].link, LinkState::Up);
    }
}
