//! Capture and transmit state changes, and capture download requests.

use serde::{Deserialize, Serialize};

/// Body of a control-state request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "choice", rename_all = "snake_case")]
pub enum ControlState {
    Capture { capture: CaptureControl },
    Transmit { transmit: TransmitControl },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureControl {
    /// Empty means every port that has a capture configured.
    #[serde(default)]
    pub port_names: Vec<String>,
    pub state: CaptureState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransmitControl {
    /// Empty means every configured flow.
    #[serde(default)]
    pub flow_names: Vec<String>,
    pub state: TransmitState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureState {
    Start,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransmitState {
    Start,
    Stop,
}

impl ControlState {
    /// Change capture state on every capture port.
    pub fn capture(state: CaptureState) -> Self {
        ControlState::Capture {
            capture: CaptureControl {
                port_names: Vec::new(),
                state,
            },
        }
    }

    /// Change transmit state of every flow.
    pub fn transmit(state: TransmitState) -> Self {
        ControlState::Transmit {
            transmit: TransmitControl {
                flow_names: Vec::new(),
                state,
            },
        }
    }
}

/// Which port's capture buffer to download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRequest {
    pub port_name: String,
}

impl CaptureRequest {
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_state_json_shape() {
        let v = serde_json::to_value(ControlState::transmit(TransmitState::Start)).unwrap();
        assert_eq!(
            v,
            serde_json::json!({
                "choice": "transmit",
                "transmit": { "flow_names": [], "state": "start" }
            })
        );

        let back: ControlState =
            serde_json::from_str(r#"{"choice":"capture","capture":{"state":"stop"}}"#).unwrap();
        assert_eq!(back, ControlState::capture(CaptureState::Stop));
    }
}
