//! Controller client.
//!
//! [`Controller`] is the five-operation contract every traffic generator
//! controller exposes: push/fetch configuration, change capture or
//! transmit state, read metrics, and download a port's capture buffer.
//! Every call blocks until the controller answers and nothing is cached
//! locally.
//!
//! [`HttpController`] implements the contract over HTTP/JSON.

pub mod error;
pub mod http;

use otg_model::{
    CaptureRequest, CaptureState, Config, ControlState, MetricsRequest, MetricsResponse,
    TransmitState,
};

pub use error::ControllerError;
pub use http::{HttpController, HttpControllerConfig};

/// Request/response façade over a remote controller.
pub trait Controller {
    /// Replace the controller's active configuration.
    fn set_config(&self, config: &Config) -> Result<(), ControllerError>;

    /// Fetch the controller's active configuration.
    fn get_config(&self) -> Result<Config, ControllerError>;

    fn set_control_state(&self, state: &ControlState) -> Result<(), ControllerError>;

    /// Point-in-time metrics snapshot.
    fn get_metrics(&self, request: &MetricsRequest) -> Result<MetricsResponse, ControllerError>;

    /// Raw pcap bytes captured on one port.
    fn get_capture(&self, request: &CaptureRequest) -> Result<Vec<u8>, ControllerError>;

    /// Start or stop capture on every capture port.
    fn set_capture_state(&self, state: CaptureState) -> Result<(), ControllerError> {
        self.set_control_state(&ControlState::capture(state))
    }

    /// Start or stop every flow.
    fn set_transmit_state(&self, state: TransmitState) -> Result<(), ControllerError> {
        self.set_control_state(&ControlState::transmit(state))
    }
}

impl<C: Controller + ?Sized> Controller for &C {
    fn set_config(&self, config: &Config) -> Result<(), ControllerError> {
        (**self).set_config(config)
    }

    fn get_config(&self) -> Result<Config, ControllerError> {
        (**self).get_config()
    }

    fn set_control_state(&self, state: &ControlState) -> Result<(), ControllerError> {
        (**self).set_control_state(state)
    }

    fn get_metrics(&self, request: &MetricsRequest) -> Result<MetricsResponse, ControllerError> {
        (**self).get_metrics(request)
    }

    fn get_capture(&self, request: &CaptureRequest) -> Result<Vec<u8>, ControllerError> {
        (**self).get_capture(request)
    }
}
