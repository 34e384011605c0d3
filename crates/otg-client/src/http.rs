//! HTTP/JSON transport for [`Controller`].
//!
//! | operation          | request                    |
//! |--------------------|----------------------------|
//! | set_config         | `POST /config`             |
//! | get_config         | `GET /config`              |
//! | set_control_state  | `POST /control/state`      |
//! | get_metrics        | `POST /monitor/metrics`    |
//! | get_capture        | `POST /capture`            |
//!
//! Non-2xx answers are read as an error document and surfaced as
//! [`ControllerError::Rejected`]. There is no retry: a failed call is
//! returned to the caller as is.

use std::time::Duration;

use otg_model::{
    CaptureRequest, Config, ControlState, MetricsRequest, MetricsResponse, Warnings,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use ureq::http::Response;
use ureq::tls::TlsConfig;
use ureq::{Agent, Body};

use crate::{Controller, ControllerError};

/// Largest capture buffer accepted from a controller (1 GiB).
const MAX_CAPTURE_BYTES: u64 = 1 << 30;

/// Connection settings for [`HttpController`].
#[derive(Debug, Clone)]
pub struct HttpControllerConfig {
    /// Controller base URL, e.g. `https://localhost:8443`.
    pub base_url: String,
    /// Per-request deadline. `None` blocks until the controller answers.
    pub timeout: Option<Duration>,
    /// Skip TLS certificate verification (controllers commonly run with
    /// self-signed certificates).
    pub insecure: bool,
}

impl HttpControllerConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: None,
            insecure: false,
        }
    }
}

/// Blocking HTTP client for a remote controller.
pub struct HttpController {
    agent: Agent,
    base_url: String,
}

impl HttpController {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_config(HttpControllerConfig::new(base_url))
    }

    pub fn with_config(config: HttpControllerConfig) -> Self {
        let agent: Agent = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(config.timeout)
            .tls_config(
                TlsConfig::builder()
                    .disable_verification(config.insecure)
                    .build(),
            )
            .build()
            .into();

        Self {
            agent,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn post_json(
        &self,
        operation: &'static str,
        path: &str,
        body: &impl Serialize,
    ) -> Result<Response<Body>, ControllerError> {
        let url = self.url(path);
        tracing::debug!(%url, operation, "controller request");
        let resp = self.agent.post(&url).send_json(body)?;
        check_status(operation, resp)
    }

    fn get(&self, operation: &'static str, path: &str) -> Result<Response<Body>, ControllerError> {
        let url = self.url(path);
        tracing::debug!(%url, operation, "controller request");
        let resp = self.agent.get(&url).call()?;
        check_status(operation, resp)
    }
}

/// Pass 2xx responses through; turn anything else into a rejection.
fn check_status(
    operation: &'static str,
    mut resp: Response<Body>,
) -> Result<Response<Body>, ControllerError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = match resp.body_mut().read_to_vec() {
        Ok(body) => body,
        Err(e) => {
            tracing::debug!(operation, error = %e, "error body unreadable");
            Vec::new()
        }
    };
    tracing::debug!(operation, status = status.as_u16(), "controller rejected request");
    Err(ControllerError::from_response(
        operation,
        status.as_u16(),
        &body,
    ))
}

fn read_json<T: DeserializeOwned>(
    operation: &'static str,
    mut resp: Response<Body>,
) -> Result<T, ControllerError> {
    let bytes = resp.body_mut().read_to_vec()?;
    serde_json::from_slice(&bytes).map_err(|source| ControllerError::Decode { operation, source })
}

impl Controller for HttpController {
    fn set_config(&self, config: &Config) -> Result<(), ControllerError> {
        let mut resp = self.post_json("set_config", "/config", config)?;
        // Older controllers answer with an empty body.
        let bytes = resp.body_mut().read_to_vec()?;
        if bytes.is_empty() {
            return Ok(());
        }
        match serde_json::from_slice::<Warnings>(&bytes) {
            Ok(w) => {
                for warning in &w.warnings {
                    tracing::warn!(warning = %warning, "controller accepted config with warning");
                }
            }
            Err(e) => {
                tracing::debug!(
                    error = %e,
                    bytes = bytes.len(),
                    "set_config reply is not a warnings document"
                );
            }
        }
        Ok(())
    }

    fn get_config(&self) -> Result<Config, ControllerError> {
        let resp = self.get("get_config", "/config")?;
        read_json("get_config", resp)
    }

    fn set_control_state(&self, state: &ControlState) -> Result<(), ControllerError> {
        self.post_json("set_control_state", "/control/state", state)?;
        Ok(())
    }

    fn get_metrics(&self, request: &MetricsRequest) -> Result<MetricsResponse, ControllerError> {
        let resp = self.post_json("get_metrics", "/monitor/metrics", request)?;
        read_json("get_metrics", resp)
    }

    fn get_capture(&self, request: &CaptureRequest) -> Result<Vec<u8>, ControllerError> {
        let mut resp = self.post_json("get_capture", "/capture", request)?;
        let bytes = resp
            .body_mut()
            .with_config()
            .limit(MAX_CAPTURE_BYTES)
            .read_to_vec()?;
        tracing::debug!(port = %request.port_name, bytes = bytes.len(), "capture downloaded");
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let c = HttpController::new("https://clab-ixcb2b-ixia-c/");
        assert_eq!(c.base_url(), "https://clab-ixcb2b-ixia-c");
        assert_eq!(c.url("/config"), "https://clab-ixcb2b-ixia-c/config");
    }

    #[test]
    fn unreachable_controller_is_a_transport_error() {
        let c = HttpController::with_config(HttpControllerConfig {
            base_url: "http://127.0.0.1:1".into(),
            timeout: Some(Duration::from_secs(2)),
            insecure: false,
        });
        let err = c.get_config().unwrap_err();
        assert!(matches!(err, ControllerError::Transport(_)), "{err}");
    }
}
