//! Run driver: push a configuration, run it, and verify what came back.

use std::path::PathBuf;
use std::time::Duration;

use otg_client::{Controller, ControllerError};
use otg_model::{
    CaptureRequest, CaptureState, Config, FlowColumn, MetricsRequest, MetricsResponse,
    PortColumn, TransmitState, TransmitStatus,
};
use thiserror::Error;

use crate::capture::{CaptureSummary, verify_udp_capture};
use crate::verify::{PacketCounts, VerifyError};

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Controller(#[from] ControllerError),
    #[error(transparent)]
    Verify(#[from] VerifyError),
    #[error("controller returned a different configuration than the one pushed")]
    RoundTripMismatch,
    #[error("failed to write capture to {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("flows still transmitting after {polls} metrics polls")]
    SettleTimeout { polls: u32 },
    #[error("port {0:?} is not declared with a capture")]
    UnknownPort(String),
}

/// How long to wait for transmission before the port metrics read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Settle {
    /// Read metrics straight after starting transmission. Exact only when
    /// the controller finishes bounded flows before acknowledging the start.
    #[default]
    None,
    /// Poll flow metrics until no flow reports `started`.
    PollTransmit { interval: Duration, max_polls: u32 },
}

/// Which port's capture is written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CapturePort {
    #[default]
    LastDeclared,
    Named(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistCapture {
    pub port: CapturePort,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSettings {
    /// Read the config back after pushing it and require it to match.
    pub verify_round_trip: bool,
    pub settle: Settle,
    /// Stop capture before downloading capture buffers.
    pub stop_capture_before_fetch: bool,
    pub persist: Option<PersistCapture>,
}

/// Outcome of a run that passed every check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub counts: PacketCounts,
    /// One entry per captured port, in declaration order.
    pub captures: Vec<CaptureSummary>,
    pub persisted: Option<PathBuf>,
}

/// Drives one configuration through a controller.
pub struct Harness<C> {
    controller: C,
    settings: RunSettings,
}

impl<C: Controller> Harness<C> {
    pub fn new(controller: C, settings: RunSettings) -> Self {
        Self {
            controller,
            settings,
        }
    }

    pub fn controller(&self) -> &C {
        &self.controller
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Run `config` to completion and verify counts and captures.
    ///
    /// Any controller rejection or failed check ends the run.
    pub fn run(&self, config: &Config) -> Result<RunReport, HarnessError> {
        let captured = captured_ports(config);
        let persist = self
            .settings
            .persist
            .as_ref()
            .map(|p| resolve_persist_port(&p.port, config, &captured).map(|port| (port, &p.path)))
            .transpose()?;

        tracing::info!(
            ports = config.ports.len(),
            flows = config.flows.len(),
            "pushing configuration"
        );
        self.controller.set_config(config)?;

        if self.settings.verify_round_trip {
            let fetched = self.controller.get_config()?;
            if fetched != *config {
                return Err(HarnessError::RoundTripMismatch);
            }
            tracing::info!("configuration round trip matches");
        }

        tracing::info!("starting capture and transmit");
        self.controller.set_capture_state(CaptureState::Start)?;
        self.controller.set_transmit_state(TransmitState::Start)?;

        self.settle()?;

        let metrics = self.controller.get_metrics(&MetricsRequest::ports(
            config.port_names(),
            &[PortColumn::FramesTx, PortColumn::FramesRx],
        ))?;

        if self.settings.stop_capture_before_fetch {
            self.controller.set_capture_state(CaptureState::Stop)?;
        }

        let mut captures = Vec::with_capacity(captured.len());
        let mut persisted = None;
        for port in &captured {
            let bytes = self.controller.get_capture(&CaptureRequest::new(port.as_str()))?;
            let summary = verify_udp_capture(port, &bytes)?;
            tracing::info!(port = %port, frames = summary.frames, "capture verified");

            if let Some((persist_port, path)) = &persist
                && persist_port == port
            {
                std::fs::write(path, &bytes).map_err(|source| HarnessError::Persist {
                    path: path.to_path_buf(),
                    source,
                })?;
                tracing::info!(port = %port, path = %path.display(), "capture written");
                persisted = Some(path.to_path_buf());
            }
            captures.push(summary);
        }

        let counts = PacketCounts::from_metrics(&metrics, config)?;
        tracing::info!(
            expected = counts.expected,
            total_tx = counts.total_tx,
            total_rx = counts.total_rx,
            "packet counts"
        );
        counts.check()?;

        Ok(RunReport {
            counts,
            captures,
            persisted,
        })
    }

    fn settle(&self) -> Result<(), HarnessError> {
        let Settle::PollTransmit {
            interval,
            max_polls,
        } = self.settings.settle
        else {
            return Ok(());
        };

        let request = MetricsRequest::flows(Vec::<String>::new(), &[FlowColumn::FramesTx]);
        for poll in 1..=max_polls {
            let MetricsResponse::FlowMetrics { flow_metrics } =
                self.controller.get_metrics(&request)?
            else {
                return Err(VerifyError::UnexpectedMetrics.into());
            };
            let running = flow_metrics
                .iter()
                .filter(|f| f.transmit == TransmitStatus::Started)
                .count();
            if running == 0 {
                tracing::debug!(poll, "all flows stopped");
                return Ok(());
            }
            tracing::debug!(poll, running, "flows still transmitting");
            std::thread::sleep(interval);
        }
        Err(HarnessError::SettleTimeout { polls: max_polls })
    }
}

/// Ports with a capture configured, in port declaration order.
fn captured_ports(config: &Config) -> Vec<String> {
    let mut captured = Vec::new();
    for port in &config.ports {
        let has_capture = config
            .captures
            .iter()
            .any(|c| c.port_names.iter().any(|n| *n == port.name));
        if has_capture {
            captured.push(port.name.clone());
        } else {
            tracing::debug!(port = %port.name, "no capture configured, skipping capture check");
        }
    }
    captured
}

fn resolve_persist_port(
    port: &CapturePort,
    config: &Config,
    captured: &[String],
) -> Result<String, HarnessError> {
    let name = match port {
        CapturePort::Named(name) => name.clone(),
        CapturePort::LastDeclared => match config.ports.last() {
            Some(p) => p.name.clone(),
            None => return Err(HarnessError::UnknownPort(String::new())),
        },
    };
    if captured.contains(&name) {
        Ok(name)
    } else {
        Err(HarnessError::UnknownPort(name))
    }
}
