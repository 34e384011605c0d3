use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use otg_client::ControllerError;
use otg_model::ErrorDetails;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
    #[error("unknown port {0:?}")]
    UnknownPort(String),
    #[error("unknown flow {0:?}")]
    UnknownFlow(String),
    #[error("no capture configured on port {0:?}")]
    NoCapture(String),
    #[error("simulator state lock poisoned")]
    Poisoned,
}

impl SimError {
    pub fn details(&self) -> ErrorDetails {
        match self {
            SimError::Invalid(errors) => ErrorDetails::validation(errors.clone()),
            SimError::UnknownPort(_) | SimError::UnknownFlow(_) | SimError::NoCapture(_) => {
                ErrorDetails::validation(vec![self.to_string()])
            }
            SimError::Poisoned => ErrorDetails::internal(self.to_string()),
        }
    }

    /// Surface as the rejection an HTTP controller would have returned.
    pub fn into_controller_error(self, operation: &'static str) -> ControllerError {
        ControllerError::Rejected {
            operation,
            details: self.details(),
        }
    }
}

impl IntoResponse for SimError {
    fn into_response(self) -> Response {
        let details = self.details();
        let status =
            StatusCode::from_u16(details.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        tracing::debug!(error = %self, "request rejected");
        (status, Json(details)).into_response()
    }
}
