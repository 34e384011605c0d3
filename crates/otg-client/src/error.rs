use otg_model::{ErrorDetails, ErrorKind};
use thiserror::Error;

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("controller transport error: {0}")]
    Transport(#[from] ureq::Error),
    #[error("controller rejected {operation}: {details}")]
    Rejected {
        operation: &'static str,
        details: ErrorDetails,
    },
    #[error("undecodable {operation} response: {source}")]
    Decode {
        operation: &'static str,
        source: serde_json::Error,
    },
}

impl ControllerError {
    /// Build a rejection from a non-2xx status and its raw body.
    ///
    /// Controllers answer with an [`ErrorDetails`] document; anything else
    /// is kept verbatim as a single internal error.
    pub fn from_response(operation: &'static str, status: u16, body: &[u8]) -> Self {
        let details = serde_json::from_slice::<ErrorDetails>(body).unwrap_or_else(|_| {
            let text = String::from_utf8_lossy(body).trim().to_string();
            ErrorDetails {
                code: status,
                kind: ErrorKind::Internal,
                errors: if text.is_empty() { Vec::new() } else { vec![text] },
            }
        });
        ControllerError::Rejected { operation, details }
    }

    /// Whether the controller refused the request as invalid, as opposed to
    /// failing to process it.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ControllerError::Rejected { details, .. } if details.kind == ErrorKind::Validation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_body_is_kept() {
        let body = br#"{"code":400,"kind":"validation","errors":["duplicate port name p1"]}"#;
        let err = ControllerError::from_response("set_config", 400, body);
        assert!(err.is_validation());
        assert_eq!(
            err.to_string(),
            "controller rejected set_config: validation error (400): duplicate port name p1"
        );
    }

    #[test]
    fn plain_body_becomes_internal_error() {
        let err = ControllerError::from_response("get_metrics", 502, b"bad gateway\n");
        assert!(!err.is_validation());
        let ControllerError::Rejected { details, .. } = err else {
            panic!("expected rejection");
        };
        assert_eq!(details.code, 502);
        assert_eq!(details.errors, ["bad gateway"]);
    }

    #[test]
    fn empty_body_has_no_messages() {
        let ControllerError::Rejected { details, .. } =
            ControllerError::from_response("get_config", 500, b"")
        else {
            panic!("expected rejection");
        };
        assert!(details.errors.is_empty());
    }
}
