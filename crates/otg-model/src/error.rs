//! Error and warning documents returned by a controller.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Body of a non-2xx controller response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: u16,
    #[serde(default)]
    pub kind: ErrorKind,
    #[serde(default)]
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The request was understood but refused (bad config, unknown port…).
    Validation,
    #[default]
    Internal,
}

impl ErrorDetails {
    pub fn validation(errors: Vec<String>) -> Self {
        Self {
            code: 400,
            kind: ErrorKind::Validation,
            errors,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            code: 500,
            kind: ErrorKind::Internal,
            errors: vec![message.into()],
        }
    }
}

impl fmt::Display for ErrorDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ErrorKind::Validation => "validation",
            ErrorKind::Internal => "internal",
        };
        write!(f, "{kind} error ({})", self.code)?;
        if !self.errors.is_empty() {
            write!(f, ": {}", self.errors.join("; "))?;
        }
        Ok(())
    }
}

/// Body of a successful `set_config` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Warnings {
    pub warnings: Vec<String>,
}
