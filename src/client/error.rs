//! # Failure Normalization
//!
//! Every way an analysis call can fail ends up as one [`AnalysisError`] whose
//! `Display` output is the short French message shown to the user.
//!
//! ## Rules (first match wins)
//!
//! 1. No response received -> `Erreur: <transport description>`
//! 2. Response body carries a non-empty `detail` -> the detail, verbatim
//! 3. Otherwise -> `Erreur <status>: <status text>`
//! 4. No response and nothing to describe it -> [`FALLBACK_MESSAGE`]
//!
//! A 2xx body that does not decode is reported through rule 3 with
//! [`PARSE_FAILURE_TEXT`] as the status text.

use reqwest::StatusCode;
use std::error::Error as StdError;
use thiserror::Error;

use crate::common::messages::ApiError;

/// Message used when a failure carries nothing more specific.
pub const FALLBACK_MESSAGE: &str = "Une erreur est survenue lors de l'analyse";

/// Status text used when a successful reply cannot be decoded.
pub const PARSE_FAILURE_TEXT: &str = "Http failure during parsing";

/// A failed backend call, already normalized into its user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    /// The request never produced an HTTP response.
    #[error("{message}")]
    Transport { message: String },

    /// The backend answered with a non-2xx status.
    #[error("{message}")]
    Server { status: u16, message: String },

    /// The backend answered 2xx but the body did not have the expected shape.
    #[error("{message}")]
    Decode { status: u16, message: String },
}

impl AnalysisError {
    /// Failure before any response was received.
    ///
    /// An empty or missing description falls back to [`FALLBACK_MESSAGE`].
    pub fn transport(description: Option<&str>) -> Self {
        let message = match description.map(str::trim) {
            Some(description) if !description.is_empty() => format!("Erreur: {}", description),
            _ => FALLBACK_MESSAGE.to_string(),
        };
        AnalysisError::Transport { message }
    }

    /// Failure reported by the backend through a non-2xx status.
    pub fn from_response(status: StatusCode, body: &[u8]) -> Self {
        let message = match error_detail(body) {
            Some(detail) => detail,
            None => status_message(status, status.canonical_reason()),
        };
        AnalysisError::Server {
            status: status.as_u16(),
            message,
        }
    }

    /// A 2xx reply whose body could not be decoded.
    pub fn decode(status: StatusCode) -> Self {
        AnalysisError::Decode {
            status: status.as_u16(),
            message: status_message(status, Some(PARSE_FAILURE_TEXT)),
        }
    }

    /// The normalized user-facing message.
    pub fn message(&self) -> &str {
        match self {
            AnalysisError::Transport { message }
            | AnalysisError::Server { message, .. }
            | AnalysisError::Decode { message, .. } => message,
        }
    }

    /// HTTP status of the reply, when one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            AnalysisError::Transport { .. } => None,
            AnalysisError::Server { status, .. } | AnalysisError::Decode { status, .. } => {
                Some(*status)
            }
        }
    }
}

impl From<reqwest::Error> for AnalysisError {
    fn from(error: reqwest::Error) -> Self {
        AnalysisError::transport(Some(&describe_transport_error(&error)))
    }
}

/// The `detail` field of an error body, if it is a non-empty string.
fn error_detail(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<ApiError>(body)
        .ok()
        .map(|error| error.detail)
        .filter(|detail| !detail.is_empty())
}

fn status_message(status: StatusCode, text: Option<&str>) -> String {
    format!(
        "Erreur {}: {}",
        status.as_u16(),
        text.unwrap_or(FALLBACK_MESSAGE)
    )
}

/// Flatten a reqwest error and its source chain into one line.
///
/// reqwest's own message only names the URL; the underlying cause
/// (`Connection refused`, DNS failure, ...) lives further down the chain.
pub(crate) fn describe_transport_error(error: &reqwest::Error) -> String {
    let mut parts: Vec<String> = vec![error.to_string()];
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !parts.iter().any(|part| part.contains(&text)) {
            parts.push(text);
        }
        source = cause.source();
    }
    parts.join(": ")
}
