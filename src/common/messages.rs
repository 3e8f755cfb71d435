//! # Wire Types
//!
//! JSON payloads exchanged between the analysis client and the PharmStock backend.
//!
//! The backend speaks French on the wire (`nom`, `laboratoire`, ...). The Rust
//! fields use English names and carry `#[serde(rename)]` attributes so that
//! decoding is a plain field-for-field copy: nothing is reshaped, validated or
//! reordered on the way in.
//!
//! ## Payloads
//!
//! - [`AnalysisResponse`]: reply to `POST /analyze-medication`
//! - [`ApiError`]: optional body of any non-2xx reply
//! - [`StorageResponse`], [`ClearResponse`]: session storage endpoints
//! - [`HealthStatus`]: reply to `GET /health`

use serde::{Deserialize, Serialize};

// ============================================================================
// ANALYSIS PAYLOADS
// ============================================================================

/// One medication detected on the submitted image.
///
/// Values are trusted from the backend: `unit_count` is expected to be
/// non-negative and `confidence` to lie in `[0, 1]`, but neither is checked here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationInfo {
    /// Medication name, with dosage when it was readable
    #[serde(rename = "nom")]
    pub name: String,
    /// Pharmaceutical laboratory
    #[serde(rename = "laboratoire")]
    pub manufacturer: String,
    /// Expiration date, in whatever format the backend produced
    #[serde(rename = "date_peremption")]
    pub expiration_date: String,
    /// Lot number printed on the packaging
    #[serde(rename = "numero_lot")]
    pub lot_number: String,
    /// Units still present in the packaging
    #[serde(rename = "nombre_unites")]
    pub unit_count: i64,
    /// Detection confidence score
    #[serde(rename = "confiance")]
    pub confidence: f64,
}

/// Decoded successful reply of the analysis endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    /// Detected medications, in the backend's detection order
    pub medications: Vec<MedicationInfo>,
    pub success: bool,
    pub message: String,
}

/// Error body the backend may attach to a non-2xx reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    pub detail: String,
}

// ============================================================================
// SESSION STORAGE PAYLOADS
// ============================================================================

/// A medication kept in the backend's session storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMedication {
    /// Storage identifier (UUID v4)
    pub id: String,
    #[serde(flatten)]
    pub info: MedicationInfo,
    /// ISO-8601 time the medication was stored
    pub timestamp: String,
    #[serde(default = "default_session_id")]
    pub session_id: String,
}

/// Reply of `GET /medications`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageResponse {
    pub medications: Vec<StoredMedication>,
    pub total_count: usize,
    pub total_units: i64,
}

/// Reply of `DELETE /medications`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClearResponse {
    pub message: String,
    /// Medications left across all sessions
    pub remaining: usize,
}

/// Reply of `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: String,
    pub gemini_available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stored_medications: Option<usize>,
}

/// Session used by the backend when the caller does not name one.
pub const DEFAULT_SESSION_ID: &str = "default";

fn default_session_id() -> String {
    DEFAULT_SESSION_ID.to_string()
}
