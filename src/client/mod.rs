//! # Client Components
//!
//! ## Analysis Client ([`client`])
//! Performs the upload-and-analyze round trip against the backend and the
//! session storage calls that share its request path.
//!
//! ## Failure Normalization ([`error`])
//! Turns transport failures, error statuses and undecodable bodies into one
//! user-facing French message.
//!
//! ## Upload Handle ([`image`])
//! The caller-supplied file: name, content type and raw bytes.
//!
//! ## Metrics ([`metrics`])
//! Per-run latency and failure statistics for the command-line client.

pub mod client;
pub mod error;
pub mod image;
pub mod metrics;

// Re-export for convenience
pub use client::AnalysisClient;
pub use error::AnalysisError;
pub use image::ImageFile;
pub use metrics::ClientMetrics;
