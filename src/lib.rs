pub mod client;
pub mod common;
pub mod server;

pub use client::{AnalysisClient, AnalysisError, ImageFile};
pub use common::messages::{AnalysisResponse, ApiError, MedicationInfo};
