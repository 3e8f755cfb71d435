//! # Server Components
//!
//! A stand-in for the PharmStock backend, used to run the client locally and
//! in integration tests.
//!
//! - [`server`]: HTTP routes and handlers
//! - [`storage`]: in-memory, session-scoped medication storage

pub mod server;
pub mod storage;

pub use server::{router, run, serve, AppState};
pub use storage::MedicationStore;
