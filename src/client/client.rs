//! # Analysis Client
//!
//! This module contains the client that talks to the PharmStock backend.
//!
//! ## Responsibility
//!
//! The [`AnalysisClient`] performs one HTTP round trip per call:
//! - Package the image into a multipart form with a single `file` part
//! - POST it to `<base_url>/analyze-medication`
//! - Decode a 2xx JSON body into an [`AnalysisResponse`], unchanged
//! - Turn every other outcome into one [`AnalysisError`]
//!
//! The same request/normalization path serves the session storage endpoints
//! (`/medications`, `/medications/export`) and `/health`.
//!
//! ## Design Philosophy
//!
//! The client is stateless between calls. It does not handle:
//! - Retries
//! - Cancellation or timeouts (reqwest defaults apply)
//! - Caching or deduplication of analyses
//! - Validation of the uploaded file
//!
//! Cloning is cheap: clones share reqwest's connection pool, so one client can
//! serve any number of concurrent, independent calls.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pharmstock_client::client::{AnalysisClient, ImageFile};
//!
//! let client = AnalysisClient::new("http://127.0.0.1:8000")?;
//! let image = ImageFile::from_path("boite.jpg").await?;
//!
//! match client.analyze_medication(image).await {
//!     Ok(response) => println!("{} medication(s)", response.medications.len()),
//!     Err(e) => eprintln!("{}", e),
//! }
//! ```

use log::{info, warn};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use crate::client::error::AnalysisError;
use crate::client::image::ImageFile;
use crate::common::config::{normalize_base_url, ConfigError};
use crate::common::messages::{AnalysisResponse, ClearResponse, HealthStatus, StorageResponse};

/// Path of the analysis endpoint, relative to the base URL.
pub const ANALYZE_PATH: &str = "/analyze-medication";
const MEDICATIONS_PATH: &str = "/medications";
const EXPORT_PATH: &str = "/medications/export";
const HEALTH_PATH: &str = "/health";

/// Name of the multipart part carrying the image.
pub const FILE_FIELD: &str = "file";

/// Client for the medication analysis backend.
#[derive(Debug, Clone)]
pub struct AnalysisClient {
    http: Client,
    base_url: String,
}

impl AnalysisClient {
    /// Creates a client for the backend at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is not an absolute http(s) URL or the
    /// underlying reqwest client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        let http = Client::builder().build()?;
        Self::with_http_client(http, base_url)
    }

    /// Creates a client reusing an existing reqwest client.
    pub fn with_http_client(http: Client, base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            http,
            base_url: normalize_base_url(base_url)?,
        })
    }

    /// Base URL this client was configured with, without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Uploads an image and returns the backend's analysis.
    ///
    /// # Errors
    ///
    /// Returns an [`AnalysisError`] whose message is the normalized,
    /// user-facing description of the failure:
    /// * `Erreur: <cause>` if no response was received
    /// * the backend's `detail` if the error body carries one
    /// * `Erreur <status>: <status text>` otherwise
    pub async fn analyze_medication(
        &self,
        image: ImageFile,
    ) -> Result<AnalysisResponse, AnalysisError> {
        self.analyze(image, None).await
    }

    /// Same as [`analyze_medication`](Self::analyze_medication), storing the
    /// result in the backend session `session_id`.
    pub async fn analyze_medication_in_session(
        &self,
        image: ImageFile,
        session_id: &str,
    ) -> Result<AnalysisResponse, AnalysisError> {
        self.analyze(image, Some(session_id)).await
    }

    async fn analyze(
        &self,
        image: ImageFile,
        session_id: Option<&str>,
    ) -> Result<AnalysisResponse, AnalysisError> {
        info!(
            "📤 Sending {} ({} bytes, {}) to {}{}",
            image.file_name,
            image.len(),
            image.content_type,
            self.base_url,
            ANALYZE_PATH
        );
        if image.is_empty() {
            warn!("⚠️  {} is empty, the backend decides whether to accept it", image.file_name);
        }

        let part = Part::bytes(image.bytes)
            .file_name(image.file_name)
            .mime_str(&image.content_type)
            .map_err(|e| self.report(AnalysisError::from(e)))?;
        let form = Form::new().part(FILE_FIELD, part);

        let mut request = self.http.post(self.endpoint(ANALYZE_PATH)).multipart(form);
        if let Some(session_id) = session_id {
            request = request.query(&[("session_id", session_id)]);
        }

        let response: AnalysisResponse = self.send_json(request).await?;
        info!(
            "✅ Analysis complete: {} medication(s) detected",
            response.medications.len()
        );
        Ok(response)
    }

    /// Lists the medications stored in a backend session.
    pub async fn list_medications(
        &self,
        session_id: &str,
    ) -> Result<StorageResponse, AnalysisError> {
        let request = self
            .http
            .get(self.endpoint(MEDICATIONS_PATH))
            .query(&[("session_id", session_id)]);
        self.send_json(request).await
    }

    /// Empties a backend session.
    pub async fn clear_medications(&self, session_id: &str) -> Result<ClearResponse, AnalysisError> {
        let request = self
            .http
            .delete(self.endpoint(MEDICATIONS_PATH))
            .query(&[("session_id", session_id)]);
        self.send_json(request).await
    }

    /// Downloads a backend session as CSV text.
    pub async fn export_medications_csv(&self, session_id: &str) -> Result<String, AnalysisError> {
        let request = self
            .http
            .get(self.endpoint(EXPORT_PATH))
            .query(&[("session_id", session_id)]);
        let (status, body) = self.send(request).await?;
        String::from_utf8(body).map_err(|e| {
            warn!("⚠️  Export body is not valid UTF-8: {}", e);
            self.report(AnalysisError::decode(status))
        })
    }

    /// Queries the backend's health endpoint.
    pub async fn health(&self) -> Result<HealthStatus, AnalysisError> {
        self.send_json(self.http.get(self.endpoint(HEALTH_PATH))).await
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, AnalysisError> {
        let (status, body) = self.send(request).await?;
        serde_json::from_slice(&body).map_err(|e| {
            warn!("⚠️  Unexpected response body (status {}): {}", status, e);
            self.report(AnalysisError::decode(status))
        })
    }

    /// Sends the request and returns the status and full body of a 2xx reply.
    async fn send(&self, request: RequestBuilder) -> Result<(StatusCode, Vec<u8>), AnalysisError> {
        let response = request
            .send()
            .await
            .map_err(|e| self.report(AnalysisError::from(e)))?;

        let status = response.status();
        if !status.is_success() {
            // A status was received, so an unreadable body still counts as a server failure.
            let body = match response.bytes().await {
                Ok(body) => body.to_vec(),
                Err(e) => {
                    warn!("⚠️  Could not read error body (status {}): {}", status, e);
                    Vec::new()
                }
            };
            return Err(self.report(AnalysisError::from_response(status, &body)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.report(AnalysisError::from(e)))?;
        Ok((status, body.to_vec()))
    }

    fn report(&self, error: AnalysisError) -> AnalysisError {
        match error.status() {
            Some(status) => warn!("❌ Backend replied {}: {}", status, error),
            None => warn!("❌ No response from {}: {}", self.base_url, error),
        }
        error
    }
}
