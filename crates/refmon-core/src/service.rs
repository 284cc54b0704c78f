//! Client for the external statistics-generation service.

use std::fmt::Write as _;
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

/// One generation request for a single goal.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub slug: String,
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    /// When false the service is asked to skip graph rendering
    pub graph: bool,
}

/// Failure modes of a generation call. Both end up as response error text;
/// neither is retried automatically.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("could not reach the computation service: {0}")]
    Unreachable(String),
    #[error("computation service error:\n{0}")]
    Processing(String),
    #[error("malformed computation service response: {0}")]
    BadResponse(String),
}

/// Seam to the external computation service.
///
/// No timeout wraps the call; a hung service stalls the worker. Known
/// limitation, kept from the observed behavior.
#[async_trait]
pub trait ComputeService: Send + Sync {
    /// Regenerate the artifacts for one goal into `output_dir`.
    async fn generate(&self, request: &GenerateRequest) -> Result<(), ServiceError>;
}

/// HTTP client for the jsbrain-style generation endpoint.
pub struct HttpComputeService {
    base_url: String,
    client: reqwest::Client,
}

impl HttpComputeService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ComputeService for HttpComputeService {
    async fn generate(&self, request: &GenerateRequest) -> Result<(), ServiceError> {
        let mut query: Vec<(&str, String)> = vec![
            ("slug", request.slug.clone()),
            ("inpath", request.source_dir.display().to_string()),
            ("outpath", request.output_dir.display().to_string()),
        ];
        if !request.graph {
            query.push(("nograph", "1".to_string()));
        }

        let response = self
            .client
            .get(&self.base_url)
            .query(&query)
            .send()
            .await
            .map_err(|e| ServiceError::Unreachable(e.to_string()))?;

        let body: Map<String, Value> = response
            .json()
            .await
            .map_err(|e| ServiceError::BadResponse(e.to_string()))?;

        let failed = body
            .get("error")
            .is_some_and(|e| !e.is_null() && *e != "");
        if failed {
            // The service spreads diagnostics across several keys; dump all
            // of them for the operator.
            let mut message = String::new();
            for (key, value) in &body {
                let _ = writeln!(message, "  {key} = {value}");
            }
            return Err(ServiceError::Processing(message));
        }

        Ok(())
    }
}
