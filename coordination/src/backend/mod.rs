//! Backend adapters
//!
//! The seam between coordination logic and whatever actually answers a
//! query. Strategies only ever talk to a [`BackendAdapter`]; adapters return
//! errors instead of panicking wherever possible, but callers still guard
//! against both.

pub mod http;

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::task::TaskContext;

pub use http::{HttpBackend, HttpBackendConfig};

/// Errors from backend calls
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("backend {backend} returned HTTP {status}: {body}")]
    Status {
        backend: String,
        status: u16,
        body: String,
    },

    #[error("backend {0} returned no content")]
    EmptyResponse(String),

    #[error("response parse error: {0}")]
    Parse(String),

    #[error("unknown backend: {0}")]
    UnknownBackend(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Shared reference to a backend adapter
pub type SharedBackendAdapter = Arc<dyn BackendAdapter>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// What a backend produced for one query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendResponse {
    pub result: String,
    pub backend_id: String,
    /// Seconds
    pub execution_time: f64,
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BackendResponse {
    pub fn success(backend_id: impl Into<String>, result: impl Into<String>, execution_time: f64) -> Self {
        Self {
            result: result.into(),
            backend_id: backend_id.into(),
            execution_time,
            status: ResponseStatus::Success,
            error: None,
        }
    }

    pub fn failure(backend_id: impl Into<String>, error: impl Into<String>, execution_time: f64) -> Self {
        Self {
            result: String::new(),
            backend_id: backend_id.into(),
            execution_time,
            status: ResponseStatus::Error,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }
}

/// Executes a query against a named backend
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    async fn execute(
        &self,
        query: &str,
        backend_id: &str,
        context: &TaskContext,
    ) -> BackendResult<BackendResponse>;
}

/// Offline adapter that answers every query with a tagged echo.
///
/// Used for dry runs; the response is deterministic.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoBackend;

#[async_trait]
impl BackendAdapter for EchoBackend {
    async fn execute(
        &self,
        query: &str,
        backend_id: &str,
        _context: &TaskContext,
    ) -> BackendResult<BackendResponse> {
        let start = Instant::now();
        let result = format!("[{backend_id}] {query}");
        Ok(BackendResponse::success(
            backend_id,
            result,
            start.elapsed().as_secs_f64(),
        ))
    }
}
