//! Process-wide error taxonomy (spec §7). Component errors are small and
//! local; `AppError` is the single place that knows how to turn any of
//! them into the HTTP envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::analyzer::AnalyzerError;
use crate::k8s::client::ClusterError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("cluster not ready: {0}")]
    NotReady(String),
    #[error("cluster error: {0}")]
    Cluster(String),
    #[error("insufficient data")]
    InsufficientData,
    #[error("invalid parameters: {0}")]
    InvalidParams(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("not implemented")]
    NotImplemented,
    #[error("internal error")]
    Internal,
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotReady(_) => "NotReady",
            AppError::Cluster(_) => "ClusterError",
            AppError::InsufficientData => "InsufficientData",
            AppError::InvalidParams(_) => "InvalidParams",
            AppError::NotFound(_) => "NotFound",
            AppError::NotImplemented => "NotImplemented",
            AppError::Internal => "Internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::NotReady(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Cluster(_) => StatusCode::BAD_GATEWAY,
            AppError::InsufficientData => StatusCode::NOT_FOUND,
            AppError::InvalidParams(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::NotImplemented => StatusCode::NOT_IMPLEMENTED,
            AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ClusterError> for AppError {
    fn from(e: ClusterError) -> Self {
        AppError::Cluster(e.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::InsufficientData => AppError::InsufficientData,
        }
    }
}

impl From<AnalyzerError> for AppError {
    fn from(e: AnalyzerError) -> Self {
        match e {
            AnalyzerError::InsufficientData => AppError::InsufficientData,
            AnalyzerError::Cluster(c) => AppError::Cluster(c.to_string()),
            AnalyzerError::NotFound(what) => AppError::NotFound(what),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

#[derive(Debug, Serialize)]
struct Envelope {
    success: bool,
    error: ErrorBody,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Envelope {
            success: false,
            error: ErrorBody {
                code: self.code().to_string(),
                message: self.to_string(),
            },
        };
        (status, axum::Json(body)).into_response()
    }
}
