//! Translation of store and request failures into HTTP responses.
//!
//! # Invariants
//! - Storage and pool failures never leak into response bodies; they are
//!   logged and replaced by a per-operation message.
//! - Every error response body is `{"error": "<message>"}`.

use crate::pool::PoolError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::error;
use salesforge_core::{RepoError, SequenceValidationError};
use serde_json::json;
use std::error::Error;
use std::fmt::{Display, Formatter};
use tokio::task::JoinError;

pub const NOT_FOUND_MESSAGE: &str = "resource not found";

/// Store operation a handler was running, used to pick the 500 message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Fetch,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Fetch => "fetch",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    pub fn failure_message(self) -> &'static str {
        match self {
            Self::Create => "resource creation failed",
            Self::Fetch => "resource fetching failed",
            Self::Update => "resource update failed",
            Self::Delete => "resource deletion failed",
        }
    }
}

/// Failure while running a store call on a pooled connection.
#[derive(Debug)]
pub enum StoreCallError {
    Pool(PoolError),
    Repo(RepoError),
    Task(JoinError),
}

impl Display for StoreCallError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pool(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Task(err) => write!(f, "store task failed: {err}"),
        }
    }
}

impl Error for StoreCallError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Pool(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Task(err) => Some(err),
        }
    }
}

impl From<PoolError> for StoreCallError {
    fn from(value: PoolError) -> Self {
        Self::Pool(value)
    }
}

impl From<RepoError> for StoreCallError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<JoinError> for StoreCallError {
    fn from(value: JoinError) -> Self {
        Self::Task(value)
    }
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound,
    Internal(Operation),
}

impl ApiError {
    /// Classifies a store call failure, logging anything that is not a
    /// plain not-found.
    pub fn from_store(operation: Operation, err: StoreCallError) -> Self {
        if let StoreCallError::Repo(repo_err) = &err {
            if repo_err.is_not_found() {
                return Self::NotFound;
            }
        }

        error!(
            "event=request_failed module=api status=error op={} error={}",
            operation.as_str(),
            err
        );
        Self::Internal(operation)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest(message) => message,
            Self::NotFound => NOT_FOUND_MESSAGE,
            Self::Internal(operation) => operation.failure_message(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(value: JsonRejection) -> Self {
        Self::BadRequest(value.body_text())
    }
}

impl From<SequenceValidationError> for ApiError {
    fn from(value: SequenceValidationError) -> Self {
        Self::BadRequest(value.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.message() }))).into_response()
    }
}
