use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Failed to parse {which} key: {source}")]
    KeyParse {
        which: &'static str,
        #[source]
        source: jsonwebtoken::errors::Error,
    },
    #[error("Failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
    /// Covers malformed encoding, bad signature, wrong algorithm and
    /// missing or expired `exp`. Callers only ever see this one variant.
    #[error("Invalid token")]
    Invalid,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Request to {provider} failed: {message}")]
    Network { provider: String, message: String },
    #[error("{provider} responded with HTTP {status}: {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },
    #[error("{provider} rejected the request: {error}{}", describe(.description))]
    Rejected {
        provider: String,
        error: String,
        description: Option<String>,
    },
    #[error("Malformed response from {provider}: {message}")]
    Malformed { provider: String, message: String },
}

fn describe(description: &Option<String>) -> String {
    description
        .as_deref()
        .map(|d| format!(" ({d})"))
        .unwrap_or_default()
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found")]
    NotFound,
    #[error("Conflicting record: {0}")]
    Conflict(String),
    #[error("Account store error: {0}")]
    Backend(String),
}

impl From<sea_orm::DbErr> for StoreError {
    fn from(err: sea_orm::DbErr) -> Self {
        match err.sql_err() {
            Some(sea_orm::SqlErr::UniqueConstraintViolation(detail)) => {
                StoreError::Conflict(detail)
            }
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session store error: {0}")]
    Backend(String),
}

/// Severity class of a [`FlowError`], mapped to an HTTP status at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadRequest,
    Provider,
    NotFound,
    Unauthorized,
    Forbidden,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "bad_request",
            ErrorKind::Provider => "provider_error",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::Internal => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            ErrorKind::Provider => StatusCode::BAD_GATEWAY,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error surfaced by the login flow and the account endpoints.
///
/// Everything except `Internal` carries a message meant for the caller.
/// `Internal` keeps its detail server-side: the response only holds a
/// reference id that is logged next to the full error.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{context}: {detail}")]
    Internal {
        context: &'static str,
        detail: String,
    },
}

impl FlowError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        FlowError::BadRequest(message.into())
    }

    pub fn internal(context: &'static str, detail: impl std::fmt::Display) -> Self {
        FlowError::Internal {
            context,
            detail: detail.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FlowError::BadRequest(_) => ErrorKind::BadRequest,
            FlowError::Provider(_) => ErrorKind::Provider,
            FlowError::NotFound(_) => ErrorKind::NotFound,
            FlowError::Unauthorized(_) => ErrorKind::Unauthorized,
            FlowError::Forbidden(_) => ErrorKind::Forbidden,
            FlowError::Internal { .. } => ErrorKind::Internal,
        }
    }
}

impl From<StoreError> for FlowError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => FlowError::NotFound("account not found".into()),
            other => FlowError::internal("account store", other),
        }
    }
}

impl From<SessionError> for FlowError {
    fn from(err: SessionError) -> Self {
        FlowError::internal("session store", err)
    }
}

/// JSON body of every error response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error class, e.g. `bad_request` or `internal_error`
    pub error: String,
    /// Human-readable description
    pub message: String,
    /// Correlation id for internal errors; matches the server log entry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl IntoResponse for FlowError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let body = match &self {
            FlowError::Internal { .. } => {
                let reference = uuid::Uuid::new_v4().to_string();
                tracing::error!(reference = %reference, error = %self, "internal error");
                ErrorResponse {
                    error: kind.as_str().to_string(),
                    message: "internal error".to_string(),
                    reference: Some(reference),
                }
            }
            other => {
                tracing::debug!(kind = kind.as_str(), error = %other, "request failed");
                ErrorResponse {
                    error: kind.as_str().to_string(),
                    message: other.to_string(),
                    reference: None,
                }
            }
        };
        (kind.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_not_found_maps_to_not_found() {
        let err: FlowError = StoreError::NotFound.into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn store_backend_maps_to_internal() {
        let err: FlowError = StoreError::Backend("connection reset".into()).into();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn provider_rejection_message_includes_description() {
        let err = ProviderError::Rejected {
            provider: "github".into(),
            error: "bad_verification_code".into(),
            description: Some("The code passed is incorrect or expired.".into()),
        };
        let msg = err.to_string();
        assert!(msg.contains("bad_verification_code"));
        assert!(msg.contains("incorrect or expired"));
    }

    #[test]
    fn status_codes_per_kind() {
        assert_eq!(ErrorKind::BadRequest.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorKind::Provider.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(ErrorKind::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorKind::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorKind::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ErrorKind::Internal.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
