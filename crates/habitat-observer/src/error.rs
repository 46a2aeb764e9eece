//! Error types for the observer API.
//!
//! [`ApiError`] unifies every failure mode into the standardized
//! `{error, message}` body with an appropriate HTTP status. Internal
//! details never leak: consumers see short reason strings, not stack
//! traces.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors surfaced by the observer API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The requested resource was not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// The request was malformed or violated a precondition (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Authentication missing or invalid (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated, but not for this resource (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The resource existed but is permanently gone -- dead agents (410).
    #[error("gone: {0}")]
    Gone(String),

    /// Per-tick rate limit exhausted (429).
    #[error("rate limited: {0}")]
    TooManyRequests(String),

    /// Something failed internally (500).
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Gone(_) => StatusCode::GONE,
            Self::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    const fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::Gone(_) => "gone",
            Self::TooManyRequests(_) => "rate_limited",
            Self::Internal(_) => "internal",
        }
    }

    fn message(&self) -> String {
        match self {
            Self::NotFound(m)
            | Self::BadRequest(m)
            | Self::Unauthorized(m)
            | Self::Forbidden(m)
            | Self::Gone(m)
            | Self::TooManyRequests(m)
            | Self::Internal(m) => m.clone(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.code(),
            "message": self.message(),
        });
        (self.status(), axum::Json(body)).into_response()
    }
}

impl From<habitat_world::WorldError> for ApiError {
    fn from(err: habitat_world::WorldError) -> Self {
        match err {
            habitat_world::WorldError::AgentNotFound(id) => {
                Self::NotFound(format!("agent {id} not found"))
            }
            habitat_world::WorldError::SpawnNotFound(id) => {
                Self::NotFound(format!("spawn {id} not found"))
            }
            habitat_world::WorldError::ShelterNotFound(id) => {
                Self::NotFound(format!("shelter {id} not found"))
            }
            habitat_world::WorldError::ExternalAgentNotFound(id) => {
                Self::NotFound(format!("external agent {id} not found"))
            }
            habitat_world::WorldError::NotInitialized => {
                Self::BadRequest(String::from("world not initialized"))
            }
            habitat_world::WorldError::Storage(m) => Self::Internal(m),
        }
    }
}

impl From<habitat_core::EngineError> for ApiError {
    fn from(err: habitat_core::EngineError) -> Self {
        match err {
            habitat_core::EngineError::AlreadyRunning
            | habitat_core::EngineError::VariantAlreadyRunning
            | habitat_core::EngineError::NotRunning => Self::BadRequest(err.to_string()),
            habitat_core::EngineError::ExperimentNotFound(id) => {
                Self::NotFound(format!("experiment {id} not found"))
            }
            habitat_core::EngineError::NoPendingVariant(id) => {
                Self::BadRequest(format!("no pending variant for experiment {id}"))
            }
            habitat_core::EngineError::World(world) => world.into(),
            habitat_core::EngineError::Commit { .. } | habitat_core::EngineError::Config(_) => {
                Self::Internal(err.to_string())
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn statuses_match_variants() {
        assert_eq!(
            ApiError::NotFound(String::new()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::TooManyRequests(String::new()).status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(ApiError::Gone(String::new()).status(), StatusCode::GONE);
    }

    #[test]
    fn world_errors_map_to_api_statuses() {
        let err: ApiError = habitat_world::WorldError::NotInitialized.into();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
