use crate::types::CredentialScheme;
use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

pub const TOO_MANY_CREDENTIALS_DETAIL: &str = "Too many authentication credentials provided";
pub const NOT_AUTHENTICATED_DETAIL: &str = "Not Authenticated";

#[derive(ThisError, Debug)]
pub enum Error {
    /// More than one kind of credential was presented on the same request
    #[error("Too many authentication credentials provided ({})", join_schemes(provided))]
    TooManyCredentials {
        provided: Vec<CredentialScheme>,
        challenges: Vec<String>,
    },

    /// Credential missing, or present but not accepted. Deliberately carries no reason.
    #[error("Not authenticated")]
    Unauthenticated {
        accepted_schemes: Vec<CredentialScheme>,
        challenges: Vec<String>,
    },

    /// Identity established but lacking one or more required scopes
    #[error("Missing one or more required scopes: [{}]", missing.join(", "))]
    MissingScopes { missing: Vec<String> },

    /// Invalid request data
    #[error("{message}")]
    BadRequest { message: String },

    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// Wiring or secret problem; fatal at startup, a 500 if hit at runtime
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn join_schemes(schemes: &[CredentialScheme]) -> String {
    schemes.iter().map(CredentialScheme::as_str).collect::<Vec<_>>().join("+")
}

/// JSON body for every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_schemes: Option<Vec<CredentialScheme>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_scopes: Option<Vec<String>>,
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::TooManyCredentials { .. } => StatusCode::BAD_REQUEST,
            Error::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Error::MissingScopes { .. } => StatusCode::FORBIDDEN,
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Configuration { .. } | Error::Internal { .. } | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::TooManyCredentials { .. } => TOO_MANY_CREDENTIALS_DETAIL.to_string(),
            Error::Unauthenticated { .. } => NOT_AUTHENTICATED_DETAIL.to_string(),
            Error::MissingScopes { .. } | Error::BadRequest { .. } | Error::NotFound { .. } => self.to_string(),
            Error::Configuration { .. } | Error::Internal { .. } | Error::Other(_) => "Internal server error".to_string(),
        }
    }

    fn challenge_header(&self) -> Option<HeaderValue> {
        let challenges = match self {
            Error::TooManyCredentials { challenges, .. } | Error::Unauthenticated { challenges, .. } => challenges,
            _ => return None,
        };
        if challenges.is_empty() {
            return None;
        }
        HeaderValue::from_str(&challenges.join(", ")).ok()
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match &self {
            Error::Configuration { .. } | Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::TooManyCredentials { .. } | Error::Unauthenticated { .. } | Error::MissingScopes { .. } => {
                tracing::info!("Authorization error: {}", self);
            }
            Error::BadRequest { .. } | Error::NotFound { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let body = ErrorBody {
            detail: self.user_message(),
            accepted_schemes: match &self {
                Error::Unauthenticated { accepted_schemes, .. } => Some(accepted_schemes.clone()),
                _ => None,
            },
            missing_scopes: match &self {
                Error::MissingScopes { missing } => Some(missing.clone()),
                _ => None,
            },
        };

        let mut response = (self.status_code(), Json(body)).into_response();
        if let Some(challenge) = self.challenge_header() {
            response.headers_mut().insert(header::WWW_AUTHENTICATE, challenge);
        }
        response
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
