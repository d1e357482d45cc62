//! JWT user token creation and verification.

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error as ThisError;
use uuid::Uuid;

use crate::{
    config::JwtConfig,
    errors::Error,
    settings::{JWT_EXPIRE_MINUTES, JWT_USER_SECRET, SecretResolver},
};

/// JWT user claims
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserClaims {
    pub iss: String, // Issuer
    pub sub: String, // Subject (user id, usually an email)
    pub aud: String, // Audience
    pub exp: i64,    // Expiration time
    pub iat: i64,    // Issued at
    pub jti: String, // Token id
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Why a token could not be verified.
#[derive(ThisError, Debug)]
pub enum TokenError {
    /// Client-side problem: bad signature, expired, wrong issuer/audience, malformed token
    #[error("token rejected: {0}")]
    Rejected(String),
    /// Server-side problem: unusable key or internal failure
    #[error("token verification failed: {0}")]
    Internal(String),
}

/// Verifies signed user tokens.
pub trait TokenCodec: Send + Sync {
    fn verify(&self, token: &str, secret: &str) -> Result<UserClaims, TokenError>;
}

/// HS256 codec checking signature, expiry, issuer and audience.
#[derive(Debug, Clone)]
pub struct JwtCodec {
    issuer: String,
    audience: String,
    leeway: Duration,
}

impl JwtCodec {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            leeway: config.leeway,
        }
    }

    /// Create a signed token for `subject`, valid for `expires_in`.
    pub fn issue(&self, subject: &str, data: serde_json::Value, secret: &str, expires_in: Duration) -> Result<String, Error> {
        let now = Utc::now();
        let expires_at = ChronoDuration::from_std(expires_in)
            .ok()
            .and_then(|expires_in| now.checked_add_signed(expires_in))
            .ok_or_else(|| Error::Configuration {
                message: format!("token lifetime {expires_in:?} is out of range"),
            })?;
        let claims = UserClaims {
            iss: self.issuer.clone(),
            sub: subject.to_string(),
            aud: self.audience.clone(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
            data,
        };

        let key = EncodingKey::from_secret(secret.as_bytes());
        encode(&Header::new(Algorithm::HS256), &claims, &key).map_err(|e| Error::Internal {
            operation: format!("create JWT: {e}"),
        })
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.leeway = self.leeway.as_secs();
        validation
    }
}

impl TokenCodec for JwtCodec {
    fn verify(&self, token: &str, secret: &str) -> Result<UserClaims, TokenError> {
        let key = DecodingKey::from_secret(secret.as_bytes());

        let token_data = decode::<UserClaims>(token, &key, &self.validation()).map_err(|e| match e.kind() {
            ErrorKind::InvalidToken
            | ErrorKind::InvalidSignature
            | ErrorKind::ExpiredSignature
            | ErrorKind::MissingRequiredClaim(_)
            | ErrorKind::InvalidIssuer
            | ErrorKind::InvalidAudience
            | ErrorKind::InvalidSubject
            | ErrorKind::ImmatureSignature
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_)
            | ErrorKind::InvalidAlgorithm => TokenError::Rejected(e.to_string()),

            ErrorKind::InvalidEcdsaKey
            | ErrorKind::InvalidRsaKey(_)
            | ErrorKind::RsaFailedSigning
            | ErrorKind::InvalidAlgorithmName
            | ErrorKind::InvalidKeyFormat
            | ErrorKind::MissingAlgorithm
            | ErrorKind::Crypto(_) => TokenError::Internal(e.to_string()),

            // Future variants default to server error
            _ => TokenError::Internal(format!("unknown error: {e}")),
        })?;

        if token_data.claims.sub.is_empty() {
            return Err(TokenError::Rejected("empty subject".to_string()));
        }
        Ok(token_data.claims)
    }
}

/// Issue a user token signed with `jwt.user_secret`, valid for `jwt.expire_minutes`.
pub async fn issue_user_token(
    codec: &JwtCodec,
    settings: &dyn SecretResolver,
    subject: &str,
    data: serde_json::Value,
) -> Result<String, Error> {
    let secret = settings.get_setting(JWT_USER_SECRET.key).await?;
    let minutes = settings.get_setting(JWT_EXPIRE_MINUTES.key).await?;
    let minutes: u64 = minutes.parse().map_err(|_| Error::Configuration {
        message: format!("{} must be a number of minutes, got '{minutes}'", JWT_EXPIRE_MINUTES.key),
    })?;

    let seconds = minutes.checked_mul(60).ok_or_else(|| Error::Configuration {
        message: format!("{} is too large: {minutes}", JWT_EXPIRE_MINUTES.key),
    })?;

    codec.issue(subject, data, &secret, Duration::from_secs(seconds))
}
