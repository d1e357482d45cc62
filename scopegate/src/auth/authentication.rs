//! Authentication: turning one raw credential value into an [`Identity`].
//!
//! Each scheme has its own variant:
//! - [`ApiKeyAuthenticator`]: looks the key up in the [`ApiKeyStore`]
//! - [`TokenAuthenticator`]: verifies a signed user token (bearer header or cookie)
//! - [`GuestAuthenticator`]: mints a fresh guest identity; only reachable when
//!   authentication is disabled in configuration, for local development
//!
//! An authenticator returns `Ok(None)` when the credential is not accepted, whatever the
//! reason. Errors are reserved for infrastructure failures (store unreachable, unusable key).

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::session::{TokenCodec, TokenError},
    config::AuthConfig,
    directory::ApiKeyStore,
    errors::{Error, Result},
    settings::{JWT_USER_SECRET, SecretResolver},
    types::{CredentialScheme, Identity},
};

#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, payload: &str) -> Result<Option<Identity>>;
}

pub struct ApiKeyAuthenticator {
    api_keys: Arc<dyn ApiKeyStore>,
}

impl ApiKeyAuthenticator {
    pub fn new(api_keys: Arc<dyn ApiKeyStore>) -> Self {
        Self { api_keys }
    }
}

#[async_trait]
impl Authenticator for ApiKeyAuthenticator {
    #[instrument(skip_all)]
    async fn authenticate(&self, payload: &str) -> Result<Option<Identity>> {
        match self.api_keys.find_by_raw_key(payload).await? {
            Some(key) => {
                debug!("API key authenticated as application {}", key.revoke_id);
                Ok(Some(Identity::application(key.revoke_id)))
            }
            None => {
                debug!("Unknown API key");
                Ok(None)
            }
        }
    }
}

/// Verifies user tokens signed with the `jwt.user_secret` setting.
pub struct TokenAuthenticator {
    scheme: CredentialScheme,
    settings: Arc<dyn SecretResolver>,
    codec: Arc<dyn TokenCodec>,
}

impl TokenAuthenticator {
    pub fn bearer(settings: Arc<dyn SecretResolver>, codec: Arc<dyn TokenCodec>) -> Self {
        Self {
            scheme: CredentialScheme::BearerToken,
            settings,
            codec,
        }
    }

    pub fn cookie(settings: Arc<dyn SecretResolver>, codec: Arc<dyn TokenCodec>) -> Self {
        Self {
            scheme: CredentialScheme::CookieToken,
            settings,
            codec,
        }
    }

    async fn secret(&self) -> Result<String> {
        let secret = self.settings.get_setting(JWT_USER_SECRET.key).await?;
        if secret.is_empty() {
            return Err(Error::Configuration {
                message: format!("{} is empty", JWT_USER_SECRET.key),
            });
        }
        Ok(secret)
    }
}

#[async_trait]
impl Authenticator for TokenAuthenticator {
    #[instrument(skip_all, fields(scheme = %self.scheme))]
    async fn authenticate(&self, payload: &str) -> Result<Option<Identity>> {
        let secret = self.secret().await?;

        match self.codec.verify(payload, &secret) {
            Ok(claims) => {
                debug!("Token authenticated user {}", claims.sub);
                Ok(Some(Identity::user(claims.sub)))
            }
            Err(TokenError::Rejected(reason)) => {
                debug!("Token rejected: {}", reason);
                Ok(None)
            }
            Err(TokenError::Internal(reason)) => Err(Error::Internal {
                operation: format!("verify {} token: {reason}", self.scheme),
            }),
        }
    }
}

/// Development-only bypass: every call yields a new guest identity.
#[derive(Debug, Default, Clone, Copy)]
pub struct GuestAuthenticator;

impl GuestAuthenticator {
    pub fn guest_identity(&self) -> Identity {
        Identity::user(format!("guest-{}", Uuid::new_v4().simple()))
    }
}

#[async_trait]
impl Authenticator for GuestAuthenticator {
    async fn authenticate(&self, _payload: &str) -> Result<Option<Identity>> {
        Ok(Some(self.guest_identity()))
    }
}

/// One authenticator variant, tagged by the scheme it serves.
pub enum AuthenticationService {
    ApiKey(ApiKeyAuthenticator),
    BearerToken(TokenAuthenticator),
    CookieToken(TokenAuthenticator),
    Guest(GuestAuthenticator),
}

#[async_trait]
impl Authenticator for AuthenticationService {
    async fn authenticate(&self, payload: &str) -> Result<Option<Identity>> {
        match self {
            AuthenticationService::ApiKey(inner) => inner.authenticate(payload).await,
            AuthenticationService::BearerToken(inner) | AuthenticationService::CookieToken(inner) => inner.authenticate(payload).await,
            AuthenticationService::Guest(inner) => inner.authenticate(payload).await,
        }
    }
}

/// Selects the authenticator for a credential scheme. Built once at startup.
pub struct AuthenticatorFactory {
    services: Vec<(CredentialScheme, AuthenticationService)>,
    guest: Option<GuestAuthenticator>,
}

impl AuthenticatorFactory {
    pub fn new(
        config: &AuthConfig,
        api_keys: Arc<dyn ApiKeyStore>,
        settings: Arc<dyn SecretResolver>,
        codec: Arc<dyn TokenCodec>,
    ) -> Result<Self> {
        if config.disabled {
            warn!("Authentication is DISABLED: every request is served as a guest. Never run this in production.");
            return Ok(Self {
                services: Vec::new(),
                guest: Some(GuestAuthenticator),
            });
        }

        if config.supported_methods.is_empty() {
            return Err(Error::Configuration {
                message: "auth.supported_methods must not be empty while authentication is enabled".to_string(),
            });
        }

        let mut services = Vec::new();
        for scheme in CredentialScheme::ALL {
            if !config.supported_methods.contains(&scheme) {
                continue;
            }
            let service = match scheme {
                CredentialScheme::ApiKey => AuthenticationService::ApiKey(ApiKeyAuthenticator::new(api_keys.clone())),
                CredentialScheme::BearerToken => AuthenticationService::BearerToken(TokenAuthenticator::bearer(settings.clone(), codec.clone())),
                CredentialScheme::CookieToken => AuthenticationService::CookieToken(TokenAuthenticator::cookie(settings.clone(), codec.clone())),
            };
            services.push((scheme, service));
        }

        Ok(Self { services, guest: None })
    }

    /// Whether authentication is disabled process-wide.
    pub fn guest(&self) -> Option<&GuestAuthenticator> {
        self.guest.as_ref()
    }

    pub fn get(&self, scheme: CredentialScheme) -> Result<&AuthenticationService> {
        self.services
            .iter()
            .find(|(supported, _)| *supported == scheme)
            .map(|(_, service)| service)
            .ok_or_else(|| Error::Configuration {
                message: format!("authentication method '{scheme}' is not supported"),
            })
    }

    /// Check that token schemes can resolve a usable signing secret.
    pub async fn check_secrets(&self) -> Result<()> {
        for (_, service) in &self.services {
            if let AuthenticationService::BearerToken(inner) | AuthenticationService::CookieToken(inner) = service {
                inner.secret().await?;
            }
        }
        Ok(())
    }
}
