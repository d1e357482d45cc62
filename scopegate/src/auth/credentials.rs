//! Extraction of raw credentials from inbound request headers.
//!
//! One attempt is made per known scheme:
//! - API key: the `X-Api-Key` header (name configurable)
//! - Bearer token: `Authorization: Bearer <token>`
//! - Cookie token: the `access_token` cookie (name configurable)
//!
//! Only schemes enabled in configuration are consulted. Presenting more than one kind of
//! credential is rejected outright; there is no precedence between schemes.

use axum::http::{HeaderMap, HeaderName, header};
use tracing::{instrument, trace};

use crate::{
    config::AuthConfig,
    errors::{Error, Result},
    types::{Credential, CredentialScheme},
};

/// `WWW-Authenticate` challenge advertised for a scheme.
pub fn challenge(scheme: CredentialScheme) -> String {
    match scheme {
        CredentialScheme::ApiKey => r#"Api-Key realm="main""#.to_string(),
        CredentialScheme::BearerToken => r#"Bearer realm="main""#.to_string(),
        CredentialScheme::CookieToken => r#"Cookie realm="main""#.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct CredentialExtractor {
    api_key_header: HeaderName,
    cookie_name: String,
    supported: Vec<CredentialScheme>,
}

impl CredentialExtractor {
    pub fn new(config: &AuthConfig) -> Result<Self> {
        let api_key_header = HeaderName::try_from(config.api_key_header.as_str()).map_err(|e| Error::Configuration {
            message: format!("invalid API key header name '{}': {e}", config.api_key_header),
        })?;

        // Keep a fixed order so challenges and error messages are stable.
        let supported = CredentialScheme::ALL
            .into_iter()
            .filter(|scheme| config.supported_methods.contains(scheme))
            .collect();

        Ok(Self {
            api_key_header,
            cookie_name: config.cookie_name.clone(),
            supported,
        })
    }

    pub fn supported(&self) -> &[CredentialScheme] {
        &self.supported
    }

    /// Challenges for every supported scheme, in extraction order.
    pub fn challenges(&self) -> Vec<String> {
        self.supported.iter().copied().map(challenge).collect()
    }

    /// One credential per supported scheme; `value` is `None` where nothing was presented.
    ///
    /// Header bytes that are not valid UTF-8 are decoded lossily. Such a value still counts as
    /// presented, and simply fails to authenticate.
    pub fn extract(&self, headers: &HeaderMap) -> Vec<Credential> {
        self.supported
            .iter()
            .map(|&scheme| {
                let value = match scheme {
                    CredentialScheme::ApiKey => self.api_key(headers),
                    CredentialScheme::BearerToken => bearer_token(headers),
                    CredentialScheme::CookieToken => self.cookie_token(headers),
                };
                Credential { scheme, value }
            })
            .collect()
    }

    /// Extract, then enforce the single-credential policy.
    ///
    /// Returns `Ok(None)` when no credential was presented and
    /// [`Error::TooManyCredentials`] when more than one was.
    #[instrument(skip_all)]
    pub fn single(&self, headers: &HeaderMap) -> Result<Option<Credential>> {
        let mut presented: Vec<Credential> = self.extract(headers).into_iter().filter(Credential::is_present).collect();

        match presented.len() {
            0 => {
                trace!("No credentials presented");
                Ok(None)
            }
            1 => {
                let credential = presented.remove(0);
                trace!("Presented credential scheme: {}", credential.scheme);
                Ok(Some(credential))
            }
            _ => Err(Error::TooManyCredentials {
                provided: presented.iter().map(|c| c.scheme).collect(),
                challenges: self.challenges(),
            }),
        }
    }

    fn api_key(&self, headers: &HeaderMap) -> Option<String> {
        let value = header_text(headers, &self.api_key_header)?;
        let value = value.trim();
        (!value.is_empty()).then(|| value.to_string())
    }

    /// Cookies are split on raw bytes, so unrelated cookies carrying non-ASCII values are skipped.
    fn cookie_token(&self, headers: &HeaderMap) -> Option<String> {
        let name = self.cookie_name.as_bytes();
        for cookie_header in headers.get_all(header::COOKIE) {
            for cookie in cookie_header.as_bytes().split(|&b| b == b';') {
                let cookie = cookie.trim_ascii();
                let Some(eq) = cookie.iter().position(|&b| b == b'=') else {
                    continue;
                };
                let (cookie_name, value) = (&cookie[..eq], &cookie[eq + 1..]);
                if cookie_name == name && !value.is_empty() {
                    return Some(String::from_utf8_lossy(value).into_owned());
                }
            }
        }
        None
    }
}

fn header_text(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    headers.get(name).map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
}

/// `Authorization: Bearer <token>`; other authorization schemes are ignored.
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let auth = header_text(headers, &header::AUTHORIZATION)?;
    let (scheme, token) = auth.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}
