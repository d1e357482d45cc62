//! Per-route access enforcement.
//!
//! [`AuthGate`] runs the full check for a request: at most one credential (400), a credential
//! that authenticates (401 with challenges), then the route's required scopes (403 naming the
//! missing ones). Routes opt in with [`require_scopes`], which stores the resolved
//! [`Identity`] in request extensions for handlers to extract.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, request::Parts},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, instrument, trace};

use crate::{
    auth::{
        authentication::{Authenticator, AuthenticatorFactory},
        authorization::Authorizer,
        credentials::CredentialExtractor,
    },
    errors::{Error, Result},
    types::{Identity, Scope},
};

pub struct AuthGate {
    extractor: CredentialExtractor,
    authentication: AuthenticatorFactory,
    authorizer: Arc<dyn Authorizer>,
}

impl AuthGate {
    pub fn new(extractor: CredentialExtractor, authentication: AuthenticatorFactory, authorizer: Arc<dyn Authorizer>) -> Self {
        Self {
            extractor,
            authentication,
            authorizer,
        }
    }

    pub fn authorizer(&self) -> &Arc<dyn Authorizer> {
        &self.authorizer
    }

    pub fn authentication(&self) -> &AuthenticatorFactory {
        &self.authentication
    }

    fn unauthenticated(&self) -> Error {
        Error::Unauthenticated {
            accepted_schemes: self.extractor.supported().to_vec(),
            challenges: self.extractor.challenges(),
        }
    }

    /// Resolve the request's identity without checking scopes.
    #[instrument(skip_all)]
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<Identity> {
        // Ambiguous requests are rejected even when authentication is disabled
        let credential = self.extractor.single(headers)?;

        if let Some(guest) = self.authentication.guest() {
            let identity = guest.guest_identity();
            trace!("Authentication disabled, serving as {}", identity.uid);
            return Ok(identity);
        }

        let Some(credential) = credential else {
            debug!("No credential presented");
            return Err(self.unauthenticated());
        };
        let Some(payload) = credential.value.as_deref() else {
            return Err(self.unauthenticated());
        };

        match self.authentication.get(credential.scheme)?.authenticate(payload).await? {
            Some(identity) => Ok(identity),
            None => {
                debug!("Credential for scheme {} was not accepted", credential.scheme);
                Err(self.unauthenticated())
            }
        }
    }

    /// Authenticate, then require every scope in `required`. An empty list only authenticates.
    #[instrument(skip(self, headers))]
    pub async fn check(&self, headers: &HeaderMap, required: &[Scope]) -> Result<Identity> {
        let identity = self.authenticate(headers).await?;

        let missing = self.authorizer.missing_scopes(&identity, required).await?;
        if !missing.is_empty() {
            debug!("{} is missing scopes {:?}", identity.uid, missing);
            return Err(Error::MissingScopes { missing });
        }

        trace!("Access granted to {}", identity.uid);
        Ok(identity)
    }
}

/// Middleware state: the gate plus the scopes one route requires.
#[derive(Clone)]
pub struct ScopeGuard {
    gate: Arc<AuthGate>,
    required: Arc<[Scope]>,
}

impl ScopeGuard {
    pub fn new(gate: Arc<AuthGate>, required: &[&str]) -> Self {
        Self {
            gate,
            required: required.iter().map(|scope| scope.to_string()).collect(),
        }
    }
}

/// Reject the request unless it carries an identity holding every required scope.
pub async fn require_scopes(State(guard): State<ScopeGuard>, mut request: Request, next: Next) -> Result<Response> {
    let identity = guard.gate.check(request.headers(), &guard.required).await?;
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts.extensions.get::<Identity>().cloned().ok_or_else(|| Error::Internal {
            operation: "read identity: route is not guarded by require_scopes".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AuthConfig,
        directory::ApiKeyManagement,
        test_utils::{TestEnv, expired_token},
        types::{CredentialScheme, PrincipalType},
    };
    use axum::{Router, http::StatusCode, middleware::from_fn_with_state, routing::get};
    use axum_test::TestServer;

    fn scopes(items: &[&str]) -> Vec<Scope> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, value.parse().unwrap());
        }
        map
    }

    #[tokio::test]
    async fn test_two_credentials_are_rejected_before_authentication() {
        let env = TestEnv::new();
        let key = env.api_keys.create(vec![]).await.unwrap();
        let token = env.token_for("john@example.com");
        let bearer = format!("Bearer {token}");

        let result = env
            .gate
            .check(&headers(&[("x-api-key", key.api_key.as_str()), ("authorization", bearer.as_str())]), &[])
            .await;

        match result {
            Err(error @ Error::TooManyCredentials { .. }) => assert_eq!(error.status_code(), StatusCode::BAD_REQUEST),
            other => panic!("expected TooManyCredentials, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_credential_is_unauthenticated_with_challenges() {
        let env = TestEnv::new();
        match env.gate.check(&HeaderMap::new(), &[]).await {
            Err(Error::Unauthenticated {
                accepted_schemes,
                challenges,
            }) => {
                assert_eq!(accepted_schemes, CredentialScheme::ALL.to_vec());
                assert!(challenges.contains(&r#"Api-Key realm="main""#.to_string()));
                assert!(challenges.contains(&r#"Bearer realm="main""#.to_string()));
            }
            other => panic!("expected Unauthenticated, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_expired_and_unknown_credentials_are_unauthenticated() {
        let env = TestEnv::new();
        let bearer = format!("Bearer {}", expired_token("john@example.com", chrono::Duration::hours(1)));

        let result = env.gate.check(&headers(&[("authorization", bearer.as_str())]), &[]).await;
        assert!(matches!(result, Err(Error::Unauthenticated { .. })));

        let result = env.gate.check(&headers(&[("x-api-key", "sk-not-a-real-key")]), &[]).await;
        assert!(matches!(result, Err(Error::Unauthenticated { .. })));
    }

    #[tokio::test]
    async fn test_recently_expired_token_is_unauthenticated() {
        let env = TestEnv::new();
        for seconds in [1, 5, 30] {
            let bearer = format!("Bearer {}", expired_token("john@example.com", chrono::Duration::seconds(seconds)));
            let result = env.gate.check(&headers(&[("authorization", bearer.as_str())]), &[]).await;
            assert!(
                matches!(result, Err(Error::Unauthenticated { .. })),
                "token expired {seconds}s ago was accepted: {result:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_non_ascii_headers_do_not_block_authentication() {
        let env = TestEnv::new();
        let bearer = format!("Bearer {}", env.token_for("john@example.com"));
        let mut request = headers(&[("authorization", bearer.as_str())]);
        request.append("cookie", axum::http::HeaderValue::from_bytes("lang=sv; name=Åsa".as_bytes()).unwrap());

        let identity = env.gate.check(&request, &[]).await.unwrap();
        assert_eq!(identity, Identity::user("john@example.com"));

        let mut request = HeaderMap::new();
        request.append("x-api-key", axum::http::HeaderValue::from_bytes("sk-Åsa".as_bytes()).unwrap());
        let result = env.gate.check(&request, &[]).await;
        assert!(matches!(result, Err(Error::Unauthenticated { .. })), "got {result:?}");
    }

    #[tokio::test]
    async fn test_configured_leeway_tolerates_skew() {
        let mut auth = AuthConfig::default();
        auth.jwt.leeway = std::time::Duration::from_secs(60);
        let env = TestEnv::with_auth(auth);

        let bearer = format!("Bearer {}", expired_token("john@example.com", chrono::Duration::seconds(5)));
        let identity = env.gate.check(&headers(&[("authorization", bearer.as_str())]), &[]).await.unwrap();
        assert_eq!(identity.uid, "john@example.com");
    }

    #[tokio::test]
    async fn test_missing_scopes_are_named() {
        let env = TestEnv::new();
        env.grant("john@example.com", &["a"]).await;
        let bearer = format!("Bearer {}", env.token_for("john@example.com"));
        let request = headers(&[("authorization", bearer.as_str())]);

        match env.gate.check(&request, &scopes(&["a", "b"])).await {
            Err(Error::MissingScopes { missing }) => assert_eq!(missing, scopes(&["b"])),
            other => panic!("expected MissingScopes, got {other:?}"),
        }

        let identity = env.gate.check(&request, &scopes(&["a"])).await.unwrap();
        assert_eq!(identity, Identity::user("john@example.com"));
    }

    #[tokio::test]
    async fn test_empty_requirement_only_authenticates() {
        let env = TestEnv::new();
        let cookie = format!("access_token={}", env.token_for("nobody@example.com"));

        let identity = env.gate.check(&headers(&[("cookie", cookie.as_str())]), &[]).await.unwrap();
        assert_eq!(identity.uid, "nobody@example.com");
    }

    #[tokio::test]
    async fn test_api_key_resolves_application_with_key_scopes() {
        let env = TestEnv::new();
        let key = env.api_keys.create(scopes(&["collection.read"])).await.unwrap();

        let identity = env
            .gate
            .check(&headers(&[("x-api-key", key.api_key.as_str())]), &scopes(&["collection.read"]))
            .await
            .unwrap();
        assert_eq!(identity.principal_type, PrincipalType::Application);
        assert_eq!(identity.uid, key.revoke_id);
    }

    #[tokio::test]
    async fn test_disabled_authentication_serves_fresh_guests() {
        let env = TestEnv::with_auth(AuthConfig {
            disabled: true,
            ..Default::default()
        });

        let a = env.gate.check(&HeaderMap::new(), &scopes(&["settings.write"])).await.unwrap();
        let b = env.gate.check(&HeaderMap::new(), &scopes(&["settings.write"])).await.unwrap();
        assert_ne!(a.uid, b.uid);
        assert_eq!(a.principal_type, PrincipalType::User);

        let result = env
            .gate
            .check(&headers(&[("x-api-key", "sk-a"), ("cookie", "access_token=b")]), &[])
            .await;
        assert!(matches!(result, Err(Error::TooManyCredentials { .. })));
    }

    async fn whoami(identity: Identity) -> String {
        identity.uid
    }

    fn guarded_server(env: &TestEnv, required: &[&str]) -> TestServer {
        let guard = ScopeGuard::new(env.gate.clone(), required);
        let app = Router::new().route("/whoami", get(whoami).route_layer(from_fn_with_state(guard, require_scopes)));
        TestServer::new(app).unwrap()
    }

    #[tokio::test]
    async fn test_middleware_status_codes() {
        let env = TestEnv::new();
        env.grant("*@example.com", &["a"]).await;
        let token = env.token_for("john@example.com");
        let bearer = format!("Bearer {token}");

        let server = guarded_server(&env, &["a"]);

        let response = server.get("/whoami").await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        assert!(response.headers().get("www-authenticate").is_some());

        let response = server.get("/whoami").add_header("authorization", &bearer).await;
        response.assert_status_ok();
        response.assert_text("john@example.com");

        let response = server
            .get("/whoami")
            .add_header("authorization", &bearer)
            .add_header("x-api-key", "sk-abc")
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let strict = guarded_server(&env, &["a", "b"]);
        let response = strict.get("/whoami").add_header("authorization", &bearer).await;
        response.assert_status(StatusCode::FORBIDDEN);
        let body: serde_json::Value = response.json();
        assert_eq!(body["missing_scopes"], serde_json::json!(["b"]));
    }

    #[tokio::test]
    async fn test_unguarded_identity_extraction_fails() {
        let app = Router::new().route("/whoami", get(whoami));
        let server = TestServer::new(app).unwrap();
        server.get("/whoami").await.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    }
}
