//! Shared fixtures for unit and HTTP tests.

use axum_test::TestServer;
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::json;
use std::{sync::Arc, time::Duration};
use uuid::Uuid;

use crate::{
    AppState,
    auth::{
        build_gate,
        gate::AuthGate,
        session::{JwtCodec, UserClaims},
    },
    build_router,
    config::{AuthConfig, Config, JwtConfig},
    directory::{GroupManagement, InMemoryApiKeys, InMemoryGroups, NewGroup},
    settings::{API_KEY_HASH_SECRET, JWT_USER_SECRET, Settings},
};

pub const TEST_JWT_SECRET: &str = "test-secret-key-for-testing-only";
pub const TEST_HASH_SECRET: &str = "test-hash-secret-for-testing-only";

pub fn create_test_config() -> Config {
    let mut config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        ..Default::default()
    };
    config.settings.insert(JWT_USER_SECRET.key.to_string(), TEST_JWT_SECRET.to_string());
    config.settings.insert(API_KEY_HASH_SECRET.key.to_string(), TEST_HASH_SECRET.to_string());
    config
}

/// A token that expired `ago` in the past, otherwise valid.
pub fn expired_token(subject: &str, ago: ChronoDuration) -> String {
    let config = JwtConfig::default();
    let now = Utc::now();
    let claims = UserClaims {
        iss: config.issuer,
        sub: subject.to_string(),
        aud: config.audience,
        exp: (now - ago).timestamp(),
        iat: (now - ago - ChronoDuration::hours(1)).timestamp(),
        jti: Uuid::new_v4().to_string(),
        data: json!({}),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes())).unwrap()
}

/// In-memory stores wired to a gate, the way `Application::new` wires them.
pub struct TestEnv {
    pub config: Config,
    pub gate: Arc<AuthGate>,
    pub groups: Arc<InMemoryGroups>,
    pub api_keys: Arc<InMemoryApiKeys>,
    pub codec: Arc<JwtCodec>,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_auth(AuthConfig::default())
    }

    pub fn with_auth(auth: AuthConfig) -> Self {
        let mut config = create_test_config();
        config.auth = auth;

        let settings = Arc::new(Settings::with_overrides(&config.settings).unwrap());
        let groups = Arc::new(InMemoryGroups::new());
        let api_keys = Arc::new(InMemoryApiKeys::new(TEST_HASH_SECRET));
        let codec = Arc::new(JwtCodec::new(&config.auth.jwt));
        let gate = build_gate(&config.auth, groups.clone(), api_keys.clone(), settings, codec.clone()).unwrap();

        Self {
            config,
            gate: Arc::new(gate),
            groups,
            api_keys,
            codec,
        }
    }

    pub fn token_for(&self, subject: &str) -> String {
        self.codec
            .issue(subject, json!({}), TEST_JWT_SECRET, Duration::from_secs(600))
            .unwrap()
    }

    /// Create a group containing `member` that grants `scopes`.
    pub async fn grant(&self, member: &str, scopes: &[&str]) {
        self.groups
            .create_group(
                "test-owner@example.com",
                NewGroup {
                    label: format!("grant for {member}"),
                    members: vec![member.to_string()],
                    scopes: scopes.iter().map(|s| s.to_string()).collect(),
                    resources: Vec::new(),
                },
                None,
            )
            .await
            .unwrap();
    }

    pub fn server(&self) -> TestServer {
        let state = AppState::builder()
            .config(self.config.clone())
            .gate(self.gate.clone())
            .groups(self.groups.clone())
            .api_keys(self.api_keys.clone())
            .build();
        TestServer::new(build_router(state)).unwrap()
    }
}
