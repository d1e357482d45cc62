//! # scopegate: scope-based access control for HTTP services
//!
//! `scopegate` decides, for every inbound request, *who* is calling and *whether* they hold the
//! scopes the route requires. Callers present exactly one credential: an API key, a bearer
//! token, or a token cookie. Scopes are granted through groups whose member lists may contain
//! literal identifiers or `local@domain` wildcard patterns such as `*@example.com`.
//!
//! ## Request Flow
//!
//! Every guarded route runs the same sequence (see [`auth`]):
//!
//! 1. More than one credential presented: `400 Bad Request`
//! 2. No credential, or one that does not authenticate: `401 Unauthorized` with a
//!    `WWW-Authenticate` challenge for each supported scheme
//! 3. Authenticated but missing a required scope: `403 Forbidden` naming the missing scopes
//! 4. Otherwise the handler runs with the resolved [`Identity`](types::Identity)
//!
//! Group membership and API keys are read on every request, so changes apply immediately.
//!
//! ## Architecture
//!
//! - [`auth`]: credential extraction, authentication, authorization, and the route gate
//! - [`directory`]: group and API key stores the core reads from
//! - [`settings`]: runtime settings such as the token signing secret
//! - [`api`]: a small management API over the directory
//! - [`config`]: YAML + environment configuration
//!
//! ## Getting Started
//!
//! ```bash
//! SCOPEGATE_JWT_USER_SECRET=change-me scopegate -f config.yaml
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod crypto;
pub mod directory;
pub mod errors;
pub mod settings;
pub mod telemetry;
pub mod types;

#[cfg(test)]
mod test_utils;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
};
use bon::Builder;
pub use config::Config;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, debug, info, instrument};

use crate::{
    api::handlers,
    auth::{
        build_gate,
        gate::{AuthGate, ScopeGuard, require_scopes},
        session::JwtCodec,
    },
    config::SetupConfig,
    directory::{ApiKeyManagement, GroupManagement, InMemoryApiKeys, InMemoryGroups, NewGroup},
    errors::Result,
    settings::{API_KEY_HASH_SECRET, Settings},
    types::scopes,
};

/// Application state shared across all request handlers.
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub gate: Arc<AuthGate>,
    pub groups: Arc<dyn GroupManagement>,
    pub api_keys: Arc<dyn ApiKeyManagement>,
}

pub const DEFAULT_GROUP_ID: &str = "ff0000000000000000000000";
pub const ADMINS_GROUP_ID: &str = "ff0000000000000000000001";
/// Owner of the built-in groups when no admin is configured.
pub const SYSTEM_OWNER: &str = "system";

/// Create the built-in groups if they don't exist.
///
/// - `default`: every email-shaped user (`*@*`), no scopes
/// - `admins`: the configured admin (if any), every built-in scope
///
/// Both use fixed ids, so running this on every startup is idempotent.
#[instrument(skip_all)]
pub async fn setup_default_groups(groups: &dyn GroupManagement, setup: &SetupConfig) -> Result<()> {
    let owner = setup.admin.as_deref().unwrap_or(SYSTEM_OWNER);

    groups
        .create_group(
            owner,
            NewGroup {
                label: "default".to_string(),
                members: vec!["*@*".to_string()],
                ..Default::default()
            },
            Some(DEFAULT_GROUP_ID.to_string()),
        )
        .await?;

    groups
        .create_group(
            owner,
            NewGroup {
                label: "admins".to_string(),
                members: setup.admin.iter().cloned().collect(),
                scopes: scopes::ALL.iter().map(|scope| scope.to_string()).collect(),
                ..Default::default()
            },
            Some(ADMINS_GROUP_ID.to_string()),
        )
        .await?;

    match &setup.admin {
        Some(admin) => info!("Default groups ready, {} is an admin", admin),
        None => info!("Default groups ready; no setup.admin configured, admins group is empty"),
    }
    Ok(())
}

async fn healthz() -> &'static str {
    "OK"
}

/// Build the application router. Every `/api` route declares the scopes it requires.
pub fn build_router(state: AppState) -> Router {
    let gate = state.gate.clone();
    let guard = |required: &[&str]| ScopeGuard::new(gate.clone(), required);

    let api = Router::new()
        .route(
            "/auth/identity",
            get(handlers::auth::get_identity).route_layer(from_fn_with_state(guard(&[]), require_scopes)),
        )
        .route(
            "/apikey",
            get(handlers::api_keys::list_api_keys).route_layer(from_fn_with_state(guard(&[scopes::API_KEY_READ]), require_scopes)),
        )
        .route(
            "/apikey",
            post(handlers::api_keys::create_api_key).route_layer(from_fn_with_state(guard(&[scopes::API_KEY_WRITE]), require_scopes)),
        )
        .route(
            "/apikey/{revoke_id}",
            delete(handlers::api_keys::revoke_api_key)
                .route_layer(from_fn_with_state(guard(&[scopes::API_KEY_WRITE]), require_scopes)),
        )
        .route(
            "/groups",
            get(handlers::groups::list_groups).route_layer(from_fn_with_state(guard(&[scopes::GROUP_READ]), require_scopes)),
        )
        .route(
            "/groups",
            post(handlers::groups::create_group).route_layer(from_fn_with_state(guard(&[scopes::GROUP_WRITE]), require_scopes)),
        )
        .route(
            "/groups/{id}",
            get(handlers::groups::get_group).route_layer(from_fn_with_state(guard(&[scopes::GROUP_READ]), require_scopes)),
        )
        .route(
            "/groups/{id}",
            delete(handlers::groups::delete_group)
                .route_layer(from_fn_with_state(guard(&[scopes::GROUP_WRITE]), require_scopes)),
        )
        .route(
            "/groups/{id}/members",
            put(handlers::groups::set_group_members).route_layer(from_fn_with_state(guard(&[scopes::GROUP_WRITE]), require_scopes)),
        )
        .route(
            "/groups/{id}/scopes",
            put(handlers::groups::set_group_scopes).route_layer(from_fn_with_state(guard(&[scopes::GROUP_WRITE]), require_scopes)),
        );

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/api", api)
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting scopegate on {}:{} with auth {:?}", config.host, config.port, config.auth);

        let settings = Arc::new(Settings::with_overrides(&config.settings)?);
        settings.warn_on_default_secrets();

        let api_keys = Arc::new(InMemoryApiKeys::new(settings.resolve(API_KEY_HASH_SECRET.key)?));
        let groups = Arc::new(InMemoryGroups::new());
        setup_default_groups(groups.as_ref(), &config.setup).await?;

        let codec = Arc::new(JwtCodec::new(&config.auth.jwt));
        let gate = build_gate(&config.auth, groups.clone(), api_keys.clone(), settings, codec)?;
        // Fail at startup, not on the first request
        gate.authentication().check_secrets().await?;

        let state = AppState::builder()
            .config(config.clone())
            .gate(Arc::new(gate))
            .groups(groups)
            .api_keys(api_keys)
            .build();

        Ok(Self {
            router: build_router(state),
            config,
        })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("scopegate listening on http://{}", bind_addr);

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("scopegate stopped");
        Ok(())
    }
}
