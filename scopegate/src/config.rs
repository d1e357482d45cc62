//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `SCOPEGATE_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `SCOPEGATE_` override YAML values
//! 3. **Secrets** - `SCOPEGATE_JWT_USER_SECRET` / `SCOPEGATE_API_KEY_HASH_SECRET` override the
//!    matching entries of `settings`
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `SCOPEGATE_AUTH__DISABLED=true` sets the `auth.disabled` field.
//!
//! ## Configuration Structure
//!
//! - **Server**: `host`, `port`
//! - **Logging**: `log.format` (`pretty` or `json`); levels come from `RUST_LOG`
//! - **Authentication**: `auth.disabled`, `auth.supported_methods`, `auth.api_key_header`,
//!   `auth.cookie_name`, `auth.jwt`
//! - **Settings**: `settings` - overrides for runtime settings such as `jwt.user_secret`
//! - **Setup**: `setup.admin` - member of the built-in admins group created at startup
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! SCOPEGATE_PORT=8080
//! SCOPEGATE_AUTH__SUPPORTED_METHODS='[api_key, bearer_token]'
//! SCOPEGATE_JWT_USER_SECRET=change-me
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, time::Duration};

use crate::{
    auth::pattern::{is_valid_member_pattern, is_wildcard_member_pattern},
    errors::Error,
    settings::{API_KEY_HASH_SECRET, JWT_EXPIRE_MINUTES, JWT_USER_SECRET, REFRESH_TOKEN_EXPIRE_MINUTES, lookup},
    types::CredentialScheme,
};

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "SCOPEGATE_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    pub log: LogConfig,
    pub auth: AuthConfig,
    /// Overrides for known runtime settings, keyed by setting name (e.g. `jwt.expire_minutes`)
    pub settings: HashMap<String, String>,
    pub setup: SetupConfig,
    /// Shortcut for `settings["jwt.user_secret"]`, meant for `SCOPEGATE_JWT_USER_SECRET`
    #[serde(skip_serializing)]
    pub jwt_user_secret: Option<String>,
    /// Shortcut for `settings["api_key.hash_secret"]`, meant for `SCOPEGATE_API_KEY_HASH_SECRET`
    #[serde(skip_serializing)]
    pub api_key_hash_secret: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            log: LogConfig::default(),
            auth: AuthConfig::default(),
            settings: HashMap::new(),
            setup: SetupConfig::default(),
            jwt_user_secret: None,
            api_key_hash_secret: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    pub format: LogFormat,
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// Serve every request as a fresh guest with every scope. Local development only.
    pub disabled: bool,
    /// Credential schemes accepted on requests
    pub supported_methods: Vec<CredentialScheme>,
    /// Header carrying API keys
    pub api_key_header: String,
    /// Cookie carrying user tokens
    pub cookie_name: String,
    pub jwt: JwtConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            disabled: false,
            supported_methods: CredentialScheme::ALL.to_vec(),
            api_key_header: "x-api-key".to_string(),
            cookie_name: "access_token".to_string(),
            jwt: JwtConfig::default(),
        }
    }
}

/// User token validation parameters. Token lifetime is the `jwt.expire_minutes` setting.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct JwtConfig {
    pub issuer: String,
    pub audience: String,
    /// Clock skew tolerated when checking expiry. Zero unless configured.
    #[serde(with = "humantime_serde")]
    pub leeway: Duration,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            issuer: "scopegate".to_string(),
            audience: "scopegate".to_string(),
            leeway: Duration::ZERO,
        }
    }
}

/// Bootstrap data created at startup.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SetupConfig {
    /// Identity added to the built-in admins group. Without it, the group starts empty.
    pub admin: Option<String>,
}

impl Config {
    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            .merge(Env::prefixed("SCOPEGATE_").ignore(&["config"]).split("__"))
    }

    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let mut config: Self = Self::figment(args).extract()?;

        if let Some(secret) = config.jwt_user_secret.take() {
            config.settings.insert(JWT_USER_SECRET.key.to_string(), secret);
        }
        if let Some(secret) = config.api_key_hash_secret.take() {
            config.settings.insert(API_KEY_HASH_SECRET.key.to_string(), secret);
        }

        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        let invalid = |message: String| Err(Error::Configuration { message });

        if !self.auth.disabled && self.auth.supported_methods.is_empty() {
            return invalid("auth.supported_methods must list at least one method while authentication is enabled".to_string());
        }
        if axum::http::HeaderName::try_from(self.auth.api_key_header.as_str()).is_err() {
            return invalid(format!("auth.api_key_header '{}' is not a valid header name", self.auth.api_key_header));
        }
        if self.auth.cookie_name.is_empty() || self.auth.cookie_name.contains([';', '=', ' ']) {
            return invalid(format!("auth.cookie_name '{}' is not a valid cookie name", self.auth.cookie_name));
        }
        if self.auth.jwt.issuer.is_empty() || self.auth.jwt.audience.is_empty() {
            return invalid("auth.jwt.issuer and auth.jwt.audience must not be empty".to_string());
        }

        for (key, value) in &self.settings {
            if lookup(key).is_none() {
                return invalid(format!("unknown setting '{key}'"));
            }
            if (key == JWT_EXPIRE_MINUTES.key || key == REFRESH_TOKEN_EXPIRE_MINUTES.key) && !matches!(value.parse::<u64>(), Ok(n) if n > 0) {
                return invalid(format!("setting '{key}' must be a positive number of minutes, got '{value}'"));
            }
        }

        if let Some(admin) = &self.setup.admin
            && (!is_valid_member_pattern(admin) || is_wildcard_member_pattern(admin))
        {
            return invalid(format!("setup.admin '{admin}' must be a literal user id such as admin@example.com"));
        }

        Ok(())
    }
}
