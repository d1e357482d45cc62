//! Runtime settings and secret resolution.
//!
//! Known settings are declared once in [`SETTINGS`] as `(key, default)` pairs. Values can be
//! overridden from configuration at startup or through [`Settings::set_setting`]; anything
//! not overridden resolves to its default. Unknown keys are a configuration error.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use tracing::warn;

use crate::errors::{Error, Result};

/// A known setting and the value it takes when nothing overrides it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingKey {
    pub key: &'static str,
    pub default: &'static str,
}

pub const JWT_USER_SECRET: SettingKey = SettingKey {
    key: "jwt.user_secret",
    default: "CHANGE THIS",
};
pub const JWT_EXPIRE_MINUTES: SettingKey = SettingKey {
    key: "jwt.expire_minutes",
    default: "600",
};
pub const REFRESH_TOKEN_EXPIRE_MINUTES: SettingKey = SettingKey {
    key: "refresh_token.expire_minutes",
    default: "43200", // 30 days
};
pub const API_KEY_HASH_SECRET: SettingKey = SettingKey {
    key: "api_key.hash_secret",
    default: "CHANGE THIS",
};

pub static SETTINGS: &[SettingKey] = &[JWT_USER_SECRET, JWT_EXPIRE_MINUTES, REFRESH_TOKEN_EXPIRE_MINUTES, API_KEY_HASH_SECRET];

/// Settings whose shipped default must never reach production.
static SECRET_SETTINGS: &[SettingKey] = &[JWT_USER_SECRET, API_KEY_HASH_SECRET];

pub fn lookup(key: &str) -> Option<&'static SettingKey> {
    SETTINGS.iter().find(|setting| setting.key == key)
}

/// Resolves named settings, e.g. the JWT signing secret.
#[async_trait]
pub trait SecretResolver: Send + Sync {
    async fn get_setting(&self, key: &str) -> Result<String>;
}

/// In-process settings store backed by the static table.
#[derive(Debug, Default)]
pub struct Settings {
    overrides: DashMap<&'static str, String>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from configuration overrides. Unknown keys are rejected.
    pub fn with_overrides(overrides: &HashMap<String, String>) -> Result<Self> {
        let settings = Self::new();
        for (key, value) in overrides {
            settings.set_setting(key, value.clone())?;
        }
        Ok(settings)
    }

    pub fn set_setting(&self, key: &str, value: String) -> Result<()> {
        let setting = lookup(key).ok_or_else(|| Error::Configuration {
            message: format!("unknown setting '{key}'"),
        })?;
        self.overrides.insert(setting.key, value);
        Ok(())
    }

    pub fn resolve(&self, key: &str) -> Result<String> {
        let setting = lookup(key).ok_or_else(|| Error::Configuration {
            message: format!("unknown setting '{key}'"),
        })?;
        Ok(self
            .overrides
            .get(setting.key)
            .map(|value| value.clone())
            .unwrap_or_else(|| setting.default.to_string()))
    }

    /// Log every secret still set to its shipped default. Returns the offending keys.
    pub fn warn_on_default_secrets(&self) -> Vec<&'static str> {
        let mut defaults = Vec::new();
        for setting in SECRET_SETTINGS {
            let is_default = self
                .overrides
                .get(setting.key)
                .is_none_or(|value| value.as_str() == setting.default);
            if is_default {
                warn!("Setting '{}' is using its built-in default; set it before going to production", setting.key);
                defaults.push(setting.key);
            }
        }
        defaults
    }
}

#[async_trait]
impl SecretResolver for Settings {
    async fn get_setting(&self, key: &str) -> Result<String> {
        self.resolve(key)
    }
}
