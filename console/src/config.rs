//! Configuration for the clan console.

use config::{Config as ConfigLoader, Environment, File};
use serde::Deserialize;

use crate::error::{Error, Result};

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub supabase: SupabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub preferences: PreferencesConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Hosted identity/data service endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://xyzcompany.supabase.co`
    #[serde(default)]
    pub url: String,
    /// Publishable (anon) key sent as the `apikey` header.
    #[serde(default)]
    pub publishable_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// OAuth provider name passed to the identity provider (default: discord)
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Where the provider sends the browser after sign-in.
    #[serde(default = "default_redirect_to")]
    pub redirect_to: String,
    /// Refresh token used to restore a session on start.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            redirect_to: default_redirect_to(),
            refresh_token: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PreferencesConfig {
    /// JSON file holding client-local preferences.
    #[serde(default = "default_preferences_path")]
    pub path: String,
}

impl Default for PreferencesConfig {
    fn default() -> Self {
        Self {
            path: default_preferences_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// Default values
fn default_provider() -> String {
    "discord".to_string()
}
fn default_redirect_to() -> String {
    "http://localhost:5173/".to_string()
}
fn default_preferences_path() -> String {
    "./data/preferences.json".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Configuration sources (in order of precedence):
    /// 1. Environment variables (CLAN__SECTION__KEY format)
    /// 2. console.toml file (if present)
    /// 3. Built-in defaults
    pub fn load() -> Result<Self> {
        let loader = ConfigLoader::builder()
            .set_default("auth.provider", default_provider())?
            .set_default("auth.redirect_to", default_redirect_to())?
            .set_default("preferences.path", default_preferences_path())?
            .set_default("logging.level", default_log_level())?
            .add_source(File::with_name("console").required(false))
            .add_source(
                Environment::with_prefix("CLAN")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = loader.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.supabase.url.trim().is_empty() || self.supabase.publishable_key.trim().is_empty() {
            return Err(Error::Config(
                "Missing supabase.url or supabase.publishable_key (set CLAN__SUPABASE__URL and CLAN__SUPABASE__PUBLISHABLE_KEY)"
                    .to_string(),
            ));
        }
        Ok(())
    }
}
