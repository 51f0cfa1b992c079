use std::env;

use anyhow::{Context, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
    Test,
}

impl AppEnv {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "development" | "dev" => Some(AppEnv::Development),
            "production" | "prod" => Some(AppEnv::Production),
            "test" => Some(AppEnv::Test),
            _ => None,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, AppEnv::Production)
    }
}

/// Application configuration loaded from environment variables.
/// Contains secrets and deployment-specific values only.
#[derive(Debug, Clone)]
pub struct Config {
    pub app_env: AppEnv,

    // Web server
    pub host: String,
    pub port: u16,
    pub frontend_url: String,

    // Database
    pub database_url: String,

    // Sessions
    pub session_secret: String,

    // Identity provider
    pub identity_api_key: String,
    pub identity_admin_token: Option<String>,

    // Media catalog
    pub tmdb_api_key: String,
    pub tmdb_base_url: String,

    // Operator alerts
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let app_env = match env::var("APP_ENV") {
            Ok(v) => AppEnv::parse(&v).with_context(|| format!("APP_ENV has unknown value {v:?}"))?,
            Err(_) => AppEnv::Development,
        };

        let config = Self {
            app_env,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3001".to_string())
                .parse()
                .context("PORT must be a number")?,
            frontend_url: required_env("FRONTEND_URL")?,
            database_url: required_env("DATABASE_URL")?,
            session_secret: required_env("SESSION_SECRET")?,
            identity_api_key: required_env("IDENTITY_API_KEY")?,
            identity_admin_token: optional_env("IDENTITY_ADMIN_TOKEN"),
            tmdb_api_key: required_env("TMDB_API_KEY")?,
            tmdb_base_url: env::var("TMDB_BASE_URL")
                .unwrap_or_else(|_| "https://api.themoviedb.org/3".to_string()),
            telegram_bot_token: optional_env("TELEGRAM_BOT_TOKEN"),
            telegram_chat_id: optional_env("TELEGRAM_CHAT_ID"),
        };

        config.log_keys();
        Ok(config)
    }

    /// Allowed CORS origin with any trailing slash removed.
    pub fn normalized_frontend_url(&self) -> &str {
        self.frontend_url.trim_end_matches('/')
    }

    fn log_keys(&self) {
        fn preview(val: &str) -> String {
            let n = val.len().min(5);
            format!("{}...({} chars)", &val[..n], val.len())
        }
        fn preview_opt(val: &Option<String>) -> String {
            match val {
                Some(v) if !v.is_empty() => preview(v),
                _ => "<not set>".to_string(),
            }
        }

        tracing::info!("Config loaded ({:?}):", self.app_env);
        tracing::info!("  FRONTEND_URL: {}", self.frontend_url);
        tracing::info!("  SESSION_SECRET: {}", preview(&self.session_secret));
        tracing::info!("  IDENTITY_API_KEY: {}", preview(&self.identity_api_key));
        tracing::info!("  IDENTITY_ADMIN_TOKEN: {}", preview_opt(&self.identity_admin_token));
        tracing::info!("  TMDB_API_KEY: {}", preview(&self.tmdb_api_key));
        tracing::info!("  TELEGRAM_BOT_TOKEN: {}", preview_opt(&self.telegram_bot_token));
    }
}

fn required_env(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{key} environment variable is required"))
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
