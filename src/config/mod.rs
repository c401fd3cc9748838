//! Configuration module - environment variable parsing
//!
//! Everything defaults to a workable local setup; only an inconsistent
//! combination (REQUIRE_AUTH without a token secret) is an error.
//! Gameplay tunables live beside their components as `Default`-ed config
//! structs, not here.

use std::env;
use std::net::SocketAddr;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS (comma-separated)
    pub client_origin: String,
    /// HMAC secret for identity tokens; absent means anonymous-only
    pub identity_token_secret: Option<String>,
    /// Reject upgrades that present no valid identity token
    pub require_auth: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT; fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let identity_token_secret = env::var("IDENTITY_TOKEN_SECRET").ok();

        let require_auth = env::var("REQUIRE_AUTH")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        if require_auth && identity_token_secret.is_none() {
            return Err(ConfigError::Missing("IDENTITY_TOKEN_SECRET"));
        }

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            client_origin: env::var("CLIENT_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),

            identity_token_secret,
            require_auth,
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
