// ABOUTME: Configuration loading and validation for the support bridge.
// ABOUTME: Supports TOML config files with env expansion, or plain environment variables.

use crate::error::{BridgeError, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Top-level configuration structure for discord-zendesk-rs.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub discord: DiscordConfig,
    pub zendesk: ZendeskConfig,
    pub webhook: WebhookConfig,
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

/// Discord bot credentials.
#[derive(Clone, Deserialize)]
pub struct DiscordConfig {
    /// Bot token from the Discord developer portal.
    pub token: String,
}

impl std::fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Zendesk account and API settings.
#[derive(Clone, Deserialize)]
pub struct ZendeskConfig {
    /// Account subdomain, as in `<subdomain>.zendesk.com`.
    pub subdomain: String,
    /// Agent email used for API token authentication.
    pub email: String,
    /// API token paired with `email`.
    pub api_token: String,
    /// Override for the API root (defaults to `https://<subdomain>.zendesk.com/api/v2`).
    #[serde(default)]
    pub base_url: Option<String>,
    /// Domain for synthesized requester emails (`discord+<user_id>@<domain>`).
    #[serde(default = "default_requester_domain")]
    pub requester_domain: String,
    /// Per-request timeout for Zendesk calls.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl std::fmt::Debug for ZendeskConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZendeskConfig")
            .field("subdomain", &self.subdomain)
            .field("email", &self.email)
            .field("api_token", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("requester_domain", &self.requester_domain)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ZendeskConfig {
    /// Root URL of the Zendesk REST API, without a trailing slash.
    pub fn api_base_url(&self) -> String {
        match &self.base_url {
            Some(url) if !url.is_empty() => url.trim_end_matches('/').to_string(),
            _ => format!("https://{}.zendesk.com/api/v2", self.subdomain),
        }
    }
}

/// Inbound webhook listener settings.
#[derive(Clone, Deserialize)]
pub struct WebhookConfig {
    /// Expected HTTP Basic username.
    pub username: String,
    /// Expected HTTP Basic password.
    pub password: String,
    /// Address the listener binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
}

impl std::fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("listen_addr", &self.listen_addr)
            .finish()
    }
}

/// Bridge behavior configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    /// Public channel where new support requests are posted.
    pub intake_channel_id: u64,
}

/// Mapping store location.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

fn default_requester_domain() -> String {
    "yourtemporarydomain.com".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_store_path() -> PathBuf {
    PathBuf::from("tickets.db")
}

impl Config {
    /// Load configuration from a TOML file, or from the environment when no path is given.
    ///
    /// A `.env` file in the working directory is loaded first if present.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(env_path) => debug!(path = %env_path.display(), "Loaded .env file"),
            Err(e) if e.not_found() => {}
            Err(e) => warn!(error = %e, "Failed to load .env file"),
        }

        let config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::from_env()?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML config file, expanding `${VAR}` references from the environment.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::Config(format!("Failed to read config from {:?}: {}", path, e))
        })?;

        // Expand environment variables, warning on undefined vars.
        let contents = shellexpand::env_with_context_no_errors(&contents, |var: &str| {
            match std::env::var(var) {
                Ok(val) => Some(val),
                Err(_) => {
                    warn!(
                        variable = %var,
                        "Environment variable not defined, using empty string"
                    );
                    Some(String::new())
                }
            }
        });

        toml::from_str(&contents)
            .map_err(|e| BridgeError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Build configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key).ok_or_else(|| BridgeError::Config(format!("{} is required", key)))
        };

        let intake_raw = required("MAIN_CHANNEL_ID")?;
        let intake_channel_id = intake_raw.trim().parse::<u64>().map_err(|_| {
            BridgeError::Config(format!(
                "MAIN_CHANNEL_ID must be a numeric channel id, got {:?}",
                intake_raw
            ))
        })?;

        let listen_addr = match lookup("WEBHOOK_ADDR") {
            Some(raw) => raw.trim().parse::<SocketAddr>().map_err(|e| {
                BridgeError::Config(format!("WEBHOOK_ADDR is not a socket address: {}", e))
            })?,
            None => default_listen_addr(),
        };

        Ok(Self {
            discord: DiscordConfig {
                token: required("DISCORD_TOKEN")?,
            },
            zendesk: ZendeskConfig {
                subdomain: required("ZENDESK_SUBDOMAIN")?,
                email: required("ZENDESK_EMAIL")?,
                api_token: required("ZENDESK_TOKEN")?,
                base_url: lookup("ZENDESK_BASE_URL"),
                requester_domain: default_requester_domain(),
                timeout_secs: default_timeout_secs(),
            },
            webhook: WebhookConfig {
                username: required("WEBHOOK_USER")?,
                password: required("WEBHOOK_PASS")?,
                listen_addr,
            },
            bridge: BridgeConfig { intake_channel_id },
            store: StoreConfig {
                path: lookup("TICKETS_DB")
                    .map(PathBuf::from)
                    .unwrap_or_else(default_store_path),
            },
        })
    }

    /// Validate that required fields are present and properly formatted.
    pub fn validate(&self) -> Result<()> {
        if self.discord.token.is_empty() {
            return Err(BridgeError::Config("discord.token is required".into()));
        }
        if self.zendesk.subdomain.is_empty() && self.zendesk.base_url.is_none() {
            return Err(BridgeError::Config("zendesk.subdomain is required".into()));
        }
        if self.zendesk.email.is_empty() {
            return Err(BridgeError::Config("zendesk.email is required".into()));
        }
        if self.zendesk.api_token.is_empty() {
            return Err(BridgeError::Config("zendesk.api_token is required".into()));
        }
        if self.zendesk.timeout_secs == 0 {
            return Err(BridgeError::Config(
                "zendesk.timeout_secs must be greater than zero".into(),
            ));
        }
        if self.webhook.username.is_empty() || self.webhook.password.is_empty() {
            return Err(BridgeError::Config(
                "webhook.username and webhook.password are required".into(),
            ));
        }
        if self.bridge.intake_channel_id == 0 {
            return Err(BridgeError::Config(
                "bridge.intake_channel_id is required".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn full_env() -> HashMap<String, String> {
        env(&[
            ("DISCORD_TOKEN", "discord-token"),
            ("ZENDESK_SUBDOMAIN", "acme"),
            ("ZENDESK_EMAIL", "agent@acme.test"),
            ("ZENDESK_TOKEN", "zd-token"),
            ("MAIN_CHANNEL_ID", "1234567890"),
            ("WEBHOOK_USER", "hook"),
            ("WEBHOOK_PASS", "secret"),
        ])
    }

    #[test]
    fn test_from_lookup_defaults() {
        let vars = full_env();
        let config = Config::from_lookup(|k| vars.get(k).cloned()).unwrap();
        config.validate().unwrap();

        assert_eq!(config.bridge.intake_channel_id, 1234567890);
        assert_eq!(config.webhook.listen_addr.port(), 8080);
        assert_eq!(config.store.path, PathBuf::from("tickets.db"));
        assert_eq!(config.zendesk.requester_domain, "yourtemporarydomain.com");
        assert_eq!(
            config.zendesk.api_base_url(),
            "https://acme.zendesk.com/api/v2"
        );
    }

    #[test]
    fn test_from_lookup_missing_required() {
        let mut vars = full_env();
        vars.remove("WEBHOOK_PASS");
        let err = Config::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert!(err.to_string().contains("WEBHOOK_PASS"));
    }

    #[test]
    fn test_from_lookup_rejects_non_numeric_channel() {
        let mut vars = full_env();
        vars.insert("MAIN_CHANNEL_ID".into(), "general".into());
        let err = Config::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert!(err.to_string().contains("MAIN_CHANNEL_ID"));
    }

    #[test]
    fn test_from_lookup_custom_webhook_addr_and_store() {
        let mut vars = full_env();
        vars.insert("WEBHOOK_ADDR".into(), "127.0.0.1:9443".into());
        vars.insert("TICKETS_DB".into(), "/var/lib/bridge/tickets.db".into());
        let config = Config::from_lookup(|k| vars.get(k).cloned()).unwrap();

        assert_eq!(
            config.webhook.listen_addr,
            SocketAddr::from(([127, 0, 0, 1], 9443))
        );
        assert_eq!(config.store.path, PathBuf::from("/var/lib/bridge/tickets.db"));
    }

    #[test]
    fn test_from_lookup_rejects_bad_webhook_addr() {
        let mut vars = full_env();
        vars.insert("WEBHOOK_ADDR".into(), "localhost".into());
        let err = Config::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert!(err.to_string().contains("WEBHOOK_ADDR"));
    }

    #[test]
    fn test_base_url_override_trims_slash() {
        let mut vars = full_env();
        vars.insert("ZENDESK_BASE_URL".into(), "http://127.0.0.1:9999/".into());
        let config = Config::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(config.zendesk.api_base_url(), "http://127.0.0.1:9999");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let vars = full_env();
        let config = Config::from_lookup(|k| vars.get(k).cloned()).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("discord-token"));
        assert!(!rendered.contains("zd-token"));
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
