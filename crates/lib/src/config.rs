//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.mail2bug/config.json`) and environment.
//! Secrets and allow-lists may come from env so they stay out of the file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::BridgeError;
use crate::resolver::{ResolutionConfig, ResolutionStrategy};

/// Env var holding the tracker personal access token.
pub const PAT_ENV: &str = "MAIL2BUG_PAT";
/// Env var overriding `access.allowedSenders`.
pub const ALLOWED_SENDERS_ENV: &str = "MAIL2BUG_ALLOWED_SENDERS";
/// Env var overriding `access.allowedRecipients`.
pub const ALLOWED_RECIPIENTS_ENV: &str = "MAIL2BUG_ALLOWED_RECIPIENTS";

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Webhook server settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Sender and recipient allow-lists.
    #[serde(default)]
    pub access: AccessConfig,

    /// Issue tracker target and project resolution.
    #[serde(default)]
    pub tracker: TrackerConfig,

    /// Audit record storage.
    #[serde(default)]
    pub audit: AuditConfig,
}

/// Gateway bind, port and webhook route.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for HTTP (default 15152).
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1").
    #[serde(default = "default_gateway_bind")]
    pub bind: String,

    /// Route the email provider posts to (default "/bugreport").
    #[serde(default = "default_webhook_path")]
    pub path: String,
}

fn default_gateway_port() -> u16 {
    15152
}

fn default_gateway_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_webhook_path() -> String {
    "/bugreport".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
            path: default_webhook_path(),
        }
    }
}

/// Allow-lists: comma/semicolon separated addresses or `@domain` entries. Absent means allow all.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessConfig {
    /// Overridden by MAIL2BUG_ALLOWED_SENDERS env.
    pub allowed_senders: Option<String>,
    /// Overridden by MAIL2BUG_ALLOWED_RECIPIENTS env.
    pub allowed_recipients: Option<String>,
}

/// Where tickets go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackerBackendKind {
    /// Create work items through the tracker REST API.
    #[default]
    Devops,
    /// Write tickets as JSON files (dry run).
    Directory,
}

/// Tracker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerConfig {
    #[serde(default)]
    pub backend: TrackerBackendKind,

    /// REST host (default "dev.azure.com").
    #[serde(default = "default_tracker_host")]
    pub host: String,

    /// URL scheme (default "https").
    #[serde(default = "default_tracker_scheme")]
    pub scheme: String,

    pub organization: Option<String>,

    /// When set, every ticket goes to this project.
    pub project: Option<String>,

    /// Fallback sources for the project: "recipient", "subject", "all" or "none"; combine with `|` or `,`.
    #[serde(default)]
    pub determine_project_via: ResolutionStrategy,

    /// Overridden by MAIL2BUG_PAT env.
    pub personal_access_token: Option<String>,

    /// Per-request timeout for the tracker call (default 30).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Output directory for the directory backend.
    pub directory: Option<PathBuf>,
}

fn default_tracker_host() -> String {
    "dev.azure.com".to_string()
}

fn default_tracker_scheme() -> String {
    "https".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            backend: TrackerBackendKind::default(),
            host: default_tracker_host(),
            scheme: default_tracker_scheme(),
            organization: None,
            project: None,
            determine_project_via: ResolutionStrategy::default(),
            personal_access_token: None,
            timeout_secs: default_timeout_secs(),
            directory: None,
        }
    }
}

/// Audit config. Without a directory, audit records are dropped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditConfig {
    pub directory: Option<PathBuf>,
}

/// Trimmed, non-empty value of an env var.
fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

fn non_blank(value: Option<&String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Resolve the personal access token: env MAIL2BUG_PAT overrides config.
pub fn resolve_personal_access_token(config: &Config) -> Option<String> {
    env_value(PAT_ENV).or_else(|| non_blank(config.tracker.personal_access_token.as_ref()))
}

/// Resolve the sender allow-list: env MAIL2BUG_ALLOWED_SENDERS overrides config.
pub fn resolve_allowed_senders(config: &Config) -> Option<String> {
    env_value(ALLOWED_SENDERS_ENV).or_else(|| non_blank(config.access.allowed_senders.as_ref()))
}

/// Resolve the recipient allow-list: env MAIL2BUG_ALLOWED_RECIPIENTS overrides config.
pub fn resolve_allowed_recipients(config: &Config) -> Option<String> {
    env_value(ALLOWED_RECIPIENTS_ENV)
        .or_else(|| non_blank(config.access.allowed_recipients.as_ref()))
}

/// True if the bind address is loopback (127.0.0.1, ::1, etc.).
pub fn is_loopback_bind(bind: &str) -> bool {
    let b = bind.trim();
    b == "127.0.0.1" || b == "::1" || b == "localhost"
}

/// Connection details for the REST tracker.
#[derive(Debug, Clone)]
pub struct DevOpsEndpoint {
    pub scheme: String,
    pub host: String,
    pub organization: String,
    pub personal_access_token: String,
    pub timeout: Duration,
}

/// Resolved tracker backend.
#[derive(Debug, Clone)]
pub enum TrackerTarget {
    DevOps(DevOpsEndpoint),
    Directory(PathBuf),
}

/// Runtime settings derived from [`Config`] and env; read-only for the process lifetime.
#[derive(Debug, Clone)]
pub struct Settings {
    pub allowed_senders: Option<String>,
    pub allowed_recipients: Option<String>,
    pub resolution: ResolutionConfig,
    pub tracker: TrackerTarget,
    pub audit_dir: Option<PathBuf>,
}

impl Settings {
    /// Validate the config and pull secrets from env. Missing secrets are a [`BridgeError::Configuration`].
    pub fn resolve(config: &Config) -> Result<Self, BridgeError> {
        let tracker = match config.tracker.backend {
            TrackerBackendKind::Devops => {
                let organization = non_blank(config.tracker.organization.as_ref()).ok_or_else(
                    || BridgeError::Configuration("tracker.organization is not set".to_string()),
                )?;
                let personal_access_token =
                    resolve_personal_access_token(config).ok_or_else(|| {
                        BridgeError::Configuration(format!(
                            "personal access token missing (set {} or tracker.personalAccessToken)",
                            PAT_ENV
                        ))
                    })?;
                TrackerTarget::DevOps(DevOpsEndpoint {
                    scheme: config.tracker.scheme.trim().to_string(),
                    host: config.tracker.host.trim().trim_end_matches('/').to_string(),
                    organization,
                    personal_access_token,
                    timeout: Duration::from_secs(config.tracker.timeout_secs),
                })
            }
            TrackerBackendKind::Directory => {
                let dir = config
                    .tracker
                    .directory
                    .clone()
                    .filter(|d| !d.as_os_str().is_empty())
                    .ok_or_else(|| {
                        BridgeError::Configuration(
                            "tracker.directory is required for the directory backend".to_string(),
                        )
                    })?;
                TrackerTarget::Directory(dir)
            }
        };
        Ok(Self {
            allowed_senders: resolve_allowed_senders(config),
            allowed_recipients: resolve_allowed_recipients(config),
            resolution: ResolutionConfig {
                explicit_project: non_blank(config.tracker.project.as_ref()),
                strategy: config.tracker.determine_project_via,
            },
            tracker,
            audit_dir: config
                .audit
                .directory
                .clone()
                .filter(|d| !d.as_os_str().is_empty()),
        })
    }
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("MAIL2BUG_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".mail2bug").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the given path (or the default). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}
