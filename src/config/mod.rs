//! Configuration loading and management.
//!
//! Loads bot configuration from `./doorman.toml` (or `$DOORMAN_CONFIG_PATH`).
//! Environment variables override file values; file values override defaults.
//!
//! Precedence: env vars > config file > defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

// ── Top-level config ────────────────────────────────────────────

/// Top-level Doorman configuration loaded from TOML.
///
/// Path: `./doorman.toml` or `$DOORMAN_CONFIG_PATH`.
/// Env vars override file values; file values override defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bot identity and logging settings (`[bot]`).
    pub bot: BotConfig,
    /// New-member verification settings (`[verification]`).
    pub verification: VerificationConfig,
    /// Outbound message text templates (`[messages]`).
    pub messages: MessagesConfig,
    /// Content blacklist (`[blacklist]`).
    pub blacklist: BlacklistConfig,
}

impl Config {
    /// Load configuration with precedence: env vars > TOML file > defaults.
    ///
    /// An explicit `path` (from the CLI) takes priority over
    /// `$DOORMAN_CONFIG_PATH`. A missing file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::load_from_file(path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from TOML file only, no env overrides.
    fn load_from_file(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path_with(|key| std::env::var(key).ok()),
        };
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                tracing::info!(path = %path.display(), "loading config from file");
                let config: Config =
                    toml::from_str(&contents).context("failed to parse config TOML")?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("no config file found, using defaults");
                Ok(Config::default())
            }
            Err(e) => Err(anyhow::anyhow!("failed to read config file: {e}")),
        }
    }

    /// Resolve the config file path using a custom env resolver (for testing).
    fn config_path_with(env: impl Fn(&str) -> Option<String>) -> PathBuf {
        match env("DOORMAN_CONFIG_PATH") {
            Some(p) => PathBuf::from(p),
            None => PathBuf::from("doorman.toml"),
        }
    }

    /// Apply environment variable overrides (env > config > defaults).
    ///
    /// Takes a resolver function for testability (avoids unsafe `set_var` in
    /// tests).
    fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("DOORMAN_BOT_TOKEN") {
            self.bot.token = Some(v);
        }
        if let Some(v) = env("DOORMAN_LOG_LEVEL") {
            self.bot.log_level = v;
        }
        if let Some(v) = env("DOORMAN_LOGS_DIR") {
            self.bot.logs_dir = Some(v);
        }
        if let Some(v) = env("DOORMAN_VERIFY_TIMEOUT_MS") {
            match v.parse() {
                Ok(n) => self.verification.timeout_ms = n,
                Err(_) => tracing::warn!(
                    var = "DOORMAN_VERIFY_TIMEOUT_MS",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }
        if let Some(v) = env("DOORMAN_DELETE_DELAY_MS") {
            match v.parse() {
                Ok(n) => self.verification.delete_delay_ms = n,
                Err(_) => tracing::warn!(
                    var = "DOORMAN_DELETE_DELAY_MS",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }
        if let Some(v) = env("DOORMAN_GREETING") {
            self.verification.greeting = v;
        }
    }

    /// Parse a TOML string into config (for testing).
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(toml_str).context("failed to parse config TOML")?;
        Ok(config)
    }
}

// ── Bot config ──────────────────────────────────────────────────

/// Bot identity and logging settings (`[bot]`).
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Telegram bot token (or `$DOORMAN_BOT_TOKEN`).
    pub token: Option<String>,
    /// Tracing log level filter.
    pub log_level: String,
    /// Directory for rotated JSON log files; console-only when unset.
    pub logs_dir: Option<String>,
}

impl std::fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotConfig")
            .field("token", &self.token.as_ref().map(|_| "__REDACTED__"))
            .field("log_level", &self.log_level)
            .field("logs_dir", &self.logs_dir)
            .finish()
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: None,
            log_level: "info".to_string(),
            logs_dir: None,
        }
    }
}

// ── Verification config ─────────────────────────────────────────

/// New-member verification settings (`[verification]`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// How long a new member has to send the greeting, in milliseconds.
    pub timeout_ms: u64,
    /// Delay before housekeeping deletions of prompt/notice messages, in
    /// milliseconds.
    pub delete_delay_ms: u64,
    /// The greeting token a new member must send. Matched case-insensitively
    /// against the trimmed message text.
    pub greeting: String,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            delete_delay_ms: 10_000,
            greeting: "Hi".to_string(),
        }
    }
}

// ── Message templates ───────────────────────────────────────────

/// Outbound message text templates (`[messages]`).
///
/// Templates may reference `{name}`, `{group}`, `{seconds}` and `{greeting}`;
/// placeholders without a value in a given context are left untouched.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MessagesConfig {
    /// Welcome prompt sent when a member joins.
    pub welcome: String,
    /// Sent when a member verifies in time.
    pub success: String,
    /// Sent when the verification deadline fires.
    pub timeout_notice: String,
    /// Neutral reply to a greeting from a user with no pending verification.
    pub not_pending: String,
    /// Reply posted after a blacklisted message is removed.
    pub blacklist_warning: String,
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            welcome: "Welcome {name} to {group}!\nPlease send \"{greeting}\" within \
                      {seconds} seconds to verify, or you will be muted."
                .to_string(),
            success: "Verification passed, welcome to {group}!".to_string(),
            timeout_notice: "{name} did not complete verification for {group} and has been muted."
                .to_string(),
            not_pending: "Hey there".to_string(),
            blacklist_warning: "Inappropriate content detected, the message has been removed."
                .to_string(),
        }
    }
}

impl MessagesConfig {
    /// Render the welcome prompt for a joining member.
    pub fn render_welcome(&self, name: &str, group: &str, seconds: u64, greeting: &str) -> String {
        self.welcome
            .replace("{name}", name)
            .replace("{group}", group)
            .replace("{seconds}", &seconds.to_string())
            .replace("{greeting}", greeting)
    }

    /// Render the verification success message.
    pub fn render_success(&self, group: &str) -> String {
        self.success.replace("{group}", group)
    }

    /// Render the timeout notice.
    pub fn render_timeout_notice(&self, name: &str, group: &str) -> String {
        self.timeout_notice
            .replace("{name}", name)
            .replace("{group}", group)
    }
}

// ── Blacklist config ────────────────────────────────────────────

/// Content blacklist (`[blacklist]`).
///
/// See [`crate::moderation::blacklist`] for the pattern grammar.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BlacklistConfig {
    /// Raw patterns, compiled once at startup.
    pub patterns: Vec<String>,
}

// ── Tests ───────────────────────────────────────────────────────
