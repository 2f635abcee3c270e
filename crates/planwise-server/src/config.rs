//! Configuration file management for planwise.
//!
//! Provides a TOML-based config file at `~/.config/planwise/config.toml` and
//! a resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use planwise_core::llm::{BackoffPolicy, CompletionConfig, DEFAULT_MODEL_CANDIDATES};
use planwise_db::config::DbConfig;

pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_TIME_ZONE: &str = "America/New_York";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    pub database: DatabaseSection,
    #[serde(default)]
    pub ai: AiSection,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub app: AppSection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseSection {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AiSection {
    /// Gemini API key. `GEMINI_API_KEY` takes precedence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Candidate models, highest preference first.
    pub models: Vec<String>,
    pub max_attempts_per_model: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_ms: u64,
}

impl Default for AiSection {
    fn default() -> Self {
        let backoff = BackoffPolicy::default();
        Self {
            api_key: None,
            models: DEFAULT_MODEL_CANDIDATES.iter().map(|m| m.to_string()).collect(),
            max_attempts_per_model: CompletionConfig::DEFAULT_MAX_ATTEMPTS_PER_MODEL,
            base_delay_ms: backoff.base_delay.as_millis() as u64,
            max_delay_ms: backoff.max_delay.as_millis() as u64,
            jitter_ms: backoff.jitter.as_millis() as u64,
        }
    }
}

impl AiSection {
    pub fn completion_config(&self) -> CompletionConfig {
        CompletionConfig {
            candidates: self.models.clone(),
            max_attempts_per_model: self.max_attempts_per_model,
            backoff: BackoffPolicy {
                base_delay: Duration::from_millis(self.base_delay_ms),
                max_delay: Duration::from_millis(self.max_delay_ms),
                jitter: Duration::from_millis(self.jitter_ms),
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSection {
    /// Time zone assumed for quick-add requests that do not name one.
    pub time_zone: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            time_zone: DEFAULT_TIME_ZONE.to_string(),
        }
    }
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the planwise config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/planwise` or
/// `~/.config/planwise`, also on macOS.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("planwise");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("planwise")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load the config file if there is one. Only a missing file counts as
/// absent; an unreadable or malformed file is an error.
pub fn load_config_if_present() -> Result<Option<ConfigFile>> {
    let path = config_path();
    match std::fs::read_to_string(&path) {
        Ok(contents) => {
            let config: ConfigFile = toml::from_str(&contents)
                .with_context(|| format!("failed to parse config file at {}", path.display()))?;
            Ok(Some(config))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => {
            Err(e).with_context(|| format!("failed to read config file at {}", path.display()))
        }
    }
}

/// Serialize and write the config file, creating parent dirs as needed.
/// The file holds an API key, so it is made owner-only (0600) on Unix.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct PlanwiseConfig {
    pub db_config: DbConfig,
    pub api_key: Option<String>,
    pub completion: CompletionConfig,
    pub bind: String,
    pub port: u16,
    pub time_zone: String,
}

impl PlanwiseConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - DB URL: `cli_db_url` > `PLANWISE_DATABASE_URL` env > `[database].url` > `DbConfig::DEFAULT_URL`
    /// - API key: `GEMINI_API_KEY` env > `[ai].api_key` > none (checked by [`Self::require_api_key`])
    /// - Everything else: config file > built-in default
    pub fn resolve(cli_db_url: Option<&str>) -> Result<Self> {
        let file_config = load_config_if_present()?;

        let db_url = if let Some(url) = cli_db_url {
            url.to_string()
        } else if let Ok(url) = std::env::var("PLANWISE_DATABASE_URL") {
            url
        } else if let Some(ref cfg) = file_config {
            cfg.database.url.clone()
        } else {
            DbConfig::DEFAULT_URL.to_string()
        };

        let (ai, server, app) = match file_config {
            Some(cfg) => (cfg.ai, cfg.server, cfg.app),
            None => Default::default(),
        };

        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| ai.api_key.clone());

        if ai.models.is_empty() {
            bail!("[ai].models must name at least one model");
        }
        if ai.max_attempts_per_model == 0 {
            bail!("[ai].max_attempts_per_model must be at least 1");
        }

        Ok(Self {
            db_config: DbConfig::new(db_url),
            api_key,
            completion: ai.completion_config(),
            bind: server.bind,
            port: server.port,
            time_zone: app.time_zone,
        })
    }

    pub fn require_api_key(&self) -> Result<&str> {
        match self.api_key.as_deref() {
            Some(key) => Ok(key),
            None => bail!(
                "Gemini API key not found; set GEMINI_API_KEY or add api_key under [ai] in {}",
                config_path().display()
            ),
        }
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
