use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, StargazeError};

/// Environment variable holding the completion service bearer credential.
pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

/// Top-level configuration for the Stargaze service.
///
/// Loaded from `~/.stargaze/config.toml` by default. Every section is
/// optional in the file and falls back to its defaults. Secrets are never
/// stored here; the completion credential comes from [`API_KEY_ENV`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StargazeConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub archives: ArchiveConfig,
    #[serde(default)]
    pub conversation: ConversationConfig,
}

impl StargazeConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: StargazeConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| StargazeError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Reject values the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.conversation.max_users == 0 {
            return Err(StargazeError::Config(
                "conversation.max_users must be at least 1".to_string(),
            ));
        }
        if self.conversation.max_turns < 2 {
            return Err(StargazeError::Config(
                "conversation.max_turns must be at least 2".to_string(),
            ));
        }
        if self.server.max_query_chars == 0 {
            return Err(StargazeError::Config(
                "server.max_query_chars must be at least 1".to_string(),
            ));
        }
        if self.server.default_user.trim().is_empty() {
            return Err(StargazeError::Config(
                "server.default_user must not be empty".to_string(),
            ));
        }
        if self.completion.timeout_secs == 0 || self.archives.timeout_secs == 0 {
            return Err(StargazeError::Config(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind.
    pub bind_address: String,
    /// API server port.
    pub port: u16,
    /// Origins allowed by CORS (the web frontend).
    pub cors_origins: Vec<String>,
    /// Maximum requests per second across all clients.
    pub rate_limit_per_sec: u64,
    /// Maximum length of `user_query` in characters.
    pub max_query_chars: usize,
    /// Conversation key used for every request (there is no session model).
    pub default_user: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 8000,
            cors_origins: vec!["http://localhost:5173".to_string()],
            rate_limit_per_sec: 20,
            max_query_chars: 2000,
            default_user: "default_user".to_string(),
        }
    }
}

/// Completion service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Chat completions endpoint.
    pub endpoint: String,
    /// Model identifier sent with every request.
    pub model: String,
    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
    /// Output budget for classification (one word expected).
    pub classify_max_tokens: u32,
    /// Output budget for exoplanet SQL generation.
    pub sql_max_tokens: u32,
    /// Output budget for Gaia ADQL generation.
    pub adql_max_tokens: u32,
    /// Output budget for general answers.
    pub general_max_tokens: u32,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://openrouter.ai/api/v1/chat/completions".to_string(),
            model: "anthropic/claude-3-sonnet".to_string(),
            timeout_secs: 30,
            classify_max_tokens: 5,
            sql_max_tokens: 150,
            adql_max_tokens: 200,
            general_max_tokens: 300,
        }
    }
}

/// Remote archive endpoints and timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// NASA Exoplanet Archive TAP sync endpoint.
    pub exoplanet_url: String,
    /// ESA Gaia TAP+ sync endpoint.
    pub gaia_url: String,
    /// NASA image library search endpoint.
    pub image_search_url: String,
    /// Timeout for tabular archive queries in seconds.
    pub timeout_secs: u64,
    /// Timeout for the image search call in seconds.
    pub image_timeout_secs: u64,
    /// Timeout for probing a candidate image URL in seconds.
    pub image_probe_timeout_secs: u64,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            exoplanet_url: "https://exoplanetarchive.ipac.caltech.edu/TAP/sync".to_string(),
            gaia_url: "https://gea.esac.esa.int/tap-server/tap/sync".to_string(),
            image_search_url: "https://images-api.nasa.gov/search".to_string(),
            timeout_secs: 60,
            image_timeout_secs: 10,
            image_probe_timeout_secs: 5,
        }
    }
}

/// Conversation store bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Maximum number of user histories kept; least recently used are evicted.
    pub max_users: usize,
    /// Maximum turns kept per history; oldest turns are dropped.
    pub max_turns: usize,
    /// Histories idle for longer than this are evicted.
    pub idle_ttl_minutes: u32,
    /// Keep the user turn of a request that failed.
    pub retain_failed_turns: bool,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_users: 1024,
            max_turns: 200,
            idle_ttl_minutes: 60,
            retain_failed_turns: true,
        }
    }
}
