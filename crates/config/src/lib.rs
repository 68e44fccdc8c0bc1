//! Configuration loading, validation, and management for PixelPrompt.
//!
//! Loads configuration from `pixelprompt.toml` (or an explicit path) and
//! validates it at startup. Missing file means defaults: a single local
//! Ollama agent, no cloud backends.
//!
//! API keys are never stored in the file — each cloud provider names an
//! environment variable via `api_key_env` and the key is resolved from the
//! process environment when providers are built.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure. Maps directly to `pixelprompt.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Window and frame-loop settings (consumed by the rendering host).
    #[serde(default)]
    pub window: WindowConfig,

    /// Presentation pacing knobs.
    #[serde(default)]
    pub ui: UiConfig,

    /// Backend configurations, keyed by provider name.
    #[serde(default = "default_providers")]
    pub providers: HashMap<String, ProviderConfig>,

    /// The agents spawned at session start.
    #[serde(default = "default_agents")]
    pub agents: Vec<AgentProfile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    /// Target frame rate for the real-time loop.
    #[serde(default = "default_fps")]
    pub fps_target: u32,
}

fn default_width() -> u32 {
    1280
}
fn default_height() -> u32 {
    720
}
fn default_fps() -> u32 {
    60
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            fps_target: default_fps(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    /// Per-character reveal delay for the typewriter effect. Also feeds
    /// how long a reply stays on screen.
    #[serde(default = "default_typewriter_delay_ms")]
    pub typewriter_delay_ms: u64,

    /// Extra seconds a fully revealed reply lingers before the agent
    /// returns to idle.
    #[serde(default = "default_talking_linger_secs")]
    pub talking_linger_secs: f32,

    /// Seconds between wander-target refreshes while idle.
    #[serde(default = "default_wander_interval_secs")]
    pub wander_interval_secs: f32,
}

fn default_typewriter_delay_ms() -> u64 {
    30
}
fn default_talking_linger_secs() -> f32 {
    2.0
}
fn default_wander_interval_secs() -> f32 {
    4.0
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            typewriter_delay_ms: default_typewriter_delay_ms(),
            talking_linger_secs: default_talking_linger_secs(),
            wander_interval_secs: default_wander_interval_secs(),
        }
    }
}

/// Settings for one backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Base endpoint override (defaults are per-backend).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Environment variable holding the API key, for cloud backends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Model used when an agent profile doesn't name one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,

    /// Per-call completion bound in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

/// One agent as declared in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    pub id: String,
    pub name: String,

    /// Must name a configured provider.
    pub provider: String,
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Round-trip exchanges retained after trimming.
    #[serde(default = "default_max_history")]
    pub max_history: usize,
}

fn default_max_history() -> usize {
    10
}

fn default_providers() -> HashMap<String, ProviderConfig> {
    let mut providers = HashMap::new();
    providers.insert(
        "ollama".to_string(),
        ProviderConfig {
            enabled: true,
            base_url: Some("http://localhost:11434".into()),
            api_key_env: None,
            default_model: Some("llama3.2:3b".into()),
            timeout_secs: default_timeout_secs(),
        },
    );
    providers.insert(
        "anthropic".to_string(),
        ProviderConfig {
            enabled: false,
            base_url: None,
            api_key_env: Some("ANTHROPIC_API_KEY".into()),
            default_model: Some("claude-sonnet-4-5".into()),
            timeout_secs: default_timeout_secs(),
        },
    );
    providers.insert(
        "gemini".to_string(),
        ProviderConfig {
            enabled: false,
            base_url: None,
            api_key_env: Some("GEMINI_API_KEY".into()),
            default_model: Some("gemini-2.0-flash".into()),
            timeout_secs: default_timeout_secs(),
        },
    );
    providers
}

fn default_agents() -> Vec<AgentProfile> {
    vec![AgentProfile {
        id: "agent_001".into(),
        name: "Pixel".into(),
        provider: "ollama".into(),
        model: "llama3.2:3b".into(),
        system_prompt: Some(
            "You are Pixel, a helpful assistant who lives in a virtual room. \
             Keep responses concise and friendly (1-2 sentences)."
                .into(),
        ),
        max_history: default_max_history(),
    }]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            ui: UiConfig::default(),
            providers: default_providers(),
            agents: default_agents(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (`pixelprompt.toml` in the
    /// working directory), falling back to defaults when absent.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new("pixelprompt.toml"))
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(10..=240).contains(&self.window.fps_target) {
            return Err(ConfigError::ValidationError(format!(
                "fps_target must be between 10 and 240, got {}",
                self.window.fps_target
            )));
        }

        if self.agents.is_empty() {
            return Err(ConfigError::ValidationError(
                "must have at least one agent configured".into(),
            ));
        }

        let mut seen_ids = std::collections::HashSet::new();
        for agent in &self.agents {
            if !seen_ids.insert(agent.id.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate agent id: {}",
                    agent.id
                )));
            }

            if !self.providers.contains_key(&agent.provider) {
                return Err(ConfigError::ValidationError(format!(
                    "agent '{}' uses unknown provider: {}",
                    agent.id, agent.provider
                )));
            }

            if agent.max_history == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "agent '{}' needs max_history >= 1",
                    agent.id
                )));
            }
        }

        if !self.providers.values().any(|p| p.enabled) {
            tracing::warn!("No providers enabled - agents won't be able to respond");
        }

        Ok(())
    }

    /// Enabled providers with their settings.
    pub fn enabled_providers(&self) -> impl Iterator<Item = (&str, &ProviderConfig)> {
        self.providers
            .iter()
            .filter(|(_, cfg)| cfg.enabled)
            .map(|(name, cfg)| (name.as_str(), cfg))
    }

    /// Resolve the API key for a provider from its configured env var.
    ///
    /// `None` for providers that don't need credentials, or when the
    /// variable is unset or empty.
    pub fn resolve_api_key(provider: &ProviderConfig) -> Option<String> {
        let var = provider.api_key_env.as_deref()?;
        match std::env::var(var) {
            Ok(key) if !key.trim().is_empty() => Some(key.trim().to_string()),
            _ => None,
        }
    }

    /// Generate the default config as a TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
