use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, SkylarkError};

/// Top-level configuration for the Skylark assistant.
///
/// Loaded from `~/.skylark/config.toml` by default. Each section corresponds
/// to one subsystem of the orchestration engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkylarkConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub resilience: ResilienceConfig,
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
}

impl Default for SkylarkConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            session: SessionConfig::default(),
            chat: ChatConfig::default(),
            search: SearchConfig::default(),
            resilience: ResilienceConfig::default(),
            maintenance: MaintenanceConfig::default(),
        }
    }
}

impl SkylarkConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SkylarkConfig = toml::from_str(&content)?;
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
            toml::to_string_pretty(self).map_err(|e| SkylarkError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// API server port.
    pub api_port: u16,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            api_port: 4040,
            log_level: "info".to_string(),
        }
    }
}

/// Conversation session lifecycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Minutes of inactivity before a session expires.
    pub ttl_minutes: u64,
    /// Seconds between expired-session sweeps.
    pub sweep_interval_secs: u64,
    /// Number of recent messages handed to the classifier as context.
    pub context_turns: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: 30,
            sweep_interval_secs: 300,
            context_turns: 5,
        }
    }
}

/// Chat turn validation and reply shaping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Maximum accepted user message length in characters.
    pub max_message_length: usize,
    /// Maximum suggested actions attached to a reply.
    pub max_suggestions: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_message_length: 2000,
            max_suggestions: 4,
        }
    }
}

/// Flight search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Maximum results kept from one search.
    pub max_results: usize,
    /// Currency used when charging the payment gateway.
    pub currency: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: 10,
            currency: "USD".to_string(),
        }
    }
}

/// Circuit breaker and retry settings, shared by every protected collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Consecutive failures before a breaker opens.
    pub failure_threshold: u32,
    /// Milliseconds an open breaker waits before permitting a trial call.
    pub recovery_timeout_ms: u64,
    /// Per-call timeout in milliseconds enforced inside the breaker.
    pub call_timeout_ms: u64,
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// Base backoff delay in milliseconds.
    pub base_delay_ms: u64,
    /// Backoff ceiling in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout_ms: 30_000,
            call_timeout_ms: 5_000,
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 10_000,
        }
    }
}

/// Background maintenance intervals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    /// Seconds between flight-change monitoring ticks.
    pub flight_watch_interval_secs: u64,
    /// Seconds between reminder scheduling ticks.
    pub reminder_schedule_interval_secs: u64,
    /// Seconds between reminder dispatch ticks.
    pub reminder_dispatch_interval_secs: u64,
    /// Hours before departure at which a reminder falls due.
    pub reminder_lead_hours: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            flight_watch_interval_secs: 300,
            reminder_schedule_interval_secs: 600,
            reminder_dispatch_interval_secs: 60,
            reminder_lead_hours: 24,
        }
    }
}
