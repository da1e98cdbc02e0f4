use super::modes::{EnforcementMode, HitlMode};
use crate::error::ConfigError;
use directories::UserDirs;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIDENCE_MIN: f64 = 70.0;

// ── Top-level config ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Service root, e.g. `https://dashclaw.example.com`
    #[serde(default)]
    pub base_url: String,
    /// Sent as `x-api-key`; selects the organisation whose data is accessed
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub agent_id: String,
    #[serde(default)]
    pub agent_name: Option<String>,
    #[serde(default)]
    pub swarm_id: Option<String>,

    #[serde(default)]
    pub guard_mode: EnforcementMode,
    #[serde(default)]
    pub auto_recommend: EnforcementMode,
    /// Minimum recommendation confidence to auto-apply in enforce mode (0-100)
    #[serde(
        default = "default_confidence_min",
        deserialize_with = "lenient_confidence_min"
    )]
    pub recommendation_confidence_min: f64,
    #[serde(default)]
    pub hitl_mode: HitlMode,

    /// Per-request network timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// PEM RSA private key (PKCS#8 or PKCS#1) used to sign submitted actions
    #[serde(default)]
    pub signing_key_path: Option<PathBuf>,

    #[serde(default)]
    pub approval: ApprovalConfig,

    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
}

fn default_confidence_min() -> f64 {
    DEFAULT_CONFIDENCE_MIN
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// Clamp into `[0, 100]`; anything non-numeric falls back to the default.
pub fn normalize_confidence_min(raw: Option<f64>) -> f64 {
    match raw {
        Some(value) if value.is_finite() => value.clamp(0.0, 100.0),
        _ => DEFAULT_CONFIDENCE_MIN,
    }
}

fn parse_confidence_min(raw: &str) -> f64 {
    normalize_confidence_min(raw.trim().parse::<f64>().ok())
}

fn lenient_confidence_min<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Float(f64),
        Int(i64),
        Text(String),
        Other(serde::de::IgnoredAny),
    }

    #[allow(clippy::cast_precision_loss)]
    Ok(match Raw::deserialize(deserializer)? {
        Raw::Float(value) => normalize_confidence_min(Some(value)),
        Raw::Int(value) => normalize_confidence_min(Some(value as f64)),
        Raw::Text(text) => parse_confidence_min(&text),
        Raw::Other(_) => DEFAULT_CONFIDENCE_MIN,
    })
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            agent_id: String::new(),
            agent_name: None,
            swarm_id: None,
            guard_mode: EnforcementMode::Off,
            auto_recommend: EnforcementMode::Off,
            recommendation_confidence_min: DEFAULT_CONFIDENCE_MIN,
            hitl_mode: HitlMode::Off,
            request_timeout_secs: default_request_timeout_secs(),
            signing_key_path: None,
            approval: ApprovalConfig::default(),
            heartbeat: HeartbeatConfig::default(),
        }
    }
}

// ── Approval wait ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalConfig {
    /// Give up waiting for an operator after this long (default: 300)
    #[serde(default = "default_approval_timeout_secs")]
    pub timeout_secs: u64,
    /// Fixed delay between status polls (default: 5000)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_approval_timeout_secs() -> u64 {
    300
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

impl ApprovalConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_approval_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

// ── Heartbeat ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    #[serde(default = "default_heartbeat_interval_secs")]
    pub interval_secs: u64,
    /// Upper bound on how long `stop` waits for the worker to exit
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,
}

fn default_heartbeat_interval_secs() -> u64 {
    60
}

fn default_stop_timeout_ms() -> u64 {
    5_000
}

impl HeartbeatConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_heartbeat_interval_secs(),
            stop_timeout_ms: default_stop_timeout_ms(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

/// `~/.dashclaw/config.toml`, when a home directory can be resolved.
pub fn default_config_path() -> Option<PathBuf> {
    UserDirs::new().map(|u| u.home_dir().join(".dashclaw").join("config.toml"))
}

impl ClientConfig {
    /// Load from `path` (or the default location when it exists), then apply
    /// `DASHCLAW_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        toml::from_str(&contents)
            .map_err(|e| ConfigError::Load(format!("{}: {e}", path.display())))
    }

    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup. Empty values are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = var("DASHCLAW_BASE_URL") {
            self.base_url = url;
        }
        if let Some(key) = var("DASHCLAW_API_KEY") {
            self.api_key = key;
        }
        if let Some(agent) = var("DASHCLAW_AGENT_ID") {
            self.agent_id = agent;
        }
        if let Some(name) = var("DASHCLAW_AGENT_NAME") {
            self.agent_name = Some(name);
        }
        if let Some(swarm) = var("DASHCLAW_SWARM_ID") {
            self.swarm_id = Some(swarm);
        }
        if let Some(mode) = var("DASHCLAW_GUARD_MODE") {
            self.guard_mode = EnforcementMode::parse("guard_mode", &mode)?;
        }
        if let Some(mode) = var("DASHCLAW_AUTO_RECOMMEND") {
            self.auto_recommend = EnforcementMode::parse("auto_recommend", &mode)?;
        }
        if let Some(mode) = var("DASHCLAW_HITL_MODE") {
            self.hitl_mode = HitlMode::parse(&mode)?;
        }
        if let Some(min) = var("DASHCLAW_RECOMMENDATION_CONFIDENCE_MIN") {
            self.recommendation_confidence_min = parse_confidence_min(&min);
        }
        if let Some(path) = var("DASHCLAW_SIGNING_KEY_PATH") {
            self.signing_key_path = Some(PathBuf::from(path));
        }

        Ok(())
    }

    /// Check required identity fields and the base URL shape.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::MissingField("base_url"));
        }
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingField("api_key"));
        }
        if self.agent_id.trim().is_empty() {
            return Err(ConfigError::MissingField("agent_id"));
        }

        let parsed = url::Url::parse(self.base_url.trim()).map_err(|e| {
            ConfigError::InvalidBaseUrl {
                url: self.base_url.clone(),
                reason: e.to_string(),
            }
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidBaseUrl {
                url: self.base_url.clone(),
                reason: format!("unsupported scheme {:?}", parsed.scheme()),
            });
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}
