//! LocalBoost configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{LocalBoostError, Result};
use crate::types::ServingArea;

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalBoostConfig {
    #[serde(default)]
    pub business: BusinessConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub channels: ChannelsConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

impl Default for LocalBoostConfig {
    fn default() -> Self {
        Self {
            business: BusinessConfig::default(),
            generator: GeneratorConfig::default(),
            channels: ChannelsConfig::default(),
            scheduler: SchedulerConfig::default(),
            sync: SyncConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

impl LocalBoostConfig {
    /// Load config from the default path (~/.localboost/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| LocalBoostError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| LocalBoostError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| LocalBoostError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the LocalBoost home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".localboost")
    }
}

/// Business identity: who is posting, from where, in which timezone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessConfig {
    #[serde(default = "default_business_name")]
    pub name: String,
    /// Stable id stamped onto every automated post record.
    #[serde(default)]
    pub profile_id: String,
    /// IANA timezone all schedule times are interpreted in.
    /// One fixed civil zone per business; recurrence math never mixes zones.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Serving areas keyword clusters are scoped to.
    #[serde(default)]
    pub serving_areas: Vec<ServingArea>,
}

fn default_business_name() -> String { "My Business".into() }
fn default_timezone() -> String { "America/Chicago".into() }

impl Default for BusinessConfig {
    fn default() -> Self {
        Self {
            name: default_business_name(),
            profile_id: String::new(),
            timezone: default_timezone(),
            serving_areas: Vec::new(),
        }
    }
}

impl BusinessConfig {
    /// Parse the configured timezone. Fails with a `Config` error so a typo
    /// is caught at startup, not at the first firing.
    pub fn tz(&self) -> Result<chrono_tz::Tz> {
        self.timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|_| LocalBoostError::Config(format!("Invalid timezone '{}'", self.timezone)))
    }
}

/// Content generator selection and credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// "template" (offline, built-in) or "openai" / "custom:<url>".
    #[serde(default = "default_generator_provider")]
    pub provider: String,
    #[serde(default)]
    pub api_key: String,
    /// Override endpoint for OpenAI-compatible servers.
    #[serde(default)]
    pub endpoint: String,
    #[serde(default = "default_generator_model")]
    pub model: String,
    #[serde(default = "default_generator_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_generator_provider() -> String { "template".into() }
fn default_generator_model() -> String { "gpt-4o-mini".into() }
fn default_generator_timeout() -> u64 { 45 }
fn default_temperature() -> f32 { 0.7 }

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            provider: default_generator_provider(),
            api_key: String::new(),
            endpoint: String::new(),
            model: default_generator_model(),
            timeout_secs: default_generator_timeout(),
            temperature: default_temperature(),
        }
    }
}

/// Per-platform channel credentials. A missing section or empty credentials
/// mean the channel is unconfigured — it is surfaced as such, never mocked.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelsConfig {
    #[serde(default)]
    pub google_business: Option<GoogleBusinessConfig>,
    #[serde(default)]
    pub facebook: Option<FacebookConfig>,
    #[serde(default)]
    pub instagram: Option<InstagramConfig>,
    #[serde(default)]
    pub linkedin: Option<LinkedInConfig>,
    #[serde(default)]
    pub twitter: Option<TwitterConfig>,
}

/// Google Business Profile API credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleBusinessConfig {
    pub access_token: String,
    pub account_id: String,
    pub location_id: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Facebook Page (Graph API) credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacebookConfig {
    pub access_token: String,
    pub page_id: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Instagram Business (Graph API) credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstagramConfig {
    pub access_token: String,
    pub user_id: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// LinkedIn organization page credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedInConfig {
    pub access_token: String,
    pub organization_id: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// X / Twitter API v2 credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwitterConfig {
    pub bearer_token: String,
    pub user_id: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool { true }

/// Timeouts for the publish pipeline's external calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_generation_timeout")]
    pub generation_timeout_secs: u64,
    #[serde(default = "default_publish_timeout")]
    pub publish_timeout_secs: u64,
}

fn default_generation_timeout() -> u64 { 45 }
fn default_publish_timeout() -> u64 { 30 }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            generation_timeout_secs: default_generation_timeout(),
            publish_timeout_secs: default_publish_timeout(),
        }
    }
}

/// Stats sync loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Seconds between dashboard sync ticks.
    #[serde(default = "default_sync_interval")]
    pub interval_secs: u64,
    /// Independent per-channel fetch timeout — one slow platform never
    /// delays the others' results.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
}

fn default_sync_interval() -> u64 { 900 }
fn default_fetch_timeout() -> u64 { 10 }

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_sync_interval(),
            fetch_timeout_secs: default_fetch_timeout(),
        }
    }
}

/// Dashboard gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_host() -> String { "127.0.0.1".into() }
fn default_port() -> u16 { 8710 }

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            enabled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_sections() {
        let config: LocalBoostConfig = toml::from_str(
            r#"
            [business]
            name = "Riverside Plumbing"
            timezone = "America/Denver"
            "#,
        )
        .unwrap();
        assert_eq!(config.business.name, "Riverside Plumbing");
        assert_eq!(config.sync.interval_secs, 900);
        assert_eq!(config.gateway.port, 8710);
        assert!(config.channels.facebook.is_none());
    }

    #[test]
    fn timezone_parses_or_fails_loudly() {
        let business = BusinessConfig::default();
        assert!(business.tz().is_ok());

        let bad = BusinessConfig {
            timezone: "Mars/Olympus_Mons".into(),
            ..Default::default()
        };
        assert!(matches!(bad.tz(), Err(LocalBoostError::Config(_))));
    }

    #[test]
    fn load_from_reads_channel_credentials() {
        let path = std::env::temp_dir().join("localboost_config_test.toml");
        std::fs::write(
            &path,
            r#"
            [channels.facebook]
            access_token = "tok"
            page_id = "12345"
            "#,
        )
        .unwrap();
        let config = LocalBoostConfig::load_from(&path).unwrap();
        let fb = config.channels.facebook.unwrap();
        assert_eq!(fb.page_id, "12345");
        assert!(fb.enabled);
        std::fs::remove_file(&path).ok();
    }
}
