//! Configuration management for vocab-speaker.
//!
//! Loads config from YAML files in standard locations. Every section has
//! defaults, so an empty or missing file yields a working setup as long as
//! an API key is available from the environment.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub tts_model: String,
    pub text_model: String,
    pub request_timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://generativelanguage.googleapis.com".into(),
            tts_model: "gemini-2.5-flash-preview-tts".into(),
            text_model: "gemini-3-flash-preview".into(),
            request_timeout_secs: 60,
        }
    }
}

impl GeminiConfig {
    /// API key from the config file, falling back to `GEMINI_API_KEY` then `API_KEY`.
    pub fn resolved_api_key(&self) -> Option<String> {
        if !self.api_key.trim().is_empty() {
            return Some(self.api_key.trim().to_string());
        }
        ["GEMINI_API_KEY", "API_KEY"]
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .map(|v| v.trim().to_string())
            .find(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Voice for single-voice requests (and the Italian speaker).
    pub italian_voice: String,
    /// Voice for the Bengali speaker of dual-voice requests.
    pub bangla_voice: String,
    /// Send bilingual pairs as two-speaker requests.
    pub dual_voice: bool,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            italian_voice: "Kore".into(),
            bangla_voice: "Puck".into(),
            dual_voice: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    pub priority_min_gap_ms: u64,
    pub background_min_gap_ms: u64,
    pub cooldown_secs: u64,
    pub translation_min_gap_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            priority_min_gap_ms: 1200,
            background_min_gap_ms: 4000,
            cooldown_secs: 60,
            translation_min_gap_ms: 1000,
        }
    }
}

impl PacingConfig {
    pub fn priority_gap(&self) -> Duration {
        Duration::from_millis(self.priority_min_gap_ms)
    }

    pub fn background_gap(&self) -> Duration {
        Duration::from_millis(self.background_min_gap_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub factor: f64,
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 1000,
            factor: 2.5,
            jitter_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory for durable audio blobs. Empty means the platform cache dir.
    pub dir: String,
    /// Keep synthesized audio across restarts.
    pub persist: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: String::new(),
            persist: true,
        }
    }
}

impl CacheConfig {
    pub fn resolved_dir(&self) -> PathBuf {
        if !self.dir.is_empty() {
            return PathBuf::from(&self.dir);
        }
        dirs::cache_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vocab-speaker")
            .join("audio")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PrefetchConfig {
    pub max_per_call: usize,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self { max_per_call: 5 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8768,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gemini: GeminiConfig,
    pub synthesis: SynthesisConfig,
    pub pacing: PacingConfig,
    pub retry: RetryConfig,
    pub cache: CacheConfig,
    pub prefetch: PrefetchConfig,
    pub api: ApiConfig,
}

impl Config {
    /// Load configuration from YAML file.
    ///
    /// Searches standard locations if no path is provided:
    /// 1. ./config.yaml
    /// 2. ~/.config/vocab-speaker/config.yaml
    /// 3. /etc/vocab-speaker/config.yaml
    pub fn load(path: Option<&Path>) -> Self {
        let resolved = path.map(PathBuf::from).or_else(|| {
            let candidates = [
                std::env::current_dir().ok().map(|d| d.join("config.yaml")),
                dirs::home_dir().map(|h| h.join(".config/vocab-speaker/config.yaml")),
                Some(PathBuf::from("/etc/vocab-speaker/config.yaml")),
            ];
            candidates.into_iter().flatten().find(|p| p.exists())
        });

        let Some(config_path) = resolved else {
            info!("No config file found, using defaults");
            return Self::default();
        };

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(config) => {
                    info!("Loaded config from {}", config_path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {e}, using defaults", config_path.display());
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read {}: {e}, using defaults", config_path.display());
                Self::default()
            }
        }
    }

    pub fn parse(contents: &str) -> Result<Self, serde_yml::Error> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yml::from_str(contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.retry.max_attempts, 5);
        assert!(config.retry.factor > 2.0);
        assert!(config.pacing.background_min_gap_ms > config.pacing.priority_min_gap_ms);
        assert_eq!(config.pacing.cooldown(), Duration::from_secs(60));
        assert_eq!(config.synthesis.italian_voice, "Kore");
        assert!(config.cache.persist);
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let yaml = "pacing:\n  priority_min_gap_ms: 250\nprefetch:\n  max_per_call: 3\n";
        let config = Config::parse(yaml).unwrap();
        assert_eq!(config.pacing.priority_min_gap_ms, 250);
        assert_eq!(config.pacing.background_min_gap_ms, 4000);
        assert_eq!(config.prefetch.max_per_call, 3);
        assert_eq!(config.api.port, 8768);
    }

    #[test]
    fn test_empty_file_is_default() {
        let config = Config::parse("  \n").unwrap();
        assert_eq!(config.gemini.tts_model, "gemini-2.5-flash-preview-tts");
    }

    #[test]
    fn test_configured_key_wins() {
        let gemini = GeminiConfig {
            api_key: "  from-file ".into(),
            ..GeminiConfig::default()
        };
        assert_eq!(gemini.resolved_api_key().as_deref(), Some("from-file"));
    }

    #[test]
    fn test_explicit_cache_dir() {
        let cache = CacheConfig {
            dir: "/tmp/vs-audio".into(),
            persist: true,
        };
        assert_eq!(cache.resolved_dir(), PathBuf::from("/tmp/vs-audio"));
    }
}
