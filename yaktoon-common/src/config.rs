//! Configuration loading for Yaktoon services
//!
//! Resolution priority for every setting: CLI argument → environment → TOML file → default.
//! API keys are reported with the source they were loaded from, and a warning is logged
//! when more than one source provides a key.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const DEFAULT_PORT: u16 = 5780;
pub const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_ANALYSIS_MODEL: &str = "openai/gpt-5-mini";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_LLAMA_BASE_URL: &str = "https://api.cloud.llamaindex.ai";
pub const DEFAULT_SESSION_TTL_HOURS: u64 = 24;
pub const DEFAULT_AUTH_TOKEN_TTL_DAYS: u64 = 30;
pub const DEFAULT_KICE_DATA_PATH: &str = "database/KICE.json";
/// Upper bound for configured lifetimes: one century
pub const MAX_TTL_DAYS: u64 = 100 * 365;
pub const MAX_TTL_HOURS: u64 = MAX_TTL_DAYS * 24;

/// On-disk TOML configuration. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    pub port: Option<u16>,
    pub redis_url: Option<String>,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub llama: LlamaSection,
    pub session_ttl_hours: Option<u64>,
    pub auth_token_ttl_days: Option<u64>,
    pub kice_data_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmSection {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub analysis_model: Option<String>,
    pub chat_model: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlamaSection {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

/// Values supplied on the command line (highest priority)
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub port: Option<u16>,
    pub redis_url: Option<String>,
}

/// Chat-completions endpoint settings
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    /// Model used by the student record pipeline
    pub analysis_model: String,
    /// Model used by chat, messaging and tool endpoints
    pub chat_model: String,
}

/// LlamaCloud parsing settings
#[derive(Debug, Clone)]
pub struct LlamaConfig {
    pub api_key: Option<String>,
    pub base_url: String,
}

/// Fully resolved application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub redis_url: String,
    pub llm: LlmConfig,
    pub llama: LlamaConfig,
    pub session_ttl_hours: u64,
    pub auth_token_ttl_days: u64,
    /// Past exam passages served by the Korean literature tutor
    pub kice_data_path: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            redis_url: DEFAULT_REDIS_URL.to_string(),
            llm: LlmConfig {
                api_key: None,
                base_url: DEFAULT_LLM_BASE_URL.to_string(),
                analysis_model: DEFAULT_ANALYSIS_MODEL.to_string(),
                chat_model: DEFAULT_CHAT_MODEL.to_string(),
            },
            llama: LlamaConfig {
                api_key: None,
                base_url: DEFAULT_LLAMA_BASE_URL.to_string(),
            },
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
            auth_token_ttl_days: DEFAULT_AUTH_TOKEN_TTL_DAYS,
            kice_data_path: PathBuf::from(DEFAULT_KICE_DATA_PATH),
        }
    }
}

impl AppConfig {
    /// Resolve configuration from CLI overrides, process environment and TOML
    pub fn resolve(cli: &CliOverrides, toml_config: &TomlConfig) -> Self {
        Self::resolve_with(cli, toml_config, |name| std::env::var(name).ok())
    }

    /// Resolve configuration with an explicit environment lookup
    pub fn resolve_with<F>(cli: &CliOverrides, toml_config: &TomlConfig, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_nonempty = |name: &str| env(name).filter(|v| is_valid_key(v));

        let port = cli
            .port
            .or_else(|| env_nonempty("YAKTOON_PORT").and_then(|p| p.trim().parse().ok()))
            .or(toml_config.port)
            .unwrap_or(DEFAULT_PORT);

        let redis_url = cli
            .redis_url
            .clone()
            .or_else(|| env_nonempty("REDIS_URL"))
            .or_else(|| env_nonempty("DATABASE_URL"))
            .or_else(|| toml_config.redis_url.clone())
            .unwrap_or_else(|| {
                debug!("No Redis URL configured, using {}", DEFAULT_REDIS_URL);
                DEFAULT_REDIS_URL.to_string()
            });

        let llm = LlmConfig {
            api_key: resolve_api_key(
                "OpenAI",
                env_nonempty("OPENAI_API_KEY"),
                toml_config.llm.api_key.as_deref(),
            ),
            base_url: env_nonempty("OPENROUTER_BASE_URL")
                .or_else(|| toml_config.llm.base_url.clone())
                .unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string()),
            analysis_model: env_nonempty("OPENAI_MODEL")
                .or_else(|| toml_config.llm.analysis_model.clone())
                .unwrap_or_else(|| DEFAULT_ANALYSIS_MODEL.to_string()),
            chat_model: env_nonempty("OPENAI_CHAT_MODEL")
                .or_else(|| toml_config.llm.chat_model.clone())
                .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
        };

        let llama = LlamaConfig {
            api_key: resolve_api_key(
                "LlamaCloud",
                env_nonempty("LLAMA_API_KEY"),
                toml_config.llama.api_key.as_deref(),
            ),
            base_url: toml_config
                .llama
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_LLAMA_BASE_URL.to_string()),
        };

        Self {
            port,
            redis_url,
            llm,
            llama,
            session_ttl_hours: capped(
                "session_ttl_hours",
                toml_config.session_ttl_hours.unwrap_or(DEFAULT_SESSION_TTL_HOURS),
                MAX_TTL_HOURS,
            ),
            auth_token_ttl_days: capped(
                "auth_token_ttl_days",
                toml_config.auth_token_ttl_days.unwrap_or(DEFAULT_AUTH_TOKEN_TTL_DAYS),
                MAX_TTL_DAYS,
            ),
            kice_data_path: env_nonempty("KICE_DATA_PATH")
                .map(PathBuf::from)
                .or_else(|| toml_config.kice_data_path.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_KICE_DATA_PATH)),
        }
    }

    /// List of configuration problems that prevent the PDF pipeline from running
    pub fn credential_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.llama.api_key.as_deref().map_or(true, |k| !is_valid_key(k)) {
            errors.push("LLAMA_API_KEY environment variable is required".to_string());
        }
        if self.llm.api_key.as_deref().map_or(true, |k| !is_valid_key(k)) {
            errors.push("OPENAI_API_KEY environment variable is required".to_string());
        }
        errors
    }
}

fn capped(name: &str, value: u64, max: u64) -> u64 {
    if value > max {
        warn!("{} = {} exceeds the maximum, using {}", name, value, max);
        max
    } else {
        value
    }
}

/// Pick an API key from environment or TOML, environment first
fn resolve_api_key(label: &str, env_key: Option<String>, toml_key: Option<&str>) -> Option<String> {
    let toml_key = toml_key.filter(|k| is_valid_key(k));

    if env_key.is_some() && toml_key.is_some() {
        warn!(
            "{} API key found in multiple sources: environment, TOML. Using environment (highest priority).",
            label
        );
    }

    if let Some(key) = env_key {
        info!("{} API key loaded from environment variable", label);
        return Some(key);
    }
    if let Some(key) = toml_key {
        info!("{} API key loaded from TOML config", label);
        return Some(key.to_string());
    }

    warn!("{} API key not configured", label);
    None
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Load the TOML config file
///
/// An explicit path must exist. Without one, `~/.config/yaktoon/config.toml` and then
/// `/etc/yaktoon/config.toml` are tried; when neither exists the defaults are used.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!("Config file not found: {:?}", path)));
            }
            path.to_path_buf()
        }
        None => match default_config_path() {
            Some(path) => path,
            None => {
                debug!("No config file found, using defaults");
                return Ok(TomlConfig::default());
            }
        },
    };

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

fn default_config_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("yaktoon").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    let system_config = PathBuf::from("/etc/yaktoon/config.toml");
    if cfg!(unix) && system_config.exists() {
        return Some(system_config);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_when_nothing_configured() {
        let config = AppConfig::resolve_with(&CliOverrides::default(), &TomlConfig::default(), env_from(&[]));
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.redis_url, DEFAULT_REDIS_URL);
        assert_eq!(config.llm.base_url, DEFAULT_LLM_BASE_URL);
        assert_eq!(config.llm.analysis_model, DEFAULT_ANALYSIS_MODEL);
        assert_eq!(config.llm.chat_model, DEFAULT_CHAT_MODEL);
        assert!(config.llm.api_key.is_none());
        assert_eq!(config.session_ttl_hours, 24);
        assert_eq!(config.auth_token_ttl_days, 30);
    }

    #[test]
    fn test_lifetimes_are_capped_at_a_century() {
        let toml_config = TomlConfig {
            session_ttl_hours: Some(u64::MAX),
            auth_token_ttl_days: Some(u64::MAX),
            ..Default::default()
        };
        let config = AppConfig::resolve_with(&CliOverrides::default(), &toml_config, env_from(&[]));
        assert_eq!(config.session_ttl_hours, MAX_TTL_HOURS);
        assert_eq!(config.auth_token_ttl_days, MAX_TTL_DAYS);
        assert!(config.auth_token_ttl_days.checked_mul(86_400).is_some());

        let toml_config = TomlConfig {
            session_ttl_hours: Some(48),
            ..Default::default()
        };
        let config = AppConfig::resolve_with(&CliOverrides::default(), &toml_config, env_from(&[]));
        assert_eq!(config.session_ttl_hours, 48);
    }

    #[test]
    fn test_kice_data_path_priority() {
        let config = AppConfig::resolve_with(&CliOverrides::default(), &TomlConfig::default(), env_from(&[]));
        assert_eq!(config.kice_data_path, PathBuf::from(DEFAULT_KICE_DATA_PATH));

        let toml_config = TomlConfig {
            kice_data_path: Some(PathBuf::from("/srv/kice.json")),
            ..Default::default()
        };
        let config = AppConfig::resolve_with(&CliOverrides::default(), &toml_config, env_from(&[]));
        assert_eq!(config.kice_data_path, PathBuf::from("/srv/kice.json"));

        let env = env_from(&[("KICE_DATA_PATH", "/data/kice.json")]);
        let config = AppConfig::resolve_with(&CliOverrides::default(), &toml_config, env);
        assert_eq!(config.kice_data_path, PathBuf::from("/data/kice.json"));
    }

    #[test]
    fn test_redis_url_priority() {
        let toml_config = TomlConfig {
            redis_url: Some("redis://toml:6379".to_string()),
            ..Default::default()
        };

        let env = env_from(&[("DATABASE_URL", "redis://database-url:6379")]);
        let config = AppConfig::resolve_with(&CliOverrides::default(), &toml_config, env);
        assert_eq!(config.redis_url, "redis://database-url:6379");

        let env = env_from(&[
            ("REDIS_URL", "redis://redis-url:6379"),
            ("DATABASE_URL", "redis://database-url:6379"),
        ]);
        let config = AppConfig::resolve_with(&CliOverrides::default(), &toml_config, env);
        assert_eq!(config.redis_url, "redis://redis-url:6379");

        let cli = CliOverrides {
            redis_url: Some("redis://cli:6379".to_string()),
            ..Default::default()
        };
        let env = env_from(&[("REDIS_URL", "redis://redis-url:6379")]);
        let config = AppConfig::resolve_with(&cli, &toml_config, env);
        assert_eq!(config.redis_url, "redis://cli:6379");

        let config = AppConfig::resolve_with(&CliOverrides::default(), &toml_config, env_from(&[]));
        assert_eq!(config.redis_url, "redis://toml:6379");
    }

    #[test]
    fn test_whitespace_key_is_missing() {
        let env = env_from(&[("OPENAI_API_KEY", "   "), ("LLAMA_API_KEY", "llx-abc")]);
        let config = AppConfig::resolve_with(&CliOverrides::default(), &TomlConfig::default(), env);
        assert!(config.llm.api_key.is_none());
        assert_eq!(config.llama.api_key.as_deref(), Some("llx-abc"));

        let errors = config.credential_errors();
        assert_eq!(errors, vec!["OPENAI_API_KEY environment variable is required".to_string()]);
    }

    #[test]
    fn test_credential_errors_lists_both() {
        let config = AppConfig::default();
        let errors = config.credential_errors();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("LLAMA_API_KEY"));
        assert!(errors[1].contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_env_key_beats_toml_key() {
        let toml_config = TomlConfig {
            llm: LlmSection {
                api_key: Some("toml-key".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let env = env_from(&[("OPENAI_API_KEY", "env-key")]);
        let config = AppConfig::resolve_with(&CliOverrides::default(), &toml_config, env);
        assert_eq!(config.llm.api_key.as_deref(), Some("env-key"));
    }

    #[test]
    fn test_load_explicit_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "port = 6000\nredis_url = \"redis://file:6379\"\n\n[llm]\nchat_model = \"gpt-test\"\n"
        )
        .unwrap();

        let config = load_toml_config(Some(file.path())).unwrap();
        assert_eq!(config.port, Some(6000));
        assert_eq!(config.redis_url.as_deref(), Some("redis://file:6379"));
        assert_eq!(config.llm.chat_model.as_deref(), Some("gpt-test"));
        assert!(config.llama.api_key.is_none());
    }

    #[test]
    fn test_load_missing_explicit_toml_fails() {
        let result = load_toml_config(Some(Path::new("/nonexistent/yaktoon.toml")));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
