/// `load_config` module: loads the static YAML config and injects the
/// text-generation credential from the environment.
///
/// This module is the only place where untrusted YAML is parsed. The pipeline
/// sections map straight onto [`paper_digest_core::config::DigestConfig`]; the
/// `openai` section configures the CLI-side [`crate::openai::OpenAiClient`].
///
/// # Secrets
/// The API key never comes from YAML. It is read from `OPENAI_API_KEY` (after
/// `.env` is loaded by `main`). A missing key is logged, not an error: the run
/// proceeds and every paper is skipped at the summarization stage.
///
/// # Errors
/// All errors use `anyhow::Error` and surface at the CLI boundary.
use anyhow::Result;
use paper_digest_core::config::DigestConfig;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use tracing::{error, info, warn};

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CliConfig {
    #[serde(flatten)]
    pub digest: DigestConfig,
    #[serde(default)]
    pub openai: OpenAiSettings,
}

/// Text-generation endpoint settings.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct OpenAiSettings {
    pub model: String,
    pub base_url: String,
    /// Injected from [`API_KEY_ENV`]; ignored if present in YAML.
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
        }
    }
}

impl std::fmt::Debug for OpenAiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiSettings")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key_set", &self.api_key.is_some())
            .finish()
    }
}

/// Loads a static YAML config file (no secrets) and injects the API key from
/// the environment.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let mut config: CliConfig = if config_content.trim().is_empty() {
        info!(config_path = ?path_ref, "Config file is empty, using defaults");
        CliConfig::default()
    } else {
        match serde_yaml::from_str(&config_content) {
            Ok(conf) => {
                info!(config_path = ?path_ref, "Parsed config YAML successfully");
                conf
            }
            Err(e) => {
                error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
                return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
            }
        }
    };

    config.openai.api_key = match env::var(API_KEY_ENV) {
        Ok(key) if !key.trim().is_empty() => Some(key),
        _ => {
            warn!(
                env = API_KEY_ENV,
                "API key missing in environment; text generation will fail"
            );
            None
        }
    };

    config.digest.trace_loaded();
    info!(openai = ?config.openai, "Loaded text-generation settings");
    Ok(config)
}
