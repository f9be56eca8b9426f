//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.oncoscout.toml` files. Secrets (the reasoning API key, the
//! annotator token) are never stored in the file; only the names of the
//! environment variables that hold them are.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Reasoning service settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Research loop and lookup settings.
    #[serde(default)]
    pub research: ResearchConfig,

    /// Annotation service settings.
    #[serde(default)]
    pub annotator: AnnotatorConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
        }
    }
}

fn default_output() -> String {
    "variant_interpretation_report.tsv".to_string()
}

/// Reasoning service settings (OpenAI-compatible chat completions).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of the chat-completions endpoint.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model name.
    #[serde(default = "default_model")]
    pub model: String,

    /// Temperature for generation. Zero keeps extraction deterministic.
    #[serde(default)]
    pub temperature: f32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Number of retries on transport failure.
    #[serde(default = "default_retries")]
    pub retries: usize,

    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            temperature: 0.0,
            timeout_seconds: default_timeout(),
            retries: default_retries(),
            api_key_env: default_api_key_env(),
        }
    }
}

impl LlmConfig {
    /// Resolve the API key from the configured environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

fn default_base_url() -> String {
    "https://dashscope.aliyuncs.com/compatible-mode/v1".to_string()
}

fn default_model() -> String {
    "qwen-plus".to_string()
}

fn default_timeout() -> u64 {
    300 // research steps wait on both the model and the lookups
}

fn default_retries() -> usize {
    3
}

fn default_api_key_env() -> String {
    "LLM_API_KEY".to_string()
}

/// Research loop and lookup capability settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Maximum reasoning steps per research loop.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    /// Default max results per lookup call.
    #[serde(default = "default_max_results")]
    pub max_results: u64,

    /// Courtesy delay after each lookup request, in milliseconds.
    #[serde(default = "default_lookup_delay_ms")]
    pub lookup_delay_ms: u64,

    /// Timeout for lookup HTTP requests, in seconds.
    #[serde(default = "default_lookup_timeout")]
    pub lookup_timeout_seconds: u64,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            max_results: default_max_results(),
            lookup_delay_ms: default_lookup_delay_ms(),
            lookup_timeout_seconds: default_lookup_timeout(),
        }
    }
}

fn default_max_steps() -> usize {
    40
}

fn default_max_results() -> u64 {
    20
}

fn default_lookup_delay_ms() -> u64 {
    1000
}

fn default_lookup_timeout() -> u64 {
    60
}

/// Annotation service settings. The API token always comes from the
/// `ONCOKB_API_TOKEN` environment variable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnnotatorConfig {
    /// Path to the annotator script. `ONCOKB_ANNOTATOR_PATH` overrides.
    #[serde(default)]
    pub script_path: Option<String>,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(".oncoscout.toml");

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings; optional
    /// flags only override when explicitly provided.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref model) = args.model {
            self.llm.model = model.clone();
        }
        if let Some(ref base_url) = args.base_url {
            self.llm.base_url = base_url.clone();
        }
        if let Some(timeout) = args.timeout {
            self.llm.timeout_seconds = timeout;
        }
        if let Some(max_steps) = args.max_steps {
            self.research.max_steps = max_steps;
        }

        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.llm.model, "qwen-plus");
        assert_eq!(config.llm.api_key_env, "LLM_API_KEY");
        assert_eq!(config.research.max_steps, 40);
        assert_eq!(config.research.max_results, 20);
        assert!(config.annotator.script_path.is_none());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "custom_report.tsv"
verbose = true

[llm]
model = "qwen-max"
temperature = 0.2
retries = 1

[research]
max_steps = 12

[annotator]
script_path = "/opt/oncokb/MafAnnotator.py"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output, "custom_report.tsv");
        assert!(config.general.verbose);
        assert_eq!(config.llm.model, "qwen-max");
        assert_eq!(config.llm.temperature, 0.2);
        assert_eq!(config.llm.retries, 1);
        assert_eq!(config.research.max_steps, 12);
        assert_eq!(
            config.annotator.script_path.as_deref(),
            Some("/opt/oncokb/MafAnnotator.py")
        );
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[llm]"));
        assert!(toml_str.contains("[research]"));
        assert!(toml_str.contains("[annotator]"));
    }

    #[test]
    fn test_resolve_api_key_ignores_blank_values() {
        let mut config = LlmConfig::default();
        config.api_key_env = "ONCOSCOUT_CONFIG_TEST_KEY".to_string();
        std::env::set_var("ONCOSCOUT_CONFIG_TEST_KEY", "   ");
        assert!(config.resolve_api_key().is_none());
        std::env::set_var("ONCOSCOUT_CONFIG_TEST_KEY", "sk-real");
        assert_eq!(config.resolve_api_key().as_deref(), Some("sk-real"));
    }
}
