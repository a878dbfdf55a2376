//! Configuration management for the chart engine
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (graph-studio.toml)
//! - The XDG config directory
//! - Environment variables (GRAPH_STUDIO__*)
//!
//! ## Example config file (graph-studio.toml):
//! ```toml
//! [ai]
//! base_url = "http://localhost:11434/v1"
//! model = "llama3.1"
//! timeout_secs = 20
//!
//! [patch]
//! readonly_paths = ["/data", "/version"]
//!
//! [store]
//! path = "./projects"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ai_edit::{AiEditConfig, GenerationOptions, OpenAiCompatibleGenerator};
use crate::infer::DEFAULT_SAMPLE_SIZE;
use crate::patch::{PatchEngine, DEFAULT_READONLY_PATHS};
use crate::store::FileProjectStore;

/// Main configuration for the engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Text-generation provider and edit limits
    #[serde(default)]
    pub ai: AiConfig,

    /// Patch engine settings
    #[serde(default)]
    pub patch: PatchConfig,

    /// Project store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Column inference settings
    #[serde(default)]
    pub infer: InferConfig,
}

/// AI-edit configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiConfig {
    /// Base URL of an OpenAI-compatible API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Bearer key; usually supplied through GRAPH_STUDIO__AI__API_KEY
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Character budget for the serialized spec in the prompt
    #[serde(default = "default_prompt_char_budget")]
    pub prompt_char_budget: usize,

    /// Category labels listed per column in the prompt
    #[serde(default = "default_sample_labels")]
    pub sample_labels: usize,
}

/// Patch configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchConfig {
    /// Pointer prefixes AI edits may never touch
    #[serde(default = "default_readonly_paths")]
    pub readonly_paths: Vec<String>,
}

/// Store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding one JSON file per project
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

/// Inference configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferConfig {
    /// Rows inspected when inferring column types
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,
}

// Default value functions
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f64 {
    GenerationOptions::default().temperature
}

fn default_max_tokens() -> u32 {
    GenerationOptions::default().max_tokens
}

fn default_timeout_secs() -> u64 {
    AiEditConfig::default().timeout.as_secs()
}

fn default_prompt_char_budget() -> usize {
    AiEditConfig::default().prompt_char_budget
}

fn default_sample_labels() -> usize {
    AiEditConfig::default().sample_labels
}

fn default_readonly_paths() -> Vec<String> {
    DEFAULT_READONLY_PATHS.iter().map(|p| p.to_string()).collect()
}

fn default_store_path() -> PathBuf {
    PathBuf::from("projects")
}

fn default_sample_size() -> usize {
    DEFAULT_SAMPLE_SIZE
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            prompt_char_budget: default_prompt_char_budget(),
            sample_labels: default_sample_labels(),
        }
    }
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            readonly_paths: default_readonly_paths(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl Default for InferConfig {
    fn default() -> Self {
        Self {
            sample_size: default_sample_size(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(None)
    }

    /// Load configuration with one required file layered over the defaults
    pub fn load_from(config_path: &str) -> Result<Self, ConfigError> {
        Self::load_with(Some(config_path))
    }

    fn load_with(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["graph-studio.toml", ".graph-studio.toml", "config/graph-studio.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "familiar", "graph-studio") {
            let xdg_config = config_dir.config_dir().join("graph-studio.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Load from environment variables (GRAPH_STUDIO__*)
        builder = builder.add_source(
            Environment::with_prefix("GRAPH_STUDIO")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Edit limits for an [`AiEditor`](crate::ai_edit::AiEditor)
    pub fn ai_edit_config(&self) -> AiEditConfig {
        AiEditConfig {
            generation: GenerationOptions {
                temperature: self.ai.temperature,
                max_tokens: self.ai.max_tokens,
            },
            timeout: Duration::from_secs(self.ai.timeout_secs),
            prompt_char_budget: self.ai.prompt_char_budget,
            sample_labels: self.ai.sample_labels,
        }
    }

    pub fn patch_engine(&self) -> PatchEngine {
        PatchEngine::new(self.patch.readonly_paths.clone())
    }

    pub fn generator(&self) -> OpenAiCompatibleGenerator {
        OpenAiCompatibleGenerator::new(self.ai.base_url.clone(), self.ai.model.clone(), self.ai.api_key.clone())
    }

    /// Store path (resolves relative paths against the working directory)
    pub fn store_path(&self) -> PathBuf {
        if self.store.path.is_absolute() {
            self.store.path.clone()
        } else {
            std::env::current_dir().unwrap_or_default().join(&self.store.path)
        }
    }

    pub fn project_store(&self) -> FileProjectStore {
        FileProjectStore::new(self.store_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.patch.readonly_paths, vec!["/data", "/version"]);
        assert_eq!(config.ai_edit_config(), AiEditConfig::default());
    }

    #[test]
    fn test_serialize_config() {
        let config = EngineConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[ai]"));
        assert!(toml_str.contains("[patch]"));
        assert!(!toml_str.contains("api_key"));
    }

    #[test]
    fn test_save_and_load_from() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        let mut config = EngineConfig::default();
        config.ai.timeout_secs = 5;
        config.patch.readonly_paths.push("/exportConfig".to_string());
        config.save(&path).unwrap();

        let loaded = EngineConfig::load_from(path.to_str().unwrap()).unwrap();
        assert_eq!(loaded.ai.timeout_secs, 5);
        assert_eq!(loaded.ai_edit_config().timeout, Duration::from_secs(5));
        assert_eq!(loaded.patch_engine().readonly_paths().len(), 3);
    }
}
