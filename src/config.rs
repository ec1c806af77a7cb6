//! Configuration management for shell-ai
//!
//! This module handles loading, parsing, validating, and managing
//! model profiles from the YAML config file and environment variables.

use crate::error::{Result, ShellAiError};
use crate::llm::Message;
use crate::pricing::{ModelPricing, PricingTable};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Replaces `preferences.default_model` when set
pub const MODEL_ENV: &str = "SHELL_AI_MODEL";

const CONFIG_FILE_NAME: &str = "config.yaml";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// User preferences
    #[serde(default)]
    pub preferences: Preferences,
    /// Available model profiles
    pub models: Vec<ModelConfig>,
    /// Extra or replacement prices, merged over the built-in table
    #[serde(default)]
    pub pricing: HashMap<String, ModelPricing>,
}

/// User preferences
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Preferences {
    /// Name of the model profile used when none is requested
    #[serde(default)]
    pub default_model: String,
}

/// One model profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model identifier sent to the endpoint
    pub name: String,
    /// Full chat-completions URL
    pub endpoint: String,
    /// Environment variable holding the API key
    pub auth_env_var: String,
    /// Environment variable holding the organization id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_env_var: Option<String>,
    /// Conversation prefix sent before every query
    #[serde(default)]
    pub prompt: Vec<Message>,
}

/// Credentials resolved from the environment
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// API key
    pub api_key: String,
    /// Optional organization id
    pub organization: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("organization", &self.organization)
            .finish()
    }
}

impl Credentials {
    /// Credentials with only an API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            organization: None,
        }
    }
}

impl ModelConfig {
    /// Resolve the API key and organization id from the environment
    ///
    /// # Errors
    ///
    /// Returns `MissingCredentials` if the key variable is unset or empty.
    pub fn credentials(&self) -> Result<Credentials> {
        let api_key = std::env::var(&self.auth_env_var)
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ShellAiError::MissingCredentials(self.auth_env_var.clone()))?;

        let organization = self
            .org_env_var
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|v| !v.is_empty());

        Ok(Credentials {
            api_key,
            organization,
        })
    }
}

impl Config {
    /// Default config file location (`~/.shell-ai/config.yaml`)
    pub fn default_path() -> Result<PathBuf> {
        Ok(crate::storage::data_dir()?.join(CONFIG_FILE_NAME))
    }

    /// Load configuration from a YAML file and apply environment overrides
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))
            .map_err(|e| ShellAiError::Config(format!("{:#}", e)))?;

        let mut config = Self::from_yaml(&contents)?;
        config.apply_env_vars();

        tracing::debug!(
            "Loaded {} model profile(s) from {}",
            config.models.len(),
            path.display()
        );
        Ok(config)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml).map_err(ShellAiError::from)?;
        Ok(config)
    }

    fn apply_env_vars(&mut self) {
        if let Ok(model) = std::env::var(MODEL_ENV) {
            if !model.is_empty() {
                self.preferences.default_model = model;
            }
        }
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns a configuration error describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.models.is_empty() {
            return Err(ShellAiError::Config("at least one model must be configured".into()).into());
        }

        let mut seen = HashSet::new();
        for model in &self.models {
            if model.name.is_empty() {
                return Err(ShellAiError::Config("model name cannot be empty".into()).into());
            }
            if !seen.insert(model.name.as_str()) {
                return Err(ShellAiError::Config(format!(
                    "model '{}' is configured more than once",
                    model.name
                ))
                .into());
            }
            if model.endpoint.is_empty() {
                return Err(ShellAiError::Config(format!(
                    "model '{}' has an empty endpoint",
                    model.name
                ))
                .into());
            }
            if model.auth_env_var.is_empty() {
                return Err(ShellAiError::Config(format!(
                    "model '{}' has an empty auth_env_var",
                    model.name
                ))
                .into());
            }
        }

        if !self.preferences.default_model.is_empty()
            && self.model(&self.preferences.default_model).is_none()
        {
            return Err(ShellAiError::Config(format!(
                "default model '{}' is not among the configured models",
                self.preferences.default_model
            ))
            .into());
        }

        for (model, pricing) in &self.pricing {
            if pricing.input_per_million < 0.0 || pricing.output_per_million < 0.0 {
                return Err(ShellAiError::Config(format!(
                    "pricing for '{}' cannot be negative",
                    model
                ))
                .into());
            }
        }

        Ok(())
    }

    /// Look up a model profile by name
    pub fn model(&self, name: &str) -> Option<&ModelConfig> {
        self.models.iter().find(|m| m.name == name)
    }

    /// Pick the profile to use: the requested one, else the default, else
    /// the first configured
    pub fn select_model(&self, requested: Option<&str>) -> Result<&ModelConfig> {
        let wanted = requested
            .filter(|name| !name.is_empty())
            .or_else(|| Some(self.preferences.default_model.as_str()).filter(|n| !n.is_empty()));

        match wanted {
            Some(name) => self.model(name).ok_or_else(|| {
                ShellAiError::Config(format!("model '{}' is not configured", name)).into()
            }),
            None => self
                .models
                .first()
                .ok_or_else(|| ShellAiError::Config("no models configured".into()).into()),
        }
    }

    /// Built-in prices with the configured overrides applied
    pub fn pricing_table(&self) -> PricingTable {
        PricingTable::builtin().with_overrides(&self.pricing)
    }
}
