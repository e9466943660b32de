//! Engine and per-model configuration

use candle_core::Device;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{EngineError, Result};

/// Context window used when a completion config does not set one.
pub const DEFAULT_CONTEXT_LENGTH: usize = 2048;

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Models to load; callers select one by name at invoke time.
    pub models: Vec<ModelConfig>,

    /// Log filter applied by [`crate::logging::init`], e.g. "info" or
    /// "model_engine=debug".
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            models: Vec::new(),
            log_filter: default_log_filter(),
        }
    }
}

/// Configuration for one backend, tagged by backend family.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelConfig {
    /// Sentence-embedding backend.
    Embedding(EmbeddingConfig),
    /// Text-completion backend.
    Completion(CompletionConfig),
}

impl ModelConfig {
    /// Name callers use to select this model.
    pub fn name(&self) -> &str {
        match self {
            ModelConfig::Embedding(config) => &config.name,
            ModelConfig::Completion(config) => &config.name,
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            ModelConfig::Embedding(config) => config.validate(),
            ModelConfig::Completion(config) => config.validate(),
        }
    }
}

/// Settings for a sentence-embedding model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Name callers use to select this model.
    pub name: String,

    /// Directory holding config.json, tokenizer.json and model.safetensors.
    pub path: PathBuf,

    /// Device string: "cpu", "cuda" or "cuda:N".
    #[serde(default = "default_device")]
    pub device: String,
}

impl EmbeddingConfig {
    fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        validate_path(&self.path)?;
        DeviceRequest::parse(&self.device)?;
        Ok(())
    }
}

/// Settings for a quantized text-completion model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Name callers use to select this model.
    pub name: String,

    /// Path to the quantized GGUF weights file.
    pub path: PathBuf,

    /// Path to the tokenizer.json used for prompt encoding.
    pub tokenizer: PathBuf,

    /// Maximum number of tokens the runtime may hold in its context.
    #[serde(default = "default_context_length")]
    pub context_length: usize,

    /// Device string: "cpu", "cuda" or "cuda:N".
    #[serde(default = "default_device")]
    pub device: String,
}

impl CompletionConfig {
    fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        validate_path(&self.path)?;
        validate_path(&self.tokenizer)?;
        if self.context_length == 0 {
            return Err(EngineError::Configuration {
                message: "must be greater than zero".to_string(),
                parameter: "context_length".to_string(),
            });
        }
        DeviceRequest::parse(&self.device)?;
        Ok(())
    }
}

/// Parsed form of a config device string, independent of available hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceRequest {
    /// Host CPU.
    Cpu,
    /// CUDA device by ordinal.
    Cuda(usize),
}

impl DeviceRequest {
    /// Parse a device string ("cpu", "cuda", "cuda:N").
    pub fn parse(device: &str) -> Result<Self> {
        if device == "cpu" {
            return Ok(DeviceRequest::Cpu);
        }
        if device == "cuda" {
            return Ok(DeviceRequest::Cuda(0));
        }
        if let Some(ordinal) = device.strip_prefix("cuda:") {
            let ordinal = ordinal.parse().map_err(|_| EngineError::Configuration {
                message: format!("invalid CUDA ordinal in '{}'", device),
                parameter: "device".to_string(),
            })?;
            return Ok(DeviceRequest::Cuda(ordinal));
        }
        Err(EngineError::Configuration {
            message: format!("unknown device '{}', expected cpu, cuda or cuda:N", device),
            parameter: "device".to_string(),
        })
    }

    /// Materialize the requested device, failing if the hardware is absent.
    pub fn resolve(self) -> Result<Device> {
        match self {
            DeviceRequest::Cpu => Ok(Device::Cpu),
            DeviceRequest::Cuda(ordinal) => Ok(Device::new_cuda(ordinal)?),
        }
    }
}

impl EngineConfig {
    /// Check the configuration for structural problems before any load.
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for model in &self.models {
            model.validate()?;
            if !seen.insert(model.name()) {
                return Err(EngineError::Configuration {
                    message: format!("duplicate model name '{}'", model.name()),
                    parameter: "name".to_string(),
                });
            }
        }
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(EngineError::Configuration {
            message: "model name cannot be empty".to_string(),
            parameter: "name".to_string(),
        });
    }
    Ok(())
}

fn validate_path(path: &std::path::Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(EngineError::Configuration {
            message: "path cannot be empty".to_string(),
            parameter: "path".to_string(),
        });
    }
    Ok(())
}

fn default_log_filter() -> String {
    "info".to_string()
}

fn default_device() -> String {
    "cpu".to_string()
}

fn default_context_length() -> usize {
    DEFAULT_CONTEXT_LENGTH
}
