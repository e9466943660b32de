//! Sentence-embedding backend backed by candle BERT

use std::error::Error as StdError;
use std::fs;
use std::path::Path;

use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use tokenizers::Tokenizer;
use tracing::info;

use crate::config::{DeviceRequest, EmbeddingConfig};
use crate::error::{EngineError, Result};

/// Sentence embedder over a BERT-family model directory.
///
/// The directory must hold `config.json`, `tokenizer.json` and
/// `model.safetensors`. Output vectors are mean-pooled over the sequence
/// and L2-normalized.
pub struct TextEmbedder {
    name: String,
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
}

impl TextEmbedder {
    /// Load the model directory onto the configured device.
    pub fn load(config: &EmbeddingConfig) -> Result<Self> {
        let device = DeviceRequest::parse(&config.device)?.resolve()?;

        let model_config = fs::read_to_string(config.path.join("config.json"))
            .map_err(|error| load_error(&config.path, error))?;
        let model_config: BertConfig = serde_json::from_str(&model_config)
            .map_err(|error| load_error(&config.path, error))?;

        let tokenizer =
            Tokenizer::from_file(config.path.join("tokenizer.json")).map_err(|error| {
                EngineError::Tokenizer {
                    message: format!(
                        "failed to load {}: {}",
                        config.path.join("tokenizer.json").display(),
                        error
                    ),
                }
            })?;

        let weights = config.path.join("model.safetensors");
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights], DTYPE, &device)
                .map_err(|error| load_error(&config.path, error))?
        };
        let model = BertModel::load(vb, &model_config)
            .map_err(|error| load_error(&config.path, error))?;

        info!(
            name = %config.name,
            path = %config.path.display(),
            device = %config.device,
            "loaded embedding model"
        );

        Ok(Self {
            name: config.name.clone(),
            model,
            tokenizer,
            device,
        })
    }

    /// Name callers use to select this model.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Embed one sentence into a normalized vector.
    pub fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let encoding = self.tokenizer.encode(text, true).map_err(|error| {
            EngineError::Tokenizer {
                message: format!("tokenization failed: {}", error),
            }
        })?;
        let ids = encoding.get_ids();
        if ids.is_empty() {
            return Err(EngineError::Tokenizer {
                message: "input tokenized to an empty sequence".to_string(),
            });
        }

        let input_ids = Tensor::new(ids, &self.device)?.unsqueeze(0)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(&input_ids, &token_type_ids, None)?;
        pool_and_normalize(&hidden)
    }
}

fn load_error(path: &Path, error: impl StdError + Send + Sync + 'static) -> EngineError {
    EngineError::ModelLoad {
        message: error.to_string(),
        path: path.to_path_buf(),
        source: Some(Box::new(error)),
    }
}

/// Collapse `[1, tokens, hidden]` hidden states into one unit-length vector.
fn pool_and_normalize(hidden: &Tensor) -> Result<Vec<f32>> {
    let (_batch, tokens, _hidden) = hidden.dims3()?;
    let pooled = (hidden.sum(1)? / (tokens as f64))?;
    let norm = pooled.sqr()?.sum_keepdim(1)?.sqrt()?;
    let normalized = pooled.broadcast_div(&norm)?;
    Ok(normalized.squeeze(0)?.to_vec1::<f32>()?)
}
