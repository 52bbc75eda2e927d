//! Local transformer embedding provider.
//!
//! Runs a BERT-style sentence encoder on CPU via Candle, with weights
//! fetched from the Hugging Face Hub on first use. The default model is a
//! multilingual sentence encoder, which matters for a corpus that is
//! largely Russian-language fund documentation.

use crate::embedding::EmbeddingProvider;
use crate::errors::{RagError, Result};
use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use hf_hub::{api::sync::Api, Repo, RepoType};
use std::sync::Arc;
use tokenizers::Tokenizer;

/// Sentence encoder backed by Candle
pub struct LocalEmbedder {
    model: Arc<BertModel>,
    tokenizer: Arc<Tokenizer>,
    device: Device,
    dimension: usize,
}

impl LocalEmbedder {
    /// Load the encoder, downloading weights on first use.
    ///
    /// Fails with `DimensionMismatch` when the model's hidden size does
    /// not match the configured embedding dimension; serving queries with
    /// a mismatched index would be unsound.
    pub fn new(model_id: &str, dimension: usize) -> Result<Self> {
        let device = Device::Cpu;

        let api =
            Api::new().map_err(|e| RagError::EmbeddingFailure(format!("hub api: {}", e)))?;
        let repo = api.repo(Repo::new(model_id.to_string(), RepoType::Model));

        let config_path = repo
            .get("config.json")
            .map_err(|e| RagError::EmbeddingFailure(format!("model config download: {}", e)))?;
        let tokenizer_path = repo
            .get("tokenizer.json")
            .map_err(|e| RagError::EmbeddingFailure(format!("tokenizer download: {}", e)))?;
        let weights_path = repo
            .get("model.safetensors")
            .map_err(|e| RagError::EmbeddingFailure(format!("weights download: {}", e)))?;

        let config_contents = std::fs::read_to_string(config_path)?;
        let config: BertConfig = serde_json::from_str(&config_contents)?;

        if config.hidden_size != dimension {
            return Err(RagError::DimensionMismatch {
                expected: dimension,
                actual: config.hidden_size,
            });
        }

        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| RagError::EmbeddingFailure(format!("tokenizer load: {}", e)))?;

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device)
                .map_err(|e| RagError::EmbeddingFailure(format!("weights load: {}", e)))?
        };

        let model = BertModel::load(vb, &config)
            .map_err(|e| RagError::EmbeddingFailure(format!("model load: {}", e)))?;

        Ok(Self {
            model: Arc::new(model),
            tokenizer: Arc::new(tokenizer),
            device,
            dimension,
        })
    }

    fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| RagError::EmbeddingFailure(format!("tokenization: {}", e)))?;

        let batch_size = texts.len();
        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0);

        let mut flat_ids = vec![0u32; batch_size * max_len];
        let mut flat_mask = vec![0u32; batch_size * max_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            flat_ids[i * max_len..i * max_len + ids.len()].copy_from_slice(ids);
            flat_mask[i * max_len..i * max_len + mask.len()].copy_from_slice(mask);
        }

        let token_ids = Tensor::from_vec(flat_ids, (batch_size, max_len), &self.device)
            .map_err(tensor_err)?;
        let attention_mask = Tensor::from_vec(flat_mask, (batch_size, max_len), &self.device)
            .map_err(tensor_err)?;

        let hidden = self
            .model
            .forward(&token_ids, &attention_mask, None)
            .map_err(tensor_err)?;

        let pooled = mean_pool(&hidden, &attention_mask)?;

        pooled.to_vec2::<f32>().map_err(tensor_err)
    }
}

/// Mean pooling over the sequence dimension, weighted by attention mask
fn mean_pool(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    let mask = attention_mask
        .unsqueeze(2)
        .map_err(tensor_err)?
        .expand(hidden.shape())
        .map_err(tensor_err)?
        .to_dtype(hidden.dtype())
        .map_err(tensor_err)?;

    let summed = (hidden * &mask)
        .map_err(tensor_err)?
        .sum(1)
        .map_err(tensor_err)?;
    let counts = mask
        .sum(1)
        .map_err(tensor_err)?
        .clamp(1e-9, f64::MAX)
        .map_err(tensor_err)?;

    summed.broadcast_div(&counts).map_err(tensor_err)
}

fn tensor_err(e: candle_core::Error) -> RagError {
    RagError::EmbeddingFailure(format!("encoder forward pass: {}", e))
}

#[async_trait]
impl EmbeddingProvider for LocalEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut batch = self.encode_batch(&[text])?;
        batch
            .pop()
            .ok_or_else(|| RagError::EmbeddingFailure("empty encoder output".to_string()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.encode_batch(texts)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
