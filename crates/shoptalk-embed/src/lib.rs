//! shoptalk-embed
//!
//! Text embedding for notes and manual chunks: a local all-MiniLM-L6-v2
//! checkpoint run through candle, mean-pooled and L2-normalized to 384
//! dimensions. `APP_USE_FAKE_EMBEDDINGS=1` swaps in a deterministic hashing
//! embedder for tests and development.

pub mod device;
pub mod pool;
pub mod tokenize;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::Tokenizer;
use tracing::{debug, info};

use shoptalk_core::traits::Embedder;
use shoptalk_core::{Error, Result};

use crate::device::select_device;
use crate::pool::masked_mean_l2;
use crate::tokenize::tokenize_to_tensors;

/// Dimensionality of every vector this crate produces; must match the
/// store's vector column.
pub const EMBEDDING_DIM: usize = 384;

const MAX_LEN: usize = 256;

fn emb_err(e: impl std::fmt::Display) -> Error {
    Error::provider("embedding", e)
}

pub struct MiniLmEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
}

impl MiniLmEmbedder {
    pub fn new() -> Result<Self> {
        let device = select_device();
        let model_dir = resolve_model_dir()?;
        info!(dir = %model_dir.display(), "loading MiniLM embedding model");

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            emb_err(format!("failed to load tokenizer from {}: {e}", tokenizer_path.display()))
        })?;

        let config_path = model_dir.join("config.json");
        let config_json =
            std::fs::read_to_string(&config_path).map_err(|e| {
                emb_err(format!("failed to read {}: {e}", config_path.display()))
            })?;
        let config: BertConfig = serde_json::from_str(&config_json).map_err(emb_err)?;

        let weights_path = model_dir.join("pytorch_model.bin");
        let weights = candle_core::pickle::read_all(&weights_path).map_err(|e| {
            emb_err(format!("failed to load weights from {}: {e}", weights_path.display()))
        })?;
        let weights_map: HashMap<String, Tensor> = weights.into_iter().collect();
        let vb = VarBuilder::from_tensors(weights_map, DType::F32, &device);
        let model = BertModel::load(vb, &config).map_err(emb_err)?;

        info!("MiniLM embedding model ready");
        Ok(Self { model, tokenizer, device })
    }

    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let (input_ids, attention_mask) =
            tokenize_to_tensors(&self.tokenizer, text, MAX_LEN, &self.device)?;
        let token_type_ids = input_ids.zeros_like().map_err(emb_err)?;
        let hidden = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))
            .map_err(emb_err)?;
        let pooled = masked_mean_l2(&hidden, &attention_mask).map_err(emb_err)?;
        let vector: Vec<f32> = pooled
            .to_device(&Device::Cpu)
            .and_then(|t| t.squeeze(0))
            .and_then(|t| t.to_vec1())
            .map_err(emb_err)?;
        debug_assert_eq!(vector.len(), EMBEDDING_DIM);
        Ok(vector)
    }
}

impl Embedder for MiniLmEmbedder {
    fn dim(&self) -> usize {
        EMBEDDING_DIM
    }

    fn max_len(&self) -> usize {
        MAX_LEN
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed_one(t)).collect()
    }
}

/// Deterministic token-hash embedder for tests and development. Same input,
/// same vector; no model files needed.
pub struct FakeEmbedder {
    dim: usize,
}

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl Embedder for FakeEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn max_len(&self) -> usize {
        MAX_LEN
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;

        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            let mut v = vec![0f32; self.dim];
            for (i, token) in text.split_whitespace().enumerate() {
                let mut hasher = XxHash64::with_seed(0);
                token.to_lowercase().hash(&mut hasher);
                let h = hasher.finish();
                let idx = (h as usize) % self.dim;
                let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
                v[idx] += val + (i as f32 % 3.0) * 0.01;
            }
            let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
            for x in &mut v {
                *x /= norm;
            }
            out.push(v);
        }
        Ok(out)
    }
}

static DEFAULT_EMBEDDER: OnceLock<Arc<dyn Embedder>> = OnceLock::new();

/// Process-wide embedder, initialized lazily on first use and shared by
/// every retrieval and ingestion path.
pub fn default_embedder() -> Result<Arc<dyn Embedder>> {
    if let Some(embedder) = DEFAULT_EMBEDDER.get() {
        return Ok(embedder.clone());
    }
    let built: Arc<dyn Embedder> = if use_fake_embeddings() {
        debug!("using fake embeddings");
        Arc::new(FakeEmbedder::new(EMBEDDING_DIM))
    } else {
        Arc::new(MiniLmEmbedder::new()?)
    };
    Ok(DEFAULT_EMBEDDER.get_or_init(|| built).clone())
}

fn use_fake_embeddings() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn resolve_model_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("APP_MODEL_DIR") {
        let p = PathBuf::from(&dir);
        if p.exists() {
            return Ok(p);
        }
    }
    if let Ok(dir) = std::env::var("MODEL_DIR") {
        let p = PathBuf::from(&dir);
        if p.exists() {
            return Ok(p);
        }
    }
    for candidate in ["models/all-MiniLM-L6-v2", "../models/all-MiniLM-L6-v2"] {
        let p = Path::new(candidate);
        if p.exists() {
            return Ok(p.to_path_buf());
        }
    }
    Err(emb_err("could not locate the all-MiniLM-L6-v2 model directory"))
}
