// ABOUTME: ONNX embedding engine for the CLIP ViT-B/32 vision and text towers
// ABOUTME: Handles image preprocessing, tokenization, and inference behind a mutex

use super::{downloader::ModelPaths, EmbeddingModel};
use crate::{util::normalize_vector, Error, Result};
use image::{imageops::FilterType, DynamicImage};
use ndarray::Array4;
use ort::{inputs, session::Session, value::Value};
use parking_lot::Mutex;
use std::path::Path;
use tokenizers::Tokenizer;

const CLIP_DIM: usize = 512;
const IMAGE_SIZE: u32 = 224;
const MAX_TOKENS: usize = 77;

const CLIP_MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];
const CLIP_STD: [f32; 3] = [0.268_629_54, 0.261_302_58, 0.275_777_1];

pub struct ClipEngine {
    vision: Mutex<Session>,
    text: Mutex<Session>,
    tokenizer: Tokenizer,
}

impl ClipEngine {
    pub fn load(paths: &ModelPaths) -> Result<Self> {
        // Initialize ort globally (idempotent)
        ort::init()
            .commit()
            .map_err(|e| Error::Embedding(format!("Failed to initialize ort: {}", e)))?;

        let tokenizer = Tokenizer::from_file(&paths.tokenizer_path)
            .map_err(|e| Error::Embedding(format!("Failed to load tokenizer: {}", e)))?;

        Ok(ClipEngine {
            vision: Mutex::new(load_session(&paths.vision_model_path)?),
            text: Mutex::new(load_session(&paths.text_model_path)?),
            tokenizer,
        })
    }
}

fn load_session(model_path: &Path) -> Result<Session> {
    let model_bytes = std::fs::read(model_path).map_err(|e| {
        Error::Embedding(format!(
            "Failed to read model file {}: {}",
            model_path.display(),
            e
        ))
    })?;

    Session::builder()
        .map_err(|e| Error::Embedding(format!("Failed to create session builder: {}", e)))?
        .commit_from_memory(&model_bytes)
        .map_err(|e| Error::Embedding(format!("Failed to load ONNX model: {}", e)))
}

/// Resize-to-fill and center crop to 224x224, then CLIP-normalize into NCHW.
fn preprocess(image: &DynamicImage) -> Array4<f32> {
    let side = IMAGE_SIZE as usize;
    let rgb = image
        .resize_to_fill(IMAGE_SIZE, IMAGE_SIZE, FilterType::CatmullRom)
        .to_rgb8();

    let mut pixels = Array4::<f32>::zeros((1, 3, side, side));
    for (x, y, pixel) in rgb.enumerate_pixels() {
        for c in 0..3 {
            let value = pixel[c] as f32 / 255.0;
            pixels[[0, c, y as usize, x as usize]] = (value - CLIP_MEAN[c]) / CLIP_STD[c];
        }
    }
    pixels
}

fn extract_embedding(data: &[f32], shape: &[i64]) -> Result<Vec<f32>> {
    // shape should be [1, 512]
    if shape.len() != 2 || shape[0] != 1 || shape[1] as usize != CLIP_DIM {
        return Err(Error::Embedding(format!(
            "Unexpected output shape: got {:?}, expected [1, {}]",
            shape, CLIP_DIM
        )));
    }
    Ok(normalize_vector(data[..CLIP_DIM].to_vec()))
}

impl EmbeddingModel for ClipEngine {
    fn dim(&self) -> usize {
        CLIP_DIM
    }

    fn encode_image(&self, image: &DynamicImage) -> Result<Vec<f32>> {
        let side = IMAGE_SIZE as usize;
        let pixel_values = Value::from_array((vec![1, 3, side, side], preprocess(image).into_raw_vec()))
            .map_err(|e| Error::Embedding(format!("Failed to create pixel tensor: {}", e)))?;

        let mut session = self.vision.lock();
        let outputs = session
            .run(inputs!["pixel_values" => pixel_values])
            .map_err(|e| Error::Embedding(format!("ONNX vision inference failed: {}", e)))?;

        let (shape, data) = outputs["image_embeds"]
            .try_extract_tensor::<f32>()
            .map_err(|e| Error::Embedding(format!("Failed to extract image_embeds: {}", e)))?;

        extract_embedding(data, shape)
    }

    fn encode_text(&self, text: &str) -> Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| Error::Embedding(format!("Tokenization failed: {}", e)))?;

        let len = encoding.get_ids().len().min(MAX_TOKENS);
        let input_ids: Vec<i64> = encoding.get_ids()[..len]
            .iter()
            .map(|&id| id as i64)
            .collect();
        let attention_mask: Vec<i64> = encoding.get_attention_mask()[..len]
            .iter()
            .map(|&mask| mask as i64)
            .collect();

        let input_ids_value = Value::from_array((vec![1, len], input_ids))
            .map_err(|e| Error::Embedding(format!("Failed to create input_ids tensor: {}", e)))?;
        let attention_mask_value = Value::from_array((vec![1, len], attention_mask)).map_err(
            |e| Error::Embedding(format!("Failed to create attention_mask tensor: {}", e)),
        )?;

        let mut session = self.text.lock();
        let outputs = session
            .run(inputs![
                "input_ids" => input_ids_value,
                "attention_mask" => attention_mask_value
            ])
            .map_err(|e| Error::Embedding(format!("ONNX text inference failed: {}", e)))?;

        let (shape, data) = outputs["text_embeds"]
            .try_extract_tensor::<f32>()
            .map_err(|e| Error::Embedding(format!("Failed to extract text_embeds: {}", e)))?;

        extract_embedding(data, shape)
    }
}
