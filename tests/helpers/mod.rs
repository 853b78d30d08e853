// ABOUTME: Shared fixtures for integration tests
// ABOUTME: A table-driven embedding model and tiny PNG writers

#![allow(dead_code)]

use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use pixseek::{EmbeddingModel, Error, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Images are identified by the red channel of their top-left pixel.
#[derive(Default)]
pub struct TableModel {
    images: HashMap<u8, Vec<f32>>,
    texts: HashMap<String, Vec<f32>>,
    image_calls: AtomicUsize,
}

impl TableModel {
    pub fn image(mut self, red: u8, vector: Vec<f32>) -> Self {
        self.images.insert(red, vector);
        self
    }

    pub fn text(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.texts.insert(text.to_string(), vector);
        self
    }

    pub fn image_calls(&self) -> usize {
        self.image_calls.load(Ordering::SeqCst)
    }
}

impl EmbeddingModel for TableModel {
    fn dim(&self) -> usize {
        2
    }

    fn encode_image(&self, image: &DynamicImage) -> Result<Vec<f32>> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        let red = image.get_pixel(0, 0)[0];
        self.images
            .get(&red)
            .cloned()
            .ok_or_else(|| Error::Embedding(format!("unknown image red={}", red)))
    }

    fn encode_text(&self, text: &str) -> Result<Vec<f32>> {
        self.texts
            .get(text)
            .cloned()
            .ok_or_else(|| Error::Embedding(format!("unknown text '{}'", text)))
    }
}

/// Unit vector whose cosine with [1, 0] is `cosine`.
pub fn at_cosine(cosine: f32) -> Vec<f32> {
    vec![cosine, (1.0 - cosine * cosine).max(0.0).sqrt()]
}

/// Unit vector whose score against [1, 0] is `score`.
pub fn at_score(score: f32) -> Vec<f32> {
    at_cosine(score * 2.0 - 1.0)
}

pub fn write_image(path: &Path, red: u8, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    RgbImage::from_pixel(width, height, Rgb([red, 0, 0]))
        .save(path)
        .unwrap();
}
