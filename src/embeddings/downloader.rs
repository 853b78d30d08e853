// ABOUTME: Automatic model downloader for the CLIP ViT-B/32 ONNX export
// ABOUTME: Downloads from HuggingFace and caches in the XDG data directory

use crate::{Error, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

const MODEL_BASE_URL: &str = "https://huggingface.co/Xenova/clip-vit-base-patch32/resolve/main";

const MODEL_FILES: [(&str, &str); 3] = [
    ("onnx/vision_model.onnx", "clip-vit-b32-vision.onnx"),
    ("onnx/text_model.onnx", "clip-vit-b32-text.onnx"),
    ("tokenizer.json", "clip-vit-b32-tokenizer.json"),
];

pub struct ModelPaths {
    pub vision_model_path: PathBuf,
    pub text_model_path: PathBuf,
    pub tokenizer_path: PathBuf,
}

impl ModelPaths {
    pub fn in_dir(models_dir: &Path) -> Self {
        ModelPaths {
            vision_model_path: models_dir.join(MODEL_FILES[0].1),
            text_model_path: models_dir.join(MODEL_FILES[1].1),
            tokenizer_path: models_dir.join(MODEL_FILES[2].1),
        }
    }

    fn all(&self) -> [&Path; 3] {
        [
            &self.vision_model_path,
            &self.text_model_path,
            &self.tokenizer_path,
        ]
    }

    pub fn exist(&self) -> bool {
        self.all().iter().all(|p| p.exists())
    }
}

pub fn ensure_model(models_dir: &Path) -> Result<ModelPaths> {
    ensure_model_from(MODEL_BASE_URL, models_dir)
}

pub fn ensure_model_from(base_url: &str, models_dir: &Path) -> Result<ModelPaths> {
    let paths = ModelPaths::in_dir(models_dir);
    if paths.exist() {
        return Ok(paths);
    }

    fs::create_dir_all(models_dir)?;
    eprintln!("🔽 Downloading CLIP ViT-B/32 model (first time only)...");

    for ((remote, _), dest) in MODEL_FILES.iter().zip(paths.all()) {
        if !dest.exists() {
            download_file(&format!("{}/{}", base_url, remote), dest, remote)?;
        }
    }

    eprintln!("✅ Model downloaded successfully");
    Ok(paths)
}

fn download_file(url: &str, dest: &Path, display_name: &str) -> Result<()> {
    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(600))
        .build()?;

    info!(url, "downloading model file");
    let response = client.get(url).send()?;

    if !response.status().is_success() {
        return Err(Error::Embedding(format!(
            "Failed to download {}: HTTP {}",
            display_name,
            response.status()
        )));
    }

    let total_size = response.content_length().unwrap_or(0);

    let pb = if total_size > 0 {
        let pb = ProgressBar::new(total_size);
        if let Ok(style) =
            ProgressStyle::default_bar().template("{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.set_message(format!("Downloading {}", display_name));
        Some(pb)
    } else {
        None
    };

    let bytes = response.bytes()?;

    // Write next to the destination first so an interrupted download never looks complete.
    let partial = dest.with_extension("part");
    let mut file = fs::File::create(&partial)?;
    file.write_all(&bytes)?;
    file.sync_all()?;
    fs::rename(&partial, dest)?;

    if let Some(pb) = pb {
        pb.set_position(bytes.len() as u64);
        pb.finish_with_message(format!("Downloaded {}", display_name));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_model_paths_layout() {
        let temp = TempDir::new().unwrap();
        let paths = ModelPaths::in_dir(temp.path());

        assert!(paths.vision_model_path.to_string_lossy().ends_with("vision.onnx"));
        assert!(paths.text_model_path.to_string_lossy().ends_with("text.onnx"));
        assert!(paths.tokenizer_path.to_string_lossy().ends_with("tokenizer.json"));
        assert!(!paths.exist());
    }

    #[test]
    fn test_existing_files_skip_download() {
        let temp = TempDir::new().unwrap();
        let paths = ModelPaths::in_dir(temp.path());
        for p in paths.all() {
            fs::write(p, b"stub").unwrap();
        }

        // unroutable base url: any request would fail
        let resolved = ensure_model_from("http://127.0.0.1:9", temp.path()).unwrap();
        assert_eq!(resolved.tokenizer_path, paths.tokenizer_path);
    }

    #[test]
    fn test_model_urls_format() {
        assert!(MODEL_BASE_URL.starts_with("https://"));
        assert!(MODEL_BASE_URL.contains("huggingface.co"));
    }
}
