// ABOUTME: Integration tests for the model downloader
// ABOUTME: Serves fake model files from a wiremock server

#![cfg(feature = "clip")]

use pixseek::embeddings::downloader::{ensure_model_from, ModelPaths};
use std::fs;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_file(server: &MockServer, route: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_downloads_all_model_files() {
    let mock_server = MockServer::start().await;
    mount_file(&mock_server, "/onnx/vision_model.onnx", b"vision").await;
    mount_file(&mock_server, "/onnx/text_model.onnx", b"text").await;
    mount_file(&mock_server, "/tokenizer.json", b"{}").await;

    let temp = TempDir::new().unwrap();
    let models_dir = temp.path().join("models");
    let uri = mock_server.uri();

    // Run blocking client in a blocking context
    let dir = models_dir.clone();
    let result = tokio::task::spawn_blocking(move || ensure_model_from(&uri, &dir))
        .await
        .unwrap();

    let paths = result.unwrap();
    assert!(paths.exist());
    assert_eq!(fs::read(&paths.vision_model_path).unwrap(), b"vision");
    assert_eq!(fs::read(&paths.tokenizer_path).unwrap(), b"{}");
    assert_eq!(paths.text_model_path, ModelPaths::in_dir(&models_dir).text_model_path);
}

#[tokio::test]
async fn test_http_error_names_the_file() {
    let mock_server = MockServer::start().await;
    mount_file(&mock_server, "/onnx/vision_model.onnx", b"vision").await;
    Mock::given(method("GET"))
        .and(path("/onnx/text_model.onnx"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let temp = TempDir::new().unwrap();
    let dir = temp.path().to_path_buf();
    let uri = mock_server.uri();

    let result = tokio::task::spawn_blocking(move || ensure_model_from(&uri, &dir))
        .await
        .unwrap();

    match result {
        Err(pixseek::Error::Embedding(msg)) => {
            assert!(msg.contains("text_model.onnx"));
            assert!(msg.contains("404"));
        }
        Err(other) => panic!("Expected embedding error, got {}", other),
        Ok(_) => panic!("Expected download failure"),
    }
    // the vision file finished before the failure and is kept
    assert!(ModelPaths::in_dir(temp.path()).vision_model_path.exists());
}
