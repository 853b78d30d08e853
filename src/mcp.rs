// ABOUTME: Model Context Protocol server implementation
// ABOUTME: Exposes the search job protocol as MCP tools for AI assistants

use crate::{
    model::{SearchKind, SearchRequest, DEFAULT_BATCH_SIZE},
    search::SearchOrchestrator,
    Error,
};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters, ServerHandler},
    model::{CallToolResult, Content, ErrorData as McpError},
    schemars::JsonSchema,
    tool, tool_handler, tool_router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Clone)]
pub struct PixseekMcpService {
    orchestrator: SearchOrchestrator,
    tool_router: ToolRouter<Self>,
}

impl PixseekMcpService {
    pub fn new(orchestrator: SearchOrchestrator) -> Self {
        Self {
            orchestrator,
            tool_router: Self::tool_router(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct SearchImagesRequest {
    /// Folder to scan recursively for jpg, jpeg, png, and gif files
    folder: PathBuf,
    /// "image" or "text"
    kind: String,
    /// Query image path (image searches)
    #[serde(default)]
    query_image: Option<PathBuf>,
    /// Query text (text searches)
    #[serde(default)]
    query_text: Option<String>,
    /// Minimum score in [0, 1] (default: 0)
    #[serde(default)]
    min_score: f32,
    /// Files embedded per batch (default: 32)
    #[serde(default = "default_batch_size")]
    batch_size: usize,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct SearchProgressRequest {
    /// Job id returned by search_images
    job_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct LastSearchRequest {}

/// Caller mistakes become invalid-params; everything else is internal.
fn to_mcp_error(e: Error) -> McpError {
    match e {
        Error::Validation(_) | Error::FolderNotFound(_) | Error::Query(_) | Error::JobNotFound(_) => {
            McpError::invalid_params(e.to_string(), None)
        }
        other => McpError::internal_error(other.to_string(), None),
    }
}

fn json_result<T: Serialize>(value: &T) -> std::result::Result<CallToolResult, McpError> {
    let json_text = serde_json::to_string_pretty(value)
        .map_err(|e| McpError::internal_error(format!("Failed to serialize: {}", e), None))?;
    Ok(CallToolResult::success(vec![Content::text(json_text)]))
}

#[tool_router]
impl PixseekMcpService {
    #[tool(
        description = "Start a similarity search over a folder of images. Returns a job_id to poll with search_progress."
    )]
    async fn search_images(
        &self,
        params: Parameters<SearchImagesRequest>,
    ) -> std::result::Result<CallToolResult, McpError> {
        let params = params.0;
        let kind: SearchKind = params.kind.parse().map_err(to_mcp_error)?;
        let request = SearchRequest {
            folder: params.folder,
            min_score: params.min_score,
            batch_size: params.batch_size,
            kind,
            query_image: params.query_image,
            query_text: params.query_text,
        };

        let job_id = self
            .orchestrator
            .submit(request)
            .await
            .map_err(to_mcp_error)?;
        json_result(&serde_json::json!({ "job_id": job_id }))
    }

    #[tool(
        description = "Get progress for a search job. Results are included once complete is true."
    )]
    async fn search_progress(
        &self,
        params: Parameters<SearchProgressRequest>,
    ) -> std::result::Result<CallToolResult, McpError> {
        let snapshot = self
            .orchestrator
            .progress(&params.0.job_id)
            .map_err(to_mcp_error)?;
        json_result(&snapshot)
    }

    #[tool(description = "Get the most recent search and its results")]
    async fn last_search(
        &self,
        _params: Parameters<LastSearchRequest>,
    ) -> std::result::Result<CallToolResult, McpError> {
        let record = self.orchestrator.last_search().map_err(to_mcp_error)?;
        json_result(&record)
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for PixseekMcpService {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        use rmcp::model::{Implementation, ServerCapabilities, ToolsCapability};

        rmcp::model::ServerInfo {
            protocol_version: rmcp::model::ProtocolVersion::default(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability::default()),
                ..Default::default()
            },
            server_info: Implementation {
                name: "pixseek".to_string(),
                title: Some("Pixseek Image Similarity Search".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Pixseek ranks the images in a folder by similarity to an image or text query. \
                 Call search_images, then poll search_progress until complete is true. \
                 Jobs expire a few minutes after they start."
                    .to_string(),
            ),
        }
    }
}

pub async fn serve_mcp(orchestrator: SearchOrchestrator) -> crate::Result<()> {
    use rmcp::{transport::stdio, ServiceExt};

    let service = PixseekMcpService::new(orchestrator);
    let server = service.serve(stdio()).await.map_err(|e| {
        crate::Error::Filesystem(std::io::Error::other(format!("MCP server failed: {}", e)))
    })?;

    server.waiting().await.map_err(|e| {
        crate::Error::Filesystem(std::io::Error::other(format!("MCP server error: {}", e)))
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::testing::{write_png, LookupModel};
    use crate::search::SearchConfig;
    use rmcp::model::ErrorCode;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn service(model: LookupModel) -> PixseekMcpService {
        let config = SearchConfig {
            poll_interval: Duration::from_millis(5),
            ..Default::default()
        };
        PixseekMcpService::new(SearchOrchestrator::new(Arc::new(model), config))
    }

    fn text_of(result: &CallToolResult) -> String {
        result.content[0]
            .as_text()
            .map(|t| t.text.clone())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_search_then_poll() {
        let temp = TempDir::new().unwrap();
        write_png(&temp.path().join("a.png"), 1);
        let svc = service(
            LookupModel::default()
                .with_image(1, vec![1.0, 0.0])
                .with_text("sunset", vec![1.0, 0.0]),
        );

        let started = svc
            .search_images(Parameters(SearchImagesRequest {
                folder: temp.path().to_path_buf(),
                kind: "text".into(),
                query_image: None,
                query_text: Some("sunset".into()),
                min_score: 0.0,
                batch_size: 32,
            }))
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_str(&text_of(&started)).unwrap();
        let job_id = body["job_id"].as_str().unwrap().to_string();

        svc.orchestrator.wait(&job_id).await.unwrap();
        let progress = svc
            .search_progress(Parameters(SearchProgressRequest { job_id }))
            .await
            .unwrap();
        let snapshot: serde_json::Value = serde_json::from_str(&text_of(&progress)).unwrap();
        assert_eq!(snapshot["complete"], true);
        assert_eq!(snapshot["results"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_bad_kind_and_unknown_job_are_invalid_params() {
        let temp = TempDir::new().unwrap();
        let svc = service(LookupModel::default());

        let err = svc
            .search_images(Parameters(SearchImagesRequest {
                folder: temp.path().to_path_buf(),
                kind: "audio".into(),
                query_image: None,
                query_text: Some("x".into()),
                min_score: 0.0,
                batch_size: 32,
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);

        let err = svc
            .search_progress(Parameters(SearchProgressRequest {
                job_id: "missing".into(),
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
        assert!(err.message.contains("expired or unknown"));
    }

    #[test]
    fn test_internal_errors_map_to_internal() {
        let err = to_mcp_error(Error::Embedding("model crashed".into()));
        assert_eq!(err.code, ErrorCode::INTERNAL_ERROR);
    }
}
