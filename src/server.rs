//! MCP server implementation using rmcp

use crate::extractor::Figure;
use crate::service::ExtractionService;
use anyhow::Result;
use rmcp::{
    handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::*,
    schemars::JsonSchema,
    tool, tool_handler, tool_router,
    transport::streamable_http_server::{
        session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
    },
    ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};

/// Figure extraction MCP server
#[derive(Clone)]
pub struct FigureServer {
    service: ExtractionService,
    tool_router: ToolRouter<Self>,
}

// ============================================================================
// Request/Response types for extract_figures_from_pdf
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExtractFiguresParams {
    /// The URL of a publicly accessible PDF file to be processed
    pub pdf_url: String,
}

#[derive(Debug, Serialize)]
pub struct ExtractFiguresResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Vec<Figure>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Extractor diagnostics when extraction itself failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

// ============================================================================
// Tool implementations
// ============================================================================

#[tool_router]
impl FigureServer {
    pub fn new(service: ExtractionService) -> Self {
        Self {
            service,
            tool_router: Self::tool_router(),
        }
    }

    /// Extract figures and tables from a PDF given by URL
    #[tool(
        description = "Extracts figures and tables from a PDF file provided via URL.

The PDF is processed with PDFFigures 2.0. Returns {\"result\": [...]} where each element carries the caption, figure type, page, bounding boxes (regionBoundary, captionBoundary) and a renderURL pointing at the rendered image. On failure returns {\"error\": \"...\"}."
    )]
    async fn extract_figures_from_pdf(
        &self,
        Parameters(params): Parameters<ExtractFiguresParams>,
    ) -> String {
        let response = self.process_extract_figures(&params).await;
        serde_json::to_string_pretty(&response).unwrap_or_default()
    }
}

impl FigureServer {
    pub async fn process_extract_figures(
        &self,
        params: &ExtractFiguresParams,
    ) -> ExtractFiguresResult {
        match self.service.extract_url(&params.pdf_url).await {
            Ok(figures) => ExtractFiguresResult {
                result: Some(figures),
                error: None,
                detail: None,
            },
            Err(e) => {
                tracing::warn!(error = %e, pdf_url = %params.pdf_url, "extract_figures_from_pdf failed");
                let detail = e.extractor_stderr().map(str::to_owned);
                ExtractFiguresResult {
                    result: None,
                    error: Some(e.client_message()),
                    detail,
                }
            }
        }
    }
}

#[tool_handler]
impl ServerHandler for FigureServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "PDF Extraction Service: extracts figures and tables from PDFs by URL and \
                 returns captions, bounding boxes and links to the rendered images."
                    .into(),
            ),
        }
    }
}

/// MCP over streamable HTTP, for mounting into the axum router
pub fn streamable_http_service(
    service: ExtractionService,
) -> StreamableHttpService<FigureServer, LocalSessionManager> {
    StreamableHttpService::new(
        move || Ok(FigureServer::new(service.clone())),
        LocalSessionManager::default().into(),
        StreamableHttpServerConfig::default(),
    )
}

/// Run the MCP server over stdio
pub async fn run_stdio(service: ExtractionService) -> Result<()> {
    let server = FigureServer::new(service);

    tracing::info!("Figure MCP server ready on stdio, waiting for connections...");

    let running = server.serve(rmcp::transport::io::stdio()).await?;
    running.waiting().await?;

    Ok(())
}
