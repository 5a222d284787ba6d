//! PDF Figures Server Library
//!
//! Extracts figures and tables from PDFs with an external pdffigures2-style
//! tool and publishes the rendered images:
//! - REST: `POST /api/extract` (upload or `pdf_url`), `GET /api/health`
//! - Static images under `/resources/<job>/<file>`
//! - MCP: `extract_figures_from_pdf` over streamable HTTP (`/mcp`) or stdio

pub mod client;
pub mod config;
pub mod error;
pub mod extractor;
pub mod http;
pub mod server;
pub mod service;
pub mod source;

pub use config::ServerConfig;
pub use error::{Error, Result};
pub use extractor::Figure;
pub use http::{create_router, serve};
pub use server::FigureServer;
pub use service::ExtractionService;
