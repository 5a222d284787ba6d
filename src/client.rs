//! Client for a running extraction server
//!
//! Uploads a local PDF to `/api/extract` and downloads every rendered figure
//! into a local directory.

use crate::error::{Error, Result};
use crate::extractor::Figure;
use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use url::Url;

/// Default extraction endpoint of a locally running server
pub const DEFAULT_ENDPOINT: &str = "http://localhost:5001/api/extract";

/// Make sure `dir` exists and is writable, returning its absolute path
pub fn setup_output_directory(dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let dir = std::fs::canonicalize(dir)?;

    // Probe writability with a throwaway file
    tempfile::tempfile_in(&dir).map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("No write permission for directory {}: {}", dir.display(), e),
        ))
    })?;

    tracing::info!(dir = %dir.display(), "output directory ready");
    Ok(dir)
}

/// Parse the server response: a list of figures or a single figure object
pub fn parse_response(value: serde_json::Value) -> Result<Vec<Figure>> {
    match value {
        serde_json::Value::Array(_) => Ok(serde_json::from_value(value)?),
        serde_json::Value::Object(_) => Ok(vec![serde_json::from_value(value)?]),
        _ => Err(Error::OutputCorrupt {
            reason: "server response is neither a figure list nor a figure".to_string(),
        }),
    }
}

/// HTTP client for the extraction server
#[derive(Debug, Clone)]
pub struct ExtractionClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl ExtractionClient {
    pub fn new(endpoint: Url) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(600))
            .build()?;
        Ok(Self { http, endpoint })
    }

    /// Upload `pdf` for extraction and save the rendered figures to `output_dir`
    pub async fn extract_file(&self, pdf: &Path, output_dir: &Path) -> Result<Vec<Figure>> {
        if !pdf.is_file() {
            return Err(Error::SourceResolution {
                reason: format!("Invalid input path, expected a file: {}", pdf.display()),
            });
        }
        let output_dir = setup_output_directory(output_dir)?;

        tracing::info!(input = %pdf.display(), endpoint = %self.endpoint, "extracting figures and tables");
        let data = tokio::fs::read(pdf).await?;
        let file_name = pdf
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string());
        let part = reqwest::multipart::Part::bytes(data)
            .file_name(file_name)
            .mime_str("application/pdf")?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .http
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::DownloadFailed {
                reason: format!("extraction request failed with status {}: {}", status, body),
            });
        }

        let body = response.bytes().await?;
        let figures = parse_response(serde_json::from_slice(&body)?)?;
        tracing::info!(input = %pdf.display(), figures = figures.len(), "extraction successful");

        for figure in &figures {
            if let (Some(url), Some(name)) = (figure.render_url.as_deref(), figure.image_file_name()) {
                let dest = output_dir.join(name);
                self.download_file(url, &dest).await?;
            }
        }

        Ok(figures)
    }

    async fn download_file(&self, url: &str, dest: &Path) -> Result<()> {
        tracing::debug!(%url, dest = %dest.display(), "downloading figure");
        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(Error::DownloadFailed {
                reason: format!("{} returned {}", url, response.status()),
            });
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        Ok(())
    }
}
