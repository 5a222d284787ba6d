//! Request handlers for the REST API

use crate::error::Error;
use crate::extractor::Figure;
use crate::http::error::HttpError;
use crate::service::ExtractionService;
use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::{Form, Json};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::{json, Value};

/// What the client asked to process
#[derive(Debug)]
pub enum ExtractInput {
    Upload { file_name: String, data: Bytes },
    Url(String),
}

#[derive(Debug, Deserialize)]
struct UrlForm {
    pdf_url: Option<String>,
}

/// Service index
pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "PDF Extraction Server",
        "api_base": "/api",
        "mcp_endpoint": "/mcp",
        "resources": "/resources",
    }))
}

/// Liveness probe
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "pdf-extraction-server",
    }))
}

/// Extract figures and tables from an uploaded PDF or a PDF URL.
pub async fn extract(
    State(service): State<ExtractionService>,
    request: Request,
) -> Result<Json<Vec<Figure>>, HttpError> {
    let input = read_extract_input(request).await?;

    let result = match &input {
        ExtractInput::Upload { file_name, data } => service.extract_upload(file_name, data).await,
        ExtractInput::Url(url) => service.extract_url(url).await,
    };

    match result {
        Ok(figures) => Ok(Json(figures)),
        Err(e) => {
            if e.is_client_error() {
                tracing::warn!(error = %e, "rejected extraction request");
            } else {
                tracing::error!(error = %e, "extraction failed");
            }
            Err(e.into())
        }
    }
}

fn form_error(status: StatusCode, text: String) -> HttpError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        HttpError::PayloadTooLarge(text)
    } else {
        Error::MalformedForm { reason: text }.into()
    }
}

/// Pull `file` and `pdf_url` out of a multipart or urlencoded body.
/// Exactly one of them must be present.
pub async fn read_extract_input(request: Request) -> Result<ExtractInput, HttpError> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let mut upload: Option<(String, Bytes)> = None;
    let mut pdf_url: Option<String> = None;

    if content_type.starts_with("multipart/form-data") {
        let mut multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| form_error(e.status(), e.body_text()))?;

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| form_error(e.status(), e.body_text()))?
        {
            let name = field.name().map(str::to_owned);
            match name.as_deref() {
                Some("file") => {
                    let file_name = field.file_name().unwrap_or_default().to_string();
                    let data = field
                        .bytes()
                        .await
                        .map_err(|e| form_error(e.status(), e.body_text()))?;
                    upload = Some((file_name, data));
                }
                Some("pdf_url") => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| form_error(e.status(), e.body_text()))?;
                    pdf_url = Some(text);
                }
                _ => {}
            }
        }
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        let Form(form) = Form::<UrlForm>::from_request(request, &())
            .await
            .map_err(|e| form_error(e.status(), e.body_text()))?;
        pdf_url = form.pdf_url;
    }

    let pdf_url = pdf_url.filter(|url| !url.trim().is_empty());

    match (upload, pdf_url) {
        (Some(_), Some(_)) => Err(Error::ConflictingInput.into()),
        (None, None) => Err(Error::MissingInput.into()),
        (Some((file_name, data)), None) => Ok(ExtractInput::Upload { file_name, data }),
        (None, Some(url)) => Ok(ExtractInput::Url(url)),
    }
}
