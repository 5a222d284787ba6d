//! Shared helpers for the integration tests

#![allow(dead_code)]

use pdf_figures_server::config::{ExtractorConfig, ExtractorProgram, ServerConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const PDF: &[u8] = b"%PDF-1.4\n1 0 obj << /Type /Catalog >> endobj\ntrailer << /Root 1 0 R >>\n%%EOF\n";

/// Extractor that renders one figure per input.
/// Arguments: $1 = input, $3 = image prefix, $5 = data prefix.
pub const ONE_FIGURE: &str = r#"stem=$(basename "$1" .pdf)
printf 'fake png' > "$3$stem-Figure1-1.png"
cat > "$5$stem.json" <<JSON
[{"caption":"Figure 1: Overview.","captionBoundary":{"x1":10.0,"y1":20.0,"x2":200.0,"y2":40.0},"figType":"Figure","imageText":[],"name":"1","page":0,"regionBoundary":{"x1":10.0,"y1":50.0,"x2":200.0,"y2":300.0},"renderDpi":300,"renderURL":"$3$stem-Figure1-1.png"}]
JSON"#;

/// Extractor that fails with a diagnostic on stderr
pub const CRASHING: &str = r#"echo 'Processing...'
echo 'java.io.IOException: Error: End-of-File, expected line' >&2
exit 1"#;

#[cfg(unix)]
pub fn fake_extractor(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-pdffigures.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Server configuration rooted in `root` that runs `extractor`
pub fn test_config(root: &Path, extractor: PathBuf) -> ServerConfig {
    let mut config = ServerConfig {
        upload_dir: root.join("uploads"),
        output_dir: root.join("output"),
        extractor: ExtractorConfig {
            program: ExtractorProgram::Binary(extractor),
            work_dir: None,
            dpi: 300,
            timeout: Duration::from_secs(20),
        },
        ..ServerConfig::default()
    };
    config.download.allow_private_urls = true;
    config.ensure_dirs().unwrap();
    config
}

pub fn dir_entries(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect()
}

/// Hand-built multipart body with the given parts
pub fn multipart_body(boundary: &str, parts: &[MultipartPart<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        match part {
            MultipartPart::File { name, file_name, data } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                        name, file_name
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
            MultipartPart::Text { name, value } => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
    body
}

pub enum MultipartPart<'a> {
    File {
        name: &'a str,
        file_name: &'a str,
        data: &'a [u8],
    },
    Text {
        name: &'a str,
        value: &'a str,
    },
}

/// Serve `router` on an ephemeral local port and return its base URL
pub async fn spawn_server(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}
