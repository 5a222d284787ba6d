//! Staging of incoming PDFs on local storage

use crate::error::{Error, Result};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::io::AsyncReadExt;

/// Magic bytes every PDF starts with
const PDF_MAGIC: &[u8] = b"%PDF";

/// Name used when a URL carries no usable file name
const FALLBACK_NAME: &str = "document.pdf";

/// Check the PDF magic header
pub fn has_pdf_header(data: &[u8]) -> bool {
    data.len() >= PDF_MAGIC.len() && &data[..PDF_MAGIC.len()] == PDF_MAGIC
}

/// Validate the header of a file that is already on disk
pub async fn validate_pdf_file(path: &Path) -> Result<()> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut head = [0u8; 4];
    let mut read = 0;
    while read < head.len() {
        let n = file.read(&mut head[read..]).await?;
        if n == 0 {
            break;
        }
        read += n;
    }

    if !has_pdf_header(&head[..read]) {
        return Err(Error::InvalidPdf {
            reason: "Downloaded data is not a valid PDF file".to_string(),
        });
    }
    Ok(())
}

/// Keep only characters that are safe in a file name and in a URL path
fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim_start_matches('.')
        .to_string()
}

fn has_pdf_extension(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(".pdf")
}

/// Derive the staged file name for an uploaded file.
///
/// Only the last path component of the client-supplied name is kept.
pub fn staged_filename_for_upload(original: &str) -> Result<String> {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if base.is_empty() {
        return Err(Error::EmptyFilename);
    }
    if !has_pdf_extension(base) {
        return Err(Error::NotPdfFilename {
            name: base.to_string(),
        });
    }

    let sanitized = sanitize_file_name(base);
    if sanitized.len() <= ".pdf".len() {
        return Ok(FALLBACK_NAME.to_string());
    }
    Ok(sanitized)
}

/// Derive the staged file name for a PDF fetched from a URL.
///
/// The last path segment is used and `.pdf` is appended when missing.
pub fn staged_filename_for_url(url: &url::Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();
    let decoded = percent_decode(segment);
    let mut name = sanitize_file_name(decoded.trim());
    if name.is_empty() {
        return FALLBACK_NAME.to_string();
    }
    if !has_pdf_extension(&name) {
        name.push_str(".pdf");
    }
    name
}

fn percent_decode(segment: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(segment.as_bytes())).into_owned()
}

/// Per-request staging directory inside the upload folder.
///
/// The directory and everything in it is deleted when the value is dropped,
/// so staged files never outlive the request that created them.
#[derive(Debug)]
pub struct StagingArea {
    dir: TempDir,
}

impl StagingArea {
    /// Create a fresh staging directory under `upload_dir`
    pub fn new(upload_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(upload_dir)?;
        let dir = tempfile::Builder::new()
            .prefix("staging-")
            .tempdir_in(upload_dir)?;
        Ok(Self { dir })
    }

    /// Root of the staging directory
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Destination path for a staged file
    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.dir.path().join(file_name)
    }

    /// Validate and write uploaded bytes, returning the staged path
    pub async fn stage_bytes(&self, file_name: &str, data: &[u8]) -> Result<PathBuf> {
        if !has_pdf_header(data) {
            return Err(Error::InvalidPdf {
                reason: "Uploaded data is not a valid PDF file".to_string(),
            });
        }
        let path = self.path_for(file_name);
        tokio::fs::write(&path, data).await?;
        Ok(path)
    }
}

/// Check if an IP address is private/reserved (loopback, link-local, private ranges, etc.)
pub(crate) fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()                           // 127.0.0.0/8
                || v4.is_private()                     // 10/8, 172.16/12, 192.168/16
                || v4.is_link_local()                  // 169.254/16 (cloud metadata!)
                || v4.is_broadcast()                   // 255.255.255.255
                || v4.is_unspecified()                 // 0.0.0.0
                || v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64  // CGNAT 100.64/10
        }
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return is_private_ip(&IpAddr::V4(v4));
            }
            v6.is_loopback()                           // ::1
                || v6.is_unspecified()                 // ::
                || {
                    let segments = v6.segments();
                    // fc00::/7 (unique local)
                    (segments[0] & 0xFE00) == 0xFC00
                    // fe80::/10 (link-local)
                    || (segments[0] & 0xFFC0) == 0xFE80
                }
        }
    }
}

/// Parse a user-supplied URL, accepting only http and https
pub fn parse_source_url(url_str: &str) -> Result<url::Url> {
    let parsed = url::Url::parse(url_str.trim()).map_err(|e| Error::SourceResolution {
        reason: format!("Invalid URL: {}", e),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(Error::SourceResolution {
            reason: format!("Unsupported URL scheme: {}", other),
        }),
    }
}

/// Check URL for SSRF by resolving DNS and verifying IPs are public
pub async fn check_ssrf(url: &url::Url) -> Result<()> {
    let host = url.host_str().ok_or_else(|| Error::SourceResolution {
        reason: "URL has no host".to_string(),
    })?;
    let host = host.trim_start_matches('[').trim_end_matches(']');

    let port = url.port_or_known_default().unwrap_or(443);

    let addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| Error::SourceResolution {
            reason: format!("DNS resolution failed for {}: {}", host, e),
        })?;

    for addr in addrs {
        if is_private_ip(&addr.ip()) {
            return Err(Error::SsrfBlocked {
                url: url.to_string(),
            });
        }
    }

    Ok(())
}
