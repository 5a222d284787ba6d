//! Remote PDF download with optional parallel byte-range chunks

use crate::config::DownloadConfig;
use crate::error::{Error, Result};
use crate::source::resolver::{check_ssrf, is_private_ip};
use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, RANGE};
use reqwest::redirect::Policy;
use reqwest::StatusCode;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use url::{Host, Url};

const MAX_REDIRECTS: usize = 10;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// How a download was performed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStrategy {
    /// Fetched as concurrent `Range` requests
    Chunked { chunks: usize },
    /// Fetched as one streamed GET
    SingleStream,
}

/// Result of a completed download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub bytes: u64,
    pub strategy: DownloadStrategy,
}

/// Why the chunked path was abandoned
enum ChunkError {
    /// Server advertised ranges but did not serve one; retry as a single stream
    NotHonored(String),
    Failed(Error),
}

impl From<reqwest::Error> for ChunkError {
    fn from(e: reqwest::Error) -> Self {
        ChunkError::Failed(Error::HttpRequest(e))
    }
}

/// Split `[0, len)` into at most `chunks` contiguous inclusive ranges
pub fn chunk_ranges(len: u64, chunks: usize) -> Vec<(u64, u64)> {
    if len == 0 {
        return Vec::new();
    }
    let n = (chunks.max(1) as u64).min(len);
    let base = len / n;
    let remainder = len % n;

    let mut ranges = Vec::with_capacity(n as usize);
    let mut start = 0;
    for i in 0..n {
        let size = base + u64::from(i < remainder);
        ranges.push((start, start + size - 1));
        start += size;
    }
    ranges
}

/// Keep only addresses that are safe to connect to
fn public_addrs(addrs: impl IntoIterator<Item = SocketAddr>) -> Vec<SocketAddr> {
    addrs
        .into_iter()
        .filter(|addr| !is_private_ip(&addr.ip()))
        .collect()
}

/// Whether a redirect hop may be followed. Host names are checked when they
/// resolve; IP literals never reach the resolver so they are checked here.
fn redirect_allowed(url: &Url) -> bool {
    match url.host() {
        Some(Host::Ipv4(ip)) => !is_private_ip(&IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => !is_private_ip(&IpAddr::V6(ip)),
        Some(Host::Domain(_)) => true,
        None => false,
    }
}

/// DNS resolver that drops private and loopback addresses, so every
/// connection (redirects included) lands on a public host
#[derive(Debug)]
struct PublicResolver;

async fn resolve_public(host: String) -> std::result::Result<Addrs, BoxError> {
    let resolved = tokio::net::lookup_host((host.as_str(), 0)).await?;
    let public = public_addrs(resolved);
    if public.is_empty() {
        return Err(format!("{} does not resolve to a public address", host).into());
    }
    Ok(Box::new(public.into_iter()))
}

impl Resolve for PublicResolver {
    fn resolve(&self, name: Name) -> Resolving {
        Box::pin(resolve_public(name.as_str().to_string()))
    }
}

fn public_redirects() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            attempt.error("too many redirects")
        } else if !redirect_allowed(attempt.url()) {
            let target = attempt.url().to_string();
            tracing::warn!(%target, "blocked redirect to private address");
            attempt.error(format!("redirect to {} not allowed", target))
        } else {
            attempt.follow()
        }
    })
}

/// HTTP downloader for remote PDFs
#[derive(Debug, Clone)]
pub struct Downloader {
    client: reqwest::Client,
    config: DownloadConfig,
}

impl Downloader {
    pub fn new(config: DownloadConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder().timeout(config.timeout);
        builder = if config.allow_private_urls {
            builder.redirect(Policy::limited(MAX_REDIRECTS))
        } else {
            builder
                .dns_resolver(Arc::new(PublicResolver))
                .redirect(public_redirects())
        };
        let client = builder.build().map_err(Error::HttpRequest)?;
        Ok(Self { client, config })
    }

    /// Download `url` into `dest`.
    ///
    /// Uses parallel range requests when the server advertises
    /// `Accept-Ranges: bytes` and the body is large enough; otherwise,
    /// or when a range is not honored, streams the body in one request.
    pub async fn download_to(&self, url: &Url, dest: &Path) -> Result<DownloadOutcome> {
        if !self.config.allow_private_urls {
            check_ssrf(url).await?;
        }

        if self.config.parallel_chunks > 1 {
            if let Some(len) = self.probe_range_support(url).await {
                if len >= self.config.min_chunked_size {
                    self.check_size(len)?;
                    match self.download_chunked(url, len, dest).await {
                        Ok(chunks) => {
                            tracing::debug!(%url, bytes = len, chunks, "chunked download complete");
                            return Ok(DownloadOutcome {
                                bytes: len,
                                strategy: DownloadStrategy::Chunked { chunks },
                            });
                        }
                        Err(ChunkError::NotHonored(reason)) => {
                            tracing::warn!(%url, %reason, "range request not honored, falling back to single stream");
                        }
                        Err(ChunkError::Failed(e)) => return Err(e),
                    }
                }
            }
        }

        let bytes = self.download_single(url, dest).await?;
        tracing::debug!(%url, bytes, "single-stream download complete");
        Ok(DownloadOutcome {
            bytes,
            strategy: DownloadStrategy::SingleStream,
        })
    }

    fn check_size(&self, size: u64) -> Result<()> {
        if size > self.config.max_bytes {
            return Err(Error::DownloadTooLarge {
                size,
                max_size: self.config.max_bytes,
            });
        }
        Ok(())
    }

    /// Return the body length when the server advertises byte ranges
    async fn probe_range_support(&self, url: &Url) -> Option<u64> {
        let response = match self.client.head(url.clone()).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                tracing::debug!(%url, status = %response.status(), "HEAD probe rejected");
                return None;
            }
            Err(e) => {
                tracing::debug!(%url, error = %e, "HEAD probe failed");
                return None;
            }
        };

        let headers = response.headers();
        let accepts_bytes = headers
            .get(ACCEPT_RANGES)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.split(',').any(|unit| unit.trim().eq_ignore_ascii_case("bytes")));
        if !accepts_bytes {
            return None;
        }

        // HEAD bodies are empty, so read the header rather than the body size hint
        headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|len| *len > 0)
    }

    async fn download_chunked(
        &self,
        url: &Url,
        len: u64,
        dest: &Path,
    ) -> std::result::Result<usize, ChunkError> {
        let ranges = chunk_ranges(len, self.config.parallel_chunks);
        let fetches = ranges
            .iter()
            .map(|&(start, end)| self.fetch_range(url, start, end));
        let parts = futures_util::future::try_join_all(fetches).await?;

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| ChunkError::Failed(e.into()))?;
        for part in &parts {
            file.write_all(part)
                .await
                .map_err(|e| ChunkError::Failed(e.into()))?;
        }
        file.flush().await.map_err(|e| ChunkError::Failed(e.into()))?;

        Ok(parts.len())
    }

    async fn fetch_range(
        &self,
        url: &Url,
        start: u64,
        end: u64,
    ) -> std::result::Result<Bytes, ChunkError> {
        let response = self
            .client
            .get(url.clone())
            .header(RANGE, format!("bytes={}-{}", start, end))
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::PARTIAL_CONTENT {
            if status.is_success() {
                return Err(ChunkError::NotHonored(format!(
                    "expected 206 for bytes {}-{}, got {}",
                    start, end, status
                )));
            }
            return Err(ChunkError::Failed(Error::DownloadFailed {
                reason: format!("HTTP {} for bytes {}-{}", status, start, end),
            }));
        }

        let body = response.bytes().await?;
        let expected = end - start + 1;
        if body.len() as u64 != expected {
            return Err(ChunkError::NotHonored(format!(
                "expected {} bytes for range {}-{}, got {}",
                expected,
                start,
                end,
                body.len()
            )));
        }
        Ok(body)
    }

    async fn download_single(&self, url: &Url, dest: &Path) -> Result<u64> {
        let response = self.client.get(url.clone()).send().await?;

        if !response.status().is_success() {
            return Err(Error::DownloadFailed {
                reason: format!("HTTP request failed with status: {}", response.status()),
            });
        }

        // Check Content-Length header for early rejection
        if let Some(content_length) = response.content_length() {
            self.check_size(content_length)?;
        }

        // Stream the response body with incremental size checking to prevent OOM
        let mut file = tokio::fs::File::create(dest).await?;
        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(Error::HttpRequest)?;
            written += chunk.len() as u64;
            self.check_size(written)?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_chunk_ranges_even() {
        assert_eq!(chunk_ranges(100, 4), vec![(0, 24), (25, 49), (50, 74), (75, 99)]);
    }

    #[test]
    fn test_chunk_ranges_remainder_goes_first() {
        assert_eq!(chunk_ranges(10, 3), vec![(0, 3), (4, 6), (7, 9)]);
    }

    #[test]
    fn test_chunk_ranges_more_chunks_than_bytes() {
        assert_eq!(chunk_ranges(2, 8), vec![(0, 0), (1, 1)]);
    }

    #[test]
    fn test_chunk_ranges_empty_and_single() {
        assert!(chunk_ranges(0, 4).is_empty());
        assert_eq!(chunk_ranges(7, 0), vec![(0, 6)]);
        assert_eq!(chunk_ranges(7, 1), vec![(0, 6)]);
    }

    #[test]
    fn test_chunk_ranges_cover_everything() {
        let len = 1_048_583;
        let ranges = chunk_ranges(len, 4);
        assert_eq!(ranges.first().unwrap().0, 0);
        assert_eq!(ranges.last().unwrap().1, len - 1);
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].1 + 1, pair[1].0);
        }
    }

    #[test]
    fn test_public_addrs_filters_private() {
        let addrs: Vec<SocketAddr> = vec![
            "127.0.0.1:80".parse().unwrap(),
            "169.254.169.254:80".parse().unwrap(),
            "93.184.216.34:80".parse().unwrap(),
            "[::1]:80".parse().unwrap(),
        ];
        assert_eq!(
            public_addrs(addrs),
            vec!["93.184.216.34:80".parse::<SocketAddr>().unwrap()]
        );
    }

    #[test]
    fn test_redirect_allowed() {
        let allowed = |s: &str| redirect_allowed(&Url::parse(s).unwrap());
        assert!(allowed("https://arxiv.org/pdf/1706.03762"));
        assert!(allowed("http://93.184.216.34/a.pdf"));
        assert!(!allowed("http://169.254.169.254/latest/meta-data/"));
        assert!(!allowed("http://127.0.0.1:8080/a.pdf"));
        assert!(!allowed("http://[::1]/a.pdf"));
    }

    #[tokio::test]
    async fn test_redirect_to_loopback_not_followed() {
        use axum::response::Redirect;
        use axum::routing::get;
        use std::sync::atomic::{AtomicBool, Ordering};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let secret_hit = Arc::new(AtomicBool::new(false));
        let hit = Arc::clone(&secret_hit);
        let target = format!("http://{}/secret.pdf", addr);
        let app = axum::Router::new()
            .route(
                "/start.pdf",
                get(move || {
                    let target = target.clone();
                    async move { Redirect::temporary(&target) }
                }),
            )
            .route(
                "/secret.pdf",
                get(move || {
                    let hit = Arc::clone(&hit);
                    async move {
                        hit.store(true, Ordering::SeqCst);
                        "%PDF-1.4 secret"
                    }
                }),
            );
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // The submitted URL is checked by check_ssrf; drive the client
        // directly to exercise the per-hop guard.
        let downloader = Downloader::new(DownloadConfig::default()).unwrap();
        let start = Url::parse(&format!("http://{}/start.pdf", addr)).unwrap();
        let err = downloader.client.get(start).send().await.unwrap_err();
        assert!(err.is_redirect());
        assert!(!secret_hit.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_resolver_rejects_localhost() {
        let err = resolve_public("localhost".to_string()).await.err().unwrap();
        assert!(err.to_string().contains("public address"));
    }

    #[tokio::test]
    async fn test_download_blocks_private_url() {
        let downloader = Downloader::new(DownloadConfig::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let url = Url::parse("http://127.0.0.1:9/paper.pdf").unwrap();
        let result = downloader
            .download_to(&url, &dir.path().join("paper.pdf"))
            .await;
        assert!(matches!(result, Err(Error::SsrfBlocked { .. })));
    }
}
