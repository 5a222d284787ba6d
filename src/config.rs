//! Server configuration
//!
//! Every setting can be given as a command-line flag or through the
//! environment variable named next to it.

use crate::error::{Error, Result};
use clap::Args;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// How the extractor binary is launched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractorProgram {
    /// pdffigures2 jar run through a JVM
    Jar {
        java: PathBuf,
        java_opts: Vec<String>,
        jar: PathBuf,
    },
    /// Standalone executable honoring the same arguments
    Binary(PathBuf),
}

/// Extractor invocation settings
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub program: ExtractorProgram,
    /// Working directory for the extractor process
    pub work_dir: Option<PathBuf>,
    /// Render resolution passed as `--dpi`
    pub dpi: u32,
    /// Wall-clock limit for one extraction
    pub timeout: Duration,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            program: ExtractorProgram::Jar {
                java: PathBuf::from("java"),
                java_opts: vec!["-XX:MaxRAMPercentage=75.0".to_string()],
                jar: PathBuf::from("/pdffigures2/pdffigures2.jar"),
            },
            work_dir: Some(PathBuf::from("/pdffigures2")),
            dpi: 300,
            timeout: Duration::from_secs(300),
        }
    }
}

/// Remote PDF download settings
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Per-request timeout
    pub timeout: Duration,
    /// Number of concurrent range requests; 0 or 1 disables chunking
    pub parallel_chunks: usize,
    /// Bodies smaller than this are fetched in one stream
    pub min_chunked_size: u64,
    /// Maximum accepted body size
    pub max_bytes: u64,
    /// Allow URLs that resolve to private/reserved IPs
    pub allow_private_urls: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            parallel_chunks: 4,
            min_chunked_size: 1024 * 1024,
            max_bytes: 100 * 1024 * 1024, // 100MB
            allow_private_urls: false,
        }
    }
}

/// Runtime configuration for the figure extraction server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Directory where incoming PDFs are staged
    pub upload_dir: PathBuf,
    /// Directory holding rendered figures, served under `/resources`
    pub output_dir: PathBuf,
    /// Public origin used to build `renderURL` values
    pub resource_base_url: Url,
    /// Maximum request body size for uploads
    pub max_upload_bytes: usize,
    /// Maximum number of extractor processes running at once
    pub max_concurrent_extractions: usize,
    pub extractor: ExtractorConfig,
    pub download: DownloadConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::from([0, 0, 0, 0]),
            port: 5001,
            upload_dir: PathBuf::from("/app/uploads"),
            output_dir: PathBuf::from("/app/output"),
            resource_base_url: default_base_url(5001),
            max_upload_bytes: 100 * 1024 * 1024,
            max_concurrent_extractions: 2,
            extractor: ExtractorConfig::default(),
            download: DownloadConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Create the staging and output directories if they do not exist.
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.upload_dir)?;
        std::fs::create_dir_all(&self.output_dir)?;
        Ok(())
    }
}

fn default_base_url(port: u16) -> Url {
    Url::parse(&format!("http://localhost:{}", port)).expect("static URL is valid")
}

/// Command-line/environment arguments for the server
#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Address to bind
    #[arg(long, env = "SERVER_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(long, env = "SERVER_PORT", default_value_t = 5001)]
    pub port: u16,

    /// Directory for staged uploads and downloads
    #[arg(long, env = "UPLOAD_FOLDER", default_value = "/app/uploads")]
    pub upload_dir: PathBuf,

    /// Directory for rendered figures
    #[arg(long, env = "OUTPUT_FOLDER", default_value = "/app/output")]
    pub output_dir: PathBuf,

    /// Public base URL for rendered figures (defaults to http://localhost:<port>)
    #[arg(long, env = "RESOURCE_BASE_URL")]
    pub resource_base_url: Option<String>,

    /// Java executable used to run the extractor jar
    #[arg(long = "java", env = "JAVA_BIN", default_value = "java")]
    pub java: PathBuf,

    /// JVM options, whitespace separated
    #[arg(long, env = "JAVA_OPTS", default_value = "-XX:MaxRAMPercentage=75.0", allow_hyphen_values = true)]
    pub java_opts: String,

    /// Path to the pdffigures2 jar
    #[arg(long = "jar", env = "PDFFIGURES_JAR_PATH", default_value = "/pdffigures2/pdffigures2.jar")]
    pub jar: PathBuf,

    /// Working directory for the extractor
    #[arg(long, env = "PDFFIGURES_WORK_DIR", default_value = "/pdffigures2")]
    pub work_dir: PathBuf,

    /// Standalone extractor executable, used instead of java + jar
    #[arg(long, env = "EXTRACTOR_BIN")]
    pub extractor_bin: Option<PathBuf>,

    /// Figure render resolution
    #[arg(long, env = "EXTRACTOR_DPI", default_value_t = 300)]
    pub dpi: u32,

    /// Extractor timeout in seconds
    #[arg(long = "extractor-timeout", env = "EXTRACTOR_TIMEOUT_SECS", default_value_t = 300)]
    pub extractor_timeout_secs: u64,

    /// Maximum extractor processes running at once
    #[arg(long, env = "MAX_CONCURRENT_EXTRACTIONS", default_value_t = 2)]
    pub max_concurrent_extractions: usize,

    /// Download timeout in seconds
    #[arg(long = "download-timeout", env = "DOWNLOAD_TIMEOUT_SECS", default_value_t = 30)]
    pub download_timeout_secs: u64,

    /// Concurrent range requests per download (0 or 1 disables)
    #[arg(long, env = "DOWNLOAD_CHUNKS", default_value_t = 4)]
    pub download_chunks: usize,

    /// Smallest body size fetched in chunks
    #[arg(long, env = "MIN_CHUNKED_SIZE", default_value_t = 1024 * 1024)]
    pub min_chunked_size: u64,

    /// Maximum download size in bytes
    #[arg(long, env = "MAX_DOWNLOAD_BYTES", default_value_t = 100 * 1024 * 1024)]
    pub max_download_bytes: u64,

    /// Maximum upload size in bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = 100 * 1024 * 1024)]
    pub max_upload_bytes: usize,

    /// Allow URLs that resolve to private or loopback addresses
    #[arg(long, env = "ALLOW_PRIVATE_URLS")]
    pub allow_private_urls: bool,
}

impl ServeArgs {
    /// Resolve defaults and validate into a [`ServerConfig`].
    pub fn into_config(self) -> Result<ServerConfig> {
        let resource_base_url = match self.resource_base_url.as_deref() {
            Some(raw) if !raw.trim().is_empty() => {
                let url = Url::parse(raw.trim()).map_err(|e| Error::SourceResolution {
                    reason: format!("Invalid RESOURCE_BASE_URL '{}': {}", raw, e),
                })?;
                if url.cannot_be_a_base() {
                    return Err(Error::SourceResolution {
                        reason: format!("RESOURCE_BASE_URL '{}' cannot be a base URL", raw),
                    });
                }
                url
            }
            _ => default_base_url(self.port),
        };

        let program = match self.extractor_bin {
            Some(path) => ExtractorProgram::Binary(path),
            None => ExtractorProgram::Jar {
                java: self.java,
                java_opts: self.java_opts.split_whitespace().map(String::from).collect(),
                jar: self.jar,
            },
        };

        Ok(ServerConfig {
            host: self.host,
            port: self.port,
            upload_dir: self.upload_dir,
            output_dir: self.output_dir,
            resource_base_url,
            max_upload_bytes: self.max_upload_bytes,
            max_concurrent_extractions: self.max_concurrent_extractions.max(1),
            extractor: ExtractorConfig {
                program,
                work_dir: Some(self.work_dir),
                dpi: self.dpi,
                timeout: Duration::from_secs(self.extractor_timeout_secs),
            },
            download: DownloadConfig {
                timeout: Duration::from_secs(self.download_timeout_secs),
                parallel_chunks: self.download_chunks,
                min_chunked_size: self.min_chunked_size,
                max_bytes: self.max_download_bytes,
                allow_private_urls: self.allow_private_urls,
            },
        })
    }
}
