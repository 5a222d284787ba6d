//! Error types for the figure extraction server

use thiserror::Error;

/// Result type alias for the figure extraction server
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the figure extraction server
#[derive(Error, Debug)]
pub enum Error {
    /// Neither an upload nor a URL was supplied
    #[error("Either 'file' or 'pdf_url' must be provided.")]
    MissingInput,

    /// Both an upload and a URL were supplied
    #[error("Cannot provide both 'file' and 'pdf_url'.")]
    ConflictingInput,

    /// Upload part carried no filename
    #[error("No selected file")]
    EmptyFilename,

    /// Upload filename does not end in `.pdf`
    #[error("Only PDF files are allowed: {name}")]
    NotPdfFilename { name: String },

    /// Content does not start with the PDF magic bytes
    #[error("Invalid PDF file: {reason}")]
    InvalidPdf { reason: String },

    /// Malformed request form
    #[error("Malformed form data: {reason}")]
    MalformedForm { reason: String },

    /// URL could not be parsed or resolved
    #[error("Failed to resolve source: {reason}")]
    SourceResolution { reason: String },

    /// SSRF blocked (URL resolves to private/reserved IP)
    #[error("SSRF blocked: {url}")]
    SsrfBlocked { url: String },

    /// Remote server answered with a non-success status or broke off
    #[error("Failed to download PDF from URL: {reason}")]
    DownloadFailed { reason: String },

    /// Download too large
    #[error("Download too large: {size} bytes (max: {max_size} bytes)")]
    DownloadTooLarge { size: u64, max_size: u64 },

    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// The extractor process could not be started
    #[error("Failed to start extractor '{program}': {source}")]
    ExtractorSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The extractor exited with a nonzero status
    #[error("Extractor exited with status {}", code.map_or_else(|| "unknown".to_string(), |c| c.to_string()))]
    ExtractorFailed {
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    /// The extractor did not finish in time; carries whatever it printed before being killed
    #[error("Extractor timed out after {secs} seconds")]
    ExtractorTimeout {
        secs: u64,
        stdout: String,
        stderr: String,
    },

    /// The extractor exited cleanly but its output is unusable
    #[error("{source}")]
    ExtractorOutput {
        #[source]
        source: Box<Error>,
        stdout: String,
        stderr: String,
    },

    /// The extractor succeeded but left no sidecar file
    #[error("Output file not found: {path}")]
    OutputMissing { path: String },

    /// The sidecar file is not the expected shape
    #[error("Corrupt extractor output: {reason}")]
    OutputCorrupt { reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Return a sanitized error message safe to send to clients.
    /// Internal details (paths, library errors) are omitted.
    /// Full details should be logged via tracing before calling this.
    pub fn client_message(&self) -> String {
        match self {
            Error::MissingInput | Error::ConflictingInput | Error::EmptyFilename => {
                self.to_string()
            }
            Error::NotPdfFilename { .. } => "Only PDF files are allowed.".to_string(),
            Error::InvalidPdf { .. } => "Invalid PDF file".to_string(),
            Error::MalformedForm { reason } => format!("Malformed form data: {}", reason),
            Error::SourceResolution { .. } => "Failed to resolve PDF source".to_string(),
            Error::SsrfBlocked { .. } => "URL not allowed".to_string(),
            Error::DownloadFailed { reason } => {
                format!("Failed to download PDF from URL: {}", reason)
            }
            Error::DownloadTooLarge { max_size, .. } => {
                format!("Download exceeds maximum size of {} bytes", max_size)
            }
            Error::HttpRequest(e) if e.is_timeout() => {
                "Timed out downloading PDF from URL".to_string()
            }
            Error::HttpRequest(_) => "Failed to download PDF from URL".to_string(),
            Error::ExtractorSpawn { .. } => "Extractor could not be started".to_string(),
            Error::ExtractorFailed { .. } | Error::ExtractorTimeout { .. } => self.to_string(),
            Error::ExtractorOutput { source, .. } => source.client_message(),
            Error::OutputMissing { .. } => "Extractor produced no output".to_string(),
            Error::OutputCorrupt { .. } | Error::Serialization(_) => {
                "Extractor produced unreadable output".to_string()
            }
            Error::Io(_) => "I/O error".to_string(),
        }
    }

    /// Captured extractor stderr, when the error came out of an extractor run
    pub fn extractor_stderr(&self) -> Option<&str> {
        match self {
            Error::ExtractorFailed { stderr, .. }
            | Error::ExtractorTimeout { stderr, .. }
            | Error::ExtractorOutput { stderr, .. } => Some(stderr.as_str()),
            _ => None,
        }
    }

    /// Whether the error was caused by the request or the remote source
    /// rather than by this server or the extractor.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::MissingInput
                | Error::ConflictingInput
                | Error::EmptyFilename
                | Error::NotPdfFilename { .. }
                | Error::InvalidPdf { .. }
                | Error::MalformedForm { .. }
                | Error::SourceResolution { .. }
                | Error::SsrfBlocked { .. }
                | Error::DownloadFailed { .. }
                | Error::DownloadTooLarge { .. }
                | Error::HttpRequest(_)
        )
    }
}
