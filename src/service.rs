//! Extraction pipeline shared by the REST and MCP surfaces

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::extractor::{rewrite_render_urls, sidecar_path, Extractor, Figure};
use crate::source::{
    parse_source_url, staged_filename_for_upload, staged_filename_for_url, validate_pdf_file,
    Downloader, StagingArea,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Output directory for one extraction, removed on drop unless kept
struct JobDir {
    id: String,
    path: PathBuf,
    keep: bool,
}

impl JobDir {
    fn create(output_dir: &Path) -> Result<Self> {
        let id = uuid::Uuid::new_v4().to_string();
        let path = output_dir.join(&id);
        std::fs::create_dir_all(&path)?;
        Ok(Self {
            id,
            path,
            keep: false,
        })
    }

    fn keep(mut self) {
        self.keep = true;
    }
}

impl Drop for JobDir {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(error = %e, path = %self.path.display(), "failed to remove job directory");
            }
        }
    }
}

/// Stages PDFs, runs the extractor and publishes the results
#[derive(Debug, Clone)]
pub struct ExtractionService {
    config: Arc<ServerConfig>,
    downloader: Downloader,
    extractor: Extractor,
    permits: Arc<Semaphore>,
}

impl ExtractionService {
    pub fn new(config: ServerConfig) -> Result<Self> {
        let downloader = Downloader::new(config.download.clone())?;
        let extractor = Extractor::new(config.extractor.clone());
        let permits = Arc::new(Semaphore::new(config.max_concurrent_extractions.max(1)));
        Ok(Self {
            config: Arc::new(config),
            downloader,
            extractor,
            permits,
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Extract figures from an uploaded file
    pub async fn extract_upload(&self, original_name: &str, data: &[u8]) -> Result<Vec<Figure>> {
        let file_name = staged_filename_for_upload(original_name)?;
        let staging = StagingArea::new(&self.config.upload_dir)?;
        let input = staging.stage_bytes(&file_name, data).await?;

        tracing::info!(file = %file_name, bytes = data.len(), "processing uploaded PDF");
        self.process(&input).await
    }

    /// Download a PDF and extract figures from it
    pub async fn extract_url(&self, url: &str) -> Result<Vec<Figure>> {
        let url = parse_source_url(url)?;
        let file_name = staged_filename_for_url(&url);
        let staging = StagingArea::new(&self.config.upload_dir)?;
        let input = staging.path_for(&file_name);

        let outcome = self.downloader.download_to(&url, &input).await?;
        tracing::info!(
            %url,
            file = %file_name,
            bytes = outcome.bytes,
            strategy = ?outcome.strategy,
            "downloaded PDF"
        );

        validate_pdf_file(&input).await?;
        self.process(&input).await
    }

    async fn process(&self, input: &Path) -> Result<Vec<Figure>> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| Error::Io(std::io::Error::other("extraction queue closed")))?;

        let job = JobDir::create(&self.config.output_dir)?;
        let mut figures = self.extractor.run(input, &job.path).await?;

        let sidecar = sidecar_path(input, &job.path);
        if let Err(e) = tokio::fs::remove_file(&sidecar).await {
            tracing::debug!(error = %e, path = %sidecar.display(), "could not remove sidecar");
        }

        rewrite_render_urls(&mut figures, &self.config.resource_base_url, &job.id);
        tracing::info!(job = %job.id, figures = figures.len(), "extraction complete");

        if !figures.is_empty() {
            job.keep();
        }
        Ok(figures)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::{ExtractorConfig, ExtractorProgram};
    use std::os::unix::fs::PermissionsExt;
    use std::time::Duration;

    const PDF: &[u8] = b"%PDF-1.4\n1 0 obj <<>> endobj\n%%EOF\n";

    fn service_with_script(root: &Path, body: &str) -> ExtractionService {
        let script = root.join("extractor.sh");
        std::fs::write(&script, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let config = ServerConfig {
            upload_dir: root.join("uploads"),
            output_dir: root.join("output"),
            extractor: ExtractorConfig {
                program: ExtractorProgram::Binary(script),
                work_dir: None,
                dpi: 300,
                timeout: Duration::from_secs(10),
            },
            ..ServerConfig::default()
        };
        config.ensure_dirs().unwrap();
        ExtractionService::new(config).unwrap()
    }

    fn entries(dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect()
    }

    #[tokio::test]
    async fn test_upload_success_publishes_job() {
        let root = tempfile::tempdir().unwrap();
        let service = service_with_script(
            root.path(),
            r#"stem=$(basename "$1" .pdf)
printf 'png' > "$3$stem-Figure1-1.png"
printf '[{"renderURL":"%s","caption":"c"}]' "$3$stem-Figure1-1.png" > "$5$stem.json""#,
        );

        let figures = service.extract_upload("paper.pdf", PDF).await.unwrap();
        assert_eq!(figures.len(), 1);
        let url = figures[0].render_url.as_deref().unwrap();
        assert!(url.starts_with("http://localhost:5001/resources/"));
        assert!(url.ends_with("/paper-Figure1-1.png"));

        assert!(entries(&root.path().join("uploads")).is_empty());
        let jobs = entries(&root.path().join("output"));
        assert_eq!(jobs.len(), 1);
        let files = entries(&jobs[0]);
        assert_eq!(files, vec![jobs[0].join("paper-Figure1-1.png")]);
    }

    #[tokio::test]
    async fn test_failure_cleans_up_everything() {
        let root = tempfile::tempdir().unwrap();
        let service = service_with_script(
            root.path(),
            r#"printf 'partial' > "$3partial.png"; echo 'crashed' >&2; exit 1"#,
        );

        let result = service.extract_upload("paper.pdf", PDF).await;
        assert!(matches!(result, Err(Error::ExtractorFailed { .. })));
        assert!(entries(&root.path().join("uploads")).is_empty());
        assert!(entries(&root.path().join("output")).is_empty());
    }

    #[tokio::test]
    async fn test_no_figures_leaves_no_job() {
        let root = tempfile::tempdir().unwrap();
        let service = service_with_script(
            root.path(),
            r#"stem=$(basename "$1" .pdf); printf '[]' > "$5$stem.json""#,
        );

        let figures = service.extract_upload("paper.pdf", PDF).await.unwrap();
        assert!(figures.is_empty());
        assert!(entries(&root.path().join("output")).is_empty());
    }

    #[tokio::test]
    async fn test_invalid_upload_never_reaches_extractor() {
        let root = tempfile::tempdir().unwrap();
        let service = service_with_script(root.path(), "touch \"$5ran\"; exit 1");

        let result = service.extract_upload("paper.pdf", b"PK\x03\x04").await;
        assert!(matches!(result, Err(Error::InvalidPdf { .. })));
        let result = service.extract_upload("paper.docx", PDF).await;
        assert!(matches!(result, Err(Error::NotPdfFilename { .. })));

        assert!(entries(&root.path().join("uploads")).is_empty());
        assert!(entries(&root.path().join("output")).is_empty());
    }
}
