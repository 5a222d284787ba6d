//! External figure extractor
//!
//! Figure and table detection is done by pdffigures2 (or any tool with the
//! same command-line contract). This module launches it, enforces the
//! timeout and reads back the sidecar JSON it leaves in the output directory.

mod command;
mod figures;

pub use command::ExtractorCommand;
pub use figures::{
    find_figure_by_image, parse_sidecar, read_sidecar, resource_url, rewrite_render_urls,
    Boundary, Figure, RESOURCE_MOUNT,
};

use crate::config::ExtractorConfig;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// How long to keep reading a pipe after the process is gone
const OUTPUT_GRACE: Duration = Duration::from_secs(5);

/// Sidecar file the extractor writes for `input`: `<out_dir>/<stem>.json`
pub fn sidecar_path(input: &Path, out_dir: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    out_dir.join(format!("{}.json", stem))
}

/// Drains one child pipe in the background so partial output survives a kill
struct PipeCapture {
    buf: Arc<Mutex<Vec<u8>>>,
    task: JoinHandle<()>,
}

impl PipeCapture {
    fn spawn<R>(pipe: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buf);
        let task = tokio::spawn(async move {
            let Some(mut pipe) = pipe else { return };
            let mut chunk = [0u8; 8192];
            loop {
                match pipe.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => sink.lock().await.extend_from_slice(&chunk[..n]),
                }
            }
        });
        Self { buf, task }
    }

    /// Wait for the pipe to close (bounded by `grace`) and return what was read
    async fn finish(mut self, grace: Duration) -> String {
        if tokio::time::timeout(grace, &mut self.task).await.is_err() {
            tracing::debug!("extractor pipe still open, keeping partial output");
            self.task.abort();
        }
        let data = self.buf.lock().await;
        String::from_utf8_lossy(&data).into_owned()
    }
}

/// Runs the extractor for staged PDFs
#[derive(Debug, Clone)]
pub struct Extractor {
    config: ExtractorConfig,
}

impl Extractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// Extract figures from `input`, writing images into `out_dir`.
    ///
    /// Returns the parsed sidecar with `renderURL` still pointing at local
    /// files. The sidecar file itself is left in place.
    pub async fn run(&self, input: &Path, out_dir: &Path) -> Result<Vec<Figure>> {
        let command = ExtractorCommand::new(&self.config);
        let mut cmd = command.build(input, out_dir);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(
            program = %command.program().display(),
            input = %input.display(),
            out_dir = %out_dir.display(),
            "running extractor"
        );

        let start = Instant::now();
        let mut child = cmd.spawn().map_err(|source| Error::ExtractorSpawn {
            program: command.program().display().to_string(),
            source,
        })?;
        let stdout_capture = PipeCapture::spawn(child.stdout.take());
        let stderr_capture = PipeCapture::spawn(child.stderr.take());

        let waited = tokio::time::timeout(self.config.timeout, child.wait()).await;
        let status = match waited {
            Ok(status) => status?,
            Err(_) => {
                if let Err(e) = child.start_kill() {
                    tracing::warn!(error = %e, "failed to kill extractor");
                }
                if let Err(e) = child.wait().await {
                    tracing::warn!(error = %e, "failed to reap extractor");
                }
                let stdout = stdout_capture.finish(OUTPUT_GRACE).await;
                let stderr = stderr_capture.finish(OUTPUT_GRACE).await;
                tracing::error!(
                    input = %input.display(),
                    timeout_secs = self.config.timeout.as_secs(),
                    %stderr,
                    "extractor timed out"
                );
                return Err(Error::ExtractorTimeout {
                    secs: self.config.timeout.as_secs(),
                    stdout,
                    stderr,
                });
            }
        };

        let stdout = stdout_capture.finish(OUTPUT_GRACE).await;
        let stderr = stderr_capture.finish(OUTPUT_GRACE).await;

        if !status.success() {
            tracing::error!(
                code = ?status.code(),
                %stdout,
                %stderr,
                "extractor failed"
            );
            return Err(Error::ExtractorFailed {
                code: status.code(),
                stdout,
                stderr,
            });
        }

        let elapsed_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(elapsed_ms, input = %input.display(), "extractor finished");

        let sidecar = sidecar_path(input, out_dir);
        match read_sidecar(&sidecar).await {
            Ok(figures) => Ok(figures),
            Err(e) => {
                tracing::error!(error = %e, %stdout, %stderr, "extractor output unusable");
                Err(Error::ExtractorOutput {
                    source: Box::new(e),
                    stdout,
                    stderr,
                })
            }
        }
    }
}
