use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use anyhow::Context;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::warn;

#[derive(Clone)]
pub struct PdftotextCliExtractor {
    pub executable_path: String,
    pub timeout: Duration,
}

impl PdftotextCliExtractor {
    pub fn new(executable_path: String, timeout: Duration) -> Self {
        Self {
            executable_path,
            timeout,
        }
    }

    /// Any tool failure yields an empty string.
    pub async fn extract_text(&self, pdf_bytes: &[u8]) -> anyhow::Result<String> {
        let temp_dir = tempfile::Builder::new()
            .prefix("cv-match-pdf-")
            .tempdir()
            .context("failed to create PDF extraction temp dir")?;

        let input_path: PathBuf = temp_dir.path().join("document.pdf");
        tokio::fs::write(&input_path, pdf_bytes).await?;

        let mut command = Command::new(&self.executable_path);
        command
            .arg("-layout")
            .arg("-enc")
            .arg("UTF-8")
            .arg(&input_path)
            .arg("-")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                warn!(tool = %self.executable_path, "pdftotext unavailable: {err}");
                return Ok(String::new());
            }
            Err(_) => {
                warn!(tool = %self.executable_path, "pdftotext timed out");
                return Ok(String::new());
            }
        };

        if !output.status.success() {
            return Ok(String::new());
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}
