use tracing::{debug, info};

use super::pdftotext::PdftotextCliExtractor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdfStrategy {
    Primary,
    Secondary,
}

pub struct PdfTextExtractor {
    fallback: PdftotextCliExtractor,
}

impl PdfTextExtractor {
    pub fn new(fallback: PdftotextCliExtractor) -> Self {
        Self { fallback }
    }

    pub async fn extract_text_with_fallback(
        &self,
        data: &[u8],
    ) -> anyhow::Result<(String, PdfStrategy)> {
        self.resolve(extract_pdf_text(data), data).await
    }

    // pdftotext runs only when the primary errored or produced whitespace.
    async fn resolve(
        &self,
        primary: anyhow::Result<String>,
        data: &[u8],
    ) -> anyhow::Result<(String, PdfStrategy)> {
        let primary_error = match primary {
            Ok(text) if !text.trim().is_empty() => return Ok((text, PdfStrategy::Primary)),
            Ok(_) => {
                debug!("primary PDF extraction produced no text");
                None
            }
            Err(err) => {
                debug!("primary PDF extraction failed: {err}");
                Some(err)
            }
        };

        info!("falling back to pdftotext");
        let text = self.fallback.extract_text(data).await?;
        if !text.trim().is_empty() {
            return Ok((text, PdfStrategy::Secondary));
        }

        match primary_error {
            Some(err) => Err(err),
            None => Ok((String::new(), PdfStrategy::Primary)),
        }
    }
}

// pdf-extract panics on some malformed inputs.
fn extract_pdf_text(data: &[u8]) -> anyhow::Result<String> {
    match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(data)) {
        Ok(result) => Ok(result?),
        Err(_) => anyhow::bail!("PDF text extraction aborted on malformed input"),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn extractor(executable_path: String) -> PdfTextExtractor {
        PdfTextExtractor::new(PdftotextCliExtractor::new(
            executable_path,
            Duration::from_secs(5),
        ))
    }

    #[cfg(unix)]
    fn stub_pdftotext(dir: &std::path::Path, script: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("pdftotext");
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().to_string()
    }

    #[tokio::test]
    async fn malformed_pdf_without_fallback_is_an_error() {
        let result = extractor("/nonexistent/cv-match/pdftotext".to_string())
            .extract_text_with_fallback(b"this is not a pdf")
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn primary_text_skips_the_fallback() {
        let (text, strategy) = extractor("/nonexistent/cv-match/pdftotext".to_string())
            .resolve(Ok("Skills: Go".to_string()), b"")
            .await
            .unwrap();
        assert_eq!(text, "Skills: Go");
        assert_eq!(strategy, PdfStrategy::Primary);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unreadable_pdf_recovers_text_from_pdftotext() {
        let temp = tempfile::tempdir().unwrap();
        let tool = stub_pdftotext(temp.path(), "#!/bin/sh\necho 'Skills: Rust'\n");

        let (text, strategy) = extractor(tool)
            .extract_text_with_fallback(b"this is not a pdf")
            .await
            .unwrap();
        assert_eq!(text.trim(), "Skills: Rust");
        assert_eq!(strategy, PdfStrategy::Secondary);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn empty_primary_uses_pdftotext_text() {
        let temp = tempfile::tempdir().unwrap();
        let tool = stub_pdftotext(temp.path(), "#!/bin/sh\necho 'Scanned page'\n");

        let (text, strategy) = extractor(tool)
            .resolve(Ok("  \n".to_string()), b"%PDF-1.4")
            .await
            .unwrap();
        assert_eq!(text.trim(), "Scanned page");
        assert_eq!(strategy, PdfStrategy::Secondary);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn empty_primary_and_empty_fallback_yield_empty_text() {
        let temp = tempfile::tempdir().unwrap();
        let tool = stub_pdftotext(temp.path(), "#!/bin/sh\nexit 0\n");

        let (text, strategy) = extractor(tool)
            .resolve(Ok(String::new()), b"%PDF-1.4")
            .await
            .unwrap();
        assert_eq!(text, "");
        assert_eq!(strategy, PdfStrategy::Primary);
    }
}
