//! PDF report rendering
//!
//! The narrative is converted to HTML, embedded in a page together with the
//! chart and handed to an external HTML to PDF converter.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Local};
use minijinja::{Environment, context};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, instrument, warn};
use wyckoff_llm::Provenance;

use crate::error::{ReportError, Result};
use crate::markdown;

const REPORT_TEMPLATE: &str = include_str!("../templates/report.html");

/// Default HTML to PDF converter binary
pub const DEFAULT_CONVERTER: &str = "wkhtmltopdf";

/// Everything that goes into one report
#[derive(Debug, Clone)]
pub struct ReportDocument {
    pub symbol: String,
    pub narrative: String,
    pub chart_png: Vec<u8>,
    pub provenance: Provenance,
    pub generated_at: DateTime<Local>,
}

impl ReportDocument {
    pub fn new(
        symbol: impl Into<String>,
        narrative: impl Into<String>,
        chart_png: Vec<u8>,
        provenance: Provenance,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            narrative: narrative.into(),
            chart_png,
            provenance,
            generated_at: Local::now(),
        }
    }

    /// File stem shared by the PDF and its side files
    pub fn file_stem(&self) -> String {
        format!(
            "{}_{}",
            self.symbol,
            self.generated_at.format("%Y%m%d_%H%M%S")
        )
    }
}

/// Files written for one report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedReport {
    pub pdf: PathBuf,
    pub markdown: PathBuf,
    pub html: PathBuf,
}

/// Turns a report document into files on disk
#[async_trait]
pub trait ReportRenderer: Send + Sync {
    async fn render(&self, document: &ReportDocument, output_dir: &Path)
    -> Result<RenderedReport>;
}

/// Build the standalone HTML page for a document
pub fn render_html(document: &ReportDocument) -> Result<String> {
    let mut env = Environment::new();
    env.add_template("report.html", REPORT_TEMPLATE)?;
    let template = env.get_template("report.html")?;

    Ok(template.render(context! {
        symbol => &document.symbol,
        provenance => document.provenance.to_string(),
        tier => document.provenance.tier.to_string(),
        generated_at => document.generated_at.format("%Y-%m-%d %H:%M").to_string(),
        chart_b64 => STANDARD.encode(&document.chart_png),
        narrative => markdown::to_html(&document.narrative),
    })?)
}

/// Renderer that shells out to an HTML to PDF converter
///
/// The converter is invoked as `<program> <args...> <input.html> <output.pdf>`.
#[derive(Debug, Clone)]
pub struct HtmlPdfRenderer {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl Default for HtmlPdfRenderer {
    fn default() -> Self {
        Self {
            program: DEFAULT_CONVERTER.to_string(),
            args: vec![
                "--quiet".to_string(),
                "--enable-local-file-access".to_string(),
                "--encoding".to_string(),
                "utf-8".to_string(),
            ],
            timeout: Duration::from_secs(60),
        }
    }
}

impl HtmlPdfRenderer {
    /// Use `program` with no extra arguments
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            ..Self::default()
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    async fn convert(&self, html: &Path, pdf: &Path) -> Result<()> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(html)
            .arg(pdf)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| {
                ReportError::Conversion(format!(
                    "{} timed out after {:?}",
                    self.program, self.timeout
                ))
            })?
            .map_err(|e| ReportError::Conversion(format!("failed to run {}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ReportError::Conversion(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let written = tokio::fs::metadata(pdf).await.map(|m| m.len()).unwrap_or(0);
        if written == 0 {
            return Err(ReportError::Conversion(format!(
                "{} produced no output",
                self.program
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ReportRenderer for HtmlPdfRenderer {
    #[instrument(skip_all, fields(symbol = %document.symbol, converter = %self.program))]
    async fn render(
        &self,
        document: &ReportDocument,
        output_dir: &Path,
    ) -> Result<RenderedReport> {
        tokio::fs::create_dir_all(output_dir).await?;

        let stem = document.file_stem();
        let markdown = output_dir.join(format!("{stem}.md"));
        let html = output_dir.join(format!("{stem}.html"));
        let pdf = output_dir.join(format!("{stem}.pdf"));

        tokio::fs::write(&markdown, &document.narrative).await?;
        tokio::fs::write(&html, render_html(document)?).await?;

        if let Err(e) = self.convert(&html, &pdf).await {
            if tokio::fs::try_exists(&pdf).await.unwrap_or(false) {
                warn!(path = %pdf.display(), "Removing partial PDF");
                if let Err(rm) = tokio::fs::remove_file(&pdf).await {
                    warn!(error = %rm, "Failed to remove partial PDF");
                }
            }
            return Err(e);
        }

        info!(path = %pdf.display(), "Report rendered");
        Ok(RenderedReport {
            pdf,
            markdown,
            html,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wyckoff_llm::Tier;

    fn document() -> ReportDocument {
        ReportDocument::new(
            "600970",
            "## Phase C\n\nSpring confirmed on **low** volume.",
            b"\x89PNG".to_vec(),
            Provenance {
                tier: Tier::Secondary,
                provider: "relay".to_string(),
                model: "gpt-4o".to_string(),
            },
        )
    }

    #[test]
    fn test_render_html() {
        let html = render_html(&document()).unwrap();
        assert!(html.contains("Target: 600970 | Tier: Secondary"));
        assert!(html.contains("data:image/png;base64,iVBORw=="));
        assert!(html.contains("<h2>Phase C</h2>"));
        assert!(html.contains("<strong>low</strong>"));
        assert!(html.contains("Secondary (relay"));
    }

    #[test]
    fn test_header_fields_escaped() {
        let mut doc = document();
        doc.symbol = "<b>".to_string();
        let html = render_html(&doc).unwrap();
        assert!(html.contains("Target: &lt;b&gt;"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_render_with_copying_converter() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = HtmlPdfRenderer::new("cp");
        let doc = document();

        let report = renderer.render(&doc, dir.path()).await.unwrap();

        assert!(report.pdf.exists());
        assert_eq!(
            std::fs::read_to_string(&report.markdown).unwrap(),
            doc.narrative
        );
        assert!(report.pdf.to_string_lossy().ends_with(".pdf"));
        assert!(
            std::fs::read_to_string(&report.pdf)
                .unwrap()
                .contains("Tier: Secondary")
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_conversion_leaves_no_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let doc = document();
        let pdf = dir.path().join(format!("{}.pdf", doc.file_stem()));

        // Writes the output, then fails
        let renderer = HtmlPdfRenderer::new("sh").with_args([
            "-c",
            "echo partial > \"$2\"; exit 3",
            "converter",
        ]);
        let result = renderer.render(&doc, dir.path()).await;

        assert!(matches!(result, Err(ReportError::Conversion(_))));
        assert!(!pdf.exists());
    }

    #[tokio::test]
    async fn test_missing_converter() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = HtmlPdfRenderer::new("wyckoff-no-such-converter");
        let result = renderer.render(&document(), dir.path()).await;
        assert!(matches!(result, Err(ReportError::Conversion(_))));
    }
}
