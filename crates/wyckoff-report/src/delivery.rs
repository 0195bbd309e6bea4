//! Report delivery through a messaging bot

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use std::path::Path;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

use crate::error::{ReportError, Result};

/// Default Telegram Bot API host
pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// A destination for finished reports
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Sink name for logs
    fn name(&self) -> &str;

    /// Upload `document` with a short caption
    async fn deliver(&self, document: &Path, caption: &str) -> Result<()>;
}

/// Telegram bot settings
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    /// Token from @BotFather
    pub bot_token: String,
    /// Chat receiving the reports
    pub chat_id: String,
    pub api_base: String,
    pub timeout: Duration,
}

impl TelegramConfig {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
            api_base: TELEGRAM_API_BASE.to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Read `TELEGRAM_BOT_TOKEN` and `TELEGRAM_CHAT_ID`
    ///
    /// Returns `None` unless both are set.
    pub fn from_env() -> Option<Self> {
        let bot_token = wyckoff_utils::env_opt("TELEGRAM_BOT_TOKEN")?;
        let chat_id = wyckoff_utils::env_opt("TELEGRAM_CHAT_ID")?;
        Some(Self::new(bot_token, chat_id))
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Sends reports with the Bot API `sendDocument` method
#[derive(Debug, Clone)]
pub struct TelegramSink {
    config: TelegramConfig,
    client: reqwest::Client,
}

impl TelegramSink {
    pub fn new(config: TelegramConfig) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    /// Build from environment variables, if configured
    pub fn from_env() -> Result<Option<Self>> {
        TelegramConfig::from_env().map(Self::new).transpose()
    }
}

#[async_trait]
impl ReportSink for TelegramSink {
    fn name(&self) -> &str {
        "telegram"
    }

    #[instrument(skip(self), fields(sink = "telegram"))]
    async fn deliver(&self, document: &Path, caption: &str) -> Result<()> {
        let url = format!(
            "{}/bot{}/sendDocument",
            self.config.api_base, self.config.bot_token
        );

        let bytes = tokio::fs::read(document).await?;
        let file_name = document
            .file_name()
            .map_or_else(|| "report.pdf".to_string(), |n| n.to_string_lossy().into_owned());
        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/pdf")?;
        let form = Form::new()
            .text("chat_id", self.config.chat_id.clone())
            .text("caption", caption.to_string())
            .part("document", part);

        let response = self.client.post(&url).multipart(form).send().await?;

        if response.status().is_success() {
            info!("Report delivered");
            return Ok(());
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.as_u16() == 429 {
            warn!("Telegram rate limited");
            return Err(ReportError::RateLimited {
                sink: self.name().to_string(),
            });
        }

        error!("Failed to send report: {} - {}", status, body);
        Err(ReportError::SendFailed {
            sink: self.name().to_string(),
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn sink_for(server: &mockito::Server) -> TelegramSink {
        TelegramSink::new(TelegramConfig::new("TOKEN", "-100123").with_api_base(server.url()))
            .unwrap()
    }

    fn pdf_file(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("600970_20240102.pdf");
        std::fs::write(&path, "%PDF-1.4 test").unwrap();
        path
    }

    #[tokio::test]
    async fn test_send_document() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/botTOKEN/sendDocument")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex("-100123".to_string()),
                Matcher::Regex(r"600970 \| Primary".to_string()),
                Matcher::Regex("600970_20240102.pdf".to_string()),
            ]))
            .with_status(200)
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        sink_for(&server)
            .deliver(&pdf_file(&dir), "600970 | Primary")
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rate_limited() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/botTOKEN/sendDocument")
            .with_status(429)
            .with_body(r#"{"ok":false,"error_code":429}"#)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let result = sink_for(&server).deliver(&pdf_file(&dir), "x").await;
        assert!(matches!(result, Err(ReportError::RateLimited { .. })));
    }

    #[tokio::test]
    async fn test_send_failed() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/botTOKEN/sendDocument")
            .with_status(400)
            .with_body("chat not found")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let result = sink_for(&server).deliver(&pdf_file(&dir), "x").await;
        match result {
            Err(ReportError::SendFailed { status, body, .. }) => {
                assert_eq!(status, 400);
                assert_eq!(body, "chat not found");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_file() {
        let server = mockito::Server::new_async().await;
        let result = sink_for(&server)
            .deliver(Path::new("/nonexistent/report.pdf"), "x")
            .await;
        assert!(matches!(result, Err(ReportError::Io(_))));
    }
}
