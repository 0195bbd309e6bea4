//! Analysis prompt templates
//!
//! The template body is private to each deployment. It is read from the
//! `WYCKOFF_PROMPT_TEMPLATE` environment variable or, failing that, from a
//! file next to the binary (`prompt_secret.txt` by default).

use minijinja::{Environment, UndefinedBehavior};
use serde::Serialize;
use std::path::Path;
use tracing::debug;
use wyckoff_market::IndicatorFrame;

use crate::error::{ReportError, Result};

/// Environment variable holding an inline template
pub const PROMPT_ENV_VAR: &str = "WYCKOFF_PROMPT_TEMPLATE";

/// Default template file
pub const DEFAULT_PROMPT_FILE: &str = "prompt_secret.txt";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Scalars that older templates reference as `{name}` instead of `{{ name }}`
const LEGACY_PLACEHOLDERS: [&str; 6] = [
    "symbol",
    "latest_time",
    "latest_price",
    "timeframe",
    "bars",
    "csv_data",
];

/// Position details from the watchlist row; blank when the row has none
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Position {
    pub date: String,
    pub price: String,
    pub qty: String,
}

/// Variables available to the prompt template
#[derive(Debug, Clone, Serialize)]
pub struct PromptContext {
    pub symbol: String,
    pub latest_time: String,
    pub latest_price: f64,
    pub timeframe: u32,
    pub bars: usize,
    pub csv_data: String,
    pub position: Position,
}

impl PromptContext {
    /// Build the context from an indicator frame
    pub fn from_frame(frame: &IndicatorFrame, position: Position) -> Result<Self> {
        let series = frame.series();
        let last = series.last().ok_or_else(|| {
            ReportError::Data(wyckoff_market::MarketError::DataUnavailable {
                symbol: series.symbol().to_string(),
                reason: "empty series".to_string(),
            })
        })?;

        Ok(Self {
            symbol: series.symbol().to_string(),
            latest_time: last.timestamp.format(TIME_FORMAT).to_string(),
            latest_price: last.close,
            timeframe: series.timeframe().minutes(),
            bars: series.len(),
            csv_data: frame.to_csv()?,
            position,
        })
    }
}

/// A loaded prompt template
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    source: String,
}

impl PromptTemplate {
    /// Parse a template body, rejecting syntax errors early
    ///
    /// Single-brace placeholders such as `{symbol}` are rewritten to
    /// `{{ symbol }}` first, so templates written for plain string
    /// substitution keep working.
    pub fn new(source: impl Into<String>) -> Result<Self> {
        let raw = source.into();
        let source = upgrade_legacy_placeholders(&raw);
        if source != raw {
            debug!("Rewrote single-brace placeholders in prompt template");
        }
        Environment::new().template_from_str(&source)?;
        Ok(Self { source })
    }

    /// Locate the template: environment variable first, then `file`
    pub fn load(file: &Path) -> Result<Self> {
        if let Some(inline) = wyckoff_utils::env_opt(PROMPT_ENV_VAR) {
            debug!("Prompt template loaded from {}", PROMPT_ENV_VAR);
            return Self::new(inline);
        }

        if file.is_file() {
            debug!("Prompt template loaded from {}", file.display());
            return Self::new(std::fs::read_to_string(file)?);
        }

        Err(ReportError::PromptMissing(format!(
            "set {PROMPT_ENV_VAR} or create {}",
            file.display()
        )))
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Render with the given context
    ///
    /// Unknown variables are an error rather than silently blank.
    pub fn render(&self, context: &PromptContext) -> Result<String> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        Ok(env.render_str(&self.source, context)?)
    }
}

/// Replace `{name}` with `{{ name }}` for the known scalar variables
///
/// Occurrences already inside `{{name}}` are left alone.
fn upgrade_legacy_placeholders(source: &str) -> String {
    let mut text = source.to_string();
    for name in LEGACY_PLACEHOLDERS {
        let token = format!("{{{name}}}");
        let mut upgraded = String::with_capacity(text.len());
        let mut rest = text.as_str();
        while let Some(pos) = rest.find(&token) {
            let (before, tail) = rest.split_at(pos);
            let after = &tail[token.len()..];
            upgraded.push_str(before);
            if before.ends_with('{') && after.starts_with('}') {
                upgraded.push_str(&token);
            } else {
                upgraded.push_str(&format!("{{{{ {name} }}}}"));
            }
            rest = after;
        }
        upgraded.push_str(rest);
        text = upgraded;
    }
    text
}
