//! Runtime configuration
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! environment variables (a `.env` file is loaded first if present).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};
use wyckoff_llm::ErrorPolicy;
use wyckoff_llm::analysis::DEFAULT_SYSTEM_INSTRUCTION;
use wyckoff_llm::providers::gemini::DEFAULT_GEMINI_MODEL;
use wyckoff_market::{MarketConfig, UnitHeuristic};
use wyckoff_utils::EnvError;

use crate::error::{AgentError, Result};

/// Config file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "wyckoff.toml";

/// Market data settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketSettings {
    pub request_timeout_secs: u64,
    pub requests_per_minute: u32,
    pub heuristic: UnitHeuristic,
}

impl Default for MarketSettings {
    fn default() -> Self {
        let defaults = MarketConfig::default();
        Self {
            request_timeout_secs: defaults.request_timeout.as_secs(),
            requests_per_minute: defaults.requests_per_minute,
            heuristic: defaults.heuristic,
        }
    }
}

impl MarketSettings {
    pub fn to_market_config(&self) -> Result<MarketConfig> {
        Ok(MarketConfig::builder()
            .request_timeout(Duration::from_secs(self.request_timeout_secs))
            .requests_per_minute(self.requests_per_minute)
            .heuristic(self.heuristic)
            .build()?)
    }
}

/// Inference tier settings
///
/// Credentials are never read from the file; each tier is enabled by its
/// API key environment variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceSettings {
    pub primary_model: String,
    pub secondary_model: String,
    pub tertiary_model: String,
    pub temperature: f32,
    pub retry_backoff_secs: u64,
    pub timeout_secs: u64,
    pub system_instruction: String,
    pub policy: ErrorPolicy,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            primary_model: DEFAULT_GEMINI_MODEL.to_string(),
            secondary_model: "gpt-4o".to_string(),
            tertiary_model: "gpt-4o".to_string(),
            temperature: 0.2,
            retry_backoff_secs: 2,
            timeout_secs: 120,
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            policy: ErrorPolicy::default(),
        }
    }
}

/// Report rendering settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    /// HTML to PDF converter program
    pub converter: String,
    /// Converter arguments; `None` keeps the renderer defaults
    pub converter_args: Option<Vec<String>>,
    pub chart_width: u32,
    pub chart_height: u32,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            converter: wyckoff_report::pdf::DEFAULT_CONVERTER.to_string(),
            converter_args: None,
            chart_width: 1600,
            chart_height: 900,
        }
    }
}

/// Top-level agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Pause between symbols
    pub cooldown_secs: u64,
    /// Where CSV snapshots are written
    pub data_dir: PathBuf,
    /// Where PDF, HTML and markdown reports are written
    pub reports_dir: PathBuf,
    /// CSV export of the watchlist sheet
    pub watchlist: PathBuf,
    /// Plain symbol list used when the watchlist is empty
    pub stock_list: PathBuf,
    /// Prompt template file
    pub prompt_file: PathBuf,
    /// Render reports but skip delivery
    pub dry_run: bool,
    pub market: MarketSettings,
    pub inference: InferenceSettings,
    pub report: ReportSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: 10,
            data_dir: PathBuf::from("data"),
            reports_dir: PathBuf::from("reports"),
            watchlist: PathBuf::from("watchlist.csv"),
            stock_list: PathBuf::from("stock_list.txt"),
            prompt_file: PathBuf::from(wyckoff_report::prompt::DEFAULT_PROMPT_FILE),
            dry_run: false,
            market: MarketSettings::default(),
            inference: InferenceSettings::default(),
            report: ReportSettings::default(),
        }
    }
}

fn parse_var<T>(name: &str, value: String) -> std::result::Result<T, EnvError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| EnvError::Invalid {
        name: name.to_string(),
        detail: e.to_string(),
        value,
    })
}

impl AppConfig {
    /// Load `.env`, then the TOML file, then environment overrides
    ///
    /// An explicit `path` must exist; otherwise [`DEFAULT_CONFIG_FILE`] is
    /// used when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(env_file) = wyckoff_utils::load_dotenv() {
            debug!("Loaded environment from {}", env_file.display());
        }

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };

        config.apply_overrides(wyckoff_utils::env_opt)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            AgentError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        info!("Loaded config file {}", path.display());
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Overlay environment variables read through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("WYCKOFF_COOLDOWN_SECS") {
            self.cooldown_secs = parse_var("WYCKOFF_COOLDOWN_SECS", v)?;
        }
        for (name, slot) in [
            ("WYCKOFF_DATA_DIR", &mut self.data_dir),
            ("WYCKOFF_REPORTS_DIR", &mut self.reports_dir),
            ("WYCKOFF_WATCHLIST", &mut self.watchlist),
            ("WYCKOFF_STOCK_LIST", &mut self.stock_list),
            ("WYCKOFF_PROMPT_FILE", &mut self.prompt_file),
        ] {
            if let Some(v) = lookup(name) {
                *slot = PathBuf::from(v);
            }
        }
        if let Some(v) = lookup("WYCKOFF_DRY_RUN") {
            self.dry_run = matches!(
                v.to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }

        let inference = &mut self.inference;
        for (name, slot) in [
            ("GEMINI_MODEL", &mut inference.primary_model),
            ("RELAY_MODEL", &mut inference.secondary_model),
            ("AI_MODEL", &mut inference.tertiary_model),
        ] {
            if let Some(v) = lookup(name) {
                *slot = v;
            }
        }
        if let Some(v) = lookup("WYCKOFF_LLM_TIMEOUT_SECS") {
            inference.timeout_secs = parse_var("WYCKOFF_LLM_TIMEOUT_SECS", v)?;
        }

        if let Some(v) = lookup("PDF_CONVERTER") {
            self.report.converter = v;
        }
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let inference = &self.inference;
        if !(0.0..=2.0).contains(&inference.temperature) {
            return Err(AgentError::Config(format!(
                "temperature must be within 0..=2, got {}",
                inference.temperature
            )));
        }
        if inference.timeout_secs == 0 {
            return Err(AgentError::Config(
                "inference timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.report.converter.trim().is_empty() {
            return Err(AgentError::Config("report converter is empty".to_string()));
        }
        if self.report.chart_width < 200 || self.report.chart_height < 200 {
            return Err(AgentError::Config("chart is too small".to_string()));
        }
        self.market.to_market_config()?;
        Ok(())
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}
