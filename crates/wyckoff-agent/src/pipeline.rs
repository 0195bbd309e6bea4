//! Per-symbol report pipeline
//!
//! Symbols are processed one at a time: unify candles, compute indicators,
//! snapshot the data, chart, prompt, dispatch, render and deliver. Any failure
//! skips the symbol and the run moves on after the cooldown.

use chrono::Local;
use comfy_table::{Table, presets::UTF8_FULL};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument};
use wyckoff_llm::{AnalysisRequest, InferenceDispatcher, Provenance};
use wyckoff_market::{DataUnifier, IndicatorFrame};
use wyckoff_report::{
    ChartRenderer, PromptContext, PromptTemplate, ReportDocument, ReportError, ReportRenderer,
    ReportSink,
};

use crate::error::AgentError;
use crate::watchlist::WatchlistEntry;

/// Suffix format shared by the snapshot and chart files of one run
pub const RUN_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Step at which a symbol was abandoned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Data,
    Chart,
    Prompt,
    Inference,
    Render,
    Delivery,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Data => "data",
            Self::Chart => "chart",
            Self::Prompt => "prompt",
            Self::Inference => "inference",
            Self::Render => "render",
            Self::Delivery => "delivery",
        };
        f.write_str(name)
    }
}

/// Failure tagged with the stage it happened in
#[derive(Debug)]
pub struct StageError {
    pub stage: Stage,
    pub error: AgentError,
}

trait AtStage<T> {
    fn at(self, stage: Stage) -> Result<T, StageError>;
}

impl<T, E: Into<AgentError>> AtStage<T> for Result<T, E> {
    fn at(self, stage: Stage) -> Result<T, StageError> {
        self.map_err(|e| StageError {
            stage,
            error: e.into(),
        })
    }
}

/// What happened to one symbol
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Report rendered and sent
    Delivered { provenance: Provenance, pdf: PathBuf },
    /// Report rendered, delivery disabled
    Rendered { provenance: Provenance, pdf: PathBuf },
    /// No report for this symbol
    Skipped { stage: Stage, reason: String },
}

/// Per-symbol result line
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolReport {
    pub symbol: String,
    pub outcome: Outcome,
}

/// Result of a whole run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub reports: Vec<SymbolReport>,
}

impl RunSummary {
    pub fn delivered(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Delivered { .. }))
    }

    pub fn rendered(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Rendered { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Skipped { .. }))
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.reports.iter().filter(|r| pred(&r.outcome)).count()
    }

    /// Table for the terminal
    pub fn table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_header(["Symbol", "Status", "Detail"]);
        for report in &self.reports {
            let (status, detail) = match &report.outcome {
                Outcome::Delivered { provenance, pdf } => (
                    "delivered".to_string(),
                    format!("{provenance} {}", pdf.display()),
                ),
                Outcome::Rendered { provenance, pdf } => (
                    "rendered".to_string(),
                    format!("{provenance} {}", pdf.display()),
                ),
                Outcome::Skipped { stage, reason } => {
                    (format!("skipped ({stage})"), reason.clone())
                }
            };
            table.add_row([report.symbol.clone(), status, detail]);
        }
        table
    }
}

/// Paths and timings for a run
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub data_dir: PathBuf,
    pub reports_dir: PathBuf,
    pub cooldown: Duration,
    pub system_instruction: String,
}

/// The report pipeline and its collaborators
pub struct Pipeline {
    unifier: DataUnifier,
    dispatcher: InferenceDispatcher,
    chart: Arc<dyn ChartRenderer>,
    renderer: Arc<dyn ReportRenderer>,
    sink: Option<Arc<dyn ReportSink>>,
    prompt: Option<PromptTemplate>,
    settings: PipelineSettings,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("unifier", &self.unifier)
            .field("dispatcher", &self.dispatcher)
            .field("sink", &self.sink.as_ref().map(|s| s.name().to_string()))
            .field("has_prompt", &self.prompt.is_some())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn new(
        unifier: DataUnifier,
        dispatcher: InferenceDispatcher,
        chart: Arc<dyn ChartRenderer>,
        renderer: Arc<dyn ReportRenderer>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            unifier,
            dispatcher,
            chart,
            renderer,
            sink: None,
            prompt: None,
            settings,
        }
    }

    /// Deliver finished reports to `sink`; without one the run is a dry run
    pub fn with_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_prompt(mut self, prompt: PromptTemplate) -> Self {
        self.prompt = Some(prompt);
        self
    }

    /// Process every target in order with the cooldown in between
    pub async fn run(&self, targets: &[WatchlistEntry]) -> RunSummary {
        let mut summary = RunSummary::default();
        let stamp = Local::now().format(RUN_STAMP_FORMAT).to_string();

        for (i, entry) in targets.iter().enumerate() {
            if i > 0 && !self.settings.cooldown.is_zero() {
                info!("Cooling down for {:?}", self.settings.cooldown);
                tokio::time::sleep(self.settings.cooldown).await;
            }

            info!(
                "[{}/{}] Processing {} ({}, {} bars)",
                i + 1,
                targets.len(),
                entry.symbol,
                entry.timeframe,
                entry.bars
            );

            let outcome = match self.process(entry, &stamp).await {
                Ok(outcome) => outcome,
                Err(StageError { stage, error }) => {
                    error!(symbol = %entry.symbol, %stage, error = %error, "Symbol skipped");
                    Outcome::Skipped {
                        stage,
                        reason: error.to_string(),
                    }
                }
            };

            summary.reports.push(SymbolReport {
                symbol: entry.symbol.clone(),
                outcome,
            });
        }

        info!(
            delivered = summary.delivered(),
            rendered = summary.rendered(),
            skipped = summary.skipped(),
            "Run finished"
        );
        summary
    }

    #[instrument(skip_all, fields(symbol = %entry.symbol))]
    async fn process(&self, entry: &WatchlistEntry, stamp: &str) -> Result<Outcome, StageError> {
        let symbol = entry.symbol.as_str();

        let series = self
            .unifier
            .unify(symbol, entry.timeframe, entry.bars)
            .await
            .at(Stage::Data)?;
        let frame = IndicatorFrame::compute(series).at(Stage::Data)?;
        self.write_snapshot(entry, &frame, stamp)
            .await
            .at(Stage::Data)?;

        let chart_path = self
            .settings
            .reports_dir
            .join(format!("{symbol}_chart_{stamp}.png"));
        tokio::fs::create_dir_all(&self.settings.reports_dir)
            .await
            .at(Stage::Chart)?;
        let chart_png = self.chart.render(&frame, &chart_path).await.at(Stage::Chart)?;

        let prompt = self.render_prompt(entry, &frame).at(Stage::Prompt)?;

        let request = AnalysisRequest::new(symbol, chart_png.clone(), prompt)
            .with_system(self.settings.system_instruction.clone())
            .with_metadata("timeframe", entry.timeframe.to_string())
            .with_metadata("bars", frame.series().len().to_string());
        let result = self.dispatcher.dispatch(&request).await.at(Stage::Inference)?;
        info!(provenance = %result.provenance, "Analysis received");

        let document =
            ReportDocument::new(symbol, result.text, chart_png, result.provenance.clone());
        let rendered = self
            .renderer
            .render(&document, &self.settings.reports_dir)
            .await
            .at(Stage::Render)?;

        let Some(sink) = &self.sink else {
            info!(pdf = %rendered.pdf.display(), "Dry run, delivery skipped");
            return Ok(Outcome::Rendered {
                provenance: result.provenance,
                pdf: rendered.pdf,
            });
        };

        let caption = format!("{symbol} | {}", result.provenance.tier);
        sink.deliver(&rendered.pdf, &caption)
            .await
            .at(Stage::Delivery)?;

        Ok(Outcome::Delivered {
            provenance: result.provenance,
            pdf: rendered.pdf,
        })
    }

    fn render_prompt(
        &self,
        entry: &WatchlistEntry,
        frame: &IndicatorFrame,
    ) -> Result<String, ReportError> {
        let template = self.prompt.as_ref().ok_or_else(|| {
            ReportError::PromptMissing("no prompt template configured".to_string())
        })?;
        let context = PromptContext::from_frame(frame, entry.position())?;
        template.render(&context)
    }

    async fn write_snapshot(
        &self,
        entry: &WatchlistEntry,
        frame: &IndicatorFrame,
        stamp: &str,
    ) -> crate::error::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.settings.data_dir).await?;
        let path = self.settings.data_dir.join(format!(
            "{}_{}m_{stamp}.csv",
            entry.symbol,
            entry.timeframe.minutes()
        ));
        tokio::fs::write(&path, frame.to_csv()?).await?;
        Ok(path)
    }
}
