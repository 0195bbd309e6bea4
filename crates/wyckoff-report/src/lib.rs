//! Report generation for wyckoff-rs
//!
//! - [`prompt`]: loads the private prompt template and renders it against an
//!   indicator frame
//! - [`chart`]: candlestick PNG with MA50/MA200 and a volume pane
//! - [`markdown`] and [`pdf`]: narrative to HTML to PDF
//! - [`delivery`]: uploads finished PDFs to a messaging bot

pub mod chart;
pub mod delivery;
pub mod error;
pub mod markdown;
pub mod pdf;
pub mod prompt;

pub use chart::{ChartRenderer, ChartStyle, PlottersChart};
pub use delivery::{ReportSink, TelegramConfig, TelegramSink};
pub use error::{ReportError, Result};
pub use pdf::{HtmlPdfRenderer, RenderedReport, ReportDocument, ReportRenderer};
pub use prompt::{Position, PromptContext, PromptTemplate};
