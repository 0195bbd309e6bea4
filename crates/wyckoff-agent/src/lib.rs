//! Wyckoff report agent
//!
//! Wires the market, LLM and report crates into the per-symbol pipeline:
//!
//! - [`config`]: TOML file plus environment overrides
//! - [`watchlist`]: target resolution and watchlist maintenance
//! - [`tiers`]: inference tiers enabled by the credentials present
//! - [`pipeline`]: the sequential run loop with per-symbol containment

pub mod config;
pub mod error;
pub mod pipeline;
pub mod tiers;
pub mod watchlist;

pub use config::{AppConfig, InferenceSettings, MarketSettings, ReportSettings};
pub use error::{AgentError, Result};
pub use pipeline::{Outcome, Pipeline, PipelineSettings, RunSummary, Stage, SymbolReport};
pub use tiers::{TierCredentials, build_dispatcher};
pub use watchlist::{Watchlist, WatchlistEntry, resolve_targets};
