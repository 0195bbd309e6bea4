//! Market data for wyckoff-rs
//!
//! This crate turns two imperfect A-share candle sources into one clean series:
//!
//! - [`providers`]: the long-history Sina client and the real-time EastMoney
//!   client, both behind the [`CandleProvider`] trait
//! - [`unifier`]: merge, volume-unit reconciliation and cleaning
//! - [`indicators`]: MA50 / MA200 overlays and the CSV snapshot fed to prompts
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use wyckoff_market::{DataUnifier, MarketConfig, Timeframe};
//! use wyckoff_market::providers::{EastMoneyClient, SinaClient};
//!
//! let config = MarketConfig::default();
//! let unifier = DataUnifier::new(
//!     Arc::new(SinaClient::new(&config)?),
//!     Arc::new(EastMoneyClient::new(&config)?),
//! );
//! let series = unifier.unify("600970", Timeframe::M5, 500).await?;
//! ```

pub mod candle;
pub mod clean;
pub mod config;
pub mod error;
pub mod indicators;
pub mod normalize;
pub mod provider;
pub mod providers;
pub mod symbol;
pub mod unifier;

pub use candle::{Bar, CandleSeries, ProviderBatch, Timeframe, VolumeUnit};
pub use config::MarketConfig;
pub use error::{MarketError, Result};
pub use indicators::IndicatorFrame;
pub use normalize::{UnitCorrection, UnitHeuristic};
pub use provider::CandleProvider;
pub use symbol::{Exchange, normalize_symbol};
pub use unifier::DataUnifier;
