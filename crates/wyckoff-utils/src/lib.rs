//! Shared utilities for wyckoff-rs
//!
//! This crate provides common functionality used across the wyckoff-rs workspace:
//! tracing setup and the environment-variable helpers every `from_env()`
//! constructor in the workspace is built on.

pub mod config;
pub mod logging;

pub use config::{EnvError, env_flag, env_opt, env_or, env_parse, load_dotenv};
pub use logging::{LogFormat, init_tracing, init_tracing_with};
