//! LLM layer for wyckoff-rs
//!
//! This crate provides everything needed to turn a chart and a prompt into a
//! written analysis:
//!
//! - Message and completion types shared by all providers
//! - The [`LLMProvider`] trait and concrete Gemini / OpenAI-compatible providers
//! - [`ErrorPolicy`], the configurable transient-vs-fatal classification
//! - [`InferenceDispatcher`], the Primary → Secondary → Tertiary fallback chain

pub mod analysis;
pub mod completion;
pub mod dispatcher;
pub mod error;
pub mod messages;
pub mod policy;
pub mod provider;
pub mod providers;

// Re-export main types
pub use analysis::{AnalysisRequest, AnalysisResult, Provenance, Tier};
pub use completion::{CompletionRequest, CompletionResponse, StopReason, TokenUsage};
pub use dispatcher::{DispatchError, InferenceDispatcher, TierFailure, TierSlot};
pub use error::{LLMError, Result};
pub use messages::{ContentBlock, ImageSource, Message, Role};
pub use policy::{ErrorPolicy, FailureKind};
pub use provider::LLMProvider;
