//! Transient-vs-fatal classification of provider failures
//!
//! Provider error semantics differ, so the status mapping is data rather than
//! code: callers may load the transient status list from configuration.

use crate::LLMError;
use serde::{Deserialize, Serialize};

/// How the dispatcher should react to a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// Rate limit, overload or transport failure: retry the same tier once
    Transient,
    /// Bad credentials, malformed request, unusable answer: next tier at once
    Fatal,
}

/// Status-code based error classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorPolicy {
    /// HTTP statuses treated as transient; everything else is fatal
    pub transient_statuses: Vec<u16>,
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        Self {
            transient_statuses: vec![408, 429, 500, 502, 503, 504],
        }
    }
}

impl ErrorPolicy {
    /// Create a policy with an explicit transient status list
    pub fn new(transient_statuses: impl IntoIterator<Item = u16>) -> Self {
        Self {
            transient_statuses: transient_statuses.into_iter().collect(),
        }
    }

    /// Classify a provider error
    pub fn classify(&self, error: &LLMError) -> FailureKind {
        if error.is_transport() {
            return FailureKind::Transient;
        }
        match error.status() {
            Some(status) if self.transient_statuses.contains(&status) => FailureKind::Transient,
            _ => FailureKind::Fatal,
        }
    }
}
