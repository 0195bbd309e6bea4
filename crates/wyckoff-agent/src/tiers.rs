//! Inference tier wiring
//!
//! Each tier is switched on by its credentials:
//!
//! | Tier      | Protocol          | Key              | Base URL          | Model          |
//! |-----------|-------------------|------------------|-------------------|----------------|
//! | Primary   | Gemini            | `GEMINI_API_KEY` | `GEMINI_API_BASE` | `GEMINI_MODEL` |
//! | Secondary | OpenAI-compatible | `RELAY_API_KEY`  | `RELAY_API_BASE`  | `RELAY_MODEL`  |
//! | Tertiary  | OpenAI-compatible | `OPENAI_API_KEY` | `OPENAI_API_BASE` | `AI_MODEL`     |

use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use wyckoff_llm::providers::{GeminiConfig, GeminiProvider, OpenAIConfig, OpenAIProvider};
use wyckoff_llm::{InferenceDispatcher, LLMError, Tier};

use crate::config::InferenceSettings;
use crate::error::Result;

/// Credentials found for each tier
#[derive(Debug, Clone, Default)]
pub struct TierCredentials {
    pub primary: Option<GeminiConfig>,
    pub secondary: Option<OpenAIConfig>,
    pub tertiary: Option<OpenAIConfig>,
}

/// Treat a missing key as "tier not configured"
fn optional<T>(result: wyckoff_llm::Result<T>) -> wyckoff_llm::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(LLMError::ConfigurationError(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

impl TierCredentials {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            primary: optional(GeminiConfig::from_env())?,
            secondary: optional(OpenAIConfig::from_env_prefix("RELAY"))?,
            tertiary: optional(OpenAIConfig::from_env_prefix("OPENAI"))?,
        })
    }
}

/// Build the dispatcher from settings and whichever credentials are present
pub fn build_dispatcher(
    settings: &InferenceSettings,
    credentials: TierCredentials,
) -> Result<InferenceDispatcher> {
    let mut builder = InferenceDispatcher::builder()
        .policy(settings.policy.clone())
        .retry_backoff(Duration::from_secs(settings.retry_backoff_secs))
        .temperature(settings.temperature);

    if let Some(config) = credentials.primary {
        let provider = GeminiProvider::with_config(config.with_timeout(settings.timeout_secs))?;
        builder = builder.tier(Tier::Primary, Arc::new(provider), &settings.primary_model);
    }
    if let Some(config) = credentials.secondary {
        let provider = OpenAIProvider::with_config(config.with_timeout(settings.timeout_secs))?;
        builder = builder.tier(Tier::Secondary, Arc::new(provider), &settings.secondary_model);
    }
    if let Some(config) = credentials.tertiary {
        let provider = OpenAIProvider::with_config(config.with_timeout(settings.timeout_secs))?;
        builder = builder.tier(Tier::Tertiary, Arc::new(provider), &settings.tertiary_model);
    }

    let dispatcher = builder.build()?;
    info!(
        tiers = ?dispatcher.tiers().collect::<Vec<_>>(),
        "Inference dispatcher ready"
    );
    Ok(dispatcher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentError;
    use wyckoff_llm::DispatchError;

    #[test]
    fn test_no_credentials_is_error() {
        let result = build_dispatcher(&InferenceSettings::default(), TierCredentials::default());
        assert!(matches!(
            result,
            Err(AgentError::Dispatch(DispatchError::NoTiers))
        ));
    }

    #[test]
    fn test_only_configured_tiers_are_built() {
        let credentials = TierCredentials {
            primary: None,
            secondary: Some(OpenAIConfig::new("relay-key").with_name("relay")),
            tertiary: Some(OpenAIConfig::new("openai-key")),
        };
        let dispatcher = build_dispatcher(&InferenceSettings::default(), credentials).unwrap();
        assert_eq!(
            dispatcher.tiers().collect::<Vec<_>>(),
            vec![Tier::Secondary, Tier::Tertiary]
        );
    }

    #[test]
    fn test_optional_keeps_other_errors() {
        let missing: wyckoff_llm::Result<()> =
            Err(LLMError::ConfigurationError("unset".to_string()));
        assert!(optional(missing).unwrap().is_none());

        let other: wyckoff_llm::Result<()> = Err(LLMError::EmptyResponse);
        assert!(optional(other).is_err());
    }
}
