//! Analysis request and result types exchanged with the dispatcher

use crate::{CompletionRequest, ImageSource, Message};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Default system instruction for chart analysis
pub const DEFAULT_SYSTEM_INSTRUCTION: &str =
    "You are Richard D. Wyckoff. You follow strict Wyckoff logic.";

/// Position of a provider in the fallback ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    /// Tried first
    Primary,
    /// Relay endpoint, tried when Primary fails
    Secondary,
    /// Last resort
    Tertiary,
}

impl Tier {
    /// All tiers in dispatch order
    pub const ALL: [Self; 3] = [Self::Primary, Self::Secondary, Self::Tertiary];
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Primary => "Primary",
            Self::Secondary => "Secondary",
            Self::Tertiary => "Tertiary",
        };
        f.write_str(s)
    }
}

/// Immutable input to the dispatcher: one chart, one prompt, one symbol
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    symbol: String,
    chart_png: Vec<u8>,
    prompt: String,
    system: String,
    metadata: BTreeMap<String, String>,
}

impl AnalysisRequest {
    /// Build a request with the default system instruction
    pub fn new(symbol: impl Into<String>, chart_png: Vec<u8>, prompt: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            chart_png,
            prompt: prompt.into(),
            system: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            metadata: BTreeMap::new(),
        }
    }

    /// Replace the system instruction
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = system.into();
        self
    }

    /// Attach a metadata entry (timeframe, bar count, position, ...)
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn chart_png(&self) -> &[u8] {
        &self.chart_png
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn system(&self) -> &str {
        &self.system
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// Lower into a provider completion request for `model`
    ///
    /// The chart is omitted when no image bytes are present.
    pub fn to_completion(&self, model: &str, temperature: f32) -> CompletionRequest {
        let message = if self.chart_png.is_empty() {
            Message::user(self.prompt.clone())
        } else {
            Message::user_with_image(self.prompt.clone(), ImageSource::png(&self.chart_png))
        };

        CompletionRequest::new(model)
            .with_system(self.system.clone())
            .with_temperature(temperature)
            .with_message(message)
    }
}

/// Which tier, provider and model produced a result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub tier: Tier,
    pub provider: String,
    pub model: String,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}/{})", self.tier, self.provider, self.model)
    }
}

/// Narrative produced by exactly one tier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub text: String,
    pub provenance: Provenance,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ContentBlock;

    #[test]
    fn test_tier_order_and_display() {
        assert!(Tier::Primary < Tier::Secondary);
        assert!(Tier::Secondary < Tier::Tertiary);
        assert_eq!(Tier::Secondary.to_string(), "Secondary");
    }

    #[test]
    fn test_to_completion_includes_chart() {
        let request = AnalysisRequest::new("600970", vec![0x89, 0x50], "Analyze {symbol}")
            .with_metadata("timeframe", "5");
        let completion = request.to_completion("gpt-4o", 0.2);

        assert_eq!(completion.model, "gpt-4o");
        assert_eq!(completion.system.as_deref(), Some(DEFAULT_SYSTEM_INSTRUCTION));
        assert_eq!(completion.temperature, Some(0.2));
        assert!(matches!(
            completion.messages[0].content[0],
            ContentBlock::Image { .. }
        ));
        assert_eq!(request.metadata().get("timeframe").map(String::as_str), Some("5"));
    }

    #[test]
    fn test_to_completion_without_chart_is_text_only() {
        let request = AnalysisRequest::new("600970", Vec::new(), "prompt").with_system("sys");
        let completion = request.to_completion("m", 0.5);
        assert_eq!(completion.messages[0].content.len(), 1);
        assert_eq!(completion.system.as_deref(), Some("sys"));
    }

    #[test]
    fn test_provenance_display() {
        let p = Provenance {
            tier: Tier::Primary,
            provider: "gemini".to_string(),
            model: "gemini-3-flash-preview".to_string(),
        };
        assert_eq!(p.to_string(), "Primary (gemini/gemini-3-flash-preview)");
    }
}
