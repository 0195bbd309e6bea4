//! The provider seam

use crate::{CompletionRequest, CompletionResponse, Result};
use async_trait::async_trait;

/// One implementation per wire protocol; the dispatcher holds them as
/// `Arc<dyn LLMProvider>` so any endpoint speaking a known protocol can sit in
/// any tier.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Short label used in provenance, e.g. `gemini` or `relay`
    fn name(&self) -> &str;
}
