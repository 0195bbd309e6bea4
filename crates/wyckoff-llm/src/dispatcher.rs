//! Tiered inference dispatch
//!
//! Tiers are tried in `Primary → Secondary → Tertiary` order. Each tier gets
//! one call; a transient failure earns exactly one retry on the same tier, a
//! fatal failure moves on immediately. The first success wins and later tiers
//! are never contacted.

use crate::{
    AnalysisRequest, AnalysisResult, ErrorPolicy, FailureKind, LLMError, LLMProvider, Provenance,
    Tier,
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// Calls per tier: the first attempt plus one same-tier retry
const MAX_ATTEMPTS_PER_TIER: u32 = 2;

/// One configured tier: an endpoint plus the model to ask for
#[derive(Clone)]
pub struct TierSlot {
    pub tier: Tier,
    pub provider: Arc<dyn LLMProvider>,
    pub model: String,
}

impl fmt::Debug for TierSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TierSlot")
            .field("tier", &self.tier)
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .finish()
    }
}

/// Why a tier gave up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierFailure {
    pub tier: Tier,
    pub provider: String,
    pub kind: FailureKind,
    pub attempts: u32,
    pub message: String,
}

impl fmt::Display for TierFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} {:?} after {} attempt(s): {}",
            self.tier, self.provider, self.kind, self.attempts, self.message
        )
    }
}

/// Dispatcher-level errors
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Every configured tier failed; the caller should skip this symbol
    #[error("all inference providers exhausted for {symbol}: [{}]", join_failures(.failures))]
    AllProvidersExhausted {
        symbol: String,
        failures: Vec<TierFailure>,
    },

    /// The dispatcher was built without any tier
    #[error("no inference tiers configured")]
    NoTiers,
}

fn join_failures(failures: &[TierFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Resilient Primary → Secondary → Tertiary dispatcher
#[derive(Debug)]
pub struct InferenceDispatcher {
    tiers: Vec<TierSlot>,
    policy: ErrorPolicy,
    retry_backoff: Duration,
    temperature: f32,
}

impl InferenceDispatcher {
    /// Create a new dispatcher builder
    pub fn builder() -> InferenceDispatcherBuilder {
        InferenceDispatcherBuilder::default()
    }

    /// Configured tiers in dispatch order
    pub fn tiers(&self) -> impl Iterator<Item = Tier> + '_ {
        self.tiers.iter().map(|t| t.tier)
    }

    /// Run the request through the tiers until one succeeds
    #[instrument(
        skip_all,
        fields(symbol = %request.symbol(), metadata = ?request.metadata())
    )]
    pub async fn dispatch(
        &self,
        request: &AnalysisRequest,
    ) -> Result<AnalysisResult, DispatchError> {
        let mut failures = Vec::with_capacity(self.tiers.len());

        for slot in &self.tiers {
            match self.try_tier(slot, request).await {
                Ok(result) => return Ok(result),
                Err(failure) => failures.push(failure),
            }
        }

        error!(
            "All {} inference tier(s) failed for {}",
            failures.len(),
            request.symbol()
        );
        Err(DispatchError::AllProvidersExhausted {
            symbol: request.symbol().to_string(),
            failures,
        })
    }

    async fn try_tier(
        &self,
        slot: &TierSlot,
        request: &AnalysisRequest,
    ) -> Result<AnalysisResult, TierFailure> {
        let provider = slot.provider.name().to_string();
        let mut attempt = 1;

        loop {
            let completion = request.to_completion(&slot.model, self.temperature);
            let outcome = slot
                .provider
                .complete(completion)
                .await
                .and_then(|response| {
                    if response.is_truncated() {
                        warn!(
                            tier = %slot.tier,
                            stop_reason = ?response.stop_reason,
                            "Narrative may be incomplete"
                        );
                    }
                    let text = response.text();
                    if text.trim().is_empty() {
                        Err(LLMError::EmptyResponse)
                    } else {
                        Ok(text)
                    }
                });

            match outcome {
                Ok(text) => {
                    info!(
                        tier = %slot.tier,
                        provider = %provider,
                        model = %slot.model,
                        attempt,
                        outcome = "success",
                        "Inference attempt succeeded"
                    );
                    return Ok(AnalysisResult {
                        text,
                        provenance: Provenance {
                            tier: slot.tier,
                            provider,
                            model: slot.model.clone(),
                        },
                    });
                }
                Err(e) => {
                    let kind = self.policy.classify(&e);
                    warn!(
                        tier = %slot.tier,
                        provider = %provider,
                        attempt,
                        outcome = ?kind,
                        error = %e,
                        "Inference attempt failed"
                    );

                    if kind == FailureKind::Transient && attempt < MAX_ATTEMPTS_PER_TIER {
                        sleep(self.retry_backoff).await;
                        attempt += 1;
                        continue;
                    }

                    return Err(TierFailure {
                        tier: slot.tier,
                        provider,
                        kind,
                        attempts: attempt,
                        message: e.to_string(),
                    });
                }
            }
        }
    }
}

/// Builder for [`InferenceDispatcher`]
#[derive(Debug)]
pub struct InferenceDispatcherBuilder {
    tiers: Vec<TierSlot>,
    policy: ErrorPolicy,
    retry_backoff: Duration,
    temperature: f32,
}

impl Default for InferenceDispatcherBuilder {
    fn default() -> Self {
        Self {
            tiers: Vec::new(),
            policy: ErrorPolicy::default(),
            retry_backoff: Duration::from_secs(2),
            temperature: 0.2,
        }
    }
}

impl InferenceDispatcherBuilder {
    /// Register a tier; a later registration for the same tier replaces it
    pub fn tier(
        mut self,
        tier: Tier,
        provider: Arc<dyn LLMProvider>,
        model: impl Into<String>,
    ) -> Self {
        self.tiers.retain(|t| t.tier != tier);
        self.tiers.push(TierSlot {
            tier,
            provider,
            model: model.into(),
        });
        self
    }

    /// Set the error classification policy
    pub fn policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the pause before the same-tier retry
    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Set the sampling temperature used for every tier
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Build the dispatcher; tiers are ordered by [`Tier`] regardless of
    /// registration order
    pub fn build(mut self) -> Result<InferenceDispatcher, DispatchError> {
        if self.tiers.is_empty() {
            return Err(DispatchError::NoTiers);
        }
        self.tiers.sort_by_key(|t| t.tier);

        Ok(InferenceDispatcher {
            tiers: self.tiers,
            policy: self.policy,
            retry_backoff: self.retry_backoff,
            temperature: self.temperature,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CompletionRequest, CompletionResponse, Message, StopReason};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Plays back a fixed list of outcomes: `Ok(text)` or `Err(status)`
    struct ScriptedProvider {
        name: String,
        script: Mutex<VecDeque<std::result::Result<String, u16>>>,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new(name: &str, script: Vec<std::result::Result<&str, u16>>) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                script: Mutex::new(
                    script
                        .into_iter()
                        .map(|r| r.map(str::to_string))
                        .collect(),
                ),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LLMProvider for ScriptedProvider {
        async fn complete(&self, _request: CompletionRequest) -> crate::Result<CompletionResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(Ok(text)) => Ok(CompletionResponse {
                    message: Message::assistant(text),
                    stop_reason: StopReason::EndTurn,
                    usage: None,
                }),
                Some(Err(status)) => Err(LLMError::Http {
                    status,
                    body: format!("scripted {status}"),
                }),
                None => panic!("{} called more often than scripted", self.name),
            }
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    fn request() -> AnalysisRequest {
        AnalysisRequest::new("600970", vec![1, 2, 3], "analyze")
    }

    fn dispatcher(
        primary: &Arc<ScriptedProvider>,
        secondary: &Arc<ScriptedProvider>,
        tertiary: &Arc<ScriptedProvider>,
    ) -> InferenceDispatcher {
        InferenceDispatcher::builder()
            .tier(Tier::Primary, primary.clone(), "gemini-test")
            .tier(Tier::Secondary, secondary.clone(), "relay-model")
            .tier(Tier::Tertiary, tertiary.clone(), "gpt-4o")
            .retry_backoff(Duration::ZERO)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_primary_success_skips_others() {
        let primary = ScriptedProvider::new("gemini", vec![Ok("primary text")]);
        let secondary = ScriptedProvider::new("relay", vec![]);
        let tertiary = ScriptedProvider::new("openai", vec![]);

        let result = dispatcher(&primary, &secondary, &tertiary)
            .dispatch(&request())
            .await
            .unwrap();

        assert_eq!(result.text, "primary text");
        assert_eq!(result.provenance.tier, Tier::Primary);
        assert_eq!(result.provenance.model, "gemini-test");
        assert_eq!(primary.calls(), 1);
        assert_eq!(secondary.calls(), 0);
        assert_eq!(tertiary.calls(), 0);
    }

    #[tokio::test]
    async fn test_rate_limited_twice_then_secondary() {
        let primary = ScriptedProvider::new("gemini", vec![Err(429), Err(429)]);
        let secondary = ScriptedProvider::new("relay", vec![Ok("secondary text")]);
        let tertiary = ScriptedProvider::new("openai", vec![]);

        let result = dispatcher(&primary, &secondary, &tertiary)
            .dispatch(&request())
            .await
            .unwrap();

        assert_eq!(result.provenance.tier, Tier::Secondary);
        assert_eq!(result.provenance.provider, "relay");
        assert_eq!(result.text, "secondary text");
        assert_eq!(primary.calls(), 2);
        assert_eq!(secondary.calls(), 1);
        assert_eq!(tertiary.calls(), 0);
    }

    #[tokio::test]
    async fn test_bad_request_is_not_retried() {
        let primary = ScriptedProvider::new("gemini", vec![Err(400)]);
        let secondary = ScriptedProvider::new("relay", vec![Ok("secondary text")]);
        let tertiary = ScriptedProvider::new("openai", vec![]);

        let result = dispatcher(&primary, &secondary, &tertiary)
            .dispatch(&request())
            .await
            .unwrap();

        assert_eq!(result.provenance.tier, Tier::Secondary);
        assert_eq!(primary.calls(), 1);
    }

    #[tokio::test]
    async fn test_transient_then_success_stays_on_tier() {
        let primary = ScriptedProvider::new("gemini", vec![Err(503), Ok("after retry")]);
        let secondary = ScriptedProvider::new("relay", vec![]);
        let tertiary = ScriptedProvider::new("openai", vec![]);

        let result = dispatcher(&primary, &secondary, &tertiary)
            .dispatch(&request())
            .await
            .unwrap();

        assert_eq!(result.provenance.tier, Tier::Primary);
        assert_eq!(result.text, "after retry");
        assert_eq!(primary.calls(), 2);
        assert_eq!(secondary.calls(), 0);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_dispatch_span_carries_metadata() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let primary = ScriptedProvider::new("gemini", vec![Ok("primary text")]);
        let secondary = ScriptedProvider::new("relay", vec![]);
        let tertiary = ScriptedProvider::new("openai", vec![]);
        dispatcher(&primary, &secondary, &tertiary)
            .dispatch(&request().with_metadata("timeframe", "5m"))
            .await
            .unwrap();

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("symbol=600970"), "{output}");
        assert!(output.contains("\"timeframe\": \"5m\""), "{output}");
    }

    #[tokio::test]
    async fn test_all_tiers_exhausted() {
        let primary = ScriptedProvider::new("gemini", vec![Err(503), Err(503)]);
        let secondary = ScriptedProvider::new("relay", vec![Err(401)]);
        let tertiary = ScriptedProvider::new("openai", vec![Err(429), Err(500)]);

        let err = dispatcher(&primary, &secondary, &tertiary)
            .dispatch(&request())
            .await
            .unwrap_err();

        match err {
            DispatchError::AllProvidersExhausted { symbol, failures } => {
                assert_eq!(symbol, "600970");
                assert_eq!(failures.len(), 3);
                assert_eq!(failures[0].attempts, 2);
                assert_eq!(failures[1].kind, FailureKind::Fatal);
                assert_eq!(failures[1].attempts, 1);
                assert_eq!(failures[2].tier, Tier::Tertiary);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(primary.calls(), 2);
        assert_eq!(secondary.calls(), 1);
        assert_eq!(tertiary.calls(), 2);
    }

    #[tokio::test]
    async fn test_empty_text_moves_to_next_tier() {
        let primary = ScriptedProvider::new("gemini", vec![Ok("   ")]);
        let secondary = ScriptedProvider::new("relay", vec![Ok("real text")]);
        let tertiary = ScriptedProvider::new("openai", vec![]);

        let result = dispatcher(&primary, &secondary, &tertiary)
            .dispatch(&request())
            .await
            .unwrap();

        assert_eq!(result.provenance.tier, Tier::Secondary);
        assert_eq!(primary.calls(), 1);
    }

    #[tokio::test]
    async fn test_custom_policy_changes_retry_behavior() {
        let primary = ScriptedProvider::new("gemini", vec![Err(429)]);
        let secondary = ScriptedProvider::new("relay", vec![Ok("ok")]);

        let dispatcher = InferenceDispatcher::builder()
            .tier(Tier::Primary, primary.clone(), "m")
            .tier(Tier::Secondary, secondary.clone(), "m")
            .policy(ErrorPolicy::new([503]))
            .retry_backoff(Duration::ZERO)
            .build()
            .unwrap();

        let result = dispatcher.dispatch(&request()).await.unwrap();
        assert_eq!(result.provenance.tier, Tier::Secondary);
        assert_eq!(primary.calls(), 1);
    }

    #[test]
    fn test_builder_orders_tiers_and_rejects_empty() {
        let p = ScriptedProvider::new("a", vec![]);
        let dispatcher = InferenceDispatcher::builder()
            .tier(Tier::Tertiary, p.clone(), "m")
            .tier(Tier::Primary, p.clone(), "m")
            .build()
            .unwrap();
        assert_eq!(
            dispatcher.tiers().collect::<Vec<_>>(),
            vec![Tier::Primary, Tier::Tertiary]
        );

        assert!(matches!(
            InferenceDispatcher::builder().build(),
            Err(DispatchError::NoTiers)
        ));
    }
}
