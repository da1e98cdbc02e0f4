use super::DashClaw;
use crate::error::TransportError;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;

const TOKENS_PATH: [&str; 2] = ["api", "tokens"];

/// Token consumption snapshot for `POST /api/tokens`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TokenUsage {
    pub tokens_in: u64,
    pub tokens_out: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_used: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_max: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Serialize)]
struct TokenUsagePayload<'a> {
    #[serde(flatten)]
    usage: &'a TokenUsage,
    agent_id: &'a str,
}

/// Narrow seam for LLM instrumentation: adapters hold a reporter and call
/// it explicitly after each model response.
pub trait TokenUsageReporter: Send + Sync {
    fn report_token_usage(
        &self,
        usage: TokenUsage,
    ) -> Pin<Box<dyn Future<Output = Result<Value, TransportError>> + Send + '_>>;

    /// Fire-and-forget report. Does nothing when both counts are unknown;
    /// failures are dropped.
    fn record_llm_usage(
        &self,
        tokens_in: Option<u64>,
        tokens_out: Option<u64>,
        model: Option<String>,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            if tokens_in.is_none() && tokens_out.is_none() {
                return;
            }
            let usage = TokenUsage {
                tokens_in: tokens_in.unwrap_or(0),
                tokens_out: tokens_out.unwrap_or(0),
                model,
                ..TokenUsage::default()
            };
            if let Err(e) = self.report_token_usage(usage).await {
                tracing::debug!("token usage report dropped: {e}");
            }
        })
    }
}

impl DashClaw {
    pub(super) async fn post_token_usage(&self, usage: &TokenUsage) -> Result<Value, TransportError> {
        let payload = TokenUsagePayload {
            usage,
            agent_id: &self.config.agent_id,
        };
        self.transport.post(&TOKENS_PATH, &[], &payload).await
    }
}

impl TokenUsageReporter for DashClaw {
    fn report_token_usage(
        &self,
        usage: TokenUsage,
    ) -> Pin<Box<dyn Future<Output = Result<Value, TransportError>> + Send + '_>> {
        Box::pin(async move { self.post_token_usage(&usage).await })
    }
}
