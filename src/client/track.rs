use super::DashClaw;
use crate::action::{ActionDefinition, ActionOutcome};
use crate::error::{ClawError, TransportError};
use futures_util::FutureExt;
use std::any::Any;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

/// Handle given to tracked work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedAction {
    pub action_id: String,
}

impl DashClaw {
    /// Submit `action`, run `work`, then report exactly one outcome.
    ///
    /// On success the action is marked `completed` with its duration. On
    /// error (or panic) it is marked `failed` with the error text; a failure
    /// to send that report is logged and the work's own error is returned
    /// (or its panic resumed) unchanged.
    pub async fn track<F, Fut, T, E>(&self, action: ActionDefinition, work: F) -> Result<T, E>
    where
        F: FnOnce(TrackedAction) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<ClawError> + Display,
    {
        let started = Instant::now();
        let response = self.create_action(action).await?;
        let Some(action_id) = response.resolved_action_id().map(str::to_string) else {
            return Err(E::from(ClawError::Transport(TransportError::Decode(
                "action submission returned no action_id".into(),
            ))));
        };

        let result = AssertUnwindSafe(work(TrackedAction {
            action_id: action_id.clone(),
        }))
        .catch_unwind()
        .await;
        let duration_ms = elapsed_ms(started);

        match result {
            Ok(Ok(value)) => {
                self.update_outcome(&action_id, ActionOutcome::completed(duration_ms))
                    .await?;
                Ok(value)
            }
            Ok(Err(err)) => {
                self.report_failure(&action_id, duration_ms, err.to_string())
                    .await;
                Err(err)
            }
            Err(panic) => {
                let message = format!("panicked: {}", panic_message(panic.as_ref()));
                self.report_failure(&action_id, duration_ms, message).await;
                std::panic::resume_unwind(panic)
            }
        }
    }

    async fn report_failure(&self, action_id: &str, duration_ms: u64, message: String) {
        if let Err(e) = self
            .update_outcome(action_id, ActionOutcome::failed(duration_ms, message))
            .await
        {
            tracing::warn!(action_id = %action_id, "failed to record action failure: {e}");
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
