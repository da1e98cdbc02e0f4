use crate::action::{ActionResponse, ActionStatus};
use crate::config::ApprovalConfig;
use crate::error::ClawError;
use crate::transport::Transport;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

const DENIED_FALLBACK: &str = "Operator denied the action.";

/// Polls a pending action until an operator resolves it or the wait expires.
#[derive(Debug, Clone)]
pub struct ApprovalWaiter {
    transport: Arc<Transport>,
    timeout: Duration,
    poll_interval: Duration,
}

impl ApprovalWaiter {
    pub fn new(transport: Arc<Transport>, timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            transport,
            timeout,
            poll_interval: poll_interval.max(Duration::from_millis(1)),
        }
    }

    pub fn from_config(transport: Arc<Transport>, config: &ApprovalConfig) -> Self {
        Self::new(transport, config.timeout(), config.poll_interval())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Wait for `pending_approval -> running`.
    ///
    /// `failed`/`cancelled` end the wait with [`ClawError::ApprovalDenied`];
    /// running out of time yields [`ClawError::Timeout`]. A poll that fails
    /// in transport ends the wait with that error.
    pub async fn wait(&self, action_id: &str) -> Result<ActionResponse, ClawError> {
        let deadline = Instant::now() + self.timeout;
        tracing::info!(action_id = %action_id, "action requires human approval; waiting");

        loop {
            let response: ActionResponse = self
                .transport
                .get(&["api", "actions", action_id], &[])
                .await?;

            match response.status() {
                Some(ActionStatus::Running) => {
                    tracing::info!(action_id = %action_id, "action approved by operator");
                    return Ok(ActionResponse {
                        action_id: Some(action_id.to_string()),
                        ..response
                    });
                }
                Some(ActionStatus::Failed | ActionStatus::Cancelled) => {
                    let reason = response
                        .action
                        .and_then(|a| a.error_message)
                        .filter(|m| !m.trim().is_empty())
                        .unwrap_or_else(|| DENIED_FALLBACK.to_string());
                    tracing::info!(action_id = %action_id, reason = %reason, "action denied by operator");
                    return Err(ClawError::ApprovalDenied {
                        action_id: action_id.to_string(),
                        reason,
                    });
                }
                _ => {}
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(ClawError::Timeout {
                    action_id: action_id.to_string(),
                    waited: self.timeout,
                });
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }
}
