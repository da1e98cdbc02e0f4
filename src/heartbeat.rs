//! Background liveness reporting.
//!
//! At most one worker runs per scheduler. The worker waits on a shutdown
//! channel between reports, so `stop` takes effect without sitting out the
//! rest of the interval.

use crate::error::TransportError;
use crate::transport::Transport;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

const HEARTBEAT_PATH: [&str; 3] = ["api", "agents", "heartbeat"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    #[default]
    Online,
    Busy,
    Error,
}

impl AgentStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "online" => Some(Self::Online),
            "busy" => Some(Self::Busy),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeartbeatReport {
    pub status: AgentStatus,
    pub current_task_id: Option<String>,
    pub metadata: Option<Value>,
}

#[derive(Debug, Serialize)]
struct HeartbeatPayload<'a> {
    agent_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    agent_name: Option<&'a str>,
    status: AgentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    current_task_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a Value>,
}

#[derive(Debug, Clone)]
struct Reporter {
    transport: Arc<Transport>,
    agent_id: String,
    agent_name: Option<String>,
}

impl Reporter {
    async fn send(&self, report: &HeartbeatReport) -> Result<Value, TransportError> {
        let payload = HeartbeatPayload {
            agent_id: &self.agent_id,
            agent_name: self.agent_name.as_deref(),
            status: report.status,
            current_task_id: report.current_task_id.as_deref(),
            metadata: report.metadata.as_ref(),
        };
        self.transport.post(&HEARTBEAT_PATH, &[], &payload).await
    }
}

struct Worker {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

pub struct HeartbeatScheduler {
    reporter: Reporter,
    stop_timeout: Duration,
    worker: Mutex<Option<Worker>>,
}

impl HeartbeatScheduler {
    pub fn new(
        transport: Arc<Transport>,
        agent_id: impl Into<String>,
        agent_name: Option<String>,
        stop_timeout: Duration,
    ) -> Self {
        Self {
            reporter: Reporter {
                transport,
                agent_id: agent_id.into(),
                agent_name,
            },
            stop_timeout,
            worker: Mutex::new(None),
        }
    }

    /// Send one report now. Errors are returned, not swallowed.
    pub async fn report(&self, report: &HeartbeatReport) -> Result<Value, TransportError> {
        self.reporter.send(report).await
    }

    /// Spawn the worker unless one is already running.
    ///
    /// Returns `true` when a worker was started. Must be called from within
    /// a tokio runtime; outside one this logs and returns `false`.
    pub fn start(&self, interval: Duration, report: HeartbeatReport) -> bool {
        let mut slot = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|w| !w.handle.is_finished()) {
            return false;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("heartbeat not started: no tokio runtime");
            return false;
        };

        let (shutdown, shutdown_rx) = watch::channel(false);
        let reporter = self.reporter.clone();
        let interval = interval.max(Duration::from_millis(1));
        let handle = runtime.spawn(run_heartbeat_loop(reporter, report, interval, shutdown_rx));
        tracing::debug!(interval_ms = interval.as_millis(), "heartbeat started");

        *slot = Some(Worker { shutdown, handle });
        true
    }

    /// Signal the worker and wait up to the stop timeout for it to exit.
    /// Returns `true` when a worker was running.
    pub async fn stop(&self) -> bool {
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(Worker { shutdown, mut handle }) = worker else {
            return false;
        };

        let _ = shutdown.send(true);
        if tokio::time::timeout(self.stop_timeout, &mut handle).await.is_err() {
            tracing::warn!("heartbeat worker did not stop in time; aborting");
            handle.abort();
        }
        tracing::debug!("heartbeat stopped");
        true
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }
}

impl Drop for HeartbeatScheduler {
    fn drop(&mut self) {
        let slot = self
            .worker
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(worker) = slot.take() {
            let _ = worker.shutdown.send(true);
            worker.handle.abort();
        }
    }
}

impl std::fmt::Debug for HeartbeatScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeartbeatScheduler")
            .field("agent_id", &self.reporter.agent_id)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

/// Report immediately, then once per interval until shutdown fires. The
/// period is measured from tick to tick, so report latency does not stretch it.
async fn run_heartbeat_loop(
    reporter: Reporter,
    report: HeartbeatReport,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }

        if let Err(e) = reporter.send(&report).await {
            tracing::debug!("heartbeat report failed: {e}");
        }
    }
}
