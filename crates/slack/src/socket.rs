use std::sync::atomic::{AtomicBool, Ordering};
use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::events::{EventContext, EventDispatcher, SlackEnvelope};

/// How long in-flight handlers may keep running after shutdown is requested.
const DRAIN_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 10, base_delay_ms: 500, max_delay_ms: 30_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Whether the Socket Mode connection is currently open. Shared with the
/// health endpoint.
#[derive(Clone, Debug, Default)]
pub struct ConnectionStatus(Arc<AtomicBool>);

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn set_connected(&self, connected: bool) {
        self.0.store(connected, Ordering::SeqCst);
    }
}

#[async_trait]
pub trait SocketTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    /// `Ok(None)` means the connection ended (closed stream or a Slack
    /// `disconnect` frame) and should be reopened.
    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError>;
    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

enum PumpExit {
    Shutdown,
    Disconnected,
}

pub struct SocketModeRunner {
    transport: Arc<dyn SocketTransport>,
    dispatcher: Arc<EventDispatcher>,
    reconnect_policy: ReconnectPolicy,
    status: ConnectionStatus,
}

impl SocketModeRunner {
    pub fn new(
        transport: Arc<dyn SocketTransport>,
        dispatcher: Arc<EventDispatcher>,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher, reconnect_policy, status: ConnectionStatus::default() }
    }

    pub fn with_status(mut self, status: ConnectionStatus) -> Self {
        self.status = status;
        self
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status.clone()
    }

    /// Runs until `shutdown` flips to `true` or reconnect retries are
    /// exhausted. Exhaustion leaves the process running in a degraded state.
    pub async fn start(&self, mut shutdown: watch::Receiver<bool>) {
        let mut tasks = JoinSet::new();
        let mut failures: u32 = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.connect_and_pump(&mut failures, &mut shutdown, &mut tasks).await {
                Ok(PumpExit::Shutdown) => {
                    info!(event_name = "ingress.slack.shutdown", "socket mode shutdown requested");
                    break;
                }
                Ok(PumpExit::Disconnected) => {
                    info!(event_name = "ingress.slack.reconnect", "socket mode connection ended; reconnecting");
                }
                Err(transport_error) => {
                    self.status.set_connected(false);
                    warn!(
                        event_name = "ingress.slack.transport_failed",
                        attempt = failures,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "socket mode transport failed"
                    );

                    if failures >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "socket mode retries exhausted; continuing process without crash"
                        );
                        break;
                    }

                    let delay = self.reconnect_policy.backoff(failures);
                    failures += 1;
                    if !delay.is_zero() {
                        tokio::select! {
                            () = tokio::time::sleep(delay) => {}
                            _ = shutdown.changed() => {}
                        }
                    }
                }
            }
        }

        self.status.set_connected(false);
        if let Err(error) = self.transport.disconnect().await {
            debug!(error = %error, "socket mode transport disconnect failed during shutdown");
        }
        drain(tasks).await;
    }

    /// Resets `failures` once the transport connects, so only consecutive
    /// failures count toward the retry limit.
    async fn connect_and_pump(
        &self,
        failures: &mut u32,
        shutdown: &mut watch::Receiver<bool>,
        tasks: &mut JoinSet<()>,
    ) -> Result<PumpExit, TransportError> {
        let attempt = *failures;
        info!(attempt, "opening socket mode transport connection");
        self.transport.connect().await?;
        *failures = 0;
        self.status.set_connected(true);
        info!(attempt, "socket mode transport connected");

        loop {
            let next = tokio::select! {
                next = self.transport.next_envelope() => next,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return Ok(PumpExit::Shutdown);
                    }
                    continue;
                }
            };

            let Some(envelope) = next? else {
                info!(attempt, "socket mode transport stream closed");
                self.status.set_connected(false);
                self.transport.disconnect().await?;
                return Ok(PumpExit::Disconnected);
            };

            let routes =
                envelope.event.routes().iter().map(ToString::to_string).collect::<Vec<_>>();
            let user_id = envelope.event.user_id().unwrap_or("unknown").to_owned();
            info!(
                event_name = "ingress.slack.envelope_received",
                envelope_id = %envelope.envelope_id,
                event_type = ?envelope.event.event_type(),
                correlation_id = %envelope.envelope_id,
                routes = ?routes,
                user_id = %user_id,
                "received slack envelope"
            );

            if let Err(error) = self.transport.acknowledge(&envelope.envelope_id).await {
                warn!(
                    event_name = "ingress.slack.ack_failed",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    error = %error,
                    "failed to acknowledge slack envelope"
                );
            } else {
                debug!(
                    event_name = "ingress.slack.ack_sent",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    "acknowledged slack envelope"
                );
            }

            let dispatcher = Arc::clone(&self.dispatcher);
            tasks.spawn(async move {
                let context = EventContext { correlation_id: envelope.envelope_id.clone() };
                match dispatcher.dispatch(&envelope, &context).await {
                    Ok(result) => debug!(
                        event_name = "ingress.slack.dispatched",
                        correlation_id = %context.correlation_id,
                        result = ?result,
                        "slack envelope dispatched"
                    ),
                    Err(error) => warn!(
                        event_name = "ingress.slack.dispatch_failed",
                        correlation_id = %context.correlation_id,
                        user_id = %user_id,
                        error = %error,
                        "event dispatch failed; continuing socket loop"
                    ),
                }
            });

            while tasks.try_join_next().is_some() {}
        }
    }
}

async fn drain(mut tasks: JoinSet<()>) {
    if tasks.is_empty() {
        return;
    }

    info!(task_count = tasks.len(), "waiting for in-flight handlers");
    let finished = tokio::time::timeout(DRAIN_GRACE, async {
        while tasks.join_next().await.is_some() {}
    })
    .await;

    if finished.is_err() {
        warn!(task_count = tasks.len(), "aborting handlers still running after grace period");
        tasks.abort_all();
        while tasks.join_next().await.is_some() {}
    }
}
